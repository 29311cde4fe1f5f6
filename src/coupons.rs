//! Coupons

use std::{fmt, str::FromStr};

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The pricing mode of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percentage off the purchasable's subtotal.
    Percent,

    /// Flat currency amount off the total.
    Dollar,

    /// Cancels the shipping cost.
    FreeShipping,
}

impl DiscountType {
    /// Stable string label used for storage and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percent => "percent",
            DiscountType::Dollar => "dollar",
            DiscountType::FreeShipping => "free_shipping",
        }
    }
}

/// Error from parsing a [`DiscountType`] label.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown discount type {0:?}")]
pub struct UnknownDiscountType(pub String);

impl FromStr for DiscountType {
    type Err = UnknownDiscountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(DiscountType::Percent),
            "dollar" => Ok(DiscountType::Dollar),
            "free_shipping" => Ok(DiscountType::FreeShipping),
            other => Err(UnknownDiscountType(other.to_owned())),
        }
    }
}

/// A coupon field a validation message attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponField {
    /// The unique coupon code.
    Code,

    /// The discount amount.
    Amount,

    /// The pricing mode.
    DiscountType,

    /// The minimum qualifying cart total.
    MinCartTotal,

    /// The last day the coupon is valid.
    ExpirationDate,

    /// How many successful uses the coupon allows.
    AllowedApplications,
}

impl CouponField {
    /// Field name as it appears in forms and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            CouponField::Code => "code",
            CouponField::Amount => "amount",
            CouponField::DiscountType => "discount_type",
            CouponField::MinCartTotal => "min_cart_total",
            CouponField::ExpirationDate => "expiration_date",
            CouponField::AllowedApplications => "allowed_applications",
        }
    }
}

impl fmt::Display for CouponField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field violations collected from a coupon save attempt.
///
/// A rejected save reports every violated rule at once, keyed by the field
/// the message should display against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<(CouponField, String)>,
}

impl ValidationErrors {
    fn add(&mut self, field: CouponField, message: impl Into<String>) {
        self.violations.push((field, message.into()));
    }

    /// All collected violations, in the order the rules ran.
    pub fn violations(&self) -> &[(CouponField, String)] {
        &self.violations
    }

    /// Messages attached to a single field.
    pub fn messages_for(&self, field: CouponField) -> impl Iterator<Item = &str> {
        self.violations
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, message)| message.as_str())
    }

    /// Whether any rule was violated.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn into_result(self, coupon: Coupon) -> Result<Coupon, ValidationErrors> {
        if self.is_empty() { Ok(coupon) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for (field, message) in &self.violations {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

const BLANK: &str = "can't be blank";
const NEGATIVE: &str = "must be greater than or equal to 0";
const DOLLAR_OVER_MINIMUM: &str =
    "Minimum cart total must be greater than amount for dollar discount.";

/// A named discount rule with eligibility constraints and an amount/type.
///
/// Construction goes through [`Coupon::new`] or [`CouponDraft::validate`],
/// so a held `Coupon` always satisfies its field invariants. The rule
/// engine treats coupons as read-only; nothing here mutates on validation
/// or pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    code: String,
    amount: Decimal,
    discount_type: DiscountType,
    min_cart_total: Decimal,
    expiration_date: Date,
    allowed_applications: u64,
}

impl Coupon {
    /// Builds a coupon from already-typed values, enforcing the field rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every violated rule: blank code,
    /// negative `amount` or `min_cart_total`, or a dollar discount whose
    /// `amount` exceeds `min_cart_total` (reported against the minimum, for
    /// display beside that field).
    pub fn new(
        code: impl Into<String>,
        amount: Decimal,
        discount_type: DiscountType,
        min_cart_total: Decimal,
        expiration_date: Date,
        allowed_applications: u64,
    ) -> Result<Self, ValidationErrors> {
        let code = code.into();
        let mut errors = ValidationErrors::default();

        if code.trim().is_empty() {
            errors.add(CouponField::Code, BLANK);
        }

        if amount < Decimal::ZERO {
            errors.add(CouponField::Amount, NEGATIVE);
        }

        if min_cart_total < Decimal::ZERO {
            errors.add(CouponField::MinCartTotal, NEGATIVE);
        }

        if discount_type == DiscountType::Dollar && amount > min_cart_total {
            errors.add(CouponField::MinCartTotal, DOLLAR_OVER_MINIMUM);
        }

        errors.into_result(Coupon {
            code,
            amount,
            discount_type,
            min_cart_total,
            expiration_date,
            allowed_applications,
        })
    }

    /// The unique, case-sensitive coupon code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The discount amount; percentage points for percent coupons, a
    /// currency amount for dollar coupons, unused for free shipping.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The pricing mode.
    pub fn discount_type(&self) -> DiscountType {
        self.discount_type
    }

    /// The minimum subtotal a purchasable must reach to qualify.
    pub fn min_cart_total(&self) -> Decimal {
        self.min_cart_total
    }

    /// The last day the coupon is valid.
    pub fn expiration_date(&self) -> Date {
        self.expiration_date
    }

    /// How many successful uses the coupon allows.
    pub fn allowed_applications(&self) -> u64 {
        self.allowed_applications
    }

    /// Human-readable summary of the discount this coupon grants.
    pub fn type_label(&self) -> String {
        match self.discount_type {
            DiscountType::FreeShipping => "free shipping".to_owned(),
            DiscountType::Percent => format!("{}%", self.amount.normalize()),
            DiscountType::Dollar => format!("${:.2}", self.amount),
        }
    }

    /// Usage line for presentation, given the recorded application count.
    ///
    /// The count lives with the store, so callers supply it.
    pub fn usage_summary(&self, applications: u64) -> String {
        format!(
            "{applications} of {} allowed uses applied",
            self.allowed_applications
        )
    }
}

/// Unvalidated coupon input, as captured from an administrative form.
///
/// Every field is optional; [`CouponDraft::validate`] either parses the
/// draft into a [`Coupon`] or reports all violations at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouponDraft {
    /// Submitted coupon code.
    pub code: Option<String>,

    /// Submitted discount amount.
    pub amount: Option<Decimal>,

    /// Submitted pricing mode.
    pub discount_type: Option<DiscountType>,

    /// Submitted minimum qualifying cart total.
    pub min_cart_total: Option<Decimal>,

    /// Submitted expiration date.
    pub expiration_date: Option<Date>,

    /// Submitted application limit.
    pub allowed_applications: Option<i64>,
}

impl CouponDraft {
    /// Parses the draft into a [`Coupon`].
    ///
    /// All rules are evaluated; nothing is auto-corrected and nothing is
    /// persisted here. Code uniqueness is the store's responsibility and is
    /// checked at save time, not in the draft.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] with one entry per violated rule:
    /// missing fields, negative numeric fields, and the dollar-discount
    /// invariant `amount <= min_cart_total`.
    pub fn validate(self) -> Result<Coupon, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let code = self
            .code
            .filter(|code| !code.trim().is_empty())
            .map_or_else(
                || {
                    errors.add(CouponField::Code, BLANK);
                    None
                },
                Some,
            );

        let amount = required(&mut errors, CouponField::Amount, self.amount);
        let discount_type = required(&mut errors, CouponField::DiscountType, self.discount_type);
        let min_cart_total = required(&mut errors, CouponField::MinCartTotal, self.min_cart_total);
        let expiration_date =
            required(&mut errors, CouponField::ExpirationDate, self.expiration_date);
        let allowed = required(
            &mut errors,
            CouponField::AllowedApplications,
            self.allowed_applications,
        );

        if amount.is_some_and(|amount| amount < Decimal::ZERO) {
            errors.add(CouponField::Amount, NEGATIVE);
        }

        if min_cart_total.is_some_and(|min| min < Decimal::ZERO) {
            errors.add(CouponField::MinCartTotal, NEGATIVE);
        }

        let allowed = match allowed {
            Some(n) if n < 0 => {
                errors.add(CouponField::AllowedApplications, NEGATIVE);
                None
            }
            other => other.and_then(|n| u64::try_from(n).ok()),
        };

        if discount_type == Some(DiscountType::Dollar)
            && let (Some(amount), Some(min)) = (amount, min_cart_total)
            && amount > min
        {
            errors.add(CouponField::MinCartTotal, DOLLAR_OVER_MINIMUM);
        }

        if let (Some(code), Some(amount), Some(discount_type), Some(min), Some(date), Some(allowed)) =
            (code, amount, discount_type, min_cart_total, expiration_date, allowed)
            && errors.is_empty()
        {
            return Ok(Coupon {
                code,
                amount,
                discount_type,
                min_cart_total: min,
                expiration_date: date,
                allowed_applications: allowed,
            });
        }

        Err(errors)
    }
}

fn required<T>(errors: &mut ValidationErrors, field: CouponField, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, BLANK);
    }

    value
}
