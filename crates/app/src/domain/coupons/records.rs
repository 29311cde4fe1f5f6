//! Coupon Records

use jiff::{Timestamp, civil::Date};
use rust_decimal::Decimal;
use scrip::coupons::{Coupon, DiscountType, ValidationErrors};
use uuid::Uuid;

/// Coupon Record
///
/// A row of the `coupons` table. [`CouponRecord::to_coupon`] projects it
/// into the engine's value type for rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponRecord {
    pub uuid: Uuid,
    pub code: String,
    pub amount: Decimal,
    pub discount_type: DiscountType,
    pub min_cart_total: Decimal,
    pub expiration_date: Date,
    pub allowed_applications: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl CouponRecord {
    /// The engine's view of this row.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] if the row violates the coupon field
    /// invariants; the schema's check constraints make that unreachable for
    /// rows written through this crate.
    pub fn to_coupon(&self) -> Result<Coupon, ValidationErrors> {
        Coupon::new(
            self.code.clone(),
            self.amount,
            self.discount_type,
            self.min_cart_total,
            self.expiration_date,
            u64::try_from(self.allowed_applications).unwrap_or_default(),
        )
    }
}

/// Coupon Application Record
///
/// One recorded use of a coupon on a completed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponApplicationRecord {
    pub uuid: Uuid,
    pub coupon_uuid: Uuid,
    pub order_uuid: Uuid,
    pub created_at: Timestamp,
}
