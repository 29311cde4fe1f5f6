//! Redemptions

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::{
    clocks::Clock,
    coupons::{Coupon, DiscountType},
    purchasables::Purchasable,
    stores::CouponStore,
};

/// Why a coupon may not be used on a purchasable.
///
/// These are expected checkout outcomes surfaced to the shopper, not
/// failures of the system. The `Display` text is the shopper-facing
/// message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponRejection {
    /// No coupon matches the submitted code.
    #[error("Invalid coupon code.")]
    InvalidCode,

    /// The coupon's expiration date has passed.
    #[error("Expired coupon.")]
    Expired,

    /// The purchasable's subtotal is under the coupon's minimum.
    #[error("Order does not meet minimum total for coupon.")]
    BelowMinimum,

    /// Every allowed application has already been consumed.
    #[error("Coupon has already been used {limit} times.")]
    UsageLimitExceeded {
        /// The coupon's application limit.
        limit: u64,
    },

    /// A free-shipping coupon was offered on an order with no shipment line.
    #[error("No shipping on this order.")]
    NoShippingPresent,
}

/// Decides whether `code` may be applied to `purchasable`.
///
/// Checks run in a fixed order and stop at the first failure: code lookup,
/// expiration, minimum subtotal, usage limit, then shipping presence for
/// free-shipping coupons on orders. Callers rely on that precedence.
///
/// Pass `already_applied = true` when this coupon's usage has already been
/// counted elsewhere in the current transaction, so the limit check is
/// skipped. Carts always pass the shipping-presence check; it only applies
/// to orders.
///
/// This reads the store once per consulted fact and changes nothing;
/// calling it twice against an unchanged store yields identical results.
/// Note that the store itself is not serialized here: two concurrent
/// checkouts can both pass the usage-limit check before either records an
/// application. The collaborator that records applications must pair its
/// own count check with the write atomically.
///
/// # Errors
///
/// Returns the [`CouponRejection`] for the first failed check.
pub fn validate_coupon<S, C>(
    store: &S,
    clock: &C,
    code: &str,
    purchasable: &Purchasable,
    already_applied: bool,
) -> Result<Coupon, CouponRejection>
where
    S: CouponStore + ?Sized,
    C: Clock + ?Sized,
{
    let Some(coupon) = store.find_by_code(code) else {
        return Err(CouponRejection::InvalidCode);
    };

    if coupon.expiration_date() < clock.today() {
        return Err(CouponRejection::Expired);
    }

    if purchasable.subtotal() < coupon.min_cart_total() {
        return Err(CouponRejection::BelowMinimum);
    }

    if !already_applied && store.count_applications(code) >= coupon.allowed_applications() {
        return Err(CouponRejection::UsageLimitExceeded {
            limit: coupon.allowed_applications(),
        });
    }

    if let Purchasable::Order(order) = purchasable
        && coupon.discount_type() == DiscountType::FreeShipping
        && order.shipment_line_item().is_none()
    {
        return Err(CouponRejection::NoShippingPresent);
    }

    Ok(coupon)
}

/// Signed adjustment `code` contributes to the purchasable's total.
///
/// Always zero or negative — a discount reduces the total. The caller is
/// expected to have run [`validate_coupon`] for the same code and
/// purchasable in the current operation; nothing is re-checked here, and a
/// code that does not resolve yields [`Decimal::ZERO`] rather than an
/// error. That silent default is part of the contract.
///
/// `shipping_cost` is only meaningful for carts, where shipping is not yet
/// a line item; pass [`Decimal::ZERO`] for orders.
///
/// Percent discounts are proportional to the subtotal *at computation
/// time* and are returned at full precision; round with
/// [`round_adjustment`] at the point of display or application.
pub fn apply_discount<S>(
    store: &S,
    code: &str,
    purchasable: &Purchasable,
    shipping_cost: Decimal,
) -> Decimal
where
    S: CouponStore + ?Sized,
{
    let Some(coupon) = store.find_by_code(code) else {
        return Decimal::ZERO;
    };

    match coupon.discount_type() {
        DiscountType::Dollar => -coupon.amount(),
        DiscountType::Percent => {
            let rate = Percentage::from(coupon.amount() / Decimal::ONE_HUNDRED);

            -(rate * purchasable.subtotal())
        }
        DiscountType::FreeShipping => match purchasable {
            Purchasable::Order(order) => order
                .shipment_line_item()
                .map_or(Decimal::ZERO, |line| -line.price()),
            Purchasable::Cart(_) => -shipping_cost,
        },
    }
}

/// Rounds an adjustment to the currency's minor unit (2 decimal places).
///
/// Applied only at display or application time; intermediate arithmetic
/// keeps full precision.
pub fn round_adjustment(adjustment: Decimal) -> Decimal {
    adjustment.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use testresult::TestResult;

    use crate::{
        clocks::FixedClock,
        purchasables::{Cart, LineItem, Order, SHIPMENT_KIND},
        stores::MemoryCouponStore,
    };

    use super::*;

    const TODAY: jiff::civil::Date = date(2025, 6, 1);

    fn store_with(coupons: impl IntoIterator<Item = Coupon>) -> MemoryCouponStore {
        let mut store = MemoryCouponStore::new();

        for coupon in coupons {
            if let Err(error) = store.insert(coupon) {
                panic!("fixture insert failed: {error}");
            }
        }

        store
    }

    fn percent_coupon(code: &str, amount: i64) -> Coupon {
        build(code, Decimal::new(amount, 0), DiscountType::Percent, Decimal::ZERO)
    }

    fn build(code: &str, amount: Decimal, discount_type: DiscountType, min: Decimal) -> Coupon {
        match Coupon::new(code, amount, discount_type, min, date(2030, 12, 31), 10) {
            Ok(coupon) => coupon,
            Err(errors) => panic!("fixture coupon invalid: {errors}"),
        }
    }

    fn cart(subtotal: Decimal) -> Purchasable {
        Purchasable::from(Cart::new(subtotal))
    }

    #[test]
    fn unknown_code_is_invalid() {
        let store = MemoryCouponStore::new();

        let result = validate_coupon(
            &store,
            &FixedClock(TODAY),
            "MISSING",
            &cart(Decimal::new(5000, 2)),
            false,
        );

        assert_eq!(result, Err(CouponRejection::InvalidCode));
    }

    #[test]
    fn expired_coupon_is_rejected_before_other_checks() {
        // Subtotal is also under the minimum; expiration must win.
        let coupon = build(
            "OLD",
            Decimal::new(5, 0),
            DiscountType::Dollar,
            Decimal::new(100, 0),
        );
        let store = store_with([coupon]);

        let result = validate_coupon(
            &store,
            &FixedClock(date(2031, 1, 1)),
            "OLD",
            &cart(Decimal::new(1, 0)),
            false,
        );

        assert_eq!(result, Err(CouponRejection::Expired));
    }

    #[test]
    fn expiring_today_is_still_valid() -> TestResult {
        let coupon = build(
            "LAST-DAY",
            Decimal::new(10, 0),
            DiscountType::Percent,
            Decimal::ZERO,
        );
        let expires = coupon.expiration_date();
        let store = store_with([coupon]);

        let result = validate_coupon(
            &store,
            &FixedClock(expires),
            "LAST-DAY",
            &cart(Decimal::new(5000, 2)),
            false,
        )?;

        assert_eq!(result.code(), "LAST-DAY");

        Ok(())
    }

    #[test]
    fn subtotal_under_minimum_is_rejected() {
        let coupon = build(
            "BIGSPEND",
            Decimal::new(10, 0),
            DiscountType::Percent,
            Decimal::new(10000, 2),
        );
        let store = store_with([coupon]);

        let result = validate_coupon(
            &store,
            &FixedClock(TODAY),
            "BIGSPEND",
            &cart(Decimal::new(9999, 2)),
            false,
        );

        assert_eq!(result, Err(CouponRejection::BelowMinimum));
    }

    #[test]
    fn zero_minimum_always_passes() -> TestResult {
        let store = store_with([percent_coupon("ANY", 10)]);

        validate_coupon(&store, &FixedClock(TODAY), "ANY", &cart(Decimal::ZERO), false)?;

        Ok(())
    }

    #[test]
    fn usage_limit_respects_already_applied() -> TestResult {
        let coupon = match Coupon::new(
            "TWICE",
            Decimal::new(10, 0),
            DiscountType::Percent,
            Decimal::ZERO,
            date(2030, 12, 31),
            2,
        ) {
            Ok(coupon) => coupon,
            Err(errors) => panic!("fixture coupon invalid: {errors}"),
        };
        let mut store = store_with([coupon]);
        store.record_application("TWICE", "order-1")?;
        store.record_application("TWICE", "order-2")?;

        let fresh = validate_coupon(
            &store,
            &FixedClock(TODAY),
            "TWICE",
            &cart(Decimal::new(5000, 2)),
            false,
        );

        assert_eq!(
            fresh,
            Err(CouponRejection::UsageLimitExceeded { limit: 2 })
        );
        assert_eq!(
            fresh.map_err(|rejection| rejection.to_string()),
            Err("Coupon has already been used 2 times.".to_owned())
        );

        let counted = validate_coupon(
            &store,
            &FixedClock(TODAY),
            "TWICE",
            &cart(Decimal::new(5000, 2)),
            true,
        )?;

        assert_eq!(counted.code(), "TWICE");

        Ok(())
    }

    #[test]
    fn zero_allowed_applications_never_validates_fresh() {
        let coupon = match Coupon::new(
            "NEVER",
            Decimal::new(10, 0),
            DiscountType::Percent,
            Decimal::ZERO,
            date(2030, 12, 31),
            0,
        ) {
            Ok(coupon) => coupon,
            Err(errors) => panic!("fixture coupon invalid: {errors}"),
        };
        let store = store_with([coupon]);

        let result = validate_coupon(
            &store,
            &FixedClock(TODAY),
            "NEVER",
            &cart(Decimal::new(5000, 2)),
            false,
        );

        assert_eq!(result, Err(CouponRejection::UsageLimitExceeded { limit: 0 }));
    }

    #[test]
    fn free_shipping_on_order_requires_shipment_line() {
        let coupon = build(
            "FREESHIP",
            Decimal::ZERO,
            DiscountType::FreeShipping,
            Decimal::ZERO,
        );
        let store = store_with([coupon]);

        let bare_order = Purchasable::from(Order::new(
            Decimal::new(5000, 2),
            [LineItem::new("product", Decimal::new(5000, 2))],
        ));

        let result = validate_coupon(&store, &FixedClock(TODAY), "FREESHIP", &bare_order, false);

        assert_eq!(result, Err(CouponRejection::NoShippingPresent));
    }

    #[test]
    fn free_shipping_on_cart_skips_the_shipping_check() -> TestResult {
        let coupon = build(
            "FREESHIP",
            Decimal::ZERO,
            DiscountType::FreeShipping,
            Decimal::ZERO,
        );
        let store = store_with([coupon]);

        validate_coupon(
            &store,
            &FixedClock(TODAY),
            "FREESHIP",
            &cart(Decimal::new(5000, 2)),
            false,
        )?;

        Ok(())
    }

    #[test]
    fn validation_is_idempotent() {
        let store = store_with([percent_coupon("SAVE10", 10)]);
        let purchasable = cart(Decimal::new(5000, 2));

        let first = validate_coupon(&store, &FixedClock(TODAY), "SAVE10", &purchasable, false);
        let second = validate_coupon(&store, &FixedClock(TODAY), "SAVE10", &purchasable, false);

        assert_eq!(first, second);
    }

    #[test]
    fn percent_discount_is_proportional_to_subtotal() {
        let store = store_with([percent_coupon("SAVE10", 10)]);

        let adjustment = apply_discount(
            &store,
            "SAVE10",
            &cart(Decimal::new(5000, 2)),
            Decimal::ZERO,
        );

        assert_eq!(adjustment, Decimal::new(-500, 2));
    }

    #[test]
    fn dollar_discount_ignores_subtotal() {
        let coupon = build(
            "FIVER",
            Decimal::new(500, 2),
            DiscountType::Dollar,
            Decimal::new(1000, 2),
        );
        let store = store_with([coupon]);

        let adjustment = apply_discount(
            &store,
            "FIVER",
            &cart(Decimal::new(2000, 2)),
            Decimal::ZERO,
        );

        assert_eq!(adjustment, Decimal::new(-500, 2));
    }

    #[test]
    fn free_shipping_cancels_the_shipment_line_on_orders() {
        let coupon = build(
            "FREESHIP",
            Decimal::ZERO,
            DiscountType::FreeShipping,
            Decimal::ZERO,
        );
        let store = store_with([coupon]);

        let order = Purchasable::from(Order::new(
            Decimal::new(5000, 2),
            [
                LineItem::new("product", Decimal::new(4201, 2)),
                LineItem::new(SHIPMENT_KIND, Decimal::new(799, 2)),
            ],
        ));

        let adjustment = apply_discount(&store, "FREESHIP", &order, Decimal::ZERO);

        assert_eq!(adjustment, Decimal::new(-799, 2));
    }

    #[test]
    fn free_shipping_without_shipment_line_degrades_to_zero() {
        let coupon = build(
            "FREESHIP",
            Decimal::ZERO,
            DiscountType::FreeShipping,
            Decimal::ZERO,
        );
        let store = store_with([coupon]);

        let order = Purchasable::from(Order::new(
            Decimal::new(5000, 2),
            [LineItem::new("product", Decimal::new(5000, 2))],
        ));

        let adjustment = apply_discount(&store, "FREESHIP", &order, Decimal::ZERO);

        assert_eq!(adjustment, Decimal::ZERO);
    }

    #[test]
    fn free_shipping_on_cart_uses_the_supplied_cost() {
        let coupon = build(
            "FREESHIP",
            Decimal::ZERO,
            DiscountType::FreeShipping,
            Decimal::ZERO,
        );
        let store = store_with([coupon]);

        let adjustment = apply_discount(
            &store,
            "FREESHIP",
            &cart(Decimal::new(5000, 2)),
            Decimal::new(450, 2),
        );

        assert_eq!(adjustment, Decimal::new(-450, 2));
    }

    #[test]
    fn unknown_code_prices_to_zero() {
        let store = MemoryCouponStore::new();

        let adjustment = apply_discount(
            &store,
            "MISSING",
            &cart(Decimal::new(5000, 2)),
            Decimal::ZERO,
        );

        assert_eq!(adjustment, Decimal::ZERO);
    }

    #[test]
    fn percent_adjustment_keeps_precision_until_rounded() {
        // 10% of 33.33 is 3.333; the raw adjustment keeps the third place.
        let store = store_with([percent_coupon("SAVE10", 10)]);

        let raw = apply_discount(
            &store,
            "SAVE10",
            &cart(Decimal::new(3333, 2)),
            Decimal::ZERO,
        );

        assert_eq!(raw, Decimal::new(-3333, 3));
        assert_eq!(round_adjustment(raw), Decimal::new(-333, 2));
    }
}
