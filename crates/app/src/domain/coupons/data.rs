//! Coupon input data

use scrip::coupons::CouponDraft;
use uuid::Uuid;

/// New coupon submission from the administrative side.
///
/// The draft's field rules are checked at save time; the code-uniqueness
/// rule is enforced by the database's unique index.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoupon {
    pub uuid: Uuid,
    pub draft: CouponDraft,
}
