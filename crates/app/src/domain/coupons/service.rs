//! Coupons Service

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use tracing::{Span, info};
use uuid::Uuid;

use scrip::{
    clocks::{Clock, SystemClock},
    coupons::Coupon,
    purchasables::Purchasable,
    redemptions::{CouponRejection, apply_discount, validate_coupon},
    stores::CouponStore,
};

use crate::{
    database::Db,
    domain::coupons::{
        data::NewCoupon,
        errors::CouponsServiceError,
        records::{CouponApplicationRecord, CouponRecord},
        repository::PgCouponsRepository,
    },
};

/// Outcome of evaluating a coupon code at checkout.
///
/// Rejections are expected, recoverable outcomes for the shopper, kept
/// apart from infrastructure failures.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponDecision {
    /// The coupon may be used; carries the resolved row and the signed
    /// adjustment it contributes to the total.
    Eligible {
        record: CouponRecord,
        adjustment: Decimal,
    },

    /// The coupon was rejected with a shopper-facing reason.
    Rejected(CouponRejection),
}

#[derive(Debug, Clone)]
pub struct PgCouponsService<C = SystemClock> {
    db: Db,
    coupons: PgCouponsRepository,
    clock: C,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self::with_clock(db, SystemClock)
    }
}

impl<C> PgCouponsService<C>
where
    C: Clock + Send + Sync,
{
    /// Builds the service around an explicit clock, pinning the calendar
    /// for deterministic tests.
    #[must_use]
    pub fn with_clock(db: Db, clock: C) -> Self {
        Self {
            db,
            coupons: PgCouponsRepository::new(),
            clock,
        }
    }
}

#[async_trait]
impl<C> CouponsService for PgCouponsService<C>
where
    C: Clock + Send + Sync,
{
    #[tracing::instrument(
        name = "coupons.service.create_coupon",
        skip(self, coupon),
        fields(coupon_uuid = tracing::field::Empty, code = tracing::field::Empty),
        err
    )]
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError> {
        let NewCoupon { uuid, draft } = coupon;

        let coupon = draft.validate()?;

        let span = Span::current();

        span.record("coupon_uuid", tracing::field::display(uuid));
        span.record("code", coupon.code());

        let mut tx = self.db.begin().await?;

        let record = self.coupons.create_coupon(&mut tx, uuid, &coupon).await?;

        tx.commit().await?;

        info!(coupon_uuid = %record.uuid, "created coupon");

        Ok(record)
    }

    #[tracing::instrument(
        name = "coupons.service.evaluate",
        skip(self, purchasable),
        fields(subtotal = %purchasable.subtotal(), outcome = tracing::field::Empty),
        err
    )]
    async fn evaluate(
        &self,
        code: &str,
        purchasable: &Purchasable,
        already_applied: bool,
        shipping_cost: Decimal,
    ) -> Result<CouponDecision, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let loaded = match self.coupons.find_by_code(&mut tx, code).await? {
            Some(record) => {
                let applications = self.coupons.count_applications(&mut tx, record.uuid).await?;

                Some((record, applications))
            }
            None => None,
        };

        tx.commit().await?;

        let (store, record) = match loaded {
            Some((record, applications)) => {
                let store = LoadedCoupon::new(
                    record.to_coupon()?,
                    u64::try_from(applications).unwrap_or_default(),
                );

                (store, Some(record))
            }
            None => (LoadedCoupon::default(), None),
        };

        let decision =
            match validate_coupon(&store, &self.clock, code, purchasable, already_applied) {
                Err(rejection) => CouponDecision::Rejected(rejection),
                Ok(_) => {
                    let adjustment = apply_discount(&store, code, purchasable, shipping_cost);
                    let record = record.ok_or(CouponsServiceError::NotFound)?;

                    CouponDecision::Eligible { record, adjustment }
                }
            };

        Span::current().record(
            "outcome",
            match &decision {
                CouponDecision::Eligible { .. } => "eligible",
                CouponDecision::Rejected(_) => "rejected",
            },
        );

        Ok(decision)
    }

    #[tracing::instrument(
        name = "coupons.service.record_application",
        skip(self),
        fields(coupon_uuid = %coupon_uuid, order_uuid = %order_uuid),
        err
    )]
    async fn record_application(
        &self,
        coupon_uuid: Uuid,
        order_uuid: Uuid,
    ) -> Result<CouponApplicationRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        // The row lock serializes concurrent recordings for this coupon, so
        // the count below cannot go stale before the insert commits.
        let Some(allowed) = self.coupons.lock_coupon(&mut tx, coupon_uuid).await? else {
            return Err(CouponsServiceError::NotFound);
        };

        let count = self.coupons.count_applications(&mut tx, coupon_uuid).await?;

        if count >= allowed {
            return Err(CouponsServiceError::LimitReached);
        }

        let record = self
            .coupons
            .create_application(&mut tx, Uuid::now_v7(), coupon_uuid, order_uuid)
            .await?;

        tx.commit().await?;

        info!(coupon_uuid = %coupon_uuid, "recorded coupon application");

        Ok(record)
    }

    #[tracing::instrument(name = "coupons.service.usage_summary", skip(self), err)]
    async fn usage_summary(&self, code: &str) -> Result<String, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self
            .coupons
            .find_by_code(&mut tx, code)
            .await?
            .ok_or(CouponsServiceError::NotFound)?;

        let applications = self.coupons.count_applications(&mut tx, record.uuid).await?;

        tx.commit().await?;

        let coupon = record.to_coupon()?;

        Ok(coupon.usage_summary(u64::try_from(applications).unwrap_or_default()))
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Validates the draft and persists a new coupon.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError>;

    /// Validates `code` against the purchasable and, when eligible, prices
    /// its adjustment in the same round trip.
    async fn evaluate(
        &self,
        code: &str,
        purchasable: &Purchasable,
        already_applied: bool,
        shipping_cost: Decimal,
    ) -> Result<CouponDecision, CouponsServiceError>;

    /// Records one application of a coupon against a placed order.
    ///
    /// Called by the checkout collaborator strictly after a successful
    /// placement that used the coupon.
    async fn record_application(
        &self,
        coupon_uuid: Uuid,
        order_uuid: Uuid,
    ) -> Result<CouponApplicationRecord, CouponsServiceError>;

    /// The coupon's usage line for presentation layers.
    async fn usage_summary(&self, code: &str) -> Result<String, CouponsServiceError>;
}

/// Single-coupon view over rows already fetched in one transaction, letting
/// the pure rules run without further round trips.
#[derive(Debug, Default)]
struct LoadedCoupon {
    coupon: Option<Coupon>,
    applications: u64,
}

impl LoadedCoupon {
    fn new(coupon: Coupon, applications: u64) -> Self {
        Self {
            coupon: Some(coupon),
            applications,
        }
    }
}

impl CouponStore for LoadedCoupon {
    fn find_by_code(&self, code: &str) -> Option<Coupon> {
        self.coupon
            .as_ref()
            .filter(|coupon| coupon.code() == code)
            .cloned()
    }

    fn count_applications(&self, code: &str) -> u64 {
        if self
            .coupon
            .as_ref()
            .is_some_and(|coupon| coupon.code() == code)
        {
            self.applications
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use scrip::{clocks::FixedClock, coupons::DiscountType, purchasables::Cart};
    use testresult::TestResult;

    use super::*;

    fn loaded(allowed_applications: u64, applications: u64) -> TestResult<LoadedCoupon> {
        let coupon = Coupon::new(
            "SAVE10",
            Decimal::new(10, 0),
            DiscountType::Percent,
            Decimal::ZERO,
            date(2030, 12, 31),
            allowed_applications,
        )?;

        Ok(LoadedCoupon::new(coupon, applications))
    }

    #[test]
    fn loaded_coupon_resolves_only_its_own_code() -> TestResult {
        let store = loaded(10, 3)?;

        assert!(store.find_by_code("SAVE10").is_some());
        assert!(store.find_by_code("OTHER").is_none());
        assert_eq!(store.count_applications("SAVE10"), 3);
        assert_eq!(store.count_applications("OTHER"), 0);

        Ok(())
    }

    #[test]
    fn empty_loaded_coupon_yields_invalid_code() {
        let store = LoadedCoupon::default();
        let cart = Purchasable::from(Cart::new(Decimal::new(5000, 2)));

        let result = validate_coupon(
            &store,
            &FixedClock(date(2025, 6, 1)),
            "MISSING",
            &cart,
            false,
        );

        assert_eq!(result, Err(CouponRejection::InvalidCode));
    }

    #[test]
    fn engine_runs_against_the_loaded_view() -> TestResult {
        let store = loaded(10, 3)?;
        let cart = Purchasable::from(Cart::new(Decimal::new(5000, 2)));

        validate_coupon(&store, &FixedClock(date(2025, 6, 1)), "SAVE10", &cart, false)?;

        let adjustment = apply_discount(&store, "SAVE10", &cart, Decimal::ZERO);

        assert_eq!(adjustment, Decimal::new(-500, 2));

        Ok(())
    }

    #[tokio::test]
    async fn callers_can_mock_the_service() -> TestResult {
        let mut service = MockCouponsService::new();

        service
            .expect_evaluate()
            .returning(|_, _, _, _| Ok(CouponDecision::Rejected(CouponRejection::Expired)));

        let cart = Purchasable::from(Cart::new(Decimal::new(5000, 2)));
        let decision = service.evaluate("OLD", &cart, false, Decimal::ZERO).await?;

        assert_eq!(
            decision,
            CouponDecision::Rejected(CouponRejection::Expired)
        );

        Ok(())
    }
}
