//! Coupons Repository

use jiff_sqlx::{Date as SqlxDate, Timestamp as SqlxTimestamp};
use rust_decimal::Decimal;
use scrip::coupons::Coupon;
use sqlx::{Postgres, Transaction, query_as, query_scalar};
use uuid::Uuid;

use crate::domain::coupons::records::{CouponApplicationRecord, CouponRecord};

const CREATE_COUPON_SQL: &str = include_str!("sql/create_coupon.sql");
const FIND_COUPON_BY_CODE_SQL: &str = include_str!("sql/find_coupon_by_code.sql");
const COUNT_COUPON_APPLICATIONS_SQL: &str = include_str!("sql/count_coupon_applications.sql");
const LOCK_COUPON_SQL: &str = include_str!("sql/lock_coupon.sql");
const CREATE_COUPON_APPLICATION_SQL: &str = include_str!("sql/create_coupon_application.sql");

/// Row shape shared by every query returning a full coupon.
type CouponRow = (
    Uuid,
    String,
    Decimal,
    String,
    Decimal,
    SqlxDate,
    i64,
    SqlxTimestamp,
    SqlxTimestamp,
    Option<SqlxTimestamp>,
);

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        uuid: Uuid,
        coupon: &Coupon,
    ) -> Result<CouponRecord, sqlx::Error> {
        let row: CouponRow = query_as(CREATE_COUPON_SQL)
            .bind(uuid)
            .bind(coupon.code())
            .bind(coupon.amount())
            .bind(coupon.discount_type().as_str())
            .bind(coupon.min_cart_total())
            .bind(SqlxDate::from(coupon.expiration_date()))
            .bind(i64::try_from(coupon.allowed_applications()).unwrap_or(i64::MAX))
            .fetch_one(&mut **tx)
            .await?;

        to_coupon_record(row)
    }

    pub(crate) async fn find_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        let row: Option<CouponRow> = query_as(FIND_COUPON_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(to_coupon_record).transpose()
    }

    pub(crate) async fn count_applications(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon_uuid: Uuid,
    ) -> Result<i64, sqlx::Error> {
        query_scalar(COUNT_COUPON_APPLICATIONS_SQL)
            .bind(coupon_uuid)
            .fetch_one(&mut **tx)
            .await
    }

    /// Locks the coupon row for the rest of the transaction and returns its
    /// application limit, serializing concurrent application recording.
    pub(crate) async fn lock_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon_uuid: Uuid,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(Uuid, i64)> = query_as(LOCK_COUPON_SQL)
            .bind(coupon_uuid)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.map(|(_, allowed_applications)| allowed_applications))
    }

    pub(crate) async fn create_application(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        uuid: Uuid,
        coupon_uuid: Uuid,
        order_uuid: Uuid,
    ) -> Result<CouponApplicationRecord, sqlx::Error> {
        let (uuid, coupon_uuid, order_uuid, created_at): (Uuid, Uuid, Uuid, SqlxTimestamp) =
            query_as(CREATE_COUPON_APPLICATION_SQL)
                .bind(uuid)
                .bind(coupon_uuid)
                .bind(order_uuid)
                .fetch_one(&mut **tx)
                .await?;

        Ok(CouponApplicationRecord {
            uuid,
            coupon_uuid,
            order_uuid,
            created_at: created_at.to_jiff(),
        })
    }
}

fn to_coupon_record(row: CouponRow) -> Result<CouponRecord, sqlx::Error> {
    let (
        uuid,
        code,
        amount,
        discount_type,
        min_cart_total,
        expiration_date,
        allowed_applications,
        created_at,
        updated_at,
        deleted_at,
    ) = row;

    let discount_type = discount_type
        .parse()
        .map_err(|error| sqlx::Error::ColumnDecode {
            index: "discount_type".to_string(),
            source: Box::new(error),
        })?;

    Ok(CouponRecord {
        uuid,
        code,
        amount,
        discount_type,
        min_cart_total,
        expiration_date: expiration_date.to_jiff(),
        allowed_applications,
        created_at: created_at.to_jiff(),
        updated_at: updated_at.to_jiff(),
        deleted_at: deleted_at.map(SqlxTimestamp::to_jiff),
    })
}
