//! Coupon stores

use std::collections::HashMap;

use thiserror::Error;

use crate::coupons::Coupon;

/// Read-only coupon lookup the rule engine evaluates against.
///
/// `find_by_code` is an exact, case-sensitive match. Code uniqueness is
/// owned by the implementation; the engine assumes it. Recording a new
/// application is deliberately not part of this trait — it belongs to the
/// checkout-completion collaborator, which must pair the count check and
/// the insert in one atomic step (see [`MemoryCouponStore::record_application`]
/// for the reference behavior).
pub trait CouponStore {
    /// Resolves a coupon by its code.
    fn find_by_code(&self, code: &str) -> Option<Coupon>;

    /// Number of recorded applications for the coupon with this code.
    ///
    /// Unknown codes count as zero.
    fn count_applications(&self, code: &str) -> u64;
}

/// Errors from mutating a [`MemoryCouponStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A coupon with this code already exists.
    #[error("coupon code {0:?} is already taken")]
    DuplicateCode(String),

    /// No coupon with this code exists.
    #[error("no coupon with code {0:?}")]
    UnknownCode(String),

    /// The coupon has consumed every allowed application.
    #[error("coupon {code:?} has reached its limit of {limit} applications")]
    LimitReached {
        /// The coupon code.
        code: String,
        /// The coupon's application limit.
        limit: u64,
    },
}

/// In-process coupon store.
///
/// The reference implementation of [`CouponStore`], used in tests and
/// wherever coupons are configured in code rather than persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryCouponStore {
    coupons: HashMap<String, Coupon>,
    applications: HashMap<String, Vec<String>>,
}

impl MemoryCouponStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists a coupon, enforcing code uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateCode`] if a coupon with the same code
    /// is already stored.
    pub fn insert(&mut self, coupon: Coupon) -> Result<(), StoreError> {
        if self.coupons.contains_key(coupon.code()) {
            return Err(StoreError::DuplicateCode(coupon.code().to_owned()));
        }

        self.coupons.insert(coupon.code().to_owned(), coupon);

        Ok(())
    }

    /// Records one application of the coupon against an order.
    ///
    /// The limit check and the write happen under the same `&mut`
    /// exclusivity, so the allowed-applications invariant cannot be
    /// exceeded through this method.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownCode`] for an unknown code, or
    /// [`StoreError::LimitReached`] when every allowed application has
    /// already been recorded.
    pub fn record_application(
        &mut self,
        code: &str,
        order_ref: impl Into<String>,
    ) -> Result<(), StoreError> {
        let Some(coupon) = self.coupons.get(code) else {
            return Err(StoreError::UnknownCode(code.to_owned()));
        };

        let limit = coupon.allowed_applications();
        let applications = self.applications.entry(code.to_owned()).or_default();

        if applications.len() as u64 >= limit {
            return Err(StoreError::LimitReached {
                code: code.to_owned(),
                limit,
            });
        }

        applications.push(order_ref.into());

        Ok(())
    }
}

impl CouponStore for MemoryCouponStore {
    fn find_by_code(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(code).cloned()
    }

    fn count_applications(&self, code: &str) -> u64 {
        self.applications
            .get(code)
            .map_or(0, |applications| applications.len() as u64)
    }
}
