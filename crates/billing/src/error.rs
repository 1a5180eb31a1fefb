//! Billing error types

use thiserror::Error;

/// Errors produced by the billing engine.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Requested plan id does not resolve to an active plan.
    /// Raised before any write occurs.
    #[error("Subscription plan {0} not found")]
    PlanNotFound(i64),

    /// Tenant context is missing.
    #[error("Tenant {0} not found")]
    TenantNotFound(i64),

    /// Subscription row does not exist.
    #[error("Subscription {0} not found")]
    SubscriptionNotFound(i64),

    /// Product add-on subscription does not exist for (tenant, product).
    #[error("No {product} subscription for tenant {tenant_id}")]
    ProductSubscriptionNotFound { tenant_id: i64, product: String },

    /// Plan carries a product scope tag outside the known product set.
    #[error("Plan {plan_id} has unknown product scope '{scope}'")]
    UnknownProductScope { plan_id: i64, scope: String },

    /// Any persistence failure. Unrecoverable locally: the surrounding
    /// transaction rolls back and the error propagates to the caller.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type BillingResult<T> = Result<T, BillingError>;

/// True when the error is Postgres telling us the billing schema has not
/// been migrated yet (undefined table 42P01 / undefined column 42703).
///
/// The projection readers recover from this into empty results; everything
/// else treats it like any other database failure.
pub fn is_schema_not_ready(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("42P01") | Some("42703"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_not_found_message_names_the_plan() {
        let err = BillingError::PlanNotFound(42);
        assert_eq!(err.to_string(), "Subscription plan 42 not found");
    }

    #[test]
    fn non_database_errors_are_not_schema_drift() {
        assert!(!is_schema_not_ready(&sqlx::Error::RowNotFound));
        assert!(!is_schema_not_ready(&sqlx::Error::PoolClosed));
    }
}
