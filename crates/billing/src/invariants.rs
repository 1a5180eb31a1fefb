//! Billing Invariants Module
//!
//! Provides runnable consistency checks for the subscription and ledger
//! tables. These invariants can be run after any transition to ensure the
//! system is in a valid state.
//!
//! ## Design Principles
//!
//! 1. **Executable**: Each invariant is a real SQL query that can be run
//! 2. **Explanatory**: Violations include enough context to debug
//! 3. **Non-destructive**: Checks only read, never write

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::BillingResult;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Tenant(s) affected
    pub tenant_ids: Vec<i64>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    /// Severity level
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - tenants may be billed incorrectly
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    /// When the check was run
    pub checked_at: OffsetDateTime,
    /// Total number of checks run
    pub checks_run: usize,
    /// Number of checks that passed
    pub checks_passed: usize,
    /// Number of checks that failed
    pub checks_failed: usize,
    /// List of all violations found
    pub violations: Vec<InvariantViolation>,
    /// Overall health status
    pub healthy: bool,
}

/// Row type for duplicate tenant-wide subscription violation
#[derive(Debug, sqlx::FromRow)]
struct DuplicateTenantSubRow {
    tenant_id: i64,
    sub_count: i64,
}

/// Row type for duplicate product subscription violation
#[derive(Debug, sqlx::FromRow)]
struct DuplicateProductSubRow {
    tenant_id: i64,
    product_key: String,
    sub_count: i64,
}

/// Row type for active subscription without plan violation
#[derive(Debug, sqlx::FromRow)]
struct OrphanSubscriptionRow {
    sub_id: i64,
    tenant_id: i64,
    status: String,
}

/// Row type for malformed ledger entry violation
#[derive(Debug, sqlx::FromRow)]
struct MalformedLedgerRow {
    entry_id: i64,
    tenant_id: i64,
    status: Option<String>,
    transaction_id: Option<String>,
}

/// Row type for one_time subscription with billing date violation
#[derive(Debug, sqlx::FromRow)]
struct OneTimeBillingDateRow {
    sub_id: i64,
    tenant_id: i64,
    next_billing_date: Option<OffsetDateTime>,
}

/// Service for running billing invariant checks
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return summary
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_single_tenant_subscription().await?);
        violations.extend(self.check_single_product_subscription().await?);
        violations.extend(self.check_active_subscription_has_plan().await?);
        violations.extend(self.check_ledger_entries_wellformed().await?);
        violations.extend(self.check_one_time_has_no_billing_date().await?);

        let checks_run = 5;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: At most one tenant-wide subscription row per tenant
    ///
    /// The unique index enforces this at write time; more than one row means
    /// the schema constraint was bypassed and the tenant may be double-billed.
    async fn check_single_tenant_subscription(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateTenantSubRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, COUNT(*) as sub_count
            FROM tenant_subscriptions
            GROUP BY tenant_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_tenant_subscription".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: format!(
                    "Tenant has {} tenant-wide subscription rows (expected at most 1)",
                    row.sub_count
                ),
                context: serde_json::json!({
                    "subscription_count": row.sub_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: At most one add-on row per (tenant, product)
    async fn check_single_product_subscription(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateProductSubRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, product_key, COUNT(*) as sub_count
            FROM product_subscriptions
            GROUP BY tenant_id, product_key
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_product_subscription".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: format!(
                    "Tenant has {} '{}' add-on rows (expected at most 1)",
                    row.sub_count, row.product_key
                ),
                context: serde_json::json!({
                    "product_key": row.product_key,
                    "subscription_count": row.sub_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 3: Active subscriptions reference a plan
    ///
    /// An active row without a plan cannot be priced or renewed.
    async fn check_active_subscription_has_plan(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<OrphanSubscriptionRow> = sqlx::query_as(
            r#"
            SELECT ts.id as sub_id, ts.tenant_id, ts.status
            FROM tenant_subscriptions ts
            LEFT JOIN subscription_plans sp ON sp.id = ts.plan_id
            WHERE LOWER(ts.status) = 'active'
              AND sp.id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "active_subscription_has_plan".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: "Active subscription references no existing plan".to_string(),
                context: serde_json::json!({
                    "subscription_id": row.sub_id,
                    "status": row.status,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 4: Ledger entries are well-formed
    ///
    /// Every entry must carry a transaction id and the completed status this
    /// engine writes; anything else did not come through the atomic writer.
    async fn check_ledger_entries_wellformed(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<MalformedLedgerRow> = sqlx::query_as(
            r#"
            SELECT id as entry_id, tenant_id, status, transaction_id
            FROM payment_ledger
            WHERE transaction_id IS NULL
               OR transaction_id = ''
               OR status IS DISTINCT FROM 'completed'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "ledger_entries_wellformed".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: format!(
                    "Ledger entry {} has status {:?} and transaction id {:?}",
                    row.entry_id, row.status, row.transaction_id
                ),
                context: serde_json::json!({
                    "entry_id": row.entry_id,
                    "status": row.status,
                    "transaction_id": row.transaction_id,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 5: one_time subscriptions carry no next billing date
    async fn check_one_time_has_no_billing_date(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<OneTimeBillingDateRow> = sqlx::query_as(
            r#"
            SELECT id as sub_id, tenant_id, next_billing_date
            FROM tenant_subscriptions
            WHERE billing_cycle = 'one_time'
              AND next_billing_date IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "one_time_has_no_billing_date".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: "Non-recurring subscription has a next billing date".to_string(),
                context: serde_json::json!({
                    "subscription_id": row.sub_id,
                    "next_billing_date": row.next_billing_date.map(|d| d.to_string()),
                }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Run a single invariant check by name
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "single_tenant_subscription" => self.check_single_tenant_subscription().await,
            "single_product_subscription" => self.check_single_product_subscription().await,
            "active_subscription_has_plan" => self.check_active_subscription_has_plan().await,
            "ledger_entries_wellformed" => self.check_ledger_entries_wellformed().await,
            "one_time_has_no_billing_date" => self.check_one_time_has_no_billing_date().await,
            _ => Ok(vec![]),
        }
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "single_tenant_subscription",
            "single_product_subscription",
            "active_subscription_has_plan",
            "ledger_entries_wellformed",
            "one_time_has_no_billing_date",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
        assert_eq!(ViolationSeverity::Low.to_string(), "LOW");
    }

    #[test]
    fn test_available_checks() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 5);
        assert!(checks.contains(&"single_tenant_subscription"));
        assert!(checks.contains(&"single_product_subscription"));
    }
}
