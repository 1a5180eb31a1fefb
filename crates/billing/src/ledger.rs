//! Payment ledger
//!
//! Every successful subscription transition appends exactly one entry here,
//! inside the same transaction as the subscription writes. Entries are never
//! updated or deleted; the ledger is the durable audit/invoice trail.

use loanpilot_shared::{BillingCycle, ProductKey};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};

use crate::error::{is_schema_not_ready, BillingError, BillingResult};
use crate::subscriptions::TransitionKind;

/// Ledger entries are denominated in a single currency.
pub const CURRENCY: &str = "PHP";

/// Product-type snapshot written for tenant-wide transitions.
pub const PLATFORM_SCOPE: &str = "platform";

/// Synchronous transitions settle immediately.
const STATUS_COMPLETED: &str = "completed";

/// Provider label recorded when the caller supplies none.
const DEFAULT_PROVIDER: &str = "manual";

/// Human-readable transaction id: `INV-<YYYYMMDD>-<suffix>`.
///
/// Collisions in the random suffix are tolerated; the ledger key is the row
/// id, not this code.
pub fn format_transaction_id(date: Date, suffix: &str) -> String {
    format!(
        "INV-{:04}{:02}{:02}-{}",
        date.year(),
        date.month() as u8,
        date.day(),
        suffix
    )
}

/// Description text recorded with each transition.
pub fn transition_description(kind: TransitionKind, plan_name: &str, cycle: BillingCycle) -> String {
    let verb = match kind {
        TransitionKind::Subscription => "Subscribed to",
        TransitionKind::Upgrade => "Upgraded to",
    };
    format!("{verb} {plan_name} ({cycle})")
}

/// Everything a transition needs recorded about itself.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry<'a> {
    pub tenant_id: i64,
    pub transaction_id: &'a str,
    pub amount: Decimal,
    pub provider: Option<&'a str>,
    pub processed_at: OffsetDateTime,
    pub user_id: Option<i64>,
    pub plan_id: i64,
    pub kind: TransitionKind,
    pub plan_name: &'a str,
    /// `None` records the tenant-wide `"platform"` sentinel.
    pub product_type: Option<ProductKey>,
    pub description: String,
}

/// Append one entry inside the caller's transaction.
pub(crate) async fn append_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: NewLedgerEntry<'_>,
) -> BillingResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_ledger
            (tenant_id, transaction_id, amount, currency, status, provider,
             processed_at, user_id, plan_id, transaction_type, plan_name,
             product_type, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(entry.tenant_id)
    .bind(entry.transaction_id)
    .bind(entry.amount)
    .bind(CURRENCY)
    .bind(STATUS_COMPLETED)
    .bind(entry.provider.unwrap_or(DEFAULT_PROVIDER))
    .bind(entry.processed_at)
    .bind(entry.user_id)
    .bind(entry.plan_id)
    .bind(entry.kind.as_str())
    .bind(entry.plan_name)
    .bind(
        entry
            .product_type
            .map(|key| key.as_str())
            .unwrap_or(PLATFORM_SCOPE),
    )
    .bind(&entry.description)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// A stored ledger entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub tenant_id: i64,
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub processed_at: Option<OffsetDateTime>,
    pub user_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub transaction_type: String,
    pub plan_name: Option<String>,
    pub product_type: Option<String>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Aggregate figures for the billing overview screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub tenant_id: i64,
    pub total_amount: Decimal,
    pub entry_count: i64,
    pub subscription_count: i64,
    pub upgrade_count: i64,
    pub last_payment_at: Option<OffsetDateTime>,
}

/// Read access to the payment ledger.
pub struct PaymentHistoryService {
    pool: PgPool,
}

impl PaymentHistoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ledger entries for a tenant, newest first. An unmigrated ledger table
    /// yields an empty list.
    pub async fn list_history(&self, tenant_id: i64) -> BillingResult<Vec<LedgerEntry>> {
        let rows: Result<Vec<LedgerEntry>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, transaction_id, amount, currency, status,
                   provider, processed_at, user_id, plan_id, transaction_type,
                   plan_name, product_type, description, created_at
            FROM payment_ledger
            WHERE tenant_id = $1
            ORDER BY processed_at DESC, id DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => Ok(rows),
            Err(err) if is_schema_not_ready(&err) => Ok(Vec::new()),
            Err(err) => Err(BillingError::Database(err)),
        }
    }

    /// Totals per tenant across the whole ledger.
    pub async fn billing_summary(&self, tenant_id: i64) -> BillingResult<BillingSummary> {
        let row: Result<(Option<Decimal>, i64, i64, i64, Option<OffsetDateTime>), sqlx::Error> =
            sqlx::query_as(
                r#"
                SELECT
                    SUM(amount),
                    COUNT(*),
                    COUNT(*) FILTER (WHERE transaction_type = 'subscription'),
                    COUNT(*) FILTER (WHERE transaction_type = 'upgrade'),
                    MAX(processed_at)
                FROM payment_ledger
                WHERE tenant_id = $1
                "#,
            )
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await;

        match row {
            Ok((total, entries, subs, upgrades, last)) => Ok(BillingSummary {
                tenant_id,
                total_amount: total.unwrap_or(Decimal::ZERO),
                entry_count: entries,
                subscription_count: subs,
                upgrade_count: upgrades,
                last_payment_at: last,
            }),
            Err(err) if is_schema_not_ready(&err) => Ok(BillingSummary {
                tenant_id,
                total_amount: Decimal::ZERO,
                entry_count: 0,
                subscription_count: 0,
                upgrade_count: 0,
                last_payment_at: None,
            }),
            Err(err) => Err(BillingError::Database(err)),
        }
    }
}
