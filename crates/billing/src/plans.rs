//! Plan catalog reads
//!
//! The catalog is created and edited elsewhere; the engine only reads it.
//! Rows come out of storage loosely typed (nullable columns, features as
//! jsonb that may itself hold a JSON-encoded string) and are normalized into
//! the typed [`Plan`] in one step here.

use loanpilot_shared::BillingCycle;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::error::{is_schema_not_ready, BillingError, BillingResult};

/// A purchasable plan, normalized for display and resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub billing_cycle: BillingCycle,
    pub features: Vec<String>,
    pub max_users: Option<i32>,
    pub max_storage_gb: Option<i32>,
    pub status: String,
    pub trial_days: i32,
    pub is_featured: bool,
    /// Scope tag: `None`/`"platform"` means tenant-wide; otherwise a product key.
    pub product_type: Option<String>,
    pub sort_order: i32,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub subscriber_count: i64,
}

/// Raw storage shape of a plan row.
#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Option<Decimal>,
    billing_cycle: Option<String>,
    features: Option<serde_json::Value>,
    max_users: Option<i32>,
    max_storage_gb: Option<i32>,
    status: Option<String>,
    trial_days: Option<i32>,
    is_featured: Option<bool>,
    product_type: Option<String>,
    sort_order: Option<i32>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
    subscriber_count: Option<i64>,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Plan {
            id: row.id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            price: row.price.and_then(|p| p.to_f64()).unwrap_or(0.0),
            billing_cycle: BillingCycle::parse_or_monthly(row.billing_cycle.as_deref().unwrap_or("")),
            features: normalize_features(row.features),
            max_users: row.max_users,
            max_storage_gb: row.max_storage_gb,
            status: row.status.unwrap_or_else(|| "active".to_string()),
            trial_days: row.trial_days.unwrap_or(0),
            is_featured: row.is_featured.unwrap_or(false),
            product_type: row.product_type,
            sort_order: row.sort_order.unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            subscriber_count: row.subscriber_count.unwrap_or(0),
        }
    }
}

/// The slice of a plan the transition resolver needs, fetched inside the
/// transition's own transaction so it sees one consistent snapshot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivePlan {
    pub id: i64,
    pub name: String,
    pub price: Option<Decimal>,
    pub billing_cycle: Option<String>,
    pub product_type: Option<String>,
}

/// Fetch a plan only if it exists and is active.
pub(crate) async fn fetch_active_plan(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: i64,
) -> BillingResult<Option<ActivePlan>> {
    let row: Option<ActivePlan> = sqlx::query_as(
        r#"
        SELECT id, name, price, billing_cycle, product_type
        FROM subscription_plans
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(plan_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Read access to the plan catalog.
pub struct PlanCatalog {
    pool: PgPool,
}

impl PlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List all plans with their subscriber counts, ordered for display.
    ///
    /// A catalog table that has not been migrated yet yields an empty list.
    pub async fn list_plans(&self) -> BillingResult<Vec<Plan>> {
        let rows: Result<Vec<PlanRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                sp.id, sp.name, sp.description, sp.price, sp.billing_cycle,
                sp.features, sp.max_users, sp.max_storage_gb, sp.status,
                sp.trial_days, sp.is_featured, sp.product_type, sp.sort_order,
                sp.created_at, sp.updated_at,
                COALESCE(
                    (SELECT COUNT(*) FROM tenant_subscriptions ts WHERE ts.plan_id = sp.id),
                    0
                ) AS subscriber_count
            FROM subscription_plans sp
            ORDER BY sp.sort_order ASC, sp.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().map(Plan::from).collect()),
            Err(err) if is_schema_not_ready(&err) => Ok(Vec::new()),
            Err(err) => Err(BillingError::Database(err)),
        }
    }

    /// Fetch one plan by id regardless of status, for display.
    pub async fn find_plan(&self, plan_id: i64) -> BillingResult<Option<Plan>> {
        let row: Result<Option<PlanRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                sp.id, sp.name, sp.description, sp.price, sp.billing_cycle,
                sp.features, sp.max_users, sp.max_storage_gb, sp.status,
                sp.trial_days, sp.is_featured, sp.product_type, sp.sort_order,
                sp.created_at, sp.updated_at,
                COALESCE(
                    (SELECT COUNT(*) FROM tenant_subscriptions ts WHERE ts.plan_id = sp.id),
                    0
                ) AS subscriber_count
            FROM subscription_plans sp
            WHERE sp.id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(row) => Ok(row.map(Plan::from)),
            Err(err) if is_schema_not_ready(&err) => Ok(None),
            Err(err) => Err(BillingError::Database(err)),
        }
    }
}

/// Coerce a stored feature list into a plain list of strings.
///
/// Features arrive either as a jsonb array or as a JSON-encoded string
/// (older rows). Anything unparsable becomes an empty list.
pub fn normalize_features(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => feature_strings(items),
        Some(serde_json::Value::String(raw)) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Array(items)) => feature_strings(items),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn feature_strings(items: Vec<serde_json::Value>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn features_from_array() {
        let value = json!(["loans", "reports"]);
        assert_eq!(normalize_features(Some(value)), vec!["loans", "reports"]);
    }

    #[test]
    fn features_from_json_encoded_string() {
        let value = json!("[\"loans\",\"reports\"]");
        assert_eq!(normalize_features(Some(value)), vec!["loans", "reports"]);
    }

    #[test]
    fn unparsable_features_become_empty() {
        assert_eq!(normalize_features(Some(json!("not json"))), Vec::<String>::new());
        assert_eq!(normalize_features(Some(json!({"a": 1}))), Vec::<String>::new());
        assert_eq!(normalize_features(Some(json!(42))), Vec::<String>::new());
        assert_eq!(normalize_features(None), Vec::<String>::new());
    }

    #[test]
    fn non_string_entries_are_stringified() {
        let value = json!(["loans", 5]);
        assert_eq!(normalize_features(Some(value)), vec!["loans", "5"]);
    }
}
