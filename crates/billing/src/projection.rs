//! Subscription projections
//!
//! Display-ready views joining subscription state with plan metadata. Raw
//! rows arrive loosely typed and are normalized in one step; a schema that
//! has not been migrated yet degrades to an empty subscription list instead
//! of failing the whole read.

use loanpilot_shared::{is_active_status, ProductKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{is_schema_not_ready, BillingError, BillingResult};
use crate::plans::normalize_features;

/// One subscription row joined with its plan, normalized for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: i64,
    pub subscription_id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub billing_cycle: String,
    pub product_type: Option<String>,
    pub max_users: Option<i64>,
    pub max_storage_gb: Option<i64>,
    pub features: Vec<String>,
    pub is_active: bool,
    pub is_recommended: bool,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub started_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub subscription_status: String,
}

/// A tenant's current subscriptions plus its enabled products.
///
/// Enabled products come from the tenant's own flags, independent of
/// whether subscription rows exist for them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSubscriptions {
    pub subscriptions: Vec<SubscriptionView>,
    pub enabled_products: Vec<ProductKey>,
}

/// Admin billing dashboard row: subscription joined with tenant and plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSubscriptionRow {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub tenant_name: Option<String>,
    pub plan_id: Option<i64>,
    pub plan_name: Option<String>,
    pub plan_price: Option<f64>,
    pub status: String,
    pub started_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub next_billing_date: Option<OffsetDateTime>,
    pub cancelled_at: Option<OffsetDateTime>,
    pub cancellation_reason: Option<String>,
    pub billing_cycle: Option<String>,
    pub price: Option<f64>,
}

/// Filter for the admin listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionFilter {
    pub tenant_id: Option<i64>,
}

/// Raw storage shape of the tenant-subscription-with-plan join.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionViewRow {
    subscription_id: i64,
    plan_id: Option<i64>,
    subscription_status: Option<String>,
    subscription_started_at: Option<OffsetDateTime>,
    subscription_expires_at: Option<OffsetDateTime>,
    subscription_billing_cycle: Option<String>,
    subscription_created_at: Option<OffsetDateTime>,
    subscription_updated_at: Option<OffsetDateTime>,
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    billing_cycle: Option<String>,
    features: Option<serde_json::Value>,
    max_users: Option<i32>,
    max_storage_gb: Option<i32>,
    plan_status: Option<String>,
    is_featured: Option<bool>,
    product_type: Option<String>,
    plan_created_at: Option<OffsetDateTime>,
    plan_updated_at: Option<OffsetDateTime>,
}

impl From<SubscriptionViewRow> for SubscriptionView {
    fn from(row: SubscriptionViewRow) -> Self {
        let status = row
            .subscription_status
            .or(row.plan_status)
            .unwrap_or_else(|| "inactive".to_string());

        SubscriptionView {
            id: row.plan_id.unwrap_or(row.subscription_id),
            subscription_id: row.subscription_id,
            name: row.name.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            price: decimal_to_f64(row.price),
            billing_cycle: row
                .subscription_billing_cycle
                .or(row.billing_cycle)
                .unwrap_or_else(|| "monthly".to_string()),
            product_type: row.product_type,
            max_users: row.max_users.map(i64::from),
            max_storage_gb: row.max_storage_gb.map(i64::from),
            features: normalize_features(row.features),
            is_active: is_active_status(&status),
            is_recommended: row.is_featured.unwrap_or(false),
            created_at: row.plan_created_at.or(row.subscription_created_at),
            updated_at: row.plan_updated_at.or(row.subscription_updated_at),
            started_at: row.subscription_started_at,
            expires_at: row.subscription_expires_at,
            subscription_status: status,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: i64,
    tenant_id: Option<i64>,
    tenant_name: Option<String>,
    plan_id: Option<i64>,
    plan_name: Option<String>,
    plan_price: Option<Decimal>,
    status: Option<String>,
    started_at: Option<OffsetDateTime>,
    expires_at: Option<OffsetDateTime>,
    next_billing_date: Option<OffsetDateTime>,
    cancelled_at: Option<OffsetDateTime>,
    cancellation_reason: Option<String>,
    billing_cycle: Option<String>,
    price: Option<Decimal>,
    monthly_price: Option<Decimal>,
}

impl From<AdminRow> for AdminSubscriptionRow {
    fn from(row: AdminRow) -> Self {
        // Display price falls back to the monthly-equivalent when the stored
        // price is missing.
        let price = row.price.or(row.monthly_price);

        AdminSubscriptionRow {
            id: row.id,
            tenant_id: row.tenant_id,
            tenant_name: row.tenant_name,
            plan_id: row.plan_id,
            plan_name: row.plan_name,
            plan_price: row.plan_price.and_then(|p| p.to_f64()),
            status: row.status.unwrap_or_default(),
            started_at: row.started_at,
            expires_at: row.expires_at,
            next_billing_date: row.next_billing_date,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            billing_cycle: row.billing_cycle,
            price: price.and_then(|p| p.to_f64()),
        }
    }
}

fn decimal_to_f64(value: Option<Decimal>) -> f64 {
    value.and_then(|d| d.to_f64()).unwrap_or(0.0)
}

#[derive(Debug, sqlx::FromRow)]
struct TenantFlagsRow {
    money_loan_enabled: bool,
    bnpl_enabled: bool,
    pawnshop_enabled: bool,
}

/// Read-side service over subscription state.
pub struct ProjectionService {
    pool: PgPool,
}

impl ProjectionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current subscriptions and enabled products for a tenant.
    ///
    /// The enabled-product set always reflects the tenant flags; the
    /// subscription list is empty when the billing tables are absent or
    /// missing expected columns.
    pub async fn current_tenant_subscriptions(
        &self,
        tenant_id: i64,
    ) -> BillingResult<TenantSubscriptions> {
        let flags: Option<TenantFlagsRow> = sqlx::query_as(
            r#"
            SELECT money_loan_enabled, bnpl_enabled, pawnshop_enabled
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let flags = flags.ok_or(BillingError::TenantNotFound(tenant_id))?;

        let mut enabled_products = Vec::new();
        if flags.money_loan_enabled {
            enabled_products.push(ProductKey::MoneyLoan);
        }
        if flags.bnpl_enabled {
            enabled_products.push(ProductKey::Bnpl);
        }
        if flags.pawnshop_enabled {
            enabled_products.push(ProductKey::Pawnshop);
        }

        let rows: Result<Vec<SubscriptionViewRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                ts.id AS subscription_id,
                ts.plan_id,
                ts.status AS subscription_status,
                ts.started_at AS subscription_started_at,
                ts.expires_at AS subscription_expires_at,
                ts.billing_cycle AS subscription_billing_cycle,
                ts.created_at AS subscription_created_at,
                ts.updated_at AS subscription_updated_at,
                sp.name,
                sp.description,
                sp.price,
                sp.billing_cycle,
                sp.features,
                sp.max_users,
                sp.max_storage_gb,
                sp.status AS plan_status,
                sp.is_featured,
                sp.product_type,
                sp.created_at AS plan_created_at,
                sp.updated_at AS plan_updated_at
            FROM tenant_subscriptions ts
            LEFT JOIN subscription_plans sp ON sp.id = ts.plan_id
            WHERE ts.tenant_id = $1
            ORDER BY ts.created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await;

        let subscriptions = match rows {
            Ok(rows) => rows.into_iter().map(SubscriptionView::from).collect(),
            Err(err) if is_schema_not_ready(&err) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    "Subscription tables not migrated yet, returning empty list"
                );
                Vec::new()
            }
            Err(err) => return Err(BillingError::Database(err)),
        };

        Ok(TenantSubscriptions {
            subscriptions,
            enabled_products,
        })
    }

    /// Back-office listing of tenant-wide subscriptions across tenants.
    pub async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> BillingResult<Vec<AdminSubscriptionRow>> {
        let rows: Result<Vec<AdminRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                ts.id,
                ts.tenant_id,
                t.name AS tenant_name,
                ts.plan_id,
                sp.name AS plan_name,
                sp.price AS plan_price,
                ts.status,
                ts.started_at,
                ts.expires_at,
                ts.next_billing_date,
                ts.cancelled_at,
                ts.cancellation_reason,
                ts.billing_cycle,
                ts.price,
                ts.monthly_price
            FROM tenant_subscriptions ts
            LEFT JOIN tenants t ON t.id = ts.tenant_id
            LEFT JOIN subscription_plans sp ON sp.id = ts.plan_id
            WHERE ($1::BIGINT IS NULL OR ts.tenant_id = $1)
            ORDER BY ts.started_at DESC
            "#,
        )
        .bind(filter.tenant_id)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().map(AdminSubscriptionRow::from).collect()),
            Err(err) if is_schema_not_ready(&err) => Ok(Vec::new()),
            Err(err) => Err(BillingError::Database(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn base_row() -> SubscriptionViewRow {
        SubscriptionViewRow {
            subscription_id: 7,
            plan_id: Some(3),
            subscription_status: Some("active".to_string()),
            subscription_started_at: Some(datetime!(2025-05-01 00:00 UTC)),
            subscription_expires_at: None,
            subscription_billing_cycle: Some("yearly".to_string()),
            subscription_created_at: Some(datetime!(2025-05-01 00:00 UTC)),
            subscription_updated_at: Some(datetime!(2025-05-01 00:00 UTC)),
            name: Some("Pro Yearly".to_string()),
            description: None,
            price: Some(Decimal::new(120000, 2)),
            billing_cycle: Some("yearly".to_string()),
            features: Some(json!(["loans", "reports"])),
            max_users: Some(25),
            max_storage_gb: None,
            plan_status: Some("active".to_string()),
            is_featured: Some(true),
            product_type: None,
            plan_created_at: Some(datetime!(2025-01-01 00:00 UTC)),
            plan_updated_at: None,
        }
    }

    #[test]
    fn view_prefers_plan_id_and_subscription_fields() {
        let view = SubscriptionView::from(base_row());
        assert_eq!(view.id, 3);
        assert_eq!(view.subscription_id, 7);
        assert_eq!(view.billing_cycle, "yearly");
        assert_eq!(view.price, 1200.0);
        assert_eq!(view.features, vec!["loans", "reports"]);
        assert!(view.is_active);
        assert!(view.is_recommended);
        assert_eq!(view.subscription_status, "active");
    }

    #[test]
    fn view_falls_back_when_plan_side_is_missing() {
        let mut row = base_row();
        row.plan_id = None;
        row.name = None;
        row.description = None;
        row.price = None;
        row.subscription_billing_cycle = None;
        row.billing_cycle = None;
        row.features = None;
        row.is_featured = None;
        row.plan_created_at = None;

        let view = SubscriptionView::from(row);
        assert_eq!(view.id, 7);
        assert_eq!(view.name, "");
        assert_eq!(view.price, 0.0);
        assert_eq!(view.billing_cycle, "monthly");
        assert!(view.features.is_empty());
        assert!(!view.is_recommended);
        assert_eq!(view.created_at, Some(datetime!(2025-05-01 00:00 UTC)));
    }

    #[test]
    fn is_active_coalesces_subscription_then_plan_status() {
        let mut row = base_row();
        row.subscription_status = Some("cancelled".to_string());
        let view = SubscriptionView::from(row);
        assert!(!view.is_active);
        assert_eq!(view.subscription_status, "cancelled");

        let mut row = base_row();
        row.subscription_status = None;
        row.plan_status = Some("active".to_string());
        assert!(SubscriptionView::from(row).is_active);

        let mut row = base_row();
        row.subscription_status = None;
        row.plan_status = None;
        let view = SubscriptionView::from(row);
        assert!(!view.is_active);
        assert_eq!(view.subscription_status, "inactive");
    }
}
