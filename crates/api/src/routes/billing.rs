//! Plan catalog, ledger, and back-office billing endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use loanpilot_billing::{
    AdminSubscriptionRow, BillingError, InvariantCheckSummary, LedgerEntry, Plan,
    SubscriptionFilter,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    let plans = state.billing.plans.list_plans().await?;
    Ok(Json(plans))
}

/// GET /api/plans/{plan_id}
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
) -> ApiResult<Json<Plan>> {
    let plan = state
        .billing
        .plans
        .find_plan(plan_id)
        .await?
        .ok_or(BillingError::PlanNotFound(plan_id))?;

    Ok(Json(plan))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionListQuery {
    pub tenant_id: Option<i64>,
}

/// GET /api/billing/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionListQuery>,
) -> ApiResult<Json<Vec<AdminSubscriptionRow>>> {
    let rows = state
        .billing
        .projection
        .list_subscriptions(SubscriptionFilter {
            tenant_id: query.tenant_id,
        })
        .await?;

    Ok(Json(rows))
}

/// Ledger entry with the amount coerced for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub tenant_id: i64,
    pub transaction_id: String,
    pub amount: f64,
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

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            tenant_id: entry.tenant_id,
            transaction_id: entry.transaction_id,
            amount: entry.amount.to_f64().unwrap_or(0.0),
            currency: entry.currency,
            status: entry.status,
            provider: entry.provider,
            processed_at: entry.processed_at,
            user_id: entry.user_id,
            plan_id: entry.plan_id,
            transaction_type: entry.transaction_type,
            plan_name: entry.plan_name,
            product_type: entry.product_type,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

/// GET /api/tenants/{tenant_id}/billing/history
pub async fn list_history(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<Json<Vec<LedgerEntryResponse>>> {
    let entries = state.billing.history.list_history(tenant_id).await?;
    Ok(Json(entries.into_iter().map(LedgerEntryResponse::from).collect()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummaryResponse {
    pub tenant_id: i64,
    pub total_amount: f64,
    pub entry_count: i64,
    pub subscription_count: i64,
    pub upgrade_count: i64,
    pub last_payment_at: Option<OffsetDateTime>,
}

/// GET /api/tenants/{tenant_id}/billing/summary
pub async fn billing_summary(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<Json<BillingSummaryResponse>> {
    let summary = state.billing.history.billing_summary(tenant_id).await?;

    Ok(Json(BillingSummaryResponse {
        tenant_id: summary.tenant_id,
        total_amount: summary.total_amount.to_f64().unwrap_or(0.0),
        entry_count: summary.entry_count,
        subscription_count: summary.subscription_count,
        upgrade_count: summary.upgrade_count,
        last_payment_at: summary.last_payment_at,
    }))
}

/// GET /api/billing/invariants
///
/// Back-office diagnostics: runs the read-only consistency checks.
pub async fn run_invariants(
    State(state): State<AppState>,
) -> ApiResult<Json<InvariantCheckSummary>> {
    let summary = state.billing.invariants.run_all_checks().await?;
    Ok(Json(summary))
}
