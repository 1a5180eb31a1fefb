//! Subscription transition endpoints

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use loanpilot_billing::{CancellationResult, SubscribeRequest, TenantSubscriptions};
use loanpilot_shared::{BillingCycle, ProductKey};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Inbound purchase payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionBody {
    pub plan_id: i64,
    pub billing_cycle: Option<BillingCycle>,
    pub payment_method: Option<String>,
}

/// Outcome of a committed transition.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub plan_id: i64,
    pub plan_name: String,
    pub product_type: Option<ProductKey>,
    pub billing_cycle: BillingCycle,
    pub amount: f64,
    pub transaction_id: String,
    pub next_billing_date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub reason: Option<String>,
}

/// Acting user, when the request layer forwards one.
fn acting_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
}

/// POST /api/tenants/{tenant_id}/subscriptions
pub async fn create_or_update_subscription(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<CreateSubscriptionBody>,
) -> ApiResult<Json<SubscriptionResponse>> {
    if body.plan_id <= 0 {
        return Err(ApiError::BadRequest("planId must be a positive integer".to_string()));
    }

    let summary = state
        .billing
        .subscriptions
        .create_or_update_subscription(
            tenant_id,
            acting_user_id(&headers),
            SubscribeRequest {
                plan_id: body.plan_id,
                billing_cycle: body.billing_cycle,
                payment_method: body.payment_method,
            },
        )
        .await?;

    Ok(Json(SubscriptionResponse {
        plan_id: summary.plan_id,
        plan_name: summary.plan_name,
        product_type: summary.product_type,
        billing_cycle: summary.billing_cycle,
        amount: summary.amount.to_f64().unwrap_or(0.0),
        transaction_id: summary.transaction_id,
        next_billing_date: summary.next_billing_date,
    }))
}

/// GET /api/tenants/{tenant_id}/subscriptions
pub async fn get_tenant_subscriptions(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<Json<TenantSubscriptions>> {
    let view = state
        .billing
        .projection
        .current_tenant_subscriptions(tenant_id)
        .await?;

    Ok(Json(view))
}

/// POST /api/billing/subscriptions/{subscription_id}/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<i64>,
    body: Option<Json<CancelBody>>,
) -> ApiResult<Json<CancellationResult>> {
    let reason = body.and_then(|Json(b)| b.reason);

    let result = state
        .billing
        .subscriptions
        .cancel_subscription(subscription_id, reason.as_deref())
        .await?;

    Ok(Json(result))
}

/// DELETE /api/tenants/{tenant_id}/products/{product_key}
pub async fn cancel_product_subscription(
    State(state): State<AppState>,
    Path((tenant_id, product_key)): Path<(i64, String)>,
) -> ApiResult<Json<CancellationResult>> {
    let product = ProductKey::parse(&product_key)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown product key '{product_key}'")))?;

    let result = state
        .billing
        .subscriptions
        .cancel_product_subscription(tenant_id, product)
        .await?;

    Ok(Json(result))
}
