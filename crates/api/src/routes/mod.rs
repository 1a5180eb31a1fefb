//! HTTP routes

pub mod billing;
pub mod subscriptions;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/plans", get(billing::list_plans))
        .route("/api/plans/{plan_id}", get(billing::get_plan))
        .route(
            "/api/tenants/{tenant_id}/subscriptions",
            get(subscriptions::get_tenant_subscriptions)
                .post(subscriptions::create_or_update_subscription),
        )
        .route(
            "/api/tenants/{tenant_id}/products/{product_key}",
            delete(subscriptions::cancel_product_subscription),
        )
        .route("/api/tenants/{tenant_id}/billing/history", get(billing::list_history))
        .route("/api/tenants/{tenant_id}/billing/summary", get(billing::billing_summary))
        .route("/api/billing/subscriptions", get(billing::list_subscriptions))
        .route(
            "/api/billing/subscriptions/{subscription_id}/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route("/api/billing/invariants", get(billing::run_invariants))
        .with_state(state)
}

/// Liveness probe: confirms the database answers.
async fn health(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(loanpilot_billing::BillingError::Database)?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
