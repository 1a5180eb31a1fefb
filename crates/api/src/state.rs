//! Application state

use std::sync::Arc;

use loanpilot_billing::BillingService;
use sqlx::PgPool;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let billing = Arc::new(BillingService::new(pool.clone()));
        Self { pool, billing }
    }
}
