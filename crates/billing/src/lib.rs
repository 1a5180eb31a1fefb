// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! LoanPilot Billing Module
//!
//! The tenant subscription and billing transaction engine.
//!
//! ## Features
//!
//! - **Subscription Transitions**: Resolve a purchased plan into a priced
//!   write plan, classify it as a new subscription or an upgrade, and apply
//!   it atomically across the tenant-wide bundle, per-product add-ons,
//!   tenant plan label, and the payment ledger
//! - **Pricing**: Canonical 2-decimal prices and monthly equivalents
//! - **Scheduling**: Next billing dates with calendar-month arithmetic
//! - **Ledger**: Append-only payment history with human-readable invoice ids
//! - **Projections**: Display-ready subscription views tolerant of an
//!   unmigrated schema
//! - **Invariants**: Runnable consistency checks over the billing tables

pub mod clock;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod plans;
pub mod pricing;
pub mod projection;
pub mod schedule;
pub mod subscriptions;

#[cfg(test)]
mod edge_case_tests;

// Clock
pub use clock::{Clock, FixedClock, FixedTxnIds, RandomTxnIds, SystemClock, TxnIdGenerator};

// Error
pub use error::{is_schema_not_ready, BillingError, BillingResult};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Ledger
pub use ledger::{BillingSummary, LedgerEntry, PaymentHistoryService, CURRENCY, PLATFORM_SCOPE};

// Plans
pub use plans::{normalize_features, Plan, PlanCatalog};

// Projection
pub use projection::{
    AdminSubscriptionRow, ProjectionService, SubscriptionFilter, SubscriptionView,
    TenantSubscriptions,
};

// Subscriptions
pub use subscriptions::{
    classify_transition, resolve_tenant_plan_label, CancellationResult, SubscribeRequest,
    SubscriptionScope, SubscriptionService, TransitionKind, TransitionPlan, TransitionSummary,
};

use sqlx::PgPool;

/// Migrations for the billing tables, run by the API server at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub subscriptions: SubscriptionService,
    pub plans: PlanCatalog,
    pub projection: ProjectionService,
    pub history: PaymentHistoryService,
    pub invariants: InvariantChecker,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            subscriptions: SubscriptionService::new(pool.clone()),
            plans: PlanCatalog::new(pool.clone()),
            projection: ProjectionService::new(pool.clone()),
            history: PaymentHistoryService::new(pool.clone()),
            invariants: InvariantChecker::new(pool),
        }
    }
}
