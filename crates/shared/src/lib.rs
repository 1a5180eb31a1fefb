//! LoanPilot Shared Types
//!
//! Domain primitives used by both the billing engine and the API server:
//! product keys, billing cycles, subscription statuses, and database pool
//! construction.

pub mod db;
pub mod types;

pub use db::{create_migration_pool, create_pool};
pub use types::{is_active_status, BillingCycle, ProductKey, SubscriptionStatus};
