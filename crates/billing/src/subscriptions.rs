//! Subscription transitions
//!
//! The transition resolver decides which record a purchase touches (the
//! tenant-wide bundle or a per-product add-on) and whether it is a new
//! subscription or an upgrade; the writer then applies the whole transition
//! as one transaction: subscription upsert, tenant plan label, cascade
//! reactivation of enabled add-ons, and the ledger entry.

use std::sync::Arc;

use loanpilot_shared::{is_active_status, BillingCycle, ProductKey, SubscriptionStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::clock::{RandomTxnIds, SharedClock, SharedTxnIds, SystemClock};
use crate::error::{BillingError, BillingResult};
use crate::ledger::{self, NewLedgerEntry};
use crate::plans::{self, ActivePlan};
use crate::{pricing, schedule};

/// Which record a purchase targets, decided once by the resolver so the
/// writer branches on a closed type instead of re-deriving scope from the
/// plan's scope tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// The tenant's single bundle subscription.
    TenantWide,
    /// A per-product add-on, keyed by (tenant, product).
    ProductAddOn(ProductKey),
}

impl SubscriptionScope {
    /// Resolve a plan's scope tag. NULL, blank, and the `"platform"` sentinel
    /// all mean tenant-wide; anything else must be a known product key.
    pub fn resolve(plan_id: i64, product_type: Option<&str>) -> BillingResult<Self> {
        let tag = product_type.map(str::trim).unwrap_or("");
        if tag.is_empty() || tag.eq_ignore_ascii_case(ledger::PLATFORM_SCOPE) {
            return Ok(SubscriptionScope::TenantWide);
        }
        ProductKey::parse(tag)
            .map(SubscriptionScope::ProductAddOn)
            .ok_or_else(|| BillingError::UnknownProductScope {
                plan_id,
                scope: tag.to_string(),
            })
    }

    pub fn product_key(&self) -> Option<ProductKey> {
        match self {
            SubscriptionScope::TenantWide => None,
            SubscriptionScope::ProductAddOn(key) => Some(*key),
        }
    }
}

/// Classification of a purchase against the existing record in its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// First purchase, reactivation from a non-active state, or plan switch
    /// from an inactive state.
    Subscription,
    /// Replaces a currently active subscription in the same scope.
    Upgrade,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Subscription => "subscription",
            TransitionKind::Upgrade => "upgrade",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upgrade iff a record exists in the target scope and is currently active.
pub fn classify_transition(existing_status: Option<&str>) -> TransitionKind {
    match existing_status {
        Some(status) if is_active_status(status) => TransitionKind::Upgrade,
        _ => TransitionKind::Subscription,
    }
}

/// Tenant plan label derived from the purchased plan.
///
/// Product-scoped plans always map to "custom"; tenant-wide plans map by
/// case-insensitive substring of the plan name, first match wins in the
/// order enterprise, pro, starter/basic.
pub fn resolve_tenant_plan_label(scope: SubscriptionScope, plan_name: &str) -> &'static str {
    if matches!(scope, SubscriptionScope::ProductAddOn(_)) {
        return "custom";
    }

    let normalized = plan_name.to_lowercase();
    if normalized.contains("enterprise") {
        "enterprise"
    } else if normalized.contains("pro") {
        "professional"
    } else if normalized.contains("starter") || normalized.contains("basic") {
        "starter"
    } else {
        "custom"
    }
}

/// Inbound purchase request.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub plan_id: i64,
    /// Overrides the plan's own cycle when supplied.
    pub billing_cycle: Option<BillingCycle>,
    /// Free-text provider label recorded in the ledger.
    pub payment_method: Option<String>,
}

/// The resolved write plan for one transition.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub scope: SubscriptionScope,
    pub kind: TransitionKind,
    pub price: Decimal,
    pub monthly_price: Decimal,
    pub billing_cycle: BillingCycle,
    /// Tenant-wide scope only; product add-ons carry no next billing date.
    pub next_billing_date: Option<OffsetDateTime>,
}

/// Outcome reported to the caller after a committed transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSummary {
    pub plan_id: i64,
    pub plan_name: String,
    pub product_type: Option<ProductKey>,
    pub billing_cycle: BillingCycle,
    pub amount: Decimal,
    pub transaction_id: String,
    pub next_billing_date: Option<OffsetDateTime>,
    pub transition: TransitionKind,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResult {
    pub id: i64,
    pub status: String,
    pub cancelled_at: Option<OffsetDateTime>,
}

/// Per-product enablement flags on the tenant row.
#[derive(Debug, sqlx::FromRow)]
struct TenantFlags {
    money_loan_enabled: bool,
    bnpl_enabled: bool,
    pawnshop_enabled: bool,
}

impl TenantFlags {
    fn enabled_products(&self) -> Vec<ProductKey> {
        let mut products = Vec::new();
        if self.money_loan_enabled {
            products.push(ProductKey::MoneyLoan);
        }
        if self.bnpl_enabled {
            products.push(ProductKey::Bnpl);
        }
        if self.pawnshop_enabled {
            products.push(ProductKey::Pawnshop);
        }
        products
    }
}

/// Service for applying subscription transitions.
pub struct SubscriptionService {
    pool: PgPool,
    clock: SharedClock,
    txn_ids: SharedTxnIds,
}

impl SubscriptionService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            txn_ids: Arc::new(RandomTxnIds),
        }
    }

    /// Construct with explicit time/id providers (tests, replays).
    pub fn with_providers(pool: PgPool, clock: SharedClock, txn_ids: SharedTxnIds) -> Self {
        Self { pool, clock, txn_ids }
    }

    /// Apply a purchase as one all-or-nothing transition.
    ///
    /// Resolves the plan, classifies the transition, upserts the scoped
    /// subscription record, keeps the tenant's plan label and enabled
    /// add-ons consistent, and appends the ledger entry, all inside a
    /// single transaction. The tenant row is locked first so concurrent
    /// transitions on the same tenant serialize.
    pub async fn create_or_update_subscription(
        &self,
        tenant_id: i64,
        acting_user_id: Option<i64>,
        request: SubscribeRequest,
    ) -> BillingResult<TransitionSummary> {
        let mut tx = self.pool.begin().await?;

        let flags: Option<TenantFlags> = sqlx::query_as(
            r#"
            SELECT money_loan_enabled, bnpl_enabled, pawnshop_enabled
            FROM tenants
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let flags = flags.ok_or(BillingError::TenantNotFound(tenant_id))?;

        let plan = plans::fetch_active_plan(&mut tx, request.plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound(request.plan_id))?;

        let now = self.clock.now();
        let transition = self
            .resolve_transition(&mut tx, tenant_id, &plan, &request, now)
            .await?;

        match transition.scope {
            SubscriptionScope::ProductAddOn(product) => {
                self.upsert_product_subscription(&mut tx, tenant_id, product, &plan, &transition, now)
                    .await?;
            }
            SubscriptionScope::TenantWide => {
                self.upsert_tenant_subscription(&mut tx, tenant_id, &plan, &transition, now)
                    .await?;

                sqlx::query("UPDATE tenants SET plan = $1, updated_at = $2 WHERE id = $3")
                    .bind(resolve_tenant_plan_label(transition.scope, &plan.name))
                    .bind(now)
                    .bind(tenant_id)
                    .execute(&mut *tx)
                    .await?;

                self.reactivate_enabled_products(&mut tx, tenant_id, &flags, now)
                    .await?;
            }
        }

        let transaction_id = ledger::format_transaction_id(now.date(), &self.txn_ids.suffix());
        let description =
            ledger::transition_description(transition.kind, &plan.name, transition.billing_cycle);

        ledger::append_entry(
            &mut tx,
            NewLedgerEntry {
                tenant_id,
                transaction_id: &transaction_id,
                amount: transition.price,
                provider: request.payment_method.as_deref(),
                processed_at: now,
                user_id: acting_user_id,
                plan_id: plan.id,
                kind: transition.kind,
                plan_name: &plan.name,
                product_type: transition.scope.product_key(),
                description,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            plan_id = %plan.id,
            transaction_id = %transaction_id,
            transition = %transition.kind,
            amount = %transition.price,
            "Applied subscription transition"
        );

        Ok(TransitionSummary {
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            product_type: transition.scope.product_key(),
            billing_cycle: transition.billing_cycle,
            amount: transition.price,
            transaction_id,
            next_billing_date: transition.next_billing_date,
            transition: transition.kind,
        })
    }

    /// Resolve scope, transition kind, pricing, and schedule for a purchase.
    ///
    /// Locks the existing record in the target scope so the classification
    /// and the subsequent upsert are serialized against concurrent writers.
    async fn resolve_transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        plan: &ActivePlan,
        request: &SubscribeRequest,
        now: OffsetDateTime,
    ) -> BillingResult<TransitionPlan> {
        let scope = SubscriptionScope::resolve(plan.id, plan.product_type.as_deref())?;

        let price = pricing::canonical_price(pricing::price_or_zero(plan.price));
        let billing_cycle = request.billing_cycle.unwrap_or_else(|| {
            plan.billing_cycle
                .as_deref()
                .map(BillingCycle::parse_or_monthly)
                .unwrap_or_default()
        });
        let monthly_price = pricing::monthly_equivalent(price, billing_cycle);

        let existing_status: Option<String> = match scope {
            SubscriptionScope::ProductAddOn(product) => {
                sqlx::query_scalar(
                    r#"
                    SELECT status FROM product_subscriptions
                    WHERE tenant_id = $1 AND product_key = $2
                    FOR UPDATE
                    "#,
                )
                .bind(tenant_id)
                .bind(product.as_str())
                .fetch_optional(&mut **tx)
                .await?
            }
            SubscriptionScope::TenantWide => {
                sqlx::query_scalar(
                    "SELECT status FROM tenant_subscriptions WHERE tenant_id = $1 FOR UPDATE",
                )
                .bind(tenant_id)
                .fetch_optional(&mut **tx)
                .await?
            }
        };

        let kind = classify_transition(existing_status.as_deref());

        let next_billing_date = match scope {
            SubscriptionScope::TenantWide => schedule::next_billing_date(now, billing_cycle),
            SubscriptionScope::ProductAddOn(_) => None,
        };

        Ok(TransitionPlan {
            scope,
            kind,
            price,
            monthly_price,
            billing_cycle,
            next_billing_date,
        })
    }

    async fn upsert_product_subscription(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        product: ProductKey,
        plan: &ActivePlan,
        transition: &TransitionPlan,
        now: OffsetDateTime,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_subscriptions
                (tenant_id, product_key, plan_id, status, price, billing_cycle,
                 started_at, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $7, $7)
            ON CONFLICT (tenant_id, product_key) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                price = EXCLUDED.price,
                billing_cycle = EXCLUDED.billing_cycle,
                started_at = EXCLUDED.started_at,
                expires_at = NULL,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(product.as_str())
        .bind(plan.id)
        .bind(SubscriptionStatus::Active.as_str())
        .bind(transition.price)
        .bind(transition.billing_cycle.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn upsert_tenant_subscription(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        plan: &ActivePlan,
        transition: &TransitionPlan,
        now: OffsetDateTime,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_subscriptions
                (tenant_id, plan_id, status, price, monthly_price, billing_cycle,
                 started_at, next_billing_date, expires_at, cancelled_at,
                 cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, NULL, NULL, $7, $7)
            ON CONFLICT (tenant_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                price = EXCLUDED.price,
                monthly_price = EXCLUDED.monthly_price,
                billing_cycle = EXCLUDED.billing_cycle,
                started_at = EXCLUDED.started_at,
                next_billing_date = EXCLUDED.next_billing_date,
                expires_at = NULL,
                cancelled_at = NULL,
                cancellation_reason = NULL,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(plan.id)
        .bind(SubscriptionStatus::Active.as_str())
        .bind(transition.price)
        .bind(transition.monthly_price)
        .bind(transition.billing_cycle.as_str())
        .bind(now)
        .bind(transition.next_billing_date)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Reactivate existing add-on rows for every product the tenant has
    /// enabled. Missing rows are not created and price/plan are untouched.
    async fn reactivate_enabled_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        flags: &TenantFlags,
        now: OffsetDateTime,
    ) -> BillingResult<()> {
        for product in flags.enabled_products() {
            let reactivated = sqlx::query(
                r#"
                UPDATE product_subscriptions
                SET status = $1, expires_at = NULL, updated_at = $2
                WHERE tenant_id = $3 AND product_key = $4
                "#,
            )
            .bind(SubscriptionStatus::Active.as_str())
            .bind(now)
            .bind(tenant_id)
            .bind(product.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if reactivated > 0 {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    product = %product,
                    "Reactivated product add-on subscription"
                );
            }
        }

        Ok(())
    }

    /// Cancel a tenant-wide subscription by row id.
    ///
    /// Idempotent: cancelling an already-cancelled subscription changes
    /// nothing and reports the current state.
    pub async fn cancel_subscription(
        &self,
        subscription_id: i64,
        reason: Option<&str>,
    ) -> BillingResult<CancellationResult> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64, String)> = sqlx::query_as(
            "SELECT id, status FROM tenant_subscriptions WHERE id = $1 FOR UPDATE",
        )
        .bind(subscription_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (id, status) = existing.ok_or(BillingError::SubscriptionNotFound(subscription_id))?;

        if status.eq_ignore_ascii_case(SubscriptionStatus::Cancelled.as_str()) {
            tx.commit().await?;
            return Ok(CancellationResult {
                id,
                status,
                cancelled_at: None,
            });
        }

        let now = self.clock.now();

        sqlx::query(
            r#"
            UPDATE tenant_subscriptions
            SET status = $1, cancelled_at = $2, cancellation_reason = $3, updated_at = $2
            WHERE id = $4
            "#,
        )
        .bind(SubscriptionStatus::Cancelled.as_str())
        .bind(now)
        .bind(reason)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(subscription_id = %id, "Cancelled tenant subscription");

        Ok(CancellationResult {
            id,
            status: SubscriptionStatus::Cancelled.as_str().to_string(),
            cancelled_at: Some(now),
        })
    }

    /// Cancel a product add-on subscription for (tenant, product).
    pub async fn cancel_product_subscription(
        &self,
        tenant_id: i64,
        product: ProductKey,
    ) -> BillingResult<CancellationResult> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM product_subscriptions
            WHERE tenant_id = $1 AND product_key = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(product.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let id = existing.ok_or_else(|| BillingError::ProductSubscriptionNotFound {
            tenant_id,
            product: product.to_string(),
        })?;

        let now = self.clock.now();

        sqlx::query(
            r#"
            UPDATE product_subscriptions
            SET status = $1, expires_at = $2, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(SubscriptionStatus::Cancelled.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            product = %product,
            "Cancelled product add-on subscription"
        );

        Ok(CancellationResult {
            id,
            status: SubscriptionStatus::Cancelled.as_str().to_string(),
            cancelled_at: Some(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_requires_an_active_existing_record() {
        assert_eq!(classify_transition(None), TransitionKind::Subscription);
        assert_eq!(classify_transition(Some("active")), TransitionKind::Upgrade);
        assert_eq!(classify_transition(Some("Active")), TransitionKind::Upgrade);
        assert_eq!(classify_transition(Some("cancelled")), TransitionKind::Subscription);
        assert_eq!(classify_transition(Some("expired")), TransitionKind::Subscription);
        assert_eq!(classify_transition(Some("pending")), TransitionKind::Subscription);
        assert_eq!(classify_transition(Some("")), TransitionKind::Subscription);
    }

    #[test]
    fn scope_resolution() {
        assert_eq!(
            SubscriptionScope::resolve(1, None).ok(),
            Some(SubscriptionScope::TenantWide)
        );
        assert_eq!(
            SubscriptionScope::resolve(1, Some("platform")).ok(),
            Some(SubscriptionScope::TenantWide)
        );
        assert_eq!(
            SubscriptionScope::resolve(1, Some("  ")).ok(),
            Some(SubscriptionScope::TenantWide)
        );
        assert_eq!(
            SubscriptionScope::resolve(1, Some("bnpl")).ok(),
            Some(SubscriptionScope::ProductAddOn(ProductKey::Bnpl))
        );
        assert!(matches!(
            SubscriptionScope::resolve(1, Some("insurance")),
            Err(BillingError::UnknownProductScope { .. })
        ));
    }

    #[test]
    fn plan_label_mapping() {
        let wide = SubscriptionScope::TenantWide;
        assert_eq!(resolve_tenant_plan_label(wide, "Enterprise Yearly"), "enterprise");
        assert_eq!(resolve_tenant_plan_label(wide, "Pro Monthly"), "professional");
        assert_eq!(resolve_tenant_plan_label(wide, "PRO ANNUAL"), "professional");
        assert_eq!(resolve_tenant_plan_label(wide, "Starter"), "starter");
        assert_eq!(resolve_tenant_plan_label(wide, "Basic Bundle"), "starter");
        assert_eq!(resolve_tenant_plan_label(wide, "Something Else"), "custom");
        // First match wins in enterprise > pro > starter order
        assert_eq!(resolve_tenant_plan_label(wide, "Enterprise Pro"), "enterprise");
        // Product-scoped plans always label the tenant as custom
        assert_eq!(
            resolve_tenant_plan_label(
                SubscriptionScope::ProductAddOn(ProductKey::Bnpl),
                "Enterprise"
            ),
            "custom"
        );
    }
}
