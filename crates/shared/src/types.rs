//! Core billing domain types

use serde::{Deserialize, Serialize};

/// A sellable product on the platform.
///
/// Product add-on subscriptions are keyed by (tenant, product); the set is
/// closed and matches the per-product enablement flags on the tenant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKey {
    MoneyLoan,
    Bnpl,
    Pawnshop,
}

impl ProductKey {
    /// All products, in the order the tenant flags are stored.
    pub const ALL: [ProductKey; 3] = [ProductKey::MoneyLoan, ProductKey::Bnpl, ProductKey::Pawnshop];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKey::MoneyLoan => "money_loan",
            ProductKey::Bnpl => "bnpl",
            ProductKey::Pawnshop => "pawnshop",
        }
    }

    /// Parse a stored product key. Whitespace and case are tolerated because
    /// older rows were written from free-text admin forms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "money_loan" => Some(ProductKey::MoneyLoan),
            "bnpl" => Some(ProductKey::Bnpl),
            "pawnshop" => Some(ProductKey::Pawnshop),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence period of a plan's price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
    OneTime,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::OneTime => "one_time",
        }
    }

    /// Parse a stored cycle, falling back to monthly for anything unknown.
    pub fn parse_or_monthly(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quarterly" => BillingCycle::Quarterly,
            "yearly" => BillingCycle::Yearly,
            "one_time" => BillingCycle::OneTime,
            _ => BillingCycle::Monthly,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    Pending,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a stored status string counts as active.
///
/// Status columns are text; comparison is case-insensitive so rows written by
/// older tooling ("Active", "ACTIVE") classify the same way.
pub fn is_active_status(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("active")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_key_round_trip() {
        for key in ProductKey::ALL {
            assert_eq!(ProductKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(ProductKey::parse(" BNPL "), Some(ProductKey::Bnpl));
        assert_eq!(ProductKey::parse("platform"), None);
        assert_eq!(ProductKey::parse(""), None);
    }

    #[test]
    fn billing_cycle_defaults_to_monthly() {
        assert_eq!(BillingCycle::parse_or_monthly("yearly"), BillingCycle::Yearly);
        assert_eq!(BillingCycle::parse_or_monthly("one_time"), BillingCycle::OneTime);
        assert_eq!(BillingCycle::parse_or_monthly("weekly"), BillingCycle::Monthly);
        assert_eq!(BillingCycle::parse_or_monthly(""), BillingCycle::Monthly);
    }

    #[test]
    fn active_status_is_case_insensitive() {
        assert!(is_active_status("active"));
        assert!(is_active_status("Active"));
        assert!(is_active_status(" ACTIVE "));
        assert!(!is_active_status("cancelled"));
        assert!(!is_active_status(""));
    }
}
