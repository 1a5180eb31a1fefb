// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Billing Engine
//!
//! Tests critical boundary conditions in:
//! - Price normalization and the monthly-equivalent law
//! - Billing schedule calendar arithmetic
//! - Transition classification and scope resolution
//! - Tenant plan label derivation
//! - Transaction id generation

mod pricing_tests {
    use crate::pricing::{canonical_price, monthly_equivalent, price_or_zero};
    use loanpilot_shared::BillingCycle;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // =========================================================================
    // The midpoint rounds away from zero, not to even
    // =========================================================================
    #[test]
    fn test_midpoint_rounds_up_not_bankers() {
        assert_eq!(canonical_price(dec!(0.125)), dec!(0.13));
        assert_eq!(canonical_price(dec!(0.135)), dec!(0.14));
        assert_eq!(canonical_price(dec!(2.675)), dec!(2.68));
    }

    // =========================================================================
    // High-precision nominal prices collapse to exactly 2 decimals
    // =========================================================================
    #[test]
    fn test_high_precision_input() {
        assert_eq!(canonical_price(dec!(999.995)), dec!(1000.00));
        assert_eq!(canonical_price(dec!(1234.56789)), dec!(1234.57));
        assert_eq!(canonical_price(dec!(0.0049)), dec!(0.00));
    }

    // =========================================================================
    // Already-canonical prices pass through unchanged
    // =========================================================================
    #[test]
    fn test_canonical_input_is_stable() {
        for price in [dec!(0), dec!(0.01), dec!(999.99), dec!(1000.00)] {
            assert_eq!(canonical_price(price), price);
        }
    }

    // =========================================================================
    // Missing price degrades to zero instead of failing the transaction
    // =========================================================================
    #[test]
    fn test_missing_price_is_zero() {
        assert_eq!(canonical_price(price_or_zero(None)), Decimal::ZERO);
    }

    // =========================================================================
    // Monthly-equivalent law: yearly/12, quarterly/3, else identity
    // =========================================================================
    #[test]
    fn test_monthly_equivalent_law() {
        let cases = [
            (dec!(11988.00), BillingCycle::Yearly, dec!(999.00)),
            (dec!(10000.00), BillingCycle::Yearly, dec!(833.33)),
            (dec!(0.01), BillingCycle::Yearly, dec!(0.00)),
            (dec!(2997.00), BillingCycle::Quarterly, dec!(999.00)),
            (dec!(1000.00), BillingCycle::Quarterly, dec!(333.33)),
            (dec!(999.995), BillingCycle::Monthly, dec!(1000.00)),
            (dec!(500.00), BillingCycle::OneTime, dec!(500.00)),
        ];

        for (price, cycle, expected) in cases {
            assert_eq!(
                monthly_equivalent(canonical_price(price), cycle),
                expected,
                "price {price} cycle {cycle:?}"
            );
        }
    }

    // =========================================================================
    // The "Starter Monthly" scenario: 999.995 monthly
    // =========================================================================
    #[test]
    fn test_starter_monthly_scenario() {
        let price = canonical_price(dec!(999.995));
        assert_eq!(price, dec!(1000.00));
        assert_eq!(monthly_equivalent(price, BillingCycle::Monthly), dec!(1000.00));
    }
}

mod schedule_tests {
    use crate::schedule::{add_months, next_billing_date};
    use loanpilot_shared::BillingCycle;
    use time::macros::datetime;

    // =========================================================================
    // Quarterly across a year boundary with a clamped day
    // =========================================================================
    #[test]
    fn test_quarterly_nov_30_lands_on_feb_28() {
        assert_eq!(
            next_billing_date(datetime!(2025-11-30 00:00 UTC), BillingCycle::Quarterly),
            Some(datetime!(2026-02-28 00:00 UTC))
        );
    }

    // =========================================================================
    // Every month-end anchor stays a valid date twelve iterations out
    // =========================================================================
    #[test]
    fn test_repeated_monthly_advance_is_always_valid() {
        let mut anchor = datetime!(2025-01-31 09:00 UTC);
        for _ in 0..12 {
            anchor = add_months(anchor, 1);
            assert!(anchor.day() <= 31);
        }
        // Once clamped to a short month, the day does not grow back
        assert_eq!(anchor, datetime!(2026-01-28 09:00 UTC));
    }

    // =========================================================================
    // Yearly from Feb 29 clamps into the non-leap year
    // =========================================================================
    #[test]
    fn test_yearly_from_leap_day() {
        assert_eq!(
            next_billing_date(datetime!(2024-02-29 00:00 UTC), BillingCycle::Yearly),
            Some(datetime!(2025-02-28 00:00 UTC))
        );
    }

    // =========================================================================
    // one_time never schedules a renewal
    // =========================================================================
    #[test]
    fn test_one_time_never_schedules() {
        for anchor in [
            datetime!(2025-01-01 00:00 UTC),
            datetime!(2025-12-31 23:59 UTC),
        ] {
            assert_eq!(next_billing_date(anchor, BillingCycle::OneTime), None);
        }
    }
}

mod transition_tests {
    use crate::subscriptions::{classify_transition, SubscriptionScope, TransitionKind};
    use crate::error::BillingError;
    use loanpilot_shared::ProductKey;

    // =========================================================================
    // Only a currently-active record makes a purchase an upgrade
    // =========================================================================
    #[test]
    fn test_upgrade_requires_active_record() {
        assert_eq!(classify_transition(Some("active")), TransitionKind::Upgrade);
        assert_eq!(classify_transition(Some("ACTIVE")), TransitionKind::Upgrade);

        for status in ["cancelled", "expired", "pending", "paused", ""] {
            assert_eq!(
                classify_transition(Some(status)),
                TransitionKind::Subscription,
                "status {status:?}"
            );
        }
        assert_eq!(classify_transition(None), TransitionKind::Subscription);
    }

    // =========================================================================
    // Scope tags: sentinel and whitespace variants are tenant-wide
    // =========================================================================
    #[test]
    fn test_platform_sentinel_variants() {
        for tag in [None, Some("platform"), Some("PLATFORM"), Some(" platform "), Some(""), Some("   ")] {
            assert_eq!(
                SubscriptionScope::resolve(9, tag).unwrap(),
                SubscriptionScope::TenantWide,
                "tag {tag:?}"
            );
        }
    }

    // =========================================================================
    // Product tags map to their closed variants, unknown tags are rejected
    // =========================================================================
    #[test]
    fn test_product_scope_tags() {
        assert_eq!(
            SubscriptionScope::resolve(9, Some("money_loan")).unwrap(),
            SubscriptionScope::ProductAddOn(ProductKey::MoneyLoan)
        );
        assert_eq!(
            SubscriptionScope::resolve(9, Some(" Pawnshop ")).unwrap(),
            SubscriptionScope::ProductAddOn(ProductKey::Pawnshop)
        );

        let err = SubscriptionScope::resolve(9, Some("crypto")).unwrap_err();
        match err {
            BillingError::UnknownProductScope { plan_id, scope } => {
                assert_eq!(plan_id, 9);
                assert_eq!(scope, "crypto");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

mod label_tests {
    use crate::subscriptions::{resolve_tenant_plan_label, SubscriptionScope};
    use loanpilot_shared::ProductKey;

    // =========================================================================
    // Substring matching is case-insensitive and ordered
    // =========================================================================
    #[test]
    fn test_label_substring_precedence() {
        let wide = SubscriptionScope::TenantWide;

        // "Professional" contains "pro"
        assert_eq!(resolve_tenant_plan_label(wide, "Professional Plus"), "professional");
        // "enterprise" beats "pro" when both appear
        assert_eq!(resolve_tenant_plan_label(wide, "Pro Enterprise Bundle"), "enterprise");
        // "pro" beats "starter" when both appear
        assert_eq!(resolve_tenant_plan_label(wide, "Pro Starter"), "professional");
        assert_eq!(resolve_tenant_plan_label(wide, "BASIC"), "starter");
        assert_eq!(resolve_tenant_plan_label(wide, ""), "custom");
    }

    // =========================================================================
    // Product scope forces "custom" regardless of name
    // =========================================================================
    #[test]
    fn test_product_scope_is_always_custom() {
        for product in ProductKey::ALL {
            assert_eq!(
                resolve_tenant_plan_label(
                    SubscriptionScope::ProductAddOn(product),
                    "Enterprise Starter Pro"
                ),
                "custom"
            );
        }
    }
}

mod ledger_tests {
    use crate::clock::{FixedTxnIds, TxnIdGenerator};
    use crate::ledger::{format_transaction_id, transition_description, PLATFORM_SCOPE};
    use crate::subscriptions::TransitionKind;
    use loanpilot_shared::BillingCycle;
    use time::macros::date;

    // =========================================================================
    // Id format: INV-<YYYYMMDD>-<6 uppercase alphanumerics>
    // =========================================================================
    #[test]
    fn test_transaction_id_shape() {
        let ids = FixedTxnIds("7KQ2ZD".to_string());
        let id = format_transaction_id(date!(2025 - 02 - 09), &ids.suffix());
        assert_eq!(id, "INV-20250209-7KQ2ZD");

        let (prefix, rest) = id.split_at(4);
        assert_eq!(prefix, "INV-");
        let (datepart, suffix) = rest.split_at(8);
        assert!(datepart.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&suffix[..1], "-");
        assert_eq!(suffix.len(), 7);
    }

    // =========================================================================
    // Description verbs follow the transition kind
    // =========================================================================
    #[test]
    fn test_description_verbs() {
        assert_eq!(
            transition_description(TransitionKind::Subscription, "BNPL Add-on", BillingCycle::Quarterly),
            "Subscribed to BNPL Add-on (quarterly)"
        );
        assert_eq!(
            transition_description(TransitionKind::Upgrade, "Pro", BillingCycle::OneTime),
            "Upgraded to Pro (one_time)"
        );
    }

    #[test]
    fn test_platform_sentinel_value() {
        assert_eq!(PLATFORM_SCOPE, "platform");
    }
}

mod feature_parsing_tests {
    use crate::plans::normalize_features;
    use serde_json::json;

    // =========================================================================
    // Doubly-encoded and malformed feature payloads never fail the read
    // =========================================================================
    #[test]
    fn test_malformed_feature_payloads() {
        let cases = [
            json!(null),
            json!(true),
            json!(3.5),
            json!({"features": ["x"]}),
            json!("{\"not\": \"an array\"}"),
            json!("[unterminated"),
            json!("\"just a string\""),
        ];

        for value in cases {
            assert!(
                normalize_features(Some(value.clone())).is_empty(),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_empty_array_round_trips() {
        assert!(normalize_features(Some(json!([]))).is_empty());
        assert!(normalize_features(Some(json!("[]"))).is_empty());
    }
}
