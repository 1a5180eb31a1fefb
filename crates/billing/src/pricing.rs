//! Pricing normalization
//!
//! Converts a plan's nominal price and billing cycle into the canonical
//! 2-decimal price and its monthly equivalent. Pure functions; unparsable
//! prices degrade to zero instead of failing the transaction.

use loanpilot_shared::BillingCycle;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round a nominal price to the canonical 2-decimal form using half-up
/// (midpoint away from zero) rounding.
pub fn canonical_price(nominal: Decimal) -> Decimal {
    nominal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decode a price read from storage, degrading to zero when the column is
/// NULL or holds something a decimal cannot represent.
pub fn price_or_zero(raw: Option<Decimal>) -> Decimal {
    raw.unwrap_or(Decimal::ZERO)
}

/// Monthly-equivalent price for a canonical price under a billing cycle.
///
/// yearly divides by 12, quarterly by 3; monthly and one_time pass through.
/// Every result is rounded half-up to 2 decimals.
pub fn monthly_equivalent(canonical: Decimal, cycle: BillingCycle) -> Decimal {
    let monthly = match cycle {
        BillingCycle::Yearly => canonical / Decimal::from(12),
        BillingCycle::Quarterly => canonical / Decimal::from(3),
        BillingCycle::Monthly | BillingCycle::OneTime => canonical,
    };
    monthly.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
