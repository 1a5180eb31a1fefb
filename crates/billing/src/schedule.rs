//! Billing schedule calculation
//!
//! Derives the next billing date from a billing cycle and an anchor instant.

use loanpilot_shared::BillingCycle;
use time::{Date, Month, OffsetDateTime};

/// Next billing date for a cycle anchored at `anchor`.
///
/// monthly advances one calendar month, quarterly three, yearly twelve;
/// one_time subscriptions have no next billing date.
pub fn next_billing_date(anchor: OffsetDateTime, cycle: BillingCycle) -> Option<OffsetDateTime> {
    match cycle {
        BillingCycle::Monthly => Some(add_months(anchor, 1)),
        BillingCycle::Quarterly => Some(add_months(anchor, 3)),
        BillingCycle::Yearly => Some(add_months(anchor, 12)),
        BillingCycle::OneTime => None,
    }
}

/// Advance `anchor` by whole calendar months, clamping the day-of-month to
/// the last valid day of the target month (Jan 31 + 1 month = Feb 28/29).
/// Time-of-day and offset are preserved.
pub fn add_months(anchor: OffsetDateTime, months: i32) -> OffsetDateTime {
    let zero_based = anchor.month() as i32 - 1 + months;
    let year = anchor.year() + zero_based.div_euclid(12);
    let month =
        Month::try_from((zero_based.rem_euclid(12) + 1) as u8).unwrap_or(anchor.month());

    let day = anchor.day().min(month.length(year));
    match Date::from_calendar_date(year, month, day) {
        Ok(date) => anchor.replace_date(date),
        // Unreachable after clamping; keep the anchor rather than panic.
        Err(_) => anchor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn monthly_advances_one_month() {
        let anchor = datetime!(2025-03-15 08:30 UTC);
        assert_eq!(
            next_billing_date(anchor, BillingCycle::Monthly),
            Some(datetime!(2025-04-15 08:30 UTC))
        );
    }

    #[test]
    fn quarterly_advances_three_months() {
        let anchor = datetime!(2025-11-10 00:00 UTC);
        assert_eq!(
            next_billing_date(anchor, BillingCycle::Quarterly),
            Some(datetime!(2026-02-10 00:00 UTC))
        );
    }

    #[test]
    fn yearly_advances_one_year() {
        let anchor = datetime!(2025-06-01 12:00 UTC);
        assert_eq!(
            next_billing_date(anchor, BillingCycle::Yearly),
            Some(datetime!(2026-06-01 12:00 UTC))
        );
    }

    #[test]
    fn one_time_has_no_next_date() {
        let anchor = datetime!(2025-06-01 12:00 UTC);
        assert_eq!(next_billing_date(anchor, BillingCycle::OneTime), None);
    }

    #[test]
    fn month_end_clamps_to_last_valid_day() {
        // Jan 31 + 1 month lands on the last day of February
        assert_eq!(
            add_months(datetime!(2025-01-31 10:00 UTC), 1),
            datetime!(2025-02-28 10:00 UTC)
        );
        assert_eq!(
            add_months(datetime!(2024-01-31 10:00 UTC), 1),
            datetime!(2024-02-29 10:00 UTC)
        );
        // Oct 31 + 1 month clamps to Nov 30
        assert_eq!(
            add_months(datetime!(2025-10-31 00:00 UTC), 1),
            datetime!(2025-11-30 00:00 UTC)
        );
    }

    #[test]
    fn leap_day_plus_year_clamps() {
        assert_eq!(
            add_months(datetime!(2024-02-29 00:00 UTC), 12),
            datetime!(2025-02-28 00:00 UTC)
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        assert_eq!(
            add_months(datetime!(2025-12-31 23:59 UTC), 1),
            datetime!(2026-01-31 23:59 UTC)
        );
    }
}
