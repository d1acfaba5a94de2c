//! Time-tiered refund policy calculator.
//!
//! A pure mapping from (paid amount, slot start time, now) to the refund
//! the caller is entitled to. Deterministic, no side effects.

use chrono::{DateTime, Utc};

use crate::value_objects::Money;

/// Cancellations at least this many hours out refund 100%.
pub const FULL_REFUND_HOURS: i64 = 168;

/// Cancellations at least this many hours out refund 80%.
pub const MAJOR_REFUND_HOURS: i64 = 72;

/// Cancellations at least this many hours out refund 50%; below, nothing.
pub const HALF_REFUND_HOURS: i64 = 24;

/// Returns the whole-hour difference between the slot start and `now`.
///
/// Truncates toward zero, so 167 hours and 59 minutes counts as 167.
/// Negative once the slot has started.
pub fn hours_until(slot_start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (slot_start - now).num_hours()
}

/// Returns the refund percentage for a cancellation `hours_until_start`
/// whole hours before the slot begins.
///
/// Each boundary is inclusive at the lower edge of the higher tier: exactly
/// 168 hours refunds 100%, exactly 72 refunds 80%, exactly 24 refunds 50%.
pub fn refund_percent(hours_until_start: i64) -> u8 {
    if hours_until_start >= FULL_REFUND_HOURS {
        100
    } else if hours_until_start >= MAJOR_REFUND_HOURS {
        80
    } else if hours_until_start >= HALF_REFUND_HOURS {
        50
    } else {
        0
    }
}

/// Computes the refund a cancellation at `now` is entitled to.
pub fn refund_amount(total: Money, slot_start: DateTime<Utc>, now: DateTime<Utc>) -> Money {
    total.percent(refund_percent(hours_until(slot_start, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn amount_with_hours(hours: i64) -> Money {
        let now = Utc::now();
        refund_amount(Money::from_cents(100_000), now + Duration::hours(hours), now)
    }

    #[test]
    fn test_full_refund_a_week_out() {
        assert_eq!(amount_with_hours(200), Money::from_cents(100_000));
    }

    #[test]
    fn test_eighty_percent_between_three_and_seven_days() {
        assert_eq!(amount_with_hours(100), Money::from_cents(80_000));
    }

    #[test]
    fn test_half_refund_between_one_and_three_days() {
        assert_eq!(amount_with_hours(48), Money::from_cents(50_000));
    }

    #[test]
    fn test_no_refund_inside_a_day() {
        assert_eq!(amount_with_hours(10), Money::zero());
        assert_eq!(amount_with_hours(0), Money::zero());
    }

    #[test]
    fn test_boundaries_belong_to_the_higher_tier() {
        assert_eq!(amount_with_hours(168), Money::from_cents(100_000));
        assert_eq!(amount_with_hours(72), Money::from_cents(80_000));
        assert_eq!(amount_with_hours(24), Money::from_cents(50_000));
    }

    #[test]
    fn test_just_under_a_boundary_drops_a_tier() {
        let now = Utc::now();
        let start = now + Duration::hours(168) - Duration::minutes(1);
        // 167 whole hours: the 80% tier
        assert_eq!(
            refund_amount(Money::from_cents(100_000), start, now),
            Money::from_cents(80_000)
        );
    }

    #[test]
    fn test_slot_already_started_refunds_nothing() {
        assert_eq!(amount_with_hours(-5), Money::zero());
    }

    #[test]
    fn test_hours_until_truncates_toward_zero() {
        let now = Utc::now();
        assert_eq!(hours_until(now + Duration::minutes(90), now), 1);
        assert_eq!(hours_until(now + Duration::minutes(59), now), 0);
    }

    #[test]
    fn test_zero_amount_refunds_zero_in_every_tier() {
        for hours in [200, 100, 48, 10] {
            let now = Utc::now();
            assert_eq!(
                refund_amount(Money::zero(), now + Duration::hours(hours), now),
                Money::zero()
            );
        }
    }
}
