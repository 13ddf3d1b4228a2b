//! Prorated refund arithmetic.

use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[allow(clippy::cast_precision_loss)]
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / MILLIS_PER_DAY).ceil()
}

/// Refund owed for the unused part of a rental window.
///
/// Both the rental length and the days used are rounded up to whole days, so a
/// partially used day counts as used. The result is floored to two decimals.
///
/// A zero-length rental divides by zero and yields `NaN`; callers that move
/// money must reject non-finite amounts.
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use emart::payment::calculate_prorated_refund;
///
/// let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
/// let refund = calculate_prorated_refund(
///     start,
///     start + Duration::days(10),
///     1000.0,
///     start + Duration::days(4),
/// );
/// assert_eq!(refund, 600.0);
/// ```
#[must_use]
pub fn calculate_prorated_refund(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    total_paid: f64,
    return_date: DateTime<Utc>,
) -> f64 {
    let total_days = days_between(start, end);
    let used_days = days_between(start, return_date);
    let remaining_days = (total_days - used_days).max(0.0);

    let refund = total_paid * remaining_days / total_days;
    (refund * 100.0).floor() / 100.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    #[test]
    fn test_return_on_day_four_of_ten() {
        let s = start();
        let refund = calculate_prorated_refund(s, s + Duration::days(10), 1000.0, s + Duration::days(4));
        assert_eq!(refund, 600.0);
    }

    #[test]
    fn test_partial_day_counts_as_used() {
        let s = start();
        let refund = calculate_prorated_refund(
            s,
            s + Duration::days(10),
            1000.0,
            s + Duration::days(3) + Duration::hours(1),
        );
        assert_eq!(refund, 600.0);
    }

    #[test]
    fn test_return_before_start_refunds_everything() {
        let s = start();
        let refund = calculate_prorated_refund(s, s + Duration::days(5), 250.0, s);
        assert_eq!(refund, 250.0);
    }

    #[test]
    fn test_no_refund_once_window_is_used_up() {
        let s = start();
        let end = s + Duration::days(7);
        assert_eq!(calculate_prorated_refund(s, end, 70.0, end), 0.0);
        assert_eq!(
            calculate_prorated_refund(s, end, 70.0, end + Duration::days(3)),
            0.0
        );
    }

    #[test]
    fn test_refund_is_floored_to_cents() {
        let s = start();
        // 100 * 2 / 3 = 66.666...
        let refund = calculate_prorated_refund(s, s + Duration::days(3), 100.0, s + Duration::days(1));
        assert_eq!(refund, 66.66);
    }

    #[test]
    fn test_refund_never_increases_with_usage() {
        let s = start();
        let end = s + Duration::days(14);
        let mut previous = f64::INFINITY;
        for hours in (0..=20 * 24).step_by(5) {
            let refund = calculate_prorated_refund(s, end, 420.0, s + Duration::hours(hours));
            assert!(refund <= previous, "refund rose at hour {hours}");
            assert!(refund >= 0.0);
            previous = refund;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn test_zero_length_rental_is_not_finite() {
        let s = start();
        let refund = calculate_prorated_refund(s, s, 100.0, s);
        assert!(!refund.is_finite());
    }
}
