use chrono::{Duration, NaiveDate, NaiveTime};

use common::{Error, Result, SalesResult};

/// Averages for one observation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Mean of `sales` over the samples dated inside the window.
    pub avg_sales: f64,
    /// Mean Unix timestamp of every calendar day in the window — the
    /// uniform midpoint, independent of which days were actually sampled.
    pub avg_date: f64,
}

fn day_unix(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Average sales and date over the window `[start, end]`.
///
/// Both ends are inclusive, so adjacent windows share their boundary day
/// and a sample on that day counts in both. Returns `None` when the window
/// holds no samples.
pub fn window_average(
    samples: &[SalesResult],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<WindowStats> {
    let mut sales_sum = 0.0;
    let mut sample_count: u32 = 0;
    for sample in samples {
        if sample.date >= start && sample.date <= end {
            sales_sum += sample.sales as f64;
            sample_count += 1;
        }
    }
    if sample_count == 0 {
        return None;
    }

    // The date average runs over every calendar day of the window, sampled
    // or not, which lands on the window's uniform midpoint.
    let mut date_sum: i64 = 0;
    let mut day_count: i64 = 0;
    let mut day = start;
    while day <= end {
        date_sum += day_unix(day);
        day_count += 1;
        day += Duration::days(1);
    }
    if day_count == 0 {
        return None;
    }

    Some(WindowStats {
        avg_sales: sales_sum / f64::from(sample_count),
        avg_date: date_sum as f64 / day_count as f64,
    })
}

/// Linearly extrapolate the sales estimate at `at_unix` from two window
/// averages.
///
/// Collapsed windows (equal midpoints) would be a division by zero; that
/// case is reported as `InsufficientHistory`, never as NaN or infinity.
pub fn extrapolate(prev: WindowStats, curr: WindowStats, at_unix: i64) -> Result<f64> {
    let elapsed = curr.avg_date - prev.avg_date;
    if elapsed == 0.0 {
        return Err(Error::InsufficientHistory);
    }
    let slope = (curr.avg_sales - prev.avg_sales) / elapsed;
    Ok(slope * (at_unix as f64 - prev.avg_date) + prev.avg_sales)
}

/// Trend estimate for the pair of adjacent windows ending at `anchor`:
/// previous `[anchor - 2p, anchor - p]`, current `[anchor - p, anchor]`,
/// extrapolated to the midnight timestamp of `today`.
///
/// A window without samples yields `InsufficientHistory`.
pub fn estimate_trend(
    samples: &[SalesResult],
    anchor: NaiveDate,
    period_days: u32,
    today: NaiveDate,
) -> Result<f64> {
    let period = Duration::days(i64::from(period_days));
    let prev = window_average(samples, anchor - period - period, anchor - period)
        .ok_or(Error::InsufficientHistory)?;
    let curr =
        window_average(samples, anchor - period, anchor).ok_or(Error::InsufficientHistory)?;
    extrapolate(prev, curr, day_unix(today))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn result(date: NaiveDate, sales: i64) -> SalesResult {
        SalesResult {
            rule_id: 1,
            date,
            price: 10.0,
            sales,
        }
    }

    #[test]
    fn window_average_is_none_without_samples() {
        let samples = vec![result(day(1), 5)];
        assert!(window_average(&samples, day(10), day(12)).is_none());
    }

    #[test]
    fn window_midpoint_is_the_middle_day() {
        // Three-day window: the uniform date average is exactly the middle
        // day, whether or not every day was sampled.
        let samples = vec![result(day(6), 9), result(day(8), 11)];
        let stats = window_average(&samples, day(6), day(8)).unwrap();
        assert_eq!(stats.avg_date, day_unix(day(7)) as f64);
        assert!((stats.avg_sales - 10.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_day_counts_in_both_windows() {
        let samples = vec![result(day(8), 11)];
        assert!(window_average(&samples, day(6), day(8)).is_some());
        assert!(window_average(&samples, day(8), day(10)).is_some());
    }

    #[test]
    fn extrapolate_rejects_collapsed_windows() {
        let stats = WindowStats {
            avg_sales: 10.0,
            avg_date: 1_000.0,
        };
        let err = extrapolate(stats, stats, 2_000).unwrap_err();
        assert!(matches!(err, Error::InsufficientHistory));
    }

    #[test]
    fn estimate_trend_known_value() {
        // Daily sales 9..=13 over Jan 6..=10, period 2, anchored today.
        // Window averages: 10 at the Jan 7 midpoint, 12 at Jan 9. Slope of
        // 1/day extrapolated to Jan 10 gives 13.
        let samples: Vec<SalesResult> = (6..=10)
            .map(|d| result(day(d), 3 + i64::from(d)))
            .collect();
        let trend = estimate_trend(&samples, day(10), 2, day(10)).unwrap();
        assert!((trend - 13.0).abs() < 1e-9, "expected 13.0, got {trend}");
    }

    #[test]
    fn estimate_trend_is_flat_for_constant_sales() {
        let samples: Vec<SalesResult> = (1..=10).map(|d| result(day(d), 7)).collect();
        let trend = estimate_trend(&samples, day(10), 3, day(10)).unwrap();
        assert!((trend - 7.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_trend_fails_on_empty_previous_window() {
        // Samples only cover the current window.
        let samples: Vec<SalesResult> = (8..=10).map(|d| result(day(d), 5)).collect();
        let err = estimate_trend(&samples, day(10), 2, day(10)).unwrap_err();
        assert!(matches!(err, Error::InsufficientHistory));
    }

    #[test]
    fn estimate_trend_with_past_anchor_uses_shifted_windows() {
        // Anchored one period back, the current window ends at the anchor,
        // but the extrapolation target is still today.
        let samples: Vec<SalesResult> = (2..=10)
            .map(|d| result(day(d), i64::from(d)))
            .collect();
        let anchored = estimate_trend(&samples, day(8), 2, day(10)).unwrap();
        let current = estimate_trend(&samples, day(10), 2, day(10)).unwrap();
        // Linear history extrapolates to the same value from either anchor.
        assert!((anchored - current).abs() < 1e-9);
    }
}
