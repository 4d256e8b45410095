//! Percentile over an ascending sequence of elapsed times

/// Cut points of the report's percentile table
pub const CUT_POINTS: [u32; 9] = [50, 66, 75, 80, 90, 95, 98, 99, 100];

/// Percentile `p` (a fraction in `0.0..=1.0`) of an ascending sequence.
///
/// `realIndex = round((n + 1) * p) - 1` with ties rounded to even. When the
/// index falls between two elements the value is interpolated and rounded
/// to two decimals, half away from zero. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    let last = *sorted.last()?;

    let real_index = ((n as f64 + 1.0) * p).round_ties_even() - 1.0;
    let rank_floor = real_index.floor();
    let frac = real_index - rank_floor;

    // n = 1 at low percentiles
    let rank = if rank_floor < 0.0 { 0 } else { rank_floor as usize };

    if rank >= n - 1 {
        Some(last)
    } else if frac == 0.0 {
        Some(sorted[rank])
    } else if rank + 1 < n {
        let interpolated = sorted[rank] + (sorted[rank + 1] - sorted[rank]) * frac;
        Some(round_half_away(interpolated, 2))
    } else {
        Some(sorted[rank])
    }
}

fn round_half_away(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_of_four_uses_ties_to_even() {
        // round(5 * 0.5) = round(2.5) = 2, index 1
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 0.5), Some(20.0));
    }

    #[test]
    fn test_hundredth_is_the_last_element() {
        let xs = [1.5, 2.0, 8.25, 9.0, 120.0];
        assert_eq!(percentile(&xs, 1.0), Some(120.0));

        let single = [42.0];
        for cut in CUT_POINTS {
            assert_eq!(percentile(&single, f64::from(cut) / 100.0), Some(42.0));
        }
    }

    #[test]
    fn test_table_over_ten_values() {
        let xs: Vec<f64> = (1..=10).map(|v| f64::from(v) * 10.0).collect();
        let table: Vec<f64> = CUT_POINTS
            .iter()
            .map(|cut| percentile(&xs, f64::from(*cut) / 100.0).unwrap())
            .collect();

        // 11 * 0.66 = 7.26 -> 7, index 6; 11 * 0.75 = 8.25 -> 8, index 7
        assert_eq!(
            table,
            vec![60.0, 70.0, 80.0, 90.0, 100.0, 100.0, 100.0, 100.0, 100.0]
        );
    }

    #[test]
    fn test_low_percentile_clamps_to_first() {
        assert_eq!(percentile(&[3.0, 4.0, 5.0], 0.1), Some(3.0));
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_half_away(2.125, 2), 2.13);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
    }
}
