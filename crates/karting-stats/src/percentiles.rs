//! Rank statistics over sorted lap times

/// Lower quartile, median and upper quartile of a population
///
/// The quartiles use the nearest-rank method ([`compute_percentile`]); the
/// median averages the two middle values of an even-sized population
/// ([`compute_median`]).
///
/// ```
/// use karting_stats::percentiles::Quartiles;
///
/// let quartiles = Quartiles::new(&[62.0, 58.0, 60.0, 61.0]).unwrap();
/// assert_eq!(quartiles.p25, 60.0);
/// assert_eq!(quartiles.median, 60.5);
/// assert_eq!(quartiles.p75, 62.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
}

impl Quartiles {
    /// Returns `None` for an empty population.
    #[must_use]
    pub fn new(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted)
    }

    /// Same as [`Quartiles::new`] for values already in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );
        Some(Self {
            median: compute_median(sorted_values)?,
            p25: compute_percentile(sorted_values, 25.0),
            p75: compute_percentile(sorted_values, 75.0),
        })
    }

    /// Distance between the upper and lower quartile.
    #[must_use]
    pub fn interquartile_range(&self) -> f64 {
        self.p75 - self.p25
    }
}

/// Nearest-rank percentile of sorted data.
///
/// The `k`-th percentile of `n` values is the value at index
/// `floor(n * k / 100)`, clamped to the last value. Empty input yields `NaN`.
///
/// ```
/// use karting_stats::percentiles::compute_percentile;
///
/// let lap_times = [58.0, 59.0, 60.0, 61.0, 75.0];
/// assert_eq!(compute_percentile(&lap_times, 50.0), 60.0);
/// assert_eq!(compute_percentile(&lap_times, 25.0), 59.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    let Some(last) = sorted_values.len().checked_sub(1) else {
        return f64::NAN;
    };
    let rank = (sorted_values.len() as f64 * percentile / 100.0) as usize;
    sorted_values[rank.min(last)]
}

/// Median of sorted data; `None` for empty input.
///
/// ```
/// use karting_stats::percentiles::compute_median;
///
/// assert_eq!(compute_median(&[60.0, 62.0]), Some(61.0));
/// assert_eq!(compute_median(&[58.0]), Some(58.0));
/// assert_eq!(compute_median(&[]), None);
/// ```
#[must_use]
pub fn compute_median(sorted_values: &[f64]) -> Option<f64> {
    let middle = sorted_values.len() / 2;
    match sorted_values.len() {
        0 => None,
        len if len % 2 == 0 => Some(f64::midpoint(
            sorted_values[middle - 1],
            sorted_values[middle],
        )),
        _ => Some(sorted_values[middle]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_of_empty_is_nan() {
        assert!(compute_percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_percentile_clamps_to_last() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(compute_percentile(&values, 100.0), 3.0);
        assert_eq!(compute_percentile(&values, 0.0), 1.0);
    }

    #[test]
    fn test_median_even_uses_both_middle_values() {
        assert_eq!(compute_median(&[1.0, 2.0, 3.0, 10.0]), Some(2.5));
    }

    #[test]
    fn test_quartiles() {
        assert_eq!(Quartiles::new(&[]), None);

        let single = Quartiles::new(&[61.5]).unwrap();
        assert_eq!(single.p25, 61.5);
        assert_eq!(single.p75, 61.5);
        assert_eq!(single.interquartile_range(), 0.0);

        let quartiles = Quartiles::new(&[60.0, 75.0, 59.0, 61.0, 58.0]).unwrap();
        assert_eq!(quartiles.p25, 59.0);
        assert_eq!(quartiles.median, 60.0);
        assert_eq!(quartiles.p75, 61.0);
        assert_eq!(quartiles.interquartile_range(), 2.0);
    }
}
