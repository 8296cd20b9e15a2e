use crate::percentiles;

/// Mean and population dispersion of a dataset.
///
/// Unlike [`DescriptiveStats`], this does not need sorted input, so it is the
/// cheap choice when only the mean and standard deviation are needed
/// (e.g. outlier classification).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispersion {
    /// Number of values in the dataset.
    pub count: usize,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f64,
    /// The population variance of the dataset.
    pub variance: f64,
    /// The population standard deviation of the dataset.
    pub std_dev: f64,
}

impl Dispersion {
    /// Computes the mean and population standard deviation of `values`.
    ///
    /// # Returns
    ///
    /// * `Some(Dispersion)` - if the dataset contains at least one value
    /// * `None` - if the dataset is empty
    ///
    /// A single value always has a variance and standard deviation of zero.
    ///
    /// # Examples
    ///
    /// ```
    /// # use karting_stats::descriptive::Dispersion;
    /// let dispersion = Dispersion::new([60.0]).unwrap();
    /// assert_eq!(dispersion.count, 1);
    /// assert_eq!(dispersion.std_dev, 0.0);
    ///
    /// assert!(Dispersion::new([]).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = if count == 1 {
            0.0
        } else {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
        };

        Some(Self {
            count,
            mean,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

/// Descriptive statistics summarizing a dataset.
///
/// This structure contains common measures of central tendency, dispersion,
/// and spread for a dataset of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    /// Number of values in the dataset.
    pub count: usize,
    /// The minimum value in the dataset.
    pub min: f64,
    /// The maximum value in the dataset.
    pub max: f64,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f64,
    /// The median value of the dataset.
    ///
    /// For an even number of values this is the average of the two middle values.
    pub median: f64,
    /// The population variance of the dataset.
    pub variance: f64,
    /// The population standard deviation of the dataset.
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// This method will sort the values internally before computing statistics.
    ///
    /// # Arguments
    ///
    /// * `values` - An iterator over `f64` values. The values will be collected and sorted internally.
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the dataset contains at least one value
    /// * `None` - if the dataset is empty
    ///
    /// # Examples
    ///
    /// ```
    /// # use karting_stats::descriptive::DescriptiveStats;
    /// let values = [62.0, 58.0, 60.0, 61.0];
    /// let stats = DescriptiveStats::new(values).unwrap();
    /// assert_eq!(stats.min, 58.0);
    /// assert_eq!(stats.max, 62.0);
    /// assert_eq!(stats.mean, 60.25);
    /// assert_eq!(stats.median, 60.5);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted values.
    ///
    /// This is an optimized version that skips the sorting step.
    /// Use this when you already have sorted data to avoid unnecessary work.
    ///
    /// # Arguments
    ///
    /// * `sorted_values` - Values sorted in ascending order
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the dataset contains at least one value
    /// * `None` - if the dataset is empty
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        debug_assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let median = percentiles::compute_median(sorted_values)?;
        let Dispersion {
            count,
            mean,
            variance,
            std_dev,
        } = Dispersion::new(sorted_values.iter().copied())?;

        Some(Self {
            count,
            min,
            max,
            mean,
            median,
            variance,
            std_dev,
        })
    }
}
