//! Standard-deviation based outlier classification
//!
//! A lap is an outlier when it deviates from its population's mean by at least
//! one population standard deviation:
//!
//! ```text
//! outlier  <=>  |lap_time - mean| >= std_dev
//! ```
//!
//! Populations with fewer than two laps (or with identical lap times) have a
//! standard deviation of zero; every lap of such a population is an inlier.
//!
//! Laps dropped by a [`LapFilter`] are not removed from a series. They become
//! `None` so that x-axis positions stay aligned across series (see
//! [`OutlierClassifier::filter`]).

use std::{collections::HashMap, hash::Hash};

use karting_stats::descriptive::Dispersion;
use serde::{Deserialize, Serialize};

use crate::record::LapRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum LapClass {
    Inlier,
    Outlier,
}

/// Which laps a chart shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapFilter {
    /// Every lap
    #[default]
    All,
    /// Inliers only; outliers become gaps
    Normal,
    /// Outliers only; inliers become gaps
    Outliers,
}

impl LapFilter {
    #[must_use]
    pub fn keeps(self, class: LapClass) -> bool {
        match self {
            LapFilter::All => true,
            LapFilter::Normal => class.is_inlier(),
            LapFilter::Outliers => class.is_outlier(),
        }
    }
}

/// Which laps form the population an individual lap is compared against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierScope {
    /// Each group (driver, kart, day) is its own population
    #[default]
    PerGroup,
    /// All laps of the dataset form one population
    Dataset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierClassifier {
    mean: f64,
    std_dev: f64,
}

impl OutlierClassifier {
    /// Builds a classifier from the mean and population standard deviation of `lap_times`.
    pub fn from_population<I>(lap_times: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        match Dispersion::new(lap_times) {
            Some(dispersion) => Self {
                mean: dispersion.mean,
                std_dev: dispersion.std_dev,
            },
            None => Self {
                mean: 0.0,
                std_dev: 0.0,
            },
        }
    }

    /// Builds a classifier from precomputed statistics.
    #[must_use]
    pub fn with_stats(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// `true` when the population cannot flag outliers (size <= 1 or zero spread).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.std_dev.is_nan() || self.std_dev <= 0.0
    }

    #[must_use]
    pub fn classify(&self, lap_time: f64) -> LapClass {
        if !self.is_degenerate() && (lap_time - self.mean).abs() >= self.std_dev {
            LapClass::Outlier
        } else {
            LapClass::Inlier
        }
    }

    /// The lap time as a chart value: `None` when `filter` drops the lap.
    #[must_use]
    pub fn filter(&self, lap_time: f64, filter: LapFilter) -> Option<f64> {
        filter
            .keeps(self.classify(lap_time))
            .then_some(lap_time)
    }
}

/// Classifies every record, aligned with `records`.
///
/// With [`OutlierScope::PerGroup`], `group_key` decides which records share a
/// population.
pub fn classify_records<F, K>(
    records: &[LapRecord],
    scope: OutlierScope,
    group_key: F,
) -> Vec<LapClass>
where
    F: Fn(&LapRecord) -> K,
    K: Eq + Hash,
{
    match scope {
        OutlierScope::Dataset => {
            let classifier = OutlierClassifier::from_population(records.iter().map(LapRecord::lap_time));
            records
                .iter()
                .map(|record| classifier.classify(record.lap_time()))
                .collect()
        }
        OutlierScope::PerGroup => {
            let mut populations = HashMap::<K, Vec<f64>>::new();
            for record in records {
                populations
                    .entry(group_key(record))
                    .or_default()
                    .push(record.lap_time());
            }
            let classifiers = populations
                .into_iter()
                .map(|(key, lap_times)| (key, OutlierClassifier::from_population(lap_times)))
                .collect::<HashMap<_, _>>();
            records
                .iter()
                .map(|record| classifiers[&group_key(record)].classify(record.lap_time()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_outlier() {
        let classifier = OutlierClassifier::with_stats(60.0, 2.0);
        assert_eq!(classifier.classify(58.0), LapClass::Outlier);
        assert_eq!(classifier.classify(60.0), LapClass::Inlier);
        assert_eq!(classifier.classify(63.0), LapClass::Outlier);
        assert_eq!(classifier.classify(61.9), LapClass::Inlier);
    }

    #[test]
    fn test_filtered_laps_become_gaps() {
        let classifier = OutlierClassifier::with_stats(60.0, 2.0);
        let apply = |filter| {
            [58.0, 60.0, 63.0]
                .into_iter()
                .map(|t| classifier.filter(t, filter))
                .collect::<Vec<_>>()
        };
        assert_eq!(apply(LapFilter::All), vec![Some(58.0), Some(60.0), Some(63.0)]);
        assert_eq!(apply(LapFilter::Normal), vec![None, Some(60.0), None]);
        assert_eq!(apply(LapFilter::Outliers), vec![Some(58.0), None, Some(63.0)]);
    }

    #[test]
    fn test_lap_filter_serde() {
        let filter: LapFilter = serde_json::from_str(r#""outliers""#).unwrap();
        assert_eq!(filter, LapFilter::Outliers);
        assert_eq!(serde_json::to_string(&LapFilter::Normal).unwrap(), r#""normal""#);
        assert_eq!(LapFilter::default(), LapFilter::All);
    }

    #[test]
    fn test_degenerate_populations_have_no_outliers() {
        let empty = OutlierClassifier::from_population([]);
        assert_eq!(empty.std_dev(), 0.0);
        assert!(empty.is_degenerate());

        let single = OutlierClassifier::from_population([75.0]);
        assert_eq!(single.std_dev(), 0.0);
        assert!(single.classify(75.0).is_inlier());

        let flat = OutlierClassifier::from_population([60.0, 60.0, 60.0]);
        assert!(flat.classify(60.0).is_inlier());
    }

    #[test]
    fn test_population_statistics() {
        let classifier = OutlierClassifier::from_population([58.0, 62.0]);
        assert_eq!(classifier.mean(), 60.0);
        assert_eq!(classifier.std_dev(), 2.0);
    }

    #[test]
    fn test_classify_per_group_and_dataset() {
        let records = vec![
            LapRecord::new("A", 1, 60.0).unwrap(),
            LapRecord::new("A", 2, 60.2).unwrap(),
            LapRecord::new("A", 3, 60.1).unwrap(),
            LapRecord::new("A", 4, 70.0).unwrap(),
            LapRecord::new("B", 1, 80.0).unwrap(),
        ];

        let per_driver = classify_records(&records, OutlierScope::PerGroup, |r| r.driver().clone());
        assert_eq!(
            per_driver,
            vec![
                LapClass::Inlier,
                LapClass::Inlier,
                LapClass::Inlier,
                LapClass::Outlier,
                LapClass::Inlier,
            ]
        );

        let dataset = classify_records(&records, OutlierScope::Dataset, |r| r.driver().clone());
        assert_eq!(dataset[4], LapClass::Outlier);
        assert_eq!(dataset.len(), records.len());
    }
}
