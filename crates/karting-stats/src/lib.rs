//! Statistical utilities for lap-time analysis.
//!
//! This crate provides the small set of statistics every lap-time chart is built on:
//!
//! - **Descriptive statistics**: Calculate count, mean, median, variance, standard deviation, min and max
//! - **Percentiles**: Nearest-rank percentiles, medians and quartiles
//!
//! All variances and standard deviations are *population* measures (divided by `n`,
//! not `n - 1`), so every caller classifying laps against them agrees on the same
//! threshold.
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile and median computation
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use karting_stats::descriptive::DescriptiveStats;
//!
//! let lap_times = [60.0, 62.0, 61.0];
//! let stats = DescriptiveStats::new(lap_times).unwrap();
//! assert_eq!(stats.mean, 61.0);
//! assert_eq!(stats.min, 60.0);
//! ```
//!
//! ## Computing mean and dispersion without sorting
//!
//! ```
//! use karting_stats::descriptive::Dispersion;
//!
//! let dispersion = Dispersion::new([58.0, 62.0]).unwrap();
//! assert_eq!(dispersion.mean, 60.0);
//! assert_eq!(dispersion.std_dev, 2.0);
//! ```
//!
//! ## Computing quartiles
//!
//! ```
//! use karting_stats::percentiles::Quartiles;
//!
//! let quartiles = Quartiles::new(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(quartiles.median, 3.0);
//! assert_eq!(quartiles.p25, 2.0);
//! ```

pub mod descriptive;
pub mod percentiles;
