//! Kart lap-time telemetry: normalization, outlier classification and chart series.
//!
//! Raw lap-time JSON comes in several shapes (driver-grouped heats, nested lap
//! entries, flat lap entries, whole heat or kart-history documents). This crate
//! turns them into uniform [`LapRecord`](record::LapRecord)s and builds
//! renderer-agnostic [`ChartData`](series::ChartData) from them.
//!
//! # Pipeline
//!
//! 1. [`normalize`]: decode entries into lap records, reporting rejected entries
//! 2. [`outlier`]: classify laps against their population's mean and std-dev
//! 3. [`aggregate`]: group records and compute cross-group summary series
//! 4. [`color`]: assign well-separated colors to an ordered set of series
//! 5. [`chart`]: assemble the final chart data
//!
//! # Example
//!
//! ```
//! use karting_telemetry::{
//!     chart::{self, ChartConfig},
//!     normalize::LapRecordNormalizer,
//! };
//!
//! let entries = serde_json::json!([
//!     {"driver_name": "A", "all_laps": [{"lap_time": 60.0}, {"lap_time": 61.0}]},
//!     {"driver_name": "B", "all_laps": [{"lap_time": 59.5}]},
//! ]);
//! let normalized = LapRecordNormalizer::new().normalize(entries.as_array().unwrap());
//! assert!(normalized.rejected.is_empty());
//!
//! let chart = chart::lap_time_chart(&normalized.records, &ChartConfig::default());
//! let average = chart.series("Average").unwrap();
//! assert_eq!(average.values().collect::<Vec<_>>(), vec![Some(59.75), Some(61.0)]);
//! ```

pub mod aggregate;
pub mod chart;
pub mod color;
pub mod normalize;
pub mod outlier;
pub mod record;
pub mod series;
