//! Chart-ready output types
//!
//! Everything a renderer needs and nothing renderer-specific: labeled series of
//! `(x, y)` points, an x-axis label sequence, optional colors and optional
//! distribution summaries.
//!
//! A point with `y == None` is a gap (a hidden outlier or a missing lap) and
//! must never be drawn as zero.
//!
//! # Serialization
//!
//! ```json
//! {
//!   "x_labels": [1, 2],
//!   "series": [
//!     {
//!       "label": "Max",
//!       "color": "rgb(70, 107, 227)",
//!       "points": [{"x": 1, "y": 60.0}, {"x": 2, "y": null}]
//!     }
//!   ]
//! }
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use karting_stats::{descriptive::DescriptiveStats, percentiles::Quartiles};
use serde::Serialize;

use crate::color::Rgb;

/// Value on the x axis
#[derive(Debug, Clone, PartialEq, Serialize, derive_more::From)]
#[serde(untagged)]
pub enum XValue {
    /// 1-based lap position or 0-based running index
    Index(usize),
    /// Category label (driver, kart)
    Label(String),
    /// Calendar day
    Day(NaiveDate),
    Timestamp(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: XValue,
    pub y: Option<f64>,
}

impl Point {
    pub fn new(x: impl Into<XValue>, y: Option<f64>) -> Self {
        Self { x: x.into(), y }
    }
}

/// Summary of a lap-time distribution, attached to violin series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl DistributionSummary {
    /// Returns `None` for an empty population.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let stats = DescriptiveStats::from_sorted(&sorted)?;
        let quartiles = Quartiles::from_sorted(&sorted)?;
        Some(Self {
            count: stats.count,
            min: stats.min,
            p25: quartiles.p25,
            median: stats.median,
            p75: quartiles.p75,
            max: stats.max,
            mean: stats.mean,
            std_dev: stats.std_dev,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    /// Per-point colors, aligned with `points`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub point_colors: Vec<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DistributionSummary>,
}

impl Series {
    pub fn new(label: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            points,
            color: None,
            point_colors: vec![],
            summary: None,
        }
    }

    #[must_use]
    pub fn with_color(self, color: Rgb) -> Self {
        Self {
            color: Some(color),
            ..self
        }
    }

    /// The `y` values in point order.
    pub fn values(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.points.iter().map(|point| point.y)
    }
}

/// The output handed to a chart renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub x_labels: Vec<XValue>,
    pub series: Vec<Series>,
}

impl ChartData {
    /// `true` when there is nothing to draw ("no data").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|series| series.points.is_empty())
    }

    #[must_use]
    pub fn series(&self, label: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaps_serialize_as_null() {
        let series = Series::new("Max", vec![Point::new(1_usize, Some(60.0)), Point::new(2_usize, None)]);
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "label": "Max",
                "points": [{"x": 1, "y": 60.0}, {"x": 2, "y": null}]
            })
        );
    }

    #[test]
    fn test_day_serializes_as_iso_date() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let json = serde_json::to_value(XValue::from(day)).unwrap();
        assert_eq!(json, serde_json::json!("2024-01-02"));
    }

    #[test]
    fn test_distribution_summary() {
        assert!(DistributionSummary::from_values(&[]).is_none());

        let summary = DistributionSummary::from_values(&[62.0, 58.0, 60.0, 61.0]).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 58.0);
        assert_eq!(summary.median, 60.5);
        assert_eq!(summary.p25, 60.0);
        assert_eq!(summary.p75, 62.0);
        assert_eq!(summary.max, 62.0);
    }

    #[test]
    fn test_empty_chart() {
        assert!(ChartData::default().is_empty());
        let chart = ChartData {
            x_labels: vec![],
            series: vec![Series::new("Average", vec![])],
        };
        assert!(chart.is_empty());
    }
}
