//! Chart builders
//!
//! Each builder turns normalized lap records into renderer-agnostic
//! [`ChartData`]. Builders never fail: an empty input produces an empty chart.

use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{GroupKey, SeriesAggregator, group_records},
    color::ColorRange,
    outlier::{LapClass, LapFilter, OutlierScope, classify_records},
    record::LapRecord,
    series::{ChartData, DistributionSummary, Point, Series, XValue},
};

pub const ALL_LAP_TIMES_LABEL: &str = "All Lap Times";
pub const ALL_LAPS_LABEL: &str = "All Laps";
pub const NORMAL_LAPS_LABEL: &str = "Normal Laps";
pub const MEAN_LAP_TIME_LABEL: &str = "Mean Lap Time";

/// Options shared by every chart builder
///
/// Missing fields take their defaults when deserializing:
///
/// ```
/// use karting_telemetry::chart::ChartConfig;
///
/// use karting_telemetry::outlier::LapFilter;
///
/// let config: ChartConfig = serde_json::from_str(r#"{"lap_filter": "normal"}"#).unwrap();
/// assert_eq!(config.lap_filter, LapFilter::Normal);
/// assert_eq!(config.color_range.color_start(), 0.2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub color_range: ColorRange,
    /// Laps the filter drops are emitted as gaps
    pub lap_filter: LapFilter,
    pub outlier_scope: OutlierScope,
}

/// Lap time per lap position: one line per driver plus the `Average` line.
#[must_use]
pub fn lap_time_chart(records: &[LapRecord], config: &ChartConfig) -> ChartData {
    SeriesAggregator::new(config).by_lap_index(records)
}

/// One bar group per driver, one bar per lap index (`Lap 1`, `Lap 2`, ...).
///
/// Bar `Lap i` of a driver is the driver's lap with `lap_in_heat == i`, or a
/// gap when that lap is missing or filtered.
#[must_use]
pub fn lap_bar_chart(records: &[LapRecord], config: &ChartConfig) -> ChartData {
    let aggregator = SeriesAggregator::new(config);
    let groups = group_records(records, GroupKey::Driver);
    if groups.is_empty() {
        return ChartData::default();
    }

    let visible = aggregator.lap_index_slots(records, &groups);
    let max_laps = visible.iter().map(Vec::len).max().unwrap_or(0);
    let x_labels = groups.iter().map(|group| group.id.x_value()).collect::<Vec<_>>();
    let colors = aggregator.assigner().colors(max_laps);

    let series = colors
        .into_iter()
        .enumerate()
        .map(|(i, color)| {
            let points = x_labels
                .iter()
                .zip(&visible)
                .map(|(x, lap_times)| Point::new(x.clone(), lap_times.get(i).copied().flatten()))
                .collect();
            Series::new(format!("Lap {}", i + 1), points).with_color(color)
        })
        .collect();

    ChartData { x_labels, series }
}

/// Every lap in input order as a single scatter series, colored per driver.
#[must_use]
pub fn all_laps_plot(records: &[LapRecord], config: &ChartConfig) -> ChartData {
    if records.is_empty() {
        return ChartData::default();
    }

    let aggregator = SeriesAggregator::new(config);
    let classes = classify_records(records, config.outlier_scope, |record| {
        record.driver().clone()
    });
    let colors = aggregator
        .assigner()
        .assign(records.iter().map(|record| record.driver().clone()));

    let points = records
        .iter()
        .zip(&classes)
        .enumerate()
        .map(|(i, (record, class))| {
            let y = config.lap_filter.keeps(*class).then_some(record.lap_time());
            Point::new(i, y)
        })
        .collect();
    let mut series = Series::new(ALL_LAP_TIMES_LABEL, points);
    series.point_colors = records
        .iter()
        .filter_map(|record| colors.get(record.driver()))
        .collect();

    ChartData {
        x_labels: (0..records.len()).map(XValue::Index).collect(),
        series: vec![series],
    }
}

/// Lap-time distributions of all laps and of inlier laps only.
///
/// Each series carries its quartile summary. `Normal Laps` keeps its place
/// (with no points and no summary) when every lap is an outlier.
#[must_use]
pub fn violin_chart(records: &[LapRecord], config: &ChartConfig) -> ChartData {
    if records.is_empty() {
        return ChartData::default();
    }

    let classes = classify_records(records, config.outlier_scope, |record| {
        record.driver().clone()
    });
    let all = records.iter().map(LapRecord::lap_time).collect::<Vec<_>>();
    let normal = all
        .iter()
        .zip(&classes)
        .filter(|(_, class)| **class == LapClass::Inlier)
        .map(|(lap_time, _)| *lap_time)
        .collect::<Vec<_>>();
    log::debug!(
        "violin chart: {} laps, {} outliers",
        all.len(),
        all.len() - normal.len()
    );

    let colors = SeriesAggregator::new(config).assigner().colors(2);
    let series = [ALL_LAPS_LABEL, NORMAL_LAPS_LABEL]
        .into_iter()
        .zip([all, normal])
        .zip(colors)
        .map(|((label, lap_times), color)| {
            let points = lap_times
                .iter()
                .map(|&lap_time| Point::new(label.to_owned(), Some(lap_time)))
                .collect();
            let mut series = Series::new(label, points).with_color(color);
            series.summary = DistributionSummary::from_values(&lap_times);
            series
        })
        .collect();

    ChartData {
        x_labels: vec![
            XValue::Label(ALL_LAPS_LABEL.to_owned()),
            XValue::Label(NORMAL_LAPS_LABEL.to_owned()),
        ],
        series,
    }
}

/// Daily `Median`, `Average` and `Minimum` lap time.
#[must_use]
pub fn timeline_chart(records: &[LapRecord], config: &ChartConfig) -> ChartData {
    SeriesAggregator::new(config).by_day(records)
}

/// Mean visible lap time per group, one bar per group.
#[must_use]
pub fn mean_bar_chart(records: &[LapRecord], config: &ChartConfig, key: GroupKey) -> ChartData {
    let aggregator = SeriesAggregator::new(config);
    let groups = group_records(records, key);
    let visible = aggregator.visible_lap_times(records, &groups);

    let points = groups
        .iter()
        .zip(visible)
        .filter_map(|(group, lap_times)| {
            let lap_times = lap_times.into_iter().flatten().collect::<Vec<_>>();
            let summary = DistributionSummary::from_values(&lap_times)?;
            Some(Point::new(group.id.x_value(), Some(summary.mean)))
        })
        .collect::<Vec<_>>();
    if points.is_empty() {
        return ChartData::default();
    }

    let x_labels = points.iter().map(|point| point.x.clone()).collect();
    let mut series = Series::new(MEAN_LAP_TIME_LABEL, points);
    series.point_colors = aggregator.assigner().colors(series.points.len());
    ChartData {
        x_labels,
        series: vec![series],
    }
}
