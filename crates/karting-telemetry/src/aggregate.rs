//! Grouping of lap records and cross-group summary series
//!
//! Two aggregation modes feed most charts:
//!
//! - **By lap index** ([`SeriesAggregator::by_lap_index`]): one series per driver
//!   plus an `Average` series whose point at lap `i` is the mean of every
//!   driver's visible lap `i` (keyed by `lap_in_heat`). Drivers missing lap `i`,
//!   because they drove fewer laps or the lap was rejected, do not contribute,
//!   so ragged heats never divide by drivers that have no such lap.
//! - **By calendar day** ([`SeriesAggregator::by_day`]): `Median`, `Average` and
//!   `Minimum` lap time of every day, days in ascending order.
//!
//! Groups are emitted in first-seen order (days chronologically), laps inside a
//! group are stably ordered by date and lap index. Groups without any
//! contributing lap are never emitted, so no series ever contains `NaN`.

use std::collections::HashMap;

use chrono::NaiveDate;
use karting_stats::descriptive::{DescriptiveStats, Dispersion};
use serde::{Deserialize, Serialize};

use crate::{
    chart::ChartConfig,
    color::{ColorAssigner, ColorScale, Turbo},
    outlier::{LapFilter, OutlierClassifier, OutlierScope},
    record::{Identifier, LapRecord},
    series::{ChartData, Point, Series, XValue},
};

pub const AVERAGE_LABEL: &str = "Average";
pub const MEDIAN_LABEL: &str = "Median";
pub const MINIMUM_LABEL: &str = "Minimum";

/// What records are grouped by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    #[default]
    Driver,
    Kart,
    Day,
}

/// Value of a [`GroupKey`] for one group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GroupId {
    #[display("{_0}")]
    Driver(Identifier),
    #[display("{_0}")]
    Kart(Identifier),
    #[display("{_0}")]
    Day(NaiveDate),
}

impl GroupId {
    /// The x-axis value used when the group is a category.
    #[must_use]
    pub fn x_value(&self) -> XValue {
        match self {
            GroupId::Day(day) => XValue::Day(*day),
            GroupId::Driver(id) | GroupId::Kart(id) => XValue::Label(id.to_string()),
        }
    }
}

impl GroupKey {
    /// The group `record` belongs to; `None` when the record lacks the key.
    #[must_use]
    pub fn of(self, record: &LapRecord) -> Option<GroupId> {
        match self {
            GroupKey::Driver => Some(GroupId::Driver(record.driver().clone())),
            GroupKey::Kart => record.kart().cloned().map(GroupId::Kart),
            GroupKey::Day => record.day().map(GroupId::Day),
        }
    }
}

/// Laps sharing one [`GroupId`]
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub id: GroupId,
    pub laps: Vec<&'a LapRecord>,
}

impl Group<'_> {
    pub fn lap_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.laps.iter().map(|lap| lap.lap_time())
    }
}

/// Groups `records` by `key`.
///
/// Groups appear in first-seen order, except day groups which are sorted
/// chronologically. Records without a value for `key` are skipped.
#[must_use]
pub fn group_records(records: &[LapRecord], key: GroupKey) -> Vec<Group<'_>> {
    let mut index = HashMap::new();
    let mut groups: Vec<Group<'_>> = vec![];
    let mut skipped = 0_usize;
    for record in records {
        let Some(id) = key.of(record) else {
            skipped += 1;
            continue;
        };
        let position = *index.entry(id.clone()).or_insert_with(|| {
            groups.push(Group { id, laps: vec![] });
            groups.len() - 1
        });
        groups[position].laps.push(record);
    }
    if skipped > 0 {
        log::debug!("{skipped} records have no {key:?} and were not grouped");
    }

    for group in &mut groups {
        group
            .laps
            .sort_by_key(|lap| (lap.date(), lap.lap_in_heat()));
    }
    if key == GroupKey::Day {
        groups.sort_by(|a, b| a.id.cmp(&b.id));
    }
    groups
}

/// Builds summary series from lap records
#[derive(Debug, Clone)]
pub struct SeriesAggregator<S> {
    assigner: ColorAssigner<S>,
    lap_filter: LapFilter,
    outlier_scope: OutlierScope,
}

impl SeriesAggregator<Turbo> {
    #[must_use]
    pub fn new(config: &ChartConfig) -> Self {
        Self::with_scale(config, Turbo)
    }
}

impl<S> SeriesAggregator<S>
where
    S: ColorScale,
{
    pub fn with_scale(config: &ChartConfig, scale: S) -> Self {
        Self {
            assigner: ColorAssigner::new(scale, config.color_range),
            lap_filter: config.lap_filter,
            outlier_scope: config.outlier_scope,
        }
    }

    pub(crate) fn assigner(&self) -> &ColorAssigner<S> {
        &self.assigner
    }

    /// One classifier per group, aligned with `groups`.
    pub(crate) fn classifiers(
        &self,
        records: &[LapRecord],
        groups: &[Group<'_>],
    ) -> Vec<OutlierClassifier> {
        match self.outlier_scope {
            OutlierScope::Dataset => {
                let classifier =
                    OutlierClassifier::from_population(records.iter().map(LapRecord::lap_time));
                vec![classifier; groups.len()]
            }
            OutlierScope::PerGroup => groups
                .iter()
                .map(|group| OutlierClassifier::from_population(group.lap_times()))
                .collect(),
        }
    }

    /// Visible lap times of every group; filtered laps are `None`.
    pub(crate) fn visible_lap_times(
        &self,
        records: &[LapRecord],
        groups: &[Group<'_>],
    ) -> Vec<Vec<Option<f64>>> {
        let classifiers = self.classifiers(records, groups);
        groups
            .iter()
            .zip(classifiers)
            .map(|(group, classifier)| {
                group
                    .lap_times()
                    .map(|lap_time| classifier.filter(lap_time, self.lap_filter))
                    .collect()
            })
            .collect()
    }

    /// Visible lap times of every group indexed by `lap_in_heat - 1`.
    ///
    /// Laps the group never drove (or that were rejected) and filtered laps are
    /// `None`. When a lap index repeats inside a group, the first lap in group
    /// order wins.
    pub(crate) fn lap_index_slots(
        &self,
        records: &[LapRecord],
        groups: &[Group<'_>],
    ) -> Vec<Vec<Option<f64>>> {
        let visible = self.visible_lap_times(records, groups);
        groups
            .iter()
            .zip(visible)
            .map(|(group, lap_times)| {
                let max_lap = group.laps.iter().map(|lap| lap.lap_in_heat()).max();
                let mut slots = vec![None; max_lap.map_or(0, |lap| lap as usize)];
                let mut filled = vec![false; slots.len()];
                for (lap, lap_time) in group.laps.iter().zip(lap_times) {
                    let slot = lap.lap_in_heat() as usize - 1;
                    if filled[slot] {
                        log::debug!("{} drove lap {} more than once", group.id, lap.lap_in_heat());
                        continue;
                    }
                    filled[slot] = true;
                    slots[slot] = lap_time;
                }
                slots
            })
            .collect()
    }

    /// Per-driver lap series plus the cross-driver `Average` series.
    ///
    /// Points are keyed by `lap_in_heat`: a driver series has one point per lap
    /// index up to the driver's last lap, with `None` for missing or filtered
    /// laps. The `Average` point at lap `i` averages the visible laps `i` of the
    /// drivers that have one; lap indices without any contributor are omitted.
    #[must_use]
    pub fn by_lap_index(&self, records: &[LapRecord]) -> ChartData {
        let groups = group_records(records, GroupKey::Driver);
        if groups.is_empty() {
            return ChartData::default();
        }

        let visible = self.lap_index_slots(records, &groups);
        let colors = self.assigner.assign(groups.iter().map(|group| group.id.clone()));
        let max_laps = visible.iter().map(Vec::len).max().unwrap_or(0);

        let mut series = groups
            .iter()
            .zip(&visible)
            .map(|(group, lap_times)| {
                let points = lap_times
                    .iter()
                    .enumerate()
                    .map(|(i, &y)| Point::new(i + 1, y))
                    .collect();
                let mut series = Series::new(group.id.to_string(), points);
                series.color = colors.get(&group.id);
                series
            })
            .collect::<Vec<_>>();

        let average = (0..max_laps)
            .filter_map(|i| {
                let contributing = visible
                    .iter()
                    .filter_map(|lap_times| lap_times.get(i).copied().flatten());
                let dispersion = Dispersion::new(contributing)?;
                Some(Point::new(i + 1, Some(dispersion.mean)))
            })
            .collect();
        series.push(Series::new(AVERAGE_LABEL, average));

        log::debug!(
            "aggregated {} drivers over {max_laps} lap indices",
            groups.len()
        );
        ChartData {
            x_labels: (1..=max_laps).map(XValue::Index).collect(),
            series,
        }
    }

    /// `Median`, `Average` and `Minimum` lap time per calendar day.
    ///
    /// Records without a date do not contribute. Days whose laps are all
    /// filtered out are omitted from every series and from the labels.
    #[must_use]
    pub fn by_day(&self, records: &[LapRecord]) -> ChartData {
        let groups = group_records(records, GroupKey::Day);
        let visible = self.visible_lap_times(records, &groups);

        let mut x_labels = vec![];
        let mut medians = vec![];
        let mut averages = vec![];
        let mut minimums = vec![];
        for (group, lap_times) in groups.iter().zip(visible) {
            let Some(stats) = DescriptiveStats::new(lap_times.into_iter().flatten()) else {
                continue;
            };
            let x = group.id.x_value();
            medians.push(Point::new(x.clone(), Some(stats.median)));
            averages.push(Point::new(x.clone(), Some(stats.mean)));
            minimums.push(Point::new(x.clone(), Some(stats.min)));
            x_labels.push(x);
        }
        if x_labels.is_empty() {
            return ChartData::default();
        }

        let labels = [MEDIAN_LABEL, AVERAGE_LABEL, MINIMUM_LABEL];
        let colors = self.assigner.colors(labels.len());
        let series = labels
            .into_iter()
            .zip([medians, averages, minimums])
            .zip(colors)
            .map(|((label, points), color)| Series::new(label, points).with_color(color))
            .collect();

        ChartData { x_labels, series }
    }
}

#[cfg(test)]
mod tests {
    use crate::normalize::{LapRecordNormalizer, parse_date};

    use super::*;

    fn lap(driver: &str, lap_in_heat: u32, lap_time: f64) -> LapRecord {
        LapRecord::new(driver, lap_in_heat, lap_time).unwrap()
    }

    fn dated(driver: &str, date: &str, lap_time: f64) -> LapRecord {
        lap(driver, 1, lap_time).with_date(parse_date(date).unwrap())
    }

    fn values(series: &Series) -> Vec<Option<f64>> {
        series.values().collect()
    }

    #[test]
    fn test_ragged_lap_index_average() {
        let records = vec![lap("A", 1, 60.0), lap("A", 2, 61.0), lap("B", 1, 59.5)];
        let chart = SeriesAggregator::new(&ChartConfig::default()).by_lap_index(&records);

        assert_eq!(chart.x_labels, vec![XValue::Index(1), XValue::Index(2)]);
        assert_eq!(chart.series.len(), 3);
        let average = chart.series(AVERAGE_LABEL).unwrap();
        assert_eq!(values(average), vec![Some(59.75), Some(61.0)]);
        assert_eq!(values(chart.series("B").unwrap()), vec![Some(59.5)]);
    }

    #[test]
    fn test_lap_index_orders_laps_within_driver() {
        let records = vec![lap("A", 2, 61.0), lap("A", 1, 60.0)];
        let chart = SeriesAggregator::new(&ChartConfig::default()).by_lap_index(&records);
        assert_eq!(
            values(chart.series("A").unwrap()),
            vec![Some(60.0), Some(61.0)]
        );
    }

    #[test]
    fn test_hidden_outliers_keep_alignment_and_skip_average() {
        let records = vec![
            lap("A", 1, 60.0),
            lap("A", 2, 60.0),
            lap("A", 3, 60.0),
            lap("A", 4, 90.0),
            lap("B", 1, 62.0),
        ];
        let config = ChartConfig {
            lap_filter: LapFilter::Normal,
            ..ChartConfig::default()
        };
        let chart = SeriesAggregator::new(&config).by_lap_index(&records);

        let a = chart.series("A").unwrap();
        assert_eq!(a.points.len(), 4);
        assert_eq!(
            values(a),
            vec![Some(60.0), Some(60.0), Some(60.0), None]
        );
        let average = chart.series(AVERAGE_LABEL).unwrap();
        assert_eq!(
            values(average),
            vec![Some(61.0), Some(60.0), Some(60.0)]
        );
    }

    #[test]
    fn test_outlier_view_hides_inliers() {
        let records = vec![
            lap("A", 1, 60.0),
            lap("A", 2, 60.0),
            lap("A", 3, 60.0),
            lap("A", 4, 90.0),
        ];
        let config = ChartConfig {
            lap_filter: LapFilter::Outliers,
            ..ChartConfig::default()
        };
        let chart = SeriesAggregator::new(&config).by_lap_index(&records);
        assert_eq!(
            values(chart.series("A").unwrap()),
            vec![None, None, None, Some(90.0)]
        );
        let average = chart.series(AVERAGE_LABEL).unwrap();
        assert_eq!(average.points, vec![Point::new(4_usize, Some(90.0))]);
    }

    #[test]
    fn test_rejected_lap_leaves_gap_at_its_index() {
        let entries = [
            serde_json::json!({"driver_name": "A", "all_laps": [
                {"lap_in_heat": 1, "lap_time": 60.0},
                {"lap_in_heat": 2, "lap_time": "garbage"},
                {"lap_in_heat": 3, "lap_time": 70.0},
            ]}),
            serde_json::json!({"driver_name": "B", "all_laps": [
                {"lap_in_heat": 1, "lap_time": 60.0},
                {"lap_in_heat": 2, "lap_time": 50.0},
                {"lap_in_heat": 3, "lap_time": 70.0},
            ]}),
        ];
        let normalized = LapRecordNormalizer::new().normalize(&entries);
        assert_eq!(normalized.rejected.len(), 1);

        let chart = SeriesAggregator::new(&ChartConfig::default()).by_lap_index(&normalized.records);
        let a = chart.series("A").unwrap();
        assert_eq!(
            a.points,
            vec![
                Point::new(1_usize, Some(60.0)),
                Point::new(2_usize, None),
                Point::new(3_usize, Some(70.0)),
            ]
        );
        assert_eq!(
            values(chart.series(AVERAGE_LABEL).unwrap()),
            vec![Some(60.0), Some(50.0), Some(70.0)]
        );
        assert_eq!(chart.x_labels.len(), 3);
    }

    #[test]
    fn test_repeated_lap_index_keeps_first() {
        let records = vec![lap("A", 1, 60.0), lap("A", 1, 65.0)];
        let chart = SeriesAggregator::new(&ChartConfig::default()).by_lap_index(&records);
        assert_eq!(values(chart.series("A").unwrap()), vec![Some(60.0)]);
    }

    #[test]
    fn test_day_aggregation() {
        let records = vec![
            dated("A", "2024-01-02T10:00", 58.0),
            dated("A", "2024-01-01T10:00", 60.0),
            dated("B", "2024-01-01T18:30", 62.0),
        ];
        let chart = SeriesAggregator::new(&ChartConfig::default()).by_day(&records);

        let days = [
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        ];
        assert_eq!(chart.x_labels, days.map(XValue::Day).to_vec());
        assert_eq!(
            values(chart.series(MEDIAN_LABEL).unwrap()),
            vec![Some(61.0), Some(58.0)]
        );
        assert_eq!(
            values(chart.series(AVERAGE_LABEL).unwrap()),
            vec![Some(61.0), Some(58.0)]
        );
        assert_eq!(
            values(chart.series(MINIMUM_LABEL).unwrap()),
            vec![Some(60.0), Some(58.0)]
        );
    }

    #[test]
    fn test_undated_records_do_not_contribute_to_days() {
        let records = vec![lap("A", 1, 60.0), dated("A", "2024-03-01", 61.0)];
        let chart = SeriesAggregator::new(&ChartConfig::default()).by_day(&records);
        assert_eq!(chart.x_labels.len(), 1);
        assert_eq!(
            values(chart.series(MINIMUM_LABEL).unwrap()),
            vec![Some(61.0)]
        );
    }

    #[test]
    fn test_empty_input() {
        let aggregator = SeriesAggregator::new(&ChartConfig::default());
        assert_eq!(aggregator.by_lap_index(&[]), ChartData::default());
        assert_eq!(aggregator.by_day(&[]), ChartData::default());
        assert!(group_records(&[], GroupKey::Driver).is_empty());
    }

    #[test]
    fn test_group_order() {
        let records = vec![
            dated("B", "2024-01-02", 60.0),
            dated("A", "2024-01-01", 61.0),
            dated("B", "2024-01-01", 62.0),
        ];
        let drivers = group_records(&records, GroupKey::Driver)
            .into_iter()
            .map(|group| group.id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(drivers, vec!["B", "A"]);

        let days = group_records(&records, GroupKey::Day);
        assert_eq!(days[0].id.to_string(), "2024-01-01");
        assert_eq!(days[0].laps.len(), 2);
        // equal sort keys keep input order
        assert_eq!(days[0].laps[0].driver(), &Identifier::from("A"));

        assert!(group_records(&records, GroupKey::Kart).is_empty());
    }

    #[test]
    fn test_group_keeps_input_order_for_equal_date_and_lap() {
        let date = parse_date("2024-01-01T18:00").unwrap();
        let records = vec![
            lap("A", 2, 61.0).with_kart(7).with_date(date),
            lap("B", 1, 62.0).with_kart(7).with_date(date),
            lap("C", 1, 63.0).with_kart(7).with_date(date),
            lap("D", 1, 64.0).with_kart(7).with_date(date),
        ];
        let karts = group_records(&records, GroupKey::Kart);
        assert_eq!(karts.len(), 1);
        let lap_times = karts[0].lap_times().collect::<Vec<_>>();
        assert_eq!(lap_times, vec![62.0, 63.0, 64.0, 61.0]);
    }

    #[test]
    fn test_idempotent_output() {
        let records = vec![
            lap("C", 1, 60.3),
            lap("A", 1, 61.0),
            lap("B", 1, 59.1),
            lap("C", 2, 60.9),
        ];
        let aggregator = SeriesAggregator::new(&ChartConfig::default());
        let first = serde_json::to_string(&aggregator.by_lap_index(&records)).unwrap();
        let second = serde_json::to_string(&aggregator.by_lap_index(&records)).unwrap();
        assert_eq!(first, second);
    }
}
