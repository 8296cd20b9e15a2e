use std::path::PathBuf;

use karting_telemetry::{
    aggregate::GroupKey,
    chart,
    normalize::{LapRecordNormalizer, SortKey},
    outlier::LapFilter,
};

use crate::util::{self, Output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ChartKind {
    /// Lap time per lap position, one line per driver plus the average
    LapTime,
    /// Lap times grouped by driver
    LapBar,
    /// Every lap as a scatter plot
    AllLaps,
    /// Distribution of all laps and of normal laps
    Violin,
    /// Daily median, average and minimum lap time
    Timeline,
    /// Mean lap time per group
    MeanBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum GroupBy {
    Driver,
    Kart,
    Day,
}

impl From<GroupBy> for GroupKey {
    fn from(value: GroupBy) -> Self {
        match value {
            GroupBy::Driver => GroupKey::Driver,
            GroupBy::Kart => GroupKey::Kart,
            GroupBy::Day => GroupKey::Day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum SortBy {
    Lap,
    Date,
}

impl From<SortBy> for SortKey {
    fn from(value: SortBy) -> Self {
        match value {
            SortBy::Lap => SortKey::LapIndex,
            SortBy::Date => SortKey::Date,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ChartArg {
    /// Chart to build
    #[arg(value_enum)]
    kind: ChartKind,
    /// Lap entries, heat or kart history JSON file
    input: PathBuf,
    /// Chart configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit outlier laps as gaps (overrides the config file)
    #[arg(long)]
    hide_outliers: bool,
    /// Emit every normal lap as a gap (overrides the config file)
    #[arg(long, conflicts_with = "hide_outliers")]
    only_outliers: bool,
    /// Grouping used by the mean bar chart
    #[arg(long, value_enum, default_value_t = GroupBy::Driver)]
    group_by: GroupBy,
    /// Driver assigned to entries that name none
    #[arg(long)]
    fallback_driver: Option<String>,
    /// Stable sort applied to the records before charting
    #[arg(long, value_enum)]
    sort_by: Option<SortBy>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn lap_filter_override(hide_outliers: bool, only_outliers: bool) -> Option<LapFilter> {
    match (hide_outliers, only_outliers) {
        (true, _) => Some(LapFilter::Normal),
        (false, true) => Some(LapFilter::Outliers),
        (false, false) => None,
    }
}

pub(crate) fn run(arg: &ChartArg) -> anyhow::Result<()> {
    let ChartArg {
        kind,
        input,
        config,
        hide_outliers,
        only_outliers,
        group_by,
        fallback_driver,
        sort_by,
        output,
    } = arg;

    let mut config = util::read_chart_config(config.as_deref())?;
    if let Some(lap_filter) = lap_filter_override(*hide_outliers, *only_outliers) {
        config.lap_filter = lap_filter;
    }

    let mut normalizer = LapRecordNormalizer::new();
    if let Some(driver) = fallback_driver {
        normalizer = normalizer.with_fallback_driver(driver.as_str());
    }
    if let Some(sort_by) = sort_by {
        normalizer = normalizer.with_sort_key((*sort_by).into());
    }
    let records = util::read_lap_records(input, &normalizer)?;

    let data = match kind {
        ChartKind::LapTime => chart::lap_time_chart(&records, &config),
        ChartKind::LapBar => chart::lap_bar_chart(&records, &config),
        ChartKind::AllLaps => chart::all_laps_plot(&records, &config),
        ChartKind::Violin => chart::violin_chart(&records, &config),
        ChartKind::Timeline => chart::timeline_chart(&records, &config),
        ChartKind::MeanBar => chart::mean_bar_chart(&records, &config, (*group_by).into()),
    };
    if data.is_empty() {
        log::warn!("no data to chart in {}", input.display());
    }
    eprintln!("Built {kind:?} chart with {} series", data.series.len());

    Output::save_json(&data, output.clone())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCommand {
        #[clap(flatten)]
        arg: ChartArg,
    }

    fn parse(args: &[&str]) -> Result<ChartArg, clap::Error> {
        let args = ["karting", "all-laps", "laps.json"]
            .into_iter()
            .chain(args.iter().copied());
        TestCommand::try_parse_from(args).map(|command| command.arg)
    }

    #[test]
    fn test_outlier_flags_select_lap_filter() {
        let arg = parse(&[]).unwrap();
        assert_eq!(lap_filter_override(arg.hide_outliers, arg.only_outliers), None);

        let arg = parse(&["--hide-outliers"]).unwrap();
        assert_eq!(
            lap_filter_override(arg.hide_outliers, arg.only_outliers),
            Some(LapFilter::Normal)
        );

        let arg = parse(&["--only-outliers"]).unwrap();
        assert_eq!(arg.kind, ChartKind::AllLaps);
        assert_eq!(
            lap_filter_override(arg.hide_outliers, arg.only_outliers),
            Some(LapFilter::Outliers)
        );

        assert!(parse(&["--hide-outliers", "--only-outliers"]).is_err());
    }
}
