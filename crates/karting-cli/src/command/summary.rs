use std::path::PathBuf;

use anyhow::bail;
use karting_stats::descriptive::DescriptiveStats;
use karting_telemetry::{
    aggregate::{GroupKey, group_records},
    normalize::LapRecordNormalizer,
    outlier::OutlierClassifier,
};

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SummaryArg {
    /// Lap entries, heat or kart history JSON file
    input: PathBuf,
    /// Driver assigned to entries that name none
    #[arg(long)]
    fallback_driver: Option<String>,
}

pub(crate) fn run(arg: &SummaryArg) -> anyhow::Result<()> {
    let SummaryArg {
        input,
        fallback_driver,
    } = arg;

    let mut normalizer = LapRecordNormalizer::new();
    if let Some(driver) = fallback_driver {
        normalizer = normalizer.with_fallback_driver(driver.as_str());
    }
    let records = util::read_lap_records(input, &normalizer)?;
    if records.is_empty() {
        bail!("No lap records in {}", input.display());
    }

    println!(
        "{:<20} {:>5} {:>9} {:>8} {:>9} {:>8}",
        "driver", "laps", "mean", "std-dev", "fastest", "outliers"
    );
    for group in group_records(&records, GroupKey::Driver) {
        let Some(stats) = DescriptiveStats::new(group.lap_times()) else {
            continue;
        };
        let classifier = OutlierClassifier::with_stats(stats.mean, stats.std_dev);
        let outliers = group
            .lap_times()
            .filter(|&lap_time| classifier.classify(lap_time).is_outlier())
            .count();
        println!(
            "{:<20} {:>5} {:>9.3} {:>8.3} {:>9.3} {:>8}",
            group.id.to_string(),
            stats.count,
            stats.mean,
            stats.std_dev,
            stats.min,
            outliers
        );
    }
    Ok(())
}
