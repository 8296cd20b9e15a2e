use std::path::PathBuf;

use anyhow::{Context as _, bail};
use chrono::NaiveDateTime;
use karting_stats::descriptive::Dispersion;
use rand::{Rng, SeedableRng as _};
use rand_distr::{Distribution as _, Normal};
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::util::Output;

const MEAN_LAP_TIME: f64 = 60.0;
const DRIVER_SPREAD: f64 = 1.5;
const LAP_SPREAD: f64 = 0.4;
const SLOW_LAP_PROBABILITY: f64 = 0.08;
const SLOW_LAP_PENALTY: std::ops::Range<f64> = 5.0..15.0;
const START_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateHeatArg {
    /// Number of drivers in the heat
    #[arg(long, default_value_t = 8)]
    drivers: usize,
    /// Number of laps driven by every driver
    #[arg(long, default_value_t = 12)]
    laps: usize,
    /// Random seed (a random one is picked and logged when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Heat start date, `YYYY-MM-DDTHH:MM:SS` (defaults to now)
    #[arg(long)]
    start_date: Option<String>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GeneratedHeat {
    heat_id: String,
    heat_type: &'static str,
    start_date: String,
    drivers: Vec<GeneratedDriver>,
}

#[derive(Debug, Serialize)]
struct GeneratedDriver {
    driver_name: String,
    kart: u32,
    all_laps: Vec<GeneratedLap>,
    total_laps: usize,
    fastest_lap: GeneratedLap,
    avg_lap_time: f64,
}

#[derive(Debug, Clone, Serialize)]
struct GeneratedLap {
    lap_in_heat: usize,
    lap_time: f64,
}

pub(crate) fn run(arg: &GenerateHeatArg) -> anyhow::Result<()> {
    let GenerateHeatArg {
        drivers,
        laps,
        seed,
        start_date,
        output,
    } = arg;

    if *drivers == 0 || *laps == 0 {
        bail!("A heat needs at least one driver and one lap");
    }
    let start_date = match start_date {
        Some(raw) => NaiveDateTime::parse_from_str(raw, START_DATE_FORMAT)
            .with_context(|| format!("Invalid start date: {raw}"))?,
        None => chrono::Local::now().naive_local(),
    };
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    log::info!("generating heat with seed {seed}");

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let heat = generate_heat(&mut rng, *drivers, *laps, start_date)?;
    eprintln!(
        "Generated heat {} with {drivers} drivers and {laps} laps each",
        heat.heat_id
    );

    Output::save_json(&heat, output.clone())?;
    Ok(())
}

fn generate_heat<R>(
    rng: &mut R,
    drivers: usize,
    laps: usize,
    start_date: NaiveDateTime,
) -> anyhow::Result<GeneratedHeat>
where
    R: Rng + ?Sized,
{
    let pace = Normal::new(MEAN_LAP_TIME, DRIVER_SPREAD)?;
    let drivers = (1..=drivers)
        .map(|i| {
            let driver_pace = pace.sample(rng);
            let lap_noise = Normal::new(driver_pace, LAP_SPREAD)?;
            let all_laps = (1..=laps)
                .map(|lap_in_heat| {
                    let mut lap_time = lap_noise.sample(rng);
                    if rng.random_bool(SLOW_LAP_PROBABILITY) {
                        lap_time += rng.random_range(SLOW_LAP_PENALTY);
                    }
                    GeneratedLap {
                        lap_in_heat,
                        lap_time: round_millis(lap_time),
                    }
                })
                .collect::<Vec<_>>();
            summarize_driver(i, all_laps)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(GeneratedHeat {
        heat_id: format!("generated-{}", start_date.format("%Y%m%d%H%M%S")),
        heat_type: "Race",
        start_date: start_date.format(START_DATE_FORMAT).to_string(),
        drivers,
    })
}

#[expect(clippy::cast_possible_truncation)]
fn summarize_driver(index: usize, all_laps: Vec<GeneratedLap>) -> anyhow::Result<GeneratedDriver> {
    let Some(fastest_lap) = all_laps
        .iter()
        .min_by(|a, b| a.lap_time.total_cmp(&b.lap_time))
        .cloned()
    else {
        bail!("Driver {index} has no laps");
    };
    let Some(dispersion) = Dispersion::new(all_laps.iter().map(|lap| lap.lap_time)) else {
        bail!("Driver {index} has no laps");
    };
    Ok(GeneratedDriver {
        driver_name: format!("Driver {index}"),
        kart: index as u32,
        total_laps: all_laps.len(),
        all_laps,
        fastest_lap,
        avg_lap_time: round_millis(dispersion.mean),
    })
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use karting_telemetry::normalize::{LapRecordNormalizer, TelemetryDocument};

    use super::*;

    fn start_date() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-01-01T18:00:00", START_DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_generated_heat_is_reproducible() {
        let first = generate_heat(&mut Pcg64Mcg::seed_from_u64(7), 3, 5, start_date()).unwrap();
        let second = generate_heat(&mut Pcg64Mcg::seed_from_u64(7), 3, 5, start_date()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_generated_heat_normalizes_cleanly() {
        let heat = generate_heat(&mut Pcg64Mcg::seed_from_u64(42), 4, 10, start_date()).unwrap();
        let value = serde_json::to_value(&heat).unwrap();
        let document: TelemetryDocument = serde_json::from_value(value).unwrap();
        assert!(matches!(document, TelemetryDocument::Heat(_)));

        let normalized = LapRecordNormalizer::new().normalize_document(&document);
        assert!(normalized.rejected.is_empty());
        assert_eq!(normalized.records.len(), 40);
        assert!(normalized.records.iter().all(|record| record.date().is_some()));
        assert!(normalized.records.iter().all(|record| record.lap_time() > 0.0));
    }

    #[test]
    fn test_driver_summary() {
        let laps = vec![
            GeneratedLap {
                lap_in_heat: 1,
                lap_time: 61.0,
            },
            GeneratedLap {
                lap_in_heat: 2,
                lap_time: 59.0,
            },
        ];
        let driver = summarize_driver(3, laps).unwrap();
        assert_eq!(driver.driver_name, "Driver 3");
        assert_eq!(driver.kart, 3);
        assert_eq!(driver.total_laps, 2);
        assert_eq!(driver.fastest_lap.lap_in_heat, 2);
        assert_eq!(driver.fastest_lap.lap_time, 59.0);
        assert_eq!(driver.avg_lap_time, 60.0);

        let value = serde_json::to_value(&driver).unwrap();
        assert_eq!(
            value["fastest_lap"],
            serde_json::json!({"lap_in_heat": 2, "lap_time": 59.0})
        );

        assert!(summarize_driver(1, vec![]).is_err());
    }
}
