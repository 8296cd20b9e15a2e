use clap::{Parser, Subcommand};
use log::LevelFilter;

use self::{chart::ChartArg, generate_heat::GenerateHeatArg, summary::SummaryArg};

mod chart;
mod generate_heat;
mod summary;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log level (OFF, ERROR, WARN, INFO, DEBUG, TRACE)
    #[arg(long, global = true, env = "LOGGING_LEVEL", default_value = "INFO")]
    log_level: LevelFilter,
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Build chart data from lap-time telemetry
    Chart(#[clap(flatten)] ChartArg),
    /// Print per-driver lap statistics
    Summary(#[clap(flatten)] SummaryArg),
    /// Generate a synthetic heat for testing charts
    GenerateHeat(#[clap(flatten)] GenerateHeatArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    crate::logging::setup_logging(args.log_level)?;
    match args.mode {
        Mode::Chart(arg) => chart::run(&arg)?,
        Mode::Summary(arg) => summary::run(&arg)?,
        Mode::GenerateHeat(arg) => generate_heat::run(&arg)?,
    }
    Ok(())
}
