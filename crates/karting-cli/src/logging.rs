use log::LevelFilter;

/// Installs the stderr logger.
///
/// Lines look like `[2024-01-01][12:00:00] [karting_telemetry::normalize][WARN] ...`.
pub fn setup_logging(level: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .level(level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ));
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}
