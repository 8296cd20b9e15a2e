use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, StdoutLock},
    path::{Path, PathBuf},
};

use anyhow::Context;
use karting_telemetry::{
    chart::ChartConfig,
    normalize::{LapRecordNormalizer, TelemetryDocument},
    record::LapRecord,
};

/// Destination of a command's JSON output
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    /// Writes `value` as pretty JSON to `output_path`, or to stdout when `None`.
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = match output_path {
            Some(path) => {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                Output::File {
                    writer: BufWriter::new(file),
                    path,
                }
            }
            None => Output::Stdout(io::stdout().lock()),
        };
        output
            .write_json(value)
            .with_context(|| format!("Failed to write JSON to {output}"))
    }

    fn write_json<T>(&mut self, value: &T) -> io::Result<()>
    where
        T: serde::Serialize,
    {
        let writer: &mut dyn io::Write = match self {
            Output::Stdout(writer) => writer,
            Output::File { writer, .. } => writer,
        };
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writeln!(writer)?;
        writer.flush()
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout(_) => f.write_str("stdout"),
            Output::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!("Failed to parse {file_kind} JSON file: {}", path.display())
    })?;

    Ok(value)
}

/// Read chart options, falling back to the defaults when no file is given
pub fn read_chart_config(path: Option<&Path>) -> anyhow::Result<ChartConfig> {
    match path {
        Some(path) => read_json_file("chart config", path),
        None => Ok(ChartConfig::default()),
    }
}

/// Read a telemetry file and normalize it into lap records
///
/// Rejected entries are reported on stderr and skipped.
pub fn read_lap_records(
    path: &Path,
    normalizer: &LapRecordNormalizer,
) -> anyhow::Result<Vec<LapRecord>> {
    let document: TelemetryDocument = read_json_file("telemetry", path)?;
    let normalized = normalizer.normalize_document(&document);

    eprintln!(
        "Loaded {} lap records from {}",
        normalized.records.len(),
        path.display()
    );
    if !normalized.rejected.is_empty() {
        eprintln!("Skipped {} malformed entries:", normalized.rejected.len());
        for rejected in &normalized.rejected {
            match rejected.lap {
                Some(lap) => eprintln!("  entry {} lap {lap}: {}", rejected.index, rejected.error),
                None => eprintln!("  entry {}: {}", rejected.index, rejected.error),
            }
        }
    }

    Ok(normalized.records)
}
