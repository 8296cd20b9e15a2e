//! Decoding of raw lap telemetry into [`LapRecord`]s
//!
//! Lap data reaches the charts in several shapes, depending on which endpoint
//! produced it. Instead of sniffing fields ad hoc, every entry is run through a
//! small tagged-variant decoder that tries the known shapes in priority order:
//!
//! 1. **Driver-grouped**: `{driver_name, kart?, all_laps: [...], total_laps?, ...}`,
//!    expanded into one record per entry of `all_laps`
//! 2. **Nested**: `{lap: {lap_time, lap_in_heat?}, driver?, kart?, date?}`
//! 3. **Flat**: `{lap_time | laptime, lap_in_heat?, driver?, kart?, date?}`
//!
//! `driver` may be an identifier or `{name}`, `kart` an identifier or `{number}`.
//! Precomputed `normal_laps` / `outlier_laps` lists are ignored; classification
//! is always recomputed by [`outlier`](crate::outlier).
//!
//! Whole API documents are handled by [`TelemetryDocument`]:
//!
//! ```text
//! TelemetryDocument
//! ├─ Heat        {heat_id, start_date, drivers: [driver-grouped]}
//! ├─ KartHistory {number, heats: [{heat_id, start_date, driver, laps}]}
//! └─ Laps        [lap entry, ...]
//! ```
//!
//! Normalization never fails as a whole. Entries that cannot be decoded are
//! dropped and reported in [`Normalized::rejected`].
//!
//! # Example
//!
//! ```
//! use karting_telemetry::normalize::LapRecordNormalizer;
//! use serde_json::json;
//!
//! let entries = vec![
//!     json!({"driver": {"name": "Max"}, "lap_time": 61.2}),
//!     json!({"driver": "Max", "lap": {"lap_time": "60.8"}}),
//!     json!({"driver": "Max", "lap_time": -1.0}),
//! ];
//! let normalized = LapRecordNormalizer::new().normalize(&entries);
//! assert_eq!(normalized.records.len(), 2);
//! assert_eq!(normalized.records[1].lap_in_heat(), 2);
//! assert_eq!(normalized.rejected.len(), 1);
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use crate::record::{Identifier, LapRecord, RecordError, validate_lap_time};

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Reference to a driver: a bare identifier or an object with a `name`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DriverRef {
    Named { name: Identifier },
    Id(Identifier),
}

impl DriverRef {
    #[must_use]
    pub fn into_identifier(self) -> Identifier {
        match self {
            DriverRef::Named { name } => name,
            DriverRef::Id(id) => id,
        }
    }
}

/// Reference to a kart: a bare identifier or an object with a `number`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KartRef {
    Numbered { number: Identifier },
    Id(Identifier),
}

impl KartRef {
    #[must_use]
    pub fn into_identifier(self) -> Identifier {
        match self {
            KartRef::Numbered { number } => number,
            KartRef::Id(id) => id,
        }
    }
}

/// A complete telemetry payload as returned by the heat and kart endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(
    untagged,
    expecting = "a heat document, a kart history document or a list of lap entries"
)]
pub enum TelemetryDocument {
    Heat(HeatDocument),
    KartHistory(KartHistory),
    Laps(Vec<Value>),
}

/// One heat with its drivers; every lap inherits the heat's start date
#[derive(Debug, Clone, Deserialize)]
pub struct HeatDocument {
    pub heat_id: String,
    #[serde(default)]
    pub heat_type: Option<String>,
    pub start_date: String,
    pub drivers: Vec<Value>,
}

/// All heats driven in one kart, used for the across-heats timeline
#[derive(Debug, Clone, Deserialize)]
pub struct KartHistory {
    pub number: Identifier,
    #[serde(default)]
    pub is_child_kart: bool,
    pub heats: Vec<KartHeat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KartHeat {
    pub heat_id: String,
    pub start_date: String,
    pub driver: DriverRef,
    pub laps: Vec<Value>,
}

/// Key applied (stably) to the normalized records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    LapIndex,
    Date,
}

/// A dropped entry
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// Position of the entry in traversal order
    pub index: usize,
    /// Position inside `all_laps` for driver-grouped entries
    pub lap: Option<usize>,
    pub error: RecordError,
}

/// Result of normalization: accepted records plus the dropped entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<LapRecord>,
    pub rejected: Vec<Rejected>,
}

impl Normalized {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Converts raw lap entries into canonical [`LapRecord`]s
#[derive(Debug, Clone, Default)]
pub struct LapRecordNormalizer {
    fallback_driver: Option<Identifier>,
    sort_key: Option<SortKey>,
}

impl LapRecordNormalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver assigned to entries that carry none (e.g. `{date, lap_time}` history records).
    #[must_use]
    pub fn with_fallback_driver(self, driver: impl Into<Identifier>) -> Self {
        Self {
            fallback_driver: Some(driver.into()),
            ..self
        }
    }

    /// Stably sorts the records after decoding. Without a key, input order is kept.
    #[must_use]
    pub fn with_sort_key(self, sort_key: SortKey) -> Self {
        Self {
            sort_key: Some(sort_key),
            ..self
        }
    }

    /// Normalizes a flat list of lap entries.
    #[must_use]
    pub fn normalize(&self, entries: &[Value]) -> Normalized {
        let mut expander = Expander::new(self);
        let ctx = EntryContext::default();
        for entry in entries {
            expander.push_entry(entry, &ctx);
        }
        expander.finish()
    }

    /// Normalizes a whole API document.
    #[must_use]
    pub fn normalize_document(&self, document: &TelemetryDocument) -> Normalized {
        match document {
            TelemetryDocument::Laps(entries) => self.normalize(entries),
            TelemetryDocument::Heat(heat) => {
                let mut expander = Expander::new(self);
                match parse_date(&heat.start_date) {
                    Ok(date) => {
                        let ctx = EntryContext {
                            date: Some(date),
                            ..EntryContext::default()
                        };
                        for entry in &heat.drivers {
                            expander.push_entry(entry, &ctx);
                        }
                    }
                    Err(error) => {
                        log::warn!("heat {} has an invalid start date: {error}", heat.heat_id);
                        expander.reject_all(heat.drivers.len(), &error);
                    }
                }
                expander.finish()
            }
            TelemetryDocument::KartHistory(kart) => {
                let mut expander = Expander::new(self);
                for heat in &kart.heats {
                    expander.start_heat();
                    match parse_date(&heat.start_date) {
                        Ok(date) => {
                            let ctx = EntryContext {
                                driver: Some(heat.driver.clone().into_identifier()),
                                kart: Some(kart.number.clone()),
                                date: Some(date),
                            };
                            for lap in &heat.laps {
                                expander.push_entry(lap, &ctx);
                            }
                        }
                        Err(error) => {
                            log::warn!(
                                "kart {} heat {} has an invalid start date: {error}",
                                kart.number,
                                heat.heat_id
                            );
                            expander.reject_all(heat.laps.len(), &error);
                        }
                    }
                }
                expander.finish()
            }
        }
    }
}

/// Parses the timestamp formats found in heat data.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM`, `YYYY-MM-DDTHH:MM:SS[.f]` (also
/// space-separated) and RFC 3339 timestamps with an offset.
pub fn parse_date(raw: &str) -> Result<NaiveDateTime, RecordError> {
    let raw = raw.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|date| date.naive_local())
        })
        .ok_or_else(|| RecordError::InvalidDate {
            raw: raw.to_owned(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(
    untagged,
    expecting = "a driver-grouped, nested or flat lap entry"
)]
enum RawLapEntry {
    DriverGrouped(RawDriverLaps),
    Nested(RawNestedLap),
    Flat(RawFlatLap),
}

#[derive(Debug, Deserialize)]
struct RawDriverLaps {
    driver_name: Identifier,
    kart: Option<KartRef>,
    all_laps: Vec<Value>,
    total_laps: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawNestedLap {
    lap: RawLap,
    driver: Option<DriverRef>,
    kart: Option<KartRef>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFlatLap {
    #[serde(alias = "laptime")]
    lap_time: RawLapTime,
    lap_in_heat: Option<i64>,
    driver: Option<DriverRef>,
    kart: Option<KartRef>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLap {
    #[serde(alias = "laptime")]
    lap_time: RawLapTime,
    lap_in_heat: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLapTime {
    Number(f64),
    Text(String),
}

impl RawLapTime {
    fn seconds(&self) -> Result<f64, RecordError> {
        match self {
            RawLapTime::Number(value) => validate_lap_time(*value),
            RawLapTime::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|value| validate_lap_time(value).ok())
                .ok_or_else(|| RecordError::InvalidLapTime { raw: raw.clone() }),
        }
    }
}

/// Values inherited from an enclosing document; entry fields take precedence.
#[derive(Debug, Clone, Default)]
struct EntryContext {
    driver: Option<Identifier>,
    kart: Option<Identifier>,
    date: Option<NaiveDateTime>,
}

struct EntryFields<'a> {
    driver: Option<Identifier>,
    kart: Option<Identifier>,
    date: Option<&'a str>,
}

#[derive(Debug)]
struct Expander<'a> {
    normalizer: &'a LapRecordNormalizer,
    lap_counters: HashMap<Identifier, u32>,
    next_index: usize,
    output: Normalized,
}

impl<'a> Expander<'a> {
    fn new(normalizer: &'a LapRecordNormalizer) -> Self {
        Self {
            normalizer,
            lap_counters: HashMap::new(),
            next_index: 0,
            output: Normalized::default(),
        }
    }

    fn start_heat(&mut self) {
        self.lap_counters.clear();
    }

    fn push_entry(&mut self, entry: &Value, ctx: &EntryContext) {
        let index = self.next_index;
        self.next_index += 1;

        let raw = match RawLapEntry::deserialize(entry) {
            Ok(raw) => raw,
            Err(error) => {
                self.reject(index, None, unknown_shape(&error));
                return;
            }
        };

        match raw {
            RawLapEntry::DriverGrouped(group) => {
                if let Some(total_laps) = group.total_laps {
                    if total_laps != group.all_laps.len() {
                        log::warn!(
                            "driver {} reports {total_laps} total laps but lists {}",
                            group.driver_name,
                            group.all_laps.len()
                        );
                    }
                }
                let driver = group.driver_name;
                let kart = group.kart.map(KartRef::into_identifier);
                for (lap_pos, lap_value) in group.all_laps.iter().enumerate() {
                    let fields = EntryFields {
                        driver: Some(driver.clone()),
                        kart: kart.clone(),
                        date: None,
                    };
                    let result = match RawLap::deserialize(lap_value) {
                        Ok(lap) => self.build(ctx, fields, &lap),
                        Err(error) => {
                            *self.lap_counters.entry(driver.clone()).or_default() += 1;
                            Err(unknown_shape(&error))
                        }
                    };
                    self.accept_or_reject(index, Some(lap_pos), result);
                }
            }
            RawLapEntry::Nested(nested) => {
                let fields = EntryFields {
                    driver: nested.driver.map(DriverRef::into_identifier),
                    kart: nested.kart.map(KartRef::into_identifier),
                    date: nested.date.as_deref(),
                };
                let result = self.build(ctx, fields, &nested.lap);
                self.accept_or_reject(index, None, result);
            }
            RawLapEntry::Flat(flat) => {
                let fields = EntryFields {
                    driver: flat.driver.map(DriverRef::into_identifier),
                    kart: flat.kart.map(KartRef::into_identifier),
                    date: flat.date.as_deref(),
                };
                let lap = RawLap {
                    lap_time: flat.lap_time,
                    lap_in_heat: flat.lap_in_heat,
                };
                let result = self.build(ctx, fields, &lap);
                self.accept_or_reject(index, None, result);
            }
        }
    }

    fn build(
        &mut self,
        ctx: &EntryContext,
        fields: EntryFields<'_>,
        lap: &RawLap,
    ) -> Result<LapRecord, RecordError> {
        let driver = fields
            .driver
            .or_else(|| ctx.driver.clone())
            .or_else(|| self.normalizer.fallback_driver.clone())
            .ok_or(RecordError::MissingDriver)?;
        // a rejected lap still takes its position in the driver's run
        let position = self.lap_counters.get(&driver).copied().unwrap_or(0) + 1;
        self.lap_counters.insert(driver.clone(), position);

        let lap_time = lap.lap_time.seconds()?;
        let date = match fields.date {
            Some(raw) => Some(parse_date(raw)?),
            None => ctx.date,
        };
        let kart = fields.kart.or_else(|| ctx.kart.clone());

        let lap_in_heat = match lap.lap_in_heat {
            Some(value) => u32::try_from(value)
                .ok()
                .filter(|&value| value >= 1)
                .ok_or(RecordError::InvalidLapIndex { value })?,
            None => position,
        };

        let mut record = LapRecord::new(driver, lap_in_heat, lap_time)?;
        if let Some(kart) = kart {
            record = record.with_kart(kart);
        }
        if let Some(date) = date {
            record = record.with_date(date);
        }
        Ok(record)
    }

    fn accept_or_reject(
        &mut self,
        index: usize,
        lap: Option<usize>,
        result: Result<LapRecord, RecordError>,
    ) {
        match result {
            Ok(record) => self.output.records.push(record),
            Err(error) => self.reject(index, lap, error),
        }
    }

    fn reject(&mut self, index: usize, lap: Option<usize>, error: RecordError) {
        log::debug!("dropping lap entry {index} (lap {lap:?}): {error}");
        self.output.rejected.push(Rejected { index, lap, error });
    }

    fn reject_all(&mut self, count: usize, error: &RecordError) {
        for _ in 0..count {
            let index = self.next_index;
            self.next_index += 1;
            self.reject(index, None, error.clone());
        }
    }

    fn finish(self) -> Normalized {
        let Self {
            normalizer,
            mut output,
            ..
        } = self;
        match normalizer.sort_key {
            Some(SortKey::LapIndex) => output.records.sort_by_key(LapRecord::lap_in_heat),
            Some(SortKey::Date) => output.records.sort_by_key(LapRecord::date),
            None => {}
        }
        if !output.rejected.is_empty() {
            log::warn!(
                "dropped {} malformed lap entries, kept {}",
                output.rejected.len(),
                output.records.len()
            );
        }
        log::debug!("normalized {} lap records", output.records.len());
        output
    }
}

fn unknown_shape(error: &serde_json::Error) -> RecordError {
    RecordError::UnknownShape {
        message: error.to_string(),
    }
}
