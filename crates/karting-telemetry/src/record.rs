//! Canonical lap records
//!
//! Every chart in this crate consumes [`LapRecord`]s. Raw telemetry arrives in a
//! handful of shapes (see [`normalize`](crate::normalize)); the normalizer turns
//! each of them into this one canonical form, validating lap times and lap
//! indices on the way.
//!
//! Records are immutable: fields are private and only readable through
//! accessors, so a record that passed validation stays valid.

use std::{fmt, num::NonZeroU32};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier of a driver or kart within one heat
///
/// Upstream datasets use driver names (`"Max"`) as well as numeric ids or kart
/// numbers (`7`). Both are kept as-is and serialized untagged.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(untagged)]
pub enum Identifier {
    #[display("{_0}")]
    Number(i64),
    #[display("{_0}")]
    Name(String),
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

/// Reason a lap entry could not become a [`LapRecord`]
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum RecordError {
    #[display("entry does not match any known lap shape: {message}")]
    UnknownShape { message: String },
    #[display("lap time '{raw}' is not a positive finite number")]
    InvalidLapTime { raw: String },
    #[display("lap index {value} is not a positive integer")]
    InvalidLapIndex { value: i64 },
    #[display("date '{raw}' is not a recognized timestamp")]
    InvalidDate { raw: String },
    #[display("entry has no driver and no fallback driver is configured")]
    MissingDriver,
}

/// One lap driven by one driver
///
/// # Invariants
///
/// - `lap_in_heat >= 1`
/// - `lap_time` is finite and strictly positive (seconds)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapRecord {
    driver: Identifier,
    kart: Option<Identifier>,
    lap_in_heat: NonZeroU32,
    lap_time: f64,
    date: Option<NaiveDateTime>,
}

impl LapRecord {
    /// Creates a record without kart and date.
    ///
    /// # Errors
    ///
    /// - [`RecordError::InvalidLapTime`] if `lap_time` is not positive and finite
    /// - [`RecordError::InvalidLapIndex`] if `lap_in_heat` is zero
    pub fn new(
        driver: impl Into<Identifier>,
        lap_in_heat: u32,
        lap_time: f64,
    ) -> Result<Self, RecordError> {
        let lap_in_heat = NonZeroU32::new(lap_in_heat).ok_or(RecordError::InvalidLapIndex {
            value: i64::from(lap_in_heat),
        })?;
        let lap_time = validate_lap_time(lap_time)?;
        Ok(Self {
            driver: driver.into(),
            kart: None,
            lap_in_heat,
            lap_time,
            date: None,
        })
    }

    #[must_use]
    pub fn with_kart(self, kart: impl Into<Identifier>) -> Self {
        Self {
            kart: Some(kart.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_date(self, date: NaiveDateTime) -> Self {
        Self {
            date: Some(date),
            ..self
        }
    }

    #[must_use]
    pub fn driver(&self) -> &Identifier {
        &self.driver
    }

    #[must_use]
    pub fn kart(&self) -> Option<&Identifier> {
        self.kart.as_ref()
    }

    #[must_use]
    pub fn lap_in_heat(&self) -> u32 {
        self.lap_in_heat.get()
    }

    /// Lap time in seconds.
    #[must_use]
    pub fn lap_time(&self) -> f64 {
        self.lap_time
    }

    #[must_use]
    pub fn date(&self) -> Option<NaiveDateTime> {
        self.date
    }

    /// The record's date truncated to day granularity.
    #[must_use]
    pub fn day(&self) -> Option<NaiveDate> {
        self.date.map(|date| date.date())
    }
}

impl fmt::Display for LapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lap {}: {:.3}s",
            self.driver, self.lap_in_heat, self.lap_time
        )
    }
}

pub(crate) fn validate_lap_time(lap_time: f64) -> Result<f64, RecordError> {
    if lap_time.is_finite() && lap_time > 0.0 {
        Ok(lap_time)
    } else {
        Err(RecordError::InvalidLapTime {
            raw: lap_time.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_lap_time() {
        assert!(LapRecord::new("Max", 1, 0.0).is_err());
        assert!(LapRecord::new("Max", 1, -12.5).is_err());
        assert!(LapRecord::new("Max", 1, f64::NAN).is_err());
        assert!(LapRecord::new("Max", 1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_rejects_zero_lap_index() {
        assert_eq!(
            LapRecord::new("Max", 0, 60.0),
            Err(RecordError::InvalidLapIndex { value: 0 })
        );
    }

    #[test]
    fn test_day_truncates_time() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(18, 32, 0)
            .unwrap();
        let record = LapRecord::new(7, 3, 61.2).unwrap().with_date(date);
        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(record.driver(), &Identifier::Number(7));
        assert_eq!(record.lap_in_heat(), 3);
    }

    #[test]
    fn test_identifier_serializes_untagged() {
        let name = serde_json::to_value(Identifier::from("Max")).unwrap();
        let number = serde_json::to_value(Identifier::from(12)).unwrap();
        assert_eq!(name, serde_json::json!("Max"));
        assert_eq!(number, serde_json::json!(12));
        assert_eq!(Identifier::from("Max").to_string(), "Max");
    }
}
