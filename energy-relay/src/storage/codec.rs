//! Line codec for persisted baseline and backlog records.
//!
//! Every line is a self-contained JSON object tagged with a schema version
//! and a short blake3 checksum. A line that fails any check (torn write,
//! bit rot, hand edits, a future schema) is rejected as a whole.

use energy_client::domain::{DailyBaseline, DailyEnergyRecord, DateKey};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

const CHECKSUM_HEX_LEN: usize = 16;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),
    #[error("record checksum mismatch")]
    Checksum,
}

#[derive(Serialize, Deserialize)]
struct EntryLine {
    v: u32,
    date: DateKey,
    delta_kwh: f64,
    sum: String,
}

#[derive(Serialize, Deserialize)]
struct BaselineLine {
    v: u32,
    date: DateKey,
    energy_kwh: f64,
    sum: String,
}

#[derive(Deserialize)]
struct VersionProbe {
    v: u32,
}

fn checksum(kind: &str, date: DateKey, value: f64) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&SCHEMA_VERSION.to_le_bytes());
    h.update(kind.as_bytes());
    h.update(date.to_string().as_bytes());
    h.update(&value.to_bits().to_le_bytes());
    h.finalize().to_hex().as_str()[..CHECKSUM_HEX_LEN].to_string()
}

fn check_version(line: &str) -> Result<(), CodecError> {
    let probe: VersionProbe =
        serde_json::from_str(line).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if probe.v != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion(probe.v));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> String {
    // Only plain strings and finite numbers go in; serialization cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

/// Encode one backlog entry, without the trailing newline.
pub fn encode_entry(record: &DailyEnergyRecord) -> String {
    to_json(&EntryLine {
        v: SCHEMA_VERSION,
        date: record.date,
        delta_kwh: record.delta_kwh,
        sum: checksum("entry", record.date, record.delta_kwh),
    })
}

pub fn decode_entry(line: &str) -> Result<DailyEnergyRecord, CodecError> {
    check_version(line)?;
    let parsed: EntryLine =
        serde_json::from_str(line).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if parsed.sum != checksum("entry", parsed.date, parsed.delta_kwh) {
        return Err(CodecError::Checksum);
    }
    Ok(DailyEnergyRecord::new(parsed.date, parsed.delta_kwh))
}

pub fn encode_baseline(baseline: &DailyBaseline) -> String {
    to_json(&BaselineLine {
        v: SCHEMA_VERSION,
        date: baseline.date,
        energy_kwh: baseline.energy_kwh,
        sum: checksum("baseline", baseline.date, baseline.energy_kwh),
    })
}

pub fn decode_baseline(line: &str) -> Result<DailyBaseline, CodecError> {
    check_version(line)?;
    let parsed: BaselineLine =
        serde_json::from_str(line).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if parsed.sum != checksum("baseline", parsed.date, parsed.energy_kwh) {
        return Err(CodecError::Checksum);
    }
    Ok(DailyBaseline::new(parsed.date, parsed.energy_kwh))
}
