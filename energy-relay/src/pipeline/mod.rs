//! Collaborator seams of the relay and the error taxonomy shared by them.

use energy_client::domain::{DailyBaseline, DailyEnergyRecord, DateKey, EnergyReading};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("remote write timed out after {0} ms")]
    Timeout(u64),
    #[error("remote rejected write: {0}")]
    Rejected(String),
    #[error("remote io error: {0}")]
    Io(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);

impl From<std::io::Error> for StorageUnavailable {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("negative daily energy {delta_kwh:.3} kWh for {date}; meter counter reset suspected")]
pub struct DataAnomaly {
    pub date: DateKey,
    pub delta_kwh: f64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("meter reading unavailable")]
    SensorUnavailable,
    #[error(transparent)]
    StorageUnavailable(#[from] StorageUnavailable),
}

/// Source of the meter's cumulative energy counter.
pub trait Meter: Send + Sync {
    fn cumulative_energy(&self) -> EnergyReading;
}

/// Wall clock reduced to the site's calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> DateKey;
}

/// Remote database addressed by calendar day.
///
/// Writes must overwrite by `date`: sending the same day twice leaves the
/// last value, never the sum.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError>;
}

/// Reports whether the path to the remote store is currently usable.
#[async_trait::async_trait]
pub trait LinkProbe: Send + Sync {
    async fn is_up(&self) -> bool;
}

/// Durable local persistence: one baseline record plus an append-only
/// sequence of undelivered daily records.
///
/// Only the control loop writes to it; every completed call must survive
/// power loss.
pub trait LocalLog: Send {
    fn load_baseline(&self) -> Result<Option<DailyBaseline>, StorageUnavailable>;

    fn store_baseline(&mut self, baseline: &DailyBaseline) -> Result<(), StorageUnavailable>;

    fn append_entry(&mut self, record: &DailyEnergyRecord) -> Result<(), StorageUnavailable>;

    /// Entries in append order. Torn or corrupt entries are skipped.
    fn read_entries(&self) -> Result<Vec<DailyEnergyRecord>, StorageUnavailable>;

    /// Atomically replace the whole sequence.
    fn replace_entries(&mut self, records: &[DailyEnergyRecord]) -> Result<(), StorageUnavailable>;

    fn truncate_entries(&mut self) -> Result<(), StorageUnavailable> {
        self.replace_entries(&[])
    }
}
