use serde::{Deserialize, Serialize};

use super::DateKey;

/// Cumulative energy observed at the first sample of a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBaseline {
    pub date: DateKey,
    pub energy_kwh: f64,
}

impl DailyBaseline {
    pub fn new(date: DateKey, energy_kwh: f64) -> Self {
        Self { date, energy_kwh }
    }
}

/// Finalized consumption of one completed day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyEnergyRecord {
    pub date: DateKey,
    pub delta_kwh: f64,
}

impl DailyEnergyRecord {
    pub fn new(date: DateKey, delta_kwh: f64) -> Self {
        Self { date, delta_kwh }
    }

    /// Consumption cannot go down; a negative total means the meter's
    /// counter was reset during the day.
    pub fn is_anomalous(&self) -> bool {
        self.delta_kwh < 0.0
    }
}
