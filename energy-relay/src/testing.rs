//! Fakes for the relay's collaborators.

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use energy_client::domain::{DateKey, EnergyReading};

use crate::pipeline::{Clock, LinkProbe, Meter, RemoteStore, TransportError};

#[derive(Clone)]
pub struct FixedClock(Arc<Mutex<DateKey>>);

impl FixedClock {
    pub fn new(day: &str) -> Self {
        Self(Arc::new(Mutex::new(day.parse().unwrap())))
    }

    pub fn set(&self, day: &str) {
        *self.0.lock().unwrap() = day.parse().unwrap();
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DateKey {
        *self.0.lock().unwrap()
    }
}

/// Meter that repeats its current value until told otherwise.
#[derive(Clone)]
pub struct ManualMeter(Arc<Mutex<EnergyReading>>);

impl ManualMeter {
    pub fn new(kwh: f64) -> Self {
        Self(Arc::new(Mutex::new(EnergyReading::from_kwh(kwh))))
    }

    pub fn set(&self, kwh: f64) {
        *self.0.lock().unwrap() = EnergyReading::from_kwh(kwh);
    }

    pub fn unplug(&self) {
        *self.0.lock().unwrap() = EnergyReading::Unavailable;
    }
}

impl Meter for ManualMeter {
    fn cumulative_energy(&self) -> EnergyReading {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
struct StoreState {
    /// Keyed store contents, overwritten per date.
    values: Vec<(DateKey, f64)>,
    /// Every accepted write, in order.
    received: Vec<(DateKey, f64)>,
    failing_dates: HashSet<DateKey>,
    offline: bool,
    /// Scripted outcomes consumed before the rules above apply.
    script: VecDeque<Result<(), TransportError>>,
}

/// Keyed remote store that records what it receives.
#[derive(Clone, Default)]
pub struct RecordingStore(Arc<Mutex<StoreState>>);

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.0.lock().unwrap().offline = offline;
    }

    pub fn fail_date(&self, day: &str) {
        self.0.lock().unwrap().failing_dates.insert(day.parse().unwrap());
    }

    pub fn heal_date(&self, day: &str) {
        let day: DateKey = day.parse().unwrap();
        self.0.lock().unwrap().failing_dates.remove(&day);
    }

    pub fn push_outcome(&self, outcome: Result<(), TransportError>) {
        self.0.lock().unwrap().script.push_back(outcome);
    }

    pub fn received(&self) -> Vec<(DateKey, f64)> {
        self.0.lock().unwrap().received.clone()
    }

    pub fn value(&self, day: &str) -> Option<f64> {
        let day: DateKey = day.parse().unwrap();
        self.0
            .lock()
            .unwrap()
            .values
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, v)| *v)
    }
}

#[async_trait::async_trait]
impl RemoteStore for RecordingStore {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError> {
        let mut state = self.0.lock().unwrap();
        if let Some(outcome) = state.script.pop_front() {
            outcome?;
        } else if state.offline {
            return Err(TransportError::Io("network unreachable".to_string()));
        } else if state.failing_dates.contains(&date) {
            return Err(TransportError::Rejected(format!("write to {date} refused")));
        }

        state.received.push((date, delta_kwh));
        match state.values.iter_mut().find(|(d, _)| *d == date) {
            Some(slot) => slot.1 = delta_kwh,
            None => state.values.push((date, delta_kwh)),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SwitchProbe(Arc<Mutex<bool>>);

impl SwitchProbe {
    pub fn new(up: bool) -> Self {
        Self(Arc::new(Mutex::new(up)))
    }

    pub fn set(&self, up: bool) {
        *self.0.lock().unwrap() = up;
    }
}

#[async_trait::async_trait]
impl LinkProbe for SwitchProbe {
    async fn is_up(&self) -> bool {
        *self.0.lock().unwrap()
    }
}
