use energy_client::domain::{DailyBaseline, DailyEnergyRecord, DateKey, EnergyReading};

use crate::pipeline::{LocalLog, RelayError};

/// Result of closing one day: yesterday's total and the baseline the next
/// day starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rollover {
    pub record: DailyEnergyRecord,
    pub next: DailyBaseline,
}

/// Tracks consumption since the first sample of the current day.
///
/// The baseline held here is a cache of the persisted one. A new baseline is
/// only ever written after the previous day's record has been handed off, so
/// a crash between the two leaves yesterday's baseline on disk and the
/// day's total is recomputed rather than lost.
#[derive(Debug, Clone)]
pub struct DailyEnergyAccumulator {
    baseline: DailyBaseline,
    /// Last valid counter value seen since `baseline` was taken.
    last_reading_kwh: f64,
    last_delta_kwh: f64,
    durable: bool,
}

impl DailyEnergyAccumulator {
    fn with_baseline(baseline: DailyBaseline, durable: bool) -> Self {
        Self {
            baseline,
            last_reading_kwh: baseline.energy_kwh,
            last_delta_kwh: 0.0,
            durable,
        }
    }

    /// Accumulator whose baseline exists only in memory, for sessions where
    /// the state volume is unusable.
    pub fn in_memory(baseline: DailyBaseline) -> Self {
        Self::with_baseline(baseline, false)
    }

    /// Resume today's baseline from `log`, or start one from `reading`.
    ///
    /// A persisted baseline for another day is resumed as is, with `reading`
    /// as its last sample, so that the caller sees a rollover and closes
    /// that day before today's baseline is written.
    ///
    /// # Errors
    /// - [`RelayError::StorageUnavailable`] if the log cannot be read or the
    ///   new baseline cannot be written.
    /// - [`RelayError::SensorUnavailable`] if a new baseline is needed, or an
    ///   unclosed day must be closed, but the meter has no value.
    pub fn restore_or_initialize<L: LocalLog + ?Sized>(
        log: &mut L,
        today: DateKey,
        reading: EnergyReading,
    ) -> Result<Self, RelayError> {
        match log.load_baseline()? {
            Some(persisted) if persisted.date == today => {
                tracing::info!(
                    date = %today,
                    baseline_kwh = persisted.energy_kwh,
                    "restored daily baseline"
                );
                return Ok(Self::with_baseline(persisted, true));
            }
            Some(persisted) => {
                // The day was never closed: power loss across midnight, or a
                // crash between handing off its record and committing the
                // next baseline. Everything used since then is attributed to
                // that day; the caller closes it through the normal rollover.
                let kwh = reading.kwh().ok_or(RelayError::SensorUnavailable)?;
                tracing::warn!(
                    persisted_date = %persisted.date,
                    date = %today,
                    baseline_kwh = persisted.energy_kwh,
                    reading_kwh = kwh,
                    "resuming a day that was never closed"
                );
                let mut acc = Self::with_baseline(persisted, true);
                acc.daily_delta(reading);
                return Ok(acc);
            }
            None => {}
        }

        let kwh = reading.kwh().ok_or(RelayError::SensorUnavailable)?;
        let baseline = DailyBaseline::new(today, kwh);
        log.store_baseline(&baseline)?;
        tracing::info!(date = %today, baseline_kwh = kwh, "initialized daily baseline");
        Ok(Self::with_baseline(baseline, true))
    }

    pub fn baseline(&self) -> DailyBaseline {
        self.baseline
    }

    pub fn current_day(&self) -> DateKey {
        self.baseline.date
    }

    /// Whether the active baseline is known to be on disk.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Energy used today. An unavailable reading leaves the previous answer
    /// in place.
    pub fn daily_delta(&mut self, reading: EnergyReading) -> f64 {
        if let Some(kwh) = reading.kwh() {
            self.last_reading_kwh = kwh;
            self.last_delta_kwh = kwh - self.baseline.energy_kwh;
        }
        self.last_delta_kwh
    }

    /// Close the current day without touching storage.
    ///
    /// The record uses the last valid reading taken before the date changed;
    /// `reading` (the first sample of `new_day`) becomes the next baseline.
    /// If that sample is unavailable, the last valid reading is used instead.
    pub fn finalize(&self, new_day: DateKey, reading: EnergyReading) -> Rollover {
        let record = DailyEnergyRecord::new(
            self.baseline.date,
            self.last_reading_kwh - self.baseline.energy_kwh,
        );
        let start_kwh = reading.kwh().unwrap_or(self.last_reading_kwh);
        Rollover {
            record,
            next: DailyBaseline::new(new_day, start_kwh),
        }
    }

    /// Switch to `next` and persist it. The in-memory switch happens even if
    /// the write fails; the accumulator then runs non-durable until a later
    /// write succeeds.
    pub fn commit<L: LocalLog + ?Sized>(&mut self, log: &mut L, next: DailyBaseline) {
        *self = Self::with_baseline(next, self.durable);
        match log.store_baseline(&next) {
            Ok(()) => {
                if !self.durable {
                    tracing::info!(date = %next.date, "baseline persisted again; storage recovered");
                }
                self.durable = true;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    date = %next.date,
                    "failed to persist new baseline; continuing in memory only"
                );
                self.durable = false;
            }
        }
    }

    /// Finalize the current day and start `new_day` in one step.
    pub fn rollover<L: LocalLog + ?Sized>(
        &mut self,
        log: &mut L,
        new_day: DateKey,
        reading: EnergyReading,
    ) -> (DailyEnergyRecord, DailyBaseline) {
        let Rollover { record, next } = self.finalize(new_day, reading);
        self.commit(log, next);
        (record, next)
    }
}
