use std::collections::VecDeque;

use energy_client::domain::DailyEnergyRecord;

use crate::pipeline::{LocalLog, StorageUnavailable};

/// Ordered queue of daily records that still have to reach the remote
/// store, kept in the [`LocalLog`].
///
/// Records whose durable append failed are held in memory, in order, and
/// written out ahead of anything appended later. While any are held the
/// durable backlog is incomplete, so [`BacklogStore::read_all`] refuses to
/// answer until they are flushed.
#[derive(Debug, Default)]
pub struct BacklogStore {
    held: VecDeque<DailyEnergyRecord>,
}

impl BacklogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records waiting for the state volume to come back.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Oldest record held in memory.
    pub fn front_held(&self) -> Option<DailyEnergyRecord> {
        self.held.front().copied()
    }

    /// Forget the oldest held record once the remote store has it.
    pub fn pop_held(&mut self) -> Option<DailyEnergyRecord> {
        self.held.pop_front()
    }

    fn flush_held<L: LocalLog + ?Sized>(&mut self, log: &mut L) -> Result<(), StorageUnavailable> {
        while let Some(record) = self.held.front() {
            log.append_entry(record)?;
            tracing::info!(date = %record.date, "flushed held backlog entry to storage");
            self.held.pop_front();
        }
        Ok(())
    }

    /// Append `record` to the end of the backlog.
    ///
    /// On error the record is kept in memory and will be written before any
    /// later record.
    pub fn append<L: LocalLog + ?Sized>(
        &mut self,
        log: &mut L,
        record: DailyEnergyRecord,
    ) -> Result<(), StorageUnavailable> {
        self.held.push_back(record);
        metrics::counter!("relay_backlog_appends_total").increment(1);
        match self.flush_held(log) {
            Ok(()) => {
                tracing::info!(
                    date = %record.date,
                    delta_kwh = record.delta_kwh,
                    "backed up daily energy to backlog"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    date = %record.date,
                    held = self.held.len(),
                    "backlog append failed; holding entry in memory"
                );
                Err(e)
            }
        }
    }

    /// Every pending record in append order, duplicates included.
    pub fn read_all<L: LocalLog + ?Sized>(
        &mut self,
        log: &mut L,
    ) -> Result<Vec<DailyEnergyRecord>, StorageUnavailable> {
        self.flush_held(log)?;
        let records = log.read_entries()?;
        metrics::gauge!("relay_backlog_entries").set(records.len() as f64);
        Ok(records)
    }

    /// Drop every entry. Only call once all of them were delivered.
    pub fn clear<L: LocalLog + ?Sized>(&mut self, log: &mut L) -> Result<(), StorageUnavailable> {
        log.truncate_entries()?;
        metrics::gauge!("relay_backlog_entries").set(0.0);
        Ok(())
    }

    /// Keep only `entries[from..]`, where `entries` is the result of the last
    /// [`BacklogStore::read_all`].
    pub fn retain_from<L: LocalLog + ?Sized>(
        &mut self,
        log: &mut L,
        entries: &[DailyEnergyRecord],
        from: usize,
    ) -> Result<(), StorageUnavailable> {
        let rest = entries.get(from..).unwrap_or(&[]);
        log.replace_entries(rest)?;
        metrics::gauge!("relay_backlog_entries").set(rest.len() as f64);
        Ok(())
    }
}
