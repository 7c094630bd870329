use energy_client::domain::{DailyBaseline, DailyEnergyRecord};

use crate::pipeline::{LocalLog, StorageUnavailable};

/// In-memory [`LocalLog`] whose storage can be switched off to simulate an
/// unmounted or failing volume.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    pub baseline: Option<DailyBaseline>,
    pub entries: Vec<DailyEnergyRecord>,
    pub failing: bool,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StorageUnavailable> {
        if self.failing {
            Err(StorageUnavailable("volume offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LocalLog for MemoryLog {
    fn load_baseline(&self) -> Result<Option<DailyBaseline>, StorageUnavailable> {
        self.check()?;
        Ok(self.baseline)
    }

    fn store_baseline(&mut self, baseline: &DailyBaseline) -> Result<(), StorageUnavailable> {
        self.check()?;
        self.baseline = Some(*baseline);
        Ok(())
    }

    fn append_entry(&mut self, record: &DailyEnergyRecord) -> Result<(), StorageUnavailable> {
        self.check()?;
        self.entries.push(*record);
        Ok(())
    }

    fn read_entries(&self) -> Result<Vec<DailyEnergyRecord>, StorageUnavailable> {
        self.check()?;
        Ok(self.entries.clone())
    }

    fn replace_entries(&mut self, records: &[DailyEnergyRecord]) -> Result<(), StorageUnavailable> {
        self.check()?;
        self.entries = records.to_vec();
        Ok(())
    }
}
