use std::path::PathBuf;

use energy_client::domain::{DailyBaseline, DailyEnergyRecord};

use super::FileLocalLog;
use crate::pipeline::{LocalLog, StorageUnavailable};

/// [`FileLocalLog`] for a state directory that may not exist yet, such as a
/// card that is mounted after boot.
///
/// Until the directory can be created every call retries the open and
/// reports [`StorageUnavailable`] on failure; after that it behaves exactly
/// like the file log.
#[derive(Debug)]
pub struct ReopeningLog {
    dir: PathBuf,
    inner: Option<FileLocalLog>,
}

impl ReopeningLog {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        let inner = match FileLocalLog::open(dir.clone()) {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    dir = %dir.display(),
                    "state directory unusable; will keep retrying"
                );
                None
            }
        };
        Self { dir, inner }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn current(&self) -> Result<FileLocalLog, StorageUnavailable> {
        match &self.inner {
            Some(log) => Ok(log.clone()),
            None => FileLocalLog::open(self.dir.clone()),
        }
    }

    fn current_mut(&mut self) -> Result<&mut FileLocalLog, StorageUnavailable> {
        if self.inner.is_none() {
            let log = FileLocalLog::open(self.dir.clone())?;
            tracing::info!(dir = %self.dir.display(), "state directory available");
            self.inner = Some(log);
        }
        match self.inner.as_mut() {
            Some(log) => Ok(log),
            None => Err(StorageUnavailable("state directory not open".to_string())),
        }
    }
}

impl LocalLog for ReopeningLog {
    fn load_baseline(&self) -> Result<Option<DailyBaseline>, StorageUnavailable> {
        self.current()?.load_baseline()
    }

    fn store_baseline(&mut self, baseline: &DailyBaseline) -> Result<(), StorageUnavailable> {
        self.current_mut()?.store_baseline(baseline)
    }

    fn append_entry(&mut self, record: &DailyEnergyRecord) -> Result<(), StorageUnavailable> {
        self.current_mut()?.append_entry(record)
    }

    fn read_entries(&self) -> Result<Vec<DailyEnergyRecord>, StorageUnavailable> {
        self.current()?.read_entries()
    }

    fn replace_entries(&mut self, records: &[DailyEnergyRecord]) -> Result<(), StorageUnavailable> {
        self.current_mut()?.replace_entries(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_client::domain::DateKey;
    use std::fs;

    fn day(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn starts_writing_once_the_directory_can_be_created() {
        let root = tempfile::tempdir().unwrap();
        // A plain file where the state directory should go blocks it.
        let state = root.path().join("state");
        fs::write(&state, b"not a directory").unwrap();

        let mut log = ReopeningLog::new(&state);
        assert!(!log.is_open());
        let record = DailyEnergyRecord::new(day("2026-01-05"), 2.1);
        assert!(log.append_entry(&record).is_err());
        assert!(log.read_entries().is_err());

        fs::remove_file(&state).unwrap();
        log.append_entry(&record).unwrap();
        assert!(log.is_open());
        assert_eq!(log.read_entries().unwrap(), vec![record]);

        let baseline = DailyBaseline::new(day("2026-01-06"), 103.5);
        log.store_baseline(&baseline).unwrap();
        assert_eq!(FileLocalLog::open(&state).unwrap().load_baseline().unwrap(), Some(baseline));
    }

    #[test]
    fn reads_retry_without_caching_the_open() {
        let root = tempfile::tempdir().unwrap();
        let state = root.path().join("state");
        fs::write(&state, b"").unwrap();

        let log = ReopeningLog::new(&state);
        assert!(log.load_baseline().is_err());

        fs::remove_file(&state).unwrap();
        assert_eq!(log.load_baseline().unwrap(), None);
        assert!(!log.is_open());
    }
}
