use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use energy_client::domain::{DailyBaseline, DailyEnergyRecord};

use super::codec;
use crate::pipeline::{LocalLog, StorageUnavailable};

const BASELINE_FILE: &str = "baseline.json";
const BACKLOG_FILE: &str = "backlog.jsonl";

/// [`LocalLog`] kept as two files in a state directory.
///
/// - `baseline.json`: a single record, replaced atomically (temp + rename).
/// - `backlog.jsonl`: one record per line, appended and fsynced per entry.
#[derive(Debug, Clone)]
pub struct FileLocalLog {
    dir: PathBuf,
}

impl FileLocalLog {
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, StorageUnavailable> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            StorageUnavailable(format!("failed to create state dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn baseline_path(&self) -> PathBuf {
        self.dir.join(BASELINE_FILE)
    }

    fn backlog_path(&self) -> PathBuf {
        self.dir.join(BACKLOG_FILE)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StorageUnavailable> {
        let tmp = path.with_extension("tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        // Persist the rename itself; not every platform lets a directory be opened.
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

/// A crash in the middle of an append can leave the last line without its
/// newline. Terminate it so the next record starts on a fresh line and the
/// torn one stays isolated.
fn terminate_torn_line(file: &mut File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        tracing::warn!("backlog ends with a partial line; isolating it");
        file.write_all(b"\n")?;
    }
    Ok(())
}

impl LocalLog for FileLocalLog {
    fn load_baseline(&self) -> Result<Option<DailyBaseline>, StorageUnavailable> {
        let contents = match fs::read_to_string(self.baseline_path()) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match codec::decode_baseline(contents.trim()) {
            Ok(baseline) => Ok(Some(baseline)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable persisted baseline");
                metrics::counter!("relay_baseline_corrupt_total").increment(1);
                Ok(None)
            }
        }
    }

    fn store_baseline(&mut self, baseline: &DailyBaseline) -> Result<(), StorageUnavailable> {
        let mut line = codec::encode_baseline(baseline);
        line.push('\n');
        self.write_atomic(&self.baseline_path(), line.as_bytes())
    }

    fn append_entry(&mut self, record: &DailyEnergyRecord) -> Result<(), StorageUnavailable> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.backlog_path())?;
        terminate_torn_line(&mut file)?;

        let mut line = codec::encode_entry(record);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn read_entries(&self) -> Result<Vec<DailyEnergyRecord>, StorageUnavailable> {
        let bytes = match fs::read(self.backlog_path()) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let contents = String::from_utf8_lossy(&bytes);
        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match codec::decode_entry(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, line = idx + 1, "skipping unreadable backlog line");
                    metrics::counter!("relay_backlog_corrupt_lines_total").increment(1);
                }
            }
        }
        Ok(records)
    }

    fn replace_entries(&mut self, records: &[DailyEnergyRecord]) -> Result<(), StorageUnavailable> {
        let mut contents = String::with_capacity(records.len().saturating_mul(96));
        for record in records {
            contents.push_str(&codec::encode_entry(record));
            contents.push('\n');
        }
        self.write_atomic(&self.backlog_path(), contents.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_client::domain::DateKey;

    fn day(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn record(s: &str, kwh: f64) -> DailyEnergyRecord {
        DailyEnergyRecord::new(day(s), kwh)
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileLocalLog::open(dir.path()).unwrap();
        assert_eq!(log.load_baseline().unwrap(), None);
        assert!(log.read_entries().unwrap().is_empty());
    }

    #[test]
    fn baseline_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = DailyBaseline::new(day("2026-01-05"), 100.25);
        {
            let mut log = FileLocalLog::open(dir.path()).unwrap();
            log.store_baseline(&baseline).unwrap();
        }
        let log = FileLocalLog::open(dir.path()).unwrap();
        assert_eq!(log.load_baseline().unwrap(), Some(baseline));
        assert!(!dir.path().join("baseline.tmp").exists());
    }

    #[test]
    fn newer_baseline_replaces_older() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileLocalLog::open(dir.path()).unwrap();
        log.store_baseline(&DailyBaseline::new(day("2026-01-05"), 100.0))
            .unwrap();
        log.store_baseline(&DailyBaseline::new(day("2026-01-06"), 103.5))
            .unwrap();
        assert_eq!(
            log.load_baseline().unwrap(),
            Some(DailyBaseline::new(day("2026-01-06"), 103.5))
        );
    }

    #[test]
    fn corrupt_baseline_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(BASELINE_FILE), "2026-01-05,100.000\n").unwrap();
        let log = FileLocalLog::open(dir.path()).unwrap();
        assert_eq!(log.load_baseline().unwrap(), None);
    }

    #[test]
    fn entries_keep_append_order_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileLocalLog::open(dir.path()).unwrap();
        log.append_entry(&record("2026-01-05", 2.1)).unwrap();
        log.append_entry(&record("2026-01-05", 2.4)).unwrap();
        log.append_entry(&record("2026-01-04", 1.0)).unwrap();

        assert_eq!(
            log.read_entries().unwrap(),
            vec![
                record("2026-01-05", 2.1),
                record("2026-01-05", 2.4),
                record("2026-01-04", 1.0),
            ]
        );
    }

    #[test]
    fn torn_tail_is_skipped_and_next_append_is_intact() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileLocalLog::open(dir.path()).unwrap();
        log.append_entry(&record("2026-01-05", 2.1)).unwrap();

        // Simulate power loss halfway through writing the second entry.
        let full = codec::encode_entry(&record("2026-01-06", 3.0));
        let mut raw = OpenOptions::new()
            .append(true)
            .open(dir.path().join(BACKLOG_FILE))
            .unwrap();
        raw.write_all(&full.as_bytes()[..full.len() / 2]).unwrap();
        drop(raw);

        assert_eq!(log.read_entries().unwrap(), vec![record("2026-01-05", 2.1)]);

        log.append_entry(&record("2026-01-07", 4.0)).unwrap();
        assert_eq!(
            log.read_entries().unwrap(),
            vec![record("2026-01-05", 2.1), record("2026-01-07", 4.0)]
        );
    }

    #[test]
    fn replace_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileLocalLog::open(dir.path()).unwrap();
        for (d, v) in [("2026-01-01", 1.0), ("2026-01-02", 2.0), ("2026-01-03", 3.0)] {
            log.append_entry(&record(d, v)).unwrap();
        }

        log.replace_entries(&[record("2026-01-02", 2.0), record("2026-01-03", 3.0)])
            .unwrap();
        assert_eq!(
            log.read_entries().unwrap(),
            vec![record("2026-01-02", 2.0), record("2026-01-03", 3.0)]
        );

        log.truncate_entries().unwrap();
        assert!(log.read_entries().unwrap().is_empty());
    }
}
