use std::{env, fs::File, path::PathBuf};

use anyhow::{bail, Result};
use energy_relay::{
    config::AppConfig,
    observability,
    pipeline::LocalLog,
    storage::{interchange, FileLocalLog},
};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: backlog_import <backup_file> [state_dir]");
    }
    let backup_path = &args[1];

    let state_dir = match args.get(2) {
        Some(dir) => PathBuf::from(dir),
        None => AppConfig::load()?.state_dir,
    };

    let file = File::open(backup_path)
        .map_err(|e| anyhow::anyhow!("failed to open backup '{backup_path}': {e}"))?;
    let (records, skipped) = interchange::read_legacy_backup(file);

    // Appended behind anything already pending, so resync keeps file order.
    let mut log = FileLocalLog::open(state_dir)?;
    for record in &records {
        log.append_entry(record)?;
    }

    tracing::info!(imported = records.len(), skipped, "imported legacy backup");
    Ok(())
}
