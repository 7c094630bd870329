use std::{env, io, path::PathBuf};

use anyhow::Result;
use energy_relay::{
    config::AppConfig,
    observability,
    pipeline::LocalLog,
    storage::{interchange, FileLocalLog},
};

fn main() -> Result<()> {
    observability::init_tracing();

    // An explicit state dir wins over the one in the config file.
    let state_dir = match env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => AppConfig::load()?.state_dir,
    };

    let log = FileLocalLog::open(state_dir)?;
    let records = log.read_entries()?;
    interchange::write_csv(&records, io::stdout().lock())?;

    tracing::info!(entries = records.len(), "exported backlog");
    Ok(())
}
