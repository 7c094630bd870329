pub mod codec;
pub mod file_log;
pub mod interchange;
#[cfg(test)]
pub(crate) mod memory;
pub mod reopening;

pub use file_log::FileLocalLog;
pub use reopening::ReopeningLog;
