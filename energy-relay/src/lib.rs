pub mod pipeline;
pub mod config;
pub mod calendar;
pub mod accumulator;
pub mod backlog;
pub mod resync;
pub mod connectivity;
pub mod control;
pub mod sources;
pub mod sinks;
pub mod storage;
pub mod transform;
pub mod observability;
pub mod metrics_server;

#[cfg(test)]
mod testing;

pub use control::Relay;
pub use pipeline::{RelayError, StorageUnavailable, TransportError};
