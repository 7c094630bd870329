use std::time::{Duration, Instant};

use energy_client::domain::DailyEnergyRecord;

use crate::{
    backlog::BacklogStore,
    pipeline::{LocalLog, RemoteStore, StorageUnavailable, TransportError},
};

/// Write one daily record, giving up after `timeout`.
pub async fn deliver<R: RemoteStore + ?Sized>(
    remote: &R,
    record: &DailyEnergyRecord,
    timeout: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(timeout, remote.write_daily_energy(record.date, record.delta_kwh)).await
    {
        Ok(res) => res,
        Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncState {
    /// Backlog known to be empty.
    Idle,
    /// A pass is due on the next cycle.
    Draining,
    /// The last pass hit a failed write; waiting for the link to recover.
    Blocked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResyncOutcome {
    /// Engine was not draining; nothing attempted.
    NotDue,
    Drained {
        delivered: usize,
    },
    Blocked {
        delivered: usize,
        remaining: usize,
        error: TransportError,
    },
    /// Backlog could not be read and nothing was held in memory.
    Paused(StorageUnavailable),
    /// Backlog could not be read; every record held in memory was sent
    /// instead.
    HeldSent {
        delivered: usize,
    },
    /// Everything was delivered but the backlog could not be truncated.
    ClearFailed {
        delivered: usize,
        error: StorageUnavailable,
    },
}

/// Replays the backlog to the remote store, oldest first.
///
/// A pass stops at the first failed write so that nothing is delivered out
/// of order behind a gap. The backlog is only cleared once a pass delivered
/// every entry; if a pass stops part-way, the delivered prefix is dropped
/// and the failed entry heads the backlog.
pub struct ResyncEngine {
    state: ResyncState,
    write_timeout: Duration,
    blocked_retry: Option<Duration>,
    blocked_since: Option<Instant>,
    storage_paused: bool,
}

impl ResyncEngine {
    pub fn new(write_timeout: Duration, blocked_retry: Option<Duration>) -> Self {
        Self {
            state: ResyncState::Idle,
            write_timeout,
            blocked_retry,
            blocked_since: None,
            storage_paused: false,
        }
    }

    pub fn state(&self) -> ResyncState {
        self.state
    }

    /// Whether the last pass found the durable backlog unreadable.
    pub fn storage_paused(&self) -> bool {
        self.storage_paused
    }

    /// The link came back: schedule a pass.
    pub fn on_recovered(&mut self) {
        if self.state != ResyncState::Draining {
            tracing::debug!(from = ?self.state, "resync armed");
        }
        self.state = ResyncState::Draining;
        self.blocked_since = None;
    }

    /// Re-arm a blocked engine once the retry interval has passed, for
    /// remotes that refuse writes while the link itself stays up.
    pub fn poll_retry(&mut self, now: Instant) {
        if let (ResyncState::Blocked, Some(since), Some(retry)) =
            (self.state, self.blocked_since, self.blocked_retry)
        {
            if now.saturating_duration_since(since) >= retry {
                tracing::info!("retrying blocked backlog");
                self.on_recovered();
            }
        }
    }

    /// A write outside the engine failed; wait for the next recovery.
    pub fn mark_blocked(&mut self) {
        self.state = ResyncState::Blocked;
        self.blocked_since = Some(Instant::now());
    }

    /// Run one pass if one is due.
    pub async fn drain<L, R>(
        &mut self,
        backlog: &mut BacklogStore,
        log: &mut L,
        remote: &R,
    ) -> ResyncOutcome
    where
        L: LocalLog + ?Sized,
        R: RemoteStore + ?Sized,
    {
        if self.state != ResyncState::Draining {
            return ResyncOutcome::NotDue;
        }

        let entries = match backlog.read_all(log) {
            Ok(entries) => {
                if self.storage_paused {
                    tracing::info!("backlog readable again; resync resumed");
                }
                self.storage_paused = false;
                entries
            }
            Err(e) => {
                self.storage_paused = true;
                if backlog.held() == 0 {
                    tracing::warn!(error = %e, "backlog unreadable; resync paused");
                    return ResyncOutcome::Paused(e);
                }
                tracing::warn!(
                    error = %e,
                    held = backlog.held(),
                    "backlog unreadable; sending entries held in memory"
                );
                return self.send_held(backlog, remote).await;
            }
        };

        if entries.is_empty() {
            tracing::debug!("no backlog to send");
            self.state = ResyncState::Idle;
            return ResyncOutcome::Drained { delivered: 0 };
        }

        tracing::info!(entries = entries.len(), "sending backlog");
        for (idx, record) in entries.iter().enumerate() {
            match deliver(remote, record, self.write_timeout).await {
                Ok(()) => {
                    metrics::counter!("relay_resync_delivered_total").increment(1);
                    tracing::info!(
                        date = %record.date,
                        delta_kwh = record.delta_kwh,
                        "sent backlog entry"
                    );
                }
                Err(error) => {
                    metrics::counter!("relay_resync_blocked_total").increment(1);
                    tracing::warn!(
                        error = %error,
                        date = %record.date,
                        remaining = entries.len() - idx,
                        "failed to send backlog entry; keeping it and everything after it"
                    );
                    if idx > 0 {
                        if let Err(e) = backlog.retain_from(log, &entries, idx) {
                            // The delivered prefix will simply be sent again.
                            tracing::warn!(error = %e, "could not drop delivered backlog prefix");
                        }
                    }
                    self.mark_blocked();
                    return ResyncOutcome::Blocked {
                        delivered: idx,
                        remaining: entries.len() - idx,
                        error,
                    };
                }
            }
        }

        match backlog.clear(log) {
            Ok(()) => {
                tracing::info!(delivered = entries.len(), "backlog sent and cleared");
                self.state = ResyncState::Idle;
                ResyncOutcome::Drained {
                    delivered: entries.len(),
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "backlog delivered but not cleared; will resend");
                ResyncOutcome::ClearFailed {
                    delivered: entries.len(),
                    error,
                }
            }
        }
    }

    /// Send records the volume refused straight from memory, oldest first.
    ///
    /// The engine stays `Draining` afterwards: whatever the volume holds is
    /// sent once it can be read again.
    async fn send_held<R>(&mut self, backlog: &mut BacklogStore, remote: &R) -> ResyncOutcome
    where
        R: RemoteStore + ?Sized,
    {
        let mut delivered = 0;
        while let Some(record) = backlog.front_held() {
            match deliver(remote, &record, self.write_timeout).await {
                Ok(()) => {
                    backlog.pop_held();
                    delivered += 1;
                    metrics::counter!("relay_resync_delivered_total").increment(1);
                    tracing::info!(
                        date = %record.date,
                        delta_kwh = record.delta_kwh,
                        "sent held entry"
                    );
                }
                Err(error) => {
                    metrics::counter!("relay_resync_blocked_total").increment(1);
                    tracing::warn!(error = %error, date = %record.date, "failed to send held entry");
                    self.mark_blocked();
                    return ResyncOutcome::Blocked {
                        delivered,
                        remaining: backlog.held(),
                        error,
                    };
                }
            }
        }
        ResyncOutcome::HeldSent { delivered }
    }
}
