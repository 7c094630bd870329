//! The relay's single control loop.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use energy_client::domain::{DailyBaseline, DailyEnergyRecord, DateKey, EnergyReading};
use tokio::time::MissedTickBehavior;

use crate::{
    accumulator::DailyEnergyAccumulator,
    backlog::BacklogStore,
    calendar::CalendarTracker,
    connectivity::{ConnectivityMonitor, LinkEvent},
    pipeline::{Clock, DataAnomaly, LinkProbe, LocalLog, Meter, RelayError, RemoteStore},
    resync::{deliver, ResyncEngine, ResyncOutcome, ResyncState},
    transform,
};

/// What happened to a finalized day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    Delivered,
    Backlogged,
    /// Neither delivered nor durably backlogged; held in memory until the
    /// state volume accepts writes again.
    Held,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub link: Option<LinkEvent>,
    pub resync: ResyncOutcome,
    pub rollover: Option<(DailyEnergyRecord, Handoff)>,
    /// Today's consumption so far; `None` until a baseline exists.
    pub daily_delta_kwh: Option<f64>,
    /// Negative totals flagged this cycle. They are relayed regardless.
    pub anomalies: Vec<DataAnomaly>,
}

/// Everything the control loop owns. Components get what they need lent to
/// them per call; nothing lives in globals.
pub struct Relay<M, C, R, P, L> {
    meter: M,
    calendar: CalendarTracker<C>,
    remote: R,
    probe: P,
    log: L,
    accumulator: Option<DailyEnergyAccumulator>,
    backlog: BacklogStore,
    resync: ResyncEngine,
    monitor: ConnectivityMonitor,
    write_timeout: Duration,
    anomaly_flagged_for: Option<DateKey>,
}

impl<M, C, R, P, L> Relay<M, C, R, P, L>
where
    M: Meter,
    C: Clock,
    R: RemoteStore,
    P: LinkProbe,
    L: LocalLog,
{
    pub fn new(
        meter: M,
        clock: C,
        remote: R,
        probe: P,
        log: L,
        write_timeout: Duration,
        blocked_retry: Option<Duration>,
    ) -> Self {
        Self {
            meter,
            calendar: CalendarTracker::new(clock),
            remote,
            probe,
            log,
            accumulator: None,
            backlog: BacklogStore::new(),
            resync: ResyncEngine::new(write_timeout, blocked_retry),
            monitor: ConnectivityMonitor::new(),
            write_timeout,
            anomaly_flagged_for: None,
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    #[cfg(test)]
    pub(crate) fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn accumulator(&self) -> Option<&DailyEnergyAccumulator> {
        self.accumulator.as_ref()
    }

    pub fn resync_state(&self) -> ResyncState {
        self.resync.state()
    }

    /// Load or create today's baseline. Falls back to a memory-only baseline
    /// when the state volume is unusable.
    fn ensure_accumulator(&mut self, today: DateKey, reading: EnergyReading) {
        if self.accumulator.is_some() {
            return;
        }

        match DailyEnergyAccumulator::restore_or_initialize(&mut self.log, today, reading) {
            Ok(acc) => self.accumulator = Some(acc),
            Err(RelayError::StorageUnavailable(e)) => match reading.kwh() {
                Some(kwh) => {
                    tracing::warn!(
                        error = %e,
                        "state volume unusable; running with an in-memory baseline (degraded)"
                    );
                    self.accumulator =
                        Some(DailyEnergyAccumulator::in_memory(DailyBaseline::new(today, kwh)));
                }
                None => tracing::warn!(error = %e, "state volume unusable and meter silent"),
            },
            Err(RelayError::SensorUnavailable) => {
                tracing::debug!("waiting for a meter reading to start the day");
            }
        }
    }

    /// Whether a new record may bypass the backlog.
    fn clear_to_send(&self) -> bool {
        if self.backlog.held() > 0 {
            return false;
        }
        match self.resync.state() {
            ResyncState::Idle => true,
            // Nothing readable is queued ahead of it.
            ResyncState::Draining => self.resync.storage_paused(),
            ResyncState::Blocked => false,
        }
    }

    /// Deliver a finalized day now if nothing older is pending, else queue it.
    async fn hand_off(&mut self, record: DailyEnergyRecord, link_up: bool) -> Handoff {
        if link_up && self.clear_to_send() {
            match deliver(&self.remote, &record, self.write_timeout).await {
                Ok(()) => {
                    tracing::info!(
                        date = %record.date,
                        delta_kwh = record.delta_kwh,
                        "daily energy saved to remote store"
                    );
                    return Handoff::Delivered;
                }
                Err(e) => {
                    tracing::warn!(error = %e, date = %record.date, "remote write failed");
                    self.resync.mark_blocked();
                }
            }
        } else if !link_up {
            tracing::info!(date = %record.date, "link down; backing up daily energy");
        } else {
            tracing::info!(date = %record.date, "older entries pending; queueing behind them");
        }

        match self.backlog.append(&mut self.log, record) {
            Ok(()) => Handoff::Backlogged,
            Err(_) => Handoff::Held,
        }
    }

    /// One pass of the loop: link check, resync, rollover, sampling.
    pub async fn cycle(&mut self) -> CycleReport {
        let up = self.probe.is_up().await;
        let link = self.monitor.observe(up);
        if link == Some(LinkEvent::Recovered) {
            self.resync.on_recovered();
        }

        let resync = if up {
            self.resync.poll_retry(Instant::now());
            self.resync
                .drain(&mut self.backlog, &mut self.log, &self.remote)
                .await
        } else {
            ResyncOutcome::NotDue
        };

        let reading = self.meter.cumulative_energy();
        let today = self.calendar.today();
        self.ensure_accumulator(today, reading);

        let Some(mut acc) = self.accumulator.take() else {
            return CycleReport {
                link,
                resync,
                rollover: None,
                daily_delta_kwh: None,
                anomalies: Vec::new(),
            };
        };

        let mut rollover = None;
        let mut anomalies = Vec::new();
        if let Some(new_day) = self.calendar.has_rolled_over(acc.current_day()) {
            let closing = acc.finalize(new_day, reading);
            tracing::info!(
                date = %closing.record.date,
                delta_kwh = closing.record.delta_kwh,
                next_baseline_kwh = closing.next.energy_kwh,
                "day rolled over"
            );
            anomalies.extend(transform::flag_anomaly(&closing.record));
            let handoff = self.hand_off(closing.record, up).await;
            // Last durable step of the rollover.
            acc.commit(&mut self.log, closing.next);
            rollover = Some((closing.record, handoff));
        }

        let delta = acc.daily_delta(reading);
        metrics::gauge!("relay_daily_energy_kwh").set(delta);
        if delta < 0.0 && self.anomaly_flagged_for != Some(acc.current_day()) {
            anomalies.extend(transform::flag_anomaly(&DailyEnergyRecord::new(
                acc.current_day(),
                delta,
            )));
            self.anomaly_flagged_for = Some(acc.current_day());
        }
        self.accumulator = Some(acc);

        CycleReport {
            link,
            resync,
            rollover,
            daily_delta_kwh: Some(delta),
            anomalies,
        }
    }

    /// Run cycles every `poll_interval` until `shutdown` resolves. A cycle in
    /// progress always completes.
    pub async fn run<F>(mut self, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down control loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.cycle().await;
                }
            }
        }
    }
}
