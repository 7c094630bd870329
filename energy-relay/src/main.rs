use std::time::{Duration, Instant};

use anyhow::Result;
use energy_client::domain::DateKey;
use energy_relay::{
    calendar::SystemClock,
    config::{AppConfig, RemoteConfig, RemoteKind},
    connectivity::TcpProbe,
    metrics_server,
    observability,
    pipeline::{RemoteStore, TransportError},
    sinks::{HttpPathStore, QuestDbIlpStore, QuestDbStore},
    sources::HttpReadingSource,
    storage::ReopeningLog,
    Relay,
};

enum Remote {
    Http(HttpPathStore),
    Pgwire(QuestDbStore),
    Ilp(QuestDbIlpStore),
}

#[async_trait::async_trait]
impl RemoteStore for Remote {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError> {
        match self {
            Self::Http(s) => s.write_daily_energy(date, delta_kwh).await,
            Self::Pgwire(s) => s.write_daily_energy(date, delta_kwh).await,
            Self::Ilp(s) => s.write_daily_energy(date, delta_kwh).await,
        }
    }
}

fn build_remote(cfg: &RemoteConfig, site_id: &str, write_timeout: Duration) -> Result<Remote> {
    let remote = match cfg.kind {
        RemoteKind::Http => {
            let http = cfg
                .http
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("missing [remote.http] section"))?;
            Remote::Http(HttpPathStore::new(
                &http.base_url,
                &http.path_template,
                site_id,
                http.auth_token.clone(),
                write_timeout,
            )?)
        }
        RemoteKind::Pgwire => {
            let questdb = cfg
                .questdb
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("missing [remote.questdb] section"))?;
            let uri = questdb
                .uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("missing remote.questdb.uri"))?;
            Remote::Pgwire(QuestDbStore::connect_lazy(
                uri,
                questdb.max_connections,
                write_timeout,
                site_id,
            )?)
        }
        RemoteKind::Ilp => {
            let addr = cfg
                .questdb
                .as_ref()
                .and_then(|q| q.ilp_tcp_addr.as_deref())
                .ok_or_else(|| anyhow::anyhow!("missing remote.questdb.ilp_tcp_addr"))?;
            Remote::Ilp(QuestDbIlpStore::new(addr, site_id))
        }
    };
    Ok(remote)
}

/// Give NTP a bounded chance to set the clock before the first date is read.
async fn wait_for_time_sync(clock: &SystemClock, max_wait: Duration) {
    let started = Instant::now();
    while !clock.is_synchronized() {
        if started.elapsed() >= max_wait {
            tracing::warn!(
                waited_secs = max_wait.as_secs(),
                "wall clock still looks unset; continuing anyway"
            );
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    tracing::info!("wall clock synchronized");
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let clock = SystemClock::from_offset_hours(cfg.utc_offset_hours)
        .map_err(|e| anyhow::anyhow!("invalid utc_offset_hours: {e}"))?;
    wait_for_time_sync(&clock, Duration::from_secs(cfg.control.time_sync_wait_secs)).await;

    let log = ReopeningLog::new(cfg.state_dir.clone());

    let meter = HttpReadingSource::new(
        &cfg.meter.http_bind_addr,
        Duration::from_millis(cfg.meter.stale_after_ms),
    )
    .await?;
    let probe = TcpProbe::new(
        cfg.connectivity.probe_addr.clone(),
        Duration::from_millis(cfg.connectivity.probe_timeout_ms),
    );
    let remote = build_remote(&cfg.remote, &cfg.site_id, cfg.control.write_timeout())?;

    tracing::info!(
        site_id = %cfg.site_id,
        remote = ?cfg.remote.kind,
        "energy relay starting"
    );

    let relay = Relay::new(
        meter,
        clock,
        remote,
        probe,
        log,
        cfg.control.write_timeout(),
        cfg.control.blocked_retry(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    relay.run(cfg.control.poll_interval(), shutdown).await;

    Ok(())
}
