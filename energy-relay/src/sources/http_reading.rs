use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use energy_client::domain::EnergyReading;
use tokio::sync::watch;

use crate::pipeline::Meter;

#[derive(Debug, Clone, Copy)]
struct Sample {
    energy: EnergyReading,
    received_at: Instant,
}

type SharedSender = Arc<watch::Sender<Option<Sample>>>;

/// Meter fed over HTTP by whatever process owns the meter's serial bus.
///
/// `POST /ingest/reading` with `{"energy_kwh": 1234.567}` (or `null` when the
/// register read failed). The control loop sees the latest value; once it is
/// older than `stale_after` the meter is reported unavailable.
pub struct HttpReadingSource {
    rx: watch::Receiver<Option<Sample>>,
    stale_after: Duration,
}

#[derive(serde::Deserialize)]
struct IncomingReading {
    energy_kwh: Option<f64>,
}

fn router(tx: SharedSender) -> Router {
    Router::new()
        .route("/ingest/reading", post(ingest_reading))
        .with_state(tx)
}

impl HttpReadingSource {
    pub async fn new(bind_addr: &str, stale_after: Duration) -> anyhow::Result<Self> {
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid meter bind addr '{bind_addr}': {e}"))?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let (source, tx) = Self::detached(stale_after);
        let app = router(tx);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                tracing::error!(error = %e, "meter reading listener error");
            }
        });

        tracing::info!(%addr, "accepting meter readings");
        Ok(source)
    }

    /// A source with no listener attached, plus the sending half.
    fn detached(stale_after: Duration) -> (Self, SharedSender) {
        let (tx, rx) = watch::channel(None);
        (Self { rx, stale_after }, Arc::new(tx))
    }
}

impl Meter for HttpReadingSource {
    fn cumulative_energy(&self) -> EnergyReading {
        match *self.rx.borrow() {
            Some(sample) if sample.received_at.elapsed() <= self.stale_after => sample.energy,
            Some(_) => {
                tracing::debug!("latest meter reading is stale");
                EnergyReading::Unavailable
            }
            None => EnergyReading::Unavailable,
        }
    }
}

async fn ingest_reading(
    State(tx): State<SharedSender>,
    Json(payload): Json<IncomingReading>,
) -> StatusCode {
    metrics::counter!("relay_meter_readings_total").increment(1);

    let energy = EnergyReading::from(payload.energy_kwh);
    if !energy.is_available() {
        metrics::counter!("relay_meter_unavailable_total").increment(1);
    }

    tx.send_replace(Some(Sample {
        energy,
        received_at: Instant::now(),
    }));
    StatusCode::NO_CONTENT
}
