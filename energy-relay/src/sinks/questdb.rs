use std::time::Duration;

use energy_client::{
    db::daily_energy_queries::upsert_daily_energy,
    domain::{DailyEnergyRecord, DateKey},
};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::pipeline::{RemoteStore, TransportError};

/// Daily totals written to QuestDB over the PostgreSQL wire protocol.
pub struct QuestDbStore {
    pool: PgPool,
    site_id: String,
}

impl QuestDbStore {
    /// The pool connects on first use, so the relay can start offline.
    pub fn connect_lazy(
        uri: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        site_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(uri)?;
        Ok(Self::new(pool, site_id))
    }

    pub fn new(pool: PgPool, site_id: &str) -> Self {
        Self {
            pool,
            site_id: site_id.to_string(),
        }
    }
}

fn classify(e: sqlx::Error) -> TransportError {
    match e {
        sqlx::Error::Io(io) => TransportError::Io(io.to_string()),
        sqlx::Error::PoolTimedOut => TransportError::Io("connection pool timed out".to_string()),
        sqlx::Error::PoolClosed => TransportError::Io("connection pool closed".to_string()),
        other => TransportError::Rejected(other.to_string()),
    }
}

#[async_trait::async_trait]
impl RemoteStore for QuestDbStore {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError> {
        let record = DailyEnergyRecord::new(date, delta_kwh);
        match upsert_daily_energy(&self.pool, &self.site_id, &record).await {
            Ok(()) => {
                metrics::counter!("questdb_ingested_records_total").increment(1);
                Ok(())
            }
            Err(e) => {
                metrics::counter!("questdb_sink_errors_total").increment(1);
                tracing::warn!(error = %e, date = %date, "questdb daily energy write failed");
                Err(classify(e))
            }
        }
    }
}
