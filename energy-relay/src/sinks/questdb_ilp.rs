use energy_client::domain::DateKey;
use tokio::{io::AsyncWriteExt, net::TcpStream, sync::Mutex};

use crate::pipeline::{RemoteStore, TransportError};

const MEASUREMENT: &str = "daily_energy";

/// Escape measurement/tag keys/tag values/field keys for ILP.
///
/// ILP requires escaping commas, spaces and equals with a backslash.
fn ilp_escape_ident(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            ',' | ' ' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

fn push_tag(out: &mut String, key: &str, value: &str) {
    out.push(',');
    ilp_escape_ident(key, out);
    out.push('=');
    ilp_escape_ident(value, out);
}

/// One ILP line for a day's total, designated timestamp at midnight so the
/// table's `(day, site_id)` dedup keys overwrite earlier sends.
fn daily_energy_line(site_id: &str, date: DateKey, delta_kwh: f64) -> String {
    let mut out = String::with_capacity(96);
    out.push_str(MEASUREMENT);
    push_tag(&mut out, "site_id", site_id);
    out.push_str(" kwh=");
    out.push_str(&delta_kwh.to_string());
    out.push(' ');
    out.push_str(&date.midnight_utc().unix_timestamp_nanos().to_string());
    out.push('\n');
    out
}

/// Daily totals written to QuestDB over ILP/TCP.
///
/// ILP over TCP has no acknowledgements: a write counts as delivered once
/// the bytes are handed to the socket. A broken connection surfaces on a
/// later write, after which the entry is kept and retried.
pub struct QuestDbIlpStore {
    addr: String,
    site_id: String,
    conn: Mutex<Option<TcpStream>>,
}

impl QuestDbIlpStore {
    pub fn new(addr: &str, site_id: &str) -> Self {
        Self {
            addr: addr.to_string(),
            site_id: site_id.to_string(),
            conn: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect(self.addr.as_str())
            .await
            .map_err(|e| TransportError::Io(format!("failed to connect to QuestDB ILP: {e}")))?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl RemoteStore for QuestDbIlpStore {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError> {
        let line = daily_energy_line(&self.site_id, date, delta_kwh);

        let mut guard = self.conn.lock().await;
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let res = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        }
        .await;

        match res {
            Ok(()) => {
                metrics::counter!("questdb_ilp_bytes_total").increment(line.len() as u64);
                *guard = Some(stream);
                Ok(())
            }
            Err(e) => {
                metrics::counter!("questdb_ilp_sink_errors_total").increment(1);
                tracing::warn!(error = %e, "QuestDB ILP write failed; dropping connection");
                Err(TransportError::Io(format!("ilp write failed: {e}")))
            }
        }
    }
}
