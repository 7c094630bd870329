use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_write_timeout_ms() -> u64 {
    5_000
}

fn default_blocked_retry_secs() -> u64 {
    300
}

fn default_time_sync_wait_secs() -> u64 {
    15
}

fn default_stale_after_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_path_template() -> String {
    "energiHarian/{site}/{date}".to_string()
}

fn default_max_connections() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on any single remote write.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Retry a blocked backlog after this long even without a link drop.
    /// `0` disables the retry; only a reconnect then unblocks it.
    #[serde(default = "default_blocked_retry_secs")]
    pub blocked_retry_secs: u64,
    #[serde(default = "default_time_sync_wait_secs")]
    pub time_sync_wait_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            blocked_retry_secs: default_blocked_retry_secs(),
            time_sync_wait_secs: default_time_sync_wait_secs(),
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn blocked_retry(&self) -> Option<Duration> {
        (self.blocked_retry_secs > 0).then(|| Duration::from_secs(self.blocked_retry_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
    pub http_bind_addr: String,
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    /// `host:port` of the remote store, used for link probing.
    pub probe_addr: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    Http,
    Pgwire,
    Ilp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpRemoteConfig {
    pub base_url: String,
    #[serde(default = "default_path_template")]
    pub path_template: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestDbConfig {
    pub uri: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    pub ilp_tcp_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub http: Option<HttpRemoteConfig>,
    pub questdb: Option<QuestDbConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Identifies this meter in the remote store (room, premise, ...).
    pub site_id: String,
    pub state_dir: PathBuf,
    /// The site's fixed offset from UTC; decides where a day starts.
    #[serde(default)]
    pub utc_offset_hours: i8,
    #[serde(default)]
    pub control: ControlConfig,
    pub meter: MeterConfig,
    pub connectivity: ConnectivityConfig,
    pub remote: RemoteConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("ENERGY_RELAY_CONFIG").unwrap_or_else(|_| "energy-relay.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.site_id.trim().is_empty() {
            anyhow::bail!("site_id must not be empty");
        }
        match self.remote.kind {
            RemoteKind::Http if self.remote.http.is_none() => {
                anyhow::bail!("remote.kind = \"http\" requires a [remote.http] section")
            }
            RemoteKind::Pgwire
                if self.remote.questdb.as_ref().and_then(|q| q.uri.as_ref()).is_none() =>
            {
                anyhow::bail!("remote.kind = \"pgwire\" requires remote.questdb.uri")
            }
            RemoteKind::Ilp
                if self
                    .remote
                    .questdb
                    .as_ref()
                    .and_then(|q| q.ilp_tcp_addr.as_ref())
                    .is_none() =>
            {
                anyhow::bail!("remote.kind = \"ilp\" requires remote.questdb.ilp_tcp_addr")
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        site_id = "room1"
        state_dir = "/var/lib/energy-relay"
        utc_offset_hours = 7

        [meter]
        http_bind_addr = "127.0.0.1:8081"

        [connectivity]
        probe_addr = "example.firebasedatabase.app:443"

        [remote]
        kind = "http"

        [remote.http]
        base_url = "https://example.firebasedatabase.app"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.site_id, "room1");
        assert_eq!(cfg.utc_offset_hours, 7);
        assert_eq!(cfg.control.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.control.blocked_retry(), Some(Duration::from_secs(300)));
        assert_eq!(cfg.meter.stale_after_ms, 10_000);
        assert_eq!(cfg.remote.kind, RemoteKind::Http);
        assert_eq!(
            cfg.remote.http.unwrap().path_template,
            "energiHarian/{site}/{date}"
        );
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn zero_retry_disables_timed_unblock() {
        let cfg = ControlConfig {
            blocked_retry_secs: 0,
            ..ControlConfig::default()
        };
        assert_eq!(cfg.blocked_retry(), None);
    }

    #[test]
    fn remote_kind_needs_its_section() {
        let ilp = MINIMAL.replace("kind = \"http\"", "kind = \"ilp\"");
        assert!(AppConfig::from_toml(&ilp).is_err());

        let with_addr = format!("{ilp}\n[remote.questdb]\nilp_tcp_addr = \"127.0.0.1:9009\"\n");
        assert!(AppConfig::from_toml(&with_addr).is_ok());
    }

    #[test]
    fn empty_site_is_rejected() {
        let cfg = MINIMAL.replace("site_id = \"room1\"", "site_id = \"\"");
        assert!(AppConfig::from_toml(&cfg).is_err());
    }
}
