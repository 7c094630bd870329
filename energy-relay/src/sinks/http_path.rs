use std::time::Duration;

use energy_client::domain::DateKey;

use crate::pipeline::{RemoteStore, TransportError};

/// Path-keyed REST database (Firebase Realtime Database style).
///
/// Each day is a node at `{base_url}/{path_template}.json`, where the
/// template's `{site}` and `{date}` placeholders are filled in. A `PUT`
/// replaces the node, so re-sending a day overwrites it.
pub struct HttpPathStore {
    client: reqwest::Client,
    base_url: String,
    path_template: String,
    site_id: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpPathStore {
    pub fn new(
        base_url: &str,
        path_template: &str,
        site_id: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Io(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path_template: path_template.trim_matches('/').to_string(),
            site_id: site_id.to_string(),
            auth_token,
            timeout,
        })
    }

    fn node_path(&self, date: DateKey) -> String {
        self.path_template
            .replace("{site}", &self.site_id)
            .replace("{date}", &date.to_string())
    }

    fn url_for(&self, date: DateKey) -> String {
        format!("{}/{}.json", self.base_url, self.node_path(date))
    }
}

#[async_trait::async_trait]
impl RemoteStore for HttpPathStore {
    async fn write_daily_energy(&self, date: DateKey, delta_kwh: f64) -> Result<(), TransportError> {
        let mut request = self.client.put(self.url_for(date)).json(&delta_kwh);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token.as_str())]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.as_millis() as u64)
            } else {
                TransportError::Io(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(date = %date, delta_kwh, "daily energy stored");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Rejected(format!("http {status}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        routing::put,
        Json, Router,
    };

    type Nodes = Arc<Mutex<HashMap<String, f64>>>;

    async fn put_node(
        State(nodes): State<Nodes>,
        Path(path): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        Json(value): Json<f64>,
    ) -> StatusCode {
        if query.get("auth").map(String::as_str) != Some("secret") {
            return StatusCode::UNAUTHORIZED;
        }
        nodes.lock().unwrap().insert(path, value);
        StatusCode::OK
    }

    async fn spawn_db() -> (String, Nodes) {
        let nodes: Nodes = Arc::default();
        let app = Router::new()
            .route("/*path", put(put_node))
            .with_state(nodes.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });
        (format!("http://{addr}"), nodes)
    }

    fn store(base_url: &str, token: Option<&str>) -> HttpPathStore {
        HttpPathStore::new(
            base_url,
            "/energiHarian/{site}/{date}",
            "room1",
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn url_fills_site_and_date() {
        let s = store("https://example.firebasedatabase.app/", None);
        assert_eq!(
            s.url_for("2026-01-05".parse().unwrap()),
            "https://example.firebasedatabase.app/energiHarian/room1/2026-01-05.json"
        );
    }

    #[tokio::test]
    async fn resending_a_day_overwrites_it() {
        let (base, nodes) = spawn_db().await;
        let s = store(&base, Some("secret"));
        let day: DateKey = "2026-01-05".parse().unwrap();

        s.write_daily_energy(day, 2.1).await.unwrap();
        s.write_daily_energy(day, 2.1).await.unwrap();

        let nodes = nodes.lock().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes.get("energiHarian/room1/2026-01-05.json"), Some(&2.1));
    }

    #[tokio::test]
    async fn refused_write_is_rejected() {
        let (base, _nodes) = spawn_db().await;
        let s = store(&base, Some("wrong"));
        let res = s
            .write_daily_energy("2026-01-05".parse().unwrap(), 2.1)
            .await;
        assert!(matches!(res, Err(TransportError::Rejected(_))));
    }
}
