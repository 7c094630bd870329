use std::time::Duration;

use tokio::net::TcpStream;

use crate::pipeline::LinkProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Recovered,
    Lost,
}

/// Turns periodic link observations into edge events.
///
/// Nothing is known about the link at start, so the first observation is
/// always an edge. A backlog left over from a previous boot is therefore
/// drained as soon as the link is first seen up.
#[derive(Debug, Default)]
pub struct ConnectivityMonitor {
    last: Option<bool>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, up: bool) -> Option<LinkEvent> {
        let previous = self.last.replace(up);
        match (previous, up) {
            (Some(true), true) | (Some(false), false) => None,
            (_, true) => {
                tracing::info!("link to remote store recovered");
                Some(LinkEvent::Recovered)
            }
            (_, false) => {
                tracing::warn!("link to remote store lost");
                Some(LinkEvent::Lost)
            }
        }
    }
}

/// Probes the remote store by opening a TCP connection to it.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl LinkProbe for TcpProbe {
    async fn is_up(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, addr = %self.addr, "link probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, "link probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_up_observation_is_a_recovery() {
        let mut monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.observe(true), Some(LinkEvent::Recovered));
        assert_eq!(monitor.observe(true), None);
    }

    #[test]
    fn only_edges_are_reported() {
        let mut monitor = ConnectivityMonitor::new();
        let events: Vec<_> = [false, false, true, true, false, true]
            .into_iter()
            .map(|up| monitor.observe(up))
            .collect();
        assert_eq!(
            events,
            vec![
                Some(LinkEvent::Lost),
                None,
                Some(LinkEvent::Recovered),
                None,
                Some(LinkEvent::Lost),
                Some(LinkEvent::Recovered),
            ]
        );
    }

    #[tokio::test]
    async fn probe_sees_a_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(2));
        assert!(probe.is_up().await);

        drop(listener);
        assert!(!probe.is_up().await);
    }
}
