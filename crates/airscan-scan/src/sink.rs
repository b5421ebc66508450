//! Best-effort reporting of observed networks to the ingestion service.

use std::sync::Arc;
use std::time::Duration;

use airscan_core::NetworkObservation;

use crate::config::SinkConfig;

/// Receives observations. `submit` must return without waiting on delivery.
pub trait ObservationSink: Send + Sync {
    fn submit(&self, observation: NetworkObservation);
}

/// Drops every observation.
pub struct NullSink;

impl ObservationSink for NullSink {
    fn submit(&self, _observation: NetworkObservation) {}
}

/// POSTs each observation as JSON from a detached task.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self::with_client(client, url)
    }

    pub fn with_client(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(&config.url, Duration::from_millis(config.timeout_ms))
    }

    /// Deliver one observation, logging instead of failing.
    pub async fn send(&self, observation: &NetworkObservation) {
        match self.client.post(&self.url).json(observation).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(bssid = %observation.bssid, "Observation delivered");
            }
            Ok(resp) => {
                tracing::warn!(
                    bssid = %observation.bssid,
                    status = %resp.status(),
                    "Ingestion service rejected observation"
                );
            }
            Err(e) => {
                tracing::warn!(bssid = %observation.bssid, error = %e, "Failed to send observation");
            }
        }
    }
}

impl ObservationSink for HttpSink {
    fn submit(&self, observation: NetworkObservation) {
        let sink = self.clone();
        tokio::spawn(async move {
            sink.send(&observation).await;
        });
    }
}

/// Build the sink described by `config`.
pub fn build_sink(config: &SinkConfig) -> Arc<dyn ObservationSink> {
    if config.enabled {
        Arc::new(HttpSink::from_config(config))
    } else {
        Arc::new(NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airscan_core::WpsState;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn observation() -> NetworkObservation {
        NetworkObservation {
            bssid: "aa:aa:aa:aa:aa:01".into(),
            essid: "MyNet".into(),
            signal_strength: -40,
            latitude: None,
            longitude: None,
            client_number: 2,
            password: None,
            security_types: vec!["WPA2".into()],
            wps: WpsState::None,
        }
    }

    #[tokio::test]
    async fn test_send_posts_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !(buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.ends_with(b"}")) {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            sock.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let sink = HttpSink::with_client(client, &format!("http://{addr}/api/packets"));
        sink.send(&observation()).await;

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/packets"));
        assert!(request.contains("\"mac_address\":\"aa:aa:aa:aa:aa:01\""));
        assert!(request.contains("\"is_wps\":\"NONE\""));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_swallowed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = HttpSink::new(
            &format!("http://{addr}/api/packets"),
            Duration::from_millis(200),
        );
        sink.send(&observation()).await;
        sink.submit(observation());
    }

    #[test]
    fn test_disabled_sink_config() {
        let config = SinkConfig {
            enabled: false,
            ..Default::default()
        };
        build_sink(&config).submit(observation());
    }
}
