//! Worker Node - Record Push
//!
//! Delivers each encoded record to every configured aggregator, one after
//! the other. A failing destination is logged and skipped; it never holds
//! back the others beyond its own timeout.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("push to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
}

/// Ingestion endpoint under an aggregator base URL.
pub fn ingest_url(base_url: &str) -> String {
    format!("{}/in", base_url.trim_end_matches('/'))
}

pub struct Pusher {
    client: Client,
    destinations: Vec<String>,
}

impl Pusher {
    pub fn new(config: &WorkerConfig) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(config.push_timeout)
            .build()
            .map_err(PushError::Client)?;

        Ok(Self {
            client,
            destinations: config.master_urls.clone(),
        })
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// POST `record` to one aggregator.
    pub async fn push(&self, base_url: &str, record: &str) -> Result<(), PushError> {
        let url = ingest_url(base_url);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(record.to_owned())
            .send()
            .await
            .map_err(|source| PushError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Status { url, status });
        }
        Ok(())
    }

    /// Push to every destination in order; returns how many accepted it.
    pub async fn push_all(&self, record: &str) -> usize {
        let mut delivered = 0;
        for base_url in &self.destinations {
            match self.push(base_url, record).await {
                Ok(()) => {
                    delivered += 1;
                    debug!(master = %base_url, "Record pushed");
                }
                Err(e) => warn!(master = %base_url, error = %e, "Push failed"),
            }
        }
        delivered
    }
}

/// Random start-up delay in `[0, max)`, so reporters started together do
/// not push in lockstep.
pub fn rand_jitter(max: Duration) -> Duration {
    use rand::Rng;
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Router};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<String>>>;

    async fn accept(State(received): State<Received>, body: String) -> &'static str {
        received.lock().unwrap().push(body);
        "OK"
    }

    async fn reject() -> AxumStatus {
        AxumStatus::SERVICE_UNAVAILABLE
    }

    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "OK"
    }

    /// Test aggregator with a healthy, a failing and a stalled ingest path.
    async fn spawn_server() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/ok/in", post(accept))
            .route("/broken/in", post(reject))
            .route("/slow/in", post(stall))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    fn config(urls: Vec<String>) -> WorkerConfig {
        WorkerConfig {
            master_urls: urls,
            push_timeout: Duration::from_millis(300),
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn ingest_url_appends_path_once() {
        assert_eq!(ingest_url("http://m:8080"), "http://m:8080/in");
        assert_eq!(ingest_url("http://m:8080/"), "http://m:8080/in");
    }

    #[test]
    fn jitter_stays_below_interval() {
        let max = Duration::from_secs(3);
        for _ in 0..1000 {
            assert!(rand_jitter(max) < max);
        }
        assert_eq!(rand_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn failing_destinations_do_not_block_the_rest() {
        let (base, received) = spawn_server().await;
        let pusher = Pusher::new(&config(vec![
            format!("{base}/broken"),
            "http://127.0.0.1:1".to_string(),
            format!("{base}/slow"),
            format!("{base}/ok/"),
        ]))
        .unwrap();

        let delivered = pusher.push_all("n1 record").await;

        assert_eq!(delivered, 1);
        assert_eq!(*received.lock().unwrap(), vec!["n1 record".to_string()]);
    }

    #[tokio::test]
    async fn push_reports_status_and_timeouts() {
        let (base, _) = spawn_server().await;
        let pusher = Pusher::new(&config(vec![])).unwrap();

        match pusher.push(&format!("{base}/broken"), "x").await {
            Err(PushError::Status { status, .. }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(matches!(
            pusher.push(&format!("{base}/slow"), "x").await,
            Err(PushError::Request { .. })
        ));
        assert!(pusher.push(&format!("{base}/ok"), "x").await.is_ok());
    }
}
