//! HTTP transport
//!
//! Sends envelopes as JSON to `POST {address}/message` and probes
//! `GET {address}/health`.

use super::retry::{retry_with_backoff, AttemptError, RetryPolicy};
use super::Transport;
use crate::config::TransportConfig;
use crate::error::{RelayError, Result};
use crate::protocol::Envelope;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// HTTP-based transport for agent envelopes
pub struct HttpTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpTransport {
    /// Create from the transport configuration section
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Self::with_policy(
            config.retry_policy(),
            config.timeout(),
            config.health_timeout(),
        )
    }

    /// Create with an explicit retry policy and timeouts
    pub fn with_policy(
        policy: RetryPolicy,
        timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            timeout,
            health_timeout,
        })
    }

    /// Current retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn post_once(
        &self,
        endpoint: &str,
        payload: &Value,
        envelope: &Envelope,
        attempt: u32,
    ) -> std::result::Result<Value, AttemptError> {
        tracing::info!(
            kind = %envelope.kind(),
            from = %envelope.from_agent,
            to = %envelope.to_agent,
            attempt = attempt + 1,
            "Sending envelope to {}",
            endpoint
        );

        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;

        let status = response.status();

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Transient(format!(
                "{}: {}",
                status,
                error_message(&body)
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            AttemptError::Fatal(RelayError::malformed_response(
                envelope.to_agent.clone(),
                format!("response body is not JSON: {}", e),
            ))
        })?;

        let reported = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(
            to = %envelope.to_agent,
            status = reported,
            "Received response"
        );

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &Envelope, target: &str) -> Result<Value> {
        let endpoint = format!("{}/message", target.trim_end_matches('/'));
        let payload = envelope.to_value()?;

        retry_with_backoff(&self.policy, |attempt| {
            self.post_once(&endpoint, &payload, envelope, attempt)
        })
        .await
    }

    async fn check_health(&self, address: &str) -> bool {
        let url = format!("{}/health", address.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::warn!("Health check failed for {}: {}", address, e);
                false
            }
        }
    }
}

/// Pull `error` out of a JSON body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Nothing listens on port 1 on a test host
    const DEAD_ADDRESS: &str = "http://127.0.0.1:1";

    fn fast_transport(max_attempts: u32) -> HttpTransport {
        HttpTransport::with_policy(
            RetryPolicy::new(max_attempts, Duration::from_millis(1)),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"bad action"}"#), "bad action");
        assert_eq!(error_message("  plain failure \n"), "plain failure");
    }

    #[tokio::test]
    async fn test_send_to_dead_address_exhausts() {
        let transport = fast_transport(2);
        let envelope = Envelope::request("Orchestrator", "Analyst", "analyze_request", JsonMap::new());
        let err = transport.send(&envelope, DEAD_ADDRESS).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::TransportExhausted { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_health_of_dead_address_is_false() {
        let transport = fast_transport(1);
        assert!(!transport.check_health(DEAD_ADDRESS).await);
    }

    /// Answers each connection with the next scripted status, repeating the last
    async fn scripted_agent(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];
                read_request(&mut socket).await;

                let body = if status == 200 {
                    r#"{"status":"analyzed"}"#.to_string()
                } else {
                    format!(r#"{{"error":"scripted {}"}}"#, status)
                };
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (address, hits)
    }

    /// Consume headers and a content-length body
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn analyze() -> Envelope {
        Envelope::request("Orchestrator", "Analyst", "analyze_request", JsonMap::new())
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let (address, hits) = scripted_agent(vec![503, 503, 200]).await;
        let body = fast_transport(3).send(&analyze(), &address).await.unwrap();
        assert_eq!(body["status"], "analyzed");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_server_error_exhausts_attempts() {
        let (address, hits) = scripted_agent(vec![500]).await;
        let err = fast_transport(3).send(&analyze(), &address).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::TransportExhausted { attempts: 3, .. }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_rejected_without_retry() {
        let (address, hits) = scripted_agent(vec![404]).await;
        let err = fast_transport(3).send(&analyze(), &address).await.unwrap_err();
        assert!(matches!(err, RelayError::TransportRejected { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health_requires_ok_status() {
        let (healthy, _) = scripted_agent(vec![200]).await;
        let (no_content, _) = scripted_agent(vec![204]).await;
        let (failing, _) = scripted_agent(vec![500]).await;

        let transport = fast_transport(1);
        assert!(transport.check_health(&healthy).await);
        assert!(!transport.check_health(&no_content).await);
        assert!(!transport.check_health(&failing).await);
    }

    #[test]
    fn test_new_from_config() {
        let config = TransportConfig::default();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.policy().max_attempts, 3);
    }
}
