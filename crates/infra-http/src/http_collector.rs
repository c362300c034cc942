// HTTP EventCollector Implementation

use async_trait::async_trait;
use pulse_core::port::{DeliveryError, EventCollector};
use reqwest::Client;
use tracing::debug;

/// POSTs each payload as a JSON body to the collector endpoint.
///
/// Any 2xx response is a success. The response body is never read.
/// Per-attempt timeouts are enforced by the queue, not here.
pub struct HttpCollector {
    client: Client,
    endpoint: String,
}

impl HttpCollector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventCollector for HttpCollector {
    async fn send(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        debug!(endpoint = %self.endpoint, status = status.as_u16(), "Payload accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, capture the raw request and answer with `status_line`
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/events", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_success_posts_json() {
        let (url, server) = one_shot_server("200 OK").await;
        let collector = HttpCollector::new(url);

        let result = collector.send(&json!({"event_type": "job_saved"})).await;
        assert_eq!(result, Ok(()));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /events"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#"{"event_type":"job_saved"}"#));
    }

    #[tokio::test]
    async fn test_non_2xx_is_status_error() {
        let (url, server) = one_shot_server("503 Service Unavailable").await;
        let collector = HttpCollector::new(url);

        let result = collector.send(&json!({})).await;
        assert_eq!(result, Err(DeliveryError::Status(503)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let collector = HttpCollector::new(format!("http://{}/events", addr));
        let result = collector.send(&json!({})).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }
}
