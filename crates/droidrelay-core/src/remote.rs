//! Driver that forwards actions to a remote automation service.
//!
//! Some deployments keep adb on a separate host behind a small HTTP service.
//! [`RemoteDriver`] posts each action to `{base_url}/api/adb/execute` as
//!
//! ```json
//! {"device_id": "127.0.0.1:5555", "command": {"type": "tap", "x": 100, "y": 200}}
//! ```
//!
//! and maps the HTTP exchange onto a [`ToolOutput`]: a 2xx response is
//! status 0 with the body as stdout, anything else uses the HTTP status code
//! as the exit status and the body as the diagnostic output. A request that
//! gets no complete response within the timeout fails with
//! [`DriverError::Timeout`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::adb::DEFAULT_TIMEOUT_MS;
use crate::command::CommandDescriptor;
use crate::driver::{DeviceDriver, DriverError, ToolOutput};

const EXECUTE_PATH: &str = "/api/adb/execute";

/// Driver that relays actions over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteDriver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteDriver {
    /// Creates a driver for the service at `base_url`.
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Full URL of the execute endpoint.
    pub fn execute_url(&self) -> String {
        format!("{}{}", self.base_url, EXECUTE_PATH)
    }

    fn payload(device_id: &str, command: &CommandDescriptor) -> Value {
        json!({
            "device_id": device_id,
            "command": command,
        })
    }

    async fn post(&self, device_id: &str, command: CommandDescriptor) -> Result<ToolOutput, DriverError> {
        let url = self.execute_url();
        debug!(%url, command = %command.kind, "forwarding to automation service");

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&Self::payload(device_id, &command));
        // The service expects the header even when no key is configured.
        request = request.bearer_auth(self.api_key.as_deref().unwrap_or_default());

        let unavailable = |e: reqwest::Error| {
            if e.is_timeout() {
                DriverError::Timeout {
                    program: url.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                DriverError::Unavailable {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        };

        let response = request.send().await.map_err(unavailable)?;
        let status = response.status();
        let body = response.text().await.map_err(unavailable)?;

        if status.is_success() {
            Ok(ToolOutput::ok(body))
        } else {
            Ok(ToolOutput::failed(i32::from(status.as_u16()), body))
        }
    }
}

#[async_trait]
impl DeviceDriver for RemoteDriver {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn tap(&self, device_id: &str, x: i32, y: i32) -> Result<ToolOutput, DriverError> {
        self.post(device_id, CommandDescriptor::tap(x, y)).await
    }

    async fn swipe(
        &self,
        device_id: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<ToolOutput, DriverError> {
        self.post(device_id, CommandDescriptor::swipe(x1, y1, x2, y2, Some(duration_ms)))
            .await
    }

    async fn key_event(&self, device_id: &str, keycode: i32) -> Result<ToolOutput, DriverError> {
        self.post(device_id, CommandDescriptor::key(keycode)).await
    }

    async fn input_text(&self, device_id: &str, text: &str) -> Result<ToolOutput, DriverError> {
        self.post(device_id, CommandDescriptor::text(text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one HTTP request with a canned status and body, returning the
    /// raw request text through the join handle.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/", addr), handle)
    }

    #[test]
    fn test_execute_url_trims_slash() {
        let driver = RemoteDriver::new("http://localhost:8000/", None);
        assert_eq!(driver.execute_url(), "http://localhost:8000/api/adb/execute");
    }

    #[test]
    fn test_payload_shape() {
        let payload = RemoteDriver::payload("127.0.0.1:5555", &CommandDescriptor::tap(100, 200));
        assert_eq!(
            payload,
            json!({
                "device_id": "127.0.0.1:5555",
                "command": {"type": "tap", "x": 100, "y": 200}
            })
        );
    }

    #[tokio::test]
    async fn test_success_maps_to_zero_status() {
        let (url, server) = one_shot_server("200 OK", r#"{"ok":true}"#).await;
        let driver = RemoteDriver::new(url, Some("secret".to_string()));

        let output = driver.tap("127.0.0.1:5555", 100, 200).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, r#"{"ok":true}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/adb/execute"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(r#""type":"tap""#));
    }

    #[tokio::test]
    async fn test_http_error_maps_to_status_and_stderr() {
        let (url, server) = one_shot_server("503 Service Unavailable", "device offline").await;
        let driver = RemoteDriver::new(url, None);

        let output = driver.key_event("127.0.0.1:5555", 4).await.unwrap();
        assert_eq!(output.status, 503);
        assert_eq!(output.stderr, "device offline");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_service_times_out() {
        // Accepts the connection and reads the request, but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            while stream.read(&mut buf).await.map(|n| n > 0).unwrap_or(false) {}
        });

        let driver = RemoteDriver::new(format!("http://{}", addr), None).with_timeout_ms(200);
        let started = std::time::Instant::now();
        match driver.tap("127.0.0.1:5555", 1, 2).await {
            Err(DriverError::Timeout { program, timeout_ms }) => {
                assert!(program.ends_with("/api/adb/execute"));
                assert_eq!(timeout_ms, 200);
            }
            other => panic!("expected timeout error, got {:?}", other),
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let driver = RemoteDriver::new(format!("http://{}", addr), None);
        match driver.input_text("127.0.0.1:5555", "hi").await {
            Err(DriverError::Unavailable { url, .. }) => {
                assert!(url.ends_with("/api/adb/execute"))
            }
            other => panic!("expected unavailable error, got {:?}", other),
        }
    }
}
