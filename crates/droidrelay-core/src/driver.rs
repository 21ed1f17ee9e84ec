//! Automation driver trait for backend-agnostic device interaction.
//!
//! This module defines the [`DeviceDriver`] trait, the contract between the
//! executor and whatever actually touches the device. A driver performs one
//! of four actions against a device identifier and reports what the
//! underlying tool reported: an exit status, its standard output and its
//! diagnostic output.
//!
//! A non-zero status is a normal outcome, not an error. [`DriverError`] is
//! reserved for the invocation mechanism itself failing (the tool could not
//! be spawned, the remote service was unreachable, the call timed out).
//!
//! # Backend Selection
//!
//! Use [`DriverConfig`] to pick a backend at runtime:
//!
//! ```no_run
//! use droidrelay_core::driver::DriverConfig;
//!
//! // Shell out to a local adb binary
//! let config = DriverConfig::Adb {
//!     adb_path: "adb".to_string(),
//!     timeout_ms: 30_000,
//! };
//!
//! // Forward to a remote automation service
//! let config = DriverConfig::Remote {
//!     base_url: "http://localhost:8000".to_string(),
//!     api_key: Some("secret".to_string()),
//!     timeout_ms: 30_000,
//! };
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::adb::AdbDriver;
use crate::remote::RemoteDriver;

/// Errors raised when the automation tool cannot be invoked at all.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The tool process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish within the configured time.
    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    /// The remote automation service could not be reached.
    #[error("Automation service not available at {url}: {message}")]
    Unavailable { url: String, message: String },
}

/// What the automation tool reported for a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit status; zero means the action succeeded.
    pub status: i32,
    /// Standard output payload.
    pub stdout: String,
    /// Diagnostic payload, meaningful when `status` is non-zero.
    pub stderr: String,
}

impl ToolOutput {
    /// A zero-status output carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given status and diagnostic text.
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the tool exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Configuration for selecting an automation backend at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverConfig {
    /// Invoke a local `adb` binary.
    Adb {
        /// Path or name of the adb executable.
        adb_path: String,
        /// Upper bound on a single invocation, in milliseconds.
        timeout_ms: u64,
    },
    /// Forward actions to a remote automation service over HTTP.
    Remote {
        /// Base URL of the service, e.g. `http://localhost:8000`.
        base_url: String,
        /// Bearer token sent with each request.
        api_key: Option<String>,
        /// Upper bound on a single request, in milliseconds.
        timeout_ms: u64,
    },
}

impl DriverConfig {
    /// Builds the driver this configuration describes.
    pub fn build(self) -> Arc<dyn DeviceDriver> {
        match self {
            DriverConfig::Adb { adb_path, timeout_ms } => {
                Arc::new(AdbDriver::new(adb_path).with_timeout_ms(timeout_ms))
            }
            DriverConfig::Remote { base_url, api_key, timeout_ms } => {
                Arc::new(RemoteDriver::new(base_url, api_key).with_timeout_ms(timeout_ms))
            }
        }
    }
}

/// Trait for the external automation tool.
///
/// Each method targets the device named by `device_id` and resolves to the
/// tool's [`ToolOutput`]. Implementors must be shareable across concurrent
/// requests; the executor holds them behind an `Arc`.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Short backend name, used in logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Tap at screen coordinates.
    async fn tap(&self, device_id: &str, x: i32, y: i32) -> Result<ToolOutput, DriverError>;

    /// Swipe from `(x1, y1)` to `(x2, y2)` over `duration_ms` milliseconds.
    async fn swipe(
        &self,
        device_id: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<ToolOutput, DriverError>;

    /// Press a key by Android key code.
    async fn key_event(&self, device_id: &str, keycode: i32) -> Result<ToolOutput, DriverError>;

    /// Type text into the focused input.
    async fn input_text(&self, device_id: &str, text: &str) -> Result<ToolOutput, DriverError>;
}
