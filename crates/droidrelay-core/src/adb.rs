//! Driver backed by the Android Debug Bridge.
//!
//! [`AdbDriver`] runs `adb -s <device> shell input ...` for every action and
//! reports the process exit status and captured output. Device connection
//! (`adb connect`, authorisation prompts) is left to whoever runs the adb
//! server; a disconnected device simply yields a non-zero status.
//!
//! # Requirements
//!
//! An `adb` binary must be on `PATH`, or configured explicitly with
//! [`AdbDriver::new`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::driver::{DeviceDriver, DriverError, ToolOutput};
use crate::keycode::ENTER as KEYCODE_ENTER;

/// Default bound on a single adb invocation.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Characters the device shell would otherwise interpret in `input text`.
const SHELL_SPECIAL: &[char] = &[
    '\\', '"', '\'', '`', '$', '&', '|', ';', '<', '>', '(', ')', '*', '~', '?', '#', '!', '[', ']',
    '{', '}',
];

/// Escapes text for `adb shell input text`.
///
/// Spaces become `%s` (the encoding `input text` understands) and shell
/// metacharacters are backslash-escaped so they reach the device verbatim.
/// Control characters are dropped: the device shell would treat a newline as
/// a command separator. [`AdbDriver`] splits multi-line text and presses
/// ENTER between lines before escaping each one.
///
/// `input text` decodes `%s` itself, so a literal `%s` in the input still
/// arrives on the device as a space. There is no escape for it.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => escaped.push_str("%s"),
            c if c.is_control() => {}
            c if SHELL_SPECIAL.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Builds the full argument list for an `input` subcommand on a device.
fn shell_input_args(device_id: &str, input: &[String]) -> Vec<String> {
    let mut args = vec![
        "-s".to_string(),
        device_id.to_string(),
        "shell".to_string(),
        "input".to_string(),
    ];
    args.extend(input.iter().cloned());
    args
}

/// Splits text into `input` invocations: one `text` per line with an ENTER
/// key event between lines. Blank lines only produce the key event.
fn text_invocations(text: &str) -> Vec<Vec<String>> {
    let multiline = text.contains('\n');
    let mut invocations = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            invocations.push(vec!["keyevent".to_string(), KEYCODE_ENTER.to_string()]);
        }
        let escaped = escape_input_text(line);
        if !escaped.is_empty() || !multiline {
            invocations.push(vec!["text".to_string(), escaped]);
        }
    }
    invocations
}

/// Driver that shells out to a local adb binary.
#[derive(Debug, Clone)]
pub struct AdbDriver {
    adb_path: String,
    timeout: Duration,
}

impl Default for AdbDriver {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl AdbDriver {
    /// Creates a driver invoking the adb executable at `adb_path`.
    pub fn new(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Overrides the per-invocation timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Returns the configured adb executable.
    pub fn adb_path(&self) -> &str {
        &self.adb_path
    }

    async fn run_input(&self, device_id: &str, input: &[String]) -> Result<ToolOutput, DriverError> {
        let args = shell_input_args(device_id, input);
        debug!(program = %self.adb_path, args = ?args, "invoking adb");

        let mut command = Command::new(&self.adb_path);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|source| DriverError::Spawn {
                program: self.adb_path.clone(),
                source,
            })?,
            Err(_) => {
                return Err(DriverError::Timeout {
                    program: self.adb_path.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        Ok(ToolOutput {
            // Killed by a signal: no exit code.
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl DeviceDriver for AdbDriver {
    fn name(&self) -> &'static str {
        "adb"
    }

    async fn tap(&self, device_id: &str, x: i32, y: i32) -> Result<ToolOutput, DriverError> {
        self.run_input(device_id, &["tap".to_string(), x.to_string(), y.to_string()])
            .await
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
        let input = [
            "swipe".to_string(),
            x1.to_string(),
            y1.to_string(),
            x2.to_string(),
            y2.to_string(),
            duration_ms.to_string(),
        ];
        self.run_input(device_id, &input).await
    }

    async fn key_event(&self, device_id: &str, keycode: i32) -> Result<ToolOutput, DriverError> {
        self.run_input(device_id, &["keyevent".to_string(), keycode.to_string()])
            .await
    }

    async fn input_text(&self, device_id: &str, text: &str) -> Result<ToolOutput, DriverError> {
        let mut stdout = String::new();
        for input in text_invocations(text) {
            let output = self.run_input(device_id, &input).await?;
            if !output.success() {
                return Ok(output);
            }
            stdout.push_str(&output.stdout);
        }
        Ok(ToolOutput::ok(stdout))
    }
}
