//! Command execution against an automation driver.
//!
//! This module provides the [`CommandExecutor`] type, which interprets
//! [`CommandDescriptor`]s: it resolves each one, invokes the matching
//! [`DeviceDriver`] action, suspends for waits and inter-command delays, and
//! folds nested sequences into a single [`ExecutionResult`].
//!
//! Execution is total. Missing fields, unknown kinds, tool failures and
//! driver faults all come back as a failed result; nothing is propagated to
//! the caller.
//!
//! # Example
//!
//! ```no_run
//! use droidrelay_core::command::CommandDescriptor;
//! use droidrelay_core::executor::CommandExecutor;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = CommandExecutor::with_adb("adb");
//!
//!     let login = CommandDescriptor::sequence(vec![
//!         CommandDescriptor::tap(540, 1200).with_delay(500),
//!         CommandDescriptor::text("player one"),
//!         CommandDescriptor::key(66),
//!     ]);
//!
//!     let result = executor.execute("127.0.0.1:5555", &login).await;
//!     if result.success {
//!         println!("Logged in");
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use crate::adb::AdbDriver;
use crate::command::{Command, CommandDescriptor, CommandError};
use crate::driver::{DeviceDriver, DriverConfig, ToolOutput};

/// Payload of an [`ExecutionResult`].
///
/// Leaf commands carry the tool's output text; sequences carry their
/// children's results in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Output(String),
    Sequence(Vec<ExecutionResult>),
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the command (and, for sequences, every child) succeeded.
    pub success: bool,
    /// The command kind this result was produced for.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Creates a successful result carrying output text.
    pub fn success(kind: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: kind.into(),
            result: Some(ResultPayload::Output(output.into())),
            error: None,
        }
    }

    /// Creates a failed result with an error message.
    pub fn failure(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// Maps a tool invocation onto a result: status zero is success with the
    /// tool's stdout; anything else fails with its diagnostic output and
    /// keeps stdout alongside.
    pub fn from_tool_output(kind: impl Into<String>, output: ToolOutput) -> Self {
        if output.success() {
            Self::success(kind, output.stdout)
        } else {
            Self {
                success: false,
                kind: kind.into(),
                result: Some(ResultPayload::Output(output.stdout)),
                error: Some(output.stderr),
            }
        }
    }

    /// Returns the output text, if this is a leaf result with output.
    pub fn output(&self) -> Option<&str> {
        match &self.result {
            Some(ResultPayload::Output(text)) => Some(text),
            _ => None,
        }
    }

    /// Returns the child results, if this is a sequence result.
    pub fn children(&self) -> Option<&[ExecutionResult]> {
        match &self.result {
            Some(ResultPayload::Sequence(children)) => Some(children),
            _ => None,
        }
    }
}

/// Outcome of running a list of commands in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOutcome {
    /// Logical AND over every result's `success`.
    pub success: bool,
    /// One result per command, in execution order.
    pub results: Vec<ExecutionResult>,
}

type DispatchFuture<'a> = Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;

/// Executes command descriptors against a device.
///
/// The executor holds a [`DeviceDriver`] and is safe to share across
/// concurrent requests; it keeps no per-request state.
pub struct CommandExecutor {
    driver: Arc<dyn DeviceDriver>,
}

impl CommandExecutor {
    /// Creates a new executor with any [`DeviceDriver`] backend.
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self { driver }
    }

    /// Convenience constructor: an executor using a local adb binary.
    pub fn with_adb(adb_path: impl Into<String>) -> Self {
        Self::new(Arc::new(AdbDriver::new(adb_path)))
    }

    /// Create an executor from a [`DriverConfig`].
    pub fn from_config(config: DriverConfig) -> Self {
        Self::new(config.build())
    }

    /// Returns a reference to the underlying driver.
    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    /// Executes one command descriptor against `device_id`.
    ///
    /// Sequences run their children strictly in order, each to completion
    /// (including its own delay) before the next begins.
    pub async fn execute(&self, device_id: &str, command: &CommandDescriptor) -> ExecutionResult {
        self.dispatch(device_id, command).await
    }

    /// Runs `commands` in order with sequence semantics and returns every
    /// child result plus their conjunction.
    ///
    /// A failing command never stops the ones after it.
    pub async fn execute_all(&self, device_id: &str, commands: &[CommandDescriptor]) -> SequenceOutcome {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.dispatch(device_id, command).await);

            if let Some(delay_ms) = command.positive_delay_ms() {
                debug!(delay_ms, "delay before next command");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        SequenceOutcome {
            success: results.iter().all(|r| r.success),
            results,
        }
    }

    // Boxed so the `sequence` arm can recurse through `execute_all`.
    fn dispatch<'a>(&'a self, device_id: &'a str, command: &'a CommandDescriptor) -> DispatchFuture<'a> {
        let span = info_span!("execute_command", command = %command.kind, device = %device_id);
        Box::pin(
            async move {
                let start = Instant::now();
                let result = match self.run(device_id, command).await {
                    Ok(result) => result,
                    Err(e) => {
                        if let CommandError::Driver(ref err) = e {
                            warn!(error = %err, "automation tool invocation failed");
                        }
                        ExecutionResult::failure(command.kind.clone(), e.to_string())
                    }
                };
                debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    success = result.success,
                    "command complete"
                );
                result
            }
            .instrument(span),
        )
    }

    async fn run(&self, device_id: &str, descriptor: &CommandDescriptor) -> Result<ExecutionResult, CommandError> {
        let command = descriptor.resolve()?;
        let kind = command.name();

        let result = match command {
            Command::Tap { x, y } => {
                let output = self.driver.tap(device_id, x, y).await?;
                ExecutionResult::from_tool_output(kind, output)
            }

            Command::Swipe { x1, y1, x2, y2, duration_ms } => {
                let output = self.driver.swipe(device_id, x1, y1, x2, y2, duration_ms).await?;
                ExecutionResult::from_tool_output(kind, output)
            }

            Command::Key { keycode } => {
                let output = self.driver.key_event(device_id, keycode).await?;
                ExecutionResult::from_tool_output(kind, output)
            }

            Command::Text { text } => {
                let output = self.driver.input_text(device_id, text).await?;
                ExecutionResult::from_tool_output(kind, output)
            }

            Command::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                ExecutionResult::success(kind, format!("Waited {}ms", duration_ms))
            }

            Command::Sequence { commands } => {
                let outcome = self.execute_all(device_id, commands).await;
                ExecutionResult {
                    success: outcome.success,
                    kind: kind.to_string(),
                    result: Some(ResultPayload::Sequence(outcome.results)),
                    error: None,
                }
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::driver::DriverError;

    /// Records every call and answers with a fixed output.
    struct StubDriver {
        output: ToolOutput,
        calls: Mutex<Vec<String>>,
    }

    impl StubDriver {
        fn new(output: ToolOutput) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, call: String) -> Result<ToolOutput, DriverError> {
            self.calls.lock().unwrap().push(call);
            Ok(self.output.clone())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceDriver for StubDriver {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn tap(&self, device_id: &str, x: i32, y: i32) -> Result<ToolOutput, DriverError> {
            self.record(format!("tap {} {} {}", device_id, x, y))
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
            self.record(format!("swipe {} {} {} {} {} {}", device_id, x1, y1, x2, y2, duration_ms))
        }

        async fn key_event(&self, device_id: &str, keycode: i32) -> Result<ToolOutput, DriverError> {
            self.record(format!("key {} {}", device_id, keycode))
        }

        async fn input_text(&self, device_id: &str, text: &str) -> Result<ToolOutput, DriverError> {
            self.record(format!("text {} {}", device_id, text))
        }
    }

    const DEVICE: &str = "127.0.0.1:5555";

    fn missing_text() -> CommandDescriptor {
        CommandDescriptor {
            kind: "text".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult::success("tap", "OK");
        assert!(result.success);
        assert_eq!(result.output(), Some("OK"));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_execution_result_from_failed_tool() {
        let output = ToolOutput {
            status: 1,
            stdout: "partial".to_string(),
            stderr: "error: device offline".to_string(),
        };
        let result = ExecutionResult::from_tool_output("tap", output);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("error: device offline"));
        assert_eq!(result.output(), Some("partial"));
    }

    #[test]
    fn test_execution_result_serialization() {
        let json = serde_json::to_value(ExecutionResult::failure("foo", "Unknown command type: foo")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "type": "foo", "error": "Unknown command type: foo"})
        );

        let nested = ExecutionResult {
            success: true,
            kind: "sequence".to_string(),
            result: Some(ResultPayload::Sequence(vec![ExecutionResult::success("wait", "Waited 5ms")])),
            error: None,
        };
        let json = serde_json::to_value(&nested).unwrap();
        assert_eq!(json["result"][0]["result"], "Waited 5ms");
    }

    #[tokio::test]
    async fn test_tap_success() {
        let driver = StubDriver::new(ToolOutput::ok("OK"));
        let executor = CommandExecutor::new(driver.clone());

        let result = executor.execute(DEVICE, &CommandDescriptor::tap(100, 200)).await;

        assert!(result.success);
        assert_eq!(result.output(), Some("OK"));
        assert!(result.error.is_none());
        assert_eq!(driver.calls(), vec!["tap 127.0.0.1:5555 100 200"]);
    }

    #[tokio::test]
    async fn test_validation_skips_driver() {
        let driver = StubDriver::new(ToolOutput::ok(""));
        let executor = CommandExecutor::new(driver.clone());

        let cases = [
            (r#"{"type": "tap", "y": 1}"#, "Tap requires x and y coordinates"),
            (r#"{"type": "swipe", "x1": 1}"#, "Swipe requires x1, y1, x2, y2 coordinates"),
            (r#"{"type": "key"}"#, "Key command requires keycode"),
            (r#"{"type": "text"}"#, "Text command requires text"),
            (r#"{"type": "sequence"}"#, "Sequence requires commands array"),
            (r#"{"type": "foo"}"#, "Unknown command type: foo"),
        ];

        for (json, message) in cases {
            let command: CommandDescriptor = serde_json::from_str(json).unwrap();
            let result = executor.execute(DEVICE, &command).await;
            assert!(!result.success, "{} should fail", json);
            assert_eq!(result.error.as_deref(), Some(message));
        }
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_swipe_uses_default_duration() {
        let driver = StubDriver::new(ToolOutput::ok(""));
        let executor = CommandExecutor::new(driver.clone());

        executor
            .execute(DEVICE, &CommandDescriptor::swipe(500, 1500, 500, 300, None))
            .await;

        assert_eq!(driver.calls(), vec!["swipe 127.0.0.1:5555 500 1500 500 300 300"]);
    }

    #[tokio::test]
    async fn test_key_and_text_dispatch() {
        let driver = StubDriver::new(ToolOutput::ok(""));
        let executor = CommandExecutor::new(driver.clone());

        executor.execute("emulator-5554", &CommandDescriptor::key(4)).await;
        executor.execute("emulator-5554", &CommandDescriptor::text("hello")).await;

        assert_eq!(
            driver.calls(),
            vec!["key emulator-5554 4", "text emulator-5554 hello"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_default_duration() {
        let executor = CommandExecutor::new(StubDriver::new(ToolOutput::ok("")));

        let start = Instant::now();
        let result = executor.execute(DEVICE, &CommandDescriptor::wait(None)).await;

        assert!(result.success);
        assert_eq!(result.output(), Some("Waited 1000ms"));
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_explicit_duration() {
        let executor = CommandExecutor::new(StubDriver::new(ToolOutput::ok("")));

        let start = Instant::now();
        let result = executor.execute(DEVICE, &CommandDescriptor::wait(Some(250))).await;

        assert_eq!(result.output(), Some("Waited 250ms"));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_running_sequence() {
        let driver = StubDriver::new(ToolOutput::failed(1, "error: no devices/emulators found"));
        let executor = CommandExecutor::new(driver.clone());

        let sequence = CommandDescriptor::sequence(vec![
            CommandDescriptor::wait(Some(1)),
            CommandDescriptor::tap(1, 1),
            CommandDescriptor::wait(Some(1)),
        ]);
        let result = executor.execute(DEVICE, &sequence).await;

        assert!(!result.success);
        let children = result.children().unwrap();
        assert_eq!(children.len(), 3);
        assert!(children[0].success);
        assert!(!children[1].success);
        assert_eq!(children[1].error.as_deref(), Some("error: no devices/emulators found"));
        assert!(children[2].success);
    }

    #[tokio::test]
    async fn test_empty_sequence_succeeds() {
        let executor = CommandExecutor::new(StubDriver::new(ToolOutput::ok("")));
        let result = executor.execute(DEVICE, &CommandDescriptor::sequence(vec![])).await;

        assert!(result.success);
        assert_eq!(result.children().map(|c| c.len()), Some(0));
    }

    #[tokio::test]
    async fn test_execute_all_conjunction() {
        let executor = CommandExecutor::new(StubDriver::new(ToolOutput::ok("")));

        let outcome = executor
            .execute_all(DEVICE, &[CommandDescriptor::key(3), CommandDescriptor::wait(Some(1))])
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 2);

        let outcome = executor
            .execute_all(DEVICE, &[CommandDescriptor::key(3), missing_text()])
            .await;
        assert!(!outcome.success);
        assert!(outcome.results[0].success);
    }
}
