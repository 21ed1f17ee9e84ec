//! Shared test helpers for droidrelay-core integration tests.
//!
//! This module provides a scriptable mock driver that records each action
//! with the (tokio) time it was issued, so tests can check ordering and
//! delays without a device.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use droidrelay_core::driver::{DeviceDriver, DriverError, ToolOutput};
use droidrelay_core::executor::CommandExecutor;

/// Describes how the mock answers a single action.
pub enum MockBehavior {
    /// Reply with the given output.
    Respond(ToolOutput),
    /// Sleep for `Duration`, then reply.
    Delay(Duration, ToolOutput),
    /// Fail the invocation mechanism itself.
    Fault(String),
}

/// One action the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub device_id: String,
    pub action: String,
    pub at: Instant,
}

/// Mock automation tool whose replies are scripted per call.
///
/// Once the script is exhausted every further call succeeds with `"OK"`.
pub struct MockDriver {
    script: Mutex<VecDeque<MockBehavior>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockDriver {
    pub fn new(script: Vec<MockBehavior>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A mock that succeeds with `"OK"` for every call.
    pub fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    async fn handle(&self, device_id: &str, action: String) -> Result<ToolOutput, DriverError> {
        self.calls.lock().unwrap().push(RecordedCall {
            device_id: device_id.to_string(),
            action,
            at: Instant::now(),
        });

        let behavior = self.script.lock().unwrap().pop_front();
        match behavior {
            None => Ok(ToolOutput::ok("OK")),
            Some(MockBehavior::Respond(output)) => Ok(output),
            Some(MockBehavior::Delay(duration, output)) => {
                tokio::time::sleep(duration).await;
                Ok(output)
            }
            Some(MockBehavior::Fault(message)) => Err(DriverError::Unavailable {
                url: "mock://device".to_string(),
                message,
            }),
        }
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn tap(&self, device_id: &str, x: i32, y: i32) -> Result<ToolOutput, DriverError> {
        self.handle(device_id, format!("tap {} {}", x, y)).await
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
        self.handle(device_id, format!("swipe {} {} {} {} {}", x1, y1, x2, y2, duration_ms))
            .await
    }

    async fn key_event(&self, device_id: &str, keycode: i32) -> Result<ToolOutput, DriverError> {
        self.handle(device_id, format!("key {}", keycode)).await
    }

    async fn input_text(&self, device_id: &str, text: &str) -> Result<ToolOutput, DriverError> {
        self.handle(device_id, format!("text {}", text)).await
    }
}

/// Convenience: an executor over a fresh mock with the given script.
pub fn mock_executor(script: Vec<MockBehavior>) -> (CommandExecutor, Arc<MockDriver>) {
    let driver = MockDriver::new(script);
    (CommandExecutor::new(driver.clone()), driver)
}
