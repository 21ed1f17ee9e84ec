//! # droidrelay-core
//!
//! Core library for relaying automation commands to Android devices.
//!
//! This crate holds the command model and the executor that interprets it,
//! independent of how commands arrive (HTTP server, CLI) or how they reach a
//! device (local adb, remote automation service).
//!
//! ## Modules
//!
//! - [`command`] - Command descriptors and their validated form
//! - [`keycode`] - Named Android key codes
//! - [`executor`] - Recursive command execution with delays and result aggregation
//! - [`driver`] - The [`DeviceDriver`](driver::DeviceDriver) trait and backend selection
//! - [`adb`] - Driver that shells out to `adb shell input`
//! - [`remote`] - Driver that forwards actions to an automation service over HTTP
//! - [`config`] - Persistent settings in `~/.droidrelay/config.json`
//!
//! ## External Dependencies
//!
//! The default backend requires the Android platform tools (`adb`) and a
//! device already visible to the adb server (`adb devices`).
//!
//! ## Example
//!
//! ```no_run
//! use droidrelay_core::command::CommandDescriptor;
//! use droidrelay_core::executor::CommandExecutor;
//!
//! # async fn example() {
//! let executor = CommandExecutor::with_adb("adb");
//! let result = executor
//!     .execute("emulator-5554", &CommandDescriptor::tap(100, 200))
//!     .await;
//! assert!(result.success, "{:?}", result.error);
//! # }
//! ```

pub mod adb;
pub mod command;
pub mod config;
pub mod driver;
pub mod executor;
pub mod keycode;
pub mod remote;
