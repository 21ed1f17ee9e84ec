//! Command descriptors and their typed form.
//!
//! A [`CommandDescriptor`] is the wire shape of a single device instruction:
//! a `type` tag plus a flat bag of optional fields. Which fields are required
//! depends on the tag, and that is only checked when the command runs, so a
//! request containing one malformed command still deserializes and the rest
//! of a sequence can execute.
//!
//! [`CommandDescriptor::resolve`] performs the check and yields a [`Command`],
//! the sum type the executor dispatches on.
//!
//! # Example
//!
//! ```
//! use droidrelay_core::command::{Command, CommandDescriptor};
//!
//! let json = r#"{"type": "swipe", "x1": 100, "y1": 800, "x2": 100, "y2": 200}"#;
//! let descriptor: CommandDescriptor = serde_json::from_str(json).unwrap();
//!
//! match descriptor.resolve().unwrap() {
//!     Command::Swipe { duration_ms, .. } => assert_eq!(duration_ms, 300),
//!     other => panic!("unexpected command: {}", other.name()),
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::DriverError;

/// Swipe duration used when a `swipe` command omits `duration`.
pub const DEFAULT_SWIPE_DURATION_MS: u64 = 300;

/// Suspension used when a `wait` command omits `duration`.
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// Errors raised while resolving or running a single command.
///
/// Both variants end up as the `error` string of a failed
/// [`ExecutionResult`](crate::executor::ExecutionResult).
#[derive(Error, Debug)]
pub enum CommandError {
    /// A field required by the command's kind is missing, or the kind is unknown.
    #[error("{0}")]
    Validation(String),

    /// The invocation mechanism of the automation tool failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CommandError {
    fn validation(message: impl Into<String>) -> Self {
        CommandError::Validation(message.into())
    }
}

/// A single device instruction as received over the wire.
///
/// Serialized with a `type` discriminator; every other field is optional and
/// omitted when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Command kind: `tap`, `swipe`, `key`, `text`, `wait` or `sequence`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<i32>,

    /// Swipe gesture length or wait time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    /// Android key code (e.g. 4 for BACK, 3 for HOME).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keycode: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Children of a `sequence`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<CommandDescriptor>>,

    /// Pause in milliseconds after this command when it runs inside a sequence.
    /// Only positive values suspend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,

    /// Free-form note. Carried through, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A validated command, borrowed from its [`CommandDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Tap {
        x: i32,
        y: i32,
    },
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    },
    Key {
        keycode: i32,
    },
    Text {
        text: &'a str,
    },
    Wait {
        duration_ms: u64,
    },
    /// Children stay unresolved so each one is validated when it runs.
    Sequence {
        commands: &'a [CommandDescriptor],
    },
}

impl Command<'_> {
    /// Returns the static kind name, for tracing span fields.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Tap { .. } => "tap",
            Command::Swipe { .. } => "swipe",
            Command::Key { .. } => "key",
            Command::Text { .. } => "text",
            Command::Wait { .. } => "wait",
            Command::Sequence { .. } => "sequence",
        }
    }
}

impl CommandDescriptor {
    fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    /// A `tap` at screen coordinates.
    pub fn tap(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::of_kind("tap")
        }
    }

    /// A `swipe` from `(x1, y1)` to `(x2, y2)`. `None` keeps the default duration.
    pub fn swipe(x1: i32, y1: i32, x2: i32, y2: i32, duration: Option<u64>) -> Self {
        Self {
            x1: Some(x1),
            y1: Some(y1),
            x2: Some(x2),
            y2: Some(y2),
            duration,
            ..Self::of_kind("swipe")
        }
    }

    /// A `key` press.
    pub fn key(keycode: i32) -> Self {
        Self {
            keycode: Some(keycode),
            ..Self::of_kind("key")
        }
    }

    /// A `text` input.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::of_kind("text")
        }
    }

    /// A `wait`. `None` keeps the default of [`DEFAULT_WAIT_MS`].
    pub fn wait(duration: Option<u64>) -> Self {
        Self {
            duration,
            ..Self::of_kind("wait")
        }
    }

    /// A `sequence` of child commands.
    pub fn sequence(commands: Vec<CommandDescriptor>) -> Self {
        Self {
            commands: Some(commands),
            ..Self::of_kind("sequence")
        }
    }

    /// Sets the post-command delay used inside sequences.
    pub fn with_delay(mut self, delay_ms: i64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    /// Returns the delay to apply after this command, if it is positive.
    pub fn positive_delay_ms(&self) -> Option<u64> {
        match self.delay {
            Some(ms) if ms > 0 => Some(ms as u64),
            _ => None,
        }
    }

    /// A zero duration counts as absent.
    fn duration_or(&self, default_ms: u64) -> u64 {
        self.duration.filter(|&ms| ms > 0).unwrap_or(default_ms)
    }

    /// Checks the fields required by this descriptor's kind and returns the
    /// typed [`Command`].
    ///
    /// # Errors
    ///
    /// [`CommandError::Validation`] with the kind-specific message when a
    /// required field is missing, or when the kind is not recognised.
    pub fn resolve(&self) -> Result<Command<'_>, CommandError> {
        match self.kind.as_str() {
            "tap" => match (self.x, self.y) {
                (Some(x), Some(y)) => Ok(Command::Tap { x, y }),
                _ => Err(CommandError::validation("Tap requires x and y coordinates")),
            },
            "swipe" => match (self.x1, self.y1, self.x2, self.y2) {
                (Some(x1), Some(y1), Some(x2), Some(y2)) => Ok(Command::Swipe {
                    x1,
                    y1,
                    x2,
                    y2,
                    duration_ms: self.duration_or(DEFAULT_SWIPE_DURATION_MS),
                }),
                _ => Err(CommandError::validation(
                    "Swipe requires x1, y1, x2, y2 coordinates",
                )),
            },
            "key" => self
                .keycode
                .map(|keycode| Command::Key { keycode })
                .ok_or_else(|| CommandError::validation("Key command requires keycode")),
            "text" => self
                .text
                .as_deref()
                .map(|text| Command::Text { text })
                .ok_or_else(|| CommandError::validation("Text command requires text")),
            "wait" => Ok(Command::Wait {
                duration_ms: self.duration_or(DEFAULT_WAIT_MS),
            }),
            "sequence" => self
                .commands
                .as_deref()
                .map(|commands| Command::Sequence { commands })
                .ok_or_else(|| CommandError::validation("Sequence requires commands array")),
            other => Err(CommandError::Validation(format!(
                "Unknown command type: {}",
                other
            ))),
        }
    }
}

/// Sets `delay_ms` after every command except the last.
///
/// Any delay the last command carried is cleared, so the list can be run
/// back to back with another one.
pub fn with_delays(commands: Vec<CommandDescriptor>, delay_ms: i64) -> Vec<CommandDescriptor> {
    let last = commands.len().saturating_sub(1);
    commands
        .into_iter()
        .enumerate()
        .map(|(index, mut command)| {
            command.delay = (index < last).then_some(delay_ms);
            command
        })
        .collect()
}
