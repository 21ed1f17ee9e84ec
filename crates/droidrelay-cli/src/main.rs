//! Command-line runner for Android device automation commands.
//!
//! Runs commands directly against a device through the same executor the
//! relay server uses, without a server in between.
//!
//! # Usage
//!
//! ```bash
//! # Tap at coordinates on the default device
//! droidrelay tap 540 1200
//!
//! # Swipe up over half a second on a specific device
//! droidrelay -d emulator-5554 swipe 540 1600 540 400 --duration 500
//!
//! # Press BACK (by name or by key code)
//! droidrelay key back
//! droidrelay key 4
//!
//! # Type text
//! droidrelay text "hello world"
//!
//! # Run a command file (a descriptor or a JSON list of descriptors)
//! droidrelay run login.json
//! cat login.json | droidrelay --format json run -
//!
//! # Persist the default device in ~/.droidrelay/config.json
//! droidrelay config set default_device_id emulator-5554
//! droidrelay config show
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use droidrelay_core::command::CommandDescriptor;
use droidrelay_core::config::{ConfigError, RelayConfig, KEYS as CONFIG_KEYS};
use droidrelay_core::keycode;
use droidrelay_core::executor::{CommandExecutor, ExecutionResult, SequenceOutcome};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Command-line runner for Android device automation commands.
#[derive(Parser)]
#[command(name = "droidrelay")]
#[command(about = "Run tap, swipe, key, text and wait commands against an Android device")]
#[command(version)]
struct Cli {
    /// Device to target (adb serial or host:port)
    #[arg(short, long, env = "DROIDRELAY_DEVICE")]
    device: Option<String>,

    /// Path to the adb executable
    #[arg(long, env = "DROIDRELAY_ADB")]
    adb_path: Option<String>,

    /// Forward actions to a remote automation service instead of local adb
    #[arg(long, env = "DROIDRELAY_REMOTE_URL")]
    remote_url: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Tap at screen coordinates
    Tap {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
    },

    /// Swipe between two points
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        /// Gesture duration in milliseconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Press a key by name (home, back, enter, ...) or Android key code
    Key {
        #[arg(value_parser = parse_keycode)]
        keycode: i32,
    },

    /// Type text into the focused input
    Text {
        text: String,
    },

    /// Pause without touching the device
    Wait {
        /// Milliseconds to wait
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Run a JSON command file: one descriptor or a list of descriptors
    Run {
        /// Path to the file, or `-` for stdin
        file: PathBuf,
    },

    /// Show or edit ~/.droidrelay/config.json
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config file contents
    Show,
    /// Set one setting; an empty value clears optional settings
    Set {
        /// One of: adb_path, default_device_id, tool_timeout_ms, remote_url, remote_api_key, auth_token
        key: String,
        value: String,
    },
}

fn parse_keycode(input: &str) -> Result<i32, String> {
    keycode::parse(input).ok_or_else(|| {
        let names: Vec<String> = keycode::NAMED
            .iter()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        format!("expected a key code or one of: {}", names.join(", "))
    })
}

#[derive(Debug)]
enum CliError {
    Input(String),
    CommandFailed,
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::CommandFailed => ExitCode::from(1),
            CliError::Input(_) => ExitCode::from(2),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Input(msg) => write!(f, "Input error: {}", msg),
            CliError::CommandFailed => write!(f, "Command failed"),
        }
    }
}

/// What a `run` file contains.
enum Script {
    Single(CommandDescriptor),
    List(Vec<CommandDescriptor>),
}

fn parse_script(json: &str) -> Result<Script, CliError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| CliError::Input(format!("Invalid JSON: {}", e)))?;
    let script = if value.is_array() {
        Script::List(
            serde_json::from_value(value)
                .map_err(|e| CliError::Input(format!("Invalid command list: {}", e)))?,
        )
    } else {
        Script::Single(
            serde_json::from_value(value)
                .map_err(|e| CliError::Input(format!("Invalid command: {}", e)))?,
        )
    };
    Ok(script)
}

async fn read_script(file: &PathBuf) -> Result<Script, CliError> {
    let contents = if file.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .map_err(|e| CliError::Input(format!("Failed to read stdin: {}", e)))?;
        buf
    } else {
        tokio::fs::read_to_string(file)
            .await
            .map_err(|e| CliError::Input(format!("Failed to read {}: {}", file.display(), e)))?
    };
    parse_script(&contents)
}

fn print_result(result: &ExecutionResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let status = if result.success { "ok" } else { "FAIL" };
    match (result.children(), &result.error) {
        (Some(children), _) => {
            println!("{}{} {} ({} commands)", indent, status, result.kind, children.len());
            for child in children {
                print_result(child, depth + 1);
            }
        }
        (None, Some(error)) => println!("{}{} {}: {}", indent, status, result.kind, error.trim()),
        (None, None) => {
            let output = result.output().map(str::trim).unwrap_or_default();
            if output.is_empty() {
                println!("{}{} {}", indent, status, result.kind);
            } else {
                println!("{}{} {}: {}", indent, status, result.kind, output);
            }
        }
    }
}

fn report_single(format: OutputFormat, result: &ExecutionResult) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| CliError::Input(e.to_string()))?;
        println!("{}", json);
    } else {
        print_result(result, 0);
    }
    if result.success {
        Ok(())
    } else {
        Err(CliError::CommandFailed)
    }
}

fn report_list(format: OutputFormat, outcome: &SequenceOutcome) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "success": outcome.success,
            "results": outcome.results,
            "executed": outcome.results.len(),
        });
        println!("{}", json);
    } else {
        for result in &outcome.results {
            print_result(result, 0);
        }
    }
    if outcome.success {
        Ok(())
    } else {
        Err(CliError::CommandFailed)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run_config(action: ConfigAction) -> Result<(), CliError> {
    let mut config = RelayConfig::load();
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| CliError::Input(e.to_string()))?;
            println!("{}", json);
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value).map_err(|e| match e {
                ConfigError::UnknownKey(_) => {
                    CliError::Input(format!("{} (expected one of: {})", e, CONFIG_KEYS.join(", ")))
                }
                e => CliError::Input(e.to_string()),
            })?;
            config
                .save()
                .map_err(|e| CliError::Input(format!("Failed to save config: {}", e)))?;
            println!("Set {}", key);
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = RelayConfig::load();
    if let Some(adb_path) = &cli.adb_path {
        config.adb_path = adb_path.clone();
    }
    if cli.remote_url.is_some() {
        config.remote_url = cli.remote_url.clone();
    }
    let device_id = cli
        .device
        .clone()
        .unwrap_or_else(|| config.default_device_id.clone());
    let executor = CommandExecutor::from_config(config.driver_config());

    let descriptor = match cli.command {
        Command::Tap { x, y } => CommandDescriptor::tap(x, y),
        Command::Swipe { x1, y1, x2, y2, duration } => {
            CommandDescriptor::swipe(x1, y1, x2, y2, duration)
        }
        Command::Key { keycode } => CommandDescriptor::key(keycode),
        Command::Text { ref text } => CommandDescriptor::text(text.clone()),
        Command::Wait { duration } => CommandDescriptor::wait(duration),
        Command::Run { ref file } => match read_script(file).await? {
            Script::Single(descriptor) => descriptor,
            Script::List(commands) => {
                let outcome = executor.execute_all(&device_id, &commands).await;
                return report_list(cli.format, &outcome);
            }
        },
        Command::Config { action } => return run_config(action),
    };

    let result = executor.execute(&device_id, &descriptor).await;
    report_single(cli.format, &result)
}
