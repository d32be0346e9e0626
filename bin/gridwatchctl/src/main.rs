//! ---
//! gw_section: "05-operator-interface"
//! gw_subsection: "binary"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Control CLI for watching and steering gridwatch nodes."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gridwatch_client::{ActionVerb, GridClient};
use gridwatch_common::logging::{init_console, init_tracing};
use gridwatch_common::version::VersionInfo;
use gridwatch_common::{AppConfig, Mode};
use url::Url;

mod commands;
mod watch;

const DEFAULT_CONFIG: &str = "configs/gridwatch.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Watch grid node telemetry and send operator commands",
    long_about = None
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "URL", help = "Override the endpoint base URL")]
    base_url: Option<Url>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Device,
    Dashboard,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Device => Mode::Device,
            CliMode::Dashboard => Mode::Dashboard,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Poll the endpoint and print one JSON view per cycle")]
    Watch {
        #[arg(long, value_enum, default_value = "dashboard")]
        mode: CliMode,
        #[arg(long, help = "Stop after this many views")]
        cycles: Option<u64>,
        #[arg(long, value_name = "MS", help = "Override the poll interval")]
        interval_ms: Option<u64>,
    },
    #[command(about = "Send a device action (connect, disconnect, outage_start, ...)")]
    Action {
        #[arg(value_parser = parse_verb)]
        verb: ActionVerb,
    },
    #[command(about = "Ask the server to verify an anomalous node")]
    Verify { node_id: String },
    #[command(about = "Override the simulated device voltage")]
    SetVoltage {
        #[arg(allow_negative_numbers = true)]
        volts: f64,
    },
    #[command(about = "Assign the device identity and connect")]
    Configure {
        id: String,
        #[arg(long, default_value = "Unknown")]
        region: String,
    },
    #[command(about = "Show the leader/follower badge of the server")]
    Stats,
}

fn parse_verb(raw: &str) -> Result<ActionVerb, String> {
    raw.parse::<ActionVerb>()
        .map_err(|_| format!("unknown action '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }

    let (mut config, source) = load_config(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.endpoint.base_url = base_url;
    }
    config.validate()?;

    let Some(command) = cli.command else {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    };

    match command {
        Commands::Watch {
            mode,
            cycles,
            interval_ms,
        } => {
            let mode = Mode::from(mode);
            if let Some(ms) = interval_ms {
                match mode {
                    Mode::Device => config.poll.device_interval = Duration::from_millis(ms),
                    Mode::Dashboard => config.poll.dashboard_interval = Duration::from_millis(ms),
                }
                config.poll.validate()?;
            }
            init_tracing("gridwatchctl", &config.logging)?;
            tracing::info!(
                version = %VersionInfo::current(),
                config = %source.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
                base_url = %config.endpoint.base_url,
                "gridwatchctl starting"
            );
            watch::run(&config, mode, cycles).await
        }
        other => {
            init_console();
            let client = GridClient::new(&config.endpoint)
                .with_context(|| "failed to build HTTP client")?;
            commands::run(other, &config, client).await
        }
    }
}

/// An explicit `--config` or `GRIDWATCH_CONFIG` must load; otherwise the repository
/// default is used when present, falling back to built-in defaults.
fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let candidates = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => vec![PathBuf::from(DEFAULT_CONFIG)],
    };
    let env_override = std::env::var_os(AppConfig::ENV_CONFIG_PATH).is_some();
    if explicit.is_none() && !env_override && !candidates.iter().any(|path| path.exists()) {
        return Ok((AppConfig::default(), None));
    }
    let loaded = AppConfig::load_with_source(&candidates)?;
    Ok((loaded.config, Some(loaded.source)))
}
