mod cmd;
mod output;

use clap::{Args, Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use relay_core::hardware::{Backend, StubBackend};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pirelay",
    about = "Switch GPIO relays over HTTP and drive them from cron schedules",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (schedules and relay names)
    #[arg(
        long,
        global = true,
        env = "PIRELAY_CONFIG",
        default_value = "config.json"
    )]
    config_file: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the schedule engine
    Serve {
        /// Address to listen on
        #[arg(long, env = "PIRELAY_ADDR", default_value = "0.0.0.0:3000")]
        addr: String,

        /// Event log file (JSON lines)
        #[arg(long, env = "PIRELAY_EVENTS", default_value = "events.jsonl")]
        events_file: PathBuf,

        /// Number of events kept in the log
        #[arg(long, default_value_t = relay_core::events::DEFAULT_CAPACITY)]
        events_capacity: usize,

        #[command(flatten)]
        hardware: HardwareArgs,
    },

    /// Print the current state of every relay
    Status {
        #[command(flatten)]
        hardware: HardwareArgs,
    },

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Selects and wires the relay hardware.
#[derive(Args, Debug, Clone)]
pub struct HardwareArgs {
    /// GPIO pins wired to relays 1..N, comma separated
    #[arg(long, value_delimiter = ',', default_value = "26,20,21")]
    pub pins: Vec<u32>,

    /// Use the in-memory backend instead of real GPIO
    #[arg(long)]
    pub stub: bool,
}

impl HardwareArgs {
    pub fn backend(&self) -> anyhow::Result<Box<dyn Backend>> {
        if self.stub {
            return Ok(Box::new(StubBackend::new()));
        }
        gpio_backend()
    }
}

#[cfg(feature = "hardware-gpio")]
fn gpio_backend() -> anyhow::Result<Box<dyn Backend>> {
    Ok(Box::new(relay_core::hardware::RpiBackend::new()))
}

#[cfg(not(feature = "hardware-gpio"))]
fn gpio_backend() -> anyhow::Result<Box<dyn Backend>> {
    Err(relay_core::RelayError::HardwareUnavailable(
        "built without the hardware-gpio feature, pass --stub".into(),
    )
    .into())
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve {
            addr,
            events_file,
            events_capacity,
            hardware,
        } => cmd::serve::run(cmd::serve::ServeOptions {
            addr,
            config_file: cli.config_file,
            events_file,
            events_capacity,
            hardware,
        }),
        Commands::Status { hardware } => cmd::status::run(&cli.config_file, &hardware, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config_file, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
