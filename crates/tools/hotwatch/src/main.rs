use anyhow::Result;
use clap::Parser;
use hotloader::HotloaderConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod session;
mod watch;

use session::Session;
use watch::WatchConfig;

#[derive(Parser)]
#[command(name = "hotwatch")]
#[command(about = "Load and live-reload hotloader configuration files", long_about = None)]
struct Cli {
    /// Root configuration file
    root: PathBuf,

    /// Print only these variables (dotted paths, can specify multiple)
    #[arg(short, long)]
    get: Vec<String>,

    /// Keep running and reload files as they change
    #[arg(short, long)]
    watch: bool,

    /// Debounce duration for file changes in milliseconds
    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,

    /// Log debug messages (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    let mut session = Session::new(HotloaderConfig::from_env());
    session.open(&cli.root)?;
    print!("{}", session.render(&cli.get));

    if cli.watch {
        let config = WatchConfig {
            debounce_duration: Duration::from_millis(cli.debounce_ms),
            paths: cli.get,
        };
        watch::run(&mut session, &config)?;
    }

    Ok(())
}
