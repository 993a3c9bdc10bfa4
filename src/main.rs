// src/main.rs - Interactive pause/resume simulator
use std::sync::{mpsc, Arc};
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use krusty_pause::config::{self, Config};
use krusty_pause::printer::Printer;
use krusty_pause::scheduler::SystemClock;
use krusty_pause::simulator::StdoutChannel;

#[derive(Debug, Parser)]
#[command(name = "pause-sim", about = "Drive the M1125 pause/resume core on a simulated printer")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,
    /// Main loop period in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };
    tracing::info!(
        "Idle timeout {}s, grace {}s, {} heaters",
        config.heater_timeout.idle_timeout_secs,
        config.heater_timeout.grace_period_secs,
        config.simulator.heater_count
    );

    let (requests, inbox) = mpsc::channel::<String>();
    let period = Duration::from_millis(cli.tick_ms.max(1));
    // The pause sequence sleeps between beeps; keep it off the async workers.
    let printer_task = tokio::task::spawn_blocking(move || {
        let mut printer = Printer::new(&config, Arc::new(SystemClock), Box::new(StdoutChannel));
        printer.run(&inbox, period);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if requests.send(line).is_err() {
            break;
        }
    }

    tracing::info!("stdin closed, exiting");
    drop(requests);
    printer_task.await?;
    Ok(())
}
