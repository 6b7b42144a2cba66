use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::{
    config::ConfigManager,
    dispatch::{ChannelDispatcher, Dispatch},
    error::Result,
    hub::NotifierHub,
    script::{run_script, ScriptedClient},
};

/// Replay a JSON-lines event script through the notifiers and print every
/// resulting notification as one JSON line on stdout.
#[derive(Parser, Debug)]
#[command(name = "dink-replay", version, about)]
struct Args {
    /// Event script; blank lines and lines starting with '#' are skipped.
    script: PathBuf,

    /// Directory holding settings.json.
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Write the effective settings back to settings.json before replaying.
    #[arg(long)]
    save_settings: bool,
}

async fn print_dispatches(mut rx: UnboundedReceiver<Dispatch>) -> usize {
    let mut printed = 0;
    let stdout = io::stdout();
    while let Some(dispatch) = rx.recv().await {
        match serde_json::to_string(&dispatch) {
            Ok(line) => {
                let mut out = stdout.lock();
                if let Err(e) = writeln!(out, "{}", line) {
                    log::error!("Failed to write notification: {}", e);
                    break;
                }
                printed += 1;
            }
            Err(e) => log::error!("Failed to serialize notification: {}", e),
        }
    }
    printed
}

fn replay(args: &Args, hub: &NotifierHub, client: &ScriptedClient) -> Result<usize> {
    let file = File::open(&args.script)?;
    let delivered = run_script(BufReader::new(file), client, hub)?;
    hub.shutdown();
    Ok(delivered)
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config_manager = ConfigManager::new(args.config_dir.clone());
    let settings = config_manager.load();
    if args.save_settings {
        if let Err(e) = config_manager.save(&settings) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(async move {
        let (dispatcher, rx) = ChannelDispatcher::new();
        let consumer = tokio::spawn(print_dispatches(rx));

        let replayed = tokio::task::spawn_blocking(move || {
            let client = Arc::new(ScriptedClient::default());
            let hub = NotifierHub::new(settings, client.clone(), Arc::new(dispatcher));
            // dropping the hub closes the channel and ends the consumer
            replay(&args, &hub, &client)
        })
        .await;

        let printed = consumer.await.unwrap_or_default();
        (replayed, printed)
    });

    match outcome {
        (Ok(Ok(delivered)), printed) => {
            log::info!("Replayed {} events, {} notifications", delivered, printed);
        }
        (Ok(Err(e)), _) => {
            log::error!("Replay failed: {}", e);
            std::process::exit(1);
        }
        (Err(e), _) => {
            log::error!("Replay task panicked: {}", e);
            std::process::exit(1);
        }
    }
}
