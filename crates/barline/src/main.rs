mod audio;
mod bar;
mod config;
mod i3ipc;
mod pulse;
mod signals;
mod sources;
mod spawn;
mod stdin;
mod winlist;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use barline_core::pango::span;
use barline_core::windows::WindowCounts;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Click events queue ahead of the launcher's minimum inter-launch delay.
const SPAWN_QUEUE_CAPACITY: usize = 128;

#[derive(Parser, Debug)]
#[command(name = "barline", about = "i3bar status generator")]
struct Args {
    /// Configuration file path; defaults to the XDG location.
    #[arg(long, default_value = "")]
    config: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    // Startup errors abort before the event loop; nothing after this point
    // is allowed to take the process down except a termination signal.
    let config = Arc::new(config::load(&args.config)?);

    let (dirty_tx, dirty_rx) = mpsc::channel(bar::DIRTY_CAPACITY);
    let (spawn_tx, spawn_rx) = mpsc::channel(SPAWN_QUEUE_CAPACITY);
    let (audio_click_tx, audio_click_rx) = std::sync::mpsc::channel();

    let bar = Arc::new(Bar::new(dirty_tx));
    let windows = Arc::new(WindowCounts::new());
    seed_placeholders(&config, &bar);

    tokio::spawn(spawn::run_launcher(spawn_rx));
    tokio::spawn(spawn::run_reaper());
    tokio::spawn(stdin::run(
        Arc::clone(&config),
        spawn_tx.clone(),
        audio_click_tx,
    ));

    {
        let bar = Arc::clone(&bar);
        tokio::spawn(async move {
            if let Err(err) = signals::run(Arc::clone(&bar)).await {
                error!(event = "signal_handler_failed", error = %err);
            }
            // Immediate exit, no draining; the bar is going down with us.
            std::process::exit(0);
        });
    }

    if config.app_buttons.enabled {
        tokio::spawn(winlist::run(Arc::clone(&bar), Arc::clone(&windows)));
    }
    if config.clock.enabled {
        tokio::spawn(sources::clock::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.mem.enabled {
        tokio::spawn(sources::memory::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.la.enabled {
        tokio::spawn(sources::loadavg::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.cpu_temp.enabled {
        tokio::spawn(sources::cputemp::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.net_if.enabled {
        tokio::spawn(sources::netif::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.vpn.enabled {
        tokio::spawn(sources::vpn::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.battery.enabled {
        tokio::spawn(sources::battery::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.cmd_run.enabled {
        tokio::spawn(sources::command::run(Arc::clone(&config), Arc::clone(&bar)));
    }
    if config.volume.enabled {
        audio::start(
            Arc::clone(&config),
            Arc::clone(&bar),
            spawn_tx.clone(),
            audio_click_rx,
        );
    } else {
        drop(audio_click_rx);
    }

    bar::emit_header();
    bar::run_composer(bar, config, windows, dirty_rx).await;
    Ok(())
}

/// Pre-fills the slots whose first real reading can take a moment, so the
/// first emission is never half-empty.
fn seed_placeholders(config: &Config, bar: &Bar) {
    if config.clock.enabled {
        bar.preset(
            SourceId::Clock,
            span(&config.clock.style(), "Thu, 1 Jan 1970   1:00"),
        );
    }
    if config.battery.enabled {
        let mut text = span(&config.battery.symbol_style(), &config.battery.symbol);
        text.push_str(&span(&config.battery.style(), " ??% •"));
        bar.preset(SourceId::Battery, text);
    }
    if config.volume.enabled {
        let mut text = span(&config.volume.symbol_style(), &config.volume.symbol);
        text.push_str(&span(&config.volume.style(), ":0%"));
        bar.preset(SourceId::Volume, text);
    }
}

fn init_logging(debug: bool) {
    // stdout carries the bar protocol; all diagnostics go to stderr.
    let level = if debug {
        "debug".to_string()
    } else {
        std::env::var("BARLINE_LOG").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
