// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Main entry point for the roomcast stream host
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, trace};

use roomcast::common::constants::stream::EVENT_CHANNEL_CAPACITY;
use roomcast::config::{Config, LogFormat};
use roomcast::control::{serve, spawn_event_forwarder, LineTransport, StreamControl};
use roomcast::stream::{PcmListener, SourceHandle, StreamSource};

#[derive(Parser, Debug)]
#[command(name = "roomcast", version, about, long_about = None)]
struct Cli {
    /// Stream source URI, repeatable (e.g. "spotify:///librespot?name=Spotify")
    #[arg(short, long = "source", value_name = "URI")]
    sources: Vec<String>,

    /// Log filter, overrides LOG_LEVEL (e.g. "debug" or "roomcast=trace")
    #[arg(long)]
    log_level: Option<String>,
}

/// Counts PCM bytes per process; stands in for the encoder.
#[derive(Default)]
struct PcmMeter {
    bytes: AtomicU64,
}

impl PcmMeter {
    fn total(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl PcmListener for PcmMeter {
    fn on_chunk(&self, source_id: &str, chunk: &[u8]) {
        let len = chunk.len() as u64;
        let total = self.bytes.fetch_add(len, Ordering::Relaxed) + len;
        trace!(source = source_id, len, total, "pcm chunk");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    install_panic_hook();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config from env, using defaults: {}",
            e
        );
        Config::default()
    });
    let level_from_cli = cli.log_level.is_some();
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    if let Err(e) = init_tracing(&config, level_from_cli) {
        eprintln!("Failed to init tracing: {}", e);
    }

    let meter = Arc::new(PcmMeter::default());
    let settings = config.source_settings();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let mut handles: Vec<SourceHandle> = Vec::new();
    for raw in &cli.sources {
        let source = match StreamSource::from_uri(raw, meter.clone()) {
            Ok(source) => source,
            Err(e) => {
                error!("Skipping stream source: {}", e);
                continue;
            }
        };
        if handles.iter().any(|h| h.id() == source.id()) {
            error!(id = source.id(), "Skipping stream source: duplicate name");
            continue;
        }
        info!(id = source.id(), uri = %source.uri(), "Adding stream source");
        handles.push(
            source
                .with_settings(settings.clone())
                .with_events(event_tx.clone())
                .start(),
        );
    }
    drop(event_tx);

    let (note_tx, note_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let forwarder = spawn_event_forwarder(event_rx, note_tx);
    let mut control = StreamControl::new(handles);

    info!(
        sources = control.sources().len(),
        "Serving control channel on stdin/stdout"
    );
    let interrupted = tokio::select! {
        result = serve(LineTransport::stdio(), &mut control, note_rx) => {
            if let Err(e) = result {
                error!("Control channel failed: {:#}", e);
            }
            false
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            true
        }
    };

    for source in control.sources() {
        source.stop().await;
    }
    forwarder.abort();
    info!(pcm_bytes = meter.total(), "Shutdown complete");

    if interrupted {
        // A pending blocking stdin read would otherwise hold up runtime shutdown.
        std::process::exit(130);
    }
    Ok(())
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config, level_from_cli: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // An explicit --log-level beats RUST_LOG, RUST_LOG beats LOG_LEVEL.
    let filter = if level_from_cli {
        EnvFilter::try_new(&config.log_level)
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))
    }
    .unwrap_or_else(|_| EnvFilter::new("roomcast=info,warn"));

    // stdout carries the control channel; logs go to stderr only.
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        _ => subscriber.init(),
    }

    Ok(())
}
