//! Binary entrypoint for the podlink CLI.
//!
//! Commands:
//! - `init` - write a starter `podlink.toml`
//! - `decode <message>` - decode one wire message and print it as JSON
//! - `replay [<capture>] [--chunk-size <n>] [--demo]` - push a capture through a session in
//!   transport-sized fragments and print the resulting patient snapshots
//! - `listen --port <path> [-b <baud>]` - follow a serial bridge (feature `serial`)
//!
//! See the library crate docs for module-level details: `podlink::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use podlink::config::Config;
use podlink::telemetry::source::{chunk_fragments, demo_capture, read_capture};
use podlink::telemetry::{
    decode, start_session, SessionEvent, TelemetrySession, TransportCapability,
};

#[derive(Parser)]
#[command(name = "podlink")]
#[command(about = "Decoder for wearable pod telemetry streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "podlink.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Decode a single message (ASCII packet or JSON)
    Decode {
        /// The message text, e.g. `L01...A3D` or `{"patientId":"p1"}`
        message: String,
    },
    /// Replay a capture file through a telemetry session
    Replay {
        /// Capture file with raw stream text
        capture: Option<String>,
        /// Fragment size; defaults to `replay.chunk_size` from the config
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Generate a synthetic capture instead of reading a file
        #[arg(long)]
        demo: bool,
        /// Pods in the synthetic capture
        #[arg(long, default_value_t = 3)]
        pods: usize,
        /// Live packets per pod in the synthetic capture
        #[arg(long, default_value_t = 12)]
        rounds: usize,
    },
    /// Follow a serial bridge and log patient updates
    #[cfg(feature = "serial")]
    Listen {
        /// Serial port of the bridge
        #[arg(short, long)]
        port: String,
        /// Baud rate
        #[arg(short = 'b', long, default_value_t = 115200)]
        baud: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config, every other command reads it (falling back to defaults)
    let loaded = match cli.command {
        Commands::Init => None,
        _ => match Config::load(&cli.config).await {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("{} (using defaults)", e);
                None
            }
        },
    };
    init_logging(&loaded, cli.verbose);
    let config = loaded.unwrap_or_default();

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Wrote default configuration to {}", cli.config);
            println!("Created {}", cli.config);
        }
        Commands::Decode { message } => {
            let decoded = decode(&message, config.decoder.checksum_policy)
                .map_err(|e| anyhow!("Failed to decode message: {}", e))?;
            let reading = decoded.reading(chrono::Utc::now().timestamp());
            let out = serde_json::json!({ "decoded": decoded, "reading": reading });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Replay {
            capture,
            chunk_size,
            demo,
            pods,
            rounds,
        } => {
            let text = match (demo, capture) {
                (true, _) => demo_capture(pods, rounds),
                (false, Some(path)) => read_capture(&path).await?,
                (false, None) => return Err(anyhow!("replay needs a capture file or --demo")),
            };
            let chunk_size = chunk_size.unwrap_or(config.replay.chunk_size);
            replay(&config, &text, chunk_size).await?;
        }
        #[cfg(feature = "serial")]
        Commands::Listen { port, baud } => {
            listen(&config, &port, baud).await?;
        }
    }
    Ok(())
}

async fn replay(config: &Config, text: &str, chunk_size: usize) -> Result<()> {
    let session = TelemetrySession::new(config, TransportCapability::Available);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = start_session(session, events_tx);
    handle
        .connect()
        .await
        .map_err(|e| anyhow!("Failed to open session: {}", e))?;

    let fragments = chunk_fragments(text, chunk_size);
    info!(
        "Replaying {} chars as {} fragments of up to {}",
        text.len(),
        fragments.len(),
        chunk_size
    );
    for fragment in fragments {
        handle.send_fragment(fragment);
    }
    let snapshot = handle
        .snapshot()
        .await
        .ok_or_else(|| anyhow!("session task stopped before replay finished"))?;
    handle.shutdown().await;

    while let Ok(event) = events_rx.try_recv() {
        log_event(&event);
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[cfg(feature = "serial")]
async fn listen(config: &Config, port: &str, baud: u32) -> Result<()> {
    use podlink::telemetry::source::spawn_serial_reader;

    let session = TelemetrySession::new(config, TransportCapability::Available);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = start_session(session, events_tx);
    handle
        .connect()
        .await
        .map_err(|e| anyhow!("Failed to open session: {}", e))?;
    let reader = spawn_serial_reader(port, baud, handle.clone())?;

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => log_event(&event),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; closing session");
                break;
            }
        }
    }
    if let Some(snapshot) = handle.snapshot().await {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    handle.shutdown().await;
    reader.abort();
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::ReadingApplied { patient_id, source } => {
            debug!("{:?} reading applied to {}", source, patient_id)
        }
        SessionEvent::Status(status) => debug!("status from pod {}", status.pod_id),
        SessionEvent::Rejected(err) => warn!("message rejected: {}", err),
        SessionEvent::Overflow { discarded } => {
            warn!("decode buffer overflow, {} chars discarded", discarded)
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when someone is watching
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
