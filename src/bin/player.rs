//! PCM Player Application
//!
//! Accepts raw f32 mono PCM over TCP and plays it, one logical stream per
//! connection. Transport commands are read from stdin.

use anyhow::{Context, Result};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcm_stream_player::{
    audio::{list_output_devices, CpalOutput},
    config::AppConfig,
    constants::SAMPLE_SIZE,
    StreamingSession,
};

type SharedSession = Arc<Mutex<StreamingSession>>;

const HELP: &str = "commands: seek <seconds> | pause | resume | stop | status | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut list_only = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--list-devices" => list_only = true,
            "--config" => config_path = args.next().map(PathBuf::from),
            other => anyhow::bail!("Unknown argument: {other}"),
        }
    }

    let config = match &config_path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if list_only {
        println!("\n=== Available Output Devices ===");
        for device in list_output_devices() {
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{}:", device.name, default_marker);
            println!("    Sample rates: {:?}", device.sample_rates);
            println!("    Channels: {:?}", device.channels);
        }
        return Ok(());
    }

    tracing::info!("Starting PCM player");

    let output = Arc::new(CpalOutput::new(
        config.audio.device.clone(),
        config.audio.buffer_size,
    )?);
    let session = StreamingSession::new(output.clone(), config.audio_format())?;
    let session: SharedSession = Arc::new(Mutex::new(session));

    let listener = TcpListener::bind(config.listen_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address()))?;
    tracing::info!("Accepting PCM streams on {}", config.listen_address());

    tokio::spawn(serve_streams(listener, session.clone(), config.stream.chunk_bytes));

    // Periodic stats
    {
        let session = session.clone();
        let output = output.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                let stats = session.lock().stats();
                let out = output.stats();
                tracing::info!(
                    "Session: {:?}, {:.2}s/{:.2}s, {} chunks ({} dropped), {} pending, {} frames rendered, {} underruns, {} lost completions",
                    stats.state,
                    stats.position_seconds,
                    stats.buffered_seconds,
                    stats.chunks_accepted,
                    stats.chunks_dropped,
                    output.pending_buffers(),
                    out.frames_rendered,
                    out.underruns,
                    out.dropped_completions
                );
                if out.dropped_completions > 0 {
                    tracing::warn!(
                        "{} completion notifications lost; position may lag until the next one arrives",
                        out.dropped_completions
                    );
                }
            }
        });
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (None, _) => {}
            (Some("seek"), Some(arg)) => match arg.parse::<f64>() {
                Ok(target) => match session.lock().seek_to(target) {
                    Ok(ts) => println!("resumed at {ts:.0}"),
                    Err(e) => println!("seek failed: {e}"),
                },
                Err(_) => println!("invalid time: {arg}"),
            },
            (Some("pause"), _) => session.lock().pause(),
            (Some("resume"), _) => {
                if let Err(e) = session.lock().resume() {
                    println!("resume failed: {e}");
                }
            }
            (Some("stop"), _) => session.lock().stop_and_clear(),
            (Some("status"), _) => {
                let stats = session.lock().stats();
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            (Some("quit" | "exit"), _) => break,
            _ => println!("{HELP}"),
        }
    }

    session.lock().stop_and_clear();
    tracing::info!("PCM player shutting down");
    Ok(())
}

/// Accept connections one at a time; each one is a new logical stream
async fn serve_streams(listener: TcpListener, session: SharedSession, chunk_bytes: usize) {
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                continue;
            }
        };
        tracing::info!(%peer, "Stream connected");

        let mut buf = BytesMut::with_capacity(chunk_bytes * 2);
        let mut is_first = true;
        loop {
            match socket.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%peer, "Read failed: {}", e);
                    break;
                }
            }
            while buf.len() >= chunk_bytes {
                let chunk = buf.split_to(chunk_bytes);
                let ts = session.lock().ingest(&chunk, is_first);
                if is_first {
                    tracing::info!(%peer, started_at = ts, "Playback requested");
                }
                is_first = false;
            }
        }

        // Flush any whole samples left over
        let whole = buf.len() - buf.len() % SAMPLE_SIZE;
        if whole > 0 {
            let chunk = buf.split_to(whole);
            session.lock().ingest(&chunk, is_first);
        }
        tracing::info!(%peer, "Stream ended");
    }
}
