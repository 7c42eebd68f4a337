//! Voice Loopback
//!
//! Captures the input device into a bounded stream session and plays the
//! session back on the output device. Useful for checking device setup and
//! watching buffer behaviour under real device clocks.
//!
//! Usage: `loopback [config.toml]`

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_stream_buffer::{
    audio::{
        device::{list_devices, resolve_device, Direction},
        AudioCapture, AudioFormat, AudioPlayback, StreamSession,
    },
    config::AppConfig,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::load_or_default()?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting voice loopback");

    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}:", device.name, device_type, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();

    let session = StreamSession::with_duration(config.audio.format(), config.audio.buffer_duration());
    session.start();

    let (mut capture, mut playback) = open_devices(&config, &session)?;

    tracing::info!(
        "Looping back {} through a {:?} buffer, press Ctrl+C to stop",
        session.format(),
        config.audio.buffer_duration()
    );

    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                while let Some(e) = capture.check_errors() {
                    tracing::warn!("Capture error: {}", e);
                }
                while let Some(e) = playback.check_errors() {
                    tracing::warn!("Playback error: {}", e);
                }

                let stats = session.stats().buffer;
                let played = playback.stats();
                tracing::info!(
                    "Buffer {}/{} samples, {} dropped ({:.1}%), {} underruns, {} silence samples",
                    stats.level,
                    stats.capacity,
                    stats.samples_dropped,
                    stats.drop_rate() * 100.0,
                    stats.underruns,
                    played.silence_samples
                );
            }
        }
    }

    tracing::info!("Shutting down");
    capture.stop();
    playback.stop();
    session.stop();

    Ok(())
}

/// Build and start capture and playback around `session`
fn open_devices(
    config: &AppConfig,
    session: &StreamSession,
) -> voice_stream_buffer::Result<(AudioCapture, AudioPlayback)> {
    let format = session.format();
    warn_on_format_mismatch(config.devices.input.as_deref(), Direction::Input, format);
    warn_on_format_mismatch(config.devices.output.as_deref(), Direction::Output, format);

    let mut capture = AudioCapture::new(
        config.devices.input.as_deref(),
        config.audio.device_buffer_frames,
        session.writer(),
    )?;
    let mut playback = AudioPlayback::new(
        config.devices.output.as_deref(),
        config.audio.device_buffer_frames,
        Arc::new(session.reader()),
    )?;

    capture.start()?;
    playback.start()?;
    Ok((capture, playback))
}

/// Devices usually resample, but a mismatch is worth knowing about when
/// chasing drift or glitches
fn warn_on_format_mismatch(id: Option<&str>, direction: Direction, format: AudioFormat) {
    let native = match resolve_device(id, direction).and_then(|d| d.default_format()) {
        Ok(native) => native,
        Err(e) => {
            tracing::debug!("Could not query {:?} device format: {}", direction, e);
            return;
        }
    };

    if native.sample_rate != format.sample_rate || native.channels != format.channels {
        tracing::warn!(
            "{:?} device prefers {}, session runs at {}",
            direction,
            native,
            format
        );
    }
}
