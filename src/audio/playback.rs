//! Audio playback to an output device
//!
//! The output callback pulls from any [`SampleProvider`] at the device's
//! cadence. When the provider starves, the rest of the callback buffer is
//! filled with silence.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{resolve_device, Direction};
use crate::audio::provider::{read_padded, SampleProvider};
use crate::error::AudioError;

/// Plays a sample provider on one output device
pub struct AudioPlayback {
    device_id: Option<String>,
    running: Arc<AtomicBool>,
    provider: Arc<dyn SampleProvider>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
    stats: Arc<PlaybackCounters>,
    config: StreamConfig,
}

#[derive(Default)]
struct PlaybackCounters {
    samples_played: AtomicU64,
    silence_samples: AtomicU64,
    starved_callbacks: AtomicU64,
}

/// Playback counters
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackStats {
    /// Samples taken from the provider
    pub samples_played: u64,
    /// Samples substituted with silence
    pub silence_samples: u64,
    /// Callbacks the provider could not fill
    pub starved_callbacks: u64,
}

impl AudioPlayback {
    /// Prepare playback of `provider` in the provider's format
    pub fn new(
        device_id: Option<&str>,
        buffer_size: Option<u32>,
        provider: Arc<dyn SampleProvider>,
    ) -> Result<Self, AudioError> {
        let format = provider.format();
        format
            .validate()
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: match buffer_size {
                Some(size) => cpal::BufferSize::Fixed(size),
                None => cpal::BufferSize::Default,
            },
        };

        Ok(Self {
            device_id: device_id.map(str::to_string),
            running: Arc::new(AtomicBool::new(false)),
            provider,
            thread_handle: None,
            error_rx: None,
            stats: Arc::new(PlaybackCounters::default()),
            config,
        })
    }

    /// Start playback
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = resolve_device(self.device_id.as_deref(), Direction::Output)?;
        tracing::info!(device = %device.id(), "starting playback");

        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let provider = self.provider.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("voice-playback".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let stream_error_tx = error_tx.clone();

                let stream = cpal_device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if !running.load(Ordering::Relaxed) {
                            data.fill(0.0);
                            return;
                        }
                        let played = read_padded(provider.as_ref(), data);
                        let silence = data.len() - played;
                        stats.samples_played.fetch_add(played as u64, Ordering::Relaxed);
                        if silence > 0 {
                            stats.silence_samples.fetch_add(silence as u64, Ordering::Relaxed);
                            stats.starved_callbacks.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    move |err| {
                        let _ = stream_error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::error!("Failed to build output stream: {}", e);
                        let _ = error_tx.try_send(e.into());
                        running_for_loop.store(false, Ordering::SeqCst);
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    tracing::error!("Failed to start output stream: {}", e);
                    let _ = error_tx.try_send(e.into());
                    running_for_loop.store(false, Ordering::SeqCst);
                    return;
                }

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(stats = ?self.stats(), "playback stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            samples_played: self.stats.samples_played.load(Ordering::Relaxed),
            silence_samples: self.stats.silence_samples.load(Ordering::Relaxed),
            starved_callbacks: self.stats.starved_callbacks.load(Ordering::Relaxed),
        }
    }

    /// Next pending stream error, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
