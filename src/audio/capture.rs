//! Audio capture from an input device
//!
//! Runs a cpal input stream on its own thread and feeds every callback's
//! interleaved samples into a session's [`BufferWriter`].

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{resolve_device, Direction};
use crate::audio::session::BufferWriter;
use crate::error::AudioError;

/// Captures one input device into a stream session
pub struct AudioCapture {
    /// Configured device ID, `None` for the system default
    device_id: Option<String>,
    running: Arc<AtomicBool>,
    writer: BufferWriter,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
    samples_captured: Arc<AtomicU64>,
    config: StreamConfig,
}

impl AudioCapture {
    /// Prepare a capture that writes in the writer's format.
    ///
    /// The device must accept that rate and channel count; cpal reports a
    /// stream error on `start` otherwise.
    pub fn new(
        device_id: Option<&str>,
        buffer_size: Option<u32>,
        writer: BufferWriter,
    ) -> Result<Self, AudioError> {
        let format = writer.format();
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
            writer,
            thread_handle: None,
            error_rx: None,
            samples_captured: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Start capturing audio
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = resolve_device(self.device_id.as_deref(), Direction::Input)?;
        tracing::info!(device = %device.id(), "starting capture");

        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let writer = self.writer.clone();
        let samples_captured = self.samples_captured.clone();
        let config = self.config.clone();

        self.samples_captured.store(0, Ordering::SeqCst);
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let stream_error_tx = error_tx.clone();

                let stream = cpal_device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running.load(Ordering::Relaxed) {
                            return;
                        }
                        samples_captured.fetch_add(data.len() as u64, Ordering::Relaxed);
                        writer.add_samples(data);
                    },
                    move |err| {
                        let _ = stream_error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::error!("Failed to build input stream: {}", e);
                        let _ = error_tx.try_send(e.into());
                        running_for_loop.store(false, Ordering::SeqCst);
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    tracing::error!("Failed to start input stream: {}", e);
                    let _ = error_tx.try_send(e.into());
                    running_for_loop.store(false, Ordering::SeqCst);
                    return;
                }

                // The stream stops when dropped at the end of this thread
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(samples = self.samples_captured(), "capture stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Total samples delivered by the device since `start`
    pub fn samples_captured(&self) -> u64 {
        self.samples_captured.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Next pending stream error, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::AudioFormat;
    use crate::audio::session::StreamSession;

    #[test]
    fn test_capture_config_follows_session_format() {
        let session = StreamSession::new(AudioFormat::new(16000, 1));
        let capture = AudioCapture::new(None, Some(160), session.writer()).unwrap();

        assert_eq!(capture.config().sample_rate.0, 16000);
        assert_eq!(capture.config().channels, 1);
        assert!(!capture.is_running());
    }

    #[test]
    fn test_capture_rejects_empty_format() {
        let session = StreamSession::new(AudioFormat::new(0, 1));
        let result = AudioCapture::new(None, None, session.writer());
        assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
    }
}
