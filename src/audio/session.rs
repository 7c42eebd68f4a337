//! Audio stream session
//!
//! A session owns exactly one [`SampleBuffer`] for the lifetime of a stream.
//! The producer and the consumer get lightweight handles to it; neither can
//! create or replace the buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::buffer::{BufferStats, SampleBuffer};
use crate::audio::format::AudioFormat;
use crate::audio::provider::SampleProvider;

struct SessionShared {
    buffer: SampleBuffer,
    running: AtomicBool,
    /// Samples offered while the session was stopped
    rejected: AtomicU64,
}

/// One audio stream and its buffer
pub struct StreamSession {
    shared: Arc<SessionShared>,
}

impl StreamSession {
    /// Session buffering the default ten seconds of `format`
    pub fn new(format: AudioFormat) -> Self {
        Self::from_buffer(SampleBuffer::new(&format))
    }

    pub fn with_duration(format: AudioFormat, duration: Duration) -> Self {
        Self::from_buffer(SampleBuffer::with_duration(&format, duration))
    }

    fn from_buffer(buffer: SampleBuffer) -> Self {
        tracing::debug!(
            audio_format = %buffer.format(),
            capacity = buffer.capacity(),
            "stream session created"
        );
        Self {
            shared: Arc::new(SessionShared {
                buffer,
                running: AtomicBool::new(false),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Begin accepting samples
    pub fn start(&self) {
        if !self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::info!(audio_format = %self.format(), "stream session started");
        }
    }

    /// Stop accepting samples and drop anything pending.
    ///
    /// The flag is cleared before the buffer, and writers check it under the
    /// buffer lock, so nothing is left pending once this returns.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            tracing::info!("stream session stopped");
        }
        self.shared.buffer.clear_buffer();
    }

    /// Drop pending samples without stopping, e.g. on a seek or stream reset
    pub fn reset(&self) {
        self.shared.buffer.clear_buffer();
        tracing::debug!("stream session reset");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn format(&self) -> AudioFormat {
        self.shared.buffer.format()
    }

    pub fn capacity(&self) -> usize {
        self.shared.buffer.capacity()
    }

    /// Producer handle
    pub fn writer(&self) -> BufferWriter {
        BufferWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Consumer handle
    pub fn reader(&self) -> BufferReader {
        BufferReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            buffer: self.shared.buffer.stats(),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Session counters
#[derive(Debug, Clone, Copy)]
pub struct SessionStats {
    pub buffer: BufferStats,
    pub rejected: u64,
    pub running: bool,
}

/// Producer side of a session
#[derive(Clone)]
pub struct BufferWriter {
    shared: Arc<SessionShared>,
}

impl BufferWriter {
    /// Append samples. Ignored while the session is stopped.
    pub fn add_samples(&self, samples: &[f32]) {
        if !self.shared.buffer.add_samples_if(&self.shared.running, samples) {
            self.shared
                .rejected
                .fetch_add(samples.len() as u64, Ordering::Relaxed);
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.shared.buffer.format()
    }
}

/// Consumer side of a session
#[derive(Clone)]
pub struct BufferReader {
    shared: Arc<SessionShared>,
}

impl BufferReader {
    /// See [`SampleBuffer::read_samples`]
    pub fn read_samples(&self, requested: usize) -> (Vec<f32>, usize) {
        self.shared.buffer.read_samples(requested)
    }

    pub fn read_into(&self, out: &mut [f32]) -> usize {
        self.shared.buffer.read_into(out)
    }

    /// Pending samples
    pub fn available(&self) -> usize {
        self.shared.buffer.len()
    }

    pub fn format(&self) -> AudioFormat {
        self.shared.buffer.format()
    }
}

impl SampleProvider for BufferReader {
    fn format(&self) -> AudioFormat {
        self.shared.buffer.format()
    }

    fn read_into(&self, out: &mut [f32]) -> usize {
        self.shared.buffer.read_into(out)
    }
}
