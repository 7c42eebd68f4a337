//! Bounded sample buffer for streaming audio
//!
//! Sits between a producer (device capture or decoded network audio) and a
//! consumer (the playback callback or a mixer). The buffer holds at most
//! `capacity` interleaved `f32` samples. Overflow evicts the oldest samples,
//! underflow returns a short read; neither ever blocks or fails.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::audio::format::AudioFormat;
use crate::audio::provider::SampleProvider;
use crate::constants::DEFAULT_BUFFER_DURATION_SECS;

/// Bounded FIFO of interleaved audio samples
pub struct SampleBuffer {
    /// Pending samples, oldest at the front
    samples: Mutex<VecDeque<f32>>,
    /// Maximum number of samples retained
    capacity: usize,
    format: AudioFormat,
    samples_written: AtomicU64,
    samples_read: AtomicU64,
    samples_dropped: AtomicU64,
    underruns: AtomicU64,
}

impl SampleBuffer {
    /// Buffer holding ten seconds of `format`
    pub fn new(format: &AudioFormat) -> Self {
        Self::with_duration(format, Duration::from_secs(DEFAULT_BUFFER_DURATION_SECS))
    }

    /// Buffer holding `duration` of `format`.
    ///
    /// A format with zero rate or channels yields capacity zero.
    pub fn with_duration(format: &AudioFormat, duration: Duration) -> Self {
        Self::build(*format, format.samples_for_duration(duration))
    }

    /// Buffer with an explicit sample budget, using the default format
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(AudioFormat::default(), capacity)
    }

    fn build(format: AudioFormat, capacity: usize) -> Self {
        // Preallocate when the budget fits in memory, otherwise grow on demand
        let mut samples = VecDeque::new();
        let _ = samples.try_reserve(capacity);
        Self {
            samples: Mutex::new(samples),
            capacity,
            format,
            samples_written: AtomicU64::new(0),
            samples_read: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    /// Append samples, evicting the oldest ones if the result would exceed
    /// the capacity. Only the most recent `capacity` samples survive.
    pub fn add_samples(&self, new_samples: &[f32]) {
        if new_samples.is_empty() {
            return;
        }

        let dropped = {
            let mut samples = self.samples.lock();
            self.append_locked(&mut samples, new_samples)
        };
        self.record_write(new_samples.len(), dropped);
    }

    /// Append only while `gate` is set. The gate is read under the buffer
    /// lock, so once a caller has cleared the gate and then called
    /// [`clear_buffer`](Self::clear_buffer), no in-flight append can land
    /// after the clear. Returns whether the samples were accepted.
    pub fn add_samples_if(&self, gate: &AtomicBool, new_samples: &[f32]) -> bool {
        let dropped = {
            let mut samples = self.samples.lock();
            if !gate.load(Ordering::SeqCst) {
                return false;
            }
            self.append_locked(&mut samples, new_samples)
        };
        self.record_write(new_samples.len(), dropped);
        true
    }

    /// Returns how many samples were evicted
    fn append_locked(&self, samples: &mut VecDeque<f32>, new_samples: &[f32]) -> usize {
        let overflow = (samples.len() + new_samples.len()).saturating_sub(self.capacity);

        if new_samples.len() >= self.capacity {
            // Everything old goes, plus the head of the new batch
            let skip = new_samples.len() - self.capacity;
            samples.clear();
            samples.extend(&new_samples[skip..]);
        } else {
            samples.drain(..overflow);
            samples.extend(new_samples);
        }
        debug_assert!(samples.len() <= self.capacity);
        overflow
    }

    fn record_write(&self, written: usize, dropped: usize) {
        self.samples_written
            .fetch_add(written as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.samples_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::trace!(dropped, capacity = self.capacity, "sample buffer overflow");
        }
    }

    /// Remove and return the oldest `min(requested, len)` samples along with
    /// how many were returned. An empty buffer yields `(vec![], 0)`.
    pub fn read_samples(&self, requested: usize) -> (Vec<f32>, usize) {
        let out: Vec<f32> = {
            let mut samples = self.samples.lock();
            let count = requested.min(samples.len());
            samples.drain(..count).collect()
        };

        let count = out.len();
        self.record_read(requested, count);
        (out, count)
    }

    /// Fill `out` from the front of the buffer without allocating.
    /// Returns the number of samples written; the rest of `out` is untouched.
    pub fn read_into(&self, out: &mut [f32]) -> usize {
        let count = {
            let mut samples = self.samples.lock();
            let count = out.len().min(samples.len());
            for (dst, src) in out.iter_mut().zip(samples.drain(..count)) {
                *dst = src;
            }
            count
        };

        self.record_read(out.len(), count);
        count
    }

    fn record_read(&self, requested: usize, count: usize) {
        self.samples_read.fetch_add(count as u64, Ordering::Relaxed);
        if count < requested {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop everything pending
    pub fn clear_buffer(&self) {
        self.samples.lock().clear();
    }

    /// Number of pending samples
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Maximum number of samples retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Fill level in `[0, 1]`; zero for a zero-capacity buffer
    pub fn fill_level(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.len() as f32 / self.capacity as f32
    }

    /// Audio time currently buffered
    pub fn buffered_duration(&self) -> Duration {
        self.format.duration_of(self.len())
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            level: self.len(),
            capacity: self.capacity,
            samples_written: self.samples_written.load(Ordering::Relaxed),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.samples_written.store(0, Ordering::Relaxed);
        self.samples_read.store(0, Ordering::Relaxed);
        self.samples_dropped.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
    }
}

impl SampleProvider for SampleBuffer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_into(&self, out: &mut [f32]) -> usize {
        SampleBuffer::read_into(self, out)
    }
}

/// Buffer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub level: usize,
    pub capacity: usize,
    pub samples_written: u64,
    pub samples_read: u64,
    /// Samples evicted by overflow
    pub samples_dropped: u64,
    /// Reads that returned fewer samples than requested
    pub underruns: u64,
}

impl BufferStats {
    /// Fraction of written samples that were evicted before being read
    pub fn drop_rate(&self) -> f32 {
        if self.samples_written == 0 {
            0.0
        } else {
            self.samples_dropped as f32 / self.samples_written as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, samples: &[f32]) -> SampleBuffer {
        let buffer = SampleBuffer::with_capacity(capacity);
        buffer.add_samples(samples);
        buffer
    }

    fn drain_all(buffer: &SampleBuffer) -> Vec<f32> {
        buffer.read_samples(buffer.capacity()).0
    }

    #[test]
    fn test_capacity_from_format() {
        let buffer = SampleBuffer::new(&AudioFormat::new(48000, 2));
        assert_eq!(buffer.capacity(), 960_000);

        let buffer = SampleBuffer::with_duration(&AudioFormat::new(8000, 1), Duration::from_millis(500));
        assert_eq!(buffer.capacity(), 4000);
    }

    #[test]
    fn test_oldest_first_eviction() {
        let buffer = filled(5, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        buffer.add_samples(&[6.0, 7.0]);

        assert_eq!(drain_all(&buffer), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buffer.stats().samples_dropped, 2);
    }

    #[test]
    fn test_oversized_append() {
        let buffer = filled(3, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(drain_all(&buffer), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_oversized_append_replaces_old_samples() {
        let buffer = filled(3, &[9.0, 9.0]);
        buffer.add_samples(&[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(drain_all(&buffer), vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.stats().samples_dropped, 3);
    }

    #[test]
    fn test_partial_read() {
        let buffer = filled(8, &[1.0, 2.0, 3.0]);

        let (samples, count) = buffer.read_samples(2);
        assert_eq!(samples, vec![1.0, 2.0]);
        assert_eq!(count, 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(drain_all(&buffer), vec![3.0]);
    }

    #[test]
    fn test_empty_read() {
        let buffer = SampleBuffer::with_capacity(4);
        for n in [0, 1, 100] {
            let (samples, count) = buffer.read_samples(n);
            assert!(samples.is_empty());
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_clear_then_read() {
        let buffer = filled(4, &[1.0, 2.0]);
        buffer.clear_buffer();

        assert_eq!(buffer.read_samples(1), (vec![], 0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_never_buffers() {
        let buffer = SampleBuffer::new(&AudioFormat::new(0, 2));
        assert_eq!(buffer.capacity(), 0);

        buffer.add_samples(&[1.0, 2.0]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.read_samples(2), (vec![], 0));
        assert_eq!(buffer.fill_level(), 0.0);
    }

    #[test]
    fn test_read_into_leaves_tail_untouched() {
        let buffer = filled(8, &[0.5, 0.25]);
        let mut out = [9.0f32; 4];

        assert_eq!(buffer.read_into(&mut out), 2);
        assert_eq!(out, [0.5, 0.25, 9.0, 9.0]);
        assert_eq!(buffer.stats().underruns, 1);
    }

    #[test]
    fn test_stats() {
        let buffer = filled(4, &[1.0; 6]);
        buffer.read_samples(3);
        buffer.read_samples(3);

        let stats = buffer.stats();
        assert_eq!(stats.level, 0);
        assert_eq!(stats.samples_written, 6);
        assert_eq!(stats.samples_read, 4);
        assert_eq!(stats.samples_dropped, 2);
        assert_eq!(stats.underruns, 1);
        assert!((stats.drop_rate() - 2.0 / 6.0).abs() < f32::EPSILON);

        buffer.reset_stats();
        assert_eq!(buffer.stats(), BufferStats { capacity: 4, ..Default::default() });
    }

    #[test]
    fn test_unbounded_duration_does_not_preallocate_everything() {
        let buffer = SampleBuffer::with_duration(&AudioFormat::voice(), Duration::MAX);
        assert_eq!(buffer.capacity(), usize::MAX);

        buffer.add_samples(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.read_samples(5), (vec![1.0, 2.0, 3.0], 3));
    }

    #[test]
    fn test_gated_append() {
        let buffer = SampleBuffer::with_capacity(4);
        let gate = AtomicBool::new(false);

        assert!(!buffer.add_samples_if(&gate, &[1.0, 2.0]));
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().samples_written, 0);

        gate.store(true, Ordering::SeqCst);
        assert!(buffer.add_samples_if(&gate, &[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(drain_all(&buffer), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.stats().samples_dropped, 1);
    }

    #[test]
    fn test_buffered_duration() {
        let buffer = SampleBuffer::new(&AudioFormat::voice());
        buffer.add_samples(&vec![0.0; 480]);
        assert_eq!(buffer.buffered_duration(), Duration::from_millis(10));
    }
}
