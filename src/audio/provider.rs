//! Pull-based sample provider contract
//!
//! Everything that can feed a playback sink implements [`SampleProvider`]:
//! the sample buffer, a session's reader handle, and the mixer. Sinks poll
//! at their own cadence, typically once per device callback.

use std::sync::Arc;

use crate::audio::format::AudioFormat;

/// A source of interleaved `f32` samples.
///
/// `read_into` must never block or suspend. Starvation is signalled by
/// returning fewer samples than `out.len()`; samples past the returned
/// count are left as they were.
pub trait SampleProvider: Send + Sync {
    /// Format of the samples produced
    fn format(&self) -> AudioFormat;

    /// Fill `out` with up to `out.len()` samples, returning how many were written
    fn read_into(&self, out: &mut [f32]) -> usize;
}

impl<P: SampleProvider + ?Sized> SampleProvider for Arc<P> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn read_into(&self, out: &mut [f32]) -> usize {
        (**self).read_into(out)
    }
}

/// Provider that always produces silence of a given format
pub struct Silence {
    format: AudioFormat,
}

impl Silence {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

impl SampleProvider for Silence {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_into(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        out.len()
    }
}

/// Read from `provider` into `out`, zero-filling whatever it could not supply.
/// Returns the number of real samples read.
pub fn read_padded<P: SampleProvider + ?Sized>(provider: &P, out: &mut [f32]) -> usize {
    let count = provider.read_into(out);
    out[count..].fill(0.0);
    count
}
