//! Audio stream format descriptor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::error::AudioError;

/// Sample encoding of the stream as delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    F32,
    I16,
    U16,
}

impl SampleType {
    /// Size of one sample in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::F32 => 4,
            SampleType::I16 | SampleType::U16 => 2,
        }
    }
}

impl From<cpal::SampleFormat> for SampleType {
    fn from(format: cpal::SampleFormat) -> Self {
        match format {
            cpal::SampleFormat::I16 => SampleType::I16,
            cpal::SampleFormat::U16 => SampleType::U16,
            _ => SampleType::F32,
        }
    }
}

/// Sample rate, channel count and encoding of an audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default)]
    pub sample_type: SampleType,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_type: SampleType::F32,
        }
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Mono 48 kHz, the usual voice format
    pub fn voice() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, 1)
    }

    /// Interleaved samples produced per second across all channels
    pub fn samples_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64
    }

    /// Number of interleaved samples needed to hold `duration` of audio
    pub fn samples_for_duration(&self, duration: Duration) -> usize {
        let total = self.samples_per_second() as u128 * duration.as_nanos() / 1_000_000_000;
        usize::try_from(total).unwrap_or(usize::MAX)
    }

    /// Byte budget for `duration` of audio in this format's encoding
    pub fn bytes_for_duration(&self, duration: Duration) -> usize {
        self.samples_for_duration(duration)
            .saturating_mul(self.sample_type.bytes_per_sample())
    }

    /// Playback time represented by `samples` interleaved samples
    pub fn duration_of(&self, samples: usize) -> Duration {
        let per_second = self.samples_per_second();
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(samples as u64 * 1_000_000_000 / per_second)
    }

    /// Reject formats that cannot carry audio.
    ///
    /// The buffer does not call this; a zero format just degenerates to
    /// a buffer that never holds anything.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(AudioError::InvalidFormat {
                sample_rate: self.sample_rate,
                channels: self.channels,
            });
        }
        Ok(())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {:?}",
            self.sample_rate, self.channels, self.sample_type
        )
    }
}

impl From<&cpal::StreamConfig> for AudioFormat {
    fn from(config: &cpal::StreamConfig) -> Self {
        Self::new(config.sample_rate.0, config.channels)
    }
}
