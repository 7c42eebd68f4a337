//! # Voice Stream Buffer
//!
//! Bounded producer/consumer buffering for real-time voice audio.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Input Device │   │ Opus Packets │
//! │  (capture)   │   │  (network)   │
//! └──────┬───────┘   └──────┬───────┘
//!        │                  │ VoiceDecoder
//!        ▼                  ▼
//! ┌─────────────────────────────────────────┐
//! │ StreamSession                           │
//! │   BufferWriter ──▶ SampleBuffer ──▶ BufferReader
//! │                   (bounded FIFO,        │
//! │                    oldest evicted)      │
//! └─────────────────────────────┬───────────┘
//!                               │ SampleProvider
//!                               ▼
//!                       ┌──────────────┐
//!                       │    Mixer     │ (optional)
//!                       └──────┬───────┘
//!                              ▼
//!                       ┌──────────────┐
//!                       │Output Device │
//!                       │  (playback)  │
//!                       └──────────────┘
//! ```
//!
//! The buffer never blocks and never fails. When the producer outruns the
//! consumer the oldest audio is discarded; when the consumer outruns the
//! producer it gets a short read and pads with silence.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;

pub use audio::{AudioFormat, SampleBuffer, SampleProvider, StreamSession};
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Audio retained by a stream session before the oldest samples are evicted
    pub const DEFAULT_BUFFER_DURATION_SECS: u64 = 10;

    /// Longest Opus frame
    pub const MAX_OPUS_FRAME_MS: usize = 120;

    /// Concealment length when no packet has been decoded yet
    pub const DEFAULT_LOSS_FRAME_MS: usize = 20;
}
