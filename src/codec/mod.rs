//! Opus codec support
//!
//! Decodes received voice packets into a stream session's buffer.

pub mod decoder;

pub use decoder::{DecoderStats, VoiceDecoder};
