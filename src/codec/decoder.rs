//! Opus voice decoder
//!
//! Turns received Opus packets into PCM and pushes it straight into a
//! stream session, so decoded network audio and local capture share the
//! same buffering path.

use opus::{Channels, Decoder};

use crate::audio::format::AudioFormat;
use crate::audio::session::BufferWriter;
use crate::constants::{DEFAULT_LOSS_FRAME_MS, MAX_OPUS_FRAME_MS};
use crate::error::CodecError;

/// Opus decoder feeding a session buffer
pub struct VoiceDecoder {
    decoder: Decoder,
    format: AudioFormat,
    /// Decode scratch, sized for the longest Opus frame
    decode_buffer: Vec<f32>,
    frames_decoded: u64,
    frames_concealed: u64,
    samples_produced: u64,
}

impl VoiceDecoder {
    /// Create a decoder for `format`; Opus supports mono and stereo only
    pub fn new(format: AudioFormat) -> Result<Self, CodecError> {
        let channels = match format.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            n => {
                return Err(CodecError::DecoderInit(format!(
                    "Unsupported channel count: {n}"
                )))
            }
        };

        let decoder = Decoder::new(format.sample_rate, channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        Ok(Self {
            decoder,
            format,
            decode_buffer: vec![
                0.0;
                format.sample_rate as usize * MAX_OPUS_FRAME_MS / 1000 * format.channels as usize
            ],
            frames_decoded: 0,
            frames_concealed: 0,
            samples_produced: 0,
        })
    }

    /// Decode one packet into the session. Returns the interleaved sample count.
    pub fn decode_into(&mut self, packet: &[u8], writer: &BufferWriter) -> Result<usize, CodecError> {
        let total = self.decode(packet, false, self.decode_buffer.len())?;
        self.frames_decoded += 1;
        writer.add_samples(&self.decode_buffer[..total]);
        Ok(total)
    }

    /// Recover a lost packet from the in-band FEC data carried by the next one
    pub fn decode_fec_into(&mut self, next_packet: &[u8], writer: &BufferWriter) -> Result<usize, CodecError> {
        let len = self.loss_frame_len();
        let total = self.decode(next_packet, true, len)?;
        self.frames_concealed += 1;
        writer.add_samples(&self.decode_buffer[..total]);
        Ok(total)
    }

    /// Synthesize audio for a lost packet with no FEC available
    pub fn conceal_into(&mut self, writer: &BufferWriter) -> Result<usize, CodecError> {
        let len = self.loss_frame_len();
        let total = self.decode(&[], false, len)?;
        self.frames_concealed += 1;
        writer.add_samples(&self.decode_buffer[..total]);
        Ok(total)
    }

    /// Interleaved length of one lost frame. Opus fills whatever it is
    /// given during PLC and FEC, so the output is sized to the last packet
    /// actually received, or 20 ms before any packet has arrived.
    fn loss_frame_len(&mut self) -> usize {
        let per_channel = match self.decoder.get_last_packet_duration() {
            Ok(n) if n > 0 => n as usize,
            _ => self.format.sample_rate as usize * DEFAULT_LOSS_FRAME_MS / 1000,
        };
        (per_channel * self.format.channels as usize).min(self.decode_buffer.len())
    }

    fn decode(&mut self, packet: &[u8], fec: bool, len: usize) -> Result<usize, CodecError> {
        let per_channel = self
            .decoder
            .decode_float(packet, &mut self.decode_buffer[..len], fec)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total = per_channel * self.format.channels as usize;
        self.samples_produced += total as u64;
        Ok(total)
    }

    /// Reset decoder state, e.g. when the remote stream restarts
    pub fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn stats(&self) -> DecoderStats {
        let frames = self.frames_decoded + self.frames_concealed;
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
            samples_produced: self.samples_produced,
            loss_rate: if frames > 0 {
                self.frames_concealed as f32 / frames as f32
            } else {
                0.0
            },
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
    pub samples_produced: u64,
    pub loss_rate: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::StreamSession;

    #[test]
    fn test_decoder_creation() {
        assert!(VoiceDecoder::new(AudioFormat::voice()).is_ok());
        assert!(VoiceDecoder::new(AudioFormat::new(48000, 2)).is_ok());
        assert!(matches!(
            VoiceDecoder::new(AudioFormat::new(48000, 6)),
            Err(CodecError::DecoderInit(_))
        ));
    }

    /// One 20 ms mono packet of a 440 Hz tone
    fn encoded_frame() -> Vec<u8> {
        let pcm: Vec<f32> = (0..960)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 48000.0).sin() * 0.5)
            .collect();
        let mut encoder =
            opus::Encoder::new(48000, Channels::Mono, opus::Application::Voip).unwrap();
        encoder.encode_vec_float(&pcm, 4000).unwrap()
    }

    #[test]
    fn test_concealment_matches_packet_duration() {
        let session = StreamSession::new(AudioFormat::voice());
        session.start();
        let writer = session.writer();
        let reader = session.reader();

        let mut decoder = VoiceDecoder::new(AudioFormat::voice()).unwrap();
        let decoded = decoder.decode_into(&encoded_frame(), &writer).unwrap();
        let concealed = decoder.conceal_into(&writer).unwrap();

        assert_eq!(decoded, 960);
        assert_eq!(concealed, decoded);
        assert_eq!(reader.available(), decoded + concealed);

        let stats = decoder.stats();
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.frames_concealed, 1);
        assert_eq!(stats.loss_rate, 0.5);
    }

    #[test]
    fn test_fec_recovery_matches_packet_duration() {
        let session = StreamSession::new(AudioFormat::voice());
        session.start();
        let writer = session.writer();

        let mut decoder = VoiceDecoder::new(AudioFormat::voice()).unwrap();
        let packet = encoded_frame();
        decoder.decode_into(&packet, &writer).unwrap();
        let recovered = decoder.decode_fec_into(&packet, &writer).unwrap();

        assert_eq!(recovered, 960);
    }

    #[test]
    fn test_concealment_before_first_packet() {
        let session = StreamSession::new(AudioFormat::new(48000, 2));
        session.start();
        let reader = session.reader();

        let mut decoder = VoiceDecoder::new(AudioFormat::new(48000, 2)).unwrap();
        let produced = decoder.conceal_into(&session.writer()).unwrap();

        // 20 ms of stereo
        assert_eq!(produced, 1920);
        assert_eq!(reader.available(), produced);

        let stats = decoder.stats();
        assert_eq!(stats.frames_concealed, 1);
        assert_eq!(stats.loss_rate, 1.0);
    }

    #[test]
    fn test_garbage_packet_fails() {
        let session = StreamSession::new(AudioFormat::voice());
        session.start();

        let mut decoder = VoiceDecoder::new(AudioFormat::voice()).unwrap();
        // TOC byte for code 3 with a frame count of zero is invalid
        let result = decoder.decode_into(&[0x03, 0x00], &session.writer());
        assert!(result.is_err());
        assert_eq!(session.reader().available(), 0);
    }
}
