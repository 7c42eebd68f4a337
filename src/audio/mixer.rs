//! Mixer summing several sample providers into one stream

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::audio::format::AudioFormat;
use crate::audio::provider::SampleProvider;
use crate::error::AudioError;

/// Handle identifying a mixer input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(u32);

struct MixerInput {
    id: InputId,
    provider: Arc<dyn SampleProvider>,
    gain: f32,
}

struct MixerState {
    inputs: Vec<MixerInput>,
    master_gain: f32,
    /// Per-input read buffer, reused across callbacks
    scratch: Vec<f32>,
}

/// Sums every input's samples scaled by its gain.
///
/// All inputs must share the mixer's format. Inputs that come up short are
/// treated as silence for the remainder of the read.
pub struct Mixer {
    format: AudioFormat,
    state: Mutex<MixerState>,
    next_id: AtomicU32,
}

impl Mixer {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            state: Mutex::new(MixerState {
                inputs: Vec::new(),
                master_gain: 1.0,
                scratch: Vec::new(),
            }),
            next_id: AtomicU32::new(0),
        }
    }

    /// Add an input with the given linear gain
    pub fn add_input(
        &self,
        provider: Arc<dyn SampleProvider>,
        gain: f32,
    ) -> Result<InputId, AudioError> {
        let input_format = provider.format();
        if input_format != self.format {
            return Err(AudioError::FormatMismatch {
                expected: self.format.to_string(),
                actual: input_format.to_string(),
            });
        }

        let id = InputId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.lock().inputs.push(MixerInput { id, provider, gain });
        tracing::debug!(?id, gain, "mixer input added");
        Ok(id)
    }

    /// Remove an input; returns false if it was not present
    pub fn remove_input(&self, id: InputId) -> bool {
        let mut state = self.state.lock();
        let before = state.inputs.len();
        state.inputs.retain(|input| input.id != id);
        state.inputs.len() != before
    }

    /// Change an input's gain; returns false if it was not present
    pub fn set_gain(&self, id: InputId, gain: f32) -> bool {
        let mut state = self.state.lock();
        match state.inputs.iter_mut().find(|input| input.id == id) {
            Some(input) => {
                input.gain = gain;
                true
            }
            None => false,
        }
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.state.lock().master_gain = gain;
    }

    pub fn input_count(&self) -> usize {
        self.state.lock().inputs.len()
    }
}

impl SampleProvider for Mixer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    /// Returns the longest read among the inputs, 0 when all are starved.
    /// `out` is fully overwritten in either case.
    fn read_into(&self, out: &mut [f32]) -> usize {
        let mut state = self.state.lock();
        let MixerState {
            inputs,
            master_gain,
            scratch,
        } = &mut *state;

        out.fill(0.0);
        scratch.resize(out.len(), 0.0);

        let mut longest = 0;
        for input in inputs.iter() {
            let count = input.provider.read_into(scratch);
            for (dst, src) in out.iter_mut().zip(&scratch[..count]) {
                *dst += src * input.gain;
            }
            longest = longest.max(count);
        }

        for sample in out.iter_mut() {
            *sample = (*sample * *master_gain).clamp(-1.0, 1.0);
        }

        longest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;

    fn input(samples: &[f32]) -> Arc<SampleBuffer> {
        let buffer = Arc::new(SampleBuffer::with_capacity(16));
        buffer.add_samples(samples);
        buffer
    }

    #[test]
    fn test_sum_with_gain() {
        let mixer = Mixer::new(AudioFormat::default());
        mixer.add_input(input(&[0.2, 0.2, 0.2]), 1.0).unwrap();
        mixer.add_input(input(&[0.4, 0.4]), 0.5).unwrap();

        let mut out = [0.0f32; 4];
        assert_eq!(mixer.read_into(&mut out), 3);

        let expected = [0.4, 0.4, 0.2, 0.0];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{a} != {b}");
        }
    }

    #[test]
    fn test_clamps_output() {
        let mixer = Mixer::new(AudioFormat::default());
        mixer.add_input(input(&[0.9, -0.9]), 1.0).unwrap();
        mixer.add_input(input(&[0.9, -0.9]), 1.0).unwrap();

        let mut out = [0.0f32; 2];
        mixer.read_into(&mut out);
        assert_eq!(out, [1.0, -1.0]);
    }

    #[test]
    fn test_starved_inputs_yield_silence() {
        let mixer = Mixer::new(AudioFormat::default());
        mixer.add_input(input(&[]), 1.0).unwrap();

        let mut out = [0.5f32; 3];
        assert_eq!(mixer.read_into(&mut out), 0);
        assert_eq!(out, [0.0; 3]);
    }

    #[test]
    fn test_gain_and_removal() {
        let mixer = Mixer::new(AudioFormat::default());
        let a = mixer.add_input(input(&[0.5, 0.5]), 1.0).unwrap();
        let b = mixer.add_input(input(&[0.5, 0.5]), 1.0).unwrap();

        assert!(mixer.set_gain(a, 0.0));
        assert!(mixer.remove_input(b));
        assert!(!mixer.remove_input(b));
        assert_eq!(mixer.input_count(), 1);

        let mut out = [1.0f32; 2];
        assert_eq!(mixer.read_into(&mut out), 2);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_rejects_format_mismatch() {
        let mixer = Mixer::new(AudioFormat::voice());
        let result = mixer.add_input(input(&[]), 1.0);
        assert!(matches!(result, Err(AudioError::FormatMismatch { .. })));
    }
}
