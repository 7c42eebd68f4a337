//! Audio subsystem module

pub mod buffer;
#[cfg(feature = "capture")]
pub mod capture;
pub mod device;
pub mod format;
pub mod mixer;
#[cfg(feature = "playback")]
pub mod playback;
pub mod provider;
pub mod session;

pub use buffer::{BufferStats, SampleBuffer};
#[cfg(feature = "capture")]
pub use capture::AudioCapture;
pub use device::{get_device_by_id, list_devices, AudioDevice, AudioDeviceInfo};
pub use format::{AudioFormat, SampleType};
pub use mixer::{InputId, Mixer};
#[cfg(feature = "playback")]
pub use playback::{AudioPlayback, PlaybackStats};
pub use provider::SampleProvider;
pub use session::{BufferReader, BufferWriter, SessionStats, StreamSession};
