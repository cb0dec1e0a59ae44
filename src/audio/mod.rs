pub mod backend;
pub mod file;

pub use backend::{
    AudioConstraints, AudioFrame, LocalAudioTrack, MediaDevices, MediaStream, TrackHandle,
};
pub use file::{AudioFile, WavCapture};
