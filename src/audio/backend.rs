use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Processing constraints requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl AudioConstraints {
    /// Constraints used for speech capture
    pub fn speech() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Stop/liveness handle shared between a track's producer and its owners
#[derive(Debug, Clone)]
pub struct TrackHandle {
    sid: String,
    live: Arc<AtomicBool>,
}

impl TrackHandle {
    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Signal the producer to stop emitting frames
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// A locally captured audio track, not yet published
#[derive(Debug)]
pub struct LocalAudioTrack {
    handle: TrackHandle,
    frames: mpsc::Receiver<AudioFrame>,
}

impl LocalAudioTrack {
    /// Wrap a frame channel. The producer should stop once `live` reads false.
    pub fn new(frames: mpsc::Receiver<AudioFrame>, live: Arc<AtomicBool>) -> Self {
        Self {
            handle: TrackHandle {
                sid: format!("TR_{}", uuid::Uuid::new_v4().simple()),
                live,
            },
            frames,
        }
    }

    pub fn handle(&self) -> TrackHandle {
        self.handle.clone()
    }

    pub fn into_parts(self) -> (TrackHandle, mpsc::Receiver<AudioFrame>) {
        (self.handle, self.frames)
    }
}

/// Result of a capture request
#[derive(Debug, Default)]
pub struct MediaStream {
    pub audio_tracks: Vec<LocalAudioTrack>,
}

/// Media-capture collaborator (microphone access)
///
/// Implementations:
/// - WavCapture: streams a WAV file as if it were a microphone
/// - test doubles in `tests/common`
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request an audio capture stream honoring `constraints`
    async fn get_user_media(&self, constraints: AudioConstraints) -> Result<MediaStream>;

    /// Device name for logging
    fn name(&self) -> &str;
}
