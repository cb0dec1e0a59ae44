use super::backend::{AudioConstraints, AudioFrame, LocalAudioTrack, MediaDevices, MediaStream};
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split samples into frames of `buffer_duration_ms` each
    pub fn frames(&self, buffer_duration_ms: u64) -> Vec<AudioFrame> {
        let per_frame = (self.sample_rate as u64 * self.channels as u64 * buffer_duration_ms
            / 1000)
            .max(1) as usize;

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * buffer_duration_ms,
            })
            .collect()
    }
}

/// Microphone substitute that plays a WAV file in real time
pub struct WavCapture {
    path: PathBuf,
    buffer_duration_ms: u64,
}

impl WavCapture {
    pub fn new(path: impl Into<PathBuf>, buffer_duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            buffer_duration_ms: buffer_duration_ms.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl MediaDevices for WavCapture {
    async fn get_user_media(&self, constraints: AudioConstraints) -> Result<MediaStream> {
        if constraints.echo_cancellation || constraints.noise_suppression {
            info!("WAV capture ignores processing constraints {:?}", constraints);
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("WAV reader task panicked")??;

        if audio.samples.is_empty() {
            warn!("WAV file {} has no samples", audio.path);
            return Ok(MediaStream::default());
        }

        let frames = audio.frames(self.buffer_duration_ms);
        let (tx, rx) = mpsc::channel(100);
        let live = Arc::new(AtomicBool::new(true));
        let producer_live = Arc::clone(&live);
        let pace = Duration::from_millis(self.buffer_duration_ms);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pace);
            for frame in frames {
                ticker.tick().await;
                if !producer_live.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            info!("WAV capture finished");
        });

        Ok(MediaStream {
            audio_tracks: vec![LocalAudioTrack::new(rx, live)],
        })
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
