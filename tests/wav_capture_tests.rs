// Tests for the WAV-file microphone
//
// Fixtures are generated into a temp dir so the suite needs no binary files.

use anyhow::Result;
use room_scribe::audio::{AudioConstraints, AudioFile, MediaDevices, WavCapture};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, samples: &[i16]) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    // 0.5 seconds of 16kHz mono
    let path = write_wav(dir.path(), "half.wav", 16000, 1, &vec![7i16; 8000]);

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 8000);
    assert!((audio.duration_seconds - 0.5).abs() < 0.001);
    assert!(audio.path.contains("half.wav"));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let result = AudioFile::open("/nonexistent/path/to/audio.wav");
    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_frames_split_by_duration() -> Result<()> {
    let dir = TempDir::new()?;
    // 250ms of 16kHz stereo
    let path = write_wav(dir.path(), "stereo.wav", 16000, 2, &vec![1i16; 8000]);
    let audio = AudioFile::open(&path)?;

    let frames = audio.frames(100);

    // 100ms stereo = 3200 samples per frame
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].samples.len(), 3200);
    assert_eq!(frames[2].samples.len(), 1600);
    assert_eq!(frames[1].timestamp_ms, 100);
    assert!(frames.iter().all(|f| f.channels == 2 && f.sample_rate == 16000));

    Ok(())
}

#[tokio::test]
async fn test_wav_capture_streams_all_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let samples: Vec<i16> = (0..3200).map(|i| i as i16).collect();
    let path = write_wav(dir.path(), "speech.wav", 16000, 1, &samples);

    let capture = WavCapture::new(&path, 20);
    let mut stream = capture.get_user_media(AudioConstraints::speech()).await?;
    assert_eq!(stream.audio_tracks.len(), 1);

    let track = stream.audio_tracks.remove(0);
    let (handle, mut frames) = track.into_parts();
    assert!(handle.is_live());

    let mut received = Vec::new();
    while let Some(frame) = frames.recv().await {
        received.extend(frame.samples);
    }

    assert_eq!(received, samples);
    Ok(())
}

#[tokio::test]
async fn test_wav_capture_stops_when_track_stopped() -> Result<()> {
    let dir = TempDir::new()?;
    // 10 seconds at 20ms per frame would take far longer than this test
    let path = write_wav(dir.path(), "long.wav", 16000, 1, &vec![0i16; 160_000]);

    let capture = WavCapture::new(&path, 20);
    let mut stream = capture.get_user_media(AudioConstraints::speech()).await?;
    let (handle, mut frames) = stream.audio_tracks.remove(0).into_parts();

    assert!(frames.recv().await.is_some());
    handle.stop();

    let drained = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while frames.recv().await.is_some() {}
    })
    .await;

    assert!(drained.is_ok(), "Capture should end once the track is stopped");
    Ok(())
}

#[tokio::test]
async fn test_wav_capture_empty_file_has_no_tracks() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "empty.wav", 16000, 1, &[]);

    let capture = WavCapture::new(&path, 100);
    let stream = capture.get_user_media(AudioConstraints::speech()).await?;

    assert!(stream.audio_tracks.is_empty());
    Ok(())
}
