//! Audio device abstraction.
//!
//! The local device is modeled as a frame producer ([`CaptureSource`]) and a
//! PCM consumer ([`PlaybackSink`]); implementations keep blocking device I/O
//! on dedicated workers so a stalled device call never blocks the session
//! pipelines.

pub mod device;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Microphone capture rate expected by the upstream endpoint.
pub const CAPTURE_SAMPLE_RATE_HZ: u32 = 16_000;
/// Playback rate of the audio the endpoint streams back.
pub const PLAYBACK_SAMPLE_RATE_HZ: u32 = 24_000;
/// Mono, 16-bit signed little-endian samples in both directions.
pub const CHANNELS: u16 = 1;
/// Samples per capture frame handed to the outbound pipeline.
pub const CAPTURE_FRAME_SAMPLES: usize = 1024;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no default {direction} device available")]
    DeviceUnavailable { direction: &'static str },
    #[error("failed to build {direction} stream: {reason}")]
    StreamBuild {
        direction: &'static str,
        reason: String,
    },
    #[error("audio worker stopped unexpectedly")]
    WorkerGone,
}

/// Produces fixed-size PCM frames from the input device.
#[async_trait]
pub trait CaptureSource: Send {
    /// Next captured frame; resolves when the device worker has one ready.
    async fn next_frame(&mut self) -> Result<Bytes, AudioError>;
}

/// Consumes PCM buffers and plays them on the output device in order.
#[async_trait]
pub trait PlaybackSink: Send {
    async fn play(&mut self, pcm: Bytes) -> Result<(), AudioError>;
}

/// Opens capture and playback streams; one pair per connection cycle.
pub trait AudioSystem: Send + Sync {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, AudioError>;
    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, AudioError>;
}
