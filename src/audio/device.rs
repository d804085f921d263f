//! cpal-backed capture and playback.
//!
//! cpal streams are not `Send`, so each stream lives on its own std thread
//! and exchanges PCM with the async pipelines over channels.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{
    AudioError, AudioSystem, CaptureSource, PlaybackSink, CAPTURE_FRAME_SAMPLES,
    CAPTURE_SAMPLE_RATE_HZ, CHANNELS, PLAYBACK_SAMPLE_RATE_HZ,
};

const FRAME_CHANNEL_CAPACITY: usize = 32;
const WORKER_POLL: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct CpalAudioSystem;

impl AudioSystem for CpalAudioSystem {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, AudioError> {
        Ok(Box::new(CpalCapture::open()?))
    }

    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, AudioError> {
        Ok(Box::new(CpalPlayback::open()?))
    }
}

pub struct CpalCapture {
    frame_rx: mpsc::Receiver<Bytes>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn open() -> Result<Self, AudioError> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let worker = thread::Builder::new()
            .name("voicelink-capture".into())
            .spawn(move || capture_worker(frame_tx, ready_tx, worker_stop))
            .map_err(|err| AudioError::StreamBuild {
                direction: "input",
                reason: err.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                frame_rx,
                stop,
                worker: Some(worker),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => Err(AudioError::WorkerGone),
        }
    }
}

#[async_trait]
impl CaptureSource for CpalCapture {
    async fn next_frame(&mut self) -> Result<Bytes, AudioError> {
        self.frame_rx.recv().await.ok_or(AudioError::WorkerGone)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn capture_worker(
    frame_tx: mpsc::Sender<Bytes>,
    ready_tx: std::sync::mpsc::Sender<Result<(), AudioError>>,
    stop: Arc<AtomicBool>,
) {
    let stream = match build_capture_stream(frame_tx) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamBuild {
            direction: "input",
            reason: err.to_string(),
        }));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(WORKER_POLL);
    }
    // Stream is dropped here, releasing the device.
}

fn build_capture_stream(frame_tx: mpsc::Sender<Bytes>) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::DeviceUnavailable { direction: "input" })?;
    let sample_format = device
        .default_input_config()
        .map_err(|err| AudioError::StreamBuild {
            direction: "input",
            reason: err.to_string(),
        })?
        .sample_format();
    let config = StreamConfig {
        channels: CHANNELS,
        sample_rate: SampleRate(CAPTURE_SAMPLE_RATE_HZ),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        target: "audio_device",
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        ?sample_format,
        "opening capture stream"
    );

    let err_fn = |err| warn!(target: "audio_device", %err, "capture stream error");

    let stream = match sample_format {
        SampleFormat::I16 => {
            let mut framer = FrameAssembler::new(frame_tx);
            device.build_input_stream(
                &config,
                move |data: &[i16], _| framer.push_i16(data),
                err_fn,
                None,
            )
        }
        _ => {
            let mut framer = FrameAssembler::new(frame_tx);
            device.build_input_stream(
                &config,
                move |data: &[f32], _| framer.push_f32(data),
                err_fn,
                None,
            )
        }
    };

    stream.map_err(|err| AudioError::StreamBuild {
        direction: "input",
        reason: err.to_string(),
    })
}

/// Reassembles variable-size device callbacks into fixed-size frames.
struct FrameAssembler {
    pending: Vec<i16>,
    frame_tx: mpsc::Sender<Bytes>,
    overflow_logged: bool,
}

impl FrameAssembler {
    fn new(frame_tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            pending: Vec::with_capacity(CAPTURE_FRAME_SAMPLES * 2),
            frame_tx,
            overflow_logged: false,
        }
    }

    fn push_i16(&mut self, data: &[i16]) {
        self.pending.extend_from_slice(data);
        self.flush_full_frames();
    }

    fn push_f32(&mut self, data: &[f32]) {
        self.pending.extend(
            data.iter()
                .map(|sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
        );
        self.flush_full_frames();
    }

    fn flush_full_frames(&mut self) {
        while self.pending.len() >= CAPTURE_FRAME_SAMPLES {
            let frame: Vec<i16> = self.pending.drain(..CAPTURE_FRAME_SAMPLES).collect();
            let mut pcm = Vec::with_capacity(frame.len() * 2);
            for sample in frame {
                pcm.extend_from_slice(&sample.to_le_bytes());
            }

            // The callback must never block; a full channel means the
            // session is not consuming, so the frame is dropped.
            if self.frame_tx.try_send(Bytes::from(pcm)).is_err() && !self.overflow_logged {
                warn!(target: "audio_device", "capture channel full, dropping frames");
                self.overflow_logged = true;
            }
        }
    }
}

pub struct CpalPlayback {
    pcm_tx: Option<mpsc::Sender<Bytes>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalPlayback {
    pub fn open() -> Result<Self, AudioError> {
        let (pcm_tx, pcm_rx) = mpsc::channel::<Bytes>(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let worker = thread::Builder::new()
            .name("voicelink-playback".into())
            .spawn(move || playback_worker(pcm_rx, ready_tx))
            .map_err(|err| AudioError::StreamBuild {
                direction: "output",
                reason: err.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                pcm_tx: Some(pcm_tx),
                worker: Some(worker),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => Err(AudioError::WorkerGone),
        }
    }
}

#[async_trait]
impl PlaybackSink for CpalPlayback {
    async fn play(&mut self, pcm: Bytes) -> Result<(), AudioError> {
        let tx = self.pcm_tx.as_ref().ok_or(AudioError::WorkerGone)?;
        tx.send(pcm).await.map_err(|_| AudioError::WorkerGone)
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.pcm_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn playback_worker(
    mut pcm_rx: mpsc::Receiver<Bytes>,
    ready_tx: std::sync::mpsc::Sender<Result<(), AudioError>>,
) {
    let buffer: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));

    let stream = match build_playback_stream(Arc::clone(&buffer)) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamBuild {
            direction: "output",
            reason: err.to_string(),
        }));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    while let Some(pcm) = pcm_rx.blocking_recv() {
        let samples = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]));
        match buffer.lock() {
            Ok(mut guard) => guard.extend(samples),
            Err(_) => break,
        }
    }
}

fn build_playback_stream(buffer: Arc<Mutex<VecDeque<i16>>>) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::DeviceUnavailable {
            direction: "output",
        })?;
    let sample_format = device
        .default_output_config()
        .map_err(|err| AudioError::StreamBuild {
            direction: "output",
            reason: err.to_string(),
        })?
        .sample_format();
    let config = StreamConfig {
        channels: CHANNELS,
        sample_rate: SampleRate(PLAYBACK_SAMPLE_RATE_HZ),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        target: "audio_device",
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        ?sample_format,
        "opening playback stream"
    );

    let err_fn = |err| warn!(target: "audio_device", %err, "playback stream error");

    let stream = match sample_format {
        SampleFormat::I16 => {
            let buffer = Arc::clone(&buffer);
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _| {
                    let mut guard = match buffer.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    for slot in data.iter_mut() {
                        *slot = guard.pop_front().unwrap_or(0);
                    }
                },
                err_fn,
                None,
            )
        }
        _ => {
            let buffer = Arc::clone(&buffer);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    let mut guard = match buffer.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    for slot in data.iter_mut() {
                        *slot = guard.pop_front().unwrap_or(0) as f32 / i16::MAX as f32;
                    }
                },
                err_fn,
                None,
            )
        }
    };

    stream.map_err(|err| AudioError::StreamBuild {
        direction: "output",
        reason: err.to_string(),
    })
}
