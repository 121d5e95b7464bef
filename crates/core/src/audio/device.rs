//! Playback through the default `cpal` output device.

use std::{
    collections::VecDeque,
    sync::{mpsc, Arc, Mutex},
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{AudioOutput, Result, WaveGridError};

const DRAIN_POLL: Duration = Duration::from_millis(5);

type Pending = Arc<Mutex<VecDeque<f32>>>;

/// Mono samples are copied into a shared queue that the device callback drains.
///
/// `cpal::Stream` cannot cross threads on every platform, so the stream lives on
/// a dedicated thread for as long as this value exists.
pub struct CpalOutput {
    sample_rate: u32,
    pending: Pending,
    _keep_alive: mpsc::Sender<()>,
}

impl CpalOutput {
    pub fn open(sample_rate: u32) -> Result<Self> {
        let pending: Pending = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (keep_alive, shutdown) = mpsc::channel::<()>();

        let stream_pending = pending.clone();
        thread::Builder::new()
            .name("wave-grid-audio".to_string())
            .spawn(move || match open_stream(sample_rate, stream_pending) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Returns once the owning `CpalOutput` is dropped.
                    let _ = shutdown.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })?;

        ready_rx
            .recv()
            .map_err(|_| WaveGridError::audio("audio thread exited during startup"))??;

        Ok(Self {
            sample_rate,
            pending,
            _keep_alive: keep_alive,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if sample_rate != self.sample_rate {
            return Err(WaveGridError::audio(format!(
                "device runs at {} Hz, tone is {sample_rate} Hz",
                self.sample_rate
            )));
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| WaveGridError::audio("playback queue has been poisoned"))?;
        pending.clear();
        pending.extend(samples.iter().copied());
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        loop {
            let drained = self
                .pending
                .lock()
                .map_err(|_| WaveGridError::audio("playback queue has been poisoned"))?
                .is_empty();
            if drained {
                return Ok(());
            }
            thread::sleep(DRAIN_POLL);
        }
    }
}

impl std::fmt::Debug for CpalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutput")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn open_stream(sample_rate: u32, pending: Pending) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    tracing::info!(host = ?host.id(), "opening audio host");

    let device = host
        .default_output_device()
        .ok_or_else(|| WaveGridError::audio("no audio output device found"))?;
    let supported = device
        .default_output_config()
        .map_err(|err| WaveGridError::audio(err.to_string()))?;

    let channels = supported.channels() as usize;
    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, pending, channels),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, pending, channels),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, pending, channels),
        other => Err(WaveGridError::audio(format!(
            "unsupported sample format {other:?}"
        ))),
    }?;

    stream
        .play()
        .map_err(|err| WaveGridError::audio(err.to_string()))?;
    tracing::info!(sample_rate, channels, "audio stream started");
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    pending: Pending,
    channels: usize,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pending) = pending.lock() else {
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = pending.pop_front().unwrap_or(0.0);
                    for slot in frame.iter_mut() {
                        *slot = T::from_sample(sample);
                    }
                }
            },
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )
        .map_err(|err| WaveGridError::audio(err.to_string()))
}
