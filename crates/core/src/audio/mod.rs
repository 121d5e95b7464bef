//! Tone playback, kept off the frame loop.
//!
//! The animation loop hands finished [`Tone`]s to a [`ToneSink`]. In the
//! running application that sink is a [`ToneQueue`] feeding a [`TonePlayer`]
//! task, which plays each tone on a blocking thread and waits for the device
//! before pulling the next one. A slow or missing audio device therefore never
//! delays a frame.

#[cfg(feature = "cpal")]
mod device;

#[cfg(feature = "cpal")]
pub use device::CpalOutput;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{Result, StopHandle, Tone};

/// Blocking audio device. `play` starts playback, `wait` blocks until the
/// device has drained it.
pub trait AudioOutput: Send {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;
    fn wait(&mut self) -> Result<()>;
}

/// Opens a fresh output each time an animation session starts.
pub type OutputFactory = Box<dyn FnMut() -> Result<Box<dyn AudioOutput>> + Send>;

/// Output that discards everything. Used when no audio backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        tracing::trace!(samples = samples.len(), sample_rate, "discarding tone");
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The output the binary uses: the default `cpal` device when that feature is
/// enabled, otherwise [`NullOutput`].
pub fn default_output_factory(sample_rate: u32) -> OutputFactory {
    #[cfg(feature = "cpal")]
    {
        Box::new(move || {
            CpalOutput::open(sample_rate).map(|output| Box::new(output) as Box<dyn AudioOutput>)
        })
    }

    #[cfg(not(feature = "cpal"))]
    {
        Box::new(move || {
            tracing::warn!(sample_rate, "built without the `cpal` feature, tones are silent");
            Ok(Box::new(NullOutput) as Box<dyn AudioOutput>)
        })
    }
}

/// Receiver of synthesized tones. Submission must not block.
pub trait ToneSink: Send {
    fn submit(&mut self, tone: Tone);
}

/// Bounded, fire-and-forget queue into a [`TonePlayer`].
#[derive(Debug, Clone)]
pub struct ToneQueue {
    sender: mpsc::Sender<Tone>,
}

impl ToneSink for ToneQueue {
    fn submit(&mut self, tone: Tone) {
        match self.sender.try_send(tone) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(tone)) => {
                tracing::debug!(pitch = tone.pitch, "tone player busy, dropping tone");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("tone player has stopped, dropping tone");
            }
        }
    }
}

/// Background task that plays queued tones one after another.
#[derive(Debug)]
pub struct TonePlayer {
    queue: ToneQueue,
    task: JoinHandle<()>,
}

impl TonePlayer {
    /// Spawns the player on the current runtime. It exits once `stop` fires or
    /// every [`ToneQueue`] has been dropped.
    pub fn spawn(output: Box<dyn AudioOutput>, stop: StopHandle, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(play_tones(output, receiver, stop));

        Self {
            queue: ToneQueue { sender },
            task,
        }
    }

    pub fn queue(&self) -> ToneQueue {
        self.queue.clone()
    }

    /// Cancels the player without touching the animation it serves. A tone
    /// already handed to the device still plays out.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the player task to wind down.
    pub async fn join(self) {
        let TonePlayer { queue, task } = self;
        drop(queue);
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                tracing::error!(%err, "tone player task failed");
            }
        }
    }
}

async fn play_tones(
    mut output: Box<dyn AudioOutput>,
    mut receiver: mpsc::Receiver<Tone>,
    stop: StopHandle,
) {
    loop {
        let tone = tokio::select! {
            _ = stop.stopped() => break,
            tone = receiver.recv() => match tone {
                Some(tone) => tone,
                None => break,
            },
        };

        let played = tokio::task::spawn_blocking(move || {
            let result = output
                .play(&tone.samples, tone.sample_rate)
                .and_then(|()| output.wait());
            (output, result)
        })
        .await;

        match played {
            Ok((returned, result)) => {
                output = returned;
                if let Err(err) = result {
                    tracing::warn!(%err, "skipping tone");
                }
            }
            Err(err) => {
                tracing::error!(%err, "audio output panicked, tones disabled");
                return;
            }
        }
    }

    tracing::debug!("tone player stopped");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::*;
    use crate::WaveGridError;

    #[derive(Clone, Default)]
    struct CapturingOutput {
        played: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl AudioOutput for CapturingOutput {
        fn play(&mut self, samples: &[f32], _sample_rate: u32) -> Result<()> {
            if self.fail {
                return Err(WaveGridError::audio("device unplugged"));
            }
            self.played.lock().unwrap().push(samples.len());
            Ok(())
        }

        fn wait(&mut self) -> Result<()> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(())
        }
    }

    fn tone(len: usize) -> Tone {
        Tone {
            samples: vec![0.0; len],
            sample_rate: 44_100,
            pitch: 440.0,
        }
    }

    #[tokio::test]
    async fn plays_queued_tones_in_order() {
        let output = CapturingOutput::default();
        let played = output.played.clone();
        let stop = StopHandle::new();
        let player = TonePlayer::spawn(Box::new(output), stop.clone(), 4);

        let mut queue = player.queue();
        queue.submit(tone(10));
        queue.submit(tone(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        stop.stop();
        player.join().await;
        assert_eq!(*played.lock().unwrap(), vec![10, 20]);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let mut queue = ToneQueue { sender };

        queue.submit(tone(1));
        queue.submit(tone(2));

        assert_eq!(receiver.recv().await.unwrap().samples.len(), 1);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_ends_the_player() {
        let stop = StopHandle::new();
        let player = TonePlayer::spawn(Box::new(NullOutput), stop.clone(), 1);
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), player.join())
            .await
            .expect("player should exit after stop");
    }

    #[tokio::test]
    async fn cancel_is_independent_of_stop() {
        let stop = StopHandle::new();
        let player = TonePlayer::spawn(Box::new(NullOutput), stop.clone(), 1);
        player.cancel();
        tokio::time::timeout(Duration::from_secs(1), player.join())
            .await
            .expect("cancelled player should exit");
        assert!(!stop.is_stopped());
    }

    #[tokio::test]
    async fn device_errors_do_not_kill_the_player() {
        let output = CapturingOutput {
            fail: true,
            ..CapturingOutput::default()
        };
        let stop = StopHandle::new();
        let player = TonePlayer::spawn(Box::new(output), stop.clone(), 2);
        let mut queue = player.queue();
        queue.submit(tone(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!player.is_finished());
        stop.stop();
        player.join().await;
    }
}
