use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Notify;

use crate::{
    AppConfig, Bitmap, BitmapRenderer, GridSink, Phase, ToneQueue, ToneSink, ToneSynthesizer,
    WaveFunction,
};

/// Clonable, one-shot stop request shared between the frame loop, the tone
/// player and whoever wants to end them.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Clears a previous stop request so the handle can end another run.
    pub fn reset(&self) {
        self.inner.stopped.store(false, Ordering::SeqCst);
    }

    /// Resolves once [`StopHandle::stop`] has been called. A waiter woken by
    /// `stop` returns even if the request is reset before it is polled again.
    pub async fn stopped(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Running,
}

/// Outcome of a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    /// Phase the frame was rendered at.
    pub phase: Phase,
    /// `None` when rendering failed and the frame was skipped.
    pub bitmap: Option<Bitmap>,
    pub indicator: Option<u8>,
    pub tone_triggered: bool,
}

/// Owns the phase and drives the render, dispatch, tone, advance, sleep cycle.
pub struct AnimationController<G, T = ToneQueue> {
    renderer: BitmapRenderer,
    synth: ToneSynthesizer,
    grid: G,
    tones: Option<T>,
    phase: Phase,
    previous_indicator: f64,
    phase_increment: f64,
    threshold: f64,
    frame_interval: Duration,
    stop: StopHandle,
    state: AnimationState,
    frames: u64,
}

impl<G: GridSink, T: ToneSink> AnimationController<G, T> {
    pub fn new(config: &AppConfig, grid: G) -> Self {
        Self {
            renderer: BitmapRenderer::new(&config.wave),
            synth: ToneSynthesizer::new(&config.tone),
            grid,
            tones: None,
            phase: Phase::ZERO,
            previous_indicator: 0.0,
            phase_increment: config.animation.phase_increment,
            threshold: config.animation.indicator_threshold,
            frame_interval: config.animation.frame_interval(),
            stop: StopHandle::new(),
            state: AnimationState::Idle,
            frames: 0,
        }
    }

    /// Sends a tone to `tones` whenever the indicator moves past the threshold.
    pub fn with_tones(mut self, tones: T) -> Self {
        self.tones = Some(tones);
        self
    }

    pub fn with_function(mut self, function: WaveFunction) -> Self {
        self.renderer = self.renderer.with_function(function);
        self
    }

    /// Shares an existing stop handle, e.g. one already given to a tone player.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    /// Requests the loop to end. The frame in flight always completes.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Runs frames until [`AnimationController::stop`] is called. The stop flag
    /// is only checked between frames, and is cleared on return so a later
    /// `start` runs again. A stop requested before `start` is first polled
    /// still ends that run without rendering.
    pub async fn start(&mut self) {
        self.state = AnimationState::Running;
        tracing::info!(phase = self.phase.radians(), "animation started");

        while !self.stop.is_stopped() {
            self.step();
            tokio::select! {
                _ = tokio::time::sleep(self.frame_interval) => {}
                _ = self.stop.stopped() => {}
            }
        }

        self.stop.reset();
        self.state = AnimationState::Idle;
        tracing::info!(frames = self.frames, "animation stopped");
    }

    /// Renders, dispatches and scores one frame, then advances the phase.
    /// Render, grid and tone failures are logged and never end the loop.
    pub fn step(&mut self) -> FrameReport {
        let phase = self.phase;
        let mut report = FrameReport {
            frame: self.frames,
            phase,
            bitmap: None,
            indicator: None,
            tone_triggered: false,
        };

        match self.renderer.render(phase) {
            Ok(bitmap) => {
                if let Err(err) = self.grid.dispatch(&bitmap) {
                    tracing::warn!(%err, frame = self.frames, "grid write failed");
                }

                let indicator = bitmap.indicator();
                let level = f64::from(indicator);
                if (level - self.previous_indicator).abs() > self.threshold {
                    report.tone_triggered = self.trigger_tone(level);
                    self.previous_indicator = level;
                }

                report.indicator = Some(indicator);
                report.bitmap = Some(bitmap);
            }
            Err(err) => {
                tracing::warn!(%err, frame = self.frames, "skipping frame");
            }
        }

        self.phase = phase.advanced(self.phase_increment);
        self.frames += 1;
        report
    }

    fn trigger_tone(&mut self, indicator: f64) -> bool {
        let Some(tones) = self.tones.as_mut() else {
            return false;
        };

        match self.synth.synthesize(indicator) {
            Ok(tone) => {
                tracing::debug!(indicator, pitch = tone.pitch, "indicator moved, queueing tone");
                tones.submit(tone);
                true
            }
            Err(err) => {
                tracing::warn!(%err, "skipping tone");
                false
            }
        }
    }
}
