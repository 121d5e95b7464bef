//! Core library for the wave grid animator.
//!
//! A sampled wave is rescaled onto a square LED grid, one bitmap per frame,
//! while the phase drifts forward. Frames are pushed to a monome-style grid
//! over serialosc, and a short tone is played whenever the brightness
//! indicator moves. Each module owns one piece of that pipeline and the
//! [`ConnectionManager`] ties them together at runtime.

pub mod animation;
pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod grid;
pub mod osc;
pub mod render;
pub mod tone;
pub mod wave;

#[cfg(test)]
mod testing;

pub use animation::{AnimationController, AnimationState, FrameReport, StopHandle};
#[cfg(feature = "cpal")]
pub use audio::CpalOutput;
pub use audio::{
    default_output_factory, AudioOutput, NullOutput, OutputFactory, ToneQueue, TonePlayer,
    ToneSink,
};
pub use config::{AnimationConfig, AppConfig, SerialOscConfig, ToneConfig, WaveConfig};
pub use connection::{
    ConnectionManager, ConnectionState, DeviceInfo, Flow, GridConnector, GridInfo, Notification,
};
pub use error::{Result, WaveGridError};
pub use grid::{GridSink, MirrorGrid};
pub use osc::{OscGrid, OscGridConnector, SerialOscClient};
pub use render::{Bitmap, BitmapRenderer, RowOverflow};
pub use tone::{Envelope, Tone, ToneSynthesizer};
pub use wave::{Phase, WaveFunction, WaveSampler, WaveShape, PHASE_MODULATION};
