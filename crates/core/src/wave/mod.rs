use std::f64::consts::{FRAC_2_PI, TAU};

use serde::{Deserialize, Serialize};

use crate::WaveConfig;

/// Depth of the phase's self-modulation: each frame adds `0.05 * sin(phase)` on
/// top of the base increment.
pub const PHASE_MODULATION: f64 = 0.05;

/// Continuous, unbounded phase offset of the wave.
///
/// The raw value is never wrapped. Consumers only see it through periodic
/// functions, so long runtimes cannot push it into a range where it changes
/// the picture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Phase(f64);

impl Phase {
    pub const ZERO: Phase = Phase(0.0);

    pub fn new(radians: f64) -> Self {
        Self(radians)
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    /// Shifts a spatial angle by this phase.
    pub fn shift(self, angle: f64) -> f64 {
        angle + self.0
    }

    /// Returns the phase after one frame: `phase + increment + 0.05 * sin(phase)`.
    pub fn advanced(self, increment: f64) -> Self {
        Self(self.0 + increment + PHASE_MODULATION * self.sin())
    }
}

/// Named periodic shapes, each with period `2π` and range `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Saw,
}

impl WaveShape {
    pub fn eval(self, angle: f64) -> f64 {
        match self {
            WaveShape::Sine => angle.sin(),
            WaveShape::Triangle => FRAC_2_PI * angle.sin().asin(),
            WaveShape::Square => {
                if angle.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveShape::Saw => {
                let cycles = angle / TAU;
                2.0 * (cycles - (cycles + 0.5).floor())
            }
        }
    }
}

/// The function drawn on the grid: a named shape or any periodic function of
/// an angle in radians.
#[derive(Debug, Clone, Copy)]
pub enum WaveFunction {
    Shape(WaveShape),
    Custom(fn(f64) -> f64),
}

impl WaveFunction {
    pub fn eval(&self, angle: f64) -> f64 {
        match self {
            WaveFunction::Shape(shape) => shape.eval(angle),
            WaveFunction::Custom(function) => function(angle),
        }
    }
}

impl Default for WaveFunction {
    fn default() -> Self {
        WaveFunction::Shape(WaveShape::Sine)
    }
}

impl From<WaveShape> for WaveFunction {
    fn from(shape: WaveShape) -> Self {
        WaveFunction::Shape(shape)
    }
}

/// Evaluates a wave over one spatial period at a fixed resolution.
#[derive(Debug, Clone)]
pub struct WaveSampler {
    function: WaveFunction,
    amplitude: f64,
    period: f64,
    positions: Vec<f64>,
}

impl WaveSampler {
    /// `period` is the spatial width of one cycle (the grid size); `resolution`
    /// evenly spaced positions cover `[0, period)`.
    pub fn new(function: WaveFunction, amplitude: f64, period: usize, resolution: usize) -> Self {
        let period = period as f64;
        let step = period / resolution as f64;
        let positions = (0..resolution).map(|i| i as f64 * step).collect();

        Self {
            function,
            amplitude,
            period,
            positions,
        }
    }

    pub fn from_config(config: &WaveConfig) -> Self {
        Self::new(
            config.shape.into(),
            config.amplitude,
            config.grid_size,
            config.internal_resolution,
        )
    }

    pub fn with_function(mut self, function: WaveFunction) -> Self {
        self.function = function;
        self
    }

    pub fn resolution(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Samples `amplitude * f(2π * x / period + phase)` at every position.
    pub fn sample(&self, phase: Phase) -> Vec<f64> {
        self.positions
            .iter()
            .map(|x| self.amplitude * self.function.eval(phase.shift(TAU * (x / self.period))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_sampler() -> WaveSampler {
        WaveSampler::new(WaveFunction::default(), 1.0, 8, 32)
    }

    #[test]
    fn positions_cover_one_period_without_endpoint() {
        let sampler = sine_sampler();
        let positions = sampler.positions();
        assert_eq!(positions.len(), 32);
        assert_eq!(positions[0], 0.0);
        assert_eq!(positions[1], 0.25);
        assert_eq!(positions[31], 7.75);
    }

    #[test]
    fn samples_stay_within_amplitude() {
        let sampler = WaveSampler::new(WaveFunction::default(), 0.5, 8, 32);
        for step in 0..50 {
            let phase = Phase::new(step as f64 * 0.37);
            for value in sampler.sample(phase) {
                assert!(value.abs() <= 0.5 + 1e-12);
            }
        }
    }

    #[test]
    fn phase_shifts_the_wave() {
        let sampler = sine_sampler();
        let quarter = sampler.sample(Phase::new(std::f64::consts::FRAC_PI_2));
        assert!((quarter[0] - 1.0).abs() < 1e-12);
        let baseline = sampler.sample(Phase::ZERO);
        assert!(baseline[0].abs() < 1e-12);
        assert!((baseline[8] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn custom_functions_are_sampled() {
        let sampler = sine_sampler().with_function(WaveFunction::Custom(|_| 0.25));
        assert!(sampler.sample(Phase::new(3.0)).iter().all(|v| *v == 0.25));
    }

    #[test]
    fn shapes_are_bounded_and_periodic() {
        for shape in [
            WaveShape::Sine,
            WaveShape::Triangle,
            WaveShape::Square,
            WaveShape::Saw,
        ] {
            for step in 0..64 {
                let angle = step as f64 * 0.3 - 5.0;
                let value = shape.eval(angle);
                assert!((-1.0..=1.0).contains(&value), "{shape:?} at {angle}");
                assert!((shape.eval(angle + TAU) - value).abs() < 1e-9, "{shape:?}");
            }
        }
    }

    #[test]
    fn phase_recurrence_is_reproducible() {
        let expected = [
            0.0,
            0.1,
            0.20499167083234143,
            0.3151696210890729,
            0.43066850818343266,
        ];

        let mut phase = Phase::ZERO;
        for value in expected {
            assert!((phase.radians() - value).abs() < 1e-15, "{phase:?} != {value}");
            phase = phase.advanced(0.1);
        }
    }
}
