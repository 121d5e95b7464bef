use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Phase, Result, WaveConfig, WaveFunction, WaveGridError, WaveSampler};

/// What to do when a rescaled sample lands outside the grid's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOverflow {
    /// Pin rows and brightness to the edges of their ranges.
    #[default]
    Saturate,
    /// Fail the frame with a render error.
    Reject,
}

/// Square grid of LED levels, indexed `(col, row)` with row 0 at the top.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    size: usize,
    levels: Vec<u8>,
}

impl Bitmap {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            levels: vec![0; size * size],
        }
    }

    /// Builds a bitmap from rows listed top to bottom.
    pub fn from_rows<const N: usize>(rows: [[u8; N]; N]) -> Self {
        let mut bitmap = Self::new(N);
        for (row, levels) in rows.iter().enumerate() {
            bitmap.levels[row * N..(row + 1) * N].copy_from_slice(levels);
        }
        bitmap
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, col: usize, row: usize) -> u8 {
        self.levels[row * self.size + col]
    }

    pub fn set(&mut self, col: usize, row: usize, level: u8) {
        self.levels[row * self.size + col] = level;
    }

    pub fn row(&self, row: usize) -> &[u8] {
        &self.levels[row * self.size..(row + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.levels.chunks(self.size.max(1))
    }

    /// Iterates every cell as `(col, row, level)`, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .map(move |(index, level)| (index % self.size, index / self.size, *level))
    }

    /// Brightest level in the middle row (`size / 2`).
    pub fn indicator(&self) -> u8 {
        self.row(self.size / 2).iter().copied().max().unwrap_or(0)
    }

    /// Number of lit cells in a column.
    pub fn lit_in_column(&self, col: usize) -> usize {
        (0..self.size).filter(|row| self.get(col, *row) > 0).count()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}

impl fmt::Display for Bitmap {
    /// One hex digit per cell, `.` for dark cells.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for level in row {
                if *level == 0 {
                    write!(f, ".")?;
                } else {
                    write!(f, "{level:x}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Turns a phase into a sparse bitmap: one lit cell per column tracing the wave.
#[derive(Debug, Clone)]
pub struct BitmapRenderer {
    sampler: WaveSampler,
    grid_size: usize,
    brightness_max: u8,
    overflow: RowOverflow,
    /// Internal sample index feeding each display column.
    column_samples: Vec<usize>,
}

impl BitmapRenderer {
    pub fn new(config: &WaveConfig) -> Self {
        let sampler = WaveSampler::from_config(config);
        let column_samples = column_samples(config.grid_size, sampler.resolution());

        Self {
            sampler,
            grid_size: config.grid_size,
            brightness_max: config.brightness_max,
            overflow: config.row_overflow,
            column_samples,
        }
    }

    pub fn with_function(mut self, function: WaveFunction) -> Self {
        self.sampler = self.sampler.with_function(function);
        self
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Renders one frame. Pure: the same phase always yields the same bitmap.
    pub fn render(&self, phase: Phase) -> Result<Bitmap> {
        let samples = self.sampler.sample(phase);
        let top = (self.grid_size - 1) as f64;
        let brightest = f64::from(self.brightness_max);
        let mut bitmap = Bitmap::new(self.grid_size);

        for (col, index) in self.column_samples.iter().copied().enumerate() {
            let sample = samples[index];
            if !sample.is_finite() {
                return Err(WaveGridError::render(format!(
                    "wave produced {sample} at sample {index}"
                )));
            }

            let row = rescale(sample, (-1.0, 1.0), (0.0, top)).round();
            let level = rescale(sample.abs(), (0.0, 1.0), (1.0, brightest)).round();

            let (row, level) = match self.overflow {
                RowOverflow::Saturate => (row.clamp(0.0, top), level.clamp(1.0, brightest)),
                RowOverflow::Reject => {
                    if !(0.0..=top).contains(&row) {
                        return Err(WaveGridError::render(format!(
                            "row {row} for column {col} is outside 0..={top}"
                        )));
                    }
                    (row, level.clamp(1.0, brightest))
                }
            };

            bitmap.set(col, row as usize, level as u8);
        }

        Ok(bitmap)
    }
}

/// Maps each display column onto the nearest internal sample by linear
/// interpolation between the two index spaces.
fn column_samples(grid_size: usize, resolution: usize) -> Vec<usize> {
    let last_sample = (resolution - 1) as f64;
    let last_col = (grid_size - 1) as f64;
    (0..grid_size)
        .map(|col| ((col as f64 * last_sample / last_col).round() as usize).min(resolution - 1))
        .collect()
}

fn rescale(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    (value - from.0) * (to.1 - to.0) / (from.1 - from.0) + to.0
}
