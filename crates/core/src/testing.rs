//! Recording doubles for the collaborator traits, shared by unit tests.

use std::sync::{Arc, Mutex};

use crate::{GridSink, Result, StopHandle, Tone, ToneSink, WaveGridError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridWrite {
    ClearAll(u8),
    Set { col: usize, row: usize, level: u8 },
}

/// Grid sink that logs every write.
#[derive(Debug, Clone, Default)]
pub struct RecordingGrid {
    writes: Arc<Mutex<Vec<GridWrite>>>,
    stop_on_first_write: Option<StopHandle>,
    fail: bool,
}

impl RecordingGrid {
    /// Fires `stop` from inside the first write, i.e. mid-frame.
    pub fn stopping_on_first_write(stop: StopHandle) -> Self {
        Self {
            stop_on_first_write: Some(stop),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<GridWrite>>> {
        self.writes.clone()
    }

    fn record(&mut self, write: GridWrite) -> Result<()> {
        if self.fail {
            return Err(WaveGridError::connection("grid went away"));
        }
        if let Some(stop) = self.stop_on_first_write.take() {
            stop.stop();
        }
        self.writes.lock().unwrap().push(write);
        Ok(())
    }
}

impl GridSink for RecordingGrid {
    fn clear_all(&mut self, level: u8) -> Result<()> {
        self.record(GridWrite::ClearAll(level))
    }

    fn set_cell(&mut self, col: usize, row: usize, level: u8) -> Result<()> {
        self.record(GridWrite::Set { col, row, level })
    }
}

/// Tone sink that keeps every submitted tone.
#[derive(Debug, Clone, Default)]
pub struct RecordingTones {
    tones: Arc<Mutex<Vec<Tone>>>,
}

impl RecordingTones {
    pub fn tones(&self) -> Arc<Mutex<Vec<Tone>>> {
        self.tones.clone()
    }
}

impl ToneSink for RecordingTones {
    fn submit(&mut self, tone: Tone) {
        self.tones.lock().unwrap().push(tone);
    }
}
