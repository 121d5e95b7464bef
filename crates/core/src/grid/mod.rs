use crate::{Bitmap, Result, WaveGridError};

/// Write side of a light-matrix controller. Writes are fire-and-forget: an
/// error only reports that a single write could not be handed off.
pub trait GridSink: Send {
    /// Sets every LED to `level`.
    fn clear_all(&mut self, level: u8) -> Result<()>;

    /// Sets the LED at column `col`, row `row` to `level`.
    fn set_cell(&mut self, col: usize, row: usize, level: u8) -> Result<()>;

    /// Pushes a whole frame: clear everything, then write every cell. A failed
    /// write is logged and the rest of the frame is still sent; the first
    /// failure is returned once every write has been attempted.
    fn dispatch(&mut self, bitmap: &Bitmap) -> Result<()> {
        let mut first_error = self.clear_all(0).err();
        for (col, row, level) in bitmap.cells() {
            if let Err(err) = self.set_cell(col, row, level) {
                tracing::debug!(%err, col, row, "cell write failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<G: GridSink + ?Sized> GridSink for Box<G> {
    fn clear_all(&mut self, level: u8) -> Result<()> {
        (**self).clear_all(level)
    }

    fn set_cell(&mut self, col: usize, row: usize, level: u8) -> Result<()> {
        (**self).set_cell(col, row, level)
    }
}

/// In-memory grid that mirrors whatever was last written to it.
#[derive(Debug, Clone)]
pub struct MirrorGrid {
    bitmap: Bitmap,
}

impl MirrorGrid {
    pub fn new(size: usize) -> Self {
        Self {
            bitmap: Bitmap::new(size),
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl GridSink for MirrorGrid {
    fn clear_all(&mut self, level: u8) -> Result<()> {
        let size = self.bitmap.size();
        for row in 0..size {
            for col in 0..size {
                self.bitmap.set(col, row, level);
            }
        }
        Ok(())
    }

    fn set_cell(&mut self, col: usize, row: usize, level: u8) -> Result<()> {
        let size = self.bitmap.size();
        if col >= size || row >= size {
            return Err(WaveGridError::render(format!(
                "cell ({col}, {row}) is outside a {size}x{size} grid"
            )));
        }
        self.bitmap.set(col, row, level);
        Ok(())
    }
}
