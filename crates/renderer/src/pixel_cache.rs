//! Lazily computed pixel coordinates of a mark's points
//!
//! Only hit-testing needs pixel positions, so they are not recomputed while
//! animating. Every invalidating change bumps a generation counter; `ensure`
//! recomputes when the coordinates were produced for an older generation.

use crate::scales::Scale;

/// Pixel coordinates borrowed from a fresh cache
#[derive(Debug, Clone, Copy)]
pub struct PixelCoords<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
}

impl PixelCoords<'_> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PixelCache {
    generation: u64,
    computed: Option<u64>,
    x: Vec<f64>,
    y: Vec<f64>,
    rebuilds: u64,
}

impl PixelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position data, a scale domain or a layout range changed
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.computed != Some(self.generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of recomputations so far
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Coordinates for the current generation, recomputed if needed.
    ///
    /// Both sequences cover `min(x.len(), y.len())` points.
    pub fn ensure(
        &mut self,
        x: &[f64],
        y: &[f64],
        x_scale: &dyn Scale,
        y_scale: &dyn Scale,
    ) -> PixelCoords<'_> {
        if self.is_dirty() {
            let count = x.len().min(y.len());
            let (x_offset, y_offset) = (x_scale.offset(), y_scale.offset());

            self.x.clear();
            self.y.clear();
            self.x.reserve(count);
            self.y.reserve(count);
            for (&px, &py) in x.iter().zip(y).take(count) {
                self.x.push(x_scale.scale(px) + x_offset);
                self.y.push(y_scale.scale(py) + y_offset);
            }

            self.computed = Some(self.generation);
            self.rebuilds += 1;
        }

        PixelCoords {
            x: &self.x,
            y: &self.y,
        }
    }
}
