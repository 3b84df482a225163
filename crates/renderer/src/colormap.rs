//! Color lookup texture built from a continuous color scale

use log::debug;

use gpu_scatter_shared::ScatterResult;

use crate::backend::{GpuBackend, TextureId};
use crate::scales::ColorScale;

/// Entries in the lookup texture
pub const COLORMAP_SIZE: usize = 256;

/// Stops used when the mark has no color scale
const DEFAULT_STOPS: [[f32; 3]; 2] = [[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];

/// Sample `stops` at `COLORMAP_SIZE` even steps, piecewise linearly
pub fn build_lut(stops: &[[f32; 3]]) -> Vec<[u8; 3]> {
    let stops = if stops.is_empty() { &DEFAULT_STOPS[..] } else { stops };
    let last = stops.len() - 1;

    (0..COLORMAP_SIZE)
        .map(|i| {
            let t = i as f32 / (COLORMAP_SIZE - 1) as f32;
            let position = t * last as f32;
            let segment = (position.floor() as usize).min(last);
            let next = (segment + 1).min(last);
            let local = position - segment as f32;

            let mut texel = [0u8; 3];
            for (c, out) in texel.iter_mut().enumerate() {
                let value = stops[segment][c] + (stops[next][c] - stops[segment][c]) * local;
                *out = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            texel
        })
        .collect()
}

/// Keeps a mark's colormap texture in step with its color scale
#[derive(Debug)]
pub struct ColorMapBuilder {
    label: String,
    texture: Option<TextureId>,
    dirty: bool,
    rebuilds: u64,
}

impl ColorMapBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            texture: None,
            dirty: true,
            rebuilds: 0,
        }
    }

    /// The color scale's domain or range changed
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Rebuild the texture if it was invalidated
    pub fn sync(
        &mut self,
        backend: &mut dyn GpuBackend,
        scale: Option<&dyn ColorScale>,
    ) -> ScatterResult<TextureId> {
        if let (false, Some(texture)) = (self.dirty, self.texture) {
            return Ok(texture);
        }

        let stops = scale.map(|scale| scale.color_range()).unwrap_or_default();
        let lut = build_lut(&stops);
        let texture = backend.create_colormap(&self.label, &lut)?;
        if let Some(old) = self.texture.replace(texture) {
            backend.destroy_texture(old);
        }

        self.dirty = false;
        self.rebuilds += 1;
        debug!(
            "[ColorMapBuilder] {}: rebuilt from {} stops",
            self.label,
            stops.len()
        );
        Ok(texture)
    }

    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
        self.dirty = true;
    }
}
