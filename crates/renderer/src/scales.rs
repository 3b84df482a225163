//! Interfaces of the scale and layout collaborators
//!
//! Marks only read from these. Whoever owns the figure layout implements
//! them and tells the mark when domains or margins change. Simple linear
//! implementations are provided for hosts without their own scale system.

use std::cell::Cell;

use gpu_scatter_shared::Axis;

/// Mapping from a data domain to pixels along one axis
pub trait Scale {
    /// Pixel position of `value`, before `offset` is added
    fn scale(&self, value: f64) -> f64;
    fn domain(&self) -> [f64; 2];
    /// Constant pixel shift added after scaling
    fn offset(&self) -> f64 {
        0.0
    }
}

/// Pixel extents of the plot area
pub trait Layout {
    /// Pixel range of `axis` after padding, in the axis' own direction
    fn padded_range(&self, axis: Axis) -> [f64; 2];
    fn plot_area_width(&self) -> f64;
    fn plot_area_height(&self) -> f64;
}

/// Continuous color scale driving the colormap
pub trait ColorScale {
    /// Color stops sampled evenly across the domain, RGB in [0, 1]
    fn color_range(&self) -> Vec<[f32; 3]>;
    fn min(&self) -> Option<f64> {
        None
    }
    fn max(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug)]
pub struct LinearScale {
    domain: Cell<[f64; 2]>,
    range: Cell<[f64; 2]>,
    offset: Cell<f64>,
}

impl LinearScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self {
            domain: Cell::new(domain),
            range: Cell::new(range),
            offset: Cell::new(0.0),
        }
    }

    pub fn set_domain(&self, domain: [f64; 2]) {
        self.domain.set(domain);
    }

    pub fn set_range(&self, range: [f64; 2]) {
        self.range.set(range);
    }

    pub fn set_offset(&self, offset: f64) {
        self.offset.set(offset);
    }

    pub fn range(&self) -> [f64; 2] {
        self.range.get()
    }
}

impl Scale for LinearScale {
    fn scale(&self, value: f64) -> f64 {
        let [d0, d1] = self.domain.get();
        let [r0, r1] = self.range.get();
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    fn domain(&self) -> [f64; 2] {
        self.domain.get()
    }

    fn offset(&self) -> f64 {
        self.offset.get()
    }
}

/// Fixed-size plot area without padding negotiation
#[derive(Debug)]
pub struct StaticLayout {
    width: Cell<f64>,
    height: Cell<f64>,
}

impl StaticLayout {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: Cell::new(width),
            height: Cell::new(height),
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.width.set(width);
        self.height.set(height);
    }
}

impl Layout for StaticLayout {
    fn padded_range(&self, axis: Axis) -> [f64; 2] {
        match axis {
            Axis::X => [0.0, self.width.get()],
            // Pixel rows grow downwards
            Axis::Y => [self.height.get(), 0.0],
        }
    }

    fn plot_area_width(&self) -> f64 {
        self.width.get()
    }

    fn plot_area_height(&self) -> f64 {
        self.height.get()
    }
}

/// Color scale with explicit stops and an optional fixed domain
#[derive(Debug)]
pub struct LinearColorScale {
    stops: Vec<[f32; 3]>,
    min: Cell<Option<f64>>,
    max: Cell<Option<f64>>,
}

impl LinearColorScale {
    pub fn new(stops: Vec<[f32; 3]>) -> Self {
        Self {
            stops,
            min: Cell::new(None),
            max: Cell::new(None),
        }
    }

    pub fn with_domain(self, min: f64, max: f64) -> Self {
        self.set_domain(min, max);
        self
    }

    pub fn set_domain(&self, min: f64, max: f64) {
        self.min.set(Some(min));
        self.max.set(Some(max));
    }
}

impl ColorScale for LinearColorScale {
    fn color_range(&self) -> Vec<[f32; 3]> {
        self.stops.clone()
    }

    fn min(&self) -> Option<f64> {
        self.min.get()
    }

    fn max(&self) -> Option<f64> {
        self.max.get()
    }
}
