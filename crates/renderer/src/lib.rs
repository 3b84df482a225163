//! GPU scatter mark engine
//!
//! A [`ScatterMark`] encodes the visual channels of a scatter plot as
//! per-instance GPU buffers, animates data changes on the GPU, answers
//! brush selections from cached pixel coordinates and draws every point in
//! one instanced call per frame. Rendering goes through the [`GpuBackend`]
//! seam: [`WgpuBackend`] on a real device, [`HeadlessBackend`] in memory.

pub mod attribute_store;
pub mod backend;
pub mod buffer_pool;
pub mod clock;
pub mod colormap;
pub mod config;
pub mod encoding;
pub mod frame;
pub mod mark;
pub mod pixel_cache;
pub mod scales;
pub mod selection;
pub mod transition;
pub mod uniforms;
pub mod wgpu_backend;

pub use attribute_store::{AttributeStore, Baseline, ChannelLayout, Encoding, SetOptions};
pub use backend::{
    AttributeSlot, BufferId, DrawCall, GpuBackend, HeadlessBackend, SharedBackend, TextureId,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use colormap::ColorMapBuilder;
pub use config::{ConfigValidator, StyleDiff};
pub use encoding::ScatterData;
pub use frame::{CountingFrameHost, FrameHost, FrameScheduler};
pub use mark::{FrameReport, MarkCollaborators, ScatterMark, ViewPadding};
pub use pixel_cache::{PixelCache, PixelCoords};
pub use scales::{ColorScale, Layout, LinearColorScale, LinearScale, Scale, StaticLayout};
pub use selection::{SelectionEngine, SelectionMask, SelectorRequest};
pub use transition::{TickReport, TransitionScheduler, TransitionStart};
pub use uniforms::ScatterUniforms;
pub use wgpu_backend::{request_device, WgpuBackend};

pub use gpu_scatter_shared::{
    Axis, Channel, ChannelValue, FigureConfig, MarkerShape, ScatterConfig, ScatterError,
    ScatterResult, StyleDict,
};
