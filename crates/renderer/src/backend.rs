//! GPU backend seam
//!
//! Marks never talk to a graphics API directly. They allocate buffers and
//! textures, upload contents and issue one instanced draw per frame through
//! [`GpuBackend`]. The wgpu implementation lives in `wgpu_backend`; the
//! [`HeadlessBackend`] below keeps everything in memory and records draws.
//!
//! An animated channel keeps its current and previous values in the two
//! halves of one buffer, so the program reads seven storage buffers while
//! still addressing twelve attribute slots. Each slot names its storage
//! binding and the float offset of its half.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use gpu_scatter_shared::{Channel, ScatterError, ScatterResult};

use crate::attribute_store::ChannelLayout;
use crate::uniforms::ScatterUniforms;

/// Handle to a channel's attribute buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Handle to a colormap texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Attribute slots read by the scatter program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    X,
    XPrevious,
    Y,
    YPrevious,
    Size,
    SizePrevious,
    Opacity,
    OpacityPrevious,
    Rotation,
    RotationPrevious,
    Color,
    Selected,
}

impl AttributeSlot {
    pub const COUNT: usize = 12;

    /// Storage buffers bound per draw, one per channel
    pub const STORAGE_BINDINGS: usize = 7;

    pub fn current(channel: Channel) -> Self {
        match channel {
            Channel::X => AttributeSlot::X,
            Channel::Y => AttributeSlot::Y,
            Channel::Size => AttributeSlot::Size,
            Channel::Opacity => AttributeSlot::Opacity,
            Channel::Rotation => AttributeSlot::Rotation,
            Channel::Color => AttributeSlot::Color,
            Channel::Selected => AttributeSlot::Selected,
        }
    }

    /// Slot holding the outgoing values of an animated channel
    pub fn previous(channel: Channel) -> Option<Self> {
        match channel {
            Channel::X => Some(AttributeSlot::XPrevious),
            Channel::Y => Some(AttributeSlot::YPrevious),
            Channel::Size => Some(AttributeSlot::SizePrevious),
            Channel::Opacity => Some(AttributeSlot::OpacityPrevious),
            Channel::Rotation => Some(AttributeSlot::RotationPrevious),
            Channel::Color | Channel::Selected => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Storage binding holding this slot, shared by a channel's two halves
    pub fn storage_binding(&self) -> usize {
        match self {
            AttributeSlot::X | AttributeSlot::XPrevious => 0,
            AttributeSlot::Y | AttributeSlot::YPrevious => 1,
            AttributeSlot::Size | AttributeSlot::SizePrevious => 2,
            AttributeSlot::Opacity | AttributeSlot::OpacityPrevious => 3,
            AttributeSlot::Rotation | AttributeSlot::RotationPrevious => 4,
            AttributeSlot::Color => 5,
            AttributeSlot::Selected => 6,
        }
    }
}

/// One half of a channel buffer bound to one program slot for a draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeBinding {
    pub slot: AttributeSlot,
    pub buffer: BufferId,
    pub layout: ChannelLayout,
    /// First float of the slot's values within the buffer
    pub offset: u32,
}

/// Storage buffer per binding, or an error when two slots of one binding
/// name different buffers
pub fn storage_buffers(
    bindings: &[AttributeBinding],
) -> ScatterResult<[Option<BufferId>; AttributeSlot::STORAGE_BINDINGS]> {
    let mut buffers = [None; AttributeSlot::STORAGE_BINDINGS];
    for binding in bindings {
        let entry = &mut buffers[binding.slot.storage_binding()];
        if let Some(buffer) = *entry {
            if buffer != binding.buffer {
                return Err(ScatterError::Gpu {
                    message: format!(
                        "slot {:?} binds {:?} where its channel buffer is {:?}",
                        binding.slot, binding.buffer, buffer
                    ),
                });
            }
        }
        *entry = Some(binding.buffer);
    }
    Ok(buffers)
}

/// Everything one instanced draw of a mark needs
pub struct DrawCall<'a> {
    pub label: &'a str,
    pub instances: u32,
    pub uniforms: &'a ScatterUniforms,
    pub bindings: &'a [AttributeBinding],
    pub colormap: Option<TextureId>,
}

/// GPU resource and draw interface shared by all marks of a figure
pub trait GpuBackend {
    /// Allocate a buffer sized for `contents` and upload them
    fn create_buffer(&mut self, label: &str, contents: &[f32]) -> ScatterResult<BufferId>;

    /// Overwrite a buffer starting `offset` floats in; `contents` must fit
    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        contents: &[f32],
    ) -> ScatterResult<()>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Create a read-only 1D lookup texture from RGB texels
    fn create_colormap(&mut self, label: &str, texels: &[[u8; 3]]) -> ScatterResult<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Issue one instanced quad draw
    fn draw(&mut self, call: &DrawCall<'_>) -> ScatterResult<()>;
}

/// Backend handle shared by the marks of one figure
pub type SharedBackend = Rc<RefCell<dyn GpuBackend>>;

/// Counters kept by the headless backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub buffers_created: u64,
    pub buffers_destroyed: u64,
    pub buffer_writes: u64,
    pub textures_created: u64,
    pub textures_destroyed: u64,
    pub draws: u64,
}

/// A draw captured by the headless backend
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub label: String,
    pub instances: u32,
    pub uniforms: ScatterUniforms,
    pub bindings: Vec<AttributeBinding>,
    pub colormap: Option<TextureId>,
}

impl RecordedDraw {
    pub fn binding(&self, slot: AttributeSlot) -> Option<&AttributeBinding> {
        self.bindings.iter().find(|binding| binding.slot == slot)
    }
}

struct HeadlessBuffer {
    label: String,
    contents: Vec<f32>,
}

/// In-memory backend: keeps buffer contents on the host and records draws
#[derive(Default)]
pub struct HeadlessBackend {
    next_id: u64,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    textures: HashMap<TextureId, Vec<[u8; 3]>>,
    draws: Vec<RecordedDraw>,
    stats: BackendStats,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[f32]> {
        self.buffers.get(&buffer).map(|b| b.contents.as_slice())
    }

    pub fn buffer_label(&self, buffer: BufferId) -> Option<&str> {
        self.buffers.get(&buffer).map(|b| b.label.as_str())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_texels(&self, texture: TextureId) -> Option<&[[u8; 3]]> {
        self.textures.get(&texture).map(Vec::as_slice)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn last_draw(&self) -> Option<&RecordedDraw> {
        self.draws.last()
    }

    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_buffer(&mut self, label: &str, contents: &[f32]) -> ScatterResult<BufferId> {
        let id = BufferId(self.next_id());
        self.buffers.insert(
            id,
            HeadlessBuffer {
                label: label.to_string(),
                contents: contents.to_vec(),
            },
        );
        self.stats.buffers_created += 1;
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        contents: &[f32],
    ) -> ScatterResult<()> {
        let entry = self.buffers.get_mut(&buffer).ok_or_else(|| ScatterError::Gpu {
            message: format!("write to unknown buffer {buffer:?}"),
        })?;
        let end = offset + contents.len();
        if end > entry.contents.len() {
            return Err(ScatterError::Gpu {
                message: format!(
                    "write of {} values at {} overflows buffer '{}' of {} values",
                    contents.len(),
                    offset,
                    entry.label,
                    entry.contents.len()
                ),
            });
        }
        entry.contents[offset..end].copy_from_slice(contents);
        self.stats.buffer_writes += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.stats.buffers_destroyed += 1;
        }
    }

    fn create_colormap(&mut self, _label: &str, texels: &[[u8; 3]]) -> ScatterResult<TextureId> {
        let id = TextureId(self.next_id());
        self.textures.insert(id, texels.to_vec());
        self.stats.textures_created += 1;
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.stats.textures_destroyed += 1;
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> ScatterResult<()> {
        for buffer in storage_buffers(call.bindings)?.into_iter().flatten() {
            if !self.buffers.contains_key(&buffer) {
                return Err(ScatterError::Gpu {
                    message: format!("draw binds destroyed buffer {buffer:?}"),
                });
            }
        }
        self.draws.push(RecordedDraw {
            label: call.label.to_string(),
            instances: call.instances,
            uniforms: *call.uniforms,
            bindings: call.bindings.to_vec(),
            colormap: call.colormap,
        });
        self.stats.draws += 1;
        Ok(())
    }
}
