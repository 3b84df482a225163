//! Uniform block consumed by the scatter program
//!
//! The layout mirrors `ScatterUniforms` in `scatter.wgsl` field for
//! field. Every field is 4-byte aligned and the vec4/array members start on
//! 16-byte boundaries, so the struct is `Pod` without hidden padding.

use bytemuck::{Pod, Zeroable};
use gpu_scatter_shared::{parse_color, Channel, ScatterConfig, ScatterResult, StyleDict};

use crate::backend::AttributeSlot;

pub const FLAG_HAS_SELECTION: u32 = 1 << 0;
pub const FLAG_FILL: u32 = 1 << 2;
pub const FLAG_USE_COLORMAP: u32 = 1 << 3;
pub const FLAG_HAS_DEFAULT_STROKE: u32 = 1 << 4;
const STYLE_FLAG_BASE: u32 = 5;

/// Interaction style whose overrides are passed to the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    Selected = 0,
    Unselected = 1,
    Hovered = 2,
    Unhovered = 3,
}

/// Property a style dictionary can override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleProperty {
    Fill = 0,
    Stroke = 1,
    Opacity = 2,
}

impl StyleKind {
    pub const ALL: [StyleKind; 4] = [
        StyleKind::Selected,
        StyleKind::Unselected,
        StyleKind::Hovered,
        StyleKind::Unhovered,
    ];

    fn of(self, config: &ScatterConfig) -> &StyleDict {
        match self {
            StyleKind::Selected => &config.selected_style,
            StyleKind::Unselected => &config.unselected_style,
            StyleKind::Hovered => &config.hovered_style,
            StyleKind::Unhovered => &config.unhovered_style,
        }
    }
}

/// Bit of `flags` telling whether a style overrides a property
pub fn style_flag(style: StyleKind, property: StyleProperty) -> u32 {
    1 << (STYLE_FLAG_BASE + style as u32 * 3 + property as u32)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScatterUniforms {
    pub domain_x: [f32; 2],
    pub domain_y: [f32; 2],
    pub range_x: [f32; 2],
    pub range_y: [f32; 2],
    pub domain_size: [f32; 2],
    pub range_size: [f32; 2],
    pub domain_rotation: [f32; 2],
    pub range_rotation: [f32; 2],
    pub domain_opacity: [f32; 2],
    pub range_opacity: [f32; 2],
    pub domain_color: [f32; 2],
    pub plot_area: [f32; 2],
    /// Transition fractions of x, y, size and opacity
    pub animation: [f32; 4],
    pub animation_rotation: f32,
    pub stroke_width: f32,
    pub marker_scale: f32,
    pub marker: u32,
    pub flags: u32,
    /// Item width of the color buffer: 1 (colormap), 3 or 4
    pub color_stride: u32,
    pub _pad: [u32; 2],
    pub default_stroke: [f32; 4],
    /// Fill and stroke colors per style, indexed `style * 2 + property`
    pub styles: [[f32; 4]; 8],
    /// Opacity override per style
    pub style_opacity: [f32; 4],
    /// One flag per attribute slot, set when the slot holds a broadcast value
    pub broadcast: [[u32; 4]; 4],
    /// Float offset of each attribute slot within its channel buffer
    pub offsets: [[u32; 4]; 3],
}

impl Default for ScatterUniforms {
    fn default() -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.animation = [1.0; 4];
        uniforms.animation_rotation = 1.0;
        uniforms.color_stride = 3;
        uniforms.style_opacity = [1.0; 4];
        uniforms
    }
}

impl ScatterUniforms {
    pub fn set_flag(&mut self, flag: u32, enabled: bool) {
        if enabled {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn set_broadcast(&mut self, slot: AttributeSlot, broadcast: bool) {
        let index = slot.index();
        self.broadcast[index / 4][index % 4] = broadcast as u32;
    }

    pub fn is_broadcast(&self, slot: AttributeSlot) -> bool {
        let index = slot.index();
        self.broadcast[index / 4][index % 4] != 0
    }

    pub fn set_offset(&mut self, slot: AttributeSlot, offset: u32) {
        let index = slot.index();
        self.offsets[index / 4][index % 4] = offset;
    }

    pub fn offset(&self, slot: AttributeSlot) -> u32 {
        let index = slot.index();
        self.offsets[index / 4][index % 4]
    }

    /// Record the interpolation fraction of an animated channel
    pub fn set_fraction(&mut self, channel: Channel, fraction: f32) {
        match channel {
            Channel::X => self.animation[0] = fraction,
            Channel::Y => self.animation[1] = fraction,
            Channel::Size => self.animation[2] = fraction,
            Channel::Opacity => self.animation[3] = fraction,
            Channel::Rotation => self.animation_rotation = fraction,
            Channel::Color | Channel::Selected => {}
        }
    }

    pub fn fraction(&self, channel: Channel) -> f32 {
        match channel {
            Channel::X => self.animation[0],
            Channel::Y => self.animation[1],
            Channel::Size => self.animation[2],
            Channel::Opacity => self.animation[3],
            Channel::Rotation => self.animation_rotation,
            Channel::Color | Channel::Selected => 1.0,
        }
    }

    /// Marker, stroke, fill and the four interaction styles
    pub fn apply_style(&mut self, config: &ScatterConfig) -> ScatterResult<()> {
        self.marker = config.marker.shader_code();
        self.marker_scale = config.marker.marker_scale();
        self.stroke_width = config.stroke_width;
        self.set_flag(FLAG_FILL, config.fill);

        match &config.stroke {
            Some(stroke) => {
                self.default_stroke = parse_color(stroke)?;
                self.set_flag(FLAG_HAS_DEFAULT_STROKE, true);
            }
            None => {
                self.default_stroke = [0.0; 4];
                self.set_flag(FLAG_HAS_DEFAULT_STROKE, false);
            }
        }

        for style in StyleKind::ALL {
            let dict = style.of(config);
            let base = style as usize * 2;

            self.styles[base] = match &dict.fill {
                Some(fill) => parse_color(fill)?,
                None => [0.0; 4],
            };
            self.set_flag(style_flag(style, StyleProperty::Fill), dict.fill.is_some());

            self.styles[base + 1] = match &dict.stroke {
                Some(stroke) => parse_color(stroke)?,
                None => [0.0; 4],
            };
            self.set_flag(style_flag(style, StyleProperty::Stroke), dict.stroke.is_some());

            self.style_opacity[style as usize] = dict.opacity.unwrap_or(1.0);
            self.set_flag(style_flag(style, StyleProperty::Opacity), dict.opacity.is_some());
        }

        Ok(())
    }
}
