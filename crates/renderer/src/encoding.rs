//! Channel values derived from a mark's data and style
//!
//! Each derivation turns the plain model data (numeric arrays, CSS color
//! lists, selected indices) into the value the attribute store encodes for
//! the current point count.

use serde::{Deserialize, Serialize};

use gpu_scatter_shared::color::parse_rgb;
use gpu_scatter_shared::{Channel, ChannelValue, ScatterConfig, ScatterResult};

use crate::scales::ColorScale;

/// Fallback fill when a mark has neither data colors nor a color list
const FALLBACK_COLOR: &str = "orange";

/// Data arrays of one scatter mark
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Numeric values mapped through the colormap
    pub color: Option<Vec<f64>>,
    pub size: Option<Vec<f64>>,
    pub opacity: Option<Vec<f64>>,
    pub rotation: Option<Vec<f64>>,
    /// Indices of selected points
    pub selected: Option<Vec<usize>>,
}

impl ScatterData {
    /// Number of drawn points: the shorter of the two position arrays
    pub fn point_count(&self) -> usize {
        self.x.len().min(self.y.len())
    }
}

/// A channel value ready for the attribute store
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedChannel {
    pub value: ChannelValue,
    pub item_width: usize,
}

impl DerivedChannel {
    fn scalar(value: f32) -> Self {
        Self {
            value: ChannelValue::broadcast_scalar(value),
            item_width: 1,
        }
    }

    fn per_instance(values: &[f64]) -> Self {
        Self {
            value: ChannelValue::PerInstance(values.iter().map(|&v| v as f32).collect()),
            item_width: 1,
        }
    }
}

/// Derived value of `channel` for `point_count` points
pub fn derive_channel(
    channel: Channel,
    data: &ScatterData,
    config: &ScatterConfig,
    point_count: usize,
) -> ScatterResult<DerivedChannel> {
    let derived = match channel {
        Channel::X => derive_position(&data.x, point_count),
        Channel::Y => derive_position(&data.y, point_count),
        Channel::Color => derive_color(data, config, point_count)?,
        Channel::Size => match &data.size {
            Some(size) => DerivedChannel::per_instance(size),
            None => DerivedChannel::scalar(config.default_size),
        },
        Channel::Opacity => derive_opacity(data, config, point_count),
        Channel::Rotation => match &data.rotation {
            Some(rotation) => DerivedChannel::per_instance(rotation),
            None => DerivedChannel::scalar(0.0),
        },
        Channel::Selected => derive_selected(data, point_count),
    };
    Ok(derived)
}

/// Positions truncated to the point count
pub fn derive_position(values: &[f64], point_count: usize) -> DerivedChannel {
    let count = point_count.min(values.len());
    DerivedChannel::per_instance(&values[..count])
}

/// Data values for the colormap, or RGB triples from the color list
pub fn derive_color(
    data: &ScatterData,
    config: &ScatterConfig,
    point_count: usize,
) -> ScatterResult<DerivedChannel> {
    if let Some(color) = &data.color {
        return Ok(DerivedChannel::per_instance(color));
    }

    let fallback;
    let colors: &[String] = if config.colors.is_empty() {
        fallback = [config
            .unselected_style
            .fill
            .clone()
            .unwrap_or_else(|| FALLBACK_COLOR.to_string())];
        &fallback
    } else {
        &config.colors
    };

    let rgb = colors
        .iter()
        .map(|color| parse_rgb(color))
        .collect::<ScatterResult<Vec<[f32; 3]>>>()?;

    let value = match rgb.as_slice() {
        [single] => ChannelValue::Broadcast(single.to_vec()),
        cycle => ChannelValue::PerInstance(
            (0..point_count)
                .flat_map(|i| cycle[i % cycle.len()])
                .collect(),
        ),
    };
    Ok(DerivedChannel {
        value,
        item_width: 3,
    })
}

/// Per-point opacities, or the default opacities cycled over the points
pub fn derive_opacity(
    data: &ScatterData,
    config: &ScatterConfig,
    point_count: usize,
) -> DerivedChannel {
    if let Some(opacity) = &data.opacity {
        return DerivedChannel::per_instance(opacity);
    }
    match config.default_opacities.as_slice() {
        [] => DerivedChannel::scalar(1.0),
        [single] => DerivedChannel::scalar(*single),
        cycle => DerivedChannel {
            value: ChannelValue::PerInstance(
                (0..point_count).map(|i| cycle[i % cycle.len()]).collect(),
            ),
            item_width: 1,
        },
    }
}

/// 0/1 mask of the selected indices; indices past the point count are ignored
pub fn derive_selected(data: &ScatterData, point_count: usize) -> DerivedChannel {
    match &data.selected {
        Some(indices) => {
            let mut mask = vec![0.0f32; point_count];
            for &index in indices {
                if let Some(flag) = mask.get_mut(index) {
                    *flag = 1.0;
                }
            }
            DerivedChannel {
                value: ChannelValue::PerInstance(mask),
                item_width: 1,
            }
        }
        None => DerivedChannel::scalar(0.0),
    }
}

/// Domain of the colormap: the scale's fixed bounds, else the extent of
/// `values`
pub fn color_domain(
    values: impl IntoIterator<Item = f64>,
    scale: Option<&dyn ColorScale>,
) -> [f32; 2] {
    let (data_min, data_max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
            (min.min(value), max.max(value))
        });

    let min = scale.and_then(|s| s.min()).unwrap_or(data_min);
    let max = scale.and_then(|s| s.max()).unwrap_or(data_max);
    if min.is_finite() && max.is_finite() {
        [min as f32, max as f32]
    } else {
        [0.0, 1.0]
    }
}
