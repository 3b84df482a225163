//! Shared types for the GPU scatter engine
//!
//! This crate contains the plain data types exchanged between the renderer
//! and whatever hosts it: the visual channels, channel values, the error
//! taxonomy and the mark/figure style configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod color;
pub mod config;
pub mod errors;

pub use color::{parse_color, Rgba};
pub use config::{FigureConfig, MarkerShape, ScatterConfig, StyleDict};
pub use errors::{ScatterError, ScatterResult};

/// One visual attribute of a scatter mark, encoded as a per-instance GPU buffer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    X,
    Y,
    Color,
    Size,
    Opacity,
    Rotation,
    Selected,
}

impl Channel {
    /// Every channel, in the order updates are applied within a frame.
    /// Positions come first since they define the point count.
    pub const ALL: [Channel; 7] = [
        Channel::X,
        Channel::Y,
        Channel::Color,
        Channel::Size,
        Channel::Opacity,
        Channel::Rotation,
        Channel::Selected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Color => "color",
            Channel::Size => "size",
            Channel::Opacity => "opacity",
            Channel::Rotation => "rotation",
            Channel::Selected => "selected",
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Channel::X | Channel::Y)
    }

    /// Whether changes to this channel are interpolated on the GPU.
    /// Color and selection snap to their new value.
    pub fn is_animated(&self) -> bool {
        !matches!(self, Channel::Color | Channel::Selected)
    }

    /// Item widths (numbers per point) this channel can be declared with
    pub fn accepted_item_widths(&self) -> &'static [usize] {
        match self {
            Channel::Color => &[1, 3, 4],
            _ => &[1],
        }
    }

    pub fn accepts_item_width(&self, item_width: usize) -> bool {
        self.accepted_item_widths().contains(&item_width)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ScatterError;

    fn from_str(name: &str) -> ScatterResult<Self> {
        Channel::ALL
            .iter()
            .copied()
            .find(|channel| channel.as_str() == name)
            .ok_or_else(|| ScatterError::UnsupportedChannel {
                name: name.to_string(),
            })
    }
}

/// Values supplied for a channel.
///
/// The encoding is explicit: a broadcast value is read by every instance,
/// a per-instance array holds one item per point. An array that happens to
/// have a single item is still per-instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "values", rename_all = "snake_case")]
pub enum ChannelValue {
    /// One item shared by all instances
    Broadcast(Vec<f32>),
    /// One item per instance, flattened
    PerInstance(Vec<f32>),
}

impl ChannelValue {
    pub fn broadcast_scalar(value: f32) -> Self {
        ChannelValue::Broadcast(vec![value])
    }

    pub fn values(&self) -> &[f32] {
        match self {
            ChannelValue::Broadcast(values) | ChannelValue::PerInstance(values) => values,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, ChannelValue::Broadcast(_))
    }
}

/// Positional axis of the figure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        match "skew".parse::<Channel>() {
            Err(ScatterError::UnsupportedChannel { name }) => assert_eq!(name, "skew"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_channel_item_widths() {
        assert!(Channel::Color.accepts_item_width(3));
        assert!(Channel::Color.accepts_item_width(1));
        assert!(!Channel::Size.accepts_item_width(3));
        assert!(!Channel::X.accepts_item_width(2));
    }

    #[test]
    fn test_animated_channels() {
        assert!(Channel::X.is_animated());
        assert!(Channel::Rotation.is_animated());
        assert!(!Channel::Color.is_animated());
        assert!(!Channel::Selected.is_animated());
    }

    #[test]
    fn test_channel_value_serialization() {
        let value = ChannelValue::Broadcast(vec![2.0]);
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("broadcast"));

        let decoded: ChannelValue = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, value);
        assert!(decoded.is_broadcast());
    }
}
