//! Style configuration for scatter marks and their figure

use serde::{Deserialize, Serialize};

/// Marker drawn for every point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Arrow,
    Cross,
}

impl MarkerShape {
    /// Scale that makes the marker area match the requested size
    pub fn marker_scale(&self) -> f32 {
        match self {
            MarkerShape::Circle => 1.0 / std::f32::consts::PI.sqrt(),
            MarkerShape::Square => 0.5,
            MarkerShape::Arrow => 2.0,
            MarkerShape::Cross => 3.0 / (2.0 * 5.0f32.sqrt()),
        }
    }

    /// Shape code read by the fragment program
    pub fn shader_code(&self) -> u32 {
        match self {
            MarkerShape::Circle => 1,
            MarkerShape::Square => 2,
            MarkerShape::Arrow => 3,
            MarkerShape::Cross => 4,
        }
    }
}

/// Optional style overrides applied to selected/unselected/hovered points
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StyleDict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

impl StyleDict {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.stroke.is_none() && self.opacity.is_none()
    }
}

/// Per-mark style configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScatterConfig {
    pub marker: MarkerShape,
    /// Marker area in square pixels when no per-point size is given
    pub default_size: f32,
    pub default_opacities: Vec<f32>,
    pub colors: Vec<String>,
    pub stroke: Option<String>,
    pub stroke_width: f32,
    pub fill: bool,
    pub visible: bool,
    pub selected_style: StyleDict,
    pub unselected_style: StyleDict,
    pub hovered_style: StyleDict,
    pub unhovered_style: StyleDict,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            marker: MarkerShape::Circle,
            default_size: 64.0,
            default_opacities: vec![1.0],
            colors: vec!["steelblue".to_string()],
            stroke: None,
            stroke_width: 1.5,
            fill: true,
            visible: true,
            selected_style: StyleDict::default(),
            unselected_style: StyleDict::default(),
            hovered_style: StyleDict::default(),
            unhovered_style: StyleDict::default(),
        }
    }
}

/// Figure-level settings shared by all marks of one figure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FigureConfig {
    /// Duration of value transitions; zero disables animation
    pub animation_duration_ms: u64,
}
