//! Style configuration validation and diffing

use gpu_scatter_shared::{
    parse_color, Channel, FigureConfig, ScatterConfig, ScatterError, ScatterResult, StyleDict,
};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a mark's style configuration
    pub fn validate(config: &ScatterConfig) -> ScatterResult<()> {
        if !config.default_size.is_finite() || config.default_size < 0.0 {
            return Err(ScatterError::invalid_config(
                "Default size must be a finite, non-negative area",
                Some("default_size"),
            ));
        }

        if !config.stroke_width.is_finite() || config.stroke_width < 0.0 {
            return Err(ScatterError::invalid_config(
                "Stroke width must be finite and non-negative",
                Some("stroke_width"),
            ));
        }

        for opacity in &config.default_opacities {
            Self::validate_opacity(*opacity, "default_opacities")?;
        }

        for color in &config.colors {
            parse_color(color)?;
        }
        if let Some(stroke) = &config.stroke {
            parse_color(stroke)?;
        }

        for (field, style) in [
            ("selected_style", &config.selected_style),
            ("unselected_style", &config.unselected_style),
            ("hovered_style", &config.hovered_style),
            ("unhovered_style", &config.unhovered_style),
        ] {
            Self::validate_style(field, style)?;
        }

        Ok(())
    }

    /// Validate figure-level settings
    pub fn validate_figure(config: &FigureConfig) -> ScatterResult<()> {
        // Anything above an hour is almost certainly seconds passed as ms
        if config.animation_duration_ms > 3_600_000 {
            return Err(ScatterError::invalid_config(
                format!(
                    "Animation duration of {}ms is out of range",
                    config.animation_duration_ms
                ),
                Some("animation_duration_ms"),
            ));
        }
        Ok(())
    }

    fn validate_style(field: &str, style: &StyleDict) -> ScatterResult<()> {
        for color in [&style.fill, &style.stroke].into_iter().flatten() {
            parse_color(color)?;
        }
        if let Some(opacity) = style.opacity {
            Self::validate_opacity(opacity, field)?;
        }
        Ok(())
    }

    fn validate_opacity(opacity: f32, field: &str) -> ScatterResult<()> {
        if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
            return Err(ScatterError::invalid_config(
                format!("Opacity {opacity} must be between 0 and 1"),
                Some(field),
            ));
        }
        Ok(())
    }
}

/// What has to be refreshed when a mark's configuration is replaced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDiff {
    pub marker_changed: bool,
    /// Stroke color, stroke width or fill
    pub stroke_changed: bool,
    pub styles_changed: bool,
    pub colors_changed: bool,
    pub opacities_changed: bool,
    pub size_changed: bool,
    pub visibility_changed: bool,
}

impl StyleDiff {
    /// Calculate diff between two configurations
    pub fn calculate(old: &ScatterConfig, new: &ScatterConfig) -> Self {
        Self {
            marker_changed: old.marker != new.marker,
            stroke_changed: old.stroke != new.stroke
                || old.stroke_width != new.stroke_width
                || old.fill != new.fill,
            styles_changed: old.selected_style != new.selected_style
                || old.unselected_style != new.unselected_style
                || old.hovered_style != new.hovered_style
                || old.unhovered_style != new.unhovered_style,
            // The unselected fill is the fallback color of an empty color list
            colors_changed: old.colors != new.colors
                || old.unselected_style.fill != new.unselected_style.fill,
            opacities_changed: old.default_opacities != new.default_opacities,
            size_changed: old.default_size != new.default_size,
            visibility_changed: old.visible != new.visible,
        }
    }

    /// Channels whose derived values depend on the changed settings
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.colors_changed {
            channels.push(Channel::Color);
        }
        if self.size_changed {
            channels.push(Channel::Size);
        }
        if self.opacities_changed {
            channels.push(Channel::Opacity);
        }
        channels
    }

    /// Check if any change requires a re-render
    pub fn requires_update(&self) -> bool {
        self.marker_changed
            || self.stroke_changed
            || self.styles_changed
            || self.colors_changed
            || self.opacities_changed
            || self.size_changed
            || self.visibility_changed
    }
}
