//! Scatter mark: owns the attribute buffers of one point collection and
//! renders it once per displayed frame.
//!
//! External changes (data, style, scales, layout) only record what is out
//! of date and request a frame. All GPU work happens in
//! [`ScatterMark::render_frame`], which applies the coalesced updates,
//! advances transitions, refreshes uniforms and issues one instanced draw.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gpu_scatter_shared::{
    Axis, Channel, ChannelValue, FigureConfig, ScatterConfig, ScatterError, ScatterResult,
};

use crate::attribute_store::{AttributeStore, Baseline, SetOptions};
use crate::backend::{DrawCall, SharedBackend, TextureId};
use crate::clock::Clock;
use crate::colormap::ColorMapBuilder;
use crate::config::{ConfigValidator, StyleDiff};
use crate::encoding::{color_domain, derive_channel, DerivedChannel, ScatterData};
use crate::frame::{FrameHost, FrameScheduler};
use crate::pixel_cache::{PixelCache, PixelCoords};
use crate::scales::{ColorScale, Layout, Scale};
use crate::selection::{SelectionEngine, SelectionMask, SelectionPredicate, SelectorRequest};
use crate::transition::TransitionScheduler;
use crate::uniforms::{ScatterUniforms, FLAG_HAS_SELECTION, FLAG_USE_COLORMAP};

const OPACITY_RANGE: [f32; 2] = [0.2, 1.0];
const DEFAULT_ROTATION_DOMAIN: [f32; 2] = [0.0, 180.0];
const ROTATION_RANGE: [f32; 2] = [0.0, std::f32::consts::PI];

/// Borrowed collaborators of a mark
pub struct MarkCollaborators {
    pub x_scale: Rc<dyn Scale>,
    pub y_scale: Rc<dyn Scale>,
    pub layout: Rc<dyn Layout>,
    pub color_scale: Option<Rc<dyn ColorScale>>,
    pub size_scale: Option<Rc<dyn Scale>>,
    pub opacity_scale: Option<Rc<dyn Scale>>,
    pub rotation_scale: Option<Rc<dyn Scale>>,
    pub clock: Rc<dyn Clock>,
    pub frame_host: Rc<dyn FrameHost>,
}

impl MarkCollaborators {
    pub fn new(
        x_scale: Rc<dyn Scale>,
        y_scale: Rc<dyn Scale>,
        layout: Rc<dyn Layout>,
        clock: Rc<dyn Clock>,
        frame_host: Rc<dyn FrameHost>,
    ) -> Self {
        Self {
            x_scale,
            y_scale,
            layout,
            color_scale: None,
            size_scale: None,
            opacity_scale: None,
            rotation_scale: None,
            clock,
            frame_host,
        }
    }

    pub fn with_color_scale(mut self, scale: Rc<dyn ColorScale>) -> Self {
        self.color_scale = Some(scale);
        self
    }

    pub fn with_size_scale(mut self, scale: Rc<dyn Scale>) -> Self {
        self.size_scale = Some(scale);
        self
    }

    pub fn with_opacity_scale(mut self, scale: Rc<dyn Scale>) -> Self {
        self.opacity_scale = Some(scale);
        self
    }

    pub fn with_rotation_scale(mut self, scale: Rc<dyn Scale>) -> Self {
        self.rotation_scale = Some(scale);
        self
    }
}

/// Room the mark needs around the plot area so markers are not clipped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPadding {
    pub x: f64,
    pub y: f64,
}

/// Outcome of one [`ScatterMark::render_frame`]
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub drawn: bool,
    /// A second frame in the same clock tick with nothing new to show
    pub skipped: bool,
    pub uploads: usize,
    pub completed: Vec<Channel>,
    pub active_transitions: usize,
    /// Coalesced updates that failed validation and were dropped
    pub rejected: Vec<ScatterError>,
}

pub type SelectionListener = Box<dyn Fn(Option<&[usize]>)>;
pub type PaddingListener = Box<dyn Fn(ViewPadding)>;

pub struct ScatterMark {
    id: Uuid,
    label: String,
    backend: SharedBackend,
    store: AttributeStore,
    scheduler: TransitionScheduler,
    pixel_cache: PixelCache,
    selection: SelectionEngine,
    colormap: ColorMapBuilder,
    collaborators: MarkCollaborators,
    frames: FrameScheduler,
    config: ScatterConfig,
    figure: FigureConfig,
    data: ScatterData,
    /// Values set through the generic channel entry; they replace derivation
    overrides: BTreeMap<Channel, DerivedChannel>,
    /// Channels to re-encode at the next frame, and whether to animate them
    pending: BTreeMap<Channel, bool>,
    uniforms: ScatterUniforms,
    color_domain: [f32; 2],
    /// Color data or color scale changed since the domain was computed
    color_domain_dirty: bool,
    color_domain_updates: u64,
    use_colormap: bool,
    has_selection: bool,
    live: bool,
    released: bool,
    /// Something outside the frame loop asked for a redraw
    invalidated: Cell<bool>,
    last_frame_ms: Option<f64>,
    view_padding: Option<ViewPadding>,
    selection_listener: Option<SelectionListener>,
    padding_listener: Option<PaddingListener>,
}

impl ScatterMark {
    pub fn new(
        backend: SharedBackend,
        collaborators: MarkCollaborators,
        config: ScatterConfig,
        figure: FigureConfig,
        data: ScatterData,
    ) -> ScatterResult<Self> {
        ConfigValidator::validate(&config)?;
        ConfigValidator::validate_figure(&figure)?;

        let id = Uuid::new_v4();
        let label = format!("scatter-{}", id.simple());
        let mut uniforms = ScatterUniforms::default();
        uniforms.apply_style(&config)?;

        let store = AttributeStore::new(backend.clone(), label.clone(), data.point_count());
        let frames = FrameScheduler::new(collaborators.frame_host.clone());
        let pending = Channel::ALL.iter().map(|channel| (*channel, false)).collect();

        info!(
            "[ScatterMark] {} created with {} points",
            label,
            data.point_count()
        );

        let mut mark = Self {
            id,
            colormap: ColorMapBuilder::new(format!("{label}/colormap")),
            label,
            backend,
            store,
            scheduler: TransitionScheduler::new(),
            pixel_cache: PixelCache::new(),
            selection: SelectionEngine::default(),
            collaborators,
            frames,
            config,
            figure,
            data,
            overrides: BTreeMap::new(),
            pending,
            uniforms,
            color_domain: [0.0, 1.0],
            color_domain_dirty: true,
            color_domain_updates: 0,
            use_colormap: false,
            has_selection: false,
            live: false,
            released: false,
            invalidated: Cell::new(false),
            last_frame_ms: None,
            view_padding: None,
            selection_listener: None,
            padding_listener: None,
        };
        mark.compute_view_padding();
        mark.request_render();
        Ok(mark)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    // Model data

    pub fn set_x(&mut self, x: Vec<f64>) {
        self.data.x = x;
        self.position_changed(Channel::X);
    }

    pub fn set_y(&mut self, y: Vec<f64>) {
        self.data.y = y;
        self.position_changed(Channel::Y);
    }

    pub fn set_color(&mut self, color: Option<Vec<f64>>) {
        self.data.color = color;
        self.color_domain_dirty = true;
        self.data_changed(Channel::Color);
    }

    pub fn set_size(&mut self, size: Option<Vec<f64>>) {
        self.data.size = size;
        self.data_changed(Channel::Size);
    }

    pub fn set_opacity(&mut self, opacity: Option<Vec<f64>>) {
        self.data.opacity = opacity;
        self.data_changed(Channel::Opacity);
    }

    pub fn set_rotation(&mut self, rotation: Option<Vec<f64>>) {
        self.data.rotation = rotation;
        self.data_changed(Channel::Rotation);
    }

    pub fn set_selected(&mut self, selected: Option<Vec<usize>>) {
        self.data.selected = selected;
        self.data_changed(Channel::Selected);
    }

    /// Generic channel entry.
    ///
    /// Positions must be per-instance arrays and replace the x/y data.
    /// Other channels keep the given value until their model property is set
    /// again. Shapes are checked against the current point count.
    pub fn set_channel(
        &mut self,
        name: &str,
        value: ChannelValue,
        item_width: usize,
    ) -> ScatterResult<()> {
        let channel: Channel = name.parse()?;
        if !channel.accepts_item_width(item_width) {
            return Err(ScatterError::shape_mismatch(
                channel,
                format!("item width in {:?}", channel.accepted_item_widths()),
                format!("item width {item_width}"),
            ));
        }

        let point_count = self.data.point_count();
        let len = value.values().len();
        match &value {
            ChannelValue::PerInstance(values) if channel.is_positional() => {
                let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
                match channel {
                    Channel::X => self.set_x(values),
                    _ => self.set_y(values),
                }
                return Ok(());
            }
            ChannelValue::Broadcast(_) if channel.is_positional() => {
                return Err(ScatterError::shape_mismatch(
                    channel,
                    "a per-instance array",
                    "a broadcast value",
                ));
            }
            ChannelValue::Broadcast(_) if len != item_width => {
                return Err(ScatterError::shape_mismatch(
                    channel,
                    format!("{item_width} values for a broadcast item"),
                    format!("{len} values"),
                ));
            }
            ChannelValue::PerInstance(_) if len != point_count * item_width => {
                return Err(ScatterError::shape_mismatch(
                    channel,
                    format!(
                        "{} values ({point_count} points x {item_width})",
                        point_count * item_width
                    ),
                    format!("{len} values"),
                ));
            }
            _ => {}
        }

        self.overrides
            .insert(channel, DerivedChannel { value, item_width });
        if channel == Channel::Color {
            self.color_domain_dirty = true;
        }
        self.mark_pending(channel, true);
        self.request_render();
        Ok(())
    }

    /// Apply one keyed change of the host model
    pub fn apply_model_change(
        &mut self,
        key: &str,
        value: &serde_json::Value,
    ) -> ScatterResult<()> {
        match key {
            "x" => self.set_x(serde_json::from_value(value.clone())?),
            "y" => self.set_y(serde_json::from_value(value.clone())?),
            "color" => self.set_color(serde_json::from_value(value.clone())?),
            "size" => self.set_size(serde_json::from_value(value.clone())?),
            "opacity" => self.set_opacity(serde_json::from_value(value.clone())?),
            "rotation" => self.set_rotation(serde_json::from_value(value.clone())?),
            "selected" => self.set_selected(serde_json::from_value(value.clone())?),
            "animation_duration" => {
                self.set_figure_config(FigureConfig {
                    animation_duration_ms: serde_json::from_value(value.clone())?,
                })?;
            }
            _ => {
                let mut config = serde_json::to_value(&self.config)?;
                let known = match config.as_object_mut() {
                    Some(fields) if fields.contains_key(key) => {
                        fields.insert(key.to_string(), value.clone());
                        true
                    }
                    _ => false,
                };
                if !known {
                    return Err(ScatterError::UnknownProperty {
                        key: key.to_string(),
                    });
                }
                self.set_config(serde_json::from_value(config)?)?;
            }
        }
        Ok(())
    }

    /// Replace the style configuration
    pub fn set_config(&mut self, config: ScatterConfig) -> ScatterResult<StyleDiff> {
        ConfigValidator::validate(&config)?;
        let diff = StyleDiff::calculate(&self.config, &config);
        self.uniforms.apply_style(&config)?;
        self.config = config;

        for channel in diff.channels() {
            if !self.overrides.contains_key(&channel) {
                self.mark_pending(channel, true);
            }
        }
        if diff.size_changed {
            self.compute_view_padding();
        }
        if diff.requires_update() {
            self.request_render();
        }
        Ok(diff)
    }

    pub fn set_figure_config(&mut self, figure: FigureConfig) -> ScatterResult<()> {
        ConfigValidator::validate_figure(&figure)?;
        self.figure = figure;
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.config.visible != visible {
            self.config.visible = visible;
            self.request_render();
        }
    }

    // Collaborator notifications

    pub fn on_scale_domain_changed(&mut self, axis: Axis) {
        trace!("[ScatterMark] {}: {:?} domain changed", self.label, axis);
        self.pixel_cache.invalidate();
        self.request_render();
    }

    /// Margins or plot area size changed
    pub fn on_layout_changed(&mut self) {
        self.pixel_cache.invalidate();
        self.request_render();
    }

    pub fn on_color_scale_changed(&mut self) {
        self.colormap.invalidate();
        self.color_domain_dirty = true;
        self.request_render();
    }

    pub fn relayout(&mut self) {
        self.on_layout_changed();
        self.compute_view_padding();
    }

    // Selection

    pub fn on_selection_changed(&mut self, listener: SelectionListener) {
        self.selection_listener = Some(listener);
    }

    /// Throttled selector update during an interaction; `None` clears
    pub fn selector_changed(&mut self, predicate: Option<SelectionPredicate>) {
        let request = match predicate {
            Some(predicate) => SelectorRequest::Select(predicate),
            None => SelectorRequest::Clear,
        };
        let now = self.collaborators.clock.now_ms();
        self.selection.request(request, now);
        self.request_render();
    }

    /// The interaction ended: run the last pending request now
    pub fn selector_finished(&mut self) -> Option<SelectionMask> {
        self.selection
            .take_pending()
            .map(|request| self.run_selection(request))
    }

    /// Evaluate a selection immediately; `None` clears it
    pub fn select(&mut self, predicate: Option<SelectionPredicate>) -> SelectionMask {
        let request = match predicate {
            Some(predicate) => SelectorRequest::Select(predicate),
            None => SelectorRequest::Clear,
        };
        self.run_selection(request)
    }

    /// Pixel coordinates of every point, recomputed only if out of date
    pub fn pixel_coordinates(&mut self) -> PixelCoords<'_> {
        self.pixel_cache.ensure(
            &self.data.x,
            &self.data.y,
            self.collaborators.x_scale.as_ref(),
            self.collaborators.y_scale.as_ref(),
        )
    }

    fn run_selection(&mut self, request: SelectorRequest) -> SelectionMask {
        let coords = self.pixel_cache.ensure(
            &self.data.x,
            &self.data.y,
            self.collaborators.x_scale.as_ref(),
            self.collaborators.y_scale.as_ref(),
        );
        let mask = self.selection.evaluate(&request, coords);

        self.data.selected = match request {
            SelectorRequest::Clear => None,
            SelectorRequest::Select(_) => Some(mask.indices().to_vec()),
        };
        debug!(
            "[ScatterMark] {}: selection of {} points",
            self.label,
            mask.len()
        );
        if let Some(listener) = &self.selection_listener {
            listener(self.data.selected.as_deref());
        }
        self.data_changed(Channel::Selected);
        mask
    }

    // Layout negotiation

    pub fn on_padding_changed(&mut self, listener: PaddingListener) {
        self.padding_listener = Some(listener);
    }

    /// Padding needed by the largest default marker; listeners hear about changes
    pub fn compute_view_padding(&mut self) -> ViewPadding {
        let pad = (self.config.default_size as f64).sqrt() / 2.0 + 1.0;
        let padding = ViewPadding { x: pad, y: pad };
        if self.view_padding != Some(padding) {
            self.view_padding = Some(padding);
            if let Some(listener) = &self.padding_listener {
                listener(padding);
            }
        }
        padding
    }

    // Frames

    /// Ask the host for a frame; repeated calls before it runs are no-ops
    pub fn request_render(&self) {
        if !self.released {
            self.invalidated.set(true);
            self.frames.request();
        }
    }

    /// Keep the loop running while transitions or a throttled selection remain
    fn continue_frames(&self) {
        if self.scheduler.is_active() || self.selection.has_pending() {
            self.frames.request();
        }
    }

    pub fn render_frame(&mut self) -> ScatterResult<FrameReport> {
        if self.released {
            return Err(ScatterError::Gpu {
                message: format!("{} was released", self.label),
            });
        }
        self.frames.begin_frame();
        let now = self.collaborators.clock.now_ms();

        // At most one draw per clock tick unless something changed since
        if self.last_frame_ms == Some(now)
            && !self.invalidated.get()
            && self.pending.is_empty()
        {
            trace!("[ScatterMark] {}: frame at {}ms already drawn", self.label, now);
            self.continue_frames();
            return Ok(FrameReport {
                skipped: true,
                active_transitions: self.scheduler.active_count(),
                ..Default::default()
            });
        }
        self.last_frame_ms = Some(now);
        let mut report = FrameReport::default();

        if let Some(request) = self.selection.take_due(now) {
            self.run_selection(request);
        }

        self.flush_pending(&mut report)?;

        let tick = self.scheduler.tick(now);
        report.completed = tick.completed;

        let colormap = {
            let mut backend = self.backend.borrow_mut();
            self.colormap
                .sync(&mut *backend, self.collaborators.color_scale.as_deref())?
        };

        self.refresh_uniforms();
        report.uploads = self.store.upload()?;

        let point_count = self.store.point_count();
        if !self.config.visible {
            trace!("[ScatterMark] {}: hidden, draw skipped", self.label);
        } else if !self.store.is_consistent() {
            warn!(
                "[ScatterMark] {}: channels do not match {} points, draw skipped",
                self.label, point_count
            );
        } else if point_count > 0 {
            self.draw(point_count, colormap)?;
            report.drawn = true;
        }

        self.live = true;
        self.invalidated.set(false);
        report.active_transitions = self.scheduler.active_count();
        self.continue_frames();
        Ok(report)
    }

    fn draw(&self, point_count: usize, colormap: TextureId) -> ScatterResult<()> {
        let bindings = self.store.bindings();
        let call = DrawCall {
            label: &self.label,
            instances: point_count as u32,
            uniforms: &self.uniforms,
            bindings: &bindings,
            colormap: Some(colormap),
        };
        self.backend.borrow_mut().draw(&call)
    }

    /// Encode every pending channel, last write wins per channel
    fn flush_pending(&mut self, report: &mut FrameReport) -> ScatterResult<()> {
        let point_count = self.data.point_count();
        if point_count != self.store.point_count() {
            self.store.set_point_count(point_count)?;
            self.pixel_cache.invalidate();
            for channel in Channel::ALL {
                self.pending.entry(channel).or_insert(false);
            }
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        for (channel, animate) in std::mem::take(&mut self.pending) {
            let derived = match self.overrides.get(&channel) {
                Some(derived) => Ok(derived.clone()),
                None => derive_channel(channel, &self.data, &self.config, point_count),
            };
            let derived = match derived.and_then(|derived| {
                self.store
                    .check_shape(channel, &derived.value, derived.item_width)
                    .map(|_| derived)
            }) {
                Ok(derived) => derived,
                Err(err) => {
                    warn!(
                        "[ScatterMark] {}: update of {} rejected: {}",
                        self.label, channel, err
                    );
                    report.rejected.push(err);
                    continue;
                }
            };

            let options = if animate && self.live && channel.is_animated() {
                let baseline = match self.scheduler.cancel(channel) {
                    Some(fraction) => Baseline::Blend(fraction),
                    None => Baseline::Current,
                };
                SetOptions {
                    transition: true,
                    baseline,
                }
            } else {
                self.scheduler.cancel(channel);
                SetOptions::immediate()
            };

            self.store
                .set_channel(channel, &derived.value, derived.item_width, options)?;

            match channel {
                Channel::Color => self.use_colormap = derived.item_width == 1,
                Channel::Selected => {
                    self.has_selection =
                        self.overrides.contains_key(&channel) || self.data.selected.is_some()
                }
                _ => {}
            }
        }

        for channel in self.store.take_transition_requests() {
            self.scheduler
                .begin(channel, self.figure.animation_duration_ms, None);
        }
        Ok(())
    }

    /// Recompute the color domain only after color data or the color scale changed
    fn refresh_color_domain(&mut self) {
        if !self.color_domain_dirty {
            return;
        }
        let scale = self.collaborators.color_scale.as_deref();
        self.color_domain = match self.overrides.get(&Channel::Color) {
            Some(derived) if derived.item_width == 1 => {
                color_domain(derived.value.values().iter().map(|&v| v as f64), scale)
            }
            _ => color_domain(self.data.color.iter().flatten().copied(), scale),
        };
        self.color_domain_dirty = false;
        self.color_domain_updates += 1;
        trace!(
            "[ScatterMark] {}: color domain {:?}",
            self.label,
            self.color_domain
        );
    }

    fn refresh_uniforms(&mut self) {
        self.refresh_color_domain();
        let collaborators = &self.collaborators;
        let uniforms = &mut self.uniforms;

        let layout = &collaborators.layout;
        let range_x = layout.padded_range(Axis::X);
        let range_y = layout.padded_range(Axis::Y);
        uniforms.range_x = to_f32(range_x);
        // GPU space grows upwards
        uniforms.range_y = [range_y[1] as f32, range_y[0] as f32];
        uniforms.domain_x = to_f32(collaborators.x_scale.domain());
        uniforms.domain_y = to_f32(collaborators.y_scale.domain());
        uniforms.plot_area = [
            layout.plot_area_width() as f32,
            layout.plot_area_height() as f32,
        ];

        let size = [0.0, self.config.default_size];
        uniforms.range_size = size;
        uniforms.domain_size = match &collaborators.size_scale {
            Some(scale) => to_f32(scale.domain()),
            None => size,
        };
        (uniforms.domain_opacity, uniforms.range_opacity) = match &collaborators.opacity_scale {
            Some(scale) => (to_f32(scale.domain()), OPACITY_RANGE),
            None => ([0.0, 1.0], [0.0, 1.0]),
        };
        uniforms.domain_rotation = match &collaborators.rotation_scale {
            Some(scale) => to_f32(scale.domain()),
            None => DEFAULT_ROTATION_DOMAIN,
        };
        uniforms.range_rotation = ROTATION_RANGE;
        uniforms.domain_color = self.color_domain;

        uniforms.set_flag(FLAG_HAS_SELECTION, self.has_selection);
        uniforms.set_flag(FLAG_USE_COLORMAP, self.use_colormap);
        if let Some(layout) = self.store.layout(Channel::Color) {
            uniforms.color_stride = layout.item_width as u32;
        }

        for channel in Channel::ALL.into_iter().filter(Channel::is_animated) {
            uniforms.set_fraction(channel, self.scheduler.fraction(channel));
        }
        for binding in self.store.bindings() {
            uniforms.set_broadcast(binding.slot, binding.layout.is_broadcast());
            uniforms.set_offset(binding.slot, binding.offset);
        }
    }

    // Internal change tracking

    fn position_changed(&mut self, channel: Channel) {
        self.overrides.remove(&channel);
        self.pixel_cache.invalidate();
        self.mark_pending(channel, true);
        self.request_render();
    }

    fn data_changed(&mut self, channel: Channel) {
        self.overrides.remove(&channel);
        self.mark_pending(channel, true);
        self.request_render();
    }

    fn mark_pending(&mut self, channel: Channel, animate: bool) {
        *self.pending.entry(channel).or_insert(false) |= animate;
    }

    // Accessors

    pub fn data(&self) -> &ScatterData {
        &self.data
    }

    pub fn config(&self) -> &ScatterConfig {
        &self.config
    }

    pub fn figure_config(&self) -> &FigureConfig {
        &self.figure
    }

    pub fn selected(&self) -> Option<&[usize]> {
        self.data.selected.as_deref()
    }

    pub fn point_count(&self) -> usize {
        self.data.point_count()
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    pub fn scheduler(&self) -> &TransitionScheduler {
        &self.scheduler
    }

    pub fn pixel_cache(&self) -> &PixelCache {
        &self.pixel_cache
    }

    pub fn colormap(&self) -> &ColorMapBuilder {
        &self.colormap
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn uniforms(&self) -> &ScatterUniforms {
        &self.uniforms
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Times the color domain was recomputed from the color data
    pub fn color_domain_updates(&self) -> u64 {
        self.color_domain_updates
    }

    pub fn has_pending_updates(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Free every buffer and texture; the mark cannot render afterwards
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.store.release();
        self.colormap.release(&mut *self.backend.borrow_mut());
        self.scheduler.clear();
        self.pending.clear();
        self.released = true;
        info!("[ScatterMark] {} released", self.label);
    }
}

fn to_f32(pair: [f64; 2]) -> [f32; 2] {
    [pair[0] as f32, pair[1] as f32]
}
