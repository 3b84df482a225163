//! Integration tests for scatter marks on the headless backend

use std::cell::RefCell;
use std::rc::Rc;

use gpu_scatter_renderer::uniforms::FLAG_HAS_SELECTION;
use gpu_scatter_renderer::{
    AttributeSlot, Channel, ChannelValue, CountingFrameHost, Encoding, FigureConfig,
    HeadlessBackend, LinearColorScale, LinearScale, ManualClock, MarkCollaborators,
    ScatterConfig, ScatterData, ScatterError, ScatterMark, StaticLayout, ViewPadding,
};

struct Harness {
    mark: ScatterMark,
    backend: Rc<RefCell<HeadlessBackend>>,
    clock: Rc<ManualClock>,
    host: Rc<CountingFrameHost>,
    color_scale: Rc<LinearColorScale>,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn points(n: usize) -> ScatterData {
    ScatterData {
        x: (0..n).map(|i| i as f64).collect(),
        y: vec![0.0; n],
        ..Default::default()
    }
}

fn harness(data: ScatterData, animation_duration_ms: u64) -> Harness {
    init_logging();
    let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
    let clock = Rc::new(ManualClock::new(0.0));
    let host = Rc::new(CountingFrameHost::new());
    let color_scale = Rc::new(
        LinearColorScale::new(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]).with_domain(0.0, 10.0),
    );

    let collaborators = MarkCollaborators::new(
        Rc::new(LinearScale::new([0.0, 4.0], [0.0, 400.0])),
        Rc::new(LinearScale::new([0.0, 1.0], [100.0, 0.0])),
        Rc::new(StaticLayout::new(400.0, 100.0)),
        clock.clone(),
        host.clone(),
    )
    .with_color_scale(color_scale.clone());

    let mark = ScatterMark::new(
        backend.clone(),
        collaborators,
        ScatterConfig::default(),
        FigureConfig {
            animation_duration_ms,
        },
        data,
    )
    .unwrap();

    Harness {
        mark,
        backend,
        clock,
        host,
        color_scale,
    }
}

fn left_of(limit: f64) -> Box<dyn Fn(&[f64], &[f64]) -> Vec<bool>> {
    Box::new(move |x: &[f64], _y: &[f64]| x.iter().map(|&px| px < limit).collect())
}

#[test]
fn test_midpoint_selection() {
    let mut h = harness(points(5), 0);
    h.mark.render_frame().unwrap();

    // Pixels are 0, 100, 200, 300, 400
    let mask = h.mark.select(Some(left_of(150.0)));
    assert_eq!(mask.indices(), &[0, 1]);
    assert_eq!(h.mark.selected(), Some(&[0, 1][..]));

    h.mark.render_frame().unwrap();
    assert_eq!(
        h.mark.store().values(Channel::Selected),
        Some(&[1.0, 1.0, 0.0, 0.0, 0.0][..])
    );
    assert!(h.mark.uniforms().has_flag(FLAG_HAS_SELECTION));
}

#[test]
fn test_repeated_selection_and_clear() {
    let mut h = harness(points(5), 0);
    h.mark.render_frame().unwrap();

    let first = h.mark.select(Some(left_of(250.0)));
    let second = h.mark.select(Some(left_of(250.0)));
    assert_eq!(first, second);
    assert_eq!(h.mark.selection().evaluations(), 2);

    let cleared = h.mark.select(None);
    assert!(cleared.is_empty());
    assert_eq!(h.mark.selected(), None);

    h.mark.render_frame().unwrap();
    assert!(!h.mark.uniforms().has_flag(FLAG_HAS_SELECTION));
    let layout = h.mark.store().layout(Channel::Selected).unwrap();
    assert!(layout.is_broadcast());
}

#[test]
fn test_selection_listener_is_notified() {
    let mut h = harness(points(5), 0);
    let heard = Rc::new(RefCell::new(Vec::new()));
    let sink = heard.clone();
    h.mark.on_selection_changed(Box::new(move |selected| {
        sink.borrow_mut().push(selected.map(<[usize]>::to_vec));
    }));

    h.mark.select(Some(left_of(50.0)));
    h.mark.select(None);
    assert_eq!(*heard.borrow(), vec![Some(vec![0]), None]);
}

#[test]
fn test_broadcast_size_reallocates_when_per_point() {
    let mut h = harness(points(1000), 0);
    h.mark.render_frame().unwrap();

    let layout = h.mark.store().layout(Channel::Size).unwrap();
    assert_eq!(layout.encoding, Encoding::Broadcast);
    assert_eq!(layout.broadcast_count, 1000);
    assert_eq!(layout.item_width, 1);
    let before = h.mark.store().reallocations();

    h.mark.set_size(Some(vec![9.0; 1000]));
    let report = h.mark.render_frame().unwrap();
    assert!(report.drawn);

    let layout = h.mark.store().layout(Channel::Size).unwrap();
    assert_eq!(layout.encoding, Encoding::PerInstance);
    assert_eq!(layout.broadcast_count, 1);
    assert_eq!(layout.items, 1000);
    assert!(h.mark.store().reallocations() > before);
}

#[test]
fn test_render_requests_are_coalesced() {
    let mut h = harness(points(3), 0);
    assert_eq!(h.host.requests(), 1);

    h.mark.request_render();
    h.mark.set_size(Some(vec![1.0, 2.0, 3.0]));
    h.mark.set_opacity(Some(vec![0.5, 0.5, 0.5]));
    assert_eq!(h.host.requests(), 1);

    h.mark.render_frame().unwrap();
    assert_eq!(h.backend.borrow().stats().draws, 1);

    h.mark.request_render();
    h.mark.request_render();
    assert_eq!(h.host.requests(), 2);
}

#[test]
fn test_transition_runs_to_completion() {
    let mut h = harness(points(2), 1000);
    h.mark.render_frame().unwrap();

    h.mark.set_x(vec![2.0, 3.0]);
    h.clock.set(100.0);
    let report = h.mark.render_frame().unwrap();
    assert_eq!(report.active_transitions, 1);
    assert!(h.mark.scheduler().is_animating(Channel::X));
    assert_eq!(h.mark.scheduler().fraction(Channel::X), 0.0);
    assert_eq!(h.mark.store().previous_values(Channel::X), Some(&[0.0, 1.0][..]));
    assert_eq!(h.mark.store().values(Channel::X), Some(&[2.0, 3.0][..]));

    let requests = h.host.requests();
    h.clock.set(600.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.uniforms().animation[0], 0.5);
    assert_eq!(h.host.requests(), requests + 1);

    // A clock running backwards never rewinds the animation
    h.clock.set(400.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.scheduler().fraction(Channel::X), 0.5);

    h.clock.set(1100.0);
    let report = h.mark.render_frame().unwrap();
    assert_eq!(report.completed, vec![Channel::X]);
    assert_eq!(report.active_transitions, 0);
    assert_eq!(h.mark.scheduler().fraction(Channel::X), 1.0);
    assert_eq!(h.mark.uniforms().animation[0], 1.0);
}

#[test]
fn test_interrupted_transition_restarts_from_blend() {
    let mut h = harness(points(2), 1000);
    h.mark.set_x(vec![0.0, 0.0]);
    h.mark.render_frame().unwrap();

    h.mark.set_x(vec![10.0, 10.0]);
    h.mark.render_frame().unwrap();
    h.clock.set(500.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.scheduler().fraction(Channel::X), 0.5);

    h.mark.set_x(vec![20.0, 20.0]);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.store().previous_values(Channel::X), Some(&[5.0, 5.0][..]));
    assert_eq!(h.mark.store().values(Channel::X), Some(&[20.0, 20.0][..]));
    assert_eq!(h.mark.scheduler().fraction(Channel::X), 0.0);
    assert_eq!(h.mark.scheduler().active_count(), 1);
}

#[test]
fn test_zero_duration_snaps() {
    let mut h = harness(points(2), 0);
    h.mark.render_frame().unwrap();

    h.mark.set_size(Some(vec![4.0, 9.0]));
    let report = h.mark.render_frame().unwrap();
    assert_eq!(report.active_transitions, 0);
    assert!(!h.mark.scheduler().is_active());
    assert_eq!(h.mark.uniforms().animation[2], 1.0);
}

#[test]
fn test_color_domain_change_rebuilds_colormap_only() {
    let mut data = points(3);
    data.color = Some(vec![0.0, 5.0, 10.0]);
    let mut h = harness(data, 0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.colormap().rebuilds(), 1);
    assert_eq!(h.mark.uniforms().domain_color, [0.0, 10.0]);

    let generation = h.mark.pixel_cache().generation();
    h.color_scale.set_domain(0.0, 20.0);
    h.mark.on_color_scale_changed();
    h.mark.render_frame().unwrap();

    assert_eq!(h.mark.colormap().rebuilds(), 2);
    assert_eq!(h.mark.pixel_cache().generation(), generation);
    assert_eq!(h.mark.uniforms().domain_color, [0.0, 20.0]);
    assert_eq!(h.backend.borrow().live_textures(), 1);
}

#[test]
fn test_color_domain_is_recomputed_only_on_change() {
    let mut data = points(3);
    data.color = Some(vec![0.0, 5.0, 10.0]);
    let mut h = harness(data, 1000);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.color_domain_updates(), 1);

    // Animation ticks leave the color data alone
    h.mark.set_x(vec![1.0, 2.0, 3.0]);
    for tick in 1..=10 {
        h.clock.set(tick as f64 * 100.0);
        h.mark.render_frame().unwrap();
    }
    assert_eq!(h.mark.color_domain_updates(), 1);

    h.color_scale.set_domain(0.0, 20.0);
    h.mark.on_color_scale_changed();
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.color_domain_updates(), 2);
    assert_eq!(h.mark.uniforms().domain_color, [0.0, 20.0]);

    h.mark.set_color(Some(vec![2.0, 4.0, 6.0]));
    h.clock.set(1100.0);
    h.mark.render_frame().unwrap();
    h.clock.set(1200.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.color_domain_updates(), 3);

    h.mark
        .set_channel("color", ChannelValue::PerInstance(vec![1.0, 2.0, 3.0]), 1)
        .unwrap();
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.color_domain_updates(), 4);
}

#[test]
fn test_render_frame_is_idempotent_per_tick() {
    let mut h = harness(points(2), 1000);
    assert!(h.mark.render_frame().unwrap().drawn);

    let report = h.mark.render_frame().unwrap();
    assert!(report.skipped);
    assert_eq!(h.backend.borrow().stats().draws, 1);

    h.mark.set_x(vec![2.0, 3.0]);
    assert!(h.mark.render_frame().unwrap().drawn);
    let report = h.mark.render_frame().unwrap();
    assert!(report.skipped);
    assert_eq!(report.active_transitions, 1);
    assert_eq!(h.backend.borrow().stats().draws, 2);

    // The running transition keeps a frame requested for the next tick
    h.clock.set(16.0);
    assert!(h.mark.render_frame().unwrap().drawn);
    assert_eq!(h.backend.borrow().stats().draws, 3);
}

#[test]
fn test_draw_binds_one_buffer_per_channel() {
    let mut h = harness(points(4), 1000);
    h.mark.render_frame().unwrap();
    h.mark.set_size(Some(vec![1.0, 2.0, 3.0, 4.0]));
    h.mark.render_frame().unwrap();

    let backend = h.backend.borrow();
    let draw = backend.last_draw().unwrap();
    let size = draw.binding(AttributeSlot::Size).unwrap();
    let previous = draw.binding(AttributeSlot::SizePrevious).unwrap();
    assert_eq!(size.buffer, previous.buffer);
    assert_ne!(size.offset, previous.offset);
    assert_eq!(draw.uniforms.offset(AttributeSlot::Size), size.offset);
    assert_eq!(draw.uniforms.offset(AttributeSlot::SizePrevious), previous.offset);
    assert_eq!(backend.live_buffers(), AttributeSlot::STORAGE_BINDINGS);

    let contents = backend.buffer_contents(size.buffer).unwrap();
    let start = size.offset as usize;
    assert_eq!(&contents[start..start + 4], &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_pixel_coordinates_cover_drawn_points() {
    let mut h = harness(points(5), 0);
    h.mark.set_x(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let coords = h.mark.pixel_coordinates();
    assert_eq!(coords.len(), 5);
    assert_eq!(coords.x[4], 400.0);
    assert_eq!(coords.y[0], 100.0);
}

#[test]
fn test_point_count_change_marks_channels_stale() {
    let mut data = points(3);
    data.size = Some(vec![1.0, 2.0, 3.0]);
    let mut h = harness(data, 0);
    assert!(h.mark.render_frame().unwrap().drawn);

    h.mark.set_x(vec![0.0, 1.0, 2.0, 3.0]);
    h.mark.set_y(vec![0.0; 4]);
    let report = h.mark.render_frame().unwrap();
    assert!(!report.drawn);
    assert!(matches!(
        report.rejected.as_slice(),
        [ScatterError::ShapeMismatch { .. }]
    ));
    assert!(h.mark.store().is_stale(Channel::Size));
    assert_eq!(h.backend.borrow().stats().draws, 1);

    h.mark.set_size(Some(vec![1.0, 2.0, 3.0, 4.0]));
    let report = h.mark.render_frame().unwrap();
    assert!(report.drawn);
    assert!(!h.mark.store().is_stale(Channel::Size));
    assert_eq!(h.backend.borrow().last_draw().unwrap().instances, 4);
}

#[test]
fn test_hidden_mark_is_not_drawn() {
    let mut h = harness(points(3), 0);
    h.mark.set_visible(false);
    let report = h.mark.render_frame().unwrap();
    assert!(!report.drawn);
    assert_eq!(h.backend.borrow().stats().draws, 0);

    h.mark.set_visible(true);
    assert!(h.mark.render_frame().unwrap().drawn);
}

#[test]
fn test_selector_is_throttled() {
    let mut h = harness(points(5), 0);
    h.mark.render_frame().unwrap();

    h.mark.selector_changed(Some(left_of(50.0)));
    h.clock.set(10.0);
    h.mark.selector_changed(Some(left_of(250.0)));

    h.clock.set(20.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.selected(), None);
    assert!(h.mark.selection().has_pending());

    h.clock.set(60.0);
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.selected(), Some(&[0, 1, 2][..]));
    assert_eq!(h.mark.selection().evaluations(), 1);

    h.clock.set(70.0);
    h.mark.selector_changed(Some(left_of(350.0)));
    let mask = h.mark.selector_finished().unwrap();
    assert_eq!(mask.len(), 4);
    assert!(!h.mark.selection().has_pending());
    assert!(h.mark.selector_finished().is_none());
}

#[test]
fn test_generic_channel_entry() {
    let mut h = harness(points(3), 0);
    h.mark.render_frame().unwrap();

    h.mark
        .set_channel("size", ChannelValue::Broadcast(vec![25.0]), 1)
        .unwrap();
    h.mark.render_frame().unwrap();
    assert_eq!(h.mark.store().values(Channel::Size), Some(&[25.0][..]));

    assert!(matches!(
        h.mark.set_channel("x", ChannelValue::Broadcast(vec![1.0]), 1),
        Err(ScatterError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        h.mark.set_channel("opacity", ChannelValue::PerInstance(vec![1.0; 2]), 1),
        Err(ScatterError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        h.mark.set_channel("skew", ChannelValue::Broadcast(vec![1.0]), 1),
        Err(ScatterError::UnsupportedChannel { .. })
    ));

    h.mark
        .set_channel("x", ChannelValue::PerInstance(vec![4.0, 3.0, 2.0]), 1)
        .unwrap();
    assert_eq!(h.mark.data().x, vec![4.0, 3.0, 2.0]);
}

#[test]
fn test_padding_listener() {
    let mut h = harness(points(1), 0);
    let heard = Rc::new(RefCell::new(Vec::new()));
    let sink = heard.clone();
    h.mark
        .on_padding_changed(Box::new(move |padding| sink.borrow_mut().push(padding)));

    h.mark
        .apply_model_change("default_size", &serde_json::json!(16.0))
        .unwrap();
    assert_eq!(*heard.borrow(), vec![ViewPadding { x: 3.0, y: 3.0 }]);
}

#[test]
fn test_release_frees_gpu_resources() {
    let mut h = harness(points(3), 0);
    h.mark.render_frame().unwrap();
    assert!(h.backend.borrow().live_buffers() > 0);

    h.mark.release();
    assert_eq!(h.backend.borrow().live_buffers(), 0);
    assert_eq!(h.backend.borrow().live_textures(), 0);
    assert!(h.mark.render_frame().is_err());
}
