//! Per-channel attribute buffers
//!
//! The store owns one GPU buffer per visual channel. Each channel is
//! encoded either as a broadcast value (one item read by every instance) or
//! as a per-instance array. A change of capacity destroys and recreates the
//! buffer; anything else is written in place and flagged for upload.
//!
//! An animated channel splits its buffer into two halves that form a small
//! arena: one holds the current values, the other the previous ones.
//! Starting a transition swaps which half is current, so the outgoing values
//! stay where they are and become the interpolation baseline. Draws see the
//! swap only as a change of the two slot offsets.

use std::collections::{BTreeMap, BTreeSet};

use gpu_scatter_shared::{Channel, ChannelValue, ScatterError, ScatterResult};
use log::{debug, warn};

use crate::backend::{AttributeBinding, AttributeSlot, BufferId, SharedBackend};

/// How the instances of a draw read a channel's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Broadcast,
    PerInstance,
}

/// Shape of one allocated channel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub encoding: Encoding,
    /// Numbers per item
    pub item_width: usize,
    /// Instances reading each stored item: the point count for a broadcast
    /// value, 1 for a per-instance array
    pub broadcast_count: usize,
    /// Items stored in the buffer
    pub items: usize,
}

impl ChannelLayout {
    pub fn broadcast(item_width: usize, point_count: usize) -> Self {
        Self {
            encoding: Encoding::Broadcast,
            item_width,
            broadcast_count: point_count.max(1),
            items: 1,
        }
    }

    pub fn per_instance(item_width: usize, point_count: usize) -> Self {
        Self {
            encoding: Encoding::PerInstance,
            item_width,
            broadcast_count: 1,
            items: point_count,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.encoding == Encoding::Broadcast
    }

    /// Floats held by the buffer
    pub fn allocated_floats(&self) -> usize {
        self.items * self.item_width
    }

    /// Floats read by a draw over all instances
    pub fn consumed_floats(&self) -> usize {
        self.items * self.broadcast_count * self.item_width
    }

    fn same_capacity(&self, other: &ChannelLayout) -> bool {
        self.item_width == other.item_width
            && self.broadcast_count == other.broadcast_count
            && self.items == other.items
    }
}

/// Baseline used as "previous" when a channel starts a transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Baseline {
    /// The values that were current before this update
    Current,
    /// The on-screen state of an interrupted transition, at this fraction
    Blend(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetOptions {
    /// Request an interpolation from the old values to the new ones
    pub transition: bool,
    pub baseline: Baseline,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            transition: true,
            baseline: Baseline::Current,
        }
    }
}

impl SetOptions {
    /// Replace the values without an interpolation
    pub fn immediate() -> Self {
        Self {
            transition: false,
            baseline: Baseline::Current,
        }
    }
}

/// One half of a channel buffer and its host-side mirror
#[derive(Debug)]
struct GpuArray {
    layout: ChannelLayout,
    contents: Vec<f32>,
    needs_upload: bool,
}

impl GpuArray {
    fn item(&self, index: usize) -> Option<&[f32]> {
        let width = self.layout.item_width;
        let index = if self.layout.is_broadcast() { 0 } else { index };
        self.contents.get(index * width..(index + 1) * width)
    }
}

#[derive(Debug)]
struct ChannelState {
    buffer: BufferId,
    /// Floats reserved for each array of the arena
    half_capacity: usize,
    /// One array, or two for animated channels
    arena: Vec<GpuArray>,
    current: usize,
    /// Per-instance values no longer match the point count
    stale: bool,
}

impl ChannelState {
    fn current(&self) -> &GpuArray {
        &self.arena[self.current]
    }

    fn previous(&self) -> Option<&GpuArray> {
        match self.arena.len() {
            2 => Some(&self.arena[1 - self.current]),
            _ => None,
        }
    }

    /// First float of arena array `index` within the buffer
    fn offset(&self, index: usize) -> usize {
        index * self.half_capacity
    }

    fn image(&self) -> Vec<f32> {
        arena_image(&self.arena, self.half_capacity)
    }
}

/// Floats each array of an arena needs
fn half_capacity(arena: &[GpuArray]) -> usize {
    arena
        .iter()
        .map(|array| array.layout.allocated_floats())
        .max()
        .unwrap_or(0)
        .max(1)
}

/// Full buffer contents with every array at its offset
fn arena_image(arena: &[GpuArray], half_capacity: usize) -> Vec<f32> {
    let mut image = vec![0.0; half_capacity * arena.len()];
    for (index, array) in arena.iter().enumerate() {
        let start = index * half_capacity;
        image[start..start + array.contents.len()].copy_from_slice(&array.contents);
    }
    image
}

/// Owner of every attribute buffer of one mark
pub struct AttributeStore {
    backend: SharedBackend,
    label: String,
    point_count: usize,
    channels: BTreeMap<Channel, ChannelState>,
    transition_requests: BTreeSet<Channel>,
    reallocations: u64,
}

impl AttributeStore {
    pub fn new(backend: SharedBackend, label: impl Into<String>, point_count: usize) -> Self {
        Self {
            backend,
            label: label.into(),
            point_count,
            channels: BTreeMap::new(),
            transition_requests: BTreeSet::new(),
            reallocations: 0,
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Encode new values for a channel.
    ///
    /// Shapes are validated before anything is written: a failed call leaves
    /// the channel untouched.
    pub fn set_channel(
        &mut self,
        channel: Channel,
        value: &ChannelValue,
        item_width: usize,
        options: SetOptions,
    ) -> ScatterResult<ChannelLayout> {
        let layout = self.check_shape(channel, value, item_width)?;
        let contents = value.values().to_vec();

        let animated = channel.is_animated();
        let exists = self.channels.contains_key(&channel);

        if !exists {
            self.create_channel(channel, layout, contents)?;
            return Ok(layout);
        }

        let transition = animated && options.transition;
        if transition {
            match options.baseline {
                Baseline::Current => self.rotate_and_write(channel, layout, contents)?,
                Baseline::Blend(fraction) => {
                    self.blend_and_write(channel, layout, contents, fraction)?
                }
            }
            self.transition_requests.insert(channel);
        } else {
            self.overwrite(channel, layout, contents)?;
            self.transition_requests.remove(&channel);
        }

        if let Some(state) = self.channels.get_mut(&channel) {
            state.stale = false;
        }
        Ok(layout)
    }

    /// Change the number of instances drawn.
    ///
    /// Broadcast buffers are reallocated for the new count. Per-instance
    /// channels that no longer match are marked stale until they are set
    /// again, and previous-value buffers are conformed so a draw never reads
    /// past their end.
    pub fn set_point_count(&mut self, point_count: usize) -> ScatterResult<()> {
        if point_count == self.point_count {
            return Ok(());
        }
        debug!(
            "[AttributeStore] {}: point count {} -> {}",
            self.label, self.point_count, point_count
        );
        self.point_count = point_count;

        let channels: Vec<Channel> = self.channels.keys().copied().collect();
        for channel in channels {
            let Some(state) = self.channels.get(&channel) else {
                continue;
            };

            let current = state.current();
            let mut replacements = Vec::new();
            for (index, array) in state.arena.iter().enumerate() {
                if array.layout.is_broadcast() {
                    let layout = ChannelLayout::broadcast(array.layout.item_width, point_count);
                    replacements.push((index, layout, array.contents.clone()));
                } else if array.layout.items != point_count && index != state.current {
                    let layout = ChannelLayout::per_instance(array.layout.item_width, point_count);
                    replacements.push((index, layout, conform(array, current, point_count)));
                }
            }

            let stale = !current.layout.is_broadcast() && current.layout.items != point_count;
            if stale {
                warn!(
                    "[AttributeStore] {}: channel {} holds {} items for {} points, marked stale",
                    self.label, channel, current.layout.items, point_count
                );
            }
            if let Some(state) = self.channels.get_mut(&channel) {
                state.stale = stale;
            }

            self.write_arrays(channel, replacements)?;
        }

        Ok(())
    }

    /// Every channel is present and matches the point count
    pub fn is_consistent(&self) -> bool {
        Channel::ALL.iter().all(|channel| {
            self.channels
                .get(channel)
                .map(|state| !state.stale)
                .unwrap_or(false)
        })
    }

    pub fn is_stale(&self, channel: Channel) -> bool {
        self.channels
            .get(&channel)
            .map(|state| state.stale)
            .unwrap_or(false)
    }

    /// Channels updated with a transition since the last call
    pub fn take_transition_requests(&mut self) -> Vec<Channel> {
        std::mem::take(&mut self.transition_requests)
            .into_iter()
            .collect()
    }

    /// Write every array flagged for upload at its offset; returns how many
    /// were written
    pub fn upload(&mut self) -> ScatterResult<usize> {
        let mut uploaded = 0;
        let mut backend = self.backend.borrow_mut();
        for state in self.channels.values_mut() {
            let (buffer, half_capacity) = (state.buffer, state.half_capacity);
            for (index, array) in state.arena.iter_mut().enumerate() {
                if array.needs_upload {
                    backend.write_buffer(buffer, index * half_capacity, &array.contents)?;
                    array.needs_upload = false;
                    uploaded += 1;
                }
            }
        }
        Ok(uploaded)
    }

    pub fn has_pending_upload(&self) -> bool {
        self.channels
            .values()
            .flat_map(|state| state.arena.iter())
            .any(|array| array.needs_upload)
    }

    /// Slots bound for the next draw, current and previous per channel.
    /// Both slots of a channel name its one buffer at different offsets.
    pub fn bindings(&self) -> Vec<AttributeBinding> {
        let mut bindings = Vec::with_capacity(AttributeSlot::COUNT);
        for (channel, state) in &self.channels {
            bindings.push(AttributeBinding {
                slot: AttributeSlot::current(*channel),
                buffer: state.buffer,
                layout: state.current().layout,
                offset: state.offset(state.current) as u32,
            });
            if let (Some(slot), Some(previous)) =
                (AttributeSlot::previous(*channel), state.previous())
            {
                bindings.push(AttributeBinding {
                    slot,
                    buffer: state.buffer,
                    layout: previous.layout,
                    offset: state.offset(1 - state.current) as u32,
                });
            }
        }
        bindings
    }

    pub fn layout(&self, channel: Channel) -> Option<ChannelLayout> {
        self.channels.get(&channel).map(|state| state.current().layout)
    }

    pub fn previous_layout(&self, channel: Channel) -> Option<ChannelLayout> {
        self.channels
            .get(&channel)
            .and_then(|state| state.previous())
            .map(|array| array.layout)
    }

    pub fn buffer(&self, channel: Channel) -> Option<BufferId> {
        self.channels.get(&channel).map(|state| state.buffer)
    }

    /// Float offset of the current values within the channel buffer
    pub fn offset(&self, channel: Channel) -> Option<usize> {
        self.channels
            .get(&channel)
            .map(|state| state.offset(state.current))
    }

    /// Float offset of the previous values, for animated channels
    pub fn previous_offset(&self, channel: Channel) -> Option<usize> {
        self.channels
            .get(&channel)
            .filter(|state| state.previous().is_some())
            .map(|state| state.offset(1 - state.current))
    }

    /// Host mirror of the current values
    pub fn values(&self, channel: Channel) -> Option<&[f32]> {
        self.channels
            .get(&channel)
            .map(|state| state.current().contents.as_slice())
    }

    /// Host mirror of the previous values
    pub fn previous_values(&self, channel: Channel) -> Option<&[f32]> {
        self.channels
            .get(&channel)
            .and_then(|state| state.previous())
            .map(|array| array.contents.as_slice())
    }

    /// Buffers destroyed and recreated because their capacity changed
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Destroy every buffer
    pub fn release(&mut self) {
        let mut backend = self.backend.borrow_mut();
        for state in self.channels.values() {
            backend.destroy_buffer(state.buffer);
        }
        self.channels.clear();
        self.transition_requests.clear();
    }

    /// Layout `value` would get, or the shape error `set_channel` would report
    pub fn check_shape(
        &self,
        channel: Channel,
        value: &ChannelValue,
        item_width: usize,
    ) -> ScatterResult<ChannelLayout> {
        if !channel.accepts_item_width(item_width) {
            return Err(ScatterError::shape_mismatch(
                channel,
                format!("item width in {:?}", channel.accepted_item_widths()),
                format!("item width {item_width}"),
            ));
        }

        let len = value.values().len();
        match value {
            ChannelValue::Broadcast(_) => {
                if len != item_width {
                    return Err(ScatterError::shape_mismatch(
                        channel,
                        format!("{item_width} values for a broadcast item"),
                        format!("{len} values"),
                    ));
                }
                Ok(ChannelLayout::broadcast(item_width, self.point_count))
            }
            ChannelValue::PerInstance(_) => {
                let expected = self.point_count * item_width;
                if len != expected {
                    return Err(ScatterError::shape_mismatch(
                        channel,
                        format!("{expected} values ({} points x {item_width})", self.point_count),
                        format!("{len} values"),
                    ));
                }
                Ok(ChannelLayout::per_instance(item_width, self.point_count))
            }
        }
    }

    fn create_channel(
        &mut self,
        channel: Channel,
        layout: ChannelLayout,
        contents: Vec<f32>,
    ) -> ScatterResult<()> {
        let copies = if channel.is_animated() { 2 } else { 1 };
        let arena: Vec<GpuArray> = (0..copies)
            .map(|_| GpuArray {
                layout,
                contents: contents.clone(),
                needs_upload: false,
            })
            .collect();
        let half_capacity = half_capacity(&arena);
        let label = self.buffer_label(channel);
        let buffer = self
            .backend
            .borrow_mut()
            .create_buffer(&label, &arena_image(&arena, half_capacity))?;

        debug!(
            "[AttributeStore] {}: created channel {} ({:?}, width {}, broadcast count {})",
            self.label, channel, layout.encoding, layout.item_width, layout.broadcast_count
        );
        self.channels.insert(
            channel,
            ChannelState {
                buffer,
                half_capacity,
                arena,
                current: 0,
                stale: false,
            },
        );
        Ok(())
    }

    /// The old current array becomes previous; the new values go in the spare
    fn rotate_and_write(
        &mut self,
        channel: Channel,
        layout: ChannelLayout,
        contents: Vec<f32>,
    ) -> ScatterResult<()> {
        let spare = match self.channels.get_mut(&channel) {
            Some(state) if state.arena.len() == 2 => {
                state.current = 1 - state.current;
                state.current
            }
            _ => return self.overwrite(channel, layout, contents),
        };
        self.write_arrays(channel, vec![(spare, layout, contents)])?;
        self.conform_previous(channel)
    }

    /// Previous receives the interrupted on-screen state; current the new values
    fn blend_and_write(
        &mut self,
        channel: Channel,
        layout: ChannelLayout,
        contents: Vec<f32>,
        fraction: f32,
    ) -> ScatterResult<()> {
        let Some(state) = self.channels.get(&channel) else {
            return self.overwrite(channel, layout, contents);
        };
        let (Some(previous), current) = (state.previous(), state.current()) else {
            return self.overwrite(channel, layout, contents);
        };
        if previous.layout.item_width != current.layout.item_width {
            return self.rotate_and_write(channel, layout, contents);
        }

        let fraction = fraction.clamp(0.0, 1.0);
        let width = current.layout.item_width;
        let (blend_layout, blended) =
            if previous.layout.is_broadcast() && current.layout.is_broadcast() {
                let blended = lerp_items(&previous.contents, &current.contents, fraction);
                (ChannelLayout::broadcast(width, self.point_count), blended)
            } else {
                let mut blended = Vec::with_capacity(self.point_count * width);
                for index in 0..self.point_count {
                    let to = current.item(index).or_else(|| item_of(&contents, &layout, index));
                    let from = previous.item(index).or(to);
                    match (from, to) {
                        (Some(from), Some(to)) => blended.extend(lerp_items(from, to, fraction)),
                        _ => blended.extend(std::iter::repeat(0.0).take(width)),
                    }
                }
                (ChannelLayout::per_instance(width, self.point_count), blended)
            };

        let previous_index = 1 - state.current;
        let current_index = state.current;
        debug!(
            "[AttributeStore] {}: channel {} restarts from blend at {:.3}",
            self.label, channel, fraction
        );
        self.write_arrays(
            channel,
            vec![
                (previous_index, blend_layout, blended),
                (current_index, layout, contents),
            ],
        )
    }

    /// Replace current values; an animated channel's previous array follows
    /// so no stale baseline remains bound
    fn overwrite(
        &mut self,
        channel: Channel,
        layout: ChannelLayout,
        contents: Vec<f32>,
    ) -> ScatterResult<()> {
        let writes = match self.channels.get(&channel) {
            Some(state) => (0..state.arena.len())
                .map(|index| (index, layout, contents.clone()))
                .collect(),
            None => return self.create_channel(channel, layout, contents),
        };
        self.write_arrays(channel, writes)
    }

    /// Pad or truncate a per-instance previous array to the point count
    fn conform_previous(&mut self, channel: Channel) -> ScatterResult<()> {
        let Some(state) = self.channels.get(&channel) else {
            return Ok(());
        };
        let Some(previous) = state.previous() else {
            return Ok(());
        };
        if previous.layout.is_broadcast() || previous.layout.items == self.point_count {
            return Ok(());
        }
        if previous.layout.item_width != state.current().layout.item_width {
            let current = state.current();
            let (layout, contents) = (current.layout, current.contents.clone());
            let index = 1 - state.current;
            return self.write_arrays(channel, vec![(index, layout, contents)]);
        }
        let conformed = conform(previous, state.current(), self.point_count);
        let layout = ChannelLayout::per_instance(previous.layout.item_width, self.point_count);
        let index = 1 - state.current;
        self.write_arrays(channel, vec![(index, layout, conformed)])
    }

    /// Put new contents into arena arrays. Equal capacities are written in
    /// place; any capacity change reallocates the channel buffer once.
    fn write_arrays(
        &mut self,
        channel: Channel,
        writes: Vec<(usize, ChannelLayout, Vec<f32>)>,
    ) -> ScatterResult<()> {
        let label = self.buffer_label(channel);
        let Some(state) = self.channels.get_mut(&channel) else {
            return Ok(());
        };

        let mut reallocate = false;
        for (index, layout, contents) in writes {
            let Some(array) = state.arena.get_mut(index) else {
                continue;
            };
            if !array.layout.same_capacity(&layout) {
                debug!(
                    "[AttributeStore] {}: {} array {} resized (broadcast count {} -> {}, width {} -> {})",
                    self.label,
                    label,
                    index,
                    array.layout.broadcast_count,
                    layout.broadcast_count,
                    array.layout.item_width,
                    layout.item_width
                );
                reallocate = true;
            }
            array.layout = layout;
            array.contents = contents;
            array.needs_upload = true;
        }
        if !reallocate {
            return Ok(());
        }

        state.half_capacity = half_capacity(&state.arena);
        let mut backend = self.backend.borrow_mut();
        let buffer = backend.create_buffer(&label, &state.image())?;
        backend.destroy_buffer(state.buffer);
        state.buffer = buffer;
        for array in &mut state.arena {
            array.needs_upload = false;
        }
        self.reallocations += 1;
        Ok(())
    }

    fn buffer_label(&self, channel: Channel) -> String {
        format!("{}/{}", self.label, channel)
    }
}

fn item_of<'a>(contents: &'a [f32], layout: &ChannelLayout, index: usize) -> Option<&'a [f32]> {
    let width = layout.item_width;
    let index = if layout.is_broadcast() { 0 } else { index };
    contents.get(index * width..(index + 1) * width)
}

fn lerp_items(from: &[f32], to: &[f32], fraction: f32) -> Vec<f32> {
    from.iter()
        .zip(to)
        .map(|(a, b)| a + (b - a) * fraction)
        .collect()
}

/// Per-instance copy of `previous` sized to `point_count`, padded with the
/// current values
fn conform(previous: &GpuArray, current: &GpuArray, point_count: usize) -> Vec<f32> {
    let width = previous.layout.item_width;
    let mut conformed = Vec::with_capacity(point_count * width);
    for index in 0..point_count {
        match previous.item(index).or_else(|| current.item(index)) {
            Some(item) => conformed.extend_from_slice(item),
            None => conformed.extend(std::iter::repeat(0.0).take(width)),
        }
    }
    conformed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{storage_buffers, HeadlessBackend};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store(points: usize) -> (Rc<RefCell<HeadlessBackend>>, AttributeStore) {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();
        (backend, AttributeStore::new(shared, "test", points))
    }

    fn array(values: &[f32]) -> ChannelValue {
        ChannelValue::PerInstance(values.to_vec())
    }

    fn scalar(value: f32) -> ChannelValue {
        ChannelValue::broadcast_scalar(value)
    }

    #[test]
    fn test_broadcast_layout_capacity() {
        let (backend, mut store) = store(1000);
        let layout = store
            .set_channel(Channel::Size, &scalar(4.0), 1, SetOptions::immediate())
            .unwrap();

        assert_eq!(layout.broadcast_count, 1000);
        assert_eq!(layout.item_width, 1);
        assert_eq!(layout.consumed_floats(), 1000);
        // One float per half
        let buffer = store.buffer(Channel::Size).unwrap();
        assert_eq!(backend.borrow().buffer_contents(buffer), Some(&[4.0, 4.0][..]));
    }

    #[test]
    fn test_encoding_switch_reallocates() {
        let (backend, mut store) = store(1000);
        store
            .set_channel(Channel::Size, &scalar(4.0), 1, SetOptions::immediate())
            .unwrap();
        let before = store.buffer(Channel::Size).unwrap();

        let layout = store
            .set_channel(Channel::Size, &array(&[2.0; 1000]), 1, SetOptions::immediate())
            .unwrap();

        assert_eq!(layout.broadcast_count, 1);
        assert_eq!(layout.consumed_floats(), 1000);
        let after = store.buffer(Channel::Size).unwrap();
        assert_ne!(before, after);
        assert!(backend.borrow().buffer_contents(before).is_none());
        assert_eq!(
            backend.borrow().buffer_contents(after).map(<[f32]>::len),
            Some(2000)
        );
        assert_eq!(store.reallocations(), 1);
    }

    #[test]
    fn test_same_capacity_writes_in_place() {
        let (backend, mut store) = store(3);
        store
            .set_channel(Channel::Rotation, &array(&[0.0, 1.0, 2.0]), 1, SetOptions::immediate())
            .unwrap();
        let buffer = store.buffer(Channel::Rotation).unwrap();

        store
            .set_channel(Channel::Rotation, &array(&[5.0, 6.0, 7.0]), 1, SetOptions::immediate())
            .unwrap();

        assert_eq!(store.buffer(Channel::Rotation), Some(buffer));
        assert!(store.has_pending_upload());
        assert_eq!(store.reallocations(), 0);
        assert_eq!(store.upload().unwrap(), 2);
        assert!(!store.has_pending_upload());
        assert_eq!(
            backend.borrow().buffer_contents(buffer),
            Some(&[5.0, 6.0, 7.0, 5.0, 6.0, 7.0][..])
        );
    }

    #[test]
    fn test_shape_mismatch_leaves_channel_untouched() {
        let (_backend, mut store) = store(3);
        store
            .set_channel(Channel::Opacity, &array(&[1.0; 3]), 1, SetOptions::immediate())
            .unwrap();

        let err = store
            .set_channel(Channel::Opacity, &array(&[1.0; 4]), 1, SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScatterError::ShapeMismatch { .. }));

        let err = store
            .set_channel(Channel::Size, &scalar(1.0), 3, SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScatterError::ShapeMismatch { .. }));

        assert_eq!(store.values(Channel::Opacity), Some(&[1.0, 1.0, 1.0][..]));
        assert!(store.take_transition_requests().is_empty());
    }

    #[test]
    fn test_single_item_array_stays_per_instance() {
        let (_backend, mut store) = store(1);
        let layout = store
            .set_channel(Channel::Size, &array(&[3.0]), 1, SetOptions::immediate())
            .unwrap();
        assert_eq!(layout.encoding, Encoding::PerInstance);
        assert_eq!(layout.broadcast_count, 1);
    }

    #[test]
    fn test_transition_swaps_halves() {
        let (backend, mut store) = store(2);
        store
            .set_channel(Channel::X, &array(&[0.0, 1.0]), 1, SetOptions::immediate())
            .unwrap();
        let buffer = store.buffer(Channel::X).unwrap();
        assert_eq!(store.offset(Channel::X), Some(0));
        assert_eq!(store.previous_offset(Channel::X), Some(2));

        store
            .set_channel(Channel::X, &array(&[10.0, 11.0]), 1, SetOptions::default())
            .unwrap();

        assert_eq!(store.buffer(Channel::X), Some(buffer));
        assert_eq!(store.offset(Channel::X), Some(2));
        assert_eq!(store.previous_offset(Channel::X), Some(0));
        assert_eq!(store.previous_values(Channel::X), Some(&[0.0, 1.0][..]));
        assert_eq!(store.values(Channel::X), Some(&[10.0, 11.0][..]));
        assert_eq!(store.reallocations(), 0);

        // Only the half receiving the new values is written
        assert_eq!(store.upload().unwrap(), 1);
        assert_eq!(
            backend.borrow().buffer_contents(buffer),
            Some(&[0.0, 1.0, 10.0, 11.0][..])
        );
        assert_eq!(store.take_transition_requests(), vec![Channel::X]);
        assert!(store.take_transition_requests().is_empty());
    }

    #[test]
    fn test_bindings_share_channel_buffer() {
        let (_backend, mut store) = store(3);
        store
            .set_channel(Channel::Size, &array(&[1.0, 2.0, 3.0]), 1, SetOptions::immediate())
            .unwrap();
        let red = ChannelValue::Broadcast(vec![1.0, 0.0, 0.0]);
        store
            .set_channel(Channel::Color, &red, 3, SetOptions::immediate())
            .unwrap();

        let bindings = store.bindings();
        assert_eq!(bindings.len(), 3);
        let find = |bindings: &[AttributeBinding], slot: AttributeSlot| {
            bindings.iter().find(|b| b.slot == slot).copied().unwrap()
        };
        let current = find(&bindings, AttributeSlot::Size);
        let previous = find(&bindings, AttributeSlot::SizePrevious);
        assert_eq!(current.buffer, previous.buffer);
        assert_eq!((current.offset, previous.offset), (0, 3));
        assert_eq!(find(&bindings, AttributeSlot::Color).offset, 0);
        assert!(storage_buffers(&bindings).is_ok());

        store
            .set_channel(Channel::Size, &array(&[4.0, 5.0, 6.0]), 1, SetOptions::default())
            .unwrap();
        let swapped = store.bindings();
        let current = find(&swapped, AttributeSlot::Size);
        let previous = find(&swapped, AttributeSlot::SizePrevious);
        assert_eq!(current.buffer, previous.buffer);
        assert_eq!((current.offset, previous.offset), (3, 0));
    }

    #[test]
    fn test_encoding_switch_during_transition_keeps_baseline() {
        let (backend, mut store) = store(3);
        store
            .set_channel(Channel::Size, &scalar(4.0), 1, SetOptions::immediate())
            .unwrap();
        store
            .set_channel(Channel::Size, &array(&[2.0; 3]), 1, SetOptions::default())
            .unwrap();

        assert_eq!(store.reallocations(), 1);
        assert!(store.previous_layout(Channel::Size).unwrap().is_broadcast());
        assert_eq!(store.previous_offset(Channel::Size), Some(0));
        assert_eq!(store.offset(Channel::Size), Some(3));
        let buffer = store.buffer(Channel::Size).unwrap();
        assert_eq!(
            backend.borrow().buffer_contents(buffer),
            Some(&[4.0, 0.0, 0.0, 2.0, 2.0, 2.0][..])
        );
    }

    #[test]
    fn test_blend_baseline() {
        let (_backend, mut store) = store(2);
        store
            .set_channel(Channel::Size, &array(&[0.0, 0.0]), 1, SetOptions::immediate())
            .unwrap();
        store
            .set_channel(Channel::Size, &array(&[10.0, 20.0]), 1, SetOptions::default())
            .unwrap();

        let options = SetOptions {
            transition: true,
            baseline: Baseline::Blend(0.5),
        };
        store
            .set_channel(Channel::Size, &array(&[100.0, 100.0]), 1, options)
            .unwrap();

        assert_eq!(store.previous_values(Channel::Size), Some(&[5.0, 10.0][..]));
        assert_eq!(store.values(Channel::Size), Some(&[100.0, 100.0][..]));
    }

    #[test]
    fn test_blend_of_broadcast_values() {
        let (_backend, mut store) = store(10);
        store
            .set_channel(Channel::Opacity, &scalar(0.0), 1, SetOptions::immediate())
            .unwrap();
        store
            .set_channel(Channel::Opacity, &scalar(1.0), 1, SetOptions::default())
            .unwrap();
        let options = SetOptions {
            transition: true,
            baseline: Baseline::Blend(0.25),
        };
        store
            .set_channel(Channel::Opacity, &scalar(0.5), 1, options)
            .unwrap();

        assert_eq!(store.previous_values(Channel::Opacity), Some(&[0.25][..]));
        assert!(store.previous_layout(Channel::Opacity).unwrap().is_broadcast());
    }

    #[test]
    fn test_color_has_no_previous_half() {
        let (backend, mut store) = store(2);
        let red = ChannelValue::Broadcast(vec![1.0, 0.0, 0.0]);
        let green = ChannelValue::Broadcast(vec![0.0, 1.0, 0.0]);
        store
            .set_channel(Channel::Color, &red, 3, SetOptions::default())
            .unwrap();
        store
            .set_channel(Channel::Color, &green, 3, SetOptions::default())
            .unwrap();

        assert!(store.previous_offset(Channel::Color).is_none());
        assert!(store.take_transition_requests().is_empty());
        store.upload().unwrap();
        let buffer = store.buffer(Channel::Color).unwrap();
        assert_eq!(
            backend.borrow().buffer_contents(buffer),
            Some(&[0.0, 1.0, 0.0][..])
        );
    }

    #[test]
    fn test_point_count_change() {
        let (backend, mut store) = store(3);
        store
            .set_channel(Channel::Size, &scalar(8.0), 1, SetOptions::immediate())
            .unwrap();
        store
            .set_channel(Channel::Rotation, &array(&[1.0, 2.0, 3.0]), 1, SetOptions::immediate())
            .unwrap();
        let size_buffer = store.buffer(Channel::Size).unwrap();

        store.set_point_count(5).unwrap();

        let size = store.layout(Channel::Size).unwrap();
        assert_eq!(size.broadcast_count, 5);
        assert_ne!(store.buffer(Channel::Size), Some(size_buffer));
        assert!(backend.borrow().buffer_contents(size_buffer).is_none());
        assert!(store.is_stale(Channel::Rotation));
        assert!(!store.is_consistent());

        store
            .set_channel(Channel::Rotation, &array(&[0.0; 5]), 1, SetOptions::default())
            .unwrap();
        assert!(!store.is_stale(Channel::Rotation));
        assert_eq!(store.previous_layout(Channel::Rotation).unwrap().items, 5);
        assert_eq!(
            store.previous_values(Channel::Rotation),
            Some(&[1.0, 2.0, 3.0, 0.0, 0.0][..])
        );
    }

    #[test]
    fn test_release_destroys_buffers() {
        let (backend, mut store) = store(2);
        store
            .set_channel(Channel::X, &array(&[0.0, 1.0]), 1, SetOptions::immediate())
            .unwrap();
        store
            .set_channel(Channel::Selected, &scalar(0.0), 1, SetOptions::immediate())
            .unwrap();
        assert_eq!(backend.borrow().live_buffers(), 2);

        store.release();
        assert_eq!(backend.borrow().live_buffers(), 0);
        assert!(store.bindings().is_empty());
    }
}
