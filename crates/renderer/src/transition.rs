//! Per-channel transition scheduling
//!
//! The scheduler never touches per-point values. It only tracks, for each
//! animating channel, how far the interpolation has progressed; the program
//! mixes the previous and current buffers with that fraction.

use std::collections::BTreeMap;

use gpu_scatter_shared::Channel;
use log::{debug, trace};

/// Side effect run once a transition reaches its end
pub type CompletionCallback = Box<dyn FnOnce()>;

/// Outcome of [`TransitionScheduler::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStart {
    /// Zero duration: the new values apply at once
    Immediate,
    Animating,
}

struct ActiveTransition {
    duration_ms: f64,
    /// Set by the first tick after `begin`
    start_ms: Option<f64>,
    fraction: f32,
    on_done: Option<CompletionCallback>,
}

/// Fractions reached during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub fractions: Vec<(Channel, f32)>,
    pub completed: Vec<Channel>,
}

#[derive(Default)]
pub struct TransitionScheduler {
    active: BTreeMap<Channel, ActiveTransition>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start interpolating `channel` over `duration_ms`.
    ///
    /// A transition already running on the channel is superseded without
    /// its completion callback. The elapsed time starts at the next tick.
    pub fn begin(
        &mut self,
        channel: Channel,
        duration_ms: u64,
        on_done: Option<CompletionCallback>,
    ) -> TransitionStart {
        if self.active.remove(&channel).is_some() {
            debug!("[TransitionScheduler] {} superseded", channel);
        }

        if duration_ms == 0 {
            if let Some(on_done) = on_done {
                on_done();
            }
            return TransitionStart::Immediate;
        }

        debug!("[TransitionScheduler] {} begins ({}ms)", channel, duration_ms);
        self.active.insert(
            channel,
            ActiveTransition {
                duration_ms: duration_ms as f64,
                start_ms: None,
                fraction: 0.0,
                on_done,
            },
        );
        TransitionStart::Animating
    }

    /// Advance every active transition to `now_ms`.
    ///
    /// Fractions never decrease, even if the clock does. Transitions that
    /// reach 1 are removed and their callbacks run after removal.
    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        let mut report = TickReport::default();

        for (channel, transition) in self.active.iter_mut() {
            let start = *transition.start_ms.get_or_insert(now_ms);
            let elapsed = ((now_ms - start) / transition.duration_ms).clamp(0.0, 1.0) as f32;
            transition.fraction = transition.fraction.max(elapsed);

            trace!("[TransitionScheduler] {} at {:.3}", channel, transition.fraction);
            report.fractions.push((*channel, transition.fraction));
            if transition.fraction >= 1.0 {
                report.completed.push(*channel);
            }
        }

        for channel in &report.completed {
            if let Some(transition) = self.active.remove(channel) {
                debug!("[TransitionScheduler] {} complete", channel);
                if let Some(on_done) = transition.on_done {
                    on_done();
                }
            }
        }

        report
    }

    /// Drop the transition on `channel` without running its callback.
    /// Returns the last fraction it applied.
    pub fn cancel(&mut self, channel: Channel) -> Option<f32> {
        self.active.remove(&channel).map(|transition| {
            debug!(
                "[TransitionScheduler] {} cancelled at {:.3}",
                channel, transition.fraction
            );
            transition.fraction
        })
    }

    /// Current fraction of `channel`; 1 when it is not animating
    pub fn fraction(&self, channel: Channel) -> f32 {
        self.active
            .get(&channel)
            .map(|transition| transition.fraction)
            .unwrap_or(1.0)
    }

    pub fn is_animating(&self, channel: Channel) -> bool {
        self.active.contains_key(&channel)
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<u32>>, CompletionCallback) {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        (count, Box::new(move || inner.set(inner.get() + 1)))
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let mut scheduler = TransitionScheduler::new();
        let (count, on_done) = counter();
        assert_eq!(
            scheduler.begin(Channel::Size, 0, Some(on_done)),
            TransitionStart::Immediate
        );
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_active());
        assert_eq!(scheduler.fraction(Channel::Size), 1.0);
    }

    #[test]
    fn test_fraction_is_monotonic_and_completes() {
        let mut scheduler = TransitionScheduler::new();
        let (count, on_done) = counter();
        scheduler.begin(Channel::X, 100, Some(on_done));

        // First tick only records the start
        assert_eq!(scheduler.tick(1000.0).fractions, vec![(Channel::X, 0.0)]);
        scheduler.tick(1050.0);
        assert_eq!(scheduler.fraction(Channel::X), 0.5);

        // Clock going backwards does not rewind the fraction
        scheduler.tick(1020.0);
        assert_eq!(scheduler.fraction(Channel::X), 0.5);

        let report = scheduler.tick(1100.0);
        assert_eq!(report.completed, vec![Channel::X]);
        assert_eq!(report.fractions, vec![(Channel::X, 1.0)]);
        assert!(!scheduler.is_active());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_cancel_skips_callback() {
        let mut scheduler = TransitionScheduler::new();
        let (count, on_done) = counter();
        scheduler.begin(Channel::Opacity, 200, Some(on_done));
        scheduler.tick(0.0);
        scheduler.tick(50.0);

        assert_eq!(scheduler.cancel(Channel::Opacity), Some(0.25));
        assert_eq!(scheduler.cancel(Channel::Opacity), None);
        scheduler.tick(1000.0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_restart_supersedes_silently() {
        let mut scheduler = TransitionScheduler::new();
        let (first, on_first) = counter();
        let (second, on_second) = counter();

        scheduler.begin(Channel::Y, 100, Some(on_first));
        scheduler.tick(0.0);
        scheduler.tick(40.0);
        scheduler.begin(Channel::Y, 100, Some(on_second));
        assert_eq!(scheduler.fraction(Channel::Y), 0.0);

        scheduler.tick(50.0);
        scheduler.tick(150.0);
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_independent_channels() {
        let mut scheduler = TransitionScheduler::new();
        scheduler.begin(Channel::X, 100, None);
        scheduler.tick(0.0);
        scheduler.begin(Channel::Size, 400, None);
        let report = scheduler.tick(100.0);

        assert_eq!(report.completed, vec![Channel::X]);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.fraction(Channel::Size), 0.0);
    }
}
