//! Predicate-based point selection with a trailing-edge throttle

use log::{trace, warn};

use crate::pixel_cache::PixelCoords;

/// Interval during which repeated selector requests are coalesced
pub const SELECTOR_THROTTLE_MS: f64 = 50.0;

/// Geometric test over pixel coordinates, returning one flag per point
pub type SelectionPredicate = Box<dyn Fn(&[f64], &[f64]) -> Vec<bool>>;

pub enum SelectorRequest {
    Select(SelectionPredicate),
    Clear,
}

impl std::fmt::Debug for SelectorRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorRequest::Select(_) => f.write_str("Select(..)"),
            SelectorRequest::Clear => f.write_str("Clear"),
        }
    }
}

/// Ascending, duplicate-free indices of selected points
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionMask {
    indices: Vec<usize>,
}

impl SelectionMask {
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            indices: flags
                .iter()
                .enumerate()
                .filter_map(|(index, &selected)| selected.then_some(index))
                .collect(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug)]
pub struct SelectionEngine {
    interval_ms: f64,
    pending: Option<SelectorRequest>,
    due_ms: Option<f64>,
    evaluations: u64,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(SELECTOR_THROTTLE_MS)
    }
}

impl SelectionEngine {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            pending: None,
            due_ms: None,
            evaluations: 0,
        }
    }

    /// Queue a request. The latest request wins; it becomes due one interval
    /// after the first request of the burst.
    pub fn request(&mut self, request: SelectorRequest, now_ms: f64) {
        if self.due_ms.is_none() {
            self.due_ms = Some(now_ms + self.interval_ms);
        }
        trace!("[SelectionEngine] queued {:?}", request);
        self.pending = Some(request);
    }

    /// The pending request, if its interval has elapsed
    pub fn take_due(&mut self, now_ms: f64) -> Option<SelectorRequest> {
        match self.due_ms {
            Some(due) if now_ms >= due => self.take_pending(),
            _ => None,
        }
    }

    /// The pending request regardless of the throttle
    pub fn take_pending(&mut self) -> Option<SelectorRequest> {
        self.due_ms = None;
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.due_ms
    }

    /// Number of predicate evaluations so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Run a request against fresh pixel coordinates
    pub fn evaluate(
        &mut self,
        request: &SelectorRequest,
        coords: PixelCoords<'_>,
    ) -> SelectionMask {
        let predicate = match request {
            SelectorRequest::Select(predicate) => predicate,
            SelectorRequest::Clear => return SelectionMask::default(),
        };

        self.evaluations += 1;
        let flags = predicate(coords.x, coords.y);
        if flags.len() != coords.len() {
            warn!(
                "[SelectionEngine] predicate returned {} flags for {} points",
                flags.len(),
                coords.len()
            );
        }
        let count = flags.len().min(coords.len());
        SelectionMask::from_flags(&flags[..count])
    }
}
