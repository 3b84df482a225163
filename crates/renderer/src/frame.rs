//! Frame requests towards the host's display-refresh callback

use std::cell::Cell;
use std::rc::Rc;

/// Host side of the display refresh loop
pub trait FrameHost {
    /// Arrange for the mark's `render_frame` to run on the next refresh
    fn request_frame(&self);
}

/// Keeps at most one pending frame request per mark
pub struct FrameScheduler {
    host: Rc<dyn FrameHost>,
    /// Whether a request is outstanding
    pending: Cell<bool>,
    /// Requests forwarded to the host
    forwarded: Cell<u64>,
}

impl FrameScheduler {
    pub fn new(host: Rc<dyn FrameHost>) -> Self {
        Self {
            host,
            pending: Cell::new(false),
            forwarded: Cell::new(0),
        }
    }

    /// Ask for a frame; returns false when one is already pending
    pub fn request(&self) -> bool {
        if self.pending.replace(true) {
            return false;
        }
        self.forwarded.set(self.forwarded.get() + 1);
        self.host.request_frame();
        true
    }

    /// Called at the start of a delivered frame
    pub fn begin_frame(&self) {
        self.pending.set(false);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.get()
    }
}

/// Frame host that only counts requests; the owner drives frames itself
#[derive(Debug, Default)]
pub struct CountingFrameHost {
    requests: Cell<u64>,
}

impl CountingFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.get()
    }
}

impl FrameHost for CountingFrameHost {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}
