//! The `Page` object: per-page state shared between the directory and
//! every live handle (§3 DATA MODEL, §4.8 state machine).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FrameId;
use crate::identity::PageIdentity;
use crate::table::TableRef;

#[derive(Debug)]
struct PageInner<T: TableRef> {
    identity: PageIdentity<T>,
    frame: Option<FrameId>,
    pinned: bool,
    dirty: bool,
    timestamp: u64,
    handle_refcount: u32,
}

/// Reference-counted handle to one page's bookkeeping state.
///
/// Cloning a `Page` shares the same underlying state (it's the directory's
/// and every `PageHandle`'s view of the same cached page), mirroring the
/// teacher's `Page(Arc<RwLock<PageInner>>)` wrapper.
#[derive(Debug, Clone)]
pub(crate) struct Page<T: TableRef>(Arc<Mutex<PageInner<T>>>);

impl<T: TableRef> Page<T> {
    pub fn new(identity: PageIdentity<T>, pinned: bool) -> Self {
        Page(Arc::new(Mutex::new(PageInner {
            identity,
            frame: None,
            pinned,
            dirty: false,
            timestamp: 0,
            handle_refcount: 0,
        })))
    }

    pub fn identity(&self) -> PageIdentity<T> {
        self.0.lock().identity.clone()
    }

    pub fn is_pinned(&self) -> bool {
        self.0.lock().pinned
    }

    pub fn is_dirty(&self) -> bool {
        self.0.lock().dirty
    }

    pub fn is_buffered(&self) -> bool {
        self.0.lock().frame.is_some()
    }

    pub fn timestamp(&self) -> u64 {
        self.0.lock().timestamp
    }

    pub fn frame_id(&self) -> Option<FrameId> {
        self.0.lock().frame
    }

    pub fn refcount(&self) -> u32 {
        self.0.lock().handle_refcount
    }

    pub fn set_pinned(&self, pinned: bool) {
        self.0.lock().pinned = pinned;
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.0.lock().dirty = dirty;
    }

    pub fn stamp(&self, timestamp: u64) {
        self.0.lock().timestamp = timestamp;
    }

    pub fn bind_frame(&self, frame_id: FrameId) {
        self.0.lock().frame = Some(frame_id);
    }

    pub fn unbind_frame(&self) {
        self.0.lock().frame = None;
    }

    /// Increments the handle refcount, returning the new value.
    pub fn add_ref(&self) -> u32 {
        let mut inner = self.0.lock();
        inner.handle_refcount += 1;
        inner.handle_refcount
    }

    /// Decrements the handle refcount, returning the new value. Saturates
    /// at zero so a stray extra release can't underflow.
    pub fn remove_ref(&self) -> u32 {
        let mut inner = self.0.lock();
        inner.handle_refcount = inner.handle_refcount.saturating_sub(1);
        inner.handle_refcount
    }
}
