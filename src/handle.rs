//! The handle contract exposed to callers (§4.7, §6).
//!
//! A `PageHandle` is the only way a caller touches page bytes. Construction
//! increments the page's handle refcount; dropping it releases that count
//! and may trigger eviction (anonymous pages) or un-pinning (persistent
//! pages), per the manager's `release`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::MappedMutexGuard;

use crate::manager::BufferManagerInner;
use crate::page::Page;
use crate::table::TableRef;

/// A pointer to a page's bytes, valid for as long as it's held. Derefs to
/// `[u8]`; mutate through `DerefMut` and call
/// [`PageHandle::wrote_bytes`](PageHandle::wrote_bytes) afterwards.
pub struct PageBytes<'a> {
    pub(crate) guard: MappedMutexGuard<'a, [u8]>,
}

impl Deref for PageBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard
    }
}

impl DerefMut for PageBytes<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard
    }
}

/// Short-lived, reference-counted handle to exactly one page.
pub struct PageHandle<T: TableRef> {
    manager: Arc<BufferManagerInner<T>>,
    page: Page<T>,
}

impl<T: TableRef> PageHandle<T> {
    pub(crate) fn new(manager: Arc<BufferManagerInner<T>>, page: Page<T>) -> Self {
        page.add_ref();
        Self { manager, page }
    }

    pub(crate) fn page(&self) -> &Page<T> {
        &self.page
    }

    /// True if the manager currently considers this page ineligible for
    /// eviction. Pinning is a property of the page, not of any one handle
    /// (spec.md §9): two handles for the same identity share pin state.
    pub fn is_pinned(&self) -> bool {
        self.page.is_pinned()
    }

    /// Returns a pointer to the page's bytes, loading them from disk (and
    /// evicting an LRU victim if needed) on first access. `None` if every
    /// resident frame is pinned and no frame can be freed (§4.4).
    pub fn get_bytes(&self) -> Option<PageBytes<'_>> {
        self.manager.get_bytes(&self.page)
    }

    /// Marks the page dirty. Callers must call this after mutating the
    /// buffer returned by `get_bytes`; without it the manager is not
    /// required to persist the change.
    pub fn wrote_bytes(&self) {
        self.page.set_dirty(true);
    }
}

impl<T: TableRef> Drop for PageHandle<T> {
    fn drop(&mut self) {
        self.manager.release(&self.page);
    }
}
