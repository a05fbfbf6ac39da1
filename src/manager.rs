//! The buffer manager: top-level coordinator (§4.1).
//!
//! Wires together the frame pool, the page directory, LRU eviction, and
//! per-file disk I/O, and hands out [`PageHandle`]s to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::{FrameId, PageIndex};
use crate::directory::PageDirectory;
use crate::disk::DiskManager;
use crate::error::{BufferManagerError, Result};
use crate::eviction::find_victim;
use crate::frame_pool::FramePool;
use crate::handle::{PageBytes, PageHandle};
use crate::identity::PageIdentity;
use crate::page::Page;
use crate::table::TableRef;

/// Shared state behind every live `PageHandle`. Kept separate from
/// [`BufferManager`] so handles can hold a cheap `Arc` clone without
/// borrowing the manager for their whole lifetime (spec.md §9's "pass a
/// non-owning manager handle into each page" strategy, adapted: here the
/// *manager's* data outlives the wrapper, while the wrapper's `Drop`
/// performs the teardown side effects immediately).
pub(crate) struct BufferManagerInner<T: TableRef> {
    page_size: usize,
    temp_path: PathBuf,
    frame_pool: FramePool,
    directory: Mutex<PageDirectory<T>>,
    disk_managers: Mutex<HashMap<PathBuf, DiskManager>>,
    next_anon_serial: AtomicU64,
    timestamp: AtomicU64,
}

impl<T: TableRef> BufferManagerInner<T> {
    fn next_timestamp(&self) -> u64 {
        self.timestamp.fetch_add(1, Ordering::SeqCst)
    }

    fn backing_file(&self, identity: &PageIdentity<T>) -> (PathBuf, PageIndex) {
        match identity {
            PageIdentity::Persistent(table, index) => {
                (table.storage_location().to_path_buf(), *index)
            }
            PageIdentity::Anonymous(serial) => (self.temp_path.clone(), *serial as PageIndex),
        }
    }

    /// Runs `f` against the `DiskManager` for `path`, opening it lazily if
    /// this is the first time this path is touched. `None` if the file
    /// can't be opened (logged, never propagated — see spec.md §7).
    fn with_disk_manager<R>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut DiskManager) -> R,
    ) -> Option<R> {
        let mut managers = self.disk_managers.lock();
        if !managers.contains_key(path) {
            match DiskManager::open(path) {
                Ok(dm) => {
                    managers.insert(path.to_path_buf(), dm);
                }
                Err(e) => {
                    log::warn!("cannot open backing file {:?}: {}", path, e);
                    return None;
                }
            }
        }
        Some(f(managers.get_mut(path).expect("just inserted")))
    }

    fn lookup_or_create(&self, identity: PageIdentity<T>, pinned: bool) -> Page<T> {
        let mut directory = self.directory.lock();
        let page = match directory.get(&identity) {
            Some(page) => {
                if pinned {
                    page.set_pinned(true);
                }
                page
            }
            None => {
                let page = Page::new(identity.clone(), pinned);
                directory.insert(identity, page.clone());
                page
            }
        };
        page.stamp(self.next_timestamp());
        page
    }

    pub(crate) fn get_page(
        self: &Arc<Self>,
        table: T,
        index: PageIndex,
        pinned: bool,
    ) -> PageHandle<T> {
        let identity = PageIdentity::Persistent(table, index);
        let page = self.lookup_or_create(identity, pinned);
        PageHandle::new(Arc::clone(self), page)
    }

    pub(crate) fn get_anonymous_page(self: &Arc<Self>, pinned: bool) -> PageHandle<T> {
        let serial = self.next_anon_serial.fetch_add(1, Ordering::SeqCst);
        let identity = PageIdentity::Anonymous(serial);
        let page = self.lookup_or_create(identity, pinned);
        PageHandle::new(Arc::clone(self), page)
    }

    pub(crate) fn unpin(&self, page: &Page<T>) {
        page.set_pinned(false);
    }

    /// §4.4 Page Byte Access Path.
    pub(crate) fn get_bytes(&self, page: &Page<T>) -> Option<PageBytes<'_>> {
        if page.frame_id().is_none() {
            let frame_id = self.bind_frame(page)?;
            self.load_from_disk(page, frame_id);
        }
        // Timestamp assignment happens last so a page just loaded is MRU.
        page.stamp(self.next_timestamp());
        let frame_id = page.frame_id().expect("just bound above");
        // Locks only this frame's slice, not the whole pool: holding these
        // bytes must never block a concurrent `get_bytes` on a different,
        // already-resident page (e.g. copying one page's bytes into another).
        let guard = self.frame_pool.lock_frame(frame_id);
        Some(PageBytes {
            guard: MutexGuard::map(guard, |frame| &mut frame[..]),
        })
    }

    /// Finds a free frame (allocating or evicting an LRU victim), binds it
    /// to `page`, and returns its id. `None` if every resident frame is
    /// pinned.
    fn bind_frame(&self, page: &Page<T>) -> Option<FrameId> {
        let frame_id = match self.frame_pool.allocate() {
            Some(id) => id,
            None => {
                let victim = find_victim(&self.directory.lock())?;
                self.evict(&victim);
                self.frame_pool
                    .allocate()
                    .expect("a frame was just evicted, one must be free")
            }
        };
        page.bind_frame(frame_id);
        Some(frame_id)
    }

    fn load_from_disk(&self, page: &Page<T>, frame_id: FrameId) {
        let (path, index) = self.backing_file(&page.identity());
        let page_size = self.page_size;
        let mut frame = self.frame_pool.lock_frame(frame_id);
        let loaded = self.with_disk_manager(&path, |dm| dm.read_page(index, page_size, &mut frame));
        if loaded.is_none() {
            frame.fill(0);
        }
    }

    /// §4.5 evict: write back if dirty, free the frame, unbind.
    fn evict(&self, page: &Page<T>) {
        if page.is_dirty() {
            if let Some(frame_id) = page.frame_id() {
                let (path, index) = self.backing_file(&page.identity());
                let page_size = self.page_size;
                let data = self.frame_pool.lock_frame(frame_id).to_vec();
                self.with_disk_manager(&path, |dm| dm.write_page(index, page_size, &data));
            }
            page.set_dirty(false);
        }
        if let Some(frame_id) = page.frame_id() {
            self.frame_pool.deallocate(frame_id);
        }
        page.unbind_frame();
    }

    /// §4.7 handle destruction.
    pub(crate) fn release(&self, page: &Page<T>) {
        if page.remove_ref() != 0 {
            return;
        }
        let identity = page.identity();
        if identity.is_anonymous() {
            // Nothing will ever read these bytes again: elide write-back
            // (spec.md §9's "Missing write-back on anonymous drop" note).
            if let Some(frame_id) = page.frame_id() {
                self.frame_pool.deallocate(frame_id);
                page.unbind_frame();
            }
            page.set_dirty(false);
            self.directory.lock().remove(&identity);
        } else if page.is_pinned() {
            page.set_pinned(false);
        }
    }

    /// §4.1 destructor contract: flush every buffered dirty page, then
    /// delete the temp file. Persistent `Page` records are simply dropped
    /// along with the directory.
    fn teardown(&self) {
        let directory = self.directory.lock();
        for page in directory.iter() {
            if page.is_buffered() && page.is_dirty() {
                if let Some(frame_id) = page.frame_id() {
                    let (path, index) = self.backing_file(&page.identity());
                    let page_size = self.page_size;
                    let data = self.frame_pool.lock_frame(frame_id).to_vec();
                    self.with_disk_manager(&path, |dm| dm.write_page(index, page_size, &data));
                }
            }
        }
        drop(directory);
        let _ = std::fs::remove_file(&self.temp_path);
    }
}

/// The page buffer manager (§4.1).
///
/// Mediates between fixed-size on-disk pages and a bounded pool of N
/// in-memory frames. Dropping a `BufferManager` flushes every dirty
/// resident page and deletes its temp file, regardless of whether any
/// `PageHandle` is still alive — callers that drop handles after the
/// manager itself are relying on undefined application behavior, exactly
/// as in the source this design is drawn from.
pub struct BufferManager<T: TableRef> {
    inner: Arc<BufferManagerInner<T>>,
}

impl<T: TableRef> BufferManager<T> {
    /// Eagerly allocates the frame pool and ensures the temp file can be
    /// opened or created.
    pub fn try_new(
        page_size: usize,
        num_pages: usize,
        temp_file: impl Into<PathBuf>,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(BufferManagerError::ZeroPageSize);
        }
        if num_pages == 0 {
            return Err(BufferManagerError::ZeroFrames);
        }
        let temp_path = temp_file.into();
        let temp_disk_manager = DiskManager::open(&temp_path).map_err(|source| {
            BufferManagerError::TempFileOpen {
                path: temp_path.clone(),
                source,
            }
        })?;
        let mut disk_managers = HashMap::new();
        disk_managers.insert(temp_path.clone(), temp_disk_manager);

        let inner = BufferManagerInner {
            page_size,
            temp_path,
            frame_pool: FramePool::new(page_size, num_pages),
            directory: Mutex::new(PageDirectory::new()),
            disk_managers: Mutex::new(disk_managers),
            next_anon_serial: AtomicU64::new(0),
            timestamp: AtomicU64::new(0),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    pub fn pool_size(&self) -> usize {
        self.inner.frame_pool.capacity()
    }

    /// Looks up `(table, index)`; creates an unbound `Page` on first
    /// request.
    pub fn get_page(&self, table: T, index: PageIndex) -> PageHandle<T> {
        self.inner.get_page(table, index, false)
    }

    /// Allocates a fresh anonymous identity backed by the temp file.
    pub fn get_anonymous_page(&self) -> PageHandle<T> {
        self.inner.get_anonymous_page(false)
    }

    /// As `get_page`, but the page becomes (or stays) pinned.
    pub fn get_pinned_page(&self, table: T, index: PageIndex) -> PageHandle<T> {
        self.inner.get_page(table, index, true)
    }

    /// As `get_anonymous_page`, but pinned.
    pub fn get_pinned_anonymous_page(&self) -> PageHandle<T> {
        self.inner.get_anonymous_page(true)
    }

    /// Clears the pinned flag on the page this handle refers to. A no-op
    /// if it's already unpinned (idempotent, spec.md §8 property 6).
    pub fn unpin(&self, handle: &PageHandle<T>) {
        self.inner.unpin(handle.page());
    }
}

impl<T: TableRef> Drop for BufferManager<T> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use tempdir::TempDir;

    use super::*;
    use crate::table::StaticTable;

    const PAGE_SIZE: usize = 1024;

    fn table_in(dir: &TempDir, name: &str) -> StaticTable {
        StaticTable::new(name, dir.path().join(format!("{name}.db")))
    }

    fn temp_path(dir: &TempDir) -> PathBuf {
        dir.path().join("scratch.tmp")
    }

    #[test]
    fn basic_round_trip() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        {
            let h = bpm.get_page(t.clone(), 0);
            let mut bytes = h.get_bytes().unwrap();
            bytes.fill(0xAB);
            h.wrote_bytes();
        }

        let h2 = bpm.get_page(t, 0);
        let bytes = h2.get_bytes().unwrap();
        assert!(bytes.iter().all(|&b| b == 0xAB));
    }

    /// Two distinct, already-resident pages' bytes must be holdable at the
    /// same time — e.g. to copy one page's contents into another — without
    /// the second `get_bytes()` blocking on the first.
    #[test]
    fn two_resident_pages_can_be_held_at_once() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let h0 = bpm.get_page(t.clone(), 0);
        h0.get_bytes().unwrap().fill(0x01);
        h0.wrote_bytes();
        let h1 = bpm.get_page(t, 1);
        h1.get_bytes().unwrap().fill(0x02);
        h1.wrote_bytes();

        let b0 = h0.get_bytes().unwrap();
        let b1 = h1.get_bytes().unwrap();
        assert!(b0.iter().all(|&b| b == 0x01));
        assert!(b1.iter().all(|&b| b == 0x02));
    }

    #[test]
    fn eviction_under_pressure_picks_oldest_timestamp() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 2, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let h0 = bpm.get_page(t.clone(), 0);
        h0.get_bytes().unwrap().fill(0x01);
        h0.wrote_bytes();
        let h1 = bpm.get_page(t.clone(), 1);
        h1.get_bytes().unwrap();
        let h2 = bpm.get_page(t.clone(), 2);
        h2.get_bytes().unwrap(); // should evict (t, 0), the oldest

        drop(h0);
        drop(h1);
        drop(h2);

        // (t, 0) must have been written back and must reload cleanly.
        let reloaded = bpm.get_page(t, 0);
        let bytes = reloaded.get_bytes().unwrap();
        assert!(bytes.iter().all(|&b| b == 0x01));
    }

    #[test]
    fn pin_blocks_eviction() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 2, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let pinned = bpm.get_pinned_page(t.clone(), 0);
        pinned.get_bytes().unwrap();
        let h1 = bpm.get_page(t.clone(), 1);
        h1.get_bytes().unwrap();
        let h2 = bpm.get_page(t.clone(), 2);
        h2.get_bytes().unwrap(); // must evict (t, 1), never the pinned page

        assert!(pinned.is_pinned());
        assert!(pinned.get_bytes().is_some());
    }

    #[test]
    fn all_pinned_fails_to_fetch() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 2, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let p0 = bpm.get_pinned_page(t.clone(), 0);
        p0.get_bytes().unwrap();
        let p1 = bpm.get_pinned_page(t.clone(), 1);
        p1.get_bytes().unwrap();

        let h2 = bpm.get_page(t, 2);
        assert!(h2.get_bytes().is_none());
    }

    #[test]
    fn anonymous_page_disappears_when_last_handle_drops() {
        let dir = TempDir::new("bufmgr").unwrap();
        // Single frame: if the anonymous page's frame weren't freed on
        // drop, a later fetch would have nothing left to evict (no other
        // page is resident) and `get_bytes` would fail.
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 1, temp_path(&dir)).unwrap();

        let h = bpm.get_anonymous_page();
        h.get_bytes().unwrap().fill(0x42);
        h.wrote_bytes();
        drop(h);

        let t = table_in(&dir, "t");
        let a = bpm.get_page(t, 0);
        assert!(a.get_bytes().is_some());
    }

    #[test]
    fn teardown_flushes_dirty_pages_even_with_a_live_handle() {
        let dir = TempDir::new("bufmgr").unwrap();
        let db_path = dir.path().join("t.db");
        let t = StaticTable::new("t", db_path.clone());

        let handle_outlives_manager;
        {
            let bpm: BufferManager<StaticTable> =
                BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
            let h = bpm.get_page(t.clone(), 0);
            h.get_bytes().unwrap().fill(0x99);
            h.wrote_bytes();
            handle_outlives_manager = h;
            // bpm drops here, while `h`'s refcount on its Page is still 1.
        }

        let bpm2: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
        let reloaded = bpm2.get_page(t, 0);
        let bytes = reloaded.get_bytes().unwrap();
        assert!(bytes.iter().all(|&b| b == 0x99));
        drop(handle_outlives_manager);
    }

    #[test]
    fn unpin_is_idempotent() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 2, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let h = bpm.get_pinned_page(t, 0);
        assert!(h.is_pinned());
        bpm.unpin(&h);
        assert!(!h.is_pinned());
        bpm.unpin(&h);
        bpm.unpin(&h);
        assert!(!h.is_pinned());
    }

    #[test]
    fn timestamps_strictly_increase_across_accesses() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let h0 = bpm.get_page(t.clone(), 0);
        h0.get_bytes().unwrap();
        let ts_after_first = bpm.inner.timestamp.load(Ordering::SeqCst);

        let h1 = bpm.get_page(t, 1);
        h1.get_bytes().unwrap();
        let ts_after_second = bpm.inner.timestamp.load(Ordering::SeqCst);

        assert!(ts_after_second > ts_after_first);
    }

    #[test]
    fn random_binary_data_survives_a_round_trip() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 4, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        let mut rng = rand::thread_rng();
        let dist = Uniform::from(0u8..=255);
        let pattern: Vec<u8> = (0..PAGE_SIZE).map(|_| dist.sample(&mut rng)).collect();

        let h = bpm.get_page(t.clone(), 7);
        h.get_bytes().unwrap().copy_from_slice(&pattern);
        h.wrote_bytes();
        drop(h);

        let h2 = bpm.get_page(t, 7);
        assert_eq!(&*h2.get_bytes().unwrap(), pattern.as_slice());
    }

    #[test]
    fn no_two_pages_ever_share_a_frame() {
        let dir = TempDir::new("bufmgr").unwrap();
        let bpm: BufferManager<StaticTable> =
            BufferManager::try_new(PAGE_SIZE, 3, temp_path(&dir)).unwrap();
        let t = table_in(&dir, "t");

        // Cycle far more pages through than there are frames, unpinned, so
        // eviction runs repeatedly; each access still succeeds and leaves
        // distinct bytes that a later access must still see intact.
        for i in 0..10i64 {
            let h = bpm.get_page(t.clone(), i);
            let mut bytes = h.get_bytes().expect("unpinned page must always be fetchable");
            bytes.fill(i as u8);
            h.wrote_bytes();
        }

        for i in 0..10i64 {
            let h = bpm.get_page(t.clone(), i);
            let bytes = h.get_bytes().unwrap();
            assert!(bytes.iter().all(|&b| b == i as u8));
        }
        assert_eq!(bpm.pool_size(), 3);
    }
}
