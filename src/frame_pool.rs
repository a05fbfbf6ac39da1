//! Fixed-size pool of page-sized buffers (§4.3).
//!
//! The pool owns bytes, not page identity. It never knows which `Page` is
//! bound to a given frame; that linkage lives on the `Page` itself.
//!
//! Each frame is behind its own lock so that holding one frame's bytes
//! never blocks access to another: two unrelated, already-resident pages
//! must be readable/writable at the same time (the teacher's
//! `Page(Arc<RwLock<PageInner>>)` gives each page its own lock for the same
//! reason). Allocation bookkeeping (the occupancy bitmap) is a separate,
//! short-lived lock that is never held during I/O.

use parking_lot::{Mutex, MutexGuard};

use crate::config::FrameId;

pub(crate) struct FramePool {
    frames: Vec<Mutex<Box<[u8]>>>,
    taken: Mutex<Vec<bool>>,
}

impl FramePool {
    pub fn new(page_size: usize, num_frames: usize) -> Self {
        Self {
            frames: (0..num_frames)
                .map(|_| Mutex::new(vec![0u8; page_size].into_boxed_slice()))
                .collect(),
            taken: Mutex::new(vec![false; num_frames]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn has_free(&self) -> bool {
        self.taken.lock().iter().any(|taken| !taken)
    }

    /// Returns the first free frame, marking it occupied. `None` if full.
    pub fn allocate(&self) -> Option<FrameId> {
        let mut taken = self.taken.lock();
        let idx = taken.iter().position(|taken| !taken)?;
        taken[idx] = true;
        Some(idx)
    }

    /// Marks a frame free again. A no-op if it was already free.
    pub fn deallocate(&self, frame_id: FrameId) {
        if let Some(slot) = self.taken.lock().get_mut(frame_id) {
            *slot = false;
        }
    }

    /// Locks and returns the bytes of a single frame, independent of every
    /// other frame's lock.
    pub fn lock_frame(&self, frame_id: FrameId) -> MutexGuard<'_, Box<[u8]>> {
        self.frames[frame_id].lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_deallocate() {
        let pool = FramePool::new(16, 2);
        assert!(pool.has_free());
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert!(!pool.has_free());
        assert!(pool.allocate().is_none());

        pool.deallocate(a);
        assert!(pool.has_free());
        let c = pool.allocate().unwrap();
        assert_eq!(a, c);

        pool.deallocate(b);
        pool.deallocate(c);
    }

    #[test]
    fn frames_are_independent() {
        let pool = FramePool::new(4, 2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        pool.lock_frame(a).copy_from_slice(&[1, 2, 3, 4]);
        pool.lock_frame(b).copy_from_slice(&[5, 6, 7, 8]);
        assert_eq!(&*pool.lock_frame(a), &[1, 2, 3, 4]);
        assert_eq!(&*pool.lock_frame(b), &[5, 6, 7, 8]);
    }

    #[test]
    fn two_frames_can_be_held_at_once_without_deadlock() {
        let pool = FramePool::new(4, 2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        let held_a = pool.lock_frame(a);
        let held_b = pool.lock_frame(b);
        assert_eq!(held_a.len(), 4);
        assert_eq!(held_b.len(), 4);
    }
}
