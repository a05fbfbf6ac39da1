//! Shared identifiers and defaults for the buffer manager.

/// Index of a frame within the [`FramePool`](crate::frame_pool::FramePool).
pub type FrameId = usize;

/// Index of a page within its owning table's backing file.
pub type PageIndex = i64;

/// Monotonic identifier handed out to anonymous (temporary) pages.
pub type AnonymousSerial = u64;

/// Page size used by callers who don't care to pick their own.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
