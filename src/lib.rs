//! A paged-file storage core: fixed-size disk pages cached in a
//! fixed-capacity in-memory buffer pool with LRU-with-pinning
//! replacement.
//!
//! Files are created, opened and closed through the [`BufferPool`].
//! Callers acquire a [`PageHandle`] for an individual page, read and
//! write the page bytes through the handle, call
//! [`BufferPool::mark_dirty`] after mutating, and give the handle back
//! with [`BufferPool::unpin_page`]. Dirty pages reach disk when they are
//! evicted, when their file's pages are released at close, or on an
//! explicit [`BufferPool::force_pages`].
//!
//! The pool is single-threaded and synchronous; see [`BufferPool`] for
//! the pinning contract.

pub mod file;
pub mod pool;

pub use file::{FileHandle, FileHeader};
pub use pool::{
    BufferPool, FileId, FrameIndex, PageBytes, PageHandle, PageNum, PoolError, PoolResult,
    SeekWhence, DEFAULT_POOL_SIZE, HEADER_PAGE_NUM, MAX_OPEN_FILES, NO_PAGE, PAGE_SIZE,
};
