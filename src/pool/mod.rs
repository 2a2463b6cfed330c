mod bytes;
mod error;
mod frame;
mod pool;

pub use bytes::{PageBytes, SeekWhence};
pub use error::{PoolError, PoolResult};
pub use frame::PageHandle;
pub use pool::BufferPool;

use std::fmt;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Default maximum number of simultaneously open files
pub const MAX_OPEN_FILES: usize = 128;

/// Page number within a file; the header always lives on page 0
pub type PageNum = i32;

/// Sentinel page number meaning "no such page"
pub const NO_PAGE: PageNum = -1;

/// Page number of the file header page
pub const HEADER_PAGE_NUM: PageNum = 0;

/// A frame's slot in the pool's frame array
pub type FrameIndex = usize;

/// Identity of one open file within a pool.
///
/// Assigned when the file is opened and stable until it is closed. Two
/// opens of the same path yield distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub(crate) u64);

impl FileId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
