use crate::pool::{BufferPool, FileId, PageNum, PoolResult};

use super::header::FileHeader;

/// A per-open-file object: the file's pool identity plus the header view
/// parsed when the file was opened.
///
/// The header view is a snapshot. Mutations to page 0 go through normal
/// page operations on the pool and are not reflected here.
#[derive(Debug, Clone)]
pub struct FileHandle {
    id: FileId,
    header: FileHeader,
}

impl FileHandle {
    pub(crate) fn new(id: FileId, header: FileHeader) -> Self {
        Self { id, header }
    }

    /// The identity that drives pool operations for this file
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Page number of the file's first free page, `NO_PAGE` if none
    pub fn first_free_page(&self) -> PageNum {
        self.header.first_free_page
    }

    /// Total page count, header page included
    pub fn num_pages(&self) -> PageNum {
        self.header.num_pages
    }

    /// Flush and release this file's pages, then close the OS file.
    /// Forwards to [`BufferPool::close_file`].
    pub fn close(&self, pool: &mut BufferPool) -> PoolResult<()> {
        pool.close_file(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolError, NO_PAGE};

    #[test]
    fn test_open_parses_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parsed.db");
        let mut pool = BufferPool::with_capacity(4);
        pool.create_file(&path).unwrap();

        let handle = pool.open_file(&path).unwrap();
        assert_eq!(handle.first_free_page(), NO_PAGE);
        assert_eq!(handle.num_pages(), 1);
        assert_eq!(handle.header().num_pages, 1);

        handle.close(&mut pool).unwrap();
    }

    #[test]
    fn test_stale_handle_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.db");
        let mut pool = BufferPool::with_capacity(4);
        pool.create_file(&path).unwrap();

        let handle = pool.open_file(&path).unwrap();
        handle.close(&mut pool).unwrap();

        assert!(matches!(
            pool.close_file(&handle),
            Err(PoolError::FileNotOpen(_))
        ));
        assert!(matches!(
            pool.get_page(handle.id(), 1, false),
            Err(PoolError::FileNotOpen(_))
        ));
    }
}
