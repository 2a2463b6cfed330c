use std::cell::{Ref, RefCell, RefMut};
use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::rc::Rc;

use super::bytes::{PageBytes, SeekWhence};
use super::{FileId, FrameIndex, PageNum, PAGE_SIZE};

/// A slot in the buffer pool: one page's bytes plus its bookkeeping.
///
/// Frames are constructed once at pool creation and never deallocated;
/// they move between the pool's free and used lists via the `prev`/`next`
/// link fields, which index into the pool's frame array.
pub(crate) struct Frame {
    pub(crate) buffer: Rc<RefCell<PageBytes>>,
    pub(crate) frame_index: FrameIndex,
    pub(crate) file: Option<FileId>,
    /// Meaningful only while `file` is set
    pub(crate) page_num: PageNum,
    pub(crate) dirty: bool,
    pub(crate) pinned: u32,
    pub(crate) prev: Option<FrameIndex>,
    pub(crate) next: Option<FrameIndex>,
}

impl Frame {
    pub(crate) fn new(frame_index: FrameIndex) -> Self {
        Self {
            buffer: Rc::new(RefCell::new(PageBytes::new(PAGE_SIZE))),
            frame_index,
            file: None,
            page_num: 0,
            dirty: false,
            pinned: 0,
            prev: None,
            next: None,
        }
    }

    /// Point the frame at a new (file, page) identity, resetting its pin
    /// count and dirty flag and zeroing the buffer. The caller must have
    /// already detached the frame from any indexing.
    pub(crate) fn bind(&mut self, file: FileId, page_num: PageNum) {
        self.file = Some(file);
        self.page_num = page_num;
        self.pinned = 0;
        self.dirty = false;
        self.buffer.borrow_mut().clear();
    }

    /// Drop the file identity when the frame returns to the free list.
    /// The buffer may keep stale bytes; `bind` clears them on reuse.
    pub(crate) fn unbind(&mut self) {
        self.file = None;
    }

    /// Byte offset of this frame's page within its file
    fn disk_offset(&self) -> io::Result<u64> {
        u64::try_from(self.page_num as i64 * PAGE_SIZE as i64).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "negative page number")
        })
    }

    /// Stream the page's on-disk bytes into the buffer. A short read (page
    /// past the end of the file) leaves the zeroed tail from `bind`.
    pub(crate) fn read_from_disk(&mut self, file: &mut File) -> io::Result<()> {
        let offset = self.disk_offset()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = self.buffer.borrow_mut();
        buf.seek(SeekWhence::Start, 0)?;
        buf.fill_from(file)?;
        Ok(())
    }

    /// Stream the buffer to the page's on-disk location; clears the dirty
    /// flag on success.
    pub(crate) fn write_to_disk(&mut self, file: &mut File) -> io::Result<()> {
        let offset = self.disk_offset()?;
        file.seek(SeekFrom::Start(offset))?;
        {
            let mut buf = self.buffer.borrow_mut();
            buf.seek(SeekWhence::Start, 0)?;
            buf.spill_to(file)?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Add one pin and hand out a handle to the buffer.
    pub(crate) fn new_handle(&mut self) -> PageHandle {
        self.pinned += 1;
        PageHandle {
            buffer: Rc::clone(&self.buffer),
            file: self.file.expect("handle requested for an unbound frame"),
            page_num: self.page_num,
        }
    }
}

/// Caller-facing handle to a resident page.
///
/// Each handle holds one unit of the page's pin count, which keeps the
/// page resident. The pool does not track handles individually: pair
/// every handle with exactly one `unpin_page` call for its
/// `(file, page_num)`, and call `mark_dirty` before unpinning if the page
/// was mutated. A handle that is dropped without unpinning leaks its pin,
/// which eventually surfaces as `NoAvailablePage`.
///
/// Several handles may coexist for the same resident page and all see the
/// same bytes. Do not hold a [`bytes`]/[`bytes_mut`] borrow across a call
/// into the pool.
///
/// [`bytes`]: PageHandle::bytes
/// [`bytes_mut`]: PageHandle::bytes_mut
pub struct PageHandle {
    buffer: Rc<RefCell<PageBytes>>,
    file: FileId,
    page_num: PageNum,
}

impl PageHandle {
    /// Read access to the page bytes
    pub fn bytes(&self) -> Ref<'_, PageBytes> {
        self.buffer.borrow()
    }

    /// Write access to the page bytes
    pub fn bytes_mut(&self) -> RefMut<'_, PageBytes> {
        self.buffer.borrow_mut()
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }
}
