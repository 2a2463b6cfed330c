use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::file::{FileHandle, FileHeader};

use super::error::{PoolError, PoolResult};
use super::frame::{Frame, PageHandle};
use super::{FileId, FrameIndex, PageNum, DEFAULT_POOL_SIZE, HEADER_PAGE_NUM, MAX_OPEN_FILES};

struct OpenFile {
    file: File,
    path: PathBuf,
}

/// Fixed-capacity cache of disk pages with LRU-with-pinning replacement.
///
/// The pool owns a fixed array of frames threaded through two intrusive
/// lists: a free list of unbound frames and a used list kept in
/// most-recently-touched-first order, with the tail as the eviction
/// candidate. A two-level index maps `(file, page)` to the resident
/// frame. Pinned frames are never evicted; when every frame is pinned,
/// acquisition fails immediately with `NoAvailablePage` rather than
/// blocking.
///
/// Files are created, opened and closed through the pool, which keeps the
/// OS files registered so it can write back any file's pages at eviction
/// time. All methods are synchronous and the pool is single-threaded
/// (`!Send`/`!Sync`); wrap it in a mutex externally if a higher layer
/// needs sharing.
pub struct BufferPool {
    frames: Vec<Frame>,
    /// (file, page) -> frame, for resident pages only. Inner and outer
    /// maps never keep empty entries.
    index: HashMap<FileId, HashMap<PageNum, FrameIndex>>,
    /// Most recently touched frame
    head_used: Option<FrameIndex>,
    /// Least recently touched frame, first eviction candidate
    tail_used: Option<FrameIndex>,
    head_free: Option<FrameIndex>,
    files: HashMap<FileId, OpenFile>,
    next_file_id: u64,
    max_open_files: usize,
}

impl BufferPool {
    /// Create a pool with [`DEFAULT_POOL_SIZE`] frames
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_SIZE)
    }

    /// Create a pool with the given number of frames. A zero-frame pool
    /// is valid; every page acquisition on it fails with
    /// `NoAvailablePage`.
    pub fn with_capacity(num_frames: usize) -> Self {
        Self::with_limits(num_frames, MAX_OPEN_FILES)
    }

    /// Create a pool with explicit frame and open-file limits
    pub fn with_limits(num_frames: usize, max_open_files: usize) -> Self {
        let mut frames: Vec<Frame> = (0..num_frames).map(Frame::new).collect();
        for i in 0..num_frames {
            frames[i].prev = i.checked_sub(1);
            frames[i].next = if i + 1 < num_frames { Some(i + 1) } else { None };
        }
        Self {
            frames,
            index: HashMap::new(),
            head_used: None,
            tail_used: None,
            head_free: if num_frames > 0 { Some(0) } else { None },
            files: HashMap::new(),
            next_file_id: 0,
            max_open_files,
        }
    }

    // -----------------------------------------------------------------
    // Page-level operations
    // -----------------------------------------------------------------

    /// Acquire a handle to page `num` of `file`, reading it from disk if
    /// it is not already resident. Touches the page (moves it to the MRU
    /// end of the used list).
    ///
    /// With `unique` set, acquisition fails with `PageBusy` while any
    /// other handle is outstanding for the page.
    pub fn get_page(&mut self, file: FileId, num: PageNum, unique: bool) -> PoolResult<PageHandle> {
        if let Some(fi) = self.lookup(file, num) {
            if unique && self.frames[fi].pinned > 0 {
                return Err(PoolError::PageBusy);
            }
            self.move_to_head_used(fi);
            return Ok(self.frames[fi].new_handle());
        }

        let fi = self.find_victim()?;
        self.frames[fi].bind(file, num);
        if let Err(e) = self.read_into(fi, file) {
            // The victim was detached by find_victim; put it back on the
            // free list so every frame stays on exactly one list.
            self.frames[fi].unbind();
            self.make_head_free(fi);
            return Err(e);
        }
        self.attach(fi, file, num);
        Ok(self.frames[fi].new_handle())
    }

    /// Acquire a handle to a page the caller is about to initialise,
    /// without reading anything from disk. The buffer starts zeroed.
    ///
    /// The frame is NOT marked dirty: a caller that fills the page but
    /// forgets `mark_dirty` before unpinning loses the page image at
    /// eviction, and the on-disk page stays whatever it was.
    pub fn allocate_page(&mut self, file: FileId, num: PageNum) -> PoolResult<PageHandle> {
        if self.lookup(file, num).is_some() {
            return Err(PoolError::PageAlreadyInBuffer);
        }
        let fi = self.find_victim()?;
        if !self.files.contains_key(&file) {
            self.frames[fi].unbind();
            self.make_head_free(fi);
            return Err(PoolError::FileNotOpen(file));
        }
        self.frames[fi].bind(file, num);
        self.attach(fi, file, num);
        Ok(self.frames[fi].new_handle())
    }

    /// Mark a resident page dirty so the pool writes it back before
    /// eviction. Touches the page. Idempotent.
    pub fn mark_dirty(&mut self, file: FileId, num: PageNum) -> PoolResult<()> {
        let fi = self.lookup(file, num).ok_or(PoolError::PageNotInBuffer)?;
        if self.frames[fi].pinned == 0 {
            return Err(PoolError::PageNotInUse);
        }
        self.frames[fi].dirty = true;
        self.move_to_head_used(fi);
        Ok(())
    }

    /// Give back one pin. Not idempotent: each call decrements the pin
    /// count by one. The page's LRU position is unchanged.
    pub fn unpin_page(&mut self, file: FileId, num: PageNum) -> PoolResult<()> {
        let fi = self.lookup(file, num).ok_or(PoolError::PageNotInBuffer)?;
        if self.frames[fi].pinned == 0 {
            return Err(PoolError::PageNotInUse);
        }
        self.frames[fi].pinned -= 1;
        Ok(())
    }

    /// Flush and evict every resident page of `file`.
    ///
    /// Fails with `PageBusy` before touching anything if any of the
    /// file's pages is still pinned. If a writeback fails mid-sweep,
    /// frames already released stay released and the failing frame stays
    /// resident and dirty.
    pub fn release_pages(&mut self, file: FileId) -> PoolResult<()> {
        let mut resident: Vec<FrameIndex> = match self.index.get(&file) {
            Some(pages) => pages.values().copied().collect(),
            None => return Ok(()),
        };
        if resident.iter().any(|&fi| self.frames[fi].pinned > 0) {
            return Err(PoolError::PageBusy);
        }
        // Sweep in page order so partial failures are deterministic
        resident.sort_by_key(|&fi| self.frames[fi].page_num);
        for fi in resident {
            if self.frames[fi].dirty {
                self.write_back(fi, file)?;
            }
            self.evict(fi);
        }
        Ok(())
    }

    /// Write back every dirty resident page of `file` without evicting
    /// anything. LRU order is untouched.
    pub fn force_pages(&mut self, file: FileId) -> PoolResult<()> {
        let mut resident: Vec<FrameIndex> = match self.index.get(&file) {
            Some(pages) => pages.values().copied().collect(),
            None => return Ok(()),
        };
        resident.sort_by_key(|&fi| self.frames[fi].page_num);
        for fi in resident {
            if self.frames[fi].dirty {
                self.write_back(fi, file)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // File-level operations
    // -----------------------------------------------------------------

    /// Create a new file at `path` and write a fresh header page.
    /// Fails if the file already exists.
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> PoolResult<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(PoolError::FileAlreadyExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&FileHeader::new().to_page())?;
        debug!("created {}", path.display());
        Ok(())
    }

    /// Remove a file from the filesystem. Open handles to it are not
    /// tracked; destroying a file that is still open is the caller's
    /// mistake.
    pub fn destroy_file<P: AsRef<Path>>(&mut self, path: P) -> PoolResult<()> {
        std::fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// Open an existing file and read its header page through the pool.
    /// Each open yields a distinct [`FileId`], even for the same path.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> PoolResult<FileHandle> {
        let path = path.as_ref();
        if self.files.len() >= self.max_open_files {
            return Err(PoolError::TooManyOpenFiles);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => PoolError::FileNotFound(path.display().to_string()),
                _ => PoolError::Io(e),
            })?;

        let id = FileId(self.next_file_id);
        self.next_file_id += 1;
        self.files.insert(
            id,
            OpenFile {
                file,
                path: path.to_path_buf(),
            },
        );

        let header = match self.read_header(id) {
            Ok(header) => header,
            Err(e) => {
                self.files.remove(&id);
                return Err(e);
            }
        };
        debug!("opened {} as file {}", path.display(), id);
        Ok(FileHandle::new(id, header))
    }

    /// Flush and release the file's pages, then close the OS file.
    ///
    /// Fails with `PageBusy` if any of the file's pages is still pinned;
    /// the file stays open in that case.
    pub fn close_file(&mut self, handle: &FileHandle) -> PoolResult<()> {
        let id = handle.id();
        if !self.files.contains_key(&id) {
            return Err(PoolError::FileNotOpen(id));
        }
        self.release_pages(id)?;
        if let Some(entry) = self.files.remove(&id) {
            debug!("closed {} (file {})", entry.path.display(), id);
        }
        Ok(())
    }

    /// Flush the OS file's data buffers to stable storage
    pub fn sync_file(&mut self, handle: &FileHandle) -> PoolResult<()> {
        let id = handle.id();
        let entry = self.files.get_mut(&id).ok_or(PoolError::FileNotOpen(id))?;
        entry.file.sync_data()?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Number of frames in the pool
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames currently caching a page
    pub fn used_count(&self) -> usize {
        self.index.values().map(|pages| pages.len()).sum()
    }

    /// Number of frames on the free list
    pub fn free_count(&self) -> usize {
        self.frames.len() - self.used_count()
    }

    /// Number of resident pages with unflushed modifications
    pub fn dirty_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.file.is_some() && f.dirty)
            .count()
    }

    /// Whether a page is resident
    pub fn contains(&self, file: FileId, num: PageNum) -> bool {
        self.lookup(file, num).is_some()
    }

    /// Number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }

    // -----------------------------------------------------------------
    // Victim selection
    // -----------------------------------------------------------------

    /// Find a frame to reuse, detached from both lists and the index.
    ///
    /// Prefers the free-list head (no I/O); otherwise scans the used list
    /// from the LRU end for an unpinned frame, writing it back first when
    /// dirty. On writeback failure nothing is modified and the victim
    /// stays resident and dirty. The caller either binds-and-promotes the
    /// returned frame or restores it to the free list.
    fn find_victim(&mut self) -> PoolResult<FrameIndex> {
        if let Some(fi) = self.head_free {
            self.remove_free(fi);
            return Ok(fi);
        }

        let mut pos = self.tail_used;
        let victim = loop {
            match pos {
                Some(fi) if self.frames[fi].pinned == 0 => break fi,
                Some(fi) => pos = self.frames[fi].prev,
                None => return Err(PoolError::NoAvailablePage),
            }
        };

        if self.frames[victim].dirty {
            let owner = self.frames[victim]
                .file
                .ok_or(PoolError::PageNotInBuffer)?;
            self.write_back(victim, owner)?;
        }
        debug!(
            "evicting frame {} (file {:?}, page {})",
            self.frames[victim].frame_index, self.frames[victim].file, self.frames[victim].page_num
        );
        self.unindex(victim);
        self.remove_used(victim);
        Ok(victim)
    }

    // -----------------------------------------------------------------
    // Disk transfer helpers
    // -----------------------------------------------------------------

    fn read_into(&mut self, fi: FrameIndex, file_id: FileId) -> PoolResult<()> {
        let entry = self
            .files
            .get_mut(&file_id)
            .ok_or(PoolError::FileNotOpen(file_id))?;
        self.frames[fi].read_from_disk(&mut entry.file)?;
        Ok(())
    }

    fn write_back(&mut self, fi: FrameIndex, file_id: FileId) -> PoolResult<()> {
        let entry = self
            .files
            .get_mut(&file_id)
            .ok_or(PoolError::FileNotOpen(file_id))?;
        trace!(
            "writing back file {} page {}",
            file_id,
            self.frames[fi].page_num
        );
        self.frames[fi].write_to_disk(&mut entry.file)?;
        Ok(())
    }

    /// Pin the header page, parse it, unpin
    fn read_header(&mut self, id: FileId) -> PoolResult<FileHeader> {
        let page = self.get_page(id, HEADER_PAGE_NUM, false)?;
        let header = FileHeader::read_from(&page.bytes());
        self.unpin_page(id, HEADER_PAGE_NUM)?;
        Ok(header)
    }

    // -----------------------------------------------------------------
    // Index maintenance
    // -----------------------------------------------------------------

    fn lookup(&self, file: FileId, num: PageNum) -> Option<FrameIndex> {
        self.index.get(&file).and_then(|pages| pages.get(&num)).copied()
    }

    /// Index a freshly bound frame and put it at the head of the used list
    fn attach(&mut self, fi: FrameIndex, file: FileId, num: PageNum) {
        self.index.entry(file).or_default().insert(num, fi);
        self.make_head_used(fi);
    }

    /// Remove a frame's index entry, dropping the file's inner map when it
    /// empties so no shell is left behind
    fn unindex(&mut self, fi: FrameIndex) {
        if let Some(file) = self.frames[fi].file {
            if let Some(pages) = self.index.get_mut(&file) {
                pages.remove(&self.frames[fi].page_num);
                if pages.is_empty() {
                    self.index.remove(&file);
                }
            }
        }
    }

    /// Return a used frame to the free list, removing it from the index
    /// and the used list
    fn evict(&mut self, fi: FrameIndex) {
        self.unindex(fi);
        self.remove_used(fi);
        self.frames[fi].unbind();
        self.make_head_free(fi);
    }

    // -----------------------------------------------------------------
    // List surgery. All links are frame-array indices; a frame passed to
    // a make_* helper must be detached, one passed to a remove_* helper
    // must be on that list.
    // -----------------------------------------------------------------

    fn make_head_used(&mut self, fi: FrameIndex) {
        self.frames[fi].next = self.head_used;
        if let Some(old) = self.head_used {
            self.frames[old].prev = Some(fi);
        }
        self.frames[fi].prev = None;
        if self.tail_used.is_none() {
            self.tail_used = Some(fi);
        }
        self.head_used = Some(fi);
    }

    fn make_head_free(&mut self, fi: FrameIndex) {
        self.frames[fi].next = self.head_free;
        if let Some(old) = self.head_free {
            self.frames[old].prev = Some(fi);
        }
        self.frames[fi].prev = None;
        self.head_free = Some(fi);
    }

    fn remove_used(&mut self, fi: FrameIndex) {
        if self.head_used == Some(fi) {
            self.head_used = self.frames[fi].next;
        }
        if self.tail_used == Some(fi) {
            self.tail_used = self.frames[fi].prev;
        }
        let next = self.frames[fi].next.take();
        let prev = self.frames[fi].prev.take();
        if let Some(n) = next {
            self.frames[n].prev = prev;
        }
        if let Some(p) = prev {
            self.frames[p].next = next;
        }
    }

    fn remove_free(&mut self, fi: FrameIndex) {
        if self.head_free == Some(fi) {
            self.head_free = self.frames[fi].next;
        }
        let next = self.frames[fi].next.take();
        let prev = self.frames[fi].prev.take();
        if let Some(n) = next {
            self.frames[n].prev = prev;
        }
        if let Some(p) = prev {
            self.frames[p].next = next;
        }
    }

    fn move_to_head_used(&mut self, fi: FrameIndex) {
        self.remove_used(fi);
        self.make_head_used(fi);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("num_frames", &self.frames.len())
            .field("used", &self.used_count())
            .field("free", &self.free_count())
            .field("dirty", &self.dirty_count())
            .field("open_files", &self.files.len())
            .finish()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Best-effort flush of anything still dirty
        let open: Vec<FileId> = self.files.keys().copied().collect();
        for id in open {
            let _ = self.force_pages(id);
        }
    }
}
