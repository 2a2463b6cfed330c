use std::io;
use thiserror::Error;

use super::FileId;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("File is not open: {0}")]
    FileNotOpen(FileId),

    #[error("The page is being used")]
    PageBusy,

    #[error("No available page in the buffer pool")]
    NoAvailablePage,

    #[error("The page is already in the buffer pool")]
    PageAlreadyInBuffer,

    #[error("The page is not in the buffer pool")]
    PageNotInBuffer,

    #[error("The page is not in use")]
    PageNotInUse,

    #[error("File handle limit reached")]
    TooManyOpenFiles,
}

pub type PoolResult<T> = Result<T, PoolError>;
