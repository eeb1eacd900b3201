//! Error type shared by every layer of the filesystem.

use std::fmt;
use std::io;
use thiserror::Error;

/// Every way a filesystem operation can fail.
#[derive(Debug, Error)]
pub enum FsError {
    /// A read or write against the underlying block device failed.
    #[error("device I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device does not carry a recognized superblock.
    #[error("medium is not formatted")]
    NotFormatted,

    /// Path resolution did not find the requested entry.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A create-class operation targeted a name that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The inode bitmap has no free bit left.
    #[error("out of inodes")]
    OutOfInodes,

    /// The block bitmap cannot satisfy the requested allocation.
    #[error("out of space")]
    OutOfSpace,

    /// A directory's block_point array has no free slot for a new child.
    #[error("directory is full: {0}")]
    DirFull(String),

    /// `cp` was asked to read a source that is not a regular file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// A path component exceeds the on-disk name field's capacity.
    #[error("name too long: {0}")]
    NameTooLong(String),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Builds a [`FsError::NotFound`] from anything path-like.
    pub fn not_found(path: impl fmt::Display) -> Self {
        Self::NotFound(path.to_string())
    }
}
