//! The block device contract and its two implementations.
//!
//! The filesystem never touches a [`File`] or a [`Vec`] directly; it only
//! ever goes through the four operations below, the way a real device
//! driver would be addressed from above.

use crate::error::{FsError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size in bytes of one device sector.
pub const SECTOR_SIZE: usize = 512;

/// Total number of sectors on the medium.
pub const SECTOR_COUNT: u32 = 8192;

/// Total size in bytes of the medium.
pub const DEVICE_SIZE: u64 = SECTOR_SIZE as u64 * SECTOR_COUNT as u64;

/// A raw sector-addressed storage medium.
///
/// Implementors need not buffer anything beyond what a single call requires;
/// the filesystem layer above is the only cache.
pub trait BlockDevice {
    /// Prepares the device for use. Idempotent.
    fn open(&mut self) -> Result<()>;

    /// Releases the device. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Reads sector `idx` into `buf`.
    fn read_sector(&mut self, idx: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()>;

    /// Writes `buf` to sector `idx`.
    fn write_sector(&mut self, idx: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()>;
}

fn check_idx(idx: u32) -> Result<()> {
    if idx >= SECTOR_COUNT {
        return Err(FsError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("sector {idx} out of range"),
        )));
    }
    Ok(())
}

/// A device backed by a flat image file on a real filesystem.
pub struct FileBlockDevice {
    path: std::path::PathBuf,
    file: Option<File>,
}

impl FileBlockDevice {
    /// Creates a device bound to `path`. The file is created and sized to
    /// exactly [`DEVICE_SIZE`] bytes if it does not already exist.
    pub fn create_or_open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        if !existed {
            file.set_len(DEVICE_SIZE)?;
        }
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// The path backing this device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileBlockDevice {
    fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync_all()?;
        }
        self.file = None;
        Ok(())
    }

    fn read_sector(&mut self, idx: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        check_idx(idx)?;
        let file = self.file.as_mut().ok_or(FsError::NotFormatted)?;
        file.seek(SeekFrom::Start(idx as u64 * SECTOR_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_sector(&mut self, idx: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()> {
        check_idx(idx)?;
        let file = self.file.as_mut().ok_or(FsError::NotFormatted)?;
        file.seek(SeekFrom::Start(idx as u64 * SECTOR_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }
}

/// An in-memory device, used by tests so invariant checks never touch disk.
pub struct MemBlockDevice {
    data: Vec<u8>,
    open: bool,
}

impl MemBlockDevice {
    /// Creates a zeroed in-memory medium of exactly [`DEVICE_SIZE`] bytes.
    pub fn new() -> Self {
        Self {
            data: vec![0u8; DEVICE_SIZE as usize],
            open: false,
        }
    }
}

impl Default for MemBlockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for MemBlockDevice {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn read_sector(&mut self, idx: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        check_idx(idx)?;
        let off = idx as usize * SECTOR_SIZE;
        buf.copy_from_slice(&self.data[off..off + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&mut self, idx: u32, buf: &[u8; SECTOR_SIZE]) -> Result<()> {
        check_idx(idx)?;
        let off = idx as usize * SECTOR_SIZE;
        self.data[off..off + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
