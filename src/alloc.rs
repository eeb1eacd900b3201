//! Inode and block allocation: bitmap scan, mark, and superblock counter
//! bookkeeping. Grow-only — there is no free path in the current core.

use crate::bitmap::{first_clear, set_bit};
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs::Filesystem;
use crate::layout::{BLOCK_COUNT, INODE_COUNT};

impl<D: BlockDevice> Filesystem<D> {
    /// Allocates the lowest free inode id, marks it used, and persists the
    /// superblock.
    pub(crate) fn alloc_inode(&mut self) -> Result<u32> {
        let sb = self.superblock_mut();
        // The bitmap is a packed field; work on an owned copy, then store it
        // back as a whole rather than indexing the field in place.
        let mut inode_map = sb.inode_map;
        let id = match first_clear(&inode_map, INODE_COUNT) {
            Some(id) => id,
            None => {
                log::warn!("alloc_inode: out of inodes");
                return Err(FsError::OutOfInodes);
            }
        };
        set_bit(&mut inode_map, id);
        sb.inode_map = inode_map;
        sb.free_inode_count -= 1;
        self.store_superblock()?;
        log::debug!("alloc_inode: picked inode {id}");
        Ok(id as u32)
    }

    /// Allocates `n` free blocks, marks them used, and persists the
    /// superblock once after all bits are flipped.
    pub(crate) fn alloc_blocks(&mut self, n: usize) -> Result<Vec<u32>> {
        let sb = self.superblock_mut();
        let free_block_count = sb.free_block_count;
        if free_block_count < n as i32 {
            log::warn!("alloc_blocks: requested {n}, only {free_block_count} free");
            return Err(FsError::OutOfSpace);
        }
        let mut block_map = sb.block_map;
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let id = match first_clear(&block_map, BLOCK_COUNT) {
                Some(id) => id,
                None => {
                    log::warn!("alloc_blocks: bitmap scan found no free block");
                    return Err(FsError::OutOfSpace);
                }
            };
            set_bit(&mut block_map, id);
            ids.push(id as u32);
        }
        sb.block_map = block_map;
        sb.free_block_count -= n as i32;
        self.store_superblock()?;
        log::debug!("alloc_blocks: picked {ids:?}");
        Ok(ids)
    }
}
