//! The `Filesystem` handle: sector codec, inode table, directory block codec,
//! and the top-level operations (`init`, `ls`, `mkdir`, `touch`, `cp`,
//! `shutdown`) that orchestrate them.

use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::error::{FsError, Result};
use crate::layout::{
    as_bytes, as_bytes_mut, DirItem, Inode, Superblock, BLOCK_SIZE, DIR_ITEMS_EACH_BLOCK,
    FILE_TYPE_FILE, FILE_TYPE_FOLDER, INODES_PER_BLOCK, ROOT_DIR_BLOCK, ROOT_INODE,
};
use crate::resolve::TerminalExpect;
use std::mem::size_of;

/// Owns the device and the cached superblock; every mutating call flushes
/// whatever it touched before returning.
pub struct Filesystem<D: BlockDevice> {
    device: D,
    superblock: Superblock,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Wraps `device`, loading its superblock if the medium is already
    /// formatted (a fresh/garbage medium gets a zeroed placeholder that
    /// [`Filesystem::init`] will overwrite).
    pub fn open(mut device: D) -> Result<Self> {
        device.open()?;
        let mut fs = Self {
            device,
            superblock: unsafe { std::mem::zeroed() },
        };
        if let Ok(sb) = fs.read_block(0) {
            fs.superblock = unsafe {
                let mut sb_val: Superblock = std::mem::zeroed();
                as_bytes_mut(&mut sb_val).copy_from_slice(&sb[..size_of::<Superblock>()]);
                sb_val
            };
        }
        Ok(fs)
    }

    // ---- sector codec ----------------------------------------------------

    /// Reads logical block `b` by issuing its two underlying sector reads.
    fn read_block(&mut self, b: u32) -> Result<[u8; BLOCK_SIZE]> {
        let mut buf = [0u8; BLOCK_SIZE];
        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(2 * b, &mut sector)?;
        buf[..SECTOR_SIZE].copy_from_slice(&sector);
        self.device.read_sector(2 * b + 1, &mut sector)?;
        buf[SECTOR_SIZE..].copy_from_slice(&sector);
        Ok(buf)
    }

    /// Writes logical block `b` as its two underlying sectors.
    fn write_block(&mut self, b: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        sector.copy_from_slice(&buf[..SECTOR_SIZE]);
        self.device.write_sector(2 * b, &sector)?;
        sector.copy_from_slice(&buf[SECTOR_SIZE..]);
        self.device.write_sector(2 * b + 1, &sector)?;
        Ok(())
    }

    pub(crate) fn store_superblock(&mut self) -> Result<()> {
        let mut buf = [0u8; BLOCK_SIZE];
        let sb_bytes = unsafe { as_bytes(&self.superblock) };
        buf[..sb_bytes.len()].copy_from_slice(sb_bytes);
        self.write_block(0, &buf)
    }

    pub(crate) fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Returns a copy of the current superblock image, for tests and
    /// diagnostics that need to inspect bitmap/counter state directly.
    pub fn superblock_snapshot(&self) -> Superblock {
        self.superblock
    }

    pub(crate) fn superblock_mut(&mut self) -> &mut Superblock {
        &mut self.superblock
    }

    // ---- inode table ------------------------------------------------------

    pub(crate) fn read_inode(&mut self, id: u32) -> Result<Inode> {
        let block = 1 + id / INODES_PER_BLOCK as u32;
        let slot = id as usize % INODES_PER_BLOCK;
        let buf = self.read_block(block)?;
        let off = slot * size_of::<Inode>();
        let mut inode: Inode = Inode::empty();
        unsafe {
            as_bytes_mut(&mut inode).copy_from_slice(&buf[off..off + size_of::<Inode>()]);
        }
        Ok(inode)
    }

    pub(crate) fn write_inode(&mut self, id: u32, inode: &Inode) -> Result<()> {
        let block = 1 + id / INODES_PER_BLOCK as u32;
        let slot = id as usize % INODES_PER_BLOCK;
        let mut buf = self.read_block(block)?;
        let off = slot * size_of::<Inode>();
        let bytes = unsafe { as_bytes(inode) };
        buf[off..off + bytes.len()].copy_from_slice(bytes);
        self.write_block(block, &buf)
    }

    // ---- directory block codec --------------------------------------------

    pub(crate) fn read_dir_block(&mut self, b: u32) -> Result<[DirItem; DIR_ITEMS_EACH_BLOCK]> {
        let buf = self.read_block(b)?;
        let mut items = [DirItem::empty(); DIR_ITEMS_EACH_BLOCK];
        for (i, item) in items.iter_mut().enumerate() {
            let off = i * size_of::<DirItem>();
            unsafe {
                as_bytes_mut(item).copy_from_slice(&buf[off..off + size_of::<DirItem>()]);
            }
        }
        Ok(items)
    }

    pub(crate) fn write_dir_block(
        &mut self,
        b: u32,
        items: &[DirItem; DIR_ITEMS_EACH_BLOCK],
    ) -> Result<()> {
        let mut buf = [0u8; BLOCK_SIZE];
        for (i, item) in items.iter().enumerate() {
            let off = i * size_of::<DirItem>();
            let bytes = unsafe { as_bytes(item) };
            buf[off..off + bytes.len()].copy_from_slice(bytes);
        }
        self.write_block(b, &buf)
    }

    // ---- operations ---------------------------------------------------------

    /// Formats the medium if it isn't already, otherwise leaves it untouched.
    pub fn init(&mut self) -> Result<()> {
        if self.superblock.is_formatted() {
            log::info!("medium already formatted, skipping init");
            return Ok(());
        }
        self.superblock = Superblock::formatted();
        self.store_superblock()?;

        let root = Inode {
            size: 1,
            file_type: FILE_TYPE_FOLDER,
            link: 0,
            block_point: [ROOT_DIR_BLOCK, 0, 0, 0, 0, 0],
        };
        self.write_inode(ROOT_INODE, &root)?;

        let mut entries = [DirItem::empty(); DIR_ITEMS_EACH_BLOCK];
        entries[0] = DirItem::new(ROOT_INODE, FILE_TYPE_FOLDER, ".");
        self.write_dir_block(ROOT_DIR_BLOCK, &entries)?;

        log::info!("formatted fresh filesystem");
        Ok(())
    }

    /// Lists the entries of the folder at `path`, including `.` and `..`.
    pub fn ls(&mut self, path: &str) -> Result<Vec<(String, u16)>> {
        match self.ls_inner(path) {
            Ok(out) => {
                log::info!("ls {path}: {} entries", out.len());
                Ok(out)
            }
            Err(e) => {
                log::warn!("ls {path}: {e}");
                Err(e)
            }
        }
    }

    fn ls_inner(&mut self, path: &str) -> Result<Vec<(String, u16)>> {
        let (inode_id, _) = self.resolve(path, TerminalExpect::Dir)?;
        let inode = self.read_inode(inode_id)?;
        let size = inode.size;
        let block_point = inode.block_point;
        let mut out = vec![
            (".".to_string(), FILE_TYPE_FOLDER),
            ("..".to_string(), FILE_TYPE_FOLDER),
        ];
        // Slot 0 of block_point is reserved (see create_entry); children
        // start at slot 1, so size counts the reservation itself.
        for k in 1..size as usize {
            if k >= block_point.len() {
                break;
            }
            let b = block_point[k];
            if b == 0 {
                continue;
            }
            let entries = self.read_dir_block(b)?;
            for item in entries.iter() {
                let name = item.name_str();
                if item.is_valid() && !name.is_empty() {
                    let item_type = item.type_;
                    out.push((name, item_type as u16));
                }
            }
        }
        Ok(out)
    }

    /// Creates a new folder at `path`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        match self.mkdir_inner(path) {
            Ok(new_id) => {
                log::info!("mkdir {path}: inode {new_id}");
                Ok(())
            }
            Err(e) => {
                log::warn!("mkdir {path}: {e}");
                Err(e)
            }
        }
    }

    fn mkdir_inner(&mut self, path: &str) -> Result<u32> {
        if self.resolve(path, TerminalExpect::Dir).is_ok() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let new_id = self.create_entry(path, FILE_TYPE_FOLDER)?;
        let inode = Inode {
            size: 1,
            file_type: FILE_TYPE_FOLDER,
            link: 1,
            block_point: [0; 6],
        };
        self.write_inode(new_id, &inode)?;
        Ok(new_id)
    }

    /// Creates a new, empty regular file at `path`.
    pub fn touch(&mut self, path: &str) -> Result<()> {
        match self.touch_inner(path) {
            Ok(new_id) => {
                log::info!("touch {path}: inode {new_id}");
                Ok(())
            }
            Err(e) => {
                log::warn!("touch {path}: {e}");
                Err(e)
            }
        }
    }

    fn touch_inner(&mut self, path: &str) -> Result<u32> {
        if self.resolve(path, TerminalExpect::File).is_ok() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let new_id = self.create_entry(path, FILE_TYPE_FILE)?;
        let inode = Inode {
            size: 1,
            file_type: FILE_TYPE_FILE,
            link: 1,
            block_point: [0; 6],
        };
        self.write_inode(new_id, &inode)?;
        Ok(new_id)
    }

    /// Copies the content of file `src` into a (possibly newly created) file
    /// `dest`.
    pub fn cp(&mut self, dest: &str, src: &str) -> Result<()> {
        match self.cp_inner(dest, src) {
            Ok((dest_id, src_id)) => {
                log::info!("cp {dest} <- {src}: inode {dest_id} <- {src_id}");
                Ok(())
            }
            Err(e) => {
                log::warn!("cp {dest} <- {src}: {e}");
                Err(e)
            }
        }
    }

    fn cp_inner(&mut self, dest: &str, src: &str) -> Result<(u32, u32)> {
        let (src_id, _) = self.resolve(src, TerminalExpect::File)?;
        let src_inode = self.read_inode(src_id)?;
        let src_file_type = src_inode.file_type;
        if src_file_type != FILE_TYPE_FILE {
            return Err(FsError::NotAFile(src.to_string()));
        }
        let src_block_point = src_inode.block_point;

        let dest_id = match self.resolve(dest, TerminalExpect::File) {
            Ok((id, _)) => id,
            Err(_) => {
                self.touch(dest)?;
                self.resolve(dest, TerminalExpect::File)?.0
            }
        };

        let mut dest_inode = self.read_inode(dest_id)?;
        dest_inode.size = src_inode.size;
        dest_inode.link = src_inode.link;
        dest_inode.file_type = src_file_type;
        let mut dest_block_point = [0u32; 6];
        for (i, &src_block) in src_block_point.iter().enumerate() {
            if src_block == 0 {
                continue;
            }
            let data = self.read_block(src_block)?;
            let new_block = self.alloc_blocks(1)?[0];
            self.write_block(new_block, &data)?;
            dest_block_point[i] = new_block;
        }
        dest_inode.block_point = dest_block_point;
        self.write_inode(dest_id, &dest_inode)?;
        Ok((dest_id, src_id))
    }

    /// Closes the underlying device.
    pub fn shutdown(&mut self) -> Result<()> {
        self.device.close()?;
        log::info!("shutdown complete");
        Ok(())
    }

    /// Shared tail of `mkdir`/`touch`: resolve the parent, find a free child
    /// slot, allocate an inode, and wire a new directory entry into place.
    /// Returns the new inode's id; the caller still owns writing that
    /// inode's own record.
    fn create_entry(&mut self, path: &str, entry_type: u16) -> Result<u32> {
        let (parent_id, name) = self.resolve(path, TerminalExpect::Parent)?;
        if name.is_empty() {
            return Err(FsError::not_found(path));
        }
        if name.len() > crate::layout::MAX_NAME_LEN {
            return Err(FsError::NameTooLong(name));
        }

        let mut parent = self.read_inode(parent_id)?;
        let mut parent_block_point = parent.block_point;
        // block_point[0] is reserved; a parent's children start at index 1.
        let slot = (1..parent_block_point.len())
            .find(|&i| parent_block_point[i] == 0)
            .ok_or_else(|| FsError::DirFull(path.to_string()))?;

        let new_id = self.alloc_inode()?;
        let child_block = self.alloc_blocks(1)?[0];
        parent_block_point[slot] = child_block;
        parent.block_point = parent_block_point;
        parent.size += 1;
        self.write_inode(parent_id, &parent)?;

        let mut entries = [DirItem::empty(); DIR_ITEMS_EACH_BLOCK];
        entries[0] = DirItem::new(new_id, entry_type, &name);
        self.write_dir_block(child_block, &entries)?;

        Ok(new_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::MemBlockDevice;

    fn fresh() -> Filesystem<MemBlockDevice> {
        let mut fs = Filesystem::open(MemBlockDevice::new()).unwrap();
        fs.init().unwrap();
        fs
    }

    #[test]
    fn inode_round_trips_through_its_block() {
        let mut fs = fresh();
        let inode = Inode {
            size: 3,
            file_type: FILE_TYPE_FILE,
            link: 2,
            block_point: [10, 20, 0, 0, 0, 0],
        };
        fs.write_inode(5, &inode).unwrap();
        let back = fs.read_inode(5).unwrap();
        let (size, link, block_point) = (back.size, back.link, back.block_point);
        assert_eq!(size, 3);
        assert_eq!(link, 2);
        assert_eq!(block_point, [10, 20, 0, 0, 0, 0]);
    }

    #[test]
    fn sibling_inodes_in_the_same_block_are_preserved() {
        let mut fs = fresh();
        // Inodes 1 and 2 share inode-table block 1 with 30 other slots.
        fs.write_inode(1, &Inode { size: 7, ..Inode::empty() }).unwrap();
        fs.write_inode(2, &Inode { size: 9, ..Inode::empty() }).unwrap();
        let first = fs.read_inode(1).unwrap().size;
        let second = fs.read_inode(2).unwrap().size;
        assert_eq!(first, 7);
        assert_eq!(second, 9);
    }

    #[test]
    fn cp_copies_nonempty_block_points_onto_disjoint_blocks() {
        let mut fs = fresh();
        fs.touch("/src").unwrap();
        let (src_id, _) = fs.resolve("/src", crate::resolve::TerminalExpect::File).unwrap();
        let data_block = fs.alloc_blocks(1).unwrap()[0];
        let mut src_inode = fs.read_inode(src_id).unwrap();
        let mut src_block_point = src_inode.block_point;
        src_block_point[0] = data_block;
        src_inode.block_point = src_block_point;
        fs.write_inode(src_id, &src_inode).unwrap();

        fs.cp("/dest", "/src").unwrap();
        let (dest_id, _) = fs.resolve("/dest", crate::resolve::TerminalExpect::File).unwrap();
        let dest_inode = fs.read_inode(dest_id).unwrap();
        let dest_block_point = dest_inode.block_point;
        let dest_block = dest_block_point[0];
        assert_ne!(dest_block, 0);
        assert_ne!(dest_block, data_block);
    }

    #[test]
    fn init_pins_reserved_bits() {
        let fs = fresh();
        let sb = fs.superblock_snapshot();
        let block_map = sb.block_map;
        let inode_map = sb.inode_map;
        for b in 0..33u32 {
            assert!(crate::bitmap::bit(&block_map, b as usize), "block {b} should be pinned");
        }
        assert!(crate::bitmap::bit(&inode_map, 0));
    }
}
