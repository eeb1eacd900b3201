//! Path resolution: one walker shared by every caller, parameterized by
//! what the final path component is required to be.

use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs::Filesystem;
use crate::layout::{FILE_TYPE_FILE, FILE_TYPE_FOLDER, ROOT_INODE};

/// What the final component of a resolved path must name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TerminalExpect {
    /// The whole path, including the last component, must be folders.
    Dir,
    /// Every component except the last must be a folder; the last need not
    /// exist yet. Used by `mkdir`/`touch` to find where a new entry goes.
    Parent,
    /// Every component but the last is a folder; the last must be a file.
    File,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

impl<D: BlockDevice> Filesystem<D> {
    /// Walks `path` from the root according to `expect`.
    ///
    /// Returns the resolved inode id together with the final component's
    /// name: for [`TerminalExpect::Dir`] and [`TerminalExpect::File`] this
    /// is the id of the resolved entry itself; for [`TerminalExpect::Parent`]
    /// it is the id of the *containing* folder and the name the caller still
    /// needs to create.
    pub(crate) fn resolve(&mut self, path: &str, expect: TerminalExpect) -> Result<(u32, String)> {
        let components = split_path(path);
        if components.is_empty() {
            return match expect {
                TerminalExpect::Dir => Ok((ROOT_INODE, String::new())),
                TerminalExpect::Parent | TerminalExpect::File => Err(FsError::not_found(path)),
            };
        }

        let last = *components.last().unwrap();
        if matches!(expect, TerminalExpect::Parent) && last.len() > crate::layout::MAX_NAME_LEN {
            return Err(FsError::NameTooLong(last.to_string()));
        }

        let mut parent = ROOT_INODE;
        for name in &components[..components.len() - 1] {
            parent = self.find_child(parent, name, Some(FILE_TYPE_FOLDER))?;
        }

        match expect {
            TerminalExpect::Parent => Ok((parent, last.to_string())),
            TerminalExpect::Dir => {
                let id = self.find_child(parent, last, Some(FILE_TYPE_FOLDER))?;
                Ok((id, last.to_string()))
            }
            TerminalExpect::File => {
                let id = self.find_child(parent, last, Some(FILE_TYPE_FILE))?;
                Ok((id, last.to_string()))
            }
        }
    }

    /// Looks up `name` among the directory entries of folder `parent_id`.
    /// When `want_type` is `Some`, the match must also have that type.
    fn find_child(&mut self, parent_id: u32, name: &str, want_type: Option<u16>) -> Result<u32> {
        let parent = self.read_inode(parent_id)?;
        if !parent.is_folder() {
            return Err(FsError::not_found(name));
        }
        let size = parent.size;
        let block_point = parent.block_point;
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
                if !item.is_valid() {
                    continue;
                }
                if item.name_str() != name {
                    continue;
                }
                let item_type = item.type_;
                if let Some(t) = want_type {
                    if item_type as u16 != t {
                        continue;
                    }
                }
                let inode_id = item.inode_id;
                return Ok(inode_id);
            }
        }
        Err(FsError::not_found(name))
    }
}
