//! End-to-end scenarios driven through the public `Filesystem` API on an
//! in-memory device.

use blockfs::bitmap::popcount;
use blockfs::device::{FileBlockDevice, MemBlockDevice};
use blockfs::error::FsError;
use blockfs::fs::Filesystem;
use blockfs::layout::{BLOCK_SIZE, ROOT_DIR_BLOCK};

fn fresh() -> Filesystem<MemBlockDevice> {
    let mut fs = Filesystem::open(MemBlockDevice::new()).unwrap();
    fs.init().unwrap();
    fs
}

fn names(entries: &[(String, u16)]) -> Vec<&str> {
    entries.iter().map(|(n, _)| n.as_str()).collect()
}

#[test]
fn s1_fresh_image_lists_dot_and_dotdot_only() {
    let mut fs = fresh();
    let entries = fs.ls("/").unwrap();
    assert_eq!(names(&entries), vec![".", ".."]);
}

#[test]
fn s2_mkdir_appears_in_listing() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    let entries = fs.ls("/").unwrap();
    assert_eq!(names(&entries), vec![".", "..", "a"]);
}

#[test]
fn s3_nested_mkdir_resolves_and_lists() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    let entries = fs.ls("/a").unwrap();
    assert_eq!(names(&entries), vec![".", "..", "b"]);
}

#[test]
fn s4_duplicate_mkdir_rejected_without_leaking_an_inode() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    let free_inode_count = fs.superblock_snapshot().free_inode_count;

    let err = fs.mkdir("/a").unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists(_)));
    assert_eq!(fs.superblock_snapshot().free_inode_count, free_inode_count);
}

#[test]
fn s5_sixth_child_returns_dir_full() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    for i in 0..5 {
        fs.mkdir(&format!("/a/child_{i}")).unwrap();
    }
    let err = fs.mkdir("/a/child_5").unwrap_err();
    assert!(matches!(err, FsError::DirFull(_)));
}

#[test]
fn s6_touch_creates_regular_file_entry() {
    let mut fs = fresh();
    fs.touch("/f").unwrap();
    let entries = fs.ls("/").unwrap();
    assert!(entries.iter().any(|(n, t)| n == "f" && *t == 1));
}

#[test]
fn mkdir_twice_top_level_also_rejected() {
    let mut fs = fresh();
    fs.touch("/f").unwrap();
    let err = fs.touch("/f").unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists(_)));
}

#[test]
fn cp_creates_destination_entry() {
    let mut fs = fresh();
    fs.touch("/src").unwrap();
    fs.cp("/dest", "/src").unwrap();
    let entries = fs.ls("/").unwrap();
    assert!(names(&entries).contains(&"dest"));
    // cp onto an existing destination is also allowed, and must not
    // re-create the directory entry.
    fs.cp("/dest", "/src").unwrap();
    let entries = fs.ls("/").unwrap();
    assert_eq!(names(&entries).iter().filter(|n| **n == "dest").count(), 1);
}

#[test]
fn cp_rejects_folder_source() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    let err = fs.cp("/b", "/a").unwrap_err();
    assert!(matches!(err, FsError::NotAFile(_)));
}

#[test]
fn missing_parent_is_not_found() {
    let mut fs = fresh();
    let err = fs.mkdir("/missing/child").unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)));
}

#[test]
fn bitmap_popcount_matches_free_counters_after_mutations() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/b").unwrap();
    fs.touch("/c").unwrap();

    let sb = fs.superblock_snapshot();
    let block_map = sb.block_map;
    let inode_map = sb.inode_map;
    let free_blocks = sb.free_block_count;
    let free_inodes = sb.free_inode_count;
    let used_blocks = popcount(&block_map, 4096);
    let used_inodes = popcount(&inode_map, 1024);
    assert_eq!(used_blocks as i32 + free_blocks, 4096);
    assert_eq!(used_inodes as i32 + free_inodes, 1024);
}

#[test]
fn init_on_already_formatted_medium_is_a_no_op() {
    let mut fs = fresh();
    fs.mkdir("/a").unwrap();

    // Re-running init on an already-formatted image must not wipe it.
    fs.init().unwrap();
    let entries = fs.ls("/").unwrap();
    assert_eq!(names(&entries), vec![".", "..", "a"]);
}

/// Property 7: init, close, reopen, init again — the superblock, root inode
/// block, and root directory block must be byte-identical. `init` on an
/// already-formatted medium has to be a true no-op at the byte level, not
/// just an equivalent one.
#[test]
fn init_close_reopen_init_is_byte_identical_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.bin");

    let device = FileBlockDevice::create_or_open(&path).unwrap();
    let mut fs = Filesystem::open(device).unwrap();
    fs.init().unwrap();
    fs.shutdown().unwrap();

    let before = std::fs::read(&path).unwrap();

    let device = FileBlockDevice::create_or_open(&path).unwrap();
    let mut fs = Filesystem::open(device).unwrap();
    fs.init().unwrap();
    fs.shutdown().unwrap();

    let after = std::fs::read(&path).unwrap();

    let superblock = 0..BLOCK_SIZE;
    let root_inode_block = BLOCK_SIZE..2 * BLOCK_SIZE;
    let root_dir_block =
        ROOT_DIR_BLOCK as usize * BLOCK_SIZE..(ROOT_DIR_BLOCK as usize + 1) * BLOCK_SIZE;

    assert_eq!(before[superblock.clone()], after[superblock]);
    assert_eq!(before[root_inode_block.clone()], after[root_inode_block]);
    assert_eq!(before[root_dir_block.clone()], after[root_dir_block]);
}
