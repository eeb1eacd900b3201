//! A minimal UNIX-style block filesystem over a fixed-size simulated device.

mod alloc;
pub mod bitmap;
pub mod device;
pub mod error;
pub mod fs;
pub mod layout;
mod resolve;
pub mod shell;

pub use device::{BlockDevice, FileBlockDevice, MemBlockDevice, DEVICE_SIZE};
pub use error::{FsError, Result};
pub use fs::Filesystem;
