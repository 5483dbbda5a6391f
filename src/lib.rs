//! 基于块设备的 inode 文件系统模拟器。
//!
//! 一个卷由超级块、位图块、inode 表和数据块组成，文件用 inumber 标识，
//! 打开后通过小整数句柄读写。

pub mod disk;
pub mod fs;
pub mod utils;

pub use disk::{BlockDevice, FileDisk, MemDisk};
pub use fs::{ConsistencyReport, FileStat, FileSystem, FileSystemError, Result, Whence};
