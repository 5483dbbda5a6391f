use crate::disk::BLOCK_SIZE;

pub const SUPER_BLOCK_BLOCK_ID: u32 = 0;
// 专用位图块紧跟在超级块后面
pub const FREE_MAP_START_BLOCK_ID: u32 = 1;

// 超级块头部：total_blocks / inode_area_blocks / freemap_area_blocks 三个 u32
pub const SUPER_BLOCK_HEADER_SIZE: usize = 12;

// 超级块剩下的空间全部用来放位图的第一段
pub const EMBEDDED_BITMAP_BYTES: usize = BLOCK_SIZE - SUPER_BLOCK_HEADER_SIZE;
pub const EMBEDDED_BITMAP_BITS: u64 = EMBEDDED_BITMAP_BYTES as u64 * 8;

// 一个专用位图块能记录多少个数据块
pub const BITS_PER_BITMAP_BLOCK: u64 = BLOCK_SIZE as u64 * 8;

// 每个 Inode 64 字节：flags(4) + size(8) + 13 个块指针(4 * 13)
pub const INODE_SIZE: usize = 64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

// 10 个直接指针 + 一级、二级、三级间接指针各一个
pub const DIRECT_PTRS: usize = 10;
pub const INDIRECT_LEVELS: usize = 3;
pub const INODE_PTRS: usize = DIRECT_PTRS + INDIRECT_LEVELS;

// 每个间接块可以存多少个块号（每个块号 4 字节）
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4;

// 同时打开的文件数上限
pub const MAX_OPEN_FILES: usize = 32;
