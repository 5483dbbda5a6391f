use std::num::NonZeroU32;

/// 每个逻辑块（Block）的大小：512 B
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 512;

/// 设备最多能提供的块数：8MB / 512B = 16384 块
/// format 时请求的块数不能超过它。
pub const BLOCK_COUNT: u32 = 16384;

/// 定义一个逻辑块类型（每块 512B 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];

/// 指向某个物理块的指针。
/// 块 0 永远是超级块，所以盘上的 0 可以当作“空指针”，内存里用 `Option<BlockId>` 表示。
pub type BlockId = NonZeroU32;

/// 盘上的原始块号 -> 指针（0 -> None）
pub fn to_ptr(raw: u32) -> Option<BlockId> {
    NonZeroU32::new(raw)
}

/// 指针 -> 盘上的原始块号（None -> 0）
pub fn from_ptr(ptr: Option<BlockId>) -> u32 {
    ptr.map_or(0, NonZeroU32::get)
}
