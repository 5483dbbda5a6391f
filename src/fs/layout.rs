//! 卷布局：超级块 | 专用位图块 | inode 表 | 数据块

use serde::{Deserialize, Serialize};

use crate::fs::{
    config::{BITS_PER_BITMAP_BLOCK, EMBEDDED_BITMAP_BITS, FREE_MAP_START_BLOCK_ID, INODES_PER_BLOCK},
    error::{FileSystemError, Result},
};

/// 卷的几何参数，format 之后不再改变。
/// 字段顺序就是超级块头部的盘上顺序。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub total_blocks: u32,
    pub inode_area_blocks: u32,
    pub freemap_area_blocks: u32,
}

impl Layout {
    /// 根据总块数和 inode 区大小算出位图需要几个专用块，并检查元数据放得下。
    ///
    /// 位图要覆盖 `total_blocks - inode_area_blocks - 1` 位，超级块里内嵌的那段
    /// 不够时才追加专用块。
    pub fn compute(total_blocks: u32, inode_area_blocks: u32, device_blocks: u32) -> Result<Self> {
        if total_blocks > device_blocks {
            return Err(FileSystemError::Capacity(format!(
                "size {} exceeds disk size of {}",
                total_blocks, device_blocks
            )));
        }

        let bits_needed = (total_blocks as u64).saturating_sub(inode_area_blocks as u64 + 1);
        let extra_bits = bits_needed.saturating_sub(EMBEDDED_BITMAP_BITS);
        let freemap_area_blocks = extra_bits.div_ceil(BITS_PER_BITMAP_BLOCK);

        // 超级块 + 位图 + inode 表不能超过总块数
        let metadata_blocks = 1 + freemap_area_blocks + inode_area_blocks as u64;
        if metadata_blocks > total_blocks as u64 {
            return Err(FileSystemError::Capacity(format!(
                "metadata ({} blocks) will not fit in file system of {} blocks",
                metadata_blocks, total_blocks
            )));
        }

        Ok(Self {
            total_blocks,
            inode_area_blocks,
            freemap_area_blocks: freemap_area_blocks as u32,
        })
    }

    /// 全 0 的超级块表示卷还没 format
    pub fn is_formatted(&self) -> bool {
        self.total_blocks != 0
    }

    pub fn freemap_start(&self) -> u32 {
        FREE_MAP_START_BLOCK_ID
    }

    pub fn inode_start(&self) -> u32 {
        self.freemap_start() + self.freemap_area_blocks
    }

    pub fn data_start(&self) -> u32 {
        self.inode_start() + self.inode_area_blocks
    }

    pub fn data_blocks(&self) -> u32 {
        self.total_blocks.saturating_sub(self.data_start())
    }

    pub fn inode_count(&self) -> u32 {
        self.inode_area_blocks * INODES_PER_BLOCK as u32
    }

    pub fn is_data_block(&self, block: u32) -> bool {
        block >= self.data_start() && block < self.total_blocks
    }
}
