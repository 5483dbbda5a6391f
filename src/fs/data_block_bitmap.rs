use log::{debug, warn};

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::EMBEDDED_BITMAP_BYTES, error::Result, layout::Layout, super_block::SuperBlock,
    },
    utils,
};

/// 数据块位图：第 `i` 位对应物理块 `data_start + i`，1 表示已分配。
///
/// 位图在盘上分成若干段：第 0 段嵌在超级块里，其余每段占一个专用块。
/// 内存里是一份写回缓存，`find` / `clear` 只改内存并标脏，
/// 必须调用 `save` 才会写回磁盘。
#[derive(Debug)]
pub struct DataBlockBitmap {
    layout: Layout,
    bits: Vec<u8>,     // 各段依次拼接
    dirty: Vec<bool>,  // 每段是否被修改，下标 0 是内嵌段
    free_blocks: u32,  // 当前空闲数据块数
}

impl DataBlockBitmap {
    /// 全部空闲的位图（刚 format 完的状态）
    pub fn new(layout: Layout) -> Self {
        let dedicated = layout.freemap_area_blocks as usize;
        Self {
            layout,
            bits: vec![0; EMBEDDED_BITMAP_BYTES + dedicated * BLOCK_SIZE],
            dirty: vec![false; 1 + dedicated],
            free_blocks: layout.data_blocks(),
        }
    }

    // 从磁盘加载：超级块里的内嵌段 + 所有专用位图块
    pub fn load<D: BlockDevice + ?Sized>(disk: &D, layout: Layout) -> Result<Self> {
        let super_block = SuperBlock::load(disk)?;
        let mut bitmap = Self::new(layout);
        bitmap.bits[..EMBEDDED_BITMAP_BYTES].copy_from_slice(&super_block.free_map);

        let mut block_buf: Block = [0; BLOCK_SIZE];
        for i in 0..layout.freemap_area_blocks {
            disk.read_block(layout.freemap_start() + i, &mut block_buf)?;
            let start = EMBEDDED_BITMAP_BYTES + i as usize * BLOCK_SIZE;
            bitmap.bits[start..start + BLOCK_SIZE].copy_from_slice(&block_buf);
        }

        let used = (0..layout.data_blocks() as usize)
            .filter(|&i| utils::is_set(&bitmap.bits, i))
            .count() as u32;
        bitmap.free_blocks = layout.data_blocks() - used;
        Ok(bitmap)
    }

    /// 分配编号最小的空闲数据块
    pub fn find(&mut self) -> Option<BlockId> {
        let data_blocks = self.layout.data_blocks() as usize;

        let (byte_index, byte) = self
            .bits
            .iter()
            .enumerate()
            .find(|(_, byte)| **byte != 0xFF)
            .map(|(i, byte)| (i, *byte))?;

        // 这个字节里最低的空位已经超出数据区，后面的字节只会更远
        let index = byte_index * 8 + byte.trailing_ones() as usize;
        if index >= data_blocks {
            return None;
        }

        utils::set(&mut self.bits, index);
        self.mark_dirty(byte_index);
        self.free_blocks -= 1;

        let block = BlockId::new(self.layout.data_start() + index as u32)?;
        debug!("allocated block {} ({} free)", block, self.free_blocks);
        Some(block)
    }

    /// 释放一个数据块，重复释放没有副作用
    pub fn clear(&mut self, block: BlockId) {
        let Some(index) = self.index_of(block) else {
            warn!("ignoring release of non-data block {}", block);
            return;
        };

        if utils::clear(&mut self.bits, index) {
            self.mark_dirty(index / 8);
            self.free_blocks += 1;
            debug!("released block {} ({} free)", block, self.free_blocks);
        }
    }

    pub fn is_used(&self, block: BlockId) -> bool {
        self.index_of(block)
            .is_some_and(|index| utils::is_set(&self.bits, index))
    }

    pub fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// 所有已分配的物理块号，从小到大
    pub fn used_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        let data_start = self.layout.data_start();
        (0..self.layout.data_blocks() as usize)
            .filter(|&i| utils::is_set(&self.bits, i))
            .map(move |i| data_start + i as u32)
    }

    // 将脏的位图段写回磁盘
    pub fn save<D: BlockDevice + ?Sized>(&mut self, disk: &D) -> Result<()> {
        for segment in 0..self.dirty.len() {
            if !self.dirty[segment] {
                continue;
            }

            if segment == 0 {
                let mut super_block = SuperBlock::new(self.layout);
                super_block
                    .free_map
                    .copy_from_slice(&self.bits[..EMBEDDED_BITMAP_BYTES]);
                super_block.store(disk)?;
            } else {
                let start = EMBEDDED_BITMAP_BYTES + (segment - 1) * BLOCK_SIZE;
                let mut block_buf: Block = [0; BLOCK_SIZE];
                block_buf.copy_from_slice(&self.bits[start..start + BLOCK_SIZE]);
                disk.write_block(self.layout.freemap_start() + segment as u32 - 1, &block_buf)?;
            }
            self.dirty[segment] = false;
        }
        Ok(())
    }

    /// 用 0/1 字符串展示数据区对应的位，每 8 个字节一行
    pub fn to_bit_string(&self) -> String {
        let byte_len = (self.layout.data_blocks() as usize).div_ceil(8);
        utils::to_bit_string(&self.bits[..byte_len], ",", "\n", 8)
    }

    fn index_of(&self, block: BlockId) -> Option<usize> {
        self.layout
            .is_data_block(block.get())
            .then(|| (block.get() - self.layout.data_start()) as usize)
    }

    fn mark_dirty(&mut self, byte_index: usize) {
        let segment = if byte_index < EMBEDDED_BITMAP_BYTES {
            0
        } else {
            1 + (byte_index - EMBEDDED_BITMAP_BYTES) / BLOCK_SIZE
        };
        self.dirty[segment] = true;
    }
}
