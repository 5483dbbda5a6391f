use crate::{
    disk::{from_ptr, to_ptr, Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{config::PTRS_PER_BLOCK, error::Result},
};

/// 间接块：PTRS_PER_BLOCK 个小端 u32 块号，0 表示空。
/// 一级、二级、三级间接用的都是同一种块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerBlock {
    ptrs: [Option<BlockId>; PTRS_PER_BLOCK],
}

impl Default for PointerBlock {
    fn default() -> Self {
        Self {
            ptrs: [None; PTRS_PER_BLOCK],
        }
    }
}

impl PointerBlock {
    pub fn get(&self, index: usize) -> Option<BlockId> {
        self.ptrs[index]
    }

    pub fn set(&mut self, index: usize, ptr: Option<BlockId>) {
        self.ptrs[index] = ptr;
    }

    /// 非空的指针
    pub fn live(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.ptrs.iter().flatten().copied()
    }

    pub fn read<D: BlockDevice + ?Sized>(disk: &D, block: BlockId) -> Result<Self> {
        let mut buf: Block = [0; BLOCK_SIZE];
        disk.read_block(block.get(), &mut buf)?;

        let mut pointer_block = Self::default();
        for (ptr, bytes) in pointer_block.ptrs.iter_mut().zip(buf.chunks_exact(4)) {
            *ptr = to_ptr(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        }
        Ok(pointer_block)
    }

    pub fn write<D: BlockDevice + ?Sized>(&self, disk: &D, block: BlockId) -> Result<()> {
        let mut buf: Block = [0; BLOCK_SIZE];
        for (ptr, bytes) in self.ptrs.iter().zip(buf.chunks_exact_mut(4)) {
            bytes.copy_from_slice(&from_ptr(*ptr).to_le_bytes());
        }
        disk.write_block(block.get(), &buf)?;
        Ok(())
    }
}
