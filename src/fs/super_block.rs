use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{EMBEDDED_BITMAP_BYTES, SUPER_BLOCK_BLOCK_ID, SUPER_BLOCK_HEADER_SIZE},
        error::Result,
        layout::Layout,
    },
};

/// 块 0：卷布局 + 位图的第一段
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub layout: Layout,
    pub free_map: Vec<u8>, // 内嵌位图，长度固定为 EMBEDDED_BITMAP_BYTES
}

impl SuperBlock {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            free_map: vec![0; EMBEDDED_BITMAP_BYTES],
        }
    }

    pub fn decode(block: &Block) -> Result<Self> {
        let layout: Layout = bincode::deserialize(&block[..SUPER_BLOCK_HEADER_SIZE])?;
        Ok(Self {
            layout,
            free_map: block[SUPER_BLOCK_HEADER_SIZE..].to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Block> {
        let mut block: Block = [0; BLOCK_SIZE];
        bincode::serialize_into(&mut block[..SUPER_BLOCK_HEADER_SIZE], &self.layout)?;
        block[SUPER_BLOCK_HEADER_SIZE..].copy_from_slice(&self.free_map);
        Ok(block)
    }

    pub fn load<D: BlockDevice + ?Sized>(disk: &D) -> Result<Self> {
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(SUPER_BLOCK_BLOCK_ID, &mut block)?;
        Self::decode(&block)
    }

    pub fn store<D: BlockDevice + ?Sized>(&self, disk: &D) -> Result<()> {
        disk.write_block(SUPER_BLOCK_BLOCK_ID, &self.encode()?)?;
        Ok(())
    }
}
