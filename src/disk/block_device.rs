use std::io::{Error, ErrorKind, Result};

use crate::disk::types::Block;

/// 按块号读写定长块的存储设备，块号范围是 `[0, block_count())`。
/// 从未写过的块读出来全是 0。
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()>;
    fn block_count(&self) -> u32;

    /// 停止设备，把缓冲的数据落盘
    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn check_block_id(block_id: u32, block_count: u32) -> Result<()> {
    if block_id >= block_count {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("block {} out of range (device has {} blocks)", block_id, block_count),
        ));
    }
    Ok(())
}
