use std::{
    io::{Error, ErrorKind, Result},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use crate::disk::{
    block_device::{check_block_id, BlockDevice},
    types::{Block, BLOCK_SIZE},
};

/// 纯内存磁盘，顺带统计读写次数，测试里用来确认某个操作有没有碰盘
#[derive(Debug)]
pub struct MemDisk {
    blocks: Mutex<Vec<Block>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: Mutex::new(vec![[0u8; BLOCK_SIZE]; block_count as usize]),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Block>>> {
        self.blocks
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "memory disk lock poisoned"))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        let blocks = self.lock()?;
        check_block_id(block_id, blocks.len() as u32)?;
        buf.copy_from_slice(&blocks[block_id as usize]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        let mut blocks = self.lock()?;
        check_block_id(block_id, blocks.len() as u32)?;
        blocks[block_id as usize].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.blocks.lock().map_or(0, |blocks| blocks.len() as u32)
    }
}
