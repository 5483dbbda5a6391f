use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::disk::{
    block_device::{check_block_id, BlockDevice},
    types::{Block, BLOCK_SIZE},
};

/// 用宿主机上的一个镜像文件模拟磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    block_count: u32,
}

impl FileDisk {
    /// 打开（必要时创建）镜像文件，文件不够大时补齐到 `block_count` 个块。
    /// 新扩出来的部分由操作系统填 0。
    pub fn open<P: AsRef<Path>>(path: P, block_count: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let disk_size = block_count as u64 * BLOCK_SIZE as u64;
        if file.metadata()?.len() < disk_size {
            file.set_len(disk_size)?;
        }

        Ok(Self {
            file: Mutex::new(file),
            block_count,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "disk image lock poisoned"))
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        check_block_id(block_id, self.block_count)?;
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        check_block_id(block_id, self.block_count)?;
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn stop(&self) -> Result<()> {
        self.lock()?.sync_all()
    }
}
