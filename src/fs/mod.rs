use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::MAX_OPEN_FILES,
        data_block_bitmap::DataBlockBitmap,
        file_table::{FileTable, OpenFile},
        inode_table::{Inode, InodeBlock, InodeTable},
        layout::Layout,
        resolver::{BlockKind, Mode, Resolved},
        super_block::SuperBlock,
    },
};

pub mod config;
pub mod data_block_bitmap;
pub mod error;
pub mod file_table;
pub mod inode_table;
pub mod layout;
pub mod pointer_block;
pub mod resolver;
pub mod super_block;

pub use error::{FileSystemError, Result};

/// seek 的基准位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,     // 文件开头
    End,     // 文件末尾（inode.size）
    Current, // 当前位置
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub inumber: u32,
    pub size: u64,
    pub data_blocks: u32,
    pub pointer_blocks: u32, // 各级间接块
    pub open: bool,
}

/// 位图和 inode 指针树的一致性检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub leaked: Vec<u32>,       // 位图里已分配，但没有文件引用
    pub missing: Vec<u32>,      // 文件引用了，但位图里是空闲
    pub shared: Vec<u32>,       // 被引用了不止一次
    pub out_of_range: Vec<u32>, // 指针指到了数据区以外
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.leaked.is_empty()
            && self.missing.is_empty()
            && self.shared.is_empty()
            && self.out_of_range.is_empty()
    }
}

#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    disk: D,                          // 底层磁盘抽象层
    layout: Layout,                   // 卷布局，来自超级块
    inode_table: InodeTable,          // inode 区寻址
    data_bitmap: DataBlockBitmap,     // 数据块分配信息
    file_table: FileTable,            // 打开的文件
}

// 失败时顺带打一条诊断日志
fn diagnose<T>(op: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("{}: {}", op, e);
    }
    result
}

impl<D: BlockDevice> FileSystem<D> {
    /// 读取超级块挂载卷。全 0 的设备按“未格式化”挂载，format 之前其他操作都会失败。
    pub fn mount(disk: D) -> Result<Self> {
        let layout = SuperBlock::load(&disk)?.layout;

        let data_bitmap = if layout.is_formatted() {
            let expected = Layout::compute(
                layout.total_blocks,
                layout.inode_area_blocks,
                disk.block_count(),
            )
            .map_err(|e| FileSystemError::Corrupted(format!("bad superblock: {}", e)))?;
            if expected != layout {
                return Err(FileSystemError::Corrupted(format!(
                    "superblock records {} free-map blocks, expected {}",
                    layout.freemap_area_blocks, expected.freemap_area_blocks
                )));
            }
            let bitmap = DataBlockBitmap::load(&disk, layout)?;
            info!(
                "mounted volume: {} blocks, {} inodes, {} of {} data blocks free",
                layout.total_blocks,
                layout.inode_count(),
                bitmap.free_blocks(),
                layout.data_blocks()
            );
            bitmap
        } else {
            info!("device holds no file system, format it first");
            DataBlockBitmap::new(layout)
        };

        Ok(Self {
            disk,
            layout,
            inode_table: InodeTable::new(&layout),
            data_bitmap,
            file_table: FileTable::new(MAX_OPEN_FILES),
        })
    }

    pub fn format(&mut self, total_blocks: u32, inode_area_blocks: u32) -> Result<()> {
        self.format_with(total_blocks, inode_area_blocks, |_, _| {})
    }

    /// 格式化卷。每写完一个元数据块调用一次 `on_block(已写块数, 元数据总块数)`。
    pub fn format_with<F>(&mut self, total_blocks: u32, inode_area_blocks: u32, mut on_block: F) -> Result<()>
    where
        F: FnMut(u32, u32),
    {
        let layout = diagnose(
            "format",
            Layout::compute(total_blocks, inode_area_blocks, self.disk.block_count()),
        )?;

        let discarded = self.file_table.iter().count();
        if discarded > 0 {
            warn!("format discards {} open file handle(s)", discarded);
        }
        self.file_table.clear();

        let metadata_blocks = layout.data_start();
        SuperBlock::new(layout).store(&self.disk)?;
        on_block(1, metadata_blocks);

        // 专用位图块和 inode 表全部清零
        let zero: Block = [0; BLOCK_SIZE];
        for block_id in layout.freemap_start()..layout.inode_start() {
            self.disk.write_block(block_id, &zero)?;
            on_block(block_id + 1, metadata_blocks);
        }
        let empty = InodeBlock::default();
        for block_id in layout.inode_start()..layout.data_start() {
            empty.write(&self.disk, block_id)?;
            on_block(block_id + 1, metadata_blocks);
        }

        // 元数据变了，位图按新布局重建
        self.layout = layout;
        self.inode_table = InodeTable::new(&layout);
        self.data_bitmap = DataBlockBitmap::new(layout);

        info!(
            "formatted volume: {} blocks ({} free-map, {} inode, {} data)",
            layout.total_blocks,
            layout.freemap_area_blocks,
            layout.inode_area_blocks,
            layout.data_blocks()
        );
        Ok(())
    }

    /// 新建一个空文件并打开，返回文件句柄
    pub fn create(&mut self) -> Result<usize> {
        diagnose("create", self.try_create())
    }

    fn try_create(&mut self) -> Result<usize> {
        self.require_formatted()?;
        if !self.file_table.has_free_slot() {
            return Err(FileSystemError::NoHandles);
        }

        let (inumber, inode) = self
            .inode_table
            .claim_free(&self.disk)?
            .ok_or(FileSystemError::NoFreeInode)?;
        let fd = self.file_table.allocate(inode, inumber)?;
        debug!("created file {} as fd {}", inumber, fd);
        Ok(fd)
    }

    pub fn open(&mut self, inumber: u32) -> Result<usize> {
        diagnose("open", self.try_open(inumber))
    }

    fn try_open(&mut self, inumber: u32) -> Result<usize> {
        self.check_inumber(inumber)?;
        if !self.file_table.has_free_slot() {
            return Err(FileSystemError::NoHandles);
        }

        let inode = self.inode_table.load(&self.disk, inumber)?;
        if !inode.is_allocated() {
            return Err(FileSystemError::FileNotFound(inumber));
        }
        let fd = self.file_table.allocate(inode, inumber)?;
        debug!("opened file {} as fd {}", inumber, fd);
        Ok(fd)
    }

    pub fn inumber_of(&self, fd: usize) -> Result<u32> {
        diagnose("inumber", self.file_table.get(fd).map(|file| file.inumber))
    }

    /// 从当前位置读到 `buf`，不会越过文件末尾。空洞读出来是 0。
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        diagnose("read", self.try_read(fd, buf))
    }

    fn try_read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let disk = &self.disk;
        let bitmap = &mut self.data_bitmap;
        let (file, inode) = self.file_table.get_mut(fd)?;

        let rest = inode.size.saturating_sub(file.seek_pointer);
        let limit = rest.min(buf.len() as u64) as usize;

        let mut block_buf: Block = [0; BLOCK_SIZE];
        let mut done = 0;
        while done < limit {
            let resolved =
                resolver::resolve(disk, bitmap, inode, file.seek_pointer, Mode::Read)?;
            let offset = resolved.offset();
            let len = (BLOCK_SIZE - offset).min(limit - done);

            match resolved {
                Resolved::Mapped { block, .. } => {
                    disk.read_block(block.get(), &mut block_buf)?;
                    buf[done..done + len].copy_from_slice(&block_buf[offset..offset + len]);
                }
                Resolved::Hole { .. } => buf[done..done + len].fill(0),
            }
            done += len;
            file.seek_pointer += len as u64;
        }
        Ok(limit)
    }

    /// 从当前位置写入 `buf`，必要时分配数据块和间接块。
    ///
    /// 空间用完时停下：已经写进去的字节保留，返回实际写入的字节数；
    /// 一个字节都没写进去才返回错误。
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        diagnose("write", self.try_write(fd, buf))
    }

    fn try_write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let disk = &self.disk;
        let bitmap = &mut self.data_bitmap;
        let (file, inode) = self.file_table.get_mut(fd)?;

        let (written, stopped) = write_blocks(disk, bitmap, file, inode, buf);
        // 不管成功与否，本次分配的块都要落盘
        bitmap.save(disk)?;

        match stopped {
            None => Ok(written),
            Some(e @ (FileSystemError::NoSpace | FileSystemError::OffsetTooLarge(_)))
                if written > 0 =>
            {
                warn!(
                    "write: stopped after {} of {} bytes: {}",
                    written,
                    buf.len(),
                    e
                );
                Ok(written)
            }
            Some(e) => Err(e),
        }
    }

    pub fn seek(&mut self, fd: usize, offset: i64, whence: Whence) -> Result<u64> {
        diagnose("seek", self.try_seek(fd, offset, whence))
    }

    fn try_seek(&mut self, fd: usize, offset: i64, whence: Whence) -> Result<u64> {
        let (file, inode) = self.file_table.get_mut(fd)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::End => inode.size as i128,
            Whence::Current => file.seek_pointer as i128,
        };

        let pos = base + offset as i128;
        if pos < 0 {
            return Err(FileSystemError::NegativeOffset(pos as i64));
        }
        // 超过 u64 的位置不截断，直接拒绝
        file.seek_pointer =
            u64::try_from(pos).map_err(|_| FileSystemError::OffsetTooLarge(u64::MAX))?;
        Ok(file.seek_pointer)
    }

    /// 把 inode 快照写回 inode 表并释放句柄
    pub fn close(&mut self, fd: usize) -> Result<()> {
        diagnose("close", self.try_close(fd))
    }

    fn try_close(&mut self, fd: usize) -> Result<()> {
        let (file, inode) = self.file_table.get_mut(fd)?;
        let inumber = file.inumber;
        let inode = *inode;
        // 每次 close 都写回共用的 inode，其他句柄还开着也一样
        self.inode_table.store(&self.disk, inumber, &inode)?;
        debug!("closed fd {} (file {}, {} bytes)", fd, inumber, inode.size);
        self.file_table.free(fd);
        Ok(())
    }

    /// 删除文件，释放它拥有的所有块。文件打开时拒绝删除。
    pub fn delete(&mut self, inumber: u32) -> Result<()> {
        diagnose("delete", self.try_delete(inumber))
    }

    fn try_delete(&mut self, inumber: u32) -> Result<()> {
        self.check_inumber(inumber)?;
        if let Some(fd) = self.file_table.fd_of(inumber) {
            return Err(FileSystemError::FileOpen { inumber, fd });
        }

        let mut inode = self.inode_table.load(&self.disk, inumber)?;
        if !inode.is_allocated() {
            return Err(FileSystemError::FileNotFound(inumber));
        }

        let released = resolver::release_all(&self.disk, &mut self.data_bitmap, &mut inode)?;
        self.data_bitmap.save(&self.disk)?;

        self.inode_table
            .store(&self.disk, inumber, &Inode::default())?;
        debug!("deleted file {} ({} blocks released)", inumber, released);
        Ok(())
    }

    pub fn stat(&self, inumber: u32) -> Result<FileStat> {
        diagnose("stat", self.try_stat(inumber))
    }

    fn try_stat(&self, inumber: u32) -> Result<FileStat> {
        self.check_inumber(inumber)?;
        let open = self.file_table.inode(inumber).copied();
        let inode = match open {
            Some(inode) => inode,
            None => self.inode_table.load(&self.disk, inumber)?,
        };
        if !inode.is_allocated() {
            return Err(FileSystemError::FileNotFound(inumber));
        }

        let mut stat = FileStat {
            inumber,
            size: inode.size,
            data_blocks: 0,
            pointer_blocks: 0,
            open: open.is_some(),
        };
        resolver::for_each_block(&self.disk, &inode, |_, kind| match kind {
            BlockKind::Data => stat.data_blocks += 1,
            BlockKind::Pointer => stat.pointer_blocks += 1,
        })?;
        Ok(stat)
    }

    /// 检查“位图置位 <=> 块被某个文件引用”。打开的文件以内存里的快照为准。
    pub fn check(&self) -> Result<ConsistencyReport> {
        diagnose("check", self.try_check())
    }

    fn try_check(&self) -> Result<ConsistencyReport> {
        self.require_formatted()?;

        let mut owners: BTreeMap<u32, u32> = BTreeMap::new();
        for (inumber, stored) in self.inode_table.allocated(&self.disk)? {
            let inode = self.file_table.inode(inumber).copied().unwrap_or(stored);
            resolver::for_each_block(&self.disk, &inode, |block, _| {
                *owners.entry(block.get()).or_default() += 1;
            })?;
        }

        let used: BTreeSet<u32> = self.data_bitmap.used_blocks().collect();
        let mut report = ConsistencyReport {
            leaked: used
                .iter()
                .copied()
                .filter(|block| !owners.contains_key(block))
                .collect(),
            ..ConsistencyReport::default()
        };
        for (&block, &count) in &owners {
            if !self.layout.is_data_block(block) {
                report.out_of_range.push(block);
            } else if !used.contains(&block) {
                report.missing.push(block);
            }
            if count > 1 {
                report.shared.push(block);
            }
        }

        if !report.is_consistent() {
            warn!("check: inconsistent volume: {:?}", report);
        }
        Ok(report)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn free_blocks(&self) -> u32 {
        self.data_bitmap.free_blocks()
    }

    /// 打开的句柄，带上它们共用的 inode
    pub fn open_files(&self) -> impl Iterator<Item = (usize, &OpenFile, &Inode)> {
        self.file_table.iter()
    }

    pub fn bitmap_string(&self) -> String {
        self.data_bitmap.to_bit_string()
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// 保存位图，关闭所有打开的文件，停止磁盘，把设备交还给调用者
    pub fn shutdown(mut self) -> Result<D> {
        self.data_bitmap.save(&self.disk)?;

        let open: Vec<usize> = self.file_table.iter().map(|(fd, _, _)| fd).collect();
        for fd in open {
            self.close(fd)?;
        }

        self.disk.stop()?;
        info!("volume shut down");
        Ok(self.disk)
    }

    fn require_formatted(&self) -> Result<()> {
        if self.layout.is_formatted() {
            Ok(())
        } else {
            Err(FileSystemError::NotFormatted)
        }
    }

    fn check_inumber(&self, inumber: u32) -> Result<()> {
        self.require_formatted()?;
        if self.inode_table.is_valid(inumber) {
            Ok(())
        } else {
            Err(FileSystemError::InvalidInumber(inumber))
        }
    }
}

// 逐块写入，返回写入的字节数和让写入停下来的错误
fn write_blocks<D: BlockDevice + ?Sized>(
    disk: &D,
    bitmap: &mut DataBlockBitmap,
    file: &mut OpenFile,
    inode: &mut Inode,
    buf: &[u8],
) -> (usize, Option<FileSystemError>) {
    let mut block_buf: Block = [0; BLOCK_SIZE];
    let mut done = 0;

    while done < buf.len() {
        let step = resolver::resolve(disk, bitmap, inode, file.seek_pointer, Mode::Write)
            .and_then(|resolved| match resolved {
                Resolved::Mapped {
                    block,
                    offset,
                    fresh,
                } => {
                    // 新分配的块里是旧数据，不读，直接从全 0 开始
                    if fresh {
                        block_buf = [0; BLOCK_SIZE];
                    } else {
                        disk.read_block(block.get(), &mut block_buf)?;
                    }
                    let len = (BLOCK_SIZE - offset).min(buf.len() - done);
                    block_buf[offset..offset + len].copy_from_slice(&buf[done..done + len]);
                    disk.write_block(block.get(), &block_buf)?;
                    Ok(len)
                }
                Resolved::Hole { .. } => Err(FileSystemError::Corrupted(
                    "write resolved to a hole".to_string(),
                )),
            });

        match step {
            Ok(len) => {
                done += len;
                file.seek_pointer += len as u64;
                inode.size = inode.size.max(file.seek_pointer);
            }
            Err(e) => return (done, Some(e)),
        }
    }
    (done, None)
}
