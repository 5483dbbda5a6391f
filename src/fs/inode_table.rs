use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{from_ptr, to_ptr, Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{INODES_PER_BLOCK, INODE_PTRS, INODE_SIZE},
        error::Result,
        layout::Layout,
    },
};

bitflags! {
    /// Inode 状态位，全 0 表示空闲
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeFlags: u32 {
        const ALLOCATED = 1;
    }
}

impl Default for InodeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// 一个文件的元数据：大小 + 13 个块指针。
/// ptrs[0..10] 直接块，ptrs[10] 一级间接，ptrs[11] 二级间接，ptrs[12] 三级间接。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub flags: InodeFlags,
    pub size: u64, // 文件大小（字节），写过的最大 seek 位置
    pub ptrs: [Option<BlockId>; INODE_PTRS],
}

// 盘上格式，bincode 编码后正好 64 字节
#[derive(Serialize, Deserialize)]
struct RawInode {
    flags: u32,
    size: u64,
    ptrs: [u32; INODE_PTRS],
}

impl Inode {
    pub fn is_allocated(&self) -> bool {
        !self.flags.is_empty()
    }

    // 重置为一个刚创建的空文件
    pub fn allocate(&mut self) {
        *self = Self {
            flags: InodeFlags::ALLOCATED,
            ..Self::default()
        };
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let raw = RawInode {
            flags: self.flags.bits(),
            size: self.size,
            ptrs: self.ptrs.map(from_ptr),
        };
        bincode::serialize_into(&mut buf[..INODE_SIZE], &raw)?;
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let raw: RawInode = bincode::deserialize(&buf[..INODE_SIZE])?;
        Ok(Self {
            flags: InodeFlags::from_bits_retain(raw.flags),
            size: raw.size,
            ptrs: raw.ptrs.map(to_ptr),
        })
    }
}

/// inode 表中的一个块，存 INODES_PER_BLOCK 个 Inode
#[derive(Debug, Clone, Default)]
pub struct InodeBlock {
    pub inodes: [Inode; INODES_PER_BLOCK],
}

impl InodeBlock {
    pub fn read<D: BlockDevice + ?Sized>(disk: &D, block_id: u32) -> Result<Self> {
        let mut buf: Block = [0; BLOCK_SIZE];
        disk.read_block(block_id, &mut buf)?;

        let mut block = Self::default();
        for (inode, chunk) in block.inodes.iter_mut().zip(buf.chunks_exact(INODE_SIZE)) {
            *inode = Inode::decode(chunk)?;
        }
        Ok(block)
    }

    pub fn write<D: BlockDevice + ?Sized>(&self, disk: &D, block_id: u32) -> Result<()> {
        let mut buf: Block = [0; BLOCK_SIZE];
        for (inode, chunk) in self.inodes.iter().zip(buf.chunks_exact_mut(INODE_SIZE)) {
            inode.encode_into(chunk)?;
        }
        disk.write_block(block_id, &buf)?;
        Ok(())
    }
}

/// inode 区的寻址：inumber 从 1 开始编号
#[derive(Debug, Clone, Copy)]
pub struct InodeTable {
    pub start_block: u32,
    pub blocks: u32,
}

impl InodeTable {
    pub fn new(layout: &Layout) -> Self {
        Self {
            start_block: layout.inode_start(),
            blocks: layout.inode_area_blocks,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.blocks * INODES_PER_BLOCK as u32
    }

    // 上界取闭区间：create 能分出最后一个 inode，它也必须能被 open / delete
    pub fn is_valid(&self, inumber: u32) -> bool {
        inumber >= 1 && inumber <= self.capacity()
    }

    /// inumber -> (所在块号, 块内下标)
    pub fn locate(&self, inumber: u32) -> (u32, usize) {
        let index = inumber - 1;
        (
            self.start_block + index / INODES_PER_BLOCK as u32,
            (index % INODES_PER_BLOCK as u32) as usize,
        )
    }

    pub fn load<D: BlockDevice + ?Sized>(&self, disk: &D, inumber: u32) -> Result<Inode> {
        let (block_id, offset) = self.locate(inumber);
        Ok(InodeBlock::read(disk, block_id)?.inodes[offset])
    }

    // 读出所在块，改一个 inode，再整块写回
    pub fn store<D: BlockDevice + ?Sized>(&self, disk: &D, inumber: u32, inode: &Inode) -> Result<()> {
        let (block_id, offset) = self.locate(inumber);
        let mut block = InodeBlock::read(disk, block_id)?;
        block.inodes[offset] = *inode;
        block.write(disk, block_id)
    }

    /// 找到第一个空闲 inode，标记为已分配并写回磁盘
    pub fn claim_free<D: BlockDevice + ?Sized>(&self, disk: &D) -> Result<Option<(u32, Inode)>> {
        let mut inumber = 1;
        for block_id in self.start_block..self.start_block + self.blocks {
            let mut block = InodeBlock::read(disk, block_id)?;
            for inode in block.inodes.iter_mut() {
                if !inode.is_allocated() {
                    inode.allocate();
                    let claimed = *inode;
                    block.write(disk, block_id)?;
                    return Ok(Some((inumber, claimed)));
                }
                inumber += 1;
            }
        }
        Ok(None)
    }

    /// 所有已分配的 inode
    pub fn allocated<D: BlockDevice + ?Sized>(&self, disk: &D) -> Result<Vec<(u32, Inode)>> {
        let mut found = Vec::new();
        let mut inumber = 1;
        for block_id in self.start_block..self.start_block + self.blocks {
            let block = InodeBlock::read(disk, block_id)?;
            for inode in block.inodes {
                if inode.is_allocated() {
                    found.push((inumber, inode));
                }
                inumber += 1;
            }
        }
        Ok(found)
    }
}
