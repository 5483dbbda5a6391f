//! 地址转换：文件内的逻辑块号 -> 磁盘上的物理块号
//!
//! inode 的 13 个指针组成一棵树：前 10 个直接指向数据块，第 11、12、13 个
//! 分别是一级、二级、三级间接块的根。所有层用同一套逻辑处理，
//! 区别只在于从根到数据块要经过几个间接块。

use log::{debug, trace};

use crate::{
    disk::{BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{DIRECT_PTRS, INDIRECT_LEVELS, PTRS_PER_BLOCK},
        data_block_bitmap::DataBlockBitmap,
        error::{FileSystemError, Result},
        inode_table::Inode,
        pointer_block::PointerBlock,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write, // 遇到缺口就分配
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// `fresh` 表示数据块是这次刚分配的，盘上的旧内容没有意义
    Mapped {
        block: BlockId,
        offset: usize,
        fresh: bool,
    },
    /// 路径上有一级没分配，读的时候当作全 0 的块
    Hole { offset: usize },
}

impl Resolved {
    /// 块内偏移
    pub fn offset(&self) -> usize {
        match *self {
            Self::Mapped { offset, .. } | Self::Hole { offset } => offset,
        }
    }
}

/// 一个逻辑块在指针树里的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPath {
    /// 根指针在 inode.ptrs 里的下标
    pub slot: usize,
    /// 根到数据块之间的间接块个数：0 直接，1/2/3 一二三级间接
    pub depth: usize,
    indices: [usize; INDIRECT_LEVELS],
}

impl BlockPath {
    /// 每一级间接块里的槽位，从根往下
    pub fn indices(&self) -> &[usize] {
        &self.indices[..self.depth]
    }

    pub fn locate(logical: u64) -> Option<Self> {
        Self::locate_with(logical, PTRS_PER_BLOCK as u64)
    }

    /// 按每块 `ptrs_per_block` 个指针计算位置，超出三级间接的范围返回 None。
    /// 下标都基于“相对本层起点”的偏移计算。
    pub fn locate_with(logical: u64, ptrs_per_block: u64) -> Option<Self> {
        let direct = DIRECT_PTRS as u64;
        if logical < direct {
            return Some(Self {
                slot: logical as usize,
                depth: 0,
                indices: [0; INDIRECT_LEVELS],
            });
        }

        let mut offset = logical - direct;
        let mut span = ptrs_per_block; // 本层能覆盖的块数
        for depth in 1..=INDIRECT_LEVELS {
            if offset < span {
                let mut indices = [0; INDIRECT_LEVELS];
                let mut rest = offset;
                for level in (0..depth).rev() {
                    indices[level] = (rest % ptrs_per_block) as usize;
                    rest /= ptrs_per_block;
                }
                return Some(Self {
                    slot: DIRECT_PTRS + depth - 1,
                    depth,
                    indices,
                });
            }
            offset -= span;
            span *= ptrs_per_block;
        }
        None
    }
}

/// 单个文件最多能有多少个逻辑块
pub fn max_file_blocks() -> u64 {
    let per = PTRS_PER_BLOCK as u64;
    DIRECT_PTRS as u64 + per + per * per + per * per * per
}

/// 找出字节位置 `pos` 所在的物理块。
///
/// 读模式下路径上任何一级缺失都返回 `Hole`，不分配任何东西。
/// 写模式下把缺失的各级一次性分配好；只要有一个分配失败，
/// 本次已经拿到的块全部还给位图，返回 `NoSpace`，inode 和磁盘都不变。
/// 位图只在内存里修改，由调用者负责 `save`。
pub fn resolve<D: BlockDevice + ?Sized>(
    disk: &D,
    bitmap: &mut DataBlockBitmap,
    inode: &mut Inode,
    pos: u64,
    mode: Mode,
) -> Result<Resolved> {
    let logical = pos / BLOCK_SIZE as u64;
    let offset = (pos % BLOCK_SIZE as u64) as usize;
    let path = BlockPath::locate(logical).ok_or(FileSystemError::OffsetTooLarge(pos))?;
    let indices = path.indices();

    // 沿着已有的链往下走，直到数据块或者第一个缺口
    let mut link = inode.ptrs[path.slot];
    let mut parent: Option<(BlockId, PointerBlock)> = None;
    let mut level = 0;
    while let Some(block) = link {
        if level == path.depth {
            trace!("block {} -> {} (depth {})", logical, block, path.depth);
            return Ok(Resolved::Mapped {
                block,
                offset,
                fresh: false,
            });
        }
        let pointers = PointerBlock::read(disk, block)?;
        link = pointers.get(indices[level]);
        parent = Some((block, pointers));
        level += 1;
    }

    if mode == Mode::Read {
        trace!("block {} is a hole (missing link at level {})", logical, level);
        return Ok(Resolved::Hole { offset });
    }

    // 从第 level 级到数据块全部缺失
    let missing = path.depth + 1 - level;
    let mut claimed = Vec::with_capacity(missing);
    for _ in 0..missing {
        match bitmap.find() {
            Some(block) => claimed.push(block),
            None => {
                release_claimed(bitmap, &claimed);
                debug!("no space for block {}, needed {} new blocks", logical, missing);
                return Err(FileSystemError::NoSpace);
            }
        }
    }

    let attach = parent.map(|(block, pointers)| (block, pointers, indices[level - 1]));
    let to_inode = attach.is_none();
    if let Err(e) = write_chain(disk, &claimed, &indices[level..], attach) {
        release_claimed(bitmap, &claimed);
        return Err(e);
    }
    if to_inode {
        inode.ptrs[path.slot] = Some(claimed[0]);
    }

    let block = claimed[missing - 1];
    trace!(
        "block {} -> {} (depth {}, {} new blocks)",
        logical,
        block,
        path.depth,
        missing
    );
    Ok(Resolved::Mapped {
        block,
        offset,
        fresh: true,
    })
}

fn release_claimed(bitmap: &mut DataBlockBitmap, claimed: &[BlockId]) {
    for &block in claimed {
        bitmap.clear(block);
    }
}

// 先自底向上写好新的间接块，最后才挂到已有的父节点 `attach` 上。
// `indices[i]` 是 `claimed[i]` 里指向 `claimed[i + 1]` 的槽位。
fn write_chain<D: BlockDevice + ?Sized>(
    disk: &D,
    claimed: &[BlockId],
    indices: &[usize],
    attach: Option<(BlockId, PointerBlock, usize)>,
) -> Result<()> {
    for i in (0..claimed.len() - 1).rev() {
        let mut pointers = PointerBlock::default();
        pointers.set(indices[i], Some(claimed[i + 1]));
        pointers.write(disk, claimed[i])?;
    }
    if let Some((block, mut pointers, index)) = attach {
        pointers.set(index, Some(claimed[0]));
        pointers.write(disk, block)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Data,
    Pointer,
}

/// 遍历 inode 拥有的所有块，包括各级间接块。子节点先于父节点。
pub fn for_each_block<D, F>(disk: &D, inode: &Inode, mut visit: F) -> Result<()>
where
    D: BlockDevice + ?Sized,
    F: FnMut(BlockId, BlockKind),
{
    for (slot, root) in inode.ptrs.iter().enumerate() {
        if let Some(root) = *root {
            let depth = if slot < DIRECT_PTRS {
                0
            } else {
                slot - DIRECT_PTRS + 1
            };
            walk(disk, root, depth, &mut visit)?;
        }
    }
    Ok(())
}

fn walk<D, F>(disk: &D, block: BlockId, depth: usize, visit: &mut F) -> Result<()>
where
    D: BlockDevice + ?Sized,
    F: FnMut(BlockId, BlockKind),
{
    if depth == 0 {
        visit(block, BlockKind::Data);
        return Ok(());
    }
    let pointers = PointerBlock::read(disk, block)?;
    for child in pointers.live() {
        walk(disk, child, depth - 1, visit)?;
    }
    visit(block, BlockKind::Pointer);
    Ok(())
}

/// 把 inode 拥有的所有块还给位图并清空指针，返回释放的块数
pub fn release_all<D: BlockDevice + ?Sized>(
    disk: &D,
    bitmap: &mut DataBlockBitmap,
    inode: &mut Inode,
) -> Result<u32> {
    let mut released = 0;
    for_each_block(disk, inode, |block, _| {
        bitmap.clear(block);
        released += 1;
    })?;
    inode.ptrs = Default::default();
    Ok(released)
}
