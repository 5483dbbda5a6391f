use std::collections::BTreeMap;

use crate::fs::{
    error::{FileSystemError, Result},
    inode_table::Inode,
};

/// 一个打开的句柄：inumber + 读写位置
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub inumber: u32,
    pub seek_pointer: u64,
}

// 同一个文件的所有句柄共用一份 inode，最后一个句柄关闭时才丢掉
#[derive(Debug)]
struct SharedInode {
    inode: Inode,
    handles: usize,
}

/// 打开文件表，文件句柄就是槽位下标。
/// inode 快照按 inumber 存一份，close 时写回 inode 表。
#[derive(Debug)]
pub struct FileTable {
    slots: Vec<Option<OpenFile>>,
    inodes: BTreeMap<u32, SharedInode>,
}

impl FileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            inodes: BTreeMap::new(),
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// 占用编号最小的空槽。文件已经打开时沿用内存里那份 inode，`inode` 被忽略。
    pub fn allocate(&mut self, inode: Inode, inumber: u32) -> Result<usize> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FileSystemError::NoHandles)?;
        self.slots[fd] = Some(OpenFile {
            inumber,
            seek_pointer: 0,
        });
        self.inodes
            .entry(inumber)
            .or_insert(SharedInode { inode, handles: 0 })
            .handles += 1;
        Ok(fd)
    }

    /// 释放句柄，返回它打开的 inumber
    pub fn free(&mut self, fd: usize) -> Option<u32> {
        let file = self.slots.get_mut(fd).and_then(Option::take)?;
        if let Some(shared) = self.inodes.get_mut(&file.inumber) {
            shared.handles -= 1;
            if shared.handles == 0 {
                self.inodes.remove(&file.inumber);
            }
        }
        Some(file.inumber)
    }

    pub fn get(&self, fd: usize) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FileSystemError::InvalidHandle(fd))
    }

    /// 句柄和它共用的 inode，读写都走这里
    pub fn get_mut(&mut self, fd: usize) -> Result<(&mut OpenFile, &mut Inode)> {
        let file = self
            .slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FileSystemError::InvalidHandle(fd))?;
        let shared = self.inodes.get_mut(&file.inumber).ok_or_else(|| {
            FileSystemError::Corrupted(format!("fd {} has no open inode", fd))
        })?;
        Ok((file, &mut shared.inode))
    }

    /// 打开中的 inode，没打开返回 None
    pub fn inode(&self, inumber: u32) -> Option<&Inode> {
        self.inodes.get(&inumber).map(|shared| &shared.inode)
    }

    /// 打开了 `inumber` 的第一个句柄
    pub fn fd_of(&self, inumber: u32) -> Option<usize> {
        self.iter()
            .find(|(_, file, _)| file.inumber == inumber)
            .map(|(fd, _, _)| fd)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &OpenFile, &Inode)> {
        self.slots.iter().enumerate().filter_map(|(fd, slot)| {
            let file = slot.as_ref()?;
            let shared = self.inodes.get(&file.inumber)?;
            Some((fd, file, &shared.inode))
        })
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.inodes.clear();
    }
}
