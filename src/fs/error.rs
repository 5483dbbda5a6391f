use std::fmt;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),                  // 底层 I/O 错误
    Encoding(bincode::Error),            // 盘上记录编解码失败
    Capacity(String),                    // format 时元数据放不下，或超过设备容量
    NotFormatted,                        // 卷还没有 format
    NoHandles,                           // 打开文件表已满
    NoFreeInode,                         // inode 已满
    NoSpace,                             // 数据块已满
    InvalidInumber(u32),                 // inumber 越界
    InvalidHandle(usize),                // 文件句柄无效
    FileNotFound(u32),                   // inode 未分配
    FileOpen { inumber: u32, fd: usize }, // 文件仍被打开，不能删除
    NegativeOffset(i64),                 // seek 结果为负
    OffsetTooLarge(u64),                 // 超出三级间接能寻址的范围
    Corrupted(String),                   // 文件系统损坏
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Encoding(e)
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::Encoding(e) => write!(f, "On-disk record encoding error: {}", e),
            Self::Capacity(desc) => write!(f, "Capacity error: {}", desc),
            Self::NotFormatted => write!(f, "Volume is not formatted"),
            Self::NoHandles => write!(f, "No free file handle available"),
            Self::NoFreeInode => write!(f, "No free inode available"),
            Self::NoSpace => write!(f, "File system is full"),
            Self::InvalidInumber(inumber) => write!(f, "Invalid inumber: {}", inumber),
            Self::InvalidHandle(fd) => write!(f, "Invalid file handle: {}", fd),
            Self::FileNotFound(inumber) => write!(f, "File {} does not exist", inumber),
            Self::FileOpen { inumber, fd } => {
                write!(f, "Cannot delete open file {} (fd = {})", inumber, fd)
            }
            Self::NegativeOffset(pos) => write!(f, "Cannot seek to offset {} < 0", pos),
            Self::OffsetTooLarge(pos) => write!(f, "Offset {} exceeds maximum file size", pos),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
