use inode_fs::{BlockDevice, FileDisk, FileSystem, FileSystemError, MemDisk, Whence};

const SINGLE_START: u64 = 10 * 512;
const DOUBLE_START: u64 = 138 * 512;
const TRIPLE_START: u64 = 16522 * 512;
const MAX_FILE_BYTES: u64 = 2_113_674 * 512;

fn volume(total_blocks: u32, inode_blocks: u32) -> FileSystem<MemDisk> {
    let mut fs = FileSystem::mount(MemDisk::new(total_blocks)).unwrap();
    fs.format(total_blocks, inode_blocks).unwrap();
    fs
}

fn write_at(fs: &mut FileSystem<MemDisk>, fd: usize, pos: u64, data: &[u8]) -> usize {
    fs.seek(fd, pos as i64, Whence::Set).unwrap();
    fs.write(fd, data).unwrap()
}

fn read_at(fs: &mut FileSystem<MemDisk>, fd: usize, pos: u64, len: usize) -> Vec<u8> {
    fs.seek(fd, pos as i64, Whence::Set).unwrap();
    let mut buf = vec![0xEE; len];
    let n = fs.read(fd, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

#[test]
fn layout_of_small_volume() {
    let fs = volume(200, 2);
    let layout = fs.layout();
    assert_eq!(layout.freemap_area_blocks, 0);
    assert_eq!(layout.inode_start(), 1);
    assert_eq!(layout.data_start(), 3);
    assert_eq!(layout.inode_count(), 16);
    assert_eq!(fs.free_blocks(), 197);
}

#[test]
fn full_device_needs_dedicated_bitmap_blocks() {
    let fs = volume(16384, 64);
    let layout = fs.layout();
    // 16384 - 65 = 16319 位，超级块里放 4000，剩下 12319 位要 4 个专用块
    assert_eq!(layout.freemap_area_blocks, 4);
    assert_eq!(layout.inode_start(), 5);
    assert_eq!(layout.data_start(), 69);
    assert_eq!(fs.free_blocks(), 16384 - 69);
}

#[test]
fn data_survives_every_tier_boundary() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    let inumber = fs.inumber_of(fd).unwrap();
    assert_eq!(inumber, 1);

    // 每个位置跨两个逻辑块写，正好压在各级的边界上
    let cases = [
        (SINGLE_START - 2, b"direct|single".as_slice()),
        (DOUBLE_START - 3, b"single|double".as_slice()),
        (TRIPLE_START - 1, b"double|triple".as_slice()),
    ];
    for (pos, data) in cases {
        assert_eq!(write_at(&mut fs, fd, pos, data), data.len());
    }
    for (pos, data) in cases {
        assert_eq!(read_at(&mut fs, fd, pos, data.len()), data);
    }

    let stat = fs.stat(inumber).unwrap();
    assert!(stat.open);
    assert_eq!(stat.size, TRIPLE_START - 1 + 13);
    // 每个位置两个数据块；间接块：单级 1，二级 1 + 2，三级 3
    assert_eq!(stat.data_blocks, 6);
    assert_eq!(stat.pointer_blocks, 7);
    assert_eq!(fs.free_blocks(), 197 - 13);
    assert!(fs.check().unwrap().is_consistent());
}

#[test]
fn first_block_of_each_tier() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();

    write_at(&mut fs, fd, SINGLE_START, b"abc");
    assert_eq!(fs.free_blocks(), 197 - 2);
    write_at(&mut fs, fd, DOUBLE_START, b"abc");
    assert_eq!(fs.free_blocks(), 197 - 2 - 3);
    write_at(&mut fs, fd, TRIPLE_START, b"abc");
    assert_eq!(fs.free_blocks(), 197 - 2 - 3 - 4);

    // 同一个单级间接块下的下一个数据块只需要 1 个新块
    write_at(&mut fs, fd, SINGLE_START + 512, b"abc");
    assert_eq!(fs.free_blocks(), 197 - 10);

    assert_eq!(read_at(&mut fs, fd, TRIPLE_START, 3), b"abc");
    assert_eq!(read_at(&mut fs, fd, 0, 4), vec![0; 4]);
}

#[test]
fn holes_read_as_zeros_without_touching_the_disk() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    let tail = DOUBLE_START + 512 * 200 + 100;
    write_at(&mut fs, fd, tail, b"tail");

    let free = fs.free_blocks();
    let writes = fs.disk().writes();

    assert_eq!(read_at(&mut fs, fd, 0, 600), vec![0; 600]);
    assert_eq!(read_at(&mut fs, fd, SINGLE_START + 7, 512), vec![0; 512]);
    // 二级间接块在，第 0 项的中间块不在
    assert_eq!(read_at(&mut fs, fd, DOUBLE_START, 512), vec![0; 512]);
    // 中间块在，这一项是空的
    assert_eq!(read_at(&mut fs, fd, DOUBLE_START + 512 * 129, 512), vec![0; 512]);
    assert_eq!(read_at(&mut fs, fd, tail - 100, 104), {
        let mut expected = vec![0; 100];
        expected.extend_from_slice(b"tail");
        expected
    });
    assert_eq!(read_at(&mut fs, fd, tail + 4, 4), Vec::<u8>::new());

    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.disk().writes(), writes);
}

#[test]
fn reused_blocks_start_from_zeros() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    let first = fs.inumber_of(fd).unwrap();
    write_at(&mut fs, fd, 0, &[0xAB; 512]);
    fs.close(fd).unwrap();
    fs.delete(first).unwrap();

    // 新文件拿到同一个物理块，旧内容不能漏出来
    let fd = fs.create().unwrap();
    write_at(&mut fs, fd, 10, b"x");
    assert_eq!(read_at(&mut fs, fd, 0, 11), {
        let mut expected = vec![0; 10];
        expected.push(b'x');
        expected
    });
}

#[test]
fn read_stops_at_end_of_file() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    write_at(&mut fs, fd, 0, b"hello");

    assert_eq!(read_at(&mut fs, fd, 2, 100), b"llo");
    assert_eq!(read_at(&mut fs, fd, 5, 10), Vec::<u8>::new());
    assert_eq!(read_at(&mut fs, fd, 1000, 10), Vec::<u8>::new());

    // 读完之后位置停在文件末尾
    fs.seek(fd, 0, Whence::Set).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
    assert_eq!(fs.seek(fd, 0, Whence::Current).unwrap(), 5);
}

#[test]
fn allocation_failure_rolls_back() {
    // 8 块：超级块 + 1 个 inode 块 + 6 个数据块
    let mut fs = volume(8, 1);
    assert_eq!(fs.layout().data_start(), 2);
    let fd = fs.create().unwrap();
    write_at(&mut fs, fd, 0, &[1; 3 * 512]);
    assert_eq!(fs.free_blocks(), 3);

    // 三级间接需要 4 个块，只剩 3 个
    fs.seek(fd, TRIPLE_START as i64, Whence::Set).unwrap();
    assert!(matches!(fs.write(fd, b"z"), Err(FileSystemError::NoSpace)));
    assert_eq!(fs.free_blocks(), 3);

    let inumber = fs.inumber_of(fd).unwrap();
    let stat = fs.stat(inumber).unwrap();
    assert_eq!(stat.size, 3 * 512);
    assert_eq!(stat.pointer_blocks, 0);
    assert!(fs.check().unwrap().is_consistent());

    // 剩下的空间还能正常用
    assert_eq!(write_at(&mut fs, fd, 3 * 512, &[2; 3 * 512]), 3 * 512);
    assert_eq!(fs.free_blocks(), 0);
}

#[test]
fn write_returns_short_count_when_disk_fills() {
    let mut fs = volume(8, 1);
    let fd = fs.create().unwrap();

    let data = vec![7u8; 7 * 512];
    assert_eq!(fs.write(fd, &data).unwrap(), 6 * 512);
    assert_eq!(fs.free_blocks(), 0);
    assert_eq!(fs.seek(fd, 0, Whence::Current).unwrap(), 6 * 512);

    let inumber = fs.inumber_of(fd).unwrap();
    assert_eq!(fs.stat(inumber).unwrap().size, 6 * 512);
    assert!(matches!(fs.write(fd, b"more"), Err(FileSystemError::NoSpace)));

    // 已经映射的块还能覆盖写
    assert_eq!(write_at(&mut fs, fd, 0, b"over"), 4);
    assert_eq!(read_at(&mut fs, fd, 0, 6), b"over\x07\x07");
    assert!(fs.check().unwrap().is_consistent());
}

#[test]
fn write_stops_at_maximum_file_size() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();

    assert_eq!(write_at(&mut fs, fd, MAX_FILE_BYTES - 2, b"edge"), 2);
    let inumber = fs.inumber_of(fd).unwrap();
    assert_eq!(fs.stat(inumber).unwrap().size, MAX_FILE_BYTES);

    fs.seek(fd, MAX_FILE_BYTES as i64, Whence::Set).unwrap();
    assert!(matches!(
        fs.write(fd, b"x"),
        Err(FileSystemError::OffsetTooLarge(_))
    ));
    assert_eq!(read_at(&mut fs, fd, MAX_FILE_BYTES - 2, 8), b"ed");
}

#[test]
fn delete_releases_data_and_pointer_blocks() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    let inumber = fs.inumber_of(fd).unwrap();
    for pos in [0, SINGLE_START, DOUBLE_START + 512 * 300, TRIPLE_START + 512 * 20_000] {
        write_at(&mut fs, fd, pos, &[3; 700]);
    }
    assert!(fs.free_blocks() < 197);

    assert!(matches!(
        fs.delete(inumber),
        Err(FileSystemError::FileOpen { inumber: 1, fd: 0 })
    ));
    fs.close(fd).unwrap();
    fs.delete(inumber).unwrap();

    assert_eq!(fs.free_blocks(), 197);
    assert!(fs.check().unwrap().is_consistent());
    assert!(matches!(fs.open(inumber), Err(FileSystemError::FileNotFound(1))));
    assert!(matches!(fs.delete(inumber), Err(FileSystemError::FileNotFound(1))));
    assert!(matches!(fs.stat(inumber), Err(FileSystemError::FileNotFound(1))));

    // inode 可以被重新分配
    let fd = fs.create().unwrap();
    assert_eq!(fs.inumber_of(fd).unwrap(), inumber);
    assert_eq!(fs.stat(inumber).unwrap().size, 0);
}

#[test]
fn inode_table_runs_out() {
    let mut fs = volume(200, 1);
    let mut last = 0;
    for _ in 0..8 {
        let fd = fs.create().unwrap();
        last = fs.inumber_of(fd).unwrap();
        fs.close(fd).unwrap();
    }
    // 最后一个 inode 也能用
    assert_eq!(last, 8);
    assert!(matches!(fs.create(), Err(FileSystemError::NoFreeInode)));

    fs.delete(3).unwrap();
    let fd = fs.create().unwrap();
    assert_eq!(fs.inumber_of(fd).unwrap(), 3);
}

#[test]
fn handle_table_runs_out() {
    let mut fs = volume(200, 8);
    let fds: Vec<usize> = (0..32).map(|_| fs.create().unwrap()).collect();
    assert_eq!(fds, (0..32).collect::<Vec<_>>());

    assert!(matches!(fs.create(), Err(FileSystemError::NoHandles)));
    assert!(matches!(fs.open(1), Err(FileSystemError::NoHandles)));
    // 句柄不够时不能白白占掉一个 inode
    assert!(matches!(fs.stat(33), Err(FileSystemError::FileNotFound(33))));

    fs.close(7).unwrap();
    assert_eq!(fs.open(1).unwrap(), 7);
}

#[test]
fn same_file_opened_twice_has_independent_offsets() {
    let mut fs = volume(200, 2);
    let a = fs.create().unwrap();
    write_at(&mut fs, a, 0, b"shared");
    fs.close(a).unwrap();

    let a = fs.open(1).unwrap();
    let b = fs.open(1).unwrap();
    assert_ne!(a, b);
    fs.seek(a, 3, Whence::Set).unwrap();
    let mut buf = [0u8; 3];
    fs.read(b, &mut buf).unwrap();
    assert_eq!(&buf, b"sha");
    assert_eq!(fs.seek(a, 0, Whence::Current).unwrap(), 3);
}

#[test]
fn handles_on_one_file_share_block_allocations() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    fs.close(fd).unwrap();

    let a = fs.open(1).unwrap();
    let b = fs.open(1).unwrap();
    assert_eq!(fs.write(a, b"AAAA").unwrap(), 4);
    // b 还在偏移 0，写进同一个块，不会再分配
    assert_eq!(fs.write(b, b"BBBB").unwrap(), 4);
    assert_eq!(fs.free_blocks(), 196);

    // a 分配的间接块对 b 立即可见
    write_at(&mut fs, a, SINGLE_START, b"x");
    assert_eq!(read_at(&mut fs, b, SINGLE_START, 1), b"x");
    assert_eq!(read_at(&mut fs, b, 0, 4), b"BBBB");
    assert_eq!(fs.free_blocks(), 194);

    fs.close(a).unwrap();
    let stat = fs.stat(1).unwrap();
    assert!(stat.open);
    assert_eq!(stat.size, SINGLE_START + 1);
    fs.close(b).unwrap();

    assert!(fs.check().unwrap().is_consistent());
    assert_eq!(fs.stat(1).unwrap().data_blocks, 2);
    fs.delete(1).unwrap();
    assert_eq!(fs.free_blocks(), 197);
    assert!(fs.check().unwrap().is_consistent());
}

#[test]
fn seek_beyond_u64_is_rejected() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();

    assert_eq!(fs.seek(fd, i64::MAX, Whence::Set).unwrap(), i64::MAX as u64);
    assert_eq!(fs.seek(fd, i64::MAX, Whence::Current).unwrap(), u64::MAX - 1);
    assert!(matches!(
        fs.seek(fd, i64::MAX, Whence::Current),
        Err(FileSystemError::OffsetTooLarge(_))
    ));
    assert_eq!(fs.seek(fd, 0, Whence::Current).unwrap(), u64::MAX - 1);

    let mut buf = [0u8; 4];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    assert!(matches!(fs.write(fd, b"x"), Err(FileSystemError::OffsetTooLarge(_))));
}

#[test]
fn seek_relative_positions() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    fs.write(fd, b"0123456789").unwrap();

    assert_eq!(fs.seek(fd, -3, Whence::End).unwrap(), 7);
    assert_eq!(fs.seek(fd, 2, Whence::Current).unwrap(), 9);
    assert_eq!(fs.seek(fd, 100, Whence::End).unwrap(), 110);
    assert_eq!(fs.seek(fd, 4, Whence::Set).unwrap(), 4);

    let mut buf = [0u8; 3];
    fs.read(fd, &mut buf).unwrap();
    assert_eq!(&buf, b"456");

    assert!(matches!(
        fs.seek(fd, -20, Whence::Current),
        Err(FileSystemError::NegativeOffset(-13))
    ));
    assert!(matches!(
        fs.seek(fd, -1, Whence::Set),
        Err(FileSystemError::NegativeOffset(-1))
    ));
    // 失败的 seek 不改变位置
    assert_eq!(fs.seek(fd, 0, Whence::Current).unwrap(), 7);
}

#[test]
fn bad_inumbers_and_handles() {
    let mut fs = volume(200, 2);
    assert!(matches!(fs.open(0), Err(FileSystemError::InvalidInumber(0))));
    assert!(matches!(fs.open(17), Err(FileSystemError::InvalidInumber(17))));
    assert!(matches!(fs.delete(17), Err(FileSystemError::InvalidInumber(17))));
    assert!(matches!(fs.open(16), Err(FileSystemError::FileNotFound(16))));

    let mut buf = [0u8; 4];
    assert!(matches!(fs.read(5, &mut buf), Err(FileSystemError::InvalidHandle(5))));
    assert!(matches!(fs.write(5, b"x"), Err(FileSystemError::InvalidHandle(5))));
    assert!(matches!(fs.seek(5, 0, Whence::Set), Err(FileSystemError::InvalidHandle(5))));

    let fd = fs.create().unwrap();
    fs.close(fd).unwrap();
    assert!(matches!(fs.close(fd), Err(FileSystemError::InvalidHandle(_))));
}

#[test]
fn unformatted_device_rejects_file_operations() {
    let mut fs = FileSystem::mount(MemDisk::new(64)).unwrap();
    assert!(!fs.layout().is_formatted());
    assert!(matches!(fs.create(), Err(FileSystemError::NotFormatted)));
    assert!(matches!(fs.open(1), Err(FileSystemError::NotFormatted)));
    assert!(matches!(fs.delete(1), Err(FileSystemError::NotFormatted)));
    assert!(matches!(fs.check(), Err(FileSystemError::NotFormatted)));

    fs.format(64, 1).unwrap();
    assert!(fs.create().is_ok());
}

#[test]
fn format_rejects_impossible_layouts() {
    let mut fs = FileSystem::mount(MemDisk::new(200)).unwrap();
    assert!(matches!(fs.format(300, 2), Err(FileSystemError::Capacity(_))));
    assert!(matches!(fs.format(10, 10), Err(FileSystemError::Capacity(_))));
    assert!(!fs.layout().is_formatted());

    // 元数据正好占满整个卷也是合法的
    fs.format(11, 10).unwrap();
    assert_eq!(fs.free_blocks(), 0);
}

#[test]
fn format_discards_files_and_handles() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    write_at(&mut fs, fd, 0, b"gone");

    let mut progress = Vec::new();
    fs.format_with(100, 1, |done, total| progress.push((done, total)))
        .unwrap();
    assert_eq!(progress.first(), Some(&(1, 2)));
    assert_eq!(progress.last(), Some(&(2, 2)));

    assert_eq!(fs.open_files().count(), 0);
    assert!(matches!(fs.read(fd, &mut [0u8; 4]), Err(FileSystemError::InvalidHandle(0))));
    assert!(matches!(fs.open(1), Err(FileSystemError::FileNotFound(1))));
    assert_eq!(fs.free_blocks(), 98);
}

#[test]
fn volume_survives_remount() {
    let mut fs = volume(200, 2);
    let fd = fs.create().unwrap();
    write_at(&mut fs, fd, 0, b"persist me");
    write_at(&mut fs, fd, DOUBLE_START, b"deep");
    let other = fs.create().unwrap();
    fs.close(other).unwrap();
    fs.delete(2).unwrap();
    let free = fs.free_blocks();
    // 不手动 close，shutdown 负责把 inode 写回
    let disk = fs.shutdown().unwrap();

    let mut fs = FileSystem::mount(disk).unwrap();
    assert_eq!(fs.layout().data_start(), 3);
    assert_eq!(fs.free_blocks(), free);
    let fd = fs.open(1).unwrap();
    assert_eq!(read_at(&mut fs, fd, 0, 10), b"persist me");
    assert_eq!(read_at(&mut fs, fd, DOUBLE_START, 4), b"deep");
    assert!(matches!(fs.open(2), Err(FileSystemError::FileNotFound(2))));
    assert!(fs.check().unwrap().is_consistent());
}

#[test]
fn bitmap_blocks_beyond_the_superblock_persist() {
    let mut fs = volume(16384, 64);
    let fd = fs.create().unwrap();
    // 4100 个数据块加上各级间接块，超出超级块内嵌的 4000 位
    let data = vec![9u8; 4100 * 512];
    assert_eq!(fs.write(fd, &data).unwrap(), data.len());
    let free = fs.free_blocks();
    assert!(free < 16384 - 69 - 4100);
    let disk = fs.shutdown().unwrap();

    let mut fs = FileSystem::mount(disk).unwrap();
    assert_eq!(fs.free_blocks(), free);
    assert!(fs.check().unwrap().is_consistent());

    let fd = fs.open(1).unwrap();
    assert_eq!(read_at(&mut fs, fd, 4099 * 512, 512), vec![9u8; 512]);
}

#[test]
fn file_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    {
        let disk = FileDisk::open(&path, 128).unwrap();
        let mut fs = FileSystem::mount(disk).unwrap();
        fs.format(128, 2).unwrap();
        let fd = fs.create().unwrap();
        fs.seek(fd, SINGLE_START as i64, Whence::Set).unwrap();
        fs.write(fd, b"on a real file").unwrap();
        fs.shutdown().unwrap();
    }

    let disk = FileDisk::open(&path, 128).unwrap();
    assert_eq!(disk.block_count(), 128);
    let mut fs = FileSystem::mount(disk).unwrap();
    let fd = fs.open(1).unwrap();
    fs.seek(fd, SINGLE_START as i64, Whence::Set).unwrap();
    let mut buf = [0u8; 14];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 14);
    assert_eq!(&buf, b"on a real file");
}
