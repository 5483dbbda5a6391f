use std::{env, path::PathBuf, sync::mpsc::Sender};

use inode_fs::{disk::BLOCK_COUNT, FileDisk, FileSystem};

use crate::shell::BootProgress;

// 磁盘镜像路径可以用这个环境变量覆盖
const DISK_ENV: &str = "INODE_FS_DISK";
const DEFAULT_DISK_PATH: &str = "disk.img";

pub fn disk_path() -> PathBuf {
    env::var_os(DISK_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DISK_PATH))
}

// 在后台线程里打开镜像并挂载，进度通过 channel 发回给 shell
pub fn perform_disk_initialization(tx: Sender<BootProgress>) {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual disk..."));

    let disk = match FileDisk::open(disk_path(), BLOCK_COUNT) {
        Ok(d) => d,
        Err(e) => {
            let _ = tx.send(BootProgress::Finished(Err(e.into())));
            return;
        }
    };
    let _ = tx.send(BootProgress::Progress(50));

    let _ = tx.send(BootProgress::Step("⚙️  Mounting file system..."));
    let result = FileSystem::mount(disk);

    let _ = tx.send(BootProgress::Progress(100));
    let _ = tx.send(BootProgress::Finished(result));
}
