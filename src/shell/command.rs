use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use inode_fs::{disk::BLOCK_SIZE, BlockDevice, FileDisk, FileSystem, Whence};
use std::error::Error;

// format 不带参数时的默认值：整个设备，64 个 inode 块（512 个文件）
pub const DEFAULT_INODE_BLOCKS: u32 = 64;

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Format {
        total_blocks: Option<u32>,
        inode_blocks: Option<u32>,
    },
    Create,
    Open(u32),
    Close(usize),
    Read(usize, usize),
    Write(usize, String),
    Seek(usize, i64, Whence),
    Delete(u32),
    Stat(u32),
    Ls,
    Df,
    Bitmap,
    Fsck,
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &mut FileSystem<FileDisk>) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Format {
            total_blocks,
            inode_blocks,
        } => format(fs, *total_blocks, *inode_blocks)?,
        Command::Create => {
            let fd = fs.create()?;
            println!(
                "📝 Created file {} (fd {})",
                fs.inumber_of(fd)?.to_string().green(),
                fd.to_string().cyan()
            );
        }
        Command::Open(inumber) => {
            let fd = fs.open(*inumber)?;
            println!("📂 Opened file {} as fd {}", inumber, fd.to_string().cyan());
        }
        Command::Close(fd) => {
            fs.close(*fd)?;
            println!("✅ Closed fd {}", fd);
        }
        Command::Read(fd, len) => {
            let mut buf = vec![0u8; *len];
            let n = fs.read(*fd, &mut buf)?;
            // 空洞里的 0 显示成点
            let text: String = String::from_utf8_lossy(&buf[..n])
                .chars()
                .map(|c| if c == '\0' { '·' } else { c })
                .collect();
            println!("📖 {} bytes", n.to_string().cyan());
            println!("{}", text);
        }
        Command::Write(fd, text) => {
            let n = fs.write(*fd, text.as_bytes())?;
            if n < text.len() {
                println!(
                    "{} wrote {} of {} bytes",
                    "⚠️  Disk full:".yellow(),
                    n,
                    text.len()
                );
            } else {
                println!("✏️  Wrote {} bytes", n.to_string().green());
            }
        }
        Command::Seek(fd, offset, whence) => {
            let pos = fs.seek(*fd, *offset, *whence)?;
            println!("📍 fd {} now at offset {}", fd, pos.to_string().cyan());
        }
        Command::Delete(inumber) => {
            fs.delete(*inumber)?;
            println!("🗑️  Deleted file {}", inumber.to_string().red());
        }
        Command::Stat(inumber) => {
            let stat = fs.stat(*inumber)?;
            println!(
                "{}\n{}: {}\n{}: {} bytes\n{}: {}\n{}: {}\n{}: {}\n",
                "📊 File Info".bright_yellow().bold(),
                "Inumber".blue(),
                stat.inumber,
                "Size".blue(),
                stat.size,
                "Data blocks".blue(),
                stat.data_blocks,
                "Pointer blocks".blue(),
                stat.pointer_blocks,
                "Open".blue(),
                if stat.open { "yes" } else { "no" }
            );
        }
        Command::Ls => {
            let mut any = false;
            for (fd, file, inode) in fs.open_files() {
                any = true;
                println!(
                    "📄 fd {:<3} file {:<5} offset {:<10} size {}",
                    fd.to_string().cyan(),
                    file.inumber,
                    file.seek_pointer,
                    inode.size
                );
            }
            if !any {
                println!("{}", "(no open files)".bright_black());
            }
        }
        Command::Df => {
            let layout = fs.layout();
            let free = fs.free_blocks();
            let total = layout.data_blocks();
            println!(
                "{}\n{}: {} x {} bytes\n{}: {}\n{}: {} ({} inodes)\n{}: {}\n{}: {} used, {} free\n",
                "💽 Volume".bright_yellow().bold(),
                "Blocks".blue(),
                layout.total_blocks,
                BLOCK_SIZE,
                "Free-map blocks".blue(),
                layout.freemap_area_blocks,
                "Inode blocks".blue(),
                layout.inode_area_blocks,
                layout.inode_count(),
                "Data starts at".blue(),
                layout.data_start(),
                "Data blocks".blue(),
                total - free,
                free.to_string().green()
            );
        }
        Command::Bitmap => println!("{}", fs.bitmap_string()),
        Command::Fsck => {
            let report = fs.check()?;
            if report.is_consistent() {
                println!("{}", "✅ Bitmap and inodes agree".green());
            } else {
                println!("{}", "❌ Volume is inconsistent".red().bold());
                println!("  {}: {:?}", "leaked".yellow(), report.leaked);
                println!("  {}: {:?}", "missing".yellow(), report.missing);
                println!("  {}: {:?}", "shared".yellow(), report.shared);
                println!("  {}: {:?}", "out of range".yellow(), report.out_of_range);
            }
        }
        Command::Exit => println!("{}", "👋 Exiting inode-fs shell...".yellow().bold()),
    }

    Ok(())
}

fn format(
    fs: &mut FileSystem<FileDisk>,
    total_blocks: Option<u32>,
    inode_blocks: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let total_blocks = total_blocks.unwrap_or_else(|| fs.disk().block_count());
    let inode_blocks = inode_blocks.unwrap_or(DEFAULT_INODE_BLOCKS);

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Format {} blocks with {} inode blocks? All files will be lost",
            total_blocks, inode_blocks
        ))
        .default(false)
        .interact()?;
    if !confirmed {
        println!("{}", "Format cancelled".bright_black());
        return Ok(());
    }

    println!("💾 Formatting virtual disk...");
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    let result = fs.format_with(total_blocks, inode_blocks, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    });

    match result {
        Ok(()) => {
            pb.finish_with_message("✅ Disk formatted successfully!");
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}

fn print_help() {
    println!("{}", "📘 inode-fs Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format [blocks] [inode_blocks]   Format the virtual disk
  create                           Create an empty file and open it
  open <inumber>                   Open a file, prints its fd
  close <fd>                       Close a file handle
  read <fd> <len>                  Read up to len bytes at the current offset
  write <fd> <text>                Write text at the current offset
  seek <fd> <offset> [set|cur|end] Move the offset of a handle
  delete <inumber>                 Delete a closed file
  stat <inumber>                   Show file info
  ls                               List open handles
  df                               Show volume layout and free space
  bitmap                           Dump the data-block bitmap
  fsck                             Check bitmap against inodes
  help                             Show this help message
  exit                             Quit the shell
"
        .bright_black()
    );
}
