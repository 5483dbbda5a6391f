pub mod boot;
pub mod command;
pub mod parse;

use crate::shell::{boot::perform_disk_initialization, command::execute_command, parse::parse_command};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use inode_fs::{FileDisk, FileSystem, FileSystemError};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{io::stdout, path::PathBuf, sync::mpsc, thread};

/// 启动线程发回来的进度
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem<FileDisk>, FileSystemError>),
}

pub const COMMANDS: [&str; 15] = [
    "help", "format", "create", "open", "close", "read", "write", "seek", "delete", "stat", "ls",
    "df", "bitmap", "fsck", "exit",
];

pub fn start_shell() {
    let Some(mut fs) = boot() else {
        return;
    };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".inode_fs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => println!("{} {}", "⚠️  History disabled:".yellow(), e),
    }

    // 命令补全
    let completer =
        DefaultCompleter::new_with_wordlen(COMMANDS.iter().map(|c| c.to_string()).collect(), 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!("{}@{}", username, hostname)),
            DefaultPromptSegment::Basic(format!("{} free", fs.free_blocks())),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or bad arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting inode-fs...".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    // 保存位图、关闭所有文件
    match fs.shutdown() {
        Ok(_) => println!("{}", "GoodBye!".bright_yellow()),
        Err(e) => println!("{} {}", "❌ Shutdown failed:".red().bold(), e),
    }
}

/// 启动画面 + 后台挂载
fn boot() -> Option<FileSystem<FileDisk>> {
    let mut stdout = stdout();
    let _ = execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0));
    println!("{}", "[inode-fs Booting...]".bright_yellow().bold());

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || perform_disk_initialization(tx));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    for message in rx {
        match message {
            BootProgress::Step(step) => pb.set_message(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(Ok(fs)) => {
                pb.finish_with_message("✅ Ready!");
                let _ = execute!(
                    stdout,
                    SetForegroundColor(Color::Cyan),
                    Print(format!("Welcome to inode-fs v{}\n", env!("CARGO_PKG_VERSION"))),
                    ResetColor
                );
                if !fs.layout().is_formatted() {
                    println!(
                        "{}",
                        "💡 The disk is blank. Run 'format' to create a file system.".yellow()
                    );
                }
                return Some(fs);
            }
            BootProgress::Finished(Err(e)) => {
                pb.abandon_with_message("❌ Boot failed");
                println!("{} {}", "❌ Error:".red().bold(), e);
                return None;
            }
        }
    }
    None
}
