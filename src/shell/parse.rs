use crate::shell::command::Command;
use inode_fs::Whence;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "format" => Some(Command::Format {
            total_blocks: optional(args.first())?,
            inode_blocks: optional(args.get(1))?,
        }),
        "create" => Some(Command::Create),
        "open" => Some(Command::Open(args.first()?.parse().ok()?)),
        "close" => Some(Command::Close(args.first()?.parse().ok()?)),
        "read" => Some(Command::Read(
            args.first()?.parse().ok()?,
            args.get(1)?.parse().ok()?,
        )),
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].parse().ok()?, args[1..].join(" ")))
            } else {
                None
            }
        }
        "seek" => {
            let whence = match args.get(2).copied() {
                None | Some("set") => Whence::Set,
                Some("cur") => Whence::Current,
                Some("end") => Whence::End,
                Some(_) => return None,
            };
            Some(Command::Seek(
                args.first()?.parse().ok()?,
                args.get(1)?.parse().ok()?,
                whence,
            ))
        }
        "delete" | "rm" => Some(Command::Delete(args.first()?.parse().ok()?)),
        "stat" => Some(Command::Stat(args.first()?.parse().ok()?)),
        "ls" => Some(Command::Ls),
        "df" => Some(Command::Df),
        "bitmap" => Some(Command::Bitmap),
        "fsck" => Some(Command::Fsck),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

// 可选数字参数：没给是 Some(None)，给了但不是数字是 None
fn optional(arg: Option<&&str>) -> Option<Option<u32>> {
    match arg {
        None => Some(None),
        Some(s) => s.parse().ok().map(Some),
    }
}
