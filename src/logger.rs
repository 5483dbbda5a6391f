use chrono::Local;
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

// 日志级别从这个环境变量读取：error / warn / info / debug / trace
const LOG_ENV: &str = "INODE_FS_LOG";

struct ShellLogger;

static LOGGER: ShellLogger = ShellLogger;

impl Log for ShellLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green(),
            Level::Debug => "DEBUG".blue(),
            Level::Trace => "TRACE".bright_black(),
        };
        eprintln!(
            "{} {} {}",
            Local::now().format("%H:%M:%S%.3f").to_string().bright_black(),
            level,
            record.args()
        );
    }

    fn flush(&self) {}
}

/// 安装日志输出到 stderr，默认只显示 warn 及以上
pub fn init() {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
