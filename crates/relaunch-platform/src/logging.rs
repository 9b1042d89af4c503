#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default cap on the log file before it is trimmed at start-up.
pub const DEFAULT_MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// Append-only log file that is recreated when something deletes it while
/// the process is running. `WriteLogger` serializes access, so no lock is
/// needed here.
struct ReopeningLogFile {
    path: PathBuf,
    file: File,
}

impl ReopeningLogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = append_to(&path)?;
        Ok(Self { path, file })
    }

    fn reopen_if_removed(&mut self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.file = append_to(&self.path)?;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for ReopeningLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reopen_if_removed()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Drop the older half of `log_path` once it grows past `limit`, cutting at
/// a line boundary so the first kept record is whole.
fn shrink_log(log_path: &Path, limit: u64) {
    let too_big = std::fs::metadata(log_path).is_ok_and(|meta| meta.len() > limit);
    if !too_big {
        return;
    }
    let Ok(contents) = std::fs::read(log_path) else {
        return;
    };
    let middle = contents.len() / 2;
    let cut = contents[middle..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(middle, |offset| middle + offset + 1);
    if let Err(error) = std::fs::write(log_path, &contents[cut..]) {
        eprintln!("could not shrink {}: {error}", log_path.display());
    }
}

/// Install the global logger: a file logger at `log_path` and, in debug
/// builds, a terminal logger. Calling it twice keeps the first logger.
pub fn init_logging(log_path: &Path, debug_enabled: bool, max_log_size: u64) {
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    shrink_log(log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("relaunch")
        .build();

    let file_logger = ReopeningLogFile::open(log_path.to_path_buf())
        .ok()
        .map(|writer| WriteLogger::new(LevelFilter::Debug, config.clone(), writer));

    #[cfg(debug_assertions)]
    {
        let term_logger = TermLogger::new(
            LevelFilter::Debug,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        );

        if let Some(file_logger) = file_logger {
            let _ = CombinedLogger::init(vec![term_logger, file_logger]);
        } else {
            let _ = CombinedLogger::init(vec![term_logger]);
        }
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(file_logger) = file_logger {
            let _ = CombinedLogger::init(vec![file_logger]);
        }
    }

    set_debug_logging(debug_enabled);
    log::debug!("Debug logging initialized, log file: {}", log_path.display());
}

pub fn set_debug_logging(enabled: bool) {
    if enabled {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
}
