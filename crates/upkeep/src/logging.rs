use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::LevelFilter;
#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, Config, ConfigBuilder, SharedLogger, WriteLogger};
use upkeep_platform::AppPaths;

/// Appends to a log file, reopening it if it was deleted while running.
struct ReopeningFile {
    path: PathBuf,
    file: File,
}

impl ReopeningFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = open_append(&path)?;
        Ok(Self { path, file })
    }

    fn reopen_if_removed(&mut self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.file = open_append(&self.path)?;
        Ok(())
    }
}

impl Write for ReopeningFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reopen_if_removed()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Drop the older half of `log_path` once it exceeds `max_log_size`,
/// cutting at a line boundary. Returns whether the file was trimmed.
fn trim_to_recent_half(log_path: &Path, max_log_size: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if size <= max_log_size {
        return Ok(false);
    }

    let contents = std::fs::read(log_path)?;
    let (_, newer) = contents.split_at(contents.len() / 2);
    let start = newer
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(0, |newline| newline + 1);
    std::fs::write(log_path, &newer[start..])?;
    Ok(true)
}

fn logger_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("upkeep")
        .build()
}

/// Install the global logger writing to the data directory's log file.
///
/// Debug builds also log to the terminal. Returns the log file path when
/// file logging is active.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) -> Option<PathBuf> {
    let log_path = AppPaths::new().ok().and_then(|paths| {
        paths.ensure_dirs().ok()?;
        Some(paths.log_file())
    });
    init_logging_at(log_path, debug_enabled, max_log_size)
}

fn init_logging_at(
    log_path: Option<PathBuf>,
    debug_enabled: bool,
    max_log_size: u64,
) -> Option<PathBuf> {
    let config = logger_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    let log_path = log_path.and_then(|path| {
        let logger = file_logger(&path, max_log_size, config)?;
        loggers.push(logger);
        Some(path)
    });

    if !loggers.is_empty() && CombinedLogger::init(loggers).is_err() {
        log::debug!("Logger already installed");
    }

    set_logging_enabled(debug_enabled);
    if let Some(path) = &log_path {
        log::info!("Logging to {}", path.display());
    }
    log_path
}

fn file_logger(
    path: &Path,
    max_log_size: u64,
    config: Config,
) -> Option<Box<dyn SharedLogger>> {
    if let Err(error) = trim_to_recent_half(path, max_log_size) {
        eprintln!("Cannot trim log file {}: {error}", path.display());
    }
    match ReopeningFile::open(path.to_path_buf()) {
        Ok(writer) => Some(WriteLogger::new(LevelFilter::Debug, config, writer)),
        Err(error) => {
            eprintln!("Cannot open log file {}: {error}", path.display());
            None
        }
    }
}

pub fn set_logging_enabled(enabled: bool) {
    log::set_max_level(if enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    });
}
