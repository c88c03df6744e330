// Logger setup. Headless commands log to stderr; the full-screen viewer
// owns the terminal, so it logs to a file instead.

use std::fs::{self, File};
use std::path::PathBuf;

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};

/// Map `-v` repetitions to a level: warn, info, debug, then trace.
pub(crate) fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub(crate) fn init_terminal(verbosity: u8) {
    // A second init only fails because a logger is already set
    let _ = TermLogger::init(
        level_for(verbosity),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

/// Log file for the viewer: `<cache_dir>/termgrid/termgrid.log`.
pub(crate) fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("termgrid")
        .join("termgrid.log")
}

pub(crate) fn init_file(verbosity: u8) -> Result<PathBuf, String> {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    let file = File::create(&path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let _ = WriteLogger::init(level_for(verbosity), Config::default(), file);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
