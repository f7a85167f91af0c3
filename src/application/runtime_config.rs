use std::path::{Path, PathBuf};

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub log_file: PathBuf,
    pub interval_secs: u64,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source: absolute(cli.source),
            replica: absolute(cli.replica),
            log_file: absolute(cli.log_file),
            interval_secs: cli.interval,
        }
    }
}

/// Anchors relative paths at the current directory so log entries carry full paths.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(Path::new(&path)).unwrap_or(path)
}
