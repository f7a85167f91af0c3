use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use colored::Colorize;
use supports_color::Stream;
use tracing::warn;

use crate::ext::BestEffortPathExt;

/// Sink for the user-facing record of what a run changed.
///
/// Implementations must not fail: a sink that cannot write drops the line.
pub trait ActionLog {
    /// Writes the line that opens a run.
    fn stamp(&mut self, line: &str);

    /// Records one action as `"{action} - {subject}"`.
    fn log(&mut self, action: &str, subject: &str);

    /// Records an action that did not go through.
    fn log_failure(&mut self, action: &str, subject: &str) {
        self.log(action, subject);
    }
}

/// Log file opened in append mode for one run, echoed to stdout.
///
/// Dropping the log flushes the file.
pub struct RunLog {
    writer: Option<BufWriter<File>>,
    colorize: bool,
}

impl RunLog {
    pub fn open(path: &Path) -> Self {
        let writer = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                warn!(
                    "Cannot open log file {}, actions go to the console only: {e}",
                    path.best_effort_path_display()
                );
                None
            }
        };

        Self {
            writer,
            colorize: supports_color::on(Stream::Stdout).is_some(),
        }
    }

    fn append(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!("Failed to write to the log file, disabling it for this run: {e}");
            self.writer = None;
        }
    }
}

impl ActionLog for RunLog {
    fn stamp(&mut self, line: &str) {
        self.append(line);
        println!("{line}");
    }

    fn log(&mut self, action: &str, subject: &str) {
        let line = format!("{action} - {subject}");
        self.append(&line);
        if self.colorize {
            println!("{} - {subject}", action.green());
        } else {
            println!("{line}");
        }
    }

    fn log_failure(&mut self, action: &str, subject: &str) {
        let line = format!("{action} - {subject}");
        self.append(&line);
        if self.colorize {
            println!("{} - {subject}", action.red());
        } else {
            println!("{line}");
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush the log file: {e}");
            }
        }
    }
}

/// Keeps entries in memory, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub stamps: Vec<String>,
    pub entries: Vec<(String, String)>,
}

#[cfg(test)]
impl MemoryLog {
    pub fn actions(&self) -> Vec<&str> {
        self.entries.iter().map(|(action, _)| action.as_str()).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.entries.iter().filter(|(a, _)| a == action).count()
    }
}

#[cfg(test)]
impl ActionLog for MemoryLog {
    fn stamp(&mut self, line: &str) {
        self.stamps.push(line.to_string());
    }

    fn log(&mut self, action: &str, subject: &str) {
        self.entries.push((action.to_string(), subject.to_string()));
    }
}
