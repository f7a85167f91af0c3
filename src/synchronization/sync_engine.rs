use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use derive_more::Display;
use snafu::{Snafu, ensure};
use tracing::{debug, error, info, warn};

use crate::comparison::ContentComparator;
use crate::ext::BestEffortPathExt;
use crate::filesystem::{Listing, diff_by_name};
use crate::synchronization::{ActionLog, RunLog};

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Mutations a run can apply to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Action {
    #[display("Delete Directory")]
    DeleteDirectory,
    #[display("Create Directory")]
    CreateDirectory,
    #[display("Delete file")]
    DeleteFile,
    #[display("Create file")]
    CreateFile,
    #[display("Copy of file")]
    CopyFile,
}

impl Action {
    pub fn failure_label(self) -> &'static str {
        match self {
            Action::DeleteDirectory => "Unsuccessful Delete of Directory",
            Action::CreateDirectory => "Unsuccessful Create of Directory",
            Action::DeleteFile => "Unsuccessful Delete of file",
            Action::CreateFile => "Unsuccessful Create of file",
            Action::CopyFile => "Unsuccessful Copy of file",
        }
    }
}

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[display("{applied} applied, {failed} failed, {unchanged} unchanged")]
pub struct RunSummary {
    /// Mutations that succeeded.
    pub applied: usize,
    /// Mutations or directory listings that failed.
    pub failed: usize,
    /// Common files that already matched.
    pub unchanged: usize,
}

impl RunSummary {
    /// True when the replica already mirrored the source.
    pub fn is_clean(&self) -> bool {
        self.applied == 0 && self.failed == 0
    }
}

/// One-way mirror of `source` onto `replica`.
///
/// The source tree is only ever read. Every run re-reads both trees from
/// scratch; nothing is remembered between runs.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    source: PathBuf,
    replica: PathBuf,
    log_file: PathBuf,
    comparator: ContentComparator,
}

impl SyncEngine {
    pub fn new(
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            log_file: log_file.into(),
            comparator: ContentComparator::default(),
        }
    }

    pub fn with_comparator(mut self, comparator: ContentComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Runs one synchronization, appending to the configured log file.
    ///
    /// Fails only when a root directory is missing, and then before the log
    /// is opened or anything is touched. Failures on single entries are
    /// logged and counted in the returned summary.
    pub fn run(&self) -> Result<RunSummary, SyncError> {
        self.check_roots()?;
        let mut log = RunLog::open(&self.log_file);
        Ok(self.reconcile(&mut log))
    }

    /// Same as [`SyncEngine::run`], recording actions into `log`.
    pub fn run_with(&self, log: &mut impl ActionLog) -> Result<RunSummary, SyncError> {
        self.check_roots()?;
        Ok(self.reconcile(log))
    }

    fn check_roots(&self) -> Result<(), SyncError> {
        ensure!(
            self.source.is_dir(),
            SourceNotFoundSnafu {
                path: &self.source
            }
        );
        ensure!(
            self.replica.is_dir(),
            ReplicaNotFoundSnafu {
                path: &self.replica
            }
        );
        Ok(())
    }

    fn reconcile<L: ActionLog>(&self, log: &mut L) -> RunSummary {
        info!(
            "Synchronizing {} into {}",
            self.source.display(),
            self.replica.display()
        );
        log.stamp(&Local::now().format(STAMP_FORMAT).to_string());

        let mut run = Run {
            log,
            comparator: &self.comparator,
            summary: RunSummary::default(),
        };
        run.synchronize_directories(&self.source, &self.replica);

        info!("Synchronization finished: {}", run.summary);
        run.summary
    }
}

struct Run<'a, L> {
    log: &'a mut L,
    comparator: &'a ContentComparator,
    summary: RunSummary,
}

impl<L: ActionLog> Run<'_, L> {
    /// Settles subdirectories depth-first, then the files of this level.
    fn synchronize_directories(&mut self, source: &Path, replica: &Path) {
        debug!("Entering {}", source.display());
        let Some(source_listing) = self.list(source) else {
            return;
        };
        let Some(replica_listing) = self.list(replica) else {
            return;
        };
        for skipped in &source_listing.others {
            debug!(
                "Skipping {}: not a regular file or directory",
                skipped.path().display()
            );
        }
        self.clear_unkeepable(&source_listing, &replica_listing);

        let source_dirs = source_listing.directories;
        let diff = diff_by_name(source_dirs.clone(), replica_listing.directories);
        for obsolete in &diff.obsolete {
            let outcome = fs::remove_dir_all(obsolete.path());
            self.settle(Action::DeleteDirectory, &subject(obsolete.path()), outcome);
        }
        for missing in &diff.missing {
            let target = replica.join(missing.name());
            let outcome = fs::create_dir(&target);
            self.settle(Action::CreateDirectory, &subject(&target), outcome);
        }

        // Pair again against a fresh listing: a directory whose creation
        // failed has no counterpart and is skipped.
        let Some(replica_dirs) = self.list(replica).map(|listing| listing.directories) else {
            return;
        };
        let pairs = diff_by_name(source_dirs, replica_dirs);
        for unpaired in &pairs.missing {
            warn!(
                "Skipping {}: it has no counterpart in the replica",
                unpaired.path().display()
            );
        }
        for pair in &pairs.common {
            self.synchronize_directories(pair.source.path(), pair.replica.path());
        }

        self.synchronize_files(source, replica);
    }

    /// Removes replica entries nothing in the source can be mirrored onto:
    /// links and special files, and files standing where the source has a
    /// directory. Links are removed themselves, never their targets.
    fn clear_unkeepable(&mut self, source: &Listing, replica: &Listing) {
        let shadowing =
            diff_by_name(source.directories.clone(), replica.files.clone()).common;
        let doomed = replica
            .others
            .iter()
            .chain(shadowing.iter().map(|pair| &pair.replica));

        for node in doomed {
            let outcome = fs::remove_file(node.path());
            self.settle(Action::DeleteFile, &subject(node.path()), outcome);
        }
    }

    fn synchronize_files(&mut self, source: &Path, replica: &Path) {
        let Some(source_files) = self.list(source).map(|listing| listing.files) else {
            return;
        };
        let Some(replica_files) = self.list(replica).map(|listing| listing.files) else {
            return;
        };

        let diff = diff_by_name(source_files, replica_files);
        if diff.is_settled() {
            debug!("No files to add or remove in {}", replica.display());
        }

        for obsolete in &diff.obsolete {
            let outcome = fs::remove_file(obsolete.path());
            self.settle(Action::DeleteFile, &subject(obsolete.path()), outcome);
        }
        for missing in &diff.missing {
            let target = replica.join(missing.name());
            let outcome = copy_file(missing.path(), &target);
            self.settle(Action::CreateFile, &subject(&target), outcome);
        }
        for pair in &diff.common {
            if self.is_up_to_date(pair.source.path(), pair.replica.path()) {
                self.summary.unchanged += 1;
                continue;
            }
            let outcome = copy_file(pair.source.path(), pair.replica.path());
            let subject = format!(
                "from {} to {}",
                pair.source.path().display(),
                pair.replica.path().display()
            );
            self.settle(Action::CopyFile, &subject, outcome);
        }
    }

    fn is_up_to_date(&self, source: &Path, replica: &Path) -> bool {
        match self.comparator.are_equal(source, replica) {
            Ok(equal) => equal,
            Err(e) => {
                debug!("Treating {} as changed: {e}", replica.display());
                false
            }
        }
    }

    fn list(&mut self, dir: &Path) -> Option<Listing> {
        match Listing::read(dir) {
            Ok(listing) => Some(listing),
            Err(e) => {
                error!("Failed to list {}: {e}", dir.display());
                self.summary.failed += 1;
                None
            }
        }
    }

    /// Turns the outcome of one mutation into a log entry.
    fn settle(&mut self, action: Action, subject: &str, outcome: io::Result<()>) {
        match outcome {
            Ok(()) => {
                self.summary.applied += 1;
                self.log.log(&action.to_string(), subject);
            }
            Err(e) => {
                warn!("{action} failed for {subject}: {e}");
                self.summary.failed += 1;
                self.log.log_failure(action.failure_label(), subject);
            }
        }
    }
}

fn subject(path: &Path) -> String {
    path.display().to_string()
}

/// Copies contents, replacing the destination if it exists.
fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

#[derive(Debug, Snafu)]
pub enum SyncError {
    #[snafu(display("Source directory not found: {}", path.best_effort_path_display()))]
    SourceNotFound { path: PathBuf },
    #[snafu(display("Replica directory not found: {}", path.best_effort_path_display()))]
    ReplicaNotFound { path: PathBuf },
}
