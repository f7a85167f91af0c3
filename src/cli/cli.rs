use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;
use crate::scheduler::MIN_INTERVAL_SECS;

/// Keeps a replica directory identical to a source directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory whose contents are mirrored
    pub source: PathBuf,
    /// Directory made to match the source
    pub replica: PathBuf,
    /// File every create, delete and copy is appended to
    pub log_file: PathBuf,
    /// Seconds between synchronization runs
    #[clap(value_parser = clap::value_parser!(u64).range(MIN_INTERVAL_SECS..))]
    pub interval: u64,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_four_positional_arguments() {
        let cli = Cli::try_parse_from(["treemirror", "/src", "/replica", "/var/log/sync.log", "30"])
            .expect("Arguments should parse");

        assert_eq!(cli.source, PathBuf::from("/src"));
        assert_eq!(cli.replica, PathBuf::from("/replica"));
        assert_eq!(cli.log_file, PathBuf::from("/var/log/sync.log"));
        assert_eq!(cli.interval, 30);
        assert!(matches!(cli.log_level, LogLevel::Warn));
    }

    #[rstest]
    #[case::zero_interval(&["treemirror", "/s", "/r", "/l", "0"])]
    #[case::negative_interval(&["treemirror", "/s", "/r", "/l", "-5"])]
    #[case::not_a_number(&["treemirror", "/s", "/r", "/l", "soon"])]
    #[case::missing_interval(&["treemirror", "/s", "/r", "/l"])]
    #[case::extra_argument(&["treemirror", "/s", "/r", "/l", "5", "extra"])]
    fn rejects_invalid_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn accepts_log_level_flag() {
        let cli = Cli::try_parse_from(["treemirror", "/s", "/r", "/l", "1", "--log-level", "debug"])
            .unwrap();

        assert!(matches!(cli.log_level, LogLevel::Debug));
    }
}
