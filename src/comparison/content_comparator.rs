use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};

use crate::ext::BestEffortPathExt;

/// Bytes read from each file per comparison step.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(1024 * 1024).unwrap();

/// Byte-for-byte file comparison with memory bounded by two chunk buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentComparator {
    chunk_size: NonZeroUsize,
}

impl Default for ContentComparator {
    fn default() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentComparator {
    pub fn with_chunk_size(chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size }
    }

    /// Returns whether both files hold exactly the same bytes.
    ///
    /// Lengths are checked first, so files of different sizes are never
    /// opened. Timestamps and permissions play no part.
    pub fn are_equal(&self, source: &Path, replica: &Path) -> Result<bool, CompareError> {
        let source_len = file_len(source)?;
        let replica_len = file_len(replica)?;
        if source_len != replica_len {
            return Ok(false);
        }
        if source_len == 0 {
            return Ok(true);
        }

        let source_file = File::open(source).context(OpenSnafu { path: source })?;
        let replica_file = File::open(replica).context(OpenSnafu { path: replica })?;

        self.same_content((source, source_file), (replica, replica_file))
    }

    /// Compares two streams chunk by chunk in lockstep.
    ///
    /// Streams that deliver different amounts for the same chunk are unequal.
    /// With matching lengths this only happens when a file is modified while
    /// it is being compared, and the pair is then reported as different.
    fn same_content<S: Read, R: Read>(
        &self,
        (source_path, mut source): (&Path, S),
        (replica_path, mut replica): (&Path, R),
    ) -> Result<bool, CompareError> {
        let mut source_buffer = vec![0u8; self.chunk_size.get()];
        let mut replica_buffer = vec![0u8; self.chunk_size.get()];

        loop {
            let source_read =
                read_chunk(&mut source, &mut source_buffer).context(ReadSnafu { path: source_path })?;
            let replica_read = read_chunk(&mut replica, &mut replica_buffer)
                .context(ReadSnafu { path: replica_path })?;

            if source_read != replica_read {
                return Ok(false);
            }
            if source_read == 0 {
                return Ok(true);
            }
            // slice equality lowers to memcmp
            if source_buffer[..source_read] != replica_buffer[..replica_read] {
                return Ok(false);
            }
        }
    }
}

fn file_len(path: &Path) -> Result<u64, CompareError> {
    fs::metadata(path)
        .map(|metadata| metadata.len())
        .context(MetadataSnafu { path })
}

/// Fills `buffer` as far as the reader allows. A short count means end of stream.
fn read_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[derive(Debug, Snafu)]
pub enum CompareError {
    #[snafu(display("Failed to read metadata of {}", path.best_effort_path_display()))]
    MetadataError { path: PathBuf, source: std::io::Error },
    #[snafu(display("Failed to open {} for comparison", path.best_effort_path_display()))]
    OpenError { path: PathBuf, source: std::io::Error },
    #[snafu(display("Failed to read {} during comparison", path.best_effort_path_display()))]
    ReadError { path: PathBuf, source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SMALL_CHUNK: NonZeroUsize = NonZeroUsize::new(4).unwrap();

    struct FilePair {
        _dir: TempDir,
        source: PathBuf,
        replica: PathBuf,
    }

    impl FilePair {
        fn new(source: &[u8], replica: &[u8]) -> Self {
            let dir = TempDir::new().expect("Failed to create temp directory");
            let source_path = dir.path().join("source.bin");
            let replica_path = dir.path().join("replica.bin");
            fs::write(&source_path, source).expect("Failed to write source file");
            fs::write(&replica_path, replica).expect("Failed to write replica file");
            Self {
                _dir: dir,
                source: source_path,
                replica: replica_path,
            }
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[fixture]
    fn small_chunks() -> ContentComparator {
        ContentComparator::with_chunk_size(SMALL_CHUNK)
    }

    #[test]
    fn default_chunk_is_one_mebibyte() {
        assert_eq!(
            ContentComparator::default(),
            ContentComparator::with_chunk_size(NonZeroUsize::new(1_048_576).unwrap())
        );
    }

    #[test]
    fn identical_small_files_are_equal() {
        let pair = FilePair::new(b"hello world", b"hello world");

        let result = ContentComparator::default().are_equal(&pair.source, &pair.replica);

        assert!(result.expect("Comparison failed"));
    }

    #[test]
    fn empty_files_are_equal() {
        let pair = FilePair::new(b"", b"");

        assert!(
            ContentComparator::default()
                .are_equal(&pair.source, &pair.replica)
                .unwrap()
        );
    }

    #[rstest]
    #[case(b"abc", b"abcd")]
    #[case(b"", b"x")]
    #[case(b"longer content", b"short")]
    fn different_lengths_are_unequal(#[case] source: &[u8], #[case] replica: &[u8]) {
        let pair = FilePair::new(source, replica);

        assert!(
            !ContentComparator::default()
                .are_equal(&pair.source, &pair.replica)
                .unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn different_lengths_are_decided_without_opening() {
        use std::os::unix::fs::PermissionsExt;

        // Unreadable contents would fail to open if the length check did not
        // short-circuit. Root ignores the mode, which leaves the assertion intact.
        let pair = FilePair::new(b"abc", b"abcdef");
        fs::set_permissions(&pair.replica, fs::Permissions::from_mode(0o000)).unwrap();

        let result = ContentComparator::default().are_equal(&pair.source, &pair.replica);

        fs::set_permissions(&pair.replica, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!result.unwrap());
    }

    #[rstest]
    #[case::first_byte(0)]
    #[case::inside_first_chunk(2)]
    #[case::last_byte_of_chunk(3)]
    #[case::first_byte_of_next_chunk(4)]
    #[case::middle(9)]
    #[case::last_byte(16)]
    fn single_differing_byte_is_detected(small_chunks: ContentComparator, #[case] position: usize) {
        let source = patterned(17);
        let mut replica = source.clone();
        replica[position] ^= 0xFF;
        let pair = FilePair::new(&source, &replica);

        assert!(!small_chunks.are_equal(&pair.source, &pair.replica).unwrap());
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(5)]
    #[case(16)]
    #[case(17)]
    fn identical_multi_chunk_files_are_equal(small_chunks: ContentComparator, #[case] len: usize) {
        let content = patterned(len);
        let pair = FilePair::new(&content, &content);

        assert!(small_chunks.are_equal(&pair.source, &pair.replica).unwrap());
    }

    #[test]
    fn identical_files_larger_than_default_chunk_are_equal() {
        let content = patterned(DEFAULT_CHUNK_SIZE.get() * 2 + 123);
        let pair = FilePair::new(&content, &content);

        assert!(
            ContentComparator::default()
                .are_equal(&pair.source, &pair.replica)
                .unwrap()
        );
    }

    #[test]
    fn difference_past_first_default_chunk_is_detected() {
        let source = patterned(DEFAULT_CHUNK_SIZE.get() + 10);
        let mut replica = source.clone();
        let last = replica.len() - 1;
        replica[last] = replica[last].wrapping_add(1);
        let pair = FilePair::new(&source, &replica);

        assert!(
            !ContentComparator::default()
                .are_equal(&pair.source, &pair.replica)
                .unwrap()
        );
    }

    #[rstest]
    fn streams_ending_at_different_points_are_unequal(small_chunks: ContentComparator) {
        let source = Cursor::new(patterned(10));
        let replica = Cursor::new(patterned(7));

        let result = small_chunks.same_content(
            (Path::new("source"), source),
            (Path::new("replica"), replica),
        );

        assert!(!result.unwrap());
    }

    #[test]
    fn missing_replica_is_an_error() {
        let pair = FilePair::new(b"abc", b"abc");
        fs::remove_file(&pair.replica).unwrap();

        let result = ContentComparator::default().are_equal(&pair.source, &pair.replica);

        match result {
            Err(CompareError::MetadataError { path, .. }) => assert_eq!(path, pair.replica),
            other => panic!("Expected MetadataError, got {other:?}"),
        }
    }

    /// Reader that hands out at most one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    #[rstest]
    fn short_reads_fill_whole_chunks(small_chunks: ContentComparator) {
        let content = patterned(11);

        let result = small_chunks.same_content(
            (Path::new("source"), Trickle(Cursor::new(content.clone()))),
            (Path::new("replica"), Cursor::new(content)),
        );

        assert!(result.unwrap());
    }

    #[test]
    fn error_display_names_the_file() {
        let error = CompareError::OpenError {
            path: PathBuf::from("/this/path/does/not/exist.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };

        let message = error.to_string();

        assert!(message.contains("Failed to open"));
        assert!(message.contains("exist.bin"));
    }
}
