use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One immediate child of a directory, as seen at enumeration time.
///
/// Identity is the name alone. The path is kept so that the entry can be
/// acted on without re-joining it to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: OsString,
    path: PathBuf,
}

impl Node {
    pub fn new(name: impl Into<OsString>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn name(&self) -> &OsStr {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Immediate children of a directory, split by kind.
///
/// Kinds come from the entry itself, so a symbolic link is never followed:
/// it lands in `others` together with sockets, pipes and devices.
#[derive(Debug, Default, Clone)]
pub struct Listing {
    pub files: Vec<Node>,
    pub directories: Vec<Node>,
    pub others: Vec<Node>,
}

impl Listing {
    pub fn read(dir: &Path) -> io::Result<Self> {
        let mut listing = Self::default();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let node = Node::new(entry.file_name(), entry.path());

            if file_type.is_dir() {
                listing.directories.push(node);
            } else if file_type.is_file() {
                listing.files.push(node);
            } else {
                listing.others.push(node);
            }
        }

        Ok(listing)
    }
}
