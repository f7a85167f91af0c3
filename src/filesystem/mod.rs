//! Fresh, per-level views of directory contents and their name-based diff.
//!
//! Nothing here is cached: a [`Listing`] is read when a directory level is
//! visited and dropped once that level has been reconciled.

mod node;
mod tree_diff;

pub use node::{Listing, Node};
pub use tree_diff::diff_by_name;
