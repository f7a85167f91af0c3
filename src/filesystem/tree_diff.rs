use std::hash::Hash;

use hashlink::LinkedHashMap;

use super::Node;

/// Entry present on both sides under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonPair<T> {
    pub source: T,
    pub replica: T,
}

/// Classification of two sibling lists against each other.
///
/// Every key from either input lands in exactly one of the three fields.
/// `missing` and `common` keep source order, `obsolete` keeps replica order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDiff<T> {
    /// Only in the replica.
    pub obsolete: Vec<T>,
    /// Only in the source.
    pub missing: Vec<T>,
    pub common: Vec<CommonPair<T>>,
}

impl<T> TreeDiff<T> {
    pub fn is_settled(&self) -> bool {
        self.obsolete.is_empty() && self.missing.is_empty()
    }
}

pub fn diff_by_key<T, K>(source: Vec<T>, replica: Vec<T>, key: impl Fn(&T) -> K) -> TreeDiff<T>
where
    K: Eq + Hash,
{
    let mut replica_by_key: LinkedHashMap<K, T> =
        replica.into_iter().map(|entry| (key(&entry), entry)).collect();

    let mut missing = Vec::new();
    let mut common = Vec::new();
    for entry in source {
        match replica_by_key.remove(&key(&entry)) {
            Some(counterpart) => common.push(CommonPair {
                source: entry,
                replica: counterpart,
            }),
            None => missing.push(entry),
        }
    }

    TreeDiff {
        obsolete: replica_by_key.into_iter().map(|(_, entry)| entry).collect(),
        missing,
        common,
    }
}

/// Diffs two listings of the same kind by entry name.
pub fn diff_by_name(source: Vec<Node>, replica: Vec<Node>) -> TreeDiff<Node> {
    diff_by_key(source, replica, |node| node.name().to_os_string())
}
