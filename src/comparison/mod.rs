//! Byte-exact file comparison used to skip redundant copies.

mod content_comparator;

pub use content_comparator::ContentComparator;
