pub mod safety;
pub mod skiplist_base;

// Publicly re-export the list and its helper types to simplify access from
// external code.
pub use safety::{SkipListStatistics, ValidationError};
pub use skiplist_base::{RangeSpec, ReverseIter, SkipList, SkipListIter};
