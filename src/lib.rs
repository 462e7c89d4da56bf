/// Incrementally-rehashing hash table: point operations, safe/unsafe
/// cursors, random sampling.
pub mod dict;
/// Compact sorted integer set with automatic encoding upgrade.
pub mod intset;
/// Memory accounting: tracking allocator wrapper and RSS probe.
pub mod memory;
/// Smart dynamic byte string with inline/heap representation.
pub mod sds;
/// Ordered (member, score) structure with rank tracking.
pub mod skiplist;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// The dictionary, its entry API and traversal cursors.
pub use dict::{Cursor, Dict, DictIter, Entry, OccupiedEntry, SafeCursor, VacantEntry};
/// Compact integer set.
pub use intset::IntSet;
/// Allocation accounting.
pub use memory::{resident_set_size, TrackingAlloc};
/// Byte string.
pub use sds::Sds;
/// Ordered structure with ranks and score ranges.
pub use skiplist::{RangeSpec, SkipList, SkipListStatistics, ValidationError};
