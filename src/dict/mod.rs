pub mod dict_base;
pub mod entry;
pub mod iter;
pub mod sample;

// Publicly re-export the dictionary and its companion types to simplify
// access from external code.
pub use dict_base::Dict;
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::{Cursor, DictIter, SafeCursor};
