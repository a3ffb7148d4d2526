//! Heap pools: append-only byte stores referenced by integer offset.
//!
//! Four independent pools exist per database: strings (UTF-8,
//! NUL-terminated), blobs (length-prefixed opaque bytes), GUIDs (fixed
//! 16-byte slots) and user strings (length-prefixed UTF-16). Offsets are
//! stable and monotonically increasing; whether referring columns store
//! them in 2 or 4 bytes is decided once per database at encode time.

mod blob;
mod guid;
mod strings;
mod userstrings;

pub use blob::BlobHeap;
pub use guid::GuidHeap;
pub use strings::StringHeap;
pub use userstrings::UserStringHeap;
