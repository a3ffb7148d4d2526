use thiserror::Error;

use crate::{merge::MergeErrorKind, schema::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can return.
///
/// The variants fall into the four buckets the engine distinguishes:
///
/// - **Corruption**: [`Error::Malformed`], [`Error::OutOfBounds`],
///   [`Error::UnsupportedVersion`] - malformed input bytes, always fatal.
/// - **Integrity violations**: [`Error::UnresolvedToken`],
///   [`Error::InconsistentRemap`], [`Error::TypeDefMissing`] - an internal
///   invariant broke, which indicates a phase-ordering bug, always fatal.
/// - **Continuable mismatches**: [`Error::MergeMismatch`] - a merge-time
///   semantic disagreement that the error policy declined to ignore.
/// - **Capability / usage errors**: [`Error::ReadOnly`], [`Error::Pinned`],
///   [`Error::InvalidRid`], [`Error::InvalidOffset`],
///   [`Error::InvalidColumnValue`] - the caller asked for something the
///   current database state does not allow.
///
/// Ordinary lookup misses are *not* errors; those come back as `Option`.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes are damaged and could not be decoded.
    ///
    /// Includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding input bytes.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The schema header carries a major version this library does not support.
    #[error("Unsupported schema major version - {0}")]
    UnsupportedVersion(u8),

    /// A heap offset does not point at a valid entry.
    #[error("Invalid heap offset - {0}")]
    InvalidOffset(u32),

    /// A RID is zero or exceeds the row count of its table.
    #[error("Invalid RID {rid} for table 0x{table:02x}")]
    InvalidRid {
        /// The table tag the access went to
        table: u8,
        /// The offending row id
        rid: u32,
    },

    /// A value written to a column is not representable there, e.g. a token
    /// whose table is not in the candidate list of a coded column.
    #[error("Value not representable in column - {0}")]
    InvalidColumnValue(Token),

    /// A mutation was attempted on a read-only database.
    #[error("Database is read-only")]
    ReadOnly,

    /// A relocating operation was attempted while the row arena is pinned.
    #[error("Row storage is pinned")]
    Pinned,

    /// A token that an earlier merge phase must have resolved was not found
    /// in the remap map. Always fatal.
    #[error("Token was never merged - {0}")]
    UnresolvedToken(Token),

    /// A remap entry was inserted twice with conflicting targets. Always fatal.
    #[error("Conflicting remap entry for {0}")]
    InconsistentRemap(Token),

    /// A TypeRef resolved to the merged module but no matching TypeDef
    /// exists in the emit scope. Always fatal.
    #[error("No TypeDef found for resolved TypeRef - {0}")]
    TypeDefMissing(Token),

    /// A continuable merge mismatch that the error policy turned into an
    /// abort. The merge stops at the current table boundary; the emit scope
    /// must be discarded.
    #[error("Merge mismatch {kind:?} at {token}")]
    MergeMismatch {
        /// Which verification failed
        kind: MergeErrorKind,
        /// The import-scope token the mismatch was detected on
        token: Token,
    },
}
