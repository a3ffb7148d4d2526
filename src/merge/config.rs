//! Merge configuration: behavior flags and the ref-to-def policy.

use bitflags::bitflags;

bitflags! {
    /// Behavior switches for one merge operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MergeFlags: u32 {
        /// Skip all duplicate checking; every import row becomes a fresh
        /// emit row
        const NO_DUP_CHECK = 0x0000_0001;
        /// Merge the manifest tables (Assembly, File, ExportedType,
        /// ManifestResource)
        const MERGE_MANIFEST = 0x0000_0002;
        /// Merge only the ExportedType table out of the manifest group
        const MERGE_EXPORTED_TYPES = 0x0000_0004;
        /// Drop custom attributes whose constructor still resolves to a
        /// MemberRef after merging
        const DROP_MEMBER_REF_CAS = 0x0000_0008;
    }
}

/// Toggles for the two independent ref-to-def optimizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefToDefPolicy {
    /// Collapse a TypeRef resolving into the merged module onto the
    /// matching TypeDef
    pub type_refs: bool,
    /// Collapse a MemberRef resolving onto a merged Method/Field definition
    pub member_refs: bool,
}

impl RefToDefPolicy {
    /// Both optimizations enabled.
    #[must_use]
    pub fn all() -> Self {
        RefToDefPolicy {
            type_refs: true,
            member_refs: true,
        }
    }

    /// Both optimizations disabled; every reference row survives.
    #[must_use]
    pub fn none() -> Self {
        RefToDefPolicy {
            type_refs: false,
            member_refs: false,
        }
    }
}

impl Default for RefToDefPolicy {
    fn default() -> Self {
        Self::all()
    }
}

/// Full configuration of one merge operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeConfig {
    /// Behavior flags
    pub flags: MergeFlags,
    /// Ref-to-def optimization toggles
    pub ref_to_def: RefToDefPolicy,
}
