use strum::{EnumCount, EnumIter};

use crate::schema::Token;

/// Number of table kinds the schema can describe. Arrays indexed by
/// [`TableId`] are sized with this.
pub const TABLE_COUNT: usize = TableId::GenericParamConstraint as usize + 1;

/// Identifies one of the metadata tables.
///
/// The discriminants are the on-disk table tags: bit `n` of the schema
/// header's `valid`/`sorted` bitmasks corresponds to `TableId` with
/// discriminant `n`, and a token's high byte is the `TableId` of the table
/// it points into.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// Current module descriptor, exactly one row
    Module = 0x00,
    /// References to types defined in other scopes
    TypeRef = 0x01,
    /// Type definitions
    TypeDef = 0x02,
    /// Indirection for out-of-order field ownership
    FieldPtr = 0x03,
    /// Field definitions
    Field = 0x04,
    /// Indirection for out-of-order method ownership
    MethodPtr = 0x05,
    /// Method definitions
    MethodDef = 0x06,
    /// Indirection for out-of-order param ownership
    ParamPtr = 0x07,
    /// Method parameter definitions
    Param = 0x08,
    /// Interface implementations per type
    InterfaceImpl = 0x09,
    /// References to members of other types or scopes
    MemberRef = 0x0A,
    /// Compile-time constant values
    Constant = 0x0B,
    /// Custom attribute instances
    CustomAttribute = 0x0C,
    /// Marshalling descriptors for fields and params
    FieldMarshal = 0x0D,
    /// Declarative security permission sets
    DeclSecurity = 0x0E,
    /// Explicit packing / size for types
    ClassLayout = 0x0F,
    /// Explicit field offsets
    FieldLayout = 0x10,
    /// Standalone signatures
    StandAloneSig = 0x11,
    /// Type-to-event-list mapping
    EventMap = 0x12,
    /// Indirection for out-of-order event ownership
    EventPtr = 0x13,
    /// Event definitions
    Event = 0x14,
    /// Type-to-property-list mapping
    PropertyMap = 0x15,
    /// Indirection for out-of-order property ownership
    PropertyPtr = 0x16,
    /// Property definitions
    Property = 0x17,
    /// Getter/setter/other association between methods and events/properties
    MethodSemantics = 0x18,
    /// Explicit method body / declaration overrides
    MethodImpl = 0x19,
    /// References to other modules
    ModuleRef = 0x1A,
    /// Type specifications (signature-described types)
    TypeSpec = 0x1B,
    /// PInvoke mappings
    ImplMap = 0x1C,
    /// Initial data locations for fields
    FieldRVA = 0x1D,
    /// Edit-and-continue log
    EncLog = 0x1E,
    /// Edit-and-continue token map
    EncMap = 0x1F,
    /// Assembly manifest, at most one row
    Assembly = 0x20,
    /// Obsolete processor table for the manifest
    AssemblyProcessor = 0x21,
    /// Obsolete OS table for the manifest
    AssemblyOS = 0x22,
    /// References to other assemblies
    AssemblyRef = 0x23,
    /// Obsolete processor table for assembly references
    AssemblyRefProcessor = 0x24,
    /// Obsolete OS table for assembly references
    AssemblyRefOS = 0x25,
    /// Files of the current assembly
    File = 0x26,
    /// Types exported from other modules of the assembly
    ExportedType = 0x27,
    /// Manifest resources
    ManifestResource = 0x28,
    /// Nesting relation between types
    NestedClass = 0x29,
    /// Generic parameter definitions (schema v2 only)
    GenericParam = 0x2A,
    /// Generic method instantiations (schema v2 only)
    MethodSpec = 0x2B,
    /// Constraints on generic parameters (schema v2 only)
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Builds the token for row `rid` of this table.
    ///
    /// RIDs are 24-bit; larger values cannot be represented and indicate a
    /// caller bug, never valid data.
    #[must_use]
    pub fn token(self, rid: u32) -> Token {
        debug_assert!(rid <= 0x00FF_FFFF, "RID {rid:#x} exceeds the 24-bit token limit");
        Token::new((u32::from(self as u8) << 24) | (rid & 0x00FF_FFFF))
    }

    /// Maps a raw table tag back to a `TableId`.
    ///
    /// Returns `None` for tags outside the catalog (this includes the
    /// user-string pseudo tag 0x70, which never names a table).
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<TableId> {
        if tag <= TableId::GenericParamConstraint as u8 {
            // Safe: the discriminants are contiguous from 0x00 to 0x2C
            Some(unsafe { std::mem::transmute::<u8, TableId>(tag) })
        } else {
            None
        }
    }
}

/// Pseudo table tag used for user-string tokens. User strings live in their
/// own heap, not in a table, but their tokens still flow through remap maps
/// and notifications.
pub const USER_STRING_TAG: u8 = 0x70;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tag_round_trip() {
        for id in TableId::iter() {
            assert_eq!(TableId::from_tag(id as u8), Some(id));
        }
        assert_eq!(TableId::from_tag(0x2D), None);
        assert_eq!(TableId::from_tag(USER_STRING_TAG), None);
    }

    #[test]
    fn token_building() {
        assert_eq!(TableId::MethodDef.token(1).value(), 0x0600_0001);
        assert_eq!(TableId::Module.token(1).value(), 0x0000_0001);
        assert!(TableId::TypeDef.token(0).is_nil());
    }

    #[test]
    #[should_panic(expected = "24-bit token limit")]
    fn oversized_rid_rejected() {
        let _ = TableId::TypeDef.token(0x0100_0000);
    }

    #[test]
    fn discriminants_are_contiguous() {
        let mut expected = 0u8;
        for id in TableId::iter() {
            assert_eq!(id as u8, expected);
            expected += 1;
        }
        assert_eq!(expected as usize, TABLE_COUNT);
    }
}
