//! Coded token kinds and their bit-packing codec.
//!
//! A coded token packs a foreign key that may point into more than one table
//! into a single column: the low bits select the target table out of a fixed,
//! ordered candidate list, the remaining bits carry the RID. The candidate
//! lists and their ordering are wire format - changing either changes the
//! meaning of every encoded value.

use strum::{EnumCount, EnumIter};

use crate::{
    schema::{TableId, Token},
    Error, Result,
};

/// All logical foreign-key kinds that use coded encoding.
///
/// Each kind owns a fixed, ordered list of candidate tables; the position of
/// a table in that list is its tag value on disk.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedTokenKind {
    /// `TypeDef`, `TypeRef` or `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param` or `Property` - anything that can carry a constant
    HasConstant,
    /// Any of the 22 kinds a custom attribute can attach to
    HasCustomAttribute,
    /// `Field` or `Param` - marshalling targets
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef` or `Assembly` - security targets
    HasDeclSecurity,
    /// Parent of a `MemberRef`
    MemberRefParent,
    /// `Event` or `Property` - semantic association targets
    HasSemantics,
    /// `MethodDef` or `MemberRef`
    MethodDefOrRef,
    /// `Field` or `MethodDef` - PInvoke forwarding targets
    MemberForwarded,
    /// `File`, `AssemblyRef` or `ExportedType`
    Implementation,
    /// Constructor of a custom attribute. Tags 0, 1 and 4 are unused on
    /// disk but present in the list so the live tags (2, 3) keep their
    /// numbering.
    CustomAttributeType,
    /// Scope a `TypeRef` resolves in
    ResolutionScope,
    /// `TypeDef` or `MethodDef` - generic parameter owners
    TypeOrMethodDef,
}

impl CodedTokenKind {
    /// The ordered candidate table list of this kind.
    ///
    /// The ordering is wire format; it determines the tag value of each
    /// target table.
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedTokenKind::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedTokenKind::HasConstant => &[TableId::Field, TableId::Param, TableId::Property],
            CodedTokenKind::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity,
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedTokenKind::HasFieldMarshal => &[TableId::Field, TableId::Param],
            CodedTokenKind::HasDeclSecurity => {
                &[TableId::TypeDef, TableId::MethodDef, TableId::Assembly]
            }
            CodedTokenKind::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedTokenKind::HasSemantics => &[TableId::Event, TableId::Property],
            CodedTokenKind::MethodDefOrRef => &[TableId::MethodDef, TableId::MemberRef],
            CodedTokenKind::MemberForwarded => &[TableId::Field, TableId::MethodDef],
            CodedTokenKind::Implementation => {
                &[TableId::File, TableId::AssemblyRef, TableId::ExportedType]
            }
            CodedTokenKind::CustomAttributeType => &[
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MemberRef,
                TableId::MemberRef,
            ],
            CodedTokenKind::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedTokenKind::TypeOrMethodDef => &[TableId::TypeDef, TableId::MethodDef],
        }
    }

    /// Number of low bits used for the table tag: `ceil(log2(len))`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tag_bits(&self) -> u8 {
        let len = self.tables().len();
        // All candidate lists have at least two entries
        (usize::BITS - (len - 1).leading_zeros()) as u8
    }

    /// Packs a token into the coded representation.
    ///
    /// The table tag is the position of the token's table in the candidate
    /// list; for `CustomAttributeType` the first matching position wins,
    /// which yields the canonical tags 2 (`MethodDef`) and 3 (`MemberRef`)
    /// once the two dead leading slots are skipped.
    ///
    /// A raw-nil token (value 0) encodes as 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidColumnValue`] if the token's table is
    /// not in the candidate list.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, token: Token) -> Result<u32> {
        if token.value() == 0 {
            return Ok(0);
        }

        let tables = self.tables();
        let Some(table) = TableId::from_tag(token.table()) else {
            return Err(Error::InvalidColumnValue(token));
        };

        // CustomAttributeType must not pick the dead slots 0/1/4
        let index = if matches!(self, CodedTokenKind::CustomAttributeType) {
            match table {
                TableId::MethodDef => Some(2),
                TableId::MemberRef => Some(3),
                _ => None,
            }
        } else {
            tables.iter().position(|candidate| *candidate == table)
        };

        match index {
            Some(index) => Ok((token.rid() << self.tag_bits()) | index as u32),
            None => Err(Error::InvalidColumnValue(token)),
        }
    }

    /// Unpacks a coded value into its target token.
    ///
    /// An out-of-range tag does not fail: it falls back to the first table
    /// in the candidate list. That mirrors the behavior of the original
    /// engine, which masks the tag into the list, and downstream duplicate
    /// detection relies on getting exactly this value for malformed input.
    #[must_use]
    pub fn decode(&self, value: u32) -> Token {
        let tables = self.tables();
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let rid = value >> bits;

        let table = tables.get(tag).copied().unwrap_or(tables[0]);
        table.token(rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn round_trip_all_kinds() {
        for kind in CodedTokenKind::iter() {
            for table in kind.tables() {
                // The coded domain is capped by the 24-bit token RID limit
                for rid in [1u32, 2, 255, 0xFFFF, 0x00FF_FFFF] {
                    let token = table.token(rid);
                    let encoded = kind.encode(token).unwrap();
                    let decoded = kind.decode(encoded);
                    assert_eq!(decoded.rid(), rid, "{kind:?}/{table:?}");
                    // CustomAttributeType has duplicate slots; the decoded
                    // table must still be the token's table
                    assert_eq!(decoded.table(), token.table(), "{kind:?}/{table:?}");
                }
            }
        }
    }

    #[test]
    fn tag_bits() {
        assert_eq!(CodedTokenKind::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedTokenKind::HasSemantics.tag_bits(), 1);
        assert_eq!(CodedTokenKind::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedTokenKind::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedTokenKind::MemberRefParent.tag_bits(), 3);
    }

    #[test]
    fn wrong_table_rejected() {
        let token = TableId::Module.token(1);
        assert!(CodedTokenKind::TypeDefOrRef.encode(token).is_err());
    }

    #[test]
    fn nil_encodes_to_zero() {
        assert_eq!(CodedTokenKind::HasConstant.encode(Token::new(0)).unwrap(), 0);
        assert!(CodedTokenKind::HasConstant.decode(0).is_nil());
    }

    #[test]
    fn out_of_range_tag_falls_back_to_first_table() {
        // ResolutionScope has 4 candidates and 2 tag bits, so every tag is
        // in range; HasConstant has 3 candidates and tag 3 is dead. The
        // decoder must map tag 3 onto the first candidate, not error.
        let value = (7 << 2) | 3;
        let decoded = CodedTokenKind::HasConstant.decode(value);
        assert_eq!(decoded.table(), TableId::Field as u8);
        assert_eq!(decoded.rid(), 7);
    }

    #[test]
    fn custom_attribute_type_uses_live_slots() {
        let method = TableId::MethodDef.token(9);
        assert_eq!(
            CodedTokenKind::CustomAttributeType.encode(method).unwrap(),
            (9 << 3) | 2
        );
        let member = TableId::MemberRef.token(4);
        assert_eq!(
            CodedTokenKind::CustomAttributeType.encode(member).unwrap(),
            (4 << 3) | 3
        );
    }
}
