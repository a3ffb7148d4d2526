//! Static record layout catalog for every table kind.
//!
//! The original engine generates one accessor per (table, column) pair from
//! macro tables; here the same information is plain data. A
//! [`TableDefinition`] lists the typed columns of one table kind plus its
//! key column, and the generic record accessors in `tables::record` are
//! driven by it. Two schema major versions exist: v2 is the full catalog,
//! v1 lacks the generics tables (`GenericParam`, `MethodSpec`,
//! `GenericParamConstraint`).

use crate::schema::{CodedTokenKind, TableId, TABLE_COUNT};

/// Typed kind of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Fixed 1-byte integer
    U8,
    /// Fixed 2-byte integer
    U16,
    /// Fixed 4-byte integer
    U32,
    /// Index into one specific table; 2 or 4 bytes on disk
    Rid(TableId),
    /// Coded foreign key into one of several tables; 2 or 4 bytes on disk
    Coded(CodedTokenKind),
    /// Offset into the string heap
    StringIdx,
    /// Index into the GUID heap
    GuidIdx,
    /// Index into the blob heap
    BlobIdx,
}

impl ColumnKind {
    /// Width of this column in the in-memory row arena.
    ///
    /// In memory every index column is kept at its widest form so records
    /// never need to be rewritten when a table or heap crosses a size
    /// threshold; narrowing happens only at encode time.
    #[must_use]
    pub fn mem_width(&self) -> usize {
        match self {
            ColumnKind::U8 => 1,
            ColumnKind::U16 => 2,
            _ => 4,
        }
    }
}

/// One typed column of a table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name, for diagnostics
    pub name: &'static str,
    /// Typed kind, drives widths and accessors
    pub kind: ColumnKind,
}

/// Layout of one table kind: its ordered columns and the designated key
/// column used for sorting and searching, if any.
#[derive(Debug, Clone, Copy)]
pub struct TableDefinition {
    /// The table this layout describes
    pub id: TableId,
    /// Index of the key column, for tables that sort
    pub key: Option<usize>,
    /// Ordered column list
    pub columns: &'static [ColumnDef],
}

impl TableDefinition {
    /// Byte size of one record in the in-memory arena.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.columns.iter().map(|c| c.kind.mem_width()).sum()
    }

    /// Byte offset of column `index` in the in-memory arena.
    #[must_use]
    pub fn mem_offset(&self, index: usize) -> usize {
        self.columns[..index]
            .iter()
            .map(|c| c.kind.mem_width())
            .sum()
    }
}

macro_rules! columns {
    ($(($name:literal, $kind:expr)),* $(,)?) => {
        &[$(ColumnDef { name: $name, kind: $kind }),*]
    };
}

static MODULE: TableDefinition = TableDefinition {
    id: TableId::Module,
    key: None,
    columns: columns![
        ("Generation", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
        ("Mvid", ColumnKind::GuidIdx),
        ("EncId", ColumnKind::GuidIdx),
        ("EncBaseId", ColumnKind::GuidIdx),
    ],
};

static TYPE_REF: TableDefinition = TableDefinition {
    id: TableId::TypeRef,
    key: None,
    columns: columns![
        (
            "ResolutionScope",
            ColumnKind::Coded(CodedTokenKind::ResolutionScope)
        ),
        ("Name", ColumnKind::StringIdx),
        ("Namespace", ColumnKind::StringIdx),
    ],
};

static TYPE_DEF: TableDefinition = TableDefinition {
    id: TableId::TypeDef,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U32),
        ("Name", ColumnKind::StringIdx),
        ("Namespace", ColumnKind::StringIdx),
        ("Extends", ColumnKind::Coded(CodedTokenKind::TypeDefOrRef)),
        ("FieldList", ColumnKind::Rid(TableId::Field)),
        ("MethodList", ColumnKind::Rid(TableId::MethodDef)),
    ],
};

static FIELD_PTR: TableDefinition = TableDefinition {
    id: TableId::FieldPtr,
    key: None,
    columns: columns![("Field", ColumnKind::Rid(TableId::Field))],
};

static FIELD: TableDefinition = TableDefinition {
    id: TableId::Field,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
        ("Signature", ColumnKind::BlobIdx),
    ],
};

static METHOD_PTR: TableDefinition = TableDefinition {
    id: TableId::MethodPtr,
    key: None,
    columns: columns![("Method", ColumnKind::Rid(TableId::MethodDef))],
};

static METHOD_DEF: TableDefinition = TableDefinition {
    id: TableId::MethodDef,
    key: None,
    columns: columns![
        ("Rva", ColumnKind::U32),
        ("ImplFlags", ColumnKind::U16),
        ("Flags", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
        ("Signature", ColumnKind::BlobIdx),
        ("ParamList", ColumnKind::Rid(TableId::Param)),
    ],
};

static PARAM_PTR: TableDefinition = TableDefinition {
    id: TableId::ParamPtr,
    key: None,
    columns: columns![("Param", ColumnKind::Rid(TableId::Param))],
};

static PARAM: TableDefinition = TableDefinition {
    id: TableId::Param,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U16),
        ("Sequence", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
    ],
};

static INTERFACE_IMPL: TableDefinition = TableDefinition {
    id: TableId::InterfaceImpl,
    key: Some(0),
    columns: columns![
        ("Class", ColumnKind::Rid(TableId::TypeDef)),
        ("Interface", ColumnKind::Coded(CodedTokenKind::TypeDefOrRef)),
    ],
};

static MEMBER_REF: TableDefinition = TableDefinition {
    id: TableId::MemberRef,
    key: None,
    columns: columns![
        ("Class", ColumnKind::Coded(CodedTokenKind::MemberRefParent)),
        ("Name", ColumnKind::StringIdx),
        ("Signature", ColumnKind::BlobIdx),
    ],
};

static CONSTANT: TableDefinition = TableDefinition {
    id: TableId::Constant,
    key: Some(2),
    columns: columns![
        ("Type", ColumnKind::U8),
        ("Padding", ColumnKind::U8),
        ("Parent", ColumnKind::Coded(CodedTokenKind::HasConstant)),
        ("Value", ColumnKind::BlobIdx),
    ],
};

static CUSTOM_ATTRIBUTE: TableDefinition = TableDefinition {
    id: TableId::CustomAttribute,
    key: Some(0),
    columns: columns![
        (
            "Parent",
            ColumnKind::Coded(CodedTokenKind::HasCustomAttribute)
        ),
        ("Type", ColumnKind::Coded(CodedTokenKind::CustomAttributeType)),
        ("Value", ColumnKind::BlobIdx),
    ],
};

static FIELD_MARSHAL: TableDefinition = TableDefinition {
    id: TableId::FieldMarshal,
    key: Some(0),
    columns: columns![
        ("Parent", ColumnKind::Coded(CodedTokenKind::HasFieldMarshal)),
        ("NativeType", ColumnKind::BlobIdx),
    ],
};

static DECL_SECURITY: TableDefinition = TableDefinition {
    id: TableId::DeclSecurity,
    key: Some(1),
    columns: columns![
        ("Action", ColumnKind::U16),
        ("Parent", ColumnKind::Coded(CodedTokenKind::HasDeclSecurity)),
        ("PermissionSet", ColumnKind::BlobIdx),
    ],
};

static CLASS_LAYOUT: TableDefinition = TableDefinition {
    id: TableId::ClassLayout,
    key: Some(2),
    columns: columns![
        ("PackingSize", ColumnKind::U16),
        ("ClassSize", ColumnKind::U32),
        ("Parent", ColumnKind::Rid(TableId::TypeDef)),
    ],
};

static FIELD_LAYOUT: TableDefinition = TableDefinition {
    id: TableId::FieldLayout,
    key: Some(1),
    columns: columns![
        ("Offset", ColumnKind::U32),
        ("Field", ColumnKind::Rid(TableId::Field)),
    ],
};

static STAND_ALONE_SIG: TableDefinition = TableDefinition {
    id: TableId::StandAloneSig,
    key: None,
    columns: columns![("Signature", ColumnKind::BlobIdx)],
};

static EVENT_MAP: TableDefinition = TableDefinition {
    id: TableId::EventMap,
    key: None,
    columns: columns![
        ("Parent", ColumnKind::Rid(TableId::TypeDef)),
        ("EventList", ColumnKind::Rid(TableId::Event)),
    ],
};

static EVENT_PTR: TableDefinition = TableDefinition {
    id: TableId::EventPtr,
    key: None,
    columns: columns![("Event", ColumnKind::Rid(TableId::Event))],
};

static EVENT: TableDefinition = TableDefinition {
    id: TableId::Event,
    key: None,
    columns: columns![
        ("EventFlags", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
        ("EventType", ColumnKind::Coded(CodedTokenKind::TypeDefOrRef)),
    ],
};

static PROPERTY_MAP: TableDefinition = TableDefinition {
    id: TableId::PropertyMap,
    key: None,
    columns: columns![
        ("Parent", ColumnKind::Rid(TableId::TypeDef)),
        ("PropertyList", ColumnKind::Rid(TableId::Property)),
    ],
};

static PROPERTY_PTR: TableDefinition = TableDefinition {
    id: TableId::PropertyPtr,
    key: None,
    columns: columns![("Property", ColumnKind::Rid(TableId::Property))],
};

static PROPERTY: TableDefinition = TableDefinition {
    id: TableId::Property,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U16),
        ("Name", ColumnKind::StringIdx),
        ("Type", ColumnKind::BlobIdx),
    ],
};

static METHOD_SEMANTICS: TableDefinition = TableDefinition {
    id: TableId::MethodSemantics,
    key: Some(2),
    columns: columns![
        ("Semantics", ColumnKind::U16),
        ("Method", ColumnKind::Rid(TableId::MethodDef)),
        ("Association", ColumnKind::Coded(CodedTokenKind::HasSemantics)),
    ],
};

static METHOD_IMPL: TableDefinition = TableDefinition {
    id: TableId::MethodImpl,
    key: Some(0),
    columns: columns![
        ("Class", ColumnKind::Rid(TableId::TypeDef)),
        ("MethodBody", ColumnKind::Coded(CodedTokenKind::MethodDefOrRef)),
        (
            "MethodDeclaration",
            ColumnKind::Coded(CodedTokenKind::MethodDefOrRef)
        ),
    ],
};

static MODULE_REF: TableDefinition = TableDefinition {
    id: TableId::ModuleRef,
    key: None,
    columns: columns![("Name", ColumnKind::StringIdx)],
};

static TYPE_SPEC: TableDefinition = TableDefinition {
    id: TableId::TypeSpec,
    key: None,
    columns: columns![("Signature", ColumnKind::BlobIdx)],
};

static IMPL_MAP: TableDefinition = TableDefinition {
    id: TableId::ImplMap,
    key: Some(1),
    columns: columns![
        ("MappingFlags", ColumnKind::U16),
        (
            "MemberForwarded",
            ColumnKind::Coded(CodedTokenKind::MemberForwarded)
        ),
        ("ImportName", ColumnKind::StringIdx),
        ("ImportScope", ColumnKind::Rid(TableId::ModuleRef)),
    ],
};

static FIELD_RVA: TableDefinition = TableDefinition {
    id: TableId::FieldRVA,
    key: Some(1),
    columns: columns![
        ("Rva", ColumnKind::U32),
        ("Field", ColumnKind::Rid(TableId::Field)),
    ],
};

static ENC_LOG: TableDefinition = TableDefinition {
    id: TableId::EncLog,
    key: None,
    columns: columns![("Token", ColumnKind::U32), ("FuncCode", ColumnKind::U32)],
};

static ENC_MAP: TableDefinition = TableDefinition {
    id: TableId::EncMap,
    key: None,
    columns: columns![("Token", ColumnKind::U32)],
};

static ASSEMBLY: TableDefinition = TableDefinition {
    id: TableId::Assembly,
    key: None,
    columns: columns![
        ("HashAlgId", ColumnKind::U32),
        ("MajorVersion", ColumnKind::U16),
        ("MinorVersion", ColumnKind::U16),
        ("BuildNumber", ColumnKind::U16),
        ("RevisionNumber", ColumnKind::U16),
        ("Flags", ColumnKind::U32),
        ("PublicKey", ColumnKind::BlobIdx),
        ("Name", ColumnKind::StringIdx),
        ("Locale", ColumnKind::StringIdx),
    ],
};

static ASSEMBLY_PROCESSOR: TableDefinition = TableDefinition {
    id: TableId::AssemblyProcessor,
    key: None,
    columns: columns![("Processor", ColumnKind::U32)],
};

static ASSEMBLY_OS: TableDefinition = TableDefinition {
    id: TableId::AssemblyOS,
    key: None,
    columns: columns![
        ("OsPlatformId", ColumnKind::U32),
        ("OsMajorVersion", ColumnKind::U32),
        ("OsMinorVersion", ColumnKind::U32),
    ],
};

static ASSEMBLY_REF: TableDefinition = TableDefinition {
    id: TableId::AssemblyRef,
    key: None,
    columns: columns![
        ("MajorVersion", ColumnKind::U16),
        ("MinorVersion", ColumnKind::U16),
        ("BuildNumber", ColumnKind::U16),
        ("RevisionNumber", ColumnKind::U16),
        ("Flags", ColumnKind::U32),
        ("PublicKeyOrToken", ColumnKind::BlobIdx),
        ("Name", ColumnKind::StringIdx),
        ("Locale", ColumnKind::StringIdx),
        ("HashValue", ColumnKind::BlobIdx),
    ],
};

static ASSEMBLY_REF_PROCESSOR: TableDefinition = TableDefinition {
    id: TableId::AssemblyRefProcessor,
    key: None,
    columns: columns![
        ("Processor", ColumnKind::U32),
        ("AssemblyRef", ColumnKind::Rid(TableId::AssemblyRef)),
    ],
};

static ASSEMBLY_REF_OS: TableDefinition = TableDefinition {
    id: TableId::AssemblyRefOS,
    key: None,
    columns: columns![
        ("OsPlatformId", ColumnKind::U32),
        ("OsMajorVersion", ColumnKind::U32),
        ("OsMinorVersion", ColumnKind::U32),
        ("AssemblyRef", ColumnKind::Rid(TableId::AssemblyRef)),
    ],
};

static FILE: TableDefinition = TableDefinition {
    id: TableId::File,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U32),
        ("Name", ColumnKind::StringIdx),
        ("HashValue", ColumnKind::BlobIdx),
    ],
};

static EXPORTED_TYPE: TableDefinition = TableDefinition {
    id: TableId::ExportedType,
    key: None,
    columns: columns![
        ("Flags", ColumnKind::U32),
        ("TypeDefId", ColumnKind::U32),
        ("TypeName", ColumnKind::StringIdx),
        ("TypeNamespace", ColumnKind::StringIdx),
        (
            "Implementation",
            ColumnKind::Coded(CodedTokenKind::Implementation)
        ),
    ],
};

static MANIFEST_RESOURCE: TableDefinition = TableDefinition {
    id: TableId::ManifestResource,
    key: None,
    columns: columns![
        ("Offset", ColumnKind::U32),
        ("Flags", ColumnKind::U32),
        ("Name", ColumnKind::StringIdx),
        (
            "Implementation",
            ColumnKind::Coded(CodedTokenKind::Implementation)
        ),
    ],
};

static NESTED_CLASS: TableDefinition = TableDefinition {
    id: TableId::NestedClass,
    key: Some(0),
    columns: columns![
        ("NestedClass", ColumnKind::Rid(TableId::TypeDef)),
        ("EnclosingClass", ColumnKind::Rid(TableId::TypeDef)),
    ],
};

static GENERIC_PARAM: TableDefinition = TableDefinition {
    id: TableId::GenericParam,
    key: Some(2),
    columns: columns![
        ("Number", ColumnKind::U16),
        ("Flags", ColumnKind::U16),
        ("Owner", ColumnKind::Coded(CodedTokenKind::TypeOrMethodDef)),
        ("Name", ColumnKind::StringIdx),
    ],
};

static METHOD_SPEC: TableDefinition = TableDefinition {
    id: TableId::MethodSpec,
    key: Some(0),
    columns: columns![
        ("Method", ColumnKind::Coded(CodedTokenKind::MethodDefOrRef)),
        ("Instantiation", ColumnKind::BlobIdx),
    ],
};

static GENERIC_PARAM_CONSTRAINT: TableDefinition = TableDefinition {
    id: TableId::GenericParamConstraint,
    key: Some(0),
    columns: columns![
        ("Owner", ColumnKind::Rid(TableId::GenericParam)),
        ("Constraint", ColumnKind::Coded(CodedTokenKind::TypeDefOrRef)),
    ],
};

static CATALOG: [&TableDefinition; TABLE_COUNT] = [
    &MODULE,
    &TYPE_REF,
    &TYPE_DEF,
    &FIELD_PTR,
    &FIELD,
    &METHOD_PTR,
    &METHOD_DEF,
    &PARAM_PTR,
    &PARAM,
    &INTERFACE_IMPL,
    &MEMBER_REF,
    &CONSTANT,
    &CUSTOM_ATTRIBUTE,
    &FIELD_MARSHAL,
    &DECL_SECURITY,
    &CLASS_LAYOUT,
    &FIELD_LAYOUT,
    &STAND_ALONE_SIG,
    &EVENT_MAP,
    &EVENT_PTR,
    &EVENT,
    &PROPERTY_MAP,
    &PROPERTY_PTR,
    &PROPERTY,
    &METHOD_SEMANTICS,
    &METHOD_IMPL,
    &MODULE_REF,
    &TYPE_SPEC,
    &IMPL_MAP,
    &FIELD_RVA,
    &ENC_LOG,
    &ENC_MAP,
    &ASSEMBLY,
    &ASSEMBLY_PROCESSOR,
    &ASSEMBLY_OS,
    &ASSEMBLY_REF,
    &ASSEMBLY_REF_PROCESSOR,
    &ASSEMBLY_REF_OS,
    &FILE,
    &EXPORTED_TYPE,
    &MANIFEST_RESOURCE,
    &NESTED_CLASS,
    &GENERIC_PARAM,
    &METHOD_SPEC,
    &GENERIC_PARAM_CONSTRAINT,
];

/// Looks up the layout of `id` under schema major version `major`.
///
/// Returns `None` for tables that do not exist in that version (v1 has no
/// generics tables) or for unsupported versions.
#[must_use]
pub fn table_definition(major: u8, id: TableId) -> Option<&'static TableDefinition> {
    match major {
        1 => match id {
            TableId::GenericParam | TableId::MethodSpec | TableId::GenericParamConstraint => None,
            _ => Some(CATALOG[id as usize]),
        },
        2 => Some(CATALOG[id as usize]),
        _ => None,
    }
}

/// Column index constants, named after the catalog entries above. Kept flat
/// so call sites read `col::TYPEDEF_NAME` instead of a bare number.
pub mod col {
    #![allow(missing_docs)]

    pub const MODULE_GENERATION: usize = 0;
    pub const MODULE_NAME: usize = 1;
    pub const MODULE_MVID: usize = 2;

    pub const TYPEREF_SCOPE: usize = 0;
    pub const TYPEREF_NAME: usize = 1;
    pub const TYPEREF_NAMESPACE: usize = 2;

    pub const TYPEDEF_FLAGS: usize = 0;
    pub const TYPEDEF_NAME: usize = 1;
    pub const TYPEDEF_NAMESPACE: usize = 2;
    pub const TYPEDEF_EXTENDS: usize = 3;
    pub const TYPEDEF_FIELDLIST: usize = 4;
    pub const TYPEDEF_METHODLIST: usize = 5;

    pub const PTR_TARGET: usize = 0;

    pub const FIELD_FLAGS: usize = 0;
    pub const FIELD_NAME: usize = 1;
    pub const FIELD_SIGNATURE: usize = 2;

    pub const METHOD_RVA: usize = 0;
    pub const METHOD_IMPLFLAGS: usize = 1;
    pub const METHOD_FLAGS: usize = 2;
    pub const METHOD_NAME: usize = 3;
    pub const METHOD_SIGNATURE: usize = 4;
    pub const METHOD_PARAMLIST: usize = 5;

    pub const PARAM_FLAGS: usize = 0;
    pub const PARAM_SEQUENCE: usize = 1;
    pub const PARAM_NAME: usize = 2;

    pub const INTERFACEIMPL_CLASS: usize = 0;
    pub const INTERFACEIMPL_INTERFACE: usize = 1;

    pub const MEMBERREF_CLASS: usize = 0;
    pub const MEMBERREF_NAME: usize = 1;
    pub const MEMBERREF_SIGNATURE: usize = 2;

    pub const CONSTANT_TYPE: usize = 0;
    pub const CONSTANT_PARENT: usize = 2;
    pub const CONSTANT_VALUE: usize = 3;

    pub const CA_PARENT: usize = 0;
    pub const CA_TYPE: usize = 1;
    pub const CA_VALUE: usize = 2;

    pub const FIELDMARSHAL_PARENT: usize = 0;
    pub const FIELDMARSHAL_NATIVETYPE: usize = 1;

    pub const DECLSECURITY_ACTION: usize = 0;
    pub const DECLSECURITY_PARENT: usize = 1;
    pub const DECLSECURITY_PERMISSIONSET: usize = 2;

    pub const CLASSLAYOUT_PACKINGSIZE: usize = 0;
    pub const CLASSLAYOUT_CLASSSIZE: usize = 1;
    pub const CLASSLAYOUT_PARENT: usize = 2;

    pub const FIELDLAYOUT_OFFSET: usize = 0;
    pub const FIELDLAYOUT_FIELD: usize = 1;

    pub const STANDALONESIG_SIGNATURE: usize = 0;

    pub const EVENTMAP_PARENT: usize = 0;
    pub const EVENTMAP_EVENTLIST: usize = 1;

    pub const EVENT_FLAGS: usize = 0;
    pub const EVENT_NAME: usize = 1;
    pub const EVENT_TYPE: usize = 2;

    pub const PROPERTYMAP_PARENT: usize = 0;
    pub const PROPERTYMAP_PROPERTYLIST: usize = 1;

    pub const PROPERTY_FLAGS: usize = 0;
    pub const PROPERTY_NAME: usize = 1;
    pub const PROPERTY_TYPE: usize = 2;

    pub const METHODSEMANTICS_SEMANTICS: usize = 0;
    pub const METHODSEMANTICS_METHOD: usize = 1;
    pub const METHODSEMANTICS_ASSOCIATION: usize = 2;

    pub const METHODIMPL_CLASS: usize = 0;
    pub const METHODIMPL_BODY: usize = 1;
    pub const METHODIMPL_DECLARATION: usize = 2;

    pub const MODULEREF_NAME: usize = 0;

    pub const TYPESPEC_SIGNATURE: usize = 0;

    pub const IMPLMAP_MAPPINGFLAGS: usize = 0;
    pub const IMPLMAP_MEMBERFORWARDED: usize = 1;
    pub const IMPLMAP_IMPORTNAME: usize = 2;
    pub const IMPLMAP_IMPORTSCOPE: usize = 3;

    pub const FIELDRVA_RVA: usize = 0;
    pub const FIELDRVA_FIELD: usize = 1;

    pub const ASSEMBLY_HASHALGID: usize = 0;
    pub const ASSEMBLY_FLAGS: usize = 5;
    pub const ASSEMBLY_PUBLICKEY: usize = 6;
    pub const ASSEMBLY_NAME: usize = 7;
    pub const ASSEMBLY_LOCALE: usize = 8;

    pub const ASSEMBLYREF_MAJOR: usize = 0;
    pub const ASSEMBLYREF_MINOR: usize = 1;
    pub const ASSEMBLYREF_BUILD: usize = 2;
    pub const ASSEMBLYREF_REVISION: usize = 3;
    pub const ASSEMBLYREF_FLAGS: usize = 4;
    pub const ASSEMBLYREF_PUBLICKEY: usize = 5;
    pub const ASSEMBLYREF_NAME: usize = 6;
    pub const ASSEMBLYREF_LOCALE: usize = 7;
    pub const ASSEMBLYREF_HASHVALUE: usize = 8;

    pub const FILE_FLAGS: usize = 0;
    pub const FILE_NAME: usize = 1;
    pub const FILE_HASHVALUE: usize = 2;

    pub const EXPORTEDTYPE_FLAGS: usize = 0;
    pub const EXPORTEDTYPE_TYPEDEFID: usize = 1;
    pub const EXPORTEDTYPE_NAME: usize = 2;
    pub const EXPORTEDTYPE_NAMESPACE: usize = 3;
    pub const EXPORTEDTYPE_IMPLEMENTATION: usize = 4;

    pub const MANIFESTRESOURCE_OFFSET: usize = 0;
    pub const MANIFESTRESOURCE_FLAGS: usize = 1;
    pub const MANIFESTRESOURCE_NAME: usize = 2;
    pub const MANIFESTRESOURCE_IMPLEMENTATION: usize = 3;

    pub const NESTEDCLASS_NESTED: usize = 0;
    pub const NESTEDCLASS_ENCLOSING: usize = 1;

    pub const GENERICPARAM_NUMBER: usize = 0;
    pub const GENERICPARAM_FLAGS: usize = 1;
    pub const GENERICPARAM_OWNER: usize = 2;
    pub const GENERICPARAM_NAME: usize = 3;

    pub const METHODSPEC_METHOD: usize = 0;
    pub const METHODSPEC_INSTANTIATION: usize = 1;

    pub const GPCONSTRAINT_OWNER: usize = 0;
    pub const GPCONSTRAINT_CONSTRAINT: usize = 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn catalog_is_complete_and_ordered() {
        for id in TableId::iter() {
            let def = table_definition(2, id).unwrap();
            assert_eq!(def.id, id);
            assert!(!def.columns.is_empty());
            if let Some(key) = def.key {
                assert!(key < def.columns.len());
            }
        }
    }

    #[test]
    fn v1_has_no_generics_tables() {
        assert!(table_definition(1, TableId::GenericParam).is_none());
        assert!(table_definition(1, TableId::MethodSpec).is_none());
        assert!(table_definition(1, TableId::GenericParamConstraint).is_none());
        assert!(table_definition(1, TableId::TypeDef).is_some());
        assert!(table_definition(3, TableId::TypeDef).is_none());
    }

    #[test]
    fn mem_layout() {
        let def = table_definition(2, TableId::TypeDef).unwrap();
        // u32 + 5 wide index columns
        assert_eq!(def.mem_size(), 24);
        assert_eq!(def.mem_offset(col::TYPEDEF_NAME), 4);
        assert_eq!(def.mem_offset(col::TYPEDEF_METHODLIST), 20);

        let def = table_definition(2, TableId::Constant).unwrap();
        assert_eq!(def.mem_offset(col::CONSTANT_PARENT), 2);
    }
}
