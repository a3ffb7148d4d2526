//! The merge engine: folds N import scopes into one emit scope.
//!
//! The merge runs as a strict, fixed sequence of phases, each sweeping all
//! import scopes before the next phase starts. The ordering is load-bearing:
//! a phase may remap any token that an earlier phase resolved, and nothing
//! else. Verification failures on duplicate rows go through the
//! [`ErrorPolicy`] collaborator, which may accept the emit state as
//! authoritative and continue; integrity failures (a token that should have
//! been resolved, a conflicting remap) abort unconditionally. On abort the
//! emit scope is left at the current table boundary and must be discarded
//! by the caller.

use crate::{
    database::MetaDatabase,
    merge::{
        config::{MergeConfig, MergeFlags},
        remap::RemapMap,
        session::{
            AbortPolicy, ErrorAction, ErrorPolicy, ImportScope, MergeErrorKind, NoSecurityPolicy,
            NotifySink, OpaqueSignatures, SecurityPolicy, SecurityStatus, SignatureRewriter,
        },
    },
    schema::{col, TableId, Token, USER_STRING_TAG},
    tables::{hash_bytes, hash_parent_name, HashIndex},
    Error, Result,
};

/// Flag bits the merge consults on type and member rows.
pub mod marks {
    /// Mask selecting a type's visibility out of its flags.
    pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Type flag bit exempting the type from duplicate verification.
    pub const TYPE_SUPPRESS_CHECK: u32 = 0x0080_0000;
    /// Mask selecting a member's access out of its flags.
    pub const MEMBER_ACCESS_MASK: u32 = 0x0007;
    /// Access value of compiler-controlled ("privatescope") members.
    pub const MEMBER_COMPILER_CONTROLLED: u32 = 0x0000;
    /// Member flag bit exempting the member from duplicate verification.
    pub const MEMBER_SUPPRESS_CHECK: u32 = 0x0008;
}

/// Name of the global type holding module-level members.
const GLOBAL_TYPE_NAME: &str = "<Module>";
/// Name marking a logically deleted row left behind by edit-and-continue.
const DELETE_MARKER: &str = "_Deleted";
/// Emit TypeDef count above which name lookups go through a hash index.
const TYPE_INDEX_THRESHOLD: u32 = 32;
/// Low calling-convention nibble of a vararg member signature.
const VARARG_CALLCONV: u8 = 0x05;

/// Merges import scopes into one emit scope.
pub struct MergeEngine {
    emit: MetaDatabase,
    imports: Vec<ImportScope>,
    error_policy: Box<dyn ErrorPolicy>,
    security_policy: Box<dyn SecurityPolicy>,
    signatures: Box<dyn SignatureRewriter>,
    type_index: Option<HashIndex>,
}

impl MergeEngine {
    /// Creates an engine targeting `emit`, with the default collaborators:
    /// abort on any mismatch, no security consolidation, signatures treated
    /// as token-free.
    #[must_use]
    pub fn new(emit: MetaDatabase) -> Self {
        MergeEngine {
            emit,
            imports: Vec::new(),
            error_policy: Box::new(AbortPolicy),
            security_policy: Box::new(NoSecurityPolicy),
            signatures: Box::new(OpaqueSignatures),
            type_index: None,
        }
    }

    /// Registers an import scope and the sink its notifications go to.
    /// The scope is frozen; it stays read-only for the rest of its life.
    pub fn add_import(&mut self, mut db: MetaDatabase, notify: Box<dyn NotifySink>) {
        db.freeze();
        self.imports.push(ImportScope {
            db,
            remap: RemapMap::new(),
            notify,
            security: SecurityStatus::empty(),
        });
    }

    /// Replaces the error policy.
    pub fn set_error_policy(&mut self, policy: Box<dyn ErrorPolicy>) {
        self.error_policy = policy;
    }

    /// Replaces the security policy.
    pub fn set_security_policy(&mut self, policy: Box<dyn SecurityPolicy>) {
        self.security_policy = policy;
    }

    /// Replaces the signature rewriter.
    pub fn set_signature_rewriter(&mut self, signatures: Box<dyn SignatureRewriter>) {
        self.signatures = signatures;
    }

    /// The emit scope.
    #[must_use]
    pub fn emit(&self) -> &MetaDatabase {
        &self.emit
    }

    /// Consumes the engine, returning the emit scope.
    #[must_use]
    pub fn into_emit(self) -> MetaDatabase {
        self.emit
    }

    /// The remap map of import scope `index`.
    #[must_use]
    pub fn scope_remap(&self, index: usize) -> &RemapMap {
        &self.imports[index].remap
    }

    /// Runs the full merge.
    ///
    /// # Errors
    /// Fails on corruption in any scope, on an integrity violation, or on a
    /// mismatch the error policy turned into an abort. The emit scope must
    /// be discarded on error.
    pub fn merge(&mut self, config: MergeConfig) -> Result<()> {
        for scope in &mut self.imports {
            scope.security = self.security_policy.classify_scope(&scope.db);
        }

        const PHASES: usize = 10;
        for phase in 0..PHASES {
            for index in 0..self.imports.len() {
                let mut pass = Pass {
                    emit: &mut self.emit,
                    scope: &mut self.imports[index],
                    index,
                    config,
                    policy: &mut *self.error_policy,
                    signatures: &*self.signatures,
                    type_index: &mut self.type_index,
                };
                pass.run_phase(phase)?;
            }
        }

        if !self.imports.is_empty() {
            let mut union = SecurityStatus::empty();
            let mut intersection = SecurityStatus::all();
            for scope in &self.imports {
                union |= scope.security;
                intersection &= scope.security;
            }
            self.security_policy
                .consolidate(union, intersection, &mut self.emit)?;
        }

        for scope in &mut self.imports {
            scope.remap.finalize();
            let ImportScope { remap, notify, .. } = scope;
            for record in remap.iter() {
                if !record.deleted && record.from != record.to {
                    notify.on_token_mapped(record.from, record.to);
                }
            }
        }
        Ok(())
    }
}

/// One phase run of one import scope against the emit scope.
struct Pass<'a> {
    emit: &'a mut MetaDatabase,
    scope: &'a mut ImportScope,
    index: usize,
    config: MergeConfig,
    policy: &'a mut dyn ErrorPolicy,
    signatures: &'a dyn SignatureRewriter,
    type_index: &'a mut Option<HashIndex>,
}

impl Pass<'_> {
    fn run_phase(&mut self, phase: usize) -> Result<()> {
        match phase {
            0 => self.merge_module(),
            1 => self.merge_type_def_names(),
            2 => self.merge_module_and_assembly_refs(),
            3 => self.merge_type_refs(),
            4 => self.merge_type_specs(),
            5 => self.complete_type_defs(),
            6 => self.merge_children(),
            7 => self.merge_member_refs(),
            8 => self.merge_interface_impls(),
            _ => self.merge_remaining(),
        }
    }

    // ----- shared helpers -----------------------------------------------

    fn dup_checked(&self) -> bool {
        !self.config.flags.contains(MergeFlags::NO_DUP_CHECK)
    }

    fn mismatch(&mut self, kind: MergeErrorKind, token: Token) -> Result<()> {
        match self.policy.on_mismatch(kind, self.index, token) {
            ErrorAction::Continue => Ok(()),
            ErrorAction::Abort => Err(Error::MergeMismatch { kind, token }),
        }
    }

    /// Resolves a token that an earlier continuable error may have left
    /// unmapped; `None` means "skip the dependent row".
    fn try_remap(&self, token: Token) -> Option<Token> {
        if token.is_nil() {
            return Some(token);
        }
        self.scope
            .remap
            .find(token)
            .filter(|record| !record.deleted)
            .map(|record| record.to)
    }

    fn import_string(&self, table: TableId, rid: u32, column: usize) -> Result<String> {
        let offset = self.scope.db.get(table, rid, column)?;
        Ok(self.scope.db.strings().get(offset)?.to_string())
    }

    fn copy_string(&mut self, value: &str) -> Result<u32> {
        self.emit.strings_mut()?.add(value)
    }

    fn copy_blob(&mut self, table: TableId, rid: u32, column: usize) -> Result<u32> {
        let offset = self.scope.db.get(table, rid, column)?;
        let bytes = self.scope.db.blobs().get(offset)?.to_vec();
        self.emit.blobs_mut()?.add(&bytes)
    }

    /// The import blob at (`table`, `rid`, `column`) with every embedded
    /// token rewritten through this scope's remap map. Each token the
    /// rewriter resolves is marked as found in import content.
    fn rewrite_signature(&mut self, table: TableId, rid: u32, column: usize) -> Result<Vec<u8>> {
        let offset = self.scope.db.get(table, rid, column)?;
        let ImportScope { db, remap, .. } = &mut *self.scope;
        let bytes = db.blobs().get(offset)?;
        self.signatures.rewrite(bytes, &mut |token| {
            remap.mark_found(token);
            remap.remap(token)
        })
    }

    fn emit_string_eq(&self, offset: u32, value: &str) -> Result<bool> {
        Ok(self.emit.strings().get(offset)? == value)
    }

    fn emit_blob_eq(&self, offset: u32, value: &[u8]) -> Result<bool> {
        Ok(self.emit.blobs().get(offset)? == value)
    }

    fn type_key(namespace: &str, name: &str, enclosing: Token) -> u32 {
        hash_parent_name(enclosing.value(), name) ^ hash_bytes(namespace.as_bytes())
    }

    /// Enclosing type of emit TypeDef `rid`, nil for top-level types.
    fn emit_enclosing_of(&self, rid: u32) -> Result<Token> {
        for row in 1..=self.emit.rows(TableId::NestedClass) {
            if self.emit.get(TableId::NestedClass, row, col::NESTEDCLASS_NESTED)? == rid {
                let enclosing =
                    self.emit.get(TableId::NestedClass, row, col::NESTEDCLASS_ENCLOSING)?;
                return Ok(TableId::TypeDef.token(enclosing));
            }
        }
        Ok(Token::new(0))
    }

    fn emit_type_matches(
        &self,
        rid: u32,
        namespace: &str,
        name: &str,
        enclosing: Token,
    ) -> Result<bool> {
        let name_offset = self.emit.get(TableId::TypeDef, rid, col::TYPEDEF_NAME)?;
        if !self.emit_string_eq(name_offset, name)? {
            return Ok(false);
        }
        let ns_offset = self.emit.get(TableId::TypeDef, rid, col::TYPEDEF_NAMESPACE)?;
        if !self.emit_string_eq(ns_offset, namespace)? {
            return Ok(false);
        }
        Ok(self.emit_enclosing_of(rid)? == enclosing)
    }

    /// Finds an emit TypeDef by (namespace, name, enclosing type), through
    /// the hash index once the table is large enough. The index is a pure
    /// accelerator; the linear scan gives the same answer.
    fn find_emit_type(
        &mut self,
        namespace: &str,
        name: &str,
        enclosing: Token,
    ) -> Result<Option<u32>> {
        let rows = self.emit.rows(TableId::TypeDef);

        if rows >= TYPE_INDEX_THRESHOLD {
            if self.type_index.is_none() {
                let mut index = HashIndex::new();
                for rid in 1..=rows {
                    let type_name = {
                        let offset = self.emit.get(TableId::TypeDef, rid, col::TYPEDEF_NAME)?;
                        self.emit.strings().get(offset)?.to_string()
                    };
                    let type_ns = {
                        let offset =
                            self.emit.get(TableId::TypeDef, rid, col::TYPEDEF_NAMESPACE)?;
                        self.emit.strings().get(offset)?.to_string()
                    };
                    let type_enclosing = self.emit_enclosing_of(rid)?;
                    index.add(Self::type_key(&type_ns, &type_name, type_enclosing), rid);
                }
                *self.type_index = Some(index);
            }

            if let Some(index) = self.type_index.as_ref() {
                let candidates: Vec<u32> =
                    index.find(Self::type_key(namespace, name, enclosing)).collect();
                for rid in candidates {
                    if self.emit_type_matches(rid, namespace, name, enclosing)? {
                        return Ok(Some(rid));
                    }
                }
                return Ok(None);
            }
        }

        for rid in 1..=rows {
            if self.emit_type_matches(rid, namespace, name, enclosing)? {
                return Ok(Some(rid));
            }
        }
        Ok(None)
    }

    fn is_global_emit_type(&self, rid: u32) -> Result<bool> {
        let offset = self.emit.get(TableId::TypeDef, rid, col::TYPEDEF_NAME)?;
        self.emit_string_eq(offset, GLOBAL_TYPE_NAME)
    }

    // ----- phase 1: module ----------------------------------------------

    fn merge_module(&mut self) -> Result<()> {
        if self.scope.db.rows(TableId::Module) == 0 {
            return Err(malformed_error!("Import scope carries no module record"));
        }

        let had_module = self.emit.rows(TableId::Module) > 0;
        if !had_module {
            let name = self.import_string(TableId::Module, 1, col::MODULE_NAME)?;
            let name_ix = self.copy_string(&name)?;

            let mvid_ix = self.scope.db.get(TableId::Module, 1, col::MODULE_MVID)?;
            let mvid = if mvid_ix == 0 {
                0
            } else {
                let guid = self.scope.db.guids().get(mvid_ix)?;
                self.emit.guids_mut()?.add(&guid)
            };

            let rid = self.emit.add_record(TableId::Module)?;
            self.emit.set(TableId::Module, rid, col::MODULE_NAME, name_ix)?;
            self.emit.set(TableId::Module, rid, col::MODULE_MVID, mvid)?;
        }

        // The module row is never duplicated; every scope's module folds
        // onto the single emit module
        self.scope.remap.insert(
            TableId::Module.token(1),
            TableId::Module.token(1),
            had_module,
        )
    }

    // ----- phase 2: TypeDef names ---------------------------------------

    fn merge_type_def_names(&mut self) -> Result<()> {
        let total = self.scope.db.rows(TableId::TypeDef);

        // Enclosing type per import TypeDef RID, 0 for top-level
        let mut enclosing = vec![0u32; total as usize + 1];
        for row in 1..=self.scope.db.rows(TableId::NestedClass) {
            let nested = self.scope.db.get(TableId::NestedClass, row, col::NESTEDCLASS_NESTED)?;
            let owner =
                self.scope.db.get(TableId::NestedClass, row, col::NESTEDCLASS_ENCLOSING)?;
            if let Some(slot) = enclosing.get_mut(nested as usize) {
                *slot = owner;
            }
        }

        // A nested type needs its enclosing type mapped first; nesting is
        // acyclic, so repeated sweeps always make progress
        let mut pending: Vec<u32> = (1..=total).collect();
        loop {
            let before = pending.len();
            let mut deferred = Vec::new();
            for rid in pending.drain(..) {
                let owner = enclosing[rid as usize];
                if owner != 0 && self.scope.remap.find(TableId::TypeDef.token(owner)).is_none() {
                    deferred.push(rid);
                    continue;
                }
                self.merge_one_type_def(rid, owner)?;
            }
            if deferred.is_empty() {
                return Ok(());
            }
            if deferred.len() == before {
                return Err(malformed_error!("Cyclic type nesting in import scope"));
            }
            pending = deferred;
        }
    }

    fn merge_one_type_def(&mut self, rid: u32, owner: u32) -> Result<()> {
        let from = TableId::TypeDef.token(rid);
        let name = self.import_string(TableId::TypeDef, rid, col::TYPEDEF_NAME)?;
        if name == DELETE_MARKER {
            return self.scope.remap.insert_deleted(from);
        }

        let namespace = self.import_string(TableId::TypeDef, rid, col::TYPEDEF_NAMESPACE)?;
        let flags = self.scope.db.get(TableId::TypeDef, rid, col::TYPEDEF_FLAGS)?;
        let enclosing = if owner == 0 {
            Token::new(0)
        } else {
            match self.scope.remap.find(TableId::TypeDef.token(owner)) {
                // Nesting inside a deleted type deletes the whole subtree
                Some(record) if record.deleted => {
                    return self.scope.remap.insert_deleted(from);
                }
                Some(record) => record.to,
                None => return Err(Error::UnresolvedToken(TableId::TypeDef.token(owner))),
            }
        };

        if self.dup_checked() {
            if let Some(existing) = self.find_emit_type(&namespace, &name, enclosing)? {
                let emit_flags = self.emit.get(TableId::TypeDef, existing, col::TYPEDEF_FLAGS)?;
                if flags & marks::TYPE_VISIBILITY_MASK
                    != emit_flags & marks::TYPE_VISIBILITY_MASK
                {
                    self.mismatch(MergeErrorKind::MismatchedVisibility, from)?;
                }
                if flags & marks::TYPE_SUPPRESS_CHECK != emit_flags & marks::TYPE_SUPPRESS_CHECK {
                    self.mismatch(MergeErrorKind::Inconsistency, from)?;
                }
                return self
                    .scope
                    .remap
                    .insert(from, TableId::TypeDef.token(existing), true);
            }
        }

        let name_ix = self.copy_string(&name)?;
        let ns_ix = self.copy_string(&namespace)?;
        let new_rid = self.emit.add_record(TableId::TypeDef)?;
        self.emit.set(TableId::TypeDef, new_rid, col::TYPEDEF_FLAGS, flags)?;
        self.emit.set(TableId::TypeDef, new_rid, col::TYPEDEF_NAME, name_ix)?;
        self.emit.set(TableId::TypeDef, new_rid, col::TYPEDEF_NAMESPACE, ns_ix)?;
        // Extends is deferred to phase 6; TypeRefs/TypeSpecs do not exist yet

        if !enclosing.is_nil() {
            let nested = self.emit.add_record(TableId::NestedClass)?;
            self.emit.set(TableId::NestedClass, nested, col::NESTEDCLASS_NESTED, new_rid)?;
            self.emit.set(
                TableId::NestedClass,
                nested,
                col::NESTEDCLASS_ENCLOSING,
                enclosing.rid(),
            )?;
        }

        if let Some(index) = self.type_index.as_mut() {
            index.add(Self::type_key(&namespace, &name, enclosing), new_rid);
        }
        self.scope
            .remap
            .insert(from, TableId::TypeDef.token(new_rid), false)
    }

    // ----- phase 3: ModuleRef / AssemblyRef -----------------------------

    fn merge_module_and_assembly_refs(&mut self) -> Result<()> {
        let module_name = {
            let offset = self.emit.get(TableId::Module, 1, col::MODULE_NAME)?;
            self.emit.strings().get(offset)?.to_string()
        };

        for rid in 1..=self.scope.db.rows(TableId::ModuleRef) {
            let from = TableId::ModuleRef.token(rid);
            let name = self.import_string(TableId::ModuleRef, rid, col::MODULEREF_NAME)?;

            // A self-reference folds onto the module record itself
            if name == module_name {
                self.scope.remap.insert(from, TableId::Module.token(1), true)?;
                continue;
            }

            let mut existing = None;
            if self.dup_checked() {
                for emit_rid in 1..=self.emit.rows(TableId::ModuleRef) {
                    let offset = self.emit.get(TableId::ModuleRef, emit_rid, col::MODULEREF_NAME)?;
                    if self.emit_string_eq(offset, &name)? {
                        existing = Some(emit_rid);
                        break;
                    }
                }
            }

            match existing {
                Some(emit_rid) => {
                    self.scope
                        .remap
                        .insert(from, TableId::ModuleRef.token(emit_rid), true)?;
                }
                None => {
                    let name_ix = self.copy_string(&name)?;
                    let new_rid = self.emit.add_record(TableId::ModuleRef)?;
                    self.emit.set(TableId::ModuleRef, new_rid, col::MODULEREF_NAME, name_ix)?;
                    self.scope
                        .remap
                        .insert(from, TableId::ModuleRef.token(new_rid), false)?;
                }
            }
        }

        for rid in 1..=self.scope.db.rows(TableId::AssemblyRef) {
            self.merge_one_assembly_ref(rid)?;
        }
        Ok(())
    }

    fn merge_one_assembly_ref(&mut self, rid: u32) -> Result<()> {
        let from = TableId::AssemblyRef.token(rid);
        let name = self.import_string(TableId::AssemblyRef, rid, col::ASSEMBLYREF_NAME)?;
        let locale = self.import_string(TableId::AssemblyRef, rid, col::ASSEMBLYREF_LOCALE)?;
        let key = {
            let offset = self.scope.db.get(TableId::AssemblyRef, rid, col::ASSEMBLYREF_PUBLICKEY)?;
            self.scope.db.blobs().get(offset)?.to_vec()
        };
        let version: Vec<u32> = (col::ASSEMBLYREF_MAJOR..=col::ASSEMBLYREF_REVISION)
            .map(|column| self.scope.db.get(TableId::AssemblyRef, rid, column))
            .collect::<Result<_>>()?;

        if self.dup_checked() {
            for emit_rid in 1..=self.emit.rows(TableId::AssemblyRef) {
                let name_off = self.emit.get(TableId::AssemblyRef, emit_rid, col::ASSEMBLYREF_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let locale_off =
                    self.emit.get(TableId::AssemblyRef, emit_rid, col::ASSEMBLYREF_LOCALE)?;
                if !self.emit_string_eq(locale_off, &locale)? {
                    continue;
                }
                let key_off =
                    self.emit.get(TableId::AssemblyRef, emit_rid, col::ASSEMBLYREF_PUBLICKEY)?;
                if !self.emit_blob_eq(key_off, &key)? {
                    continue;
                }
                let same_version = (col::ASSEMBLYREF_MAJOR..=col::ASSEMBLYREF_REVISION).try_fold(
                    true,
                    |same, column| -> Result<bool> {
                        Ok(same
                            && self.emit.get(TableId::AssemblyRef, emit_rid, column)?
                                == version[column])
                    },
                )?;
                if !same_version {
                    continue;
                }
                return self
                    .scope
                    .remap
                    .insert(from, TableId::AssemblyRef.token(emit_rid), true);
            }
        }

        let flags = self.scope.db.get(TableId::AssemblyRef, rid, col::ASSEMBLYREF_FLAGS)?;
        let name_ix = self.copy_string(&name)?;
        let locale_ix = self.copy_string(&locale)?;
        let key_ix = self.emit.blobs_mut()?.add(&key)?;
        let hash_ix = self.copy_blob(TableId::AssemblyRef, rid, col::ASSEMBLYREF_HASHVALUE)?;

        let new_rid = self.emit.add_record(TableId::AssemblyRef)?;
        for column in col::ASSEMBLYREF_MAJOR..=col::ASSEMBLYREF_REVISION {
            self.emit.set(TableId::AssemblyRef, new_rid, column, version[column])?;
        }
        self.emit.set(TableId::AssemblyRef, new_rid, col::ASSEMBLYREF_FLAGS, flags)?;
        self.emit.set(TableId::AssemblyRef, new_rid, col::ASSEMBLYREF_PUBLICKEY, key_ix)?;
        self.emit.set(TableId::AssemblyRef, new_rid, col::ASSEMBLYREF_NAME, name_ix)?;
        self.emit.set(TableId::AssemblyRef, new_rid, col::ASSEMBLYREF_LOCALE, locale_ix)?;
        self.emit.set(TableId::AssemblyRef, new_rid, col::ASSEMBLYREF_HASHVALUE, hash_ix)?;
        self.scope
            .remap
            .insert(from, TableId::AssemblyRef.token(new_rid), false)
    }

    // ----- phase 4: TypeRefs --------------------------------------------

    fn merge_type_refs(&mut self) -> Result<()> {
        let total = self.scope.db.rows(TableId::TypeRef);

        // A TypeRef nested in another TypeRef needs its scope mapped first
        let mut pending: Vec<u32> = (1..=total).collect();
        loop {
            let before = pending.len();
            let mut deferred = Vec::new();
            for rid in pending.drain(..) {
                let scope_token = self.scope.db.get_token(TableId::TypeRef, rid, col::TYPEREF_SCOPE)?;
                if scope_token.table() == TableId::TypeRef as u8
                    && !scope_token.is_nil()
                    && self.scope.remap.find(scope_token).is_none()
                {
                    deferred.push(rid);
                    continue;
                }
                self.merge_one_type_ref(rid, scope_token)?;
            }
            if deferred.is_empty() {
                return Ok(());
            }
            if deferred.len() == before {
                return Err(malformed_error!("Cyclic TypeRef resolution scopes"));
            }
            pending = deferred;
        }
    }

    fn merge_one_type_ref(&mut self, rid: u32, scope_token: Token) -> Result<()> {
        let from = TableId::TypeRef.token(rid);
        let name = self.import_string(TableId::TypeRef, rid, col::TYPEREF_NAME)?;
        let namespace = self.import_string(TableId::TypeRef, rid, col::TYPEREF_NAMESPACE)?;
        let resolved = self.scope.remap.remap(scope_token)?;

        if self.config.ref_to_def.type_refs {
            if resolved.table() == TableId::TypeDef as u8 && !resolved.is_nil() {
                // The resolution scope itself collapsed onto a TypeDef, so
                // a matching nested TypeDef must exist
                return match self.find_emit_type(&namespace, &name, resolved)? {
                    Some(def) => self
                        .scope
                        .remap
                        .insert(from, TableId::TypeDef.token(def), true),
                    None => Err(Error::TypeDefMissing(from)),
                };
            }
            if resolved.table() == TableId::Module as u8 && !resolved.is_nil() {
                if let Some(def) = self.find_emit_type(&namespace, &name, Token::new(0))? {
                    return self
                        .scope
                        .remap
                        .insert(from, TableId::TypeDef.token(def), true);
                }
                // Not defined in the merged module; keep the reference row
            }
        }

        if self.dup_checked() {
            for emit_rid in 1..=self.emit.rows(TableId::TypeRef) {
                let emit_scope = self.emit.get_token(TableId::TypeRef, emit_rid, col::TYPEREF_SCOPE)?;
                if emit_scope != resolved {
                    continue;
                }
                let name_off = self.emit.get(TableId::TypeRef, emit_rid, col::TYPEREF_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let ns_off = self.emit.get(TableId::TypeRef, emit_rid, col::TYPEREF_NAMESPACE)?;
                if !self.emit_string_eq(ns_off, &namespace)? {
                    continue;
                }
                return self
                    .scope
                    .remap
                    .insert(from, TableId::TypeRef.token(emit_rid), true);
            }
        }

        let name_ix = self.copy_string(&name)?;
        let ns_ix = self.copy_string(&namespace)?;
        let new_rid = self.emit.add_record(TableId::TypeRef)?;
        self.emit.set_token(TableId::TypeRef, new_rid, col::TYPEREF_SCOPE, resolved)?;
        self.emit.set(TableId::TypeRef, new_rid, col::TYPEREF_NAME, name_ix)?;
        self.emit.set(TableId::TypeRef, new_rid, col::TYPEREF_NAMESPACE, ns_ix)?;
        self.scope
            .remap
            .insert(from, TableId::TypeRef.token(new_rid), false)
    }

    // ----- phase 5: TypeSpecs -------------------------------------------

    fn merge_type_specs(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::TypeSpec) {
            let from = TableId::TypeSpec.token(rid);
            let signature =
                self.rewrite_signature(TableId::TypeSpec, rid, col::TYPESPEC_SIGNATURE)?;

            let mut existing = None;
            if self.dup_checked() {
                for emit_rid in 1..=self.emit.rows(TableId::TypeSpec) {
                    let offset =
                        self.emit.get(TableId::TypeSpec, emit_rid, col::TYPESPEC_SIGNATURE)?;
                    if self.emit_blob_eq(offset, &signature)? {
                        existing = Some(emit_rid);
                        break;
                    }
                }
            }

            match existing {
                Some(emit_rid) => {
                    self.scope
                        .remap
                        .insert(from, TableId::TypeSpec.token(emit_rid), true)?;
                }
                None => {
                    let offset = self.emit.blobs_mut()?.add(&signature)?;
                    let new_rid = self.emit.add_record(TableId::TypeSpec)?;
                    self.emit.set(TableId::TypeSpec, new_rid, col::TYPESPEC_SIGNATURE, offset)?;
                    self.scope
                        .remap
                        .insert(from, TableId::TypeSpec.token(new_rid), false)?;
                }
            }
        }
        Ok(())
    }

    // ----- phase 6: complete TypeDefs -----------------------------------

    fn complete_type_defs(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::TypeDef) {
            let from = TableId::TypeDef.token(rid);
            let Some(record) = self.scope.remap.find(from).copied() else {
                continue;
            };
            if record.deleted {
                continue;
            }

            let extends = self.scope.db.get_token(TableId::TypeDef, rid, col::TYPEDEF_EXTENDS)?;
            let remapped = self.scope.remap.remap(extends)?;

            if record.duplicate {
                let emit_extends =
                    self.emit.get_token(TableId::TypeDef, record.to.rid(), col::TYPEDEF_EXTENDS)?;
                if emit_extends != remapped && self.dup_checked() {
                    self.mismatch(MergeErrorKind::Inconsistency, from)?;
                }
            } else if !remapped.is_nil() {
                self.emit
                    .set_token(TableId::TypeDef, record.to.rid(), col::TYPEDEF_EXTENDS, remapped)?;
            }
        }
        Ok(())
    }

    // ----- phase 7: TypeDef children ------------------------------------

    fn merge_children(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::TypeDef) {
            let from = TableId::TypeDef.token(rid);
            let Some(record) = self.scope.remap.find(from).copied() else {
                continue;
            };
            if record.deleted {
                continue;
            }

            if record.duplicate && self.dup_checked() {
                self.verify_children(rid, record.to.rid())?;
            } else if !record.duplicate {
                self.copy_children(rid, record.to.rid())?;
            }
        }
        Ok(())
    }

    fn copy_children(&mut self, rid: u32, to: u32) -> Result<()> {
        for method in self.scope.db.children_of(TableId::TypeDef, rid, TableId::MethodDef)? {
            self.copy_method(method, to)?;
        }
        for field in self.scope.db.children_of(TableId::TypeDef, rid, TableId::Field)? {
            self.copy_field(field, to)?;
        }
        self.copy_events(rid, to)?;
        self.copy_properties(rid, to)?;
        self.copy_generic_params(TableId::TypeDef.token(rid), TableId::TypeDef.token(to))?;
        Ok(())
    }

    fn copy_method(&mut self, rid: u32, to_type: u32) -> Result<()> {
        let from = TableId::MethodDef.token(rid);
        let name = self.import_string(TableId::MethodDef, rid, col::METHOD_NAME)?;
        if name == DELETE_MARKER {
            return self.scope.remap.insert_deleted(from);
        }

        let rva = self.scope.db.get(TableId::MethodDef, rid, col::METHOD_RVA)?;
        let impl_flags = self.scope.db.get(TableId::MethodDef, rid, col::METHOD_IMPLFLAGS)?;
        let flags = self.scope.db.get(TableId::MethodDef, rid, col::METHOD_FLAGS)?;
        let signature = self.rewrite_signature(TableId::MethodDef, rid, col::METHOD_SIGNATURE)?;

        let name_ix = self.copy_string(&name)?;
        let sig_ix = self.emit.blobs_mut()?.add(&signature)?;
        let new_rid = self.emit.add_child(TableId::TypeDef, to_type, TableId::MethodDef)?;
        self.emit.set(TableId::MethodDef, new_rid, col::METHOD_RVA, rva)?;
        self.emit.set(TableId::MethodDef, new_rid, col::METHOD_IMPLFLAGS, impl_flags)?;
        self.emit.set(TableId::MethodDef, new_rid, col::METHOD_FLAGS, flags)?;
        self.emit.set(TableId::MethodDef, new_rid, col::METHOD_NAME, name_ix)?;
        self.emit.set(TableId::MethodDef, new_rid, col::METHOD_SIGNATURE, sig_ix)?;
        self.scope
            .remap
            .insert(from, TableId::MethodDef.token(new_rid), false)?;

        for param in self.scope.db.children_of(TableId::MethodDef, rid, TableId::Param)? {
            let p_from = TableId::Param.token(param);
            let p_flags = self.scope.db.get(TableId::Param, param, col::PARAM_FLAGS)?;
            let sequence = self.scope.db.get(TableId::Param, param, col::PARAM_SEQUENCE)?;
            let p_name = self.import_string(TableId::Param, param, col::PARAM_NAME)?;

            let p_name_ix = self.copy_string(&p_name)?;
            let p_new = self.emit.add_child(TableId::MethodDef, new_rid, TableId::Param)?;
            self.emit.set(TableId::Param, p_new, col::PARAM_FLAGS, p_flags)?;
            self.emit.set(TableId::Param, p_new, col::PARAM_SEQUENCE, sequence)?;
            self.emit.set(TableId::Param, p_new, col::PARAM_NAME, p_name_ix)?;
            self.scope.remap.insert(p_from, TableId::Param.token(p_new), false)?;
        }

        self.copy_generic_params(from, TableId::MethodDef.token(new_rid))
    }

    fn copy_field(&mut self, rid: u32, to_type: u32) -> Result<()> {
        let from = TableId::Field.token(rid);
        let name = self.import_string(TableId::Field, rid, col::FIELD_NAME)?;
        if name == DELETE_MARKER {
            return self.scope.remap.insert_deleted(from);
        }

        let flags = self.scope.db.get(TableId::Field, rid, col::FIELD_FLAGS)?;
        let signature = self.rewrite_signature(TableId::Field, rid, col::FIELD_SIGNATURE)?;

        let name_ix = self.copy_string(&name)?;
        let sig_ix = self.emit.blobs_mut()?.add(&signature)?;
        let new_rid = self.emit.add_child(TableId::TypeDef, to_type, TableId::Field)?;
        self.emit.set(TableId::Field, new_rid, col::FIELD_FLAGS, flags)?;
        self.emit.set(TableId::Field, new_rid, col::FIELD_NAME, name_ix)?;
        self.emit.set(TableId::Field, new_rid, col::FIELD_SIGNATURE, sig_ix)?;
        self.scope.remap.insert(from, TableId::Field.token(new_rid), false)
    }

    /// Finds or creates the one-row-per-type map record (EventMap or
    /// PropertyMap) for emit type `to`.
    fn ensure_emit_map(&mut self, table: TableId, parent_column: usize, to: u32) -> Result<u32> {
        for rid in 1..=self.emit.rows(table) {
            if self.emit.get(table, rid, parent_column)? == to {
                return Ok(rid);
            }
        }
        let rid = self.emit.add_record(table)?;
        self.emit.set(table, rid, parent_column, to)?;
        Ok(rid)
    }

    fn import_map_row(&self, table: TableId, parent_column: usize, rid: u32) -> Result<u32> {
        for row in 1..=self.scope.db.rows(table) {
            if self.scope.db.get(table, row, parent_column)? == rid {
                return Ok(row);
            }
        }
        Ok(0)
    }

    fn copy_events(&mut self, rid: u32, to: u32) -> Result<()> {
        let map_rid = self.import_map_row(TableId::EventMap, col::EVENTMAP_PARENT, rid)?;
        if map_rid == 0 {
            return Ok(());
        }
        let emit_map = self.ensure_emit_map(TableId::EventMap, col::EVENTMAP_PARENT, to)?;

        for event in self.scope.db.children_of(TableId::EventMap, map_rid, TableId::Event)? {
            let from = TableId::Event.token(event);
            let flags = self.scope.db.get(TableId::Event, event, col::EVENT_FLAGS)?;
            let name = self.import_string(TableId::Event, event, col::EVENT_NAME)?;
            let event_type = self.scope.db.get_token(TableId::Event, event, col::EVENT_TYPE)?;
            let remapped_type = self.scope.remap.remap(event_type)?;

            let name_ix = self.copy_string(&name)?;
            let new_rid = self.emit.add_child(TableId::EventMap, emit_map, TableId::Event)?;
            self.emit.set(TableId::Event, new_rid, col::EVENT_FLAGS, flags)?;
            self.emit.set(TableId::Event, new_rid, col::EVENT_NAME, name_ix)?;
            self.emit.set_token(TableId::Event, new_rid, col::EVENT_TYPE, remapped_type)?;
            self.scope.remap.insert(from, TableId::Event.token(new_rid), false)?;
        }
        Ok(())
    }

    fn copy_properties(&mut self, rid: u32, to: u32) -> Result<()> {
        let map_rid = self.import_map_row(TableId::PropertyMap, col::PROPERTYMAP_PARENT, rid)?;
        if map_rid == 0 {
            return Ok(());
        }
        let emit_map = self.ensure_emit_map(TableId::PropertyMap, col::PROPERTYMAP_PARENT, to)?;

        for property in
            self.scope.db.children_of(TableId::PropertyMap, map_rid, TableId::Property)?
        {
            let from = TableId::Property.token(property);
            let flags = self.scope.db.get(TableId::Property, property, col::PROPERTY_FLAGS)?;
            let name = self.import_string(TableId::Property, property, col::PROPERTY_NAME)?;
            let signature =
                self.rewrite_signature(TableId::Property, property, col::PROPERTY_TYPE)?;

            let name_ix = self.copy_string(&name)?;
            let sig_ix = self.emit.blobs_mut()?.add(&signature)?;
            let new_rid = self.emit.add_child(TableId::PropertyMap, emit_map, TableId::Property)?;
            self.emit.set(TableId::Property, new_rid, col::PROPERTY_FLAGS, flags)?;
            self.emit.set(TableId::Property, new_rid, col::PROPERTY_NAME, name_ix)?;
            self.emit.set(TableId::Property, new_rid, col::PROPERTY_TYPE, sig_ix)?;
            self.scope
                .remap
                .insert(from, TableId::Property.token(new_rid), false)?;
        }
        Ok(())
    }

    fn copy_generic_params(&mut self, owner_from: Token, owner_to: Token) -> Result<()> {
        if self.scope.db.major() != 2 || self.scope.db.rows(TableId::GenericParam) == 0 {
            return Ok(());
        }

        for rid in 1..=self.scope.db.rows(TableId::GenericParam) {
            let owner =
                self.scope.db.get_token(TableId::GenericParam, rid, col::GENERICPARAM_OWNER)?;
            if owner != owner_from {
                continue;
            }

            let from = TableId::GenericParam.token(rid);
            let number = self.scope.db.get(TableId::GenericParam, rid, col::GENERICPARAM_NUMBER)?;
            let flags = self.scope.db.get(TableId::GenericParam, rid, col::GENERICPARAM_FLAGS)?;
            let name = self.import_string(TableId::GenericParam, rid, col::GENERICPARAM_NAME)?;

            let name_ix = self.copy_string(&name)?;
            let new_rid = self.emit.add_record(TableId::GenericParam)?;
            self.emit.set(TableId::GenericParam, new_rid, col::GENERICPARAM_NUMBER, number)?;
            self.emit.set(TableId::GenericParam, new_rid, col::GENERICPARAM_FLAGS, flags)?;
            self.emit
                .set_token(TableId::GenericParam, new_rid, col::GENERICPARAM_OWNER, owner_to)?;
            self.emit.set(TableId::GenericParam, new_rid, col::GENERICPARAM_NAME, name_ix)?;
            self.scope
                .remap
                .insert(from, TableId::GenericParam.token(new_rid), false)?;
        }
        Ok(())
    }

    fn verify_children(&mut self, rid: u32, to: u32) -> Result<()> {
        let from_type = TableId::TypeDef.token(rid);
        // Members of the global type always merge additively
        let global = self.is_global_emit_type(to)?;

        self.verify_methods(rid, to, from_type, global)?;
        self.verify_fields(rid, to, from_type, global)?;
        self.verify_events(rid, to, from_type)?;
        self.verify_properties(rid, to, from_type)?;
        self.verify_generic_params(from_type, TableId::TypeDef.token(to))?;
        Ok(())
    }

    fn member_is_additive(global: bool, flags: u32) -> bool {
        global
            || flags & marks::MEMBER_ACCESS_MASK == marks::MEMBER_COMPILER_CONTROLLED
            || flags & marks::MEMBER_SUPPRESS_CHECK != 0
    }

    fn verify_methods(&mut self, rid: u32, to: u32, from_type: Token, global: bool) -> Result<()> {
        let emit_methods = self.emit.children_of(TableId::TypeDef, to, TableId::MethodDef)?;
        let mut matched = 0u32;

        for method in self.scope.db.children_of(TableId::TypeDef, rid, TableId::MethodDef)? {
            let from = TableId::MethodDef.token(method);
            let name = self.import_string(TableId::MethodDef, method, col::METHOD_NAME)?;
            if name == DELETE_MARKER {
                self.scope.remap.insert_deleted(from)?;
                continue;
            }

            let flags = self.scope.db.get(TableId::MethodDef, method, col::METHOD_FLAGS)?;
            if Self::member_is_additive(global, flags) {
                self.copy_method(method, to)?;
                continue;
            }

            let signature =
                self.rewrite_signature(TableId::MethodDef, method, col::METHOD_SIGNATURE)?;
            let mut hit = None;
            for &emit_method in &emit_methods {
                let name_off = self.emit.get(TableId::MethodDef, emit_method, col::METHOD_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let sig_off =
                    self.emit.get(TableId::MethodDef, emit_method, col::METHOD_SIGNATURE)?;
                if self.emit_blob_eq(sig_off, &signature)? {
                    hit = Some(emit_method);
                    break;
                }
            }

            match hit {
                Some(emit_method) => {
                    matched += 1;
                    let impl_flags =
                        self.scope.db.get(TableId::MethodDef, method, col::METHOD_IMPLFLAGS)?;
                    let emit_impl =
                        self.emit.get(TableId::MethodDef, emit_method, col::METHOD_IMPLFLAGS)?;
                    if impl_flags != emit_impl {
                        self.mismatch(MergeErrorKind::InconsistentMethodImpl, from)?;
                    }
                    self.scope
                        .remap
                        .insert(from, TableId::MethodDef.token(emit_method), true)?;
                    self.match_params(method, emit_method, from)?;
                    self.verify_generic_params(from, TableId::MethodDef.token(emit_method))?;
                }
                None => self.mismatch(MergeErrorKind::MethodNotFound, from)?,
            }
        }

        if !global {
            let mut expected = 0u32;
            for &emit_method in &emit_methods {
                let flags = self.emit.get(TableId::MethodDef, emit_method, col::METHOD_FLAGS)?;
                if !Self::member_is_additive(false, flags) {
                    expected += 1;
                }
            }
            if matched != expected {
                self.mismatch(MergeErrorKind::MethodCounts, from_type)?;
            }
        }
        Ok(())
    }

    fn verify_fields(&mut self, rid: u32, to: u32, from_type: Token, global: bool) -> Result<()> {
        let emit_fields = self.emit.children_of(TableId::TypeDef, to, TableId::Field)?;
        let mut matched = 0u32;

        for field in self.scope.db.children_of(TableId::TypeDef, rid, TableId::Field)? {
            let from = TableId::Field.token(field);
            let name = self.import_string(TableId::Field, field, col::FIELD_NAME)?;
            if name == DELETE_MARKER {
                self.scope.remap.insert_deleted(from)?;
                continue;
            }

            let flags = self.scope.db.get(TableId::Field, field, col::FIELD_FLAGS)?;
            if Self::member_is_additive(global, flags) {
                self.copy_field(field, to)?;
                continue;
            }

            let signature = self.rewrite_signature(TableId::Field, field, col::FIELD_SIGNATURE)?;
            let mut hit = None;
            for &emit_field in &emit_fields {
                let name_off = self.emit.get(TableId::Field, emit_field, col::FIELD_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let sig_off = self.emit.get(TableId::Field, emit_field, col::FIELD_SIGNATURE)?;
                if self.emit_blob_eq(sig_off, &signature)? {
                    hit = Some(emit_field);
                    break;
                }
            }

            match hit {
                Some(emit_field) => {
                    matched += 1;
                    self.scope
                        .remap
                        .insert(from, TableId::Field.token(emit_field), true)?;
                }
                None => self.mismatch(MergeErrorKind::FieldNotFound, from)?,
            }
        }

        if !global {
            let mut expected = 0u32;
            for &emit_field in &emit_fields {
                let flags = self.emit.get(TableId::Field, emit_field, col::FIELD_FLAGS)?;
                if !Self::member_is_additive(false, flags) {
                    expected += 1;
                }
            }
            if matched != expected {
                self.mismatch(MergeErrorKind::FieldCounts, from_type)?;
            }
        }
        Ok(())
    }

    fn verify_events(&mut self, rid: u32, to: u32, from_type: Token) -> Result<()> {
        let map_rid = self.import_map_row(TableId::EventMap, col::EVENTMAP_PARENT, rid)?;
        if map_rid == 0 {
            return Ok(());
        }
        let emit_map = self.ensure_emit_map(TableId::EventMap, col::EVENTMAP_PARENT, to)?;
        let emit_events = self.emit.children_of(TableId::EventMap, emit_map, TableId::Event)?;
        let mut matched = 0u32;

        for event in self.scope.db.children_of(TableId::EventMap, map_rid, TableId::Event)? {
            let from = TableId::Event.token(event);
            let name = self.import_string(TableId::Event, event, col::EVENT_NAME)?;

            let mut hit = None;
            for &emit_event in &emit_events {
                let name_off = self.emit.get(TableId::Event, emit_event, col::EVENT_NAME)?;
                if self.emit_string_eq(name_off, &name)? {
                    hit = Some(emit_event);
                    break;
                }
            }
            match hit {
                Some(emit_event) => {
                    matched += 1;
                    self.scope
                        .remap
                        .insert(from, TableId::Event.token(emit_event), true)?;
                }
                None => self.mismatch(MergeErrorKind::EventNotFound, from)?,
            }
        }

        if matched != u32::try_from(emit_events.len()).unwrap_or(u32::MAX) {
            self.mismatch(MergeErrorKind::EventCounts, from_type)?;
        }
        Ok(())
    }

    fn verify_properties(&mut self, rid: u32, to: u32, from_type: Token) -> Result<()> {
        let map_rid = self.import_map_row(TableId::PropertyMap, col::PROPERTYMAP_PARENT, rid)?;
        if map_rid == 0 {
            return Ok(());
        }
        let emit_map = self.ensure_emit_map(TableId::PropertyMap, col::PROPERTYMAP_PARENT, to)?;
        let emit_properties =
            self.emit.children_of(TableId::PropertyMap, emit_map, TableId::Property)?;
        let mut matched = 0u32;

        for property in
            self.scope.db.children_of(TableId::PropertyMap, map_rid, TableId::Property)?
        {
            let from = TableId::Property.token(property);
            let name = self.import_string(TableId::Property, property, col::PROPERTY_NAME)?;
            let signature =
                self.rewrite_signature(TableId::Property, property, col::PROPERTY_TYPE)?;

            let mut hit = None;
            for &emit_property in &emit_properties {
                let name_off = self.emit.get(TableId::Property, emit_property, col::PROPERTY_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let sig_off = self.emit.get(TableId::Property, emit_property, col::PROPERTY_TYPE)?;
                if self.emit_blob_eq(sig_off, &signature)? {
                    hit = Some(emit_property);
                    break;
                }
            }
            match hit {
                Some(emit_property) => {
                    matched += 1;
                    self.scope
                        .remap
                        .insert(from, TableId::Property.token(emit_property), true)?;
                }
                None => self.mismatch(MergeErrorKind::PropertyNotFound, from)?,
            }
        }

        if matched != u32::try_from(emit_properties.len()).unwrap_or(u32::MAX) {
            self.mismatch(MergeErrorKind::PropertyCounts, from_type)?;
        }
        Ok(())
    }

    fn match_params(&mut self, method: u32, emit_method: u32, from: Token) -> Result<()> {
        let import_params = self.scope.db.children_of(TableId::MethodDef, method, TableId::Param)?;
        let emit_params = self.emit.children_of(TableId::MethodDef, emit_method, TableId::Param)?;
        if import_params.len() != emit_params.len() {
            return self.mismatch(MergeErrorKind::ParamCounts, from);
        }

        for param in import_params {
            let sequence = self.scope.db.get(TableId::Param, param, col::PARAM_SEQUENCE)?;
            let mut hit = None;
            for &emit_param in &emit_params {
                if self.emit.get(TableId::Param, emit_param, col::PARAM_SEQUENCE)? == sequence {
                    hit = Some(emit_param);
                    break;
                }
            }
            match hit {
                Some(emit_param) => {
                    self.scope.remap.insert(
                        TableId::Param.token(param),
                        TableId::Param.token(emit_param),
                        true,
                    )?;
                }
                None => self.mismatch(MergeErrorKind::ParamCounts, from)?,
            }
        }
        Ok(())
    }

    /// Generic params of `owner_from` in the import and `owner_to` in the
    /// emit scope must agree on count, number, flags, name and constraint
    /// set.
    fn verify_generic_params(&mut self, owner_from: Token, owner_to: Token) -> Result<()> {
        if self.scope.db.major() != 2 {
            return Ok(());
        }

        let mut import_params = Vec::new();
        for rid in 1..=self.scope.db.rows(TableId::GenericParam) {
            let owner =
                self.scope.db.get_token(TableId::GenericParam, rid, col::GENERICPARAM_OWNER)?;
            if owner == owner_from {
                import_params.push(rid);
            }
        }
        let mut emit_params = Vec::new();
        for rid in 1..=self.emit.rows(TableId::GenericParam) {
            let owner = self.emit.get_token(TableId::GenericParam, rid, col::GENERICPARAM_OWNER)?;
            if owner == owner_to {
                emit_params.push(rid);
            }
        }

        if import_params.len() != emit_params.len() {
            return self.mismatch(MergeErrorKind::InconsistentGenericParams, owner_from);
        }
        if import_params.is_empty() {
            return Ok(());
        }

        let number_of = |db: &MetaDatabase, rid: u32| db.get(TableId::GenericParam, rid, col::GENERICPARAM_NUMBER);
        import_params.sort_by_key(|rid| number_of(&self.scope.db, *rid).unwrap_or(u32::MAX));
        emit_params.sort_by_key(|rid| number_of(self.emit, *rid).unwrap_or(u32::MAX));

        for (&import_param, &emit_param) in import_params.iter().zip(&emit_params) {
            let number = self.scope.db.get(TableId::GenericParam, import_param, col::GENERICPARAM_NUMBER)?;
            let flags = self.scope.db.get(TableId::GenericParam, import_param, col::GENERICPARAM_FLAGS)?;
            let name = self.import_string(TableId::GenericParam, import_param, col::GENERICPARAM_NAME)?;

            let emit_number =
                self.emit.get(TableId::GenericParam, emit_param, col::GENERICPARAM_NUMBER)?;
            let emit_flags =
                self.emit.get(TableId::GenericParam, emit_param, col::GENERICPARAM_FLAGS)?;
            let name_off = self.emit.get(TableId::GenericParam, emit_param, col::GENERICPARAM_NAME)?;

            if number != emit_number
                || flags != emit_flags
                || !self.emit_string_eq(name_off, &name)?
            {
                self.mismatch(MergeErrorKind::InconsistentGenericParams, owner_from)?;
                continue;
            }

            if !self.constraints_match(import_param, emit_param)? {
                self.mismatch(
                    MergeErrorKind::InconsistentGenericParams,
                    TableId::GenericParam.token(import_param),
                )?;
                continue;
            }

            self.scope.remap.insert(
                TableId::GenericParam.token(import_param),
                TableId::GenericParam.token(emit_param),
                true,
            )?;
        }
        Ok(())
    }

    fn constraints_match(&self, import_param: u32, emit_param: u32) -> Result<bool> {
        let mut import_set = Vec::new();
        for rid in 1..=self.scope.db.rows(TableId::GenericParamConstraint) {
            let owner =
                self.scope.db.get(TableId::GenericParamConstraint, rid, col::GPCONSTRAINT_OWNER)?;
            if owner != import_param {
                continue;
            }
            let constraint = self.scope.db.get_token(
                TableId::GenericParamConstraint,
                rid,
                col::GPCONSTRAINT_CONSTRAINT,
            )?;
            match self.try_remap(constraint) {
                Some(token) => import_set.push(token),
                None => return Ok(false),
            }
        }

        let mut emit_set = Vec::new();
        for rid in 1..=self.emit.rows(TableId::GenericParamConstraint) {
            let owner =
                self.emit.get(TableId::GenericParamConstraint, rid, col::GPCONSTRAINT_OWNER)?;
            if owner == emit_param {
                emit_set.push(self.emit.get_token(
                    TableId::GenericParamConstraint,
                    rid,
                    col::GPCONSTRAINT_CONSTRAINT,
                )?);
            }
        }

        import_set.sort_unstable();
        emit_set.sort_unstable();
        Ok(import_set == emit_set)
    }

    // ----- phase 8: MemberRefs ------------------------------------------

    fn merge_member_refs(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::MemberRef) {
            self.merge_one_member_ref(rid)?;
        }
        Ok(())
    }

    fn merge_one_member_ref(&mut self, rid: u32) -> Result<()> {
        let from = TableId::MemberRef.token(rid);
        let parent = self.scope.db.get_token(TableId::MemberRef, rid, col::MEMBERREF_CLASS)?;
        let name = self.import_string(TableId::MemberRef, rid, col::MEMBERREF_NAME)?;
        let signature = self.rewrite_signature(TableId::MemberRef, rid, col::MEMBERREF_SIGNATURE)?;
        let vararg = signature.first().is_some_and(|lead| lead & 0x0F == VARARG_CALLCONV);

        let resolved = self.scope.remap.remap(parent)?;
        let mut final_parent = resolved;

        if self.config.ref_to_def.member_refs
            && resolved.table() == TableId::TypeDef as u8
            && !resolved.is_nil()
        {
            if let Some(definition) =
                self.find_emit_member(resolved.rid(), &name, &signature, vararg)?
            {
                if !vararg {
                    // The reference collapses onto the definition outright
                    return self.scope.remap.insert(from, definition, true);
                }
                // Vararg call sites keep their MemberRef but hang it off
                // the resolved definition
                final_parent = definition;
            }
        }

        if self.dup_checked() {
            for emit_rid in 1..=self.emit.rows(TableId::MemberRef) {
                let emit_parent =
                    self.emit.get_token(TableId::MemberRef, emit_rid, col::MEMBERREF_CLASS)?;
                if emit_parent != final_parent {
                    continue;
                }
                let name_off = self.emit.get(TableId::MemberRef, emit_rid, col::MEMBERREF_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let sig_off =
                    self.emit.get(TableId::MemberRef, emit_rid, col::MEMBERREF_SIGNATURE)?;
                if !self.emit_blob_eq(sig_off, &signature)? {
                    continue;
                }
                return self
                    .scope
                    .remap
                    .insert(from, TableId::MemberRef.token(emit_rid), true);
            }
        }

        let name_ix = self.copy_string(&name)?;
        let sig_ix = self.emit.blobs_mut()?.add(&signature)?;
        let new_rid = self.emit.add_record(TableId::MemberRef)?;
        self.emit.set_token(TableId::MemberRef, new_rid, col::MEMBERREF_CLASS, final_parent)?;
        self.emit.set(TableId::MemberRef, new_rid, col::MEMBERREF_NAME, name_ix)?;
        self.emit.set(TableId::MemberRef, new_rid, col::MEMBERREF_SIGNATURE, sig_ix)?;
        self.scope
            .remap
            .insert(from, TableId::MemberRef.token(new_rid), false)
    }

    /// Looks for a method or field named `name` with signature `signature`
    /// on emit type `type_rid`, walking up the extends chain for non-vararg
    /// signatures.
    fn find_emit_member(
        &self,
        mut type_rid: u32,
        name: &str,
        signature: &[u8],
        vararg: bool,
    ) -> Result<Option<Token>> {
        loop {
            for method in self.emit.children_of(TableId::TypeDef, type_rid, TableId::MethodDef)? {
                let name_off = self.emit.get(TableId::MethodDef, method, col::METHOD_NAME)?;
                if !self.emit_string_eq(name_off, name)? {
                    continue;
                }
                let sig_off = self.emit.get(TableId::MethodDef, method, col::METHOD_SIGNATURE)?;
                if self.emit_blob_eq(sig_off, signature)? {
                    return Ok(Some(TableId::MethodDef.token(method)));
                }
            }
            for field in self.emit.children_of(TableId::TypeDef, type_rid, TableId::Field)? {
                let name_off = self.emit.get(TableId::Field, field, col::FIELD_NAME)?;
                if !self.emit_string_eq(name_off, name)? {
                    continue;
                }
                let sig_off = self.emit.get(TableId::Field, field, col::FIELD_SIGNATURE)?;
                if self.emit_blob_eq(sig_off, signature)? {
                    return Ok(Some(TableId::Field.token(field)));
                }
            }

            if vararg {
                return Ok(None);
            }
            let extends = self.emit.get_token(TableId::TypeDef, type_rid, col::TYPEDEF_EXTENDS)?;
            if extends.table() != TableId::TypeDef as u8 || extends.is_nil() {
                return Ok(None);
            }
            type_rid = extends.rid();
        }
    }

    // ----- phase 9: InterfaceImpl ---------------------------------------

    fn merge_interface_impls(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::InterfaceImpl) {
            let from = TableId::InterfaceImpl.token(rid);
            let class = self.scope.db.get(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_CLASS)?;
            let interface =
                self.scope.db.get_token(TableId::InterfaceImpl, rid, col::INTERFACEIMPL_INTERFACE)?;

            let Some(class_record) = self.scope.remap.find(TableId::TypeDef.token(class)).copied()
            else {
                continue;
            };
            if class_record.deleted {
                continue;
            }
            let to_class = class_record.to.rid();
            let remapped_interface = self.scope.remap.remap(interface)?;

            if class_record.duplicate && self.dup_checked() {
                let mut existing = None;
                for emit_rid in 1..=self.emit.rows(TableId::InterfaceImpl) {
                    if self.emit.get(TableId::InterfaceImpl, emit_rid, col::INTERFACEIMPL_CLASS)?
                        != to_class
                    {
                        continue;
                    }
                    let emit_interface = self.emit.get_token(
                        TableId::InterfaceImpl,
                        emit_rid,
                        col::INTERFACEIMPL_INTERFACE,
                    )?;
                    if emit_interface == remapped_interface {
                        existing = Some(emit_rid);
                        break;
                    }
                }
                match existing {
                    Some(emit_rid) => {
                        self.scope
                            .remap
                            .insert(from, TableId::InterfaceImpl.token(emit_rid), true)?;
                    }
                    None => self.mismatch(MergeErrorKind::InterfaceImplNotFound, from)?,
                }
                continue;
            }

            let new_rid = self.emit.add_record(TableId::InterfaceImpl)?;
            self.emit.set(TableId::InterfaceImpl, new_rid, col::INTERFACEIMPL_CLASS, to_class)?;
            self.emit.set_token(
                TableId::InterfaceImpl,
                new_rid,
                col::INTERFACEIMPL_INTERFACE,
                remapped_interface,
            )?;
            self.scope
                .remap
                .insert(from, TableId::InterfaceImpl.token(new_rid), false)?;
        }
        Ok(())
    }

    // ----- phase 10: remaining tables -----------------------------------

    fn merge_remaining(&mut self) -> Result<()> {
        self.merge_constants()?;
        self.merge_field_marshal()?;
        self.merge_class_layout()?;
        self.merge_field_layout()?;
        self.merge_field_rva()?;
        self.merge_method_impls()?;
        self.merge_method_semantics()?;
        self.merge_method_specs()?;
        self.merge_standalone_sigs()?;
        self.merge_impl_maps()?;
        self.merge_generic_param_constraints()?;
        self.merge_user_strings()?;
        self.merge_manifest()?;
        // Attributes and security go last: their parents span every other
        // table kind
        self.merge_custom_attributes()?;
        self.merge_decl_security()?;
        Ok(())
    }

    fn merge_constants(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::Constant) {
            let parent = self.scope.db.get_token(TableId::Constant, rid, col::CONSTANT_PARENT)?;
            let Some(record) = self.scope.remap.find(parent).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let kind = self.scope.db.get(TableId::Constant, rid, col::CONSTANT_TYPE)?;
            let value_ix = self.copy_blob(TableId::Constant, rid, col::CONSTANT_VALUE)?;
            let new_rid = self.emit.add_record(TableId::Constant)?;
            self.emit.set(TableId::Constant, new_rid, col::CONSTANT_TYPE, kind)?;
            self.emit.set_token(TableId::Constant, new_rid, col::CONSTANT_PARENT, record.to)?;
            self.emit.set(TableId::Constant, new_rid, col::CONSTANT_VALUE, value_ix)?;
        }
        Ok(())
    }

    fn merge_field_marshal(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::FieldMarshal) {
            let parent =
                self.scope.db.get_token(TableId::FieldMarshal, rid, col::FIELDMARSHAL_PARENT)?;
            let Some(record) = self.scope.remap.find(parent).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let native_ix = self.copy_blob(TableId::FieldMarshal, rid, col::FIELDMARSHAL_NATIVETYPE)?;
            let new_rid = self.emit.add_record(TableId::FieldMarshal)?;
            self.emit
                .set_token(TableId::FieldMarshal, new_rid, col::FIELDMARSHAL_PARENT, record.to)?;
            self.emit
                .set(TableId::FieldMarshal, new_rid, col::FIELDMARSHAL_NATIVETYPE, native_ix)?;
        }
        Ok(())
    }

    fn merge_class_layout(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::ClassLayout) {
            let class = self.scope.db.get(TableId::ClassLayout, rid, col::CLASSLAYOUT_PARENT)?;
            let Some(record) = self.scope.remap.find(TableId::TypeDef.token(class)).copied() else {
                continue;
            };
            if record.deleted {
                continue;
            }

            let packing =
                self.scope.db.get(TableId::ClassLayout, rid, col::CLASSLAYOUT_PACKINGSIZE)?;
            let size = self.scope.db.get(TableId::ClassLayout, rid, col::CLASSLAYOUT_CLASSSIZE)?;

            if record.duplicate && self.dup_checked() {
                let mut existing = None;
                for emit_rid in 1..=self.emit.rows(TableId::ClassLayout) {
                    if self.emit.get(TableId::ClassLayout, emit_rid, col::CLASSLAYOUT_PARENT)?
                        == record.to.rid()
                    {
                        existing = Some(emit_rid);
                        break;
                    }
                }
                if let Some(emit_rid) = existing {
                    let emit_packing =
                        self.emit.get(TableId::ClassLayout, emit_rid, col::CLASSLAYOUT_PACKINGSIZE)?;
                    let emit_size =
                        self.emit.get(TableId::ClassLayout, emit_rid, col::CLASSLAYOUT_CLASSSIZE)?;
                    if packing != emit_packing || size != emit_size {
                        self.mismatch(
                            MergeErrorKind::InconsistentClassLayout,
                            TableId::TypeDef.token(class),
                        )?;
                    }
                    continue;
                }
            }

            let new_rid = self.emit.add_record(TableId::ClassLayout)?;
            self.emit.set(TableId::ClassLayout, new_rid, col::CLASSLAYOUT_PACKINGSIZE, packing)?;
            self.emit.set(TableId::ClassLayout, new_rid, col::CLASSLAYOUT_CLASSSIZE, size)?;
            self.emit
                .set(TableId::ClassLayout, new_rid, col::CLASSLAYOUT_PARENT, record.to.rid())?;
        }
        Ok(())
    }

    fn merge_field_layout(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::FieldLayout) {
            let field = self.scope.db.get(TableId::FieldLayout, rid, col::FIELDLAYOUT_FIELD)?;
            let Some(record) = self.scope.remap.find(TableId::Field.token(field)).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let offset = self.scope.db.get(TableId::FieldLayout, rid, col::FIELDLAYOUT_OFFSET)?;
            let new_rid = self.emit.add_record(TableId::FieldLayout)?;
            self.emit.set(TableId::FieldLayout, new_rid, col::FIELDLAYOUT_OFFSET, offset)?;
            self.emit
                .set(TableId::FieldLayout, new_rid, col::FIELDLAYOUT_FIELD, record.to.rid())?;
        }
        Ok(())
    }

    fn merge_field_rva(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::FieldRVA) {
            let field = self.scope.db.get(TableId::FieldRVA, rid, col::FIELDRVA_FIELD)?;
            let Some(record) = self.scope.remap.find(TableId::Field.token(field)).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let rva = self.scope.db.get(TableId::FieldRVA, rid, col::FIELDRVA_RVA)?;
            let new_rid = self.emit.add_record(TableId::FieldRVA)?;
            self.emit.set(TableId::FieldRVA, new_rid, col::FIELDRVA_RVA, rva)?;
            self.emit.set(TableId::FieldRVA, new_rid, col::FIELDRVA_FIELD, record.to.rid())?;
        }
        Ok(())
    }

    fn merge_method_impls(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::MethodImpl) {
            let from = TableId::MethodImpl.token(rid);
            let class = self.scope.db.get(TableId::MethodImpl, rid, col::METHODIMPL_CLASS)?;
            let Some(record) = self.scope.remap.find(TableId::TypeDef.token(class)).copied() else {
                continue;
            };
            if record.deleted {
                continue;
            }

            let body = self.scope.db.get_token(TableId::MethodImpl, rid, col::METHODIMPL_BODY)?;
            let declaration =
                self.scope.db.get_token(TableId::MethodImpl, rid, col::METHODIMPL_DECLARATION)?;
            let (Some(body), Some(declaration)) =
                (self.try_remap(body), self.try_remap(declaration))
            else {
                continue;
            };

            if record.duplicate && self.dup_checked() {
                let mut found = false;
                for emit_rid in 1..=self.emit.rows(TableId::MethodImpl) {
                    if self.emit.get(TableId::MethodImpl, emit_rid, col::METHODIMPL_CLASS)?
                        != record.to.rid()
                    {
                        continue;
                    }
                    let emit_body =
                        self.emit.get_token(TableId::MethodImpl, emit_rid, col::METHODIMPL_BODY)?;
                    let emit_declaration = self.emit.get_token(
                        TableId::MethodImpl,
                        emit_rid,
                        col::METHODIMPL_DECLARATION,
                    )?;
                    if emit_body == body && emit_declaration == declaration {
                        found = true;
                        break;
                    }
                }
                if !found {
                    self.mismatch(MergeErrorKind::InconsistentMethodImpl, from)?;
                }
                continue;
            }

            let new_rid = self.emit.add_record(TableId::MethodImpl)?;
            self.emit.set(TableId::MethodImpl, new_rid, col::METHODIMPL_CLASS, record.to.rid())?;
            self.emit.set_token(TableId::MethodImpl, new_rid, col::METHODIMPL_BODY, body)?;
            self.emit
                .set_token(TableId::MethodImpl, new_rid, col::METHODIMPL_DECLARATION, declaration)?;
        }
        Ok(())
    }

    fn merge_method_semantics(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::MethodSemantics) {
            let association = self
                .scope
                .db
                .get_token(TableId::MethodSemantics, rid, col::METHODSEMANTICS_ASSOCIATION)?;
            let Some(record) = self.scope.remap.find(association).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let method =
                self.scope.db.get(TableId::MethodSemantics, rid, col::METHODSEMANTICS_METHOD)?;
            let Some(mapped_method) = self.try_remap(TableId::MethodDef.token(method)) else {
                continue;
            };

            let semantics =
                self.scope.db.get(TableId::MethodSemantics, rid, col::METHODSEMANTICS_SEMANTICS)?;
            let new_rid = self.emit.add_record(TableId::MethodSemantics)?;
            self.emit
                .set(TableId::MethodSemantics, new_rid, col::METHODSEMANTICS_SEMANTICS, semantics)?;
            self.emit.set(
                TableId::MethodSemantics,
                new_rid,
                col::METHODSEMANTICS_METHOD,
                mapped_method.rid(),
            )?;
            self.emit.set_token(
                TableId::MethodSemantics,
                new_rid,
                col::METHODSEMANTICS_ASSOCIATION,
                record.to,
            )?;
        }
        Ok(())
    }

    fn merge_method_specs(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::MethodSpec) {
            let from = TableId::MethodSpec.token(rid);
            let method = self.scope.db.get_token(TableId::MethodSpec, rid, col::METHODSPEC_METHOD)?;
            let Some(mapped_method) = self.try_remap(method) else {
                continue;
            };
            let instantiation =
                self.rewrite_signature(TableId::MethodSpec, rid, col::METHODSPEC_INSTANTIATION)?;

            let mut existing = None;
            if self.dup_checked() {
                for emit_rid in 1..=self.emit.rows(TableId::MethodSpec) {
                    let emit_method =
                        self.emit.get_token(TableId::MethodSpec, emit_rid, col::METHODSPEC_METHOD)?;
                    if emit_method != mapped_method {
                        continue;
                    }
                    let offset = self
                        .emit
                        .get(TableId::MethodSpec, emit_rid, col::METHODSPEC_INSTANTIATION)?;
                    if self.emit_blob_eq(offset, &instantiation)? {
                        existing = Some(emit_rid);
                        break;
                    }
                }
            }

            match existing {
                Some(emit_rid) => {
                    self.scope
                        .remap
                        .insert(from, TableId::MethodSpec.token(emit_rid), true)?;
                }
                None => {
                    let offset = self.emit.blobs_mut()?.add(&instantiation)?;
                    let new_rid = self.emit.add_record(TableId::MethodSpec)?;
                    self.emit
                        .set_token(TableId::MethodSpec, new_rid, col::METHODSPEC_METHOD, mapped_method)?;
                    self.emit
                        .set(TableId::MethodSpec, new_rid, col::METHODSPEC_INSTANTIATION, offset)?;
                    self.scope
                        .remap
                        .insert(from, TableId::MethodSpec.token(new_rid), false)?;
                }
            }
        }
        Ok(())
    }

    fn merge_standalone_sigs(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::StandAloneSig) {
            let from = TableId::StandAloneSig.token(rid);
            let signature =
                self.rewrite_signature(TableId::StandAloneSig, rid, col::STANDALONESIG_SIGNATURE)?;

            let mut existing = None;
            if self.dup_checked() {
                for emit_rid in 1..=self.emit.rows(TableId::StandAloneSig) {
                    let offset = self
                        .emit
                        .get(TableId::StandAloneSig, emit_rid, col::STANDALONESIG_SIGNATURE)?;
                    if self.emit_blob_eq(offset, &signature)? {
                        existing = Some(emit_rid);
                        break;
                    }
                }
            }

            match existing {
                Some(emit_rid) => {
                    self.scope
                        .remap
                        .insert(from, TableId::StandAloneSig.token(emit_rid), true)?;
                }
                None => {
                    let offset = self.emit.blobs_mut()?.add(&signature)?;
                    let new_rid = self.emit.add_record(TableId::StandAloneSig)?;
                    self.emit
                        .set(TableId::StandAloneSig, new_rid, col::STANDALONESIG_SIGNATURE, offset)?;
                    self.scope
                        .remap
                        .insert(from, TableId::StandAloneSig.token(new_rid), false)?;
                }
            }
        }
        Ok(())
    }

    fn merge_impl_maps(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::ImplMap) {
            let forwarded =
                self.scope.db.get_token(TableId::ImplMap, rid, col::IMPLMAP_MEMBERFORWARDED)?;
            let Some(record) = self.scope.remap.find(forwarded).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let module = self.scope.db.get(TableId::ImplMap, rid, col::IMPLMAP_IMPORTSCOPE)?;
            let mapped_module = self.scope.remap.remap(TableId::ModuleRef.token(module))?;
            if mapped_module.table() != TableId::ModuleRef as u8 {
                return Err(malformed_error!(
                    "PInvoke import scope collapsed onto a non-ModuleRef token - {}",
                    mapped_module
                ));
            }

            let flags = self.scope.db.get(TableId::ImplMap, rid, col::IMPLMAP_MAPPINGFLAGS)?;
            let import_name = self.import_string(TableId::ImplMap, rid, col::IMPLMAP_IMPORTNAME)?;
            let name_ix = self.copy_string(&import_name)?;

            let new_rid = self.emit.add_record(TableId::ImplMap)?;
            self.emit.set(TableId::ImplMap, new_rid, col::IMPLMAP_MAPPINGFLAGS, flags)?;
            self.emit
                .set_token(TableId::ImplMap, new_rid, col::IMPLMAP_MEMBERFORWARDED, record.to)?;
            self.emit.set(TableId::ImplMap, new_rid, col::IMPLMAP_IMPORTNAME, name_ix)?;
            self.emit
                .set(TableId::ImplMap, new_rid, col::IMPLMAP_IMPORTSCOPE, mapped_module.rid())?;
        }
        Ok(())
    }

    fn merge_generic_param_constraints(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::GenericParamConstraint) {
            let owner =
                self.scope.db.get(TableId::GenericParamConstraint, rid, col::GPCONSTRAINT_OWNER)?;
            let Some(record) =
                self.scope.remap.find(TableId::GenericParam.token(owner)).copied()
            else {
                continue;
            };
            // Constraints of duplicate params were verified with their owner
            if record.deleted || record.duplicate {
                continue;
            }

            let constraint = self.scope.db.get_token(
                TableId::GenericParamConstraint,
                rid,
                col::GPCONSTRAINT_CONSTRAINT,
            )?;
            let Some(mapped) = self.try_remap(constraint) else {
                continue;
            };

            let new_rid = self.emit.add_record(TableId::GenericParamConstraint)?;
            self.emit.set(
                TableId::GenericParamConstraint,
                new_rid,
                col::GPCONSTRAINT_OWNER,
                record.to.rid(),
            )?;
            self.emit.set_token(
                TableId::GenericParamConstraint,
                new_rid,
                col::GPCONSTRAINT_CONSTRAINT,
                mapped,
            )?;
            self.scope.remap.insert(
                TableId::GenericParamConstraint.token(rid),
                TableId::GenericParamConstraint.token(new_rid),
                false,
            )?;
        }
        Ok(())
    }

    fn merge_user_strings(&mut self) -> Result<()> {
        let entries: Vec<(u32, Vec<u8>)> = self
            .scope
            .db
            .user_strings()
            .iter_raw()
            .map(|entry| entry.map(|(index, payload)| (index, payload.to_vec())))
            .collect::<Result<_>>()?;

        for (index, payload) in entries {
            let new_index = self.emit.user_strings_mut()?.add_raw(&payload)?;
            let from = Token::new((u32::from(USER_STRING_TAG) << 24) | index);
            let to = Token::new((u32::from(USER_STRING_TAG) << 24) | new_index);
            self.scope.remap.insert(from, to, false)?;
        }
        Ok(())
    }

    fn merge_manifest(&mut self) -> Result<()> {
        let full = self.config.flags.contains(MergeFlags::MERGE_MANIFEST);
        let exported = full || self.config.flags.contains(MergeFlags::MERGE_EXPORTED_TYPES);
        if !exported {
            return Ok(());
        }

        if full {
            self.merge_assembly()?;
            self.merge_files()?;
        }
        self.merge_exported_types()?;
        if full {
            self.merge_manifest_resources()?;
        }
        Ok(())
    }

    fn merge_assembly(&mut self) -> Result<()> {
        if self.scope.db.rows(TableId::Assembly) == 0 {
            return Ok(());
        }

        let had_assembly = self.emit.rows(TableId::Assembly) > 0;
        if !had_assembly {
            let hash_alg = self.scope.db.get(TableId::Assembly, 1, col::ASSEMBLY_HASHALGID)?;
            let version: Vec<u32> = (1..=4)
                .map(|column| self.scope.db.get(TableId::Assembly, 1, column))
                .collect::<Result<_>>()?;
            let flags = self.scope.db.get(TableId::Assembly, 1, col::ASSEMBLY_FLAGS)?;
            let key_ix = self.copy_blob(TableId::Assembly, 1, col::ASSEMBLY_PUBLICKEY)?;
            let name = self.import_string(TableId::Assembly, 1, col::ASSEMBLY_NAME)?;
            let locale = self.import_string(TableId::Assembly, 1, col::ASSEMBLY_LOCALE)?;
            let name_ix = self.copy_string(&name)?;
            let locale_ix = self.copy_string(&locale)?;

            let rid = self.emit.add_record(TableId::Assembly)?;
            self.emit.set(TableId::Assembly, rid, col::ASSEMBLY_HASHALGID, hash_alg)?;
            for (column, value) in version.iter().enumerate() {
                self.emit.set(TableId::Assembly, rid, column + 1, *value)?;
            }
            self.emit.set(TableId::Assembly, rid, col::ASSEMBLY_FLAGS, flags)?;
            self.emit.set(TableId::Assembly, rid, col::ASSEMBLY_PUBLICKEY, key_ix)?;
            self.emit.set(TableId::Assembly, rid, col::ASSEMBLY_NAME, name_ix)?;
            self.emit.set(TableId::Assembly, rid, col::ASSEMBLY_LOCALE, locale_ix)?;
        }

        self.scope.remap.insert(
            TableId::Assembly.token(1),
            TableId::Assembly.token(1),
            had_assembly,
        )
    }

    fn merge_files(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::File) {
            let from = TableId::File.token(rid);
            let name = self.import_string(TableId::File, rid, col::FILE_NAME)?;

            let mut existing = None;
            if self.dup_checked() {
                for emit_rid in 1..=self.emit.rows(TableId::File) {
                    let offset = self.emit.get(TableId::File, emit_rid, col::FILE_NAME)?;
                    if self.emit_string_eq(offset, &name)? {
                        existing = Some(emit_rid);
                        break;
                    }
                }
            }

            match existing {
                Some(emit_rid) => {
                    self.scope.remap.insert(from, TableId::File.token(emit_rid), true)?;
                }
                None => {
                    let flags = self.scope.db.get(TableId::File, rid, col::FILE_FLAGS)?;
                    let hash_ix = self.copy_blob(TableId::File, rid, col::FILE_HASHVALUE)?;
                    let name_ix = self.copy_string(&name)?;
                    let new_rid = self.emit.add_record(TableId::File)?;
                    self.emit.set(TableId::File, new_rid, col::FILE_FLAGS, flags)?;
                    self.emit.set(TableId::File, new_rid, col::FILE_NAME, name_ix)?;
                    self.emit.set(TableId::File, new_rid, col::FILE_HASHVALUE, hash_ix)?;
                    self.scope.remap.insert(from, TableId::File.token(new_rid), false)?;
                }
            }
        }
        Ok(())
    }

    fn merge_exported_types(&mut self) -> Result<()> {
        let total = self.scope.db.rows(TableId::ExportedType);

        // An exported type nested in another exported type needs its
        // implementation mapped first
        let mut pending: Vec<u32> = (1..=total).collect();
        loop {
            let before = pending.len();
            let mut deferred = Vec::new();
            for rid in pending.drain(..) {
                let implementation = self.scope.db.get_token(
                    TableId::ExportedType,
                    rid,
                    col::EXPORTEDTYPE_IMPLEMENTATION,
                )?;
                if implementation.table() == TableId::ExportedType as u8
                    && !implementation.is_nil()
                    && self.scope.remap.find(implementation).is_none()
                {
                    deferred.push(rid);
                    continue;
                }
                self.merge_one_exported_type(rid, implementation)?;
            }
            if deferred.is_empty() {
                return Ok(());
            }
            if deferred.len() == before {
                return Err(malformed_error!("Cyclic ExportedType implementation chain"));
            }
            pending = deferred;
        }
    }

    fn merge_one_exported_type(&mut self, rid: u32, implementation: Token) -> Result<()> {
        let from = TableId::ExportedType.token(rid);
        let Some(mapped_impl) = self.try_remap(implementation) else {
            return Ok(());
        };
        let name = self.import_string(TableId::ExportedType, rid, col::EXPORTEDTYPE_NAME)?;
        let namespace =
            self.import_string(TableId::ExportedType, rid, col::EXPORTEDTYPE_NAMESPACE)?;

        if self.dup_checked() {
            for emit_rid in 1..=self.emit.rows(TableId::ExportedType) {
                let name_off = self.emit.get(TableId::ExportedType, emit_rid, col::EXPORTEDTYPE_NAME)?;
                if !self.emit_string_eq(name_off, &name)? {
                    continue;
                }
                let ns_off =
                    self.emit.get(TableId::ExportedType, emit_rid, col::EXPORTEDTYPE_NAMESPACE)?;
                if !self.emit_string_eq(ns_off, &namespace)? {
                    continue;
                }
                let emit_impl = self.emit.get_token(
                    TableId::ExportedType,
                    emit_rid,
                    col::EXPORTEDTYPE_IMPLEMENTATION,
                )?;
                if emit_impl != mapped_impl {
                    continue;
                }
                return self
                    .scope
                    .remap
                    .insert(from, TableId::ExportedType.token(emit_rid), true);
            }
        }

        let flags = self.scope.db.get(TableId::ExportedType, rid, col::EXPORTEDTYPE_FLAGS)?;
        let type_def_id = self.scope.db.get(TableId::ExportedType, rid, col::EXPORTEDTYPE_TYPEDEFID)?;
        let name_ix = self.copy_string(&name)?;
        let ns_ix = self.copy_string(&namespace)?;
        let new_rid = self.emit.add_record(TableId::ExportedType)?;
        self.emit.set(TableId::ExportedType, new_rid, col::EXPORTEDTYPE_FLAGS, flags)?;
        self.emit.set(TableId::ExportedType, new_rid, col::EXPORTEDTYPE_TYPEDEFID, type_def_id)?;
        self.emit.set(TableId::ExportedType, new_rid, col::EXPORTEDTYPE_NAME, name_ix)?;
        self.emit.set(TableId::ExportedType, new_rid, col::EXPORTEDTYPE_NAMESPACE, ns_ix)?;
        self.emit.set_token(
            TableId::ExportedType,
            new_rid,
            col::EXPORTEDTYPE_IMPLEMENTATION,
            mapped_impl,
        )?;
        self.scope
            .remap
            .insert(from, TableId::ExportedType.token(new_rid), false)
    }

    fn merge_manifest_resources(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::ManifestResource) {
            let implementation = self.scope.db.get_token(
                TableId::ManifestResource,
                rid,
                col::MANIFESTRESOURCE_IMPLEMENTATION,
            )?;
            let Some(mapped_impl) = self.try_remap(implementation) else {
                continue;
            };

            let offset =
                self.scope.db.get(TableId::ManifestResource, rid, col::MANIFESTRESOURCE_OFFSET)?;
            let flags =
                self.scope.db.get(TableId::ManifestResource, rid, col::MANIFESTRESOURCE_FLAGS)?;
            let name =
                self.import_string(TableId::ManifestResource, rid, col::MANIFESTRESOURCE_NAME)?;
            let name_ix = self.copy_string(&name)?;

            let new_rid = self.emit.add_record(TableId::ManifestResource)?;
            self.emit
                .set(TableId::ManifestResource, new_rid, col::MANIFESTRESOURCE_OFFSET, offset)?;
            self.emit
                .set(TableId::ManifestResource, new_rid, col::MANIFESTRESOURCE_FLAGS, flags)?;
            self.emit
                .set(TableId::ManifestResource, new_rid, col::MANIFESTRESOURCE_NAME, name_ix)?;
            self.emit.set_token(
                TableId::ManifestResource,
                new_rid,
                col::MANIFESTRESOURCE_IMPLEMENTATION,
                mapped_impl,
            )?;
        }
        Ok(())
    }

    fn merge_custom_attributes(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::CustomAttribute) {
            let parent = self.scope.db.get_token(TableId::CustomAttribute, rid, col::CA_PARENT)?;
            let attr_type = self.scope.db.get_token(TableId::CustomAttribute, rid, col::CA_TYPE)?;

            // An attribute whose constructor was never marked for merging
            // is a compiler-internal discardable; drop it silently
            let Some(mapped_type) = self.try_remap(attr_type) else {
                continue;
            };
            if self.config.flags.contains(MergeFlags::DROP_MEMBER_REF_CAS)
                && mapped_type.table() == TableId::MemberRef as u8
            {
                continue;
            }

            let Some(record) = self.scope.remap.find(parent).copied() else {
                continue;
            };
            // Attributes of a duplicate row already exist on the emit side
            if record.deleted || record.duplicate {
                continue;
            }

            let value_ix = self.copy_blob(TableId::CustomAttribute, rid, col::CA_VALUE)?;
            let new_rid = self.emit.add_record(TableId::CustomAttribute)?;
            self.emit.set_token(TableId::CustomAttribute, new_rid, col::CA_PARENT, record.to)?;
            self.emit.set_token(TableId::CustomAttribute, new_rid, col::CA_TYPE, mapped_type)?;
            self.emit.set(TableId::CustomAttribute, new_rid, col::CA_VALUE, value_ix)?;
        }
        Ok(())
    }

    fn merge_decl_security(&mut self) -> Result<()> {
        for rid in 1..=self.scope.db.rows(TableId::DeclSecurity) {
            let parent =
                self.scope.db.get_token(TableId::DeclSecurity, rid, col::DECLSECURITY_PARENT)?;
            let Some(record) = self.scope.remap.find(parent).copied() else {
                continue;
            };
            if record.deleted || record.duplicate {
                continue;
            }

            let action = self.scope.db.get(TableId::DeclSecurity, rid, col::DECLSECURITY_ACTION)?;
            let set_ix = self.copy_blob(TableId::DeclSecurity, rid, col::DECLSECURITY_PERMISSIONSET)?;
            let new_rid = self.emit.add_record(TableId::DeclSecurity)?;
            self.emit.set(TableId::DeclSecurity, new_rid, col::DECLSECURITY_ACTION, action)?;
            self.emit
                .set_token(TableId::DeclSecurity, new_rid, col::DECLSECURITY_PARENT, record.to)?;
            self.emit
                .set(TableId::DeclSecurity, new_rid, col::DECLSECURITY_PERMISSIONSET, set_ix)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive_predicate() {
        // Global type members are always additive
        assert!(Pass::member_is_additive(true, 0x0006));
        // Privatescope access
        assert!(Pass::member_is_additive(false, 0x0000));
        assert!(Pass::member_is_additive(false, 0x01C0));
        // Suppress-check bit
        assert!(Pass::member_is_additive(
            false,
            0x0006 | marks::MEMBER_SUPPRESS_CHECK
        ));
        // Ordinary public member
        assert!(!Pass::member_is_additive(false, 0x0006));
    }

    #[test]
    fn type_keys_separate_nesting() {
        let flat = Pass::type_key("NS", "Inner", Token::new(0));
        let nested = Pass::type_key("NS", "Inner", TableId::TypeDef.token(3));
        assert_ne!(flat, nested);
        assert_eq!(flat, Pass::type_key("NS", "Inner", Token::new(0)));
    }
}
