//! Merge collaborators: the traits the engine calls out to, their default
//! implementations, and the per-import scope state.
//!
//! The engine itself only distinguishes "continue" from "abort" on a
//! mismatch and treats signature blobs and security classification as
//! opaque; everything domain-specific behind those decisions lives on the
//! caller's side of these traits.

use bitflags::bitflags;

use crate::{
    database::MetaDatabase,
    merge::remap::RemapMap,
    schema::Token,
    Result,
};

/// The verification failures a merge can report without aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeErrorKind {
    /// No emit method matched an import method by name and signature
    MethodNotFound,
    /// No emit field matched an import field by name and signature
    FieldNotFound,
    /// No emit event matched an import event by name
    EventNotFound,
    /// No emit property matched an import property by name and type
    PropertyNotFound,
    /// A duplicate type's import and emit method counts disagree
    MethodCounts,
    /// A duplicate type's import and emit field counts disagree
    FieldCounts,
    /// A duplicate type's import and emit event counts disagree
    EventCounts,
    /// A duplicate type's import and emit property counts disagree
    PropertyCounts,
    /// A duplicate method's import and emit param counts disagree
    ParamCounts,
    /// Duplicate rows disagree on accessibility
    MismatchedVisibility,
    /// Duplicate rows disagree on method implementation flags, or a
    /// duplicate class is missing a matching MethodImpl row
    InconsistentMethodImpl,
    /// Duplicate types disagree on packing size or class size
    InconsistentClassLayout,
    /// Duplicate owners disagree on generic parameter shape
    InconsistentGenericParams,
    /// A duplicate class is missing a matching InterfaceImpl row
    InterfaceImplNotFound,
    /// A duplicate row disagrees in a way with no more specific kind
    Inconsistency,
}

/// Answer of the error collaborator to a continuable mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Accept the emit-scope state as authoritative and keep merging
    Continue,
    /// Stop the merge at the current table boundary
    Abort,
}

/// Per-import collaborator deciding the fate of continuable mismatches.
pub trait ErrorPolicy {
    /// Called once per mismatch, with the import scope index and the
    /// import-side token the mismatch was detected on.
    fn on_mismatch(&mut self, kind: MergeErrorKind, scope: usize, token: Token) -> ErrorAction;
}

/// Policy that turns every mismatch into an abort. The default.
#[derive(Debug, Default)]
pub struct AbortPolicy;

impl ErrorPolicy for AbortPolicy {
    fn on_mismatch(&mut self, _kind: MergeErrorKind, _scope: usize, _token: Token) -> ErrorAction {
        ErrorAction::Abort
    }
}

/// Policy that records every mismatch and keeps going.
#[derive(Debug, Default)]
pub struct CollectPolicy {
    /// Every mismatch reported so far, as `(kind, scope, token)`
    pub reported: Vec<(MergeErrorKind, usize, Token)>,
}

impl ErrorPolicy for CollectPolicy {
    fn on_mismatch(&mut self, kind: MergeErrorKind, scope: usize, token: Token) -> ErrorAction {
        self.reported.push((kind, scope, token));
        ErrorAction::Continue
    }
}

/// Receiver for the post-merge notification walk.
pub trait NotifySink {
    /// Called once per non-identity mapping of the scope this sink was
    /// registered with.
    fn on_token_mapped(&mut self, from: Token, to: Token);
}

/// Sink that ignores all notifications.
#[derive(Debug, Default)]
pub struct NullSink;

impl NotifySink for NullSink {
    fn on_token_mapped(&mut self, _from: Token, _to: Token) {}
}

/// Sink that records every notification, mostly for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Every `(from, to)` pair reported
    pub mapped: Vec<(Token, Token)>,
}

impl NotifySink for RecordingSink {
    fn on_token_mapped(&mut self, from: Token, to: Token) {
        self.mapped.push((from, to));
    }
}

bitflags! {
    /// Opaque security classification of one scope. The engine only
    /// unions and intersects these across imports; their meaning belongs
    /// to the [`SecurityPolicy`] collaborator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecurityStatus: u32 {
        /// Every type and member in the scope is security-critical
        const ALL_CRITICAL = 0x0000_0001;
        /// Critical code in the scope may be treated as safe
        const TREAT_AS_SAFE = 0x0000_0002;
        /// The scope is fully transparent
        const TRANSPARENT = 0x0000_0004;
    }
}

/// Security-attribute collaborator for the consolidation phase.
pub trait SecurityPolicy {
    /// Classifies one import scope; called once per scope before the main
    /// merge loop.
    fn classify_scope(&mut self, scope: &MetaDatabase) -> SecurityStatus;

    /// Performs attribute injection/removal over the merged set, given the
    /// union and intersection of all scope classifications. Runs strictly
    /// after every table has merged.
    ///
    /// # Errors
    /// Any error aborts the merge.
    fn consolidate(
        &mut self,
        union: SecurityStatus,
        intersection: SecurityStatus,
        emit: &mut MetaDatabase,
    ) -> Result<()>;
}

/// Policy that classifies nothing and consolidates nothing.
#[derive(Debug, Default)]
pub struct NoSecurityPolicy;

impl SecurityPolicy for NoSecurityPolicy {
    fn classify_scope(&mut self, _scope: &MetaDatabase) -> SecurityStatus {
        SecurityStatus::empty()
    }

    fn consolidate(
        &mut self,
        _union: SecurityStatus,
        _intersection: SecurityStatus,
        _emit: &mut MetaDatabase,
    ) -> Result<()> {
        Ok(())
    }
}

/// Signature-blob collaborator. Signatures are opaque byte blobs to the
/// engine; whoever owns the grammar rewrites every embedded token through
/// the supplied resolver.
pub trait SignatureRewriter {
    /// Returns the signature with every embedded token replaced via
    /// `resolve`. Implementations must call `resolve` for each embedded
    /// token exactly once and propagate its errors.
    ///
    /// # Errors
    /// Fails when an embedded token cannot be resolved.
    fn rewrite(
        &self,
        signature: &[u8],
        resolve: &mut dyn FnMut(Token) -> Result<Token>,
    ) -> Result<Vec<u8>>;
}

/// Rewriter for signatures that embed no tokens; copies the bytes through.
#[derive(Debug, Default)]
pub struct OpaqueSignatures;

impl SignatureRewriter for OpaqueSignatures {
    fn rewrite(
        &self,
        signature: &[u8],
        _resolve: &mut dyn FnMut(Token) -> Result<Token>,
    ) -> Result<Vec<u8>> {
        Ok(signature.to_vec())
    }
}

/// One import scope under merge: the frozen source database, its remap
/// map, its notification sink, and its security classification.
pub struct ImportScope {
    /// The source database; frozen for the lifetime of the merge
    pub db: MetaDatabase,
    /// Token mappings recorded so far
    pub remap: RemapMap,
    /// Receiver of the post-merge notification walk
    pub notify: Box<dyn NotifySink>,
    /// Classification computed by the security policy
    pub security: SecurityStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableId;

    #[test]
    fn default_policies() {
        let token = TableId::MethodDef.token(1);

        let mut abort = AbortPolicy;
        assert_eq!(
            abort.on_mismatch(MergeErrorKind::MethodNotFound, 0, token),
            ErrorAction::Abort
        );

        let mut collect = CollectPolicy::default();
        assert_eq!(
            collect.on_mismatch(MergeErrorKind::FieldCounts, 2, token),
            ErrorAction::Continue
        );
        assert_eq!(
            collect.reported,
            [(MergeErrorKind::FieldCounts, 2, token)]
        );
    }

    #[test]
    fn opaque_signatures_pass_through() {
        let sig = [0x20, 0x01, 0x01, 0x0E];
        let rewritten = OpaqueSignatures
            .rewrite(&sig, &mut |token| Ok(token))
            .unwrap();
        assert_eq!(rewritten, sig);
    }
}
