//! Per-import-scope token remap map.
//!
//! Every token the merge touches gets exactly one record mapping it from
//! its import-scope value to its emit-scope value. The map is kept ordered
//! by `from` for binary search during population; once a merge completes a
//! second order by `to` is built so the notification walk and the
//! parent-duplication propagation can answer "who maps to this output
//! token" without scanning.

use crate::{schema::Token, Error, Result};

/// One mapping of an import-scope token to its emit-scope token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRecord {
    /// The token as the import scope knows it
    pub from: Token,
    /// The token in the emit scope
    pub to: Token,
    /// The import row matched an existing emit row instead of producing a
    /// new one
    pub duplicate: bool,
    /// The import row carried a delete marker and was never merged
    pub deleted: bool,
    /// The token was encountered while translating import content, i.e. it
    /// is actually referenced from a signature blob rather than merely
    /// carried by a row the merge walked
    pub found_in_import: bool,
}

/// Ordered token remap map of one import scope.
#[derive(Debug, Clone, Default)]
pub struct RemapMap {
    // Ascending by `from`
    entries: Vec<TokenRecord>,
    // Indices into `entries` ascending by `to`; built by finalize
    by_to: Vec<usize>,
}

impl RemapMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        RemapMap::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no record has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `from -> to`. Re-inserting an identical mapping is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::Error::InconsistentRemap`] if `from` is already
    /// mapped to a different token, which indicates a phase-ordering bug.
    pub fn insert(&mut self, from: Token, to: Token, duplicate: bool) -> Result<()> {
        self.insert_record(TokenRecord {
            from,
            to,
            duplicate,
            deleted: false,
            found_in_import: false,
        })
    }

    /// Records `from` as carrying a delete marker: it maps to nothing and
    /// any later attempt to resolve it is an integrity error.
    ///
    /// # Errors
    /// Returns [`crate::Error::InconsistentRemap`] if `from` is already
    /// mapped.
    pub fn insert_deleted(&mut self, from: Token) -> Result<()> {
        self.insert_record(TokenRecord {
            from,
            to: Token::new(0),
            duplicate: false,
            deleted: true,
            found_in_import: false,
        })
    }

    fn insert_record(&mut self, record: TokenRecord) -> Result<()> {
        match self
            .entries
            .binary_search_by_key(&record.from, |entry| entry.from)
        {
            Ok(position) => {
                let existing = &self.entries[position];
                if existing.to != record.to || existing.deleted != record.deleted {
                    return Err(Error::InconsistentRemap(record.from));
                }
            }
            Err(position) => {
                self.entries.insert(position, record);
                self.by_to.clear();
            }
        }
        Ok(())
    }

    /// Marks `from` as encountered in import content. A token without a
    /// record is ignored; the resolution that follows reports it.
    pub fn mark_found(&mut self, from: Token) {
        if let Ok(position) = self
            .entries
            .binary_search_by_key(&from, |entry| entry.from)
        {
            self.entries[position].found_in_import = true;
        }
    }

    /// Looks up the record for `from`.
    #[must_use]
    pub fn find(&self, from: Token) -> Option<&TokenRecord> {
        self.entries
            .binary_search_by_key(&from, |entry| entry.from)
            .ok()
            .map(|position| &self.entries[position])
    }

    /// Resolves `from` to its emit-scope token. Nil passes through as nil.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedToken`] if `from` was never merged
    /// or carried a delete marker. For a dependency merged in an earlier
    /// phase this must never happen.
    pub fn remap(&self, from: Token) -> Result<Token> {
        if from.is_nil() {
            return Ok(from);
        }

        match self.find(from) {
            Some(record) if !record.deleted => Ok(record.to),
            _ => Err(Error::UnresolvedToken(from)),
        }
    }

    /// Builds the secondary order by `to`. Call once population is done;
    /// inserting afterwards drops the index again.
    pub fn finalize(&mut self) {
        let mut by_to: Vec<usize> = (0..self.entries.len()).collect();
        by_to.sort_by_key(|index| self.entries[*index].to);
        self.by_to = by_to;
    }

    /// Finds a record mapping onto the emit-scope token `to`. Requires
    /// [`RemapMap::finalize`]; falls back to a linear scan when the index
    /// is absent.
    #[must_use]
    pub fn find_by_to(&self, to: Token) -> Option<&TokenRecord> {
        if self.by_to.len() == self.entries.len() && !self.by_to.is_empty() {
            let position = self
                .by_to
                .binary_search_by_key(&to, |index| self.entries[*index].to)
                .ok()?;
            return Some(&self.entries[self.by_to[position]]);
        }
        self.entries.iter().find(|entry| entry.to == to)
    }

    /// Iterates all records ascending by `from`.
    pub fn iter(&self) -> impl Iterator<Item = &TokenRecord> {
        self.entries.iter()
    }
}
