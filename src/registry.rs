//! The token-kind registry.
//!
//! Maps every [`TokenKind`] in use to a human-readable description. The
//! registry is append-only: built-in kinds are present from construction,
//! dialects add their custom kinds during [`DialectSpec::init`], and nothing
//! is ever removed. One registry is shared (through an `Arc`) by all dialects
//! that must agree on kind values.
//!
//! [`DialectSpec::init`]: crate::dialect::DialectSpec::init

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::ast::TokenKind;
use crate::dialect::GrammarError;

#[derive(Debug)]
pub struct KindRegistry {
    kinds: RwLock<HashMap<TokenKind, String>>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    /// Creates a registry holding the built-in kinds.
    pub fn new() -> Self {
        let kinds = TokenKind::BUILTIN
            .iter()
            .map(|(kind, name)| (*kind, name.to_string()))
            .collect();
        KindRegistry {
            kinds: RwLock::new(kinds),
        }
    }

    /// Registers a custom kind.
    ///
    /// Registering a kind again with the same description is a no-op, so a
    /// dialect may be initialized more than once.
    ///
    /// # Errors
    ///
    /// - [`GrammarError::ReservedKind`] if `kind` is in the built-in range
    /// - [`GrammarError::DuplicateKind`] if `kind` already has a different description
    pub fn register(&self, kind: TokenKind, description: &str) -> Result<(), GrammarError> {
        let mut kinds = self.write();
        Self::check_in(&kinds, kind, description)?;
        if !kinds.contains_key(&kind) {
            debug!("Registered token kind {} as {:?}", kind.value(), description);
            kinds.insert(kind, description.to_string());
        }
        Ok(())
    }

    /// Reports whether [`register`](Self::register) would succeed, without
    /// registering anything.
    pub fn check(&self, kind: TokenKind, description: &str) -> Result<(), GrammarError> {
        Self::check_in(&self.read(), kind, description)
    }

    pub fn contains(&self, kind: TokenKind) -> bool {
        self.read().contains_key(&kind)
    }

    pub fn describe(&self, kind: TokenKind) -> Option<String> {
        self.read().get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn check_in(
        kinds: &HashMap<TokenKind, String>,
        kind: TokenKind,
        description: &str,
    ) -> Result<(), GrammarError> {
        if kind.is_reserved() {
            return Err(GrammarError::ReservedKind {
                kind,
                description: description.to_string(),
            });
        }
        match kinds.get(&kind) {
            Some(existing) if existing != description => Err(GrammarError::DuplicateKind {
                kind,
                registered: existing.clone(),
                requested: description.to_string(),
            }),
            _ => Ok(()),
        }
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TokenKind, String>> {
        self.kinds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TokenKind, String>> {
        self.kinds.write().unwrap_or_else(PoisonError::into_inner)
    }
}
