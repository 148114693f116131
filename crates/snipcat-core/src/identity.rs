//! Slug → identity resolution.
//!
//! An identity is minted the first time a slug is seen and is then returned
//! for that slug forever, unless a caller explicitly hands in an identity to
//! inherit (used when a stored row already owns one). The registry memoizes
//! within a run; persistence is delegated to an [`IdentityTable`].

use crate::error::Result;
use crate::paths::validate_slug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// IdentityTable
// ---------------------------------------------------------------------------

/// Persistent slug → identity bindings.
pub trait IdentityTable {
    fn lookup(&self, slug: &str) -> Result<Option<Identity>>;
    fn bind(&mut self, slug: &str, id: &Identity) -> Result<()>;
}

/// In-memory table.
#[derive(Debug, Default)]
pub struct MemoryIdentities {
    bindings: BTreeMap<String, Identity>,
}

impl MemoryIdentities {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl IdentityTable for MemoryIdentities {
    fn lookup(&self, slug: &str) -> Result<Option<Identity>> {
        Ok(self.bindings.get(slug).cloned())
    }

    fn bind(&mut self, slug: &str, id: &Identity) -> Result<()> {
        self.bindings.insert(slug.to_string(), id.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SlugRegistry
// ---------------------------------------------------------------------------

pub struct SlugRegistry<T: IdentityTable> {
    table: T,
    memo: HashMap<String, Identity>,
    minted: usize,
}

impl<T: IdentityTable> SlugRegistry<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            memo: HashMap::new(),
            minted: 0,
        }
    }

    /// Resolve `slug` to its identity.
    ///
    /// With `existing`, that identity is returned and the slug is (re)bound to
    /// it. Otherwise the memo, then the table, is consulted; a miss mints a
    /// fresh identity and persists the binding before returning.
    pub fn resolve(&mut self, slug: &str, existing: Option<&Identity>) -> Result<Identity> {
        validate_slug(slug)?;

        if let Some(id) = existing {
            if self.memo.get(slug) != Some(id) {
                self.table.bind(slug, id)?;
                self.memo.insert(slug.to_string(), id.clone());
            }
            return Ok(id.clone());
        }

        if let Some(id) = self.memo.get(slug) {
            return Ok(id.clone());
        }

        let id = match self.table.lookup(slug)? {
            Some(id) => id,
            None => {
                let id = Identity::mint();
                self.table.bind(slug, &id)?;
                self.minted += 1;
                tracing::debug!(slug, id = %id, "minted identity");
                id
            }
        };
        self.memo.insert(slug.to_string(), id.clone());
        Ok(id)
    }

    /// Number of identities minted by this registry.
    pub fn minted(&self) -> usize {
        self.minted
    }

    pub fn into_table(self) -> T {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    #[test]
    fn same_slug_same_identity() {
        let mut reg = SlugRegistry::new(MemoryIdentities::default());
        let a = reg.resolve("greet_user", None).unwrap();
        let b = reg.resolve("greet_user", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.minted(), 1);
    }

    #[test]
    fn identity_survives_a_new_registry() {
        let mut reg = SlugRegistry::new(MemoryIdentities::default());
        let first = reg.resolve("intro", None).unwrap();
        let table = reg.into_table();

        let mut reg = SlugRegistry::new(table);
        let second = reg.resolve("intro", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.minted(), 0);
    }

    #[test]
    fn distinct_slugs_get_distinct_identities() {
        let mut reg = SlugRegistry::new(MemoryIdentities::default());
        let a = reg.resolve("alpha", None).unwrap();
        let b = reg.resolve("beta", None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn existing_identity_is_inherited_and_bound() {
        let mut reg = SlugRegistry::new(MemoryIdentities::default());
        let inherited = Identity::from("set-0001");
        let got = reg.resolve("renamed", Some(&inherited)).unwrap();
        assert_eq!(got, inherited);
        assert_eq!(reg.resolve("renamed", None).unwrap(), inherited);
        assert_eq!(reg.minted(), 0);

        let table = reg.into_table();
        assert_eq!(table.lookup("renamed").unwrap(), Some(inherited));
    }

    #[test]
    fn invalid_slug_is_rejected_without_minting() {
        let mut reg = SlugRegistry::new(MemoryIdentities::default());
        let err = reg.resolve("Not A Slug", None).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSlug(_)));
        assert!(reg.into_table().is_empty());
    }
}
