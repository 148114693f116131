//! Store location resolution.
//!
//! The catalog lives in exactly one externally configured place. Callers may
//! not point a single invocation at a different file: an explicit override is
//! rejected outright so two stores never drift apart.

use crate::error::{CatalogError, Result};
use crate::paths;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    /// Resolve the store location from `SNIPCAT_DB_PATH`, falling back to
    /// `~/.snipcat/catalog.redb`.
    ///
    /// `explicit` exists so front ends can forward a user-supplied path and
    /// have it refused here, in one place.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::refuse_explicit(explicit)?;
        Self::from_sources(std::env::var_os(paths::DB_PATH_ENV), home::home_dir())
    }

    /// Refuse a user-supplied store path without looking anything up, for
    /// commands that never open the store.
    pub fn refuse_explicit(explicit: Option<&Path>) -> Result<()> {
        match explicit {
            Some(_) => Err(CatalogError::ExplicitStorePath),
            None => Ok(()),
        }
    }

    fn from_sources(env_value: Option<OsString>, home: Option<PathBuf>) -> Result<Self> {
        if let Some(value) = env_value.filter(|v| !v.is_empty()) {
            return Ok(Self {
                db_path: PathBuf::from(value),
            });
        }
        let home = home.ok_or(CatalogError::HomeNotFound)?;
        Ok(Self {
            db_path: paths::default_store_path(&home),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_rejected() {
        let err = StoreConfig::resolve(Some(Path::new("/tmp/other.redb"))).unwrap_err();
        assert!(matches!(err, CatalogError::ExplicitStorePath));
        assert!(StoreConfig::refuse_explicit(Some(Path::new("x.redb"))).is_err());
        assert!(StoreConfig::refuse_explicit(None).is_ok());
    }

    #[test]
    fn env_value_wins_over_home() {
        let cfg = StoreConfig::from_sources(
            Some(OsString::from("/data/catalog.redb")),
            Some(PathBuf::from("/home/u")),
        )
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/data/catalog.redb"));
    }

    #[test]
    fn empty_env_value_falls_back_to_home() {
        let cfg =
            StoreConfig::from_sources(Some(OsString::new()), Some(PathBuf::from("/home/u"))).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/home/u/.snipcat/catalog.redb"));
    }

    #[test]
    fn no_env_and_no_home_is_an_error() {
        let err = StoreConfig::from_sources(None, None).unwrap_err();
        assert!(matches!(err, CatalogError::HomeNotFound));
    }
}
