pub mod candidate;
pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod manifest;
pub mod markdown;
pub mod ndjson;
pub mod paths;
pub mod scan;
pub mod snippet;
pub mod store;
pub mod upsert;

pub use error::{CatalogError, Result};
