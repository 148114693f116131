pub mod check;
pub mod classify;
pub mod emit;
pub mod record;
pub mod resolve;
pub mod sets;

use anyhow::Context;
use snipcat_core::{config::StoreConfig, store::Catalog};

pub(crate) fn open_catalog(config: &StoreConfig) -> anyhow::Result<Catalog> {
    Catalog::open_configured(config)
        .with_context(|| format!("failed to open catalog at {}", config.db_path.display()))
}

/// Epoch seconds.
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
