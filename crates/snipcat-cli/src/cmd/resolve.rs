use crate::cmd::open_catalog;
use crate::output::print_json;
use anyhow::Context;
use snipcat_core::config::StoreConfig;

pub fn run(config: &StoreConfig, slug: &str, json: bool) -> anyhow::Result<()> {
    let id = open_catalog(config)?
        .resolve(slug)
        .with_context(|| format!("cannot resolve '{slug}'"))?;

    if json {
        print_json(&serde_json::json!({ "slug": slug, "id": id }))?;
    } else {
        println!("{id}");
    }
    Ok(())
}
