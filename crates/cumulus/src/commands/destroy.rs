use crate::utils;
use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::{FileStateStore, StateStore};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    state_dir: &Path,
    yes: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let store = FileStateStore::new(state_dir);
    let records = store.list().await?;
    if records.is_empty() {
        println!("{}", "Nothing to destroy.".green());
        return Ok(());
    }

    println!("{}", format!("Resources to delete ({}):", records.len()).bold());
    for (key, record) in &records {
        println!("  {} {} ({})", "-".red(), key, record.id);
    }

    if !yes {
        println!();
        println!("{}", "Warning: every recorded resource will be deleted.".yellow());
        println!("Pass --yes to destroy");
        return Ok(());
    }

    let engine = utils::build_engine(config, &store, cancel)?;
    let lock = store.acquire_lock().await?;
    let result = engine.destroy().await;
    lock.release().await?;
    let result = result?;

    utils::print_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} resources could not be deleted", result.failed.len());
    }
    Ok(())
}
