use crate::utils;
use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::FileStateStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    state_dir: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    println!("{}", "Refreshing state...".blue());
    let store = FileStateStore::new(state_dir);
    let engine = utils::build_engine(config, &store, cancel)?;

    let lock = store.acquire_lock().await?;
    let summary = engine.refresh().await;
    lock.release().await?;
    let summary = summary?;

    for key in &summary.refreshed {
        println!("  {} {}", "✓".green(), key);
    }
    for key in &summary.removed {
        println!("  {} {} (gone, removed from state)", "-".red(), key);
    }
    for (key, error) in &summary.failed {
        println!("  {} {}: {}", "✗".red(), key, error);
    }
    println!(
        "{}",
        format!(
            "{} refreshed, {} removed, {} failed",
            summary.refreshed.len(),
            summary.removed.len(),
            summary.failed.len()
        )
        .bold()
    );
    if !summary.is_success() {
        anyhow::bail!("{} resources could not be refreshed", summary.failed.len());
    }
    Ok(())
}
