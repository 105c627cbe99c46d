use crate::utils;
use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::FileStateStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    state_dir: &Path,
    kind: &str,
    name: &str,
    id: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let store = FileStateStore::new(state_dir);
    let engine = utils::build_engine(config, &store, cancel)?;

    let lock = store.acquire_lock().await?;
    let record = engine.import(kind, name, id).await;
    lock.release().await?;
    let record = record?;

    println!(
        "{} Imported {}.{} ({})",
        "✓".green(),
        kind,
        name.cyan(),
        record.id
    );
    Ok(())
}
