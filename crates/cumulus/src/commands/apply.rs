use crate::manifest::Manifest;
use crate::utils;
use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::FileStateStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    state_dir: &Path,
    manifest_path: &Path,
    yes: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let manifest = Manifest::from_file(manifest_path)?;
    let store = FileStateStore::new(state_dir);
    let engine = utils::build_engine(config, &store, cancel)?;

    let plan = engine.plan(&manifest.resources).await?;
    utils::print_plan(&plan);
    if !plan.has_changes {
        return Ok(());
    }

    if !yes {
        println!();
        println!("{}", "Warning: this will change remote resources.".yellow());
        println!("Pass --yes to apply");
        return Ok(());
    }

    let lock = store.acquire_lock().await?;
    println!();
    println!("{}", "Applying...".blue().bold());
    let result = engine.apply(&plan).await;
    lock.release().await?;

    utils::print_result(&result);
    if !result.is_success() {
        anyhow::bail!(
            "{} of {} actions failed",
            result.failed.len(),
            result.failed.len() + result.succeeded.len()
        );
    }
    Ok(())
}
