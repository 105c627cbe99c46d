use crate::manifest::Manifest;
use crate::utils;
use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::FileStateStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Compare the manifest with recorded state; no API calls are made
pub async fn handle(
    config: &ProviderConfig,
    state_dir: &Path,
    manifest_path: &Path,
) -> anyhow::Result<()> {
    println!("{}", "Planning...".blue());
    let manifest = Manifest::from_file(manifest_path)?;
    println!(
        "Manifest: {} ({} resources)",
        manifest_path.display().to_string().cyan(),
        manifest.resources.len()
    );

    let store = FileStateStore::new(state_dir);
    let engine = utils::build_engine(config, &store, CancellationToken::new())?;
    let plan = engine.plan(&manifest.resources).await?;

    println!();
    utils::print_plan(&plan);
    Ok(())
}
