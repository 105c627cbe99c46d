use colored::Colorize;
use cumulus_core::{FileStateStore, StateStore};
use std::path::Path;

/// Print the recorded resources without contacting the API
pub async fn handle(state_dir: &Path, json: bool) -> anyhow::Result<()> {
    let store = FileStateStore::new(state_dir);
    let records = store.list().await?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = records
            .into_iter()
            .map(|(key, record)| Ok((key, serde_json::to_value(record)?)))
            .collect::<serde_json::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No resources in state ({})", store.state_path().display());
        return Ok(());
    }

    println!("{}", format!("Resources ({}):", records.len()).bold());
    for (key, record) in &records {
        println!(
            "  {} {} (updated {})",
            key.cyan(),
            record.id,
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
