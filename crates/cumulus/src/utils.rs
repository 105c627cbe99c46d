use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_core::{ActionType, ApplyResult, Engine, FileStateStore, Plan};
use cumulus_opencloud::OpenCloudProvider;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Log to stderr, `RUST_LOG` first, raised to debug by `--verbose`
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit `--config` file, else the usual search path, then environment overrides
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ProviderConfig> {
    let config = match path {
        Some(path) => {
            let mut config = ProviderConfig::from_file(path)?;
            config.apply_env();
            config
        }
        None => ProviderConfig::load()?,
    };
    Ok(config)
}

/// Token cancelled by the first Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling in-flight operations...".yellow());
            token.cancel();
        }
    });
    cancel
}

/// Engine with every kind the configuration has an endpoint for
pub fn build_engine<'a>(
    config: &'a ProviderConfig,
    store: &'a FileStateStore,
    cancel: CancellationToken,
) -> anyhow::Result<Engine<'a>> {
    let mut engine = Engine::new(store);
    let kinds = OpenCloudProvider::new(config)
        .with_cancellation(cancel)
        .register(&mut engine)?;
    if kinds.is_empty() {
        println!("{}", "Warning: no service endpoints configured".yellow());
    }
    Ok(engine)
}

pub fn print_plan(plan: &Plan) {
    if !plan.has_changes {
        println!("{}", "No changes. Resources match the manifest.".green());
        return;
    }

    println!("{}", "Planned actions:".bold());
    for action in &plan.actions {
        let symbol = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Replace => "-/+".red(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => continue,
        };
        println!("  {} {}", symbol, action.description);
    }
    println!();
    println!("Plan: {}", plan.summary().to_string().bold());
}

pub fn print_result(result: &ApplyResult) {
    println!();
    for success in &result.succeeded {
        println!("  {} {}", "✓".green(), success.message);
    }
    for failure in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.key,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
    let summary = format!(
        "{} succeeded, {} failed in {:.1}s",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms as f64 / 1000.0
    );
    if result.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "project_id: proj-from-file\ntoken: t").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(config.project_id.is_some());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Some(Path::new("/nonexistent/cumulus.yaml"))).is_err());
    }
}
