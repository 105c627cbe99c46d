mod commands;
mod manifest;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cumulus")]
#[command(about = "Declarative resources for Open Cloud, reconciled", long_about = None)]
struct Cli {
    /// Provider config file (defaults to CUMULUS_CONFIG, ./cumulus.yaml, ~/.config/cumulus/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the .cumulus state directory
    #[arg(long, global = true, env = "CUMULUS_STATE_DIR", default_value = ".")]
    state_dir: PathBuf,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan {
        /// Resource manifest
        #[arg(short = 'f', long = "file", default_value = "cumulus.resources.yaml")]
        file: PathBuf,
    },
    /// Create, update and delete resources to match the manifest
    Apply {
        /// Resource manifest
        #[arg(short = 'f', long = "file", default_value = "cumulus.resources.yaml")]
        file: PathBuf,
        /// Apply without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read every recorded resource from the API
    Refresh,
    /// Delete every recorded resource
    Destroy {
        /// Destroy without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Adopt an existing remote object into state
    Import {
        /// Resource kind (backup_policy, network, subnet, loadbalancer, keypair)
        kind: String,
        /// Name in the manifest
        name: String,
        /// Remote ID
        id: String,
    },
    /// List recorded resources
    Show {
        /// Print the observed state of every record
        #[arg(long)]
        json: bool,
    },
    /// Find exactly one subnet matching the filters
    #[command(name = "lookup-subnet")]
    LookupSubnet {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        network_id: Option<String>,
        #[arg(long)]
        cidr: Option<String>,
        #[arg(long)]
        gateway_ip: Option<String>,
        #[arg(long)]
        ip_version: Option<i64>,
        #[arg(long)]
        tenant_id: Option<String>,
        #[arg(long = "id")]
        subnet_id: Option<String>,
        /// Only subnets with DHCP enabled
        #[arg(long, conflicts_with = "dhcp_disabled")]
        dhcp_enabled: bool,
        /// Only subnets with DHCP disabled
        #[arg(long)]
        dhcp_disabled: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("cumulus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Show only reads local state
    if let Commands::Show { json } = cli.command {
        return commands::show::handle(&cli.state_dir, json).await;
    }

    let config = utils::load_config(cli.config.as_deref())?;
    let cancel = utils::cancel_on_ctrl_c();

    match cli.command {
        Commands::Plan { file } => {
            commands::plan::handle(&config, &cli.state_dir, &file).await?;
        }
        Commands::Apply { file, yes } => {
            commands::apply::handle(&config, &cli.state_dir, &file, yes, cancel).await?;
        }
        Commands::Refresh => {
            commands::refresh::handle(&config, &cli.state_dir, cancel).await?;
        }
        Commands::Destroy { yes } => {
            commands::destroy::handle(&config, &cli.state_dir, yes, cancel).await?;
        }
        Commands::Import { kind, name, id } => {
            commands::import::handle(&config, &cli.state_dir, &kind, &name, &id, cancel).await?;
        }
        Commands::LookupSubnet {
            name,
            network_id,
            cidr,
            gateway_ip,
            ip_version,
            tenant_id,
            subnet_id,
            dhcp_enabled,
            dhcp_disabled,
        } => {
            let filter = cumulus_opencloud::SubnetFilter {
                name,
                dhcp_enabled,
                dhcp_disabled,
                network_id,
                tenant_id,
                ip_version,
                gateway_ip,
                cidr,
                subnet_id,
            };
            commands::lookup_subnet::handle(&config, filter).await?;
        }
        Commands::Show { .. } => {
            unreachable!("Show is handled before config loading");
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
