use colored::Colorize;
use cumulus_config::ProviderConfig;
use cumulus_opencloud::{OpenCloudProvider, SubnetFilter};

pub async fn handle(config: &ProviderConfig, filter: SubnetFilter) -> anyhow::Result<()> {
    config.validate()?;
    let subnet = OpenCloudProvider::new(config).lookup_subnet(filter).await?;

    println!("{} {}", "Subnet".bold(), subnet.id.cyan());
    println!("  name:        {}", subnet.name);
    println!("  network_id:  {}", subnet.network_id);
    println!("  cidr:        {}", subnet.cidr);
    println!("  ip_version:  {}", subnet.ip_version);
    println!(
        "  gateway_ip:  {}",
        subnet.gateway_ip.as_deref().unwrap_or("(none)")
    );
    println!("  enable_dhcp: {}", subnet.enable_dhcp);
    for pool in &subnet.allocation_pools {
        println!("  pool:        {} - {}", pool.start, pool.end);
    }
    if !subnet.dns_nameservers.is_empty() {
        println!("  dns:         {}", subnet.dns_nameservers.join(", "));
    }
    Ok(())
}
