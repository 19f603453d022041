//! Devices command implementation.

use anyhow::Result;
use console::style;

use super::common::create_client;

/// Execute the devices command.
pub async fn execute() -> Result<()> {
    let client = create_client()?;
    let devices = client.devices().get_all().await?;

    println!("{} Available devices:\n", style("→").cyan().bold());
    for device in &devices {
        let hosting = if device.nexus_hosted {
            style("nexus-hosted").green()
        } else {
            style("remote").dim()
        };
        println!(
            "  {:<24} {:<28} {}",
            style(&device.backend_name).bold(),
            device.device_name.as_deref().unwrap_or("-"),
            hosting
        );
    }
    if devices.is_empty() {
        println!("  No devices available.");
    }

    Ok(())
}
