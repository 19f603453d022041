//! Quotas command implementation.

use anyhow::Result;
use console::style;

use super::common::create_client;

/// Execute the quotas command.
pub async fn execute() -> Result<()> {
    let client = create_client()?;
    let quotas = client.quotas().get_all().await?;

    println!("{} Quota usage:\n", style("→").cyan().bold());
    for quota in &quotas {
        println!(
            "  {:<16} {:>12.2} / {:<16} {}",
            style(quota.name.as_str()).bold(),
            quota.usage,
            quota.quota.to_string(),
            style(&quota.description).dim()
        );
    }

    Ok(())
}
