//! Projects command implementation.

use anyhow::Result;
use console::style;
use qnexus::Filter;

use super::common::create_client;

/// Execute the projects command.
pub async fn execute(name: Option<&str>, archived: bool, limit: Option<usize>) -> Result<()> {
    let client = create_client()?;

    let mut filter = Filter::new();
    if let Some(name) = name {
        filter = filter.name_like(name);
    }
    if archived {
        filter = filter.archived(true);
    }

    let mut projects = client.projects().get_all(filter);
    let total = projects.count().await?;
    println!(
        "{} {} project(s)\n",
        style("→").cyan().bold(),
        style(total).bold()
    );

    let mut shown = 0;
    while let Some(project) = projects.next().await? {
        if limit.is_some_and(|l| shown >= l) {
            break;
        }
        let created = project
            .annotations
            .created
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<32} {}  {}{}",
            style(project.annotations.display_name()).bold(),
            style(project.id).dim(),
            created,
            if project.archived { "  (archived)" } else { "" }
        );
        shown += 1;
    }

    Ok(())
}
