//! Jobs command implementation.
//!
//! List jobs, inspect and cancel them, and wait on them over the status
//! channel.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use qnexus::{Filter, JobStatusEnum, NexusError, WaitOptions};

use super::common::{create_client, parse_job_id, parse_job_type, parse_status, styled_status};

/// Execute the jobs list subcommand.
pub async fn execute_list(
    project: Option<&str>,
    name: Option<&str>,
    status: Option<&str>,
    job_type: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let client = create_client()?;

    let mut filter = Filter::new();
    if let Some(project) = project {
        let project = client
            .projects()
            .get(Filter::new().name_like(project))
            .await
            .map_err(|e| anyhow::anyhow!("Project '{project}': {e}"))?;
        filter = filter.project(project.id);
    }
    if let Some(name) = name {
        filter = filter.name_like(name);
    }
    if let Some(status) = status {
        filter = filter.job_status(parse_status(status)?);
    }
    if let Some(job_type) = job_type {
        filter = filter.job_type(parse_job_type(job_type)?);
    }

    let mut jobs = client.jobs().get_all(filter);
    let mut shown = 0;
    while let Some(job) = jobs.next().await? {
        if limit.is_some_and(|l| shown >= l) {
            break;
        }
        println!(
            "  {:<12} {:<8} {:<32} {}  {}",
            styled_status(job.last_status),
            job.job_type.to_string(),
            style(job.annotations.display_name()).bold(),
            style(job.id).dim(),
            style(job.project.annotations.display_name()).cyan()
        );
        shown += 1;
    }

    if shown == 0 {
        println!("  No jobs found.");
    }
    Ok(())
}

/// Execute the jobs status subcommand.
pub async fn execute_status(job_id: &str) -> Result<()> {
    let client = create_client()?;
    let id = parse_job_id(job_id)?;

    let status = client
        .jobs()
        .status(id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get status: {e}"))?;

    println!(
        "{} Job {}: {}",
        style("→").cyan().bold(),
        style(job_id).dim(),
        styled_status(status.status)
    );
    if !status.message.is_empty() {
        println!("  Message:        {}", status.message);
    }
    if let Some(position) = status.queue_position {
        println!("  Queue position: {position}");
    }
    if let Some(cost) = status.cost {
        println!("  Cost:           {cost:.2}");
    }
    if let Some(detail) = &status.error_detail {
        println!("  Error detail:   {}", style(detail).red());
    }

    Ok(())
}

/// Execute the jobs wait subcommand.
pub async fn execute_wait(job_id: &str, target: &str, timeout: u64) -> Result<()> {
    let client = create_client()?;
    let id = parse_job_id(job_id)?;
    let target = parse_status(target)?;

    let timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
    println!(
        "{} Waiting for job {} to reach {} (timeout: {})",
        style("→").cyan().bold(),
        style(job_id).dim(),
        styled_status(target),
        timeout.map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs()))
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?,
    );
    spinner.set_message("Listening for status updates...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let options = WaitOptions::default()
        .with_target(target)
        .with_timeout(timeout);
    let outcome = client.jobs().wait_for(id, &options).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(status) if status.status == target || status.status == JobStatusEnum::Completed => {
            println!(
                "{} Job {} is {}",
                style("✓").green().bold(),
                style(job_id).dim(),
                styled_status(status.status)
            );
            Ok(())
        }
        Ok(status) => {
            println!(
                "{} Job finished with status: {}",
                style("✗").red().bold(),
                styled_status(status.status)
            );
            Ok(())
        }
        Err(NexusError::Timeout(_)) => anyhow::bail!(
            "Timeout waiting for job {job_id}. Use 'qnx jobs status {job_id}' to check later."
        ),
        Err(e) => Err(e.into()),
    }
}

/// Execute the jobs cancel subcommand.
pub async fn execute_cancel(job_id: &str) -> Result<()> {
    let client = create_client()?;
    let id = parse_job_id(job_id)?;

    client
        .jobs()
        .cancel(id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to cancel job: {e}"))?;
    println!(
        "{} Cancellation requested for job {}",
        style("✓").green().bold(),
        style(job_id).dim()
    );
    Ok(())
}
