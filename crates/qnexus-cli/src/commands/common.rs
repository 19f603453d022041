//! Helpers shared by the commands.

use anyhow::{Context, Result};
use console::style;
use qnexus::{JobStatusEnum, JobType, NexusClient};
use uuid::Uuid;

/// Build a client from the `NEXUS_*` environment.
pub fn create_client() -> Result<NexusClient> {
    NexusClient::from_env().context("Failed to configure Nexus client")
}

pub fn parse_job_id(job_id: &str) -> Result<Uuid> {
    Uuid::parse_str(job_id).map_err(|e| anyhow::anyhow!("Invalid job ID '{job_id}': {e}"))
}

/// Parse a job status name, ignoring case.
pub fn parse_status(status: &str) -> Result<JobStatusEnum> {
    status.to_uppercase().parse().map_err(|_| {
        let names: Vec<&str> = JobStatusEnum::ALL.iter().map(|s| s.name()).collect();
        anyhow::anyhow!("Unknown status '{status}'. Available: {}", names.join(", "))
    })
}

pub fn parse_job_type(job_type: &str) -> Result<JobType> {
    match job_type.to_lowercase().as_str() {
        "compile" => Ok(JobType::Compile),
        "execute" => Ok(JobType::Execute),
        other => anyhow::bail!("Unknown job type: '{other}'. Available: compile, execute"),
    }
}

/// Colour a status by outcome.
pub fn styled_status(status: JobStatusEnum) -> console::StyledObject<&'static str> {
    let name = status.name();
    match status {
        JobStatusEnum::Completed => style(name).green(),
        JobStatusEnum::Error | JobStatusEnum::Cancelled => style(name).red(),
        JobStatusEnum::Depleted | JobStatusEnum::Terminated => style(name).red(),
        _ => style(name).yellow(),
    }
}
