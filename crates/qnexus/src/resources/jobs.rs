//! Compile and execute jobs.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{with_context_project, with_list_defaults};
use crate::error::NexusResult;
use crate::filters::{Filter, QueryParams};
use crate::http::{NexusClient, Operation};
use crate::iterator::NexusIterator;
use crate::models::job_status::{JobStatus, JobStatusEnum};
use crate::models::references::JobRef;
use crate::wait::{self, StatusSource, WaitOptions};

pub const JOBS_PATH: &str = "/api/jobs/v1beta";

/// How a retried job reconciles with state held by the remote backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteRetryStrategy {
    /// Re-sync status and collect results; never resubmit.
    #[default]
    Default,
    /// Resubmit if no remote handle is recorded.
    AllowResubmit,
    /// Resubmit if a handle exists but no result was collected.
    ForceResubmit,
    /// Treat the job as brand new.
    FullRestart,
}

#[derive(Debug, Clone)]
pub struct Jobs {
    client: NexusClient,
}

impl Jobs {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// List jobs, scoped to the active project when no project is given.
    pub fn get_all(&self, filter: Filter) -> NexusIterator<JobRef> {
        let filter = with_context_project(&self.client, with_list_defaults(filter));
        self.client
            .iterator("job", JOBS_PATH, filter.to_query(), JobRef::from_page)
    }

    pub async fn get(&self, filter: Filter) -> NexusResult<JobRef> {
        self.get_all(filter).try_unique_match().await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> NexusResult<JobRef> {
        let doc = self
            .client
            .fetch_by_id(&format!("{JOBS_PATH}/{id}"), &QueryParams::new(), "job")
            .await?;
        JobRef::from_entry(&doc, &doc["data"])
    }

    /// Current status of a job.
    pub async fn status(&self, job_id: Uuid) -> NexusResult<JobStatus> {
        self.client.job_status(job_id).await
    }

    /// Wait for a job over the websocket status channel.
    pub async fn wait_for(&self, job_id: Uuid, options: &WaitOptions) -> NexusResult<JobStatus> {
        let channel = self.client.status_channel();
        wait::wait_for(&self.client, &channel, job_id, options).await
    }

    /// Wait for a job by polling the status endpoint every `interval`.
    pub async fn poll_until(
        &self,
        job_id: Uuid,
        target: JobStatusEnum,
        interval: std::time::Duration,
        timeout: Option<std::time::Duration>,
    ) -> NexusResult<JobStatus> {
        wait::poll_until(&self.client, job_id, target, interval, timeout).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: Uuid) -> NexusResult<()> {
        self.client
            .post_json(
                &format!("{JOBS_PATH}/{job_id}/rpc/cancel"),
                &json!({}),
                StatusCode::ACCEPTED,
                Operation::Update,
            )
            .await?;
        info!(%job_id, "Cancellation requested");
        Ok(())
    }

    /// Ask the platform to retry a job.
    ///
    /// With no `retry_status` the server retries jobs in the ERROR state.
    #[instrument(skip(self))]
    pub async fn retry_submission(
        &self,
        job_id: Uuid,
        retry_status: Option<&[JobStatusEnum]>,
        remote_retry_strategy: RemoteRetryStrategy,
        user_group: Option<&str>,
    ) -> NexusResult<()> {
        let mut body = Map::new();
        body.insert(
            "remote_retry_strategy".into(),
            serde_json::to_value(remote_retry_strategy)?,
        );
        if let Some(group) = user_group {
            body.insert("user_group".into(), Value::String(group.to_string()));
        }
        if let Some(statuses) = retry_status {
            body.insert(
                "retry_status".into(),
                statuses.iter().map(|s| Value::String(s.name().into())).collect(),
            );
        }

        self.client
            .post_json(
                &format!("{JOBS_PATH}/{job_id}/rpc/retry"),
                &Value::Object(body),
                StatusCode::ACCEPTED,
                Operation::Update,
            )
            .await?;
        info!(%job_id, ?remote_retry_strategy, "Retry requested");
        Ok(())
    }
}
