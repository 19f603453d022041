//! Waiting for jobs to settle.
//!
//! [`wait_for`] queries the job status once, and if the job is still queued,
//! submitted or running, listens on a streaming status channel until an update
//! either leaves the waiting states or matches the requested target. Dropped
//! channels are reopened until the overall timeout expires.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{NexusError, NexusResult};
use crate::models::job_status::{JobStatus, JobStatusEnum};

/// Default overall wait budget.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// One-shot status query.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn job_status(&self, job_id: Uuid) -> NexusResult<JobStatus>;
}

/// An open status feed for one job.
#[async_trait]
pub trait StatusSubscription: Send {
    /// Next update, or `None` once the channel has closed.
    async fn next_status(&mut self) -> Option<NexusResult<JobStatus>>;

    /// Close the feed.
    async fn close(&mut self) -> NexusResult<()> {
        Ok(())
    }
}

/// Opens status feeds.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    async fn connect(&self, job_id: Uuid) -> NexusResult<Box<dyn StatusSubscription>>;
}

/// Delay between reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl ReconnectBackoff {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let millis = (self.initial.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Parameters for [`wait_for`].
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Status that ends the wait even while the job is still waiting.
    pub target: JobStatusEnum,
    /// Overall budget; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub backoff: ReconnectBackoff,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            target: JobStatusEnum::Completed,
            timeout: Some(DEFAULT_WAIT_TIMEOUT),
            backoff: ReconnectBackoff::default(),
        }
    }
}

impl WaitOptions {
    pub fn with_target(mut self, target: JobStatusEnum) -> Self {
        self.target = target;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

fn resolves(status: &JobStatus, target: JobStatusEnum) -> bool {
    !status.is_waiting() || status.status == target
}

/// Errors after which the channel is reopened rather than surfaced.
fn is_transient(err: &NexusError) -> bool {
    matches!(err, NexusError::ChannelClosed(_) | NexusError::Http(_))
}

/// Wait until the job leaves the waiting states or reaches `options.target`.
///
/// A job that ends in `ERROR` is reported as [`NexusError::JobFailed`] with the
/// server's error detail; any other resolution returns the status record.
pub async fn wait_for(
    source: &dyn StatusSource,
    channel: &dyn StatusChannel,
    job_id: Uuid,
    options: &WaitOptions,
) -> NexusResult<JobStatus> {
    let listen = listen_job_status(source, channel, job_id, options.target, &options.backoff);

    let status = match options.timeout {
        Some(limit) => tokio::time::timeout(limit, listen)
            .await
            .map_err(|_| NexusError::Timeout(job_id.to_string()))??,
        None => listen.await?,
    };

    into_outcome(status)
}

fn into_outcome(status: JobStatus) -> NexusResult<JobStatus> {
    if status.status == JobStatusEnum::Error {
        return Err(NexusError::JobFailed {
            detail: status.error_detail.unwrap_or_default(),
        });
    }
    Ok(status)
}

/// Blocking form of [`wait_for`] for synchronous callers.
///
/// Runs the wait on a private current-thread runtime, so it must not be
/// called from inside an async context.
pub fn wait_for_blocking(
    source: &dyn StatusSource,
    channel: &dyn StatusChannel,
    job_id: Uuid,
    options: &WaitOptions,
) -> NexusResult<JobStatus> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(wait_for(source, channel, job_id, options))
}

/// Follow the job's status without a deadline.
///
/// The first status comes from `source`; later ones come from `channel`.
pub async fn listen_job_status(
    source: &dyn StatusSource,
    channel: &dyn StatusChannel,
    job_id: Uuid,
    target: JobStatusEnum,
    backoff: &ReconnectBackoff,
) -> NexusResult<JobStatus> {
    let mut status = source.job_status(job_id).await?;
    debug!(%job_id, status = %status.status, "Current job status");
    if resolves(&status, target) {
        return Ok(status);
    }

    let mut failures: u32 = 0;
    loop {
        let mut subscription = match channel.connect(job_id).await {
            Ok(sub) => sub,
            Err(e) if is_transient(&e) => {
                let delay = backoff.delay(failures);
                failures = failures.saturating_add(1);
                warn!(%job_id, error = %e, ?delay, "Status channel connect failed, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        let mut received = false;
        while let Some(update) = subscription.next_status().await {
            match update {
                Ok(next) => {
                    received = true;
                    debug!(%job_id, status = %next.status, "New job status");
                    status = next;
                    if resolves(&status, target) {
                        if let Err(e) = subscription.close().await {
                            debug!(%job_id, error = %e, "Closing status channel failed");
                        }
                        return Ok(status);
                    }
                }
                Err(e) if is_transient(&e) => {
                    debug!(%job_id, error = %e, "Status channel dropped");
                    break;
                }
                Err(e) => {
                    subscription.close().await.ok();
                    return Err(e);
                }
            }
        }

        if received {
            failures = 0;
        } else {
            let delay = backoff.delay(failures);
            failures = failures.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
        info!(%job_id, "Status channel closed, reconnecting");
    }
}

/// Poll `source` at a fixed interval until the job resolves.
///
/// For deployments where the streaming channel is unavailable.
pub async fn poll_until(
    source: &dyn StatusSource,
    job_id: Uuid,
    target: JobStatusEnum,
    interval: Duration,
    timeout: Option<Duration>,
) -> NexusResult<JobStatus> {
    let start = Instant::now();
    loop {
        let status = source.job_status(job_id).await?;
        if resolves(&status, target) {
            return into_outcome(status);
        }
        if let Some(limit) = timeout {
            if start.elapsed() + interval > limit {
                return Err(NexusError::Timeout(job_id.to_string()));
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(s: JobStatusEnum) -> JobStatus {
        JobStatus::new(s, s.name().to_lowercase())
    }

    struct FixedSource(JobStatus);

    #[async_trait]
    impl StatusSource for FixedSource {
        async fn job_status(&self, _job_id: Uuid) -> NexusResult<JobStatus> {
            Ok(self.0.clone())
        }
    }

    /// Replays a scripted sequence of polls.
    struct SequenceSource {
        statuses: Mutex<VecDeque<JobStatus>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for SequenceSource {
        async fn job_status(&self, _job_id: Uuid) -> NexusResult<JobStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            let next = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            Ok(next.unwrap_or_else(|| status(JobStatusEnum::Queued)))
        }
    }

    enum Step {
        Update(JobStatus),
        Drop,
        Hang,
    }

    struct ScriptedSubscription {
        steps: VecDeque<Step>,
        closed: std::sync::Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StatusSubscription for ScriptedSubscription {
        async fn next_status(&mut self) -> Option<NexusResult<JobStatus>> {
            match self.steps.pop_front() {
                Some(Step::Update(s)) => Some(Ok(s)),
                Some(Step::Drop) => Some(Err(NexusError::ChannelClosed("reset".into()))),
                Some(Step::Hang) => std::future::pending().await,
                None => None,
            }
        }

        async fn close(&mut self) -> NexusResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Each connect hands out the next scripted connection.
    struct ScriptedChannel {
        connections: Mutex<VecDeque<NexusResult<Vec<Step>>>>,
        connects: AtomicUsize,
        closed: std::sync::Arc<AtomicUsize>,
    }

    impl ScriptedChannel {
        fn new(connections: Vec<NexusResult<Vec<Step>>>) -> Self {
            Self {
                connections: Mutex::new(connections.into()),
                connects: AtomicUsize::new(0),
                closed: std::sync::Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl StatusChannel for ScriptedChannel {
        async fn connect(&self, _job_id: Uuid) -> NexusResult<Box<dyn StatusSubscription>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self.connections.lock().unwrap().pop_front();
            let steps = match next {
                Some(Ok(steps)) => steps,
                Some(Err(e)) => return Err(e),
                None => vec![Step::Hang],
            };
            Ok(Box::new(ScriptedSubscription {
                steps: steps.into(),
                closed: self.closed.clone(),
            }))
        }
    }

    fn options(timeout: u64) -> WaitOptions {
        WaitOptions::default().with_timeout(Some(Duration::from_secs(timeout)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_reaches_completed() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let channel = ScriptedChannel::new(vec![Ok(vec![
            Step::Update(status(JobStatusEnum::Queued)),
            Step::Update(status(JobStatusEnum::Running)),
            Step::Update(status(JobStatusEnum::Completed)),
        ])]);

        let start = Instant::now();
        let result = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatusEnum::Completed);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(channel.connects.load(Ordering::SeqCst), 1);
        assert_eq!(channel.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_disconnect() {
        let source = FixedSource(status(JobStatusEnum::Submitted));
        let channel = ScriptedChannel::new(vec![
            Ok(vec![Step::Update(status(JobStatusEnum::Queued)), Step::Drop]),
            Ok(vec![
                Step::Update(status(JobStatusEnum::Running)),
                Step::Update(status(JobStatusEnum::Completed)),
            ]),
        ]);

        let result = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatusEnum::Completed);
        assert_eq!(channel.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_clean_close_and_connect_failure() {
        let source = FixedSource(status(JobStatusEnum::Running));
        let channel = ScriptedChannel::new(vec![
            Ok(vec![]),
            Err(NexusError::ChannelClosed("connection refused".into())),
            Ok(vec![Step::Update(status(JobStatusEnum::Completed))]),
        ]);

        let result = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatusEnum::Completed);
        assert_eq!(channel.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_carries_detail() {
        let source = FixedSource(status(JobStatusEnum::Running));
        let mut failed = status(JobStatusEnum::Error);
        failed.error_detail = Some("Quota exceeded: 0 HQC remaining".into());
        let channel = ScriptedChannel::new(vec![Ok(vec![Step::Update(failed)])]);

        let err = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap_err();
        match err {
            NexusError::JobFailed { detail } => {
                assert_eq!(detail, "Quota exceeded: 0 HQC remaining");
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_terminal_skips_channel() {
        let source = FixedSource(status(JobStatusEnum::Cancelled));
        let channel = ScriptedChannel::new(vec![]);

        let result = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatusEnum::Cancelled);
        assert_eq!(channel.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_at_target_skips_channel() {
        let source = FixedSource(status(JobStatusEnum::Running));
        let channel = ScriptedChannel::new(vec![]);
        let opts = options(10).with_target(JobStatusEnum::Running);

        let result = wait_for(&source, &channel, Uuid::new_v4(), &opts).await.unwrap();
        assert_eq!(result.status, JobStatusEnum::Running);
        assert_eq!(channel.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_target_resolves_early() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let channel = ScriptedChannel::new(vec![Ok(vec![
            Step::Update(status(JobStatusEnum::Submitted)),
            Step::Update(status(JobStatusEnum::Running)),
            Step::Hang,
        ])]);
        let opts = options(10).with_target(JobStatusEnum::Running);

        let result = wait_for(&source, &channel, Uuid::new_v4(), &opts).await.unwrap();
        assert_eq!(result.status, JobStatusEnum::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let channel = ScriptedChannel::new(vec![Ok(vec![
            Step::Update(status(JobStatusEnum::Queued)),
            Step::Hang,
        ])]);

        let start = Instant::now();
        let err = wait_for(&source, &channel, Uuid::new_v4(), &options(5))
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_drops_are_retried_until_timeout() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let connections = (0..1000).map(|_| Ok(vec![Step::Drop])).collect();
        let channel = ScriptedChannel::new(connections);

        let err = wait_for(&source, &channel, Uuid::new_v4(), &options(30))
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Timeout(_)));
        assert!(channel.connects.load(Ordering::SeqCst) > 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_surfaces() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let channel = ScriptedChannel::new(vec![Err(NexusError::Authentication(
            "handshake rejected".into(),
        ))]);

        let err = wait_for(&source, &channel, Uuid::new_v4(), &options(10))
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(channel.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until() {
        let source = SequenceSource {
            statuses: Mutex::new(
                vec![
                    status(JobStatusEnum::Queued),
                    status(JobStatusEnum::Running),
                    status(JobStatusEnum::Completed),
                ]
                .into(),
            ),
            calls: AtomicUsize::new(0),
        };

        let result = poll_until(
            &source,
            Uuid::new_v4(),
            JobStatusEnum::Completed,
            Duration::from_millis(500),
            Some(Duration::from_secs(10)),
        )
        .await
        .unwrap();
        assert_eq!(result.status, JobStatusEnum::Completed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_timeout() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let err = poll_until(
            &source,
            Uuid::new_v4(),
            JobStatusEnum::Completed,
            Duration::from_secs(1),
            Some(Duration::from_secs(3)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NexusError::Timeout(_)));
    }

    #[test]
    fn test_blocking_wait() {
        let source = FixedSource(status(JobStatusEnum::Queued));
        let channel = ScriptedChannel::new(vec![Ok(vec![Step::Update(status(
            JobStatusEnum::Completed,
        ))])]);

        let result = wait_for_blocking(&source, &channel, Uuid::new_v4(), &options(5)).unwrap();
        assert_eq!(result.status, JobStatusEnum::Completed);
    }

    #[test]
    fn test_backoff_caps() {
        let backoff = ReconnectBackoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(20), Duration::from_secs(5));
    }
}
