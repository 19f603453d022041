//! Job status records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NexusError, NexusResult};

/// Lifecycle states reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatusEnum {
    Completed,
    Queued,
    Submitted,
    Running,
    Cancelled,
    Error,
    Cancelling,
    Retrying,
    Terminated,
    Depleted,
}

impl JobStatusEnum {
    /// Every status, in the order the platform documents them.
    pub const ALL: [JobStatusEnum; 10] = [
        JobStatusEnum::Completed,
        JobStatusEnum::Queued,
        JobStatusEnum::Submitted,
        JobStatusEnum::Running,
        JobStatusEnum::Cancelled,
        JobStatusEnum::Error,
        JobStatusEnum::Cancelling,
        JobStatusEnum::Retrying,
        JobStatusEnum::Terminated,
        JobStatusEnum::Depleted,
    ];

    /// Queued, submitted or running: the job may still change state.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            JobStatusEnum::Queued | JobStatusEnum::Submitted | JobStatusEnum::Running
        )
    }

    /// Any status a wait resolves on.
    pub fn is_terminal(&self) -> bool {
        !self.is_waiting()
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobStatusEnum::Completed => "COMPLETED",
            JobStatusEnum::Queued => "QUEUED",
            JobStatusEnum::Submitted => "SUBMITTED",
            JobStatusEnum::Running => "RUNNING",
            JobStatusEnum::Cancelled => "CANCELLED",
            JobStatusEnum::Error => "ERROR",
            JobStatusEnum::Cancelling => "CANCELLING",
            JobStatusEnum::Retrying => "RETRYING",
            JobStatusEnum::Terminated => "TERMINATED",
            JobStatusEnum::Depleted => "DEPLETED",
        }
    }
}

impl fmt::Display for JobStatusEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobStatusEnum {
    type Err = NexusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatusEnum::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| NexusError::InvalidStatus(format!("unknown status name: {s}")))
    }
}

/// A job status plus its message and optional detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobStatusEnum,
    pub message: String,
    pub error_detail: Option<String>,

    pub completed_time: Option<DateTime<Utc>>,
    pub queued_time: Option<DateTime<Utc>>,
    pub submitted_time: Option<DateTime<Utc>>,
    pub running_time: Option<DateTime<Utc>>,
    pub cancelled_time: Option<DateTime<Utc>>,
    pub error_time: Option<DateTime<Utc>>,

    pub queue_position: Option<u64>,
    pub cost: Option<f64>,
}

impl JobStatus {
    /// A bare status with a message and no optional fields.
    pub fn new(status: JobStatusEnum, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_detail: None,
            completed_time: None,
            queued_time: None,
            submitted_time: None,
            running_time: None,
            cancelled_time: None,
            error_time: None,
            queue_position: None,
            cost: None,
        }
    }

    /// Parse a status payload. `status` and `message` are required.
    pub fn from_json(value: &Value) -> NexusResult<Self> {
        let invalid = || NexusError::InvalidStatus(format!("invalid format for job status: {value}"));

        let obj = value.as_object().ok_or_else(invalid)?;
        let message = obj.get("message").ok_or_else(invalid)?;
        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?;
        let status = status.parse::<JobStatusEnum>().map_err(|_| invalid())?;

        let time = |key: &str| -> NexusResult<Option<DateTime<Utc>>> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => parse_timestamp(s).map(Some),
                Some(_) => Err(invalid()),
            }
        };

        Ok(Self {
            status,
            message: message.as_str().unwrap_or_default().to_string(),
            error_detail: obj
                .get("error_detail")
                .and_then(Value::as_str)
                .map(str::to_string),
            completed_time: time("completed_time")?,
            queued_time: time("queued_time")?,
            submitted_time: time("submitted_time")?,
            running_time: time("running_time")?,
            cancelled_time: time("cancelled_time")?,
            error_time: time("error_time")?,
            queue_position: obj.get("queue_position").and_then(Value::as_u64),
            cost: obj.get("cost").and_then(Value::as_f64).map(truncate_to_2dp),
        })
    }

    /// Parse a status payload delivered as text.
    pub fn from_str_payload(text: &str) -> NexusResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn is_waiting(&self) -> bool {
        self.status.is_waiting()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(pos) = self.queue_position {
            write!(f, " (queue position {pos})")?;
        }
        Ok(())
    }
}

/// Truncate toward zero at two decimal places.
pub fn truncate_to_2dp(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

/// Accept RFC 3339 timestamps, or naive ISO timestamps taken as UTC.
fn parse_timestamp(s: &str) -> NexusResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(NexusError::InvalidStatus(format!("invalid timestamp: {s}")))
}
