//! Client SDK for Quantinuum Nexus
//!
//! This crate talks to the Nexus platform over its JSON:API REST endpoints
//! and the websocket job-status channel.
//!
//! # Overview
//!
//! - [`NexusClient`]: authenticated HTTP client with cookie sessions and
//!   transparent token refresh
//! - [`NexusIterator`]: lazy, cached iteration over paginated collections
//! - [`wait_for`]: wait for a job over the status channel, with reconnects
//!   and an overall timeout
//! - Per-resource wrappers: `client.projects()`, `client.circuits()`,
//!   `client.jobs()` and friends
//!
//! # Configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `NEXUS_DOMAIN` / `NEXUS_HOST` | `nexus.quantinuum.com` |
//! | `NEXUS_PROTOCOL` | `https` |
//! | `NEXUS_WEBSOCKETS_PROTOCOL` | `wss` |
//! | `NEXUS_STORE_TOKENS` | `true` (tokens in `~/.qnx/auth`) |
//!
//! # Example: Waiting for a Job
//!
//! ```ignore
//! use qnexus::{Filter, JobStatusEnum, NexusClient, WaitOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = NexusClient::from_env()?;
//!
//!     let project = client.projects().get(Filter::new().name_like("VQE")).await?;
//!     let _guard = client.context().using_project(project);
//!
//!     let mut jobs = client.jobs().get_all(Filter::new().job_status(JobStatusEnum::Running));
//!     while let Some(job) = jobs.next().await? {
//!         let status = client.jobs().wait_for(job.id, &WaitOptions::default()).await?;
//!         println!("{}: {}", job.annotations.display_name(), status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod filesystem;
pub mod filters;
pub mod http;
pub mod iterator;
pub mod models;
pub mod resources;
pub mod wait;
pub mod ws;

pub use auth::{DeviceAuthorization, TokenKind, TokenStore};
pub use config::NexusConfig;
pub use context::{ContextGuard, ContextHandle};
pub use error::{NexusError, NexusResult};
pub use filters::{Filter, QueryParams, Scope, SortFilter};
pub use http::{NexusClient, Operation};
pub use iterator::{NexusIterator, PageSource};
pub use models::{
    Annotations, CircuitRef, CreateAnnotations, Credential, CredentialIssuer, Device, JobRef,
    JobStatus, JobStatusEnum, JobType, ProjectRef, ProjectSummary, PropertiesDict, Property,
    PropertyType, PropertyValue, Quota, QuotaLimit, QuotaName, Ref, TeamRef, UpdateAnnotations,
    UserRef, WasmModuleRef,
};
pub use resources::RemoteRetryStrategy;
pub use wait::{
    ReconnectBackoff, StatusChannel, StatusSource, StatusSubscription, WaitOptions, poll_until,
    wait_for, wait_for_blocking,
};
pub use ws::WebSocketChannel;
