//! Data models for Nexus resources.

pub mod annotations;
pub mod job_status;
pub mod references;
pub mod values;

pub use annotations::{
    Annotations, CreateAnnotations, PropertiesDict, PropertyValue, UpdateAnnotations,
};
pub use job_status::{JobStatus, JobStatusEnum};
pub use references::{
    CircuitRef, JobRef, JobType, ProjectRef, Ref, TeamRef, UserRef, WasmModuleRef,
};
pub use values::{
    Credential, CredentialIssuer, Device, Property, PropertyType, ProjectSummary, Quota,
    QuotaLimit, QuotaName,
};
