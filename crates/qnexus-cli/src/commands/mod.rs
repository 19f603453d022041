//! CLI command implementations.

pub mod auth;
pub mod common;
pub mod devices;
pub mod jobs;
pub mod projects;
pub mod quotas;
pub mod version;
