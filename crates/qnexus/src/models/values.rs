//! Plain value types returned by the non-JSON:API endpoints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::NexusResult;
use crate::models::annotations::Annotations;
use crate::models::references::{data_entries, resource_id};

/// Issuer of third-party backend credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialIssuer {
    Quantinuum,
    Qiskit,
    Braket,
}

impl fmt::Display for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialIssuer::Quantinuum => write!(f, "Quantinuum"),
            CredentialIssuer::Qiskit => write!(f, "Qiskit"),
            CredentialIssuer::Braket => write!(f, "Braket"),
        }
    }
}

/// A saved credential for a backend provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub backend_issuer: CredentialIssuer,
    pub is_default_for_issuer: bool,
    pub submitted_time: DateTime<Utc>,
    pub id: String,
}

/// A device available to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub backend_name: String,
    pub device_name: Option<String>,
    pub nexus_hosted: bool,
}

#[derive(Deserialize)]
struct DeviceGroupWire {
    #[serde(default)]
    backend_info_list: Vec<BackendInfoWire>,
    #[serde(default)]
    is_local: bool,
}

#[derive(Deserialize)]
struct BackendInfoWire {
    name: String,
    #[serde(default)]
    device_name: Option<String>,
}

impl Device {
    /// Flatten the grouped `available_devices` response.
    pub(crate) fn from_groups(body: Value) -> NexusResult<Vec<Self>> {
        let groups: Vec<DeviceGroupWire> = serde_json::from_value(body)?;
        Ok(groups
            .into_iter()
            .flat_map(|group| {
                let hosted = group.is_local;
                group.backend_info_list.into_iter().map(move |info| Device {
                    backend_name: info.name,
                    device_name: info.device_name,
                    nexus_hosted: hosted,
                })
            })
            .collect())
    }
}

/// Message shown when a quota has no limit configured.
pub const NO_QUOTA_SET: &str = "No quota set for user";

/// Named quota kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaName {
    Compilation,
    Simulation,
    Jupyterhub,
    DatabaseUsage,
}

impl QuotaName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaName::Compilation => "compilation",
            QuotaName::Simulation => "simulation",
            QuotaName::Jupyterhub => "jupyterhub",
            QuotaName::DatabaseUsage => "database_usage",
        }
    }

    /// Key holding the measured amount in `usage` and `details`.
    pub fn usage_key(&self) -> &'static str {
        match self {
            QuotaName::DatabaseUsage => "megabytes_used",
            _ => "total_time_taken",
        }
    }
}

/// Limit of a quota: a number, or unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuotaLimit {
    Limit(f64),
    Unset(String),
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaLimit::Limit(x) => write!(f, "{x}"),
            QuotaLimit::Unset(s) => write!(f, "{s}"),
        }
    }
}

/// A quota and the user's usage of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub name: QuotaName,
    pub description: String,
    pub usage: f64,
    pub quota: QuotaLimit,
}

#[derive(Deserialize)]
struct QuotaEntryWire {
    quota: QuotaWire,
}

#[derive(Deserialize)]
struct QuotaWire {
    name: QuotaName,
    #[serde(default)]
    details: serde_json::Map<String, Value>,
    #[serde(default)]
    usage: serde_json::Map<String, Value>,
}

impl Quota {
    pub(crate) fn from_entries(body: Value) -> NexusResult<Vec<Self>> {
        let entries: Vec<QuotaEntryWire> = serde_json::from_value(body)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let q = entry.quota;
                let key = q.name.usage_key();
                let limit = q
                    .details
                    .get(key)
                    .and_then(Value::as_f64)
                    .filter(|limit| *limit != 0.0)
                    .map_or_else(|| QuotaLimit::Unset(NO_QUOTA_SET.into()), QuotaLimit::Limit);
                Quota {
                    name: q.name,
                    description: q
                        .details
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    usage: q.usage.get(key).and_then(Value::as_f64).unwrap_or(0.0),
                    quota: limit,
                }
            })
            .collect())
    }
}

/// Value type of a project property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => write!(f, "bool"),
            PropertyType::Int => write!(f, "int"),
            PropertyType::Float => write!(f, "float"),
            PropertyType::String => write!(f, "string"),
        }
    }
}

/// A property definition attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub annotations: Annotations,
    pub property_type: PropertyType,
    pub required: bool,
    pub color: String,
}

impl Property {
    pub(crate) fn from_page(doc: &Value) -> NexusResult<Vec<Self>> {
        data_entries(doc)
            .iter()
            .map(|entry| {
                let attributes = &entry["attributes"];
                Ok(Property {
                    id: resource_id(entry)?,
                    annotations: Annotations::from_attributes(attributes)?,
                    property_type: serde_json::from_value(attributes["property_type"].clone())?,
                    required: attributes["required"].as_bool().unwrap_or(false),
                    color: attributes["color"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect()
    }
}

/// Job counts for a project, by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: String,
    pub total_jobs: usize,
    pub pending_jobs: usize,
    pub cancelled_jobs: usize,
    pub errored_jobs: usize,
    pub completed_jobs: usize,
}
