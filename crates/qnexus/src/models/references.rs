//! Typed references to remote resources.
//!
//! A reference holds enough to identify and describe a resource without
//! downloading its contents. References round-trip through JSON with a
//! `type` tag so they can be stored locally and reloaded (see
//! [`crate::filesystem`]).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{NexusError, NexusResult};
use crate::models::annotations::Annotations;
use crate::models::job_status::{JobStatus, JobStatusEnum};

/// Kind of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Execute,
    Compile,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Execute => write!(f, "execute"),
            JobType::Compile => write!(f, "compile"),
        }
    }
}

/// A team the user belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub display_name: Option<String>,
}

/// A project: the container for circuits, jobs and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: Uuid,
    pub annotations: Annotations,
    pub contents_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
}

/// A circuit stored in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitRef {
    pub id: Uuid,
    pub annotations: Annotations,
    pub project: ProjectRef,
}

/// A WASM module stored in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasmModuleRef {
    pub id: Uuid,
    pub annotations: Annotations,
    pub project: ProjectRef,
}

/// A compile or execute job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: Uuid,
    pub annotations: Annotations,
    pub job_type: JobType,
    pub last_status: JobStatusEnum,
    pub last_message: String,
    pub project: ProjectRef,
}

/// Any reference, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Ref {
    TeamRef(TeamRef),
    UserRef(UserRef),
    ProjectRef(ProjectRef),
    CircuitRef(CircuitRef),
    WasmModuleRef(WasmModuleRef),
    CompileJobRef(JobRef),
    ExecuteJobRef(JobRef),
}

impl Ref {
    /// Tag names understood by [`Ref`].
    pub const TYPES: [&'static str; 7] = [
        "TeamRef",
        "UserRef",
        "ProjectRef",
        "CircuitRef",
        "WasmModuleRef",
        "CompileJobRef",
        "ExecuteJobRef",
    ];

    pub fn id(&self) -> Uuid {
        match self {
            Ref::TeamRef(r) => r.id,
            Ref::UserRef(r) => r.id,
            Ref::ProjectRef(r) => r.id,
            Ref::CircuitRef(r) => r.id,
            Ref::WasmModuleRef(r) => r.id,
            Ref::CompileJobRef(r) | Ref::ExecuteJobRef(r) => r.id,
        }
    }

    /// The `type` tag this reference serializes with.
    pub fn type_name(&self) -> &'static str {
        match self {
            Ref::TeamRef(_) => "TeamRef",
            Ref::UserRef(_) => "UserRef",
            Ref::ProjectRef(_) => "ProjectRef",
            Ref::CircuitRef(_) => "CircuitRef",
            Ref::WasmModuleRef(_) => "WasmModuleRef",
            Ref::CompileJobRef(_) => "CompileJobRef",
            Ref::ExecuteJobRef(_) => "ExecuteJobRef",
        }
    }

    /// Decode a tagged reference, rejecting unknown tags.
    pub fn from_json(value: Value) -> NexusResult<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| NexusError::UnknownReference("missing type field".into()))?;
        if !Self::TYPES.contains(&tag) {
            return Err(NexusError::UnknownReference(tag.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl From<ProjectRef> for Ref {
    fn from(r: ProjectRef) -> Self {
        Ref::ProjectRef(r)
    }
}

impl From<CircuitRef> for Ref {
    fn from(r: CircuitRef) -> Self {
        Ref::CircuitRef(r)
    }
}

impl From<WasmModuleRef> for Ref {
    fn from(r: WasmModuleRef) -> Self {
        Ref::WasmModuleRef(r)
    }
}

impl From<JobRef> for Ref {
    fn from(r: JobRef) -> Self {
        match r.job_type {
            JobType::Compile => Ref::CompileJobRef(r),
            JobType::Execute => Ref::ExecuteJobRef(r),
        }
    }
}

impl From<TeamRef> for Ref {
    fn from(r: TeamRef) -> Self {
        Ref::TeamRef(r)
    }
}

impl From<UserRef> for Ref {
    fn from(r: UserRef) -> Self {
        Ref::UserRef(r)
    }
}

// ---------------------------------------------------------------------------
// JSON:API decoding
// ---------------------------------------------------------------------------

static NULL: Value = Value::Null;

fn malformed(what: &str) -> NexusError {
    NexusError::ResourceFetchFailed {
        status: 200,
        message: format!("malformed response: {what}"),
    }
}

pub(crate) fn resource_id(entry: &Value) -> NexusResult<Uuid> {
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("resource without id"))?;
    Uuid::parse_str(id).map_err(|_| malformed("resource id is not a UUID"))
}

/// `data` entries of a page or document, as a slice.
pub(crate) fn data_entries(doc: &Value) -> &[Value] {
    match doc.get("data") {
        Some(Value::Array(items)) => items,
        Some(single @ Value::Object(_)) => std::slice::from_ref(single),
        _ => &[],
    }
}

/// Id of a to-one relationship, e.g. `relationships.project.data.id`.
pub(crate) fn relationship_id(entry: &Value, name: &str) -> NexusResult<Uuid> {
    let id = entry
        .pointer(&format!("/relationships/{name}/data/id"))
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(&format!("missing {name} relationship")))?;
    Uuid::parse_str(id).map_err(|_| malformed("relationship id is not a UUID"))
}

/// Look up a side-loaded resource in the document's `included` array.
pub(crate) fn find_included<'a>(doc: &'a Value, id: Uuid) -> Option<&'a Value> {
    let id = id.to_string();
    doc.get("included")?
        .as_array()?
        .iter()
        .find(|item| item.get("id").and_then(Value::as_str) == Some(id.as_str()))
}

impl ProjectRef {
    /// Decode a `project` resource object.
    pub(crate) fn from_resource(entry: &Value) -> NexusResult<Self> {
        let attributes = entry.get("attributes").unwrap_or(&NULL);
        Ok(Self {
            id: resource_id(entry)?,
            annotations: Annotations::from_attributes(attributes)?,
            contents_modified: attributes
                .get("contents_modified")
                .filter(|v| !v.is_null())
                .cloned()
                .map(serde_json::from_value::<DateTime<Utc>>)
                .transpose()?,
            archived: attributes
                .get("archived")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Decode the project that `entry` belongs to, resolved via `included`.
    pub(crate) fn from_relationship(doc: &Value, entry: &Value) -> NexusResult<Self> {
        let project_id = relationship_id(entry, "project")?;
        let project = find_included(doc, project_id)
            .ok_or_else(|| malformed("project not present in included"))?;
        Self::from_resource(project)
    }

    /// Decode every project on a page.
    pub(crate) fn from_page(doc: &Value) -> NexusResult<Vec<Self>> {
        data_entries(doc).iter().map(Self::from_resource).collect()
    }
}

impl CircuitRef {
    pub(crate) fn from_entry(doc: &Value, entry: &Value) -> NexusResult<Self> {
        Ok(Self {
            id: resource_id(entry)?,
            annotations: Annotations::from_attributes(entry.get("attributes").unwrap_or(&NULL))?,
            project: ProjectRef::from_relationship(doc, entry)?,
        })
    }

    pub(crate) fn from_page(doc: &Value) -> NexusResult<Vec<Self>> {
        data_entries(doc)
            .iter()
            .map(|entry| Self::from_entry(doc, entry))
            .collect()
    }
}

impl WasmModuleRef {
    pub(crate) fn from_entry(doc: &Value, entry: &Value) -> NexusResult<Self> {
        Ok(Self {
            id: resource_id(entry)?,
            annotations: Annotations::from_attributes(entry.get("attributes").unwrap_or(&NULL))?,
            project: ProjectRef::from_relationship(doc, entry)?,
        })
    }

    pub(crate) fn from_page(doc: &Value) -> NexusResult<Vec<Self>> {
        data_entries(doc)
            .iter()
            .map(|entry| Self::from_entry(doc, entry))
            .collect()
    }
}

impl JobRef {
    pub(crate) fn from_entry(doc: &Value, entry: &Value) -> NexusResult<Self> {
        let attributes = entry.get("attributes").unwrap_or(&NULL);
        let job_type: JobType = serde_json::from_value(
            attributes
                .get("job_type")
                .cloned()
                .ok_or_else(|| malformed("job without job_type"))?,
        )?;
        let status = JobStatus::from_json(attributes.get("status").unwrap_or(&NULL))?;

        Ok(Self {
            id: resource_id(entry)?,
            annotations: Annotations::from_attributes(attributes)?,
            job_type,
            last_status: status.status,
            last_message: status.message,
            project: ProjectRef::from_relationship(doc, entry)?,
        })
    }

    pub(crate) fn from_page(doc: &Value) -> NexusResult<Vec<Self>> {
        data_entries(doc)
            .iter()
            .map(|entry| Self::from_entry(doc, entry))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_page_resolves_included_project() {
        let project = Uuid::new_v4();
        let job = Uuid::new_v4();
        let doc = json!({
            "data": [job_resource(job, project, "bell run", "RUNNING")],
            "included": [project_resource(project, "demo")]
        });

        let jobs = JobRef::from_page(&doc).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job);
        assert_eq!(jobs[0].job_type, JobType::Execute);
        assert_eq!(jobs[0].last_status, JobStatusEnum::Running);
        assert_eq!(jobs[0].project.id, project);
        assert_eq!(jobs[0].project.annotations.name.as_deref(), Some("demo"));
    }

    #[test]
    fn test_missing_included_project_is_an_error() {
        let doc = json!({
            "data": [job_resource(Uuid::new_v4(), Uuid::new_v4(), "x", "QUEUED")],
            "included": []
        });
        assert!(JobRef::from_page(&doc).is_err());
    }

    #[test]
    fn test_ref_tagging() {
        let project = ProjectRef::from_resource(&project_resource(Uuid::new_v4(), "p")).unwrap();
        let value = serde_json::to_value(Ref::from(project.clone())).unwrap();
        assert_eq!(value["type"], "ProjectRef");
        assert_eq!(Ref::from_json(value).unwrap(), Ref::ProjectRef(project));
    }

    #[test]
    fn test_unknown_ref_type() {
        let err = Ref::from_json(json!({"type": "HUGRRef", "id": Uuid::new_v4()})).unwrap_err();
        assert!(matches!(err, NexusError::UnknownReference(t) if t == "HUGRRef"));
    }

    #[test]
    fn test_single_document_entries() {
        let doc = json!({"data": project_resource(Uuid::new_v4(), "solo")});
        assert_eq!(ProjectRef::from_page(&doc).unwrap().len(), 1);
        assert!(data_entries(&json!({"data": []})).is_empty());
    }
}
