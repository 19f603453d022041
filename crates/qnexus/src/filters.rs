//! Query parameter builders for list endpoints.
//!
//! A [`Filter`] only emits the parameters that were explicitly set, each
//! under its JSON:API alias (`filter[name]`, `page[size]`, ...). List values
//! repeat the key.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::annotations::{PropertiesDict, PropertyValue};
use crate::models::job_status::JobStatusEnum;
use crate::models::references::JobType;

/// Query string as an ordered list of key/value pairs.
pub type QueryParams = Vec<(String, String)>;

/// Sort orders accepted by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortFilter {
    #[serde(rename = "created")]
    CreatedAsc,
    #[serde(rename = "-created")]
    CreatedDesc,
    #[serde(rename = "modified")]
    ModifiedAsc,
    #[serde(rename = "-modified")]
    ModifiedDesc,
    #[serde(rename = "name")]
    NameAsc,
    #[serde(rename = "-name")]
    NameDesc,
}

impl SortFilter {
    /// Server-side sort key.
    pub fn as_query(self) -> &'static str {
        match self {
            SortFilter::CreatedAsc => "timestamps.created",
            SortFilter::CreatedDesc => "-timestamps.created",
            SortFilter::ModifiedAsc => "timestamps.modified",
            SortFilter::ModifiedDesc => "-timestamps.modified",
            SortFilter::NameAsc => "name",
            SortFilter::NameDesc => "-name",
        }
    }

    /// Parse the short CLI form (`created`, `-name`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(SortFilter::CreatedAsc),
            "-created" => Some(SortFilter::CreatedDesc),
            "modified" => Some(SortFilter::ModifiedAsc),
            "-modified" => Some(SortFilter::ModifiedDesc),
            "name" => Some(SortFilter::NameAsc),
            "-name" => Some(SortFilter::NameDesc),
            _ => None,
        }
    }
}

/// Permission scope for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User,
    OrgAdmin,
    GlobalAdmin,
    Highest,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User => write!(f, "user"),
            Scope::OrgAdmin => write!(f, "org_admin"),
            Scope::GlobalAdmin => write!(f, "global_admin"),
            Scope::Highest => write!(f, "highest"),
        }
    }
}

/// Default lower bound on `created` used by most list endpoints.
pub fn default_created_after() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Filters shared by the list endpoints.
///
/// Each resource only reads the fields its endpoint understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub name_like: Option<String>,
    pub creator_email: Vec<String>,
    pub project: Option<Uuid>,
    pub properties: PropertiesDict,
    pub created_before: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub sort: Vec<SortFilter>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub archived: Option<bool>,
    pub job_status: Vec<JobStatusEnum>,
    pub job_type: Vec<JobType>,
    pub scope: Option<Scope>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuzzy name match.
    pub fn name_like(mut self, name: impl Into<String>) -> Self {
        self.name_like = Some(name.into());
        self
    }

    pub fn creator_email(mut self, email: impl Into<String>) -> Self {
        self.creator_email.push(email.into());
        self
    }

    pub fn project(mut self, id: Uuid) -> Self {
        self.project = Some(id);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: PropertiesDict) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn modified_before(mut self, at: DateTime<Utc>) -> Self {
        self.modified_before = Some(at);
        self
    }

    pub fn modified_after(mut self, at: DateTime<Utc>) -> Self {
        self.modified_after = Some(at);
        self
    }

    pub fn sort(mut self, sort: SortFilter) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn page_number(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Include (`true`) or omit (`false`) archived resources.
    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    pub fn job_status(mut self, status: JobStatusEnum) -> Self {
        self.job_status.push(status);
        self
    }

    pub fn job_type(mut self, job_type: JobType) -> Self {
        self.job_type.push(job_type);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Render as query pairs.
    pub fn to_query(&self) -> QueryParams {
        let mut q = QueryParams::new();

        if let Some(name) = &self.name_like {
            q.push(("filter[name]".into(), name.clone()));
        }
        for email in &self.creator_email {
            q.push(("filter[creator][email]".into(), email.clone()));
        }
        if let Some(project) = &self.project {
            q.push(("filter[project][id]".into(), project.to_string()));
        }
        for (key, value) in &self.properties {
            q.push(("filter[properties]".into(), format_property(key, value)));
        }

        let times = [
            ("filter[timestamps][created][before]", &self.created_before),
            ("filter[timestamps][created][after]", &self.created_after),
            ("filter[timestamps][modified][before]", &self.modified_before),
            ("filter[timestamps][modified][after]", &self.modified_after),
        ];
        for (key, at) in times {
            if let Some(at) = at {
                q.push((key.into(), at.to_rfc3339_opts(SecondsFormat::Secs, true)));
            }
        }

        for sort in &self.sort {
            q.push(("sort".into(), sort.as_query().into()));
        }
        if let Some(page) = self.page_number {
            q.push(("page[number]".into(), page.to_string()));
        }
        if let Some(size) = self.page_size {
            q.push(("page[size]".into(), size.to_string()));
        }
        if let Some(archived) = self.archived {
            q.push(("filter[archived]".into(), archived.to_string()));
        }
        for status in &self.job_status {
            q.push(("filter[status][status]".into(), status.to_string()));
        }
        for job_type in &self.job_type {
            q.push(("filter[job_type]".into(), job_type.to_string()));
        }
        if let Some(scope) = self.scope {
            q.push(("scope".into(), scope.to_string()));
        }

        q
    }
}

/// Render a property filter term: strings quoted, booleans lowercase.
pub fn format_property(key: &str, value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => format!("({key},\"{s}\")"),
        PropertyValue::Bool(b) => format!("({key},{b})"),
        PropertyValue::Int(i) => format!("({key},{i})"),
        PropertyValue::Float(x) => format!("({key},{x})"),
    }
}
