//! Projects and their property definitions.

use rand::seq::SliceRandom;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{create_attributes, project_relationship, update_attributes, with_list_defaults};
use crate::error::{NexusError, NexusResult};
use crate::filters::{Filter, QueryParams};
use crate::http::{NexusClient, Operation};
use crate::iterator::NexusIterator;
use crate::models::annotations::{CreateAnnotations, UpdateAnnotations};
use crate::models::job_status::JobStatusEnum;
use crate::models::references::ProjectRef;
use crate::models::values::{Property, PropertyType, ProjectSummary};

pub const PROJECTS_PATH: &str = "/api/projects/v1beta";
pub const PROPERTY_DEFINITIONS_PATH: &str = "/api/property_definitions/v1beta";

/// Colour-blind friendly palette for property badges.
const COLOURS: [&str; 7] = [
    "#e69f00", "#56b4e9", "#009e73", "#f0e442", "#0072b2", "#d55e00", "#cc79a7",
];

#[derive(Debug, Clone)]
pub struct Projects {
    client: NexusClient,
}

impl Projects {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// List projects. Archived projects are omitted unless the filter asks for them.
    pub fn get_all(&self, filter: Filter) -> NexusIterator<ProjectRef> {
        let mut filter = with_list_defaults(filter);
        if filter.archived.is_none() {
            filter.archived = Some(false);
        }
        self.client
            .iterator("project", PROJECTS_PATH, filter.to_query(), ProjectRef::from_page)
    }

    /// The single project matching `filter`.
    pub async fn get(&self, filter: Filter) -> NexusResult<ProjectRef> {
        self.get_all(filter).try_unique_match().await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> NexusResult<ProjectRef> {
        let doc = self
            .client
            .fetch_by_id(&format!("{PROJECTS_PATH}/{id}"), &QueryParams::new(), "project")
            .await?;
        ProjectRef::from_resource(&doc["data"])
    }

    #[instrument(skip(self, annotations), fields(name = %annotations.name))]
    pub async fn create(&self, annotations: CreateAnnotations) -> NexusResult<ProjectRef> {
        let body = json!({
            "data": {
                "attributes": create_attributes(&self.client, annotations)?,
                "relationships": {},
                "type": "project",
            }
        });
        let doc = self
            .client
            .post_json(PROJECTS_PATH, &body, StatusCode::CREATED, Operation::Create)
            .await?;
        let project = ProjectRef::from_resource(&doc["data"])?;
        debug!(id = %project.id, "Created project");
        Ok(project)
    }

    /// Fetch the project named `annotations.name`, creating it if absent.
    pub async fn get_or_create(&self, annotations: CreateAnnotations) -> NexusResult<ProjectRef> {
        match self.get(Filter::new().name_like(annotations.name.clone())).await {
            Err(NexusError::ZeroMatches(_)) => self.create(annotations).await,
            other => other,
        }
    }

    /// Change a project's annotations or archive state.
    #[instrument(skip(self, project, changes), fields(id = %project.id))]
    pub async fn update(
        &self,
        project: &ProjectRef,
        changes: UpdateAnnotations,
        archived: Option<bool>,
    ) -> NexusResult<ProjectRef> {
        let mut attributes = update_attributes(&self.client, changes)?;
        if let Some(archived) = archived {
            attributes.insert("archived".into(), Value::Bool(archived));
        }
        let body = json!({
            "data": {
                "attributes": attributes,
                "relationships": {},
                "type": "project",
            }
        });
        let doc = self
            .client
            .patch_json(&format!("{PROJECTS_PATH}/{}", project.id), &body)
            .await?;
        ProjectRef::from_resource(&doc["data"])
    }

    /// Define a new property on a project (the active one if `project` is `None`).
    #[instrument(skip(self, project, description))]
    pub async fn add_property(
        &self,
        name: &str,
        property_type: PropertyType,
        project: Option<&ProjectRef>,
        description: Option<&str>,
        required: bool,
    ) -> NexusResult<()> {
        let project = self.client.context().project_or_active(project)?;
        let color = COLOURS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(COLOURS[0]);

        let body = json!({
            "data": {
                "attributes": {
                    "name": name,
                    "description": description,
                    "property_type": property_type,
                    "required": required,
                    "color": color,
                },
                "relationships": project_relationship(&project),
                "type": "property",
            }
        });
        self.client
            .post_json(PROPERTY_DEFINITIONS_PATH, &body, StatusCode::CREATED, Operation::Create)
            .await?;
        Ok(())
    }

    /// Every property defined on a project (the active one if `project` is `None`).
    pub async fn get_properties(&self, project: Option<&ProjectRef>) -> NexusResult<Vec<Property>> {
        let project = self.client.context().project_or_active(project)?;
        let params = vec![("filter[project][id]".to_string(), project.id.to_string())];
        self.client
            .iterator("property", PROPERTY_DEFINITIONS_PATH, params, Property::from_page)
            .into_list()
            .await
    }

    /// Job counts in `project`, by status.
    pub async fn summarize(&self, project: &ProjectRef) -> NexusResult<ProjectSummary> {
        let jobs = self
            .client
            .jobs()
            .get_all(Filter::new().project(project.id))
            .into_list()
            .await?;

        let count = |status: JobStatusEnum| jobs.iter().filter(|j| j.last_status == status).count();
        Ok(ProjectSummary {
            project: project.annotations.display_name().to_string(),
            total_jobs: jobs.len(),
            pending_jobs: jobs.iter().filter(|j| j.last_status.is_waiting()).count(),
            cancelled_jobs: count(JobStatusEnum::Cancelled),
            errored_jobs: count(JobStatusEnum::Error),
            completed_jobs: count(JobStatusEnum::Completed),
        })
    }
}
