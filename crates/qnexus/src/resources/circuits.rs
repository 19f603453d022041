//! Circuits stored as JSON documents.

use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    create_attributes, project_relationship, update_attributes, with_context_project,
    with_list_defaults,
};
use crate::error::{NexusError, NexusResult};
use crate::filters::{Filter, QueryParams};
use crate::http::{NexusClient, Operation};
use crate::iterator::NexusIterator;
use crate::models::annotations::{Annotations, CreateAnnotations, UpdateAnnotations};
use crate::models::references::{CircuitRef, ProjectRef, resource_id};

pub const CIRCUITS_PATH: &str = "/api/circuits/v1beta";

#[derive(Debug, Clone)]
pub struct Circuits {
    client: NexusClient,
}

impl Circuits {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// List circuits, scoped to the active project when no project is given.
    pub fn get_all(&self, filter: Filter) -> NexusIterator<CircuitRef> {
        let filter = with_context_project(&self.client, with_list_defaults(filter));
        self.client
            .iterator("circuit", CIRCUITS_PATH, filter.to_query(), CircuitRef::from_page)
    }

    pub async fn get(&self, filter: Filter) -> NexusResult<CircuitRef> {
        self.get_all(filter).try_unique_match().await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> NexusResult<CircuitRef> {
        let doc = self
            .client
            .fetch_by_id(&format!("{CIRCUITS_PATH}/{id}"), &QueryParams::new(), "circuit")
            .await?;
        CircuitRef::from_entry(&doc, &doc["data"])
    }

    /// Upload a circuit document into `project` (or the active project).
    ///
    /// An empty annotation name falls back to the circuit's own `name`.
    #[instrument(skip_all)]
    pub async fn upload(
        &self,
        circuit: &Value,
        mut annotations: CreateAnnotations,
        project: Option<&ProjectRef>,
    ) -> NexusResult<CircuitRef> {
        let project = self.client.context().project_or_active(project)?;
        let mut attributes: Map<String, Value> = circuit
            .as_object()
            .cloned()
            .ok_or_else(|| NexusError::InvalidArgument("circuit must be a JSON object".into()))?;

        if annotations.name.is_empty() {
            annotations.name = circuit
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    NexusError::InvalidArgument("Circuit must have a name to be uploaded".into())
                })?
                .to_string();
        }
        attributes.extend(create_attributes(&self.client, annotations)?);

        let body = json!({
            "data": {
                "attributes": attributes,
                "relationships": project_relationship(&project),
                "type": "circuit",
            }
        });
        let doc = self
            .client
            .post_json(CIRCUITS_PATH, &body, StatusCode::CREATED, Operation::Create)
            .await?;

        let data = &doc["data"];
        let circuit = CircuitRef {
            id: resource_id(data)?,
            annotations: Annotations::from_attributes(&data["attributes"])?,
            project,
        };
        debug!(id = %circuit.id, "Uploaded circuit");
        Ok(circuit)
    }

    #[instrument(skip(self, circuit, changes), fields(id = %circuit.id))]
    pub async fn update(
        &self,
        circuit: &CircuitRef,
        changes: UpdateAnnotations,
    ) -> NexusResult<CircuitRef> {
        let body = json!({
            "data": {
                "attributes": update_attributes(&self.client, changes)?,
                "relationships": {},
                "type": "circuit",
            }
        });
        let doc = self
            .client
            .patch_json(&format!("{CIRCUITS_PATH}/{}", circuit.id), &body)
            .await?;
        let data = &doc["data"];
        Ok(CircuitRef {
            id: resource_id(data)?,
            annotations: Annotations::from_attributes(&data["attributes"])?,
            project: circuit.project.clone(),
        })
    }

    /// The stored circuit document, with null fields dropped.
    pub async fn content(&self, circuit: &CircuitRef) -> NexusResult<Value> {
        let doc = self
            .client
            .get_json(&format!("{CIRCUITS_PATH}/{}", circuit.id), &QueryParams::new())
            .await?;
        let mut attributes = doc["data"]["attributes"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        attributes.retain(|_, v| !v.is_null());
        Ok(Value::Object(attributes))
    }

    /// Estimated cost of running `circuit` for `n_shots` on `device_name`.
    ///
    /// `None` when the platform cannot price the circuit.
    #[instrument(skip(self, circuit), fields(id = %circuit.id))]
    pub async fn cost(
        &self,
        circuit: &CircuitRef,
        n_shots: u32,
        device_name: &str,
        syntax_checker: Option<&str>,
    ) -> NexusResult<Option<f64>> {
        let mut params: QueryParams = vec![
            ("n_shots".into(), n_shots.to_string()),
            ("device_name".into(), device_name.to_string()),
        ];
        if let Some(checker) = syntax_checker {
            params.push(("syntax_checker".into(), checker.to_string()));
        }
        let body = self
            .client
            .get_json(&format!("{CIRCUITS_PATH}/cost/{}", circuit.id), &params)
            .await?;
        Ok(body.as_f64())
    }
}
