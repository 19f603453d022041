//! WASM modules used by hybrid programs.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::instrument;
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
use crate::models::references::{ProjectRef, WasmModuleRef, resource_id};

pub const WASM_PATH: &str = "/api/wasm/v1beta";

#[derive(Debug, Clone)]
pub struct WasmModules {
    client: NexusClient,
}

impl WasmModules {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    pub fn get_all(&self, filter: Filter) -> NexusIterator<WasmModuleRef> {
        let filter = with_context_project(&self.client, with_list_defaults(filter));
        self.client
            .iterator("wasm module", WASM_PATH, filter.to_query(), WasmModuleRef::from_page)
    }

    pub async fn get(&self, filter: Filter) -> NexusResult<WasmModuleRef> {
        self.get_all(filter).try_unique_match().await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> NexusResult<WasmModuleRef> {
        let doc = self
            .client
            .fetch_by_id(&format!("{WASM_PATH}/{id}"), &QueryParams::new(), "wasm module")
            .await?;
        WasmModuleRef::from_entry(&doc, &doc["data"])
    }

    /// Upload compiled WASM bytecode into `project` (or the active project).
    #[instrument(skip_all, fields(name = %annotations.name, size = bytecode.len()))]
    pub async fn upload(
        &self,
        bytecode: &[u8],
        annotations: CreateAnnotations,
        project: Option<&ProjectRef>,
    ) -> NexusResult<WasmModuleRef> {
        if annotations.name.is_empty() {
            return Err(NexusError::InvalidArgument(
                "WasmModule must have a name to be uploaded".into(),
            ));
        }
        let project = self.client.context().project_or_active(project)?;

        let mut attributes = create_attributes(&self.client, annotations)?;
        attributes.insert("contents".into(), Value::String(BASE64.encode(bytecode)));

        let body = json!({
            "data": {
                "attributes": attributes,
                "relationships": project_relationship(&project),
                "type": "wasm",
            }
        });
        let doc = self
            .client
            .post_json(WASM_PATH, &body, StatusCode::CREATED, Operation::Create)
            .await?;

        let data = &doc["data"];
        Ok(WasmModuleRef {
            id: resource_id(data)?,
            annotations: Annotations::from_attributes(&data["attributes"])?,
            project,
        })
    }

    #[instrument(skip(self, module, changes), fields(id = %module.id))]
    pub async fn update(
        &self,
        module: &WasmModuleRef,
        changes: UpdateAnnotations,
    ) -> NexusResult<WasmModuleRef> {
        let body = json!({
            "data": {
                "attributes": update_attributes(&self.client, changes)?,
                "relationships": {},
                "type": "wasm_module",
            }
        });
        let doc = self
            .client
            .patch_json(&format!("{WASM_PATH}/{}", module.id), &body)
            .await?;
        let data = &doc["data"];
        Ok(WasmModuleRef {
            id: resource_id(data)?,
            annotations: Annotations::from_attributes(&data["attributes"])?,
            project: module.project.clone(),
        })
    }

    /// Download the module's bytecode.
    pub async fn content(&self, module: &WasmModuleRef) -> NexusResult<Vec<u8>> {
        let doc = self
            .client
            .get_json(&format!("{WASM_PATH}/{}", module.id), &QueryParams::new())
            .await?;
        let encoded = doc["data"]["attributes"]["contents"]
            .as_str()
            .ok_or_else(|| NexusError::ResourceFetchFailed {
                status: 200,
                message: "wasm module without contents".into(),
            })?;
        BASE64
            .decode(encoded)
            .map_err(|e| NexusError::ResourceFetchFailed {
                status: 200,
                message: format!("wasm contents are not valid base64: {e}"),
            })
    }
}
