//! Per-resource API wrappers.
//!
//! Each wrapper is obtained from a [`NexusClient`] accessor, e.g.
//! `client.projects()`, and holds a clone of the client. List operations
//! return a lazy [`NexusIterator`]; `get` operations either fetch by id or
//! require the filters to match exactly one resource.

pub mod circuits;
pub mod credentials;
pub mod devices;
pub mod jobs;
pub mod projects;
pub mod quotas;
pub mod teams;
pub mod users;
pub mod wasm_modules;

use std::sync::Arc;

use serde_json::{Map, Value, json};

pub use circuits::Circuits;
pub use credentials::Credentials;
pub use devices::Devices;
pub use jobs::{Jobs, RemoteRetryStrategy};
pub use projects::Projects;
pub use quotas::Quotas;
pub use teams::Teams;
pub use users::Users;
pub use wasm_modules::WasmModules;

use crate::error::NexusResult;
use crate::filters::{Filter, QueryParams, default_created_after};
use crate::http::NexusClient;
use crate::iterator::{NexusIterator, PageDecoder};
use crate::models::annotations::{CreateAnnotations, UpdateAnnotations};
use crate::models::references::ProjectRef;

impl NexusClient {
    pub fn projects(&self) -> Projects {
        Projects::new(self.clone())
    }

    pub fn circuits(&self) -> Circuits {
        Circuits::new(self.clone())
    }

    pub fn wasm_modules(&self) -> WasmModules {
        WasmModules::new(self.clone())
    }

    pub fn jobs(&self) -> Jobs {
        Jobs::new(self.clone())
    }

    pub fn teams(&self) -> Teams {
        Teams::new(self.clone())
    }

    pub fn users(&self) -> Users {
        Users::new(self.clone())
    }

    pub fn devices(&self) -> Devices {
        Devices::new(self.clone())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.clone())
    }

    pub fn quotas(&self) -> Quotas {
        Quotas::new(self.clone())
    }

    /// Iterator over a collection endpoint, paged through this client.
    pub fn iterator<T>(
        &self,
        resource_type: &str,
        path: &str,
        params: QueryParams,
        decode: PageDecoder<T>,
    ) -> NexusIterator<T> {
        NexusIterator::new(Arc::new(self.clone()), resource_type, path, params, decode)
    }
}

/// Apply the list defaults shared by the stored-resource endpoints.
///
/// Resources created before 2023 are hidden unless asked for explicitly.
pub(crate) fn with_list_defaults(mut filter: Filter) -> Filter {
    if filter.created_after.is_none() {
        filter.created_after = Some(default_created_after());
    }
    filter
}

/// Fill the project filter from the active context when unset.
pub(crate) fn with_context_project(client: &NexusClient, mut filter: Filter) -> Filter {
    if filter.project.is_none() {
        filter.project = client.context().active_project().map(|p| p.id);
    }
    filter
}

/// `relationships` object linking a new resource to its project.
pub(crate) fn project_relationship(project: &ProjectRef) -> Value {
    json!({
        "project": {"data": {"id": project.id.to_string(), "type": "project"}}
    })
}

/// Creation attributes with context properties merged underneath.
pub(crate) fn create_attributes(
    client: &NexusClient,
    annotations: CreateAnnotations,
) -> NexusResult<Map<String, Value>> {
    let annotations = annotations.merge_properties(&client.context().active_properties());
    into_object(serde_json::to_value(annotations)?)
}

/// Update attributes with context properties merged underneath.
pub(crate) fn update_attributes(
    client: &NexusClient,
    changes: UpdateAnnotations,
) -> NexusResult<Map<String, Value>> {
    let changes = changes.merge_properties(&client.context().active_properties());
    into_object(serde_json::to_value(changes)?)
}

fn into_object(value: Value) -> NexusResult<Map<String, Value>> {
    match value {
        Value::Object(mut map) => {
            map.retain(|_, v| !v.is_null());
            Ok(map)
        }
        other => Err(crate::error::NexusError::InvalidArgument(format!(
            "annotations did not serialize to an object: {other}"
        ))),
    }
}
