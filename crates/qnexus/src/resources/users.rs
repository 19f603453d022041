//! Platform users.

use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::error::NexusResult;
use crate::filters::QueryParams;
use crate::http::NexusClient;
use crate::models::references::{UserRef, resource_id};

#[derive(Debug, Clone)]
pub struct Users {
    client: NexusClient,
}

impl Users {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// The logged-in user.
    #[instrument(skip(self))]
    pub async fn get_self(&self) -> NexusResult<UserRef> {
        let doc = self
            .client
            .get_json("/api/users/v1beta2/me", &QueryParams::new())
            .await?;
        user_from_document(&doc)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> NexusResult<UserRef> {
        let doc = self
            .client
            .fetch_by_id(&format!("/api/users/v1beta/{id}"), &QueryParams::new(), "user")
            .await?;
        user_from_document(&doc)
    }
}

fn user_from_document(doc: &Value) -> NexusResult<UserRef> {
    let data = &doc["data"];
    Ok(UserRef {
        id: resource_id(data)?,
        display_name: data["attributes"]["display_name"].as_str().map(str::to_string),
    })
}
