//! Saved third-party backend credentials.

use tracing::instrument;

use crate::error::NexusResult;
use crate::filters::QueryParams;
use crate::http::NexusClient;
use crate::models::values::{Credential, CredentialIssuer};

pub const CREDENTIALS_PATH: &str = "/api/v5/credentials";

#[derive(Debug, Clone)]
pub struct Credentials {
    client: NexusClient,
}

impl Credentials {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// Saved credentials, optionally only those for `issuer`.
    #[instrument(skip(self))]
    pub async fn get_all(&self, issuer: Option<CredentialIssuer>) -> NexusResult<Vec<Credential>> {
        let params: QueryParams = issuer
            .map(|i| vec![("issuer".to_string(), i.to_string())])
            .unwrap_or_default();
        let body = self.client.get_json(CREDENTIALS_PATH, &params).await?;
        Ok(serde_json::from_value(body)?)
    }
}
