//! Usage quotas.

use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::{NexusError, NexusResult};
use crate::filters::QueryParams;
use crate::http::NexusClient;
use crate::models::values::{Quota, QuotaName};

pub const QUOTAS_PATH: &str = "/api/quotas/v1beta";

#[derive(Debug, Clone)]
pub struct Quotas {
    client: NexusClient,
}

fn user_quota_params() -> QueryParams {
    vec![
        ("entity_type".into(), "user".into()),
        ("include_usage".into(), "true".into()),
    ]
}

impl Quotas {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// Every quota for the user, with current usage.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> NexusResult<Vec<Quota>> {
        let body = self.client.get_json(QUOTAS_PATH, &user_quota_params()).await?;
        Quota::from_entries(body)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, name: QuotaName) -> NexusResult<Quota> {
        let mut params = user_quota_params();
        params.push(("name".into(), name.as_str().into()));
        let body = self.client.get_json(QUOTAS_PATH, &params).await?;
        Quota::from_entries(body)?
            .into_iter()
            .next()
            .ok_or_else(|| NexusError::ZeroMatches("quota".into()))
    }

    /// Whether the user has quota left for `name`.
    #[instrument(skip(self))]
    pub async fn check_quota(&self, name: QuotaName) -> NexusResult<bool> {
        let params = vec![("name".to_string(), name.as_str().to_string())];
        let status = self
            .client
            .get_status(&format!("{QUOTAS_PATH}/guard"), &params)
            .await?;
        debug!(%status, "Quota guard answered");
        Ok(status == StatusCode::OK)
    }
}
