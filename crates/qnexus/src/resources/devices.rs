//! Devices available to the user.

use tracing::instrument;

use crate::error::NexusResult;
use crate::filters::QueryParams;
use crate::http::NexusClient;
use crate::models::values::Device;

pub const DEVICES_PATH: &str = "/api/v5/available_devices";

#[derive(Debug, Clone)]
pub struct Devices {
    client: NexusClient,
}

impl Devices {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> NexusResult<Vec<Device>> {
        let body = self.client.get_json(DEVICES_PATH, &QueryParams::new()).await?;
        Device::from_groups(body)
    }
}
