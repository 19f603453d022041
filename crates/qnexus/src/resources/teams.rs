//! Teams the user belongs to.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{NexusError, NexusResult};
use crate::filters::QueryParams;
use crate::http::{NexusClient, Operation};
use crate::models::references::TeamRef;

pub const TEAMS_PATH: &str = "/api/v5/user/teams";

#[derive(Deserialize)]
struct TeamWire {
    id: Uuid,
    team_name: String,
    #[serde(default)]
    description: Option<String>,
}

impl From<TeamWire> for TeamRef {
    fn from(t: TeamWire) -> Self {
        TeamRef {
            id: t.id,
            name: t.team_name,
            description: t.description,
        }
    }
}

fn decode_teams(body: Value) -> NexusResult<Vec<TeamRef>> {
    let teams: Vec<TeamWire> = serde_json::from_value(body)?;
    Ok(teams.into_iter().map(TeamRef::from).collect())
}

#[derive(Debug, Clone)]
pub struct Teams {
    client: NexusClient,
}

impl Teams {
    pub(crate) fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// Every team the user is a member of.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> NexusResult<Vec<TeamRef>> {
        decode_teams(self.client.get_json(TEAMS_PATH, &QueryParams::new()).await?)
    }

    /// The team called `name`.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> NexusResult<TeamRef> {
        let params = vec![("name".to_string(), name.to_string())];
        let body = self.client.fetch_by_id(TEAMS_PATH, &params, "team").await?;
        let mut teams = decode_teams(body)?;
        match teams.len() {
            0 => Err(NexusError::ZeroMatches("team".into())),
            1 => Ok(teams.remove(0)),
            count => Err(NexusError::NoUniqueMatch {
                resource: "team".into(),
                count: count as u64,
            }),
        }
    }

    #[instrument(skip(self, description))]
    pub async fn create(&self, name: &str, description: Option<&str>) -> NexusResult<TeamRef> {
        let body = json!({ "team_name": name, "description": description });
        let created = self
            .client
            .post_json(TEAMS_PATH, &body, StatusCode::CREATED, Operation::Create)
            .await?;
        Ok(serde_json::from_value::<TeamWire>(created)?.into())
    }
}
