//! Authenticated HTTP client for the Nexus API.
//!
//! Every request carries the stored session cookies. When the server rejects
//! the access token with `401`, the client refreshes it once with the refresh
//! token and replays the request.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::{LOGIN_HINT, TokenKind, TokenStore, cookie_value};
use crate::config::NexusConfig;
use crate::context::ContextHandle;
use crate::error::{NexusError, NexusResult};
use crate::filters::QueryParams;
use crate::iterator::PageSource;
use crate::models::job_status::JobStatus;
use crate::wait::{StatusChannel, StatusSource};
use crate::ws::WebSocketChannel;

/// What a request was trying to do; selects the error variant on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn error(self, status: StatusCode, message: String) -> NexusError {
        let status = status.as_u16();
        match self {
            Operation::Fetch => NexusError::ResourceFetchFailed { status, message },
            Operation::Create => NexusError::ResourceCreateFailed { status, message },
            Operation::Update => NexusError::ResourceUpdateFailed { status, message },
            Operation::Delete => NexusError::ResourceDeleteFailed { status, message },
        }
    }
}

struct ClientInner {
    http: Client,
    base_url: String,
    websockets_url: String,
    tokens: TokenStore,
    context: ContextHandle,
}

/// Nexus API client.
///
/// Cheap to clone; clones share the HTTP connection pool, the token store and
/// the active context.
#[derive(Clone)]
pub struct NexusClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for NexusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusClient")
            .field("base_url", &self.inner.base_url)
            .field("websockets_url", &self.inner.websockets_url)
            .field("tokens", &self.inner.tokens)
            .finish()
    }
}

impl NexusClient {
    /// Create a client configured from `NEXUS_*` environment variables.
    pub fn from_env() -> NexusResult<Self> {
        Self::with_config(NexusConfig::from_env()?)
    }

    /// Create a client for `config`, with tokens stored as it describes.
    pub fn with_config(config: NexusConfig) -> NexusResult<Self> {
        let tokens = TokenStore::from_config(&config)?;
        Self::with_config_and_tokens(config, tokens)
    }

    /// Create a client with an explicit token store.
    pub fn with_config_and_tokens(config: NexusConfig, tokens: TokenStore) -> NexusResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.url().trim_end_matches('/').to_string(),
                websockets_url: config.websockets_url().trim_end_matches('/').to_string(),
                tokens,
                context: ContextHandle::new(),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn websockets_url(&self) -> &str {
        &self.inner.websockets_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Active project and properties shared by this client's clones.
    pub fn context(&self) -> &ContextHandle {
        &self.inner.context
    }

    /// Streaming status channel for this deployment.
    pub fn status_channel(&self) -> WebSocketChannel {
        WebSocketChannel::new(self.inner.websockets_url.clone(), self.clone())
    }

    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> NexusResult<Response> {
        let mut request = self.inner.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(cookie) = self.inner.tokens.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if let Some(sunset) = response.headers().get("sunset") {
            warn!(
                url,
                sunset = sunset.to_str().unwrap_or_default(),
                "This endpoint is deprecated; upgrade the client before the sunset date"
            );
        }
        Ok(response)
    }

    /// Send a request; on 401, refresh the access token once and retry.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> NexusResult<Response> {
        let url = self.endpoint(path);
        debug!(%method, %url, "Sending request");

        let response = self.send_once(method.clone(), &url, query, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Access token rejected, refreshing");
        self.refresh_access_token().await?;
        self.send_once(method, &url, query, body).await
    }

    /// Exchange the refresh token for a new access token.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> NexusResult<()> {
        let refresh = self
            .inner
            .tokens
            .read(TokenKind::Refresh)
            .ok_or_else(|| NexusError::Authentication(LOGIN_HINT.into()))?;

        let response = self
            .inner
            .http
            .post(self.endpoint("/auth/tokens/refresh"))
            .header(COOKIE, format!("{}={}", TokenKind::Refresh.cookie_name(), refresh))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(NexusError::Authentication(LOGIN_HINT.into()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NexusError::Authentication(format!(
                "token refresh failed ({}): {message}",
                status.as_u16()
            )));
        }

        let access = cookie_value(response.headers(), TokenKind::Access.cookie_name())
            .ok_or_else(|| {
                NexusError::Authentication("refresh response did not set an access token".into())
            })?;
        self.inner.tokens.write(TokenKind::Access, &access)?;
        debug!("Access token refreshed");
        Ok(())
    }

    /// Decode a response body, or map a failure status to `op`'s error.
    async fn handle_response(response: Response, op: Operation) -> NexusResult<Value> {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => Err(NexusError::Authentication(LOGIN_HINT.into())),
            _ => Err(op.error(status, message)),
        }
    }

    /// Reject anything but `expected` with `op`'s error.
    async fn expect_status(
        response: Response,
        expected: StatusCode,
        op: Operation,
    ) -> NexusResult<Value> {
        let status = response.status();
        if status == expected {
            return Self::handle_response(response, op).await;
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(NexusError::Authentication(LOGIN_HINT.into()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(op.error(status, message))
    }

    // -----------------------------------------------------------------------
    // JSON helpers
    // -----------------------------------------------------------------------

    /// `GET` a JSON document.
    pub async fn get_json(&self, path: &str, query: &QueryParams) -> NexusResult<Value> {
        let response = self.send(Method::GET, path, query, None).await?;
        Self::handle_response(response, Operation::Fetch).await
    }

    /// `GET` a single resource; 404 becomes [`NexusError::ZeroMatches`].
    pub async fn fetch_by_id(
        &self,
        path: &str,
        query: &QueryParams,
        resource_type: &str,
    ) -> NexusResult<Value> {
        let response = self.send(Method::GET, path, query, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NexusError::ZeroMatches(resource_type.to_string()));
        }
        Self::handle_response(response, Operation::Fetch).await
    }

    /// `POST` a JSON body, requiring `expected` as the response status.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
        expected: StatusCode,
        op: Operation,
    ) -> NexusResult<Value> {
        let response = self.send(Method::POST, path, &QueryParams::new(), Some(body)).await?;
        Self::expect_status(response, expected, op).await
    }

    /// `PATCH` a JSON body, requiring `200 OK`.
    pub async fn patch_json(&self, path: &str, body: &Value) -> NexusResult<Value> {
        let response = self.send(Method::PATCH, path, &QueryParams::new(), Some(body)).await?;
        Self::expect_status(response, StatusCode::OK, Operation::Update).await
    }

    /// `DELETE` a resource, accepting any success status.
    pub async fn delete(&self, path: &str) -> NexusResult<()> {
        let response = self.send(Method::DELETE, path, &QueryParams::new(), None).await?;
        Self::handle_response(response, Operation::Delete).await?;
        Ok(())
    }

    /// Raw status code of a `GET`, without interpreting it.
    pub async fn get_status(&self, path: &str, query: &QueryParams) -> NexusResult<StatusCode> {
        Ok(self.send(Method::GET, path, query, None).await?.status())
    }
}

#[async_trait]
impl PageSource for NexusClient {
    async fn fetch_page(&self, path: &str, params: &QueryParams) -> NexusResult<Value> {
        self.get_json(path, params).await
    }

    async fn fetch_count(&self, path: &str, params: &QueryParams) -> NexusResult<u64> {
        let path = format!("{}/meta/count", path.trim_end_matches('/'));
        let body = self.get_json(&path, params).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| NexusError::ResourceFetchFailed {
                status: 200,
                message: "count response without a count".into(),
            })
    }
}

#[async_trait]
impl StatusSource for NexusClient {
    async fn job_status(&self, job_id: Uuid) -> NexusResult<JobStatus> {
        let body = self
            .get_json(
                &format!("/api/jobs/v1beta/{job_id}/attributes/status"),
                &QueryParams::new(),
            )
            .await?;
        JobStatus::from_json(&body)
    }
}

/// Lets a client stand in wherever a status channel is expected.
#[async_trait]
impl StatusChannel for NexusClient {
    async fn connect(
        &self,
        job_id: Uuid,
    ) -> NexusResult<Box<dyn crate::wait::StatusSubscription>> {
        self.status_channel().connect(job_id).await
    }
}
