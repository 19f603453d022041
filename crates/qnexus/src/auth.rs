//! Token storage and login flows.
//!
//! Nexus authenticates with two cookies: a short-lived access token
//! (`myqos_id`) and a long-lived refresh token (`myqos_oat`). The
//! [`TokenStore`] keeps both in memory and, unless disabled, persists them
//! as plain files under `~/.qnx/auth`.
//!
//! Two login flows are supported:
//!
//! - **Device code** (browser): [`NexusClient::request_device_authorization`]
//!   followed by [`NexusClient::complete_device_login`].
//! - **Credentials**: [`NexusClient::login_with_credentials`], with an
//!   optional MFA challenge.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::NexusConfig;
use crate::error::{NexusError, NexusResult};
use crate::http::NexusClient;

/// OAuth client id used for device login.
pub const CLIENT_ID: &str = "scales";

/// Scope requested for device login.
pub const DEVICE_SCOPE: &str = "myqos";

/// URL to accept the terms and conditions when a login is blocked on them.
pub const TERMS_URL: &str = "https://nexus.quantinuum.com/auth/login";

/// Message attached to errors that need a fresh login.
pub const LOGIN_HINT: &str = "Not authorized, run `qnx login` to authenticate";

/// The two session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// File name under the token directory.
    pub fn file_name(self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }

    /// Cookie carrying this token.
    pub fn cookie_name(self) -> &'static str {
        match self {
            TokenKind::Access => "myqos_id",
            TokenKind::Refresh => "myqos_oat",
        }
    }
}

#[derive(Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

impl Tokens {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        }
    }

    fn get(&self, kind: TokenKind) -> Option<&String> {
        match kind {
            TokenKind::Access => self.access.as_ref(),
            TokenKind::Refresh => self.refresh.as_ref(),
        }
    }
}

/// Session tokens, in memory and optionally on disk.
pub struct TokenStore {
    dir: Option<PathBuf>,
    tokens: RwLock<Tokens>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenStore")
            .field("dir", &self.dir)
            .field("access", &redact(&tokens.access))
            .field("refresh", &redact(&tokens.refresh))
            .finish()
    }
}

impl TokenStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tokens: RwLock::new(Tokens::default()),
        }
    }

    /// A store persisted under `dir`, loading any tokens already there.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        let store = Self {
            dir: Some(dir.into()),
            tokens: RwLock::new(Tokens::default()),
        };
        store.reload();
        store
    }

    /// Build the store described by `config`.
    pub fn from_config(config: &NexusConfig) -> NexusResult<Self> {
        if config.store_tokens {
            Ok(Self::persistent(config.token_dir()?))
        } else {
            Ok(Self::in_memory())
        }
    }

    /// Token directory, for persistent stores.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn read(&self, kind: TokenKind) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens.get(kind).cloned()
    }

    /// Store a token, writing it to disk for persistent stores.
    pub fn write(&self, kind: TokenKind, token: &str) -> NexusResult<()> {
        if let Some(dir) = &self.dir {
            fs::create_dir_all(dir)?;
            let path = dir.join(kind.file_name());
            fs::write(&path, token)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(&path)?.permissions();
                perms.set_mode(0o600);
                fs::set_permissions(&path, perms)?;
            }
        }

        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        *tokens.slot(kind) = Some(token.to_string());
        Ok(())
    }

    /// Forget a token, deleting its file if present.
    pub fn remove(&self, kind: TokenKind) -> NexusResult<()> {
        if let Some(dir) = &self.dir {
            let path = dir.join(kind.file_name());
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }

        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        *tokens.slot(kind) = None;
        Ok(())
    }

    /// Forget both tokens.
    pub fn clear(&self) -> NexusResult<()> {
        self.remove(TokenKind::Access)?;
        self.remove(TokenKind::Refresh)
    }

    /// Re-read tokens from disk.
    pub fn reload(&self) {
        let Some(dir) = &self.dir else { return };
        let load = |kind: TokenKind| {
            fs::read_to_string(dir.join(kind.file_name()))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let access = load(TokenKind::Access);
        let refresh = load(TokenKind::Refresh);

        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = access;
        tokens.refresh = refresh;
    }

    /// A refresh token is present.
    pub fn is_logged_in(&self) -> bool {
        self.read(TokenKind::Refresh).is_some()
    }

    /// `Cookie` header value carrying every stored token.
    pub fn cookie_header(&self) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        let pairs: Vec<String> = [TokenKind::Access, TokenKind::Refresh]
            .into_iter()
            .filter_map(|kind| {
                tokens
                    .get(kind)
                    .map(|token| format!("{}={}", kind.cookie_name(), token))
            })
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}

/// Value of the cookie `name` in a response's `Set-Cookie` headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .filter_map(|h| h.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

// ---------------------------------------------------------------------------
// Login flows
// ---------------------------------------------------------------------------

/// Response from `POST /auth/device/device_authorization`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    /// Code the user confirms in the browser.
    pub user_code: String,
    /// Secret used to poll for tokens.
    pub device_code: String,
    /// Verification page with the user code pre-filled.
    pub verification_uri_complete: String,
    /// Lifetime of the device code, in seconds.
    pub expires_in: u64,
    /// Minimum polling interval, in seconds.
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Tokens returned by the device token endpoint.
#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    email: Option<String>,
}

/// Device token poll errors.
enum PollError {
    Pending,
    Error(NexusError),
}

/// Response from `POST /auth/login`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    redirect_uri: Option<String>,
}

impl NexusClient {
    /// Start a device-code login.
    #[instrument(skip(self))]
    pub async fn request_device_authorization(&self) -> NexusResult<DeviceAuthorization> {
        let response = self
            .http()
            .post(self.endpoint("/auth/device/device_authorization"))
            .form(&[("client_id", CLIENT_ID), ("scope", DEVICE_SCOPE)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(NexusError::Authentication(format!(
                "device authorization failed ({status}): {message}"
            )));
        }

        let auth: DeviceAuthorization = response.json().await?;
        debug!(expires_in = auth.expires_in, "Device authorization issued");
        Ok(auth)
    }

    /// Poll until the user approves `authorization` in the browser.
    ///
    /// Stores both tokens and returns the account email on success.
    #[instrument(skip_all)]
    pub async fn complete_device_login(
        &self,
        authorization: &DeviceAuthorization,
    ) -> NexusResult<Option<String>> {
        let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);
        let interval = Duration::from_secs(authorization.interval.max(1));

        while Instant::now() < deadline {
            match self.poll_device_token(&authorization.device_code).await {
                Ok(tokens) => {
                    self.tokens().write(TokenKind::Refresh, &tokens.refresh_token)?;
                    self.tokens().write(TokenKind::Access, &tokens.access_token)?;
                    info!("Device login successful");
                    return Ok(tokens.email);
                }
                Err(PollError::Pending) => {
                    tokio::time::sleep(interval).await;
                }
                Err(PollError::Error(e)) => return Err(e),
            }
        }

        Err(NexusError::Authentication(
            "Browser login Failed, code has expired.".into(),
        ))
    }

    async fn poll_device_token(&self, device_code: &str) -> Result<DeviceTokenResponse, PollError> {
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("device_code", device_code),
            ("client_id", CLIENT_ID),
        ];

        let response = self
            .http()
            .post(self.endpoint("/auth/device/token"))
            .form(&params)
            .send()
            .await
            .map_err(|e| PollError::Error(e.into()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response
                .json()
                .await
                .map_err(|e| PollError::Error(e.into()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PollError::Pending);
        }

        let body = response.text().await.unwrap_or_default();
        let pending = status == StatusCode::BAD_REQUEST
            && serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_uppercase))
                .is_some_and(|e| e == "AUTHORIZATION_PENDING");
        if pending {
            Err(PollError::Pending)
        } else {
            Err(PollError::Error(NexusError::Authentication(format!(
                "device token poll failed ({}): {body}",
                status.as_u16()
            ))))
        }
    }

    /// Log in with email and password.
    ///
    /// `mfa_code` is called only when the account requires a second factor.
    #[instrument(skip(self, password, mfa_code))]
    pub async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
        mfa_code: impl FnOnce() -> NexusResult<String>,
    ) -> NexusResult<()> {
        let response = self
            .http()
            .post(self.endpoint("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = ensure_login_success(response).await?;
        let mut headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let redirect_uri = serde_json::from_str::<LoginResponse>(&body)
            .ok()
            .and_then(|b| b.redirect_uri);

        match redirect_uri.as_deref() {
            Some(uri) if uri.starts_with("/auth/mfa_challenge/") => {
                debug!("MFA challenge requested");
                let code = mfa_code()?;
                let response = self
                    .http()
                    .post(self.endpoint("/auth/mfa_challenge"))
                    .json(&serde_json::json!({ "email": email, "code": code }))
                    .send()
                    .await?;
                headers = ensure_login_success(response).await?.headers().clone();
            }
            Some(uri) if uri.starts_with("/auth/terms_challenge") => {
                return Err(NexusError::Authentication(format!(
                    "Terms and conditions not accepted. Please log in via the browser at {TERMS_URL} to accept them."
                )));
            }
            _ => {}
        }

        let refresh = cookie_value(&headers, TokenKind::Refresh.cookie_name());
        let access = cookie_value(&headers, TokenKind::Access.cookie_name());
        let (Some(refresh), Some(access)) = (refresh, access) else {
            return Err(NexusError::Authentication(
                "Authorization cookies missing from response.".into(),
            ));
        };

        self.tokens().write(TokenKind::Refresh, &refresh)?;
        self.tokens().write(TokenKind::Access, &access)?;
        info!("Credential login successful");
        Ok(())
    }

    /// Forget both tokens.
    pub fn logout(&self) -> NexusResult<()> {
        self.tokens().clear()?;
        info!("Logged out");
        Ok(())
    }
}

async fn ensure_login_success(response: reqwest::Response) -> NexusResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    warn!(status, "Login rejected");
    Err(NexusError::Authentication(format!(
        "login failed ({status}): {message}"
    )))
}
