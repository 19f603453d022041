//! Client configuration.
//!
//! Values are read from `NEXUS_*` environment variables and can be
//! overridden with the `with_*` builders:
//!
//! | Variable                     | Default                |
//! |------------------------------|------------------------|
//! | `NEXUS_PROTOCOL`             | `https`                |
//! | `NEXUS_WEBSOCKETS_PROTOCOL`  | `wss`                  |
//! | `NEXUS_DOMAIN` / `NEXUS_HOST`| `nexus.quantinuum.com` |
//! | `NEXUS_PORT`                 | `443`                  |
//! | `NEXUS_VERIFY_TLS`           | `true`                 |
//! | `NEXUS_STORE_TOKENS`         | `true`                 |
//! | `NEXUS_TOKEN_PATH`           | `.qnx/auth`            |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, NexusResult};

/// Default Nexus domain.
pub const DEFAULT_DOMAIN: &str = "nexus.quantinuum.com";

/// Token directory, relative to the home directory.
pub const DEFAULT_TOKEN_PATH: &str = ".qnx/auth";

/// Connection settings for a Nexus deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexusConfig {
    /// HTTP scheme (`https` or `http`).
    pub protocol: String,

    /// Websocket scheme (`wss` or `ws`).
    pub websockets_protocol: String,

    /// Host name of the deployment.
    pub domain: String,

    /// HTTP port.
    pub port: u16,

    /// Verify TLS certificates.
    pub verify_tls: bool,

    /// Persist tokens under the home directory instead of keeping them in memory.
    pub store_tokens: bool,

    /// Token directory, relative to the home directory unless absolute.
    pub token_path: PathBuf,

    /// Overall request timeout.
    pub request_timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Explicit HTTP base URL, bypassing protocol/domain/port.
    #[serde(default)]
    pub url_override: Option<String>,

    /// Explicit websocket base URL, bypassing websockets_protocol/domain.
    #[serde(default)]
    pub websockets_url_override: Option<String>,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            protocol: "https".into(),
            websockets_protocol: "wss".into(),
            domain: DEFAULT_DOMAIN.into(),
            port: 443,
            verify_tls: true,
            store_tokens: true,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            url_override: None,
            websockets_url_override: None,
        }
    }
}

impl NexusConfig {
    /// Build a configuration from `NEXUS_*` environment variables.
    pub fn from_env() -> NexusResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NexusResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("NEXUS_PROTOCOL") {
            config.protocol = v;
        }
        if let Some(v) = lookup("NEXUS_WEBSOCKETS_PROTOCOL") {
            config.websockets_protocol = v;
        }
        if let Some(v) = lookup("NEXUS_DOMAIN").or_else(|| lookup("NEXUS_HOST")) {
            config.domain = v;
        }
        if let Some(v) = lookup("NEXUS_PORT") {
            config.port = v
                .parse()
                .map_err(|_| NexusError::Configuration(format!("invalid NEXUS_PORT: {v}")))?;
        }
        if let Some(v) = lookup("NEXUS_VERIFY_TLS") {
            config.verify_tls = parse_bool("NEXUS_VERIFY_TLS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_STORE_TOKENS") {
            config.store_tokens = parse_bool("NEXUS_STORE_TOKENS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_TOKEN_PATH") {
            config.token_path = PathBuf::from(v);
        }

        Ok(config)
    }

    /// Point both HTTP and websocket traffic at explicit base URLs.
    pub fn with_urls(mut self, url: impl Into<String>, websockets_url: impl Into<String>) -> Self {
        self.url_override = Some(url.into().trim_end_matches('/').to_string());
        self.websockets_url_override = Some(websockets_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the host name.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Choose between persisted and in-memory tokens.
    pub fn with_store_tokens(mut self, store: bool) -> Self {
        self.store_tokens = store;
        self
    }

    /// Set the token directory.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Set the overall request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// HTTP base URL, e.g. `https://nexus.quantinuum.com:443`.
    pub fn url(&self) -> String {
        match &self.url_override {
            Some(url) => url.clone(),
            None => format!("{}://{}:{}", self.protocol, self.domain, self.port),
        }
    }

    /// Websocket base URL, e.g. `wss://nexus.quantinuum.com`.
    pub fn websockets_url(&self) -> String {
        match &self.websockets_url_override {
            Some(url) => url.clone(),
            None => format!("{}://{}", self.websockets_protocol, self.domain),
        }
    }

    /// Absolute token directory.
    pub fn token_dir(&self) -> NexusResult<PathBuf> {
        if self.token_path.is_absolute() {
            return Ok(self.token_path.clone());
        }
        let home = dirs::home_dir().ok_or_else(|| {
            NexusError::Configuration("could not determine home directory".into())
        })?;
        Ok(home.join(&self.token_path))
    }
}

fn parse_bool(key: &str, value: &str) -> NexusResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(NexusError::Configuration(format!(
            "invalid {key}: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NexusConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.url(), "https://nexus.quantinuum.com:443");
        assert_eq!(config.websockets_url(), "wss://nexus.quantinuum.com");
        assert!(config.store_tokens);
        assert_eq!(config.token_path, PathBuf::from(".qnx/auth"));
    }

    #[test]
    fn test_host_alias() {
        let config = NexusConfig::from_lookup(lookup(&[("NEXUS_HOST", "staging.nexus")])).unwrap();
        assert_eq!(config.domain, "staging.nexus");

        let config = NexusConfig::from_lookup(lookup(&[
            ("NEXUS_HOST", "staging.nexus"),
            ("NEXUS_DOMAIN", "qa.nexus"),
        ]))
        .unwrap();
        assert_eq!(config.domain, "qa.nexus");
    }

    #[test]
    fn test_env_overrides() {
        let config = NexusConfig::from_lookup(lookup(&[
            ("NEXUS_PROTOCOL", "http"),
            ("NEXUS_WEBSOCKETS_PROTOCOL", "ws"),
            ("NEXUS_DOMAIN", "localhost"),
            ("NEXUS_PORT", "8080"),
            ("NEXUS_STORE_TOKENS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.url(), "http://localhost:8080");
        assert_eq!(config.websockets_url(), "ws://localhost");
        assert!(!config.store_tokens);
    }

    #[test]
    fn test_invalid_port() {
        let err = NexusConfig::from_lookup(lookup(&[("NEXUS_PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, NexusError::Configuration(_)));
    }

    #[test]
    fn test_url_overrides() {
        let config = NexusConfig::default().with_urls("http://127.0.0.1:9000/", "ws://127.0.0.1:9001");
        assert_eq!(config.url(), "http://127.0.0.1:9000");
        assert_eq!(config.websockets_url(), "ws://127.0.0.1:9001");
    }

    #[test]
    fn test_absolute_token_dir() {
        let config = NexusConfig::default().with_token_path("/tmp/qnx-tokens");
        assert_eq!(config.token_dir().unwrap(), PathBuf::from("/tmp/qnx-tokens"));
    }
}
