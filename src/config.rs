//! Process-wide configuration, read once at start-up and injected into the gateway.

use std::env;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::api_connection::endpoints::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV_VAR: &str = "OPENAI_MODEL";
pub const PROXY_IPPORT_ENV_VAR: &str = "HTTPS_PROXY_IPPORT";
pub const PROXY_LOGIN_ENV_VAR: &str = "HTTPS_PROXY_LOGIN";
pub const PROXY_PASSWORD_ENV_VAR: &str = "HTTPS_PROXY_PASSWORD";
pub const PROXY_AUTH_ENV_VAR: &str = "PROXY_AUTH";
pub const MAX_TOKENS_ENV_VAR: &str = "LLM_MAX_TOKENS";
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "LLM_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required configuration value {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `host:port` of the forward proxy.
    pub address: String,
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    /// Proxy URL, with login/password embedded when `with_auth` is set.
    pub fn url(&self, with_auth: bool) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            var: PROXY_IPPORT_ENV_VAR,
            reason,
        };
        let mut url = Url::parse(&format!("http://{}", self.address))
            .map_err(|e| invalid(e.to_string()))?;

        if with_auth {
            let credentials = self
                .credentials
                .as_ref()
                .ok_or(ConfigError::Missing(PROXY_LOGIN_ENV_VAR))?;
            url.set_username(&credentials.login)
                .map_err(|_| invalid("proxy URL cannot carry a login".to_string()))?;
            url.set_password(Some(&credentials.password))
                .map_err(|_| invalid("proxy URL cannot carry a password".to_string()))?;
        }
        Ok(url)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub proxy: Option<ProxyConfig>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Model settings shared by every stage of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub proxy_auth: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            proxy_auth: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub model: ModelSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = read(API_KEY_ENV_VAR).ok_or(ConfigError::Missing(API_KEY_ENV_VAR))?;
        let base_url = read(BASE_URL_ENV_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
            var: BASE_URL_ENV_VAR,
            reason: e.to_string(),
        })?;

        let proxy_auth = match read(PROXY_AUTH_ENV_VAR) {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: PROXY_AUTH_ENV_VAR,
                reason: format!("expected true/false, got '{}'", raw),
            })?,
        };

        let credentials = match (read(PROXY_LOGIN_ENV_VAR), read(PROXY_PASSWORD_ENV_VAR)) {
            (Some(login), Some(password)) => Some(ProxyCredentials { login, password }),
            _ => None,
        };

        let proxy = read(PROXY_IPPORT_ENV_VAR).map(|address| ProxyConfig {
            address,
            credentials,
        });

        if let Some(proxy) = &proxy {
            if proxy_auth && proxy.credentials.is_none() {
                let missing = if read(PROXY_LOGIN_ENV_VAR).is_none() {
                    PROXY_LOGIN_ENV_VAR
                } else {
                    PROXY_PASSWORD_ENV_VAR
                };
                return Err(ConfigError::Missing(missing));
            }
            proxy.url(proxy_auth)?;
        }

        let max_tokens = read(MAX_TOKENS_ENV_VAR)
            .map(|raw| {
                raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                    var: MAX_TOKENS_ENV_VAR,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let request_timeout = read(REQUEST_TIMEOUT_ENV_VAR)
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: REQUEST_TIMEOUT_ENV_VAR,
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            gateway: GatewayConfig {
                api_key,
                base_url,
                proxy,
                request_timeout: Duration::from_secs(request_timeout),
            },
            model: ModelSettings {
                model: read(MODEL_ENV_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_tokens,
                proxy_auth,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
