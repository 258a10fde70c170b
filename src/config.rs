/*
 * Responsibility
 * - 環境変数の読み込み (signing key, OAuth provider credentials, cookie/login 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::services::oauth::{ProviderConfig, ProviderKind};

/// HS256 secrets shorter than this are rejected at startup.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Upper bound for token and state lifetimes (one year).
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub public_base_url: String,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub token_signing_key: Vec<u8>,
    pub token_ttl_seconds: u64,
    pub oauth_state_ttl_seconds: u64,

    pub providers: Vec<ProviderConfig>,
    pub provider_timeout_seconds: u64,
    pub request_timeout_seconds: u64,

    pub credential_cookie: String,
    pub login_path: String,
    pub bootstrap_admins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };
        let seconds = |key: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ConfigError::Invalid(key.to_string())),
            }
        };

        let port: u16 = match lookup("PORT") {
            None => 3000,
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT".to_string()))?,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT".to_string()))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|_| ConfigError::Invalid("PUBLIC_BASE_URL".to_string()))?;

        let auth_issuer = required("AUTH_ISSUER")?;
        let auth_audience = required("AUTH_AUDIENCE")?;

        let token_signing_key = required("TOKEN_SIGNING_KEY")?.into_bytes();
        if token_signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(ConfigError::Invalid("TOKEN_SIGNING_KEY".to_string()));
        }

        let ttl = |key: &str, default: u64| -> Result<u64, ConfigError> {
            let value = seconds(key, default)?;
            if value > MAX_TTL_SECONDS {
                return Err(ConfigError::Invalid(key.to_string()));
            }
            Ok(value)
        };

        let token_ttl_seconds = ttl("TOKEN_TTL_SECONDS", 86_400)?; // 24h
        let oauth_state_ttl_seconds = ttl("OAUTH_STATE_TTL_SECONDS", 600)?;
        let provider_timeout_seconds = seconds("PROVIDER_TIMEOUT_SECONDS", 10)?;
        let request_timeout_seconds = seconds("REQUEST_TIMEOUT_SECONDS", 30)?;

        let providers = split_list(lookup("OAUTH_PROVIDERS"))
            .into_iter()
            .map(|name| provider_from_lookup(&name, &lookup))
            .collect::<Result<Vec<_>, _>>()?;

        let credential_cookie = lookup("CREDENTIAL_COOKIE").unwrap_or_else(|| "token".to_string());
        let login_path = lookup("LOGIN_PATH").unwrap_or_else(|| "/login".to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::Invalid("LOGIN_PATH".to_string()));
        }

        let bootstrap_admins = split_list(lookup("BOOTSTRAP_ADMINS"))
            .into_iter()
            .map(|email| email.to_ascii_lowercase())
            .collect();

        Ok(Self {
            addr,
            app_env,
            public_base_url,
            auth_issuer,
            auth_audience,
            token_signing_key,
            token_ttl_seconds,
            oauth_state_ttl_seconds,
            providers,
            provider_timeout_seconds,
            request_timeout_seconds,
            credential_cookie,
            login_path,
            bootstrap_admins,
        })
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn provider_from_lookup<F>(name: &str, lookup: &F) -> Result<ProviderConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = name.to_ascii_lowercase();
    let kind = ProviderKind::from_name(&name)
        .ok_or_else(|| ConfigError::Invalid(format!("OAUTH_PROVIDERS ({name})")))?;
    let prefix = name.to_ascii_uppercase();
    let key = |suffix: &str| format!("{prefix}_{suffix}");

    let client_id = lookup(&key("CLIENT_ID"))
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key("CLIENT_ID")))?;
    let client_secret = lookup(&key("CLIENT_SECRET"))
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key("CLIENT_SECRET")))?;

    let mut provider = ProviderConfig::new(kind, client_id, client_secret);
    if let Some(v) = lookup(&key("AUTHORIZE_URL")) {
        provider.endpoints.authorize = v;
    }
    if let Some(v) = lookup(&key("TOKEN_URL")) {
        provider.endpoints.token = v;
    }
    if let Some(v) = lookup(&key("PROFILE_URL")) {
        provider.endpoints.profile = v;
    }
    if let Some(v) = lookup(&key("EMAILS_URL")) {
        provider.endpoints.emails = Some(v);
    }

    Ok(provider)
}
