use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::client;
use crate::config::ConfigError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("code exchange rejected: {0}")]
    Exchange(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("provider did not return a verified email")]
    UnverifiedIdentity,
}

/// Supported identity providers. The provider name in the route path picks
/// a registry entry; the entry's kind picks the wire dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    GitHub,
}

impl ProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google" => Some(Self::Google),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }

    pub fn scopes(&self) -> &'static str {
        match self {
            Self::Google => "openid email profile",
            Self::GitHub => "read:user user:email",
        }
    }

    pub fn default_endpoints(&self) -> ProviderEndpoints {
        match self {
            Self::Google => ProviderEndpoints {
                authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token: "https://oauth2.googleapis.com/token".to_string(),
                profile: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                emails: None,
            },
            Self::GitHub => ProviderEndpoints {
                authorize: "https://github.com/login/oauth/authorize".to_string(),
                token: "https://github.com/login/oauth/access_token".to_string(),
                profile: "https://api.github.com/user".to_string(),
                emails: Some("https://api.github.com/user/emails".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
    pub emails: Option<String>,
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, client_id: String, client_secret: String) -> Self {
        Self {
            kind,
            client_id,
            client_secret,
            endpoints: kind.default_endpoints(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Identity asserted by an external provider after a successful exchange.
///
/// Not stored here; the user directory maps it to an internal subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Configured providers keyed by path name.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
    public_base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(
        providers: Vec<ProviderConfig>,
        public_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                warn!(error = %e, "failed to build provider HTTP client");
                ConfigError::Invalid("PROVIDER_TIMEOUT_SECONDS".to_string())
            })?;

        let mut map = HashMap::new();
        for provider in providers {
            for (key, endpoint) in [
                ("authorize", &provider.endpoints.authorize),
                ("token", &provider.endpoints.token),
                ("profile", &provider.endpoints.profile),
            ] {
                Url::parse(endpoint).map_err(|_| {
                    ConfigError::Invalid(format!(
                        "{}_{}_URL",
                        provider.name().to_ascii_uppercase(),
                        key.to_ascii_uppercase()
                    ))
                })?;
            }
            info!(provider = provider.name(), "registered identity provider");
            map.insert(provider.name().to_string(), provider);
        }

        Ok(Self {
            providers: map,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn get(&self, name: &str) -> Result<&ProviderConfig, ProviderError> {
        self.providers
            .get(name)
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Where the provider sends the browser back to.
    pub fn callback_url(&self, provider: &ProviderConfig) -> String {
        format!(
            "{}/api/auth/{}/redirect",
            self.public_base_url,
            provider.name()
        )
    }

    pub fn build_redirect_url(&self, name: &str, state: &str) -> Result<Url, ProviderError> {
        let provider = self.get(name)?;
        let redirect_uri = self.callback_url(provider);

        let mut params = vec![
            ("client_id", provider.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", provider.kind.scopes()),
            ("state", state),
        ];
        if provider.kind == ProviderKind::Google {
            params.push(("prompt", "select_account"));
        }

        Url::parse_with_params(&provider.endpoints.authorize, &params)
            .map_err(|e| ProviderError::Exchange(format!("bad authorize endpoint: {e}")))
    }

    /// Exchange `code` for a provider access token, then fetch the verified
    /// profile behind it.
    pub async fn handle_callback(
        &self,
        name: &str,
        code: &str,
    ) -> Result<ExternalIdentity, ProviderError> {
        let provider = self.get(name)?;
        if code.trim().is_empty() {
            return Err(ProviderError::Exchange("empty authorization code".to_string()));
        }

        let redirect_uri = self.callback_url(provider);
        let access_token = client::exchange_code(&self.http, provider, code, &redirect_uri).await?;

        match provider.kind {
            ProviderKind::Google => client::google_identity(&self.http, provider, &access_token).await,
            ProviderKind::GitHub => client::github_identity(&self.http, provider, &access_token).await,
        }
    }
}
