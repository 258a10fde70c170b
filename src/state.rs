/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - tokens / oauth state signer / provider registry / user directory / page renderer
 * - Clone 前提で持つ (内部は Arc)
 * - signing key は起動時に一度だけ読み、以後は read-only (lock 不要)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::services::auth::{SigningKey, TokenService};
use crate::services::oauth::{ProviderRegistry, StateSigner};
use crate::services::pages::{PageRenderer, PlainPages};
use crate::services::users::{InMemoryUserDirectory, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub oauth_state: Arc<StateSigner>,
    pub providers: Arc<ProviderRegistry>,
    pub users: Arc<dyn UserDirectory>,
    pub pages: Arc<dyn PageRenderer>,
    pub credential_cookie: Arc<str>,
    pub login_path: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("tokens", &self.tokens)
            .field("providers", &self.providers)
            .field("credential_cookie", &self.credential_cookie)
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the process-level services from configuration, using the
    /// in-memory directory and plain pages.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let users = Arc::new(InMemoryUserDirectory::new(config.bootstrap_admins.clone()));
        let pages = Arc::new(PlainPages::new(config.credential_cookie.as_str()));
        Self::with_collaborators(config, users, pages)
    }

    pub fn with_collaborators(
        config: &Config,
        users: Arc<dyn UserDirectory>,
        pages: Arc<dyn PageRenderer>,
    ) -> Result<Self, ConfigError> {
        let key = SigningKey::new(config.token_signing_key.clone());

        let tokens = TokenService::new(
            &key,
            &config.auth_issuer,
            &config.auth_audience,
            config.token_ttl_seconds,
        );
        let oauth_state =
            StateSigner::new(&key, &config.auth_audience, config.oauth_state_ttl_seconds);
        let providers = ProviderRegistry::new(
            config.providers.clone(),
            &config.public_base_url,
            Duration::from_secs(config.provider_timeout_seconds),
        )?;

        Ok(Self {
            tokens: Arc::new(tokens),
            oauth_state: Arc::new(oauth_state),
            providers: Arc::new(providers),
            users,
            pages,
            credential_cookie: Arc::from(config.credential_cookie.as_str()),
            login_path: Arc::from(config.login_path.as_str()),
        })
    }
}
