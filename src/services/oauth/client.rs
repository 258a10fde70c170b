//! Provider wire calls: authorization-code exchange and profile lookup.
//!
//! Detailed failure text stays in `ProviderError` for logging; the HTTP
//! layer collapses it before anything reaches the caller.

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::provider::{ExternalIdentity, ProviderConfig, ProviderError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubProfile {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

fn unreachable(e: reqwest::Error) -> ProviderError {
    ProviderError::Unreachable(e.to_string())
}

pub(super) async fn exchange_code(
    http: &Client,
    provider: &ProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<String, ProviderError> {
    let res = http
        .post(&provider.endpoints.token)
        .header(header::ACCEPT, "application/json")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(unreachable)?;

    let status = res.status();
    if status.is_server_error() {
        return Err(ProviderError::Unreachable(format!(
            "token endpoint returned {status}"
        )));
    }

    let body: TokenResponse = res.json().await.map_err(|e| {
        ProviderError::Exchange(format!("unreadable token response ({status}): {e}"))
    })?;

    // GitHub reports a bad code with 200 + `error`
    if let Some(error) = body.error {
        return Err(ProviderError::Exchange(format!(
            "{error}: {}",
            body.error_description.unwrap_or_default()
        )));
    }
    if !status.is_success() {
        return Err(ProviderError::Exchange(format!(
            "token endpoint returned {status}"
        )));
    }

    debug!(provider = provider.name(), "authorization code exchanged");

    body.access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Exchange("token response without access_token".to_string()))
}

async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    access_token: &str,
) -> Result<T, ProviderError> {
    let res = http
        .get(url)
        .bearer_auth(access_token)
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(unreachable)?;

    let status = res.status();
    if status.is_server_error() {
        return Err(ProviderError::Unreachable(format!("{url} returned {status}")));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Exchange(format!(
            "access token refused by {url}"
        )));
    }
    if !status.is_success() {
        return Err(ProviderError::Exchange(format!("{url} returned {status}")));
    }

    res.json()
        .await
        .map_err(|e| ProviderError::Exchange(format!("unreadable response from {url}: {e}")))
}

pub(super) async fn google_identity(
    http: &Client,
    provider: &ProviderConfig,
    access_token: &str,
) -> Result<ExternalIdentity, ProviderError> {
    let profile: GoogleProfile = get_json(http, &provider.endpoints.profile, access_token).await?;

    let email = match (profile.email, profile.email_verified) {
        (Some(email), Some(true)) if !email.is_empty() => email,
        _ => return Err(ProviderError::UnverifiedIdentity),
    };

    Ok(ExternalIdentity {
        provider: provider.name().to_string(),
        subject: profile.sub,
        email: email.to_ascii_lowercase(),
        display_name: profile.name,
    })
}

pub(super) async fn github_identity(
    http: &Client,
    provider: &ProviderConfig,
    access_token: &str,
) -> Result<ExternalIdentity, ProviderError> {
    let profile: GitHubProfile = get_json(http, &provider.endpoints.profile, access_token).await?;

    let Some(emails_url) = provider.endpoints.emails.as_deref() else {
        return Err(ProviderError::UnverifiedIdentity);
    };
    let emails: Vec<GitHubEmail> = get_json(http, emails_url, access_token).await?;

    // the profile `email` field is user-editable and unverified; only trust the emails API
    let email = emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
        .ok_or(ProviderError::UnverifiedIdentity)?;

    Ok(ExternalIdentity {
        provider: provider.name().to_string(),
        subject: profile.id.to_string(),
        email: email.to_ascii_lowercase(),
        display_name: profile.name.or(Some(profile.login)),
    })
}
