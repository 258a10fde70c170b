use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RedirectResponse {
    /// Provider authorization URL, `state` included.
    pub url: String,
}

/// `?next=` on the login page and on `GET /api/auth/{provider}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Query the provider appends to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Request body for `POST /api/auth/{provider}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    /// Always "Bearer"
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: u64,
    /// Unix seconds; the credential is valid through this second.
    pub expires_at: i64,
    /// Local path to continue at once the credential is stored.
    pub next: String,
}
