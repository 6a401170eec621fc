//! Credential handling: turning one opaque credential string into request headers.
//!
//! The service accepts either a Firebase ID token (`Authorization: Bearer`) or
//! an API key (`X-API-Key`). Callers hand over a single string, so the default
//! strategy sniffs its shape. The strategy is a trait object so an explicit
//! mode can bypass the heuristic without touching the request path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying API keys.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Tokens at or below this length are treated as API keys.
const BEARER_MIN_LEN: usize = 100;

/// How a credential is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    BearerToken,
    ApiKey,
}

impl CredentialKind {
    /// Classify a credential by shape: a `.`-separated string longer than
    /// 100 characters is a bearer token (JWT), anything else is an API key.
    pub fn classify(credential: &str) -> Self {
        if credential.contains('.') && credential.len() > BEARER_MIN_LEN {
            CredentialKind::BearerToken
        } else {
            CredentialKind::ApiKey
        }
    }
}

/// Authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<(&'static str, String)>,
}

impl HeaderSet {
    fn single(name: &'static str, value: String) -> Self {
        Self {
            headers: vec![(name, value)],
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.headers.iter().map(|(n, v)| (*n, v.as_str()))
    }

    /// Attach every header to an outbound request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.iter()
            .fold(request, |req, (name, value)| req.header(name, value))
    }
}

/// Strategy mapping a credential to the headers sent with each request.
pub trait AuthStrategy: Send + Sync {
    /// Short name for logging ("auto", "bearer", "api_key").
    fn name(&self) -> &str;

    /// Build the header set. Never fails: an unusable credential is the
    /// server's to reject.
    fn headers(&self, credential: &str) -> HeaderSet;
}

/// Picks bearer or API key per credential using [`CredentialKind::classify`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicAuth;

impl AuthStrategy for HeuristicAuth {
    fn name(&self) -> &str {
        "auto"
    }

    fn headers(&self, credential: &str) -> HeaderSet {
        match CredentialKind::classify(credential) {
            CredentialKind::BearerToken => BearerAuth.headers(credential),
            CredentialKind::ApiKey => ApiKeyAuth.headers(credential),
        }
    }
}

/// Always sends `Authorization: Bearer <credential>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BearerAuth;

impl AuthStrategy for BearerAuth {
    fn name(&self) -> &str {
        "bearer"
    }

    fn headers(&self, credential: &str) -> HeaderSet {
        HeaderSet::single("Authorization", format!("Bearer {credential}"))
    }
}

/// Always sends `X-API-Key: <credential>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiKeyAuth;

impl AuthStrategy for ApiKeyAuth {
    fn name(&self) -> &str {
        "api_key"
    }

    fn headers(&self, credential: &str) -> HeaderSet {
        HeaderSet::single(API_KEY_HEADER, credential.to_string())
    }
}

/// Configurable authentication mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Detect from the credential's shape
    #[default]
    Auto,
    /// Force `Authorization: Bearer`
    Bearer,
    /// Force `X-API-Key`
    ApiKey,
}

impl AuthMode {
    /// The strategy implementing this mode.
    pub fn strategy(self) -> Arc<dyn AuthStrategy> {
        match self {
            AuthMode::Auto => Arc::new(HeuristicAuth),
            AuthMode::Bearer => Arc::new(BearerAuth),
            AuthMode::ApiKey => Arc::new(ApiKeyAuth),
        }
    }

    /// Parse a mode from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "bearer" | "token" => Some(Self::Bearer),
            "api_key" | "api-key" | "apikey" => Some(Self::ApiKey),
            _ => None,
        }
    }
}

/// Resolve headers for a credential using the default heuristic.
pub fn resolve(credential: &str) -> HeaderSet {
    HeuristicAuth.headers(credential)
}
