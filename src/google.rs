//! Service-account authentication for Google APIs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid service account JSON: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Supplies bearer tokens for outbound Google API calls.
pub enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        scopes: Vec<String>,
        /// Mailbox to impersonate (domain-wide delegation).
        subject: Option<String>,
        http: reqwest::Client,
        cached: Mutex<Option<CachedToken>>,
    },
    /// A fixed token, for local tooling and tests.
    Static(String),
}

impl TokenSource {
    pub fn service_account(key: ServiceAccountKey, scopes: &[&str], subject: Option<String>) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(TokenSource::ServiceAccount {
            key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            subject,
            http,
            cached: Mutex::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount {
                key,
                scopes,
                subject,
                http,
                cached,
            } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if token.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = fetch_token(http, key, scopes, subject.as_deref()).await?;
                let value = fresh.access_token.clone();
                *cached = Some(CachedToken {
                    value: fresh.access_token,
                    expires_at: Utc::now() + chrono::Duration::seconds(fresh.expires_in),
                });
                tracing::debug!("Fetched Google access token for {}", key.client_email);
                Ok(value)
            }
        }
    }
}

async fn fetch_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scopes: &[String],
    subject: Option<&str>,
) -> Result<TokenResponse, String> {
    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: &key.token_uri,
        iat: now,
        exp: now + 3600,
        sub: subject,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| format!("Invalid service account private key: {e}"))?;
    let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| format!("JWT encode failed: {e}"))?;

    let resp = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| format!("Token request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("Token endpoint returned {status}: {body}"));
    }

    resp.json::<TokenResponse>()
        .await
        .map_err(|e| format!("Invalid token response: {e}"))
}
