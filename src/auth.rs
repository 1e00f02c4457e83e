//! Credential handling.
//!
//! Authentication protocol internals are the identity provider's problem;
//! this module only obtains a bearer token from the realm token endpoint,
//! tracks its expiry, and extracts the principal id (`sub` claim) needed to
//! subscribe to the per-user push channel. Tokens are decoded without
//! signature verification; the backend, not this client, is the verifier.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::ClientError;

/// Refresh this long before the nominal expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub bearer: String,
    /// Principal id from the token's `sub` claim; empty when the claim was
    /// missing or the token was not decodable.
    pub principal: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    pub fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) < self.expires_at
    }
}

/// Source of validated bearer credentials. Every REST call and every
/// transport handshake goes through `fresh_token`.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fresh_token(&self) -> Result<Credentials, ClientError>;
}

// ── IdP-backed provider ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct BearerClaims {
    sub: Option<String>,
    exp: i64,
}

/// Fetches tokens from the identity provider's realm token endpoint using
/// the resource-owner password grant, caching them until near expiry.
pub struct IdpCredentialProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    username: String,
    password: String,
    cached: Mutex<Option<Credentials>>,
}

impl IdpCredentialProvider {
    pub fn new(config: &Config, username: String, password: String) -> Self {
        let token_url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            config.idp_url.trim_end_matches('/'),
            config.idp_realm
        );
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build IdP HTTP client"),
            token_url,
            client_id: config.idp_client_id.clone(),
            username,
            password,
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<Credentials, ClientError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired);
        }
        if !resp.status().is_success() {
            return Err(ClientError::Api(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let token: TokenResponse = resp.json().await?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        let principal = principal_from_token(&token.access_token);
        if principal.is_empty() {
            warn!("token carries no usable subject claim");
        }
        debug!(%expires_at, "obtained bearer token");

        Ok(Credentials {
            bearer: token.access_token,
            principal,
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialProvider for IdpCredentialProvider {
    async fn fresh_token(&self) -> Result<Credentials, ClientError> {
        let mut cached = self.cached.lock().await;
        if let Some(creds) = cached.as_ref() {
            if creds.is_fresh() {
                return Ok(creds.clone());
            }
        }
        let creds = self.request_token().await?;
        *cached = Some(creds.clone());
        Ok(creds)
    }
}

// ── Static provider ───────────────────────────────────────────

/// Wraps a pre-issued token (STUDIO_TOKEN, test fixtures). Expiry is taken
/// from the token itself when decodable, otherwise far-future.
pub struct StaticCredentialProvider {
    creds: Credentials,
}

impl StaticCredentialProvider {
    pub fn new(bearer: String) -> Self {
        let principal = principal_from_token(&bearer);
        let expires_at = expiry_from_token(&bearer)
            .unwrap_or_else(|| Utc::now() + Duration::days(365));
        Self {
            creds: Credentials {
                bearer,
                principal,
                expires_at,
            },
        }
    }

    /// Test constructor with an explicit principal.
    pub fn with_principal(bearer: String, principal: String) -> Self {
        Self {
            creds: Credentials {
                bearer,
                principal,
                expires_at: Utc::now() + Duration::days(365),
            },
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn fresh_token(&self) -> Result<Credentials, ClientError> {
        if !self.creds.is_fresh() {
            return Err(ClientError::AuthExpired);
        }
        Ok(self.creds.clone())
    }
}

// ── Claim extraction ──────────────────────────────────────────

fn decode_unverified(bearer: &str) -> Option<BearerClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    decode::<BearerClaims>(bearer, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

fn principal_from_token(bearer: &str) -> String {
    decode_unverified(bearer)
        .and_then(|c| c.sub)
        .unwrap_or_default()
}

fn expiry_from_token(bearer: &str) -> Option<DateTime<Utc>> {
    decode_unverified(bearer).and_then(|c| DateTime::from_timestamp(c.exp, 0))
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    // Unsigned-alg tokens are rejected by jsonwebtoken, so tests build a
    // structurally valid RS256 token; only the payload matters here.
    fn fake_token(sub: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","exp":{}}}"#, sub, exp).as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn principal_extracted_from_sub_claim() {
        let token = fake_token("user-42", 4102444800);
        assert_eq!(principal_from_token(&token), "user-42");
    }

    #[test]
    fn garbage_token_yields_empty_principal() {
        assert_eq!(principal_from_token("not-a-jwt"), "");
    }

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticCredentialProvider::with_principal("abc".into(), "user-1".into());
        let creds = provider.fresh_token().await.unwrap();
        assert_eq!(creds.bearer, "abc");
        assert_eq!(creds.principal, "user-1");
    }

    #[tokio::test]
    async fn static_provider_rejects_expired_token() {
        let token = fake_token("user-9", 1000000000); // long past
        let provider = StaticCredentialProvider::new(token);
        assert!(matches!(
            provider.fresh_token().await,
            Err(ClientError::AuthExpired)
        ));
    }
}
