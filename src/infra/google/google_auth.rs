// =============================================================================
// GOOGLE OAUTH2 ACCESS TOKENS
// =============================================================================
//
// Two ways to get a bearer token for the Drive and Sheets APIs:
//
// 1. **Refresh token** (`CLIENT_ID`, `CLIENT_SECRET`, `REFRESH_TOKEN`):
//    a long-lived user grant exchanged for short-lived access tokens.
//
// 2. **Service account** (`GOOGLE_SERVICE_ACCOUNT_KEY` or
//    `GOOGLE_SERVICE_ACCOUNT_JSON`): a signed JWT exchanged for an access
//    token. The membership sheet must be shared with the service account email.
//
// Both cache the token and refresh it shortly before it expires.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::membership::{MembershipError, RemoteService};

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const SCOPES: &str = "https://www.googleapis.com/auth/drive.readonly \
                      https://www.googleapis.com/auth/spreadsheets";

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can hand out a Google access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, MembershipError>;
}

fn auth_error(message: impl ToString) -> MembershipError {
    MembershipError::remote(RemoteService::Auth, message.to_string())
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

#[derive(Default)]
struct TokenCache {
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    async fn valid_token(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|token| token.expires_at > SystemTime::now() + EXPIRY_MARGIN)
            .map(|token| token.token.clone())
    }

    async fn store(&self, response: &TokenResponse) {
        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        });
    }
}

async fn exchange(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, MembershipError> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(auth_error)?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(auth_error(format!(
            "Token exchange failed ({}): {}",
            status, text
        )));
    }

    response.json().await.map_err(auth_error)
}

// =============================================================================
// REFRESH TOKEN
// =============================================================================

pub struct RefreshTokenAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cache: TokenCache,
}

impl RefreshTokenAuth {
    pub fn new(
        client: Client,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            refresh_token,
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl TokenSource for RefreshTokenAuth {
    async fn access_token(&self) -> Result<String, MembershipError> {
        if let Some(token) = self.cache.valid_token().await {
            return Ok(token);
        }

        tracing::debug!("Refreshing Google access token");
        let response = exchange(
            &self.client,
            GOOGLE_TOKEN_URI,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ],
        )
        .await?;

        self.cache.store(&response).await;
        Ok(response.access_token)
    }
}

// =============================================================================
// SERVICE ACCOUNT
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    /// PEM encoded RSA key.
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

pub struct ServiceAccountAuth {
    client: Client,
    credentials: ServiceAccountCredentials,
    cache: TokenCache,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from a JSON key file path.
    pub async fn from_file(client: Client, path: &str) -> Result<Self, MembershipError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MembershipError::Configuration(format!(
                "cannot read service account key {}: {}",
                path, e
            ))
        })?;
        Self::from_json(client, &content)
    }

    /// Creates a new authenticator from JSON content.
    pub fn from_json(client: Client, json: &str) -> Result<Self, MembershipError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json).map_err(|e| {
            MembershipError::Configuration(format!("invalid service account JSON: {}", e))
        })?;
        Ok(Self {
            client,
            credentials,
            cache: TokenCache::default(),
        })
    }

    fn signed_assertion(&self) -> Result<String, MembershipError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(auth_error)?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(auth_error)?;
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(auth_error)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, MembershipError> {
        if let Some(token) = self.cache.valid_token().await {
            return Ok(token);
        }

        tracing::debug!(
            "Requesting Google access token for {}",
            self.credentials.client_email
        );
        let jwt = self.signed_assertion()?;
        let response = exchange(
            &self.client,
            &self.credentials.token_uri,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ],
        )
        .await?;

        self.cache.store(&response).await;
        Ok(response.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_serves_token_until_close_to_expiry() {
        let cache = TokenCache::default();
        assert_eq!(cache.valid_token().await, None);

        cache
            .store(&TokenResponse {
                access_token: "fresh".to_string(),
                expires_in: 3600,
            })
            .await;
        assert_eq!(cache.valid_token().await.as_deref(), Some("fresh"));

        cache
            .store(&TokenResponse {
                access_token: "stale".to_string(),
                expires_in: 30,
            })
            .await;
        assert_eq!(cache.valid_token().await, None);
    }

    #[test]
    fn token_response_defaults_expiry() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer"}"#).unwrap();
        assert_eq!(response.access_token, "abc");
        assert_eq!(response.expires_in, 3600);
    }

    #[test]
    fn service_account_json_without_token_uri_uses_google_default() {
        let auth = ServiceAccountAuth::from_json(
            Client::new(),
            r#"{"client_email":"bot@project.iam.gserviceaccount.com","private_key":"not-a-key"}"#,
        )
        .unwrap();
        assert_eq!(auth.credentials.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn malformed_service_account_json_is_a_configuration_error() {
        let result = ServiceAccountAuth::from_json(Client::new(), "{}");
        assert!(matches!(result, Err(MembershipError::Configuration(_))));
    }

    #[test]
    fn invalid_private_key_fails_signing() {
        let auth = ServiceAccountAuth::from_json(
            Client::new(),
            r#"{"client_email":"bot@example.com","private_key":"not-a-key"}"#,
        )
        .unwrap();
        assert!(matches!(
            auth.signed_assertion(),
            Err(MembershipError::RemoteService {
                service: RemoteService::Auth,
                ..
            })
        ));
    }
}
