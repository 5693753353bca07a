use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::FCMError;
use crate::models::{GoogleTokenResponse, JwtClaims, ServiceAccountKey, TokenCache};

/// OAuth2 scope accepted by both FCM and Firestore
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Seconds of remaining validity below which a cached token is refreshed
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for Google APIs
#[async_trait::async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, FCMError>;
}

/// Fixed bearer token, used against the Firebase emulators
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, FCMError> {
        Ok(self.0.clone())
    }
}

/// Service account authenticator
///
/// Signs a JWT assertion with the service account's private key, exchanges it
/// at the token endpoint and caches the resulting access token until shortly
/// before it expires.
pub struct ServiceAccountAuth {
    credentials: Arc<ServiceAccountKey>,
    token_cache: Mutex<Option<TokenCache>>,
    http_client: reqwest::Client,
}

impl ServiceAccountAuth {
    pub fn new(credentials: ServiceAccountKey, http_client: reqwest::Client) -> Self {
        Self {
            credentials: Arc::new(credentials),
            token_cache: Mutex::new(None),
            http_client,
        }
    }

    fn sign_assertion(&self) -> Result<String, FCMError> {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| FCMError::KeyParseError(e.to_string()))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.credentials.private_key_id.clone());

        encode(&header, &claims, &encoding_key).map_err(|e| FCMError::JwtEncodeError(e.to_string()))
    }

    async fn fetch_token(&self) -> Result<TokenCache, FCMError> {
        let assertion = self.sign_assertion()?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| FCMError::TokenError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FCMError::TokenRequestFailed(response.status().to_string()));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| FCMError::TokenParseError(e.to_string()))?;

        Ok(TokenCache {
            access_token: token_response.access_token,
            expires_at: Utc::now().timestamp() + token_response.expires_in,
        })
    }
}

#[async_trait::async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, FCMError> {
        // Held across the refresh so concurrent callers share one exchange
        let mut cache = self.token_cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now().timestamp() + REFRESH_MARGIN_SECS {
                return Ok(cached.access_token.clone());
            }
        }

        debug!(
            "Refreshing access token for {}",
            self.credentials.client_email
        );
        let fresh = self.fetch_token().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);

        Ok(token)
    }
}
