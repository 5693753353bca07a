/// Platform bootstrap
///
/// Builds the Firebase collaborators once at process start. The handler is
/// stateless per request, so nothing here needs teardown.
use courier_fcm_shared::{
    AccessTokenProvider, FCMClient, FCMError, ServiceAccountAuth, ServiceAccountKey, StaticToken,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::FirebaseConfig;
use crate::services::{DocumentStore, FirestoreStore, PushTransport};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("no credentials configured: set GOOGLE_APPLICATION_CREDENTIALS or AUTH_STATIC_TOKEN")]
    MissingCredentials,

    #[error(transparent)]
    Credentials(#[from] FCMError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct Platform {
    pub store: Arc<dyn DocumentStore>,
    pub transport: Arc<dyn PushTransport>,
}

impl Platform {
    pub fn init(config: &FirebaseConfig) -> Result<Self, PlatformError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let auth: Arc<dyn AccessTokenProvider> = match (
            config.auth_static_token.as_deref(),
            config.google_application_credentials.as_deref(),
        ) {
            (Some(token), _) => {
                info!("Using static bearer token for Firebase APIs");
                Arc::new(StaticToken::new(token))
            }
            (None, Some(path)) => {
                let key = ServiceAccountKey::from_file(path)?;
                info!("Loaded service account {}", key.client_email);
                Arc::new(ServiceAccountAuth::new(key, http_client.clone()))
            }
            (None, None) => return Err(PlatformError::MissingCredentials),
        };

        let mut fcm = FCMClient::new(config.firebase_project_id.clone(), auth.clone())
            .with_http_client(http_client.clone());
        if let Some(base_url) = &config.fcm_base_url {
            fcm = fcm.with_base_url(base_url.clone());
        }

        let mut firestore =
            FirestoreStore::new(config.firebase_project_id.clone(), auth, http_client);
        if let Some(base_url) = &config.firestore_base_url {
            firestore = firestore.with_base_url(base_url.clone());
        }

        info!(
            "Firebase platform initialized for project {}",
            config.firebase_project_id
        );

        Ok(Self {
            store: Arc::new(firestore),
            transport: Arc::new(fcm),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FirebaseConfig {
        FirebaseConfig {
            firebase_project_id: "courier-test".to_string(),
            google_application_credentials: None,
            auth_static_token: None,
            fcm_base_url: None,
            firestore_base_url: None,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_init_requires_credentials() {
        assert!(matches!(
            Platform::init(&config()),
            Err(PlatformError::MissingCredentials)
        ));
    }

    #[test]
    fn test_init_with_static_token() {
        let mut config = config();
        config.auth_static_token = Some("owner".to_string());
        config.firestore_base_url = Some("http://localhost:8085".to_string());

        assert!(Platform::init(&config).is_ok());
    }

    #[test]
    fn test_init_reports_unreadable_credentials() {
        let mut config = config();
        config.google_application_credentials = Some("/nonexistent/service-account.json".to_string());

        assert!(matches!(
            Platform::init(&config),
            Err(PlatformError::Credentials(FCMError::CredentialsError(_)))
        ));
    }
}
