use std::sync::Arc;
use tracing::debug;

use crate::auth::AccessTokenProvider;
use crate::errors::FCMError;
use crate::models::*;

/// Production FCM endpoint
pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Firebase Cloud Messaging Client
///
/// Sends messages through the FCM HTTP v1 API. Authentication is delegated to
/// an [`AccessTokenProvider`] so the same credentials can be shared with other
/// Google APIs.
pub struct FCMClient {
    pub project_id: String,
    auth: Arc<dyn AccessTokenProvider>,
    base_url: String,
    http_client: reqwest::Client,
}

impl FCMClient {
    /// Create new FCM client
    ///
    /// # Arguments
    /// * `project_id` - Firebase project ID
    /// * `auth` - Source of OAuth2 bearer tokens
    pub fn new(project_id: String, auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            project_id,
            auth,
            base_url: DEFAULT_FCM_BASE_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Point the client at another host (emulator or test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.project_id
        )
    }

    /// Send a fully built message to a single device
    pub async fn send_message(
        &self,
        content: &FcmMessageContent,
    ) -> Result<FCMSendResult, FCMError> {
        let access_token = self.auth.access_token().await?;

        let response = self
            .http_client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&FcmMessage { message: content })
            .send()
            .await
            .map_err(|e| FCMError::SendRequestError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            let fcm_response: FcmApiResponse = response
                .json()
                .await
                .map_err(|e| FCMError::ResponseParseError(e.to_string()))?;

            let message_id = fcm_response.name.ok_or_else(|| {
                FCMError::ResponseParseError("response is missing message name".to_string())
            })?;
            debug!("FCM accepted message {}", message_id);

            return Ok(FCMSendResult { message_id });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(classify_error(status.as_u16(), error_text))
    }
}

/// Map a non-200 FCM response onto a typed error
pub fn classify_error(status: u16, body: String) -> FCMError {
    let envelope = serde_json::from_str::<FcmErrorEnvelope>(&body).ok();

    let error_code = envelope.as_ref().and_then(|env| {
        env.error
            .details
            .iter()
            .find_map(|detail| detail.error_code.clone())
            .or_else(|| env.error.status.clone())
    });
    let message = envelope
        .as_ref()
        .and_then(|env| env.error.message.clone())
        .unwrap_or_else(|| body.clone());

    match (status, error_code.as_deref()) {
        (_, Some("UNREGISTERED")) => FCMError::InvalidToken(message),
        (400, Some("INVALID_ARGUMENT")) if message.to_lowercase().contains("registration token") => {
            FCMError::InvalidToken(message)
        }
        (429, _) | (_, Some("QUOTA_EXCEEDED")) => FCMError::QuotaExceeded(message),
        _ => FCMError::ApiError(status, message),
    }
}
