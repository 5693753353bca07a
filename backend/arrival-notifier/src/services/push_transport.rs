/// Push transport port
///
/// The notifier hands a [`PushMessage`] to a transport and gets back the
/// provider's message id or a typed delivery error.
use async_trait::async_trait;
use courier_fcm_shared::{FCMClient, FCMError};

use super::arrival_message::PushMessage;

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<String, FCMError>;
}

#[async_trait]
impl PushTransport for FCMClient {
    async fn send(&self, message: &PushMessage) -> Result<String, FCMError> {
        self.send_message(&message.to_fcm())
            .await
            .map(|result| result.message_id)
    }
}
