/// Arrival Notifier
///
/// Reacts to order updates. When the arrival flag flips from unset to set it
/// resolves the customer's device token and sends a single push message.
///
/// Every path completes normally: missing recipients and transport failures
/// are logged and reported through [`NotifyOutcome`], never returned as
/// errors, so the trigger platform has nothing to retry.
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{NotificationConfig, RecordSchema};
use crate::metrics;
use crate::models::{is_arrival_transition, Document, NotifyOutcome, OrderSnapshot, UserRecord};

use super::arrival_message::arrival_message;
use super::document_store::DocumentStore;
use super::push_transport::PushTransport;

pub struct ArrivalNotifier {
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn PushTransport>,
    schema: RecordSchema,
    notification: NotificationConfig,
}

impl ArrivalNotifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn PushTransport>,
        schema: RecordSchema,
        notification: NotificationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            schema,
            notification,
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Decision rule: fire only on an unset -> set edge of the arrival flag
    pub fn should_notify(&self, before: &Document, after: &Document) -> bool {
        let before = OrderSnapshot::from_document(
            before,
            &self.schema.arrival_field,
            &self.schema.customer_field,
        );
        let after = OrderSnapshot::from_document(
            after,
            &self.schema.arrival_field,
            &self.schema.customer_field,
        );
        is_arrival_transition(before.arrival, after.arrival)
    }

    /// Handle one delivered update of `Orders/{order_id}`
    pub async fn on_order_updated(
        &self,
        order_id: &str,
        before: &Document,
        after: &Document,
    ) -> NotifyOutcome {
        let outcome = self.evaluate(order_id, before, after).await;
        metrics::record_outcome(outcome.label());
        outcome
    }

    async fn evaluate(&self, order_id: &str, before: &Document, after: &Document) -> NotifyOutcome {
        if !self.should_notify(before, after) {
            return NotifyOutcome::NotTriggered;
        }

        let order = OrderSnapshot::from_document(
            after,
            &self.schema.arrival_field,
            &self.schema.customer_field,
        );
        let Some(customer_id) = order.customer_id else {
            warn!(order_id = %order_id, "Order has no customer id, skipping arrival notification");
            return NotifyOutcome::InvalidOrder;
        };

        let user = match self.resolve_user(&customer_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(order_id = %order_id, customer_id = %customer_id, "User document not found for customer");
                return NotifyOutcome::UserNotFound { customer_id };
            }
            Err(e) => {
                error!(order_id = %order_id, customer_id = %customer_id, "Failed to load user document: {}", e);
                return NotifyOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let Some(token) = user.fcm_token else {
            warn!(order_id = %order_id, customer_id = %customer_id, "No FCM token for user");
            return NotifyOutcome::NoToken { customer_id };
        };

        let message = arrival_message(order_id, &token, &self.notification);
        match self.transport.send(&message).await {
            Ok(message_id) => {
                info!(
                    order_id = %order_id,
                    customer_id = %customer_id,
                    message_id = %message_id,
                    "Arrival notification sent successfully"
                );
                NotifyOutcome::Sent { message_id }
            }
            Err(e) => {
                error!(order_id = %order_id, customer_id = %customer_id, "Error sending notification: {}", e);
                NotifyOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn resolve_user(
        &self,
        customer_id: &str,
    ) -> Result<Option<UserRecord>, super::document_store::StoreError> {
        let document = self
            .store
            .get_document(&self.schema.users_collection, customer_id)
            .await?;

        Ok(document.map(|doc| UserRecord::from_document(customer_id, &doc, &self.schema.token_field)))
    }
}
