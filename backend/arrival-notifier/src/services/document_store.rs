/// Document store port and adapters
///
/// Point lookups of Firestore documents by collection and id. The REST
/// adapter talks to Firestore (or its emulator); the in-memory adapter backs
/// tests and local runs.
use async_trait::async_trait;
use courier_fcm_shared::{AccessTokenProvider, FCMError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::models::Document;

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] FCMError),

    #[error("document request failed: {0}")]
    Request(String),

    #[error("document store returned {0}: {1}")]
    Api(u16, String),

    #[error("failed to decode document: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Firestore REST adapter
pub struct FirestoreStore {
    project_id: String,
    database: String,
    base_url: String,
    auth: Arc<dyn AccessTokenProvider>,
    http_client: reqwest::Client,
}

impl FirestoreStore {
    pub fn new(
        project_id: String,
        auth: Arc<dyn AccessTokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            project_id,
            database: "(default)".to_string(),
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            auth,
            http_client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{}/{}",
            self.base_url, self.project_id, self.database, collection, id
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        validate_id(id)?;
        let access_token = self.auth.access_token().await?;
        let url = self.document_url(collection, id);
        debug!("Fetching document {}/{}", collection, id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::OK => response
                .json::<Document>()
                .await
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(StoreError::Api(status.as_u16(), error_text))
            }
        }
    }
}

/// In-memory adapter keyed by `(collection, id)`
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<(String, String), Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, id: &str, document: Document) {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        documents.insert((collection.to_string(), id.to_string()), document);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        validate_id(id)?;
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use courier_fcm_shared::StaticToken;

    #[test]
    fn test_document_url() {
        let store = FirestoreStore::new(
            "courier-test".to_string(),
            Arc::new(StaticToken::new("owner")),
            reqwest::Client::new(),
        );

        assert_eq!(
            store.document_url("Users", "cust-1"),
            "https://firestore.googleapis.com/v1/projects/courier-test/databases/(default)/documents/Users/cust-1"
        );
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert!(validate_id("cust-1").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("..").is_err());
    }

    #[actix_rt::test]
    async fn test_in_memory_lookup() {
        let store = InMemoryStore::new();
        store.insert(
            "Users",
            "cust-1",
            Document::new("Users/cust-1").with_field("fcmToken", FieldValue::StringValue("t".into())),
        );

        let found = store.get_document("Users", "cust-1").await.unwrap();
        assert_eq!(found.unwrap().get_str("fcmToken"), Some("t"));
        assert!(store.get_document("Users", "cust-2").await.unwrap().is_none());
        assert!(store.get_document("Orders", "cust-1").await.unwrap().is_none());
    }
}
