/// Firestore trigger ingress
///
/// Receives `google.cloud.firestore.document.v1.updated` CloudEvents in binary
/// content mode with a JSON payload.
use actix_web::{http::header::HeaderMap, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{Document, DocumentEventData};
use crate::services::ArrivalNotifier;

pub const DOCUMENT_UPDATED_EVENT: &str = "google.cloud.firestore.document.v1.updated";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Split a document path into `(collection path, id)`
///
/// Accepts `Orders/abc`, `documents/Orders/abc` and full resource names. A
/// subcollection document keeps its parent in the collection path, so
/// `Users/u1/Orders/abc` yields `("Users/u1/Orders", "abc")`.
pub fn parse_document_path(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_matches('/');
    let relative = match path.split_once("/documents/") {
        Some((root, rest)) if root.starts_with("projects/") && root.split('/').count() == 4 => rest,
        _ => path.strip_prefix("documents/").unwrap_or(path),
    };

    let (collection, id) = relative.rsplit_once('/')?;
    if collection.is_empty() || id.is_empty() {
        return None;
    }
    Some((collection, id))
}

/// Handle a document update event
///
/// POST /
pub async fn receive_event(
    req: HttpRequest,
    body: web::Bytes,
    notifier: web::Data<Arc<ArrivalNotifier>>,
) -> Result<HttpResponse> {
    let headers = req.headers();
    let event_type = header(headers, "ce-type")
        .ok_or_else(|| AppError::BadRequest("missing ce-type header".to_string()))?;
    let event_id = header(headers, "ce-id").unwrap_or("-");

    if event_type != DOCUMENT_UPDATED_EVENT {
        debug!(event_id = %event_id, "Ignoring event of type {}", event_type);
        return Ok(HttpResponse::NoContent().finish());
    }

    let document_path = header(headers, "ce-document")
        .or_else(|| header(headers, "ce-subject"))
        .ok_or_else(|| AppError::BadRequest("missing ce-document header".to_string()))?;
    let (collection, order_id) = parse_document_path(document_path)
        .ok_or_else(|| AppError::BadRequest(format!("invalid document path: {}", document_path)))?;

    if collection != notifier.schema().orders_collection {
        debug!(event_id = %event_id, "Ignoring update of {}", document_path);
        return Ok(HttpResponse::NoContent().finish());
    }

    let data: DocumentEventData = serde_json::from_slice(&body)?;
    let after = data
        .value
        .ok_or_else(|| AppError::InvalidPayload("event has no value".to_string()))?;
    let before = data.old_value.unwrap_or_else(|| Document::new(after.name.clone()));

    debug!(event_id = %event_id, order_id = %order_id, "Received order update");
    let outcome = notifier.on_order_updated(order_id, &before, &after).await;

    Ok(HttpResponse::Ok().json(outcome))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(receive_event));
}
