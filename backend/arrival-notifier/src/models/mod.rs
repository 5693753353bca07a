use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// A Firestore field value in its typed JSON encoding
///
/// `{"booleanValue": true}`, `{"stringValue": "abc"}`, `{"integerValue": "7"}` ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(#[serde(with = "int64")] i64),
    DoubleValue(f64),
    TimestampValue(DateTime<Utc>),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// int64 values travel as JSON strings; numbers are accepted as well
mod int64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

/// A Firestore document snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, `projects/{p}/databases/{d}/documents/{path}`
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Last path segment of the resource name
    pub fn id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }
}

/// State of the order's arrival flag
///
/// Only an explicit boolean `true` counts as set. Absence, `false`, `null`
/// and values of any other type (numbers, strings, timestamps) are unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalFlag {
    Unset,
    Set,
}

impl ArrivalFlag {
    pub fn from_field(value: Option<&FieldValue>) -> Self {
        match value {
            Some(FieldValue::BooleanValue(true)) => ArrivalFlag::Set,
            _ => ArrivalFlag::Unset,
        }
    }

    pub fn is_set(self) -> bool {
        self == ArrivalFlag::Set
    }
}

/// The fields of an order the notifier looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub arrival: ArrivalFlag,
    pub customer_id: Option<String>,
}

impl OrderSnapshot {
    pub fn from_document(doc: &Document, arrival_field: &str, customer_field: &str) -> Self {
        Self {
            arrival: ArrivalFlag::from_field(doc.get(arrival_field)),
            // Blank ids are rejected, but a usable id is kept byte-for-byte
            customer_id: doc
                .get_str(customer_field)
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string),
        }
    }
}

/// True only on an unset -> set edge of the arrival flag
pub fn is_arrival_transition(before: ArrivalFlag, after: ArrivalFlag) -> bool {
    !before.is_set() && after.is_set()
}

/// Recipient of the arrival notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub fcm_token: Option<String>,
}

impl UserRecord {
    /// Empty or whitespace-only tokens are treated as missing
    pub fn from_document(id: &str, doc: &Document, token_field: &str) -> Self {
        Self {
            id: id.to_string(),
            fcm_token: doc
                .get_str(token_field)
                .filter(|token| !token.trim().is_empty())
                .map(str::to_string),
        }
    }
}

/// Payload of a `google.cloud.firestore.document.v1.*` CloudEvent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    #[serde(default)]
    pub old_value: Option<Document>,
    #[serde(default)]
    pub value: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// How a single invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The arrival flag did not flip from unset to set
    NotTriggered,
    /// The order carries no usable customer id
    InvalidOrder,
    UserNotFound { customer_id: String },
    NoToken { customer_id: String },
    Sent { message_id: String },
    Failed { error: String },
}

impl NotifyOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            NotifyOutcome::NotTriggered => "skipped",
            NotifyOutcome::InvalidOrder => "invalid_order",
            NotifyOutcome::UserNotFound { .. } => "user_not_found",
            NotifyOutcome::NoToken { .. } => "no_token",
            NotifyOutcome::Sent { .. } => "sent",
            NotifyOutcome::Failed { .. } => "failed",
        }
    }

    /// The externally visible result: `None` (null), success or failure
    pub fn dispatch_result(&self) -> Option<DispatchResult> {
        match self {
            NotifyOutcome::Sent { message_id } => Some(DispatchResult {
                success: true,
                message: Some("Notification sent".to_string()),
                message_id: Some(message_id.clone()),
                error: None,
            }),
            NotifyOutcome::Failed { error } => Some(DispatchResult {
                success: false,
                message: None,
                message_id: None,
                error: Some(error.clone()),
            }),
            _ => None,
        }
    }
}

impl Serialize for NotifyOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.dispatch_result().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_typed_fields() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/Orders/order-1",
            "fields": {
                "arrivedAt": {"booleanValue": true},
                "customerId": {"stringValue": "cust-1"},
                "total": {"integerValue": "1250"},
                "note": {"nullValue": null},
                "placedAt": {"timestampValue": "2024-05-01T12:00:00Z"},
                "items": {"arrayValue": {"values": [{"stringValue": "pizza"}]}},
                "address": {"mapValue": {"fields": {"zip": {"stringValue": "10115"}}}}
            },
            "updateTime": "2024-05-01T12:30:00.123456Z"
        }))
        .unwrap();

        assert_eq!(doc.id(), Some("order-1"));
        assert_eq!(doc.get("arrivedAt"), Some(&FieldValue::BooleanValue(true)));
        assert_eq!(doc.get_str("customerId"), Some("cust-1"));
        assert_eq!(doc.get("total"), Some(&FieldValue::IntegerValue(1250)));
        assert_eq!(doc.get("note"), Some(&FieldValue::NullValue(())));
        assert!(matches!(doc.get("items"), Some(FieldValue::ArrayValue(a)) if a.values.len() == 1));
        assert!(doc.update_time.is_some());
    }

    #[test]
    fn test_integer_value_round_trips_as_string() {
        let json = serde_json::to_value(FieldValue::IntegerValue(7)).unwrap();
        assert_eq!(json, json!({"integerValue": "7"}));
    }

    #[test]
    fn test_arrival_flag_only_true_boolean_is_set() {
        assert_eq!(ArrivalFlag::from_field(None), ArrivalFlag::Unset);
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::BooleanValue(false))),
            ArrivalFlag::Unset
        );
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::NullValue(()))),
            ArrivalFlag::Unset
        );
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::IntegerValue(0))),
            ArrivalFlag::Unset
        );
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::IntegerValue(1))),
            ArrivalFlag::Unset
        );
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::StringValue("true".into()))),
            ArrivalFlag::Unset
        );
        assert_eq!(
            ArrivalFlag::from_field(Some(&FieldValue::BooleanValue(true))),
            ArrivalFlag::Set
        );
    }

    #[test]
    fn test_transition_table() {
        use ArrivalFlag::*;
        assert!(is_arrival_transition(Unset, Set));
        assert!(!is_arrival_transition(Set, Set));
        assert!(!is_arrival_transition(Unset, Unset));
        assert!(!is_arrival_transition(Set, Unset));
    }

    #[test]
    fn test_order_snapshot_ignores_blank_customer() {
        let doc = Document::new("Orders/o1")
            .with_field("arrivedAt", FieldValue::BooleanValue(true))
            .with_field("customerId", FieldValue::StringValue("  ".into()));

        let order = OrderSnapshot::from_document(&doc, "arrivedAt", "customerId");
        assert!(order.arrival.is_set());
        assert_eq!(order.customer_id, None);
    }

    #[test]
    fn test_order_snapshot_keeps_customer_id_verbatim() {
        let doc = Document::new("Orders/o1")
            .with_field("customerId", FieldValue::StringValue(" cust-1 ".into()));

        let order = OrderSnapshot::from_document(&doc, "arrivedAt", "customerId");
        assert_eq!(order.customer_id.as_deref(), Some(" cust-1 "));
    }

    #[test]
    fn test_user_record_empty_token_is_missing() {
        let doc = Document::new("Users/u1").with_field("fcmToken", FieldValue::StringValue(String::new()));
        assert_eq!(UserRecord::from_document("u1", &doc, "fcmToken").fcm_token, None);

        let doc = Document::new("Users/u1").with_field("fcmToken", FieldValue::IntegerValue(5));
        assert_eq!(UserRecord::from_document("u1", &doc, "fcmToken").fcm_token, None);
    }

    #[test]
    fn test_outcome_serializes_to_return_contract() {
        assert_eq!(serde_json::to_value(NotifyOutcome::NotTriggered).unwrap(), json!(null));
        assert_eq!(
            serde_json::to_value(NotifyOutcome::NoToken {
                customer_id: "c".into()
            })
            .unwrap(),
            json!(null)
        );
        assert_eq!(
            serde_json::to_value(NotifyOutcome::Sent {
                message_id: "m-1".into()
            })
            .unwrap(),
            json!({"success": true, "message": "Notification sent", "messageId": "m-1"})
        );
        assert_eq!(
            serde_json::to_value(NotifyOutcome::Failed {
                error: "boom".into()
            })
            .unwrap(),
            json!({"success": false, "error": "boom"})
        );
    }
}
