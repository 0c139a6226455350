//! Message envelope
//!
//! The unit of agent-to-agent communication. The wire form is a JSON object:
//!
//! ```text
//! { "type": "request" | "response" | "notification",
//!   "from": "...", "to": "...",
//!   "message_id": "...", "timestamp": "...",
//!   "content": { ... kind specific ... },
//!   "metadata": { "conversation_id": "...", "request_id": "..." } }
//! ```

use crate::error::{RelayError, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form JSON object
pub type JsonMap = Map<String, Value>;

/// Metadata key carrying the conversation the envelope belongs to
pub const META_CONVERSATION_ID: &str = "conversation_id";
/// Metadata key on responses pointing at the originating request
pub const META_REQUEST_ID: &str = "request_id";
/// Metadata key on requests spawned by another message
pub const META_PARENT_MESSAGE_ID: &str = "parent_message_id";

/// Envelope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Request,
    Response,
    Notification,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Request => "request",
            EnvelopeKind::Response => "response",
            EnvelopeKind::Notification => "notification",
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvelopeKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "request" => Ok(EnvelopeKind::Request),
            "response" => Ok(EnvelopeKind::Response),
            "notification" => Ok(EnvelopeKind::Notification),
            other => Err(RelayError::malformed(format!(
                "unrecognized envelope type '{}'",
                other
            ))),
        }
    }
}

/// Content of a request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContent {
    pub action: String,
    #[serde(default, deserialize_with = "map_or_empty")]
    pub parameters: JsonMap,
    #[serde(default, deserialize_with = "map_or_empty")]
    pub context: JsonMap,
}

/// Content of a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Content of a notification envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub event: String,
    #[serde(default, deserialize_with = "map_or_empty")]
    pub data: JsonMap,
}

/// Kind-specific envelope content.
///
/// The variant *is* the envelope kind, so a request can never carry response content.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeContent {
    Request(RequestContent),
    Response(ResponseContent),
    Notification(NotificationContent),
}

impl EnvelopeContent {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            EnvelopeContent::Request(_) => EnvelopeKind::Request,
            EnvelopeContent::Response(_) => EnvelopeKind::Response,
            EnvelopeContent::Notification(_) => EnvelopeKind::Notification,
        }
    }
}

/// A typed message exchanged between the orchestrator and an agent
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Globally unique message ID
    pub id: String,
    /// Sending agent name
    pub from_agent: String,
    /// Receiving agent name
    pub to_agent: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Kind-specific content
    pub content: EnvelopeContent,
    /// Free-form metadata
    pub metadata: JsonMap,
}

impl Envelope {
    fn new(from: impl Into<String>, to: impl Into<String>, content: EnvelopeContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_agent: from.into(),
            to_agent: to.into(),
            timestamp: Utc::now(),
            content,
            metadata: JsonMap::new(),
        }
    }

    /// Create a request with empty context
    pub fn request(
        from: impl Into<String>,
        to: impl Into<String>,
        action: impl Into<String>,
        parameters: JsonMap,
    ) -> Self {
        Self::new(
            from,
            to,
            EnvelopeContent::Request(RequestContent {
                action: action.into(),
                parameters,
                context: JsonMap::new(),
            }),
        )
    }

    /// Create a response
    pub fn response(
        from: impl Into<String>,
        to: impl Into<String>,
        status: impl Into<String>,
        result: Option<Value>,
        error: Option<String>,
    ) -> Self {
        Self::new(
            from,
            to,
            EnvelopeContent::Response(ResponseContent {
                status: status.into(),
                // an explicit null would not survive the wire round-trip
                result: result.filter(|v| !v.is_null()),
                error,
            }),
        )
    }

    /// Create a notification
    pub fn notification(
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
        data: JsonMap,
    ) -> Self {
        Self::new(
            from,
            to,
            EnvelopeContent::Notification(NotificationContent {
                event: event.into(),
                data,
            }),
        )
    }

    /// Attach request context (no-op for other kinds)
    pub fn with_context(mut self, context: JsonMap) -> Self {
        if let EnvelopeContent::Request(ref mut request) = self.content {
            request.context = context;
        }
        self
    }

    /// Tag the envelope with a conversation ID
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.metadata.insert(
            META_CONVERSATION_ID.to_string(),
            Value::String(conversation_id.into()),
        );
        self
    }

    /// Record the message this one was spawned from
    pub fn with_parent_message_id(mut self, parent_id: impl Into<String>) -> Self {
        self.metadata.insert(
            META_PARENT_MESSAGE_ID.to_string(),
            Value::String(parent_id.into()),
        );
        self
    }

    /// Link a response to its request, inheriting the conversation ID
    pub fn in_reply_to(mut self, request: &Envelope) -> Self {
        self.metadata.insert(
            META_REQUEST_ID.to_string(),
            Value::String(request.id.clone()),
        );
        if let Some(conversation_id) = request.conversation_id() {
            self.metadata.insert(
                META_CONVERSATION_ID.to_string(),
                Value::String(conversation_id.to_string()),
            );
        }
        self
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.content.kind()
    }

    pub fn as_request(&self) -> Option<&RequestContent> {
        match &self.content {
            EnvelopeContent::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseContent> {
        match &self.content {
            EnvelopeContent::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_notification(&self) -> Option<&NotificationContent> {
        match &self.content {
            EnvelopeContent::Notification(notification) => Some(notification),
            _ => None,
        }
    }

    /// Conversation ID from metadata, if any
    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata
            .get(META_CONVERSATION_ID)
            .and_then(Value::as_str)
    }

    /// Originating request ID (responses only, by convention)
    pub fn request_id(&self) -> Option<&str> {
        self.metadata.get(META_REQUEST_ID).and_then(Value::as_str)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse from a JSON string.
    ///
    /// Fails with [`RelayError::MalformedEnvelope`] when `type` is missing or
    /// unknown, or when required content keys for that kind are absent.
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_str(json)
            .map_err(|e| RelayError::malformed(e.to_string()))?;
        Envelope::try_from(wire)
    }

    /// Parse from an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let wire: WireEnvelope =
            serde_json::from_value(value).map_err(|e| RelayError::malformed(e.to_string()))?;
        Envelope::try_from(wire)
    }
}

// ========== Wire format ==========

#[derive(Serialize)]
#[serde(untagged)]
enum WireContentRef<'a> {
    Request(&'a RequestContent),
    Response(&'a ResponseContent),
    Notification(&'a NotificationContent),
}

#[derive(Serialize)]
struct WireEnvelopeRef<'a> {
    #[serde(rename = "type")]
    kind: EnvelopeKind,
    from: &'a str,
    to: &'a str,
    message_id: &'a str,
    timestamp: String,
    content: WireContentRef<'a>,
    metadata: &'a JsonMap,
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let content = match &self.content {
            EnvelopeContent::Request(c) => WireContentRef::Request(c),
            EnvelopeContent::Response(c) => WireContentRef::Response(c),
            EnvelopeContent::Notification(c) => WireContentRef::Notification(c),
        };
        WireEnvelopeRef {
            kind: self.kind(),
            from: &self.from_agent,
            to: &self.to_agent,
            message_id: &self.id,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            content,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    from: String,
    to: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default, deserialize_with = "map_or_empty")]
    metadata: JsonMap,
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = RelayError;

    fn try_from(wire: WireEnvelope) -> Result<Self> {
        let kind: EnvelopeKind = wire
            .kind
            .as_deref()
            .ok_or_else(|| RelayError::malformed("missing envelope type"))?
            .parse()?;

        let content = if wire.content.is_null() {
            Value::Object(JsonMap::new())
        } else {
            wire.content
        };

        let content = match kind {
            EnvelopeKind::Request => EnvelopeContent::Request(parse_content(kind, content)?),
            EnvelopeKind::Response => EnvelopeContent::Response(parse_content(kind, content)?),
            EnvelopeKind::Notification => {
                EnvelopeContent::Notification(parse_content(kind, content)?)
            }
        };

        let timestamp = match wire.timestamp {
            Some(raw) => parse_timestamp(&raw)?,
            None => Utc::now(),
        };

        Ok(Self {
            id: wire
                .message_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            from_agent: wire.from,
            to_agent: wire.to,
            timestamp,
            content,
            metadata: wire.metadata,
        })
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireEnvelope::deserialize(deserializer)?;
        Envelope::try_from(wire).map_err(serde::de::Error::custom)
    }
}

fn parse_content<T: serde::de::DeserializeOwned>(kind: EnvelopeKind, content: Value) -> Result<T> {
    serde_json::from_value(content)
        .map_err(|e| RelayError::malformed(format!("invalid {} content: {}", kind, e)))
}

/// Accept RFC 3339, or a naive ISO-8601 timestamp interpreted as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| RelayError::malformed(format!("invalid timestamp '{}'", raw)))
}

fn map_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<JsonMap, D::Error> {
    Ok(Option::<JsonMap>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_request_roundtrip() {
        let request = Envelope::request(
            "Orchestrator",
            "Developer",
            "modify_code",
            params(json!({
                "current_files": { "/App.js": "code" },
                "nested": { "list": [1, 2.5, null, true] }
            })),
        )
        .with_context(params(json!({ "turn": 3 })))
        .with_conversation_id("conv_1");

        let parsed = Envelope::from_json(&request.to_json().unwrap()).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_parent_message_id_on_the_wire() {
        let parent = Envelope::request("Orchestrator", "Tester", "test_code", JsonMap::new());
        let child = Envelope::request("Orchestrator", "Developer", "fix_code", JsonMap::new())
            .with_conversation_id("conv_3")
            .with_parent_message_id(parent.id.clone());

        let wire = child.to_value().unwrap();
        assert_eq!(wire["metadata"]["parent_message_id"], json!(parent.id));
        assert_eq!(wire["metadata"]["conversation_id"], "conv_3");

        let parsed = Envelope::from_json(&child.to_json().unwrap()).unwrap();
        assert_eq!(
            parsed.metadata.get(META_PARENT_MESSAGE_ID),
            Some(&Value::String(parent.id))
        );
    }

    #[test]
    fn test_response_roundtrip_with_absent_fields() {
        let request = Envelope::request("Orchestrator", "Tester", "test_code", JsonMap::new())
            .with_conversation_id("conv_2");
        let response = Envelope::response("Tester", "Orchestrator", "success", None, None)
            .in_reply_to(&request);

        let parsed = Envelope::from_json(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, response);
        assert_eq!(parsed.request_id(), Some(request.id.as_str()));
        assert_eq!(parsed.conversation_id(), Some("conv_2"));
    }

    #[test]
    fn test_notification_roundtrip() {
        let note = Envelope::notification(
            "Tester",
            "Orchestrator",
            "progress",
            params(json!({ "percent": 40 })),
        );
        let parsed = Envelope::from_json(&note.to_json().unwrap()).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn test_wire_field_names() {
        let request = Envelope::request("A", "B", "ping", JsonMap::new());
        let value = request.to_value().unwrap();
        assert_eq!(value["type"], "request");
        assert_eq!(value["from"], "A");
        assert_eq!(value["to"], "B");
        assert_eq!(value["message_id"], request.id.as_str());
        assert_eq!(value["content"]["action"], "ping");
        assert_eq!(value["content"]["parameters"], json!({}));
    }

    #[test]
    fn test_defaults_applied() {
        let raw = json!({
            "type": "request",
            "from": "Orchestrator",
            "to": "Analyst",
            "content": { "action": "analyze_request" }
        });
        let envelope = Envelope::from_value(raw).unwrap();
        let request = envelope.as_request().unwrap();
        assert!(request.parameters.is_empty());
        assert!(request.context.is_empty());
        assert!(!envelope.id.is_empty());

        let raw = json!({
            "type": "response",
            "from": "Tester",
            "to": "Orchestrator",
            "content": { "status": "success", "result": null, "error": null }
        });
        let envelope = Envelope::from_value(raw).unwrap();
        let response = envelope.as_response().unwrap();
        assert_eq!(response.result, None);
        assert_eq!(response.error, None);
    }

    #[test]
    fn test_missing_type_is_malformed() {
        let err = Envelope::from_json(r#"{"from":"A","to":"B","content":{}}"#).unwrap_err();
        assert!(matches!(err, RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err =
            Envelope::from_json(r#"{"type":"broadcast","from":"A","to":"B"}"#).unwrap_err();
        assert!(matches!(err, RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_missing_required_content_key() {
        for (kind, content) in [
            ("request", json!({ "parameters": {} })),
            ("response", json!({ "result": 1 })),
            ("notification", json!({ "data": {} })),
        ] {
            let raw = json!({ "type": kind, "from": "A", "to": "B", "content": content });
            let err = Envelope::from_value(raw).unwrap_err();
            assert!(
                matches!(err, RelayError::MalformedEnvelope(_)),
                "{} should be malformed",
                kind
            );
        }
    }

    #[test]
    fn test_naive_timestamp_accepted() {
        let raw = json!({
            "type": "notification",
            "from": "A",
            "to": "B",
            "timestamp": "2024-05-01T10:20:30.123456",
            "content": { "event": "started" }
        });
        let envelope = Envelope::from_value(raw).unwrap();
        assert_eq!(
            envelope.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            "2024-05-01T10:20:30.123456Z"
        );
    }

    #[test]
    fn test_serde_deserialize_impl_rejects_bad_kind() {
        let result: std::result::Result<Envelope, _> =
            serde_json::from_str(r#"{"type":"nope","from":"A","to":"B"}"#);
        assert!(result.is_err());
    }
}
