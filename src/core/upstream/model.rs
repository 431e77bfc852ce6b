use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct ThreadObject {
    pub id: String,
}

#[derive(Serialize, Debug)]
pub(super) struct CreateMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Serialize, Debug)]
pub(super) struct CreateRun<'a> {
    pub assistant_id: &'a str,
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub stream: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether polling can stop.
    ///
    /// `requires_action` counts as terminal: the relay has no tools to run.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress | Self::Cancelling | Self::Unknown)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Human-readable reason a run did not complete.
    pub fn failure_message(&self) -> String {
        match &self.last_error {
            Some(RunError { message, .. }) if !message.is_empty() => message.clone(),
            _ => format!("run {}", self.status.as_str()),
        }
    }
}

/// Text carried by a content part, either `{ "value": ... }` or a bare string.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TextPart {
    Object {
        #[serde(default)]
        value: String,
    },
    Plain(String),
}

impl TextPart {
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Object { value } => value,
            Self::Plain(value) => value,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<TextPart>,
}

impl ContentPart {
    /// Non-empty text of this part, if it has any.
    #[inline]
    pub fn text(&self) -> Option<&str> { self.text.as_ref().map(TextPart::as_str).filter(|s| !s.is_empty()) }
}

#[derive(Deserialize, Debug, Default)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

/// Payload of a `thread.message.delta` event.
#[derive(Deserialize, Debug)]
pub struct MessageDeltaEvent {
    #[serde(default)]
    pub delta: MessageDelta,
}

impl MessageDeltaEvent {
    #[inline]
    pub fn texts(&self) -> impl Iterator<Item = &str> { self.delta.content.iter().filter_map(ContentPart::text) }
}

/// Payload of an `error` event.
#[derive(Deserialize, Debug)]
pub struct StreamErrorEvent {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<RunError>,
}

impl StreamErrorEvent {
    pub fn into_message(self) -> String {
        self.message
            .or(self.error.map(|e| e.message))
            .unwrap_or_else(|| String::from("unknown stream error"))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ThreadMessage {
    #[inline]
    pub fn text(&self) -> String { self.content.iter().filter_map(ContentPart::text).collect() }
}

#[derive(Deserialize, Debug)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

impl MessageList {
    /// Newest assistant message of `run_id`. Expects newest-first order.
    pub fn latest_reply(&self, run_id: &str) -> Option<String> {
        self.data
            .iter()
            .filter(|m| m.role == "assistant")
            .find(|m| m.run_id.as_deref().is_none_or(|id| id == run_id))
            .map(ThreadMessage::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_text_shapes() {
        let event: MessageDeltaEvent = serde_json::from_str(
            r#"{"id":"msg_1","object":"thread.message.delta","delta":{"content":[
                {"index":0,"type":"text","text":{"value":"Hel","annotations":[]}},
                {"index":1,"type":"text","text":"lo"},
                {"index":2,"type":"image_file","image_file":{"file_id":"f"}},
                {"index":3,"type":"text","text":{"value":""}}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(event.texts().collect::<Vec<_>>(), ["Hel", "lo"]);
    }

    #[test]
    fn test_run_status() {
        let run: Run = serde_json::from_str(
            r#"{"id":"run_1","status":"failed","last_error":{"code":"rate_limit_exceeded","message":"quota"}}"#,
        )
        .unwrap();
        assert!(run.status.is_terminal());
        assert_eq!(run.failure_message(), "quota");

        let run: Run = serde_json::from_str(r#"{"id":"run_2","status":"expired","last_error":null}"#).unwrap();
        assert_eq!(run.failure_message(), "run expired");

        let run: Run = serde_json::from_str(r#"{"id":"run_3","status":"something_new"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn test_latest_reply() {
        let list: MessageList = serde_json::from_str(
            r#"{"object":"list","data":[
                {"role":"assistant","run_id":"run_2","content":[{"type":"text","text":{"value":"new"}}]},
                {"role":"user","run_id":null,"content":[{"type":"text","text":{"value":"hi"}}]},
                {"role":"assistant","run_id":"run_1","content":[{"type":"text","text":{"value":"old"}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.latest_reply("run_2").as_deref(), Some("new"));
        assert_eq!(list.latest_reply("run_1").as_deref(), Some("old"));
    }

    #[test]
    fn test_create_run_body() {
        let body = serde_json::to_string(&CreateRun { assistant_id: "asst", stream: true }).unwrap();
        assert_eq!(body, r#"{"assistant_id":"asst","stream":true}"#);
        let body = serde_json::to_string(&CreateRun { assistant_id: "asst", stream: false }).unwrap();
        assert_eq!(body, r#"{"assistant_id":"asst"}"#);
    }
}
