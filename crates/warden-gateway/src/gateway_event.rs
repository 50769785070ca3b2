use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub const POST_TYPE_META_EVENT: &str = "meta_event";
pub const POST_TYPE_MESSAGE: &str = "message";
pub const MESSAGE_TYPE_GROUP: &str = "group";
pub const MESSAGE_TYPE_PRIVATE: &str = "private";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Group role reported by the gateway for the sender of a group message.
pub enum SenderRole {
    Owner,
    Admin,
    Member,
    Unknown,
}

impl SenderRole {
    fn from_wire(value: &str) -> Self {
        match value {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            "member" => Self::Member,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Sender identity used for rule authorization.
pub struct SenderIdentity {
    pub user_id: i64,
    pub role: SenderRole,
}

impl SenderIdentity {
    /// Allowlisted senders hold full privilege regardless of group role.
    pub fn is_allowlisted(&self, admin_ids: &[i64]) -> bool {
        admin_ids.contains(&self.user_id)
    }

    pub fn is_privileged(&self, admin_ids: &[i64]) -> bool {
        self.is_allowlisted(admin_ids)
            || matches!(self.role, SenderRole::Owner | SenderRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One typed fragment of a chat message, in wire order.
pub enum MessageSegment {
    Text { text: String },
    At { target: String },
    Image,
    Video,
    Reply { id: String },
    Other { kind: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMessage {
    pub user_id: i64,
    pub group_id: i64,
    pub message_id: i64,
    pub raw_text: String,
    pub role: SenderRole,
    pub segments: Vec<MessageSegment>,
}

impl GroupMessage {
    pub fn sender(&self) -> SenderIdentity {
        SenderIdentity {
            user_id: self.user_id,
            role: self.role,
        }
    }

    /// Target of the first at-mention segment. `None` when no at-mention is
    /// present or the target is not numeric (e.g. an `@all` mention).
    pub fn first_at_target(&self) -> Option<i64> {
        self.segments.iter().find_map(|segment| match segment {
            MessageSegment::At { target } => target.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    /// Text segment immediately following the first at-mention. `None` when
    /// the at-mention is absent, is the last segment, or is not followed by
    /// a text segment.
    pub fn text_after_first_at(&self) -> Option<&str> {
        let at_index = self
            .segments
            .iter()
            .position(|segment| matches!(segment, MessageSegment::At { .. }))?;
        match self.segments.get(at_index + 1) {
            Some(MessageSegment::Text { text }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Embedded message id of the leading reply segment, when the message
    /// starts with a quoted message.
    pub fn leading_reply_id(&self) -> Option<i64> {
        match self.segments.first() {
            Some(MessageSegment::Reply { id }) => id.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn has_video_segment(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, MessageSegment::Video))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrivateMessage {
    pub user_id: i64,
    pub message_id: i64,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq)]
/// One classified inbound frame from the gateway.
pub enum InboundEvent {
    Heartbeat,
    Group(GroupMessage),
    Private(PrivateMessage),
    Other { post_type: String },
}

#[derive(Debug, Clone, Deserialize)]
struct RawSender {
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSegment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct RawInboundFrame {
    #[serde(default)]
    post_type: String,
    #[serde(default)]
    message_type: String,
    #[serde(default)]
    sender: Option<RawSender>,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    raw_message: Option<String>,
    #[serde(default)]
    message: Value,
}

/// Classifies one raw inbound frame. Malformed JSON or missing required
/// fields on a message frame return an error; the caller logs and drops the
/// frame without tearing down the channel.
pub fn classify_inbound_frame(raw: &str) -> Result<InboundEvent> {
    let frame = serde_json::from_str::<RawInboundFrame>(raw)
        .context("failed to parse inbound gateway frame JSON")?;
    match (frame.post_type.as_str(), frame.message_type.as_str()) {
        (POST_TYPE_META_EVENT, _) => Ok(InboundEvent::Heartbeat),
        (POST_TYPE_MESSAGE, MESSAGE_TYPE_GROUP) => build_group_message(&frame),
        (POST_TYPE_MESSAGE, MESSAGE_TYPE_PRIVATE) => build_private_message(&frame),
        _ => Ok(InboundEvent::Other {
            post_type: frame.post_type,
        }),
    }
}

fn build_group_message(frame: &RawInboundFrame) -> Result<InboundEvent> {
    let sender = frame
        .sender
        .as_ref()
        .ok_or_else(|| anyhow!("group message frame is missing sender"))?;
    let user_id = sender
        .user_id
        .ok_or_else(|| anyhow!("group message frame is missing sender.user_id"))?;
    let group_id = frame
        .group_id
        .ok_or_else(|| anyhow!("group message frame is missing group_id"))?;
    let message_id = frame
        .message_id
        .ok_or_else(|| anyhow!("group message frame is missing message_id"))?;
    let raw_text = frame
        .raw_message
        .clone()
        .ok_or_else(|| anyhow!("group message frame is missing raw_message"))?;
    Ok(InboundEvent::Group(GroupMessage {
        user_id,
        group_id,
        message_id,
        raw_text,
        role: SenderRole::from_wire(&sender.role),
        segments: parse_segments(&frame.message),
    }))
}

fn build_private_message(frame: &RawInboundFrame) -> Result<InboundEvent> {
    let sender = frame
        .sender
        .as_ref()
        .ok_or_else(|| anyhow!("private message frame is missing sender"))?;
    let user_id = sender
        .user_id
        .ok_or_else(|| anyhow!("private message frame is missing sender.user_id"))?;
    let message_id = frame
        .message_id
        .ok_or_else(|| anyhow!("private message frame is missing message_id"))?;
    let raw_text = frame
        .raw_message
        .clone()
        .ok_or_else(|| anyhow!("private message frame is missing raw_message"))?;
    Ok(InboundEvent::Private(PrivateMessage {
        user_id,
        message_id,
        raw_text,
    }))
}

fn parse_segments(message: &Value) -> Vec<MessageSegment> {
    let Some(entries) = message.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            serde_json::from_value::<RawSegment>(entry.clone())
                .ok()
                .map(segment_from_raw)
        })
        .collect()
}

fn segment_from_raw(raw: RawSegment) -> MessageSegment {
    match raw.kind.as_str() {
        "text" => MessageSegment::Text {
            text: data_field_string(&raw.data, "text"),
        },
        "at" => MessageSegment::At {
            target: data_field_string(&raw.data, "qq"),
        },
        "image" => MessageSegment::Image,
        "video" => MessageSegment::Video,
        "reply" => MessageSegment::Reply {
            id: data_field_string(&raw.data, "id"),
        },
        other => MessageSegment::Other {
            kind: other.to_string(),
        },
    }
}

// Gateways disagree on whether segment ids are numbers or strings.
fn data_field_string(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn group_frame(raw_message: &str, segments: Value) -> String {
        json!({
            "post_type": "message",
            "message_type": "group",
            "sender": { "user_id": 555, "role": "member" },
            "group_id": 100,
            "message_id": 42,
            "raw_message": raw_message,
            "message": segments,
        })
        .to_string()
    }

    #[test]
    fn unit_classify_heartbeat_frame() {
        let raw = json!({ "post_type": "meta_event", "meta_event_type": "heartbeat" });
        let event = classify_inbound_frame(&raw.to_string()).expect("classify");
        assert_eq!(event, InboundEvent::Heartbeat);
    }

    #[test]
    fn unit_classify_group_message_frame() {
        let raw = group_frame(
            "hello",
            json!([{ "type": "text", "data": { "text": "hello" } }]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&raw).expect("classify") else {
            panic!("expected group message");
        };
        assert_eq!(message.user_id, 555);
        assert_eq!(message.group_id, 100);
        assert_eq!(message.message_id, 42);
        assert_eq!(message.role, SenderRole::Member);
        assert_eq!(
            message.segments,
            vec![MessageSegment::Text {
                text: "hello".to_string()
            }]
        );
    }

    #[test]
    fn unit_classify_private_message_frame() {
        let raw = json!({
            "post_type": "message",
            "message_type": "private",
            "sender": { "user_id": 7, "role": "" },
            "message_id": 9,
            "raw_message": "hi",
        });
        let InboundEvent::Private(message) =
            classify_inbound_frame(&raw.to_string()).expect("classify")
        else {
            panic!("expected private message");
        };
        assert_eq!(message.user_id, 7);
        assert_eq!(message.raw_text, "hi");
    }

    #[test]
    fn unit_classify_unknown_post_type_maps_to_other() {
        let raw = json!({ "post_type": "notice", "notice_type": "group_increase" });
        let event = classify_inbound_frame(&raw.to_string()).expect("classify");
        assert_eq!(
            event,
            InboundEvent::Other {
                post_type: "notice".to_string()
            }
        );
    }

    #[test]
    fn unit_classify_rejects_malformed_json() {
        let error = classify_inbound_frame("{not json").expect_err("must fail");
        assert!(error
            .to_string()
            .contains("failed to parse inbound gateway frame JSON"));
    }

    #[test]
    fn unit_classify_rejects_group_frame_missing_group_id() {
        let raw = json!({
            "post_type": "message",
            "message_type": "group",
            "sender": { "user_id": 555, "role": "member" },
            "message_id": 42,
            "raw_message": "hello",
            "message": [],
        });
        let error = classify_inbound_frame(&raw.to_string()).expect_err("must fail");
        assert!(error.to_string().contains("missing group_id"));
    }

    #[test]
    fn unit_segment_accessors_read_first_at_and_following_text() {
        let raw = group_frame(
            "ban[CQ:at,qq=888] 5",
            json!([
                { "type": "text", "data": { "text": "ban" } },
                { "type": "at", "data": { "qq": "888" } },
                { "type": "text", "data": { "text": " 5" } },
            ]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&raw).expect("classify") else {
            panic!("expected group message");
        };
        assert_eq!(message.first_at_target(), Some(888));
        assert_eq!(message.text_after_first_at(), Some(" 5"));
    }

    #[test]
    fn unit_segment_accessors_handle_trailing_and_missing_at() {
        let trailing = group_frame(
            "kick[CQ:at,qq=888]",
            json!([
                { "type": "text", "data": { "text": "kick" } },
                { "type": "at", "data": { "qq": 888 } },
            ]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&trailing).expect("classify")
        else {
            panic!("expected group message");
        };
        assert_eq!(message.first_at_target(), Some(888));
        assert_eq!(message.text_after_first_at(), None);

        let missing = group_frame("kick", json!([{ "type": "text", "data": { "text": "kick" } }]));
        let InboundEvent::Group(message) = classify_inbound_frame(&missing).expect("classify")
        else {
            panic!("expected group message");
        };
        assert_eq!(message.first_at_target(), None);
    }

    #[test]
    fn unit_non_numeric_at_target_is_treated_as_absent() {
        let raw = group_frame(
            "ban[CQ:at,qq=all]",
            json!([
                { "type": "text", "data": { "text": "ban" } },
                { "type": "at", "data": { "qq": "all" } },
            ]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&raw).expect("classify") else {
            panic!("expected group message");
        };
        assert_eq!(message.first_at_target(), None);
    }

    #[test]
    fn unit_leading_reply_id_and_video_detection() {
        let raw = group_frame(
            "[CQ:reply,id=123]recall",
            json!([
                { "type": "reply", "data": { "id": "123" } },
                { "type": "text", "data": { "text": "recall" } },
            ]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&raw).expect("classify") else {
            panic!("expected group message");
        };
        assert_eq!(message.leading_reply_id(), Some(123));
        assert!(!message.has_video_segment());

        let video = group_frame(
            "[CQ:video,file=v.mp4]",
            json!([{ "type": "video", "data": { "file": "v.mp4" } }]),
        );
        let InboundEvent::Group(message) = classify_inbound_frame(&video).expect("classify") else {
            panic!("expected group message");
        };
        assert!(message.has_video_segment());
        assert_eq!(message.leading_reply_id(), None);
    }

    #[test]
    fn regression_string_message_payload_yields_empty_segments() {
        let raw = group_frame("hello", json!("hello"));
        let InboundEvent::Group(message) = classify_inbound_frame(&raw).expect("classify") else {
            panic!("expected group message");
        };
        assert!(message.segments.is_empty());
    }
}
