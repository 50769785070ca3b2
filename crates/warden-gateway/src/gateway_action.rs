use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const ACTION_SEND_GROUP_MSG: &str = "send_group_msg";
pub const ACTION_SEND_PRIVATE_MSG: &str = "send_private_msg";
pub const ACTION_DELETE_MSG: &str = "delete_msg";
pub const ACTION_SET_GROUP_BAN: &str = "set_group_ban";
pub const ACTION_SET_GROUP_WHOLE_BAN: &str = "set_group_whole_ban";
pub const ACTION_SET_GROUP_KICK: &str = "set_group_kick";
pub const ACTION_AUTHENTICATE: &str = "authenticate";

#[derive(Debug, Clone, PartialEq, Serialize)]
/// One outbound action request: a named gateway action plus a parameter bag.
pub struct OutboundAction {
    pub action: String,
    pub params: Map<String, Value>,
}

impl OutboundAction {
    pub fn new(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }

    /// Serializes the `{action, params}` envelope for the wire.
    pub fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize outbound action frame")
    }

    pub fn send_group_msg(group_id: i64, content: &str) -> Self {
        Self::new(
            ACTION_SEND_GROUP_MSG,
            action_params(json!({ "group_id": group_id, "message": content })),
        )
    }

    pub fn send_private_msg(user_id: i64, content: &str) -> Self {
        Self::new(
            ACTION_SEND_PRIVATE_MSG,
            action_params(json!({ "user_id": user_id, "message": content })),
        )
    }

    pub fn delete_msg(message_id: i64) -> Self {
        Self::new(
            ACTION_DELETE_MSG,
            action_params(json!({ "message_id": message_id })),
        )
    }

    pub fn set_group_ban(group_id: i64, user_id: i64, duration_seconds: u64) -> Self {
        Self::new(
            ACTION_SET_GROUP_BAN,
            action_params(json!({
                "group_id": group_id,
                "user_id": user_id,
                "duration": duration_seconds,
            })),
        )
    }

    pub fn set_group_whole_ban(group_id: i64, enable: bool) -> Self {
        Self::new(
            ACTION_SET_GROUP_WHOLE_BAN,
            action_params(json!({ "group_id": group_id, "enable": enable })),
        )
    }

    pub fn set_group_kick(group_id: i64, user_id: i64) -> Self {
        Self::new(
            ACTION_SET_GROUP_KICK,
            action_params(json!({ "group_id": group_id, "user_id": user_id })),
        )
    }

    pub fn authenticate(token: &str) -> Self {
        Self::new(
            ACTION_AUTHENTICATE,
            action_params(json!({ "token": token })),
        )
    }
}

fn action_params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
/// Fire-and-forget submission of one outbound action; no acknowledgment is
/// tracked by the caller.
pub trait ActionSink: Send {
    async fn submit(&mut self, action: OutboundAction) -> Result<()>;
}
