//! Realtime event names and typed decoding of the wire frames.
//!
//! Frames are JSON objects `{event, data}`. Known events decode into
//! [`ServerEvent`]; unknown names are passed through as [`ServerEvent::Other`]
//! so a newer backend does not break older clients.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::models::{Chat, Message, Presence, PresenceStatus};
use crate::error::{Error, Result};

// Client-emitted events.
pub const EVENT_CHAT_JOIN: &str = "chat:join";
pub const EVENT_CHAT_LEAVE: &str = "chat:leave";
pub const EVENT_MESSAGE_SEND: &str = "chat:message:send";
pub const EVENT_PRESENCE_ACTIVITY: &str = "presence:activity";

// Server-pushed events.
pub const EVENT_MESSAGE_NEW: &str = "chat:message:new";
pub const EVENT_LIST_UPDATE: &str = "chat:list:update";
pub const EVENT_PRESENCE_BULK: &str = "presence:bulk";
pub const EVENT_PRESENCE_UPDATE: &str = "presence:update";

/// One websocket frame in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdatePayload {
    pub user_id: String,
    pub status: PresenceStatus,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A server push, decoded.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new message landed in a chat the client has joined.
    MessageNew(Message),
    /// The chat list changed; carries the updated summary when the backend
    /// includes one, otherwise signals a refetch.
    ListUpdate(Option<Chat>),
    /// Wholesale presence refresh, user id to entry.
    PresenceBulk(HashMap<String, Presence>),
    /// Single presence change.
    PresenceUpdate(PresenceUpdatePayload),
    /// An event name this client does not know. Logged and ignored upstream.
    Other { event: String, data: Value },
}

impl ServerEvent {
    /// Decode a frame. Malformed payloads for known event names are decode
    /// errors; unknown names never fail.
    pub fn decode(frame: Frame) -> Result<Self> {
        match frame.event.as_str() {
            EVENT_MESSAGE_NEW => {
                let message: Message = serde_json::from_value(frame.data)
                    .map_err(|e| Error::Decode(format!("{EVENT_MESSAGE_NEW}: {e}")))?;
                Ok(ServerEvent::MessageNew(message))
            }
            EVENT_LIST_UPDATE => {
                if frame.data.is_null() {
                    return Ok(ServerEvent::ListUpdate(None));
                }
                let chat: Chat = serde_json::from_value(frame.data)
                    .map_err(|e| Error::Decode(format!("{EVENT_LIST_UPDATE}: {e}")))?;
                Ok(ServerEvent::ListUpdate(Some(chat)))
            }
            EVENT_PRESENCE_BULK => {
                let map: HashMap<String, Presence> = serde_json::from_value(frame.data)
                    .map_err(|e| Error::Decode(format!("{EVENT_PRESENCE_BULK}: {e}")))?;
                Ok(ServerEvent::PresenceBulk(map))
            }
            EVENT_PRESENCE_UPDATE => {
                let payload: PresenceUpdatePayload = serde_json::from_value(frame.data)
                    .map_err(|e| Error::Decode(format!("{EVENT_PRESENCE_UPDATE}: {e}")))?;
                Ok(ServerEvent::PresenceUpdate(payload))
            }
            _ => Ok(ServerEvent::Other {
                event: frame.event,
                data: frame.data,
            }),
        }
    }
}
