use serde::{Deserialize, Serialize};

use crate::channel::ChannelKey;

/// Application message travelling over an outgoing connection.
///
/// # Fields
///
/// - `channel` - The channel the message was sent on; receivers route by it.
/// - `message_id` - Unique id (UUID v4) assigned when the message is sent.
/// - `sender` - Node name of the hub that sent the message.
/// - `timestamp` - Milliseconds since the Unix epoch at send time.
/// - `payload` - The message body, already encoded as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub channel: ChannelKey,
    pub message_id: String,
    pub sender: String,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(channel: ChannelKey, sender: &str, payload: serde_json::Value) -> Self {
        Self {
            channel,
            message_id: uuid::Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            payload,
        }
    }
}
