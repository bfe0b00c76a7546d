//! Pub/Sub push delivery envelope.
//!
//! Push subscriptions POST a JSON wrapper whose `message.data` field holds
//! the base64-encoded payload the publisher sent.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::{PubSubError, PubSubResult};

/// The wrapper Pub/Sub wraps around every push delivery.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

impl PushEnvelope {
    /// Decode the payload bytes.
    pub fn decode_data(&self) -> PubSubResult<Vec<u8>> {
        BASE64
            .decode(&self.message.data)
            .map_err(|e| PubSubError::invalid_envelope(format!("bad base64 data: {e}")))
    }

    /// Decode the payload as JSON into `T`.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> PubSubResult<T> {
        let bytes = self.decode_data()?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PubSubError::invalid_envelope(format!("bad JSON payload: {e}")))
    }
}
