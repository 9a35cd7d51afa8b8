// SPDX-License-Identifier: MPL-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DeviceClientResult;
use super::error_code::DeviceErrorCode;
use super::qos::Qos;

/// Application message envelope shared by the non-blocking client APIs.
///
/// One `Message` carries everything a single MQTT-level operation needs:
/// the topic, the QoS, an optional binary payload, and, for shadow
/// operations, the rejection code and text the service reported. The same
/// envelope is used for outbound publishes, inbound deliveries, and as the
/// result carrier handed back through completion callbacks.
///
/// The payload is never shared with callers. [`Message::payload`] returns
/// an independent copy on every call, and the setters take ownership of
/// the buffer they store, so no outside reference can observe or mutate
/// the internal bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Message {
    topic: String,
    qos: Option<Qos>,
    payload: Option<Vec<u8>>,
    error_code: Option<DeviceErrorCode>,
    error_message: Option<String>,
}

impl Message {
    /// Create a message with no payload.
    pub fn new(topic: impl Into<String>, qos: Qos) -> Self {
        Message {
            topic: topic.into(),
            qos: Some(qos),
            payload: None,
            error_code: None,
            error_message: None,
        }
    }

    /// Create a message carrying a binary payload.
    pub fn with_payload(topic: impl Into<String>, qos: Qos, payload: impl Into<Vec<u8>>) -> Self {
        Message {
            topic: topic.into(),
            qos: Some(qos),
            payload: Some(payload.into()),
            error_code: None,
            error_message: None,
        }
    }

    /// Create a message carrying a text payload, stored as its UTF-8
    /// encoding.
    pub fn with_string_payload(
        topic: impl Into<String>,
        qos: Qos,
        payload: impl Into<String>,
    ) -> Self {
        Message {
            topic: topic.into(),
            qos: Some(qos),
            payload: Some(payload.into().into_bytes()),
            error_code: None,
            error_message: None,
        }
    }

    /// Create a builder for assembling a message field by field.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// The topic this message targets or was received on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Replace the topic.
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    /// The QoS level, if one was specified.
    pub fn qos(&self) -> Option<Qos> {
        self.qos
    }

    /// Replace the QoS level.
    pub fn set_qos(&mut self, qos: Qos) {
        self.qos = Some(qos);
    }

    /// An independent copy of the payload bytes, or `None` if no payload
    /// is set.
    ///
    /// Every call allocates a fresh copy. Mutating the returned buffer
    /// has no effect on the message.
    pub fn payload(&self) -> Option<Vec<u8>> {
        self.payload.clone()
    }

    /// Replace the payload, or clear it with `None`.
    ///
    /// The message takes sole ownership of the buffer; no reference to
    /// it is retained by or exposed to the caller afterwards.
    pub fn set_payload(&mut self, payload: Option<Vec<u8>>) {
        self.payload = payload;
    }

    /// The payload decoded as UTF-8 text, or `None` if no payload is set.
    ///
    /// Decoding failure means the caller asked for a text view of bytes
    /// that are not text. That is a usage defect, reported as
    /// [`DeviceClientError::PayloadNotUtf8`], never by substituting
    /// replacement characters.
    ///
    /// [`DeviceClientError::PayloadNotUtf8`]: super::error::DeviceClientError::PayloadNotUtf8
    pub fn string_payload(&self) -> DeviceClientResult<Option<String>> {
        match &self.payload {
            None => Ok(None),
            Some(bytes) => {
                let text = String::from_utf8(bytes.clone())?;
                Ok(Some(text))
            }
        }
    }

    /// Replace the payload with the UTF-8 encoding of `payload`, or clear
    /// it with `None`.
    pub fn set_string_payload(&mut self, payload: Option<String>) {
        self.payload = payload.map(String::into_bytes);
    }

    /// The rejection code the service attached to this message, if any.
    pub fn error_code(&self) -> Option<DeviceErrorCode> {
        self.error_code
    }

    /// Set or clear the service rejection code.
    pub fn set_error_code(&mut self, error_code: Option<DeviceErrorCode>) {
        self.error_code = error_code;
    }

    /// The rejection text the service attached to this message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Set or clear the service rejection text.
    pub fn set_error_message(&mut self, error_message: Option<String>) {
        self.error_message = error_message;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload_len = self.payload.as_ref().map(Vec::len).unwrap_or(0);
        match self.qos {
            Some(qos) => write!(f, "{} ({}, {} bytes)", self.topic, qos, payload_len),
            None => write!(f, "{} ({} bytes)", self.topic, payload_len),
        }
    }
}

/// Builder for [`Message`].
///
/// Only the topic is mandatory. QoS, payload, and the error descriptor
/// all stay unset unless provided.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    topic: Option<String>,
    qos: Option<Qos>,
    payload: Option<Vec<u8>>,
    error_code: Option<DeviceErrorCode>,
    error_message: Option<String>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        MessageBuilder {
            topic: None,
            qos: None,
            payload: None,
            error_code: None,
            error_message: None,
        }
    }

    /// Set the topic (required).
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the QoS level.
    pub fn qos(mut self, qos: Qos) -> Self {
        self.qos = Some(qos);
        self
    }

    /// Set a binary payload.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Set a text payload, stored as its UTF-8 encoding.
    pub fn string_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into().into_bytes());
        self
    }

    /// Set the service rejection code.
    pub fn error_code(mut self, error_code: DeviceErrorCode) -> Self {
        self.error_code = Some(error_code);
        self
    }

    /// Set the service rejection text.
    pub fn error_message(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// Build the message, failing if no topic was provided.
    pub fn build(self) -> Result<Message, MessageBuilderError> {
        let topic = self.topic.ok_or(MessageBuilderError::NoTopic)?;
        Ok(Message {
            topic,
            qos: self.qos,
            payload: self.payload,
            error_code: self.error_code,
            error_message: self.error_message,
        })
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Error from [`MessageBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBuilderError {
    /// No topic was provided.
    NoTopic,
}

impl fmt::Display for MessageBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBuilderError::NoTopic => {
                write!(f, "Topic not provided. Call topic() to set the topic.")
            }
        }
    }
}

impl std::error::Error for MessageBuilderError {}
