// SPDX-License-Identifier: MPL-2.0

use std::fmt;

/// Errors reported by the device client core.
///
/// Operation outcomes (publish acknowledged, shadow request rejected, and
/// so on) are never reported through this type; those travel through the
/// completion callbacks on the registered message sink. This enum covers
/// local failures only: malformed data handed to the library, exhausted
/// buffers, and dispatcher plumbing faults.
#[derive(Debug, Clone, serde::Serialize)]
pub enum DeviceClientError {
    /// A payload could not be decoded as UTF-8 text.
    PayloadNotUtf8 {
        /// Number of leading bytes that formed valid UTF-8.
        valid_up_to: usize,
        /// The payload bytes that failed to decode.
        payload: Vec<u8>,
    },

    /// A numeric QoS value outside 0..=2.
    InvalidQos { value: u8 },

    /// A numeric rejection code the shadow service never reports.
    InvalidErrorCode { value: u16 },

    /// The pending-operation registry is at capacity.
    PendingLimitReached { capacity: usize },

    /// A completion was reported for an operation id that is not
    /// registered (already completed, timed out, or never registered).
    UnknownOperation { id: u64 },

    /// An operation id was registered twice.
    DuplicateOperation { id: u64 },

    /// A configuration field failed validation.
    InvalidConfiguration { field: String, reason: String },

    /// A dispatcher channel is closed because the worker is gone.
    ChannelClosed { channel: String },

    /// An unexpected internal failure.
    InternalError { message: String },
}

impl DeviceClientError {
    /// Returns true for errors that indicate a bug in the calling code
    /// rather than a runtime condition.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            DeviceClientError::PayloadNotUtf8 { .. }
                | DeviceClientError::InvalidQos { .. }
                | DeviceClientError::InvalidErrorCode { .. }
                | DeviceClientError::DuplicateOperation { .. }
        )
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceClientError::PendingLimitReached { .. })
    }

    /// Returns true for errors after which the dispatcher is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceClientError::InvalidConfiguration { .. }
                | DeviceClientError::ChannelClosed { .. }
                | DeviceClientError::InternalError { .. }
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            DeviceClientError::PayloadNotUtf8 {
                valid_up_to,
                payload,
            } => {
                let preview = if payload.len() > 20 {
                    format!(
                        "{}... ({} bytes total)",
                        hex::encode(&payload[..20]),
                        payload.len()
                    )
                } else {
                    hex::encode(payload)
                };
                format!(
                    "Payload is not valid UTF-8 (valid up to byte {}): {}",
                    valid_up_to, preview
                )
            }
            DeviceClientError::InvalidQos { value } => {
                format!("Invalid QoS value: {} (expected 0, 1 or 2)", value)
            }
            DeviceClientError::InvalidErrorCode { value } => {
                format!("Unknown device error code: {}", value)
            }
            DeviceClientError::PendingLimitReached { capacity } => {
                format!(
                    "Pending operation limit reached ({} operations). Wait for completions or raise max_pending.",
                    capacity
                )
            }
            DeviceClientError::UnknownOperation { id } => {
                format!(
                    "Operation {} is not pending. It may have already completed or timed out.",
                    id
                )
            }
            DeviceClientError::DuplicateOperation { id } => {
                format!("Operation {} is already registered.", id)
            }
            DeviceClientError::InvalidConfiguration { field, reason } => {
                format!("Invalid configuration for '{}': {}", field, reason)
            }
            DeviceClientError::ChannelClosed { channel } => {
                format!(
                    "Channel '{}' is closed. The dispatcher worker is no longer running.",
                    channel
                )
            }
            DeviceClientError::InternalError { message } => {
                format!("Internal error: {}", message)
            }
        }
    }
}

impl fmt::Display for DeviceClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for DeviceClientError {}

impl From<std::string::FromUtf8Error> for DeviceClientError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        let valid_up_to = error.utf8_error().valid_up_to();
        DeviceClientError::PayloadNotUtf8 {
            valid_up_to,
            payload: error.into_bytes(),
        }
    }
}

/// Result type alias for device client operations.
pub type DeviceClientResult<T> = Result<T, DeviceClientError>;
