// SPDX-License-Identifier: MPL-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DeviceClientError;

/// Service-reported rejection code attached to a message by the device
/// shadow service.
///
/// The numeric values follow the HTTP-style codes the shadow service
/// reports in its rejection documents. A code on a message describes why
/// the service rejected the request; it is independent of transport-level
/// failures, which are reported through completion callbacks instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[repr(u16)]
pub enum DeviceErrorCode {
    /// The request document was malformed.
    BadRequest = 400,
    /// The caller is not authenticated.
    Unauthorized = 401,
    /// The caller is not permitted to perform the operation.
    Forbidden = 403,
    /// The named shadow does not exist.
    NotFound = 404,
    /// The request conflicts with the current shadow version.
    Conflict = 409,
    /// The request document exceeds the service size limit.
    PayloadTooLarge = 413,
    /// The request document encoding is not supported.
    UnsupportedMediaType = 415,
    /// The caller exceeded the service rate limit.
    TooManyRequests = 429,
    /// The service failed to process the request.
    InternalServiceFailure = 500,
}

impl DeviceErrorCode {
    /// The numeric code as reported by the service.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Short human-readable name for this code.
    pub fn description(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "version conflict",
            Self::PayloadTooLarge => "payload too large",
            Self::UnsupportedMediaType => "unsupported media type",
            Self::TooManyRequests => "too many requests",
            Self::InternalServiceFailure => "internal service failure",
        }
    }
}

impl TryFrom<u16> for DeviceErrorCode {
    type Error = DeviceClientError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            400 => Ok(Self::BadRequest),
            401 => Ok(Self::Unauthorized),
            403 => Ok(Self::Forbidden),
            404 => Ok(Self::NotFound),
            409 => Ok(Self::Conflict),
            413 => Ok(Self::PayloadTooLarge),
            415 => Ok(Self::UnsupportedMediaType),
            429 => Ok(Self::TooManyRequests),
            500 => Ok(Self::InternalServiceFailure),
            _ => Err(DeviceClientError::InvalidErrorCode { value }),
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(DeviceErrorCode::BadRequest.as_u16(), 400);
        assert_eq!(DeviceErrorCode::Unauthorized.as_u16(), 401);
        assert_eq!(DeviceErrorCode::Forbidden.as_u16(), 403);
        assert_eq!(DeviceErrorCode::NotFound.as_u16(), 404);
        assert_eq!(DeviceErrorCode::Conflict.as_u16(), 409);
        assert_eq!(DeviceErrorCode::PayloadTooLarge.as_u16(), 413);
        assert_eq!(DeviceErrorCode::UnsupportedMediaType.as_u16(), 415);
        assert_eq!(DeviceErrorCode::TooManyRequests.as_u16(), 429);
        assert_eq!(DeviceErrorCode::InternalServiceFailure.as_u16(), 500);
    }

    #[test]
    fn test_error_code_round_trip() {
        let codes = vec![
            DeviceErrorCode::BadRequest,
            DeviceErrorCode::Unauthorized,
            DeviceErrorCode::Forbidden,
            DeviceErrorCode::NotFound,
            DeviceErrorCode::Conflict,
            DeviceErrorCode::PayloadTooLarge,
            DeviceErrorCode::UnsupportedMediaType,
            DeviceErrorCode::TooManyRequests,
            DeviceErrorCode::InternalServiceFailure,
        ];

        for code in codes {
            assert_eq!(DeviceErrorCode::try_from(code.as_u16()).unwrap(), code);
        }
    }

    #[test]
    fn test_error_code_from_unknown_value() {
        let result = DeviceErrorCode::try_from(418);
        assert!(matches!(
            result,
            Err(DeviceClientError::InvalidErrorCode { value: 418 })
        ));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(
            DeviceErrorCode::Conflict.to_string(),
            "version conflict (409)"
        );
        assert_eq!(
            DeviceErrorCode::InternalServiceFailure.to_string(),
            "internal service failure (500)"
        );
    }
}
