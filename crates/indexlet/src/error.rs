//! Error taxonomy for the worker bridge.
//!
//! Every failure a caller can observe is one of these variants, and each
//! carries a machine-readable kind for the HTTP error envelope. Shutdown-path
//! failures (process already gone, close errors) are logged and treated as
//! already-satisfied conditions instead of surfacing here.

use serde::Serialize;

/// Errors surfaced by the bridge to operation callers.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The worker executable could not be found or launched.
    #[error("failed to spawn worker: {message}")]
    Spawn { message: String },

    /// Could not connect to the worker, or the connection was lost
    /// mid-exchange, or the service is shutting down.
    #[error("worker connection failed: {message}")]
    Connection { message: String },

    /// The worker's reply was not a well-formed protocol message.
    #[error("failed to decode worker response: {message}")]
    Decode { message: String },

    /// The worker reported an internal failure.
    #[error("worker error: {message}")]
    RemoteService { message: String },

    /// The worker rejected the request parameters inside an otherwise
    /// successful response.
    #[error("worker rejected parameters: {message}")]
    RemoteValidation { message: String },

    /// The bridge rejected the parameters before contacting the worker.
    #[error("invalid input: {message}")]
    InputValidation { message: String },
}

impl BridgeError {
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Spawn {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn remote_service(message: impl Into<String>) -> Self {
        Self::RemoteService {
            message: message.into(),
        }
    }

    pub fn remote_validation(message: impl Into<String>) -> Self {
        Self::RemoteValidation {
            message: message.into(),
        }
    }

    pub fn input_validation(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
        }
    }

    /// Machine-readable kind for the error envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::RemoteService { .. } => ErrorKind::RemoteService,
            Self::RemoteValidation { .. } => ErrorKind::RemoteValidation,
            Self::InputValidation { .. } => ErrorKind::InputValidation,
        }
    }
}

/// Wire-facing error kinds, serialized into the uniform envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Spawn,
    Connection,
    Decode,
    RemoteService,
    RemoteValidation,
    InputValidation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Connection => "connection",
            Self::Decode => "decode",
            Self::RemoteService => "remote_service",
            Self::RemoteValidation => "remote_validation",
            Self::InputValidation => "input_validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(BridgeError::spawn("x").kind(), ErrorKind::Spawn);
        assert_eq!(BridgeError::connection("x").kind(), ErrorKind::Connection);
        assert_eq!(BridgeError::decode("x").kind(), ErrorKind::Decode);
        assert_eq!(BridgeError::remote_service("x").kind(), ErrorKind::RemoteService);
        assert_eq!(
            BridgeError::remote_validation("x").kind(),
            ErrorKind::RemoteValidation
        );
        assert_eq!(
            BridgeError::input_validation("x").kind(),
            ErrorKind::InputValidation
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let kind = serde_json::to_value(ErrorKind::RemoteValidation).unwrap();
        assert_eq!(kind, serde_json::json!("remote_validation"));
        assert_eq!(ErrorKind::RemoteValidation.as_str(), "remote_validation");
    }

    #[test]
    fn messages_carry_context() {
        let err = BridgeError::remote_service("index not loaded");
        assert_eq!(err.to_string(), "worker error: index not loaded");

        let err = BridgeError::input_validation("lineNumber must be a positive integer");
        assert_eq!(
            err.to_string(),
            "invalid input: lineNumber must be a positive integer"
        );
    }
}
