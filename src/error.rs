// MIT License - Copyright (c) 2026 Peter Wright

use std::fmt;

use crate::protocol::ParseError;

/// Error codes reported by the bridge on `~ERROR,<n>` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeErrorCode {
    /// 1 - Parameter count mismatch
    ParameterCount,
    /// 2 - Object does not exist
    ObjectDoesNotExist,
    /// 3 - Invalid action number
    InvalidAction,
    /// 4 - Parameter data out of range
    OutOfRange,
    /// 5 - Parameter data malformed
    Malformed,
    /// 6 - Unsupported command
    Unsupported,
}

impl BridgeErrorCode {
    /// Parse the numeric code that follows `~ERROR,`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::ParameterCount),
            2 => Some(Self::ObjectDoesNotExist),
            3 => Some(Self::InvalidAction),
            4 => Some(Self::OutOfRange),
            5 => Some(Self::Malformed),
            6 => Some(Self::Unsupported),
            _ => None,
        }
    }

    /// The numeric wire value.
    pub fn code(&self) -> u32 {
        match self {
            Self::ParameterCount => 1,
            Self::ObjectDoesNotExist => 2,
            Self::InvalidAction => 3,
            Self::OutOfRange => 4,
            Self::Malformed => 5,
            Self::Unsupported => 6,
        }
    }

    /// Human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ParameterCount => "Parameter count mismatch",
            Self::ObjectDoesNotExist => "Object does not exist",
            Self::InvalidAction => "Invalid action number",
            Self::OutOfRange => "Parameter data out of range",
            Self::Malformed => "Parameter data malformed",
            Self::Unsupported => "Unsupported command",
        }
    }
}

impl fmt::Display for BridgeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// Why a login handshake did not reach the command prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The prompt did not arrive within the login timeout.
    Timeout,
    /// The bridge refused the credentials.
    Rejected,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("login timed out"),
            Self::Rejected => f.write_str("credentials rejected"),
        }
    }
}

/// All errors that can occur in the lutron-lan-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum LutronError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed: {0}")]
    Auth(AuthFailure),

    #[error("Malformed line: {0}")]
    Parse(#[from] ParseError),

    #[error("Query timeout: {command}")]
    QueryTimeout { command: String },

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Not connected")]
    NotConnected,

    #[error("Query already pending: integration={integration_id} action={action}")]
    QueryInFlight { integration_id: u32, action: u32 },

    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },

    #[error("Connection closed")]
    Closed,

    #[error("Channel closed")]
    ChannelClosed,
}

impl LutronError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LutronError::Io(_)
                | LutronError::Connection { .. }
                | LutronError::QueryTimeout { .. }
                | LutronError::ConnectionLost
                | LutronError::NotConnected
                | LutronError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, LutronError>;
