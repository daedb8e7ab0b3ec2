//! Error types for the MQTT handshake and acknowledgment core
//!
//! Pending TCP or TLS progress is reported through
//! [`ConnectStatus`](crate::transport::mqtt::ConnectStatus), never as an error.
//! Everything here ends the request it was raised for.

use crate::transport::mqtt::ConnectPhase;
use crate::transport::{SocketHandle, TransportError};
use thiserror::Error;

/// Main error type for handshake, subscription and dispatch operations
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Socket error while connecting to {host}:{port}")]
    Socket {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    #[error("Failed to configure TLS for {host}")]
    TlsConfiguration {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to send {packet} packet")]
    PacketSend {
        packet: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Handshake already in progress (phase {0:?})")]
    HandshakeInProgress(ConnectPhase),

    #[error("Nothing to resume in phase {0:?}")]
    InvalidPhase(ConnectPhase),

    #[error("Session {client_id} has no socket")]
    NotConnected { client_id: String },

    #[error("No session registered for {0}")]
    SessionNotFound(SocketHandle),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Coarse status an error maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// TCP connect, TLS configuration or TLS handshake failed
    SocketError,
    /// A control packet could not be serialised or written
    PacketSendError,
    /// The caller asked for something the session cannot do
    InvalidRequest,
    /// Registry out of sync with the transport
    InternalError,
}

impl MqttError {
    pub fn status(&self) -> ErrorStatus {
        match self {
            MqttError::Socket { .. } | MqttError::TlsConfiguration { .. } => {
                ErrorStatus::SocketError
            }
            MqttError::PacketSend { .. } => ErrorStatus::PacketSendError,
            MqttError::HandshakeInProgress(_)
            | MqttError::InvalidPhase(_)
            | MqttError::NotConnected { .. }
            | MqttError::InvalidRequest { .. } => ErrorStatus::InvalidRequest,
            MqttError::SessionNotFound(_) => ErrorStatus::InternalError,
        }
    }

    /// Create invalid request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Result type for MQTT core operations
pub type MqttResult<T> = Result<T, MqttError>;
