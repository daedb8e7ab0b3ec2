//! mqttlink - non-blocking MQTT client connection core
//!
//! Establishes broker connections through a resumable TCP, TLS and CONNECT
//! handshake, issues SUBSCRIBE / UNSUBSCRIBE requests, and routes inbound
//! PINGRESP, SUBACK and UNSUBACK packets back to their client sessions.
//!
//! Socket I/O, TLS and packet encoding are supplied by the caller through the
//! [`transport::SocketLayer`] and [`transport::PacketSender`] traits, so the
//! state machine can sit inside any poll loop.
//!
//! # Quick Start
//!
//! ```rust
//! use mqttlink::transport::mqtt::parse_address;
//!
//! let endpoint = parse_address("[::1]:8883");
//! assert_eq!(endpoint.host, "::1");
//! assert_eq!(endpoint.port, 8883);
//!
//! let endpoint = parse_address("broker.local");
//! assert_eq!(endpoint.port, mqttlink::transport::mqtt::DEFAULT_PORT);
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod testing;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use error::{ErrorStatus, MqttError, MqttResult};
pub use transport::mqtt::{
    AckDispatcher, ClientRegistry, ConnectPhase, ConnectRequest, ConnectStatus,
    ConnectionStateMachine, Session, SessionRegistry, SubscribeRequest, SubscriptionIssuer,
};
pub use transport::{PacketSender, SocketHandle, SocketLayer};
