//! Transport layer seams for the MQTT handshake core
//!
//! The handshake never touches sockets or the wire format directly. It talks to
//! two collaborators instead, so that the state machine can be driven by any
//! non-blocking I/O stack and exercised with scripted fakes in tests:
//!
//! - [`SocketLayer`] - TCP connect and TLS setup/handshake primitives
//! - [`PacketSender`] - serialises and writes CONNECT, SUBSCRIBE and UNSUBSCRIBE

use rumqttc::v5::mqttbytes::v5::{ConnectProperties, LastWillProperties, SubscribeProperties};
use rumqttc::v5::mqttbytes::QoS;
use std::fmt;
use thiserror::Error;

pub mod mqtt;

/// Opaque identity of a transport socket.
///
/// Acknowledgments are correlated to sessions purely by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketHandle(pub i32);

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// MQTT protocol level sent in CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// MQTT 3.1 (protocol level 3)
    V31,
    /// MQTT 3.1.1 (protocol level 4)
    #[default]
    V311,
    /// MQTT 5.0 (protocol level 5)
    V5,
}

impl ProtocolVersion {
    /// Protocol level byte as carried in the CONNECT variable header
    pub fn level(self) -> u8 {
        match self {
            ProtocolVersion::V31 => 3,
            ProtocolVersion::V311 => 4,
            ProtocolVersion::V5 => 5,
        }
    }

    /// Map a protocol level byte back to a version
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            3 => Some(ProtocolVersion::V31),
            4 => Some(ProtocolVersion::V311),
            5 => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    /// Whether this version carries properties and subscribe options
    pub fn supports_properties(self) -> bool {
        matches!(self, ProtocolVersion::V5)
    }
}

/// Errors reported by transport collaborators
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("Packet encoding failed: {0}")]
    Encode(String),
}

/// Outcome of starting a TCP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpStatus {
    /// The connection completed synchronously
    Connected,
    /// Non-blocking connect in progress (EINPROGRESS / EWOULDBLOCK)
    InProgress,
}

/// A socket created by [`SocketLayer::tcp_connect`], connected or not yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConnect {
    pub socket: SocketHandle,
    pub status: TcpStatus,
}

/// Outcome of a TLS handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsHandshake {
    Complete,
    /// The handshake needs more I/O before it can continue
    Interrupted,
}

/// TLS settings a session connects with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    /// Verify the server certificate against the connected host name
    pub verify: bool,
    /// Trust store override, PEM encoded
    pub ca_file: Option<String>,
    /// SNI / certificate name override; the parsed host is used when absent
    pub server_name: Option<String>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify: true,
            ca_file: None,
            server_name: None,
        }
    }
}

/// Non-blocking socket and TLS primitives
pub trait SocketLayer {
    /// Per-connection TLS state, owned by the session while connected
    type Tls;

    /// Create a socket and start connecting it to `host:port`
    fn tcp_connect(&mut self, host: &str, port: u16) -> Result<TcpConnect, TransportError>;

    /// Attach TLS to an already connected socket
    fn configure_tls(
        &mut self,
        socket: SocketHandle,
        options: &TlsOptions,
        host: &str,
    ) -> Result<Self::Tls, TransportError>;

    /// Drive the TLS handshake as far as it can go without blocking
    fn tls_handshake(
        &mut self,
        tls: &mut Self::Tls,
        socket: SocketHandle,
        host: &str,
        verify: bool,
    ) -> Result<TlsHandshake, TransportError>;
}

/// Username and password presented in CONNECT
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything the encoder needs to build a CONNECT packet
#[derive(Debug, Clone)]
pub struct ConnectPacket<'a> {
    pub socket: SocketHandle,
    pub client_id: &'a str,
    pub keep_alive: u16,
    pub clean_start: bool,
    pub version: ProtocolVersion,
    pub credentials: Option<&'a Credentials>,
    pub properties: Option<&'a ConnectProperties>,
    pub will_properties: Option<&'a LastWillProperties>,
}

/// Retain handling option of an MQTT 5 subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetainHandling {
    #[default]
    SendAtSubscribe,
    SendAtSubscribeIfNew,
    DoNotSend,
}

/// MQTT 5 subscription options shared by every filter of one SUBSCRIBE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

/// One topic filter with its requested QoS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter<'a> {
    pub filter: &'a str,
    pub qos: QoS,
}

/// A SUBSCRIBE ready for encoding
#[derive(Debug, Clone)]
pub struct SubscribePacket<'a> {
    pub socket: SocketHandle,
    pub client_id: &'a str,
    pub msg_id: u16,
    pub filters: Vec<TopicFilter<'a>>,
    /// Present only for MQTT 5 sessions
    pub options: Option<SubscribeOptions>,
    /// Present only for MQTT 5 sessions
    pub properties: Option<&'a SubscribeProperties>,
}

/// An UNSUBSCRIBE ready for encoding
#[derive(Debug, Clone)]
pub struct UnsubscribePacket<'a> {
    pub socket: SocketHandle,
    pub client_id: &'a str,
    pub msg_id: u16,
    pub topics: &'a [String],
}

/// Serialises control packets and writes them to the session's socket
pub trait PacketSender {
    fn send_connect(&mut self, packet: &ConnectPacket<'_>) -> Result<(), TransportError>;

    fn send_subscribe(&mut self, packet: &SubscribePacket<'_>) -> Result<(), TransportError>;

    fn send_unsubscribe(&mut self, packet: &UnsubscribePacket<'_>) -> Result<(), TransportError>;
}
