//! Client-side MQTT connection establishment and acknowledgment correlation
//!
//! This module separates pure parsing and bookkeeping from the collaborator
//! calls that perform I/O.
//!
//! # Architecture
//!
//! - [`address`] - broker endpoint parsing (IPv4, host names, bracketed IPv6)
//! - [`session`] - per-client handshake and liveness state
//! - [`registry`] - socket to session lookup injected into the dispatcher
//! - [`connection`] - the resumable TCP / TLS / CONNECT state machine
//! - [`subscription`] - SUBSCRIBE and UNSUBSCRIBE issuance
//! - [`ack_dispatcher`] - PINGRESP, SUBACK and UNSUBACK handling
//!
//! # Usage
//!
//! ```rust
//! use mqttlink::testing::{MockPacketSender, MockSocketLayer, MockTls};
//! use mqttlink::transport::SocketHandle;
//! use mqttlink::transport::mqtt::{
//!     AckDispatcher, ConnectRequest, ConnectStatus, ConnectionStateMachine, Session,
//!     SessionRegistry,
//! };
//!
//! let mut sockets = MockSocketLayer::new().with_tcp_in_progress(SocketHandle(5));
//! let mut packets = MockPacketSender::new();
//! let mut session: Session<MockTls> = Session::new("sensor-01");
//! let request = ConnectRequest::new("broker.example.com:1883");
//!
//! let status = ConnectionStateMachine::connect(&mut session, &request, &mut sockets, &mut packets)?;
//! assert_eq!(status, ConnectStatus::TcpPending);
//!
//! // later, once the poll loop sees the socket become writable
//! let status = ConnectionStateMachine::advance(&mut session, &request, &mut sockets, &mut packets)?;
//! assert_eq!(status, ConnectStatus::AwaitingConnack);
//!
//! let mut registry = SessionRegistry::new();
//! registry.register(session).map_err(|(error, _)| error)?;
//! AckDispatcher::new(&mut registry).handle_ping_response(SocketHandle(5))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ack_dispatcher;
pub mod address;
pub mod connection;
pub mod registry;
pub mod session;
pub mod subscription;

// Re-export public types for convenience
pub use ack_dispatcher::{AckDispatcher, DispatchStatus, Suback, SubackReason, Unsuback};
pub use address::{parse_address, Endpoint, DEFAULT_PORT};
pub use connection::{ConnectRequest, ConnectStatus, ConnectionStateMachine};
pub use registry::{ClientRegistry, RegistryError, SessionRegistry};
pub use session::{ConnectPhase, Session};
pub use subscription::{SubscribeRequest, SubscriptionIssuer};
