//! Resumable, non-blocking connection handshake
//!
//! A connect walks a session through TCP, optional TLS and the MQTT CONNECT
//! exchange. None of the steps block: when the socket layer reports that TCP or
//! TLS needs more I/O, the phase is recorded on the session and a pending
//! [`ConnectStatus`] is returned. The poll loop calls
//! [`ConnectionStateMachine::advance`] once the transport reports progress.
//!
//! CONNACK handling, handshake timeouts and socket teardown live outside this
//! module.

use super::address::{parse_address, Endpoint};
use super::session::{ConnectPhase, Session};
use crate::error::{MqttError, MqttResult};
use crate::transport::{
    ConnectPacket, PacketSender, ProtocolVersion, SocketHandle, SocketLayer, TcpStatus,
    TlsHandshake,
};
use rumqttc::v5::mqttbytes::v5::{ConnectProperties, LastWillProperties};
use tracing::{debug, info, warn};

/// Parameters of one connect attempt.
///
/// The same request is passed to [`ConnectionStateMachine::connect`] and to
/// every later [`ConnectionStateMachine::advance`] call for that attempt.
#[derive(Debug, Clone)]
pub struct ConnectRequest<'a> {
    /// `host[:port]` or `[ipv6][:port]`
    pub endpoint: &'a str,
    pub use_tls: bool,
    pub version: ProtocolVersion,
    pub connect_properties: Option<&'a ConnectProperties>,
    pub will_properties: Option<&'a LastWillProperties>,
}

impl<'a> ConnectRequest<'a> {
    pub fn new(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            use_tls: false,
            version: ProtocolVersion::default(),
            connect_properties: None,
            will_properties: None,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_connect_properties(mut self, properties: &'a ConnectProperties) -> Self {
        self.connect_properties = Some(properties);
        self
    }

    pub fn with_will_properties(mut self, properties: &'a LastWillProperties) -> Self {
        self.will_properties = Some(properties);
        self
    }
}

/// Non-error outcome of a connect or advance call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// CONNECT was sent; the session waits for CONNACK
    AwaitingConnack,
    /// TCP connect is in progress; call `advance` once the socket is writable
    TcpPending,
    /// TLS handshake needs more I/O; call `advance` once the socket is ready
    TlsPending,
}

/// Drives sessions through the connect phases
pub struct ConnectionStateMachine;

impl ConnectionStateMachine {
    /// Start a connect attempt on an idle session.
    ///
    /// Runs as far as the transport allows without blocking. A failed attempt
    /// leaves the session in [`ConnectPhase::Init`] with no socket so the whole
    /// sequence can be retried.
    ///
    /// A session stays in [`ConnectPhase::MqttPending`] after CONNECT is sent;
    /// callers must [`reset`](Self::reset) it before reconnecting after CONNACK
    /// or a disconnect, otherwise this returns
    /// [`MqttError::HandshakeInProgress`].
    pub fn connect<S, P>(
        session: &mut Session<S::Tls>,
        request: &ConnectRequest<'_>,
        sockets: &mut S,
        packets: &mut P,
    ) -> MqttResult<ConnectStatus>
    where
        S: SocketLayer,
        P: PacketSender,
    {
        if session.phase.is_pending() {
            return Err(MqttError::HandshakeInProgress(session.phase));
        }

        let _span = crate::mqtt_span!(client_id = %session.client_id(), operation = "connect")
            .entered();

        session.healthy = true;
        let endpoint = parse_address(request.endpoint);
        debug!(
            host = %endpoint.host,
            port = endpoint.port,
            tls = request.use_tls,
            "Starting MQTT connect"
        );

        let tcp = match sockets.tcp_connect(&endpoint.host, endpoint.port) {
            Ok(tcp) => tcp,
            Err(source) => {
                warn!(host = %endpoint.host, port = endpoint.port, "TCP connect failed: {}", source);
                return Err(MqttError::Socket {
                    host: endpoint.host.into_owned(),
                    port: endpoint.port,
                    source,
                });
            }
        };

        session.socket = Some(tcp.socket);
        Self::transition(session, ConnectPhase::TcpPending);

        match tcp.status {
            TcpStatus::InProgress => {
                debug!(socket = %tcp.socket, "TCP connect in progress");
                Ok(ConnectStatus::TcpPending)
            }
            TcpStatus::Connected => {
                Self::after_tcp(session, request, &endpoint, sockets, packets)
            }
        }
    }

    /// Resume a pending attempt after the transport reported progress.
    ///
    /// In [`ConnectPhase::TcpPending`] the TCP connect is taken as complete and
    /// the sequence continues with TLS (if requested) or CONNECT. In
    /// [`ConnectPhase::TlsPending`] the TLS handshake is driven again.
    pub fn advance<S, P>(
        session: &mut Session<S::Tls>,
        request: &ConnectRequest<'_>,
        sockets: &mut S,
        packets: &mut P,
    ) -> MqttResult<ConnectStatus>
    where
        S: SocketLayer,
        P: PacketSender,
    {
        let _span = crate::mqtt_span!(client_id = %session.client_id(), operation = "advance")
            .entered();

        let endpoint = parse_address(request.endpoint);
        match session.phase {
            ConnectPhase::TcpPending => {
                debug!("TCP connect completed");
                Self::after_tcp(session, request, &endpoint, sockets, packets)
            }
            ConnectPhase::TlsPending => Self::drive_tls(session, request, &endpoint, sockets, packets),
            phase @ (ConnectPhase::Init | ConnectPhase::MqttPending) => {
                Err(MqttError::InvalidPhase(phase))
            }
        }
    }

    /// Abandon any attempt in flight, e.g. after an external handshake timeout.
    ///
    /// Drops the TLS context and detaches the socket, which is returned so the
    /// caller can close it.
    pub fn reset<T>(session: &mut Session<T>) -> Option<SocketHandle> {
        if session.phase.is_pending() {
            debug!(
                client_id = session.client_id(),
                phase = ?session.phase,
                "Abandoning connect attempt"
            );
        }
        session.tls = None;
        session.phase = ConnectPhase::Init;
        session.socket.take()
    }

    /// TCP is up: set up TLS if requested, otherwise go straight to CONNECT
    fn after_tcp<S, P>(
        session: &mut Session<S::Tls>,
        request: &ConnectRequest<'_>,
        endpoint: &Endpoint<'_>,
        sockets: &mut S,
        packets: &mut P,
    ) -> MqttResult<ConnectStatus>
    where
        S: SocketLayer,
        P: PacketSender,
    {
        if !request.use_tls {
            return Self::send_connect(session, request, packets);
        }

        let socket = Self::socket_of(session)?;
        let options = session.tls_options().cloned().unwrap_or_default();
        let host = options.server_name.as_deref().unwrap_or(&*endpoint.host);

        match sockets.configure_tls(socket, &options, host) {
            Ok(tls) => session.tls = Some(tls),
            Err(source) => {
                warn!(%socket, host, "TLS configuration failed: {}", source);
                Self::fail(session);
                return Err(MqttError::TlsConfiguration {
                    host: host.to_string(),
                    source,
                });
            }
        }

        Self::transition(session, ConnectPhase::TlsPending);
        Self::drive_tls(session, request, endpoint, sockets, packets)
    }

    fn drive_tls<S, P>(
        session: &mut Session<S::Tls>,
        request: &ConnectRequest<'_>,
        endpoint: &Endpoint<'_>,
        sockets: &mut S,
        packets: &mut P,
    ) -> MqttResult<ConnectStatus>
    where
        S: SocketLayer,
        P: PacketSender,
    {
        let socket = Self::socket_of(session)?;
        let verify = session.tls_options().map_or(true, |options| options.verify);
        let host = session
            .tls_options()
            .and_then(|options| options.server_name.clone())
            .unwrap_or_else(|| endpoint.host.to_string());

        let handshake = match session.tls.as_mut() {
            Some(tls) => sockets.tls_handshake(tls, socket, &host, verify),
            None => {
                Self::fail(session);
                return Err(MqttError::InvalidPhase(ConnectPhase::TlsPending));
            }
        };

        match handshake {
            Ok(TlsHandshake::Interrupted) => {
                debug!(%socket, "TLS handshake needs more I/O");
                Ok(ConnectStatus::TlsPending)
            }
            Ok(TlsHandshake::Complete) => {
                debug!(%socket, "TLS handshake complete");
                Self::send_connect(session, request, packets)
            }
            Err(source) => {
                warn!(%socket, host = %host, "TLS handshake failed: {}", source);
                Self::fail(session);
                Err(MqttError::Socket {
                    host,
                    port: endpoint.port,
                    source,
                })
            }
        }
    }

    fn send_connect<T, P: PacketSender>(
        session: &mut Session<T>,
        request: &ConnectRequest<'_>,
        packets: &mut P,
    ) -> MqttResult<ConnectStatus> {
        let socket = Self::socket_of(session)?;
        let packet = ConnectPacket {
            socket,
            client_id: session.client_id(),
            keep_alive: session.keep_alive(),
            clean_start: session.clean_start(),
            version: request.version,
            credentials: session.credentials(),
            properties: request.connect_properties,
            will_properties: request.will_properties,
        };

        match packets.send_connect(&packet) {
            Ok(()) => {
                info!(
                    %socket,
                    client_id = session.client_id(),
                    version = request.version.level(),
                    "CONNECT sent, awaiting CONNACK"
                );
                session.version = Some(request.version);
                Self::transition(session, ConnectPhase::MqttPending);
                Ok(ConnectStatus::AwaitingConnack)
            }
            Err(source) => {
                warn!(%socket, "Failed to send CONNECT: {}", source);
                Self::fail(session);
                Err(MqttError::PacketSend {
                    packet: "CONNECT",
                    source,
                })
            }
        }
    }

    fn socket_of<T>(session: &mut Session<T>) -> MqttResult<SocketHandle> {
        match session.socket() {
            Some(socket) => Ok(socket),
            None => {
                Self::fail(session);
                Err(MqttError::NotConnected {
                    client_id: session.client_id().to_string(),
                })
            }
        }
    }

    fn transition<T>(session: &mut Session<T>, next: ConnectPhase) {
        debug_assert!(
            session.phase.can_advance_to(next),
            "illegal phase change {:?} -> {:?}",
            session.phase,
            next
        );
        debug!(from = ?session.phase, to = ?next, "Connect phase change");
        session.phase = next;
    }

    fn fail<T>(session: &mut Session<T>) {
        session.tls = None;
        session.socket = None;
        session.phase = ConnectPhase::Init;
    }
}
