//! Client session state touched by the handshake and the ack dispatcher

use crate::config::ClientConfig;
use crate::transport::{Credentials, ProtocolVersion, SocketHandle, TlsOptions};

/// Handshake progress of a session.
///
/// Phases only move forward, or fall back to [`ConnectPhase::Init`] when an
/// attempt fails or is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectPhase {
    /// No handshake in flight
    #[default]
    Init,
    /// TCP connect issued; the socket may still be completing the connect
    TcpPending,
    /// TLS handshake started, waiting for more I/O
    TlsPending,
    /// CONNECT sent, waiting for CONNACK
    MqttPending,
}

impl ConnectPhase {
    /// Numeric phase value (0 to 3)
    pub fn code(self) -> u8 {
        match self {
            ConnectPhase::Init => 0,
            ConnectPhase::TcpPending => 1,
            ConnectPhase::TlsPending => 2,
            ConnectPhase::MqttPending => 3,
        }
    }

    /// Whether a handshake is currently in flight
    pub fn is_pending(self) -> bool {
        !matches!(self, ConnectPhase::Init)
    }

    /// Whether moving to `next` respects the forward-only ordering.
    ///
    /// `TlsPending` may only be skipped from `TcpPending` (TLS not requested),
    /// and every phase may fall back to `Init`.
    pub fn can_advance_to(self, next: ConnectPhase) -> bool {
        matches!(
            (self, next),
            (_, ConnectPhase::Init)
                | (ConnectPhase::Init, ConnectPhase::TcpPending)
                | (ConnectPhase::TcpPending, ConnectPhase::TlsPending)
                | (ConnectPhase::TcpPending, ConnectPhase::MqttPending)
                | (ConnectPhase::TlsPending, ConnectPhase::MqttPending)
        )
    }
}

/// One client's connection to one broker.
///
/// `T` is the TLS context type of the [`SocketLayer`](crate::transport::SocketLayer)
/// the session connects through. The session owns that context exclusively.
#[derive(Debug)]
pub struct Session<T = ()> {
    client_id: String,
    pub(crate) socket: Option<SocketHandle>,
    pub(crate) phase: ConnectPhase,
    pub(crate) healthy: bool,
    pub(crate) ping_outstanding: bool,
    pub(crate) tls: Option<T>,
    tls_options: Option<TlsOptions>,
    keep_alive: u16,
    clean_start: bool,
    credentials: Option<Credentials>,
    pub(crate) version: Option<ProtocolVersion>,
}

impl<T> Session<T> {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            socket: None,
            phase: ConnectPhase::Init,
            healthy: false,
            ping_outstanding: false,
            tls: None,
            tls_options: None,
            keep_alive: 60,
            clean_start: true,
            credentials: None,
            version: None,
        }
    }

    /// Build a session from loaded configuration, resolving credentials from
    /// the environment
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut session = Self::new(config.client_id())
            .with_keep_alive(config.client.keep_alive_secs)
            .with_clean_start(config.client.clean_start);

        if let Some(tls) = config.tls_options() {
            session = session.with_tls_options(tls);
        }
        if let Some(username) = config.get_username() {
            session = session.with_credentials(Credentials {
                username,
                password: config.get_password(),
            });
        }
        session
    }

    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    pub fn with_clean_start(mut self, clean_start: bool) -> Self {
        self.clean_start = clean_start;
        self
    }

    pub fn with_tls_options(mut self, options: TlsOptions) -> Self {
        self.tls_options = Some(options);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn socket(&self) -> Option<SocketHandle> {
        self.socket
    }

    pub fn phase(&self) -> ConnectPhase {
        self.phase
    }

    /// The "connection good" flag, set optimistically when a connect starts
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn ping_outstanding(&self) -> bool {
        self.ping_outstanding
    }

    /// Called by the keep-alive sender after writing PINGREQ
    pub fn mark_ping_sent(&mut self) {
        self.ping_outstanding = true;
    }

    pub fn tls(&self) -> Option<&T> {
        self.tls.as_ref()
    }

    pub fn tls_options(&self) -> Option<&TlsOptions> {
        self.tls_options.as_ref()
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn clean_start(&self) -> bool {
        self.clean_start
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Protocol version of the last CONNECT sent on this session
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.version
    }
}
