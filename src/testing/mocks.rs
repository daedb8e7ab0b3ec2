//! Mock implementations for testing
//!
//! Provides scripted SocketLayer and PacketSender implementations so the
//! handshake and subscription paths can be exercised without sockets, TLS or a
//! broker.

use crate::transport::{
    ConnectPacket, PacketSender, ProtocolVersion, SocketHandle, SocketLayer, SubscribeOptions,
    SubscribePacket, TcpConnect, TcpStatus, TlsHandshake, TlsOptions, TransportError,
    UnsubscribePacket,
};
use rumqttc::v5::mqttbytes::QoS;
use std::collections::VecDeque;

/// A call made against [`MockSocketLayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCall {
    TcpConnect {
        host: String,
        port: u16,
    },
    ConfigureTls {
        socket: SocketHandle,
        host: String,
    },
    TlsHandshake {
        socket: SocketHandle,
        host: String,
        verify: bool,
    },
}

/// TLS context handed out by [`MockSocketLayer`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockTls {
    pub host: String,
    pub options: TlsOptions,
    pub handshake_attempts: u32,
}

/// Scripted socket layer.
///
/// Results are consumed in order. When a script runs dry, TCP connects
/// complete immediately on socket 1 and TLS handshakes complete.
#[derive(Debug, Default)]
pub struct MockSocketLayer {
    tcp_results: VecDeque<Result<TcpConnect, TransportError>>,
    tls_config_failure: Option<String>,
    handshake_results: VecDeque<Result<TlsHandshake, TransportError>>,
    calls: Vec<SocketCall>,
}

impl MockSocketLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tcp_connected(mut self, socket: SocketHandle) -> Self {
        self.tcp_results.push_back(Ok(TcpConnect {
            socket,
            status: TcpStatus::Connected,
        }));
        self
    }

    pub fn with_tcp_in_progress(mut self, socket: SocketHandle) -> Self {
        self.tcp_results.push_back(Ok(TcpConnect {
            socket,
            status: TcpStatus::InProgress,
        }));
        self
    }

    pub fn with_tcp_error(mut self, kind: std::io::ErrorKind) -> Self {
        self.tcp_results
            .push_back(Err(TransportError::Io(std::io::Error::new(kind, "mock tcp failure"))));
        self
    }

    pub fn with_tls_config_failure(mut self, reason: &str) -> Self {
        self.tls_config_failure = Some(reason.to_string());
        self
    }

    pub fn with_tls_handshake(mut self, outcome: TlsHandshake) -> Self {
        self.handshake_results.push_back(Ok(outcome));
        self
    }

    pub fn with_tls_handshake_error(mut self, reason: &str) -> Self {
        self.handshake_results
            .push_back(Err(TransportError::Tls(reason.to_string())));
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> &[SocketCall] {
        &self.calls
    }
}

impl SocketLayer for MockSocketLayer {
    type Tls = MockTls;

    fn tcp_connect(&mut self, host: &str, port: u16) -> Result<TcpConnect, TransportError> {
        self.calls.push(SocketCall::TcpConnect {
            host: host.to_string(),
            port,
        });
        self.tcp_results.pop_front().unwrap_or(Ok(TcpConnect {
            socket: SocketHandle(1),
            status: TcpStatus::Connected,
        }))
    }

    fn configure_tls(
        &mut self,
        socket: SocketHandle,
        options: &TlsOptions,
        host: &str,
    ) -> Result<MockTls, TransportError> {
        self.calls.push(SocketCall::ConfigureTls {
            socket,
            host: host.to_string(),
        });
        match &self.tls_config_failure {
            Some(reason) => Err(TransportError::Tls(reason.clone())),
            None => Ok(MockTls {
                host: host.to_string(),
                options: options.clone(),
                handshake_attempts: 0,
            }),
        }
    }

    fn tls_handshake(
        &mut self,
        tls: &mut MockTls,
        socket: SocketHandle,
        host: &str,
        verify: bool,
    ) -> Result<TlsHandshake, TransportError> {
        self.calls.push(SocketCall::TlsHandshake {
            socket,
            host: host.to_string(),
            verify,
        });
        tls.handshake_attempts += 1;
        self.handshake_results
            .pop_front()
            .unwrap_or(Ok(TlsHandshake::Complete))
    }
}

/// A packet accepted by [`MockPacketSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentPacket {
    Connect {
        socket: SocketHandle,
        client_id: String,
        version: ProtocolVersion,
        keep_alive: u16,
        clean_start: bool,
        username: Option<String>,
        has_properties: bool,
        has_will_properties: bool,
    },
    Subscribe {
        socket: SocketHandle,
        client_id: String,
        msg_id: u16,
        filters: Vec<(String, QoS)>,
        options: Option<SubscribeOptions>,
        has_properties: bool,
    },
    Unsubscribe {
        socket: SocketHandle,
        client_id: String,
        msg_id: u16,
        topics: Vec<String>,
    },
}

/// Recording packet sender; failed sends are not recorded
#[derive(Debug, Default)]
pub struct MockPacketSender {
    pub fail_connect: bool,
    pub fail_subscribe: bool,
    pub fail_unsubscribe: bool,
    sent: Vec<SentPacket>,
}

impl MockPacketSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            fail_connect: true,
            fail_subscribe: true,
            fail_unsubscribe: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> &[SentPacket] {
        &self.sent
    }

    pub fn connects(&self) -> Vec<&SentPacket> {
        self.sent
            .iter()
            .filter(|packet| matches!(packet, SentPacket::Connect { .. }))
            .collect()
    }

    pub fn subscribes(&self) -> Vec<&SentPacket> {
        self.sent
            .iter()
            .filter(|packet| matches!(packet, SentPacket::Subscribe { .. }))
            .collect()
    }

    pub fn unsubscribes(&self) -> Vec<&SentPacket> {
        self.sent
            .iter()
            .filter(|packet| matches!(packet, SentPacket::Unsubscribe { .. }))
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.sent.clear();
    }

    fn mock_failure(packet: &str) -> TransportError {
        TransportError::Encode(format!("mock {packet} failure"))
    }
}

impl PacketSender for MockPacketSender {
    fn send_connect(&mut self, packet: &ConnectPacket<'_>) -> Result<(), TransportError> {
        if self.fail_connect {
            return Err(Self::mock_failure("CONNECT"));
        }
        self.sent.push(SentPacket::Connect {
            socket: packet.socket,
            client_id: packet.client_id.to_string(),
            version: packet.version,
            keep_alive: packet.keep_alive,
            clean_start: packet.clean_start,
            username: packet.credentials.map(|c| c.username.clone()),
            has_properties: packet.properties.is_some(),
            has_will_properties: packet.will_properties.is_some(),
        });
        Ok(())
    }

    fn send_subscribe(&mut self, packet: &SubscribePacket<'_>) -> Result<(), TransportError> {
        if self.fail_subscribe {
            return Err(Self::mock_failure("SUBSCRIBE"));
        }
        self.sent.push(SentPacket::Subscribe {
            socket: packet.socket,
            client_id: packet.client_id.to_string(),
            msg_id: packet.msg_id,
            filters: packet
                .filters
                .iter()
                .map(|f| (f.filter.to_string(), f.qos))
                .collect(),
            options: packet.options,
            has_properties: packet.properties.is_some(),
        });
        Ok(())
    }

    fn send_unsubscribe(&mut self, packet: &UnsubscribePacket<'_>) -> Result<(), TransportError> {
        if self.fail_unsubscribe {
            return Err(Self::mock_failure("UNSUBSCRIBE"));
        }
        self.sent.push(SentPacket::Unsubscribe {
            socket: packet.socket,
            client_id: packet.client_id.to_string(),
            msg_id: packet.msg_id,
            topics: packet.topics.to_vec(),
        });
        Ok(())
    }
}
