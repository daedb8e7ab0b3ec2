//! SUBSCRIBE and UNSUBSCRIBE issuance
//!
//! Requests are validated, handed to the packet encoder and forgotten. Nothing
//! is recorded for matching against SUBACK / UNSUBACK or for retry; a retry
//! layer has to track outstanding message identifiers on its own.

use super::session::{ConnectPhase, Session};
use crate::error::{MqttError, MqttResult};
use crate::transport::{
    PacketSender, ProtocolVersion, SocketHandle, SubscribeOptions, SubscribePacket, TopicFilter,
    UnsubscribePacket,
};
use rumqttc::v5::mqttbytes::v5::SubscribeProperties;
use rumqttc::v5::mqttbytes::QoS;
use tracing::{debug, warn};

/// A SUBSCRIBE request: topic filters with a parallel list of requested QoS
#[derive(Debug, Clone)]
pub struct SubscribeRequest<'a> {
    pub topics: &'a [String],
    pub qos: &'a [QoS],
    pub msg_id: u16,
    /// MQTT 5 only
    pub options: Option<SubscribeOptions>,
    /// MQTT 5 only
    pub properties: Option<&'a SubscribeProperties>,
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(topics: &'a [String], qos: &'a [QoS], msg_id: u16) -> Self {
        Self {
            topics,
            qos,
            msg_id,
            options: None,
            properties: None,
        }
    }

    pub fn with_options(mut self, options: SubscribeOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_properties(mut self, properties: &'a SubscribeProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Sends subscription requests for a session
pub struct SubscriptionIssuer;

impl SubscriptionIssuer {
    /// Serialise and send a SUBSCRIBE. Returns the send outcome without
    /// waiting for SUBACK.
    pub fn subscribe<T, P: PacketSender>(
        session: &Session<T>,
        request: &SubscribeRequest<'_>,
        packets: &mut P,
    ) -> MqttResult<()> {
        let socket = Self::connected_socket(session)?;
        Self::validate(request.topics, request.msg_id)?;
        if request.topics.len() != request.qos.len() {
            return Err(MqttError::invalid_request(format!(
                "{} topic filters but {} QoS values",
                request.topics.len(),
                request.qos.len()
            )));
        }

        let v5 = session
            .protocol_version()
            .is_some_and(ProtocolVersion::supports_properties);
        if !v5 && (request.options.is_some() || request.properties.is_some()) {
            debug!(
                client_id = session.client_id(),
                "Dropping MQTT 5 subscribe options for pre-5 session"
            );
        }

        let packet = SubscribePacket {
            socket,
            client_id: session.client_id(),
            msg_id: request.msg_id,
            filters: request
                .topics
                .iter()
                .zip(request.qos)
                .map(|(filter, qos)| TopicFilter {
                    filter: filter.as_str(),
                    qos: *qos,
                })
                .collect(),
            options: request.options.filter(|_| v5),
            properties: request.properties.filter(|_| v5),
        };

        packets.send_subscribe(&packet).map_err(|source| {
            warn!(%socket, msg_id = request.msg_id, "Failed to send SUBSCRIBE: {}", source);
            MqttError::PacketSend {
                packet: "SUBSCRIBE",
                source,
            }
        })?;

        debug!(
            %socket,
            client_id = session.client_id(),
            msg_id = request.msg_id,
            topics = ?request.topics,
            "SUBSCRIBE sent"
        );
        Ok(())
    }

    /// Serialise and send an UNSUBSCRIBE
    pub fn unsubscribe<T, P: PacketSender>(
        session: &Session<T>,
        topics: &[String],
        msg_id: u16,
        packets: &mut P,
    ) -> MqttResult<()> {
        let socket = Self::connected_socket(session)?;
        Self::validate(topics, msg_id)?;

        let packet = UnsubscribePacket {
            socket,
            client_id: session.client_id(),
            msg_id,
            topics,
        };

        packets.send_unsubscribe(&packet).map_err(|source| {
            warn!(%socket, msg_id, "Failed to send UNSUBSCRIBE: {}", source);
            MqttError::PacketSend {
                packet: "UNSUBSCRIBE",
                source,
            }
        })?;

        debug!(
            %socket,
            client_id = session.client_id(),
            msg_id,
            topics = ?topics,
            "UNSUBSCRIBE sent"
        );
        Ok(())
    }

    /// The socket CONNECT went out on. Sessions still in TCP or TLS setup, or
    /// left idle by a failed attempt, have nothing to subscribe on.
    fn connected_socket<T>(session: &Session<T>) -> MqttResult<SocketHandle> {
        match (session.phase(), session.socket()) {
            (ConnectPhase::MqttPending, Some(socket)) => Ok(socket),
            _ => Err(MqttError::NotConnected {
                client_id: session.client_id().to_string(),
            }),
        }
    }

    fn validate(topics: &[String], msg_id: u16) -> MqttResult<()> {
        if topics.is_empty() {
            return Err(MqttError::invalid_request("at least one topic filter is required"));
        }
        // packet identifiers are non-zero
        if msg_id == 0 {
            return Err(MqttError::invalid_request("message identifier must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPacketSender, SentPacket};

    fn connected_session(version: ProtocolVersion) -> Session {
        let mut session = Session::new("subscriber");
        session.socket = Some(SocketHandle(11));
        session.phase = ConnectPhase::MqttPending;
        session.version = Some(version);
        session
    }

    #[test]
    fn test_subscribe_sends_filters_in_order() {
        let session = connected_session(ProtocolVersion::V311);
        let mut packets = MockPacketSender::new();
        let topics = vec!["sensors/+/temp".to_string(), "alerts/#".to_string()];
        let qos = [QoS::AtLeastOnce, QoS::ExactlyOnce];

        SubscriptionIssuer::subscribe(
            &session,
            &SubscribeRequest::new(&topics, &qos, 5),
            &mut packets,
        )
        .unwrap();

        assert_eq!(
            packets.sent(),
            &[SentPacket::Subscribe {
                socket: SocketHandle(11),
                client_id: "subscriber".to_string(),
                msg_id: 5,
                filters: vec![
                    ("sensors/+/temp".to_string(), QoS::AtLeastOnce),
                    ("alerts/#".to_string(), QoS::ExactlyOnce),
                ],
                options: None,
                has_properties: false,
            }]
        );
    }

    #[test]
    fn test_subscribe_options_only_for_v5() {
        let topics = vec!["a".to_string()];
        let qos = [QoS::AtMostOnce];
        let options = SubscribeOptions {
            no_local: true,
            ..Default::default()
        };
        let request = SubscribeRequest::new(&topics, &qos, 1).with_options(options);

        let mut packets = MockPacketSender::new();
        SubscriptionIssuer::subscribe(&connected_session(ProtocolVersion::V311), &request, &mut packets)
            .unwrap();
        SubscriptionIssuer::subscribe(&connected_session(ProtocolVersion::V5), &request, &mut packets)
            .unwrap();

        let sent_options: Vec<_> = packets
            .subscribes()
            .into_iter()
            .map(|packet| match packet {
                SentPacket::Subscribe { options, .. } => *options,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(sent_options, vec![None, Some(options)]);
    }

    #[test]
    fn test_subscribe_rejects_mismatched_qos() {
        let session = connected_session(ProtocolVersion::V311);
        let mut packets = MockPacketSender::new();
        let topics = vec!["a".to_string(), "b".to_string()];
        let qos = [QoS::AtMostOnce];

        let error = SubscriptionIssuer::subscribe(
            &session,
            &SubscribeRequest::new(&topics, &qos, 1),
            &mut packets,
        )
        .unwrap_err();

        assert!(matches!(error, MqttError::InvalidRequest { .. }));
        assert!(packets.sent().is_empty());
    }

    #[test]
    fn test_zero_message_id_rejected() {
        let session = connected_session(ProtocolVersion::V311);
        let mut packets = MockPacketSender::new();
        let topics = vec!["a".to_string()];

        let error = SubscriptionIssuer::unsubscribe(&session, &topics, 0, &mut packets).unwrap_err();
        assert!(matches!(error, MqttError::InvalidRequest { .. }));
    }

    #[test]
    fn test_empty_topic_list_rejected() {
        let session = connected_session(ProtocolVersion::V311);
        let mut packets = MockPacketSender::new();

        let error = SubscriptionIssuer::unsubscribe(&session, &[], 3, &mut packets).unwrap_err();
        assert!(matches!(error, MqttError::InvalidRequest { .. }));
        assert!(packets.sent().is_empty());
    }

    #[test]
    fn test_unsubscribe_without_socket() {
        let session: Session = Session::new("offline");
        let mut packets = MockPacketSender::new();
        let topics = vec!["a".to_string()];

        let error = SubscriptionIssuer::unsubscribe(&session, &topics, 3, &mut packets).unwrap_err();
        assert!(matches!(error, MqttError::NotConnected { .. }));
    }

    #[test]
    fn test_subscribe_during_tcp_setup_rejected() {
        let mut session: Session = Session::new("connecting");
        session.socket = Some(SocketHandle(11));
        session.phase = ConnectPhase::TcpPending;
        let mut packets = MockPacketSender::new();
        let topics = vec!["a".to_string()];
        let qos = [QoS::AtMostOnce];

        let error = SubscriptionIssuer::subscribe(
            &session,
            &SubscribeRequest::new(&topics, &qos, 1),
            &mut packets,
        )
        .unwrap_err();

        assert!(matches!(error, MqttError::NotConnected { .. }));
        assert!(packets.sent().is_empty());
    }

    #[test]
    fn test_send_failure_is_returned() {
        let session = connected_session(ProtocolVersion::V311);
        let mut packets = MockPacketSender::with_failure();
        let topics = vec!["a".to_string()];

        let error = SubscriptionIssuer::unsubscribe(&session, &topics, 9, &mut packets).unwrap_err();
        assert!(matches!(
            error,
            MqttError::PacketSend {
                packet: "UNSUBSCRIBE",
                ..
            }
        ));
    }
}
