//! Acknowledgment dispatch tests
//!
//! Sessions are connected through the state machine, registered by socket, and
//! then fed decoded broker packets.

use mqttlink::testing::{MockPacketSender, MockSocketLayer, MockTls};
use mqttlink::transport::mqtt::{
    AckDispatcher, ClientRegistry, ConnectRequest, ConnectionStateMachine, DispatchStatus,
    Session, SessionRegistry, Suback, SubackReason, Unsuback,
};
use mqttlink::transport::SocketHandle;
use mqttlink::{ErrorStatus, MqttError};
use rumqttc::v5::mqttbytes::v5::{
    Packet, PingReq, PingResp, SubAck, SubscribeReasonCode, UnsubAck, UnsubAckReason,
};
use rumqttc::v5::mqttbytes::QoS;

fn connected_registry(sockets: &[(i32, &str)]) -> SessionRegistry<MockTls> {
    let mut registry = SessionRegistry::new();
    for (socket, client_id) in sockets {
        let mut layer = MockSocketLayer::new().with_tcp_connected(SocketHandle(*socket));
        let mut packets = MockPacketSender::new();
        let mut session = Session::new(*client_id);
        ConnectionStateMachine::connect(
            &mut session,
            &ConnectRequest::new("broker"),
            &mut layer,
            &mut packets,
        )
        .unwrap();
        registry.register(session).unwrap();
    }
    registry
}

#[test]
fn test_ping_response_clears_only_matching_session() {
    let mut registry = connected_registry(&[(10, "a"), (11, "b")]);
    for socket in [10, 11] {
        registry
            .find_by_socket(SocketHandle(socket))
            .unwrap()
            .mark_ping_sent();
    }

    let status = AckDispatcher::new(&mut registry)
        .handle_ping_response(SocketHandle(10))
        .unwrap();

    assert_eq!(status, DispatchStatus::Complete);
    assert!(!registry.get(SocketHandle(10)).unwrap().ping_outstanding());
    assert!(registry.get(SocketHandle(11)).unwrap().ping_outstanding());
}

#[test]
fn test_suback_for_known_socket_completes() {
    let mut registry = connected_registry(&[(10, "a")]);
    let suback = Suback {
        msg_id: 42,
        reasons: vec![SubackReason::Granted(QoS::AtLeastOnce)],
    };

    let status = AckDispatcher::new(&mut registry)
        .handle_suback(suback, SocketHandle(10))
        .unwrap();

    assert_eq!(status, DispatchStatus::Complete);
}

#[test]
fn test_acks_for_unknown_socket_report_internal_error() {
    let mut registry = connected_registry(&[(10, "a")]);
    let mut dispatcher = AckDispatcher::new(&mut registry);

    let errors = [
        dispatcher.handle_ping_response(SocketHandle(99)).unwrap_err(),
        dispatcher
            .handle_unsuback(Unsuback { msg_id: 1 }, SocketHandle(99))
            .unwrap_err(),
    ];

    for error in errors {
        assert!(matches!(error, MqttError::SessionNotFound(SocketHandle(99))));
        assert_eq!(error.status(), ErrorStatus::InternalError);
    }
}

#[test]
fn test_dispatch_decoded_packets() {
    let mut registry = connected_registry(&[(10, "a")]);
    registry
        .find_by_socket(SocketHandle(10))
        .unwrap()
        .mark_ping_sent();
    let mut dispatcher = AckDispatcher::new(&mut registry);

    let suback = Packet::SubAck(SubAck {
        pkid: 7,
        return_codes: vec![
            SubscribeReasonCode::Success(QoS::ExactlyOnce),
            SubscribeReasonCode::NotAuthorized,
        ],
        properties: None,
    });
    let unsuback = Packet::UnsubAck(UnsubAck {
        pkid: 8,
        reasons: vec![UnsubAckReason::Success],
        properties: None,
    });

    assert_eq!(
        dispatcher.dispatch(suback, SocketHandle(10)).unwrap(),
        DispatchStatus::Complete
    );
    assert_eq!(
        dispatcher.dispatch(unsuback, SocketHandle(10)).unwrap(),
        DispatchStatus::Complete
    );
    assert_eq!(
        dispatcher
            .dispatch(Packet::PingResp(PingResp), SocketHandle(10))
            .unwrap(),
        DispatchStatus::Complete
    );
    assert_eq!(
        dispatcher
            .dispatch(Packet::PingReq(PingReq), SocketHandle(10))
            .unwrap(),
        DispatchStatus::Ignored
    );

    assert!(!registry.get(SocketHandle(10)).unwrap().ping_outstanding());
}

#[test]
fn test_suback_conversion_keeps_reason_order() {
    let suback = Suback::from(SubAck {
        pkid: 3,
        return_codes: vec![
            SubscribeReasonCode::Success(QoS::AtMostOnce),
            SubscribeReasonCode::TopicFilterInvalid,
            SubscribeReasonCode::Success(QoS::AtLeastOnce),
        ],
        properties: None,
    });

    assert_eq!(suback.msg_id, 3);
    assert_eq!(
        suback.reasons,
        vec![
            SubackReason::Granted(QoS::AtMostOnce),
            SubackReason::Rejected,
            SubackReason::Granted(QoS::AtLeastOnce),
        ]
    );
    assert_eq!(suback.granted(), 2);
}

#[test]
fn test_deregistered_session_no_longer_receives_acks() {
    let mut registry = connected_registry(&[(10, "a")]);
    registry.deregister(SocketHandle(10)).unwrap();

    let error = AckDispatcher::new(&mut registry)
        .handle_ping_response(SocketHandle(10))
        .unwrap_err();
    assert!(matches!(error, MqttError::SessionNotFound(_)));
}

#[test]
fn test_reconnected_session_is_rekeyed_before_acks_resolve() {
    let mut registry = connected_registry(&[(4, "roaming")]);
    let mut sockets = MockSocketLayer::new().with_tcp_connected(SocketHandle(9));
    let mut packets = MockPacketSender::new();

    let session = registry.find_by_socket(SocketHandle(4)).unwrap();
    assert_eq!(ConnectionStateMachine::reset(session), Some(SocketHandle(4)));
    ConnectionStateMachine::connect(
        session,
        &ConnectRequest::new("broker"),
        &mut sockets,
        &mut packets,
    )
    .unwrap();
    assert_eq!(session.socket(), Some(SocketHandle(9)));

    // the old key no longer resolves to a session that moved away from it
    let mut dispatcher = AckDispatcher::new(&mut registry);
    assert!(matches!(
        dispatcher.handle_ping_response(SocketHandle(4)),
        Err(MqttError::SessionNotFound(SocketHandle(4)))
    ));

    assert_eq!(registry.rekey(SocketHandle(4)), Ok(SocketHandle(9)));
    let status = AckDispatcher::new(&mut registry)
        .handle_ping_response(SocketHandle(9))
        .unwrap();
    assert_eq!(status, DispatchStatus::Complete);
    assert_eq!(registry.get(SocketHandle(9)).unwrap().client_id(), "roaming");
}
