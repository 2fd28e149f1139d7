//! Two `CanvasSystem` replicas exchanging frames by hand, with the test
//! playing the relay.

use canvas_core::codec;
use canvas_core::{
    CanvasSystem, CommandResult, Core, DocumentSnapshot, IdentifiableEvent, ObjectId,
    SessionCommand, SessionEvent, SessionSnapshot, SystemCommand, SystemEvent,
};
use uuid::Uuid;

fn by_system(event: SystemEvent) -> Vec<u8> {
    codec::encode_event(&IdentifiableEvent::BySystem {
        system_event: event,
    })
    .unwrap()
}

fn joined_pair() -> (CanvasSystem, CanvasSystem) {
    let join = by_system(SystemEvent::JoinedSession {
        session_id: 3,
        initial_state: SessionSnapshot::new(vec![1, 2]),
        document_snapshot: DocumentSnapshot {
            document_id: Some(ObjectId::new("doc-3")),
            ..Default::default()
        },
    });
    let mut alice = CanvasSystem::new();
    let mut bob = CanvasSystem::new();
    for system in [&mut alice, &mut bob] {
        system.apply_inbound_frame(&join).unwrap();
        system.drain_invalidated_object_ids();
        system.drain_changed_session_snapshot();
    }
    (alice, bob)
}

#[test]
fn test_local_edit_reaches_other_replica() {
    let (mut alice, mut bob) = joined_pair();
    let command = codec::document_command_from_json(r#"{"UpdateDocumentTitle":{"title":"Map"}}"#)
        .unwrap();
    alice.push_local_document_mutation(command).unwrap();

    let frame = alice.drain_next_pending_outbound_frame().unwrap();
    let sent = codec::decode_command(&frame).unwrap();
    let tx = match sent.system_command {
        SystemCommand::SessionCommand(SessionCommand::Transaction(tx)) => tx,
        other => panic!("Expected a transaction, got {other:?}"),
    };

    // Relay: ack to the author, forward to everyone else
    let ack = codec::encode_event(&IdentifiableEvent::ByMyself {
        command_id: sent.command_id,
        result: CommandResult::SystemEvent(SystemEvent::SessionEvent(
            SessionEvent::TransactionAck(tx.id),
        )),
    })
    .unwrap();
    alice.apply_inbound_frame(&ack).unwrap();
    bob.apply_inbound_frame(&by_system(SystemEvent::SessionEvent(
        SessionEvent::OthersTransaction(tx),
    )))
    .unwrap();

    assert_eq!(alice.pending_transactions(), 0);
    assert_eq!(alice.materialize_document().title, "Map");
    assert_eq!(bob.materialize_document().title, "Map");
    assert_eq!(bob.drain_invalidated_object_ids(), vec![ObjectId::new("doc-3")]);
}

#[test]
fn test_unknown_ack_is_reported() {
    let (mut alice, _) = joined_pair();
    let result = alice.apply_inbound_frame(&by_system(SystemEvent::SessionEvent(
        SessionEvent::TransactionAck(Uuid::new_v4()),
    )));
    assert!(result.is_err());
}

#[test]
fn test_json_views_agree_with_wire() {
    let command = codec::command_from_json(r#"{"JoinSession":{"session_id":7}}"#).unwrap();
    let mut system = CanvasSystem::new();
    let frame = system.encode_command(&command).unwrap();

    let decoded = codec::decode_command(&frame).unwrap();
    assert_eq!(decoded.command_id, 1);
    assert_eq!(
        codec::command_to_json(&decoded.system_command).unwrap(),
        r#"{"JoinSession":{"session_id":7}}"#
    );
}

#[test]
fn test_roster_replaced_wholesale() {
    let (mut alice, _) = joined_pair();
    alice
        .apply_inbound_frame(&by_system(SystemEvent::SessionEvent(
            SessionEvent::SessionStateChanged(SessionSnapshot::new(vec![5, 6, 7])),
        )))
        .unwrap();
    assert_eq!(
        alice.drain_changed_session_snapshot(),
        Some(SessionSnapshot::new(vec![5, 6, 7]))
    );
}
