use std::hint::black_box;

use canvas_core::codec;
use canvas_core::{
    CanvasSystem, CommandResult, Core, Fragment, IdentifiableCommand, IdentifiableEvent,
    SessionCommand, SessionEvent, SessionSnapshot, SystemCommand, SystemEvent,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn fragment_command() -> SystemCommand {
    SystemCommand::SessionCommand(SessionCommand::Fragment(Fragment::new(
        12.0, 34.0, 56.0, 78.0,
    )))
}

fn bench_fragment_encode(c: &mut Criterion) {
    let command = IdentifiableCommand {
        command_id: 1234,
        system_command: fragment_command(),
    };

    c.bench_function("fragment_encode", |b| {
        b.iter(|| black_box(codec::encode_command(black_box(&command)).unwrap()))
    });
}

fn bench_fragment_event_decode(c: &mut Criterion) {
    let frame = codec::encode_event(&IdentifiableEvent::ByMyself {
        command_id: 1234,
        result: CommandResult::SystemEvent(SystemEvent::SessionEvent(SessionEvent::Fragment(
            Fragment::new(12.0, 34.0, 56.0, 78.0),
        ))),
    })
    .unwrap();

    c.bench_function("fragment_event_decode", |b| {
        b.iter(|| black_box(codec::decode_event(black_box(&frame)).unwrap()))
    });
}

fn bench_core_encode_command(c: &mut Criterion) {
    let mut system = CanvasSystem::new();
    let command = fragment_command();

    c.bench_function("core_encode_fragment", |b| {
        b.iter(|| black_box(system.encode_command(black_box(&command)).unwrap()))
    });
}

fn bench_apply_roster_change(c: &mut Criterion) {
    let mut system = CanvasSystem::new();
    let joined = codec::encode_event(&IdentifiableEvent::BySystem {
        system_event: SystemEvent::JoinedSession {
            session_id: 1,
            initial_state: SessionSnapshot::new((0..64).collect()),
            document_snapshot: Default::default(),
        },
    })
    .unwrap();
    system.apply_inbound_frame(&joined).unwrap();

    let someone_joined = codec::encode_event(&IdentifiableEvent::BySystem {
        system_event: SystemEvent::SessionEvent(SessionEvent::SomeoneJoined(1000)),
    })
    .unwrap();

    c.bench_function("apply_and_drain_roster_64", |b| {
        b.iter(|| {
            system.apply_inbound_frame(black_box(&someone_joined)).unwrap();
            black_box(system.drain_changed_session_snapshot());
        })
    });
}

criterion_group!(
    benches,
    bench_fragment_encode,
    bench_fragment_event_decode,
    bench_core_encode_command,
    bench_apply_roster_change,
);
criterion_main!(benches);
