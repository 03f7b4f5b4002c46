use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use padlink_core::envelope::{self, ControllerEvent, Envelope, ParticipantId, Payload};

fn sample_payloads() -> Vec<(&'static str, Payload)> {
    vec![
        ("version", Payload::version(1, 4, 212)),
        (
            "button",
            ControllerEvent::ButtonAChanged { value: 1.0, pressed: true }.into(),
        ),
        (
            "pad",
            ControllerEvent::LeftPadChanged { x: -0.75, y: 0.125 }.into(),
        ),
        (
            "identified",
            ControllerEvent::ControllerIdentified("Wireless Controller".repeat(4)).into(),
        ),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_encode");
    let sender = ParticipantId::new();

    for (name, payload) in sample_payloads() {
        let envelope = Envelope::new(sender, payload);
        group.bench_with_input(BenchmarkId::new("payload", name), &envelope, |b, envelope| {
            b.iter(|| black_box(envelope::encode(envelope).unwrap()))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_decode");
    let sender = ParticipantId::new();

    for (name, payload) in sample_payloads() {
        let bytes = envelope::encode(&Envelope::new(sender, payload)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("payload", name), &bytes, |b, bytes| {
            b.iter(|| black_box(envelope::decode(bytes).unwrap()))
        });
    }

    // Rejection path: truncated frame
    let truncated = br#"{"participantId":"00000000-0000-0000-0000-000000000000","id":"#;
    group.bench_function("malformed", |b| {
        b.iter(|| black_box(envelope::decode(truncated).is_err()))
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
