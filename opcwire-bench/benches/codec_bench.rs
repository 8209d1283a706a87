//! Catalogue encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use opcwire_model::definitions::{AggregateConfiguration, ReadRequest, ReadValueId, RequestHeader};
use opcwire_model::pdu::{SecurityHeader, SequenceHeader};
use opcwire_model::{
    ExtensionObject, MessagePdu, NodeId, Payload, PduBody, TimestampsToReturn, Variant,
    VariantValue,
};
use opcwire_spi::{CodecOptions, Decoder, Encoder, Message};

fn create_read_request(nodes: usize) -> MessagePdu {
    let request = ReadRequest {
        request_header: RequestHeader::new(1, 0),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both.into(),
        nodes_to_read: Some(
            (0..nodes)
                .map(|i| ReadValueId::value_of(NodeId::numeric(2, i as u32)))
                .collect(),
        ),
    };
    MessagePdu::new(PduBody::MessageRequest {
        security_header: SecurityHeader::default(),
        message: Payload::Extensible {
            sequence_header: SequenceHeader::default(),
            payload: ExtensionObject::unmasked(request),
        },
    })
}

fn bench_aggregate_configuration(c: &mut Criterion) {
    let object = ExtensionObject::new(AggregateConfiguration {
        treat_uncertain_as_bad: true,
        percent_data_bad: 10,
        percent_data_good: 90,
        use_sloped_extrapolation: true,
        ..AggregateConfiguration::default()
    });
    let encoded = Encoder::encode(&object, &CodecOptions::default()).unwrap();

    c.bench_function("aggregate_configuration_encode", |b| {
        b.iter(|| black_box(Encoder::encode(&object, &CodecOptions::default()).unwrap()));
    });
    c.bench_function("aggregate_configuration_decode", |b| {
        b.iter(|| {
            black_box(
                Decoder::default()
                    .decode(encoded.clone(), "ExtensionObject", |r| {
                        ExtensionObject::parse(r, true)
                    })
                    .unwrap(),
            )
        });
    });
}

fn bench_variant_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("variant_array_decode");

    for len in [16, 256, 4096] {
        let variant = Variant::array(VariantValue::Int32((0..len).collect()));
        let encoded = Encoder::encode(&variant, &CodecOptions::default()).unwrap();

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &encoded, |b, encoded| {
            b.iter(|| {
                black_box(
                    Decoder::default()
                        .decode(encoded.clone(), "Variant", Variant::parse)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_pdu(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_request_pdu");

    for nodes in [1, 10, 100] {
        let pdu = create_read_request(nodes);
        let encoded: Bytes = Encoder::encode(&pdu, &CodecOptions::default()).unwrap();

        group.throughput(Throughput::Bytes(pdu.length_in_bytes()));
        group.bench_with_input(BenchmarkId::new("encode", nodes), &pdu, |b, pdu| {
            b.iter(|| black_box(Encoder::encode(pdu, &CodecOptions::default()).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", nodes), &encoded, |b, encoded| {
            b.iter(|| {
                black_box(
                    Decoder::default()
                        .decode(encoded.clone(), "MessagePdu", |r| {
                            MessagePdu::parse(r, false, false)
                        })
                        .unwrap(),
                )
            });
        });
        group.bench_with_input(BenchmarkId::new("render", nodes), &pdu, |b, pdu| {
            b.iter(|| black_box(Encoder::render(pdu).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_aggregate_configuration,
    bench_variant_array,
    bench_pdu
);
criterion_main!(benches);
