use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use strata_codec::{object, Config, Decoded, Encoded, Serializer};

#[derive(Debug, Default, PartialEq)]
struct Record {
    id: u64,
    name: Option<String>,
    values: Vec<u32>,
    labels: BTreeMap<u16, String>,
}

object!(Record {
    id: u64,
    name: Option<String>,
    values: Vec<u32>,
    labels: BTreeMap<u16, String>,
});

fn records(count: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..count)
        .map(|id| Record {
            id: id as u64,
            name: rng.gen_bool(0.5).then(|| format!("record-{}", rng.gen::<u32>())),
            values: (0..rng.gen_range(0..32)).map(|_| rng.gen()).collect(),
            labels: (0..rng.gen_range(0..4))
                .map(|key| (key, format!("label-{key}")))
                .collect(),
        })
        .collect()
}

fn configs() -> [(&'static str, Config); 3] {
    [
        ("sequential", Config::default()),
        (
            "indexed",
            Config {
                null_flags: false,
                ..Config::default()
            },
        ),
        (
            "named",
            Config {
                use_property_names: true,
                ..Config::default()
            },
        ),
    ]
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    for count in [10, 100, 1_000] {
        let value = records(count);
        for (layout, config) in configs() {
            let serializer = Serializer::new(config);
            let encoded = serializer.serialize(&value).unwrap();
            group.throughput(Throughput::Bytes(encoded.len() as u64));
            group.bench_with_input(BenchmarkId::new(layout, count), &value, |b, value| {
                b.iter(|| serializer.serialize(value).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");
    for count in [10, 100, 1_000] {
        let value = records(count);
        for (layout, config) in configs() {
            let serializer = Serializer::new(config);
            let encoded = serializer.serialize(&value).unwrap();
            group.throughput(Throughput::Bytes(encoded.len() as u64));
            group.bench_with_input(BenchmarkId::new(layout, count), &encoded, |b, encoded| {
                b.iter(|| serializer.deserialize::<Vec<Record>>(encoded).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming");
    let serializer = Serializer::default();
    let value = records(100);
    let encoded = serializer.serialize(&value).unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    for window in [16, 256, 4_096] {
        group.bench_with_input(BenchmarkId::new("encode", window), &window, |b, &window| {
            let mut out = vec![0u8; window];
            b.iter(|| {
                let mut encoder = serializer.encoder(&value).unwrap();
                loop {
                    match encoder.write_into(&mut out).unwrap() {
                        Encoded::Complete { .. } => break,
                        Encoded::Needs { window: next, .. } => {
                            if next > out.len() {
                                out.resize(next, 0);
                            }
                        }
                    }
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("decode", window), &window, |b, &window| {
            b.iter(|| {
                let mut decoder = serializer.decoder::<Vec<Record>>().unwrap();
                for chunk in encoded.chunks(window) {
                    if let Decoded::Complete(value) = decoder.feed(chunk).unwrap() {
                        return value;
                    }
                }
                unreachable!("payload is complete");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_serialize, bench_deserialize, bench_streaming);
criterion_main!(benches);
