#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::{BTreeMap, HashSet};
use strata_codec::{object, Config, Decoded, Encoded, Model, Serializer};

#[derive(Arbitrary, Debug, Default, PartialEq)]
struct Sample {
    flag: bool,
    small: u8,
    wide: i128,
    text: Option<String>,
    list: Vec<Option<u16>>,
    set: HashSet<char>,
    map: BTreeMap<u32, Vec<u8>>,
    pair: (i64, String),
}

object!(Sample {
    flag: bool,
    small: u8,
    wide: i128,
    text: Option<String>,
    list: Vec<Option<u16>>,
    set: HashSet<char>,
    map: BTreeMap<u32, Vec<u8>>,
    pair: (i64, String),
});

#[derive(Arbitrary, Debug)]
struct Options {
    null_flags: bool,
    include_types: bool,
    use_property_names: bool,
    index_size_u16: bool,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    options: Options,
    value: Sample,
    window: u8,
    chunk: u8,
}

fn config(options: &Options) -> Config {
    Config {
        null_flags: options.null_flags,
        include_types: options.include_types,
        use_property_names: options.use_property_names,
        index_size_u16: options.index_size_u16,
        ..Config::default()
    }
}

fn stream<T: Model + PartialEq + std::fmt::Debug>(
    serializer: &Serializer,
    value: &T,
    window: usize,
    chunk: usize,
) {
    let expected = serializer.serialize(value).expect("failed to serialize");

    // Encode through small windows.
    let mut encoder = serializer.encoder(value).expect("failed to build encoder");
    let mut out = vec![0u8; window];
    let mut encoded = Vec::with_capacity(expected.len());
    loop {
        match encoder.write_into(&mut out).expect("failed to encode") {
            Encoded::Complete { written } => {
                encoded.extend_from_slice(&out[..written]);
                break;
            }
            Encoded::Needs { written, window: next } => {
                encoded.extend_from_slice(&out[..written]);
                out.resize(out.len().max(next), 0);
            }
        }
    }
    assert_eq!(encoded, expected.as_ref());

    // Decode through small chunks.
    let mut decoder = serializer.decoder::<T>().expect("failed to build decoder");
    let mut decoded = None;
    for piece in encoded.chunks(chunk) {
        assert!(decoded.is_none(), "decoder completed before the payload ended");
        if let Decoded::Complete(value) = decoder.feed(piece).expect("failed to decode") {
            decoded = Some(value);
        }
    }
    assert_eq!(decoded.as_ref(), Some(value));
}

fn fuzz(input: FuzzInput) {
    let serializer = Serializer::new(config(&input.options));
    let window = usize::from(input.window).max(1);
    let chunk = usize::from(input.chunk).max(1);
    stream(&serializer, &input.value, window, chunk);
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
