#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use strata_codec::{object, Config, Decoded, Serializer};

#[derive(Debug, Default, PartialEq)]
struct Tree {
    label: String,
    weight: Option<i64>,
    children: Vec<Tree>,
    attributes: HashMap<String, i32>,
}

object!(Tree {
    label: String,
    weight: Option<i64>,
    children: Vec<Tree>,
    attributes: HashMap<String, i32>,
});

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    null_flags: bool,
    use_property_names: bool,
    chunk: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let serializer = Serializer::new(Config {
        null_flags: input.null_flags,
        use_property_names: input.use_property_names,
        max_array_size: 1024,
        ..Config::default()
    });

    // Arbitrary input must never panic, and chunking must not change the outcome.
    let whole = serializer.deserialize::<Tree>(&input.data);
    let mut decoder = serializer.decoder::<Tree>().unwrap();
    let mut streamed = None;
    for piece in input.data.chunks(usize::from(input.chunk).max(1)) {
        match decoder.feed(piece) {
            Ok(Decoded::Complete(value)) => {
                streamed = Some(Ok(value));
                break;
            }
            Ok(Decoded::Needs(_)) => {}
            Err(err) => {
                streamed = Some(Err(err));
                break;
            }
        }
    }
    match (whole, streamed) {
        (Ok(value), Some(Ok(streamed))) => assert_eq!(value, streamed),
        (Ok(_), other) => panic!("whole decode succeeded but streaming gave {other:?}"),
        (Err(_), _) => {}
    }
});
