use std::collections::BTreeMap;
use strata_codec::{object, Config, Decoded, Encoded, Error, Serializer};

#[derive(Debug, Default, PartialEq)]
struct Order {
    id: u64,
    customer: Option<String>,
    lines: Vec<Line>,
    notes: BTreeMap<u16, String>,
}

object!(Order {
    id: u64,
    customer: Option<String>,
    lines: Vec<Line>,
    notes: BTreeMap<u16, String>,
});

#[derive(Debug, Default, PartialEq)]
struct Line {
    sku: String,
    quantity: u32,
    discount: Option<f32>,
}

object!(Line {
    sku: String,
    quantity: u32,
    discount: Option<f32>,
});

fn order() -> Order {
    Order {
        id: 0xdead_beef,
        customer: Some("acme".into()),
        lines: vec![
            Line {
                sku: "bolt-m4".into(),
                quantity: 40,
                discount: None,
            },
            Line {
                sku: "nut".into(),
                quantity: 12,
                discount: Some(0.5),
            },
        ],
        notes: BTreeMap::from([(1, "rush".to_string()), (7, String::new())]),
    }
}

fn configs() -> Vec<Config> {
    vec![
        Config::default(),
        Config {
            null_flags: false,
            ..Config::default()
        },
        Config {
            use_property_names: true,
            include_types: true,
            ..Config::default()
        },
        Config {
            null_flags: false,
            index_size_u16: true,
            ..Config::default()
        },
    ]
}

/// Encodes through an [strata_codec::Encoder], starting from `start` byte windows and
/// widening only when a single field does not fit.
fn encode_in_windows(serializer: &Serializer, value: &Order, start: usize) -> Vec<u8> {
    let mut encoder = serializer.encoder(value).unwrap();
    let mut out = Vec::new();
    let mut window = vec![0u8; start];
    loop {
        match encoder.write_into(&mut window).unwrap() {
            Encoded::Complete { written } => {
                out.extend_from_slice(&window[..written]);
                assert!(encoder.is_complete());
                return out;
            }
            Encoded::Needs { written, window: next } => {
                out.extend_from_slice(&window[..written]);
                assert!(next > window.len() - written);
                window = vec![0u8; next.max(start)];
            }
        }
    }
}

#[test]
fn test_byte_at_a_time_decode() {
    for config in configs() {
        let serializer = Serializer::new(config);
        let encoded = serializer.serialize(&order()).unwrap();
        let mut decoder = serializer.decoder::<Order>().unwrap();
        let (last, rest) = encoded.split_last().unwrap();
        for byte in rest {
            match decoder.feed(std::slice::from_ref(byte)).unwrap() {
                Decoded::Needs(needed) => assert!(needed >= 1),
                Decoded::Complete(_) => panic!("completed early"),
            }
        }
        match decoder.feed(std::slice::from_ref(last)).unwrap() {
            Decoded::Complete(value) => assert_eq!(value, order()),
            Decoded::Needs(needed) => panic!("still needs {needed} bytes"),
        }
    }
}

#[test]
fn test_every_split_point() {
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&order()).unwrap();
    for split in 0..=encoded.len() {
        let mut decoder = serializer.decoder::<Order>().unwrap();
        let first = decoder.feed(&encoded[..split]).unwrap();
        let value = match first {
            Decoded::Complete(value) => {
                assert_eq!(split, encoded.len());
                value
            }
            Decoded::Needs(_) => match decoder.feed(&encoded[split..]).unwrap() {
                Decoded::Complete(value) => value,
                Decoded::Needs(needed) => panic!("split {split} still needs {needed}"),
            },
        };
        assert_eq!(value, order());
    }
}

#[test]
fn test_reported_need_is_exact() {
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&order()).unwrap();
    let mut decoder = serializer.decoder::<Order>().unwrap();
    let mut offset = 0;
    loop {
        // Feeding exactly the reported need always makes progress.
        let needed = match decoder.feed(&[]).unwrap() {
            Decoded::Needs(needed) => needed,
            Decoded::Complete(_) => unreachable!("empty feed cannot complete"),
        };
        assert!(offset + needed <= encoded.len());
        match decoder.feed(&encoded[offset..offset + needed]).unwrap() {
            Decoded::Complete(value) => {
                assert_eq!(offset + needed, encoded.len());
                assert_eq!(value, order());
                return;
            }
            Decoded::Needs(_) => offset += needed,
        }
    }
}

#[test]
fn test_retry_reports_same_need() {
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&order()).unwrap();
    let mut decoder = serializer.decoder::<Order>().unwrap();

    // Half of the u64 id.
    let first = decoder.feed(&encoded[..4]).unwrap();
    assert_eq!(first, Decoded::Needs(4));
    assert_eq!(decoder.buffered(), 4);
    for _ in 0..3 {
        assert_eq!(decoder.feed(&[]).unwrap(), Decoded::Needs(4));
        assert_eq!(decoder.buffered(), 4);
    }

    // The id completes, then the customer marker and half its length prefix.
    assert_eq!(decoder.feed(&encoded[4..11]).unwrap(), Decoded::Needs(2));
    assert_eq!(decoder.feed(&[]).unwrap(), Decoded::Needs(2));
    match decoder.feed(&encoded[11..]).unwrap() {
        Decoded::Complete(value) => assert_eq!(value, order()),
        Decoded::Needs(needed) => panic!("still needs {needed}"),
    }
}

#[test]
fn test_small_output_windows() {
    for config in configs() {
        let serializer = Serializer::new(config);
        let expected = serializer.serialize(&order()).unwrap();
        for start in [1, 2, 3, 5, 8, 64] {
            assert_eq!(encode_in_windows(&serializer, &order(), start), expected.as_ref());
        }
    }
}

#[test]
fn test_remainder_after_value() {
    let serializer = Serializer::default();
    let mut encoded = serializer.serialize(&order()).unwrap().to_vec();
    encoded.extend_from_slice(&[9, 9]);
    let mut decoder = serializer.decoder::<Order>().unwrap();
    match decoder.feed(&encoded).unwrap() {
        Decoded::Complete(value) => assert_eq!(value, order()),
        Decoded::Needs(needed) => panic!("still needs {needed}"),
    }
    assert_eq!(decoder.remainder(), &[9, 9]);
    assert!(matches!(
        decoder.feed(&[1]),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_finish_incomplete() {
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&order()).unwrap();
    let mut decoder = serializer.decoder::<Order>().unwrap();
    decoder.feed(&encoded[..encoded.len() - 3]).unwrap();
    assert!(matches!(decoder.finish(), Err(Error::EndOfBuffer(_))));

    let mut decoder = serializer.decoder::<Order>().unwrap();
    decoder.feed(&encoded[..5]).unwrap();
    assert!(matches!(decoder.feed(&encoded[5..]), Ok(Decoded::Complete(_))));
}

#[test]
fn test_failed_decoder_stays_failed() {
    let serializer = Serializer::default();
    let mut decoder = serializer.decoder::<Option<u8>>().unwrap();
    assert!(matches!(decoder.feed(&[2]), Err(Error::Format("null marker", _))));
    assert!(matches!(decoder.feed(&[1, 0]), Err(Error::InvalidState(_))));
}

#[test]
fn test_failed_encoder_stays_failed() {
    let serializer = Serializer::default();
    let value = -1i32;
    let mut encoder = serializer.encoder_as::<u8, i32>(&value).unwrap();
    let mut window = [0u8; 8];
    assert!(matches!(
        encoder.write_into(&mut window),
        Err(Error::OutOfRange(_, _))
    ));
    assert!(matches!(
        encoder.write_into(&mut window),
        Err(Error::InvalidState(_))
    ));
    assert!(!encoder.is_complete());
}

#[test]
fn test_array_from_length_prefix_alone() {
    let serializer = Serializer::default();
    let count = 16 * 1024 * 1024i32;
    let mut decoder = serializer.decoder::<Box<[Vec<u64>]>>().unwrap();
    assert_eq!(decoder.feed(&count.to_le_bytes()).unwrap(), Decoded::Needs(4));
    assert!(matches!(decoder.finish(), Err(Error::EndOfBuffer(4))));

    let array: Box<[Vec<u64>]> = vec![vec![1], vec![], vec![2, 3]].into_boxed_slice();
    let encoded = serializer.serialize(&array).unwrap();
    let mut decoder = serializer.decoder::<Box<[Vec<u64>]>>().unwrap();
    let (last, body) = encoded.split_last().unwrap();
    for byte in body {
        assert!(matches!(decoder.feed(&[*byte]).unwrap(), Decoded::Needs(_)));
    }
    assert_eq!(decoder.feed(&[*last]).unwrap(), Decoded::Complete(array));
}

#[test]
fn test_stream_io_with_short_reads() {
    /// A reader that hands out at most one byte per call.
    struct Trickle<'a>(&'a [u8]);

    impl std::io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some((first, rest)) = self.0.split_first() else {
                return Ok(0);
            };
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = *first;
            self.0 = rest;
            Ok(1)
        }
    }

    let serializer = Serializer::default();
    let mut sink = Vec::new();
    serializer.write_to(&order(), &mut sink).unwrap();
    assert_eq!(sink, serializer.serialize(&order()).unwrap().as_ref());
    let decoded = serializer.read_from::<Order>(Trickle(&sink)).unwrap();
    assert_eq!(decoded, order());
}
