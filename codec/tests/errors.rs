use strata_codec::{object, Config, Error, Serializer};

#[derive(Debug, Default, PartialEq)]
struct Account {
    owner: String,
    balance: Option<u64>,
}

object!(Account {
    owner: String,
    balance: Option<u64>,
});

#[derive(Debug, Default, PartialEq)]
struct Ledger {
    owner: String,
    balance: Option<u64>,
}

object!(Ledger {
    owner: String,
    balance: Option<u64>,
});

#[derive(Debug, Default, PartialEq)]
struct Clash {
    a: u8,
    b: u8,
}

object!(Clash {
    #[index = 2]
    a: u8,
    b: u8,
});

#[derive(Debug, Default, PartialEq)]
struct Reserved {
    a: u8,
}

object!(Reserved {
    #[index = 0]
    a: u8,
});

#[test]
fn test_invalid_null_marker() {
    let serializer = Serializer::default();
    assert!(matches!(
        serializer.deserialize::<Option<u8>>(&[2, 0]),
        Err(Error::Format("null marker", _))
    ));
}

#[test]
fn test_invalid_primitives() {
    let serializer = Serializer::default();
    assert!(matches!(
        serializer.deserialize::<bool>(&[2]),
        Err(Error::Format("bool", _))
    ));
    assert!(matches!(
        serializer.deserialize::<char>(&[0x00, 0xd8, 0, 0]),
        Err(Error::Format("char", _))
    ));
    assert!(matches!(
        serializer.deserialize::<String>(&[2, 0, 0, 0, 0xff, 0xfe]),
        Err(Error::Format(_, _))
    ));
}

#[test]
fn test_negative_length() {
    let serializer = Serializer::default();
    assert!(matches!(
        serializer.deserialize::<String>(&[0xff, 0xff, 0xff, 0xff]),
        Err(Error::Format("length prefix", _))
    ));
    assert!(matches!(
        serializer.deserialize::<Vec<u8>>(&(-7i32).to_le_bytes()),
        Err(Error::Format("length prefix", _))
    ));
}

#[test]
fn test_length_exceeded() {
    let serializer = Serializer::new(Config {
        max_array_size: 8,
        ..Config::default()
    });

    // Rejected from the prefix alone, before the payload arrives.
    assert!(matches!(
        serializer.deserialize::<Vec<u64>>(&9i32.to_le_bytes()),
        Err(Error::LengthExceeded(9, 8))
    ));
    assert!(matches!(
        serializer.deserialize::<String>(&i32::MAX.to_le_bytes()),
        Err(Error::LengthExceeded(_, 8))
    ));
    assert!(matches!(
        serializer.serialize(&"too long for this".to_string()),
        Err(Error::LengthExceeded(17, 8))
    ));
    assert!(serializer.serialize(&"fits".to_string()).is_ok());
}

#[test]
fn test_out_of_range_conversion() {
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&300u64).unwrap();
    assert!(matches!(
        serializer.deserialize_as::<u64, u8>(&encoded),
        Err(Error::OutOfRange(_, _))
    ));
    assert!(matches!(
        serializer.serialize_as::<u8, i32>(&-1),
        Err(Error::OutOfRange(_, _))
    ));
    let encoded = serializer.serialize(&1.5f64).unwrap();
    assert!(matches!(
        serializer.deserialize_as::<f64, i64>(&encoded),
        Err(Error::OutOfRange(_, _))
    ));
}

#[test]
fn test_not_supported() {
    let serializer = Serializer::default();
    assert!(matches!(
        serializer.serialize_as::<String, u32>(&1),
        Err(Error::NotSupported(_, _))
    ));
    assert!(matches!(
        serializer.prepare::<Account, Ledger>(),
        Err(Error::NotSupported(_, _))
    ));
    assert!(matches!(
        serializer.prepare::<Vec<(u8, u8)>, std::collections::HashMap<u8, u8>>(),
        Err(Error::NotSupported(_, _))
    ));

    // Nothing was consumed or cached for the failed pairs.
    assert!(matches!(
        serializer.decoder_as::<String, u32>(),
        Err(Error::NotSupported(_, _))
    ));
    assert!(serializer.registry().is_empty());
}

#[test]
fn test_invalid_ordinals() {
    let serializer = Serializer::default();
    assert!(matches!(
        serializer.prepare::<Clash, Clash>(),
        Err(Error::Format("member index", _))
    ));
    assert!(matches!(
        serializer.prepare::<Reserved, Reserved>(),
        Err(Error::Format("member index", _))
    ));

    // Declaration order needs no explicit ordinals.
    let serializer = Serializer::new(Config {
        ignore_index_attribute: true,
        ..Config::default()
    });
    assert!(serializer.prepare::<Clash, Clash>().is_ok());
    assert!(serializer.prepare::<Reserved, Reserved>().is_ok());
}

#[test]
fn test_unknown_member() {
    let serializer = Serializer::new(Config {
        null_flags: false,
        ..Config::default()
    });
    assert!(matches!(
        serializer.deserialize::<Account>(&[5, 0]),
        Err(Error::Format("member", _))
    ));

    let serializer = Serializer::new(Config {
        use_property_names: true,
        ..Config::default()
    });
    assert!(matches!(
        serializer.deserialize::<Account>(&[3, b'f', b'o', b'o', 0, 0]),
        Err(Error::Format("member", _))
    ));
}

#[test]
fn test_discriminator_mismatch() {
    let serializer = Serializer::new(Config {
        include_types: true,
        ..Config::default()
    });
    let account = Account {
        owner: "eve".into(),
        balance: Some(5),
    };
    let encoded = serializer.serialize(&account).unwrap();
    assert_eq!(serializer.deserialize::<Account>(&encoded).unwrap(), account);
    assert!(matches!(
        serializer.deserialize::<Ledger>(&encoded),
        Err(Error::Format("type discriminator", _))
    ));

    // Without discriminators the two shapes are indistinguishable.
    let serializer = Serializer::default();
    let encoded = serializer.serialize(&account).unwrap();
    assert!(serializer.deserialize::<Ledger>(&encoded).is_ok());
}

#[test]
fn test_truncated_and_trailing_input() {
    let serializer = Serializer::default();
    let account = Account {
        owner: "eve".into(),
        balance: Some(5),
    };
    let encoded = serializer.serialize(&account).unwrap();
    assert!(matches!(
        serializer.deserialize::<Account>(&encoded[..encoded.len() - 2]),
        Err(Error::EndOfBuffer(2))
    ));
    let mut padded = encoded.to_vec();
    padded.extend_from_slice(&[0, 0, 0]);
    assert!(matches!(
        serializer.deserialize::<Account>(&padded),
        Err(Error::ExtraData(3))
    ));
}

#[test]
fn test_failed_deserialize_into_resets_target() {
    let serializer = Serializer::default();
    let mut target = Account {
        owner: "kept".into(),
        balance: Some(1),
    };
    assert!(serializer.deserialize_into(&[1, 0], &mut target).is_err());
    assert_eq!(target, Account::default());
}
