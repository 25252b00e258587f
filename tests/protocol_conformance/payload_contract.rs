//! Payload contract

use crate::test_utils::*;
use proptest::prelude::*;
use tessera::{canonicalize, Error, TraitType, TypedPayload};

#[test]
fn pack_unpack_returns_equal_value() {
    let registry = registry();
    let value = note("title", "body with unicode \u{2713}");
    let payload = TypedPayload::pack(&value, &registry).unwrap();
    assert_eq!(payload.type_tag(), Note::TYPE_NAME);
    assert_eq!(payload.unpack::<Note>(&registry).unwrap(), value);
}

#[test]
fn transport_prefix_is_stripped() {
    let registry = registry();
    let value = note("a", "b");
    let packed = TypedPayload::pack(&value, &registry).unwrap();
    let received = TypedPayload::from_parts(
        "type.googleapis.com/myapp.Note",
        packed.bytes().to_vec(),
    );
    assert_eq!(received, packed);
    assert_eq!(received.unpack::<Note>(&registry).unwrap(), value);
}

#[test]
fn unknown_tag_is_unregistered() {
    let registry = registry();
    let payload = TypedPayload::from_parts("myapp.Missing", vec![0x80]);
    assert!(matches!(
        payload.unpack::<Note>(&registry),
        Err(Error::UnregisteredType(_))
    ));
}

#[test]
fn corrupt_bytes_fail_to_decode() {
    let registry = registry();
    let payload = TypedPayload::from_parts("myapp.Note", vec![0xc1, 0x00]);
    assert!(matches!(
        payload.unpack::<Note>(&registry),
        Err(Error::DecodeError(_))
    ));
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(tag in "[a-z./ ]{0,24}") {
        let once = canonicalize(&tag);
        prop_assert_eq!(canonicalize(&once), once);
    }
}
