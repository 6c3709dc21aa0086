// Property-based signature tests for dwire

mod common;

use common::*;
use dwire_core::value::Value;
use dwire_core::{Signature, SignatureError};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Every generated signature parses as a single complete type
    #[test]
    fn test_generated_signatures_validate(sig in arb_single_signature(3)) {
        prop_assert!(Signature::single(&sig).is_ok(), "signature {:?} failed to parse", sig);
    }

    /// A value built for a signature derives exactly that signature back
    #[test]
    fn test_value_signature_roundtrip((sig, value) in arb_signature_and_value()) {
        let value_sig = value.signature();
        prop_assert_eq!(value_sig.as_str(), sig.as_str());
    }

    /// Concatenating complete types still validates
    #[test]
    fn test_signature_sequences_validate(
        sigs in prop::collection::vec(arb_single_signature(2), 0..4)
    ) {
        let joined = sigs.concat();
        if joined.len() <= 255 {
            prop_assert!(Signature::new(&joined).is_ok());
        }
    }

    /// Arrays constructed from homogeneous generated elements succeed with
    /// the inferred signature
    #[test]
    fn test_array_inference_matches_explicit((sig, value) in arb_signature_and_value()) {
        let items = vec![value.clone(), value];
        let inferred = Value::array(items.clone()).expect("homogeneous items");
        let explicit = Value::array_with_signature(
            Signature::single(&sig).expect("generated signature"),
            items,
        )
        .expect("matching declared signature");
        prop_assert_eq!(inferred.signature(), explicit.signature());
        let inferred_sig = inferred.signature();
        let expected = format!("a{sig}");
        prop_assert_eq!(inferred_sig.as_str(), expected.as_str());
    }

    /// Empty arrays and dictionaries of arbitrary declared type derive the
    /// declared signature
    #[test]
    fn test_empty_containers_keep_declared_signature(sig in arb_single_signature(3)) {
        let declared = Signature::single(&sig).expect("generated signature");
        let empty = Value::array_with_signature(declared, vec![]).expect("empty array");
        prop_assert_eq!(empty.count(), 0);
        let empty_sig = empty.signature();
        let expected = format!("a{sig}");
        prop_assert_eq!(empty_sig.as_str(), expected.as_str());
    }
}

#[test]
fn test_rejects_bare_dict_entry() {
    assert!(matches!(
        Signature::new("{ys}"),
        Err(SignatureError::UnexpectedByte { byte: b'{', pos: 0 })
    ));
}

#[test]
fn test_rejects_truncated_array() {
    assert!(matches!(
        Signature::new("aa"),
        Err(SignatureError::UnexpectedEnd(_))
    ));
}
