// Test utilities and generators for dwire property-based testing

#![allow(dead_code)]

use dwire_core::signature::Kind;
use dwire_core::value::Value;
use dwire_core::Signature;
use proptest::prelude::*;

/// Generate one basic type code.
pub fn arb_basic_code() -> impl Strategy<Value = char> {
    prop_oneof![
        Just('y'),
        Just('b'),
        Just('n'),
        Just('q'),
        Just('i'),
        Just('u'),
        Just('x'),
        Just('t'),
        Just('d'),
        Just('s'),
        Just('h'),
    ]
}

/// Generate a single-complete-type signature string with limited nesting.
pub fn arb_single_signature(depth: u32) -> BoxedStrategy<String> {
    let leaf = prop_oneof![
        arb_basic_code().prop_map(|c| c.to_string()),
        Just("o".to_string()),
        Just("g".to_string()),
        Just("v".to_string()),
    ];

    leaf.prop_recursive(depth, 32, 4, |inner| {
        prop_oneof![
            // Arrays
            inner.clone().prop_map(|item| format!("a{item}")),
            // Structs
            prop::collection::vec(inner.clone(), 1..4)
                .prop_map(|fields| format!("({})", fields.concat())),
            // Dictionaries
            (arb_basic_code(), inner).prop_map(|(key, value)| format!("a{{{key}{value}}}")),
        ]
        .boxed()
    })
    .boxed()
}

/// Generate a value whose derived signature is exactly `sig`.
pub fn arb_value_for_signature(sig: &str) -> BoxedStrategy<Value> {
    let bytes = sig.as_bytes();
    match bytes[0] {
        b'y' => any::<u8>().prop_map(Value::Byte).boxed(),
        b'b' => any::<bool>().prop_map(Value::Bool).boxed(),
        b'n' => any::<i16>().prop_map(Value::Int16).boxed(),
        b'q' => any::<u16>().prop_map(Value::UInt16).boxed(),
        b'i' => any::<i32>().prop_map(Value::Int32).boxed(),
        b'u' => any::<u32>().prop_map(Value::UInt32).boxed(),
        b'x' => any::<i64>().prop_map(Value::Int64).boxed(),
        b't' => any::<u64>().prop_map(Value::UInt64).boxed(),
        b'd' => any::<f64>().prop_map(Value::Double).boxed(),
        b's' => "[a-zA-Z0-9 ]*".prop_map(Value::from).boxed(),
        b'o' => arb_object_path().boxed(),
        b'g' => arb_single_signature(2)
            .prop_map(|s| Value::Signature(Signature::new(&s).expect("generated signature")))
            .boxed(),
        b'h' => (0u32..8).prop_map(Value::unix_fd).boxed(),
        b'v' => arb_single_signature(1)
            .prop_flat_map(|inner_sig| arb_value_for_signature(&inner_sig))
            .prop_map(Value::variant)
            .boxed(),
        b'a' => {
            if bytes.get(1) == Some(&b'{') {
                let key_code = bytes[2] as char;
                let value_sig = sig[3..sig.len() - 1].to_string();
                let key_kind = Kind::from_code(key_code as u8);
                let value_signature =
                    Signature::single(&value_sig).expect("generated value signature");
                prop::collection::vec(
                    (
                        arb_value_for_signature(&key_code.to_string()),
                        arb_value_for_signature(&value_sig),
                    ),
                    0..4,
                )
                .prop_map(move |entries| {
                    Value::dictionary(key_kind, value_signature.clone(), entries)
                        .expect("generated entries match the declared types")
                })
                .boxed()
            } else {
                let item_sig = sig[1..].to_string();
                let item_signature =
                    Signature::single(&item_sig).expect("generated item signature");
                prop::collection::vec(arb_value_for_signature(&item_sig), 0..4)
                    .prop_map(move |items| {
                        Value::array_with_signature(item_signature.clone(), items)
                            .expect("generated items match the declared signature")
                    })
                    .boxed()
            }
        }
        b'(' => {
            let field_sigs = split_fields(&sig[1..sig.len() - 1]);
            let field_gens: Vec<BoxedStrategy<Value>> = field_sigs
                .iter()
                .map(|f| arb_value_for_signature(f))
                .collect();
            field_gens
                .prop_map(|fields| Value::structure(fields).expect("generated structs have fields"))
                .boxed()
        }
        other => panic!("unhandled signature code {:?}", other as char),
    }
}

/// Generate a (signature, matching value) pair.
pub fn arb_signature_and_value() -> impl Strategy<Value = (String, Value)> {
    arb_single_signature(3).prop_flat_map(|sig| {
        let value_gen = arb_value_for_signature(&sig);
        (Just(sig), value_gen)
    })
}

/// Generate a standalone value tree.
pub fn arb_value() -> impl Strategy<Value = Value> {
    arb_signature_and_value().prop_map(|(_, value)| value)
}

pub fn arb_object_path() -> impl Strategy<Value = Value> {
    prop::collection::vec("[a-zA-Z0-9_]{1,8}", 0..4).prop_map(|elems| {
        let path = if elems.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", elems.join("/"))
        };
        Value::ObjectPath(
            dwire_core::ObjectPath::new(&path).expect("generated path is valid"),
        )
    })
}

/// Split a struct body into its field signatures.
pub fn split_fields(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = complete_type_len(bytes, pos);
        fields.push(body[pos..pos + len].to_string());
        pos += len;
    }
    fields
}

fn complete_type_len(bytes: &[u8], pos: usize) -> usize {
    match bytes[pos] {
        b'a' => {
            if bytes.get(pos + 1) == Some(&b'{') {
                let value_len = complete_type_len(bytes, pos + 3);
                // a { key value }
                4 + value_len
            } else {
                1 + complete_type_len(bytes, pos + 1)
            }
        }
        b'(' => {
            let mut inner = pos + 1;
            while bytes[inner] != b')' {
                inner += complete_type_len(bytes, inner);
            }
            inner + 1 - pos
        }
        _ => 1,
    }
}
