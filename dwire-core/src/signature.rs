// Type-signature grammar for the wire format

use crate::error::SignatureError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum byte length of a signature string.
pub const MAX_SIGNATURE_LENGTH: usize = 255;

/// Maximum nesting depth of struct parentheses.
pub const MAX_STRUCT_DEPTH: u32 = 32;

/// Maximum nesting depth of array type codes.
pub const MAX_ARRAY_DEPTH: u32 = 32;

/// Value kinds of the wire format's type grammar.
///
/// Every value in the model has exactly one of these kinds. `Invalid` is the
/// sentinel reported where no concrete kind applies (for example the item
/// kind of a scalar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Byte,
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    ObjectPath,
    Signature,
    Array,
    Struct,
    Dictionary,
    Variant,
    UnixFd,
    Invalid,
}

impl Kind {
    /// The single type code used in signatures, or `None` for `Invalid`.
    ///
    /// `Struct` and `Dictionary` report the reserved codes `r` and `e`;
    /// in serialized signatures they appear as `(...)` and `a{..}`.
    pub fn code(self) -> Option<u8> {
        match self {
            Kind::Byte => Some(b'y'),
            Kind::Bool => Some(b'b'),
            Kind::Int16 => Some(b'n'),
            Kind::UInt16 => Some(b'q'),
            Kind::Int32 => Some(b'i'),
            Kind::UInt32 => Some(b'u'),
            Kind::Int64 => Some(b'x'),
            Kind::UInt64 => Some(b't'),
            Kind::Double => Some(b'd'),
            Kind::String => Some(b's'),
            Kind::ObjectPath => Some(b'o'),
            Kind::Signature => Some(b'g'),
            Kind::Array => Some(b'a'),
            Kind::Struct => Some(b'r'),
            Kind::Dictionary => Some(b'e'),
            Kind::Variant => Some(b'v'),
            Kind::UnixFd => Some(b'h'),
            Kind::Invalid => None,
        }
    }

    /// Map a type code back to its kind; unknown bytes map to `Invalid`.
    pub fn from_code(code: u8) -> Kind {
        match code {
            b'y' => Kind::Byte,
            b'b' => Kind::Bool,
            b'n' => Kind::Int16,
            b'q' => Kind::UInt16,
            b'i' => Kind::Int32,
            b'u' => Kind::UInt32,
            b'x' => Kind::Int64,
            b't' => Kind::UInt64,
            b'd' => Kind::Double,
            b's' => Kind::String,
            b'o' => Kind::ObjectPath,
            b'g' => Kind::Signature,
            b'a' => Kind::Array,
            b'r' | b'(' => Kind::Struct,
            b'e' | b'{' => Kind::Dictionary,
            b'v' => Kind::Variant,
            b'h' => Kind::UnixFd,
            _ => Kind::Invalid,
        }
    }

    /// Basic (non-container) kinds; the only kinds permitted as dictionary
    /// keys.
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            Kind::Byte
                | Kind::Bool
                | Kind::Int16
                | Kind::UInt16
                | Kind::Int32
                | Kind::UInt32
                | Kind::Int64
                | Kind::UInt64
                | Kind::Double
                | Kind::String
                | Kind::ObjectPath
                | Kind::Signature
                | Kind::UnixFd
        )
    }

    /// Natural alignment of a value of this kind, in bytes.
    ///
    /// String-like kinds align on their length field. `Variant` aligns on its
    /// leading signature, so 1. Structs and dictionary entries are 8-aligned
    /// as a whole.
    pub fn alignment(self) -> usize {
        match self {
            Kind::Byte | Kind::Signature | Kind::Variant | Kind::Invalid => 1,
            Kind::Int16 | Kind::UInt16 => 2,
            Kind::Bool
            | Kind::Int32
            | Kind::UInt32
            | Kind::String
            | Kind::ObjectPath
            | Kind::Array
            | Kind::Dictionary
            | Kind::UnixFd => 4,
            Kind::Int64 | Kind::UInt64 | Kind::Double | Kind::Struct => 8,
        }
    }
}

/// Alignment of the type starting at the given signature byte.
pub(crate) fn alignment_for_code(code: u8) -> usize {
    match code {
        b'(' | b'{' => 8,
        _ => Kind::from_code(code).alignment(),
    }
}

/// A validated type-signature string.
///
/// Holds a sequence of complete types per the grammar: one code per basic
/// type, `a` prefixing an element type, `(...)` wrapping struct fields,
/// `a{kv}` for dictionaries, `v` for variants. Validation happens at
/// construction; a `Signature` in hand is always well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Parse and validate a signature containing zero or more complete types.
    pub fn new(s: &str) -> Result<Self, SignatureError> {
        validate(s.as_bytes())?;
        Ok(Signature(s.to_string()))
    }

    /// Parse a signature that must contain exactly one complete type.
    ///
    /// This is the form required for array item and dictionary value
    /// signatures, and for variant payloads.
    pub fn single(s: &str) -> Result<Self, SignatureError> {
        validate(s.as_bytes())?;
        let sig = Signature(s.to_string());
        if !sig.is_single() {
            return Err(SignatureError::NotSingleCompleteType(s.to_string()));
        }
        Ok(sig)
    }

    /// Whether this signature is exactly one complete type.
    pub fn is_single(&self) -> bool {
        let bytes = self.0.as_bytes();
        !bytes.is_empty() && complete_type_len(bytes, 0) == bytes.len()
    }

    /// Build from a string already known to be well formed (used for
    /// structurally derived signatures).
    pub(crate) fn from_derived(s: String) -> Self {
        Signature(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Alignment of the leading complete type; 1 for an empty signature.
    pub fn first_type_alignment(&self) -> usize {
        match self.0.as_bytes().first() {
            Some(&code) => alignment_for_code(code),
            None => 1,
        }
    }

    /// Kind of the leading complete type; `Invalid` for an empty signature.
    pub fn first_type_kind(&self) -> Kind {
        let bytes = self.0.as_bytes();
        match bytes.first() {
            Some(b'a') => {
                if bytes.get(1) == Some(&b'{') {
                    Kind::Dictionary
                } else {
                    Kind::Array
                }
            }
            Some(&code) => Kind::from_code(code),
            None => Kind::Invalid,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::new(&s).map_err(D::Error::custom)
    }
}

/// Validate a byte string as a sequence of complete types.
fn validate(bytes: &[u8]) -> Result<(), SignatureError> {
    if bytes.len() > MAX_SIGNATURE_LENGTH {
        return Err(SignatureError::TooLong(bytes.len()));
    }
    let mut pos = 0;
    while pos < bytes.len() {
        pos = parse_complete_type(bytes, pos, 0, 0)?;
    }
    Ok(())
}

/// Parse one complete type starting at `pos`, returning the position just
/// past it.
fn parse_complete_type(
    bytes: &[u8],
    pos: usize,
    struct_depth: u32,
    array_depth: u32,
) -> Result<usize, SignatureError> {
    let code = *bytes
        .get(pos)
        .ok_or(SignatureError::UnexpectedEnd(bytes.len()))?;
    match code {
        b'a' => {
            if array_depth + 1 > MAX_ARRAY_DEPTH {
                return Err(SignatureError::DepthExceeded { pos });
            }
            let next = pos + 1;
            if bytes.get(next) == Some(&b'{') {
                parse_dict_entry(bytes, next, struct_depth, array_depth + 1)
            } else {
                parse_complete_type(bytes, next, struct_depth, array_depth + 1)
            }
        }
        b'(' => {
            if struct_depth + 1 > MAX_STRUCT_DEPTH {
                return Err(SignatureError::DepthExceeded { pos });
            }
            let mut inner = pos + 1;
            if bytes.get(inner) == Some(&b')') {
                return Err(SignatureError::EmptyStruct { pos });
            }
            loop {
                match bytes.get(inner) {
                    Some(b')') => return Ok(inner + 1),
                    Some(_) => {
                        inner = parse_complete_type(bytes, inner, struct_depth + 1, array_depth)?;
                    }
                    None => return Err(SignatureError::UnterminatedStruct { pos }),
                }
            }
        }
        b'{' => {
            // Dict entries are only complete inside an array.
            Err(SignatureError::UnexpectedByte { byte: code, pos })
        }
        _ => {
            let kind = Kind::from_code(code);
            if kind == Kind::Invalid || kind == Kind::Struct || kind == Kind::Dictionary {
                Err(SignatureError::UnexpectedByte { byte: code, pos })
            } else {
                Ok(pos + 1)
            }
        }
    }
}

/// Parse a `{kv}` dictionary entry starting at the opening brace.
fn parse_dict_entry(
    bytes: &[u8],
    pos: usize,
    struct_depth: u32,
    array_depth: u32,
) -> Result<usize, SignatureError> {
    let key_pos = pos + 1;
    let key_code = *bytes
        .get(key_pos)
        .ok_or(SignatureError::UnterminatedDictEntry { pos })?;
    let key_kind = Kind::from_code(key_code);
    if !key_kind.is_basic() {
        return Err(SignatureError::NonBasicDictKey {
            byte: key_code,
            pos: key_pos,
        });
    }
    let value_end = parse_complete_type(bytes, key_pos + 1, struct_depth, array_depth)?;
    match bytes.get(value_end) {
        Some(b'}') => Ok(value_end + 1),
        Some(&byte) => Err(SignatureError::UnexpectedByte {
            byte,
            pos: value_end,
        }),
        None => Err(SignatureError::UnterminatedDictEntry { pos }),
    }
}

/// Length in bytes of the complete type starting at `pos`.
///
/// Assumes the input already validated; walks structurally without
/// re-checking.
fn complete_type_len(bytes: &[u8], pos: usize) -> usize {
    match bytes[pos] {
        b'a' => 1 + complete_type_len(bytes, pos + 1),
        b'(' => {
            let mut inner = pos + 1;
            while bytes[inner] != b')' {
                inner += complete_type_len(bytes, inner);
            }
            inner + 1 - pos
        }
        b'{' => {
            let value_len = complete_type_len(bytes, pos + 2);
            // brace + key + value + brace
            3 + value_len
        }
        _ => 1,
    }
}
