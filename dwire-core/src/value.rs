// Value model - runtime representation of one wire value

use crate::error::{SignatureError, ValueError};
use crate::fd::{DuplicateHandle, HandleRegistry};
use crate::signature::{Kind, Signature};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Sentinel element count for kinds that have no elements.
pub const NO_COUNT: isize = -1;

/// One wire value: a scalar, a container, or a variant box.
///
/// Values are immutable once constructed. Trees are built bottom-up via the
/// constructors below, which validate structural consistency eagerly: a
/// failed construction never leaves a partial tree reachable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    Array {
        item_signature: Signature,
        items: Vec<Value>,
    },
    Struct {
        fields: Vec<Value>,
    },
    Dictionary {
        key_kind: Kind,
        value_signature: Signature,
        entries: Vec<(Value, Value)>,
    },
    Variant(Box<Value>),
    /// Index into an externally owned handle registry. The value never owns
    /// the descriptor itself.
    UnixFd {
        index: u32,
    },
}

/// A validated object path.
///
/// Absolute, `/`-separated, elements restricted to `[A-Za-z0-9_]`, no
/// trailing slash except for the root path itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: &str) -> Result<Self, ValueError> {
        if !is_valid_object_path(path) {
            return Err(ValueError::InvalidObjectPath(path.to_string()));
        }
        Ok(ObjectPath(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    if rest.is_empty() {
        // Covered by the "/" case above; a bare trailing slash is invalid.
        return false;
    }
    rest.split('/')
        .all(|elem| !elem.is_empty() && elem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
}

// Constructors

impl Value {
    /// Build an array, inferring the item signature from the first element.
    ///
    /// Fails on an empty sequence (use [`Value::array_with_signature`]) and
    /// on any element whose signature differs from the first element's.
    pub fn array(items: Vec<Value>) -> Result<Value, ValueError> {
        let first = items.first().ok_or(ValueError::EmptyArrayWithoutSignature)?;
        let item_signature = first.signature();
        Self::array_with_signature(item_signature, items)
    }

    /// Build an array against an explicitly declared item signature.
    ///
    /// The declared signature must be one complete type, and every element's
    /// derived signature must equal it; the first disagreement fails
    /// construction.
    pub fn array_with_signature(
        item_signature: Signature,
        items: Vec<Value>,
    ) -> Result<Value, ValueError> {
        if !item_signature.is_single() {
            return Err(ValueError::Signature(
                SignatureError::NotSingleCompleteType(item_signature.as_str().to_string()),
            ));
        }
        for item in &items {
            let actual = item.signature();
            if actual != item_signature {
                return Err(ValueError::ItemSignatureMismatch {
                    expected: item_signature.as_str().to_string(),
                    actual: actual.as_str().to_string(),
                });
            }
        }
        Ok(Value::Array {
            item_signature,
            items,
        })
    }

    /// Build a struct from an ordered list of heterogeneous fields.
    ///
    /// Structs carry at least one field; the signature grammar has no empty
    /// struct form.
    pub fn structure(fields: Vec<Value>) -> Result<Value, ValueError> {
        if fields.is_empty() {
            return Err(ValueError::EmptyStruct);
        }
        Ok(Value::Struct { fields })
    }

    /// Build a dictionary with a declared basic key kind and value signature.
    ///
    /// The value signature must be one complete type. Entry order is
    /// preserved. Every key must have exactly the declared kind's signature
    /// and every value the declared value signature.
    pub fn dictionary(
        key_kind: Kind,
        value_signature: Signature,
        entries: Vec<(Value, Value)>,
    ) -> Result<Value, ValueError> {
        if !key_kind.is_basic() {
            return Err(ValueError::NonBasicDictKey(key_kind));
        }
        if !value_signature.is_single() {
            return Err(ValueError::Signature(
                SignatureError::NotSingleCompleteType(value_signature.as_str().to_string()),
            ));
        }
        let key_signature = key_code_signature(key_kind);
        for (key, value) in &entries {
            let actual_key = key.signature();
            if actual_key != key_signature {
                return Err(ValueError::ItemSignatureMismatch {
                    expected: key_signature.as_str().to_string(),
                    actual: actual_key.as_str().to_string(),
                });
            }
            let actual_value = value.signature();
            if actual_value != value_signature {
                return Err(ValueError::ItemSignatureMismatch {
                    expected: value_signature.as_str().to_string(),
                    actual: actual_value.as_str().to_string(),
                });
            }
        }
        Ok(Value::Dictionary {
            key_kind,
            value_signature,
            entries,
        })
    }

    /// Wrap a value in a single variant box.
    pub fn variant(value: Value) -> Value {
        Value::Variant(Box::new(value))
    }

    /// Reference to a descriptor at `index` in an external handle registry.
    pub fn unix_fd(index: u32) -> Value {
        Value::UnixFd { index }
    }

    /// Shortcut for a descriptor reference pre-wrapped in `nesting` variant
    /// layers.
    pub fn unix_fd_nested(index: u32, nesting: u32) -> Value {
        let mut value = Value::unix_fd(index);
        for _ in 0..nesting {
            value = Value::variant(value);
        }
        value
    }
}

// Queries

impl Value {
    /// Kind of this node, without unwrapping variants.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Byte(_) => Kind::Byte,
            Value::Bool(_) => Kind::Bool,
            Value::Int16(_) => Kind::Int16,
            Value::UInt16(_) => Kind::UInt16,
            Value::Int32(_) => Kind::Int32,
            Value::UInt32(_) => Kind::UInt32,
            Value::Int64(_) => Kind::Int64,
            Value::UInt64(_) => Kind::UInt64,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::ObjectPath(_) => Kind::ObjectPath,
            Value::Signature(_) => Kind::Signature,
            Value::Array { .. } => Kind::Array,
            Value::Struct { .. } => Kind::Struct,
            Value::Dictionary { .. } => Kind::Dictionary,
            Value::Variant(_) => Kind::Variant,
            Value::UnixFd { .. } => Kind::UnixFd,
        }
    }

    /// Kind of the declared array item; `Invalid` for every other kind,
    /// including a variant layer itself.
    pub fn item_kind(&self) -> Kind {
        match self {
            Value::Array { item_signature, .. } => item_signature.first_type_kind(),
            _ => Kind::Invalid,
        }
    }

    /// Kind of the declared dictionary key; `Invalid` where inapplicable.
    pub fn key_kind(&self) -> Kind {
        match self {
            Value::Dictionary { key_kind, .. } => *key_kind,
            _ => Kind::Invalid,
        }
    }

    /// Kind of the declared dictionary value; `Invalid` where inapplicable.
    pub fn value_kind(&self) -> Kind {
        match self {
            Value::Dictionary {
                value_signature, ..
            } => value_signature.first_type_kind(),
            _ => Kind::Invalid,
        }
    }

    /// Element count for containers, [`NO_COUNT`] otherwise.
    ///
    /// Peels variant layers before counting.
    pub fn count(&self) -> isize {
        match self.unwrapped() {
            Value::Array { items, .. } => items.len() as isize,
            Value::Struct { fields } => fields.len() as isize,
            Value::Dictionary { entries, .. } => entries.len() as isize,
            _ => NO_COUNT,
        }
    }

    /// Canonical signature derived from the declared shape.
    ///
    /// A variant contributes exactly `v`, regardless of its payload.
    pub fn signature(&self) -> Signature {
        let mut out = String::new();
        self.push_signature(&mut out);
        Signature::from_derived(out)
    }

    fn push_signature(&self, out: &mut String) {
        match self {
            Value::Array { item_signature, .. } => {
                out.push('a');
                out.push_str(item_signature.as_str());
            }
            Value::Struct { fields } => {
                out.push('(');
                for field in fields {
                    field.push_signature(out);
                }
                out.push(')');
            }
            Value::Dictionary {
                key_kind,
                value_signature,
                ..
            } => {
                out.push_str("a{");
                // Constructor guarantees a basic key kind, which has a code.
                out.push(key_kind.code().unwrap_or(b'?') as char);
                out.push_str(value_signature.as_str());
                out.push('}');
            }
            other => {
                let code = other
                    .kind()
                    .code()
                    .expect("every concrete value kind has a type code");
                out.push(code as char);
            }
        }
    }

    /// Peel all leading variant layers.
    fn unwrapped(&self) -> &Value {
        let mut value = self;
        while let Value::Variant(inner) = value {
            value = inner;
        }
        value
    }

    /// Peel exactly one variant layer, exposing the immediate payload.
    pub fn variant_payload(&self) -> Result<&Value, ValueError> {
        match self {
            Value::Variant(inner) => Ok(inner),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Variant,
                actual: other.kind(),
            }),
        }
    }
}

// Scalar getters. All of them peel any number of variant layers before
// matching the requested kind.

macro_rules! scalar_getter {
    ($name:ident, $variant:ident, $ty:ty, $kind:expr) => {
        pub fn $name(&self) -> Result<$ty, ValueError> {
            match self.unwrapped() {
                Value::$variant(v) => Ok(*v),
                other => Err(ValueError::KindMismatch {
                    expected: $kind,
                    actual: other.kind(),
                }),
            }
        }
    };
}

impl Value {
    scalar_getter!(as_byte, Byte, u8, Kind::Byte);
    scalar_getter!(as_bool, Bool, bool, Kind::Bool);
    scalar_getter!(as_i16, Int16, i16, Kind::Int16);
    scalar_getter!(as_u16, UInt16, u16, Kind::UInt16);
    scalar_getter!(as_i32, Int32, i32, Kind::Int32);
    scalar_getter!(as_u32, UInt32, u32, Kind::UInt32);
    scalar_getter!(as_i64, Int64, i64, Kind::Int64);
    scalar_getter!(as_u64, UInt64, u64, Kind::UInt64);
    scalar_getter!(as_f64, Double, f64, Kind::Double);

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self.unwrapped() {
            Value::String(s) => Ok(s),
            other => Err(ValueError::KindMismatch {
                expected: Kind::String,
                actual: other.kind(),
            }),
        }
    }

    pub fn as_object_path(&self) -> Result<&ObjectPath, ValueError> {
        match self.unwrapped() {
            Value::ObjectPath(p) => Ok(p),
            other => Err(ValueError::KindMismatch {
                expected: Kind::ObjectPath,
                actual: other.kind(),
            }),
        }
    }

    pub fn as_signature(&self) -> Result<&Signature, ValueError> {
        match self.unwrapped() {
            Value::Signature(s) => Ok(s),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Signature,
                actual: other.kind(),
            }),
        }
    }

    /// Index into an external handle registry, for `UnixFd` values.
    pub fn fd_index(&self) -> Result<u32, ValueError> {
        match self.unwrapped() {
            Value::UnixFd { index } => Ok(*index),
            other => Err(ValueError::KindMismatch {
                expected: Kind::UnixFd,
                actual: other.kind(),
            }),
        }
    }
}

// Positional access and materialization

impl Value {
    pub fn array_element(&self, index: usize) -> Result<&Value, ValueError> {
        match self.unwrapped() {
            Value::Array { items, .. } => items.get(index).ok_or(ValueError::IndexOutOfRange {
                index,
                len: items.len(),
            }),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Array,
                actual: other.kind(),
            }),
        }
    }

    pub fn struct_field(&self, index: usize) -> Result<&Value, ValueError> {
        match self.unwrapped() {
            Value::Struct { fields } => fields.get(index).ok_or(ValueError::IndexOutOfRange {
                index,
                len: fields.len(),
            }),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Struct,
                actual: other.kind(),
            }),
        }
    }

    pub fn dictionary_entry(&self, index: usize) -> Result<(&Value, &Value), ValueError> {
        match self.unwrapped() {
            Value::Dictionary { entries, .. } => entries
                .get(index)
                .map(|(k, v)| (k, v))
                .ok_or(ValueError::IndexOutOfRange {
                    index,
                    len: entries.len(),
                }),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Dictionary,
                actual: other.kind(),
            }),
        }
    }

    /// Materialize an array into a typed sequence.
    pub fn as_array_of<T: FromValue>(&self) -> Result<Vec<T>, ValueError> {
        match self.unwrapped() {
            Value::Array { items, .. } => items.iter().map(T::from_value).collect(),
            other => Err(ValueError::KindMismatch {
                expected: Kind::Array,
                actual: other.kind(),
            }),
        }
    }

    /// Materialize a dictionary into an associative mapping.
    ///
    /// Last write wins on duplicate keys; positional access via
    /// [`Value::dictionary_entry`] preserves the original order.
    pub fn as_mapping_of<K, V>(&self) -> Result<HashMap<K, V>, ValueError>
    where
        K: FromValue + Eq + Hash,
        V: FromValue,
    {
        match self.unwrapped() {
            Value::Dictionary { entries, .. } => {
                let mut map = HashMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(K::from_value(key)?, V::from_value(value)?);
                }
                Ok(map)
            }
            other => Err(ValueError::KindMismatch {
                expected: Kind::Dictionary,
                actual: other.kind(),
            }),
        }
    }

    /// Resolve a `UnixFd` value against the registry that owns the
    /// descriptors.
    ///
    /// The returned handle is an independent duplicate; releasing it does
    /// not affect the registry's own copy.
    pub fn resolve_handle<H: DuplicateHandle>(
        &self,
        registry: &HandleRegistry<H>,
    ) -> crate::error::Result<H> {
        let index = self.fd_index()?;
        Ok(registry.resolve(index)?)
    }
}

/// Extraction of a typed scalar from a value node, with variant unwrapping.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

macro_rules! from_value_impl {
    ($ty:ty, $getter:ident) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, ValueError> {
                value.$getter()
            }
        }
    };
}

from_value_impl!(u8, as_byte);
from_value_impl!(bool, as_bool);
from_value_impl!(i16, as_i16);
from_value_impl!(u16, as_u16);
from_value_impl!(i32, as_i32);
from_value_impl!(u32, as_u32);
from_value_impl!(i64, as_i64);
from_value_impl!(u64, as_u64);
from_value_impl!(f64, as_f64);

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for ObjectPath {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        value.as_object_path().cloned()
    }
}

// Scalar conversions for ergonomic tree construction

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjectPath> for Value {
    fn from(v: ObjectPath) -> Self {
        Value::ObjectPath(v)
    }
}

impl From<Signature> for Value {
    fn from(v: Signature) -> Self {
        Value::Signature(v)
    }
}

/// Signature for a basic key kind.
fn key_code_signature(kind: Kind) -> Signature {
    let code = kind.code().expect("basic kinds always have a code");
    Signature::from_derived((code as char).to_string())
}
