// Error types for dwire

use crate::signature::Kind;
use std::error::Error;
use std::fmt;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Top-level error across the marshaling core
#[derive(Debug)]
pub enum ProtocolError {
    Signature(SignatureError),
    Value(ValueError),
    Write(WriteError),
    Handle(HandleError),
}

/// Signature grammar parse and validation errors
#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    TooLong(usize),
    UnexpectedByte { byte: u8, pos: usize },
    UnexpectedEnd(usize),
    UnterminatedStruct { pos: usize },
    UnterminatedDictEntry { pos: usize },
    EmptyStruct { pos: usize },
    NonBasicDictKey { byte: u8, pos: usize },
    DepthExceeded { pos: usize },
    NotSingleCompleteType(String),
}

/// Value model construction and access errors
#[derive(Debug, PartialEq)]
pub enum ValueError {
    KindMismatch { expected: Kind, actual: Kind },
    IndexOutOfRange { index: usize, len: usize },
    ItemSignatureMismatch { expected: String, actual: String },
    EmptyArrayWithoutSignature,
    EmptyStruct,
    NonBasicDictKey(Kind),
    InvalidObjectPath(String),
    Signature(SignatureError),
}

/// Writer buffer invariant violations
///
/// These indicate a programming error inside the writer or buffer, not a
/// recoverable condition.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteError {
    BackpatchOutOfRange {
        offset: usize,
        len: usize,
        committed: usize,
    },
    BackpatchAcrossSegments {
        offset: usize,
        len: usize,
    },
}

/// Handle registry lookup and duplication errors
#[derive(Debug)]
pub enum HandleError {
    UnknownIndex { index: u32, len: usize },
    Duplicate(std::io::Error),
}

// Error trait implementations

impl Error for ProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProtocolError::Signature(e) => Some(e),
            ProtocolError::Value(e) => Some(e),
            ProtocolError::Write(e) => Some(e),
            ProtocolError::Handle(e) => Some(e),
        }
    }
}

impl Error for SignatureError {}
impl Error for ValueError {}
impl Error for WriteError {}

impl Error for HandleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandleError::Duplicate(e) => Some(e),
            _ => None,
        }
    }
}

// Display implementations

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Signature(e) => write!(f, "Signature error: {}", e),
            ProtocolError::Value(e) => write!(f, "Value error: {}", e),
            ProtocolError::Write(e) => write!(f, "Write error: {}", e),
            ProtocolError::Handle(e) => write!(f, "Handle error: {}", e),
        }
    }
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::TooLong(len) => {
                write!(f, "Signature exceeds 255 bytes: {} bytes", len)
            }
            SignatureError::UnexpectedByte { byte, pos } => {
                write!(f, "Unexpected byte {:?} at position {}", *byte as char, pos)
            }
            SignatureError::UnexpectedEnd(len) => {
                write!(f, "Signature ends mid-type at position {}", len)
            }
            SignatureError::UnterminatedStruct { pos } => {
                write!(f, "Unterminated struct opened at position {}", pos)
            }
            SignatureError::UnterminatedDictEntry { pos } => {
                write!(f, "Unterminated dict entry opened at position {}", pos)
            }
            SignatureError::EmptyStruct { pos } => {
                write!(f, "Empty struct at position {}", pos)
            }
            SignatureError::NonBasicDictKey { byte, pos } => {
                write!(
                    f,
                    "Dict key must be a basic type, got {:?} at position {}",
                    *byte as char, pos
                )
            }
            SignatureError::DepthExceeded { pos } => {
                write!(f, "Container nesting too deep at position {}", pos)
            }
            SignatureError::NotSingleCompleteType(s) => {
                write!(f, "Expected exactly one complete type, got {:?}", s)
            }
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::KindMismatch { expected, actual } => {
                write!(f, "Kind mismatch: expected {:?}, got {:?}", expected, actual)
            }
            ValueError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for {} elements", index, len)
            }
            ValueError::ItemSignatureMismatch { expected, actual } => {
                write!(
                    f,
                    "Element signature mismatch: expected {}, got {}",
                    expected, actual
                )
            }
            ValueError::EmptyArrayWithoutSignature => {
                write!(f, "Empty array requires an explicit item signature")
            }
            ValueError::EmptyStruct => {
                write!(f, "Structs require at least one field")
            }
            ValueError::NonBasicDictKey(kind) => {
                write!(f, "Dictionary key kind must be basic, got {:?}", kind)
            }
            ValueError::InvalidObjectPath(path) => {
                write!(f, "Invalid object path: {:?}", path)
            }
            ValueError::Signature(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BackpatchOutOfRange {
                offset,
                len,
                committed,
            } => {
                write!(
                    f,
                    "Backpatch of {} bytes at offset {} exceeds {} committed bytes",
                    len, offset, committed
                )
            }
            WriteError::BackpatchAcrossSegments { offset, len } => {
                write!(
                    f,
                    "Backpatch of {} bytes at offset {} crosses a segment boundary",
                    len, offset
                )
            }
        }
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleError::UnknownIndex { index, len } => {
                write!(
                    f,
                    "No handle registered at index {} ({} registered)",
                    index, len
                )
            }
            HandleError::Duplicate(e) => {
                write!(f, "Failed to duplicate handle: {}", e)
            }
        }
    }
}

// Convenience From implementations for error composition

impl From<SignatureError> for ProtocolError {
    fn from(error: SignatureError) -> Self {
        ProtocolError::Signature(error)
    }
}

impl From<ValueError> for ProtocolError {
    fn from(error: ValueError) -> Self {
        ProtocolError::Value(error)
    }
}

impl From<WriteError> for ProtocolError {
    fn from(error: WriteError) -> Self {
        ProtocolError::Write(error)
    }
}

impl From<HandleError> for ProtocolError {
    fn from(error: HandleError) -> Self {
        ProtocolError::Handle(error)
    }
}

impl From<SignatureError> for ValueError {
    fn from(error: SignatureError) -> Self {
        ValueError::Signature(error)
    }
}
