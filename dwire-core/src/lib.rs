// dwire-core - binary marshaling core for a message-bus wire format
//
// Layers:
// - signature: the type grammar and its validation
// - value: the runtime value model (immutable tagged trees)
// - fd: the external handle registry referenced by index
// - buffer: reserve/commit output storage
// - writer: aligned little-endian serialization

pub mod buffer;
pub mod error;
pub mod fd;
pub mod signature;
pub mod value;
pub mod writer;

pub use buffer::{OutputBuffer, SegmentedBuffer, VecBuffer};
pub use error::{HandleError, ProtocolError, Result, SignatureError, ValueError, WriteError};
pub use fd::{DuplicateHandle, HandleRegistry, RawHandle};
pub use signature::{Kind, Signature};
pub use value::{FromValue, ObjectPath, Value};
pub use writer::MessageWriter;
