// Binary writer - aligned little-endian encoding into an output buffer

use crate::buffer::OutputBuffer;
use crate::error::WriteError;
use crate::signature::{Kind, Signature};
use crate::value::{ObjectPath, Value};

/// Above this many bytes the writer stops asking for one right-sized span
/// and switches to chunked writes against minimal spans.
pub const MAX_SIZE_HINT: usize = 4096;

/// Worst-case UTF-8 bytes per `char`, for sizing streaming spans.
const MAX_UTF8_BYTES_PER_CHAR: usize = 4;

/// Streaming encoder over a caller-supplied [`OutputBuffer`].
///
/// Every value of natural size `s` is padded to a multiple of `s` relative
/// to the start of the buffer. All multi-byte values are little-endian.
/// The writer is synchronous and never suspends; the only fallible
/// operations are the ones that backpatch a length field.
pub struct MessageWriter<'a, B: OutputBuffer> {
    buf: &'a mut B,
}

impl<'a, B: OutputBuffer> MessageWriter<'a, B> {
    pub fn new(buf: &'a mut B) -> Self {
        MessageWriter { buf }
    }

    /// Current offset relative to the start of the serialized body.
    pub fn offset(&self) -> usize {
        self.buf.committed()
    }

    /// Emit the zero bytes needed to reach the next multiple of `alignment`.
    pub fn write_padding(&mut self, alignment: usize) {
        let offset = self.buf.committed();
        let pad = (alignment - offset % alignment) % alignment;
        if pad > 0 {
            let span = self.buf.reserve(pad);
            span[..pad].fill(0);
            self.buf.commit(pad);
        }
    }

    fn write_aligned(&mut self, bytes: &[u8]) {
        self.write_padding(bytes.len());
        let span = self.buf.reserve(bytes.len());
        span[..bytes.len()].copy_from_slice(bytes);
        self.buf.commit(bytes.len());
    }

    // Primitives

    pub fn write_byte(&mut self, value: u8) {
        self.write_aligned(&[value]);
    }

    /// Booleans encode as a 4-byte unsigned integer restricted to 0/1.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u32(value as u32);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_aligned(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_aligned(&value.to_le_bytes());
    }

    /// Index into the out-of-band descriptor list.
    pub fn write_unix_fd_index(&mut self, index: u32) {
        self.write_u32(index);
    }

    // String-like encodings

    /// `u32 length | UTF-8 bytes | NUL`, length excluding the terminator.
    pub fn write_string(&mut self, value: &str) -> Result<(), WriteError> {
        if value.len() <= MAX_SIZE_HINT {
            self.write_u32(value.len() as u32);
            self.write_raw(value.as_bytes());
        } else {
            // The final byte count is not known to the buffer up front on
            // this path: reserve the length field, stream the bytes, then
            // patch the count in.
            self.write_padding(4);
            let slot = self.reserve_length_slot();
            let written = self.stream_str(value);
            self.buf
                .backpatch(slot, &(written as u32).to_le_bytes())?;
        }
        self.write_byte(0);
        Ok(())
    }

    /// Object paths share the string encoding.
    pub fn write_object_path(&mut self, value: &ObjectPath) -> Result<(), WriteError> {
        self.write_string(value.as_str())
    }

    /// `u8 length | signature bytes | NUL`; 1-byte natural size, no padding.
    pub fn write_signature(&mut self, value: &Signature) {
        // Validated signatures never exceed 255 bytes.
        self.write_byte(value.len() as u8);
        self.write_raw(value.as_bytes());
        self.write_byte(0);
    }

    /// Copy raw bytes, unaligned.
    ///
    /// Below [`MAX_SIZE_HINT`] this requests one right-sized span. Above it,
    /// it loops over minimal spans so segmented buffers never need one giant
    /// contiguous allocation.
    pub fn write_raw(&mut self, mut data: &[u8]) {
        if data.len() <= MAX_SIZE_HINT {
            let span = self.buf.reserve(data.len());
            span[..data.len()].copy_from_slice(data);
            self.buf.commit(data.len());
        } else {
            while !data.is_empty() {
                let span = self.buf.reserve(1);
                let take = data.len().min(span.len());
                span[..take].copy_from_slice(&data[..take]);
                self.buf.commit(take);
                data = &data[take..];
            }
        }
    }

    /// Commit a zeroed 4-byte length field and remember where it lives.
    fn reserve_length_slot(&mut self) -> usize {
        let slot = self.buf.committed();
        let span = self.buf.reserve(4);
        span[..4].fill(0);
        self.buf.commit(4);
        slot
    }

    /// Feed a string through the resumable encoder, one span per iteration.
    fn stream_str(&mut self, value: &str) -> usize {
        let mut encoder = Utf8Encoder::new(value);
        let mut total = 0;
        loop {
            let span = self.buf.reserve(MAX_UTF8_BYTES_PER_CHAR);
            let (produced, completed) = encoder.encode_into(span);
            self.buf.commit(produced);
            total += produced;
            if completed {
                return total;
            }
        }
    }

    // Variant shorthands: the canonical encoding of a variant holding a
    // statically known basic type, without building a value tree.

    pub fn write_variant_byte(&mut self, value: u8) {
        self.write_kind_signature(Kind::Byte);
        self.write_byte(value);
    }

    pub fn write_variant_bool(&mut self, value: bool) {
        self.write_kind_signature(Kind::Bool);
        self.write_bool(value);
    }

    pub fn write_variant_i16(&mut self, value: i16) {
        self.write_kind_signature(Kind::Int16);
        self.write_i16(value);
    }

    pub fn write_variant_u16(&mut self, value: u16) {
        self.write_kind_signature(Kind::UInt16);
        self.write_u16(value);
    }

    pub fn write_variant_i32(&mut self, value: i32) {
        self.write_kind_signature(Kind::Int32);
        self.write_i32(value);
    }

    pub fn write_variant_u32(&mut self, value: u32) {
        self.write_kind_signature(Kind::UInt32);
        self.write_u32(value);
    }

    pub fn write_variant_i64(&mut self, value: i64) {
        self.write_kind_signature(Kind::Int64);
        self.write_i64(value);
    }

    pub fn write_variant_u64(&mut self, value: u64) {
        self.write_kind_signature(Kind::UInt64);
        self.write_u64(value);
    }

    pub fn write_variant_f64(&mut self, value: f64) {
        self.write_kind_signature(Kind::Double);
        self.write_f64(value);
    }

    pub fn write_variant_string(&mut self, value: &str) -> Result<(), WriteError> {
        self.write_kind_signature(Kind::String);
        self.write_string(value)
    }

    pub fn write_variant_object_path(&mut self, value: &ObjectPath) -> Result<(), WriteError> {
        self.write_kind_signature(Kind::ObjectPath);
        self.write_object_path(value)
    }

    pub fn write_variant_signature(&mut self, value: &Signature) {
        self.write_kind_signature(Kind::Signature);
        self.write_signature(value);
    }

    pub fn write_variant_unix_fd_index(&mut self, index: u32) {
        self.write_kind_signature(Kind::UnixFd);
        self.write_unix_fd_index(index);
    }

    /// Single-code signature: `1 | code | NUL`.
    fn write_kind_signature(&mut self, kind: Kind) {
        let code = kind.code().expect("shorthands exist only for coded kinds");
        self.write_byte(1);
        self.write_byte(code);
        self.write_byte(0);
    }

    // Generic value serialization

    /// Serialize a value tree, honoring per-type alignment throughout.
    pub fn write_value(&mut self, value: &Value) -> Result<(), WriteError> {
        match value {
            Value::Byte(v) => self.write_byte(*v),
            Value::Bool(v) => self.write_bool(*v),
            Value::Int16(v) => self.write_i16(*v),
            Value::UInt16(v) => self.write_u16(*v),
            Value::Int32(v) => self.write_i32(*v),
            Value::UInt32(v) => self.write_u32(*v),
            Value::Int64(v) => self.write_i64(*v),
            Value::UInt64(v) => self.write_u64(*v),
            Value::Double(v) => self.write_f64(*v),
            Value::String(s) => self.write_string(s)?,
            Value::ObjectPath(p) => self.write_object_path(p)?,
            Value::Signature(s) => self.write_signature(s),
            Value::Array {
                item_signature,
                items,
            } => {
                self.write_array_header(item_signature.first_type_alignment(), |w| {
                    for item in items {
                        w.write_value(item)?;
                    }
                    Ok(())
                })?;
            }
            Value::Struct { fields } => {
                self.write_padding(8);
                for field in fields {
                    self.write_value(field)?;
                }
            }
            Value::Dictionary { entries, .. } => {
                // An array of 8-aligned key/value entry pairs.
                self.write_array_header(8, |w| {
                    for (key, entry_value) in entries {
                        w.write_padding(8);
                        w.write_value(key)?;
                        w.write_value(entry_value)?;
                    }
                    Ok(())
                })?;
            }
            Value::Variant(inner) => {
                self.write_signature(&inner.signature());
                self.write_value(inner)?;
            }
            Value::UnixFd { index } => self.write_unix_fd_index(*index),
        }
        Ok(())
    }

    /// Array layout: 4-aligned u32 byte length, padding to the element
    /// alignment (excluded from the length), then the body. The length is
    /// backpatched once the body size is known.
    fn write_array_header<F>(&mut self, element_alignment: usize, body: F) -> Result<(), WriteError>
    where
        F: FnOnce(&mut Self) -> Result<(), WriteError>,
    {
        self.write_padding(4);
        let slot = self.reserve_length_slot();
        self.write_padding(element_alignment);
        let body_start = self.buf.committed();
        body(self)?;
        let body_len = self.buf.committed() - body_start;
        self.buf
            .backpatch(slot, &(body_len as u32).to_le_bytes())
    }
}

/// Resumable UTF-8 encoder fed one destination span at a time.
///
/// Each call copies as much of the remaining string as fits on a char
/// boundary and reports the bytes produced and whether the source is
/// exhausted.
struct Utf8Encoder<'s> {
    rest: &'s str,
}

impl<'s> Utf8Encoder<'s> {
    fn new(source: &'s str) -> Self {
        Utf8Encoder { rest: source }
    }

    fn encode_into(&mut self, dst: &mut [u8]) -> (usize, bool) {
        let bytes = self.rest.as_bytes();
        let mut take = bytes.len().min(dst.len());
        while !self.rest.is_char_boundary(take) {
            take -= 1;
        }
        dst[..take].copy_from_slice(&bytes[..take]);
        self.rest = &self.rest[take..];
        (take, self.rest.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::VecBuffer;

    #[test]
    fn test_utf8_encoder_respects_char_boundaries() {
        // Multi-byte chars must never be split across spans.
        let source = "héllo wörld";
        let mut encoder = Utf8Encoder::new(source);
        let mut out = Vec::new();
        loop {
            let mut span = [0u8; 3];
            let (produced, done) = encoder.encode_into(&mut span);
            out.extend_from_slice(&span[..produced]);
            if done {
                break;
            }
            assert!(produced > 0, "encoder must make progress");
        }
        assert_eq!(out, source.as_bytes());
    }

    #[test]
    fn test_padding_is_zero_filled() {
        let mut buf = VecBuffer::new();
        let mut writer = MessageWriter::new(&mut buf);
        writer.write_byte(0xff);
        writer.write_u32(0x0403_0201);
        assert_eq!(
            buf.bytes(),
            &[0xff, 0, 0, 0, 0x01, 0x02, 0x03, 0x04]
        );
    }
}
