// Output buffer abstraction - reserve/commit spans over growable storage

use crate::error::WriteError;

/// Default capacity of a segment in [`SegmentedBuffer`].
pub const DEFAULT_SEGMENT_SIZE: usize = 8 * 1024;

/// Growable output storage written through reserve/commit spans.
///
/// The writer requests a span of at least `min_len` writable bytes, writes
/// into a prefix of it, then commits exactly the bytes written. Offsets are
/// counted over committed bytes only, so they are stable regardless of how
/// the implementation arranges its storage.
///
/// `backpatch` overwrites an already committed range in place. It exists for
/// exactly one pattern: writing a length field after the payload it
/// describes. It is not a general random-access API.
pub trait OutputBuffer {
    /// A writable span of at least `min_len` bytes. The span's contents are
    /// unspecified until written.
    fn reserve(&mut self, min_len: usize) -> &mut [u8];

    /// Commit the first `len` bytes of the most recent reservation.
    fn commit(&mut self, len: usize);

    /// Total committed bytes; the current write offset.
    fn committed(&self) -> usize;

    /// Overwrite `bytes` at `offset` within the committed region.
    fn backpatch(&mut self, offset: usize, bytes: &[u8]) -> Result<(), WriteError>;
}

/// Single contiguous growable array.
#[derive(Debug, Default)]
pub struct VecBuffer {
    data: Vec<u8>,
    committed: usize,
}

impl VecBuffer {
    pub fn new() -> Self {
        VecBuffer {
            data: Vec::new(),
            committed: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        VecBuffer {
            data: Vec::with_capacity(capacity),
            committed: 0,
        }
    }

    /// The committed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.committed]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.committed);
        self.data
    }
}

impl OutputBuffer for VecBuffer {
    fn reserve(&mut self, min_len: usize) -> &mut [u8] {
        let needed = self.committed + min_len;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
        &mut self.data[self.committed..]
    }

    fn commit(&mut self, len: usize) {
        debug_assert!(self.committed + len <= self.data.len());
        self.committed += len;
    }

    fn committed(&self) -> usize {
        self.committed
    }

    fn backpatch(&mut self, offset: usize, bytes: &[u8]) -> Result<(), WriteError> {
        let end = offset + bytes.len();
        if end > self.committed {
            return Err(WriteError::BackpatchOutOfRange {
                offset,
                len: bytes.len(),
                committed: self.committed,
            });
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// Storage backed by a list of fixed-capacity segments.
///
/// A reservation that does not fit in the tail segment seals it (its unused
/// capacity is abandoned) and opens a new segment sized to hold the request.
/// Committed offsets skip sealed slack, so they stay logically contiguous.
#[derive(Debug)]
pub struct SegmentedBuffer {
    segments: Vec<Segment>,
    segment_size: usize,
}

#[derive(Debug)]
struct Segment {
    data: Vec<u8>,
    used: usize,
}

impl SegmentedBuffer {
    pub fn new() -> Self {
        Self::with_segment_size(DEFAULT_SEGMENT_SIZE)
    }

    pub fn with_segment_size(segment_size: usize) -> Self {
        SegmentedBuffer {
            segments: Vec::new(),
            segment_size: segment_size.max(1),
        }
    }

    /// Concatenate the committed bytes of all segments.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.committed());
        for segment in &self.segments {
            out.extend_from_slice(&segment.data[..segment.used]);
        }
        out
    }

    fn tail_has_room(&self, min_len: usize) -> bool {
        match self.segments.last() {
            Some(segment) => segment.data.len() - segment.used >= min_len,
            None => false,
        }
    }
}

impl Default for SegmentedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer for SegmentedBuffer {
    fn reserve(&mut self, min_len: usize) -> &mut [u8] {
        if !self.tail_has_room(min_len) {
            let size = self.segment_size.max(min_len);
            self.segments.push(Segment {
                data: vec![0; size],
                used: 0,
            });
        }
        let segment = self
            .segments
            .last_mut()
            .expect("a segment was just ensured");
        &mut segment.data[segment.used..]
    }

    fn commit(&mut self, len: usize) {
        if let Some(segment) = self.segments.last_mut() {
            debug_assert!(segment.used + len <= segment.data.len());
            segment.used += len;
        } else {
            debug_assert!(len == 0, "commit without a reservation");
        }
    }

    fn committed(&self) -> usize {
        self.segments.iter().map(|s| s.used).sum()
    }

    fn backpatch(&mut self, offset: usize, bytes: &[u8]) -> Result<(), WriteError> {
        let committed = self.committed();
        if offset + bytes.len() > committed {
            return Err(WriteError::BackpatchOutOfRange {
                offset,
                len: bytes.len(),
                committed,
            });
        }
        let mut segment_start = 0;
        for segment in &mut self.segments {
            let segment_end = segment_start + segment.used;
            if offset < segment_end {
                let local = offset - segment_start;
                if local + bytes.len() > segment.used {
                    return Err(WriteError::BackpatchAcrossSegments {
                        offset,
                        len: bytes.len(),
                    });
                }
                segment.data[local..local + bytes.len()].copy_from_slice(bytes);
                return Ok(());
            }
            segment_start = segment_end;
        }
        // Unreachable given the committed-range check above.
        Err(WriteError::BackpatchOutOfRange {
            offset,
            len: bytes.len(),
            committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all<B: OutputBuffer>(buf: &mut B, bytes: &[u8]) {
        let span = buf.reserve(bytes.len());
        span[..bytes.len()].copy_from_slice(bytes);
        buf.commit(bytes.len());
    }

    #[test]
    fn test_vec_buffer_reserve_commit() {
        let mut buf = VecBuffer::new();
        write_all(&mut buf, b"abc");
        write_all(&mut buf, b"de");
        assert_eq!(buf.committed(), 5);
        assert_eq!(buf.bytes(), b"abcde");
    }

    #[test]
    fn test_vec_buffer_partial_commit() {
        let mut buf = VecBuffer::new();
        let span = buf.reserve(8);
        span[0] = b'x';
        buf.commit(1);
        assert_eq!(buf.bytes(), b"x");
    }

    #[test]
    fn test_vec_buffer_backpatch() {
        let mut buf = VecBuffer::new();
        write_all(&mut buf, &[0, 0, 0, 0]);
        write_all(&mut buf, b"body");
        buf.backpatch(0, &4u32.to_le_bytes()).unwrap();
        assert_eq!(&buf.bytes()[..4], &4u32.to_le_bytes());

        assert!(matches!(
            buf.backpatch(6, &[0; 4]),
            Err(WriteError::BackpatchOutOfRange { .. })
        ));
    }

    #[test]
    fn test_segmented_buffer_spills_to_new_segment() {
        let mut buf = SegmentedBuffer::with_segment_size(4);
        write_all(&mut buf, b"abc");
        // Does not fit in the 1 remaining byte; seals the tail segment.
        write_all(&mut buf, b"defg");
        assert_eq!(buf.committed(), 7);
        assert_eq!(buf.to_bytes(), b"abcdefg");
    }

    #[test]
    fn test_segmented_buffer_oversized_reservation() {
        let mut buf = SegmentedBuffer::with_segment_size(4);
        let span = buf.reserve(100);
        assert!(span.len() >= 100);
        buf.commit(100);
        assert_eq!(buf.committed(), 100);
    }

    #[test]
    fn test_segmented_buffer_backpatch_within_segment() {
        let mut buf = SegmentedBuffer::with_segment_size(16);
        write_all(&mut buf, &[0; 4]);
        write_all(&mut buf, b"payload");
        buf.backpatch(0, &7u32.to_le_bytes()).unwrap();
        let bytes = buf.to_bytes();
        assert_eq!(&bytes[..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[4..], b"payload");
    }

    #[test]
    fn test_segmented_buffer_backpatch_across_seam_fails() {
        let mut buf = SegmentedBuffer::with_segment_size(4);
        write_all(&mut buf, b"abc");
        write_all(&mut buf, b"defg");
        // Offset 2 length 4 would span the seam between segments.
        assert!(matches!(
            buf.backpatch(2, &[0; 4]),
            Err(WriteError::BackpatchAcrossSegments { .. })
        ));
    }
}
