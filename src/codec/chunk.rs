//! MTU-aware chunking of outbound frames.
//!
//! The transport delivers writes in order within a connection, so chunks
//! carry no header of their own and the peer simply concatenates them.

use crate::core::constants::{ATT_HEADER_OVERHEAD, MIN_CHUNK_SIZE};

/// Largest chunk allowed for a negotiated max payload.
///
/// `max(min_chunk, max_payload - overhead)`.
pub fn chunk_size_for(max_payload: usize, overhead: usize, min_chunk: usize) -> usize {
    max_payload.saturating_sub(overhead).max(min_chunk)
}

/// Splits frames into transport-sized chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Chunker for the given max payload, using the default overhead and floor.
    pub fn new(max_payload: usize) -> Self {
        Self::with_overhead(max_payload, ATT_HEADER_OVERHEAD, MIN_CHUNK_SIZE)
    }

    /// Chunker with an explicit overhead and floor.
    pub fn with_overhead(max_payload: usize, overhead: usize, min_chunk: usize) -> Self {
        Self {
            chunk_size: chunk_size_for(max_payload, overhead, min_chunk).max(1),
        }
    }

    /// Size of every chunk except possibly the last.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `frame` into chunks, preserving byte order.
    pub fn split<'a>(&self, frame: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        frame.chunks(self.chunk_size)
    }

    /// Number of chunks `frame_len` bytes will produce.
    pub fn chunk_count(&self, frame_len: usize) -> usize {
        frame_len.div_ceil(self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    #[test]
    fn test_chunk_size_floor() {
        assert_eq!(chunk_size_for(23, 3, 20), 20);
        assert_eq!(chunk_size_for(10, 3, 20), 20);
        assert_eq!(chunk_size_for(128, 3, 20), 125);
        assert_eq!(chunk_size_for(503, 3, 20), 500);
    }

    #[test]
    fn test_split_reproduces_frame() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let frame = encode_frame(&payload);

        for max_payload in [21, 23, 24, 64, 128, 185, 247, 503, 2000] {
            let chunker = Chunker::new(max_payload);
            let limit = chunk_size_for(max_payload, ATT_HEADER_OVERHEAD, MIN_CHUNK_SIZE);

            let chunks: Vec<&[u8]> = chunker.split(&frame).collect();
            assert_eq!(chunks.len(), chunker.chunk_count(frame.len()));
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= limit));
            assert_eq!(chunks.concat(), frame, "max_payload {max_payload}");
        }
    }

    #[test]
    fn test_small_frame_single_chunk() {
        let frame = encode_frame(br#"{"ack":"datetime"}"#);
        let chunker = Chunker::new(128);
        assert_eq!(chunker.split(&frame).count(), 1);
    }

    #[test]
    fn test_zero_sized_config_still_progresses() {
        let chunker = Chunker::with_overhead(0, 3, 0);
        assert_eq!(chunker.chunk_size(), 1);
        assert_eq!(chunker.split(b"abc").count(), 3);
    }
}
