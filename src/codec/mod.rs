//! Framing codec and chunker.
//!
//! ```text
//! payload ──encode_frame──▶ payload\n ──Chunker──▶ [chunk][chunk]…  (out)
//! packets ──LineDecoder──▶ line, line, …                            (in)
//! ```

mod chunk;
mod frame;

pub use chunk::{Chunker, chunk_size_for};
pub use frame::{LineDecoder, encode_frame};
