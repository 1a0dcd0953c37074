//! Waveform Normalizer (C3) and Chunk Ladder Builder (C4).

mod chunker;
mod codec;
mod normalizer;

pub use chunker::{build_ladder, BuiltChunk};
pub use codec::{compress, decompress, le_bytes_to_samples, samples_to_le_bytes};
pub use normalizer::{apply_highpass, normalize, NormalizeError, NormalizedWindow};
