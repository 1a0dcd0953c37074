//! Chunk blob compression (§3 "Chunk blob name", §4.4): raw LZ4 block
//! format with the uncompressed length prepended, via `lz4_flex`.

/// Compress a little-endian int32 sample buffer for storage as a chunk blob.
pub fn compress(raw_le_bytes: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(raw_le_bytes)
}

/// Decompress a chunk blob back to its raw little-endian int32 bytes.
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>, lz4_flex::block::DecompressError> {
    lz4_flex::decompress_size_prepended(blob)
}

/// Encode samples as little-endian int32 bytes, the format chunk blobs
/// carry before compression.
pub fn samples_to_le_bytes(samples: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

pub fn le_bytes_to_samples(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_decompress_round_trips() {
        let samples: Vec<i32> = (0..1000).map(|i| (i % 37) - 18).collect();
        let raw = samples_to_le_bytes(&samples);
        let compressed = compress(&raw);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, raw);
        assert_eq!(le_bytes_to_samples(&decompressed), samples);
    }
}
