//! Fixed-width byte encoding for embedding vectors.
//!
//! Each element is stored as its 4-byte little-endian IEEE-754 bit pattern,
//! with no length prefix. Values pass through `to_bits`/`from_bits`, so NaN
//! payloads survive unchanged.

const ELEMENT_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode a vector into its storage bytes.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * ELEMENT_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_bits().to_le_bytes());
    }
    bytes
}

/// Decode storage bytes back into a vector.
///
/// A trailing partial element is dropped; callers only decode bytes produced
/// by [`encode`].
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(ELEMENT_WIDTH)
        .map(|chunk| f32::from_bits(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use pretty_assertions::assert_eq;

    fn bits(vector: &[f32]) -> Vec<u32> {
        vector.iter().map(|value| value.to_bits()).collect()
    }

    #[test]
    fn empty_vector_encodes_to_no_bytes() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn layout_is_little_endian_four_bytes_per_element() {
        assert_eq!(encode(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(encode(&[1.0, -2.0]).len(), 8);
    }

    #[test]
    fn special_values_round_trip_bit_for_bit() {
        let quiet_nan = f32::from_bits(0x7fc0_0001);
        let signalling_nan = f32::from_bits(0x7f80_0001);
        let negative_nan = f32::from_bits(0xffc0_1234);
        let vector = vec![
            0.0,
            -0.0,
            -1.5,
            f32::MIN_POSITIVE / 4.0,
            f32::INFINITY,
            f32::NEG_INFINITY,
            quiet_nan,
            signalling_nan,
            negative_nan,
            f32::MAX,
        ];
        let decoded = decode(&encode(&vector));
        assert_eq!(bits(&decoded), bits(&vector));
    }

    #[test]
    fn trailing_partial_element_is_dropped() {
        let mut bytes = encode(&[0.25, 4.0]);
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        assert_eq!(decode(&bytes), vec![0.25, 4.0]);
    }
}
