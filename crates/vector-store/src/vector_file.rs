//! Binary vector artifact: `b"DCV1"`, `u32` dimension, `u64` count, then `count * dimension`
//! little-endian `f32` values in position order.

use crate::vector_index::VectorIndex;
use sha2::{Digest, Sha256};

const VECTOR_MAGIC: &[u8; 4] = b"DCV1";
const HEADER_LEN: usize = 16;

pub(crate) fn encode(index: &VectorIndex) -> Vec<u8> {
    let data = index.as_flat();
    let mut out = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    out.extend_from_slice(VECTOR_MAGIC);
    #[allow(clippy::cast_possible_truncation)]
    let dim = index.dimension().unwrap_or(0) as u32;
    out.extend_from_slice(&dim.to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub(crate) fn decode(bytes: &[u8]) -> Result<VectorIndex, String> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != VECTOR_MAGIC {
        return Err("missing vector file header".to_string());
    }
    let dim = u32::from_le_bytes(read_array(&bytes[4..8])?) as usize;
    let count = usize::try_from(u64::from_le_bytes(read_array(&bytes[8..16])?))
        .map_err(|_| "vector count overflows usize".to_string())?;

    let floats = dim
        .checked_mul(count)
        .ok_or_else(|| "vector payload size overflows".to_string())?;
    let expected_len = floats
        .checked_mul(4)
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| "vector payload size overflows".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "vector file holds {} bytes, header promises {expected_len} ({count} x {dim})",
            bytes.len()
        ));
    }

    let data = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|raw| read_array(raw).map(f32::from_le_bytes))
        .collect::<Result<Vec<f32>, String>>()?;
    VectorIndex::from_raw(dim, data)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_array<const N: usize>(raw: &[u8]) -> Result<[u8; N], String> {
    raw.try_into()
        .map_err(|_| format!("expected {N} bytes, found {}", raw.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new();
        index
            .append(&[vec![0.25, -1.5, 3.0], vec![7.0, 0.0, -0.125]])
            .unwrap();
        index
    }

    #[test]
    fn encode_decode_preserves_vectors() {
        let index = sample();
        let decoded = decode(&encode(&index)).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn empty_index_encodes() {
        let decoded = decode(&encode(&VectorIndex::new())).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.dimension(), None);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut bytes = encode(&sample());
        bytes.truncate(bytes.len() - 4);
        assert!(decode(&bytes).is_err());
        assert!(decode(b"DCV1").is_err());
        assert!(decode(b"XXXX\0\0\0\0\0\0\0\0\0\0\0\0").is_err());
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = sha256_hex(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
