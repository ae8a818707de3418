//! On-disk encoding of an embedding vector: little-endian `f32`s packed
//! into a `BLOB`, mirroring `kiln-repo`'s `Document::vector` encoding so
//! the two stores agree on format if they ever share a byte.

use crate::error::RagError;

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
	vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, RagError> {
	if bytes.len() % 4 != 0 {
		return Err(RagError::Corrupt(format!("vector blob length {} is not a multiple of 4", bytes.len())));
	}
	Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_bytes() {
		let v = vec![0.5_f32, -1.25, 3.0];
		assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
	}

	#[test]
	fn rejects_truncated_blob() {
		assert!(decode_vector(&[0u8, 1, 2]).is_err());
	}
}
