//! DCTDecode (JPEG) implementation.
//!
//! Pass-through decoder: JPEG payloads stay in their compressed form and
//! are re-embedded as-is when pages are copied.

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// DCTDecode filter implementation (pass-through).
pub struct DctDecoder;

impl StreamDecoder for DctDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn name(&self) -> &str {
        "DCTDecode"
    }
}
