//! FlateDecode (zlib/deflate) implementation.
//!
//! The most common PDF compression filter. Uses the flate2 crate; a
//! stream that fails as zlib is retried as raw deflate, since some
//! generators emit valid deflate data with a corrupt zlib wrapper.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut output = Vec::new();

        match decoder.read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(e) => {
                // Partial recovery: keep whatever decoded before the error
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode partial recovery: {} bytes before corruption: {}",
                        output.len(),
                        e
                    );
                    return Ok(output);
                }

                log::debug!("zlib decode failed ({}), retrying as raw deflate", e);
                output.clear();
                let mut deflate_decoder = DeflateDecoder::new(input);

                match deflate_decoder.read_to_end(&mut output) {
                    Ok(_) => Ok(output),
                    Err(deflate_err) => {
                        if !output.is_empty() {
                            log::warn!(
                                "raw deflate partial recovery: {} bytes before error",
                                output.len()
                            );
                            return Ok(output);
                        }

                        // A stream labeled /FlateDecode that decompresses with
                        // nothing is corrupt; returning the raw bytes would be
                        // a type confusion, so fail the stream.
                        Err(Error::Decode(format!(
                            "FlateDecode decompression failed (zlib: {}, deflate: {}, {} compressed bytes)",
                            e,
                            deflate_err,
                            input.len()
                        )))
                    },
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let decoded = FlateDecoder.decode(&zlib(original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_decode_empty() {
        let decoded = FlateDecoder.decode(&zlib(b"")).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_flate_decode_large_data() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let decoded = FlateDecoder.decode(&zlib(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let result = FlateDecoder.decode(b"This is not zlib compressed data");
        assert!(result.is_err());
    }

    #[test]
    fn test_flate_decoder_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
