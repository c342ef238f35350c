//! Stream decoder implementations for PDF filters.
//!
//! The stamping pipeline decodes the filters it actually meets when
//! importing or reconstructing pages:
//! - FlateDecode (zlib/deflate) - the common case
//! - ASCIIHexDecode - hexadecimal encoding
//! - DCTDecode - JPEG (pass-through; the payload stays compressed)
//!
//! Decoders can be chained in a filter pipeline, with PNG/TIFF predictor
//! reversal applied last.

use crate::error::{Error, Result};

mod ascii_hex;
mod dct;
mod flate;
mod predictor;

pub use ascii_hex::AsciiHexDecoder;
pub use dct::DctDecoder;
pub use flate::FlateDecoder;
pub use predictor::{DecodeParams, decode_predictor};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data using a filter pipeline.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_params(data, filters, None)
}

/// Decode stream data, applying each filter in order and then reversing
/// any predictor named in the decode parameters.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" => Box::new(FlateDecoder),
            "ASCIIHexDecode" => Box::new(AsciiHexDecoder),
            "DCTDecode" => Box::new(DctDecoder),
            _ => return Err(Error::UnsupportedFilter(filter_name.clone())),
        };

        current = decoder.decode(&current)?;
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
