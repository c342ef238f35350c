//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! [ContentStreamBuilder] (operators → content stream bytes)
//!     ↓
//! [PdfAssembler] (object graph → header, body, xref, trailer)
//!     ↓
//! [ObjectSerializer] (objects → bytes, optionally encrypting)
//!     ↓
//! PDF bytes
//! ```
//!
//! `ImageData` turns PNG/JPEG files into Image XObjects; `XmpWriter`
//! builds the catalog metadata packet.

mod assembler;
mod content;
mod image_xobject;
mod object_serializer;
mod xmp;

pub use assembler::{A4_HEIGHT, A4_WIDTH, EncryptionSpec, PageSpec, PdfAssembler, compress_flate};
pub use content::ContentStreamBuilder;
pub use image_xobject::{ColorSpace, EmbedFormat, ImageData};
pub use object_serializer::ObjectSerializer;
pub use xmp::{XmpWriter, iso_timestamp};
