//! Image to PDF normalization.
//!
//! Produces a single A4 page with the image placed at the top-left
//! corner at its native pixel size in points (1 px = 1 pt at 72 dpi).

use crate::error::Result;
use crate::object::Object;
use crate::writer::{
    A4_HEIGHT, A4_WIDTH, ContentStreamBuilder, ImageData, PageSpec, PdfAssembler, compress_flate,
};
use std::collections::HashMap;
use std::path::Path;

/// Convert a PNG or JPEG file into a one-page baseline PDF.
pub fn image_to_pdf(image_path: &Path) -> Result<Vec<u8>> {
    let image = ImageData::from_file(image_path)?;

    let mut assembler = PdfAssembler::new();

    let smask_ref = image
        .soft_mask_stream()
        .map(|stream| assembler.add_object(stream));
    let image_ref = assembler.add_object(image.to_stream(smask_ref));

    let width = image.width as f64;
    let height = image.height as f64;

    // Anchor at the page's top-left corner
    let mut ops = ContentStreamBuilder::new();
    ops.place_xobject("Im0", 0.0, A4_HEIGHT - height, width, height);

    let mut stream_dict = HashMap::new();
    stream_dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
    let content_ref = assembler.add_stream(stream_dict, compress_flate(&ops.build())?);

    let mut xobjects = HashMap::new();
    xobjects.insert("Im0".to_string(), Object::Reference(image_ref));
    let mut resources = HashMap::new();
    resources.insert("XObject".to_string(), Object::Dictionary(xobjects));

    assembler.add_page(PageSpec {
        media_box: [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
        contents: vec![content_ref],
        resources: Object::Dictionary(resources),
    });

    assembler.finish(None)
}
