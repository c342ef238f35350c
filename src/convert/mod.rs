//! Format normalization.
//!
//! Non-PDF inputs become unprotected baseline PDFs that feed the
//! standard stamping pipeline: raster images become a single A4 page,
//! DOCX documents are laid out paragraph by paragraph.

mod docx;
mod image;

pub use docx::docx_to_pdf;
pub use image::image_to_pdf;

/// Input formats the directory contract accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// An existing PDF (plain or password-protected)
    Pdf,
    /// A JPEG image (.jpg / .jpeg)
    Jpeg,
    /// A PNG image
    Png,
    /// A Word document
    Docx,
}

impl SourceFormat {
    /// Map a file extension (case-insensitive, without the dot) onto a
    /// source format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            "docx" => Some(SourceFormat::Docx),
            _ => None,
        }
    }

    /// Whether this format needs normalization before stamping.
    pub fn needs_normalization(&self) -> bool {
        !matches!(self, SourceFormat::Pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(SourceFormat::from_extension("pdf"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("jpg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("JPEG"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("png"), Some(SourceFormat::Png));
        assert_eq!(SourceFormat::from_extension("docx"), Some(SourceFormat::Docx));
        assert_eq!(SourceFormat::from_extension("txt"), None);
        assert_eq!(SourceFormat::from_extension(""), None);
    }

    #[test]
    fn test_needs_normalization() {
        assert!(!SourceFormat::Pdf.needs_normalization());
        assert!(SourceFormat::Png.needs_normalization());
        assert!(SourceFormat::Docx.needs_normalization());
    }
}
