//! Integration tests for the reconstruction stamping strategy.
//!
//! Covers decryption with the supplied credential, page re-emission
//! under the shared placement contract, creation-date threading, the XMP
//! catalog mirror, and re-encryption with the original password.

use qrseal::Error;
use qrseal::document::PdfDocument;
use qrseal::metadata;
use qrseal::object::Object;
use qrseal::stamp::{StampPlan, TokenMinter, compose_protected};
use qrseal::writer::{
    A4_HEIGHT, A4_WIDTH, EncryptionSpec, ObjectSerializer, PageSpec, PdfAssembler,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const PASSWORD: &str = "tr0ub4dor";
const SOURCE_CREATED: &str = "D:20200102030405Z";

/// Build an encrypted 3-page source carrying a creation date.
fn write_protected_source(dir: &Path) -> PathBuf {
    let mut assembler = PdfAssembler::new();

    let font = assembler.add_object(ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Font")),
        ("Subtype", ObjectSerializer::name("Type1")),
        ("BaseFont", ObjectSerializer::name("Helvetica")),
    ]));

    for i in 0..3 {
        let content = assembler.add_stream(
            HashMap::new(),
            format!("BT /F1 12 Tf 72 700 Td (confidential page {}) Tj ET", i + 1).into_bytes(),
        );

        let mut fonts = HashMap::new();
        fonts.insert("F1".to_string(), Object::Reference(font));
        let mut resources = HashMap::new();
        resources.insert("Font".to_string(), Object::Dictionary(fonts));

        assembler.add_page(PageSpec {
            media_box: [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
            contents: vec![content],
            resources: Object::Dictionary(resources),
        });
    }

    assembler.set_info(ObjectSerializer::dict(vec![
        ("Title", ObjectSerializer::string("Original Title")),
        ("CreationDate", ObjectSerializer::string(SOURCE_CREATED)),
    ]));

    let bytes = assembler
        .finish(Some(&EncryptionSpec::with_password(PASSWORD)))
        .unwrap();
    let path = dir.join("protected.pdf");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn write_badge(dir: &Path) -> PathBuf {
    let path = dir.join("badge.png");
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb([30, 30, 180]));
    img.save(&path).unwrap();
    path
}

/// Compose and embed with the correct password; return output bytes.
fn stamp_protected(dir: &Path) -> Vec<u8> {
    let source = write_protected_source(dir);
    let badge = write_badge(dir);
    let minter = TokenMinter::new("https://verify.test", dir);
    let plan = StampPlan::generate(&minter, None).unwrap();

    let stamped = compose_protected(&source, PASSWORD, &plan, &badge).unwrap();
    assert!(stamped.is_encrypted());
    metadata::embed(stamped, Some(PASSWORD)).unwrap()
}

#[test]
fn test_source_is_actually_protected() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_protected_source(dir.path());

    let report = qrseal::inspect(&source).unwrap();
    assert!(report.encrypted);
}

#[test]
fn test_wrong_password_is_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_protected_source(dir.path());
    let badge = write_badge(dir.path());

    let minter = TokenMinter::new("https://verify.test", dir.path());
    let plan = StampPlan::generate(&minter, None).unwrap();

    let err = compose_protected(&source, "not-the-password", &plan, &badge).unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[test]
fn test_output_reencrypts_with_same_password() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = stamp_protected(dir.path());

    let mut doc = PdfDocument::from_bytes(bytes).unwrap();
    assert!(doc.is_encrypted());
    assert!(!doc.is_unlocked());

    // Wrong password still fails on the output
    assert!(doc.authenticate("nope").is_err());

    // The password used for decryption re-opens the output
    doc.authenticate(PASSWORD).unwrap();
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
fn test_overlays_on_every_reconstructed_page() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = stamp_protected(dir.path());

    let mut doc = PdfDocument::from_bytes(bytes).unwrap();
    doc.authenticate(PASSWORD).unwrap();

    let page_refs = doc.collect_page_refs().unwrap();
    assert_eq!(page_refs.len(), 3);

    for (i, page_ref) in page_refs.into_iter().enumerate() {
        let content = doc.page_content(page_ref).unwrap();
        let text = String::from_utf8_lossy(&content);

        // Original content re-emitted, not lost
        assert!(
            text.contains(&format!("(confidential page {}) Tj", i + 1)),
            "original content missing on page {}",
            i + 1
        );

        // Identical placement contract as the template-import path
        assert!(text.contains("75 0 0 75 5 5 cm"));
        assert!(text.contains("75 0 0 75 520 770 cm"));
        assert_eq!(text.matches("/SealQR").count(), 4);
        assert_eq!(text.matches("/SealBadge Do").count(), 4);
    }
}

#[test]
fn test_metadata_constants_override_and_date_threading() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = stamp_protected(dir.path());

    let mut doc = PdfDocument::from_bytes(bytes).unwrap();
    doc.authenticate(PASSWORD).unwrap();

    let info = doc.info().unwrap().unwrap();
    let dict = info.as_dict().unwrap();

    // Fixed constants override the original descriptive fields
    assert_eq!(dict.get("Title").unwrap().as_string(), Some(&b"Sealed Document"[..]));
    assert_eq!(dict.get("Author").unwrap().as_string(), Some(&b"QRSeal"[..]));
    assert_eq!(dict.get("Producer").unwrap().as_string(), Some(&b"QRSeal Engine"[..]));

    // The source's creation timestamp survives; modification is fresh
    assert_eq!(dict.get("CreationDate").unwrap().as_string(), Some(SOURCE_CREATED.as_bytes()));
    assert!(dict.contains_key("ModDate"));
    assert_ne!(
        dict.get("ModDate").unwrap().as_string(),
        dict.get("CreationDate").unwrap().as_string()
    );
}

#[test]
fn test_xmp_catalog_metadata_attached() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = stamp_protected(dir.path());

    let mut doc = PdfDocument::from_bytes(bytes).unwrap();
    doc.authenticate(PASSWORD).unwrap();

    let catalog = doc.catalog().unwrap();
    let metadata_ref = catalog
        .as_dict()
        .unwrap()
        .get("Metadata")
        .and_then(|o| o.as_reference())
        .expect("catalog should carry /Metadata");

    let stream = doc.load_object(metadata_ref).unwrap();
    let stream_dict = stream.as_dict().unwrap();
    assert_eq!(stream_dict.get("Type").unwrap().as_name(), Some("Metadata"));
    assert_eq!(stream_dict.get("Subtype").unwrap().as_name(), Some("XML"));

    let packet = doc.decode_stream(&stream, metadata_ref).unwrap();
    let xml = String::from_utf8_lossy(&packet);
    assert!(xml.contains("<?xpacket begin"));
    assert!(xml.contains("Sealed Document"));
    assert!(xml.contains("<pdf:Producer>QRSeal Engine</pdf:Producer>"));
    // The source's format version is mirrored
    assert!(xml.contains("<pdf:PDFVersion>1.7</pdf:PDFVersion>"));
    // Creation date threads into the XMP mirror
    assert!(xml.contains("<xmp:CreateDate>2020-01-02T03:04:05Z</xmp:CreateDate>"));
}

#[test]
fn test_embed_without_password_fails_for_protected_doc() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_protected_source(dir.path());
    let badge = write_badge(dir.path());

    let minter = TokenMinter::new("https://verify.test", dir.path());
    let plan = StampPlan::generate(&minter, None).unwrap();

    let stamped = compose_protected(&source, PASSWORD, &plan, &badge).unwrap();
    let err = metadata::embed(stamped, None).unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}
