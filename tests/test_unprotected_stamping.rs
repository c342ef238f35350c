//! Integration tests for the template-import stamping strategy.
//!
//! Covers the core placement contract: page-count preservation, the
//! 4-or-5 overlay constellation at exact planned coordinates, and
//! structural idempotence when re-stamping an already-stamped output.

use qrseal::document::PdfDocument;
use qrseal::metadata;
use qrseal::object::Object;
use qrseal::stamp::{StampPlan, TokenMinter, compose_unprotected};
use qrseal::writer::{A4_HEIGHT, A4_WIDTH, ObjectSerializer, PageSpec, PdfAssembler};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build a plain n-page source document with one line of text per page.
fn write_source_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let mut assembler = PdfAssembler::new();

    let font = assembler.add_object(ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Font")),
        ("Subtype", ObjectSerializer::name("Type1")),
        ("BaseFont", ObjectSerializer::name("Helvetica")),
    ]));

    for i in 0..pages {
        let content = assembler.add_stream(
            HashMap::new(),
            format!("BT /F1 14 Tf 72 720 Td (source page {}) Tj ET", i + 1).into_bytes(),
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

    let path = dir.join(name);
    std::fs::write(&path, assembler.finish(None).unwrap()).unwrap();
    path
}

fn write_badge(dir: &Path) -> PathBuf {
    let path = dir.join("badge.png");
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb([220, 40, 40]));
    img.save(&path).unwrap();
    path
}

/// Stamp a source and return the parsed output.
fn stamp(source: &Path, dir: &Path, custom: Option<(f64, f64)>) -> PdfDocument {
    let badge = write_badge(dir);
    let minter = TokenMinter::new("https://verify.test", dir);
    let plan = StampPlan::generate(&minter, custom).unwrap();

    let stamped = compose_unprotected(source, &plan, &badge).unwrap();
    let bytes = metadata::embed(stamped, None).unwrap();

    PdfDocument::from_bytes(bytes).unwrap()
}

#[test]
fn test_page_count_preserved() {
    for pages in [1, 3, 7] {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source_pdf(dir.path(), "source.pdf", pages);

        let mut doc = stamp(&source, dir.path(), None);
        assert_eq!(doc.page_count().unwrap(), pages, "page count for {}-page source", pages);
    }
}

#[test]
fn test_four_overlays_at_exact_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source_pdf(dir.path(), "source.pdf", 2);

    let mut doc = stamp(&source, dir.path(), None);
    let page_refs = doc.collect_page_refs().unwrap();

    for page_ref in page_refs {
        let content = doc.page_content(page_ref).unwrap();
        let text = String::from_utf8_lossy(&content);

        // Token footprints at the four planned corners
        assert!(text.contains("75 0 0 75 5 5 cm"));
        assert!(text.contains("75 0 0 75 520 5 cm"));
        assert!(text.contains("75 0 0 75 5 770 cm"));
        assert!(text.contains("75 0 0 75 520 770 cm"));

        // Badges centered inside each footprint (inset 30)
        assert!(text.contains("15 0 0 15 35 35 cm"));
        assert!(text.contains("15 0 0 15 550 35 cm"));
        assert!(text.contains("15 0 0 15 35 800 cm"));
        assert!(text.contains("15 0 0 15 550 800 cm"));

        // Exactly four tokens, no phantom fifth
        assert_eq!(text.matches("/SealQR").count(), 4);
        assert!(!text.contains("/SealQR4"));
        assert_eq!(text.matches("/SealBadge Do").count(), 4);
    }
}

#[test]
fn test_custom_position_adds_fifth_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source_pdf(dir.path(), "source.pdf", 1);

    let mut doc = stamp(&source, dir.path(), Some((250.0, 410.0)));
    let page_refs = doc.collect_page_refs().unwrap();
    let content = doc.page_content(page_refs[0]).unwrap();
    let text = String::from_utf8_lossy(&content);

    assert_eq!(text.matches("/SealQR").count(), 5);
    assert!(text.contains("75 0 0 75 250 410 cm"));
    assert!(text.contains("15 0 0 15 280 440 cm"));
    assert_eq!(text.matches("/SealBadge Do").count(), 5);
}

#[test]
fn test_original_content_survives_as_template() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source_pdf(dir.path(), "source.pdf", 1);

    let mut doc = stamp(&source, dir.path(), None);
    let page_refs = doc.collect_page_refs().unwrap();
    let content = doc.page_content(page_refs[0]).unwrap();
    let text = String::from_utf8_lossy(&content);

    // The page draws the imported template
    assert!(text.contains("/Pg0 Do"));

    // The template form carries the source page's operators
    let page = doc.load_object(page_refs[0]).unwrap();
    let resources = page.as_dict().unwrap().get("Resources").cloned().unwrap();
    let xobjects = resources
        .as_dict()
        .unwrap()
        .get("XObject")
        .cloned()
        .unwrap();
    let template_ref = xobjects
        .as_dict()
        .unwrap()
        .get("Pg0")
        .and_then(|o| o.as_reference())
        .unwrap();

    let template = doc.load_object(template_ref).unwrap();
    let template_dict = template.as_dict().unwrap();
    assert_eq!(template_dict.get("Subtype").unwrap().as_name(), Some("Form"));

    let template_content = doc.decode_stream(&template, template_ref).unwrap();
    assert!(String::from_utf8_lossy(&template_content).contains("(source page 1) Tj"));
}

#[test]
fn test_metadata_constants_on_unprotected_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source_pdf(dir.path(), "source.pdf", 1);

    let mut doc = stamp(&source, dir.path(), None);
    let info = doc.info().unwrap().unwrap();
    let dict = info.as_dict().unwrap();

    assert_eq!(dict.get("Title").unwrap().as_string(), Some(&b"Sealed Document"[..]));
    assert_eq!(dict.get("Producer").unwrap().as_string(), Some(&b"QRSeal Engine"[..]));
    assert!(dict.contains_key("CreationDate"));
    assert!(!doc.is_encrypted());
}

#[test]
fn test_restamping_is_structurally_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source_pdf(dir.path(), "source.pdf", 2);

    // First pass
    let badge = write_badge(dir.path());
    let minter = TokenMinter::new("https://verify.test", dir.path());
    let plan = StampPlan::generate(&minter, None).unwrap();
    let bytes = metadata::embed(compose_unprotected(&source, &plan, &badge).unwrap(), None).unwrap();

    let first_output = dir.path().join("stamped.pdf");
    std::fs::write(&first_output, bytes).unwrap();

    // Second pass over the already-stamped output must not fail or
    // change the page count; it adds a second overlay layer
    let plan2 = StampPlan::generate(&minter, None).unwrap();
    let bytes2 =
        metadata::embed(compose_unprotected(&first_output, &plan2, &badge).unwrap(), None).unwrap();

    let mut doc = PdfDocument::from_bytes(bytes2).unwrap();
    assert_eq!(doc.page_count().unwrap(), 2);

    let page_refs = doc.collect_page_refs().unwrap();
    let content = doc.page_content(page_refs[0]).unwrap();
    assert!(String::from_utf8_lossy(&content).contains("/SealQR0 Do"));
}

#[test]
fn test_tokens_minted_per_plan_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let minter = TokenMinter::new("https://verify.test", dir.path());

    let plan_a = StampPlan::generate(&minter, None).unwrap();
    let plan_b = StampPlan::generate(&minter, None).unwrap();

    // No token is shared across positions or across plans
    let mut ids: Vec<_> = plan_a.tokens().iter().map(|t| t.id).collect();
    ids.extend(plan_b.tokens().iter().map(|t| t.id));
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 8);
}
