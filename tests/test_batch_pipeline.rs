//! Integration tests for the batch orchestrator.
//!
//! Covers the directory contract: extension dispatch, normalization of
//! image and DOCX inputs, per-file failure isolation, scratch-directory
//! hygiene, and the fifth-position configuration.

use qrseal::document::PdfDocument;
use qrseal::object::Object;
use qrseal::pipeline::{StampConfig, process_directory};
use qrseal::writer::{
    A4_HEIGHT, A4_WIDTH, EncryptionSpec, ObjectSerializer, PageSpec, PdfAssembler,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_source_pdf(path: &Path, pages: usize, encryption: Option<&EncryptionSpec>) {
    let mut assembler = PdfAssembler::new();
    for i in 0..pages {
        let content = assembler.add_stream(
            HashMap::new(),
            format!("BT 72 700 Td (page {}) Tj ET", i + 1).into_bytes(),
        );
        assembler.add_page(PageSpec {
            media_box: [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
            contents: vec![content],
            resources: Object::Dictionary(HashMap::new()),
        });
    }
    if encryption.is_some() {
        assembler.set_info(ObjectSerializer::dict(vec![(
            "CreationDate",
            ObjectSerializer::string("D:20210505120000Z"),
        )]));
    }
    std::fs::write(path, assembler.finish(encryption).unwrap()).unwrap();
}

fn write_png(path: &Path) {
    let img = image::RgbImage::from_pixel(100, 80, image::Rgb([90, 160, 60]));
    img.save(path).unwrap();
}

fn write_docx(path: &Path) {
    let document_xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Contract body text.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// Scaffold a batch workspace: input dir, badge, isolated output/scratch.
struct Workspace {
    _root: tempfile::TempDir,
    input: PathBuf,
    config: StampConfig,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("inbox");
        std::fs::create_dir(&input).unwrap();

        let badge = root.path().join("badge.png");
        write_png(&badge);

        let config = StampConfig::new()
            .with_verify_base_url("https://verify.test")
            .with_badge_path(&badge)
            .with_output_dir(root.path().join("output"))
            .with_scratch_dir(root.path().join("img"));

        Self {
            _root: root,
            input,
            config,
        }
    }

    fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }
}

#[test]
fn test_mixed_directory_contract() {
    let ws = Workspace::new();
    write_source_pdf(&ws.input.join("report.pdf"), 2, None);
    write_docx(&ws.input.join("contract.docx"));
    std::fs::write(ws.input.join("notes.txt"), b"not a document we stamp").unwrap();

    let report = process_directory(&ws.input, &ws.config).unwrap();

    // Two outputs, one unsupported skip
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].ends_with("notes.txt"));

    assert!(ws.output_dir().join("report.pdf").exists());
    assert!(ws.output_dir().join("contract.pdf").exists());
    assert!(!ws.output_dir().join("notes.pdf").exists());

    // Scratch directory is empty once the run completes
    assert_eq!(std::fs::read_dir(ws.scratch_dir()).unwrap().count(), 0);
}

#[test]
fn test_png_input_yields_one_page_with_four_overlays() {
    let ws = Workspace::new();
    write_png(&ws.input.join("scan.png"));

    let report = process_directory(&ws.input, &ws.config).unwrap();
    assert_eq!(report.succeeded(), 1);

    let mut doc = PdfDocument::open(ws.output_dir().join("scan.pdf")).unwrap();
    assert_eq!(doc.page_count().unwrap(), 1);

    let page_refs = doc.collect_page_refs().unwrap();
    let content = doc.page_content(page_refs[0]).unwrap();
    let text = String::from_utf8_lossy(&content);

    // Exactly four token overlays, and no attempt to draw an absent
    // fifth position
    assert_eq!(text.matches("/SealQR").count(), 4);
    assert!(!text.contains("/SealQR4"));
    assert!(text.contains("75 0 0 75 5 5 cm"));
    assert!(text.contains("75 0 0 75 520 770 cm"));
}

#[test]
fn test_custom_position_via_config() {
    let ws = Workspace::new();
    let config = ws.config.clone().with_custom_position(111.0, 222.0);
    write_source_pdf(&ws.input.join("doc.pdf"), 1, None);

    let report = process_directory(&ws.input, &config).unwrap();
    assert_eq!(report.succeeded(), 1);

    let mut doc = PdfDocument::open(config.output_dir.join("doc.pdf")).unwrap();
    let page_refs = doc.collect_page_refs().unwrap();
    let content = doc.page_content(page_refs[0]).unwrap();
    let text = String::from_utf8_lossy(&content);

    assert_eq!(text.matches("/SealQR").count(), 5);
    assert!(text.contains("75 0 0 75 111 222 cm"));
}

#[test]
fn test_encrypted_pdf_processed_with_configured_password() {
    let ws = Workspace::new();
    let config = ws.config.clone().with_password("vault-key");
    write_source_pdf(
        &ws.input.join("locked.pdf"),
        3,
        Some(&EncryptionSpec::with_password("vault-key")),
    );

    let report = process_directory(&ws.input, &config).unwrap();
    assert_eq!(report.succeeded(), 1, "outcomes: {:?}", report.outcomes);

    let mut doc = PdfDocument::open(config.output_dir.join("locked.pdf")).unwrap();
    assert!(doc.is_encrypted());
    doc.authenticate("vault-key").unwrap();
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
fn test_encrypted_pdf_without_password_fails_file_scoped() {
    let ws = Workspace::new();
    write_source_pdf(
        &ws.input.join("locked.pdf"),
        1,
        Some(&EncryptionSpec::with_password("secret")),
    );
    write_source_pdf(&ws.input.join("plain.pdf"), 1, None);

    let report = process_directory(&ws.input, &ws.config).unwrap();

    // The locked file fails, the batch continues
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);

    let failed = report.outcomes.iter().find(|o| !o.succeeded()).unwrap();
    assert!(failed.input.ends_with("locked.pdf"));
    assert!(failed.error.as_ref().unwrap().contains("password"));

    assert!(ws.output_dir().join("plain.pdf").exists());
    assert!(!ws.output_dir().join("locked.pdf").exists());
}

#[test]
fn test_wrong_password_produces_no_output() {
    let ws = Workspace::new();
    let config = ws.config.clone().with_password("incorrect");
    write_source_pdf(
        &ws.input.join("locked.pdf"),
        1,
        Some(&EncryptionSpec::with_password("correct")),
    );

    let report = process_directory(&ws.input, &config).unwrap();
    assert_eq!(report.failed(), 1);
    assert!(!config.output_dir.join("locked.pdf").exists());

    // Token scratch still ends empty despite the failure
    assert_eq!(std::fs::read_dir(config.scratch_dir.clone()).unwrap().count(), 0);
}

#[test]
fn test_corrupt_pdf_is_isolated() {
    let ws = Workspace::new();
    std::fs::write(ws.input.join("broken.pdf"), b"%PDF-1.4\nthis is not a real pdf").unwrap();
    write_source_pdf(&ws.input.join("fine.pdf"), 1, None);

    let report = process_directory(&ws.input, &ws.config).unwrap();
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(ws.output_dir().join("fine.pdf").exists());
}

#[test]
fn test_missing_badge_fails_file_not_batch() {
    let ws = Workspace::new();
    let config = ws.config.clone().with_badge_path("/nonexistent/badge.png");
    write_source_pdf(&ws.input.join("doc.pdf"), 1, None);

    let report = process_directory(&ws.input, &config).unwrap();
    assert_eq!(report.failed(), 1);
}

#[test]
fn test_uppercase_extensions_accepted() {
    let ws = Workspace::new();
    write_source_pdf(&ws.input.join("REPORT.PDF"), 1, None);
    write_png(&ws.input.join("PHOTO.PNG"));

    let report = process_directory(&ws.input, &ws.config).unwrap();
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped.len(), 0);
}
