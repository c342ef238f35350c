//! DOCX to PDF normalization.
//!
//! DOCX files are ZIP archives of Open XML; the main content lives in
//! `word/document.xml`. Paragraphs and runs are parsed with their basic
//! character styling (bold, italic, size, heading level) and laid out
//! onto A4 pages with the base-14 Helvetica family. This is a baseline
//! rendering for stamping, not a full Word layout engine.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::{
    A4_HEIGHT, A4_WIDTH, ContentStreamBuilder, ObjectSerializer, PageSpec, PdfAssembler,
    compress_flate,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

const MARGIN: f64 = 72.0;
const BASE_FONT_SIZE: f64 = 11.0;
const LINE_HEIGHT: f64 = 1.4;

/// Convert a DOCX file into a baseline PDF.
pub fn docx_to_pdf(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    convert_docx_bytes(&bytes)
}

/// Convert DOCX bytes into a baseline PDF.
pub fn convert_docx_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let cursor = Cursor::new(bytes);
    let mut archive = ZipArchive::new(cursor)
        .map_err(|e| Error::UnsupportedFormat(format!("not a DOCX archive: {}", e)))?;

    let paragraphs = parse_document(&mut archive)?;
    let title = parse_title(&mut archive);

    build_pdf(title.as_deref(), &paragraphs)
}

/// Character styling carried by one run.
#[derive(Debug, Default, Clone)]
struct RunStyle {
    bold: bool,
    italic: bool,
    font_size: Option<f64>,
}

impl RunStyle {
    /// Base-14 font name for this style.
    fn font_resource(&self) -> &'static str {
        match (self.bold, self.italic) {
            (true, true) => "F4",
            (true, false) => "F2",
            (false, true) => "F3",
            (false, false) => "F1",
        }
    }
}

#[derive(Debug, Default)]
struct TextRun {
    text: String,
    style: RunStyle,
}

#[derive(Debug, Default)]
struct DocumentParagraph {
    runs: Vec<TextRun>,
    heading_level: Option<u8>,
    is_list_item: bool,
}

impl DocumentParagraph {
    fn max_font_size(&self) -> f64 {
        self.runs
            .iter()
            .filter_map(|r| r.style.font_size)
            .fold(f64::NAN, f64::max)
            .max(if let Some(level) = self.heading_level {
                heading_size(level)
            } else {
                BASE_FONT_SIZE
            })
    }
}

fn heading_size(level: u8) -> f64 {
    match level {
        1 => 22.0,
        2 => 17.0,
        3 => 14.0,
        _ => 12.0,
    }
}

/// Parse paragraphs and runs out of `word/document.xml`.
fn parse_document<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<DocumentParagraph>> {
    let mut paragraphs = Vec::new();

    let xml_content = match archive.by_name("word/document.xml") {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)
                .map_err(|e| Error::UnsupportedFormat(format!("unreadable document.xml: {}", e)))?;
            content
        },
        Err(_) => return Ok(paragraphs),
    };

    let mut reader = Reader::from_str(&xml_content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut current_paragraph = DocumentParagraph::default();
    let mut current_run = TextRun::default();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    current_paragraph = DocumentParagraph::default();
                },
                b"r" => {
                    in_run = true;
                    current_run = TextRun::default();
                },
                b"t" => {
                    in_text = true;
                },
                b"b" | b"bCs" => {
                    if in_run {
                        current_run.style.bold = true;
                    }
                },
                b"i" | b"iCs" => {
                    if in_run {
                        current_run.style.italic = true;
                    }
                },
                b"sz" => {
                    if in_run {
                        if let Some(val) = get_attribute(e, "val") {
                            if let Ok(half_pts) = val.parse::<i64>() {
                                current_run.style.font_size = Some(half_pts as f64 / 2.0);
                            }
                        }
                    }
                },
                b"pStyle" => {
                    if let Some(val) = get_attribute(e, "val") {
                        if val.to_ascii_lowercase().starts_with("heading") {
                            let level = val
                                .chars()
                                .filter(|c| c.is_ascii_digit())
                                .collect::<String>()
                                .parse::<u8>()
                                .unwrap_or(1);
                            current_paragraph.heading_level = Some(level);
                        }
                    }
                },
                b"numPr" => {
                    current_paragraph.is_list_item = true;
                },
                _ => {},
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    paragraphs.push(std::mem::take(&mut current_paragraph));
                },
                b"r" => {
                    in_run = false;
                    if !current_run.text.is_empty() {
                        current_paragraph.runs.push(std::mem::take(&mut current_run));
                    }
                },
                b"t" => {
                    in_text = false;
                },
                _ => {},
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"b" | b"bCs" => {
                    if in_run {
                        current_run.style.bold = true;
                    }
                },
                b"i" | b"iCs" => {
                    if in_run {
                        current_run.style.italic = true;
                    }
                },
                b"sz" => {
                    if in_run {
                        if let Some(val) = get_attribute(e, "val") {
                            if let Ok(half_pts) = val.parse::<i64>() {
                                current_run.style.font_size = Some(half_pts as f64 / 2.0);
                            }
                        }
                    }
                },
                b"br" => {
                    if in_run {
                        current_run.text.push('\n');
                    }
                },
                b"tab" => {
                    if in_run {
                        current_run.text.push('\t');
                    }
                },
                b"numPr" => {
                    current_paragraph.is_list_item = true;
                },
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if in_text && in_run {
                    current_run.text.push_str(&e.unescape().unwrap_or_default());
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::UnsupportedFormat(format!("DOCX XML parse error: {}", e)));
            },
            _ => {},
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Pull the title out of `docProps/core.xml`, when present.
fn parse_title<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let xml_content = match archive.by_name("docProps/core.xml") {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content).ok()?;
            content
        },
        Err(_) => return None,
    };

    let mut reader = Reader::from_str(&xml_content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_title = false;
    let mut title = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"title" {
                    in_title = true;
                }
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"title" {
                    in_title = false;
                }
            },
            Ok(Event::Text(e)) => {
                if in_title {
                    title = Some(e.unescape().unwrap_or_default().to_string());
                }
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {},
        }
        buf.clear();
    }

    title.filter(|t| !t.is_empty())
}

fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        let key = attr.key.local_name();
        if key.as_ref() == name.as_bytes() {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

/// Lay the parsed paragraphs out onto A4 pages.
fn build_pdf(title: Option<&str>, paragraphs: &[DocumentParagraph]) -> Result<Vec<u8>> {
    let mut assembler = PdfAssembler::new();

    let mut pages: Vec<ContentStreamBuilder> = vec![ContentStreamBuilder::new()];
    let mut y = A4_HEIGHT - MARGIN;

    for para in paragraphs {
        let font_size = para.max_font_size();
        let line_height = font_size * LINE_HEIGHT;

        if para.runs.is_empty() {
            // Empty paragraph: spacing only
            y -= BASE_FONT_SIZE * LINE_HEIGHT;
            continue;
        }

        // Runs carrying explicit line breaks take extra lines
        let line_count: usize = para
            .runs
            .iter()
            .map(|r| r.text.matches('\n').count())
            .sum::<usize>()
            + 1;

        for line in 0..line_count {
            if y < MARGIN + line_height {
                pages.push(ContentStreamBuilder::new());
                y = A4_HEIGHT - MARGIN;
            }

            let page = pages.last_mut().unwrap();
            let mut x = MARGIN;

            if line == 0 && para.is_list_item {
                page.text_at("F1", font_size, x, y, "\u{2022} ");
                x += font_size;
            }

            for run in &para.runs {
                let segment = run.text.split('\n').nth(line).unwrap_or("");
                if segment.is_empty() {
                    continue;
                }

                let size = if para.heading_level.is_some() {
                    font_size
                } else {
                    run.style.font_size.unwrap_or(BASE_FONT_SIZE)
                };
                let font = if para.heading_level.is_some() {
                    "F2"
                } else {
                    run.style.font_resource()
                };

                page.text_at(font, size, x, y, segment);
                // Approximate advance; Helvetica averages half an em
                x += segment.chars().count() as f64 * size * 0.5;
            }

            y -= line_height;
        }

        if para.heading_level.is_some() {
            y -= BASE_FONT_SIZE * 0.5;
        }
    }

    // Base-14 fonts shared by every page
    let font_refs: Vec<(&str, ObjectRef)> = [
        ("F1", "Helvetica"),
        ("F2", "Helvetica-Bold"),
        ("F3", "Helvetica-Oblique"),
        ("F4", "Helvetica-BoldOblique"),
    ]
    .iter()
    .map(|(res_name, base_font)| {
        let font_ref = assembler.add_object(ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Font")),
            ("Subtype", ObjectSerializer::name("Type1")),
            ("BaseFont", ObjectSerializer::name(base_font)),
            ("Encoding", ObjectSerializer::name("WinAnsiEncoding")),
        ]));
        (*res_name, font_ref)
    })
    .collect();

    for builder in pages {
        let mut font_dict = HashMap::new();
        for (name, font_ref) in &font_refs {
            font_dict.insert(name.to_string(), Object::Reference(*font_ref));
        }
        let mut resources = HashMap::new();
        resources.insert("Font".to_string(), Object::Dictionary(font_dict));

        let mut stream_dict = HashMap::new();
        stream_dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let content_ref = assembler.add_stream(stream_dict, compress_flate(&builder.build())?);

        assembler.add_page(PageSpec {
            media_box: [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
            contents: vec![content_ref],
            resources: Object::Dictionary(resources),
        });
    }

    if let Some(title) = title {
        assembler.set_info(ObjectSerializer::dict(vec![(
            "Title",
            ObjectSerializer::string(title),
        )]));
    }

    assembler.finish(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_bytes(document_xml: &str, core_xml: Option<&str>) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();

            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();

            if let Some(core) = core_xml {
                zip.start_file("docProps/core.xml", options).unwrap();
                zip.write_all(core.as_bytes()).unwrap();
            }

            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    const SIMPLE_DOC: &str = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p>
      <w:pPr><w:pStyle w:val="Heading1"/></w:pPr>
      <w:r><w:t>Quarterly Report</w:t></w:r>
    </w:p>
    <w:p>
      <w:r><w:rPr><w:b/></w:rPr><w:t>Bold lead.</w:t></w:r>
      <w:r><w:t> Plain continuation.</w:t></w:r>
    </w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_convert_simple_docx() {
        let bytes = docx_bytes(SIMPLE_DOC, None);
        let pdf = convert_docx_bytes(&bytes).unwrap();

        let mut doc = PdfDocument::from_bytes(pdf).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);

        let page_refs = doc.collect_page_refs().unwrap();
        let content = doc.page_content(page_refs[0]).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("(Quarterly Report) Tj"));
        assert!(text.contains("(Bold lead.) Tj"));
        // Headings render bold
        assert!(text.contains("/F2 22 Tf"));
    }

    #[test]
    fn test_core_xml_title_lands_in_info() {
        let core = r#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:title>Budget 2024</dc:title>
</cp:coreProperties>"#;

        let bytes = docx_bytes(SIMPLE_DOC, Some(core));
        let pdf = convert_docx_bytes(&bytes).unwrap();

        let mut doc = PdfDocument::from_bytes(pdf).unwrap();
        let info = doc.info().unwrap().unwrap();
        assert_eq!(
            info.as_dict().unwrap().get("Title").unwrap().as_string(),
            Some(&b"Budget 2024"[..])
        );
    }

    #[test]
    fn test_not_a_zip_is_format_error() {
        let result = convert_docx_bytes(b"plainly not a zip archive");
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_long_document_paginates() {
        let mut body = String::from(
            r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );
        for i in 0..120 {
            body.push_str(&format!("<w:p><w:r><w:t>Paragraph {}</w:t></w:r></w:p>", i));
        }
        body.push_str("</w:body></w:document>");

        let pdf = convert_docx_bytes(&docx_bytes(&body, None)).unwrap();
        let mut doc = PdfDocument::from_bytes(pdf).unwrap();
        assert!(doc.page_count().unwrap() >= 2);
    }
}
