//! Metadata embedding and output serialization.
//!
//! Finishes a [`StampedDocument`]: writes the fixed descriptive fields
//! into the information dictionary, threads the original creation date
//! forward on the reconstruction path, mirrors the fields into an XMP
//! packet attached at the catalog level, and re-applies encryption with
//! the original credential. Catalog metadata is attached before the
//! encryption pass — encryption seals the catalog at serialization.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::stamp::StampedDocument;
use crate::writer::{EncryptionSpec, ObjectSerializer, XmpWriter, iso_timestamp};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;

/// Title written on every output document.
pub const DOC_TITLE: &str = "Sealed Document";
/// Author written on every output document.
pub const DOC_AUTHOR: &str = "QRSeal";
/// Creator written on every output document.
pub const DOC_CREATOR: &str = "QRSeal";
/// Producer written on every output document.
pub const DOC_PRODUCER: &str = "QRSeal Engine";

/// Embed metadata and serialize the document to bytes.
///
/// Unprotected path: fixed descriptive constants, creation date = now,
/// no encryption. Protected path: the constants override the source's
/// fields, the source's creation date survives when present (else now),
/// a fresh modification date is derived, the XMP mirror is attached at
/// the catalog, and the output is re-encrypted with `password` as both
/// user and owner credential.
pub fn embed(doc: StampedDocument, password: Option<&str>) -> Result<Vec<u8>> {
    let now = Utc::now();

    let StampedDocument {
        mut assembler,
        encrypted,
        source_info,
        source_version,
    } = doc;

    if !encrypted {
        assembler.set_info(ObjectSerializer::dict(vec![
            ("Title", ObjectSerializer::string(DOC_TITLE)),
            ("Author", ObjectSerializer::string(DOC_AUTHOR)),
            ("Creator", ObjectSerializer::string(DOC_CREATOR)),
            ("Producer", ObjectSerializer::string(DOC_PRODUCER)),
            ("CreationDate", ObjectSerializer::string(&pdf_date(now))),
        ]));

        return assembler.finish(None);
    }

    let password = password
        .ok_or_else(|| Error::Auth("re-encryption requires the source password".to_string()))?;

    // Original creation date survives when the source carried one
    let created = source_info
        .as_ref()
        .and_then(|info| info.as_dict())
        .and_then(|dict| dict.get("CreationDate"))
        .and_then(|obj| obj.as_string())
        .and_then(parse_pdf_date)
        .unwrap_or(now);

    assembler.set_info(ObjectSerializer::dict(vec![
        ("Title", ObjectSerializer::string(DOC_TITLE)),
        ("Author", ObjectSerializer::string(DOC_AUTHOR)),
        ("Creator", ObjectSerializer::string(DOC_CREATOR)),
        ("Producer", ObjectSerializer::string(DOC_PRODUCER)),
        ("CreationDate", ObjectSerializer::string(&pdf_date(created))),
        ("ModDate", ObjectSerializer::string(&pdf_date(now))),
    ]));

    // XMP mirror of the descriptive fields plus the source format version
    let packet = XmpWriter::new()
        .title(DOC_TITLE)
        .creator(DOC_AUTHOR)
        .creator_tool(DOC_CREATOR)
        .producer(DOC_PRODUCER)
        .create_date(iso_timestamp(created))
        .modify_date(iso_timestamp(now))
        .pdf_version(source_version)
        .build_bytes();

    let mut metadata_dict = HashMap::new();
    metadata_dict.insert("Type".to_string(), Object::Name("Metadata".to_string()));
    metadata_dict.insert("Subtype".to_string(), Object::Name("XML".to_string()));
    let metadata_ref = assembler.add_stream(metadata_dict, packet);

    // Must precede finish(): the encryption pass seals the catalog
    assembler.set_catalog_metadata(metadata_ref);

    assembler.finish(Some(&EncryptionSpec::with_password(password)))
}

/// Format a timestamp as a PDF date string (D:YYYYMMDDHHmmSSZ).
pub fn pdf_date(time: DateTime<Utc>) -> String {
    format!("D:{}Z", time.format("%Y%m%d%H%M%S"))
}

/// Parse a PDF date string, tolerating the common variants.
///
/// Accepts `D:YYYYMMDDHHmmSS` with optional timezone suffix, and the
/// truncated forms the PDF spec allows (missing time components default to
/// zero). The timezone offset is ignored; dates are treated as UTC.
pub fn parse_pdf_date(raw: &[u8]) -> Option<DateTime<Utc>> {
    let text = std::str::from_utf8(raw).ok()?;
    let digits: String = text
        .trim_start_matches("D:")
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.len() < 8 {
        return None;
    }

    // Pad truncated forms out to full precision
    let mut padded = digits;
    while padded.len() < 14 {
        padded.push('0');
    }

    let naive = NaiveDateTime::parse_from_str(&padded[..14], "%Y%m%d%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_date_format() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();
        assert_eq!(pdf_date(time), "D:20240301093005Z");
    }

    #[test]
    fn test_parse_pdf_date_full() {
        let parsed = parse_pdf_date(b"D:20230102030405+07'00'").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_pdf_date_truncated() {
        let parsed = parse_pdf_date(b"D:20230102").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_pdf_date_round_trip() {
        let time = Utc.with_ymd_and_hms(2022, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_pdf_date(pdf_date(time).as_bytes()).unwrap(), time);
    }

    #[test]
    fn test_parse_pdf_date_garbage() {
        assert!(parse_pdf_date(b"not a date").is_none());
        assert!(parse_pdf_date(b"D:1999").is_none());
        assert!(parse_pdf_date(b"").is_none());
    }
}
