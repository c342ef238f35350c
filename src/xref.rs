//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets, enabling random
//! access to PDF objects. Both traditional xref tables (PDF 1.0-1.4) and
//! cross-reference streams (PDF 1.5+) are supported, including /Prev
//! chains left by incremental updates.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek, SeekFrom};

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object (traditional)
    Uncompressed,
    /// Entry for an object in an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed) or object stream number (compressed)
    pub offset: u64,
    /// Generation number (uncompressed) or index within stream (compressed)
    pub generation: u16,
    /// Whether the object is in use
    pub in_use: bool,
}

impl XRefEntry {
    /// Create a new traditional-format entry.
    pub fn new(offset: u64, generation: u16, in_use: bool) -> Self {
        Self {
            entry_type: if in_use {
                XRefEntryType::Uncompressed
            } else {
                XRefEntryType::Free
            },
            offset,
            generation,
            in_use,
        }
    }

    /// Create a new uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
            in_use: true,
        }
    }

    /// Create a new compressed entry (object in object stream).
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
            in_use: true,
        }
    }

    /// Create a new free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
            in_use: false,
        }
    }
}

/// Cross-reference table mapping object numbers to locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams, this is the stream dictionary)
    trailer: Option<HashMap<String, Object>>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: HashMap<String, Object>) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&HashMap<String, Object>> {
        self.trailer.as_ref()
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Merge entries from an earlier xref section.
    ///
    /// Entries already in self win; this is how incremental updates
    /// shadow older sections when following /Prev.
    pub fn merge_from(&mut self, other: CrossRefTable) {
        for (obj_num, entry) in other.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }

        if self.trailer.is_none() && other.trailer.is_some() {
            self.trailer = other.trailer;
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the byte offset of the xref table by scanning from the end of the
/// file for the "startxref" keyword.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    // Last 2KB is enough to cover large trailers
    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut buf = Vec::new();
    reader.take(read_size).read_to_end(&mut buf)?;

    let content = String::from_utf8_lossy(&buf);

    let startxref_pos = content.rfind("startxref").ok_or(Error::InvalidXref)?;
    let after_keyword = &content[startxref_pos + 9..];

    // Split manually to also handle bare-CR line endings
    for line in split_lines(after_keyword) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed.parse::<u64>().map_err(|_| Error::InvalidXref);
        }
    }

    Err(Error::InvalidXref)
}

/// Parse the cross-reference table at the given byte offset, following
/// /Prev pointers.
pub fn parse_xref<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    parse_xref_recursive(reader, offset, 0)
}

fn parse_xref_recursive<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    depth: u32,
) -> Result<CrossRefTable> {
    // Circular /Prev chains exist in the wild
    if depth > 100 {
        return Err(Error::InvalidPdf("xref /Prev chain depth exceeded 100".to_string()));
    }

    reader.seek(SeekFrom::Start(offset))?;

    let mut peek_buf = [0u8; 20];
    let bytes_read = reader.read(&mut peek_buf)?;
    reader.seek(SeekFrom::Start(offset))?;

    let peek_str = String::from_utf8_lossy(&peek_buf[..bytes_read]);
    let trimmed = peek_str.trim_start();

    let mut xref = if trimmed.starts_with("xref") {
        parse_traditional_xref(reader, offset)?
    } else if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        // An object header here means a cross-reference stream
        match parse_xref_stream(reader, offset) {
            Ok(xref) => xref,
            Err(e) => {
                log::debug!("failed to parse as xref stream: {}", e);
                reader.seek(SeekFrom::Start(offset))?;
                match parse_traditional_xref(reader, offset) {
                    Ok(xref) => xref,
                    Err(trad_err) => {
                        return Err(Error::InvalidPdf(format!(
                            "failed to parse xref (stream attempt: {}, traditional attempt: {})",
                            e, trad_err
                        )));
                    },
                }
            },
        }
    } else {
        return Err(Error::InvalidXref);
    };

    if let Some(trailer) = xref.trailer() {
        if let Some(prev_offset) = trailer.get("Prev").and_then(|o| o.as_integer()) {
            log::debug!("following /Prev pointer to offset {}", prev_offset);
            let prev_xref = parse_xref_recursive(reader, prev_offset as u64, depth + 1)?;
            xref.merge_from(prev_xref);
        }
    }

    Ok(xref)
}

/// Parse a traditional cross-reference table.
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn parse_traditional_xref<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    reader.seek(SeekFrom::Start(offset))?;

    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    let text = String::from_utf8_lossy(&content);
    let lines = split_lines(&text);

    let mut xref = CrossRefTable::new();
    let mut line_idx = 0;

    // Find "xref" keyword, skipping leading blank lines
    while line_idx < lines.len() {
        let trimmed = lines[line_idx].trim();
        if trimmed.is_empty() {
            line_idx += 1;
            continue;
        }
        if trimmed.starts_with("xref") {
            line_idx += 1;
            break;
        }
        return Err(Error::InvalidXref);
    }

    // Parse subsections
    while line_idx < lines.len() {
        let trimmed = lines[line_idx].trim();
        line_idx += 1;

        if trimmed.starts_with("trailer") {
            break;
        }

        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        // Subsection header: "start_obj count"
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() != 2 {
            continue;
        }

        let start_obj: u32 = parts[0].parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = parts[1].parse().map_err(|_| Error::InvalidXref)?;

        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        let mut i = 0;
        while i < count && line_idx < lines.len() {
            let trimmed = lines[line_idx].trim();
            line_idx += 1;

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with("trailer") {
                log::warn!("expected {} xref entries but only found {} before trailer", count, i);
                line_idx -= 1;
                break;
            }

            // Entry: "nnnnnnnnnn ggggg f/n"; malformed entries become
            // placeholder free entries to keep object numbering aligned
            let parts: Vec<&str> = trimmed.split_whitespace().collect();

            if parts.len() < 3 {
                log::warn!("malformed xref entry at index {}: {:?}", i, trimmed);
                xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                i += 1;
                continue;
            }

            let offset: u64 = match parts[0].parse() {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("failed to parse xref offset at index {}: {:?}", i, parts[0]);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let generation: u16 = match parts[1].parse() {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("failed to parse xref generation at index {}: {:?}", i, parts[1]);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let in_use = match parts[2].to_lowercase().chars().next().unwrap_or('?') {
                'n' => true,
                'f' => false,
                _ => {
                    log::warn!("invalid xref type flag at index {}: {:?}", i, parts[2]);
                    false
                },
            };

            xref.add_entry(start_obj + i, XRefEntry::new(offset, generation, in_use));
            i += 1;
        }
    }

    Ok(xref)
}

/// Parse a cross-reference stream (PDF 1.5+).
///
/// A stream object with `/Type /XRef` whose binary payload encodes the
/// entries. `/W [w1 w2 w3]` gives the field widths; `/Index` optional
/// subsection ranges; entry types are 0=free, 1=uncompressed,
/// 2=compressed.
fn parse_xref_stream<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    use crate::lexer::token;

    reader.seek(SeekFrom::Start(offset))?;

    let mut buf_reader = BufReader::new(reader);
    let mut content = Vec::new();
    buf_reader.read_to_end(&mut content)?;

    let input = &content[..];

    // Skip the "obj_num gen obj" wrapper
    let (rest, _obj_num_token) = token(input)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref object number: {}", e)))?;
    let (rest, _gen_token) = token(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref generation: {}", e)))?;
    let (rest, obj_keyword_token) = token(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse 'obj' keyword: {}", e)))?;

    if !matches!(obj_keyword_token, crate::lexer::Token::ObjStart) {
        return Err(Error::InvalidPdf("expected 'obj' keyword in xref stream".to_string()));
    }

    let (_remaining, obj) = parse_object(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref stream object: {}", e)))?;

    let (stream_dict, stream_data) = match obj {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidPdf("xref stream is not a stream object".to_string())),
    };

    if let Some(type_name) = stream_dict.get("Type").and_then(|o| o.as_name()) {
        if type_name != "XRef" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /XRef, got /Type /{}",
                type_name
            )));
        }
    }

    let w_array = stream_dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?;

    if w_array.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array length".to_string()));
    }

    let w1 = w_array[0]
        .as_integer()
        .ok_or_else(|| Error::InvalidPdf("invalid /W[0]".to_string()))? as usize;
    let w2 = w_array[1]
        .as_integer()
        .ok_or_else(|| Error::InvalidPdf("invalid /W[1]".to_string()))? as usize;
    let w3 = w_array[2]
        .as_integer()
        .ok_or_else(|| Error::InvalidPdf("invalid /W[2]".to_string()))? as usize;

    let entry_size = w1 + w2 + w3;

    let size = stream_dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?
        as u32;

    let index_ranges = if let Some(index_obj) = stream_dict.get("Index") {
        let index_array = index_obj
            .as_array()
            .ok_or_else(|| Error::InvalidPdf("invalid /Index".to_string()))?;

        let mut ranges = Vec::new();
        for i in (0..index_array.len()).step_by(2) {
            let start = index_array[i]
                .as_integer()
                .ok_or_else(|| Error::InvalidPdf("invalid index start".to_string()))?
                as u32;
            let count = index_array[i + 1]
                .as_integer()
                .ok_or_else(|| Error::InvalidPdf("invalid index count".to_string()))?
                as u32;
            ranges.push((start, count));
        }
        ranges
    } else {
        vec![(0, size)]
    };

    // Xref streams are never encrypted, so plain decoding is safe here
    let xref_stream = Object::Stream {
        dict: stream_dict.clone(),
        data: stream_data,
    };
    let decoded_data = xref_stream.decode_stream_data()?;

    let mut xref = CrossRefTable::new();
    let mut data_pos = 0;

    for (start_obj, count) in index_ranges {
        for i in 0..count {
            if data_pos + entry_size > decoded_data.len() {
                return Err(Error::InvalidPdf("truncated xref stream data".to_string()));
            }

            let entry_data = &decoded_data[data_pos..data_pos + entry_size];
            data_pos += entry_size;

            let entry_type = if w1 > 0 {
                read_int(&entry_data[0..w1])
            } else {
                1 // default when the width is 0
            };

            let field2 = read_int(&entry_data[w1..w1 + w2]);
            let field3 = read_int(&entry_data[w1 + w2..w1 + w2 + w3]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::uncompressed(field2, field3 as u16),
                2 => XRefEntry::compressed(field2, field3 as u16),
                _ => {
                    return Err(Error::InvalidPdf(format!(
                        "invalid xref entry type: {}",
                        entry_type
                    )));
                },
            };

            xref.add_entry(start_obj + i, entry);
        }
    }

    // For xref streams, the stream dictionary serves as the trailer
    xref.set_trailer(stream_dict);

    Ok(xref)
}

/// Read a big-endian integer from a byte slice.
fn read_int(bytes: &[u8]) -> u64 {
    let mut result: u64 = 0;
    for &byte in bytes {
        result = (result << 8) | (byte as u64);
    }
    result
}

/// Split text into lines handling LF, CRLF, and bare CR.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\r' => {
                if i + 1 < chars.len() && chars[i + 1] == '\n' {
                    lines.push(current_line.clone());
                    current_line.clear();
                    i += 2;
                } else {
                    lines.push(current_line.clone());
                    current_line.clear();
                    i += 1;
                }
            },
            '\n' => {
                lines.push(current_line.clone());
                current_line.clear();
                i += 1;
            },
            ch => {
                current_line.push(ch);
                i += 1;
            },
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}
