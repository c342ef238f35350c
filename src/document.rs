//! PDF document model.
//!
//! [`PdfDocument`] opens a file, resolves its cross-reference table, and
//! gives the compositor ordered access to pages, their inherited
//! attributes, and their decoded content streams. Encrypted documents
//! are probed transparently; content access requires a successful
//! [`PdfDocument::authenticate`] first.

use crate::encryption::EncryptionHandler;
use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Object, ObjectRef};
use crate::parser::parse_object;
use crate::xref::{CrossRefTable, XRefEntryType, find_xref_offset, parse_xref};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

/// Maximum recursion depth for object resolution and tree walks.
const MAX_RECURSION_DEPTH: usize = 100;

/// PDF document opened for reading.
pub struct PdfDocument {
    /// Entire file contents; objects are parsed lazily from slices
    data: Vec<u8>,
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Cross-reference table mapping object IDs to byte offsets
    xref: CrossRefTable,
    /// Trailer dictionary
    trailer: Object,
    /// Cache for loaded objects to avoid re-parsing
    object_cache: HashMap<ObjectRef, Object>,
    /// Objects currently being resolved (cycle detection)
    resolving: HashSet<ObjectRef>,
    /// Encryption handler (present when the trailer has /Encrypt)
    encryption_handler: Option<EncryptionHandler>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .field("encrypted", &self.encryption_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file path.
    ///
    /// Parses the header, locates the cross-reference table, reads the
    /// trailer, and initializes the encryption handler when the trailer
    /// carries /Encrypt. An empty-password authentication attempt is made
    /// automatically, which unlocks documents that use default
    /// credentials.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Open a PDF document from in-memory bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;

        let mut cursor = Cursor::new(&data);
        let xref_offset = find_xref_offset(&mut cursor)?;
        let xref = parse_xref(&mut cursor, xref_offset)?;

        let trailer = if let Some(trailer_dict) = xref.trailer() {
            // Xref stream: the stream dictionary doubles as the trailer
            Object::Dictionary(trailer_dict.clone())
        } else {
            parse_trailer(&data, xref_offset as usize)?
        };

        let mut document = Self {
            data,
            version,
            xref,
            trailer,
            object_cache: HashMap::new(),
            resolving: HashSet::new(),
            encryption_handler: None,
        };

        document.init_encryption()?;

        Ok(document)
    }

    /// PDF version as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// PDF version as the string used in XMP metadata (e.g. "1.7").
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.version.0, self.version.1)
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Object {
        &self.trailer
    }

    /// Whether the document carries a /Encrypt dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.encryption_handler.is_some()
    }

    /// Whether encrypted content is currently readable.
    ///
    /// True for unencrypted documents and for encrypted documents after a
    /// successful [`PdfDocument::authenticate`].
    pub fn is_unlocked(&self) -> bool {
        match &self.encryption_handler {
            Some(handler) => handler.is_authenticated(),
            None => true,
        }
    }

    /// Authenticate an encrypted document with the supplied password.
    ///
    /// Fails with [`Error::Auth`] when the password does not decrypt the
    /// document. Calling this on an unencrypted document is a no-op.
    pub fn authenticate(&mut self, password: &str) -> Result<()> {
        match &mut self.encryption_handler {
            Some(handler) => {
                if handler.authenticate(password.as_bytes())? {
                    Ok(())
                } else {
                    Err(Error::Auth("supplied password does not decrypt the document".to_string()))
                }
            },
            None => Ok(()),
        }
    }

    /// Set up the encryption handler from the trailer, if present.
    fn init_encryption(&mut self) -> Result<()> {
        let (encrypt_entry, file_id) = {
            let trailer_dict = match self.trailer.as_dict() {
                Some(d) => d,
                None => return Ok(()),
            };

            let encrypt_entry = match trailer_dict.get("Encrypt") {
                Some(obj) => obj.clone(),
                None => return Ok(()),
            };

            let file_id = match trailer_dict.get("ID") {
                Some(Object::Array(arr)) => arr
                    .first()
                    .and_then(|o| o.as_string())
                    .map(|b| b.to_vec())
                    .unwrap_or_default(),
                _ => {
                    log::warn!("missing or invalid /ID entry in trailer, using empty file ID");
                    vec![]
                },
            };

            (encrypt_entry, file_id)
        };

        let encrypt_obj = match encrypt_entry {
            Object::Dictionary(_) => encrypt_entry,
            Object::Reference(obj_ref) => self.load_object(obj_ref)?,
            other => {
                return Err(Error::InvalidPdf(format!(
                    "invalid /Encrypt entry type: {}",
                    other.type_name()
                )));
            },
        };

        let mut handler = EncryptionHandler::new(&encrypt_obj, file_id)?;

        // Empty password is a common default
        if handler.authenticate(b"")? {
            log::debug!("authenticated with empty password");
        }

        self.encryption_handler = Some(handler);
        Ok(())
    }

    /// Load an indirect object, resolving compressed entries through
    /// their object streams. Results are cached.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        if self.resolving.contains(&obj_ref) {
            return Err(Error::CircularReference(obj_ref));
        }

        let entry = self
            .xref
            .get(obj_ref.id)
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        if !entry.in_use {
            return Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen));
        }

        self.resolving.insert(obj_ref);

        let result = match entry.entry_type {
            XRefEntryType::Uncompressed => self.load_uncompressed_object(obj_ref, entry.offset),
            XRefEntryType::Compressed => {
                self.load_compressed_object(obj_ref, entry.offset as u32)
            },
            XRefEntryType::Free => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        };

        self.resolving.remove(&obj_ref);

        if let Ok(obj) = &result {
            self.object_cache.insert(obj_ref, obj.clone());
        }

        result
    }

    /// Load a traditional (type 1) object from its byte offset.
    fn load_uncompressed_object(&mut self, obj_ref: ObjectRef, offset: u64) -> Result<Object> {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return Err(Error::ParseError {
                offset,
                reason: "object offset past end of file".to_string(),
            });
        }

        let input = &self.data[offset..];

        // Header: "id gen obj"
        let (rest, id_tok) = token(input).map_err(|_| Error::ParseError {
            offset,
            reason: "expected object number".to_string(),
        })?;
        let (rest, gen_tok) = token(rest).map_err(|_| Error::ParseError {
            offset,
            reason: "expected generation number".to_string(),
        })?;
        let (rest, obj_tok) = token(rest).map_err(|_| Error::ParseError {
            offset,
            reason: "expected 'obj' keyword".to_string(),
        })?;

        match (&id_tok, &gen_tok, &obj_tok) {
            (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => {
                if *id as u32 != obj_ref.id || *gen as u16 != obj_ref.gen {
                    // Offsets in incrementally-updated files can be stale
                    log::warn!(
                        "object header mismatch at offset {}: expected {} {}, found {} {}",
                        offset,
                        obj_ref.id,
                        obj_ref.gen,
                        id,
                        gen
                    );
                }
            },
            _ => {
                return Err(Error::ParseError {
                    offset,
                    reason: "malformed object header".to_string(),
                });
            },
        }

        let (_remaining, obj) = parse_object(rest).map_err(|e| Error::ParseError {
            offset,
            reason: format!("failed to parse object body: {}", e),
        })?;

        Ok(obj)
    }

    /// Load a compressed (type 2) object out of its object stream.
    fn load_compressed_object(&mut self, obj_ref: ObjectRef, stream_obj_num: u32) -> Result<Object> {
        let stream_ref = ObjectRef::new(stream_obj_num, 0);
        let stream_obj = self.load_object(stream_ref)?;

        let objects = if let Some(handler) = &self.encryption_handler {
            let decrypt_fn = |data: &[u8]| -> Result<Vec<u8>> {
                handler.decrypt_stream(data, stream_ref.id, stream_ref.gen as u32)
            };
            crate::objstm::parse_object_stream_with_decryption(
                &stream_obj,
                Some(&decrypt_fn),
                stream_ref.id,
                stream_ref.gen as u32,
            )?
        } else {
            crate::objstm::parse_object_stream(&stream_obj)?
        };

        // Cache siblings from the same stream while they are hot
        for (num, obj) in &objects {
            self.object_cache
                .insert(ObjectRef::new(*num, 0), obj.clone());
        }

        objects
            .get(&obj_ref.id)
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Resolve an object one level: references are loaded, everything
    /// else is returned as-is.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(obj_ref) => self.load_object(*obj_ref),
            other => Ok(other.clone()),
        }
    }

    /// The document catalog (/Root).
    pub fn catalog(&mut self) -> Result<Object> {
        let root_ref = self
            .trailer
            .as_dict()
            .and_then(|d| d.get("Root"))
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer missing /Root reference".to_string()))?;
        self.load_object(root_ref)
    }

    /// Authoritative page count: the page tree's /Count, falling back to
    /// a recursive scan when the entry is missing or malformed.
    pub fn page_count(&mut self) -> Result<usize> {
        let pages_ref = self.pages_root_ref()?;
        let pages_obj = self.load_object(pages_ref)?;

        if let Some(count) = pages_obj
            .as_dict()
            .and_then(|d| d.get("Count"))
            .and_then(|o| o.as_integer())
        {
            return Ok(count as usize);
        }

        log::warn!("page tree missing /Count, falling back to scanning");
        Ok(self.collect_page_refs()?.len())
    }

    /// Object references of every page, in document order.
    pub fn collect_page_refs(&mut self) -> Result<Vec<ObjectRef>> {
        let pages_ref = self.pages_root_ref()?;
        let mut refs = Vec::new();
        self.walk_page_tree(pages_ref, &mut refs, 0)?;
        Ok(refs)
    }

    fn pages_root_ref(&mut self) -> Result<ObjectRef> {
        let catalog = self.catalog()?;
        catalog
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog missing /Pages reference".to_string()))
    }

    fn walk_page_tree(
        &mut self,
        node_ref: ObjectRef,
        refs: &mut Vec<ObjectRef>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_RECURSION_DEPTH {
            log::warn!("page tree deeper than {} levels, stopping", MAX_RECURSION_DEPTH);
            return Ok(());
        }

        let node = self.load_object(node_ref)?;
        let node_dict = node
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf(format!("page tree node {} is not a dictionary", node_ref)))?;

        match node_dict.get("Type").and_then(|o| o.as_name()) {
            Some("Page") => {
                refs.push(node_ref);
                Ok(())
            },
            Some("Pages") => {
                let kids: Vec<ObjectRef> = node_dict
                    .get("Kids")
                    .and_then(|o| o.as_array())
                    .map(|arr| arr.iter().filter_map(|k| k.as_reference()).collect())
                    .unwrap_or_default();

                for kid_ref in kids {
                    match self.walk_page_tree(kid_ref, refs, depth + 1) {
                        Ok(()) => {},
                        Err(Error::CircularReference(r)) => {
                            log::warn!("circular reference in page tree at {}, skipping", r);
                        },
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            },
            other => {
                log::warn!("unknown page tree node type: {:?}", other);
                Ok(())
            },
        }
    }

    /// Look up a page attribute, following the /Parent chain for
    /// inheritable entries (MediaBox, Resources, Rotate).
    pub fn page_attribute(&mut self, page_ref: ObjectRef, key: &str) -> Result<Option<Object>> {
        let mut current = page_ref;

        for _ in 0..MAX_RECURSION_DEPTH {
            let node = self.load_object(current)?;
            let dict = match node.as_dict() {
                Some(d) => d,
                None => return Ok(None),
            };

            if let Some(value) = dict.get(key) {
                let resolved = self.resolve(&value.clone())?;
                return Ok(Some(resolved));
            }

            match dict.get("Parent").and_then(|o| o.as_reference()) {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }

        Err(Error::RecursionLimitExceeded(MAX_RECURSION_DEPTH as u32))
    }

    /// The page's MediaBox as [llx, lly, urx, ury], defaulting to A4 when
    /// the chain carries none.
    pub fn page_media_box(&mut self, page_ref: ObjectRef) -> Result<[f64; 4]> {
        if let Some(obj) = self.page_attribute(page_ref, "MediaBox")? {
            if let Some(arr) = obj.as_array() {
                if arr.len() == 4 {
                    let mut media_box = [0.0f64; 4];
                    for (i, val) in arr.iter().enumerate() {
                        let resolved = self.resolve(val)?;
                        media_box[i] = resolved.as_number().ok_or_else(|| {
                            Error::InvalidPdf("non-numeric MediaBox entry".to_string())
                        })?;
                    }
                    return Ok(media_box);
                }
            }
            return Err(Error::InvalidPdf("malformed /MediaBox".to_string()));
        }

        log::warn!("page {} has no MediaBox in its chain, assuming A4", page_ref);
        Ok([0.0, 0.0, 595.28, 841.89])
    }

    /// Decode (decrypt + decompress) the full content of a page.
    ///
    /// /Contents may be a single stream or an array of streams; parts are
    /// concatenated with newline separators, which is how consumers are
    /// required to treat them anyway.
    pub fn page_content(&mut self, page_ref: ObjectRef) -> Result<Vec<u8>> {
        let page = self.load_object(page_ref)?;
        let contents = match page.as_dict().and_then(|d| d.get("Contents")) {
            Some(obj) => obj.clone(),
            None => return Ok(Vec::new()),
        };

        let mut stream_refs: Vec<ObjectRef> = Vec::new();
        match &contents {
            Object::Reference(r) => {
                // May point at a stream or at an array of streams
                let resolved = self.load_object(*r)?;
                match resolved {
                    Object::Array(arr) => {
                        stream_refs.extend(arr.iter().filter_map(|o| o.as_reference()));
                    },
                    Object::Stream { .. } => stream_refs.push(*r),
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Stream or Array".to_string(),
                            found: other.type_name().to_string(),
                        });
                    },
                }
            },
            Object::Array(arr) => {
                stream_refs.extend(arr.iter().filter_map(|o| o.as_reference()));
            },
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream reference or Array".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        }

        let mut content = Vec::new();
        for stream_ref in stream_refs {
            let stream_obj = self.load_object(stream_ref)?;
            let part = self.decode_stream(&stream_obj, stream_ref)?;
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&part);
        }

        Ok(content)
    }

    /// Decode a stream object, decrypting first when the document is
    /// encrypted (7.6.2: decryption precedes filters).
    pub fn decode_stream(&self, stream_obj: &Object, obj_ref: ObjectRef) -> Result<Vec<u8>> {
        if let Some(handler) = &self.encryption_handler {
            let decrypt_fn = |data: &[u8]| -> Result<Vec<u8>> {
                handler.decrypt_stream(data, obj_ref.id, obj_ref.gen as u32)
            };
            stream_obj.decode_stream_data_with_decryption(
                Some(&decrypt_fn),
                obj_ref.id,
                obj_ref.gen as u32,
            )
        } else {
            stream_obj.decode_stream_data()
        }
    }

    /// Decrypt the raw payload of a stream without applying its filters.
    ///
    /// Used when copying streams verbatim out of an encrypted source:
    /// the filters stay declared in the dictionary and the bytes become
    /// plaintext-compressed again.
    pub fn decrypt_stream_payload(&self, data: &[u8], obj_ref: ObjectRef) -> Result<Vec<u8>> {
        match &self.encryption_handler {
            Some(handler) => handler.decrypt_stream(data, obj_ref.id, obj_ref.gen as u32),
            None => Ok(data.to_vec()),
        }
    }

    /// Decrypt every string inside `obj`, which was loaded from
    /// `obj_ref`. No-op for unencrypted documents.
    pub fn decrypt_strings(&self, obj: &Object, obj_ref: ObjectRef) -> Result<Object> {
        let handler = match &self.encryption_handler {
            Some(h) => h,
            None => return Ok(obj.clone()),
        };

        fn walk(
            obj: &Object,
            handler: &EncryptionHandler,
            obj_ref: ObjectRef,
        ) -> Result<Object> {
            Ok(match obj {
                Object::String(s) => Object::String(handler.decrypt_string(
                    s,
                    obj_ref.id,
                    obj_ref.gen as u32,
                )?),
                Object::Array(arr) => Object::Array(
                    arr.iter()
                        .map(|o| walk(o, handler, obj_ref))
                        .collect::<Result<Vec<_>>>()?,
                ),
                Object::Dictionary(dict) => {
                    let mut out = HashMap::new();
                    for (k, v) in dict {
                        out.insert(k.clone(), walk(v, handler, obj_ref)?);
                    }
                    Object::Dictionary(out)
                },
                Object::Stream { dict, data } => {
                    // Payload decryption is separate; only dictionary
                    // strings are handled here
                    let mut out = HashMap::new();
                    for (k, v) in dict {
                        out.insert(k.clone(), walk(v, handler, obj_ref)?);
                    }
                    Object::Stream {
                        dict: out,
                        data: data.clone(),
                    }
                },
                other => other.clone(),
            })
        }

        walk(obj, handler, obj_ref)
    }

    /// The document information dictionary with strings decrypted, if the
    /// trailer carries one.
    pub fn info(&mut self) -> Result<Option<Object>> {
        let info_ref = match self
            .trailer
            .as_dict()
            .and_then(|d| d.get("Info"))
            .and_then(|o| o.as_reference())
        {
            Some(r) => r,
            None => return Ok(None),
        };

        let info = match self.load_object(info_ref) {
            Ok(obj) => obj,
            Err(e) => {
                log::warn!("failed to load /Info dictionary: {}", e);
                return Ok(None);
            },
        };

        Ok(Some(self.decrypt_strings(&info, info_ref)?))
    }
}

/// Result of a read-only document probe.
#[derive(Debug, Clone, Copy)]
pub struct InspectReport {
    /// Whether the document carries a /Encrypt dictionary
    pub encrypted: bool,
    /// PDF version (major, minor)
    pub version: (u8, u8),
}

/// Probe a PDF without modifying it: open it, verify it is well-formed,
/// and report whether it is access-controlled. The verdict selects the
/// compositor strategy.
pub fn inspect(path: impl AsRef<Path>) -> Result<InspectReport> {
    let doc = PdfDocument::open(path)?;
    Ok(InspectReport {
        encrypted: doc.is_encrypted(),
        version: doc.version(),
    })
}

/// Parse the PDF header and extract the version.
///
/// The header must appear within the first 1KB (some files carry
/// preamble junk before it).
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            let prefix = String::from_utf8_lossy(&data[..data.len().min(8)]).to_string();
            Error::InvalidHeader(prefix)
        })?;

    let rest = &window[pos + 5..];
    let line_end = rest
        .iter()
        .position(|&c| c == b'\r' || c == b'\n')
        .unwrap_or(rest.len());
    let version_str = String::from_utf8_lossy(&rest[..line_end]);

    let mut parts = version_str.trim().split('.');
    let major: u8 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::InvalidHeader(version_str.to_string()))?;
    let minor: u8 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::InvalidHeader(version_str.to_string()))?;

    Ok((major, minor))
}

/// Parse the trailer dictionary following a traditional xref section.
fn parse_trailer(data: &[u8], xref_offset: usize) -> Result<Object> {
    let section = &data[xref_offset.min(data.len())..];
    let pos = section
        .windows(7)
        .position(|w| w == b"trailer")
        .ok_or_else(|| Error::InvalidPdf("trailer keyword not found".to_string()))?;

    let (_, obj) = parse_object(&section[pos + 7..]).map_err(|e| Error::ParseError {
        offset: xref_offset + pos,
        reason: format!("failed to parse trailer dictionary: {}", e),
    })?;

    if obj.as_dict().is_none() {
        return Err(Error::InvalidPdf("trailer is not a dictionary".to_string()));
    }

    Ok(obj)
}
