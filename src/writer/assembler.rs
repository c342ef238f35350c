//! PDF document assembler.
//!
//! Collects an object graph (pages, content streams, XObjects, metadata)
//! and serializes it into a complete file: header, body, xref table, and
//! trailer with a fresh /ID. When an [`EncryptionSpec`] is supplied, every
//! object except the /Encrypt dictionary itself is encrypted during
//! serialization — which is why catalog-level metadata has to be attached
//! before [`PdfAssembler::finish`] runs.

use super::object_serializer::ObjectSerializer;
use crate::encryption::{Algorithm, EncryptDictBuilder, EncryptionWriteHandler};
use crate::error::Result;
use crate::object::{Object, ObjectRef};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::io::Write;

/// A4 page width in points.
pub const A4_WIDTH: f64 = 595.28;
/// A4 page height in points.
pub const A4_HEIGHT: f64 = 841.89;

/// Credentials for re-encrypting the output document.
#[derive(Debug, Clone)]
pub struct EncryptionSpec {
    /// User password (opens the document)
    pub user_password: String,
    /// Owner password (full permissions)
    pub owner_password: String,
}

impl EncryptionSpec {
    /// User and owner share one password, as the pipeline requires.
    pub fn with_password(password: &str) -> Self {
        Self {
            user_password: password.to_string(),
            owner_password: password.to_string(),
        }
    }
}

/// One output page.
#[derive(Debug, Clone)]
pub struct PageSpec {
    /// Page boundaries [llx, lly, urx, ury]
    pub media_box: [f64; 4],
    /// Content stream objects, drawn in order
    pub contents: Vec<ObjectRef>,
    /// Page resources (dictionary)
    pub resources: Object,
}

/// Incrementally built PDF document.
#[derive(Debug)]
pub struct PdfAssembler {
    version: (u8, u8),
    /// Object ID counter; 0 is the permanent free head
    next_obj_id: u32,
    /// Allocated objects (id -> object)
    objects: HashMap<u32, Object>,
    /// Page object references in order
    pages: Vec<ObjectRef>,
    /// Reserved id for the catalog
    catalog_id: u32,
    /// Reserved id for the page tree root
    pages_id: u32,
    /// Document information dictionary
    info: Option<Object>,
    /// Catalog-level /Metadata stream
    catalog_metadata: Option<ObjectRef>,
}

impl PdfAssembler {
    /// Create an empty assembler targeting PDF 1.7.
    pub fn new() -> Self {
        let mut assembler = Self {
            version: (1, 7),
            next_obj_id: 1,
            objects: HashMap::new(),
            pages: Vec::new(),
            catalog_id: 0,
            pages_id: 0,
            info: None,
            catalog_metadata: None,
        };
        // Catalog and page tree root get fixed low ids so pages can point
        // at their parent before the tree is final
        assembler.catalog_id = assembler.alloc_ref().id;
        assembler.pages_id = assembler.alloc_ref().id;
        assembler
    }

    /// Set the PDF version written in the header.
    pub fn set_version(&mut self, major: u8, minor: u8) {
        self.version = (major, minor);
    }

    /// Allocate a fresh object reference with no object behind it yet.
    ///
    /// The caller must eventually [`PdfAssembler::set_object`] it;
    /// unfilled ids serialize as free xref entries.
    pub fn alloc_ref(&mut self) -> ObjectRef {
        let id = self.next_obj_id;
        self.next_obj_id += 1;
        ObjectRef::new(id, 0)
    }

    /// Place an object behind a previously allocated reference.
    pub fn set_object(&mut self, obj_ref: ObjectRef, obj: Object) {
        self.objects.insert(obj_ref.id, obj);
    }

    /// Add an object, returning its new reference.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let obj_ref = self.alloc_ref();
        self.set_object(obj_ref, obj);
        obj_ref
    }

    /// Add a stream object from a dictionary and payload.
    pub fn add_stream(&mut self, dict: HashMap<String, Object>, data: Vec<u8>) -> ObjectRef {
        self.add_object(Object::Stream {
            dict,
            data: bytes::Bytes::from(data),
        })
    }

    /// Append a page built from the given spec.
    pub fn add_page(&mut self, spec: PageSpec) -> ObjectRef {
        let contents = Object::Array(spec.contents.into_iter().map(Object::Reference).collect());

        let page_obj = ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Page")),
            ("Parent", ObjectSerializer::reference(self.pages_id, 0)),
            (
                "MediaBox",
                ObjectSerializer::rect(
                    spec.media_box[0],
                    spec.media_box[1],
                    spec.media_box[2],
                    spec.media_box[3],
                ),
            ),
            ("Contents", contents),
            ("Resources", spec.resources),
        ]);

        let page_ref = self.add_object(page_obj);
        self.pages.push(page_ref);
        page_ref
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Set the document information dictionary.
    pub fn set_info(&mut self, info: Object) {
        self.info = Some(info);
    }

    /// Attach a catalog-level metadata stream (/Metadata).
    ///
    /// Must happen before [`PdfAssembler::finish`]: encryption seals the
    /// catalog at serialization time.
    pub fn set_catalog_metadata(&mut self, stream_ref: ObjectRef) {
        self.catalog_metadata = Some(stream_ref);
    }

    /// Serialize the document, optionally encrypting it.
    pub fn finish(mut self, encryption: Option<&EncryptionSpec>) -> Result<Vec<u8>> {
        // Page tree root
        let pages_obj = ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Pages")),
            (
                "Kids",
                Object::Array(self.pages.iter().copied().map(Object::Reference).collect()),
            ),
            ("Count", ObjectSerializer::integer(self.pages.len() as i64)),
        ]);
        self.objects.insert(self.pages_id, pages_obj);

        // Catalog
        let mut catalog_entries = vec![
            ("Type", ObjectSerializer::name("Catalog")),
            ("Pages", ObjectSerializer::reference(self.pages_id, 0)),
        ];
        if let Some(metadata_ref) = self.catalog_metadata {
            catalog_entries.push(("Metadata", Object::Reference(metadata_ref)));
        }
        self.objects
            .insert(self.catalog_id, ObjectSerializer::dict(catalog_entries));

        // Info dictionary
        let info_id = self.info.take().map(|info| {
            let info_ref = self.alloc_ref();
            self.objects.insert(info_ref.id, info);
            info_ref.id
        });

        let file_id = generate_file_id();

        // Encryption state; the /Encrypt dictionary stays plaintext
        let mut encrypt_id = None;
        let handler = if let Some(spec) = encryption {
            let builder = EncryptDictBuilder::new(
                Algorithm::Rc4_128,
                spec.user_password.as_bytes(),
                spec.owner_password.as_bytes(),
            );
            let (encrypt_dict, key) = builder.build(&file_id);

            let id = self.alloc_ref().id;
            self.objects.insert(id, Object::Dictionary(encrypt_dict));
            encrypt_id = Some(id);

            Some(EncryptionWriteHandler::from_key(key, Algorithm::Rc4_128))
        } else {
            None
        };

        // Body
        let serializer = ObjectSerializer::new();
        let mut output = Vec::new();

        writeln!(output, "%PDF-{}.{}", self.version.0, self.version.1)?;
        // Binary marker so transfer tools treat the file as binary
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets: HashMap<u32, usize> = HashMap::new();

        let mut ids: Vec<u32> = self.objects.keys().copied().collect();
        ids.sort_unstable();

        for id in &ids {
            let obj = &self.objects[id];
            offsets.insert(*id, output.len());

            let bytes = match (&handler, encrypt_id) {
                (Some(handler), Some(encrypt_id)) if *id != encrypt_id => {
                    serializer.serialize_indirect_encrypted(*id, 0, obj, handler)
                },
                _ => serializer.serialize_indirect(*id, 0, obj),
            };
            output.extend_from_slice(&bytes);
        }

        // Xref table: one subsection covering every allocated id;
        // unfilled ids become free entries
        let xref_start = output.len();
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", self.next_obj_id)?;
        writeln!(output, "0000000000 65535 f ")?;
        for id in 1..self.next_obj_id {
            match offsets.get(&id) {
                Some(offset) => writeln!(output, "{:010} 00000 n ", offset)?,
                None => writeln!(output, "0000000000 65535 f ")?,
            }
        }

        // Trailer
        let mut trailer_entries = vec![
            ("Size", ObjectSerializer::integer(self.next_obj_id as i64)),
            ("Root", ObjectSerializer::reference(self.catalog_id, 0)),
            (
                "ID",
                Object::Array(vec![
                    Object::String(file_id.clone()),
                    Object::String(file_id),
                ]),
            ),
        ];
        if let Some(info_id) = info_id {
            trailer_entries.push(("Info", ObjectSerializer::reference(info_id, 0)));
        }
        if let Some(encrypt_id) = encrypt_id {
            trailer_entries.push(("Encrypt", ObjectSerializer::reference(encrypt_id, 0)));
        }

        writeln!(output, "trailer")?;
        output.extend_from_slice(&serializer.serialize(&ObjectSerializer::dict(trailer_entries)));
        writeln!(output)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        write!(output, "%%EOF")?;

        Ok(output)
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh 16-byte file identifier from a hashed UUID + timestamp.
fn generate_file_id() -> Vec<u8> {
    let uuid = uuid::Uuid::new_v4();

    let mut hasher = Md5::new();
    hasher.update(uuid.as_bytes());

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    hasher.update(now.as_nanos().to_le_bytes());

    hasher.finalize().to_vec()
}

/// Flate-compress data for a content stream payload.
pub fn compress_flate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
