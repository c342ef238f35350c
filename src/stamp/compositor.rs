//! Page composition.
//!
//! Two strategies share one stamp-placement contract:
//!
//! - **Template import** (unprotected sources): each source page becomes
//!   an opaque Form XObject — decoded content plus its deep-copied
//!   resource closure — placed on a fresh A4 output page at native scale,
//!   with the overlay drawn on top.
//! - **Reconstruction** (protected sources): the source is decrypted and
//!   each page re-emitted as a new page object with the same MediaBox,
//!   its decoded content, and the overlay appended to its content list.
//!
//! The overlay itself — token images, the badge, and the content stream
//! that draws them at the planned positions — is installed once per
//! document and shared by every page, so placement is identical across
//! pages by construction.

use super::{BADGE_INSET, BADGE_SIZE, StampPlan, TOKEN_FOOTPRINT};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::{
    A4_HEIGHT, A4_WIDTH, ContentStreamBuilder, ImageData, PageSpec, PdfAssembler, compress_flate,
};
use std::collections::HashMap;
use std::path::Path;

/// Depth limit for deep-copying resource closures.
const MAX_IMPORT_DEPTH: usize = 64;

/// A composed document awaiting metadata embedding and serialization.
#[derive(Debug)]
pub struct StampedDocument {
    pub(crate) assembler: PdfAssembler,
    pub(crate) encrypted: bool,
    pub(crate) source_info: Option<Object>,
    pub(crate) source_version: String,
}

impl StampedDocument {
    /// Number of composed pages.
    pub fn page_count(&self) -> usize {
        self.assembler.page_count()
    }

    /// Whether the output will be re-encrypted at serialization.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

/// The per-document overlay: token and badge XObjects plus the shared
/// content stream drawing them.
struct Overlay {
    /// Content stream drawing every position; shared by all pages
    stream_ref: ObjectRef,
    /// XObject resource entries (name, image object)
    xobjects: Vec<(String, ObjectRef)>,
}

impl Overlay {
    /// Load the plan's token images and the badge into the assembler and
    /// build the shared overlay stream.
    fn install(assembler: &mut PdfAssembler, plan: &StampPlan, badge_path: &Path) -> Result<Self> {
        let mut xobjects = Vec::new();
        let mut ops = ContentStreamBuilder::new();

        for (i, position) in plan.positions().iter().enumerate() {
            let name = format!("SealQR{}", i);

            let image = ImageData::from_file(&position.token.image_path)?;
            let smask_ref = image
                .soft_mask_stream()
                .map(|stream| assembler.add_object(stream));
            let image_ref = assembler.add_object(image.to_stream(smask_ref));

            ops.place_xobject(&name, position.x, position.y, TOKEN_FOOTPRINT, TOKEN_FOOTPRINT);
            ops.place_xobject(
                "SealBadge",
                position.x + BADGE_INSET,
                position.y + BADGE_INSET,
                BADGE_SIZE,
                BADGE_SIZE,
            );

            xobjects.push((name, image_ref));
        }

        let badge = ImageData::from_file(badge_path)?;
        let badge_smask = badge
            .soft_mask_stream()
            .map(|stream| assembler.add_object(stream));
        let badge_ref = assembler.add_object(badge.to_stream(badge_smask));
        xobjects.push(("SealBadge".to_string(), badge_ref));

        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let stream_ref = assembler.add_stream(dict, compress_flate(&ops.build())?);

        Ok(Self {
            stream_ref,
            xobjects,
        })
    }

    /// The overlay's XObject entries as dictionary pairs.
    fn xobject_entries(&self) -> impl Iterator<Item = (String, Object)> + '_ {
        self.xobjects
            .iter()
            .map(|(name, r)| (name.clone(), Object::Reference(*r)))
    }
}

/// Compose an unprotected source by template import.
///
/// The output has exactly the source's page count; every page is a fresh
/// A4 page carrying the imported template at native scale plus the full
/// overlay.
pub fn compose_unprotected(
    source_path: &Path,
    plan: &StampPlan,
    badge_path: &Path,
) -> Result<StampedDocument> {
    let mut src = PdfDocument::open(source_path)?;
    if src.is_encrypted() && !src.is_unlocked() {
        return Err(Error::Auth(
            "source is password-protected; it must be composed by reconstruction".to_string(),
        ));
    }

    let count = src.page_count()?;
    let page_refs = src.collect_page_refs()?;

    let mut assembler = PdfAssembler::new();
    let overlay = Overlay::install(&mut assembler, plan, badge_path)?;
    let mut map = HashMap::new();

    // Enumeration is driven by the explicit page count: importing past
    // the last page yields the typed out-of-range result, and only that
    // result ends the loop. Any other import failure is fatal for this
    // file.
    let mut index = 1;
    loop {
        let template_ref = match import_page_template(
            &mut src,
            &page_refs,
            index,
            count,
            &mut assembler,
            &mut map,
        ) {
            Ok(template_ref) => template_ref,
            Err(e) if e.is_page_out_of_range() => break,
            Err(e) => return Err(e),
        };

        let template_name = format!("Pg{}", index - 1);
        let mut ops = ContentStreamBuilder::new();
        ops.save_state()
            .transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
            .draw_xobject(&template_name)
            .restore_state();

        let mut stream_dict = HashMap::new();
        stream_dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let page_stream = assembler.add_stream(stream_dict, compress_flate(&ops.build())?);

        let mut xobject_dict: HashMap<String, Object> = overlay.xobject_entries().collect();
        xobject_dict.insert(template_name, Object::Reference(template_ref));

        let mut resources = HashMap::new();
        resources.insert("XObject".to_string(), Object::Dictionary(xobject_dict));

        assembler.add_page(PageSpec {
            media_box: [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
            contents: vec![page_stream, overlay.stream_ref],
            resources: Object::Dictionary(resources),
        });

        index += 1;
    }

    Ok(StampedDocument {
        assembler,
        encrypted: false,
        source_info: None,
        source_version: src.version_string(),
    })
}

/// Compose a password-protected source by reconstruction.
///
/// Fails with [`Error::Auth`] when the password does not decrypt the
/// source. Pages are re-emitted (decoded content, copied resources, same
/// MediaBox) rather than imported as templates; the overlay contract is
/// identical to the unprotected strategy.
pub fn compose_protected(
    source_path: &Path,
    password: &str,
    plan: &StampPlan,
    badge_path: &Path,
) -> Result<StampedDocument> {
    let mut src = PdfDocument::open(source_path)?;
    src.authenticate(password)?;

    let count = src.page_count()?;
    let page_refs = src.collect_page_refs()?;
    if page_refs.len() < count {
        return Err(Error::InvalidPdf(format!(
            "page tree has {} pages but /Count claims {}",
            page_refs.len(),
            count
        )));
    }

    let source_info = src.info()?;
    let source_version = src.version_string();

    let mut assembler = PdfAssembler::new();
    let overlay = Overlay::install(&mut assembler, plan, badge_path)?;
    let mut map = HashMap::new();

    for index in 1..=count {
        let page_ref = page_refs[index - 1];

        let media_box = src.page_media_box(page_ref)?;
        let content = src.page_content(page_ref)?;

        let resources = resolved_resources(&mut src, page_ref)?;
        let imported = import_value(&mut src, &mut assembler, &mut map, &resources, 0)?;
        let mut resources_dict = match imported {
            Object::Dictionary(d) => d,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        };

        // Merge the overlay names into the page's XObject resources
        let mut xobject_dict = match resources_dict.remove("XObject") {
            Some(Object::Dictionary(d)) => d,
            Some(other) => {
                log::warn!(
                    "page {} /XObject resource is {}, replacing with overlay-only dictionary",
                    page_ref,
                    other.type_name()
                );
                HashMap::new()
            },
            None => HashMap::new(),
        };
        xobject_dict.extend(overlay.xobject_entries());
        resources_dict.insert("XObject".to_string(), Object::Dictionary(xobject_dict));

        let mut stream_dict = HashMap::new();
        stream_dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let content_ref = assembler.add_stream(stream_dict, compress_flate(&content)?);

        assembler.add_page(PageSpec {
            media_box,
            contents: vec![content_ref, overlay.stream_ref],
            resources: Object::Dictionary(resources_dict),
        });
    }

    Ok(StampedDocument {
        assembler,
        encrypted: true,
        source_info,
        source_version,
    })
}

/// Import page `index` (1-based) as an opaque Form XObject template.
///
/// Returns the typed out-of-range result when `index` is past the
/// document's authoritative page count — the expected end-of-enumeration
/// signal, never a corruption error.
fn import_page_template(
    src: &mut PdfDocument,
    page_refs: &[ObjectRef],
    index: usize,
    count: usize,
    dst: &mut PdfAssembler,
    map: &mut HashMap<ObjectRef, ObjectRef>,
) -> Result<ObjectRef> {
    if index > count || index > page_refs.len() {
        return Err(Error::PageOutOfRange {
            requested: index,
            count,
        });
    }

    let page_ref = page_refs[index - 1];
    let media_box = src.page_media_box(page_ref)?;
    let content = src.page_content(page_ref)?;

    let resources = src
        .page_attribute(page_ref, "Resources")?
        .unwrap_or_else(|| Object::Dictionary(HashMap::new()));
    let resources = import_value(src, dst, map, &resources, 0)?;

    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
    dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
    dict.insert("FormType".to_string(), Object::Integer(1));
    dict.insert(
        "BBox".to_string(),
        Object::Array(media_box.iter().map(|&v| Object::Real(v)).collect()),
    );
    dict.insert("Resources".to_string(), resources);
    dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));

    Ok(dst.add_stream(dict, compress_flate(&content)?))
}

/// The page's resources with the /XObject entry resolved inline, so the
/// overlay names can be merged without chasing a shared reference.
fn resolved_resources(src: &mut PdfDocument, page_ref: ObjectRef) -> Result<Object> {
    let resources = src
        .page_attribute(page_ref, "Resources")?
        .unwrap_or_else(|| Object::Dictionary(HashMap::new()));

    let mut dict = match resources {
        Object::Dictionary(d) => d,
        other => {
            log::warn!(
                "page {} resources is {}, treating as empty",
                page_ref,
                other.type_name()
            );
            HashMap::new()
        },
    };

    if let Some(xobject) = dict.get("XObject").cloned() {
        let resolved = src.resolve(&xobject)?;
        dict.insert("XObject".to_string(), resolved);
    }

    Ok(Object::Dictionary(dict))
}

/// Copy a referenced object and its closure from the source document
/// into the assembler, remapping object numbers.
///
/// Strings and stream payloads are decrypted on the way through when the
/// source is encrypted; the rebuilt document re-encrypts them freshly if
/// required. Stale /Length entries are dropped so the serializer
/// re-derives them.
fn import_ref(
    src: &mut PdfDocument,
    dst: &mut PdfAssembler,
    map: &mut HashMap<ObjectRef, ObjectRef>,
    r: ObjectRef,
    depth: usize,
) -> Result<ObjectRef> {
    if let Some(mapped) = map.get(&r) {
        return Ok(*mapped);
    }
    if depth > MAX_IMPORT_DEPTH {
        return Err(Error::RecursionLimitExceeded(MAX_IMPORT_DEPTH as u32));
    }

    // Map before recursing so cycles (Parent pointers and the like)
    // terminate
    let new_ref = dst.alloc_ref();
    map.insert(r, new_ref);

    let loaded = src.load_object(r)?;
    let loaded = src.decrypt_strings(&loaded, r)?;

    let copied = match &loaded {
        Object::Stream { dict, data } => {
            let payload = src.decrypt_stream_payload(data, r)?;

            let imported = import_value(src, dst, map, &Object::Dictionary(dict.clone()), depth + 1)?;
            let mut new_dict = match imported {
                Object::Dictionary(d) => d,
                _ => HashMap::new(),
            };
            new_dict.remove("Length");

            Object::Stream {
                dict: new_dict,
                data: bytes::Bytes::from(payload),
            }
        },
        other => import_value(src, dst, map, other, depth + 1)?,
    };

    dst.set_object(new_ref, copied);
    Ok(new_ref)
}

/// Copy an object value, remapping any references it contains.
fn import_value(
    src: &mut PdfDocument,
    dst: &mut PdfAssembler,
    map: &mut HashMap<ObjectRef, ObjectRef>,
    obj: &Object,
    depth: usize,
) -> Result<Object> {
    if depth > MAX_IMPORT_DEPTH {
        return Err(Error::RecursionLimitExceeded(MAX_IMPORT_DEPTH as u32));
    }

    match obj {
        Object::Reference(r) => Ok(Object::Reference(import_ref(src, dst, map, *r, depth)?)),
        Object::Array(arr) => {
            let imported: Result<Vec<Object>> = arr
                .iter()
                .map(|item| import_value(src, dst, map, item, depth + 1))
                .collect();
            Ok(Object::Array(imported?))
        },
        Object::Dictionary(dict) => {
            let mut imported = HashMap::new();
            for (key, value) in dict {
                imported.insert(key.clone(), import_value(src, dst, map, value, depth + 1)?);
            }
            Ok(Object::Dictionary(imported))
        },
        Object::Stream { dict, data } => {
            // Streams are normally indirect; a direct one copies through
            let imported = import_value(src, dst, map, &Object::Dictionary(dict.clone()), depth + 1)?;
            let new_dict = match imported {
                Object::Dictionary(d) => d,
                _ => HashMap::new(),
            };
            Ok(Object::Stream {
                dict: new_dict,
                data: data.clone(),
            })
        },
        other => Ok(other.clone()),
    }
}
