//! Cover assembly: write a single-page, tagged PDF/UA-1 document.
//!
//! [`AccessibleDocumentBuilder`] produces only the minimal structure a
//! one-figure document needs:
//!
//! ```text
//! Catalog ─┬─ /Lang, /MarkInfo, /ViewerPreferences, /Metadata (XMP)
//!          ├─ /Pages ── Page ── /Resources /XObject /Im0 ── (copied image)
//!          └─ /StructTreeRoot ── Document ── Figure (/Alt, /Pg, /K 0)
//!                    └─ /ParentTree  { 0 → [Figure] }
//! ```
//!
//! The page content wraps the image paint in a `/Figure` marked-content
//! sequence with MCID 0, which is what ties the pixels to the `Figure`
//! element and its alt text.
//!
//! The image is imported by deep copy. Every object reachable from the image
//! stream (soft mask, ICC profile, decode parameters) gets a fresh id in the
//! new document, so the output never refers back into the source.

use super::locate::ExtractedImage;
use super::metadata::encode_text_string;
use crate::error::CoverError;
use crate::output::PageGeometry;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use tracing::debug;

/// Resource name of the cover image on the output page.
pub const IMAGE_RESOURCE: &str = "Im0";

const PRODUCER: &str = concat!("edgequake-pdfcover ", env!("CARGO_PKG_VERSION"));

struct PlacedImage {
    id: ObjectId,
    alt_text: String,
}

/// Builds one accessible cover document.
///
/// Call order: [`new`](Self::new) → [`add_page`](Self::add_page) →
/// [`place_described_image`](Self::place_described_image) →
/// [`save_to_vec`](Self::save_to_vec). Each step may happen once.
pub struct AccessibleDocumentBuilder {
    doc: Document,
    title: String,
    language: String,
    page: Option<PageGeometry>,
    image: Option<PlacedImage>,
}

impl AccessibleDocumentBuilder {
    /// Start a PDF 1.7 document with the given title and language tag.
    pub fn new(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            doc: Document::with_version("1.7"),
            title: title.into(),
            language: language.into(),
            page: None,
            image: None,
        }
    }

    /// Add the single page.
    pub fn add_page(&mut self, geometry: PageGeometry) -> Result<(), CoverError> {
        if self.page.is_some() {
            return Err(CoverError::Internal("cover document already has a page".into()));
        }
        if !(geometry.width > 0.0 && geometry.height > 0.0) {
            return Err(CoverError::Internal(format!(
                "invalid page size {} x {}",
                geometry.width, geometry.height
            )));
        }
        self.page = Some(geometry);
        Ok(())
    }

    /// Copy `image` out of `source` and attach `alt_text` to it.
    ///
    /// The image fills the page from the origin, scaled independently on
    /// each axis.
    pub fn place_described_image(
        &mut self,
        source: &Document,
        image: &ExtractedImage,
        alt_text: &str,
    ) -> Result<(), CoverError> {
        if self.page.is_none() {
            return Err(CoverError::Internal("add a page before placing the image".into()));
        }
        if self.image.is_some() {
            return Err(CoverError::Internal("cover document already has an image".into()));
        }
        let alt_text = alt_text.trim();
        if alt_text.is_empty() {
            return Err(CoverError::InvalidConfig("alt text must not be empty".into()));
        }

        let mut copier = ObjectCopier::new(source, &mut self.doc);
        let id = copier.copy_image(image);
        debug!(
            "Imported image {:?} as {:?} ({} objects copied)",
            image.object_id,
            id,
            copier.copied()
        );

        self.image = Some(PlacedImage {
            id,
            alt_text: alt_text.to_string(),
        });
        Ok(())
    }

    /// Finish the object graph and serialise the document.
    pub fn save_to_vec(mut self) -> Result<Vec<u8>, CoverError> {
        let geometry = self
            .page
            .ok_or_else(|| CoverError::Internal("cover document has no page".into()))?;
        let image = self
            .image
            .take()
            .ok_or_else(|| CoverError::Internal("cover document has no image".into()))?;
        let PageGeometry { width, height } = geometry;
        let doc = &mut self.doc;

        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();
        let struct_root_id = doc.new_object_id();
        let document_elem_id = doc.new_object_id();
        let figure_id = doc.new_object_id();

        // ── Page ──────────────────────────────────────────────────────────
        let content = figure_content(width, height)?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => rect(width, height),
                "Resources" => dictionary! {
                    "XObject" => dictionary! { IMAGE_RESOURCE => image.id },
                },
                "Contents" => content_id,
                "Tabs" => "S",
                "StructParents" => 0,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1,
            }),
        );

        // ── Structure tree ────────────────────────────────────────────────
        doc.objects.insert(
            figure_id,
            Object::Dictionary(dictionary! {
                "Type" => "StructElem",
                "S" => "Figure",
                "P" => document_elem_id,
                "Pg" => page_id,
                "K" => 0,
                "Alt" => encode_text_string(&image.alt_text),
                "A" => dictionary! {
                    "O" => "Layout",
                    "BBox" => rect(width, height),
                },
            }),
        );
        doc.objects.insert(
            document_elem_id,
            Object::Dictionary(dictionary! {
                "Type" => "StructElem",
                "S" => "Document",
                "P" => struct_root_id,
                "K" => vec![Object::from(figure_id)],
            }),
        );
        doc.objects.insert(
            struct_root_id,
            Object::Dictionary(dictionary! {
                "Type" => "StructTreeRoot",
                "K" => document_elem_id,
                "ParentTree" => dictionary! {
                    "Nums" => vec![0.into(), Object::Array(vec![figure_id.into()])],
                },
                "ParentTreeNextKey" => 1,
            }),
        );

        // ── Catalog, XMP, Info ────────────────────────────────────────────
        let xmp = xmp_packet(&self.title, &self.language);
        let metadata_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "Metadata",
                "Subtype" => "XML",
            },
            xmp.into_bytes(),
        ));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Lang" => encode_text_string(&self.language),
            "MarkInfo" => dictionary! { "Marked" => true },
            "StructTreeRoot" => struct_root_id,
            "ViewerPreferences" => dictionary! { "DisplayDocTitle" => true },
            "Metadata" => metadata_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => encode_text_string(&self.title),
            "Producer" => Object::string_literal(PRODUCER),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| CoverError::PdfWrite(e.to_string()))?;
        debug!("Serialised cover: {} bytes, {} objects", buf.len(), doc.objects.len());
        Ok(buf)
    }
}

fn rect(width: f32, height: f32) -> Vec<Object> {
    vec![0.into(), 0.into(), width.into(), height.into()]
}

/// `/Figure <</MCID 0>> BDC q w 0 0 h 0 0 cm /Im0 Do Q EMC`
fn figure_content(width: f32, height: f32) -> Result<Vec<u8>, CoverError> {
    let content = Content {
        operations: vec![
            Operation::new(
                "BDC",
                vec!["Figure".into(), dictionary! { "MCID" => 0 }.into()],
            ),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
            Operation::new("Q", vec![]),
            Operation::new("EMC", vec![]),
        ],
    };
    content
        .encode()
        .map_err(|e| CoverError::PdfWrite(format!("content stream: {e}")))
}

/// XMP packet declaring title, language and PDF/UA-1 conformance.
fn xmp_packet(title: &str, language: &str) -> String {
    let title = xml_escape(title);
    let language = xml_escape(language);
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about=""
  xmlns:dc="http://purl.org/dc/elements/1.1/"
  xmlns:pdf="http://ns.adobe.com/pdf/1.3/"
  xmlns:pdfuaid="http://www.aiim.org/pdfua/ns/id/">
<dc:title><rdf:Alt><rdf:li xml:lang="x-default">{title}</rdf:li></rdf:Alt></dc:title>
<dc:language><rdf:Bag><rdf:li>{language}</rdf:li></rdf:Bag></dc:language>
<pdf:Producer>{PRODUCER}</pdf:Producer>
<pdfuaid:part>1</pdfuaid:part>
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Deep copy ────────────────────────────────────────────────────────────

/// Copies objects from one document into another, renumbering as it goes.
///
/// Ids are mapped before recursing, so reference cycles terminate.
struct ObjectCopier<'s, 't> {
    source: &'s Document,
    target: &'t mut Document,
    ids: BTreeMap<ObjectId, ObjectId>,
}

impl<'s, 't> ObjectCopier<'s, 't> {
    fn new(source: &'s Document, target: &'t mut Document) -> Self {
        Self {
            source,
            target,
            ids: BTreeMap::new(),
        }
    }

    fn copied(&self) -> usize {
        self.ids.len()
    }

    /// Copy the extracted image stream and everything it references.
    fn copy_image(&mut self, image: &ExtractedImage) -> ObjectId {
        let new_id = self.target.new_object_id();
        self.ids.insert(image.object_id, new_id);
        let stream = self.copy_stream(&image.stream);
        self.target.objects.insert(new_id, Object::Stream(stream));
        new_id
    }

    fn copy_ref(&mut self, id: ObjectId) -> ObjectId {
        if let Some(mapped) = self.ids.get(&id) {
            return *mapped;
        }
        let new_id = self.target.new_object_id();
        self.ids.insert(id, new_id);

        let source = self.source;
        let copied = match source.get_object(id) {
            Ok(obj) => self.copy_object(obj),
            Err(_) => Object::Null,
        };
        self.target.objects.insert(new_id, copied);
        new_id
    }

    fn copy_object(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.copy_ref(*id)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|o| self.copy_object(o)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Stream(stream) => Object::Stream(self.copy_stream(stream)),
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            out.set(key.clone(), self.copy_object(value));
        }
        out
    }

    /// Copy a stream verbatim (still encoded), fixing `/Length`.
    fn copy_stream(&mut self, stream: &Stream) -> Stream {
        let dict = self.copy_dict(&stream.dict);
        Stream::new(dict, stream.content.clone())
    }
}
