//! Shared fixtures: small PDFs synthesised with lopdf.
#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// Description of a test PDF.
pub struct Fixture {
    pub pages: usize,
    pub media_box: [f32; 4],
    pub title: Option<String>,
    pub language: Option<String>,
    /// XObjects on page 1, in resource-dictionary order.
    pub xobjects: Vec<(String, Stream)>,
    /// Supporting objects stored under fixed ids, for XObjects to reference.
    pub objects: Vec<(ObjectId, Object)>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            pages: 1,
            media_box: [0.0, 0.0, 612.0, 792.0],
            title: None,
            language: None,
            xobjects: Vec::new(),
            objects: Vec::new(),
        }
    }
}

impl Fixture {
    pub fn with_image(stream: Stream) -> Self {
        Self {
            xobjects: vec![("Im1".to_string(), stream)],
            ..Self::default()
        }
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        for (id, object) in self.objects {
            doc.max_id = doc.max_id.max(id.0);
            doc.objects.insert(id, object);
        }
        let pages_id = doc.new_object_id();

        let mut xobjects = Dictionary::new();
        for (name, stream) in self.xobjects {
            let id = doc.add_object(stream);
            xobjects.set(name, id);
        }

        let [x0, y0, x1, y1] = self.media_box;
        let media_box: Vec<Object> = vec![x0.into(), y0.into(), x1.into(), y1.into()];
        let kids: Vec<Object> = (0..self.pages)
            .map(|i| {
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => media_box.clone(),
                };
                if i == 0 && !xobjects.is_empty() {
                    page.set("Resources", dictionary! { "XObject" => xobjects.clone() });
                }
                doc.add_object(page).into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.pages as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(lang) = self.language {
            catalog.set("Lang", Object::string_literal(lang));
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = self.title {
            let info_id = doc.add_object(dictionary! { "Title" => Object::string_literal(title) });
            doc.trailer.set("Info", info_id);
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save fixture PDF");
        buf
    }
}

/// Uncompressed 8-bit RGB image XObject filled with one colour.
pub fn rgb_image(w: u32, h: u32, rgb: [u8; 3]) -> Stream {
    let data: Vec<u8> = (0..w * h).flat_map(|_| rgb).collect();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        data,
    )
}

/// `DCTDecode` image XObject holding a real JPEG.
pub fn jpeg_image(w: u32, h: u32) -> Stream {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([20, 60, 200])));
    let mut jpeg = Vec::new();
    img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .expect("encode JPEG");
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
}

/// A form XObject (not an image).
pub fn form_xobject() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        },
        b"0 0 10 10 re f".to_vec(),
    )
}

/// One-page PDF with a single RGB image.
pub fn simple_cover_pdf() -> Vec<u8> {
    Fixture::with_image(rgb_image(4, 6, [200, 30, 30])).build()
}

// ── Output inspection ────────────────────────────────────────────────────

pub fn load(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("output PDF parses")
}

pub fn catalog(doc: &Document) -> &Dictionary {
    let id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_dictionary(id).unwrap()
}

/// Decoded text of a string object (literal or UTF-16BE).
pub fn text(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => edgequake_pdfcover::pipeline::metadata::decode_text_string(bytes),
        other => panic!("expected string, got {other:?}"),
    }
}

pub fn info_title(doc: &Document) -> String {
    let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    text(doc.get_dictionary(id).unwrap().get(b"Title").unwrap())
}

pub fn lang(doc: &Document) -> String {
    text(catalog(doc).get(b"Lang").unwrap())
}

pub fn media_box(doc: &Document) -> Vec<f32> {
    let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
    page.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_float().unwrap())
        .collect()
}

/// Number of image XObject streams in the whole document.
pub fn image_count(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|o| match o {
            Object::Stream(s) => matches!(s.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image"),
            _ => false,
        })
        .count()
}

/// `/Alt` of the single Figure structure element.
pub fn figure_alt(doc: &Document) -> String {
    let root_id = catalog(doc).get(b"StructTreeRoot").unwrap().as_reference().unwrap();
    let root = doc.get_dictionary(root_id).unwrap();
    let document = doc
        .get_dictionary(root.get(b"K").unwrap().as_reference().unwrap())
        .unwrap();
    let figure_id = document.get(b"K").unwrap().as_array().unwrap()[0]
        .as_reference()
        .unwrap();
    text(doc.get_dictionary(figure_id).unwrap().get(b"Alt").unwrap())
}

/// Operands of the `cm` operator in page 1's content.
pub fn placement(doc: &Document) -> Vec<f32> {
    let content = Content::decode(&doc.get_page_content(doc.get_pages()[&1]).unwrap()).unwrap();
    content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .expect("cm operator")
        .operands
        .iter()
        .map(|o| o.as_float().unwrap())
        .collect()
}
