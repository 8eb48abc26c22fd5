//! Document metadata: title from `/Info`, language from the catalog's `/Lang`.
//!
//! Both are PDF "text strings", which may be UTF-16BE (with a BOM), UTF-8
//! (PDF 2.0, with a BOM) or PDFDocEncoding. We decode all three; for the
//! last one Latin-1 is close enough for titles and language tags.

use super::input::SourceDocument;
use crate::output::DocumentMetadata;
use lopdf::{Object, StringFormat};

/// Read title, language and page count. Never fails on an opened document.
pub fn read_metadata(source: &SourceDocument) -> DocumentMetadata {
    DocumentMetadata {
        title: title(source),
        language: language(source),
        page_count: source.page_count(),
        pdf_version: source.document().version.clone(),
    }
}

/// Document title from the trailer's `/Info` dictionary. Blank is `None`.
pub fn title(source: &SourceDocument) -> Option<String> {
    let info = source.document().trailer.get(b"Info").ok()?;
    let info = source.resolve(info).as_dict().ok()?;
    let value = info.get(b"Title").ok()?;
    text_value(source.resolve(value))
}

/// Natural language from the catalog's `/Lang`. Blank is `None`.
pub fn language(source: &SourceDocument) -> Option<String> {
    let root = source.document().trailer.get(b"Root").ok()?;
    let catalog = source.resolve(root).as_dict().ok()?;
    let value = catalog.get(b"Lang").ok()?;
    text_value(source.resolve(value))
}

fn text_value(obj: &Object) -> Option<String> {
    let decoded = match obj {
        Object::String(bytes, _) => decode_text_string(bytes),
        _ => return None,
    };
    let cleaned = decoded.trim_matches('\0');
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Decode the raw bytes of a PDF text string.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encode `text` as a PDF text string object.
///
/// ASCII stays a literal string; anything else becomes UTF-16BE with a BOM
/// so viewers and screen readers get the exact characters back.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document};

    fn source_with(title: Option<Object>, lang: Option<Object>, pages: usize) -> SourceDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(l) = lang {
            catalog.set("Lang", l);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);
        if let Some(t) = title {
            let info_id = doc.add_object(dictionary! { "Title" => t });
            doc.trailer.set("Info", info_id);
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save test PDF");
        SourceDocument::from_bytes(&buf, "test").expect("reopen test PDF")
    }

    #[test]
    fn no_title_no_language() {
        let src = source_with(None, None, 3);
        let meta = read_metadata(&src);
        assert_eq!(meta.title, None);
        assert_eq!(meta.language, None);
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.pdf_version, "1.7");
    }

    #[test]
    fn reads_title_and_language() {
        let src = source_with(
            Some(Object::string_literal("Dune")),
            Some(Object::string_literal("en-GB")),
            1,
        );
        assert_eq!(title(&src).as_deref(), Some("Dune"));
        assert_eq!(language(&src).as_deref(), Some("en-GB"));
    }

    #[test]
    fn blank_values_are_absent() {
        let src = source_with(
            Some(Object::string_literal("   ")),
            Some(Object::string_literal("")),
            1,
        );
        assert_eq!(title(&src), None);
        assert_eq!(language(&src), None);
    }

    #[test]
    fn utf16_title_round_trips() {
        let src = source_with(Some(encode_text_string("Les Misérables")), None, 1);
        assert_eq!(title(&src).as_deref(), Some("Les Misérables"));
    }

    #[test]
    fn latin1_fallback() {
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn non_string_title_is_ignored() {
        let src = source_with(Some(Object::Integer(42)), None, 1);
        assert_eq!(title(&src), None);
    }
}
