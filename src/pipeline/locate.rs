//! Image location: find the cover bitmap on the first page.
//!
//! The policy is "first match wins": XObjects are visited in the order they
//! are stored in the page's resource dictionary and the first one whose
//! `/Subtype` is `/Image` is the cover. Form XObjects are skipped, not
//! searched, and no attempt is made to pick the largest image.

use super::input::{as_number, SourceDocument};
use crate::error::CoverError;
use lopdf::{Object, ObjectId, Stream};
use tracing::debug;

/// One image XObject lifted from the source's first page.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// Resource name on the source page, e.g. `"Im0"`.
    pub name: String,
    /// Object id in the *source* document. Only valid while it is open.
    pub object_id: ObjectId,
    /// The image stream, as stored (still encoded).
    pub stream: Stream,
    pub width: u32,
    pub height: u32,
    /// Colour components per sample, resolved against the source document.
    /// `None` when the colour space is absent or not one we can decode.
    pub components: Option<usize>,
}

/// Return the first image XObject on page 1, or `None`.
pub fn find_first_image(source: &SourceDocument) -> Option<ExtractedImage> {
    let page_id = source.first_page_id()?;
    let resources = source.inherited(page_id, b"Resources")?.as_dict().ok()?;
    let xobjects = resources.get(b"XObject").ok()?;
    let xobjects = source.resolve(xobjects).as_dict().ok()?;

    for (name, entry) in xobjects.iter() {
        let Object::Reference(id) = entry else {
            continue;
        };
        let Ok(Object::Stream(stream)) = source.document().get_object(*id) else {
            continue;
        };
        if !is_image(stream) {
            debug!("Skipping non-image XObject /{}", String::from_utf8_lossy(name));
            continue;
        }

        let dim = |key: &[u8]| {
            stream
                .dict
                .get(key)
                .ok()
                .and_then(|o| as_number(source.resolve(o)))
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0)
        };

        let image = ExtractedImage {
            name: String::from_utf8_lossy(name).into_owned(),
            object_id: *id,
            stream: stream.clone(),
            width: dim(b"Width"),
            height: dim(b"Height"),
            components: color_components(source, stream),
        };
        debug!(
            "Cover image /{} ({} x {} px, object {:?})",
            image.name, image.width, image.height, image.object_id
        );
        return Some(image);
    }

    None
}

/// Like [`find_first_image`], but a missing image is an error.
///
/// `label` is appended to the error message (file-based callers pass the
/// path; HTTP uploads pass `None` and get the bare message).
pub fn locate_cover_image(
    source: &SourceDocument,
    label: Option<&str>,
) -> Result<ExtractedImage, CoverError> {
    find_first_image(source).ok_or_else(|| CoverError::no_image(label))
}

/// Components per sample for a device or calibrated colour space name.
pub fn components_for_name(name: &[u8]) -> Option<usize> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Some(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        _ => None,
    }
}

/// Resolve the image's `/ColorSpace` (direct or indirect) to a component count.
///
/// `[/ICCBased n 0 R]` reads `/N` from the profile stream. Indexed, Lab,
/// Separation and DeviceN spaces are not decoded.
fn color_components(source: &SourceDocument, stream: &Stream) -> Option<usize> {
    let space = source.resolve(stream.dict.get(b"ColorSpace").ok()?);
    match space {
        Object::Name(name) => components_for_name(name),
        Object::Array(items) => {
            let family = source.resolve(items.first()?).as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let profile = source.resolve(items.get(1)?).as_stream().ok()?;
                    let n = profile.dict.get(b"N").ok().and_then(|o| o.as_i64().ok())?;
                    matches!(n, 1 | 3 | 4).then_some(n as usize)
                }
                b"CalGray" | b"CalRGB" => components_for_name(family),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}
