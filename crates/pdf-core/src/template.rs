//! Importing a page of an existing PDF as a reusable Form XObject

use crate::{PageSize, PdfError, Result};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Parent chain depth limit when resolving inherited page attributes
const MAX_INHERITANCE_DEPTH: usize = 10;

/// Find a page attribute on the page or one of its ancestors
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current_id = page_id;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current_id).ok()?;

        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current_id = *parent_id,
            _ => break,
        }
    }

    None
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Read a page box as `[llx, lly, urx, ury]`
fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f64; 4]> {
    let value = match inherited_attribute(doc, page_id, key)? {
        Object::Reference(id) => doc.get_object(id).ok()?.clone(),
        other => other,
    };
    let array = value.as_array().ok()?;
    if array.len() < 4 {
        return None;
    }

    let mut numbers = [0.0; 4];
    for (slot, obj) in numbers.iter_mut().zip(array) {
        *slot = as_number(obj)?;
    }

    // Normalize so that the first corner is the lower-left one
    let [x1, y1, x2, y2] = numbers;
    let normalized = [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)];
    if normalized[2] - normalized[0] <= 0.0 || normalized[3] - normalized[1] <= 0.0 {
        return None;
    }
    Some(normalized)
}

/// Import `page_number` (1-indexed) of `bytes` into `target` as a Form XObject
///
/// The form's matrix scales the source page's visible box to fill `page_size`.
/// Returns the object ID of the form.
pub(crate) fn import_page(
    target: &mut Document,
    bytes: &[u8],
    page_number: usize,
    page_size: PageSize,
) -> Result<ObjectId> {
    let mut source = Document::load_mem(bytes).map_err(|e| PdfError::OpenError(e.to_string()))?;

    // Shift source IDs past everything already in the target
    source.renumber_objects_with(target.max_id + 1);

    let pages = source.get_pages();
    let page_id = u32::try_from(page_number)
        .ok()
        .and_then(|n| pages.get(&n))
        .copied()
        .ok_or(PdfError::InvalidPage(page_number, pages.len()))?;

    let bbox = page_box(&source, page_id, b"CropBox")
        .or_else(|| page_box(&source, page_id, b"MediaBox"))
        .unwrap_or_else(|| {
            let letter = PageSize::letter();
            [0.0, 0.0, letter.width, letter.height]
        });

    let resources = match inherited_attribute(&source, page_id, b"Resources") {
        Some(Object::Reference(id)) => source
            .get_object(id)
            .map(Clone::clone)
            .unwrap_or_else(|_| Object::Dictionary(lopdf::Dictionary::new())),
        Some(resources) => resources,
        None => Object::Dictionary(lopdf::Dictionary::new()),
    };

    let content = source
        .get_page_content(page_id)
        .map_err(|e| PdfError::ParseError(format!("template page content: {e}")))?;

    let [llx, lly, urx, ury] = bbox;
    let sx = page_size.width / (urx - llx);
    let sy = page_size.height / (ury - lly);

    let form_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => vec![
            Object::Real(llx as f32),
            Object::Real(lly as f32),
            Object::Real(urx as f32),
            Object::Real(ury as f32),
        ],
        "Matrix" => vec![
            Object::Real(sx as f32),
            0.into(),
            0.into(),
            Object::Real(sy as f32),
            Object::Real((-llx * sx) as f32),
            Object::Real((-lly * sy) as f32),
        ],
        "Resources" => resources,
    };

    tracing::debug!(
        page = page_number,
        source_pages = pages.len(),
        width = urx - llx,
        height = ury - lly,
        "imported template page"
    );

    // Unreferenced source objects (catalog, page tree) are pruned on save
    target.max_id = target.max_id.max(source.max_id);
    target.objects.extend(source.objects);

    Ok(target.add_object(Stream::new(form_dict, content)))
}
