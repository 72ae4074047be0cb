use lopdf::{Dictionary, Object, ObjectId};

use super::content::{CID_FONT_NAME, FONT_NAME};

/// Build the resources dictionary of one page
///
/// The page gets the standard font as F1, the Unicode font as F2 when one was
/// embedded, and every image XObject its content stream draws.
pub fn build_page_resources(
    font_id: ObjectId,
    cid_font_id: Option<ObjectId>,
    xobject_dict: &Dictionary,
) -> Dictionary {
    let mut font_resources = Dictionary::new();
    font_resources.set(FONT_NAME, Object::Reference(font_id));
    if let Some(cid_font_id) = cid_font_id {
        font_resources.set(CID_FONT_NAME, Object::Reference(cid_font_id));
    }

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(font_resources));
    if !xobject_dict.is_empty() {
        resources.set("XObject", Object::Dictionary(xobject_dict.clone()));
    }
    resources
}
