use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::LabelStyle;
use crate::layout::{Page, PageSize, SheetDocument};
use super::content::{compress_data, needs_cid, ContentBuilder};
use super::fonts::{create_font, embed_cid_font, find_cid_font};
use super::resources::build_page_resources;

/// Fonts shared by every page of the output
struct FontSet {
    standard: ObjectId,
    cid: Option<ObjectId>,
}

/// Embed a Unicode font only when some label actually needs one
fn load_fonts(doc: &mut Document, sheet: &SheetDocument, style: &LabelStyle) -> FontSet {
    load_fonts_with(doc, sheet, style, find_cid_font)
}

fn load_fonts_with<F>(doc: &mut Document, sheet: &SheetDocument, style: &LabelStyle, find_font: F) -> FontSet
where
    F: FnOnce() -> Option<(Vec<u8>, String)>,
{
    let standard = create_font(doc, style.font);

    let unicode_chars: BTreeSet<char> = sheet
        .labels()
        .flat_map(|label| label.lines.iter())
        .filter(|line| needs_cid(&line.text))
        .flat_map(|line| line.text.chars())
        .collect();

    let cid = if unicode_chars.is_empty() {
        None
    } else {
        match find_font() {
            Some((data, family)) => {
                info!(%family, "embedding font for non-Latin text");
                Some(embed_cid_font(doc, &data, &family, &unicode_chars))
            }
            None => {
                warn!("no Unicode font found, non-Latin characters will print as '?'");
                None
            }
        }
    };

    FontSet { standard, cid }
}

/// Create one page object holding the given labels
fn create_page(
    doc: &mut Document,
    pages_id: ObjectId,
    page: &Page,
    page_size: PageSize,
    fonts: &FontSet,
    style: &LabelStyle,
) -> Result<ObjectId> {
    let mut builder = ContentBuilder::new(style.font_size, fonts.cid.is_some());

    for label in &page.labels {
        builder.add_qr_code(&label.qr, style, doc)?;
        for line in &label.lines {
            builder.add_text(line);
        }
    }

    let mut content_dict = Dictionary::new();
    content_dict.set("Filter", "FlateDecode");
    let content = compress_data(&builder.build_content_bytes())?;
    let content_id = doc.add_object(Stream::new(content_dict, content));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", "Page");
    page_dict.set("Parent", Object::Reference(pages_id));
    page_dict.set(
        "MediaBox",
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page_size.width.round() as i64),
            Object::Integer(page_size.height.round() as i64),
        ],
    );
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set(
        "Resources",
        Object::Dictionary(build_page_resources(fonts.standard, fonts.cid, &builder.xobjects)),
    );

    Ok(doc.add_object(Object::Dictionary(page_dict)))
}

/// Build the PDF for a laid out sheet
pub fn create_output_pdf(sheet: &SheetDocument, style: &LabelStyle) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let fonts = load_fonts(&mut doc, sheet, style);

    let mut kids = Vec::with_capacity(sheet.pages.len());
    for (index, page) in sheet.pages.iter().enumerate() {
        let page_id = create_page(&mut doc, pages_id, page, sheet.page_size, &fonts, style)
            .with_context(|| format!("Failed to build page {}", index + 1))?;
        debug!(page = index + 1, labels = page.labels.len(), "page built");
        kids.push(Object::Reference(page_id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", "Pages");
    pages.set("Count", kids.len() as i64);
    pages.set("Kids", kids);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    // No creation date, so identical input gives identical bytes
    let mut info_dict = Dictionary::new();
    info_dict.set("Title", Object::String(b"QR labels".to_vec(), StringFormat::Literal));
    info_dict.set("Producer", Object::String(b"qr_label_sheet".to_vec(), StringFormat::Literal));
    let info_id = doc.add_object(Object::Dictionary(info_dict));
    doc.trailer.set("Info", Object::Reference(info_id));

    Ok(doc)
}

/// Render the sheet and serialize it to PDF bytes
pub fn write_pdf(sheet: &SheetDocument, style: &LabelStyle) -> Result<Vec<u8>> {
    let mut doc = create_output_pdf(sheet, style)?;
    let mut buf = Vec::new();
    doc.save_to(&mut buf).context("Failed to serialize PDF")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSelection, LayoutParameters};
    use crate::layout::layout_records;
    use crate::table::Record;

    fn tokyo_sheet() -> SheetDocument {
        let records = vec![Record {
            project: "東京".to_string(),
            id: "A1".to_string(),
            lid: "L1".to_string(),
        }];
        layout_records(&records, &LayoutParameters::default(), &FieldSelection::default())
    }

    fn first_page(doc: &Document) -> (&Dictionary, String) {
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        (doc.get_dictionary(page_id).unwrap(), String::from_utf8_lossy(&content).into_owned())
    }

    fn page_fonts(page: &Dictionary) -> &Dictionary {
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        resources.get(b"Font").unwrap().as_dict().unwrap()
    }

    fn sheet(count: usize) -> SheetDocument {
        let records: Vec<Record> = (1..=count)
            .map(|n| Record {
                project: format!("P{}", n),
                id: format!("A{}", n),
                lid: format!("L{}", n),
            })
            .collect();
        layout_records(&records, &LayoutParameters::default(), &FieldSelection::default())
    }

    #[test]
    fn test_output_has_one_pdf_page_per_sheet_page() {
        let doc = create_output_pdf(&sheet(3), &LabelStyle::default()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_each_label_gets_its_own_image() {
        let doc = create_output_pdf(&sheet(3), &LabelStyle::default()).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert_eq!(xobjects.len(), 3);
    }

    #[test]
    fn test_empty_sheet_is_a_blank_page() {
        let doc = create_output_pdf(&sheet(0), &LabelStyle::default()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_write_pdf_is_deterministic() {
        let a = write_pdf(&sheet(5), &LabelStyle::default()).unwrap();
        let b = write_pdf(&sheet(5), &LabelStyle::default()).unwrap();
        assert!(a.starts_with(b"%PDF-1.5"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_latin_label_embeds_found_font() {
        let sheet = tokyo_sheet();
        let mut doc = Document::with_version("1.5");
        let fonts = load_fonts_with(&mut doc, &sheet, &LabelStyle::default(), || {
            Some((b"not a font".to_vec(), "Test Sans".to_string()))
        });
        let cid_id = fonts.cid.unwrap();
        let type0 = doc.get_dictionary(cid_id).unwrap();
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");

        let pages_id = doc.new_object_id();
        let page_id = create_page(&mut doc, pages_id, &sheet.pages[0], sheet.page_size, &fonts, &LabelStyle::default()).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert_eq!(page_fonts(page).get(b"F2").unwrap().as_reference().unwrap(), cid_id);
    }

    #[test]
    fn test_non_latin_label_falls_back_without_font() {
        let sheet = tokyo_sheet();
        let mut doc = Document::with_version("1.5");
        let fonts = load_fonts_with(&mut doc, &sheet, &LabelStyle::default(), || None);
        assert!(fonts.cid.is_none());

        let pages_id = doc.new_object_id();
        let page_id = create_page(&mut doc, pages_id, &sheet.pages[0], sheet.page_size, &fonts, &LabelStyle::default()).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page_fonts(page).get(b"F2").is_err());
    }

    #[test]
    fn test_latin_labels_never_look_for_a_font() {
        let mut doc = Document::with_version("1.5");
        let fonts = load_fonts_with(&mut doc, &sheet(3), &LabelStyle::default(), || {
            panic!("font lookup without non-Latin text")
        });
        assert!(fonts.cid.is_none());
    }

    #[test]
    fn test_non_latin_label_with_system_fonts() {
        let doc = create_output_pdf(&tokyo_sheet(), &LabelStyle::default()).unwrap();
        let (page, text) = first_page(&doc);
        // Either an embedded font draws the text, or it degrades to '?'
        if page_fonts(page).get(b"F2").is_ok() {
            assert!(text.contains(&format!("<{}>", crate::pdf::content::encode_cid_text("Project: 東京"))));
        } else {
            assert!(text.contains("(Project: ??)"));
        }
        assert!(text.contains("(LID: L1)"));
    }
}
