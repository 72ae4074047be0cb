//! Placement of labels on US Letter pages.
//!
//! Labels are laid out column by column: each column is filled top to bottom,
//! then the cursor moves one column to the right, and once no column fits
//! horizontally a new page is started. Nothing here touches PDF or QR
//! encoding; the result is a plain description that [`crate::pdf`] renders.

use tracing::debug;

use crate::config::{Field, FieldSelection, LayoutParameters};
use crate::error::ValidationError;
use crate::table::{InputTable, Record};

/// Page size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

/// Distance from a label's bottom edge to its first text baseline, in line pitches.
const FIRST_LINE_OFFSET: f64 = 2.2;

/// Lines reserved per label when advancing to the next row.
const LINES_PER_LABEL: f64 = 3.0;

/// QR code placement. `(x, y)` is the bottom-left corner in PDF coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct QrPlacement {
    pub payload: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// A text line; `(x, y)` is the start of its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub qr: QrPlacement,
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetDocument {
    pub page_size: PageSize,
    pub pages: Vec<Page>,
}

impl SheetDocument {
    pub fn label_count(&self) -> usize {
        self.pages.iter().map(|p| p.labels.len()).sum()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.pages.iter().flat_map(|p| p.labels.iter())
    }
}

/// Validate the table and lay out one label per row.
pub fn render(
    table: &InputTable,
    params: &LayoutParameters,
    fields: &FieldSelection,
) -> Result<SheetDocument, ValidationError> {
    let records = table.records()?;
    Ok(layout_records(&records, params, fields))
}

/// Lay out already validated records.
pub fn layout_records(
    records: &[Record],
    params: &LayoutParameters,
    fields: &FieldSelection,
) -> SheetDocument {
    let page_size = LETTER;
    let x_start = params.margin;
    let y_start = page_size.height - params.margin - params.qr_size;
    let row_pitch = params.qr_size + params.vertical_spacing + LINES_PER_LABEL * params.line_spacing;

    let mut pages = vec![Page::default()];
    let (mut x, mut y) = (x_start, y_start);

    for record in records {
        if y < params.margin {
            y = y_start;
            x += params.qr_size + params.horizontal_spacing;

            // Only checked after a column advance, so y is already back at the top here.
            if x + params.qr_size > page_size.width - params.margin {
                debug!(page = pages.len() + 1, "starting new page");
                pages.push(Page::default());
                x = x_start;
            }
        }

        let label = place_label(record, x, y, params, fields);
        // `pages` is never empty.
        if let Some(page) = pages.last_mut() {
            page.labels.push(label);
        }

        y -= row_pitch;
    }

    SheetDocument { page_size, pages }
}

fn place_label(
    record: &Record,
    x: f64,
    y: f64,
    params: &LayoutParameters,
    fields: &FieldSelection,
) -> Label {
    let text_x = x + params.qr_size + params.text_margin;
    let mut text_y = y + FIRST_LINE_OFFSET * params.line_spacing;
    let mut lines = Vec::new();

    for field in fields.iter() {
        let value = match field {
            Field::Project => &record.project,
            Field::Id => &record.id,
            Field::Lid => &record.lid,
        };
        lines.push(TextLine {
            text: format!("{}: {}", field.label(), value),
            x: text_x,
            y: text_y,
        });
        // LID is always last, nothing is drawn below it.
        if field != Field::Lid {
            text_y -= params.line_spacing;
        }
    }

    Label {
        qr: QrPlacement {
            payload: record.lid.clone(),
            x,
            y,
            size: params.qr_size,
        },
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimension;

    fn record(n: usize) -> Record {
        Record {
            project: format!("P{}", n),
            id: format!("A{}", n),
            lid: format!("L{}", n),
        }
    }

    fn records(count: usize) -> Vec<Record> {
        (1..=count).map(record).collect()
    }

    fn cm(v: f64) -> f64 {
        Dimension::from_cm(v).as_points()
    }

    /// Small labels with 1 cm margins so a page holds many of them.
    fn compact_params() -> LayoutParameters {
        LayoutParameters {
            margin: cm(1.0),
            text_margin: cm(0.1),
            qr_size: cm(1.0),
            line_spacing: 8.0,
            horizontal_spacing: cm(0.5),
            vertical_spacing: cm(0.5),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_render_rejects_missing_columns() {
        let table = InputTable::from_reader("project,lid\nP1,L1\n".as_bytes()).unwrap();
        let err = render(&table, &LayoutParameters::default(), &FieldSelection::default()).unwrap_err();
        assert_eq!(err.missing, vec!["ID".to_string()]);
    }

    #[test]
    fn test_empty_input_gives_one_blank_page() {
        let doc = layout_records(&[], &LayoutParameters::default(), &FieldSelection::default());
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.label_count(), 0);
    }

    #[test]
    fn test_one_label_per_record_in_order() {
        let recs = records(40);
        let doc = layout_records(&recs, &compact_params(), &FieldSelection::all());
        assert_eq!(doc.label_count(), 40);
        let payloads: Vec<_> = doc.labels().map(|l| l.qr.payload.clone()).collect();
        let expected: Vec<_> = recs.iter().map(|r| r.lid.clone()).collect();
        assert_eq!(payloads, expected);
    }

    #[test]
    fn test_first_label_at_top_left() {
        let params = LayoutParameters::default();
        let doc = layout_records(&records(1), &params, &FieldSelection::default());
        let qr = &doc.pages[0].labels[0].qr;
        assert!(approx(qr.x, params.margin));
        assert!(approx(qr.y, LETTER.height - params.margin - params.qr_size));
        assert!(approx(qr.size, params.qr_size));
    }

    #[test]
    fn test_row_pitch_ignores_field_selection() {
        let params = compact_params();
        let only_lid: FieldSelection = [Field::Lid].into_iter().collect();
        let a = layout_records(&records(3), &params, &only_lid);
        let b = layout_records(&records(3), &params, &FieldSelection::all());
        let pitch = params.qr_size + params.vertical_spacing + 3.0 * params.line_spacing;
        for doc in [&a, &b] {
            let labels = &doc.pages[0].labels;
            assert!(approx(labels[0].qr.y - labels[1].qr.y, pitch));
            assert!(approx(labels[1].qr.y - labels[2].qr.y, pitch));
        }
    }

    #[test]
    fn test_column_wrap() {
        let params = compact_params();
        let doc = layout_records(&records(60), &params, &FieldSelection::default());
        let labels: Vec<_> = doc.labels().collect();
        let y_start = LETTER.height - params.margin - params.qr_size;
        let pitch = params.qr_size + params.vertical_spacing + 3.0 * params.line_spacing;

        // Rows that fit before y drops below the margin.
        let per_column = ((y_start - params.margin) / pitch).floor() as usize + 1;
        for label in &labels[..per_column] {
            assert!(approx(label.qr.x, params.margin));
        }

        let wrapped = &labels[per_column].qr;
        assert!(approx(wrapped.x, params.margin + params.qr_size + params.horizontal_spacing));
        assert!(approx(wrapped.y, y_start));
        assert!(labels[per_column - 1].qr.y >= params.margin);
    }

    #[test]
    fn test_page_wrap() {
        let params = compact_params();
        let y_start = LETTER.height - params.margin - params.qr_size;
        let pitch = params.qr_size + params.vertical_spacing + 3.0 * params.line_spacing;
        let per_column = ((y_start - params.margin) / pitch).floor() as usize + 1;
        let column_pitch = params.qr_size + params.horizontal_spacing;
        let columns = ((LETTER.width - params.margin - params.qr_size - params.margin) / column_pitch)
            .floor() as usize
            + 1;
        let per_page = per_column * columns;

        let doc = layout_records(&records(per_page + 1), &params, &FieldSelection::default());
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].labels.len(), per_page);

        let last_on_first = &doc.pages[0].labels[per_page - 1].qr;
        assert!(last_on_first.x + params.qr_size <= LETTER.width - params.margin);

        let first_on_second = &doc.pages[1].labels[0];
        assert_eq!(first_on_second.qr.payload, format!("L{}", per_page + 1));
        assert!(approx(first_on_second.qr.x, params.margin));
        assert!(approx(first_on_second.qr.y, y_start));
    }

    #[test]
    fn test_lid_only_line() {
        let params = LayoutParameters::default();
        let only_lid: FieldSelection = [Field::Lid].into_iter().collect();
        let doc = layout_records(&records(1), &params, &only_lid);
        let label = &doc.pages[0].labels[0];
        assert_eq!(label.lines.len(), 1);
        assert_eq!(label.lines[0].text, "LID: L1");
        assert!(approx(label.lines[0].y, label.qr.y + 2.2 * params.line_spacing));
        assert!(approx(
            label.lines[0].x,
            label.qr.x + params.qr_size + params.text_margin
        ));
    }

    #[test]
    fn test_lines_step_down_in_fixed_order() {
        let params = LayoutParameters::default();
        let doc = layout_records(&records(1), &params, &FieldSelection::all());
        let label = &doc.pages[0].labels[0];
        let texts: Vec<_> = label.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Project: P1", "ID: A1", "LID: L1"]);
        let top = label.qr.y + 2.2 * params.line_spacing;
        assert!(approx(label.lines[0].y, top));
        assert!(approx(label.lines[1].y, top - params.line_spacing));
        assert!(approx(label.lines[2].y, top - 2.0 * params.line_spacing));
    }

    #[test]
    fn test_default_sheet_with_project_and_lid() {
        let params = LayoutParameters::default();
        let doc = layout_records(&records(3), &params, &FieldSelection::default());
        assert_eq!(doc.pages.len(), 1);
        let page = &doc.pages[0];
        assert_eq!(page.labels.len(), 3);
        for (i, label) in page.labels.iter().enumerate() {
            let texts: Vec<_> = label.lines.iter().map(|l| l.text.clone()).collect();
            assert_eq!(texts, vec![format!("Project: P{}", i + 1), format!("LID: L{}", i + 1)]);
            assert!(approx(label.lines[1].y, label.lines[0].y - params.line_spacing));
        }
        assert!(page.labels[0].qr.y > page.labels[1].qr.y);
        assert!(page.labels[1].qr.y > page.labels[2].qr.y);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let params = compact_params();
        let a = layout_records(&records(100), &params, &FieldSelection::all());
        let b = layout_records(&records(100), &params, &FieldSelection::all());
        assert_eq!(a, b);
    }
}
