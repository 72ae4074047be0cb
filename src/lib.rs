//! Printable sheets of QR code labels.
//!
//! A CSV with `project`, `ID` and `lid` columns is turned into a PDF where each
//! row becomes a small QR code encoding `lid`, with the selected fields printed
//! beside it. Labels fill the page column by column and spill onto new pages.

pub mod config;
pub mod error;
pub mod layout;
pub mod pdf;
pub mod table;

use anyhow::Result;
use tracing::info;

pub use config::{Dimension, Field, FieldSelection, LabelStyle, LayoutParameters, Settings};
pub use error::ValidationError;
pub use layout::{render, SheetDocument};
pub use table::{InputTable, Record};

/// Validate the table, lay it out and return the finished PDF bytes.
///
/// A [`ValidationError`] is returned (inside the `anyhow::Error`) when the
/// table lacks a required column; no PDF is produced in that case.
pub fn generate_label_pdf(table: &InputTable, settings: &Settings) -> Result<Vec<u8>> {
    let sheet = render(table, &settings.layout, &settings.fields)?;
    info!(
        labels = sheet.label_count(),
        pages = sheet.pages.len(),
        "layout complete"
    );
    pdf::write_pdf(&sheet, &settings.style)
}
