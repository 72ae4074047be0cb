//! PDF output: one Letter page per laid out page, QR codes as image XObjects
//! and text lines in a standard font.

pub mod content;
pub mod document;
pub mod fonts;
pub mod resources;

pub use document::{create_output_pdf, write_pdf};
