//! PDF content stream generation for QR codes and text.
//!
//! This module provides:
//! - QR code generation and embedding as image XObjects
//! - Text rendering with the standard font or an embedded CID font
//! - String encoding for PDF (WinAnsi literals and UTF-16BE hex)

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops, GrayImage, Luma};
use lopdf::{Dictionary, Document, Object, Stream};
use qrcode::{EcLevel, QrCode};
use std::io::Write;

use crate::config::LabelStyle;
use crate::layout::{QrPlacement, TextLine};

/// Minimum pixel width of an embedded QR bitmap
const QR_PIXELS: u32 = 200;

/// Widest quiet zone accepted around a QR symbol, in modules
pub const MAX_BORDER: u32 = 16;

/// Resource name of the standard font
pub const FONT_NAME: &str = "F1";

/// Resource name of the embedded Unicode font
pub const CID_FONT_NAME: &str = "F2";

/// Builder for generating PDF content streams and associated XObjects
pub struct ContentBuilder {
    pub content_parts: Vec<String>,
    pub xobjects: Dictionary,
    font_size: f64,
    has_cid_font: bool,
}

impl ContentBuilder {
    pub fn new(font_size: f64, has_cid_font: bool) -> Self {
        Self {
            content_parts: Vec::new(),
            xobjects: Dictionary::new(),
            font_size,
            has_cid_font,
        }
    }

    /// Encode the payload and draw it as a square image.
    ///
    /// The bitmap only lives until it has been compressed into the document.
    pub fn add_qr_code(
        &mut self,
        qr: &QrPlacement,
        style: &LabelStyle,
        doc: &mut Document,
    ) -> Result<()> {
        let qr_img = generate_qr_code(&qr.payload, style.error_correction.ec_level(), style.border)?;
        let (width, height) = qr_img.dimensions();
        let compressed_bytes = compress_data(qr_img.as_raw())?;
        drop(qr_img);

        let mut img_dict = Dictionary::new();
        img_dict.set("Type", "XObject");
        img_dict.set("Subtype", "Image");
        img_dict.set("Width", width as i64);
        img_dict.set("Height", height as i64);
        img_dict.set("ColorSpace", "DeviceGray");
        img_dict.set("BitsPerComponent", 8_i64);
        img_dict.set("Interpolate", false);
        img_dict.set("Filter", "FlateDecode");

        let img_id = doc.add_object(Stream::new(img_dict, compressed_bytes));

        let img_name = format!("Im{}", img_id.0);
        self.xobjects.set(img_name.clone(), Object::Reference(img_id));

        self.content_parts.push(format!(
            "q {} 0 0 {} {} {} cm /{} Do Q ",
            qr.size, qr.size, qr.x, qr.y, img_name
        ));

        Ok(())
    }

    /// Draw one text line with its baseline starting at `(line.x, line.y)`.
    pub fn add_text(&mut self, line: &TextLine) {
        if needs_cid(&line.text) && self.has_cid_font {
            self.content_parts.push(format!(
                "q BT 0 g /{} {} Tf {} {} Td <{}> Tj ET Q ",
                CID_FONT_NAME, self.font_size, line.x, line.y, encode_cid_text(&line.text)
            ));
        } else {
            self.content_parts.push(format!(
                "q BT 0 g /{} {} Tf {} {} Td ({}) Tj ET Q ",
                FONT_NAME, self.font_size, line.x, line.y, escape_pdf_string(&line.text)
            ));
        }
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.join("").into_bytes()
    }
}

/// Whether the text has characters WinAnsiEncoding cannot represent
pub fn needs_cid(s: &str) -> bool {
    s.chars().any(|c| c > '\u{FF}' || ('\u{80}'..='\u{9F}').contains(&c))
}

/// Escape text for a literal string shown with WinAnsiEncoding
///
/// Latin-1 characters become octal escapes, anything beyond becomes '?'.
pub fn escape_pdf_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '(' => result.push_str(r"\("),
            ')' => result.push_str(r"\)"),
            '\\' => result.push_str(r"\\"),
            '\n' => result.push_str(r"\n"),
            '\r' => result.push_str(r"\r"),
            '\t' => result.push_str(r"\t"),
            ' '..='~' => result.push(c),
            '\u{A0}'..='\u{FF}' => result.push_str(&format!("\\{:03o}", c as u32)),
            _ => result.push('?'),
        }
    }
    result
}

/// Encode text for a CID font with Identity-H encoding (UTF-16BE as hex)
pub fn encode_cid_text(s: &str) -> String {
    s.encode_utf16().map(|unit| format!("{:04X}", unit)).collect()
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Generate a QR code as a grayscale bitmap
///
/// The symbol is surrounded by `border` light modules and scaled up by a whole
/// factor so every module stays a sharp block of pixels.
pub fn generate_qr_code(data: &str, ec_level: EcLevel, border: u32) -> Result<GrayImage> {
    if border > MAX_BORDER {
        bail!("QR border of {} modules exceeds the maximum of {}", border, MAX_BORDER);
    }

    let qr_code = QrCode::with_error_correction_level(data.as_bytes(), ec_level)
        .with_context(|| format!("Failed to generate QR code for data: {}", data))?;

    let symbol = qr_code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(1, 1)
        .light_color(Luma([255u8]))
        .dark_color(Luma([0u8]))
        .build();

    let side = border
        .checked_mul(2)
        .and_then(|frame| symbol.width().checked_add(frame))
        .ok_or_else(|| anyhow!("QR bitmap size overflows for border {}", border))?;
    let mut framed = GrayImage::from_pixel(side, side, Luma([255u8]));
    imageops::replace(&mut framed, &symbol, border as i64, border as i64);

    let scale = QR_PIXELS.div_ceil(side).max(1);
    let scaled_side = side
        .checked_mul(scale)
        .ok_or_else(|| anyhow!("QR bitmap size overflows for border {}", border))?;
    Ok(imageops::resize(
        &framed,
        scaled_side,
        scaled_side,
        imageops::FilterType::Nearest,
    ))
}
