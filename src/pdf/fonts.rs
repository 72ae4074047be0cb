use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;
use fontdb::Database;
use ttf_parser::Face;

/// Standard PDF Type1 fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// Get the PDF BaseFont name for this font
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Parse a font name into a StandardFont
    pub fn from_name(name: &str) -> Option<StandardFont> {
        match name.trim().to_lowercase().as_str() {
            "helvetica" => Some(StandardFont::Helvetica),
            "helvetica-bold" => Some(StandardFont::HelveticaBold),
            "helvetica-oblique" => Some(StandardFont::HelveticaOblique),
            "helvetica-boldoblique" => Some(StandardFont::HelveticaBoldOblique),
            "times" | "times-roman" => Some(StandardFont::TimesRoman),
            "times-bold" => Some(StandardFont::TimesBold),
            "times-italic" => Some(StandardFont::TimesItalic),
            "times-bolditalic" => Some(StandardFont::TimesBoldItalic),
            "courier" => Some(StandardFont::Courier),
            "courier-bold" => Some(StandardFont::CourierBold),
            "courier-oblique" => Some(StandardFont::CourierOblique),
            "courier-boldoblique" => Some(StandardFont::CourierBoldOblique),
            _ => None,
        }
    }
}

impl TryFrom<String> for StandardFont {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        StandardFont::from_name(&name)
            .ok_or_else(|| format!("unknown font '{}'. Only the 14 standard PDF fonts are supported", name))
    }
}

/// Add a standard Type1 font object to the document
pub fn create_font(doc: &mut Document, font: StandardFont) -> ObjectId {
    let mut font_dict = Dictionary::new();
    font_dict.set("Type", "Font");
    font_dict.set("Subtype", "Type1");
    font_dict.set("BaseFont", font.base_font_name());
    // Standard fonts understand Latin-1 bytes with this encoding
    font_dict.set("Encoding", "WinAnsiEncoding");

    doc.add_object(Object::Dictionary(font_dict))
}

/// Build a CIDToGIDMap stream from font's cmap table
///
/// Text is written with Identity-H, so every CID is a Unicode code point and
/// has to be mapped to the glyph index the font file actually uses.
fn build_cidtogid_map(font_data: &[u8]) -> Option<Vec<u8>> {
    let face = Face::parse(font_data, 0).ok()?;

    // Format: one big-endian u16 GID per CID, covering the whole BMP
    const MAX_CID: u16 = 0xFFFF;
    let mut gid_map: Vec<u8> = Vec::with_capacity((MAX_CID as usize + 1) * 2);

    for cid in 0..=MAX_CID {
        // Surrogates are not chars; they map to .notdef
        let gid = char::from_u32(cid as u32)
            .and_then(|ch| face.glyph_index(ch))
            .map(|g| g.0)
            .unwrap_or(0);

        gid_map.extend_from_slice(&gid.to_be_bytes());
    }

    Some(gid_map)
}

/// CIDs (UTF-16 code units under Identity-H) of the characters to be shown
fn cids(chars: &BTreeSet<char>) -> impl Iterator<Item = (u16, char)> + '_ {
    chars
        .iter()
        .filter_map(|&ch| u16::try_from(ch as u32).ok().map(|cid| (cid, ch)))
}

/// Build the `/W` array of the descendant font for the characters used
///
/// Advances are converted from font units to the 1000-unit glyph space.
fn glyph_widths(face: &Face, chars: &BTreeSet<char>) -> Vec<Object> {
    let units_per_em = f64::from(face.units_per_em().max(1));
    let mut widths = Vec::new();
    for (cid, ch) in cids(chars) {
        let Some(advance) = face.glyph_index(ch).and_then(|gid| face.glyph_hor_advance(gid)) else {
            continue;
        };
        let width = (f64::from(advance) * 1000.0 / units_per_em).round() as i64;
        widths.push(Object::Integer(i64::from(cid)));
        widths.push(Object::Array(vec![Object::Integer(width)]));
    }
    widths
}

/// Build a ToUnicode CMap so text drawn with the CID font can be copied
fn to_unicode_cmap(chars: &BTreeSet<char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<u16> = cids(chars).map(|(cid, _)| cid).collect();
    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for cid in chunk {
            let _ = writeln!(cmap, "<{:04X}> <{:04X}>", cid, cid);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}

/// Embed a CID-keyed TrueType font for text outside Latin-1
///
/// This creates a Type0 font with a CIDFontType2 descendant. `chars` are the
/// characters that will be drawn with it; they get explicit widths and a
/// ToUnicode entry.
pub fn embed_cid_font(
    doc: &mut Document,
    font_data: &[u8],
    font_name: &str,
    chars: &BTreeSet<char>,
) -> ObjectId {
    // PDF names may not contain spaces
    let base_font = font_name.replace(' ', "-");

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", "Font");
    cid_font.set("Subtype", "CIDFontType2");
    cid_font.set("BaseFont", base_font.as_str());
    cid_font.set("CIDSystemInfo", {
        let mut cid_system = Dictionary::new();
        cid_system.set("Registry", Object::String("Adobe".into(), StringFormat::Literal));
        cid_system.set("Ordering", Object::String("Identity".into(), StringFormat::Literal));
        cid_system.set("Supplement", 0i64);
        Object::Dictionary(cid_system)
    });

    if let Some(cidtogid_data) = build_cidtogid_map(font_data) {
        let cidtogid_stream = Stream::new(Dictionary::new(), cidtogid_data);
        let cidtogid_id = doc.add_object(cidtogid_stream);
        cid_font.set("CIDToGIDMap", Object::Reference(cidtogid_id));
    } else {
        // Only correct for fonts whose glyphs are laid out in Unicode order
        cid_font.set("CIDToGIDMap", "Identity");
    }

    cid_font.set("DW", 1000i64);
    if let Ok(face) = Face::parse(font_data, 0) {
        let widths = glyph_widths(&face, chars);
        if !widths.is_empty() {
            cid_font.set("W", widths);
        }
    }

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", "FontDescriptor");
    font_descriptor.set("FontName", base_font.as_str());
    font_descriptor.set("Flags", 4i64); // Symbolic
    font_descriptor.set("FontBBox", vec![0i64, 0i64, 1000i64, 1000i64].into_iter().map(Object::Integer).collect::<Vec<_>>());
    font_descriptor.set("ItalicAngle", 0i64);
    font_descriptor.set("Ascent", 1000i64);
    font_descriptor.set("Descent", -200i64);
    font_descriptor.set("CapHeight", 700i64);
    font_descriptor.set("StemV", 80i64);

    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", font_data.len() as i64);
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font_data.to_vec()));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));

    let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));

    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let mut type0_font = Dictionary::new();
    type0_font.set("Type", "Font");
    type0_font.set("Subtype", "Type0");
    type0_font.set("BaseFont", base_font.as_str());
    type0_font.set("Encoding", "Identity-H");
    type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);

    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(chars).into_bytes()));
    type0_font.set("ToUnicode", Object::Reference(to_unicode_id));

    doc.add_object(Object::Dictionary(type0_font))
}

/// Families tried, in order, when a label needs characters outside Latin-1
const UNICODE_FONT_FAMILIES: [&str; 12] = [
    "Noto Sans",
    "DejaVu Sans",
    "Liberation Sans",
    "Arial Unicode MS",
    "Arial",
    "Noto Sans CJK JP",
    "Noto Sans JP",
    "Source Han Sans",
    "Hiragino Sans",
    "IPA Gothic",
    "Yu Gothic",
    "Meiryo",
];

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    } else if cfg!(target_os = "linux") {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(&home).join(".local/share/fonts"));
        }
    }
    dirs
}

/// Find a system TrueType font able to render non-Latin text
///
/// Returns the font file bytes and its family name. Font collections (.ttc)
/// are skipped because FontFile2 has to hold a single font.
pub fn find_cid_font() -> Option<(Vec<u8>, String)> {
    let mut db = Database::new();
    if cfg!(target_os = "macos") {
        db.load_system_fonts();
    } else {
        for dir in font_dirs() {
            db.load_fonts_dir(dir);
        }
    }

    for family in UNICODE_FONT_FAMILIES {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            ..Default::default()
        };

        let Some(id) = db.query(&query) else {
            continue;
        };

        match db.face_source(id) {
            Some((fontdb::Source::File(path), _)) => {
                let is_collection = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("ttc"));
                if is_collection {
                    continue;
                }
                if let Ok(data) = fs::read(&path) {
                    return Some((data, family.to_string()));
                }
            }
            Some((fontdb::Source::Binary(data), _)) => {
                let data_vec: Vec<u8> = data.as_ref().as_ref().to_vec();
                return Some((data_vec, family.to_string()));
            }
            _ => {}
        }
    }

    None
}
