//! Configuration loading and parsing.
//!
//! This module handles:
//! - Loading and parsing settings.json (layout knobs, field selection, label style)
//! - Unit conversion for dimensions (mm, cm, in, pt)
//! - Dimension type with flexible deserialization
//! - The slider bounds the label form historically enforced on each layout knob

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

use crate::pdf::fonts::StandardFont;

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1 in" (inches)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    pub fn from_cm(cm: f64) -> Self {
        Dimension(cm * 72.0 / 2.54)
    }

    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (num_str, unit) = value.split_at(
            value
                .find(|c: char| c.is_whitespace() || c.is_ascii_alphabetic())
                .unwrap_or(value.len()),
        );
        let num_str = num_str.trim();
        let unit = unit.trim().to_lowercase();

        let num: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid number in dimension: {:?}", num_str))?;

        // 1 inch = 72 points (PDF default unit)
        let points = match unit.as_str() {
            "" | "pt" | "point" | "points" => num,
            "mm" => num * 72.0 / 25.4,
            "cm" => num * 72.0 / 2.54,
            "in" | "inch" | "inches" => num * 72.0,
            _ => {
                return Err(format!(
                    "unknown unit '{}'. Supported: mm, cm, in, pt",
                    unit
                ))
            }
        };

        Ok(Dimension(points))
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number or a string with unit (e.g., \"100 mm\", \"10 cm\", \"1 in\")")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

fn points<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Dimension::deserialize(deserializer).map(|d| d.as_points())
}

/// Geometry of the label grid. Every value is in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutParameters {
    #[serde(deserialize_with = "points")]
    pub margin: f64,
    #[serde(deserialize_with = "points", alias = "textMargin")]
    pub text_margin: f64,
    #[serde(deserialize_with = "points", alias = "qrSize")]
    pub qr_size: f64,
    #[serde(deserialize_with = "points", alias = "lineSpacing")]
    pub line_spacing: f64,
    #[serde(deserialize_with = "points", alias = "horizontalSpacing")]
    pub horizontal_spacing: f64,
    #[serde(deserialize_with = "points", alias = "verticalSpacing")]
    pub vertical_spacing: f64,
}

impl Default for LayoutParameters {
    fn default() -> Self {
        Self {
            margin: Dimension::from_cm(2.8).as_points(),
            text_margin: Dimension::from_cm(0.05).as_points(),
            qr_size: Dimension::from_cm(0.8).as_points(),
            line_spacing: 8.0,
            horizontal_spacing: Dimension::from_cm(2.8).as_points(),
            vertical_spacing: Dimension::from_cm(1.0).as_points(),
        }
    }
}

impl LayoutParameters {
    pub fn get(&self, knob: LayoutKnob) -> f64 {
        match knob {
            LayoutKnob::Margin => self.margin,
            LayoutKnob::TextMargin => self.text_margin,
            LayoutKnob::QrSize => self.qr_size,
            LayoutKnob::LineSpacing => self.line_spacing,
            LayoutKnob::HorizontalSpacing => self.horizontal_spacing,
            LayoutKnob::VerticalSpacing => self.vertical_spacing,
        }
    }

    pub fn set(&mut self, knob: LayoutKnob, value: f64) {
        let slot = match knob {
            LayoutKnob::Margin => &mut self.margin,
            LayoutKnob::TextMargin => &mut self.text_margin,
            LayoutKnob::QrSize => &mut self.qr_size,
            LayoutKnob::LineSpacing => &mut self.line_spacing,
            LayoutKnob::HorizontalSpacing => &mut self.horizontal_spacing,
            LayoutKnob::VerticalSpacing => &mut self.vertical_spacing,
        };
        *slot = value;
    }
}

/// One of the six user-adjustable layout values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKnob {
    Margin,
    TextMargin,
    QrSize,
    LineSpacing,
    HorizontalSpacing,
    VerticalSpacing,
}

impl LayoutKnob {
    pub const ALL: [LayoutKnob; 6] = [
        LayoutKnob::Margin,
        LayoutKnob::TextMargin,
        LayoutKnob::QrSize,
        LayoutKnob::LineSpacing,
        LayoutKnob::HorizontalSpacing,
        LayoutKnob::VerticalSpacing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayoutKnob::Margin => "margin",
            LayoutKnob::TextMargin => "text_margin",
            LayoutKnob::QrSize => "qr_size",
            LayoutKnob::LineSpacing => "line_spacing",
            LayoutKnob::HorizontalSpacing => "horizontal_spacing",
            LayoutKnob::VerticalSpacing => "vertical_spacing",
        }
    }

    /// Accepted range in points, matching the sliders of the label form.
    ///
    /// The layout engine never looks at these; only the command line checks them.
    pub fn bounds(&self) -> RangeInclusive<f64> {
        let cm = |lo: f64, hi: f64| Dimension::from_cm(lo).as_points()..=Dimension::from_cm(hi).as_points();
        match self {
            LayoutKnob::Margin => cm(1.0, 5.0),
            LayoutKnob::TextMargin => cm(0.1, 2.0),
            LayoutKnob::QrSize => cm(1.0, 5.0),
            LayoutKnob::LineSpacing => 6.0..=15.0,
            LayoutKnob::HorizontalSpacing => cm(1.0, 5.0),
            LayoutKnob::VerticalSpacing => cm(0.0, 5.0),
        }
    }

    /// Check a user-supplied value against [`LayoutKnob::bounds`].
    pub fn check(&self, value: Dimension) -> Result<f64, String> {
        let range = self.bounds();
        let pts = value.as_points();
        if range.contains(&pts) {
            Ok(pts)
        } else {
            Err(format!(
                "{} = {:.2} pt is outside the allowed range {:.2}..={:.2} pt",
                self.name(),
                pts,
                range.start(),
                range.end()
            ))
        }
    }
}

/// A text line that can be printed next to each QR code.
///
/// The derived ordering is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Field {
    Project,
    Id,
    Lid,
}

impl Field {
    /// Prefix printed before the value, e.g. `LID: L-0001`.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Project => "Project",
            Field::Id => "ID",
            Field::Lid => "LID",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "project" => Ok(Field::Project),
            "id" => Ok(Field::Id),
            "lid" => Ok(Field::Lid),
            other => Err(format!("unknown field '{}'. Supported: Project, ID, LID", other)),
        }
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which text lines are drawn beside each QR code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<Field>")]
pub struct FieldSelection(BTreeSet<Field>);

impl FieldSelection {
    pub fn all() -> Self {
        [Field::Project, Field::Id, Field::Lid].into_iter().collect()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }

    /// Selected fields in display order.
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.iter().copied()
    }
}

impl Default for FieldSelection {
    fn default() -> Self {
        [Field::Project, Field::Lid].into_iter().collect()
    }
}

impl FromIterator<Field> for FieldSelection {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        FieldSelection(iter.into_iter().collect())
    }
}

impl From<Vec<Field>> for FieldSelection {
    fn from(fields: Vec<Field>) -> Self {
        fields.into_iter().collect()
    }
}

/// QR error correction level, mirrors [`qrcode::EcLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

impl ErrorCorrection {
    pub fn ec_level(&self) -> qrcode::EcLevel {
        match self {
            ErrorCorrection::L => qrcode::EcLevel::L,
            ErrorCorrection::M => qrcode::EcLevel::M,
            ErrorCorrection::Q => qrcode::EcLevel::Q,
            ErrorCorrection::H => qrcode::EcLevel::H,
        }
    }
}

/// How labels are drawn, independent of where they go.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub font: StandardFont,
    #[serde(deserialize_with = "points")]
    pub font_size: f64,
    pub error_correction: ErrorCorrection,
    /// Light modules around the QR symbol.
    pub border: u32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font: StandardFont::HelveticaBold,
            font_size: 6.0,
            error_correction: ErrorCorrection::M,
            border: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub layout: LayoutParameters,
    pub fields: FieldSelection,
    pub style: LabelStyle,
}

/// Helper function to open a file with consistent error context
pub(crate) fn open_file_with_context(path: &Path, description: &str) -> Result<File> {
    File::open(path)
        .with_context(|| format!("Failed to open {} at {:?}", description, path))
}

pub fn load_settings_config(path: &Path) -> Result<Settings> {
    let file = open_file_with_context(path, "settings.json")?;
    let reader = BufReader::new(file);
    let settings: Settings = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(settings)
}
