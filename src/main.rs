use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qr_label_sheet::config::{load_settings_config, Dimension, Field, LayoutKnob, Settings};
use qr_label_sheet::generate_label_pdf;
use qr_label_sheet::table::load_csv_data;

/// Print a sheet of QR code labels from a CSV file.
#[derive(Parser, Debug)]
#[command(name = "qr_label_sheet")]
#[command(about = "Print a sheet of QR code labels from a CSV file.", long_about = None)]
struct Args {
    /// CSV file with at least the columns project, ID and lid
    #[arg(short, long)]
    input: PathBuf,

    /// Optional settings.json with layout, fields and style
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Where to write the PDF
    #[arg(short, long, default_value = "QR_file.pdf")]
    output: PathBuf,

    /// Text lines printed next to each code, e.g. "project,lid"
    #[arg(long, value_delimiter = ',')]
    fields: Vec<Field>,

    /// Page margin, e.g. "2.8 cm"
    #[arg(long)]
    margin: Option<Dimension>,

    /// Gap between a QR code and its text
    #[arg(long)]
    text_margin: Option<Dimension>,

    /// Side length of each QR code
    #[arg(long)]
    qr_size: Option<Dimension>,

    /// Distance between text baselines (points)
    #[arg(long)]
    line_spacing: Option<Dimension>,

    /// Gap between label columns
    #[arg(long)]
    horizontal_spacing: Option<Dimension>,

    /// Gap between label rows
    #[arg(long)]
    vertical_spacing: Option<Dimension>,
}

impl Args {
    fn layout_overrides(&self) -> [(LayoutKnob, Option<Dimension>); 6] {
        [
            (LayoutKnob::Margin, self.margin),
            (LayoutKnob::TextMargin, self.text_margin),
            (LayoutKnob::QrSize, self.qr_size),
            (LayoutKnob::LineSpacing, self.line_spacing),
            (LayoutKnob::HorizontalSpacing, self.horizontal_spacing),
            (LayoutKnob::VerticalSpacing, self.vertical_spacing),
        ]
    }
}

/// Settings file first, then command line overrides on top.
fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => {
            info!(?path, "loading settings");
            load_settings_config(path)?
        }
        None => Settings::default(),
    };

    for (knob, value) in args.layout_overrides() {
        if let Some(value) = value {
            let points = knob.check(value).map_err(|e| anyhow!(e))?;
            settings.layout.set(knob, points);
        }
    }

    if !args.fields.is_empty() {
        settings.fields = args.fields.iter().copied().collect();
    }

    Ok(settings)
}

fn run(args: Args) -> Result<()> {
    let settings = resolve_settings(&args)?;

    info!(path = ?args.input, "loading labels");
    let table = load_csv_data(&args.input)?;
    info!(rows = table.rows.len(), "rows loaded");

    let pdf_bytes = generate_label_pdf(&table, &settings)?;

    std::fs::write(&args.output, &pdf_bytes)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    info!(path = ?args.output, bytes = pdf_bytes.len(), "saved");

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
