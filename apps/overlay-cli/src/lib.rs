//! Command-line front end for the overlay exporter
//!
//! `export` bakes an element bundle (text boxes, annotations, form values
//! as JSON) into a copy of a PDF. `info` prints what the editor would see
//! when opening a document.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use overlay_core::page_info::page_geometries_from_bytes;
use overlay_core::{
    detect_form_fields, edited_file_name, has_signatures, DetectedField, EditorConfig,
    ElementBundle, ExportJob, ExportReport, ExportRequest, PageGeometry,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "overlay-cli")]
#[command(version, about = "Bake overlay edits into PDF documents")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write `<name>-edited.pdf` with the given elements baked in.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON bundle with `text`, `fields` and `annotations` arrays
        #[arg(long, value_name = "JSON")]
        elements: PathBuf,
        /// Editor config (TOML)
        #[arg(long, value_name = "TOML")]
        config: Option<PathBuf>,
        /// Output directory, defaults to the input's directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Print the export report as JSON after the output path
        #[arg(long)]
        report: bool,
    },
    /// Print page sizes and form fields as JSON.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: usize,
    signed: bool,
    pages: Vec<PageGeometry>,
    fields: Vec<DetectedField>,
}

#[derive(Debug, Serialize)]
struct ExportSummary<'a> {
    output: String,
    report: &'a ExportReport,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Export {
            file,
            elements,
            config,
            out_dir,
            report,
        } => {
            let output = run_export(&file, &elements, config.as_deref(), out_dir.as_deref())?;
            if report {
                let summary = ExportSummary {
                    output: output.path.display().to_string(),
                    report: &output.report,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", output.path.display());
            }
            Ok(())
        }
        Commands::Info { file } => run_info(&file),
    }
}

/// Where an export landed and what it did
#[derive(Debug)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub report: ExportReport,
}

pub fn run_export(
    file: &Path,
    elements: &Path,
    config: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<ExportedFile> {
    let config = match config {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::default(),
    };
    config.validate()?;

    let base = read_pdf(file)?;
    if has_signatures(&base).context("failed to parse PDF")? {
        anyhow::bail!(
            "{} is digitally signed; editing would invalidate the signature",
            file.display()
        );
    }

    let json = fs::read_to_string(elements)
        .with_context(|| format!("failed to read elements from {}", elements.display()))?;
    let bundle = ElementBundle::from_json(&json)
        .with_context(|| format!("invalid elements in {}", elements.display()))?;
    let detected = detect_form_fields(&base).context("failed to read form fields")?;

    let request = ExportRequest {
        text_elements: bundle.text_elements(&config.default_text_style())?,
        form_fields: bundle.form_fields(&detected),
        annotations: bundle.annotations()?,
        base: base.into(),
    };
    let output = ExportJob::new(request, config.export_options())
        .run()
        .context("export failed")?;

    let source_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(edited_file_name(source_name, &config.output_suffix));
    fs::write(&path, &output.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(
        output = %path.display(),
        text = output.report.text_embedded,
        fields = output.report.fields_applied,
        annotations = output.report.annotations_drawn,
        skipped = output.report.skipped.len(),
        "wrote edited document"
    );
    Ok(ExportedFile {
        path,
        report: output.report,
    })
}

fn run_info(file: &Path) -> Result<()> {
    let bytes = read_pdf(file)?;
    let pages = page_geometries_from_bytes(&bytes).context("failed to open PDF")?;
    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: pages.len(),
        signed: has_signatures(&bytes)?,
        fields: detect_form_fields(&bytes)?,
        pages,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        anyhow::bail!("file does not exist: {}", path.display());
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
