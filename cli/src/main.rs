//! rendoc CLI - document template rendering tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use rendoc::{
    load_record, load_template, ChromeRenderer, OutputFormat, PaperSize, PdfOptions,
    RenderOptions, Renderer, SectionTemplate, Template,
};

#[derive(Parser)]
#[command(name = "rendoc")]
#[command(version)]
#[command(about = "Render document templates to DOCX, PDF, HTML, JSON and text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against one record
    Render {
        /// Template JSON file
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Record JSON file
        #[arg(value_name = "RECORD")]
        record: PathBuf,

        /// Output file (stdout for text formats if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to the template's format, then docx)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Check a template and report every error and warning
    Validate {
        /// Template JSON file
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,
    },

    /// Render a template against every record of a JSON array
    Batch {
        /// Template JSON file
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// JSON file holding an array of records
        #[arg(value_name = "RECORDS")]
        records: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Output format (defaults to the template's format, then docx)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Record field used as file name, e.g. "cliente.codice"
        #[arg(long, value_name = "PATH")]
        name_field: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Show template information
    Info {
        /// Template JSON file
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Omit section titles
    #[arg(long)]
    no_titles: bool,

    /// Paper size
    #[arg(long, value_enum, default_value = "a4")]
    paper: Paper,

    /// Headless browser used for PDF output
    #[arg(long, env = "RENDOC_CHROME_BIN", value_name = "PATH")]
    browser: Option<PathBuf>,
}

impl RenderArgs {
    fn renderer(&self) -> Renderer {
        Renderer::new().with_options(
            RenderOptions::new()
                .with_section_titles(!self.no_titles)
                .with_paper(self.paper.into()),
        )
    }

    fn page_renderer(&self) -> ChromeRenderer {
        match &self.browser {
            Some(path) => ChromeRenderer::with_options(PdfOptions::new().with_browser(path)),
            None => ChromeRenderer::new(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Word-processor document
    Docx,
    /// Fixed-layout pages (needs Chrome/Chromium)
    Pdf,
    /// Print-styled HTML
    Html,
    /// Document tree as JSON
    Json,
    /// Plain text
    Text,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Docx => OutputFormat::Docx,
            Format::Pdf => OutputFormat::Pdf,
            Format::Html => OutputFormat::Html,
            Format::Json => OutputFormat::Json,
            Format::Text => OutputFormat::Text,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Paper {
    /// ISO A4
    A4,
    /// US Letter
    Letter,
}

impl From<Paper> for PaperSize {
    fn from(paper: Paper) -> Self {
        match paper {
            Paper::A4 => PaperSize::A4,
            Paper::Letter => PaperSize::Letter,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            template,
            record,
            output,
            format,
            render,
        } => cmd_render(&template, &record, output.as_deref(), format, &render),
        Commands::Validate { template } => cmd_validate(&template),
        Commands::Batch {
            template,
            records,
            output,
            format,
            name_field,
            render,
        } => cmd_batch(
            &template,
            &records,
            &output,
            format,
            name_field.as_deref(),
            &render,
        ),
        Commands::Info { template } => cmd_info(&template),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn output_format(template: &Template, format: Option<Format>) -> OutputFormat {
    format
        .map(OutputFormat::from)
        .or_else(|| template.format.map(OutputFormat::from))
        .unwrap_or_default()
}

fn is_binary(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Docx | OutputFormat::Pdf)
}

fn cmd_render(
    template_path: &Path,
    record_path: &Path,
    output: Option<&Path>,
    format: Option<Format>,
    args: &RenderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(template_path)?;
    let record = load_record(record_path)?;
    let format = output_format(&template, format);

    let rendered = args.renderer().render(&template, &record)?;
    let bytes = rendered.to_bytes(format, &args.page_renderer())?;

    match output {
        Some(path) => {
            fs::write(path, &bytes)?;
            println!("{} {}", "Saved to".green(), path.display());
        }
        None if is_binary(format) => {
            let stem = template_path.file_stem().unwrap_or_default().to_string_lossy();
            let path = PathBuf::from(format!("{}.{}", stem, format.extension()));
            fs::write(&path, &bytes)?;
            println!("{} {}", "Saved to".green(), path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }

    Ok(())
}

fn cmd_validate(template_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(template_path)?;
    let report = rendoc::validate(&template);

    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    for error in &report.errors {
        println!("{} {}", "error:".red().bold(), error);
    }

    if report.is_valid() {
        println!(
            "{} {} sections, {} warnings",
            "Valid:".green().bold(),
            template.sections.len(),
            report.warnings.len()
        );
        Ok(())
    } else {
        Err(format!("{} errors found", report.errors.len()).into())
    }
}

fn cmd_batch(
    template_path: &Path,
    records_path: &Path,
    output_dir: &Path,
    format: Option<Format>,
    name_field: Option<&str>,
    args: &RenderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(template_path)?;
    let records = match load_record(records_path)? {
        Value::Array(records) => records,
        _ => return Err("records file must hold a JSON array".into()),
    };
    let format = output_format(&template, format);
    fs::create_dir_all(output_dir)?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Rendering...");

    let renderer = args.renderer();
    let results = renderer.render_batch_with(&template, &records, |_, _| pb.inc(1));
    pb.finish_with_message("Done!");

    let page_renderer = args.page_renderer();
    let mut written = 0;
    let mut failed = 0;
    for (index, (record, result)) in records.iter().zip(results).enumerate() {
        let name = file_name(record, index, name_field);
        let bytes = result.and_then(|rendered| rendered.to_bytes(format, &page_renderer));
        match bytes {
            Ok(bytes) => {
                let path = output_dir.join(format!("{}.{}", name, format.extension()));
                fs::write(&path, &bytes)?;
                written += 1;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "Failed".red(), name, e);
                failed += 1;
            }
        }
    }

    println!(
        "\n{} {} written, {} failed, in {}",
        "Done!".green().bold(),
        written,
        failed,
        output_dir.display()
    );

    if failed > 0 {
        Err(format!("{} records failed", failed).into())
    } else {
        Ok(())
    }
}

fn file_name(record: &Value, index: usize, name_field: Option<&str>) -> String {
    let named = name_field
        .and_then(|path| rendoc::record::resolve(record, path))
        .map(|value| rendoc::record::to_display_string(Some(value.as_ref())))
        .map(|name| sanitize(&name))
        .filter(|name| !name.is_empty());
    named.unwrap_or_else(|| format!("record_{:04}", index + 1))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

fn cmd_info(template_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(template_path)?;
    let metadata = template.metadata();
    let margins = metadata.margins();

    println!("{}", "Template Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), template_path.display());
    println!(
        "{}: {}",
        "Format".bold(),
        output_format(&template, None).extension()
    );
    println!("{}: {} {}pt", "Font".bold(), metadata.font(), metadata.font_size());
    println!(
        "{}: top {} / right {} / bottom {} / left {} cm",
        "Margins".bold(),
        margins.top,
        margins.right,
        margins.bottom,
        margins.left
    );
    println!("{}: {}", "Partials".bold(), template.partials.len());

    println!();
    println!("{}", "Sections".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    for section in &template.sections {
        let detail = match &section.template {
            SectionTemplate::Text(source) => format!("{} chars", source.len()),
            SectionTemplate::Table(table) => format!("{} columns", table.headers.len()),
            SectionTemplate::Conditional(blocks) => format!("{} blocks", blocks.len()),
        };
        let id = if section.enabled {
            section.id.normal()
        } else {
            section.id.dimmed()
        };
        println!(
            "  {} [{}] {} ({})",
            id,
            section.kind.as_str(),
            section.title,
            detail
        );
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "rendoc".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Document template rendering tool");
    println!();
    println!("License: MIT");
}
