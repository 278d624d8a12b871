use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_resize::paper::{Orientation, PaperFormat, detect, format_code};
use pdf_resize::units::{LengthUnit, format_mm, parse_length, parse_quantity};
use pdf_resize::{
    Color, DocumentRenderer, ExecutionMode, ExportOptions, ExportState, Exporter, FsSink,
    Ghostscript, NamingContext, PaddingPolicy, PageSelection, SizeSpec, load_source,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdfr", about = "Resize PDF pages and images to PDF or PNG", version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show page count and page sizes of a source
    Info {
        /// Input PDF or image
        input: PathBuf,

        /// Resolution assumed for image sources
        #[arg(long, default_value = "72")]
        source_ppi: f64,
    },

    /// Resolve output files and conflicts without writing anything
    Plan(JobArgs),

    /// Resize and write the output files
    Resize {
        #[command(flatten)]
        job: JobArgs,

        /// What to do with files that already exist
        #[arg(long, default_value = "abort", value_enum)]
        on_conflict: ConflictArg,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Input PDF or image
    #[arg(short, long)]
    input: PathBuf,

    /// Export job file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Subfolder created inside the output directory
    #[arg(long)]
    subfolder: Option<String>,

    /// Filename template; tokens: *size*, *YYMMDD*, *DDMMYY*
    #[arg(short, long)]
    name: Option<String>,

    /// Output size, e.g. pdf:fill:A4, pdf:width:150mm, png:ppi:300 (repeatable)
    #[arg(short, long = "spec", value_parser = parse_spec)]
    specs: Vec<SizeSpec>,

    /// Export every page
    #[arg(long, conflicts_with = "page")]
    all_pages: bool,

    /// Export one page (1-based)
    #[arg(long)]
    page: Option<usize>,

    /// Margin for every spec: millimetres for PDF, pixels for PNG
    #[arg(long)]
    margin: Option<f64>,

    /// Whether the margin is inside the stated size or added around it
    #[arg(long, value_enum)]
    padding: Option<PaddingArg>,

    /// Remove this much from every source edge (e.g. 3mm, 0.125in)
    #[arg(long, value_parser = parse_length)]
    trim: Option<f64>,

    /// Background colour as #rrggbb
    #[arg(long, value_parser = parse_color)]
    background: Option<Color>,

    /// Resolution assumed for image sources
    #[arg(long)]
    source_ppi: Option<f64>,

    /// Render this many files at once
    #[arg(long)]
    workers: Option<usize>,

    /// Convert text in PDF outputs to outlines with Ghostscript
    #[arg(long)]
    flatten: bool,

    /// Write the resulting job file here
    #[arg(long)]
    save_config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaddingArg {
    Inside,
    Outside,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConflictArg {
    Overwrite,
    Skip,
    Abort,
}

impl From<PaddingArg> for PaddingPolicy {
    fn from(arg: PaddingArg) -> Self {
        match arg {
            PaddingArg::Inside => Self::Inside,
            PaddingArg::Outside => Self::Outside,
        }
    }
}

/// Parse `<format>:<mode>:<value>`
fn parse_spec(s: &str) -> Result<SizeSpec, String> {
    let parts: Vec<&str> = s.splitn(3, ':').collect();
    let &[format, mode, value] = parts.as_slice() else {
        return Err(format!("expected <format>:<mode>:<value>, got '{}'", s));
    };

    match (format.to_ascii_lowercase().as_str(), mode.to_ascii_lowercase().as_str()) {
        ("pdf", "fill") => {
            let (width, height) = match paper_size(value) {
                Some(size) => size,
                None => parse_pair(value, parse_length)?,
            };
            Ok(SizeSpec::pdf_fill(width, height))
        }
        ("pdf", "width") => Ok(SizeSpec::pdf_width(parse_length(value)?)),
        ("pdf", "height") => Ok(SizeSpec::pdf_height(parse_length(value)?)),
        ("pdf", "scale") => Ok(SizeSpec::pdf_scale(parse_number(value)?)),
        ("png", "fill") => {
            let (width, height) = parse_pair(value, parse_pixels)?;
            Ok(SizeSpec::png_fill(width, height))
        }
        ("png", "width") => Ok(SizeSpec::png_width(parse_pixels(value)?)),
        ("png", "height") => Ok(SizeSpec::png_height(parse_pixels(value)?)),
        ("png", "ppi") => Ok(SizeSpec::png_ppi(parse_number(value)?)),
        _ => Err(format!("unknown size '{}:{}'", format, mode)),
    }
}

/// `<width>x<height>`
fn parse_pair(value: &str, parse: fn(&str) -> Result<f64, String>) -> Result<(f64, f64), String> {
    match value.split_once(['x', 'X']) {
        Some((width, height)) => Ok((parse(width)?, parse(height)?)),
        None => Err(format!("expected <width>x<height>, got '{}'", value)),
    }
}

/// Paper name with an optional `v`/`h` orientation suffix, e.g. `A4` or `A5h`
fn paper_size(value: &str) -> Option<(f64, f64)> {
    let value = value.trim();
    if let Some(format) = PaperFormat::from_name(value) {
        return Some(format.dimensions_with_orientation(Orientation::Portrait));
    }
    let (split, suffix) = value.char_indices().last()?;
    let orientation = match suffix {
        'v' | 'V' => Orientation::Portrait,
        'h' | 'H' => Orientation::Landscape,
        _ => return None,
    };
    PaperFormat::from_name(&value[..split]).map(|format| format.dimensions_with_orientation(orientation))
}

fn parse_pixels(s: &str) -> Result<f64, String> {
    match parse_quantity(s)? {
        (value, None | Some(LengthUnit::Px)) => Ok(value),
        _ => Err(format!("'{}' is not a pixel count", s)),
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid number '{}'", s))
}

fn parse_color(s: &str) -> Result<Color, String> {
    Color::from_hex(s).ok_or_else(|| format!("expected #rrggbb, got '{}'", s))
}

/// Job file (if any) with command-line overrides applied
async fn build_options(job: &JobArgs) -> Result<ExportOptions> {
    let mut options = match &job.config {
        Some(path) => ExportOptions::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExportOptions::default(),
    };

    if !job.specs.is_empty() {
        options.specs = job.specs.clone();
    }
    if job.margin.is_some() || job.padding.is_some() {
        for spec in &mut options.specs {
            if let Some(margin) = job.margin {
                spec.margin = margin;
            }
            if let Some(padding) = job.padding {
                spec.padding = padding.into();
            }
        }
    }
    if let Some(dir) = &job.out_dir {
        options.output_dir = dir.clone();
    }
    if job.subfolder.is_some() {
        options.subfolder = job.subfolder.clone();
    }
    if let Some(name) = &job.name {
        options.base_name = name.clone();
    }
    if job.all_pages {
        options.selection = PageSelection::All;
    } else if let Some(page) = job.page {
        if page == 0 {
            bail!("--page is 1-based");
        }
        options.selection = PageSelection::Current(page - 1);
    }
    if let Some(trim) = job.trim {
        options.trim = trim;
    }
    if let Some(background) = job.background {
        options.background = background;
    }
    if let Some(ppi) = job.source_ppi {
        options.source_ppi = ppi;
    }
    if job.flatten {
        options.flatten = true;
    }
    if let Some(workers) = job.workers {
        options.execution = if workers > 1 {
            ExecutionMode::Concurrent { workers }
        } else {
            ExecutionMode::Sequential
        };
    }

    options.validate()?;
    if let Some(path) = &job.save_config {
        options.save(path).await?;
        println!("Saved job → {}", path.display());
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Info { input, source_ppi } => {
            let source = load_source(&input, source_ppi).await?;
            println!("{}: {:?}, {} page(s)", input.display(), source.kind(), source.page_count());
            for index in 0..source.page_count() {
                let (width, height) = source.page_size(index)?;
                let paper = detect(width, height)
                    .map(|(format, orientation)| format!(" ({})", format_code(format, orientation)))
                    .unwrap_or_default();
                println!(
                    "  page {}: {} x {} mm{}",
                    index + 1,
                    format_mm(width),
                    format_mm(height),
                    paper
                );
            }
        }

        Commands::Plan(job) => {
            let options = build_options(&job).await?;
            let source = load_source(&job.input, options.source_ppi).await?;
            let exporter = Exporter::new(DocumentRenderer, FsSink);
            let run = exporter
                .plan(source, &options, &NamingContext::today())
                .await?;

            for (task, entry) in run.tasks().iter().zip(run.entries()) {
                let marker = if entry.is_conflict { "exists" } else { "new" };
                println!(
                    "  [{}] {} ({} page(s), size {})",
                    marker,
                    task.path.display(),
                    task.pages.len(),
                    task.spec_index + 1
                );
            }
            if run.state() == ExportState::AwaitingUserDecision {
                println!("{} file(s) already exist", run.conflicts().count());
            }
            run.cancel();
        }

        Commands::Resize { job, on_conflict } => {
            let options = build_options(&job).await?;
            if options.flatten {
                let version = Ghostscript::default()
                    .version()
                    .await
                    .context("--flatten needs Ghostscript (set PDF_RESIZE_GS or add gs to PATH)")?;
                log::info!("Flattening with Ghostscript {}", version);
            }
            let source = load_source(&job.input, options.source_ppi).await?;
            let exporter = Exporter::new(DocumentRenderer, FsSink);
            let mut run = exporter
                .plan(source, &options, &NamingContext::today())
                .await?;

            if run.state() == ExportState::AwaitingUserDecision {
                for entry in run.conflicts() {
                    println!("Exists: {}", entry.path.display());
                }
                match on_conflict {
                    ConflictArg::Overwrite => run.overwrite_all(true),
                    ConflictArg::Skip => run.overwrite_all(false),
                    ConflictArg::Abort => {
                        let count = run.conflicts().count();
                        run.cancel();
                        bail!(
                            "{} output file(s) already exist; use --on-conflict overwrite or skip",
                            count
                        );
                    }
                }
            }

            let report = run.execute().await?;
            for path in &report.written {
                println!("Wrote {}", path.display());
            }
            for path in &report.skipped {
                println!("Skipped {}", path.display());
            }
            for failure in &report.errors {
                eprintln!("Failed {}: {}", failure.path.display(), failure.message);
            }
            if !report.is_success() {
                bail!(
                    "{} of {} file(s) failed",
                    report.errors.len(),
                    report.written.len() + report.errors.len()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_resize::{PpiLock, RasterMode, SizeMode, VectorMode};

    #[test]
    fn test_parse_pdf_specs() {
        assert_eq!(parse_spec("pdf:fill:100x50").unwrap(), SizeSpec::pdf_fill(100.0, 50.0));
        assert_eq!(parse_spec("pdf:width:150").unwrap(), SizeSpec::pdf_width(150.0));
        assert_eq!(parse_spec("PDF:scale:0.5").unwrap(), SizeSpec::pdf_scale(0.5));

        let spec = parse_spec("pdf:height:2in").unwrap();
        let SizeMode::Vector(VectorMode::Fit { length, .. }) = spec.mode else {
            panic!("expected fit");
        };
        assert!((length - 50.8).abs() < 1e-9);
    }

    #[test]
    fn test_parse_paper_fill() {
        assert_eq!(parse_spec("pdf:fill:A4").unwrap(), SizeSpec::pdf_fill(210.0, 297.0));
        assert_eq!(parse_spec("pdf:fill:a5h").unwrap(), SizeSpec::pdf_fill(210.0, 148.0));
        assert!(parse_spec("png:fill:A4").is_err());
    }

    #[test]
    fn test_parse_png_specs() {
        assert_eq!(parse_spec("png:fill:800x600").unwrap(), SizeSpec::png_fill(800.0, 600.0));
        assert_eq!(
            parse_spec("png:ppi:300").unwrap().mode,
            SizeMode::Raster(RasterMode::Scale(PpiLock::Ppi(300.0)))
        );
        assert!(parse_spec("png:width:3in").is_err());
    }

    #[test]
    fn test_flatten_flag() {
        let cli = Cli::try_parse_from([
            "pdfr", "resize", "-i", "in.pdf", "-s", "pdf:fill:A4", "--flatten",
        ])
        .unwrap();
        let Commands::Resize { job, .. } = cli.command else {
            panic!("expected resize");
        };
        assert!(job.flatten);
    }

    #[test]
    fn test_parse_spec_rejects_garbage() {
        assert!(parse_spec("pdf:fill").is_err());
        assert!(parse_spec("tiff:fill:1x1").is_err());
        assert!(parse_spec("pdf:scale:abc").is_err());
    }
}
