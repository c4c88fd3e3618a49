//! fontsleuth CLI (made by FontLab https://www.fontlab.com/)

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use fontsleuth_core::discovery::{discover_pages, DiscoveredPage, DiscoveryOptions, PageSource};
use fontsleuth_core::fontfiles::{load_font_file, FontFileSource, LocalFonts};
use fontsleuth_core::fonts::{ActiveFont, DownloadedFontFile, FontFaceDeclaration};
use fontsleuth_core::http::{HttpFetcher, HttpNavigator, DEFAULT_USER_AGENT};
use fontsleuth_core::metadata::{ExtractFailure, FontMetadata};
use fontsleuth_core::output::{write_json_pretty, write_ndjson};
use fontsleuth_core::report::{annotate_downloads, build_font_report, FontReportEntry, ReportStatus};

const LOG_ENV: &str = "FONTSLEUTH_LOG";

/// CLI entrypoint for fontsleuth.
#[derive(Debug, Parser)]
#[command(
    name = "fontsleuth",
    version,
    about = "Webpage font inspection and provenance (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank same-site pages worth inspecting
    Discover(DiscoverArgs),
    /// Extract provenance metadata from font files
    Inspect(InspectArgs),
    /// Reconcile active fonts with downloaded files from a captured page
    Match(MatchArgs),
}

#[derive(Debug, Clone, Args)]
struct OutputArgs {
    /// Emit a single JSON array
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,

    /// Control colorized output (auto|always|never)
    #[arg(long = "color", default_value_t = ColorChoice::Auto, value_enum)]
    color: ColorChoice,
}

#[derive(Debug, Args)]
struct DiscoverArgs {
    /// Page to start from; a missing scheme means https
    #[arg(value_hint = ValueHint::Url)]
    url: String,

    /// Maximum number of pages to return
    #[arg(short = 'n', long = "max-pages", env = "FONTSLEUTH_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Timeout for the page navigation and sitemap fetches
    #[arg(long = "timeout-ms", default_value_t = 30_000)]
    timeout_ms: u64,

    /// Timeout for each well-known path probe
    #[arg(long = "probe-timeout-ms", default_value_t = 5_000)]
    probe_timeout_ms: u64,

    /// Maximum number of path probes in flight
    #[arg(long = "probe-concurrency", default_value_t = 16)]
    probe_concurrency: usize,

    /// Treat links to subdomains as same-site
    #[arg(long = "include-subdomains", action = ArgAction::SetTrue)]
    include_subdomains: bool,

    /// User-Agent header for every request
    #[arg(long = "user-agent", env = "FONTSLEUTH_USER_AGENT")]
    user_agent: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Font files or directories to inspect (`-` reads paths from STDIN)
    #[arg(value_hint = ValueHint::AnyPath, required_unless_present = "stdin_paths")]
    paths: Vec<PathBuf>,

    /// Read newline-delimited paths from STDIN
    #[arg(long = "stdin-paths", action = ArgAction::SetTrue)]
    stdin_paths: bool,

    /// Follow symlinks while walking directories
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue)]
    follow_symlinks: bool,

    /// Number of worker threads for extraction
    #[arg(short = 'J', long = "jobs")]
    jobs: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct MatchArgs {
    /// JSON capture with activeFonts, downloadedFonts and fontFaceDeclarations (`-` for STDIN)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// What the browser layer captured for one page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageCapture {
    active_fonts: Vec<ActiveFont>,
    downloaded_fonts: Vec<DownloadedFontFile>,
    font_face_declarations: Vec<FontFaceDeclaration>,
}

/// One inspected file: metadata on success, the typed failure otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectRecord {
    path: String,
    size: u64,
    metadata: Option<FontMetadata>,
    error: Option<ExtractFailure>,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Discover(args) => run_discover(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Match(args) => run_match(args),
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn discovery_options(args: &DiscoverArgs) -> DiscoveryOptions {
    DiscoveryOptions::default()
        .with_max_pages(args.max_pages.max(1))
        .with_timeout_ms(args.timeout_ms)
        .with_probe_timeout_ms(args.probe_timeout_ms)
        .with_probe_concurrency(args.probe_concurrency.max(1))
        .include_subdomains(args.include_subdomains)
}

fn run_discover(args: DiscoverArgs) -> Result<()> {
    let options = discovery_options(&args);
    let user_agent = args.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let fetcher = HttpFetcher::new(user_agent)?;
    let navigator = HttpNavigator::new(user_agent)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let pages = runtime.block_on(discover_pages(&args.url, &options, &fetcher, &navigator));
    tracing::info!(url = %args.url, pages = pages.len(), "discovery finished");

    emit(&args.output, &pages, write_pages_plain)
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let stdin = io::stdin();
    let roots = gather_paths(&args.paths, args.stdin_paths, stdin.lock())?;
    let files = LocalFonts::new(roots)
        .follow_symlinks(args.follow_symlinks)
        .collect()?;
    let records = inspect_files(&files, args.jobs)?;

    emit(&args.output, &records, write_inspect_plain)
}

fn inspect_files(files: &[PathBuf], jobs: Option<usize>) -> Result<Vec<InspectRecord>> {
    let downloads = files
        .iter()
        .map(|path| load_font_file(path))
        .collect::<Result<Vec<_>>>()?;
    let paths: HashMap<String, String> = downloads
        .iter()
        .zip(files)
        .map(|(download, path)| (download.file.url.clone(), path.display().to_string()))
        .collect();

    let annotated = match jobs {
        Some(0) => return Err(anyhow!("--jobs must be at least 1")),
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("building worker pool")?
            .install(|| annotate_downloads(downloads)),
        None => annotate_downloads(downloads),
    };

    let mut failures: HashMap<String, ExtractFailure> = annotated
        .failures
        .into_iter()
        .map(|failure| (failure.url, failure.failure))
        .collect();

    Ok(annotated
        .fonts
        .into_iter()
        .map(|file| InspectRecord {
            path: paths.get(&file.url).cloned().unwrap_or_else(|| file.url.clone()),
            size: file.size,
            error: failures.remove(&file.url),
            metadata: file.metadata,
        })
        .collect())
}

fn run_match(args: MatchArgs) -> Result<()> {
    let capture = read_capture(&args.input)?;
    let report = build_font_report(
        &capture.active_fonts,
        &capture.downloaded_fonts,
        &capture.font_face_declarations,
    );

    emit(&args.output, &report, write_report_plain)
}

fn read_capture(input: &Path) -> Result<PageCapture> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading capture from STDIN")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };
    parse_capture(&raw)
}

fn parse_capture(raw: &str) -> Result<PageCapture> {
    serde_json::from_str(raw).context("parsing page capture JSON")
}

fn emit<T: Serialize>(
    output: &OutputArgs,
    records: &[T],
    plain: fn(&[T], &mut dyn Write, bool) -> Result<()>,
) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let use_color = match output.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => handle.is_terminal(),
    };

    if output.ndjson {
        write_ndjson(records, &mut handle)?;
    } else if output.json {
        write_json_pretty(records, &mut handle)?;
    } else {
        plain(records, &mut handle, use_color)?;
    }
    handle.flush()?;

    Ok(())
}

fn gather_paths(
    raw_paths: &[PathBuf],
    read_stdin: bool,
    mut stdin: impl BufRead,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    if read_stdin {
        paths.extend(read_paths_from(&mut stdin)?);
    }

    for path in raw_paths {
        if path == Path::new("-") {
            paths.extend(read_paths_from(&mut stdin)?);
        } else {
            paths.push(path.clone());
        }
    }

    if paths.is_empty() {
        return Err(anyhow!("no font paths provided"));
    }

    Ok(paths)
}

fn read_paths_from(reader: &mut impl BufRead) -> Result<Vec<PathBuf>> {
    let mut buf = String::new();
    let mut paths = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_line(&mut buf)?;
        if read == 0 {
            break;
        }

        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }

    Ok(paths)
}

fn write_pages_plain(pages: &[DiscoveredPage], w: &mut dyn Write, color: bool) -> Result<()> {
    for page in pages {
        let priority = apply_color(&format!("{:>3}", page.priority), color, AnsiColor::Yellow);
        let source = apply_color(&format!("{:<13}", source_label(page.source)), color, AnsiColor::Green);
        let url = apply_color(&page.url, color, AnsiColor::Cyan);
        match &page.title {
            Some(title) => writeln!(w, "{priority}  {source}  {url}  {title}")?,
            None => writeln!(w, "{priority}  {source}  {url}")?,
        }
    }
    Ok(())
}

fn write_inspect_plain(records: &[InspectRecord], w: &mut dyn Write, color: bool) -> Result<()> {
    for record in records {
        let path = apply_color(&record.path, color, AnsiColor::Cyan);
        match (&record.metadata, &record.error) {
            (Some(meta), _) => {
                let name = meta.font_name.as_deref().unwrap_or("(unnamed)");
                let foundry = meta.foundry.as_deref().unwrap_or("-");
                let license = meta.license_info.as_deref().unwrap_or("-");
                writeln!(
                    w,
                    "{path}  {}  {foundry}  {license}",
                    apply_color(name, color, AnsiColor::Yellow)
                )?;
            }
            (None, Some(failure)) => {
                let kind = apply_color(&format!("{:?}", failure.kind), color, AnsiColor::Red);
                writeln!(w, "{path}  {kind}: {}", failure.message)?;
            }
            (None, None) => writeln!(w, "{path}")?,
        }
    }
    Ok(())
}

fn write_report_plain(entries: &[FontReportEntry], w: &mut dyn Write, color: bool) -> Result<()> {
    for entry in entries {
        let family = apply_color(&entry.family, color, AnsiColor::Yellow);
        match entry.status {
            ReportStatus::Matched => {
                let urls: Vec<&str> = entry.files.iter().map(|f| f.url.as_str()).collect();
                writeln!(
                    w,
                    "{family}  ({} elements)  {}",
                    entry.element_count,
                    apply_color(&urls.join(", "), color, AnsiColor::Cyan)
                )?;
            }
            ReportStatus::NoFontFile => {
                writeln!(
                    w,
                    "{family}  ({} elements)  {}",
                    entry.element_count,
                    apply_color("no font file found", color, AnsiColor::Red)
                )?;
            }
        }
    }
    Ok(())
}

fn source_label(source: PageSource) -> &'static str {
    match source {
        PageSource::Original => "original",
        PageSource::Sitemap => "sitemap",
        PageSource::InternalLink => "internal-link",
        PageSource::CommonPath => "common-path",
    }
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Cyan,
    Yellow,
    Green,
    Red,
}

fn apply_color(text: &str, color: bool, code: AnsiColor) -> String {
    if !color {
        return text.to_string();
    }

    let code_str = match code {
        AnsiColor::Cyan => "36",
        AnsiColor::Yellow => "33",
        AnsiColor::Green => "32",
        AnsiColor::Red => "31",
    };

    format!("\u{1b}[{}m{}\u{1b}[0m", code_str, text)
}
