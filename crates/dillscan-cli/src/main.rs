//! dillscan - Inspect the headers of Kernel (.dill) program containers
//!
//! This tool validates kernel files, reports whether they hold one or
//! several concatenated programs, and prints where each section lives.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use dillscan_core::{DecodeError, Error as CoreError, FileLoader, LoaderConfig, Program};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect the headers of Kernel (.dill) program containers
#[derive(Parser, Debug)]
#[command(name = "dillscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "summary")]
    format: OutputFormat,

    /// Skip files larger than this many bytes
    #[arg(long, default_value_t = LoaderConfig::default().max_file_size)]
    max_file_size: u64,

    /// File extension to look for when walking a directory
    #[arg(long, default_value = "dill")]
    extension: String,

    /// Exit with an error if any file fails to decode
    #[arg(long)]
    strict: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single kernel file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of kernel files to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for decoded headers
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One line per file
    Summary,
    /// Every section offset, one per line
    Offsets,
    /// Just the path of each valid file (for scripting)
    Filename,
}

/// Tracks file digests so identical files are decoded once
#[derive(Default)]
struct DigestRegistry {
    /// Maps content digest -> first path seen with it
    seen: HashMap<String, PathBuf>,
    /// Statistics
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    total_found: usize,
    duplicates_skipped: usize,
    decoded: usize,
    failed: usize,
    multi_program: usize,
}

impl DigestRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 16 chars of blake3)
    fn content_hash(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hash.to_hex()[..16].to_string()
    }

    /// Register a file, returning the earlier path if its content was seen
    fn register(&mut self, path: &Path, content_hash: &str) -> Option<PathBuf> {
        self.stats.total_found += 1;

        if let Some(first) = self.seen.get(content_hash) {
            debug!(
                "Skipping duplicate: {} (same as {}, hash: {})",
                path.display(),
                first.display(),
                content_hash
            );
            self.stats.duplicates_skipped += 1;
            return Some(first.clone());
        }

        self.seen.insert(content_hash.to_string(), path.to_path_buf());
        None
    }

    fn record(&mut self, program: &Program) {
        self.stats.decoded += 1;
        if !program.is_single_program() {
            self.stats.multi_program += 1;
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} found, {} decoded, {} failed, {} duplicates skipped, {} multi-program",
            self.stats.total_found,
            self.stats.decoded,
            self.stats.failed,
            self.stats.duplicates_skipped,
            self.stats.multi_program
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let loader = FileLoader::with_config(LoaderConfig::new().max_file_size(cli.max_file_size));
    let mut registry = DigestRegistry::new();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, &loader, file, &mut registry)?;
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, &loader, directory, &mut registry)?;
    } else {
        bail!("Either --file or --directory must be specified")
    }

    registry.print_summary();

    if cli.strict && registry.stats.failed > 0 {
        bail!("{} file(s) failed to decode", registry.stats.failed);
    }

    Ok(())
}

/// Process a single kernel file
fn process_single_file(
    cli: &Cli,
    loader: &FileLoader,
    file: &Path,
    registry: &mut DigestRegistry,
) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    if let Err(e) = process_kernel(cli, loader, file, registry) {
        registry.stats.failed += 1;
        return Err(e);
    }
    Ok(())
}

/// Process a directory of kernel files recursively
fn process_directory(
    cli: &Cli,
    loader: &FileLoader,
    directory: &Path,
    registry: &mut DigestRegistry,
) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut files_processed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if !has_extension(path, &cli.extension) {
            trace!("Skipping: {}", path.display());
            continue;
        }

        if let Err(e) = process_kernel(cli, loader, path, registry) {
            // Log error but continue with other files
            warn!("{:#}", e);
            registry.stats.failed += 1;
        }
        files_processed += 1;
    }

    info!("Processed {} kernel files", files_processed);
    Ok(())
}

/// Case-insensitive extension match
fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}

/// Load, deduplicate and decode one file, then print it
fn process_kernel(
    cli: &Cli,
    loader: &FileLoader,
    path: &Path,
    registry: &mut DigestRegistry,
) -> Result<()> {
    let data = loader
        .load_path(path)
        .with_context(|| format!("Failed to load kernel file: {}", path.display()))?;

    let content_hash = DigestRegistry::content_hash(&data);
    if registry.register(path, &content_hash).is_some() {
        return Ok(());
    }

    let program = Program::read_from_bytes(data).map_err(|e| {
        let hint = decode_hint(&e);
        anyhow::Error::new(CoreError::from(e))
            .context(format!("{}: {}", path.display(), hint))
    })?;

    registry.record(&program);
    println!("{}", render(cli.format, path, &program));
    Ok(())
}

/// What the user should make of a decode failure
fn decode_hint(err: &DecodeError) -> &'static str {
    if err.is_unsupported_version() {
        "unsupported kernel format version, recompile with a matching SDK"
    } else {
        "not a valid kernel file"
    }
}

/// Format a decoded program for output
fn render(format: OutputFormat, path: &Path, program: &Program) -> String {
    match format {
        OutputFormat::Filename => path.display().to_string(),
        OutputFormat::Summary => {
            let main = program
                .main_method_reference()
                .map(|index| index.to_string())
                .unwrap_or_else(|| "none".to_string());
            format!(
                "{}: version {}, {} libraries, {}, main {}",
                path.display(),
                program.binary_version(),
                program.library_count(),
                if program.is_single_program() {
                    "single program"
                } else {
                    "concatenated programs"
                },
                main
            )
        }
        OutputFormat::Offsets => {
            let rows = [
                ("source_table", program.source_table_offset()),
                ("name_table", program.name_table_offset()),
                ("metadata_payloads", program.metadata_payloads_offset()),
                ("metadata_mappings", program.metadata_mappings_offset()),
                ("string_table", program.string_table_offset()),
                ("constant_table", program.constant_table_offset()),
            ];
            let mut out = format!("{} ({} bytes)", path.display(), program.kernel_data().len());
            for (name, offset) in rows {
                out.push_str(&format!("\n  {:<18} {:#010x}", name, offset));
            }
            out
        }
    }
}
