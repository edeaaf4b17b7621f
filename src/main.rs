//! Command-line interface for streaming ZIP archives.
//!
//! Lists and extracts entries from local files or remote HTTP URLs,
//! driving the library's chunked streams so that even large entries never
//! sit in memory whole.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use zipstream::{
    Cli, EntryStream, HttpRangeReader, LocalFileReader, ReadAt, StreamOptions, ZipArchive,
    ZipEntry,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.is_http_url() {
        // Remote archive via HTTP Range requests.
        let reader = Arc::new(HttpRangeReader::new(cli.file.clone()).await?);
        let transferred_before = reader.transferred_bytes();

        process_zip(Arc::clone(&reader), &cli).await?;

        // Display network transfer statistics for HTTP sources.
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.file))?);
        process_zip(reader, &cli).await?;
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// List mode (`-l` or `-v`) displays the catalogue; extract mode streams
/// the entries that pass the name filters.
async fn process_zip<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let archive = ZipArchive::open(reader).await?;

    if cli.list || cli.verbose {
        return list_files(&archive, cli.verbose);
    }

    // Apply filters to determine which files to extract:
    // 1. Skip directories (they are created automatically during extraction)
    // 2. If specific files are requested, only include matching entries
    // 3. Exclude files matching the exclusion patterns
    let files_to_extract: Vec<&ZipEntry> = archive
        .entries()
        .iter()
        .filter(|e| {
            if e.is_directory() {
                return false;
            }

            if !cli.files.is_empty() {
                let matches = cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, e.file_name())
                    } else {
                        let basename = Path::new(e.file_name())
                            .file_name()
                            .map(|s| s.to_string_lossy())
                            .unwrap_or_default();
                        e.file_name() == *f || basename == *f
                    }
                });
                if !matches {
                    return false;
                }
            }

            if cli
                .exclude
                .iter()
                .any(|x| e.file_name().contains(x) || glob_match(x, e.file_name()))
            {
                return false;
            }

            true
        })
        .collect();

    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for entry in files_to_extract {
        extract_file(&archive, entry, cli, multiple_files).await?;
    }

    Ok(())
}

/// List files in the ZIP archive.
///
/// Simple format (`-l`) prints one name per line; verbose format (`-v`)
/// prints a table with sizes, compression ratio, and timestamps.
fn list_files<R: ReadAt>(archive: &ZipArchive<R>, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        if verbose {
            let stamp = entry
                .last_modified()
                .map(|dt| dt.format("%Y-%m-%d  %H:%M").to_string())
                .unwrap_or_else(|| format!("{:>10}  {:>5}", "-", "-"));

            let ratio = if entry.uncompressed_size() > 0 {
                format!(
                    "{:>4}%",
                    100 - (entry.compressed_size() * 100 / entry.uncompressed_size())
                )
            } else {
                "  0%".to_string()
            };

            println!(
                "{:>10}  {:>10}  {}  {}  {}",
                entry.uncompressed_size(),
                entry.compressed_size(),
                ratio,
                stamp,
                entry.file_name()
            );

            if !entry.is_directory() {
                total_uncompressed += entry.uncompressed_size();
                total_compressed += entry.compressed_size();
                file_count += 1;
            }
        } else {
            println!("{}", entry.file_name());
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = if total_uncompressed > 0 {
            format!(
                "{:>4}%",
                100 - (total_compressed * 100 / total_uncompressed)
            )
        } else {
            "  0%".to_string()
        };
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }

    Ok(())
}

/// Extract a single file from the archive, streaming chunks straight to
/// their destination.
async fn extract_file<R: ReadAt>(
    archive: &ZipArchive<R>,
    entry: &ZipEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    let options = match cli.chunk_size {
        Some(size) => StreamOptions::new().chunk_size(size),
        None => StreamOptions::default(),
    };

    // Pipe mode: write file contents directly to stdout.
    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_filename {
            stdout
                .write_all(format!("--- {} ---\n", entry.file_name()).as_bytes())
                .await?;
        }
        let stream = archive.stream_with(entry.file_name(), options).await?;
        return drain(stream, &mut stdout).await;
    }

    let file_name = if cli.junk_paths {
        Path::new(entry.file_name())
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.file_name().to_string())
    } else {
        entry.file_name().to_string()
    };

    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    // Handle existing files based on overwrite options. Skip warnings
    // survive a single -q but not -qq.
    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_very_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_very_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name());
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name());
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let stream = archive.stream_with(entry.file_name(), options).await?;
    let mut file = fs::File::create(&output_path).await?;
    drain(stream, &mut file).await?;
    file.flush().await?;

    Ok(())
}

/// Pulls a stream to completion, writing each chunk as it arrives. The
/// stream's CRC check runs before the final `None`, so a fully drained
/// stream is a verified one.
async fn drain<R, W>(mut stream: EntryStream<R>, writer: &mut W) -> Result<()>
where
    R: ReadAt,
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(chunk) = stream.next_chunk().await? {
        writer.write_all(&chunk).await?;
    }
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// `*` matches zero or more characters, `?` matches exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
