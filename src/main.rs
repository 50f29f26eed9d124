mod cli;
mod config;
mod library;
mod prelude;
mod reader;

use clap::Parser;

use crate::cli::{Args, Command};
use crate::prelude::*;

#[cfg(feature = "rar")]
fn check_unrar() {
    log::info!("Checking for 'unrar' in PATH...");
    if which::which("unrar").is_err() {
        log::warn!("'unrar' not found in PATH. RAR comics will be listed without pages.");
    } else {
        log::info!("'unrar' found in PATH.");
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => DEFAULT_LOG_LEVEL,
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn open_store(args: &Args) -> Result<ProgressStore> {
    let path = args
        .progress_file
        .clone()
        .unwrap_or_else(ProgressStore::default_path);
    ProgressStore::open(&path)
        .with_context(|| format!("Couldn't load progress from {}", path.display()))
}

fn scan_options(args: &Args) -> ScanOptions {
    ScanOptions {
        recursive: args.recursive,
        extract_covers: !args.no_covers,
    }
}

fn scan_dir(dir: &Path, args: &Args, store: &ProgressStore) -> Result<Vec<Comic>> {
    scan(dir, store, &scan_options(args))
        .with_context(|| format!("Couldn't scan {}", dir.display()))
}

/// A 1-based page number, or else an in-archive entry name.
fn page_ref(page: &str) -> Result<PageRef> {
    match page.parse::<usize>() {
        Ok(0) => anyhow::bail!("Page numbers start at 1"),
        Ok(n) => Ok(PageRef::Index(n - 1)),
        Err(_) => Ok(PageRef::Name(page.to_string())),
    }
}

fn list_pages(file: &Path, out: &mut impl Write) -> Result<()> {
    let archive =
        ComicArchive::open(file).with_context(|| format!("Couldn't open {}", file.display()))?;
    let pages = archive.list_pages()?;
    writeln!(out, "{} ({}, {} pages)", file.display(), archive.format(), pages.len())?;
    for (i, page) in pages.iter().enumerate() {
        writeln!(out, "{:>4}. {} [{}]", i + 1, page.name, page.mime_type())?;
    }
    Ok(())
}

fn extract(file: &Path, page: &str, output: Option<PathBuf>) -> Result<PathBuf> {
    let archive =
        ComicArchive::open(file).with_context(|| format!("Couldn't open {}", file.display()))?;
    let page = page_ref(page)?;
    let name = archive.as_trait().resolve(&page)?;
    let output = output.unwrap_or_else(|| PathBuf::from(PageEntry::new(name.clone()).file_name()));

    let mut out = std::fs::File::create(&output)
        .with_context(|| format!("Couldn't create {}", output.display()))?;
    let written = archive
        .write_page(&PageRef::Name(name), &mut out)
        .with_context(|| format!("Couldn't extract {} from {}", page, file.display()))?;
    log::info!("Wrote {} bytes to {:?}", written, output);
    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    log::info!("{} starting", NAME);

    #[cfg(feature = "rar")]
    check_unrar();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &args.command {
        Command::Scan { dir } => {
            let store = open_store(&args)?;
            let comics = scan_dir(dir, &args, &store)?;
            print_catalog(&comics, &mut out)?;
        }
        Command::Read { dir } => {
            let mut store = open_store(&args)?;
            let mut comics = scan_dir(dir, &args, &store)?;
            let stdin = std::io::stdin();
            select_comic(&mut comics, &mut store, &mut stdin.lock(), &mut out)?;
        }
        Command::Pages { file } => list_pages(file, &mut out)?,
        Command::Extract { file, page, output } => {
            let written = extract(file, page, output.clone())?;
            writeln!(out, "{}", written.display())?;
        }
    }
    Ok(())
}
