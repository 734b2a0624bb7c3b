//! ldcache - Inspect the glibc dynamic linker cache.
//!
//! Print header information, list entries, or look up libraries by name.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ldcache::{ByteSource, CacheEntry, CacheView, DEFAULT_CACHE_PATH};

/// Inspect the glibc dynamic linker cache.
#[derive(Parser, Debug)]
#[command(name = "ldcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache file
    #[arg(short, long, global = true, default_value = DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show header information
    Info,

    /// List cache entries
    List {
        /// Filter entries by substring match on name or path
        #[arg(short, long)]
        filter: Option<String>,

        /// Show flags, OS version and hwcap
        #[arg(short = 'F', long)]
        flags: bool,
    },

    /// Find every entry for a library name
    Lookup {
        /// Library name (e.g., "libc.so.6")
        name: String,
    },

    /// Dump headers and every field of every entry
    Dump,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let source = load_cache(&cli.cache)?;
    let cache = CacheView::parse(&source)
        .with_context(|| format!("Failed to parse cache: {}", cli.cache.display()))?;
    info!("{} entries in {}", cache.entry_count(), cli.cache.display());

    match cli.command {
        Commands::Info => cmd_info(&cli.cache, &cache),
        Commands::List { filter, flags } => cmd_list(&cache, filter.as_deref(), flags),
        Commands::Lookup { name } => return Ok(cmd_lookup(&cache, &name)),
        Commands::Dump => cmd_dump(&cache),
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_cache(path: &Path) -> Result<ByteSource> {
    ByteSource::open(path).with_context(|| format!("Failed to open cache: {}", path.display()))
}

fn describe(entry: &CacheEntry<'_>) -> String {
    let mut desc = entry.flag_bits().to_string();
    if entry.os_version != 0 {
        desc.push_str(&format!(", OS ABI: {}", format_os_version(entry.os_version)));
    }
    if entry.hwcap != 0 {
        desc.push_str(&format!(", hwcap: {:#018x}", entry.hwcap));
    }
    desc
}

/// Renders a packed `major << 16 | minor << 8 | patch` version.
fn format_os_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        (version >> 16) & 0xff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

fn cmd_info(path: &Path, cache: &CacheView<'_>) {
    let legacy = cache.legacy_header();
    let new = cache.new_header();

    println!("Linker Cache Information");
    println!("========================");
    println!("Path:           {}", path.display());
    println!("File size:      {} bytes", cache.file_size());
    println!("\nLegacy header:");
    println!("  Magic:        {}", legacy.magic);
    println!("  Entries:      {}", legacy.entry_count);
    println!("  Strings at:   {:#x}", legacy.strtab_offset);
    println!("\nNew header:");
    println!("  Magic:        {}", new.magic);
    println!("  Entries:      {}", new.entry_count);
    println!("  Strings len:  {}", new.strings_len);
    println!("  Strings at:   {:#x}", new.strtab_offset);
}

fn cmd_list(cache: &CacheView<'_>, filter: Option<&str>, flags: bool) {
    let mut shown = 0usize;
    for entry in cache.iter() {
        if let Some(f) = filter {
            if !entry.matches_filter(f) {
                continue;
            }
        }

        if flags {
            println!("\t{} ({}) => {}", entry.key, describe(entry), entry.value);
        } else {
            println!("\t{} => {}", entry.key, entry.value);
        }
        shown += 1;
    }

    if shown == 0 {
        warn!("No entries match the criteria");
    }
}

fn cmd_lookup(cache: &CacheView<'_>, name: &str) -> ExitCode {
    let mut found = false;
    for entry in cache.find_all(name) {
        println!("{} ({}) => {}", entry.key, describe(entry), entry.value);
        found = true;
    }

    if found {
        ExitCode::SUCCESS
    } else {
        warn!("{} not found in cache", name);
        ExitCode::FAILURE
    }
}

fn cmd_dump(cache: &CacheView<'_>) {
    let legacy = cache.legacy_header();
    let new = cache.new_header();

    println!("legacy.magic: {}", legacy.magic);
    println!("legacy.nlibs: {}", legacy.entry_count);
    println!("new.magic: {}", new.magic);
    println!("new.nlibs: {}", new.entry_count);
    for (i, entry) in cache.iter().enumerate() {
        println!("entries[{}].flags: {:#06x}", i, entry.flags as u16);
        println!("entries[{}].key: {}", i, entry.key);
        println!("entries[{}].value: {}", i, entry.value);
        println!("entries[{}].osversion: {}", i, entry.os_version);
        println!("entries[{}].hwcap: {:#x}", i, entry.hwcap);
    }
}
