//! Binary entry point for the btpage inspection CLI.
#![forbid(unsafe_code)]

#[path = "btpage/config.rs"]
mod config;

use std::error::Error;
use std::path::PathBuf;

use btpage::admin::{
    create, info, inspect_page, verify, CreateReport, InfoReport, PageReport, VerifyReport,
};
use btpage::{Addr, FormatOptions};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "btpage",
    version,
    about = "Create, inspect, and verify btree database files",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "BTPAGE_CONFIG",
        value_name = "FILE",
        help = "CLI config file (TOML with a [format] table)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "BYTES",
        help = "Allocation unit size; overrides the config file"
    )]
    alloc_size: Option<u32>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for reports"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create a database holding one empty root leaf")]
    Create {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        #[arg(long, value_name = "BYTES", help = "Leaf page size")]
        leaf_size: Option<u32>,

        #[arg(long, value_name = "BYTES", help = "Internal page size")]
        internal_size: Option<u32>,
    },

    #[command(about = "Print the database descriptor")]
    Info {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    #[command(about = "Decode one page: header, checksum, items, and index")]
    Page {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        #[arg(value_name = "ADDR", help = "Page address in allocation units")]
        addr: u32,
    },

    #[command(about = "Verify the checksum and items of every page")]
    Verify {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("btpage=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs the command; `Ok(false)` means verification found damage.
fn run() -> Result<bool, Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    if let Some(path) = config.path() {
        debug!(path = %path.display(), "loaded CLI config");
    }
    let mut format = config.format();
    if let Some(alloc_size) = cli.alloc_size {
        format = format.alloc_size(alloc_size);
    }

    match cli.command {
        Command::Create {
            path,
            leaf_size,
            internal_size,
        } => {
            let opts = apply_sizes(format, leaf_size, internal_size);
            let report = create(&path, &opts)?;
            emit(cli.format, &report, print_create_text)?;
        }
        Command::Info { path } => {
            let report = info(&path, format.alloc_size)?;
            emit(cli.format, &report, print_info_text)?;
        }
        Command::Page { path, addr } => {
            let report = inspect_page(&path, format.alloc_size, Addr(addr))?;
            emit(cli.format, &report, print_page_text)?;
        }
        Command::Verify { path } => {
            let report = verify(&path, format.alloc_size)?;
            emit(cli.format, &report, print_verify_text)?;
            return Ok(report.success);
        }
    }
    Ok(true)
}

fn apply_sizes(
    mut opts: FormatOptions,
    leaf_size: Option<u32>,
    internal_size: Option<u32>,
) -> FormatOptions {
    if let Some(bytes) = leaf_size {
        opts = opts.leaf_page_size(bytes);
    }
    if let Some(bytes) = internal_size {
        opts = opts.internal_page_size(bytes);
    }
    opts
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn opt_addr(addr: Option<u32>) -> String {
    addr.map_or_else(|| "none".to_string(), |a| a.to_string())
}

fn print_create_text(report: &CreateReport) {
    println!("Created {}", report.path);
    println!(
        "  alloc_size={} leaf_page_size={} internal_page_size={}",
        report.alloc_size, report.leaf_page_size, report.internal_page_size
    );
    println!(
        "  file_size={} checksum={:#010x}",
        report.file_size, report.checksum
    );
}

fn print_info_text(report: &InfoReport) {
    println!("Descriptor ({}):", report.path);
    println!("  version={}.{}", report.major, report.minor);
    println!(
        "  leaf_page_size={} internal_page_size={}",
        report.leaf_page_size, report.internal_page_size
    );
    println!("  base_recno={}", report.base_recno);
    println!(
        "  root={} free={}",
        opt_addr(report.root_addr),
        opt_addr(report.free_addr)
    );
    println!(
        "  file_size={} first_page={}",
        report.file_size,
        if report.first_page_ok { "ok" } else { "damaged" }
    );
}

fn print_page_text(report: &PageReport) {
    println!(
        "Page {} ({} bytes at offset {}):",
        report.addr, report.size, report.offset
    );
    println!(
        "  type={} level={} lsn={}",
        report.kind, report.level, report.lsn
    );
    if let Some(entries) = report.entries {
        println!("  entries={entries}");
    }
    if let Some(len) = report.data_len {
        println!("  data_len={len}");
    }
    println!(
        "  parent={} prev={} next={}",
        opt_addr(report.parent),
        opt_addr(report.prev),
        opt_addr(report.next)
    );
    println!(
        "  checksum stored={:#010x} computed={:#010x} {}",
        report.checksum.stored,
        report.checksum.computed,
        if report.checksum.ok { "ok" } else { "MISMATCH" }
    );
    if let Some(preview) = &report.overflow_preview {
        println!("  data={preview}");
    }
    if !report.items.is_empty() {
        println!();
        println!("Items:");
        for item in &report.items {
            print!(
                "  @{:<6} {:<13} len={:<6} {}",
                item.offset, item.kind, item.len, item.preview
            );
            match &item.reference {
                Some(reference) => println!(" [{reference}]"),
                None => println!(),
            }
        }
    }
    if let Some(index) = &report.index {
        println!();
        println!(
            "Index: entries={} records={} first_free={} space_avail={}",
            index.entries, index.records, index.first_free, index.space_avail
        );
    }
    if let Some(error) = &report.error {
        println!();
        println!("Error: {error}");
    }
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify {}: {}",
        report.path,
        if report.success { "ok" } else { "FAILED" }
    );
    println!("  pages_checked={}", report.pages_checked);
    for (kind, count) in &report.pages_by_kind {
        println!("  {kind}={count}");
    }
    for finding in &report.findings {
        println!(
            "- {:?} at page {}: {}",
            finding.severity, finding.addr, finding.message
        );
    }
    if report.findings_truncated > 0 {
        println!("  ({} more findings omitted)", report.findings_truncated);
    }
}
