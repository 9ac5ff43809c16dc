use std::{
    fs::{create_dir_all, File},
    io::{self, stdout, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use bootimg_split::{
    ExtractionReport, FileSink, Header, OutputNaming, Segment, SegmentPlan, SegmentStatus,
};
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Split an Android boot image into its kernel, ramdisk, second stage
/// bootloader and device tree
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the boot or recovery image
    boot_img: PathBuf,

    /// Output directory of the split images
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Text output format
    #[arg(value_enum, long, default_value_t = TextOutputFormat::Info)]
    format: TextOutputFormat,

    /// Output null-terminated argument strings
    #[arg(short = '0', long)]
    null: bool,

    /// Only decode the header and print the layout, without writing anything.
    /// With `--format mkbootimg` the printed paths are where the segments
    /// would be written
    #[arg(long)]
    dry_run: bool,

    /// Log level (error, warn, info, debug, trace), `RUST_LOG` takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TextOutputFormat {
    /// Pretty-printed info-rich text format suitable for human inspection
    Info,
    /// Output shell-escaped (quoted) argument strings that can be used to
    /// reconstruct the boot image using `mkbootimg`
    Mkbootimg,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut r = BufReader::new(
        File::open(&args.boot_img)
            .with_context(|| format!("failed to open {}", args.boot_img.display()))?,
    );
    let mut sinks = FileSink::new(&args.out, OutputNaming::for_image(&args.boot_img));

    let (hdr, plan, report) = if args.dry_run {
        let hdr = Header::decode(&mut r)
            .with_context(|| format!("failed to read {}", args.boot_img.display()))?;
        let plan = hdr.layout()?;
        (hdr, plan, None)
    } else {
        create_dir_all(&args.out)
            .with_context(|| format!("failed to create {}", args.out.display()))?;
        let split = bootimg_split::split(&mut r, &mut sinks)
            .with_context(|| format!("failed to split {}", args.boot_img.display()))?;
        debug!(bytes = split.report.written_bytes(), "split finished");
        (split.header, split.plan, Some(split.report))
    };

    let mut out = stdout().lock();
    match args.format {
        TextOutputFormat::Info => print_info(&mut out, &hdr, &plan, report.as_ref(), &sinks)?,
        TextOutputFormat::Mkbootimg => print_mkbootimg(&mut out, &hdr, &sinks, args.null)?,
    }
    out.flush()?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_info(
    out: &mut impl Write,
    hdr: &Header,
    plan: &SegmentPlan,
    report: Option<&ExtractionReport>,
    sinks: &FileSink,
) -> Result<()> {
    writeln!(out, "boot magic: ANDROID!")?;
    writeln!(out, "kernel size: {}", hdr.kernel_size)?;
    writeln!(out, "kernel load address: 0x{:08x}", hdr.kernel_addr)?;
    writeln!(out, "ramdisk size: {}", hdr.ramdisk_size)?;
    writeln!(out, "ramdisk load address: 0x{:08x}", hdr.ramdisk_addr)?;
    writeln!(out, "second bootloader size: {}", hdr.second_size)?;
    writeln!(out, "second bootloader load address: 0x{:08x}", hdr.second_addr)?;
    writeln!(out, "kernel tags load address: 0x{:08x}", hdr.tags_addr)?;
    writeln!(out, "page size: {}", hdr.page_size)?;
    writeln!(out, "device tree size: {}", hdr.dt_size)?;
    // Raw header text may hold control characters.
    writeln!(out, "product name: {}", hdr.board_name().escape_ascii())?;
    writeln!(out, "command line args: {}", hdr.cmdline().escape_ascii())?;

    for entry in plan {
        write!(
            out,
            "{}: offset {}, size {}",
            entry.segment, entry.offset, entry.size
        )?;
        match report.and_then(|report| report.get(entry.segment)) {
            Some(e) => match e.status {
                SegmentStatus::Written(_) => {
                    writeln!(out, " -> {}", sinks.path(entry.segment).display())?
                }
                SegmentStatus::Absent => writeln!(out, " (absent)")?,
            },
            None => writeln!(out)?,
        }
    }
    Ok(())
}

fn print_mkbootimg(out: &mut impl Write, hdr: &Header, sinks: &FileSink, null: bool) -> Result<()> {
    let sep = if null { '\0' } else { ' ' };

    write_path(out, sep, "kernel", sinks.path(Segment::Kernel))?;
    write!(out, "{sep}")?;
    write_path(out, sep, "ramdisk", sinks.path(Segment::Ramdisk))?;
    if hdr.second_size != 0 {
        write!(out, "{sep}")?;
        write_path(out, sep, "second", sinks.path(Segment::Second))?;
    }
    if hdr.dt_size != 0 {
        write!(out, "{sep}")?;
        write_path(out, sep, "dt", sinks.path(Segment::DeviceTree))?;
    }

    write!(out, "{sep}--pagesize{sep}0x{:08x}", hdr.page_size)?;
    write!(out, "{sep}--base{sep}0x{:08x}", 0)?;
    write!(out, "{sep}--kernel_offset{sep}0x{:08x}", hdr.kernel_addr)?;
    write!(out, "{sep}--ramdisk_offset{sep}0x{:08x}", hdr.ramdisk_addr)?;
    write!(out, "{sep}--second_offset{sep}0x{:08x}", hdr.second_addr)?;
    write!(out, "{sep}--tags_offset{sep}0x{:08x}", hdr.tags_addr)?;
    write!(out, "{sep}--board{sep}")?;
    write_bytestring(out, hdr.board_name(), null)?;
    write!(out, "{sep}--cmdline{sep}")?;
    write_bytestring(out, hdr.cmdline(), null)?;

    if null {
        write!(out, "\0")?;
    } else {
        writeln!(out)?;
    }
    Ok(())
}

fn write_path(out: &mut impl Write, sep: char, flag: &str, path: PathBuf) -> io::Result<()> {
    write!(out, "--{flag}{sep}")?;
    out.write_all(path.as_os_str().as_encoded_bytes())
}

fn write_bytestring(out: &mut impl Write, input: &[u8], raw: bool) -> Result<()> {
    if raw {
        out.write_all(input)?;
    } else {
        let q = shlex::bytes::Quoter::new();
        out.write_all(&q.quote(input).context("failed to quote header text")?)?;
    }
    Ok(())
}
