//! Splits Android boot images into their kernel, ramdisk, second stage
//! bootloader and device tree.
//!
//! ```no_run
//! use std::{fs::File, io::BufReader};
//!
//! use bootimg_split::{split, FileSink, OutputNaming};
//!
//! let mut r = BufReader::new(File::open("boot.img")?);
//! let mut sinks = FileSink::new("out", OutputNaming::new("boot"));
//! let split = split(&mut r, &mut sinks)?;
//! println!("wrote {} bytes", split.report.written_bytes());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{Read, Seek};

use tracing::debug;

pub use error::{Error, FormatError, IoContext, Result};
pub use extract::{
    extract, ExtractionReport, FileSink, MemorySink, OutputNaming, ReportEntry, SegmentStatus,
    SinkFactory,
};
pub use header::{Header, HEADER_FIELDS, HEADER_SIZE};
pub use layout::{pages, PlanEntry, Segment, SegmentPlan};

mod error;
mod extract;
mod header;
mod layout;
#[cfg(test)]
mod test_image;

/// Everything learned while splitting an image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub header: Header,
    pub plan: SegmentPlan,
    pub report: ExtractionReport,
}

/// Decodes the header at the start of `source`, lays out the segments and
/// writes each one to `sinks`.
///
/// Nothing is written unless the header decodes and lays out cleanly.
pub fn split<R, S>(source: &mut R, sinks: &mut S) -> Result<Split>
where
    R: Read + Seek,
    S: SinkFactory + ?Sized,
{
    let header = Header::decode(source)?;
    let plan = header.layout()?;
    debug!(page_size = plan.page_size(), "computed segment plan");
    let report = extract(source, &plan, sinks)?;
    Ok(Split {
        header,
        plan,
        report,
    })
}
