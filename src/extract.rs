use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    error::{Error, IoContext, Result},
    layout::{PlanEntry, Segment, SegmentPlan},
};

/// Creates the output a segment is written to.
///
/// Each call hands out a fresh output that only receives that segment's bytes.
pub trait SinkFactory {
    fn create(&mut self, segment: Segment) -> io::Result<Box<dyn Write + '_>>;
}

/// File names derived from the input image's base name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputNaming {
    basename: String,
}

impl OutputNaming {
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
        }
    }

    /// Uses the file name of `image` without its extension.
    pub fn for_image(image: &Path) -> Self {
        let basename = image
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "boot".to_owned());
        Self::new(basename)
    }

    pub fn file_name(&self, segment: Segment) -> String {
        let basename = &self.basename;
        match segment {
            Segment::Kernel => format!("{basename}-kernel"),
            Segment::Ramdisk => format!("{basename}-ramdisk.gz"),
            Segment::Second => format!("{basename}-second.gz"),
            Segment::DeviceTree => format!("{basename}.dtb"),
        }
    }
}

/// Writes each segment to its own file in a directory
#[derive(Clone, Debug)]
pub struct FileSink {
    dir: PathBuf,
    naming: OutputNaming,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    pub fn path(&self, segment: Segment) -> PathBuf {
        self.dir.join(self.naming.file_name(segment))
    }
}

impl SinkFactory for FileSink {
    fn create(&mut self, segment: Segment) -> io::Result<Box<dyn Write + '_>> {
        let file = File::create(self.path(segment))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Keeps extracted segments in memory
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    outputs: BTreeMap<Segment, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, segment: Segment) -> Option<&[u8]> {
        self.outputs.get(&segment).map(Vec::as_slice)
    }

    pub fn into_inner(self) -> BTreeMap<Segment, Vec<u8>> {
        self.outputs
    }
}

impl SinkFactory for MemorySink {
    fn create(&mut self, segment: Segment) -> io::Result<Box<dyn Write + '_>> {
        let buf = self.outputs.entry(segment).or_default();
        buf.clear();
        Ok(Box::new(buf))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentStatus {
    /// Number of bytes written
    Written(u64),
    /// Optional segment with size 0, nothing written
    Absent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReportEntry {
    pub segment: Segment,
    pub status: SegmentStatus,
    pub offset: u64,
    pub size: u32,
}

/// Outcome of an extraction, in image order
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExtractionReport {
    pub entries: Vec<ReportEntry>,
}

impl ExtractionReport {
    pub fn get(&self, segment: Segment) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.segment == segment)
    }

    /// Total bytes written over all segments
    pub fn written_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e.status {
                SegmentStatus::Written(n) => n,
                SegmentStatus::Absent => 0,
            })
            .sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReportEntry> {
        self.entries.iter()
    }
}

/// Copies every segment of `plan` out of `source`.
///
/// Stops at the first failure. Outputs written before it are left as they are.
pub fn extract<R, S>(source: &mut R, plan: &SegmentPlan, sinks: &mut S) -> Result<ExtractionReport>
where
    R: Read + Seek,
    S: SinkFactory + ?Sized,
{
    let mut report = ExtractionReport::default();
    for entry in plan {
        let status = if entry.size == 0 && entry.segment.is_optional() {
            debug!(segment = %entry.segment, "segment absent");
            SegmentStatus::Absent
        } else {
            let written = copy_segment(source, entry, sinks)?;
            info!(
                segment = %entry.segment,
                offset = entry.offset,
                bytes = written,
                "wrote segment"
            );
            SegmentStatus::Written(written)
        };
        report.entries.push(ReportEntry {
            segment: entry.segment,
            status,
            offset: entry.offset,
            size: entry.size,
        });
    }
    Ok(report)
}

fn copy_segment<R, S>(source: &mut R, entry: &PlanEntry, sinks: &mut S) -> Result<u64>
where
    R: Read + Seek,
    S: SinkFactory + ?Sized,
{
    let PlanEntry {
        segment,
        offset,
        size,
    } = *entry;

    source
        .seek(SeekFrom::Start(offset))
        .map_err(|err| Error::io(IoContext::Seek { segment, offset }, err))?;

    // Read everything before creating the output so a short source leaves no
    // partial file behind. The declared size is untrusted, so the buffer only
    // grows with the bytes actually read.
    let read_err = |err: io::Error| {
        Error::io(
            IoContext::Read {
                segment,
                offset,
                size,
            },
            err,
        )
    };
    let mut data = Vec::new();
    (&mut *source)
        .take(u64::from(size))
        .read_to_end(&mut data)
        .map_err(read_err)?;
    if data.len() < size as usize {
        return Err(read_err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("only {} bytes available", data.len()),
        )));
    }

    let mut sink = sinks
        .create(segment)
        .map_err(|err| Error::io(IoContext::CreateOutput(segment), err))?;
    sink.write_all(&data)
        .and_then(|()| sink.flush())
        .map_err(|err| Error::io(IoContext::Write(segment), err))?;
    Ok(data.len() as u64)
}
