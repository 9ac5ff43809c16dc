use std::fmt;

use tracing::debug;

use crate::{error::FormatError, header::Header};

/// A payload region of the boot image
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Kernel,
    Ramdisk,
    /// Second stage bootloader
    Second,
    /// Device tree blob
    DeviceTree,
}

impl Segment {
    /// All segments in image order.
    pub const ALL: [Self; 4] = [Self::Kernel, Self::Ramdisk, Self::Second, Self::DeviceTree];

    pub fn name(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::Second => "second",
            Self::DeviceTree => "device tree",
        }
    }

    /// Whether a size of 0 means the segment is absent. The kernel and
    /// ramdisk are always extracted.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Second | Self::DeviceTree)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of pages a segment of `size` bytes occupies.
///
/// # Panics
///
/// Panics if `page_size` is 0.
pub fn pages(size: u32, page_size: u32) -> u64 {
    u64::from(size).div_ceil(u64::from(page_size))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlanEntry {
    pub segment: Segment,
    /// Absolute byte offset in the image
    pub offset: u64,
    pub size: u32,
}

impl PlanEntry {
    /// Offset one past the last byte of the segment.
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

/// Where each segment of an image starts, in image order
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentPlan {
    page_size: u32,
    entries: [PlanEntry; 4],
}

impl SegmentPlan {
    pub fn new(header: &Header) -> Result<Self, FormatError> {
        let page_size = header.page_size;
        if page_size == 0 {
            return Err(FormatError::ZeroPageSize);
        }
        let span = |size: u32| pages(size, page_size) * u64::from(page_size);

        // The header always takes exactly one page.
        let kernel = u64::from(page_size);
        let ramdisk = kernel + span(header.kernel_size);
        let second = ramdisk + span(header.ramdisk_size);
        // There is always one more page after the second bootloader region.
        let device_tree = second + span(header.second_size) + u64::from(page_size);

        let entry = |segment, offset, size| PlanEntry {
            segment,
            offset,
            size,
        };
        let plan = Self {
            page_size,
            entries: [
                entry(Segment::Kernel, kernel, header.kernel_size),
                entry(Segment::Ramdisk, ramdisk, header.ramdisk_size),
                entry(Segment::Second, second, header.second_size),
                entry(Segment::DeviceTree, device_tree, header.dt_size),
            ],
        };
        for e in plan.iter() {
            debug!(segment = %e.segment, offset = e.offset, size = e.size, "planned segment");
        }
        Ok(plan)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn get(&self, segment: Segment) -> &PlanEntry {
        // Entries are stored in `Segment::ALL` order.
        &self.entries[segment as usize]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a SegmentPlan {
    type Item = &'a PlanEntry;
    type IntoIter = std::slice::Iter<'a, PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
