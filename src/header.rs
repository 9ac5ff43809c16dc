use std::io::{self, Read, Seek, SeekFrom};

use binrw::BinRead;
use tracing::debug;

use crate::{
    error::{Error, FormatError, IoContext, Result},
    layout::SegmentPlan,
};

/// Size of the fixed header region in bytes. The header still occupies a
/// whole page in the image.
pub const HEADER_SIZE: u64 = 608;

/// Header fields as `(name, offset, length)`, in on-disk order.
pub const HEADER_FIELDS: [(&str, u64, u64); 14] = [
    ("magic", 0, 8),
    ("kernel_size", 8, 4),
    ("kernel_addr", 12, 4),
    ("ramdisk_size", 16, 4),
    ("ramdisk_addr", 20, 4),
    ("second_size", 24, 4),
    ("second_addr", 28, 4),
    ("tags_addr", 32, 4),
    ("page_size", 36, 4),
    ("dt_size", 40, 4),
    ("unused", 44, 4),
    ("board_name", 48, 16),
    ("cmdline", 64, 512),
    ("id", 576, 32),
];

/// Android boot image header with a device tree size field
#[derive(BinRead, Clone, Debug, PartialEq, Eq, Hash)]
#[br(little, magic = b"ANDROID!")]
pub struct Header {
    /// Kernel size
    pub kernel_size: u32,
    /// Kernel physical load addr
    pub kernel_addr: u32,
    /// Ramdisk size
    pub ramdisk_size: u32,
    /// Ramdisk physical load addr
    pub ramdisk_addr: u32,
    /// Second bootloader size, 0 if there is none
    pub second_size: u32,
    /// Second bootloader physical load addr
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    /// Device tree blob size, 0 if there is none
    pub dt_size: u32,
    pub unused: u32,
    /// NUL-padded board name
    pub board_name: [u8; 16],
    /// NUL-padded kernel command line
    pub cmdline: Box<[u8; 512]>,
    pub id: [u32; 8],
}

impl Header {
    /// Decodes the header at the current position of `reader`.
    ///
    /// A source that runs out of bytes yields [`IoContext::HeaderField`]
    /// naming the field that could not be read in full.
    pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader
            .stream_position()
            .map_err(|err| Error::io(IoContext::HeaderField(HEADER_FIELDS[0].0), err))?;

        let hdr = Self::read(reader).map_err(|err| decode_error(reader, start, err))?;
        debug!(
            kernel_size = hdr.kernel_size,
            ramdisk_size = hdr.ramdisk_size,
            second_size = hdr.second_size,
            dt_size = hdr.dt_size,
            page_size = hdr.page_size,
            board_name = %hdr.board_name().escape_ascii(),
            "decoded boot image header"
        );
        Ok(hdr)
    }

    /// Computes where each segment starts.
    pub fn layout(&self) -> Result<SegmentPlan, FormatError> {
        SegmentPlan::new(self)
    }

    /// Board name up to the first NUL byte
    pub fn board_name(&self) -> &[u8] {
        take_until_null(&self.board_name)
    }

    /// Kernel command line up to the first NUL byte
    pub fn cmdline(&self) -> &[u8] {
        take_until_null(&*self.cmdline)
    }
}

/// Returns the name of the field that is cut off when only `available`
/// header bytes exist.
pub(crate) fn field_at(available: u64) -> Option<&'static str> {
    HEADER_FIELDS
        .iter()
        .find(|(_, offset, len)| offset + len > available)
        .map(|(name, ..)| *name)
}

fn decode_error<R: Seek>(reader: &mut R, start: u64, err: binrw::Error) -> Error {
    match err.root_cause() {
        binrw::Error::BadMagic { .. } => FormatError::BadMagic.into(),
        binrw::Error::Io(io_err) => {
            let field = reader
                .seek(SeekFrom::End(0))
                .ok()
                .and_then(|end| field_at(end.saturating_sub(start)))
                .unwrap_or("header");
            Error::io(
                IoContext::HeaderField(field),
                io::Error::new(io_err.kind(), io_err.to_string()),
            )
        }
        other => Error::io(
            IoContext::HeaderField("header"),
            io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        ),
    }
}

pub(crate) fn take_until_null(input: &[u8]) -> &[u8] {
    match input.iter().position(|x| *x == 0) {
        Some(null_idx) => &input[..null_idx],
        None => input,
    }
}
