use std::{fmt, io};

use thiserror::Error;

use crate::layout::Segment;

/// Structural problems with the boot image itself
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic, not an Android boot image (expected \"ANDROID!\")")]
    BadMagic,

    #[error("header declares a page size of 0")]
    ZeroPageSize,
}

/// Which step of a split an I/O failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoContext {
    /// Reading the named header field
    HeaderField(&'static str),
    Seek { segment: Segment, offset: u64 },
    Read { segment: Segment, offset: u64, size: u32 },
    CreateOutput(Segment),
    Write(Segment),
}

impl fmt::Display for IoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderField(field) => write!(f, "failed to read header field `{field}`"),
            Self::Seek { segment, offset } => {
                write!(f, "failed to seek to {segment} at offset {offset}")
            }
            Self::Read {
                segment,
                offset,
                size,
            } => write!(
                f,
                "failed to read {segment} (offset {offset}, {size} bytes)"
            ),
            Self::CreateOutput(segment) => write!(f, "failed to create output for {segment}"),
            Self::Write(segment) => write!(f, "failed to write output for {segment}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("{context}: {source}")]
    Io {
        context: IoContext,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: IoContext, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Returns the format error, if this is one.
    pub fn format(&self) -> Option<FormatError> {
        match self {
            Self::Format(err) => Some(*err),
            Self::Io { .. } => None,
        }
    }

    /// Returns the I/O context, if this is an I/O error.
    pub fn io_context(&self) -> Option<IoContext> {
        match self {
            Self::Io { context, .. } => Some(*context),
            Self::Format(_) => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
