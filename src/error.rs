use std::{error::Error, fmt::Display, io};

/// Malformed or impossible structure in decoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Tag kind byte is not one of the known kinds.
    UnknownTagKind { kind: u8, offset: usize },
    /// A declared length runs past the end of the buffer.
    ///
    /// Buffer is truncated or corrupted.
    LengthExceedsBuffer {
        offset: usize,
        /// Amount of bytes the length declares.
        length: usize,
        /// Amount of bytes actually left.
        remaining: usize,
    },
    /// A declared length is negative.
    NegativeLength { offset: usize, length: i32 },
    /// Input ended before the compound's End tag.
    UnterminatedCompound { offset: usize },
    /// Tree is nested deeper than the decoder allows.
    NestingTooDeep { offset: usize },
    /// Non-empty list declaring End as its element kind.
    EndListNotEmpty { offset: usize, count: i32 },
    /// Root tag of the buffer is not a compound.
    RootNotCompound { kind: u8 },
    /// Mandatory tag is missing.
    MissingTag { name: &'static str },
    /// Tag is present but has a different kind than required.
    UnexpectedTagKind { name: &'static str, kind: u8 },
}

impl Error for FormatError {}

impl Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use FormatError::*;
        match self {
            UnknownTagKind { kind, offset } => {
                write!(f, "Unknown tag kind {} at offset {}", kind, offset)
            }
            LengthExceedsBuffer {
                offset,
                length,
                remaining,
            } => write!(
                f,
                "Length of {} at offset {} exceeds remaining {} bytes",
                length, offset, remaining
            ),
            NegativeLength { offset, length } => {
                write!(f, "Negative length {} at offset {}", length, offset)
            }
            UnterminatedCompound { offset } => {
                write!(f, "Compound tag at offset {} has no End tag", offset)
            }
            NestingTooDeep { offset } => {
                write!(f, "Tags nested too deep at offset {}", offset)
            }
            EndListNotEmpty { offset, count } => write!(
                f,
                "List at offset {} declares {} elements of kind End",
                offset, count
            ),
            RootNotCompound { kind } => {
                write!(f, "Root tag kind {} is not a compound", kind)
            }
            MissingTag { name } => write!(f, "{} tag not found", name),
            UnexpectedTagKind { name, kind } => {
                write!(f, "{} tag has unexpected kind {}", name, kind)
            }
        }
    }
}

/// Compressed stream could not be fully decoded.
#[derive(Debug)]
pub enum DecompressionError {
    /// Stream data are corrupted.
    Corrupt { message: String },
    /// Stream requires a preset dictionary.
    NeedsDictionary,
    /// Input ended before the end of the stream.
    Truncated { consumed: usize },
    /// I/O Error while reading a compressed file.
    IOError { io_error: io::Error },
}

impl From<io::Error> for DecompressionError {
    fn from(io_error: io::Error) -> Self {
        DecompressionError::IOError { io_error }
    }
}

impl Error for DecompressionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecompressionError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for DecompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DecompressionError::*;
        match self {
            Corrupt { message } => write!(f, "Corrupted compressed data: {}", message),
            NeedsDictionary => write!(f, "Compressed stream requires a dictionary"),
            Truncated { consumed } => write!(
                f,
                "Compressed stream ended after {} bytes without end marker",
                consumed
            ),
            IOError { .. } => write!(f, "IO Error"),
        }
    }
}

/// Possible errors while loading the chunk.
///
/// A missing chunk is not an error, see `Region::get_chunk`.
#[derive(Debug)]
pub enum ChunkReadError {
    /// I/O Error which happened while were reading chunk data from region file.
    IOError { io_error: io::Error },
    /// Chunk payload could not be decompressed.
    ///
    /// Other chunks of the same region are still readable.
    DecompressionError {
        decompression_error: DecompressionError,
    },
    /// Decompressed chunk is not a valid chunk tag tree.
    FormatError { format_error: FormatError },
}

impl From<io::Error> for ChunkReadError {
    fn from(io_error: io::Error) -> Self {
        ChunkReadError::IOError { io_error }
    }
}

impl From<DecompressionError> for ChunkReadError {
    fn from(decompression_error: DecompressionError) -> Self {
        ChunkReadError::DecompressionError {
            decompression_error,
        }
    }
}

impl From<FormatError> for ChunkReadError {
    fn from(format_error: FormatError) -> Self {
        ChunkReadError::FormatError { format_error }
    }
}

impl Error for ChunkReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChunkReadError::IOError { io_error } => Some(io_error),
            ChunkReadError::DecompressionError {
                decompression_error,
            } => Some(decompression_error),
            ChunkReadError::FormatError { format_error } => Some(format_error),
        }
    }
}

impl Display for ChunkReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkReadError::IOError { .. } => write!(f, "IO Error"),
            ChunkReadError::DecompressionError { .. } => write!(f, "Failed to decompress chunk"),
            ChunkReadError::FormatError { .. } => write!(f, "Failed to decode chunk"),
        }
    }
}

/// Path expression could not be compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParseError {
    /// Byte position of the first character which is not part of a component.
    pub position: usize,
}

impl Error for PathParseError {}

impl Display for PathParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid path component at position {}", self.position)
    }
}
