use crate::error::DecompressionError;
use flate2::read::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use log::debug;
use std::fs::File;
use std::io;
use std::io::{BufReader, Read};
use std::path::Path;

/// Size of the intermediate buffer decompressed data passes through.
const INFLATE_BUFFER_LENGTH: usize = 1024;

/// Compression scheme used for chunk.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompressionScheme {
    /// Not supported inside regions, such chunks are reported as absent.
    Gzip = 1,
    /// In practice, you will only ever encounter chunks compressed using zlib.
    Zlib = 2,
    Uncompressed = 3,
}

impl CompressionScheme {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(CompressionScheme::Gzip),
            2 => Some(CompressionScheme::Zlib),
            3 => Some(CompressionScheme::Uncompressed),
            _ => None,
        }
    }
}

/// Inflates a zlib wrapped stream.
///
/// Output is collected through a 1 KiB buffer until the end of stream marker.
/// A stream which ends early is an error, never a truncated result.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, DecompressionError> {
    let mut decompress = Decompress::new(true);
    let mut buffer = [0u8; INFLATE_BUFFER_LENGTH];
    let mut output = Vec::with_capacity(data.len() * 2);

    loop {
        let total_in = decompress.total_in() as usize;
        let total_out = decompress.total_out();

        let status = decompress
            .decompress(&data[total_in..], &mut buffer, FlushDecompress::None)
            .map_err(|e| {
                if e.needs_dictionary().is_some() {
                    DecompressionError::NeedsDictionary
                } else {
                    DecompressionError::Corrupt {
                        message: e.to_string(),
                    }
                }
            })?;

        let produced = (decompress.total_out() - total_out) as usize;
        output.extend_from_slice(&buffer[..produced]);

        if let Status::StreamEnd = status {
            break;
        }

        let consumed = decompress.total_in() as usize - total_in;

        if produced == 0 && consumed == 0 {
            return Err(DecompressionError::Truncated {
                consumed: decompress.total_in() as usize,
            });
        }
    }

    debug!(
        target: "anvil-terrain",
        "Inflated {} bytes to {} bytes",
        data.len(),
        output.len()
    );

    Ok(output)
}

/// Decompresses a whole gzip file, such as `level.dat`.
pub fn decompress_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, DecompressionError> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut buffer = [0u8; INFLATE_BUFFER_LENGTH];
    let mut output = Vec::new();

    loop {
        let read = decoder.read(&mut buffer).map_err(|io_error| match io_error.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                DecompressionError::Corrupt {
                    message: io_error.to_string(),
                }
            }
            io::ErrorKind::UnexpectedEof => DecompressionError::Truncated {
                consumed: output.len(),
            },
            _ => DecompressionError::IOError { io_error },
        })?;

        if read == 0 {
            return Ok(output);
        }

        output.extend_from_slice(&buffer[..read]);
    }
}
