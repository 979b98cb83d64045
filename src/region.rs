use crate::chunk::Chunk;
use crate::compression::{inflate, CompressionScheme};
use crate::error::ChunkReadError;
use crate::journal::Journal;
use crate::position::RegionChunkPosition;
use bitvec::prelude::*;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use log::debug;
use std::fs::File;
use std::io;
use std::io::{Error, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Amount of chunks in region.
const REGION_CHUNKS: usize = 1024;
/// Length of the location table in bytes.
const REGION_LOCATIONS_BYTES_LENGTH: usize = 4 * REGION_CHUNKS;
/// Amount of sectors occupied by the header.
const REGION_HEADER_SECTORS: u32 = 2;
/// Region sector length in bytes.
const REGION_SECTOR_BYTES_LENGTH: u64 = 4096;
/// Maximum chunk length in bytes.
const CHUNK_MAXIMUM_BYTES_LENGTH: u64 = REGION_SECTOR_BYTES_LENGTH * 256;

/// Region represents a 32x32 group of chunks.
///
/// Reading never trusts the header: slots pointing into the header or past
/// the end of the source, and payloads longer than the source, read as
/// absent chunks.
pub struct Region<S> {
    /// Source in which region are stored.
    source: S,
    /// Source length in bytes.
    source_len: u64,
    /// Array of chunks metadata.
    chunks_metadata: [ChunkMetadata; REGION_CHUNKS],
    /// Slots with a location inside the source.
    present_chunks: BitVec,
    /// Timestamps of previously processed chunks.
    journal: Option<Journal>,
}

impl Region<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let file = File::open(path)?;

        Region::load(file)
    }

    /// Opens region with the journal `<journal_dir>/<region file name>.journal`.
    pub fn open_with_journal<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        journal_dir: Q,
    ) -> Result<Self, io::Error> {
        let region = Region::open(path.as_ref())?;
        let journal = Journal::for_region(journal_dir, path)?;

        Ok(region.with_journal(journal))
    }
}

impl<S> Region<S> {
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Slots which hold a chunk.
    pub fn chunk_positions(&self) -> impl Iterator<Item = RegionChunkPosition> + '_ {
        (0..REGION_CHUNKS)
            .filter(move |&index| self.present_chunks[index])
            .map(RegionChunkPosition::from_metadata_index)
    }

    /// Returns chunk metadata at specified coordinates.
    fn get_metadata(&self, position: RegionChunkPosition) -> ChunkMetadata {
        self.chunks_metadata[position.metadata_index()]
    }
}

/// Marks slots whose location lies after the header and inside the source.
fn present_chunks(source_len: u64, chunks_metadata: &[ChunkMetadata]) -> BitVec {
    let mut present_chunks = bitvec![0; chunks_metadata.len()];

    for (index, metadata) in chunks_metadata.iter().enumerate() {
        if metadata.is_empty() {
            continue;
        }

        let seek_offset = metadata.seek_offset();

        if metadata.start_sector_index < REGION_HEADER_SECTORS || seek_offset >= source_len {
            debug!(
                target: "anvil-terrain",
                "Ignoring chunk {} located at sector {} of {} bytes long region",
                index,
                metadata.start_sector_index,
                source_len
            );

            continue;
        }

        present_chunks.set(index, true);
    }

    present_chunks
}

impl<S: Read + Seek> Region<S> {
    pub fn load(mut source: S) -> Result<Self, io::Error> {
        let source_len = source.len()?;
        let chunks_metadata = Self::read_header(&mut source, source_len)?;
        let present_chunks = present_chunks(source_len, &chunks_metadata);

        let region = Region {
            source,
            source_len,
            chunks_metadata,
            present_chunks,
            journal: None,
        };

        Ok(region)
    }

    /// Reads the chunk at world or region relative chunk coordinates.
    ///
    /// Returns `None` for chunks which were never generated, are compressed
    /// with an unsupported scheme or lie outside of the source.
    pub fn get_chunk(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
    ) -> Result<Option<Chunk>, ChunkReadError> {
        let position = RegionChunkPosition::from_chunk_position(chunk_x, chunk_z);

        let data = match self.read_chunk_data(position)? {
            Some(data) => data,
            None => return Ok(None),
        };

        Ok(Some(Chunk::from_bytes(&data)?))
    }

    /// Like `get_chunk`, but returns `None` as well when the journal already
    /// recorded this or a later `LastUpdate` for the chunk.
    ///
    /// Without a journal every chunk is dirty.
    pub fn get_chunk_if_dirty(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
    ) -> Result<Option<Chunk>, ChunkReadError> {
        let chunk = match self.get_chunk(chunk_x, chunk_z)? {
            Some(chunk) => chunk,
            None => return Ok(None),
        };

        let journal = match self.journal.as_mut() {
            Some(journal) => journal,
            None => return Ok(Some(chunk)),
        };

        let position = RegionChunkPosition::from_chunk_position(chunk_x, chunk_z);

        if journal.check_and_update(position, chunk.last_update())? {
            Ok(Some(chunk))
        } else {
            debug!(
                target: "anvil-terrain",
                "Chunk {}, {} unchanged since {}",
                position.x,
                position.z,
                chunk.last_update()
            );

            Ok(None)
        }
    }

    /// Reads and decompresses the payload of a slot.
    fn read_chunk_data(
        &mut self,
        position: RegionChunkPosition,
    ) -> Result<Option<Vec<u8>>, ChunkReadError> {
        if !self.present_chunks[position.metadata_index()] {
            return Ok(None);
        }

        let metadata = self.get_metadata(position);
        let seek_offset = metadata.seek_offset();

        // 4 bytes for data length and 1 for compression scheme.
        if seek_offset + 5 > self.source_len {
            return Ok(None);
        }

        let maximum_length = (metadata.sectors as u64 * REGION_SECTOR_BYTES_LENGTH)
            .min(CHUNK_MAXIMUM_BYTES_LENGTH);

        self.source.seek(SeekFrom::Start(seek_offset))?;
        let length = self.source.read_u32::<BigEndian>()?;

        if length as u64 > maximum_length {
            debug!(
                target: "anvil-terrain",
                "Chunk {}, {} length of {} exceeds its {} sectors",
                position.x,
                position.z,
                length,
                metadata.sectors
            );

            return Ok(None);
        }

        if length == 0 || seek_offset + 4 + length as u64 > self.source_len {
            debug!(
                target: "anvil-terrain",
                "Chunk {}, {} length of {} exceeds region of {} bytes",
                position.x,
                position.z,
                length,
                self.source_len
            );

            return Ok(None);
        }

        let compression_scheme = self.source.read_u8()?;
        let mut buffer = vec![0u8; (length - 1) as usize];
        self.source.read_exact(&mut buffer)?;

        match CompressionScheme::from_id(compression_scheme) {
            Some(CompressionScheme::Zlib) => Ok(Some(inflate(&buffer)?)),
            Some(CompressionScheme::Uncompressed) => Ok(Some(buffer)),
            Some(CompressionScheme::Gzip) | None => {
                debug!(
                    target: "anvil-terrain",
                    "Chunk {}, {} uses unsupported compression scheme {}",
                    position.x,
                    position.z,
                    compression_scheme
                );

                Ok(None)
            }
        }
    }

    /// First 4KB of source are 1024 chunk locations, the timestamps after
    /// them are not used.
    ///
    /// Entries missing from a short source are empty.
    fn read_header(
        source: &mut S,
        source_len: u64,
    ) -> Result<[ChunkMetadata; REGION_CHUNKS], io::Error> {
        let mut chunks_metadata = [ChunkMetadata::default(); REGION_CHUNKS];
        let available = source_len.min(REGION_LOCATIONS_BYTES_LENGTH as u64) as usize;

        let mut locations = vec![0u8; available];
        source.seek(SeekFrom::Start(0))?;
        source.read_exact(&mut locations)?;

        for (index, location) in locations.chunks_exact(4).enumerate() {
            let location = BigEndian::read_u32(location);

            let start_sector_index = location >> 8;
            let sectors = (location & 0xFF) as u8;

            chunks_metadata[index] = ChunkMetadata::new(start_sector_index, sectors);
        }

        Ok(chunks_metadata)
    }
}

/// Chunk metadata are stored in header.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
struct ChunkMetadata {
    /// Sector index from which starts chunk data.
    start_sector_index: u32,
    /// Amount of sectors used to store chunk.
    sectors: u8,
}

impl ChunkMetadata {
    fn new(start_sector_index: u32, sectors: u8) -> Self {
        ChunkMetadata {
            start_sector_index,
            sectors,
        }
    }

    fn seek_offset(&self) -> u64 {
        self.start_sector_index as u64 * REGION_SECTOR_BYTES_LENGTH
    }

    /// Chunk was never generated.
    fn is_empty(&self) -> bool {
        self.start_sector_index == 0 && self.sectors == 0
    }
}

/// Trait adds additional helper methods for `Seek`.
pub(crate) trait SeekExt {
    fn len(&mut self) -> Result<u64, io::Error>;
}

impl<S: Seek> SeekExt for S {
    fn len(&mut self) -> Result<u64, Error> {
        let old_pos = self.seek(SeekFrom::Current(0))?;
        let len = self.seek(SeekFrom::End(0))?;

        if old_pos != len {
            self.seek(SeekFrom::Start(old_pos))?;
        }

        Ok(len)
    }
}

/// Trait adds additional helper methods for `Seek+Write`.
pub(crate) trait SeekWriteExt {
    /// Pads the end of the source with zeros up to the new length.
    fn extend_len(&mut self, new_len: u64) -> Result<(), io::Error>;
}

impl<S: Seek + Write> SeekWriteExt for S {
    fn extend_len(&mut self, new_len: u64) -> Result<(), Error> {
        let old_pos = self.seek(SeekFrom::Current(0))?;
        let len = self.seek(SeekFrom::End(0))?;

        if new_len > len {
            let padding_len = new_len - len;
            self.write_all(&vec![0; padding_len as usize])?;
        }

        self.seek(SeekFrom::Start(old_pos))?;

        Ok(())
    }
}
