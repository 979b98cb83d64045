use crate::position::RegionChunkPosition;
use crate::region::{SeekExt, SeekWriteExt};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use std::fs;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Amount of timestamp slots, one for each chunk of a region.
const JOURNAL_SLOTS: usize = 1024;
/// Journal length in bytes.
const JOURNAL_BYTES_LENGTH: u64 = 8 * JOURNAL_SLOTS as u64;
/// Stored values from here on can't be tick counts and are considered stale.
///
/// Journals written in little-endian order end up above it.
const STALE_TIMESTAMP: i64 = 1 << 48;

/// Last processed `LastUpdate` of every chunk in a region.
///
/// Slots are big-endian `i64` values indexed by `z * 32 + x`. A slot is only
/// written after a chunk compared newer, so a crash between reporting a chunk
/// and processing it leads to reprocessing, never to a lost update.
///
/// Not safe against concurrent writers.
pub struct Journal<S = File> {
    source: S,
}

impl Journal<File> {
    /// Opens the journal at path, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(path)?;

        Journal::load(file)
    }

    /// Opens `<journal_dir>/<region file name>.journal`.
    pub fn for_region<P: AsRef<Path>, Q: AsRef<Path>>(
        journal_dir: P,
        region_path: Q,
    ) -> Result<Self, io::Error> {
        let journal_dir = journal_dir.as_ref();
        let region_name = region_path.as_ref().file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Region path has no file name")
        })?;

        if !journal_dir.exists() {
            debug!(target: "anvil-terrain", "Creating journal directory {}", journal_dir.display());
            fs::create_dir_all(journal_dir)?;
        }

        let journal_path = journal_dir.join(format!("{}.journal", region_name.to_string_lossy()));

        Journal::open(journal_path)
    }
}

impl<S: Read + Write + Seek> Journal<S> {
    pub fn load(mut source: S) -> Result<Self, io::Error> {
        let source_len = source.len()?;

        if JOURNAL_BYTES_LENGTH > source_len {
            debug!(
                target: "anvil-terrain",
                "Extending journal from {} bytes to {} bytes",
                source_len,
                JOURNAL_BYTES_LENGTH
            );

            source.extend_len(JOURNAL_BYTES_LENGTH)?;
        } else if source_len > JOURNAL_BYTES_LENGTH {
            warn!(
                target: "anvil-terrain",
                "Journal is {} bytes long, bytes after {} are ignored",
                source_len,
                JOURNAL_BYTES_LENGTH
            );
        }

        Ok(Journal { source })
    }

    /// Stored timestamp of a chunk, 0 if never stored or stale.
    pub fn last_update(&mut self, position: RegionChunkPosition) -> Result<i64, io::Error> {
        self.source.seek(slot_offset(position))?;
        let stored = self.source.read_i64::<BigEndian>()?;

        if stored < 0 || stored >= STALE_TIMESTAMP {
            debug!(
                target: "anvil-terrain",
                "Journal slot {}, {} holds implausible value {}, treating as stale",
                position.x,
                position.z,
                stored
            );

            return Ok(0);
        }

        Ok(stored)
    }

    /// Records the timestamp if it is newer than the stored one.
    ///
    /// Returns whether the chunk changed since it was last recorded.
    pub fn check_and_update(
        &mut self,
        position: RegionChunkPosition,
        last_update: i64,
    ) -> Result<bool, io::Error> {
        if self.last_update(position)? >= last_update {
            return Ok(false);
        }

        self.source.seek(slot_offset(position))?;
        self.source.write_i64::<BigEndian>(last_update)?;
        self.source.flush()?;

        Ok(true)
    }
}

fn slot_offset(position: RegionChunkPosition) -> SeekFrom {
    SeekFrom::Start(position.metadata_index() as u64 * 8)
}
