use std::str::FromStr;

/// Amount of chunks along one side of a region.
pub const REGION_CHUNK_LENGTH: i32 = 32;

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone)]
pub struct RegionPosition {
    pub x: i32,
    pub z: i32,
}

impl RegionPosition {
    pub fn new(x: i32, z: i32) -> RegionPosition {
        RegionPosition { x, z }
    }

    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionPosition {
        let x = chunk_x >> 5;
        let z = chunk_z >> 5;

        RegionPosition::new(x, z)
    }

    /// Parses names of the form `r.<x>.<z>.mca`.
    pub fn from_filename(filename: &str) -> Option<RegionPosition> {
        let parts: Vec<_> = filename.split('.').collect();

        let incorrect_format = parts.len() != 4 || parts[0] != "r" || parts[3] != "mca";

        if incorrect_format {
            return None;
        }

        let x = i32::from_str(parts[1]).ok()?;
        let z = i32::from_str(parts[2]).ok()?;

        Some(RegionPosition::new(x, z))
    }

    pub fn filename(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// World chunk coordinates of the given slot in this region.
    pub fn chunk_position(&self, position: RegionChunkPosition) -> (i32, i32) {
        (
            self.x * REGION_CHUNK_LENGTH + position.x as i32,
            self.z * REGION_CHUNK_LENGTH + position.z as i32,
        )
    }
}

/// Chunk slot inside a region.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone)]
pub struct RegionChunkPosition {
    pub x: u8,
    pub z: u8,
}

impl RegionChunkPosition {
    pub fn new(x: u8, z: u8) -> RegionChunkPosition {
        debug_assert!(32 > x, "Region chunk x coordinate out of bounds");
        debug_assert!(32 > z, "Region chunk z coordinate out of bounds");

        RegionChunkPosition { x, z }
    }

    /// Any chunk coordinate maps into the slot grid, negative ones included.
    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionChunkPosition {
        let x = (chunk_x & 31) as u8;
        let z = (chunk_z & 31) as u8;

        RegionChunkPosition::new(x, z)
    }

    pub(crate) fn from_metadata_index(index: usize) -> RegionChunkPosition {
        RegionChunkPosition::new((index % 32) as u8, (index / 32) as u8)
    }

    /// Index of the slot in the location table and in journals.
    pub(crate) fn metadata_index(&self) -> usize {
        self.x as usize + self.z as usize * 32
    }
}
