//! Reading Minecraft Anvil worlds: region files, chunk tags and block data.
//!
//! A [`Region`] is a 32x32 group of chunks stored in an `r.<x>.<z>.mca` file.
//! Chunks are decoded into a [`Chunk`] exposing block names per coordinate,
//! biomes and the column height, while the raw tag tree stays reachable with
//! [`PathSpec`] queries.
//!
//! Regions can carry a [`Journal`] so only chunks updated since the last run
//! are reported, see [`Region::get_chunk_if_dirty`].

mod chunk;
mod compression;
mod error;
mod journal;
mod path;
mod position;
mod provider;
mod region;
mod tag;
#[cfg(test)]
mod test_utils;
#[cfg(feature = "zip")]
mod zip_region_provider;

pub use crate::chunk::{bit_width, Chunk, Section, AIR, CHUNK_SECTIONS};
pub use crate::compression::{decompress_file, inflate, CompressionScheme};
pub use crate::error::{ChunkReadError, DecompressionError, FormatError, PathParseError};
pub use crate::journal::Journal;
pub use crate::path::{Component, Container, PathSpec};
pub use crate::position::{RegionChunkPosition, RegionPosition, REGION_CHUNK_LENGTH};
pub use crate::provider::{FolderRegionProvider, RegionProvider};
pub use crate::region::Region;
pub use crate::tag::{decode, decode_named, CompoundTag, ListTag, Tag, TagKind};
#[cfg(feature = "zip")]
pub use crate::zip_region_provider::{ZipError, ZipProviderError, ZipRegionProvider};
