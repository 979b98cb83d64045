use crate::position::RegionPosition;
use crate::region::Region;
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub use zip::result::ZipError;

/// The regions are read from a zipped world.
pub struct ZipRegionProvider<R: Read + Seek> {
    zip_archive: ZipArchive<R>,
    // Prefix for the region folder. Must end with "/".
    // For example: "region/", "world/region/" or "saves/world/region/"
    region_prefix: String,
    // Cache region position to uncompressed file, so each region file is
    // only uncompressed once
    cache: HashMap<RegionPosition, Vec<u8>>,
}

#[derive(Debug)]
pub enum ZipProviderError {
    Io(io::Error),
    Zip(ZipError),
    RegionFolderNotFound,
    MoreThanOneRegionFolder,
    RegionNotFound { position: RegionPosition },
}

impl From<io::Error> for ZipProviderError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ZipError> for ZipProviderError {
    fn from(e: ZipError) -> Self {
        Self::Zip(e)
    }
}

impl Error for ZipProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ZipProviderError::Io(e) => Some(e),
            ZipProviderError::Zip(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for ZipProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ZipProviderError::*;
        match self {
            Io(_) => write!(f, "IO Error"),
            Zip(_) => write!(f, "Failed to read zip archive"),
            RegionFolderNotFound => write!(f, "No region folder in archive"),
            MoreThanOneRegionFolder => write!(f, "More than one region folder in archive"),
            RegionNotFound { position } => {
                write!(f, "Region {}, {} not found", position.x, position.z)
            }
        }
    }
}

/// Folder of a region file entry, including the trailing "/".
fn region_folder(entry_name: &str) -> Option<&str> {
    let (folder, filename) = match entry_name.rfind('/') {
        Some(index) => entry_name.split_at(index + 1),
        None => return None,
    };

    RegionPosition::from_filename(filename)?;

    let is_region_folder = folder == "region/" || folder.ends_with("/region/");

    if is_region_folder {
        Some(folder)
    } else {
        None
    }
}

// Find the path of the region folder inside the zip archive.
// For example: "region/", "world/region/" or "saves/world/region/"
fn find_region_folder_path<R: Read + Seek>(
    zip_archive: &ZipArchive<R>,
) -> Result<String, ZipProviderError> {
    let mut region_prefixes: Vec<&str> = zip_archive
        .file_names()
        .filter_map(region_folder)
        .collect();

    region_prefixes.sort();
    region_prefixes.dedup();

    match region_prefixes.as_slice() {
        [] => Err(ZipProviderError::RegionFolderNotFound),
        [region_prefix] => Ok(region_prefix.to_string()),
        _ => Err(ZipProviderError::MoreThanOneRegionFolder),
    }
}

impl<R: Read + Seek> ZipRegionProvider<R> {
    /// Opens an archive holding exactly one region folder.
    pub fn new(reader: R) -> Result<Self, ZipProviderError> {
        let zip_archive = ZipArchive::new(reader)?;
        let region_prefix = find_region_folder_path(&zip_archive)?;

        Ok(Self::with_region_prefix(zip_archive, region_prefix))
    }

    /// Uses the given region folder, such as `world/DIM-1/region/`.
    pub fn with_region_folder(reader: R, region_prefix: &str) -> Result<Self, ZipProviderError> {
        let zip_archive = ZipArchive::new(reader)?;
        let mut region_prefix = region_prefix.to_owned();

        if !region_prefix.ends_with('/') {
            region_prefix.push('/');
        }

        Ok(Self::with_region_prefix(zip_archive, region_prefix))
    }

    fn with_region_prefix(zip_archive: ZipArchive<R>, region_prefix: String) -> Self {
        ZipRegionProvider {
            zip_archive,
            region_prefix,
            cache: HashMap::new(),
        }
    }

    fn region_path(&self, position: RegionPosition) -> String {
        format!("{}{}", self.region_prefix, position.filename())
    }

    /// Positions of all regions in the region folder.
    pub fn iter_positions(&self) -> impl Iterator<Item = RegionPosition> + '_ {
        self.zip_archive
            .file_names()
            .filter_map(move |name| name.strip_prefix(self.region_prefix.as_str()))
            .filter_map(RegionPosition::from_filename)
    }

    // Warning: the region is read from an in-memory copy of the archive entry.
    // ZipArchive only provides Read access to the compressed files, so the
    // entry is uncompressed into memory and the buffer passed to Region.
    pub fn get_region(
        &mut self,
        position: RegionPosition,
    ) -> Result<Region<Cursor<Vec<u8>>>, ZipProviderError> {
        if let Some(buf) = self.cache.get(&position) {
            return Ok(Region::load(Cursor::new(buf.clone()))?);
        }

        let region_path = self.region_path(position);

        let mut region_file = match self.zip_archive.by_name(&region_path) {
            Ok(x) => x,
            Err(ZipError::FileNotFound) => {
                return Err(ZipProviderError::RegionNotFound { position })
            }
            Err(e) => return Err(e.into()),
        };

        let uncompressed_size = region_file.size();
        let mut buf = Vec::with_capacity(uncompressed_size as usize);
        region_file.read_to_end(&mut buf)?;

        debug!(
            target: "anvil-terrain",
            "Uncompressed {} to {} bytes",
            region_path,
            buf.len()
        );

        // Insert into cache
        self.cache.insert(position, buf.clone());

        Ok(Region::load(Cursor::new(buf))?)
    }
}

impl ZipRegionProvider<File> {
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self, ZipProviderError> {
        let file = File::open(path)?;

        Self::new(file)
    }
}
