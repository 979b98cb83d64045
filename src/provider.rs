use crate::journal::Journal;
use crate::position::RegionPosition;
use crate::region::Region;
use log::debug;
use std::fs::{self, read_dir, File};
use std::io;
use std::path::{Path, PathBuf};

pub trait RegionProvider<S> {
    fn get_region(&self, region_pos: RegionPosition) -> Result<Region<S>, io::Error>;
}

/// Regions stored as `r.<x>.<z>.mca` files in a world's region folder.
pub struct FolderRegionProvider {
    /// Folder where region files located.
    folder_path: PathBuf,
    /// Folder where journals are kept, if chunks are processed incrementally.
    journal_path: Option<PathBuf>,
}

impl FolderRegionProvider {
    pub fn new<P: AsRef<Path>>(folder: P) -> FolderRegionProvider {
        FolderRegionProvider {
            folder_path: folder.as_ref().to_path_buf(),
            journal_path: None,
        }
    }

    /// Attaches a journal to every region, creating the journal folder.
    pub fn with_journal<P: AsRef<Path>>(mut self, journal_folder: P) -> Result<Self, io::Error> {
        let journal_path = journal_folder.as_ref().to_path_buf();

        fs::create_dir_all(&journal_path)?;
        self.journal_path = Some(journal_path);

        Ok(self)
    }

    /// Positions of all region files in the folder, other files are skipped.
    pub fn iter_positions(&self) -> Result<impl Iterator<Item = RegionPosition>, io::Error> {
        let positions: Vec<_> = read_dir(&self.folder_path)?
            .filter_map(|dir| dir.ok())
            .filter_map(|dir| {
                let path = dir.path();
                let position = region_pos_from_filename(&path);

                if position.is_none() {
                    debug!(
                        target: "anvil-terrain",
                        "Skipping {}, not a region file",
                        path.display()
                    );
                }

                position
            })
            .collect();

        Ok(positions.into_iter())
    }
}

impl RegionProvider<File> for FolderRegionProvider {
    fn get_region(&self, position: RegionPosition) -> Result<Region<File>, io::Error> {
        let region_path = self.folder_path.join(position.filename());

        match &self.journal_path {
            Some(journal_path) => {
                let region = Region::open(&region_path)?;
                let journal = Journal::for_region(journal_path, &region_path)?;

                Ok(region.with_journal(journal))
            }
            None => Region::open(region_path),
        }
    }
}

fn region_pos_from_filename(path: &Path) -> Option<RegionPosition> {
    // we can use lossy because of the bound check later
    let filename = path.file_name()?.to_string_lossy();

    RegionPosition::from_filename(&filename)
}
