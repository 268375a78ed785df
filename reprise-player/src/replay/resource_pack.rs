//! Temporary storage for resource packs embedded in a replay.
//!
//! Packs are copied out of the source on first use into a private temporary
//! directory as `<hash>.zip`. The directory is removed on [`release`], which
//! is safe to call more than once.
//!
//! [`release`]: ResourcePackCache::release

use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::ReplayError;

use super::source::{is_safe_hash, ReplaySource};

const TEMP_DIR_PREFIX: &str = "reprise-packs-";

#[derive(Debug, Default)]
pub struct ResourcePackCache {
    dir: Option<TempDir>,
    released: bool,
}

impl ResourcePackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory packs are written to, if one has been created
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_dir(&mut self) -> Result<&Path, ReplayError> {
        if self.released {
            return Err(ReplayError::Terminated);
        }
        if self.dir.is_none() {
            let dir = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;
            debug!("Resource pack directory: {}", dir.path().display());
            self.dir = Some(dir);
        }
        match &self.dir {
            Some(dir) => Ok(dir.path()),
            None => Err(ReplayError::Terminated),
        }
    }

    /// Copy the pack with index id `id` out of `source`.
    ///
    /// Returns the file to load, or `None` when the replay has no such pack.
    /// A pack that is already on disk is not copied again.
    pub fn materialize(
        &mut self,
        source: &dyn ReplaySource,
        id: u32,
    ) -> Result<Option<PathBuf>, ReplayError> {
        let Some(index) = source.resource_pack_index()? else {
            debug!("Replay has no resource pack index, ignoring pack {}", id);
            return Ok(None);
        };
        let Some(hash) = index.get(&id) else {
            debug!("Resource pack {} is not in the index", id);
            return Ok(None);
        };
        if !is_safe_hash(hash) {
            warn!("Ignoring resource pack {} with invalid hash {:?}", id, hash);
            return Ok(None);
        }

        let file = self.ensure_dir()?.join(format!("{}.zip", hash));
        if file.exists() {
            return Ok(Some(file));
        }

        let Some(mut pack) = source.open_resource_pack(hash)? else {
            warn!("Resource pack {} ({}) is missing from the replay", id, hash);
            return Ok(None);
        };

        // Write under a temporary name so a failed copy never looks complete
        let partial = file.with_extension("zip.part");
        let result = (|| -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&partial)?);
            io::copy(&mut pack, &mut out)?;
            out.flush()?;
            fs::rename(&partial, &file)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        debug!("Materialized resource pack {} to {}", id, file.display());
        Ok(Some(file))
    }

    /// Delete the directory and everything in it
    pub fn release(&mut self) -> Result<(), ReplayError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if let Some(dir) = self.dir.take() {
            debug!("Removing resource pack directory {}", dir.path().display());
            dir.close()?;
        }
        Ok(())
    }
}
