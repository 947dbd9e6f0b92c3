//! # Bundle Persistence
//!
//! Filesystem side of a bundle: backup, save, and relocation.
//!
//! [`BundleStore`] wraps the run options so every write it performs is
//! gated by `dry_run`. Nothing here is called until every rule has
//! finished successfully.
//!
//! ## Layout
//!
//! ```text
//! <dest>/                 named documents (platform.xml, users.xml, ...)
//! <dest>/vocabularies/    vocabulary documents
//! ```

use crate::bundle::{Bundle, ConfigFile};
use crate::options::RunOptions;
use crate::primitives::VOCABULARIES_DIR;
use crate::types::UpgradeError;
use std::fs;
use std::path::Path;

/// Applies bundle-wide file operations under one set of run options.
#[derive(Debug, Clone, Copy)]
pub struct BundleStore<'a> {
    options: &'a RunOptions,
}

impl<'a> BundleStore<'a> {
    #[must_use]
    pub fn new(options: &'a RunOptions) -> Self {
        Self { options }
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), UpgradeError> {
        if self.options.dry_run {
            return Ok(());
        }
        if dir.exists() && !dir.is_dir() {
            return Err(UpgradeError::io(dir, "exists but is not a directory"));
        }
        fs::create_dir_all(dir).map_err(|e| UpgradeError::io(dir, e))
    }

    /// Copy every document's current file into `dest` (vocabularies into
    /// `dest/vocabularies`), creating the directories if needed.
    pub fn backup_all(&self, bundle: &Bundle, dest: &Path) -> Result<(), UpgradeError> {
        tracing::info!("creating backups in {}", dest.display());
        self.ensure_dir(dest)?;
        for (_, doc) in bundle.documents() {
            doc.backup(dest, self.options)?;
        }

        let vocab_dir = dest.join(VOCABULARIES_DIR);
        self.ensure_dir(&vocab_dir)?;
        for doc in bundle.vocabularies() {
            doc.backup(&vocab_dir, self.options)?;
        }
        Ok(())
    }

    /// Save every document to its backing path.
    ///
    /// Every document is staged into a temporary file beside its target
    /// before any target is replaced, so a serialization or I/O failure
    /// leaves every backing file as it was. `platform.xml` is renamed
    /// last.
    pub fn persist_all(&self, bundle: &Bundle) -> Result<(), UpgradeError> {
        tracing::info!("saving configuration files");
        let mut platform = None;
        let mut staged = Vec::new();
        for (kind, doc) in bundle.documents() {
            let write = doc.stage(self.options)?;
            if kind == ConfigFile::Platform {
                platform = write;
            } else {
                staged.extend(write);
            }
        }
        for doc in bundle.vocabularies() {
            staged.extend(doc.stage(self.options)?);
        }

        for write in staged.into_iter().chain(platform) {
            tracing::debug!("replacing {}", write.target().display());
            write.commit()?;
        }
        Ok(())
    }

    /// Re-point every document at `new_dir`, keeping file names.
    ///
    /// Nothing is copied; a later [`BundleStore::persist_all`] writes fresh
    /// files there and leaves the originals untouched.
    pub fn relocate(&self, bundle: &mut Bundle, new_dir: &Path) -> Result<(), UpgradeError> {
        tracing::info!("saving upgraded configuration to {}", new_dir.display());
        let vocab_dir = new_dir.join(VOCABULARIES_DIR);
        self.ensure_dir(new_dir)?;
        self.ensure_dir(&vocab_dir)?;

        for doc in bundle.documents_mut() {
            let target = relocated(doc.path(), new_dir)?;
            doc.set_path(target);
        }
        for doc in bundle.vocabularies_mut() {
            let target = relocated(doc.path(), &vocab_dir)?;
            doc.set_path(target);
        }
        bundle.set_base_dir(new_dir);
        Ok(())
    }
}

fn relocated(path: &Path, dir: &Path) -> Result<std::path::PathBuf, UpgradeError> {
    path.file_name()
        .map(|name| dir.join(name))
        .ok_or_else(|| UpgradeError::io(path, "backing path has no file name"))
}

// =============================================================================
// TESTS
// =============================================================================
