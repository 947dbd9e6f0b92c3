//! # Configuration Document
//!
//! One namespace-qualified, versioned XML file loaded into a [`Tree`].
//!
//! All mutation happens in memory. The only operations that touch the
//! filesystem are [`Document::backup`], [`Document::stage`] and
//! [`Document::persist`], and all of them skip the filesystem when
//! [`RunOptions::dry_run`] is set.

use crate::options::RunOptions;
use crate::primitives::VERSION_ATTR;
use crate::tag::Tag;
use crate::tree::Tree;
use crate::types::{UpgradeError, Version};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A single configuration file and its parsed tree.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    path: PathBuf,
    root_tag: Tag,
    version: Version,
    tree: Tree,
}

impl Document {
    /// Load and validate `path`.
    ///
    /// The root element must be `root_tag` in the Pion namespace and must
    /// carry a `pion_version` attribute.
    pub fn load(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        root_tag: Tag,
    ) -> Result<Self, UpgradeError> {
        let path = path.into();
        let name = name.into();
        tracing::debug!("{}: parsing XML configuration file: {}", name, path.display());

        let xml = fs::read_to_string(&path).map_err(|e| UpgradeError::io(&path, e))?;
        Self::from_xml(path, name, root_tag, &xml)
    }

    /// Build a document from XML text already in memory.
    pub fn from_xml(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        root_tag: Tag,
        xml: &str,
    ) -> Result<Self, UpgradeError> {
        let path = path.into();
        let tree = Tree::parse(xml)?;
        let root = tree.root();

        if !tree.is(root, root_tag) {
            return Err(UpgradeError::SchemaMismatch {
                expected: root_tag.clark(),
                found: tree
                    .name(root)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                path,
            });
        }

        let version = match tree.attribute(root, VERSION_ATTR) {
            Some(v) if !v.is_empty() => Version::new(v),
            _ => return Err(UpgradeError::MissingVersion { path }),
        };

        Ok(Self {
            name: name.into(),
            path,
            root_tag,
            version,
            tree,
        })
    }

    /// Logical name (e.g. `UserConfig`, or a vocabulary id).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point the document at a new backing file. Nothing is copied.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    #[must_use]
    pub fn root_tag(&self) -> Tag {
        self.root_tag
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Text of the root's first direct child of kind `tag`.
    ///
    /// Used to resolve cross-references such as the platform document's
    /// `CodecConfig` path.
    #[must_use]
    pub fn field(&self, tag: Tag) -> Option<String> {
        self.tree.find_text(self.tree.root(), tag)
    }

    /// Stamp a new version on the root. In memory only.
    pub fn set_version(&mut self, version: &Version) {
        self.version = version.clone();
        let root = self.tree.root();
        self.tree.set_attribute(root, VERSION_ATTR, version.as_str());
    }

    /// Copy the backing file verbatim into `dest_dir`, keeping its file
    /// name. Returns the backup path.
    pub fn backup(&self, dest_dir: &Path, options: &RunOptions) -> Result<PathBuf, UpgradeError> {
        let file_name = self.path.file_name().ok_or_else(|| {
            UpgradeError::io(&self.path, "backing path has no file name")
        })?;
        let target = dest_dir.join(file_name);
        tracing::debug!(
            "{}: backing up {} to {}",
            self.name,
            self.path.display(),
            dest_dir.display()
        );

        if !options.dry_run {
            fs::copy(&self.path, &target).map_err(|e| UpgradeError::io(&target, e))?;
        }
        Ok(target)
    }

    /// Write the in-memory tree back to the backing file.
    ///
    /// Equivalent to [`Document::stage`] followed by [`StagedWrite::commit`].
    pub fn persist(&self, options: &RunOptions) -> Result<(), UpgradeError> {
        match self.stage(options)? {
            Some(staged) => staged.commit(),
            None => Ok(()),
        }
    }

    /// Serialize the tree into a temporary file next to the backing file.
    ///
    /// The tree is always serialized so that dry runs surface encoding
    /// errors. Outside dry-run mode the bytes land in a temporary file in
    /// the target directory; the target itself is untouched until the
    /// returned [`StagedWrite`] is committed. Dry runs return `None`.
    pub fn stage(&self, options: &RunOptions) -> Result<Option<StagedWrite>, UpgradeError> {
        tracing::debug!("{}: saving {}", self.name, self.path.display());
        let bytes = self.tree.to_xml()?;

        if options.dry_run {
            return Ok(None);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(|e| UpgradeError::io(dir, e))?;
        file.write_all(&bytes)
            .map_err(|e| UpgradeError::io(file.path(), e))?;
        if let Ok(meta) = fs::metadata(&self.path) {
            file.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| UpgradeError::io(&self.path, e))?;
        }
        Ok(Some(StagedWrite {
            file,
            target: self.path.clone(),
        }))
    }
}

// =============================================================================
// STAGED WRITE
// =============================================================================

/// A fully written temporary file waiting to replace its target.
///
/// Dropping it without committing deletes the temporary file and leaves
/// the target as it was.
#[derive(Debug)]
pub struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file over the target.
    pub fn commit(self) -> Result<(), UpgradeError> {
        self.file
            .persist(&self.target)
            .map_err(|e| UpgradeError::io(&self.target, e))?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
