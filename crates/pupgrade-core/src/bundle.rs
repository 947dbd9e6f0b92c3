//! # Configuration Bundle
//!
//! The full set of cross-referencing documents that describe one Pion
//! deployment.
//!
//! Resolution starts at `platform.xml`. Its path fields name every other
//! configuration document; the vocabulary index in turn names every
//! vocabulary document. Four auxiliary documents with their own root tags
//! are loaded by fixed file name. Any file that is missing or malformed
//! aborts construction, so a `Bundle` is always complete.
//!
//! This module only holds data and resolution. Writing a bundle back to
//! disk lives in [`crate::persistence`].

use crate::document::Document;
use crate::primitives::PLATFORM_FILE;
use crate::tag::Tag;
use crate::types::{UpgradeError, Version};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// CONFIG FILE KINDS
// =============================================================================

/// Where a bundle member's file path comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Fixed file name inside the configuration directory.
    Fixed(&'static str),
    /// Text of this path field on the platform document.
    Field(Tag),
}

/// The named (non-vocabulary) documents of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigFile {
    Platform,
    Codec,
    Database,
    Reactor,
    Service,
    Protocol,
    User,
    VocabularyIndex,
    Robots,
    SearchEngines,
    ReplayQueries,
    DatabaseEngines,
}

impl ConfigFile {
    /// Documents referenced from the platform document, in load order.
    pub const REFERENCED: [Self; 7] = [
        Self::Codec,
        Self::Database,
        Self::Reactor,
        Self::Service,
        Self::Protocol,
        Self::User,
        Self::VocabularyIndex,
    ];

    /// Documents loaded unconditionally by file name, in load order.
    pub const AUXILIARY: [Self; 4] = [
        Self::Robots,
        Self::SearchEngines,
        Self::ReplayQueries,
        Self::DatabaseEngines,
    ];

    /// Logical document name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Platform => "PionConfig",
            Self::Codec => "CodecConfig",
            Self::Database => "DatabaseConfig",
            Self::Reactor => "ReactorConfig",
            Self::Service => "ServiceConfig",
            Self::Protocol => "ProtocolConfig",
            Self::User => "UserConfig",
            Self::VocabularyIndex => "VocabularyConfig",
            Self::Robots => "RobotConfig",
            Self::SearchEngines => "SearchEngineConfig",
            Self::ReplayQueries => "ReplayTemplates",
            Self::DatabaseEngines => "DatabaseTemplates",
        }
    }

    /// Expected root element.
    #[must_use]
    pub const fn root_tag(self) -> Tag {
        match self {
            Self::Robots => Tag::RobotConfig,
            Self::SearchEngines => Tag::SearchEngineConfig,
            Self::ReplayQueries => Tag::ReplayTemplates,
            Self::DatabaseEngines => Tag::DatabaseTemplates,
            _ => Tag::PionConfig,
        }
    }

    #[must_use]
    pub const fn location(self) -> Location {
        match self {
            Self::Platform => Location::Fixed(PLATFORM_FILE),
            Self::Codec => Location::Field(Tag::CodecConfig),
            Self::Database => Location::Field(Tag::DatabaseConfig),
            Self::Reactor => Location::Field(Tag::ReactorConfig),
            Self::Service => Location::Field(Tag::ServiceConfig),
            Self::Protocol => Location::Field(Tag::ProtocolConfig),
            Self::User => Location::Field(Tag::UserConfig),
            Self::VocabularyIndex => Location::Field(Tag::VocabularyConfig),
            Self::Robots => Location::Fixed("robots.xml"),
            Self::SearchEngines => Location::Fixed("SearchEngines.xml"),
            Self::ReplayQueries => Location::Fixed("ReplayQueries.xml"),
            Self::DatabaseEngines => Location::Fixed("dbengines.xml"),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PLATFORM PATHS
// =============================================================================

/// Non-XML locations named by the platform document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPaths {
    pub log_config: PathBuf,
    pub plugin_path: PathBuf,
    pub data_directory: PathBuf,
}

impl PlatformPaths {
    fn resolve(base_dir: &Path, platform: &Document) -> Result<Self, UpgradeError> {
        Ok(Self {
            log_config: base_dir.join(require_field(platform, Tag::LogConfig)?),
            plugin_path: base_dir.join(require_field(platform, Tag::PluginPath)?),
            data_directory: base_dir.join(require_field(platform, Tag::DataDirectory)?),
        })
    }
}

fn require_field(doc: &Document, field: Tag) -> Result<String, UpgradeError> {
    doc.field(field)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| UpgradeError::MissingField {
            document: doc.name().to_string(),
            field: field.local_name().to_string(),
        })
}

/// Load a referenced document, reporting file and syntax problems as
/// unresolved references from `referrer`.
fn resolve(
    path: PathBuf,
    name: &str,
    root_tag: Tag,
    referrer: &str,
) -> Result<Document, UpgradeError> {
    Document::load(&path, name, root_tag).map_err(|e| match e {
        UpgradeError::Io { message, .. } => UpgradeError::UnresolvedReference {
            referrer: referrer.to_string(),
            path,
            reason: message,
        },
        UpgradeError::Xml(reason) => UpgradeError::UnresolvedReference {
            referrer: referrer.to_string(),
            path,
            reason,
        },
        other => other,
    })
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Every document of one configuration directory.
///
/// The bundle version mirrors the platform document's version and is
/// propagated to every member by [`Bundle::set_version_all`].
#[derive(Debug, Clone)]
pub struct Bundle {
    base_dir: PathBuf,
    version: Version,
    documents: IndexMap<ConfigFile, Document>,
    vocabularies: IndexMap<String, Document>,
}

impl Bundle {
    /// Start a bundle from its platform document.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, platform: Document) -> Self {
        let mut documents = IndexMap::new();
        let version = platform.version().clone();
        documents.insert(ConfigFile::Platform, platform);
        Self {
            base_dir: base_dir.into(),
            version,
            documents,
            vocabularies: IndexMap::new(),
        }
    }

    /// Load and resolve every document of the bundle in `config_dir`.
    pub fn open(config_dir: impl AsRef<Path>) -> Result<Self, UpgradeError> {
        let base_dir = config_dir.as_ref().to_path_buf();
        let platform = resolve(
            base_dir.join(PLATFORM_FILE),
            ConfigFile::Platform.name(),
            ConfigFile::Platform.root_tag(),
            &base_dir.display().to_string(),
        )?;

        let mut references = Vec::with_capacity(ConfigFile::REFERENCED.len());
        for kind in ConfigFile::REFERENCED {
            if let Location::Field(field) = kind.location() {
                references.push((kind, require_field(&platform, field)?));
            }
        }
        let referrer = platform.name().to_string();

        let mut bundle = Self::new(&base_dir, platform);
        let paths = bundle.platform_paths()?;

        for (kind, relative) in references {
            let doc = resolve(base_dir.join(relative), kind.name(), kind.root_tag(), &referrer)?;
            if kind == ConfigFile::VocabularyIndex {
                bundle.resolve_vocabularies(&doc)?;
            }
            bundle.insert_document(kind, doc);
        }

        for kind in ConfigFile::AUXILIARY {
            if let Location::Fixed(file) = kind.location() {
                let doc = resolve(base_dir.join(file), kind.name(), kind.root_tag(), &referrer)?;
                bundle.insert_document(kind, doc);
            }
        }

        tracing::debug!("log configuration file: {}", paths.log_config.display());
        tracing::debug!("path to plugin files: {}", paths.plugin_path.display());
        tracing::debug!("data directory: {}", paths.data_directory.display());
        tracing::debug!("current version: {}", bundle.version);

        Ok(bundle)
    }

    /// Load every vocabulary listed in the vocabulary index. Paths are
    /// relative to the index document's own directory.
    fn resolve_vocabularies(&mut self, index: &Document) -> Result<(), UpgradeError> {
        let index_dir = index
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let tree = index.tree();

        for entry in tree.descendants(tree.root(), Tag::VocabularyConfig) {
            let id = tree
                .attribute(entry, "id")
                .ok_or_else(|| UpgradeError::MissingField {
                    document: index.name().to_string(),
                    field: "VocabularyConfig/@id".to_string(),
                })?
                .to_string();
            let relative = tree.text(entry).unwrap_or_default();
            let doc = resolve(
                index_dir.join(relative.trim()),
                &id,
                Tag::PionConfig,
                index.name(),
            )?;
            self.insert_vocabulary(doc);
        }
        Ok(())
    }

    /// Add or replace a named document.
    pub fn insert_document(&mut self, kind: ConfigFile, doc: Document) {
        self.documents.insert(kind, doc);
    }

    /// Add or replace a vocabulary, keyed by its document name.
    pub fn insert_vocabulary(&mut self, doc: Document) {
        self.vocabularies.insert(doc.name().to_string(), doc);
    }

    /// Platform paths (log config, plugins, data) resolved against the
    /// current base directory.
    pub fn platform_paths(&self) -> Result<PlatformPaths, UpgradeError> {
        let platform = self.documents.get(&ConfigFile::Platform).ok_or_else(|| {
            UpgradeError::MissingField {
                document: self.base_dir.display().to_string(),
                field: ConfigFile::Platform.name().to_string(),
            }
        })?;
        PlatformPaths::resolve(&self.base_dir, platform)
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub(crate) fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    #[must_use]
    pub fn document(&self, kind: ConfigFile) -> Option<&Document> {
        self.documents.get(&kind)
    }

    pub fn document_mut(&mut self, kind: ConfigFile) -> Option<&mut Document> {
        self.documents.get_mut(&kind)
    }

    #[must_use]
    pub fn vocabulary(&self, id: &str) -> Option<&Document> {
        self.vocabularies.get(id)
    }

    pub fn vocabulary_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.vocabularies.get_mut(id)
    }

    /// Named documents in resolution order.
    pub fn documents(&self) -> impl Iterator<Item = (ConfigFile, &Document)> {
        self.documents.iter().map(|(kind, doc)| (*kind, doc))
    }

    /// Vocabulary documents in resolution order.
    pub fn vocabularies(&self) -> impl Iterator<Item = &Document> {
        self.vocabularies.values()
    }

    pub(crate) fn documents_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    pub(crate) fn vocabularies_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.vocabularies.values_mut()
    }

    /// Stamp `version` on the bundle and on every document in it.
    pub fn set_version_all(&mut self, version: &Version) {
        self.version = version.clone();
        for doc in self.documents.values_mut() {
            doc.set_version(version);
        }
        for doc in self.vocabularies.values_mut() {
            doc.set_version(version);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
