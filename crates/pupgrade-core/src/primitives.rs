//! # Fixed Primitives
//!
//! Hardcoded constants describing the on-disk layout of a Pion
//! configuration bundle. These are compiled into the binary and never
//! change at runtime.

/// XML namespace shared by every Pion configuration document.
pub const PION_NS: &str = "http://purl.org/pion/config";

/// Root attribute carrying the configuration schema version.
pub const VERSION_ATTR: &str = "pion_version";

/// Latest configuration version this build knows how to produce.
///
/// Must equal the target of the last registered rule.
pub const CURRENT_VERSION: &str = "3.1.2";

/// File name of the root document inside the configuration directory.
pub const PLATFORM_FILE: &str = "platform.xml";

/// Subdirectory used for vocabulary documents in backups and relocations.
pub const VOCABULARIES_DIR: &str = "vocabularies";

/// Prefix of the backup directory; the pre-upgrade version is appended.
pub const BACKUP_PREFIX: &str = "backup-";

/// Indentation used when serializing documents (spaces per level).
pub const INDENT_WIDTH: usize = 2;

/// Name of the backup directory for a bundle at `version`.
#[must_use]
pub fn backup_dir_name(version: &str) -> String {
    format!("{BACKUP_PREFIX}{version}")
}
