//! # Element Vocabulary
//!
//! Every element kind the upgrader reads or writes is a variant of [`Tag`].
//! Tags are matched against parsed names by `(namespace, local name)`, so a
//! misspelled element kind is a compile error rather than a silent miss.

use crate::primitives::PION_NS;
use std::fmt;

// =============================================================================
// QUALIFIED NAMES
// =============================================================================

/// A resolved element name as it appeared in a parsed document.
///
/// `prefix` is kept only so the element is written back exactly as read;
/// matching uses `namespace` and `local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QualName {
    /// The name as written in markup (`prefix:local` or `local`).
    #[must_use]
    pub fn markup(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QualName {
    /// Clark notation: `{namespace}local`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

// =============================================================================
// TAG
// =============================================================================

/// Element kinds in the Pion configuration namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    // Document roots
    PionConfig,
    RobotConfig,
    SearchEngineConfig,
    ReplayTemplates,
    DatabaseTemplates,

    // Path fields on the platform document
    CodecConfig,
    DatabaseConfig,
    ReactorConfig,
    ServiceConfig,
    ProtocolConfig,
    UserConfig,
    VocabularyConfig,
    LogConfig,
    PluginPath,
    DataDirectory,

    // Users
    User,
    Permit,
    Permission,
    Unrestricted,

    // Reactors
    Reactor,
    Plugin,
    TableDef,
    Table,
    Field,
    Workspace,

    // Services
    Server,
    WebService,
    PlatformService,
    Resource,

    // Protocols
    Protocol,
    Extract,
    Source,

    // Vocabularies
    Vocabulary,
    Term,
    Type,

    // Shared children
    Name,
    Comment,
}

impl Tag {
    /// Local element name without namespace.
    #[must_use]
    pub const fn local_name(self) -> &'static str {
        match self {
            Self::PionConfig => "PionConfig",
            Self::RobotConfig => "RobotConfig",
            Self::SearchEngineConfig => "SearchEngineConfig",
            Self::ReplayTemplates => "ReplayTemplates",
            Self::DatabaseTemplates => "DatabaseTemplates",
            Self::CodecConfig => "CodecConfig",
            Self::DatabaseConfig => "DatabaseConfig",
            Self::ReactorConfig => "ReactorConfig",
            Self::ServiceConfig => "ServiceConfig",
            Self::ProtocolConfig => "ProtocolConfig",
            Self::UserConfig => "UserConfig",
            Self::VocabularyConfig => "VocabularyConfig",
            Self::LogConfig => "LogConfig",
            Self::PluginPath => "PluginPath",
            Self::DataDirectory => "DataDirectory",
            Self::User => "User",
            Self::Permit => "Permit",
            Self::Permission => "Permission",
            Self::Unrestricted => "Unrestricted",
            Self::Reactor => "Reactor",
            Self::Plugin => "Plugin",
            Self::TableDef => "TableDef",
            Self::Table => "Table",
            Self::Field => "Field",
            Self::Workspace => "Workspace",
            Self::Server => "Server",
            Self::WebService => "WebService",
            Self::PlatformService => "PlatformService",
            Self::Resource => "Resource",
            Self::Protocol => "Protocol",
            Self::Extract => "Extract",
            Self::Source => "Source",
            Self::Vocabulary => "Vocabulary",
            Self::Term => "Term",
            Self::Type => "Type",
            Self::Name => "Name",
            Self::Comment => "Comment",
        }
    }

    /// Namespace every tag lives in.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        PION_NS
    }

    /// Clark notation (`{namespace}local`), used in error messages.
    #[must_use]
    pub fn clark(self) -> String {
        format!("{{{}}}{}", self.namespace(), self.local_name())
    }

    /// True if `name` is this tag.
    #[must_use]
    pub fn matches(self, name: &QualName) -> bool {
        name.local == self.local_name() && name.namespace.as_deref() == Some(self.namespace())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

// =============================================================================
// TESTS
// =============================================================================
