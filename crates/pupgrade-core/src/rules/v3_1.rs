//! # 3.0.x → 3.1.2
//!
//! Edits, in order:
//! - users: path-based `Permit` entries become typed `Permission` entries
//! - reactors: new request columns for multi-database reactors, and
//!   workspace names interned into top-level `Workspace` entities
//! - services: `log-service` replaced by the monitor and XML log services
//! - protocols: `cs-content-type` extraction ahead of `content-type`
//! - vocabulary index: the omniture vocabulary
//! - clickstream vocabulary: new terms and corrected status comments

use crate::bundle::{Bundle, ConfigFile};
use crate::document::Document;
use crate::options::RunOptions;
use crate::rule::{UpgradeRule, VersionPattern};
use crate::rules::anchor_missing;
use crate::tag::Tag;
use crate::tree::{NodeId, Tree};
use crate::types::{UpgradeError, Version};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const TARGET: &str = "3.1.2";
const PATTERN: &str = r"^3\.0\..*$";

// Users
const ADMIN_PATHS: [&str; 2] = ["/config", "/config/users"];
/// (permit path, permission type, unrestricted)
const PERMISSION_KINDS: [(&str, &str, bool); 6] = [
    ("/config/vocabularies", "Vocabularies", false),
    ("/config/codecs", "Codecs", false),
    ("/config/databases", "Databases", false),
    ("/config/protocols", "Protocols", false),
    ("/config/reactors", "Reactors", true),
    ("/replay", "ReplayService", true),
];

// Reactors
const DEFAULT_WORKSPACE: &str = "Default";
const MULTI_DATABASE_REACTOR: &str = "MultiDatabaseReactor";
const REQUESTS_TABLE: &str = "requests";
const REQUEST_COLUMNS: [(&str, &str); 2] = [
    ("urn:vocab:clickstream#cs-content-type", "cs_content_type"),
    ("urn:vocab:clickstream#cs-content", "cs_content"),
];

// Services
const LOG_SERVICE: &str = "log-service";

// Protocols
const HTTP_PROTOCOL: &str = "HTTPProtocol";

// Vocabularies
const OMNITURE_VOCAB: &str = "urn:vocab:omniture";
const OMNITURE_PATH: &str = "vocabularies/omniture.xml";
const CLICKSTREAM_VOCAB: &str = "urn:vocab:clickstream";
const CONTENT_TYPE: &str = "urn:vocab:clickstream#content-type";
const CS_CONTENT_TYPE: &str = "urn:vocab:clickstream#cs-content-type";
const NEW_PAGE: &str = "urn:vocab:clickstream#new-page";
const REFUSED: &str = "urn:vocab:clickstream#refused";
const CANCELED: &str = "urn:vocab:clickstream#canceled";
const REQUEST_STATUS: &str = "urn:vocab:clickstream#request-status";
const RESPONSE_STATUS: &str = "urn:vocab:clickstream#response-status";
const TCP_STATUS: &str = "urn:vocab:clickstream#tcp-status";

// =============================================================================
// RULE
// =============================================================================

/// Upgrade from any 3.0.x configuration to 3.1.2.
#[derive(Debug, Clone)]
pub struct Upgrade30xTo31x {
    target: Version,
    pattern: VersionPattern,
}

impl Upgrade30xTo31x {
    pub fn new() -> Result<Self, UpgradeError> {
        Ok(Self {
            target: Version::new(TARGET),
            pattern: VersionPattern::new(PATTERN)?,
        })
    }
}

fn tree_of(bundle: &mut Bundle, kind: ConfigFile) -> Result<&mut Tree, UpgradeError> {
    bundle
        .document_mut(kind)
        .map(Document::tree_mut)
        .ok_or_else(|| UpgradeError::transform(TARGET, format!("bundle has no {kind}")))
}

fn new_workspace_id() -> String {
    Uuid::new_v4().to_string()
}

impl UpgradeRule for Upgrade30xTo31x {
    fn target_version(&self) -> &Version {
        &self.target
    }

    fn pattern(&self) -> &VersionPattern {
        &self.pattern
    }

    fn process(&self, bundle: &mut Bundle, options: &RunOptions) -> Result<(), UpgradeError> {
        update_users(tree_of(bundle, ConfigFile::User)?, options);
        update_reactors(tree_of(bundle, ConfigFile::Reactor)?, &mut new_workspace_id);
        update_services(tree_of(bundle, ConfigFile::Service)?, options)?;
        update_protocols(tree_of(bundle, ConfigFile::Protocol)?, options)?;
        update_vocabulary_index(tree_of(bundle, ConfigFile::VocabularyIndex)?);
        match bundle.vocabulary_mut(CLICKSTREAM_VOCAB) {
            Some(doc) => update_clickstream(doc.tree_mut())?,
            None => anchor_missing(options, TARGET, &format!("vocabulary {CLICKSTREAM_VOCAB}"))?,
        }
        Ok(())
    }
}

// =============================================================================
// USERS
// =============================================================================

fn add_permission(tree: &mut Tree, user: NodeId, kind: &str, unrestricted: bool) {
    let permission = tree.sub_element(user, Tag::Permission);
    tree.set_attribute(permission, "type", kind);
    if unrestricted {
        tree.sub_element_with_text(permission, Tag::Unrestricted, "true");
    }
}

/// Replace each user's `Permit` paths with `Permission` entries.
///
/// Administrators get a single `Admin` permission that subsumes the rest.
pub fn update_users(tree: &mut Tree, options: &RunOptions) {
    let root = tree.root();
    for user in tree.descendants(root, Tag::User) {
        tracing::debug!(
            "Updating User configuration: {}",
            tree.attribute(user, "id").unwrap_or_default()
        );

        let permits: Vec<NodeId> = tree
            .child_elements(user)
            .into_iter()
            .filter(|&child| tree.is(child, Tag::Permit))
            .collect();
        let mut granted = BTreeSet::new();
        for permit in permits {
            granted.insert(tree.text(permit).unwrap_or_default().trim().to_string());
            tree.detach(permit);
        }

        if ADMIN_PATHS.iter().any(|path| granted.contains(*path)) {
            add_permission(tree, user, "Admin", false);
            continue;
        }
        for (path, kind, unrestricted) in PERMISSION_KINDS {
            if granted.contains(path) {
                add_permission(tree, user, kind, unrestricted);
            }
        }
    }

    if !options.dry_run {
        tracing::warn!("Please use the web interface to review user permissions.");
    }
}

// =============================================================================
// REACTORS
// =============================================================================

fn add_workspace(tree: &mut Tree, id: &str, name: &str) {
    let root = tree.root();
    let workspace = tree.create_element(Tag::Workspace);
    tree.set_attribute(workspace, "id", id);
    tree.sub_element_with_text(workspace, Tag::Name, name);
    tree.insert_child(root, 0, workspace);
}

/// Add request columns to multi-database reactors and intern workspace
/// names. A file with no reactors gets a single default workspace.
pub fn update_reactors(tree: &mut Tree, next_id: &mut dyn FnMut() -> String) {
    let root = tree.root();
    let reactors = tree.descendants(root, Tag::Reactor);
    if reactors.is_empty() {
        let id = next_id();
        add_workspace(tree, &id, DEFAULT_WORKSPACE);
        return;
    }

    for reactor in reactors {
        if tree.find_text(reactor, Tag::Plugin).as_deref() != Some(MULTI_DATABASE_REACTOR) {
            continue;
        }
        for table_def in tree.descendants(reactor, Tag::TableDef) {
            if tree.find_text(table_def, Tag::Table).as_deref() != Some(REQUESTS_TABLE) {
                continue;
            }
            for (term, column) in REQUEST_COLUMNS {
                let field = tree.sub_element_with_text(table_def, Tag::Field, column);
                tree.set_attribute(field, "term", term);
            }
        }
    }

    intern_workspaces(tree, next_id);
}

/// Replace every `Workspace` name reference with a generated id.
///
/// Each distinct name gets one id and one new top-level
/// `<Workspace id=…><Name>…</Name></Workspace>` entity at the front of the
/// root. References are visited last to first. Returns the name → id map.
pub fn intern_workspaces(
    tree: &mut Tree,
    next_id: &mut dyn FnMut() -> String,
) -> BTreeMap<String, String> {
    let root = tree.root();
    let references = tree.descendants(root, Tag::Workspace);
    let mut ids: BTreeMap<String, String> = BTreeMap::new();

    for reference in references.into_iter().rev() {
        let name = tree.text(reference).unwrap_or_default();
        let id = match ids.get(&name) {
            Some(id) => id.clone(),
            None => {
                let id = next_id();
                ids.insert(name.clone(), id.clone());
                add_workspace(tree, &id, &name);
                id
            }
        };
        tree.set_text(reference, &id);
    }
    ids
}

// =============================================================================
// SERVICES
// =============================================================================

struct Service<'a> {
    id: &'a str,
    name: &'a str,
    comment: &'a str,
    plugin: &'a str,
    resource: &'a str,
}

const NEW_SERVICES: [Service<'static>; 2] = [
    Service {
        id: "monitor-service",
        name: "Event Data Monitoring Service",
        comment: "Pion platform event data monitoring service",
        plugin: "MonitorService",
        resource: "/monitor",
    },
    Service {
        id: "xml-log-service",
        name: "XML Log Service",
        comment: "Recent Log entries in XML",
        plugin: "XMLLogService",
        resource: "/xmllog",
    },
];

fn add_service(tree: &mut Tree, server: NodeId, service: &Service<'_>) {
    let node = tree.sub_element(server, Tag::PlatformService);
    tree.set_attribute(node, "id", service.id);
    tree.sub_element_with_text(node, Tag::Name, service.name);
    tree.sub_element_with_text(node, Tag::Comment, service.comment);
    tree.sub_element_with_text(node, Tag::Plugin, service.plugin);
    tree.sub_element_with_text(node, Tag::Resource, service.resource);
}

/// Drop `log-service` and register the monitor and XML log services in
/// the server that hosted it.
pub fn update_services(tree: &mut Tree, options: &RunOptions) -> Result<(), UpgradeError> {
    let root = tree.root();
    let mut server = None;
    for service in tree.descendants(root, Tag::WebService) {
        if tree.attribute(service, "id") == Some(LOG_SERVICE) {
            server = tree.parent(service);
            tree.detach(service);
        }
    }

    let server = match server {
        Some(server) => server,
        None => {
            anchor_missing(options, TARGET, &format!("WebService {LOG_SERVICE}"))?;
            tree.descendants(root, Tag::Server)
                .first()
                .copied()
                .ok_or_else(|| {
                    UpgradeError::transform(TARGET, "no Server element to hold platform services")
                })?
        }
    };

    for service in &NEW_SERVICES {
        add_service(tree, server, service);
    }
    Ok(())
}

// =============================================================================
// PROTOCOLS
// =============================================================================

/// Insert a `cs-content-type` extraction rule immediately before the
/// `content-type` rule of every HTTP protocol.
pub fn update_protocols(tree: &mut Tree, options: &RunOptions) -> Result<(), UpgradeError> {
    let root = tree.root();
    for protocol in tree.descendants(root, Tag::Protocol) {
        if tree.find_text(protocol, Tag::Plugin).as_deref() != Some(HTTP_PROTOCOL) {
            continue;
        }
        let anchor = tree.child_elements(protocol).into_iter().find(|&child| {
            tree.is(child, Tag::Extract) && tree.attribute(child, "term") == Some(CONTENT_TYPE)
        });
        let Some(anchor) = anchor else {
            let id = tree.attribute(protocol, "id").unwrap_or_default().to_string();
            anchor_missing(
                options,
                TARGET,
                &format!("protocol {id}: Extract {CONTENT_TYPE}"),
            )?;
            continue;
        };

        let extract = tree.create_element(Tag::Extract);
        tree.set_attribute(extract, "term", CS_CONTENT_TYPE);
        tree.sub_element_with_text(extract, Tag::Source, "cs-header");
        tree.sub_element_with_text(extract, Tag::Name, "Content-Type");
        tree.insert_before(anchor, extract)?;
    }
    Ok(())
}

// =============================================================================
// VOCABULARIES
// =============================================================================

/// Register the omniture vocabulary in the vocabulary index.
pub fn update_vocabulary_index(tree: &mut Tree) {
    let root = tree.root();
    let registered = tree
        .descendants(root, Tag::VocabularyConfig)
        .into_iter()
        .any(|entry| tree.attribute(entry, "id") == Some(OMNITURE_VOCAB));
    if registered {
        return;
    }
    let entry = tree.sub_element_with_text(root, Tag::VocabularyConfig, OMNITURE_PATH);
    tree.set_attribute(entry, "id", OMNITURE_VOCAB);
}

fn insert_term(
    tree: &mut Tree,
    before: NodeId,
    id: &str,
    kind: &str,
    comment: &str,
) -> Result<(), UpgradeError> {
    let term = tree.create_element(Tag::Term);
    tree.set_attribute(term, "id", id);
    tree.sub_element_with_text(term, Tag::Type, kind);
    tree.sub_element_with_text(term, Tag::Comment, comment);
    tree.insert_before(before, term)
}

fn replace_comment(tree: &mut Tree, term: NodeId, comment: &str) {
    match tree.find_child(term, Tag::Comment) {
        Some(node) => tree.set_text(node, comment),
        None => {
            tree.sub_element_with_text(term, Tag::Comment, comment);
        }
    }
}

/// Add the new clickstream terms and correct the status term comments.
pub fn update_clickstream(tree: &mut Tree) -> Result<(), UpgradeError> {
    let root = tree.root();
    for vocabulary in tree.descendants(root, Tag::Vocabulary) {
        for term in tree.descendants(vocabulary, Tag::Term) {
            let id = tree.attribute(term, "id").map(str::to_string);
            match id.as_deref() {
                Some(CONTENT_TYPE) => insert_term(
                    tree,
                    term,
                    CS_CONTENT_TYPE,
                    "string",
                    "The Content-Type HTTP request header",
                )?,
                Some(NEW_PAGE) => {
                    insert_term(
                        tree,
                        term,
                        REFUSED,
                        "uint32",
                        "Number of HTTP requests that were refused by the server",
                    )?;
                    insert_term(
                        tree,
                        term,
                        CANCELED,
                        "uint32",
                        "Number of HTTP responses that were canceled early by the client",
                    )?;
                }
                Some(REQUEST_STATUS) => replace_comment(
                    tree,
                    term,
                    "HTTP request status (0=NONE, 1=TRUNCATED, 2=PARTIAL, 3=OK)",
                ),
                Some(RESPONSE_STATUS) => replace_comment(
                    tree,
                    term,
                    "HTTP response status (0=NONE, 1=TRUNCATED, 2=PARTIAL, 3=OK)",
                ),
                Some(TCP_STATUS) => {
                    replace_comment(tree, term, "TCP handshake status (0=OK, 1=RESET, 2=IGNORED)");
                }
                _ => {}
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
