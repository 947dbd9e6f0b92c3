//! # Element Tree
//!
//! An arena-backed XML tree for in-memory rewriting.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Each node
//! records its parent and an ordered list of children, so rules can walk up
//! and down without shared mutable references. Removing a node only unlinks
//! it; its slot stays in the arena and ids held by callers remain valid.
//!
//! Parsing drops ignorable whitespace (blank text next to element siblings)
//! so that serialization can re-indent the whole document deterministically.
//! Blank text that is the only content of a leaf element is a value and is
//! kept. DOCTYPE declarations and processing instructions are rejected.

use crate::primitives::INDENT_WIDTH;
use crate::tag::{QualName, Tag};
use crate::types::UpgradeError;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

// =============================================================================
// NODES
// =============================================================================

/// Index of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// The implicit document node that owns the root element and any
/// top-level comments.
pub const DOCUMENT: NodeId = NodeId(0);

/// Content of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: QualName,
        /// Attributes in source order, keyed by their markup name
        /// (namespace declarations included).
        attributes: Vec<(String, String)>,
    },
    Text(String),
    /// Raw (still escaped) comment body.
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// =============================================================================
// TREE
// =============================================================================

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

fn utf8(bytes: &[u8]) -> Result<&str, UpgradeError> {
    std::str::from_utf8(bytes).map_err(|e| UpgradeError::Xml(e.to_string()))
}

fn xml_error(e: impl std::fmt::Display) -> UpgradeError {
    UpgradeError::Xml(e.to_string())
}

impl Tree {
    /// Parse a complete XML document.
    pub fn parse(xml: &str) -> Result<Self, UpgradeError> {
        let mut tree = Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: DOCUMENT,
        };

        let mut reader = NsReader::from_str(xml);
        let mut open: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;
        // Blank text is kept only as the sole content of a leaf element;
        // the next event decides.
        let mut blank: Option<String> = None;

        loop {
            let (resolved, event) = match reader.read_resolved_event() {
                Ok(pair) => pair,
                Err(e) => return Err(xml_error(e)),
            };
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())?.to_string()),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(UpgradeError::Xml(format!(
                        "unknown namespace prefix '{}'",
                        String::from_utf8_lossy(&prefix)
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    blank = None;
                    let id = tree.open_element(namespace, &start, open.last().copied(), &mut root)?;
                    open.push(id);
                }
                Event::Empty(start) => {
                    blank = None;
                    tree.open_element(namespace, &start, open.last().copied(), &mut root)?;
                }
                Event::End(_) => {
                    if let (Some(text), Some(&leaf)) = (blank.take(), open.last()) {
                        if tree.children(leaf).is_empty() {
                            tree.push_child(leaf, NodeKind::Text(text));
                        }
                    }
                    open.pop();
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    if text.trim().is_empty() {
                        if !open.is_empty() {
                            blank.get_or_insert_with(String::new).push_str(&text);
                        }
                        continue;
                    }
                    let parent = open.last().copied().ok_or_else(|| {
                        UpgradeError::Xml("text outside the root element".to_string())
                    })?;
                    let mut content = blank.take().unwrap_or_default();
                    content.push_str(&text);
                    tree.push_child(parent, NodeKind::Text(content));
                }
                Event::CData(data) => {
                    let parent = open.last().copied().ok_or_else(|| {
                        UpgradeError::Xml("CDATA outside the root element".to_string())
                    })?;
                    let mut content = blank.take().unwrap_or_default();
                    content.push_str(utf8(&data)?);
                    tree.push_child(parent, NodeKind::Text(content));
                }
                Event::Comment(comment) => {
                    blank = None;
                    let body = utf8(&comment)?.to_string();
                    let parent = open.last().copied().unwrap_or(DOCUMENT);
                    tree.push_child(parent, NodeKind::Comment(body));
                }
                Event::DocType(_) => {
                    return Err(UpgradeError::Xml(
                        "DOCTYPE declarations are not supported".to_string(),
                    ));
                }
                Event::PI(_) => {
                    return Err(UpgradeError::Xml(
                        "processing instructions are not supported".to_string(),
                    ));
                }
                Event::Decl(_) => {}
                Event::Eof => break,
            }
        }

        if !open.is_empty() {
            return Err(UpgradeError::Xml(
                "unexpected end of document inside an open element".to_string(),
            ));
        }
        tree.root =
            root.ok_or_else(|| UpgradeError::Xml("document has no root element".to_string()))?;
        Ok(tree)
    }

    fn open_element(
        &mut self,
        namespace: Option<String>,
        start: &BytesStart<'_>,
        parent: Option<NodeId>,
        root: &mut Option<NodeId>,
    ) -> Result<NodeId, UpgradeError> {
        let qname = start.name();
        let prefix = match qname.prefix() {
            Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
            None => None,
        };
        let local = utf8(start.local_name().as_ref())?.to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }

        let kind = NodeKind::Element {
            name: QualName {
                namespace,
                prefix,
                local,
            },
            attributes,
        };

        match parent {
            Some(parent) => Ok(self.push_child(parent, kind)),
            None if root.is_some() => Err(UpgradeError::Xml(
                "document has more than one root element".to_string(),
            )),
            None => {
                let id = self.push_child(DOCUMENT, kind);
                *root = Some(id);
                Ok(id)
            }
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind);
        self.append_child(parent, id);
        id
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// The document's root element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Content of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Element name, or `None` for non-element nodes.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&QualName> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True if `id` is an element of kind `tag`.
    #[must_use]
    pub fn is(&self, id: NodeId, tag: Tag) -> bool {
        self.name(id).is_some_and(|name| tag.matches(name))
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// All children (elements, text and comments) in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element children only, in order.
    #[must_use]
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.name(child).is_some())
            .collect()
    }

    /// First direct child of kind `tag`.
    #[must_use]
    pub fn find_child(&self, id: NodeId, tag: Tag) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.is(child, tag))
    }

    /// Text of the first direct child of kind `tag`.
    ///
    /// Returns an empty string when the child exists but has no text.
    #[must_use]
    pub fn find_text(&self, id: NodeId, tag: Tag) -> Option<String> {
        self.find_child(id, tag)
            .map(|child| self.text(child).unwrap_or_default())
    }

    /// Every element of kind `tag` in the subtree rooted at `id`
    /// (including `id` itself), in document order.
    #[must_use]
    pub fn descendants(&self, id: NodeId, tag: Tag) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.is(current, tag) {
                found.push(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        found
    }

    /// Attribute value by markup name.
    #[must_use]
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Concatenated text content directly inside `id`, or `None` if the
    /// element has no text children.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<String> {
        let mut text: Option<String> = None;
        for &child in self.children(id) {
            if let NodeKind::Text(t) = &self.nodes[child.0].kind {
                text.get_or_insert_with(String::new).push_str(t);
            }
        }
        text
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Set (or add) an attribute, keeping the position of an existing one.
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((key.to_string(), value.to_string())),
            }
        }
    }

    /// Replace all direct text of `id` with `text`.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let stale: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&child| matches!(self.nodes[child.0].kind, NodeKind::Text(_)))
            .collect();
        for child in stale {
            self.detach(child);
        }
        let node = self.alloc(NodeKind::Text(text.to_string()));
        self.insert_child(id, 0, node);
    }

    /// Create a detached element of kind `tag`.
    ///
    /// The element borrows the root's prefix when the root lives in the
    /// same namespace, so it serializes in the document's own style.
    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        let prefix = self
            .name(self.root)
            .filter(|root| root.namespace.as_deref() == Some(tag.namespace()))
            .and_then(|root| root.prefix.clone());
        self.alloc(NodeKind::Element {
            name: QualName {
                namespace: Some(tag.namespace().to_string()),
                prefix,
                local: tag.local_name().to_string(),
            },
            attributes: Vec::new(),
        })
    }

    /// Create an element of kind `tag` as the last child of `parent`.
    pub fn sub_element(&mut self, parent: NodeId, tag: Tag) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    /// Create `<tag>text</tag>` as the last child of `parent`.
    pub fn sub_element_with_text(&mut self, parent: NodeId, tag: Tag, text: &str) -> NodeId {
        let id = self.sub_element(parent, tag);
        self.set_text(id, text);
        id
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Move `child` to position `index` among `parent`'s children.
    /// Indexes past the end append.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Move `child` immediately before `anchor` under `anchor`'s parent.
    pub fn insert_before(&mut self, anchor: NodeId, child: NodeId) -> Result<(), UpgradeError> {
        let parent = self.parent(anchor).ok_or_else(|| {
            UpgradeError::Xml("cannot insert a sibling before a detached node".to_string())
        })?;
        self.detach(child);
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == anchor)
            .unwrap_or(0);
        self.insert_child(parent, index, child);
        Ok(())
    }

    /// Unlink `id` from its parent. The node and its subtree stay in the
    /// arena and can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Serialize to indented UTF-8 XML with a declaration.
    pub fn to_xml(&self) -> Result<Vec<u8>, UpgradeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        for &child in self.children(DOCUMENT) {
            self.write_node(&mut writer, child)?;
        }
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), UpgradeError> {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Element { name, attributes } => {
                let markup = name.markup();
                let mut start = BytesStart::new(markup.as_str());
                for (key, value) in attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if node.children.is_empty() {
                    return emit(writer, Event::Empty(start));
                }
                emit(writer, Event::Start(start))?;
                for &child in &node.children {
                    self.write_node(writer, child)?;
                }
                emit(writer, Event::End(BytesEnd::new(markup.as_str())))
            }
            NodeKind::Text(text) => emit(writer, Event::Text(BytesText::new(text))),
            NodeKind::Comment(body) => emit(
                writer,
                Event::Comment(BytesText::from_escaped(body.as_str())),
            ),
            NodeKind::Document => Ok(()),
        }
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), UpgradeError> {
    writer.write_event(event).map_err(xml_error)
}

// =============================================================================
// TESTS
// =============================================================================
