//! Minimal mutable element tree
//!
//! Stands in for the host page: an arena of elements with tags, class
//! lists and text, plus `tag.class` selector queries. Every mutating
//! operation emits a [`Mutation`] event on an unbounded channel once a
//! watcher is attached, which is what drives rescans.
//!
//! Node identity is a stable [`NodeId`]; removed nodes stay tombstoned in
//! the arena and are never reused, so per-element annotation state can
//! never alias a newly created element.

use tokio::sync::mpsc;

/// Stable identity of an element within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A single change to the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Children were added to or removed from this element
    ChildListChanged(NodeId),
    /// The text of this element changed
    TextChanged(NodeId),
}

#[derive(Debug)]
struct Node {
    tag: String,
    classes: Vec<String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed element tree
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    mutations: Option<mpsc::UnboundedSender<Mutation>>,
}

impl Document {
    /// Creates a document with an empty `body` root
    pub fn new() -> Self {
        let root = Node {
            tag: "body".to_string(),
            classes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            mutations: None,
        }
    }

    /// The root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Attaches a mutation observer, returning the event stream.
    ///
    /// Only one observer is supported; attaching again replaces the
    /// previous stream.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mutations = Some(tx);
        rx
    }

    /// Creates a detached element
    pub fn create_element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Appends `child` as the last child of `parent`, detaching it from
    /// its current parent first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.emit(Mutation::ChildListChanged(parent));
    }

    /// Inserts `new` under `parent`, immediately before `reference`.
    /// Falls back to appending when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, new: NodeId, reference: NodeId) {
        self.detach(new);
        self.nodes[new.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match children.iter().position(|&c| c == reference) {
            Some(index) => children.insert(index, new),
            None => children.push(new),
        }
        self.emit(Mutation::ChildListChanged(parent));
    }

    /// Removes the element (and with it its subtree) from the tree.
    /// The node stays tombstoned in the arena.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.nodes[id.0].parent = None;
            self.emit(Mutation::ChildListChanged(parent));
        }
    }

    /// Replaces the element's own text
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id.0].text = text.to_string();
        self.emit(Mutation::TextChanged(id));
    }

    /// The element's own text
    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    /// The element's tag name
    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    /// Whether the element carries the class
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.nodes[id.0].classes.iter().any(|c| c == class)
    }

    /// The element's parent, if attached to one
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The element's children in order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Whether the element is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Depth-first query for elements under `root` (inclusive) matching
    /// the selector set
    pub fn query(&self, root: NodeId, selectors: &SelectorSet) -> Vec<NodeId> {
        let mut matches = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if selectors.matches(self, id) {
                matches.push(id);
            }
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        matches
    }

    /// First direct child of `parent` carrying the class
    pub fn find_child_by_class(&self, parent: NodeId, class: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.has_class(c, class))
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.nodes[id.0].parent = None;
            self.emit(Mutation::ChildListChanged(parent));
        }
    }

    fn emit(&self, mutation: Mutation) {
        if let Some(tx) = &self.mutations {
            // The receiver being gone just means nothing observes anymore.
            let _ = tx.send(mutation);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A `tag.class` element selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parses selectors of the form `tag`, `.class` or `tag.class.other`
    pub fn parse(selector: &str) -> Option<Self> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut parts = trimmed.split('.');
        let tag = match parts.next() {
            Some("") | None => None,
            Some(tag) => Some(tag.to_string()),
        };
        let classes: Vec<String> = parts
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        if tag.is_none() && classes.is_empty() {
            return None;
        }
        Some(Self { tag, classes })
    }

    /// Whether the element matches this selector
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if doc.tag(id) != tag {
                return false;
            }
        }
        self.classes.iter().all(|class| doc.has_class(id, class))
    }
}

/// The configured set of selectors identifying price-bearing elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSet(Vec<Selector>);

impl SelectorSet {
    /// Builds a set from selector strings, skipping unparseable entries
    pub fn parse(selectors: &[&str]) -> Self {
        Self(selectors.iter().filter_map(|s| Selector::parse(s)).collect())
    }

    /// The default price-bearing selectors
    pub fn default_price_selectors() -> Self {
        Self::parse(crate::constants::DEFAULT_PRICE_SELECTORS)
    }

    /// Whether the element matches any selector in the set
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.0.iter().any(|s| s.matches(doc, id))
    }
}
