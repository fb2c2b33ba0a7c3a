//! Live document: arena + mutation records
//!
//! Every structural or attribute change goes through here so observers
//! see it. Setting a form value does not produce a record, same as the
//! `value` property in a browser.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::mutation::{MutationQueue, MutationRecord, ObserveOptions, ObserverId};
use crate::selector::ElementMatcher;
use crate::types::{DomNode, NodeId, NodeType, FORM_CONTROL_TAGS};
use smallvec::{smallvec, SmallVec};

#[derive(Debug)]
pub struct Document {
    arena: DomArena,
    mutations: MutationQueue,
}

impl Document {
    /// `#document > html > (head, body)`
    pub fn new() -> Self {
        let mut doc = Self::empty();
        let root = doc.root();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        // Fresh nodes, nobody observes yet: these cannot fail
        let _ = doc.arena.attach(root, html, None);
        let _ = doc.arena.attach(html, head, None);
        let _ = doc.arena.attach(html, body, None);
        doc
    }

    /// Just the document node
    pub fn empty() -> Self {
        let mut arena = DomArena::new();
        let root = arena.add_node(DomNode::new(0, NodeType::Document, "#document".into()));
        let _ = arena.set_root(root);
        Self::from_arena(arena)
    }

    /// Wrap an already built arena (must have a root)
    pub fn from_arena(arena: DomArena) -> Self {
        Self {
            arena,
            mutations: MutationQueue::new(),
        }
    }

    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    pub fn node(&self, node_id: NodeId) -> Result<&DomNode> {
        self.arena.get(node_id)
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.arena.root_id().unwrap_or(0)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.arena
            .descendant_elements(self.root())
            .into_iter()
            .find(|&id| {
                self.arena
                    .get(id)
                    .map(|n| n.node_name == "body")
                    .unwrap_or(false)
            })
    }

    // -----------------------------------------------------------------------
    // Node creation (detached, no records)
    // -----------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.add_node(DomNode::new(
            0,
            NodeType::Element,
            tag.to_ascii_lowercase(),
        ))
    }

    pub fn create_element_with(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        if let Ok(node) = self.arena.get_mut(id) {
            for (name, value) in attributes {
                node.attributes
                    .insert(name.to_ascii_lowercase(), value.to_string());
            }
        }
        id
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut node = DomNode::new(0, NodeType::Text, "#text".into());
        node.node_value = text.to_string();
        self.arena.add_node(node)
    }

    /// Insert a whole detached subtree at once; builders use this to stage
    /// content before a single append
    pub fn append_detached(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.arena.is_connected(parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is connected; use append_child",
                parent
            )));
        }
        self.arena.attach(parent, child, None)
    }

    // -----------------------------------------------------------------------
    // Tree mutation (records queued)
    // -----------------------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or last). An attached child is
    /// moved, which queues a removal record for its old parent first.
    ///
    /// Nothing is detached or recorded unless the whole insertion is valid.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(reference) = reference {
            if self.arena.parent_id(reference) != Some(parent) {
                return Err(DomError::HierarchyRequest(format!(
                    "node {} is not a child of {}",
                    reference, parent
                )));
            }
        }
        self.detach_with_record(child)?;
        self.arena.attach(parent, child, reference)?;
        let record = MutationRecord::child_list(parent, smallvec![child], SmallVec::new());
        self.mutations.queue(&self.arena, record);
        Ok(())
    }

    /// Append several nodes with one record (a fragment insertion)
    ///
    /// Every child is checked before any of them moves. Listing the same
    /// node twice is a hierarchy error.
    pub fn append_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<()> {
        if children.is_empty() {
            return Ok(());
        }
        for (index, &child) in children.iter().enumerate() {
            if children[..index].contains(&child) {
                return Err(DomError::HierarchyRequest(format!(
                    "node {} is listed twice",
                    child
                )));
            }
            self.check_insertable(parent, child)?;
        }
        for &child in children {
            self.detach_with_record(child)?;
            self.arena.attach(parent, child, None)?;
        }
        let record =
            MutationRecord::child_list(parent, children.iter().copied().collect(), SmallVec::new());
        self.mutations.queue(&self.arena, record);
        Ok(())
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.arena.get(parent)?.node_type.is_container() {
            return Err(DomError::HierarchyRequest(format!(
                "node {} cannot have children",
                parent
            )));
        }
        if self.arena.get(child)?.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest(
                "a document cannot be inserted".to_string(),
            ));
        }
        if self.arena.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is an ancestor of {}",
                child, parent
            )));
        }
        Ok(())
    }

    /// Detach `node` from wherever it is. Detached nodes are a no-op.
    pub fn remove(&mut self, node_id: NodeId) -> Result<()> {
        self.detach_with_record(node_id)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.arena.parent_id(child) != Some(parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is not a child of {}",
                child, parent
            )));
        }
        self.detach_with_record(child)
    }

    fn detach_with_record(&mut self, child: NodeId) -> Result<()> {
        // Record is queued while the child is still in place
        let Some(parent) = self.arena.parent_id(child) else {
            self.arena.get(child)?;
            return Ok(());
        };
        let record = MutationRecord::child_list(parent, SmallVec::new(), smallvec![child]);
        self.mutations.queue(&self.arena, record);
        self.arena.detach(child)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Attributes and values
    // -----------------------------------------------------------------------

    pub fn attribute(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.arena.get(node_id).ok()?.attr(name)
    }

    pub fn set_attribute(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let node = self.element_mut(node_id)?;
        let old_value = node.attributes.insert(name.clone(), value.to_string());
        let record = MutationRecord::attributes(node_id, &name, old_value);
        self.mutations.queue(&self.arena, record);
        Ok(())
    }

    /// Removing a missing attribute changes nothing and queues nothing
    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let node = self.element_mut(node_id)?;
        if let Some(old_value) = node.attributes.remove(&name) {
            let record = MutationRecord::attributes(node_id, &name, Some(old_value));
            self.mutations.queue(&self.arena, record);
        }
        Ok(())
    }

    /// Current form value (property first, attribute second)
    pub fn value(&self, node_id: NodeId) -> Option<&str> {
        self.arena.get(node_id).ok()?.current_value()
    }

    /// Set the `value` property of a form control
    pub fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        let node = self.element_mut(node_id)?;
        if !FORM_CONTROL_TAGS.contains(&node.node_name.as_str()) {
            return Err(DomError::InvalidNodeType {
                expected: "form control".to_string(),
                actual: node.node_name.clone(),
            });
        }
        node.value = Some(value.to_string());
        Ok(())
    }

    fn element_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        let node = self.arena.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "element".to_string(),
                actual: format!("{:?}", node.node_type),
            });
        }
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Connected elements matching, in tree order
    pub fn query_selector_all<M>(&self, matcher: &M) -> Vec<NodeId>
    where
        M: ElementMatcher + ?Sized,
    {
        self.arena
            .descendant_elements(self.root())
            .into_iter()
            .filter(|&id| matcher.matches(&self.arena, id))
            .collect()
    }

    pub fn query_selector<M>(&self, matcher: &M) -> Option<NodeId>
    where
        M: ElementMatcher + ?Sized,
    {
        self.arena
            .descendant_elements(self.root())
            .into_iter()
            .find(|&id| matcher.matches(&self.arena, id))
    }

    pub fn matches<M>(&self, node_id: NodeId, matcher: &M) -> bool
    where
        M: ElementMatcher + ?Sized,
    {
        matcher.matches(&self.arena, node_id)
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn create_observer(&mut self) -> ObserverId {
        self.mutations.create_observer()
    }

    pub fn observe(
        &mut self,
        observer: ObserverId,
        target: NodeId,
        options: ObserveOptions,
    ) -> Result<()> {
        if !(options.child_list || options.attributes) {
            return Err(DomError::InvalidObserveOptions(
                "one of childList or attributes must be set".to_string(),
            ));
        }
        self.arena.get(target)?;
        self.mutations.observe(observer, target, options);
        Ok(())
    }

    pub fn disconnect(&mut self, observer: ObserverId) {
        self.mutations.disconnect(observer);
    }

    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.mutations.take_records(observer)
    }

    pub fn next_batch(&mut self) -> Option<(ObserverId, Vec<MutationRecord>)> {
        self.mutations.next_batch()
    }

    pub fn has_pending_records(&self) -> bool {
        self.mutations.has_pending()
    }

    pub fn observer_count(&self) -> usize {
        self.mutations.observer_count()
    }

    pub fn observed_targets(&self, observer: ObserverId) -> Vec<NodeId> {
        self.mutations.observed_targets(observer)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
