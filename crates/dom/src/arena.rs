//! Arena-backed node storage
//!
//! Nodes live in one `Vec` and refer to each other by index. The arena knows
//! tree shape only; [`crate::document::Document`] layers mutation records on
//! top.
//!
//! ```text
//! nodes: [#document][html][head][body][p (detached)]...
//!             0        1     2     3        4
//! ```
//!
//! Nothing is ever freed. Removing a node detaches it, so a `NodeId` held by
//! a waiter stays valid for the life of the arena.

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

#[derive(Debug)]
pub struct DomArena {
    nodes: Vec<DomNode>,
    root_id: Option<NodeId>,
}

impl DomArena {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root_id: None,
        }
    }

    /// Store `node` detached and return its index
    ///
    /// Whatever ids and links `node` carried are reset.
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        node.parent_id = None;
        node.children_ids.clear();
        self.nodes.push(node);
        node_id
    }

    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Nodes ever allocated, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.get(node_id).map(|n| n.is_element()).unwrap_or(false)
    }

    /// Parent of a node, if attached
    pub fn parent_id(&self, node_id: NodeId) -> Option<NodeId> {
        self.get(node_id).ok().and_then(|n| n.parent_id)
    }

    /// Walk from a node up to the top of its tree, node first
    pub fn inclusive_ancestors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node_id), move |&id| self.parent_id(id))
    }

    /// `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        self.inclusive_ancestors(node_id).any(|id| id == ancestor)
    }

    /// Node is reachable from the root
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        match self.root_id {
            Some(root) => self.is_inclusive_ancestor(root, node_id),
            None => false,
        }
    }

    /// Element children in order
    pub fn element_children(&self, node_id: NodeId) -> Vec<NodeId> {
        match self.get(node_id) {
            Ok(node) => node
                .children_ids
                .iter()
                .copied()
                .filter(|&id| self.is_element(id))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Closest preceding sibling that is an element
    pub fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent_id(node_id)?;
        let siblings = &self.get(parent).ok()?.children_ids;
        let index = siblings.iter().position(|&id| id == node_id)?;
        siblings[..index]
            .iter()
            .rev()
            .copied()
            .find(|&id| self.is_element(id))
    }

    /// Closest following sibling that is an element
    pub fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent_id(node_id)?;
        let siblings = &self.get(parent).ok()?.children_ids;
        let index = siblings.iter().position(|&id| id == node_id)?;
        siblings[index + 1..]
            .iter()
            .copied()
            .find(|&id| self.is_element(id))
    }

    /// Insert a detached `child` under `parent`, before `reference` or at the end
    pub fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        let parent_type = self.get(parent)?.node_type;
        if !parent_type.is_container() {
            return Err(DomError::HierarchyRequest(format!(
                "node {} of type {:?} cannot have children",
                parent, parent_type
            )));
        }
        let child_node = self.get(child)?;
        if child_node.parent_id.is_some() {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is still attached",
                child
            )));
        }
        if child_node.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest(
                "a document cannot be inserted".to_string(),
            ));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is an ancestor of {}",
                child, parent
            )));
        }

        let parent_node = self.get_mut(parent)?;
        let index = match reference {
            Some(reference) => parent_node
                .children_ids
                .iter()
                .position(|&id| id == reference)
                .ok_or(DomError::NodeNotFound(reference))?,
            None => parent_node.children_ids.len(),
        };
        parent_node.children_ids.insert(index, child);
        self.get_mut(child)?.parent_id = Some(parent);
        Ok(())
    }

    /// Detach a node from its parent
    ///
    /// Returns the former parent, or None if the node was already detached.
    pub fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>> {
        let parent = match self.get(child)?.parent_id {
            Some(parent) => parent,
            None => return Ok(None),
        };
        let parent_node = self.get_mut(parent)?;
        parent_node.children_ids.retain(|id| *id != child);
        self.get_mut(child)?.parent_id = None;
        Ok(Some(parent))
    }

    /// Pre-order walk of the subtree at `start_id`, stopping at the first error
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Reversed so the first child is popped first
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Descendant elements of `start_id` in tree order (excluding itself)
    pub fn descendant_elements(&self, start_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let _ = self.traverse_df(start_id, |node| {
            if node.node_id != start_id && node.is_element() {
                out.push(node.node_id);
            }
            Ok(())
        });
        out
    }

    /// First node in allocation order satisfying `predicate`
    pub fn find_one<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes.iter().find(|node| predicate(node)).map(|node| node.node_id)
    }

    /// Connected element whose `id` attribute is `id`
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_one(|node| {
            node.is_element() && node.attr("id") == Some(id) && self.is_connected(node.node_id)
        })
    }

    /// Concatenated text of every text node below `node_id`
    pub fn text_content(&self, node_id: NodeId) -> Result<String> {
        let mut text = String::new();
        self.traverse_df(node_id, |node| {
            if node.node_type == NodeType::Text {
                text.push_str(&node.node_value);
            }
            Ok(())
        })?;
        Ok(text)
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(arena: &mut DomArena, tag: &str) -> NodeId {
        arena.add_node(DomNode::new(0, NodeType::Element, tag.to_string()))
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();
        let id = element(&mut arena, "div");
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert_eq!(retrieved.node_id, 0);
        assert!(arena.get(7).is_err());
    }

    #[test]
    fn test_attach_and_traverse_df() {
        let mut arena = DomArena::new();

        // root -> [child1, child2], child1 inserted before child2
        let root = element(&mut arena, "div");
        let child1 = element(&mut arena, "span");
        let child2 = element(&mut arena, "p");
        arena.set_root(root).unwrap();

        arena.attach(root, child2, None).unwrap();
        arena.attach(root, child1, Some(child2)).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["div", "span", "p"]);
        assert_eq!(arena.descendant_elements(root), vec![child1, child2]);
        assert_eq!(arena.previous_element_sibling(child2), Some(child1));
        assert_eq!(arena.next_element_sibling(child1), Some(child2));
        assert!(arena.is_connected(child1));
    }

    #[test]
    fn test_attach_rejects_cycles_and_double_parents() {
        let mut arena = DomArena::new();
        let outer = element(&mut arena, "div");
        let inner = element(&mut arena, "div");
        arena.attach(outer, inner, None).unwrap();

        assert!(matches!(
            arena.attach(inner, outer, None),
            Err(DomError::HierarchyRequest(_))
        ));
        let other = element(&mut arena, "section");
        assert!(matches!(
            arena.attach(other, inner, None),
            Err(DomError::HierarchyRequest(_))
        ));
    }

    #[test]
    fn test_detach() {
        let mut arena = DomArena::new();
        let root = element(&mut arena, "body");
        let child = element(&mut arena, "p");
        arena.set_root(root).unwrap();
        arena.attach(root, child, None).unwrap();

        assert_eq!(arena.detach(child).unwrap(), Some(root));
        assert_eq!(arena.detach(child).unwrap(), None);
        assert!(!arena.is_connected(child));
        assert!(arena.get(root).unwrap().children_ids.is_empty());
    }
}
