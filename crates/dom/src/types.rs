//! Node types for the live document tree
//!
//! Nodes are plain data addressed by a `u32` index; child lists are inline
//! for the common case of a handful of children.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Index of a node in its [`crate::arena::DomArena`]
pub type NodeId = u32;

/// DOM `nodeType` values the tree can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            3 => Some(NodeType::Text),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            _ => None,
        }
    }

    /// Whether nodes of this type may have children
    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeType::Element | NodeType::Document | NodeType::DocumentFragment
        )
    }
}

/// One node of the tree; links are indices into the owning arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>,

    /// Lowercase tag name for elements, `#text` / `#document` otherwise
    pub node_name: String,
    /// Character data for text and comment nodes
    pub node_value: String,
    pub attributes: HashMap<String, String>,

    /// Form control value (the `value` IDL property, not the attribute)
    pub value: Option<String>,
}

impl DomNode {
    /// Detached node without attributes or data
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: String) -> Self {
        Self {
            node_id,
            node_type,
            parent_id: None,
            children_ids: SmallVec::new(),
            node_name,
            node_value: String::new(),
            attributes: HashMap::new(),
            value: None,
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Attribute by lowercase name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whitespace-separated class list
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    /// Current form value; falls back to the `value` attribute until set
    pub fn current_value(&self) -> Option<&str> {
        self.value.as_deref().or_else(|| self.attr("value"))
    }
}

/// Tags whose `value` property tracks user input
pub const FORM_CONTROL_TAGS: &[&str] = &["input", "textarea", "select", "option", "button"];
