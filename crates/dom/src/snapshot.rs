//! Snapshot loading - build a live document from CDP-shaped JSON
//!
//! Input format matches CDP's `DOM.getDocument` response:
//!
//! ```json
//! {
//!   "root": {
//!     "nodeType": 9,
//!     "nodeName": "#document",
//!     "children": [
//!       { "nodeType": 1, "nodeName": "HTML", "attributes": ["lang", "en"], "children": [] }
//!     ]
//!   }
//! }
//! ```
//!
//! Loading queues no mutation records: the snapshot is the initial state.

use crate::arena::DomArena;
use crate::document::Document;
use crate::error::{DomError, Result};
use crate::types::*;
use serde_json::Value;

/// Limits applied while loading
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_depth: 512,
            max_nodes: 1_000_000,
        }
    }
}

/// Build a document with default limits
pub fn load_document(cdp_response: &Value) -> Result<Document> {
    SnapshotLoader::new(SnapshotConfig::default()).load(cdp_response)
}

/// Parse a JSON string and build a document
pub fn load_document_str(json: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(json)?;
    load_document(&value)
}

pub struct SnapshotLoader {
    config: SnapshotConfig,
    arena: DomArena,
}

impl SnapshotLoader {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            arena: DomArena::new(),
        }
    }

    pub fn load(mut self, cdp_response: &Value) -> Result<Document> {
        let root = cdp_response.get("root").ok_or_else(|| {
            DomError::SnapshotError("Missing 'root' in CDP response".to_string())
        })?;

        let root_id = self.parse_node(root, 0)?;
        if self.arena.get(root_id)?.node_type != NodeType::Document {
            return Err(DomError::InvalidNodeType {
                expected: "Document".to_string(),
                actual: format!("{:?}", self.arena.get(root_id)?.node_type),
            });
        }
        self.arena.set_root(root_id)?;

        Ok(Document::from_arena(self.arena))
    }

    /// Recursively parse a CDP node, returns its arena id
    fn parse_node(&mut self, cdp_node: &Value, depth: usize) -> Result<NodeId> {
        if depth > self.config.max_depth {
            return Err(DomError::SnapshotError(format!(
                "Maximum depth exceeded: {} > {}",
                depth, self.config.max_depth
            )));
        }
        if self.arena.len() >= self.config.max_nodes {
            return Err(DomError::SnapshotError(format!(
                "Maximum node count exceeded: {}",
                self.config.max_nodes
            )));
        }

        let node_type_val = cdp_node["nodeType"]
            .as_u64()
            .ok_or_else(|| DomError::SnapshotError("Missing nodeType".to_string()))?;

        let node_type = u8::try_from(node_type_val)
            .ok()
            .and_then(NodeType::from_u8)
            .ok_or_else(|| DomError::InvalidNodeType {
                expected: "valid NodeType".to_string(),
                actual: format!("{}", node_type_val),
            })?;

        let mut node_name = cdp_node["nodeName"].as_str().unwrap_or("").to_string();
        if node_type == NodeType::Element {
            node_name.make_ascii_lowercase();
        }

        let mut node = DomNode::new(0, node_type, node_name);
        node.node_value = cdp_node["nodeValue"].as_str().unwrap_or("").to_string();

        // Attributes come as a flat [name, value, name, value, ...] list
        if let Some(attrs) = cdp_node["attributes"].as_array() {
            for pair in attrs.chunks_exact(2) {
                if let (Some(key), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
                    node.attributes
                        .insert(key.to_ascii_lowercase(), value.to_string());
                }
            }
        }

        let current_node_id = self.arena.add_node(node);

        if let Some(children) = cdp_node["children"].as_array() {
            for child in children {
                let child_id = self.parse_node(child, depth + 1)?;
                self.arena.attach(current_node_id, child_id, None)?;
            }
        }

        Ok(current_node_id)
    }
}
