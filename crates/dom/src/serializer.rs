//! DOM Serializer - readable dumps for logs and test failures
//!
//! - indented markup of a subtree, attributes sorted so dumps diff cleanly
//! - XPath for naming a single node in a log line

use std::fmt::Write;

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;

#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Attributes to print; `None` prints all of them
    pub include_attributes: Option<Vec<String>>,
    /// Longer text nodes are cut and end in `...`
    pub max_text_length: usize,
    /// Print a form control's live value as a `:value` pseudo-attribute
    pub include_values: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            include_attributes: None,
            max_text_length: 200,
            include_values: true,
        }
    }
}

pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Whole tree from the arena root; empty for an empty arena
    pub fn serialize(&self, arena: &DomArena) -> Result<String> {
        arena
            .root_id()
            .map_or(Ok(String::new()), |root| self.serialize_subtree(arena, root))
    }

    pub fn serialize_subtree(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut out = String::new();
        self.write_node(arena, node_id, 0, &mut out)?;
        Ok(out)
    }

    fn write_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;
        let pad = depth * 2;

        match node.node_type {
            NodeType::Element => {
                let _ = write!(out, "{:pad$}<{}", "", node.node_name, pad = pad);
                self.write_attributes(node, out);
                if node.children_ids.is_empty() {
                    out.push_str(" />\n");
                    return Ok(());
                }
                out.push_str(">\n");
                for &child in &node.children_ids {
                    self.write_node(arena, child, depth + 1, out)?;
                }
                let _ = writeln!(out, "{:pad$}</{}>", "", node.node_name, pad = pad);
            }
            NodeType::Text => {
                let text = node.node_value.trim();
                if !text.is_empty() {
                    let text = cap_text_length(text, self.config.max_text_length);
                    let _ = writeln!(out, "{:pad$}{}", "", text, pad = pad);
                }
            }
            NodeType::Comment => {
                let _ = writeln!(out, "{:pad$}<!--{}-->", "", node.node_value.trim(), pad = pad);
            }
            // Containers without markup of their own
            NodeType::Document | NodeType::DocumentFragment => {
                for &child in &node.children_ids {
                    self.write_node(arena, child, depth, out)?;
                }
            }
            NodeType::DocumentType => {}
        }
        Ok(())
    }

    fn write_attributes(&self, node: &DomNode, out: &mut String) {
        let mut pairs: Vec<(&str, &str)> = node
            .attributes
            .iter()
            .filter(|(name, _)| match &self.config.include_attributes {
                Some(include) => include.iter().any(|i| i == *name),
                None => true,
            })
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        pairs.sort_unstable();
        for (name, value) in pairs {
            let _ = write!(out, " {}=\"{}\"", name, value.replace('"', "&quot;"));
        }
        if self.config.include_values {
            if let Some(value) = &node.value {
                let _ = write!(out, " :value=\"{}\"", value.replace('"', "&quot;"));
            }
        }
    }

    /// Absolute XPath of an element (`/html[1]/body[1]/p[2]`)
    ///
    /// Non-element nodes are named by their closest element ancestor. A
    /// detached subtree yields a path relative to its topmost element.
    pub fn generate_xpath(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        arena.get(node_id)?;
        let mut steps: Vec<String> = arena
            .inclusive_ancestors(node_id)
            .filter(|&id| arena.is_element(id))
            .map(|id| {
                let name = arena.get(id).map(|n| n.node_name.as_str()).unwrap_or("*");
                format!("{}[{}]", name, same_name_position(arena, id))
            })
            .collect();
        steps.reverse();
        Ok(format!("/{}", steps.join("/")))
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-based index among element siblings with the same tag
fn same_name_position(arena: &DomArena, node_id: NodeId) -> usize {
    let Ok(node) = arena.get(node_id) else {
        return 1;
    };
    let Some(parent) = node.parent_id else {
        return 1;
    };
    arena
        .element_children(parent)
        .into_iter()
        .filter(|&sibling| {
            arena
                .get(sibling)
                .is_ok_and(|s| s.node_name == node.node_name)
        })
        .position(|sibling| sibling == node_id)
        .map_or(1, |index| index + 1)
}

/// XPath for logging; never fails
pub fn describe_node(arena: &DomArena, node_id: NodeId) -> String {
    DomSerializer::new()
        .generate_xpath(arena, node_id)
        .unwrap_or_else(|_| format!("<node {}>", node_id))
}

/// Cut `text` after `max_len` characters
pub fn cap_text_length(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
