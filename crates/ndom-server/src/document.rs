//! The hub's copy of the replicated tree.
//!
//! Mutations are applied here before they are broadcast, so a client
//! joining late receives a snapshot that already includes them. The
//! tree never grows deeper than [`MAX_NODE_DEPTH`] levels, so every
//! snapshot of it can be encoded.

use ndom_core::{
    AttributeChanged, ChildrenAdded, ChildrenRemoved, ElementNode, NodeDescription, NodeId,
    ServerMessage, TextChanged,
};
use ndom_protocol::MAX_NODE_DEPTH;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("node {0} not found")]
    UnknownNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} is not a text node")]
    NotText(NodeId),

    #[error("node {previous} is not a child of {parent}")]
    UnknownSibling { parent: NodeId, previous: NodeId },

    #[error("document would be {depth} levels deep, at most {max} are allowed")]
    TooDeep { depth: usize, max: usize },
}

fn check_depth(depth: usize) -> Result<(), DocumentError> {
    if depth > MAX_NODE_DEPTH {
        return Err(DocumentError::TooDeep {
            depth,
            max: MAX_NODE_DEPTH,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Document {
    root: NodeDescription,
}

impl Document {
    pub fn new(root: NodeDescription) -> Result<Self, DocumentError> {
        check_depth(root.depth())?;
        Ok(Document { root })
    }

    pub fn root(&self) -> &NodeDescription {
        &self.root
    }

    /// Swap in a new tree; on error the current one is kept.
    pub fn replace(&mut self, root: NodeDescription) -> Result<(), DocumentError> {
        check_depth(root.depth())?;
        self.root = root;
        Ok(())
    }

    /// Apply a tree mutation. Messages that do not mutate the tree are
    /// accepted and ignored; a `Snapshot` replaces the root.
    pub fn apply(&mut self, msg: &ServerMessage) -> Result<(), DocumentError> {
        match msg {
            ServerMessage::Snapshot(s) => self.replace(s.root.clone()),
            ServerMessage::ChildrenAdded(m) => self.add_children(m),
            ServerMessage::ChildrenRemoved(m) => self.remove_children(m),
            ServerMessage::AttributeChanged(m) => self.change_attribute(m),
            ServerMessage::TextChanged(m) => self.change_text(m),
            _ => Ok(()),
        }
    }

    fn add_children(&mut self, m: &ChildrenAdded) -> Result<(), DocumentError> {
        if let Some(level) = level_of(&self.root, m.node_id, 1) {
            let added = m.added.iter().map(NodeDescription::depth).max().unwrap_or(0);
            check_depth(level + added)?;
        }

        let parent = self.element_mut(m.node_id)?;
        let at = match m.previous_node_id {
            None => 0,
            Some(previous) => {
                let idx = parent
                    .children
                    .iter()
                    .position(|c| c.node_id() == previous)
                    .ok_or(DocumentError::UnknownSibling {
                        parent: m.node_id,
                        previous,
                    })?;
                idx + 1
            }
        };
        parent.children.splice(at..at, m.added.iter().cloned());
        Ok(())
    }

    fn remove_children(&mut self, m: &ChildrenRemoved) -> Result<(), DocumentError> {
        let parent = self.element_mut(m.node_id)?;
        parent.children.retain(|c| !m.removed.contains(&c.node_id()));
        Ok(())
    }

    fn change_attribute(&mut self, m: &AttributeChanged) -> Result<(), DocumentError> {
        let element = self.element_mut(m.node_id)?;
        let existing = element.attributes.iter().position(|(k, _)| *k == m.key);
        match (&m.value, existing) {
            (Some(value), Some(idx)) => element.attributes[idx].1 = value.clone(),
            (Some(value), None) => element.attributes.push((m.key.clone(), value.clone())),
            (None, Some(idx)) => {
                element.attributes.remove(idx);
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn change_text(&mut self, m: &TextChanged) -> Result<(), DocumentError> {
        match find_mut(&mut self.root, m.node_id) {
            Some(NodeDescription::Text(t)) => {
                t.text = m.text.clone();
                Ok(())
            }
            Some(_) => Err(DocumentError::NotText(m.node_id)),
            None => Err(DocumentError::UnknownNode(m.node_id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementNode, DocumentError> {
        match find_mut(&mut self.root, id) {
            Some(NodeDescription::Element(e)) => Ok(e),
            Some(_) => Err(DocumentError::NotAnElement(id)),
            None => Err(DocumentError::UnknownNode(id)),
        }
    }
}

/// Level of node `id`, counting `node` as `level`.
fn level_of(node: &NodeDescription, id: NodeId, level: usize) -> Option<usize> {
    if node.node_id() == id {
        return Some(level);
    }
    match node {
        NodeDescription::Element(e) => e.children.iter().find_map(|c| level_of(c, id, level + 1)),
        NodeDescription::Text(_) => None,
    }
}

fn find_mut(node: &mut NodeDescription, id: NodeId) -> Option<&mut NodeDescription> {
    if node.node_id() == id {
        return Some(node);
    }
    match node {
        NodeDescription::Element(e) => e.children.iter_mut().find_map(|c| find_mut(c, id)),
        NodeDescription::Text(_) => None,
    }
}
