//! Node records.
//!
//! A [`NodeDescription`] is the full description of a node and its
//! subtree. Snapshots carry one for the document root; `ChildrenAdded`
//! carries one per inserted child.

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A node in the replicated document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeDescription {
    /// Markup element with attributes and children.
    Element(ElementNode),

    /// Text content of the parent element.
    Text(TextNode),
}

/// Element record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub node_id: NodeId,

    /// Element tag name, e.g. `"m-cube"`.
    pub tag: String,

    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,

    pub children: Vec<NodeDescription>,
}

/// Text record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub node_id: NodeId,
    pub text: String,
}

impl NodeDescription {
    /// Convenience constructor for a text node.
    pub fn text(node_id: NodeId, text: impl Into<String>) -> Self {
        NodeDescription::Text(TextNode {
            node_id,
            text: text.into(),
        })
    }

    /// Id of this node.
    pub fn node_id(&self) -> NodeId {
        match self {
            NodeDescription::Element(e) => e.node_id,
            NodeDescription::Text(t) => t.node_id,
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        match self {
            NodeDescription::Element(e) => {
                1 + e.children.iter().map(NodeDescription::subtree_len).sum::<usize>()
            }
            NodeDescription::Text(_) => 1,
        }
    }

    /// Levels in this subtree; a lone node is 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            if let NodeDescription::Element(e) = node {
                stack.extend(e.children.iter().map(|c| (c, level + 1)));
            }
        }
        deepest
    }
}

impl ElementNode {
    /// New element without attributes or children.
    pub fn new(node_id: NodeId, tag: impl Into<String>) -> Self {
        ElementNode {
            node_id,
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: append an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder: append a child node.
    pub fn with_child(mut self, child: impl Into<NodeDescription>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Looks up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl From<ElementNode> for NodeDescription {
    fn from(e: ElementNode) -> Self {
        NodeDescription::Element(e)
    }
}

impl From<TextNode> for NodeDescription {
    fn from(t: TextNode) -> Self {
        NodeDescription::Text(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_lookup() {
        let cube = ElementNode::new(2, "m-cube")
            .with_attribute("color", "red")
            .with_attribute("ry", "45");
        let root: NodeDescription = ElementNode::new(1, "m-group")
            .with_child(cube.clone())
            .with_child(NodeDescription::text(3, "hello"))
            .into();

        assert_eq!(root.node_id(), 1);
        assert_eq!(root.subtree_len(), 3);
        assert_eq!(cube.attribute("ry"), Some("45"));
        assert_eq!(cube.attribute("rx"), None);
    }

    #[test]
    fn depth_counts_levels() {
        assert_eq!(NodeDescription::text(1, "x").depth(), 1);

        let mut chain = ElementNode::new(0, "m-group");
        for id in 1..10 {
            chain = ElementNode::new(id, "m-group").with_child(chain);
        }
        let root: NodeDescription = ElementNode::new(99, "m-group")
            .with_child(NodeDescription::text(100, "shallow"))
            .with_child(chain)
            .into();
        assert_eq!(root.depth(), 11);
    }

    #[test]
    fn json_shape_is_tagged() {
        let node = NodeDescription::text(7, "hi");
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"type":"text","nodeId":7,"text":"hi"}"#);
    }
}
