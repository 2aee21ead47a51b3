//! Node record codec, shared by `Snapshot` and `ChildrenAdded`.
//!
//! ```text
//! [0]   kind: 0 = element, 1 = text
//! element:
//!   varint node_id
//!   string tag
//!   varint attr_count, attr_count × (string key, string value)
//!   varint child_count, child_count × node record
//! text:
//!   varint node_id
//!   string text
//! ```

use ndom_core::{ElementNode, NodeDescription, TextNode};

use crate::buffer::{BufferReader, BufferWriter};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult, FieldContext};

/// Most levels a node record may have, the record itself included.
/// Both directions enforce it.
pub const MAX_NODE_DEPTH: usize = 256;

const NODE_KIND_ELEMENT: u8 = 0;
const NODE_KIND_TEXT: u8 = 1;

/// Fail unless `node` fits in [`MAX_NODE_DEPTH`] levels.
pub fn check_node_depth(node: &NodeDescription) -> EncodeResult<()> {
    let depth = node.depth();
    if depth > MAX_NODE_DEPTH {
        return Err(EncodeError::NestingTooDeep {
            depth,
            max: MAX_NODE_DEPTH,
        });
    }
    Ok(())
}

/// Write one node record. Nothing is written when the tree is too deep.
pub fn encode_node(node: &NodeDescription, writer: &mut BufferWriter) -> EncodeResult<()> {
    check_node_depth(node)?;
    write_node(node, writer);
    Ok(())
}

/// Write a record whose depth has already been checked.
pub(crate) fn write_node(node: &NodeDescription, writer: &mut BufferWriter) {
    match node {
        NodeDescription::Element(e) => {
            writer.write_uint8(NODE_KIND_ELEMENT);
            writer.write_varint(u64::from(e.node_id));
            writer.write_string(&e.tag);

            writer.write_varint(e.attributes.len() as u64);
            for (key, value) in &e.attributes {
                writer.write_string(key);
                writer.write_string(value);
            }

            writer.write_varint(e.children.len() as u64);
            for child in &e.children {
                write_node(child, writer);
            }
        }
        NodeDescription::Text(t) => {
            writer.write_uint8(NODE_KIND_TEXT);
            writer.write_varint(u64::from(t.node_id));
            writer.write_string(&t.text);
        }
    }
}

pub fn decode_node(reader: &mut BufferReader<'_>) -> DecodeResult<NodeDescription> {
    decode_node_at(reader, 0)
}

fn decode_node_at(reader: &mut BufferReader<'_>, depth: usize) -> DecodeResult<NodeDescription> {
    if depth >= MAX_NODE_DEPTH {
        return Err(DecodeError::NestingTooDeep {
            max: MAX_NODE_DEPTH,
        });
    }

    let kind = reader.read_uint8().field("node_kind")?;
    match kind {
        NODE_KIND_ELEMENT => {
            let node_id = reader.read_varint_u32().field("node_id")?;
            let tag = reader.read_string().field("tag")?;

            let attr_count = reader.read_varint_u32().field("attribute_count")?;
            let mut attributes = Vec::with_capacity(capped(attr_count, reader));
            for _ in 0..attr_count {
                let key = reader.read_string().field("attribute_key")?;
                let value = reader.read_string().field("attribute_value")?;
                attributes.push((key, value));
            }

            let child_count = reader.read_varint_u32().field("child_count")?;
            let mut children = Vec::with_capacity(capped(child_count, reader));
            for _ in 0..child_count {
                children.push(decode_node_at(reader, depth + 1)?);
            }

            Ok(NodeDescription::Element(ElementNode {
                node_id,
                tag,
                attributes,
                children,
            }))
        }
        NODE_KIND_TEXT => {
            let node_id = reader.read_varint_u32().field("node_id")?;
            let text = reader.read_string().field("text")?;
            Ok(NodeDescription::Text(TextNode { node_id, text }))
        }
        value => Err(DecodeError::UnknownDiscriminant {
            field: "node_kind",
            value,
        }),
    }
}

/// Counts come off the wire; every entry takes at least one byte, so
/// never reserve more than what is left.
pub(crate) fn capped(count: u32, reader: &BufferReader<'_>) -> usize {
    (count as usize).min(reader.remaining())
}
