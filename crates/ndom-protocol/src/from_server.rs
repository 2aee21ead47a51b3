//! Server → client codecs.
//!
//! Each `encode_*` writes the tag byte followed by the body. Each
//! `decode_*` reads the body only: the reader must already be past the
//! tag (the dispatcher consumes it).
//!
//! ```text
//! Snapshot (1)         : node record, fixed_u64 document_time
//! BatchStart (2)       : -
//! DocumentTime (3)     : fixed_u64 document_time
//! ChildrenAdded (4)    : varint parent, bool has_previous, [varint previous],
//!                        varint count, count × node record
//! ChildrenRemoved (5)  : varint parent, varint count, count × varint node_id
//! AttributeChanged (6) : varint node_id, string key, u8 present, [string value]
//! TextChanged (9)      : varint node_id, string text
//! BatchEnd (10)        : -
//! Ping (11)            : varint ping
//! Warning (12)         : string message
//! Error (13)           : string message
//! ```

use ndom_core::{
    AttributeChanged, ChildrenAdded, ChildrenRemoved, DocumentTime, ErrorMessage, Ping, Snapshot,
    TextChanged, Warning,
};

use crate::buffer::{BufferReader, BufferWriter};
use crate::error::{DecodeError, DecodeResult, EncodeResult, FieldContext};
use crate::message_types::ServerMessageType;
use crate::node_codec::{capped, check_node_depth, decode_node, write_node};

const VALUE_ABSENT: u8 = 0;
const VALUE_PRESENT: u8 = 1;

// -----------------------------------------------------------------------------
// Snapshot
// -----------------------------------------------------------------------------

pub fn encode_snapshot(msg: &Snapshot, writer: &mut BufferWriter) -> EncodeResult<()> {
    check_node_depth(&msg.root)?;
    writer.write_uint8(ServerMessageType::Snapshot.tag());
    write_node(&msg.root, writer);
    writer.write_fixed_u64(msg.document_time);
    Ok(())
}

pub fn decode_snapshot(reader: &mut BufferReader<'_>) -> DecodeResult<Snapshot> {
    let root = decode_node(reader)?;
    let document_time = reader.read_fixed_u64().field("document_time")?;
    Ok(Snapshot {
        root,
        document_time,
    })
}

// -----------------------------------------------------------------------------
// Batch markers and document time
// -----------------------------------------------------------------------------

pub fn encode_batch_start(writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::BatchStart.tag());
}

pub fn encode_batch_end(writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::BatchEnd.tag());
}

pub fn encode_document_time(msg: &DocumentTime, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::DocumentTime.tag());
    writer.write_fixed_u64(msg.document_time);
}

pub fn decode_document_time(reader: &mut BufferReader<'_>) -> DecodeResult<DocumentTime> {
    let document_time = reader.read_fixed_u64().field("document_time")?;
    Ok(DocumentTime { document_time })
}

// -----------------------------------------------------------------------------
// Tree mutations
// -----------------------------------------------------------------------------

pub fn encode_children_added(msg: &ChildrenAdded, writer: &mut BufferWriter) -> EncodeResult<()> {
    for node in &msg.added {
        check_node_depth(node)?;
    }

    writer.write_uint8(ServerMessageType::ChildrenAdded.tag());
    writer.write_varint(u64::from(msg.node_id));
    match msg.previous_node_id {
        Some(previous) => {
            writer.write_bool(true);
            writer.write_varint(u64::from(previous));
        }
        None => writer.write_bool(false),
    }
    writer.write_varint(msg.added.len() as u64);
    for node in &msg.added {
        write_node(node, writer);
    }
    Ok(())
}

pub fn decode_children_added(reader: &mut BufferReader<'_>) -> DecodeResult<ChildrenAdded> {
    let node_id = reader.read_varint_u32().field("node_id")?;
    let previous_node_id = if reader.read_bool().field("has_previous")? {
        Some(reader.read_varint_u32().field("previous_node_id")?)
    } else {
        None
    };

    let count = reader.read_varint_u32().field("added_count")?;
    let mut added = Vec::with_capacity(capped(count, reader));
    for _ in 0..count {
        added.push(decode_node(reader)?);
    }

    Ok(ChildrenAdded {
        node_id,
        previous_node_id,
        added,
    })
}

pub fn encode_children_removed(msg: &ChildrenRemoved, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::ChildrenRemoved.tag());
    writer.write_varint(u64::from(msg.node_id));
    writer.write_varint(msg.removed.len() as u64);
    for id in &msg.removed {
        writer.write_varint(u64::from(*id));
    }
}

pub fn decode_children_removed(reader: &mut BufferReader<'_>) -> DecodeResult<ChildrenRemoved> {
    let node_id = reader.read_varint_u32().field("node_id")?;
    let count = reader.read_varint_u32().field("removed_count")?;
    let mut removed = Vec::with_capacity(capped(count, reader));
    for _ in 0..count {
        removed.push(reader.read_varint_u32().field("removed_node_id")?);
    }
    Ok(ChildrenRemoved { node_id, removed })
}

pub fn encode_attribute_changed(msg: &AttributeChanged, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::AttributeChanged.tag());
    writer.write_varint(u64::from(msg.node_id));
    writer.write_string(&msg.key);
    match &msg.value {
        Some(value) => {
            writer.write_uint8(VALUE_PRESENT);
            writer.write_string(value);
        }
        None => writer.write_uint8(VALUE_ABSENT),
    }
}

pub fn decode_attribute_changed(reader: &mut BufferReader<'_>) -> DecodeResult<AttributeChanged> {
    let node_id = reader.read_varint_u32().field("node_id")?;
    let key = reader.read_string().field("key")?;
    let value = match reader.read_uint8().field("value_present")? {
        VALUE_ABSENT => None,
        VALUE_PRESENT => Some(reader.read_string().field("value")?),
        value => {
            return Err(DecodeError::UnknownDiscriminant {
                field: "value_present",
                value,
            })
        }
    };
    Ok(AttributeChanged {
        node_id,
        key,
        value,
    })
}

pub fn encode_text_changed(msg: &TextChanged, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::TextChanged.tag());
    writer.write_varint(u64::from(msg.node_id));
    writer.write_string(&msg.text);
}

pub fn decode_text_changed(reader: &mut BufferReader<'_>) -> DecodeResult<TextChanged> {
    let node_id = reader.read_varint_u32().field("node_id")?;
    let text = reader.read_string().field("text")?;
    Ok(TextChanged { node_id, text })
}

// -----------------------------------------------------------------------------
// Ping and diagnostics
// -----------------------------------------------------------------------------

pub fn encode_ping(msg: &Ping, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::Ping.tag());
    writer.write_varint(u64::from(msg.ping));
}

pub fn decode_ping(reader: &mut BufferReader<'_>) -> DecodeResult<Ping> {
    let ping = reader.read_varint_u32().field("ping")?;
    Ok(Ping { ping })
}

pub fn encode_warning(msg: &Warning, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::Warning.tag());
    writer.write_string(&msg.message);
}

pub fn decode_warning(reader: &mut BufferReader<'_>) -> DecodeResult<Warning> {
    let message = reader.read_string().field("message")?;
    Ok(Warning { message })
}

pub fn encode_error(msg: &ErrorMessage, writer: &mut BufferWriter) {
    writer.write_uint8(ServerMessageType::Error.tag());
    writer.write_string(&msg.message);
}

pub fn decode_error(reader: &mut BufferReader<'_>) -> DecodeResult<ErrorMessage> {
    let message = reader.read_string().field("message")?;
    Ok(ErrorMessage { message })
}
