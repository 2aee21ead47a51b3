//! Client → server codecs.
//!
//! Same conventions as `from_server`: `encode_*` writes the tag, and
//! `decode_*` starts just past it.
//!
//! ```text
//! ConnectUsers (1)    : varint count,
//!                       count × (varint connection_id, bool has_token, [string token])
//! DisconnectUsers (2) : varint count, count × varint connection_id
//! Event (3)           : varint connection_id, varint node_id, u8 kind,
//!                       f32 px, f32 py, f32 pz, f32 rx, f32 ry, f32 rz,
//!                       kind == custom: string name, bool bubbles, string params
//! Pong (4)            : varint pong
//! ```
//!
//! Coordinates are fixed-width little-endian `f32`, never varints, so
//! they survive the round trip bit for bit.

use ndom_core::{
    ConnectUser, ConnectUsers, DisconnectUsers, EventKind, InteractionEvent, Pong, Vec3,
};

use crate::buffer::{BufferReader, BufferWriter};
use crate::error::{DecodeError, DecodeResult, FieldContext};
use crate::message_types::ClientMessageType;
use crate::node_codec::capped;

const EVENT_CLICK: u8 = 0;
const EVENT_COLLISION_START: u8 = 1;
const EVENT_COLLISION_MOVE: u8 = 2;
const EVENT_COLLISION_END: u8 = 3;
const EVENT_CUSTOM: u8 = 4;

// -----------------------------------------------------------------------------
// User presence
// -----------------------------------------------------------------------------

pub fn encode_connect_users(msg: &ConnectUsers, writer: &mut BufferWriter) {
    writer.write_uint8(ClientMessageType::ConnectUsers.tag());
    writer.write_varint(msg.users.len() as u64);
    for user in &msg.users {
        writer.write_varint(u64::from(user.connection_id));
        match &user.token {
            Some(token) => {
                writer.write_bool(true);
                writer.write_string(token);
            }
            None => writer.write_bool(false),
        }
    }
}

pub fn decode_connect_users(reader: &mut BufferReader<'_>) -> DecodeResult<ConnectUsers> {
    let count = reader.read_varint_u32().field("user_count")?;
    let mut users = Vec::with_capacity(capped(count, reader));
    for _ in 0..count {
        let connection_id = reader.read_varint_u32().field("connection_id")?;
        let token = if reader.read_bool().field("has_token")? {
            Some(reader.read_string().field("token")?)
        } else {
            None
        };
        users.push(ConnectUser {
            connection_id,
            token,
        });
    }
    Ok(ConnectUsers { users })
}

pub fn encode_disconnect_users(msg: &DisconnectUsers, writer: &mut BufferWriter) {
    writer.write_uint8(ClientMessageType::DisconnectUsers.tag());
    writer.write_varint(msg.connection_ids.len() as u64);
    for id in &msg.connection_ids {
        writer.write_varint(u64::from(*id));
    }
}

pub fn decode_disconnect_users(reader: &mut BufferReader<'_>) -> DecodeResult<DisconnectUsers> {
    let count = reader.read_varint_u32().field("connection_count")?;
    let mut connection_ids = Vec::with_capacity(capped(count, reader));
    for _ in 0..count {
        connection_ids.push(reader.read_varint_u32().field("connection_id")?);
    }
    Ok(DisconnectUsers { connection_ids })
}

// -----------------------------------------------------------------------------
// Interaction events
// -----------------------------------------------------------------------------

pub fn encode_event(msg: &InteractionEvent, writer: &mut BufferWriter) {
    writer.write_uint8(ClientMessageType::Event.tag());
    writer.write_varint(u64::from(msg.connection_id));
    writer.write_varint(u64::from(msg.node_id));

    let kind = match msg.kind {
        EventKind::Click => EVENT_CLICK,
        EventKind::CollisionStart => EVENT_COLLISION_START,
        EventKind::CollisionMove => EVENT_COLLISION_MOVE,
        EventKind::CollisionEnd => EVENT_COLLISION_END,
        EventKind::Custom { .. } => EVENT_CUSTOM,
    };
    writer.write_uint8(kind);

    write_vec3(&msg.position, writer);
    write_vec3(&msg.rotation, writer);

    if let EventKind::Custom {
        name,
        bubbles,
        params,
    } = &msg.kind
    {
        writer.write_string(name);
        writer.write_bool(*bubbles);
        writer.write_string(params);
    }
}

pub fn decode_event(reader: &mut BufferReader<'_>) -> DecodeResult<InteractionEvent> {
    let connection_id = reader.read_varint_u32().field("connection_id")?;
    let node_id = reader.read_varint_u32().field("node_id")?;
    let raw_kind = reader.read_uint8().field("event_kind")?;

    let position = read_vec3(reader, "position")?;
    let rotation = read_vec3(reader, "rotation")?;

    let kind = match raw_kind {
        EVENT_CLICK => EventKind::Click,
        EVENT_COLLISION_START => EventKind::CollisionStart,
        EVENT_COLLISION_MOVE => EventKind::CollisionMove,
        EVENT_COLLISION_END => EventKind::CollisionEnd,
        EVENT_CUSTOM => EventKind::Custom {
            name: reader.read_string().field("event_name")?,
            bubbles: reader.read_bool().field("bubbles")?,
            params: reader.read_string().field("params")?,
        },
        value => {
            return Err(DecodeError::UnknownDiscriminant {
                field: "event_kind",
                value,
            })
        }
    };

    Ok(InteractionEvent {
        connection_id,
        node_id,
        kind,
        position,
        rotation,
    })
}

fn write_vec3(v: &Vec3, writer: &mut BufferWriter) {
    writer.write_f32(v.x);
    writer.write_f32(v.y);
    writer.write_f32(v.z);
}

fn read_vec3(reader: &mut BufferReader<'_>, field: &'static str) -> DecodeResult<Vec3> {
    Ok(Vec3 {
        x: reader.read_f32().field(field)?,
        y: reader.read_f32().field(field)?,
        z: reader.read_f32().field(field)?,
    })
}

// -----------------------------------------------------------------------------
// Pong
// -----------------------------------------------------------------------------

pub fn encode_pong(msg: &Pong, writer: &mut BufferWriter) {
    writer.write_uint8(ClientMessageType::Pong.tag());
    writer.write_varint(u64::from(msg.pong));
}

pub fn decode_pong(reader: &mut BufferReader<'_>) -> DecodeResult<Pong> {
    let pong = reader.read_varint_u32().field("pong")?;
    Ok(Pong { pong })
}
