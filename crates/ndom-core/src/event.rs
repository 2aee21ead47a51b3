//! Interaction events sent by clients.

use serde::{Deserialize, Serialize};

use crate::{ConnectionId, NodeId};

/// Three-component vector used for event positions and rotations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }
}

/// What happened to the target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventKind {
    Click,
    CollisionStart,
    CollisionMove,
    CollisionEnd,

    /// Application-defined event dispatched on the target node.
    Custom {
        name: String,

        /// Whether the event bubbles up through ancestors.
        bubbles: bool,

        /// Opaque JSON-encoded parameters.
        params: String,
    },
}

/// An interaction a user performed against a node.
///
/// `position` and `rotation` are in the target node's world space;
/// rotation is Euler angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub connection_id: ConnectionId,
    pub node_id: NodeId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub position: Vec3,
    pub rotation: Vec3,
}

impl InteractionEvent {
    /// A click at `position` with no orientation.
    pub fn click(connection_id: ConnectionId, node_id: NodeId, position: Vec3) -> Self {
        InteractionEvent {
            connection_id,
            node_id,
            kind: EventKind::Click,
            position,
            rotation: Vec3::ZERO,
        }
    }

    /// A custom event carrying JSON parameters.
    pub fn custom(
        connection_id: ConnectionId,
        node_id: NodeId,
        name: impl Into<String>,
        bubbles: bool,
        params: impl Into<String>,
    ) -> Self {
        InteractionEvent {
            connection_id,
            node_id,
            kind: EventKind::Custom {
                name: name.into(),
                bubbles,
                params: params.into(),
            },
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }
}
