// crates/ndom-protocol/src/json_codec.rs

//! JSON line codec for logs, replay files and hand-driven tools.
//!
//! One message per line, tagged by `"type"`:
//!
//! ```text
//! {"type":"attributeChanged","nodeId":2,"key":"color","value":"red"}
//! {"type":"event","connectionId":1,"nodeId":2,"kind":"click",
//!  "position":{"x":0.0,"y":1.0,"z":0.0},"rotation":{"x":0.0,"y":0.0,"z":0.0}}
//! {"type":"pong","pong":3}
//! ```
//!
//! This is not the wire format; peers only ever exchange the binary
//! encoding from `binary_codec`.

use ndom_core::{ClientMessage, ServerMessage};

/// Format a server message as a single JSON line (no trailing newline).
pub fn format_server_message(msg: &ServerMessage) -> serde_json::Result<String> {
    serde_json::to_string(msg)
}

/// Format a client message as a single JSON line.
///
/// Non-finite vector components come out as `null`, which
/// [`parse_client_line`] does not accept back.
pub fn format_client_message(msg: &ClientMessage) -> serde_json::Result<String> {
    serde_json::to_string(msg)
}

/// Parse a JSON line into a `ServerMessage`.
///
/// Returns `None` for blank lines, comments (starting with `#`) and
/// lines that do not describe a server message.
pub fn parse_server_line(line: &str) -> Option<ServerMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Parse a JSON line into a `ClientMessage`; same rules as
/// [`parse_server_line`].
pub fn parse_client_line(line: &str) -> Option<ClientMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndom_core::{ElementNode, InteractionEvent, NodeDescription, Vec3};

    #[test]
    fn attribute_change_line() {
        let line = format_server_message(&ServerMessage::attribute_set(2, "color", "red")).unwrap();
        assert_eq!(
            line,
            r#"{"type":"attributeChanged","nodeId":2,"key":"color","value":"red"}"#
        );
        assert_eq!(
            parse_server_line(&line),
            Some(ServerMessage::attribute_set(2, "color", "red"))
        );
    }

    #[test]
    fn removal_serializes_null() {
        let line = format_server_message(&ServerMessage::attribute_removed(2, "color")).unwrap();
        assert!(line.contains(r#""value":null"#));
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let root: NodeDescription = ElementNode::new(1, "m-group")
            .with_child(ElementNode::new(2, "m-cube").with_attribute("ry", "90"))
            .with_child(NodeDescription::text(3, "label"))
            .into();
        let msg = ServerMessage::snapshot(root, 1234);
        assert_eq!(parse_server_line(&format_server_message(&msg).unwrap()), Some(msg));
    }

    #[test]
    fn click_event_line() {
        let msg = ClientMessage::from(InteractionEvent::click(1, 2, Vec3::new(0.0, 1.0, 0.0)));
        let line = format_client_message(&msg).unwrap();
        assert!(line.starts_with(r#"{"type":"event","connectionId":1,"nodeId":2,"kind":"click""#));
        assert_eq!(parse_client_line(&line), Some(msg));
    }

    #[test]
    fn custom_event_parses_from_hand_written_line() {
        let line = r#"{"type":"event","connectionId":1,"nodeId":4,"kind":"custom","name":"vote","bubbles":false,"params":"{}","position":{"x":0,"y":0,"z":0},"rotation":{"x":0,"y":0,"z":0}}"#;
        let msg = parse_client_line(line).unwrap();
        assert_eq!(
            msg,
            ClientMessage::from(InteractionEvent::custom(1, 4, "vote", false, "{}"))
        );
    }

    #[test]
    fn blank_comment_and_garbage_lines() {
        assert_eq!(parse_client_line("   "), None);
        assert_eq!(parse_client_line("# pong 1"), None);
        assert_eq!(parse_client_line(r#"{"type":"nope"}"#), None);
        assert_eq!(parse_client_line(r#"{"type":"pong","pong":7}"#), Some(ClientMessage::pong(7)));
    }

    #[test]
    fn non_finite_position_does_not_come_back() {
        let msg = ClientMessage::from(InteractionEvent::click(1, 2, Vec3::new(f32::NAN, 0.0, 0.0)));
        let line = format_client_message(&msg).unwrap();
        assert!(line.contains(r#""x":null"#), "{}", line);
        assert_eq!(parse_client_line(&line), None);
    }
}
