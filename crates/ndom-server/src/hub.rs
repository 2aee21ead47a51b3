//! Central hub loop.
//!
//! This task owns the document baseline, the client registry writes and
//! the ping clock, and processes every `HubCommand`.
//!
//! Routing policy:
//! - `Snapshot` on join: sent **only** to the joining client.
//! - published mutations, `Ping`, `DocumentTime`: broadcast to **all**
//!   connected clients, filtered by each client's version.
//! - client messages: `Pong` is consumed here; everything else is
//!   forwarded to the application as a `ClientEvent`.

use std::time::Duration;

use ndom_core::{ClientMessage, ServerMessage};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::types::{ClientEvent, ClientHandle, ClientId, ClientRegistry, EventTx, HubCommand, HubRx};

struct OutstandingPing {
    seq: u32,
    sent_at: Instant,
}

pub struct Hub {
    clients: ClientRegistry,
    document: Document,
    events: EventTx,
    started: Instant,
    ping_seq: u32,
    outstanding: Option<OutstandingPing>,
}

impl Hub {
    pub fn new(clients: ClientRegistry, document: Document, events: EventTx) -> Self {
        Hub {
            clients,
            document,
            events,
            started: Instant::now(),
            ping_seq: 0,
            outstanding: None,
        }
    }

    /// Milliseconds since the hub started.
    fn document_time(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn snapshot(&self) -> ServerMessage {
        ServerMessage::snapshot(self.document.root().clone(), self.document_time())
    }

    fn notify(&self, client_id: ClientId, event: ClientEvent) {
        // Nobody listening is fine.
        let _ = self.events.send((client_id, event));
    }

    pub async fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Join { client_id, handle } => self.join(client_id, handle).await,
            HubCommand::Leave { client_id } => self.leave(client_id).await,
            HubCommand::FromClient { client_id, msg } => self.from_client(client_id, msg),
            HubCommand::ReplaceDocument(root) => match self.document.replace(root) {
                Ok(()) => {
                    let snapshot = self.snapshot();
                    self.broadcast(&[snapshot]).await;
                }
                Err(e) => warn!(error = %e, "keeping current document"),
            },
            HubCommand::Publish(msgs) => self.publish(msgs).await,
        }
    }

    async fn join(&mut self, client_id: ClientId, handle: ClientHandle) {
        let version = handle.version;
        if !handle.send(&self.snapshot()) {
            return;
        }
        self.clients.write().await.insert(client_id, handle);
        info!(%client_id, %version, "client joined");
        self.notify(client_id, ClientEvent::Joined { version });
    }

    async fn leave(&mut self, client_id: ClientId) {
        if self.clients.write().await.remove(&client_id).is_some() {
            info!(%client_id, "client left");
            self.notify(client_id, ClientEvent::Left);
        }
    }

    fn from_client(&self, client_id: ClientId, msg: ClientMessage) {
        match msg {
            ClientMessage::Pong(pong) => match &self.outstanding {
                Some(ping) if ping.seq == pong.pong => {
                    debug!(%client_id, seq = pong.pong, rtt = ?ping.sent_at.elapsed(), "pong");
                }
                _ => debug!(%client_id, seq = pong.pong, "stale pong"),
            },
            ClientMessage::Event(event) => {
                debug!(%client_id, node_id = event.node_id, "interaction event");
                self.notify(client_id, ClientEvent::Interaction(event));
            }
            ClientMessage::ConnectUsers(c) => {
                self.notify(client_id, ClientEvent::UsersConnected(c.users));
            }
            ClientMessage::DisconnectUsers(d) => {
                self.notify(client_id, ClientEvent::UsersDisconnected(d.connection_ids));
            }
        }
    }

    /// Apply `msgs` to the baseline and broadcast the ones that applied.
    ///
    /// Batch markers are the hub's to place; any in `msgs` are dropped.
    async fn publish(&mut self, msgs: Vec<ServerMessage>) {
        let mut applied = Vec::with_capacity(msgs.len() + 2);
        for msg in msgs {
            if matches!(msg, ServerMessage::BatchStart | ServerMessage::BatchEnd) {
                debug!(?msg, "ignoring published batch marker");
                continue;
            }
            match self.document.apply(&msg) {
                Ok(()) => applied.push(msg),
                Err(e) => warn!(error = %e, "dropping mutation"),
            }
        }

        if applied.len() > 1 {
            applied.insert(0, ServerMessage::BatchStart);
            applied.push(ServerMessage::BatchEnd);
        }
        self.broadcast(&applied).await;
    }

    async fn tick(&mut self) {
        self.ping_seq = self.ping_seq.wrapping_add(1);
        self.outstanding = Some(OutstandingPing {
            seq: self.ping_seq,
            sent_at: Instant::now(),
        });

        let msgs = [
            ServerMessage::document_time(self.document_time()),
            ServerMessage::ping(self.ping_seq),
        ];
        self.broadcast(&msgs).await;
    }

    async fn broadcast(&self, msgs: &[ServerMessage]) {
        if msgs.is_empty() {
            return;
        }

        // Snapshot of current clients to minimize lock hold time.
        let current: Vec<ClientHandle> = {
            let guard = self.clients.read().await;
            guard.values().cloned().collect()
        };

        for handle in &current {
            for msg in msgs {
                if !handle.send(msg) {
                    break;
                }
            }
        }
    }
}

/// Run the central hub loop until every `HubTx` is dropped.
pub async fn run_hub(
    mut hub_rx: HubRx,
    clients: ClientRegistry,
    document: Document,
    events: EventTx,
    ping_interval: Duration,
) {
    let mut hub = Hub::new(clients, document, events);
    let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = hub_rx.recv() => match cmd {
                Some(cmd) => hub.handle(cmd).await,
                None => break,
            },
            _ = ticker.tick() => hub.tick().await,
        }
    }

    info!("hub shutting down (all senders dropped)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use ndom_core::{ElementNode, InteractionEvent, NodeDescription, Vec3};
    use ndom_protocol::{ProtocolVersion, MAX_NODE_DEPTH};
    use tokio::sync::{mpsc, RwLock};

    use crate::types::OutboundRx;

    fn hub() -> (Hub, mpsc::UnboundedReceiver<(ClientId, ClientEvent)>) {
        let clients: ClientRegistry = Arc::new(RwLock::new(HashMap::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let root = ElementNode::new(1, "m-group")
            .with_child(ElementNode::new(2, "m-cube"))
            .into();
        let document = Document::new(root).unwrap();
        (Hub::new(clients, document, events_tx), events_rx)
    }

    async fn join(hub: &mut Hub, id: u64, version: ProtocolVersion) -> OutboundRx {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.handle(HubCommand::Join {
            client_id: ClientId(id),
            handle: ClientHandle { version, tx },
        })
        .await;
        rx
    }

    fn drain(rx: &mut OutboundRx) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn join_sends_snapshot_first() {
        let (mut hub, mut events) = hub();
        let mut rx = join(&mut hub, 1, ProtocolVersion::V2).await;

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            ServerMessage::Snapshot(s) => assert_eq!(s.root.subtree_len(), 2),
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert_eq!(
            events.try_recv().unwrap(),
            (ClientId(1), ClientEvent::Joined { version: ProtocolVersion::V2 })
        );
    }

    #[tokio::test]
    async fn publish_batches_for_v2_only() {
        let (mut hub, _events) = hub();
        let mut v1 = join(&mut hub, 1, ProtocolVersion::V1).await;
        let mut v2 = join(&mut hub, 2, ProtocolVersion::V2).await;
        drain(&mut v1);
        drain(&mut v2);

        let mutations = vec![
            ServerMessage::attribute_set(2, "color", "red"),
            ServerMessage::attribute_set(2, "ry", "90"),
        ];
        hub.handle(HubCommand::Publish(mutations.clone())).await;

        assert_eq!(drain(&mut v1), mutations);

        let got = drain(&mut v2);
        assert_eq!(got.len(), 4);
        assert_eq!(got[0], ServerMessage::BatchStart);
        assert_eq!(&got[1..3], &mutations[..]);
        assert_eq!(got[3], ServerMessage::BatchEnd);
    }

    #[tokio::test]
    async fn late_joiner_sees_published_state() {
        let (mut hub, _events) = hub();
        hub.handle(HubCommand::Publish(vec![ServerMessage::attribute_set(
            2, "color", "blue",
        )]))
        .await;

        let mut rx = join(&mut hub, 7, ProtocolVersion::V1).await;
        match drain(&mut rx).remove(0) {
            ServerMessage::Snapshot(s) => {
                let NodeDescription::Element(root) = s.root else {
                    panic!("root should be an element");
                };
                let NodeDescription::Element(cube) = &root.children[0] else {
                    panic!("child should be an element");
                };
                assert_eq!(cube.attribute("color"), Some("blue"));
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn events_are_forwarded_and_leave_is_reported() {
        let (mut hub, mut events) = hub();
        let _rx = join(&mut hub, 3, ProtocolVersion::V1).await;
        events.try_recv().unwrap();

        let click = InteractionEvent::click(0, 2, Vec3::ZERO);
        hub.handle(HubCommand::FromClient {
            client_id: ClientId(3),
            msg: click.clone().into(),
        })
        .await;
        hub.handle(HubCommand::Leave {
            client_id: ClientId(3),
        })
        .await;

        assert_eq!(
            events.try_recv().unwrap(),
            (ClientId(3), ClientEvent::Interaction(click))
        );
        assert_eq!(events.try_recv().unwrap(), (ClientId(3), ClientEvent::Left));
        assert!(hub.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn tick_sends_time_only_to_v2() {
        let (mut hub, _events) = hub();
        let mut v1 = join(&mut hub, 1, ProtocolVersion::V1).await;
        let mut v2 = join(&mut hub, 2, ProtocolVersion::V2).await;
        drain(&mut v1);
        drain(&mut v2);

        hub.tick().await;

        assert_eq!(drain(&mut v1), vec![ServerMessage::ping(1)]);
        let got = drain(&mut v2);
        assert!(matches!(got[0], ServerMessage::DocumentTime(_)));
        assert_eq!(got[1], ServerMessage::ping(1));
    }

    #[tokio::test]
    async fn published_batch_markers_are_not_nested() {
        let (mut hub, _events) = hub();
        let mut v1 = join(&mut hub, 1, ProtocolVersion::V1).await;
        let mut v2 = join(&mut hub, 2, ProtocolVersion::V2).await;
        drain(&mut v1);
        drain(&mut v2);

        let a = ServerMessage::attribute_set(2, "color", "red");
        let b = ServerMessage::attribute_set(2, "ry", "90");
        hub.handle(HubCommand::Publish(vec![
            ServerMessage::BatchStart,
            a.clone(),
            b.clone(),
            ServerMessage::BatchEnd,
        ]))
        .await;

        assert_eq!(
            drain(&mut v2),
            vec![ServerMessage::BatchStart, a.clone(), b.clone(), ServerMessage::BatchEnd]
        );
        assert_eq!(drain(&mut v1), vec![a.clone(), b]);

        // A lone mutation wrapped by the caller goes out bare.
        hub.handle(HubCommand::Publish(vec![
            ServerMessage::BatchStart,
            a.clone(),
            ServerMessage::BatchEnd,
        ]))
        .await;
        assert_eq!(drain(&mut v2), vec![a]);
    }

    #[tokio::test]
    async fn too_deep_replacement_keeps_the_current_document() {
        let (mut hub, _events) = hub();
        let mut rx = join(&mut hub, 1, ProtocolVersion::V2).await;
        drain(&mut rx);

        let mut deep = ElementNode::new(0, "g");
        for id in 1..=MAX_NODE_DEPTH as u32 {
            deep = ElementNode::new(id, "g").with_child(deep);
        }
        hub.handle(HubCommand::ReplaceDocument(deep.into())).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(hub.document.root().subtree_len(), 2);
    }
}
