//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections, up to `max_clients` open at once.
//!   A connection holds its admission permit from accept until it
//!   closes, so clients still in the hello exchange count too.
//! - Assigns each connection a `ClientId`.
//! - Spawns:
//!   - a per-client task to handle I/O,
//!   - a single hub task that owns the document.
//!
//! The per-client logic and the hub loop live in `client` and `hub`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use ndom_core::NodeDescription;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client;
use crate::config::Config;
use crate::document::Document;
use crate::hub;
use crate::types::{ClientId, ClientRegistry, EventRx, HubTx};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A running server.
///
/// `hub` lets the application replace the document and publish
/// mutations; `events` delivers what clients did.
pub struct Server {
    pub local_addr: SocketAddr,
    pub hub: HubTx,
    pub events: EventRx,
    accept: JoinHandle<Result<()>>,
}

impl Server {
    /// Wait for the accept loop to end (it only ends on error).
    pub async fn wait(self) -> Result<()> {
        self.accept.await.context("accept loop panicked")?
    }

    /// Stop accepting connections.
    pub fn shutdown(&self) {
        self.accept.abort();
    }
}

/// Bind, spawn the hub and the accept loop, serving `document`.
pub async fn start(config: Config, document: NodeDescription) -> Result<Server> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    start_with_listener(listener, config, document)
}

/// Like [`start`], on an already bound listener.
///
/// Fails on an invalid `config`, or if `document` is deeper than the
/// wire format can carry.
pub fn start_with_listener(
    listener: TcpListener,
    config: Config,
    document: NodeDescription,
) -> Result<Server> {
    config.validate()?;
    let document = Document::new(document).context("initial document")?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, max_clients = config.max_clients, "listening");

    let clients: ClientRegistry = Arc::new(RwLock::new(HashMap::new()));
    let (hub_tx, hub_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(hub::run_hub(
        hub_rx,
        clients,
        document,
        events_tx,
        config.ping_interval,
    ));

    let accept = tokio::spawn(accept_loop(listener, config, hub_tx.clone()));

    Ok(Server {
        local_addr,
        hub: hub_tx,
        events: events_rx,
        accept,
    })
}

async fn accept_loop(listener: TcpListener, config: Config, hub_tx: HubTx) -> Result<()> {
    let admission = Arc::new(Semaphore::new(config.max_clients));

    loop {
        let (stream, peer_addr) = listener.accept().await.context("accept")?;

        let Ok(permit) = admission.clone().try_acquire_owned() else {
            warn!(%peer_addr, max_clients = config.max_clients, "rejecting connection");
            drop(stream);
            continue;
        };

        let client_id = next_client_id();
        info!(%client_id, %peer_addr, "accepted connection");

        let hub_tx = hub_tx.clone();
        let max_frame_len = config.max_frame_len;
        let handshake_timeout = config.handshake_timeout;
        tokio::spawn(async move {
            let result =
                client::run_client(client_id, stream, hub_tx, max_frame_len, handshake_timeout)
                    .await;
            drop(permit);
            match result {
                Ok(()) => info!(%client_id, "disconnected"),
                Err(e) => error!(%client_id, error = ?e, "connection ended"),
            }
        });
    }
}
