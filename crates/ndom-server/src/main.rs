//! Demo document host.
//!
//! Serves an `m-group` holding an `m-cube` that spins; clicking the cube
//! toggles its color.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use ndom_core::{ElementNode, EventKind, NodeDescription, NodeId, ServerMessage};
use ndom_server::{ClientEvent, Config, HubCommand};
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const GROUP_ID: NodeId = 1;
const CUBE_ID: NodeId = 2;
const LABEL_ID: NodeId = 3;

const COLORS: [&str; 2] = ["red", "blue"];

#[derive(Parser)]
#[clap(name = "ndom-server")]
#[clap(about = "Networked DOM document host")]
struct Cli {
    /// Interface to bind (overrides NDOM_BIND_ADDR)
    #[clap(short, long)]
    bind: Option<String>,

    /// Port to listen on (overrides NDOM_PORT)
    #[clap(short, long)]
    port: Option<u16>,

    /// Maximum connected clients (overrides NDOM_MAX_CLIENTS)
    #[clap(long)]
    max_clients: Option<usize>,

    /// Ping period in milliseconds (overrides NDOM_PING_INTERVAL_MS)
    #[clap(long)]
    ping_interval_ms: Option<u64>,

    /// Hello exchange deadline in milliseconds (overrides NDOM_HANDSHAKE_TIMEOUT_MS)
    #[clap(long)]
    handshake_timeout_ms: Option<u64>,

    /// Degrees the cube turns per second
    #[clap(long, default_value = "45")]
    spin: f32,
}

fn demo_document() -> NodeDescription {
    ElementNode::new(GROUP_ID, "m-group")
        .with_child(
            ElementNode::new(CUBE_ID, "m-cube")
                .with_attribute("color", COLORS[0])
                .with_attribute("ry", "0"),
        )
        .with_child(
            ElementNode::new(4, "m-label").with_child(NodeDescription::text(LABEL_ID, "clicks: 0")),
        )
        .into()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(max_clients) = cli.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(ms) = cli.ping_interval_ms {
        config.ping_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = cli.handshake_timeout_ms {
        config.handshake_timeout = Duration::from_millis(ms);
    }
    config.validate()?;

    info!(
        addr = %config.socket_addr_string(),
        max_clients = config.max_clients,
        "starting ndom-server"
    );

    let mut server = ndom_server::start(config, demo_document()).await?;

    let frame = Duration::from_millis(100);
    let step = cli.spin * frame.as_secs_f32();
    let mut ticker = interval(frame);
    let mut angle = 0.0f32;
    let mut color = 0usize;
    let mut clicks = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                angle = (angle + step) % 360.0;
                let publish = HubCommand::Publish(vec![ServerMessage::attribute_set(
                    CUBE_ID,
                    "ry",
                    format!("{angle:.1}"),
                )]);
                if server.hub.send(publish).is_err() {
                    break;
                }
            }
            Some((client_id, event)) = server.events.recv() => match event {
                ClientEvent::Interaction(ev) if ev.node_id == CUBE_ID && matches!(ev.kind, EventKind::Click) => {
                    color = (color + 1) % COLORS.len();
                    clicks += 1;
                    info!(%client_id, connection_id = ev.connection_id, color = COLORS[color], "cube clicked");
                    let publish = HubCommand::Publish(vec![
                        ServerMessage::attribute_set(CUBE_ID, "color", COLORS[color]),
                        ServerMessage::text_changed(LABEL_ID, format!("clicks: {clicks}")),
                    ]);
                    if server.hub.send(publish).is_err() {
                        break;
                    }
                }
                ClientEvent::UsersConnected(users) => {
                    info!(%client_id, count = users.len(), "users connected");
                }
                ClientEvent::UsersDisconnected(ids) => {
                    info!(%client_id, ?ids, "users disconnected");
                }
                other => tracing::debug!(%client_id, ?other, "client event"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                server.shutdown();
                return Ok(());
            }
        }
    }

    warn!("hub stopped");
    server.wait().await
}
