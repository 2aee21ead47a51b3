//! Per-connection I/O.
//!
//! Each connection runs:
//! 1. the hello exchange (version negotiation), bounded by a timeout,
//! 2. a writer task draining the client's outbound channel,
//! 3. a reader loop forwarding decoded frames to the hub.
//!
//! A frame that fails to decode is answered with a `Warning` and the
//! connection continues. Framing and I/O failures end it.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ndom_core::ServerMessage;
use ndom_protocol::{
    decode_client_hello, decode_client_message_for, encode_server_hello, server_message_to_vec,
    BufferWriter, ProtocolVersion, ServerHello, WireMessage,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::framing::{read_frame, write_frame, FrameError};
use crate::types::{ClientHandle, ClientId, HubCommand, HubTx, OutboundRx, OutboundTx};

/// Run the client I/O loop for a single connection.
pub async fn run_client(
    client_id: ClientId,
    stream: TcpStream,
    hub_tx: HubTx,
    max_frame_len: usize,
    handshake_timeout: Duration,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (mut read_half, mut write_half) = stream.into_split();

    let version = timeout(
        handshake_timeout,
        handshake(client_id, &mut read_half, &mut write_half, max_frame_len),
    )
    .await
    .with_context(|| format!("no hello within {handshake_timeout:?}"))??;

    let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(run_writer(client_id, write_half, out_rx));

    hub_tx
        .send(HubCommand::Join {
            client_id,
            handle: ClientHandle {
                version,
                tx: out_tx.clone(),
            },
        })
        .map_err(|_| anyhow!("hub is gone"))?;

    let result = run_reader(client_id, version, read_half, &hub_tx, &out_tx, max_frame_len).await;

    let _ = hub_tx.send(HubCommand::Leave { client_id });
    drop(out_tx);
    // The hub drops its sender on Leave, which ends the writer.
    let _ = writer.await;

    result
}

/// Read the client hello, pick a version and answer with ours.
async fn handshake(
    client_id: ClientId,
    read_half: &mut OwnedReadHalf,
    write_half: &mut OwnedWriteHalf,
    max_frame_len: usize,
) -> Result<ProtocolVersion> {
    let frame = read_frame(read_half, max_frame_len)
        .await
        .context("reading client hello")?
        .ok_or_else(|| anyhow!("closed before hello"))?;

    let hello = decode_client_hello(&frame).context("decoding client hello")?;

    let Some(version) = hello.negotiate() else {
        let reply = ServerMessage::error(format!(
            "no common protocol version; this server speaks {:?}",
            ProtocolVersion::SUPPORTED
        ));
        write_frame(write_half, &server_message_to_vec(&reply)?).await?;
        return Err(anyhow!("no common version in {:?}", hello.versions));
    };

    let mut writer = BufferWriter::new(8);
    encode_server_hello(&ServerHello { version }, &mut writer);
    write_frame(write_half, writer.get_buffer())
        .await
        .context("writing server hello")?;

    debug!(%client_id, %version, "handshake complete");
    Ok(version)
}

async fn run_reader(
    client_id: ClientId,
    version: ProtocolVersion,
    mut read_half: OwnedReadHalf,
    hub_tx: &HubTx,
    out_tx: &OutboundTx,
    max_frame_len: usize,
) -> Result<()> {
    loop {
        let frame = match read_frame(&mut read_half, max_frame_len).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(FrameError::TooLarge { len, max }) => {
                let _ = out_tx.send(ServerMessage::error(format!(
                    "frame of {len} bytes exceeds limit of {max}"
                )));
                return Err(anyhow!("{client_id}: oversized frame ({len} > {max})"));
            }
            Err(e) => return Err(e).context("reading frame"),
        };

        match decode_client_message_for(version, &frame) {
            Ok(msg) => {
                debug!(%client_id, ?msg, "received");
                if hub_tx.send(HubCommand::FromClient { client_id, msg }).is_err() {
                    return Err(anyhow!("hub is gone"));
                }
            }
            Err(err) => {
                warn!(%client_id, error = %err, len = frame.len(), "undecodable frame");
                let _ = out_tx.send(ServerMessage::warning(format!(
                    "could not decode message: {err}"
                )));
            }
        }
    }
}

async fn run_writer(client_id: ClientId, mut write_half: OwnedWriteHalf, mut out_rx: OutboundRx) {
    while let Some(msg) = out_rx.recv().await {
        let bytes = match server_message_to_vec(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    %client_id,
                    error = %e,
                    kind = msg.kind().name(),
                    "dropping unencodable message"
                );
                continue;
            }
        };
        if let Err(e) = write_frame(&mut write_half, &bytes).await {
            warn!(%client_id, error = %e, "write failed");
            break;
        }
    }
}
