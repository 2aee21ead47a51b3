//! Minimal interactive client.
//!
//! Prints every server message as a JSON line, answers pings, and sends
//! what you type:
//!
//! ```text
//! click 2                      click node 2
//! {"type":"pong","pong":1}     any client message as a JSON line
//! quit
//! ```

use std::env;

use anyhow::{anyhow, bail, Context, Result};
use ndom_core::{ClientMessage, InteractionEvent, ServerMessage, Vec3};
use ndom_protocol::json_codec::{format_server_message, parse_client_line};
use ndom_protocol::{
    client_message_to_vec, decode_server_hello, decode_server_message_for, encode_client_hello,
    BufferWriter, ClientHello, ProtocolVersion,
};
use ndom_server::framing::{read_frame, write_frame};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

async fn send(write_half: &mut OwnedWriteHalf, msg: &ClientMessage) -> Result<()> {
    write_frame(write_half, &client_message_to_vec(msg)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let addr = env::var("NDOM_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:9100".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    let (mut read_half, mut write_half) = stream.into_split();

    let mut hello = BufferWriter::new(8);
    encode_client_hello(&ClientHello::all_supported(), &mut hello);
    write_frame(&mut write_half, hello.get_buffer()).await?;

    let reply = read_frame(&mut read_half, MAX_FRAME_LEN)
        .await?
        .ok_or_else(|| anyhow!("server closed during handshake"))?;
    let version: ProtocolVersion = decode_server_hello(&reply)?.version;
    println!("Connected, speaking {}.", version);
    println!("Type `click <node_id>`, a JSON client message, or `quit`.\n");

    // Frames are read on their own task; `read_frame` is not cancel-safe.
    let (server_tx, mut server_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok(Some(frame)) = read_frame(&mut read_half, MAX_FRAME_LEN).await {
            if server_tx.send(decode_server_message_for(version, &frame)).is_err() {
                break;
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            decoded = server_rx.recv() => {
                let Some(decoded) = decoded else {
                    println!("Server closed the connection.");
                    return Ok(());
                };
                match decoded {
                    Ok(msg) => {
                        println!("<< {}", format_server_message(&msg)?);
                        if let ServerMessage::Ping(ping) = msg {
                            send(&mut write_half, &ClientMessage::pong(ping.ping)).await?;
                        }
                    }
                    Err(e) => eprintln!("undecodable frame: {e}"),
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                let trimmed = line.trim();
                if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
                    return Ok(());
                }
                match parse_command(trimmed) {
                    Ok(Some(msg)) => send(&mut write_half, &msg).await?,
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }
}

fn parse_command(line: &str) -> Result<Option<ClientMessage>> {
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(rest) = line.strip_prefix("click") {
        let node_id = rest.trim().parse().context("usage: click <node_id>")?;
        return Ok(Some(InteractionEvent::click(0, node_id, Vec3::ZERO).into()));
    }
    match parse_client_line(line) {
        Some(msg) => Ok(Some(msg)),
        None => bail!("could not parse line as a client message"),
    }
}
