//! End-to-end sessions against a server on a loopback socket.

use std::time::Duration;

use ndom_core::{ClientMessage, ElementNode, InteractionEvent, NodeDescription, ServerMessage, Vec3};
use ndom_protocol::{
    client_message_to_vec, decode_server_hello, decode_server_message_for, encode_client_hello,
    BufferWriter, ClientHello, ProtocolVersion,
};
use ndom_server::framing::{read_frame, write_frame};
use ndom_server::{ClientEvent, Config, HubCommand, Server};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1".into(),
        port: 0,
        max_frame_len: 1024,
        ping_interval: Duration::from_secs(3600),
        ..Config::default()
    }
}

async fn server_with(config: Config) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root: NodeDescription = ElementNode::new(1, "m-group")
        .with_child(ElementNode::new(2, "m-cube").with_attribute("color", "red"))
        .into();
    ndom_server::start_with_listener(listener, config, root).unwrap()
}

async fn server() -> Server {
    server_with(test_config()).await
}

/// Send a hello on `stream`; `None` if the server closed it instead of
/// answering.
async fn hello(
    stream: &mut TcpStream,
    versions: Vec<ProtocolVersion>,
) -> Option<ProtocolVersion> {
    let mut hello = BufferWriter::new(8);
    encode_client_hello(&ClientHello { versions }, &mut hello);
    // A refused connection may already be reset.
    if write_frame(stream, hello.get_buffer()).await.is_err() {
        return None;
    }

    let reply = timeout(WAIT, read_frame(stream, 1024))
        .await
        .expect("no answer and no close")
        .ok()??;
    Some(decode_server_hello(&reply).unwrap().version)
}

struct TestClient {
    stream: TcpStream,
    version: ProtocolVersion,
}

impl TestClient {
    async fn try_connect(server: &Server, versions: Vec<ProtocolVersion>) -> Option<TestClient> {
        let mut stream = TcpStream::connect(server.local_addr).await.unwrap();
        let version = hello(&mut stream, versions).await?;
        Some(TestClient { stream, version })
    }

    async fn connect(server: &Server, versions: Vec<ProtocolVersion>) -> TestClient {
        TestClient::try_connect(server, versions)
            .await
            .expect("connection was not admitted")
    }

    async fn recv(&mut self) -> ServerMessage {
        let frame = timeout(WAIT, read_frame(&mut self.stream, 1 << 20))
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .expect("server closed");
        decode_server_message_for(self.version, &frame).unwrap()
    }

    async fn send(&mut self, msg: &ClientMessage) {
        write_frame(&mut self.stream, &client_message_to_vec(msg))
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, body: &[u8]) {
        write_frame(&mut self.stream, body).await.unwrap();
    }
}

async fn next_event(server: &mut Server) -> (ndom_server::ClientId, ClientEvent) {
    timeout(WAIT, server.events.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn snapshot_then_batched_mutations() {
    let mut server = server().await;
    let mut client = TestClient::connect(&server, ProtocolVersion::SUPPORTED.to_vec()).await;
    assert_eq!(client.version, ProtocolVersion::V2);

    match client.recv().await {
        ServerMessage::Snapshot(s) => assert_eq!(s.root.subtree_len(), 2),
        other => panic!("expected snapshot, got {:?}", other),
    }
    assert!(matches!(next_event(&mut server).await.1, ClientEvent::Joined { .. }));

    server
        .hub
        .send(HubCommand::Publish(vec![
            ServerMessage::attribute_set(2, "color", "blue"),
            ServerMessage::attribute_removed(2, "ry"),
        ]))
        .unwrap();

    assert_eq!(client.recv().await, ServerMessage::BatchStart);
    assert_eq!(client.recv().await, ServerMessage::attribute_set(2, "color", "blue"));
    assert_eq!(client.recv().await, ServerMessage::attribute_removed(2, "ry"));
    assert_eq!(client.recv().await, ServerMessage::BatchEnd);
}

#[tokio::test]
async fn click_reaches_the_application() {
    let mut server = server().await;
    let mut client = TestClient::connect(&server, vec![ProtocolVersion::V1]).await;
    assert_eq!(client.version, ProtocolVersion::V1);
    client.recv().await;
    next_event(&mut server).await;

    let click = InteractionEvent::click(5, 2, Vec3::new(0.5, 1.0, 0.0));
    client.send(&click.clone().into()).await;

    let (_, event) = next_event(&mut server).await;
    assert_eq!(event, ClientEvent::Interaction(click));
}

#[tokio::test]
async fn bad_frame_gets_a_warning_and_the_session_continues() {
    let mut server = server().await;
    let mut client = TestClient::connect(&server, vec![ProtocolVersion::V2]).await;
    client.recv().await;
    next_event(&mut server).await;

    client.send_raw(&[200]).await;
    match client.recv().await {
        ServerMessage::Warning(w) => assert!(w.message.contains("200"), "{}", w.message),
        other => panic!("expected warning, got {:?}", other),
    }

    client
        .send(&ClientMessage::disconnect_users(vec![9]))
        .await;
    let (_, event) = next_event(&mut server).await;
    assert_eq!(event, ClientEvent::UsersDisconnected(vec![9]));
}

#[tokio::test]
async fn v1_session_rejects_v2_messages() {
    let mut server = server().await;
    let mut client = TestClient::connect(&server, vec![ProtocolVersion::V1]).await;
    client.recv().await;
    next_event(&mut server).await;

    client.send(&ClientMessage::connect_user(1, None)).await;
    match client.recv().await {
        ServerMessage::Warning(w) => assert!(w.message.contains("connectUsers"), "{}", w.message),
        other => panic!("expected warning, got {:?}", other),
    }
}

#[tokio::test]
async fn disconnect_is_reported() {
    let mut server = server().await;
    let client = TestClient::connect(&server, vec![ProtocolVersion::V2]).await;
    let (id, _) = next_event(&mut server).await;

    drop(client);
    assert_eq!(next_event(&mut server).await, (id, ClientEvent::Left));
}

#[tokio::test]
async fn no_common_version_closes_with_error() {
    let server = server().await;
    let mut stream = TcpStream::connect(server.local_addr).await.unwrap();
    write_frame(&mut stream, b"NDOM\x01\x09").await.unwrap();

    let frame = timeout(WAIT, read_frame(&mut stream, 1024))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(
        decode_server_message_for(ProtocolVersion::V1, &frame),
        Ok(ServerMessage::Error(_))
    ));
}

#[tokio::test]
async fn max_clients_counts_connections_still_in_handshake() {
    let server = server_with(Config {
        max_clients: 1,
        ..test_config()
    })
    .await;

    let mut streams = Vec::new();
    for _ in 0..5 {
        streams.push(TcpStream::connect(server.local_addr).await.unwrap());
    }
    // Let the accept loop see every connection before any hello.
    sleep(Duration::from_millis(100)).await;

    let mut admitted = 0;
    for stream in &mut streams {
        if hello(stream, vec![ProtocolVersion::V2]).await.is_some() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn slot_is_released_when_a_client_leaves() {
    let mut server = server_with(Config {
        max_clients: 1,
        ..test_config()
    })
    .await;

    let first = TestClient::connect(&server, vec![ProtocolVersion::V2]).await;
    let (id, _) = next_event(&mut server).await;
    assert!(TestClient::try_connect(&server, vec![ProtocolVersion::V2])
        .await
        .is_none());

    drop(first);
    assert_eq!(next_event(&mut server).await, (id, ClientEvent::Left));

    // The permit is returned once the connection task finishes.
    for _ in 0..50 {
        if TestClient::try_connect(&server, vec![ProtocolVersion::V2])
            .await
            .is_some()
        {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("slot was never released");
}

#[tokio::test]
async fn silent_connection_is_closed_after_handshake_timeout() {
    let server = server_with(Config {
        max_clients: 1,
        handshake_timeout: Duration::from_millis(200),
        ..test_config()
    })
    .await;

    let mut idle = TcpStream::connect(server.local_addr).await.unwrap();
    let closed = timeout(WAIT, read_frame(&mut idle, 1024))
        .await
        .expect("idle connection was kept open");
    assert!(!matches!(closed, Ok(Some(_))));

    // Its slot is free again.
    let mut admitted = false;
    for _ in 0..50 {
        if TestClient::try_connect(&server, vec![ProtocolVersion::V2])
            .await
            .is_some()
        {
            admitted = true;
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted);
}
