// Connection-level tests against a scripted peer socket: handshake, reply
// correlation, event routing, and disconnect behavior.

use jdwp_client::codec::PacketWriter;
use jdwp_client::connection::JdwpConnection;
use jdwp_client::eventloop::ConnEvent;
use jdwp_client::protocol::{
    Command, IncomingPacket, JdwpError, PacketAssembler, JDWP_HANDSHAKE, REPLY_FLAG,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn accept_with_handshake(listener: TcpListener) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, JDWP_HANDSHAKE);
    stream.write_all(JDWP_HANDSHAKE).await.unwrap();
    stream
}

async fn read_commands(stream: &mut TcpStream, count: usize) -> Vec<(u32, u8, u8)> {
    let mut assembler = PacketAssembler::new();
    let mut commands = Vec::new();
    let mut chunk = [0u8; 1024];
    while commands.len() < count {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "peer closed mid-command");
        for packet in assembler.feed(&chunk[..n]).unwrap() {
            if let IncomingPacket::Command(c) = packet {
                commands.push((c.id, c.command_set, c.command));
            }
        }
    }
    commands
}

fn reply_bytes(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.put_u32((11 + payload.len()) as u32);
    w.put_u32(id);
    w.put_u8(REPLY_FLAG);
    w.put_u16(0);
    w.put_bytes(payload);
    w.into_vec()
}

#[tokio::test]
async fn replies_correlate_even_out_of_order() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let vm = tokio::spawn(async move {
        let mut stream = accept_with_handshake(listener).await;
        let commands = read_commands(&mut stream, 2).await;
        // Answer in reverse order, echoing the command number back
        for (id, _, command) in commands.iter().rev() {
            stream.write_all(&reply_bytes(*id, &[*command])).await.unwrap();
        }
        stream
    });

    let conn = JdwpConnection::connect("127.0.0.1", port).await.unwrap();
    let (a, b) = tokio::join!(conn.send(Command::new(1, 7)), conn.send(Command::new(1, 12)));
    assert_eq!(a.unwrap().data, vec![7]);
    assert_eq!(b.unwrap().data, vec![12]);
    drop(vm.await.unwrap());
}

#[tokio::test]
async fn composite_events_reach_the_event_channel() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let vm = tokio::spawn(async move {
        let mut stream = accept_with_handshake(listener).await;
        let mut w = PacketWriter::new();
        w.put_u32(11 + 3);
        w.put_u32(0x1000);
        w.put_u8(0x00);
        w.put_u8(64); // Event command set
        w.put_u8(100); // Composite
        w.put_bytes(&[0xAA, 0xBB, 0xCC]);
        stream.write_all(&w.into_vec()).await.unwrap();
        stream
    });

    let conn = JdwpConnection::connect("127.0.0.1", port).await.unwrap();
    match conn.recv_event().await {
        Some(ConnEvent::Composite(data)) => assert_eq!(data, vec![0xAA, 0xBB, 0xCC]),
        other => panic!("expected a composite event, got {:?}", other),
    }

    // Dropping the peer surfaces as the terminal close marker
    drop(vm.await.unwrap());
    match conn.recv_event().await {
        Some(ConnEvent::Closed) => {}
        other => panic!("expected the close marker, got {:?}", other),
    }
}

#[tokio::test]
async fn disconnect_fails_pending_commands() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let vm = tokio::spawn(async move {
        let mut stream = accept_with_handshake(listener).await;
        // Read the command, then hang up without answering
        read_commands(&mut stream, 1).await;
    });

    let conn = JdwpConnection::connect("127.0.0.1", port).await.unwrap();
    match conn.send(Command::new(1, 8)).await {
        Err(JdwpError::ConnectionClosed) => {}
        other => panic!("expected connection-closed, got {:?}", other),
    }
    vm.await.unwrap();
}
