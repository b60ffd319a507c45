// JDWP connection management
//
// Handles TCP setup, the fixed handshake exchange, and socket task startup.
// The Oracle JVM dials out to the debugger, so `listen` is the primary entry
// point; `connect` covers conventional attach setups.

use crate::eventloop::{spawn_event_loop, ConnEvent, EventLoopHandle};
use crate::protocol::{Command, CommandPacket, JdwpError, JdwpResult, ReplyPacket, JDWP_HANDSHAKE};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct JdwpConnection {
    event_loop: EventLoopHandle,
    next_id: Arc<AtomicU32>,
}

impl JdwpConnection {
    /// Wait for the debuggee to connect to the given port, then handshake.
    pub async fn listen(port: u16) -> JdwpResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!("Listening for the debuggee on port {}", port);

        let (stream, peer) = listener.accept().await?;
        info!("Debuggee connected from {}", peer);
        Self::from_stream(stream).await
    }

    /// Attach to an already-listening VM.
    pub async fn connect(host: &str, port: u16) -> JdwpResult<Self> {
        info!("Connecting to JDWP at {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;
        Self::from_stream(stream).await
    }

    async fn from_stream(mut stream: TcpStream) -> JdwpResult<Self> {
        Self::handshake(&mut stream).await?;

        let (reader, writer) = stream.into_split();
        let event_loop = spawn_event_loop(reader, writer);

        Ok(Self {
            event_loop,
            next_id: Arc::new(AtomicU32::new(1)),
        })
    }

    /// The debugger side always opens the exchange, whichever end dialed.
    async fn handshake(stream: &mut TcpStream) -> JdwpResult<()> {
        debug!("Performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("Invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Assign a fresh correlation id, send, await the reply.
    pub async fn send(&self, command: Command) -> JdwpResult<ReplyPacket> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.event_loop
            .send_command(CommandPacket::new(id, command))
            .await
    }

    /// Next raw event from the VM side, or the terminal close marker.
    pub async fn recv_event(&self) -> Option<ConnEvent> {
        self.event_loop.recv_event().await
    }
}
