// Socket task: the only owner of the pending-reply table
//
// All commands, replies and unsolicited events multiplex over one stream.
// Replies resolve their oneshot by correlation id (at-most-once); composite
// event packets are forwarded raw, since ID sizes are negotiated above this
// layer.

use crate::protocol::{
    CommandPacket, IncomingPacket, JdwpError, JdwpResult, PacketAssembler, ReplyPacket,
};
use crate::commands::{command_sets, event_commands};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// What the loop forwards to the event consumer.
#[derive(Debug)]
pub enum ConnEvent {
    /// Payload of a composite event packet, undecoded.
    Composite(Vec<u8>),
    /// The socket closed or reset; terminal.
    Closed,
}

pub struct CommandRequest {
    pub packet: CommandPacket,
    pub reply_tx: oneshot::Sender<JdwpResult<ReplyPacket>>,
}

/// Handle to the socket task for sending commands and receiving events.
#[derive(Clone, Debug)]
pub struct EventLoopHandle {
    command_tx: mpsc::Sender<CommandRequest>,
    event_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ConnEvent>>>,
}

impl EventLoopHandle {
    /// Send a command and wait for its correlated reply.
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(CommandRequest { packet, reply_tx })
            .await
            .map_err(|_| JdwpError::ConnectionClosed)?;

        reply_rx.await.map_err(|_| JdwpError::ConnectionClosed)?
    }

    /// Wait for the next event packet. `None` after `Closed` was delivered
    /// and the channel drained.
    pub async fn recv_event(&self) -> Option<ConnEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }
}

pub fn spawn_event_loop(reader: OwnedReadHalf, writer: OwnedWriteHalf) -> EventLoopHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    // Events are critical (breakpoints, class prepares) and must not be
    // dropped under load.
    let (event_tx, event_rx) = mpsc::channel(256);

    tokio::spawn(event_loop_task(reader, writer, command_rx, event_tx));

    EventLoopHandle {
        command_tx,
        event_rx: Arc::new(tokio::sync::Mutex::new(event_rx)),
    }
}

async fn event_loop_task(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::Receiver<CommandRequest>,
    event_tx: mpsc::Sender<ConnEvent>,
) {
    info!("Connection task started");

    let mut pending_replies: HashMap<u32, oneshot::Sender<JdwpResult<ReplyPacket>>> =
        HashMap::new();
    let mut assembler = PacketAssembler::new();
    let mut chunk = vec![0u8; 8192];

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                let packet_id = cmd.packet.id;
                debug!("Sending command id={}", packet_id);

                let encoded = cmd.packet.encode();
                if let Err(e) = writer.write_all(&encoded).await {
                    error!("Failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }
                if let Err(e) = writer.flush().await {
                    error!("Failed to flush command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending_replies.insert(packet_id, cmd.reply_tx);
            }

            result = reader.read(&mut chunk) => {
                let n = match result {
                    Ok(0) => {
                        info!("Peer closed the connection");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        error!("Socket read failed: {}", e);
                        break;
                    }
                };

                let packets = match assembler.feed(&chunk[..n]) {
                    Ok(packets) => packets,
                    Err(e) => {
                        error!("Framing error: {}", e);
                        break;
                    }
                };

                for packet in packets {
                    match packet {
                        IncomingPacket::Reply(reply) => {
                            debug!("Received reply id={}", reply.id);
                            match pending_replies.remove(&reply.id) {
                                Some(tx) => {
                                    tx.send(Ok(reply)).ok();
                                }
                                None => {
                                    warn!("Reply for unknown command id={}", reply.id);
                                }
                            }
                        }
                        IncomingPacket::Command(cmd) => {
                            if (cmd.command_set, cmd.command)
                                == (command_sets::EVENT, event_commands::COMPOSITE)
                            {
                                debug!("Received event packet, len={}", cmd.data.len());
                                if event_tx.send(ConnEvent::Composite(cmd.data)).await.is_err() {
                                    warn!("Event receiver dropped, discarding events");
                                }
                            } else {
                                warn!(
                                    "Unexpected command packet from VM: set={} cmd={}",
                                    cmd.command_set, cmd.command
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    // Connection loss is terminal: fail every still-pending caller and hand
    // the consumer a close marker so it can synthesize a vm-death.
    for (_, tx) in pending_replies.drain() {
        tx.send(Err(JdwpError::ConnectionClosed)).ok();
    }
    event_tx.send(ConnEvent::Closed).await.ok();

    info!("Connection task shutting down");
}
