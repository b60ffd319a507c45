// JDWP packet framing and error handling
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

// JDWP uses big-endian (network byte order) for all multi-byte values.

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid handshake")]
    InvalidHandshake,

    #[error("JDWP error code {0}: {1}")]
    JdwpErrorCode(u16, &'static str),

    #[error("Connection closed")]
    ConnectionClosed,
}

// JDWP handshake string, exchanged before any typed packet
pub const JDWP_HANDSHAKE: &[u8] = b"JDWP-Handshake";

// Packet structure:
// length (4 bytes) - includes header
// id (4 bytes)
// flags (1 byte) - 0x00 = command, 0x80 = reply
// [Command packet: command set (1 byte) + command (1 byte)]
// [Reply packet: error code (2 bytes)]
// data (variable)

pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

/// Maximum allowed JDWP packet size (10MB), guards against a broken peer.
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// A (commandSet, command) pair with a ready-to-send payload, before an id is
/// assigned. The catalog modules produce these.
#[derive(Debug, Clone)]
pub struct Command {
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

impl Command {
    pub fn new(command_set: u8, command: u8) -> Self {
        Self {
            command_set,
            command,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command: Command) -> Self {
        Self {
            id,
            command_set: command.command_set,
            command: command.command,
            data: command.data,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(0x00); // command flag
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }
}

impl ReplyPacket {
    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    /// Non-zero error codes abort before any payload field is parsed; every
    /// reply decoder calls this first.
    pub fn check_error(&self) -> JdwpResult<()> {
        if self.is_error() {
            Err(JdwpError::JdwpErrorCode(
                self.error_code,
                error_name(self.error_code),
            ))
        } else {
            Ok(())
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A packet received from the wire, either a reply to one of our commands or
/// an unsolicited command from the VM (composite event sets).
#[derive(Debug, Clone)]
pub enum IncomingPacket {
    Reply(ReplyPacket),
    Command(CommandPacket),
}

/// Reassembles length-prefixed packets from an arbitrarily chunked byte
/// stream. Feeding the same bytes in one call or one byte at a time yields
/// the same packet sequence.
#[derive(Debug, Default)]
pub struct PacketAssembler {
    buf: BytesMut,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and drain every complete packet.
    pub fn feed(&mut self, bytes: &[u8]) -> JdwpResult<Vec<IncomingPacket>> {
        self.buf.extend_from_slice(bytes);

        let mut packets = Vec::new();
        loop {
            if self.buf.len() < HEADER_SIZE {
                break;
            }

            let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;
            if length < HEADER_SIZE {
                return Err(JdwpError::Protocol(format!(
                    "Invalid packet length: {}",
                    length
                )));
            }
            if length > MAX_PACKET_SIZE {
                return Err(JdwpError::Protocol(format!(
                    "Packet too large: {} bytes (max: {} bytes)",
                    length, MAX_PACKET_SIZE
                )));
            }
            if self.buf.len() < length {
                break;
            }

            let mut packet = self.buf.split_to(length);
            packet.advance(4); // length, already consumed
            let id = packet.get_u32();
            let flags = packet.get_u8();

            if flags & REPLY_FLAG != 0 {
                let error_code = packet.get_u16();
                packets.push(IncomingPacket::Reply(ReplyPacket {
                    id,
                    error_code,
                    data: packet.to_vec(),
                }));
            } else {
                let command_set = packet.get_u8();
                let command = packet.get_u8();
                packets.push(IncomingPacket::Command(CommandPacket {
                    id,
                    command_set,
                    command,
                    data: packet.to_vec(),
                }));
            }
        }

        Ok(packets)
    }
}

pub fn error_name(error_code: u16) -> &'static str {
    match error_code {
        0 => "NONE",
        10 => "INVALID_THREAD",
        11 => "INVALID_THREAD_GROUP",
        12 => "INVALID_PRIORITY",
        13 => "THREAD_NOT_SUSPENDED",
        14 => "THREAD_SUSPENDED",
        20 => "INVALID_OBJECT",
        21 => "INVALID_CLASS",
        22 => "CLASS_NOT_PREPARED",
        23 => "INVALID_METHODID",
        24 => "INVALID_LOCATION",
        25 => "INVALID_FIELDID",
        30 => "INVALID_FRAMEID",
        31 => "NO_MORE_FRAMES",
        32 => "OPAQUE_FRAME",
        33 => "NOT_CURRENT_FRAME",
        34 => "TYPE_MISMATCH",
        35 => "INVALID_SLOT",
        40 => "DUPLICATE",
        41 => "NOT_FOUND",
        50 => "INVALID_MONITOR",
        51 => "NOT_MONITOR_OWNER",
        52 => "INTERRUPT",
        60 => "INVALID_CLASS_FORMAT",
        61 => "CIRCULAR_CLASS_DEFINITION",
        62 => "FAILS_VERIFICATION",
        63 => "ADD_METHOD_NOT_IMPLEMENTED",
        64 => "SCHEMA_CHANGE_NOT_IMPLEMENTED",
        65 => "INVALID_TYPESTATE",
        66 => "HIERARCHY_CHANGE_NOT_IMPLEMENTED",
        67 => "DELETE_METHOD_NOT_IMPLEMENTED",
        68 => "UNSUPPORTED_VERSION",
        69 => "NAMES_DONT_MATCH",
        70 => "CLASS_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
        71 => "METHOD_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
        99 => "NOT_IMPLEMENTED",
        100 => "NULL_POINTER",
        101 => "ABSENT_INFORMATION",
        102 => "INVALID_EVENT_TYPE",
        103 => "ILLEGAL_ARGUMENT",
        110 => "OUT_OF_MEMORY",
        111 => "ACCESS_DENIED",
        112 => "VM_DEAD",
        113 => "INTERNAL",
        115 => "UNATTACHED_THREAD",
        500 => "INVALID_TAG",
        502 => "ALREADY_INVOKING",
        503 => "INVALID_INDEX",
        504 => "INVALID_LENGTH",
        506 => "INVALID_STRING",
        507 => "INVALID_CLASS_LOADER",
        508 => "INVALID_ARRAY",
        509 => "TRANSPORT_LOAD",
        510 => "TRANSPORT_INIT",
        511 => "NATIVE_METHOD",
        512 => "INVALID_COUNT",
        _ => "UNKNOWN_ERROR",
    }
}
