// Binary read/write primitives for JDWP payloads
//
// All multi-byte integers are big-endian. Opaque IDs are written with the
// width negotiated after the handshake (VirtualMachine.IDSizes), supplied by
// the caller per call.

use crate::protocol::{JdwpError, JdwpResult};
use bytes::{BufMut, BytesMut};

/// Growable payload writer.
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    /// Write an opaque ID using the negotiated width in bytes (1..=8),
    /// big-endian, most significant bytes dropped.
    pub fn put_id(&mut self, id: u64, width: usize) {
        debug_assert!((1..=8).contains(&width));
        let bytes = id.to_be_bytes();
        self.buf.put_slice(&bytes[8 - width..]);
    }

    /// Write a length-prefixed UTF-8 string (4-byte length + bytes).
    pub fn put_string(&mut self, s: &str) {
        self.buf.put_u32(s.len() as u32);
        self.buf.put_slice(s.as_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds-checked payload reader. Reading past the declared payload length
/// fails with a decode error; the buffer never resizes on read.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize, what: &str) -> JdwpResult<&'a [u8]> {
        if self.buf.len() < n {
            return Err(JdwpError::Decode(format!(
                "Not enough data for {}: expected {}, got {}",
                what,
                n,
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    pub fn get_u8(&mut self) -> JdwpResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn get_u16(&mut self) -> JdwpResult<u16> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> JdwpResult<u32> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_i32(&mut self) -> JdwpResult<i32> {
        Ok(self.get_u32()? as i32)
    }

    pub fn get_u64(&mut self) -> JdwpResult<u64> {
        let b = self.take(8, "u64")?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn get_i64(&mut self) -> JdwpResult<i64> {
        Ok(self.get_u64()? as i64)
    }

    /// Read an opaque ID of the negotiated width, zero-extended to u64.
    pub fn get_id(&mut self, width: usize) -> JdwpResult<u64> {
        debug_assert!((1..=8).contains(&width));
        let b = self.take(width, "id")?;
        let mut bytes = [0u8; 8];
        bytes[8 - width..].copy_from_slice(b);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> JdwpResult<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| JdwpError::Decode(format!("Invalid UTF-8 in string: {}", e)))
    }

    pub fn get_bytes(&mut self, n: usize) -> JdwpResult<&'a [u8]> {
        self.take(n, "bytes")
    }
}
