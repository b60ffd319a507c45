// StackFrame command set (16)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, stack_frame_commands};
use crate::protocol::{Command, JdwpError, JdwpResult, ReplyPacket};
use crate::types::{FrameId, IdSizes, ThreadId, Value};
use crate::values::read_tagged_value;

/// Fetch one local slot. Like field retrieval, slots are read one per
/// command.
pub fn get_values(
    thread_id: ThreadId,
    frame_id: FrameId,
    slot: i32,
    sig_byte: u8,
    sizes: &IdSizes,
) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(thread_id, sizes.object_id);
    w.put_id(frame_id, sizes.frame_id);
    w.put_i32(1);
    w.put_i32(slot);
    w.put_u8(sig_byte);
    Command {
        command_set: command_sets::STACK_FRAME,
        command: stack_frame_commands::GET_VALUES,
        data: w.into_vec(),
    }
}

pub fn get_values_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<Value> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    if count != 1 {
        return Err(JdwpError::Decode(format!(
            "Expected a single value, got {}",
            count
        )));
    }
    read_tagged_value(&mut r, sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tags;

    #[test]
    fn get_values_round_trip() {
        let sizes = IdSizes::default();
        let cmd = get_values(1, 2, 3, b'L', &sizes);
        let mut r = PacketReader::new(&cmd.data);
        assert_eq!(r.get_id(sizes.object_id).unwrap(), 1);
        assert_eq!(r.get_id(sizes.frame_id).unwrap(), 2);
        assert_eq!(r.get_i32().unwrap(), 1);
        assert_eq!(r.get_i32().unwrap(), 3);
        assert_eq!(r.get_u8().unwrap(), b'L');

        let mut w = PacketWriter::new();
        w.put_i32(1);
        w.put_u8(tags::OBJECT);
        w.put_id(0x77, sizes.object_id);
        let reply = ReplyPacket {
            id: 1,
            error_code: 0,
            data: w.into_vec(),
        };
        let value = get_values_reply(&reply, &sizes).unwrap();
        assert_eq!(value.object_id(), Some(0x77));
    }
}
