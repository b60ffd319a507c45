// StringReference command set (10)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, string_reference_commands};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{IdSizes, StringId};

pub fn value(string_id: StringId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(string_id, sizes.object_id);
    Command {
        command_set: command_sets::STRING_REFERENCE,
        command: string_reference_commands::VALUE,
        data: w.into_vec(),
    }
}

pub fn value_reply(reply: &ReplyPacket) -> JdwpResult<String> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    r.get_string()
}
