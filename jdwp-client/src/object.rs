// ObjectReference command set (9)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, object_reference_commands};
use crate::protocol::{Command, JdwpError, JdwpResult, ReplyPacket};
use crate::types::{FieldId, IdSizes, ObjectId, ReferenceTypeId, Value};
use crate::values::{read_tagged_value, write_untagged_value};

pub fn reference_type(object_id: ObjectId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(object_id, sizes.object_id);
    Command {
        command_set: command_sets::OBJECT_REFERENCE,
        command: object_reference_commands::REFERENCE_TYPE,
        data: w.into_vec(),
    }
}

pub fn reference_type_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<ReferenceTypeId> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    let _type_tag = r.get_u8()?;
    r.get_id(sizes.reference_type_id)
}

/// Instance field value, one field per command (see reftype::get_values for
/// why batching is avoided).
pub fn get_values(object_id: ObjectId, field_id: FieldId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(object_id, sizes.object_id);
    w.put_i32(1);
    w.put_id(field_id, sizes.field_id);
    Command {
        command_set: command_sets::OBJECT_REFERENCE,
        command: object_reference_commands::GET_VALUES,
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

/// Replace one field. The value is written untagged; the VM knows the type
/// from the field signature.
pub fn set_values(
    object_id: ObjectId,
    field_id: FieldId,
    value: &Value,
    sizes: &IdSizes,
) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(object_id, sizes.object_id);
    w.put_i32(1);
    w.put_id(field_id, sizes.field_id);
    write_untagged_value(&mut w, value, sizes);
    Command {
        command_set: command_sets::OBJECT_REFERENCE,
        command: object_reference_commands::SET_VALUES,
        data: w.into_vec(),
    }
}

pub fn set_values_reply(reply: &ReplyPacket) -> JdwpResult<()> {
    reply.check_error()
}
