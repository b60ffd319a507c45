// ReferenceType command set (2)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, reference_type_commands};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{FieldId, FieldInfo, IdSizes, MethodInfo, ReferenceTypeId, Value};
use crate::values::read_tagged_value;

pub fn signature(ref_type_id: ReferenceTypeId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    Command {
        command_set: command_sets::REFERENCE_TYPE,
        command: reference_type_commands::SIGNATURE,
        data: w.into_vec(),
    }
}

pub fn signature_reply(reply: &ReplyPacket) -> JdwpResult<String> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    r.get_string()
}

pub fn methods(ref_type_id: ReferenceTypeId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    Command {
        command_set: command_sets::REFERENCE_TYPE,
        command: reference_type_commands::METHODS,
        data: w.into_vec(),
    }
}

pub fn methods_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<Vec<MethodInfo>> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        methods.push(MethodInfo {
            method_id: r.get_id(sizes.method_id)?,
            name: r.get_string()?,
            signature: r.get_string()?,
            mod_bits: r.get_i32()?,
        });
    }
    Ok(methods)
}

pub fn fields(ref_type_id: ReferenceTypeId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    Command {
        command_set: command_sets::REFERENCE_TYPE,
        command: reference_type_commands::FIELDS,
        data: w.into_vec(),
    }
}

pub fn fields_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<Vec<FieldInfo>> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        fields.push(FieldInfo {
            field_id: r.get_id(sizes.field_id)?,
            name: r.get_string()?,
            signature: r.get_string()?,
            mod_bits: r.get_i32()?,
        });
    }
    Ok(fields)
}

/// Static field values. Callers pass a single field per command; batched
/// retrieval against the Oracle JVM is unreliable (only the first entry of a
/// batch comes back populated).
pub fn get_values(ref_type_id: ReferenceTypeId, field_id: FieldId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    w.put_i32(1);
    w.put_id(field_id, sizes.field_id);
    Command {
        command_set: command_sets::REFERENCE_TYPE,
        command: reference_type_commands::GET_VALUES,
        data: w.into_vec(),
    }
}

pub fn get_values_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<Value> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    if count != 1 {
        return Err(crate::protocol::JdwpError::Decode(format!(
            "Expected a single value, got {}",
            count
        )));
    }
    read_tagged_value(&mut r, sizes)
}
