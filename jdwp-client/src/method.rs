// Method command set (6)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, method_commands};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{IdSizes, LineTable, LineTableEntry, MethodId, ReferenceTypeId, Variable};

pub fn line_table(ref_type_id: ReferenceTypeId, method_id: MethodId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    w.put_id(method_id, sizes.method_id);
    Command {
        command_set: command_sets::METHOD,
        command: method_commands::LINE_TABLE,
        data: w.into_vec(),
    }
}

pub fn line_table_reply(reply: &ReplyPacket) -> JdwpResult<LineTable> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let start = r.get_u64()?;
    let end = r.get_u64()?;
    let count = r.get_i32()?;
    let mut lines = Vec::with_capacity(count as usize);
    for _ in 0..count {
        lines.push(LineTableEntry {
            line_code_index: r.get_u64()?,
            line_number: r.get_i32()?,
        });
    }
    Ok(LineTable { start, end, lines })
}

pub fn variable_table(
    ref_type_id: ReferenceTypeId,
    method_id: MethodId,
    sizes: &IdSizes,
) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(ref_type_id, sizes.reference_type_id);
    w.put_id(method_id, sizes.method_id);
    Command {
        command_set: command_sets::METHOD,
        command: method_commands::VARIABLE_TABLE,
        data: w.into_vec(),
    }
}

pub fn variable_table_reply(reply: &ReplyPacket) -> JdwpResult<Vec<Variable>> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let _arg_count = r.get_i32()?;
    let count = r.get_i32()?;
    let mut variables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        variables.push(Variable {
            code_index: r.get_u64()?,
            name: r.get_string()?,
            signature: r.get_string()?,
            length: r.get_u32()?,
            slot: r.get_u32()?,
        });
    }
    Ok(variables)
}
