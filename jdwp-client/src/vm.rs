// VirtualMachine command set (1)
//
// Stateless encoders and reply decoders; the connection assigns packet ids
// and the mirror drives the round trips.

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, vm_commands};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{Capabilities, ClassInfo, IdSizes, StringId};

pub fn id_sizes() -> Command {
    Command::new(command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES)
}

pub fn id_sizes_reply(reply: &ReplyPacket) -> JdwpResult<IdSizes> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    Ok(IdSizes {
        field_id: r.get_i32()? as usize,
        method_id: r.get_i32()? as usize,
        object_id: r.get_i32()? as usize,
        reference_type_id: r.get_i32()? as usize,
        frame_id: r.get_i32()? as usize,
    })
}

pub fn capabilities() -> Command {
    Command::new(command_sets::VIRTUAL_MACHINE, vm_commands::CAPABILITIES)
}

pub fn capabilities_reply(reply: &ReplyPacket) -> JdwpResult<Capabilities> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    Ok(Capabilities {
        can_watch_field_modification: r.get_u8()? != 0,
        can_watch_field_access: r.get_u8()? != 0,
        can_get_bytecodes: r.get_u8()? != 0,
        can_get_synthetic_attribute: r.get_u8()? != 0,
        can_get_owned_monitor_info: r.get_u8()? != 0,
        can_get_current_contended_monitor: r.get_u8()? != 0,
        can_get_monitor_info: r.get_u8()? != 0,
    })
}

pub fn classes_by_signature(signature: &str) -> Command {
    let mut w = PacketWriter::new();
    w.put_string(signature);
    Command {
        command_set: command_sets::VIRTUAL_MACHINE,
        command: vm_commands::CLASSES_BY_SIGNATURE,
        data: w.into_vec(),
    }
}

pub fn classes_by_signature_reply(
    reply: &ReplyPacket,
    sizes: &IdSizes,
    signature: &str,
) -> JdwpResult<Vec<ClassInfo>> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    let mut classes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let ref_type_tag = r.get_u8()?;
        let type_id = r.get_id(sizes.reference_type_id)?;
        let status = r.get_i32()?;
        classes.push(ClassInfo {
            ref_type_tag,
            type_id,
            signature: signature.to_string(),
            status,
        });
    }
    Ok(classes)
}

pub fn suspend() -> Command {
    Command::new(command_sets::VIRTUAL_MACHINE, vm_commands::SUSPEND)
}

pub fn resume() -> Command {
    Command::new(command_sets::VIRTUAL_MACHINE, vm_commands::RESUME)
}

pub fn dispose() -> Command {
    Command::new(command_sets::VIRTUAL_MACHINE, vm_commands::DISPOSE)
}

/// Allocate a new string in the target VM, needed to write scalar values.
pub fn create_string(value: &str) -> Command {
    let mut w = PacketWriter::new();
    w.put_string(value);
    Command {
        command_set: command_sets::VIRTUAL_MACHINE,
        command: vm_commands::CREATE_STRING,
        data: w.into_vec(),
    }
}

pub fn create_string_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<StringId> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    r.get_id(sizes.object_id)
}

/// Empty-bodied replies (Suspend, Resume, Dispose) still carry an error code.
pub fn void_reply(reply: &ReplyPacket) -> JdwpResult<()> {
    reply.check_error()
}
