// EventRequest command set (15)
//
// Encoders for Set with the modifier combinations this debugger uses, plus
// Clear. The request lifecycle itself lives in requests.rs.

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, event_request_commands, modifier_kinds};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{IdSizes, Location, ThreadId};

/// Which threads pause when a request fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    EventThread = 1,
    All = 2,
}

/// Breakpoint pinned to one exact location.
pub fn set_breakpoint(location: &Location, policy: SuspendPolicy, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_u8(crate::commands::event_kinds::BREAKPOINT);
    w.put_u8(policy as u8);
    w.put_i32(1);
    w.put_u8(modifier_kinds::LOCATION_ONLY);
    put_location(&mut w, location, sizes);
    Command {
        command_set: command_sets::EVENT_REQUEST,
        command: event_request_commands::SET,
        data: w.into_vec(),
    }
}

/// One-shot step scoped to a thread; the count filter makes it fire exactly
/// once even if the thread is released by unrelated resumes first.
pub fn set_step(
    thread_id: ThreadId,
    size: i32,
    depth: i32,
    policy: SuspendPolicy,
    sizes: &IdSizes,
) -> Command {
    let mut w = PacketWriter::new();
    w.put_u8(crate::commands::event_kinds::SINGLE_STEP);
    w.put_u8(policy as u8);
    w.put_i32(2);
    w.put_u8(modifier_kinds::STEP);
    w.put_id(thread_id, sizes.object_id);
    w.put_i32(size);
    w.put_i32(depth);
    w.put_u8(modifier_kinds::COUNT);
    w.put_i32(1);
    Command {
        command_set: command_sets::EVENT_REQUEST,
        command: event_request_commands::SET,
        data: w.into_vec(),
    }
}

/// One-shot class-prepare watch filtered by a class-name glob. VM-wide
/// suspension so mapping tables can be updated before anything runs on.
pub fn set_class_prepare(class_pattern: &str, policy: SuspendPolicy) -> Command {
    let mut w = PacketWriter::new();
    w.put_u8(crate::commands::event_kinds::CLASS_PREPARE);
    w.put_u8(policy as u8);
    w.put_i32(2);
    w.put_u8(modifier_kinds::CLASS_MATCH);
    w.put_string(class_pattern);
    w.put_u8(modifier_kinds::COUNT);
    w.put_i32(1);
    Command {
        command_set: command_sets::EVENT_REQUEST,
        command: event_request_commands::SET,
        data: w.into_vec(),
    }
}

pub fn set_reply(reply: &ReplyPacket) -> JdwpResult<i32> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    r.get_i32()
}

pub fn clear(event_kind: u8, request_id: i32) -> Command {
    let mut w = PacketWriter::new();
    w.put_u8(event_kind);
    w.put_i32(request_id);
    Command {
        command_set: command_sets::EVENT_REQUEST,
        command: event_request_commands::CLEAR,
        data: w.into_vec(),
    }
}

pub fn clear_reply(reply: &ReplyPacket) -> JdwpResult<()> {
    reply.check_error()
}

fn put_location(w: &mut PacketWriter, location: &Location, sizes: &IdSizes) {
    w.put_u8(location.type_tag);
    w.put_id(location.class_id, sizes.reference_type_id);
    w.put_id(location.method_id, sizes.method_id);
    w.put_u64(location.index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{event_kinds, step_depths, step_sizes};

    #[test]
    fn breakpoint_request_layout() {
        let sizes = IdSizes::default();
        let location = Location {
            type_tag: 1,
            class_id: 0x10,
            method_id: 0x20,
            index: 5,
        };
        let cmd = set_breakpoint(&location, SuspendPolicy::EventThread, &sizes);

        let mut r = PacketReader::new(&cmd.data);
        assert_eq!(r.get_u8().unwrap(), event_kinds::BREAKPOINT);
        assert_eq!(r.get_u8().unwrap(), SuspendPolicy::EventThread as u8);
        assert_eq!(r.get_i32().unwrap(), 1);
        assert_eq!(r.get_u8().unwrap(), modifier_kinds::LOCATION_ONLY);
        assert_eq!(r.get_u8().unwrap(), 1);
        assert_eq!(r.get_id(sizes.reference_type_id).unwrap(), 0x10);
        assert_eq!(r.get_id(sizes.method_id).unwrap(), 0x20);
        assert_eq!(r.get_u64().unwrap(), 5);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn step_request_has_count_filter() {
        let sizes = IdSizes::default();
        let cmd = set_step(
            0x66,
            step_sizes::LINE,
            step_depths::OVER,
            SuspendPolicy::EventThread,
            &sizes,
        );

        let mut r = PacketReader::new(&cmd.data);
        assert_eq!(r.get_u8().unwrap(), event_kinds::SINGLE_STEP);
        assert_eq!(r.get_u8().unwrap(), 1);
        assert_eq!(r.get_i32().unwrap(), 2); // step + count modifiers
        assert_eq!(r.get_u8().unwrap(), modifier_kinds::STEP);
        assert_eq!(r.get_id(sizes.object_id).unwrap(), 0x66);
        assert_eq!(r.get_i32().unwrap(), step_sizes::LINE);
        assert_eq!(r.get_i32().unwrap(), step_depths::OVER);
        assert_eq!(r.get_u8().unwrap(), modifier_kinds::COUNT);
        assert_eq!(r.get_i32().unwrap(), 1);
    }

    #[test]
    fn class_prepare_request_is_vm_wide_one_shot() {
        let cmd = set_class_prepare("$Oracle.Procedure.SCOTT.HELLO", SuspendPolicy::All);
        let mut r = PacketReader::new(&cmd.data);
        assert_eq!(r.get_u8().unwrap(), event_kinds::CLASS_PREPARE);
        assert_eq!(r.get_u8().unwrap(), SuspendPolicy::All as u8);
        assert_eq!(r.get_i32().unwrap(), 2);
        assert_eq!(r.get_u8().unwrap(), modifier_kinds::CLASS_MATCH);
        assert_eq!(r.get_string().unwrap(), "$Oracle.Procedure.SCOTT.HELLO");
        assert_eq!(r.get_u8().unwrap(), modifier_kinds::COUNT);
        assert_eq!(r.get_i32().unwrap(), 1);
    }
}
