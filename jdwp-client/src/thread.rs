// ThreadReference command set (11)

use crate::codec::{PacketReader, PacketWriter};
use crate::commands::{command_sets, thread_commands};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{FrameInfo, IdSizes, Location, ThreadId};

pub fn frames(thread_id: ThreadId, start_frame: i32, length: i32, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(thread_id, sizes.object_id);
    w.put_i32(start_frame); // 0 = topmost
    w.put_i32(length); // -1 = all frames
    Command {
        command_set: command_sets::THREAD_REFERENCE,
        command: thread_commands::FRAMES,
        data: w.into_vec(),
    }
}

pub fn frames_reply(reply: &ReplyPacket, sizes: &IdSizes) -> JdwpResult<Vec<FrameInfo>> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());

    let count = r.get_i32()?;
    let mut frames = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let frame_id = r.get_id(sizes.frame_id)?;
        let type_tag = r.get_u8()?;
        let class_id = r.get_id(sizes.reference_type_id)?;
        let method_id = r.get_id(sizes.method_id)?;
        let index = r.get_u64()?;
        frames.push(FrameInfo {
            frame_id,
            location: Location {
                type_tag,
                class_id,
                method_id,
                index,
            },
        });
    }
    Ok(frames)
}

pub fn suspend(thread_id: ThreadId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(thread_id, sizes.object_id);
    Command {
        command_set: command_sets::THREAD_REFERENCE,
        command: thread_commands::SUSPEND,
        data: w.into_vec(),
    }
}

pub fn resume(thread_id: ThreadId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(thread_id, sizes.object_id);
    Command {
        command_set: command_sets::THREAD_REFERENCE,
        command: thread_commands::RESUME,
        data: w.into_vec(),
    }
}

pub fn suspend_count(thread_id: ThreadId, sizes: &IdSizes) -> Command {
    let mut w = PacketWriter::new();
    w.put_id(thread_id, sizes.object_id);
    Command {
        command_set: command_sets::THREAD_REFERENCE,
        command: thread_commands::SUSPEND_COUNT,
        data: w.into_vec(),
    }
}

pub fn suspend_count_reply(reply: &ReplyPacket) -> JdwpResult<i32> {
    reply.check_error()?;
    let mut r = PacketReader::new(reply.data());
    r.get_i32()
}
