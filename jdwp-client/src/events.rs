// Composite event sets sent by the VM (command set 64, command 100)

use crate::commands::event_kinds;
use crate::codec::PacketReader;
use crate::protocol::JdwpResult;
use crate::types::{IdSizes, Location, ReferenceTypeId, ThreadId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One composite packet; every contained event shares the suspend policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

impl EventSet {
    /// The synthetic set emitted when the connection dies, so consumers see
    /// a vm-death regardless of how the socket went away.
    pub fn synthetic_vm_death() -> Self {
        Self {
            suspend_policy: 0,
            events: vec![Event {
                kind: event_kinds::VM_DEATH,
                request_id: 0,
                details: EventKind::VmDeath,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VmStart {
        thread: ThreadId,
    },
    VmDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type_tag: u8,
        ref_type: ReferenceTypeId,
        signature: String,
        status: i32,
    },
    ClassUnload {
        signature: String,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    Step {
        thread: ThreadId,
        location: Location,
    },
}

/// Parse the payload of a composite event packet. Unknown event kinds have
/// an unknowable payload length, so parsing of the set stops there.
pub fn parse_event_set(data: &[u8], sizes: &IdSizes) -> JdwpResult<EventSet> {
    let mut r = PacketReader::new(data);

    let suspend_policy = r.get_u8()?;
    let count = r.get_i32()?;
    let mut events = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let kind = r.get_u8()?;
        let request_id = r.get_i32()?;

        let details = match kind {
            event_kinds::BREAKPOINT => EventKind::Breakpoint {
                thread: r.get_id(sizes.object_id)?,
                location: read_location(&mut r, sizes)?,
            },
            event_kinds::SINGLE_STEP => EventKind::Step {
                thread: r.get_id(sizes.object_id)?,
                location: read_location(&mut r, sizes)?,
            },
            event_kinds::CLASS_PREPARE => EventKind::ClassPrepare {
                thread: r.get_id(sizes.object_id)?,
                ref_type_tag: r.get_u8()?,
                ref_type: r.get_id(sizes.reference_type_id)?,
                signature: r.get_string()?,
                status: r.get_i32()?,
            },
            event_kinds::CLASS_UNLOAD => EventKind::ClassUnload {
                signature: r.get_string()?,
            },
            event_kinds::VM_START => EventKind::VmStart {
                thread: r.get_id(sizes.object_id)?,
            },
            event_kinds::VM_DEATH => EventKind::VmDeath,
            event_kinds::THREAD_START => EventKind::ThreadStart {
                thread: r.get_id(sizes.object_id)?,
            },
            event_kinds::THREAD_DEATH => EventKind::ThreadDeath {
                thread: r.get_id(sizes.object_id)?,
            },
            other => {
                warn!("Unsupported event kind {}, dropping rest of set", other);
                break;
            }
        };

        events.push(Event {
            kind,
            request_id,
            details,
        });
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}

fn read_location(r: &mut PacketReader<'_>, sizes: &IdSizes) -> JdwpResult<Location> {
    Ok(Location {
        type_tag: r.get_u8()?,
        class_id: r.get_id(sizes.reference_type_id)?,
        method_id: r.get_id(sizes.method_id)?,
        index: r.get_u64()?,
    })
}
