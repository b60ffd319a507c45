// Event request lifecycle: create -> enable -> fire(s) -> clear
//
// Builds the three request kinds this debugger needs and owns the registry
// used to route incoming events: events for cleared requests are suppressed
// (a deleted request must never fire again), count-filtered requests retire
// after their single delivery.

use crate::commands::event_kinds;
use crate::events::{Event, EventKind, EventSet};
use crate::eventrequest::{self, SuspendPolicy};
use crate::mirror::VmMirror;
use crate::protocol::{Command, JdwpError, JdwpResult};
use crate::types::{Location, ThreadId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A request that has been created but not necessarily enabled yet. Enabling
/// sends it to the VM and assigns the request id.
#[derive(Debug)]
pub struct EventRequest {
    kind: u8,
    command: Command,
    one_shot: bool,
    request_id: Option<i32>,
}

impl EventRequest {
    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn request_id(&self) -> Option<i32> {
        self.request_id
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    kind: u8,
    one_shot: bool,
}

#[derive(Debug)]
pub struct EventRequestManager {
    vm: Arc<VmMirror>,
    registry: Mutex<HashMap<i32, RequestRecord>>,
}

impl EventRequestManager {
    pub fn new(vm: Arc<VmMirror>) -> Self {
        Self {
            vm,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Breakpoint pinned to one exact location; suspends only the event
    /// thread so inspection can run while the rest of the VM continues.
    pub fn create_breakpoint(&self, location: &Location) -> EventRequest {
        EventRequest {
            kind: event_kinds::BREAKPOINT,
            command: eventrequest::set_breakpoint(
                location,
                SuspendPolicy::EventThread,
                self.vm.id_sizes(),
            ),
            one_shot: false,
            request_id: None,
        }
    }

    /// One-shot step scoped to a thread. The count filter (not the resume
    /// drain) guarantees it fires exactly once.
    pub fn create_step(&self, thread_id: ThreadId, size: i32, depth: i32) -> EventRequest {
        EventRequest {
            kind: event_kinds::SINGLE_STEP,
            command: eventrequest::set_step(
                thread_id,
                size,
                depth,
                SuspendPolicy::EventThread,
                self.vm.id_sizes(),
            ),
            one_shot: true,
            request_id: None,
        }
    }

    /// One-shot class-prepare watch. VM-wide suspension so mapping tables
    /// can be mutated before the debuggee runs on.
    pub fn create_class_prepare(&self, class_pattern: &str) -> EventRequest {
        EventRequest {
            kind: event_kinds::CLASS_PREPARE,
            command: eventrequest::set_class_prepare(class_pattern, SuspendPolicy::All),
            one_shot: true,
            request_id: None,
        }
    }

    /// Send the request to the VM and register it for dispatch.
    pub async fn enable(&self, request: &mut EventRequest) -> JdwpResult<i32> {
        if let Some(id) = request.request_id {
            return Ok(id);
        }

        let reply = self.vm.send(request.command.clone()).await?;
        let request_id = eventrequest::set_reply(&reply)?;
        request.request_id = Some(request_id);

        let mut registry = self.registry.lock().await;
        registry.insert(
            request_id,
            RequestRecord {
                kind: request.kind,
                one_shot: request.one_shot,
            },
        );
        debug!("Enabled request id={} kind={}", request_id, request.kind);
        Ok(request_id)
    }

    /// Deactivate a request; it must not fire again afterward.
    pub async fn clear(&self, kind: u8, request_id: i32) -> JdwpResult<()> {
        {
            let mut registry = self.registry.lock().await;
            registry.remove(&request_id);
        }

        let reply = self.vm.send(eventrequest::clear(kind, request_id)).await?;
        match eventrequest::clear_reply(&reply) {
            Ok(()) => Ok(()),
            // The VM may have retired a one-shot on its own already
            Err(JdwpError::JdwpErrorCode(_, "NOT_FOUND" | "INVALID_EVENT_TYPE")) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Next event set with registry filtering applied. Events carrying a
    /// request id we no longer know are dropped; if that empties a set that
    /// suspended the VM, the suspension is released so the debuggee cannot
    /// hang on a stale request.
    pub async fn next_event_set(&self) -> Option<EventSet> {
        loop {
            let mut set = self.vm.recv_event_set().await?;
            let mut suppressed = Vec::new();

            {
                let mut registry = self.registry.lock().await;
                set.events.retain(|event| {
                    let requested = matches!(
                        event.kind,
                        event_kinds::BREAKPOINT
                            | event_kinds::SINGLE_STEP
                            | event_kinds::CLASS_PREPARE
                    );
                    if !requested {
                        return true;
                    }
                    match registry.get(&event.request_id) {
                        Some(record) => {
                            if record.one_shot {
                                registry.remove(&event.request_id);
                            }
                            true
                        }
                        None => {
                            warn!(
                                "Suppressing event for cleared request id={}",
                                event.request_id
                            );
                            suppressed.push(event.clone());
                            false
                        }
                    }
                });
            }

            if set.events.is_empty() {
                if set.suspend_policy != SuspendPolicy::None as u8 {
                    if let Err(e) = self
                        .release_suppressed(set.suspend_policy, &suppressed)
                        .await
                    {
                        warn!("Failed to release suppressed event set: {}", e);
                    }
                }
                continue;
            }

            return Some(set);
        }
    }

    async fn release_suppressed(&self, suspend_policy: u8, events: &[Event]) -> JdwpResult<()> {
        if suspend_policy == SuspendPolicy::EventThread as u8 {
            for event in events {
                if let EventKind::Breakpoint { thread, .. } | EventKind::Step { thread, .. } =
                    &event.details
                {
                    self.vm.thread_resume(*thread).await?;
                }
            }
            Ok(())
        } else {
            self.vm.resume().await
        }
    }
}
