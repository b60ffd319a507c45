// JDWP command-set and command constants
//
// Only the subset this debugger issues is listed; the command sets are:
// 1 = VirtualMachine
// 2 = ReferenceType
// 6 = Method
// 9 = ObjectReference
// 10 = StringReference
// 11 = ThreadReference
// 15 = EventRequest
// 16 = StackFrame
// 64 = Event (composite event sets sent by the VM)

pub mod command_sets {
    pub const VIRTUAL_MACHINE: u8 = 1;
    pub const REFERENCE_TYPE: u8 = 2;
    pub const METHOD: u8 = 6;
    pub const OBJECT_REFERENCE: u8 = 9;
    pub const STRING_REFERENCE: u8 = 10;
    pub const THREAD_REFERENCE: u8 = 11;
    pub const EVENT_REQUEST: u8 = 15;
    pub const STACK_FRAME: u8 = 16;
    pub const EVENT: u8 = 64;
}

pub mod vm_commands {
    pub const CLASSES_BY_SIGNATURE: u8 = 2;
    pub const DISPOSE: u8 = 6;
    pub const ID_SIZES: u8 = 7;
    pub const SUSPEND: u8 = 8;
    pub const RESUME: u8 = 9;
    pub const CREATE_STRING: u8 = 11;
    pub const CAPABILITIES: u8 = 12;
}

pub mod reference_type_commands {
    pub const SIGNATURE: u8 = 1;
    pub const FIELDS: u8 = 4;
    pub const METHODS: u8 = 5;
    pub const GET_VALUES: u8 = 6;
}

pub mod method_commands {
    pub const LINE_TABLE: u8 = 1;
    pub const VARIABLE_TABLE: u8 = 2;
}

pub mod object_reference_commands {
    pub const REFERENCE_TYPE: u8 = 1;
    pub const GET_VALUES: u8 = 2;
    pub const SET_VALUES: u8 = 3;
}

pub mod string_reference_commands {
    pub const VALUE: u8 = 1;
}

pub mod thread_commands {
    pub const SUSPEND: u8 = 2;
    pub const RESUME: u8 = 3;
    pub const FRAMES: u8 = 6;
    pub const SUSPEND_COUNT: u8 = 12;
}

pub mod event_request_commands {
    pub const SET: u8 = 1;
    pub const CLEAR: u8 = 2;
}

pub mod stack_frame_commands {
    pub const GET_VALUES: u8 = 1;
}

pub mod event_commands {
    pub const COMPOSITE: u8 = 100;
}

pub mod event_kinds {
    pub const SINGLE_STEP: u8 = 1;
    pub const BREAKPOINT: u8 = 2;
    pub const CLASS_PREPARE: u8 = 8;
    pub const CLASS_UNLOAD: u8 = 9;
    pub const THREAD_START: u8 = 6;
    pub const THREAD_DEATH: u8 = 7;
    pub const VM_START: u8 = 90;
    pub const VM_DEATH: u8 = 99;
}

// Modifier kinds for EventRequest.Set
pub mod modifier_kinds {
    pub const COUNT: u8 = 1;
    pub const CLASS_MATCH: u8 = 5;
    pub const LOCATION_ONLY: u8 = 7;
    pub const STEP: u8 = 10;
}

pub mod step_sizes {
    pub const MIN: i32 = 0;
    pub const LINE: i32 = 1;
}

pub mod step_depths {
    pub const INTO: i32 = 0;
    pub const OVER: i32 = 1;
    pub const OUT: i32 = 2;
}
