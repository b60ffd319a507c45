// Common types used across the JDWP protocol

use serde::{Deserialize, Serialize};

// All IDs are held as u64 in memory; the wire width is negotiated once per
// connection (VirtualMachine.IDSizes) and never reinterpreted afterwards.
pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type StringId = ObjectId;

pub type ReferenceTypeId = u64;
pub type ClassId = ReferenceTypeId;

pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// Byte widths for the opaque ID kinds, fixed per connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdSizes {
    pub field_id: usize,
    pub method_id: usize,
    pub object_id: usize,
    pub reference_type_id: usize,
    pub frame_id: usize,
}

impl Default for IdSizes {
    fn default() -> Self {
        // The JDWP reference implementation uses 8 bytes everywhere; the
        // negotiated values replace this right after the handshake.
        Self {
            field_id: 8,
            method_id: 8,
            object_id: 8,
            reference_type_id: 8,
            frame_id: 8,
        }
    }
}

/// VM capability flags (VirtualMachine.Capabilities).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_watch_field_modification: bool,
    pub can_watch_field_access: bool,
    pub can_get_bytecodes: bool,
    pub can_get_synthetic_attribute: bool,
    pub can_get_owned_monitor_info: bool,
    pub can_get_current_contended_monitor: bool,
    pub can_get_monitor_info: bool,
}

/// A code position inside a loaded class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8, // 1=class, 2=interface, 3=array
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64, // bytecode index
}

// Value type tags ('B', 'I', 's', ...)
pub mod tags {
    pub const ARRAY: u8 = 91;
    pub const BYTE: u8 = 66;
    pub const CHAR: u8 = 67;
    pub const OBJECT: u8 = 76;
    pub const FLOAT: u8 = 70;
    pub const DOUBLE: u8 = 68;
    pub const INT: u8 = 73;
    pub const LONG: u8 = 74;
    pub const SHORT: u8 = 83;
    pub const VOID: u8 = 86;
    pub const BOOLEAN: u8 = 90;
    pub const STRING: u8 = 115;
    pub const THREAD: u8 = 116;
    pub const THREAD_GROUP: u8 = 103;
    pub const CLASS_LOADER: u8 = 108;
    pub const CLASS_OBJECT: u8 = 99;
}

/// Tagged value as carried in replies and SetValues requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub tag: u8,
    pub data: ValueData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Object(ObjectId),
    Void,
}

impl Value {
    pub fn object(tag: u8, id: ObjectId) -> Self {
        Self {
            tag,
            data: ValueData::Object(id),
        }
    }

    /// The object id behind a reference-typed value, if it is one and is not
    /// null.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.data {
            ValueData::Object(0) => None,
            ValueData::Object(id) => Some(id),
            _ => None,
        }
    }

    pub fn format(&self) -> String {
        match &self.data {
            ValueData::Byte(v) => format!("{}", v),
            ValueData::Char(v) => format!("'{}'", char::from_u32(*v as u32).unwrap_or('?')),
            ValueData::Float(v) => format!("{}", v),
            ValueData::Double(v) => format!("{}", v),
            ValueData::Int(v) => format!("{}", v),
            ValueData::Long(v) => format!("{}", v),
            ValueData::Short(v) => format!("{}", v),
            ValueData::Boolean(v) => format!("{}", v),
            ValueData::Object(0) => "null".to_string(),
            ValueData::Object(id) => format!("@{:x}", id),
            ValueData::Void => "void".to_string(),
        }
    }
}

/// One method of a reference type (ReferenceType.Methods).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

/// One field of a reference type (ReferenceType.Fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_id: FieldId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

/// Class information from ClassesBySignature / ClassPrepare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

/// Line table entry - maps a compiled line number to a bytecode index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineTableEntry {
    pub line_code_index: u64,
    pub line_number: i32,
}

/// Complete line table for a method (Method.LineTable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTable {
    pub start: u64,
    pub end: u64,
    pub lines: Vec<LineTableEntry>,
}

/// Local variable slot info (Method.VariableTable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    pub length: u32,
    pub slot: u32,
}

/// Stack frame information (ThreadReference.Frames).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub location: Location,
}
