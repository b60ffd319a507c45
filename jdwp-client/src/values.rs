// Tagged/untagged value encoding shared by the catalog modules

use crate::codec::{PacketReader, PacketWriter};
use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{tags, IdSizes, Value, ValueData};

/// Read a tag byte followed by the value it announces. Reference-typed tags
/// carry an object id of the negotiated width.
pub fn read_tagged_value(r: &mut PacketReader<'_>, sizes: &IdSizes) -> JdwpResult<Value> {
    let tag = r.get_u8()?;
    let data = match tag {
        tags::BYTE => ValueData::Byte(r.get_u8()? as i8),
        tags::CHAR => ValueData::Char(r.get_u16()?),
        tags::FLOAT => ValueData::Float(f32::from_bits(r.get_u32()?)),
        tags::DOUBLE => ValueData::Double(f64::from_bits(r.get_u64()?)),
        tags::INT => ValueData::Int(r.get_i32()?),
        tags::LONG => ValueData::Long(r.get_i64()?),
        tags::SHORT => ValueData::Short(r.get_u16()? as i16),
        tags::BOOLEAN => ValueData::Boolean(r.get_u8()? != 0),
        tags::VOID => ValueData::Void,
        tags::OBJECT
        | tags::STRING
        | tags::THREAD
        | tags::THREAD_GROUP
        | tags::CLASS_LOADER
        | tags::CLASS_OBJECT
        | tags::ARRAY => ValueData::Object(r.get_id(sizes.object_id)?),
        _ => return Err(JdwpError::Decode(format!("Unknown value tag: {}", tag))),
    };
    Ok(Value { tag, data })
}

/// Write tag byte plus value (the composite-event and reply layout).
pub fn write_tagged_value(w: &mut PacketWriter, value: &Value, sizes: &IdSizes) {
    w.put_u8(value.tag);
    write_untagged_value(w, value, sizes);
}

/// Write just the value bytes; used where the peer already knows the type
/// from a field or slot signature (SetValues).
pub fn write_untagged_value(w: &mut PacketWriter, value: &Value, sizes: &IdSizes) {
    match value.data {
        ValueData::Byte(v) => w.put_u8(v as u8),
        ValueData::Char(v) => w.put_u16(v),
        ValueData::Float(v) => w.put_u32(v.to_bits()),
        ValueData::Double(v) => w.put_u64(v.to_bits()),
        ValueData::Int(v) => w.put_i32(v),
        ValueData::Long(v) => w.put_u64(v as u64),
        ValueData::Short(v) => w.put_u16(v as u16),
        ValueData::Boolean(v) => w.put_u8(v as u8),
        ValueData::Object(id) => w.put_id(id, sizes.object_id),
        ValueData::Void => {}
    }
}
