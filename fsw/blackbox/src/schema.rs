//! Sensor schema
//!
//! Every log carries its own schema: one text line per sensor of the form
//! `name;id;label,unit,type;label,unit,type;...`. This module turns such a line
//! into a [`SensorDescriptor`] and knows how to decode the primitive types the
//! schema may reference.

use core::fmt;

use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{F32, F64, I16, I32, I64, U16, U32, U64};

use crate::error::SchemaError;

/// Bytes taken by the little-endian `u32` millisecond timestamp.
pub const TIMESTAMP_SIZE: usize = 4;
/// Bytes taken by the sensor id that follows the timestamp.
pub const ID_SIZE: usize = 1;
/// Offset of the first payload byte in a packet.
pub const PAYLOAD_OFFSET: usize = TIMESTAMP_SIZE + ID_SIZE;
/// Timestamp, id byte and line terminator.
pub const PACKET_OVERHEAD: usize = PAYLOAD_OFFSET + 1;

const SENSOR_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = ',';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    I8,
    U8,
    Char,
    I16,
    U16,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl PrimitiveType {
    /// Looks up a schema type name. Matching is case-sensitive and only the
    /// C type names below are understood.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let ty = match name {
            "char" | "unsigned char" => PrimitiveType::Char,
            "byte" | "uint8_t" => PrimitiveType::U8,
            "int8_t" => PrimitiveType::I8,
            "int16_t" => PrimitiveType::I16,
            "uint16_t" => PrimitiveType::U16,
            "int32_t" => PrimitiveType::I32,
            "uint32_t" => PrimitiveType::U32,
            "float" => PrimitiveType::F32,
            "int64_t" => PrimitiveType::I64,
            "uint64_t" => PrimitiveType::U64,
            "double" => PrimitiveType::F64,
            _ => return None,
        };
        Some(ty)
    }

    pub const fn size(&self) -> usize {
        match self {
            PrimitiveType::I8 => core::mem::size_of::<i8>(),
            PrimitiveType::U8 => core::mem::size_of::<u8>(),
            PrimitiveType::Char => core::mem::size_of::<u8>(),
            PrimitiveType::I16 => core::mem::size_of::<i16>(),
            PrimitiveType::U16 => core::mem::size_of::<u16>(),
            PrimitiveType::I32 => core::mem::size_of::<i32>(),
            PrimitiveType::U32 => core::mem::size_of::<u32>(),
            PrimitiveType::F32 => core::mem::size_of::<f32>(),
            PrimitiveType::I64 => core::mem::size_of::<i64>(),
            PrimitiveType::U64 => core::mem::size_of::<u64>(),
            PrimitiveType::F64 => core::mem::size_of::<f64>(),
        }
    }

    /// Decodes one little-endian value from the front of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than [`Self::size`].
    pub fn decode(&self, buf: &[u8]) -> Option<Value> {
        let buf = buf.get(..self.size())?;
        let value = match self {
            PrimitiveType::I8 => Value::I8(buf[0] as i8),
            PrimitiveType::U8 => Value::U8(buf[0]),
            PrimitiveType::Char => Value::Char(buf[0]),
            PrimitiveType::I16 => Value::I16(I16::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::U16 => Value::U16(U16::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::I32 => Value::I32(I32::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::U32 => Value::U32(U32::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::F32 => Value::F32(F32::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::I64 => Value::I64(I64::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::U64 => Value::U64(U64::read_from_bytes(buf).ok()?.get()),
            PrimitiveType::F64 => Value::F64(F64::read_from_bytes(buf).ok()?.get()),
        };
        Some(value)
    }
}

/// A decoded scalar.
///
/// `Char` keeps the raw byte and is rendered as a character rather than as a
/// number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    I8(i8),
    U8(u8),
    Char(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Value {
    pub fn prim_type(&self) -> PrimitiveType {
        match self {
            Value::I8(_) => PrimitiveType::I8,
            Value::U8(_) => PrimitiveType::U8,
            Value::Char(_) => PrimitiveType::Char,
            Value::I16(_) => PrimitiveType::I16,
            Value::U16(_) => PrimitiveType::U16,
            Value::I32(_) => PrimitiveType::I32,
            Value::U32(_) => PrimitiveType::U32,
            Value::F32(_) => PrimitiveType::F32,
            Value::I64(_) => PrimitiveType::I64,
            Value::U64(_) => PrimitiveType::U64,
            Value::F64(_) => PrimitiveType::F64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{}", char::from(*v)),
            Value::I16(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub label: String,
    pub unit: String,
    pub ty: PrimitiveType,
}

impl FieldDescriptor {
    pub fn byte_size(&self) -> usize {
        self.ty.size()
    }

    /// Column label used in the second CSV header row, e.g. `q1 [NED]`.
    pub fn column_label(&self) -> String {
        format!("{} [{}]", self.label, self.unit)
    }
}

/// Schema of one sensor group, built once from the log header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub name: String,
    pub id: u8,
    pub fields: Vec<FieldDescriptor>,
    pub packet_size: usize,
}

impl SensorDescriptor {
    pub fn new(name: impl Into<String>, id: u8, fields: Vec<FieldDescriptor>) -> Self {
        let packet_size = PACKET_OVERHEAD
            + fields
                .iter()
                .map(FieldDescriptor::byte_size)
                .sum::<usize>();
        Self {
            name: name.into(),
            id,
            fields,
            packet_size,
        }
    }

    /// Byte offset of every field inside a packet, in declaration order.
    pub fn field_offsets(&self) -> impl Iterator<Item = (usize, &FieldDescriptor)> {
        self.fields.iter().scan(PAYLOAD_OFFSET, |offset, field| {
            let start = *offset;
            *offset += field.byte_size();
            Some((start, field))
        })
    }
}

/// Parses one header line, already stripped of its line terminator and
/// trailing separator.
pub fn parse_sensor_line(line: &str) -> Result<SensorDescriptor, SchemaError> {
    let main_data: Vec<&str> = line.split(SENSOR_SEPARATOR).collect();
    let name = main_data[0].to_string();
    if main_data.len() < 3 {
        return Err(SchemaError::MalformedSensorSpec { sensor: name });
    }

    let raw_id = main_data[1];
    let id = raw_id
        .trim()
        .parse::<u8>()
        .map_err(|_| SchemaError::InvalidSensorId {
            sensor: name.clone(),
            id: raw_id.to_string(),
        })?;

    let fields = main_data[2..]
        .iter()
        .map(|spec| parse_field(&name, spec))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SensorDescriptor::new(name, id, fields))
}

fn parse_field(sensor: &str, spec: &str) -> Result<FieldDescriptor, SchemaError> {
    let parts: Vec<&str> = spec.split(FIELD_SEPARATOR).collect();
    let [label, unit, type_name] = parts[..] else {
        return Err(SchemaError::InvalidFieldSpec {
            sensor: sensor.to_string(),
            field: spec.to_string(),
        });
    };
    let ty = PrimitiveType::from_type_name(type_name).ok_or_else(|| SchemaError::UnsupportedType {
        sensor: sensor.to_string(),
        type_name: type_name.to_string(),
    })?;
    Ok(FieldDescriptor {
        label: label.to_string(),
        unit: unit.to_string(),
        ty,
    })
}
