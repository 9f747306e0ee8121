//! Decoded output: field values, records and keys.

use std::fmt;

use super::schema::{ElementType, Schema};

/// The integer identifier of a record.
pub type RecordKey = u32;

/// One decoded member value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    String(String),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Builds a value of type `ty` from raw bits, truncating to the type's width.
    ///
    /// Strings can't be built from raw bits; `None` is returned for them.
    pub fn from_raw(ty: ElementType, raw: u64) -> Option<Self> {
        Some(match ty {
            ElementType::Bool => FieldValue::Bool(raw != 0),
            ElementType::I8 => FieldValue::I8(raw as i8),
            ElementType::U8 => FieldValue::U8(raw as u8),
            ElementType::I16 => FieldValue::I16(raw as i16),
            ElementType::U16 => FieldValue::U16(raw as u16),
            ElementType::I32 => FieldValue::I32(raw as i32),
            ElementType::U32 => FieldValue::U32(raw as u32),
            ElementType::I64 => FieldValue::I64(raw as i64),
            ElementType::U64 => FieldValue::U64(raw),
            ElementType::F32 => FieldValue::F32(f32::from_bits(raw as u32)),
            ElementType::String => return None,
        })
    }

    /// Integer view of the value, when it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Bool(v) => Some(v as i64),
            FieldValue::I8(v) => Some(v as i64),
            FieldValue::U8(v) => Some(v as i64),
            FieldValue::I16(v) => Some(v as i64),
            FieldValue::U16(v) => Some(v as i64),
            FieldValue::I32(v) => Some(v as i64),
            FieldValue::U32(v) => Some(v as i64),
            FieldValue::I64(v) => Some(v),
            FieldValue::U64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().map(|v| v as u32)
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            FieldValue::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::I8(v) => write!(f, "{}", v),
            FieldValue::U8(v) => write!(f, "{}", v),
            FieldValue::I16(v) => write!(f, "{}", v),
            FieldValue::U16(v) => write!(f, "{}", v),
            FieldValue::I32(v) => write!(f, "{}", v),
            FieldValue::U32(v) => write!(f, "{}", v),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::F32(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Array(values) => write_list(f, values),
        }
    }
}

/// A decoded record: one value per schema member, in member order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Looks a value up by member name.
    pub fn get_by_name(&self, schema: &Schema, name: &str) -> Option<&FieldValue> {
        schema.position(name).and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn set(&mut self, index: usize, value: FieldValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_list(f, &self.values)
    }
}

fn write_list(f: &mut fmt::Formatter, values: &[FieldValue]) -> fmt::Result {
    f.write_str("[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", value)?;
    }
    f.write_str("]")
}
