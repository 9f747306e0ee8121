//! Caller-supplied record schema.
//!
//! The file never describes its own member types; the caller provides an
//! ordered list of members mirroring the record layout. A schema can be built
//! in code through [`SchemaBuilder`] or parsed from the compact textual form
//! used by the command line tool:
//!
//! ```text
//! id:u32:key, name:string, flags:u8[4], rates:f32[]
//! ```
//!
//! `[N]` declares an array of `N` elements, `[]` an array whose length is
//! inferred from the file metadata.

use std::fmt;
use std::str::FromStr;

use super::error::{DbError, Result};

/// Primitive element type of a schema member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    /// A NUL-terminated string, stored either inline or as a 4-byte pool offset.
    String,
}

impl ElementType {
    /// Width of one element inside the record, in bytes.
    pub fn byte_size(self) -> u32 {
        match self {
            ElementType::Bool | ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 | ElementType::String => 4,
            ElementType::I64 | ElementType::U64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
        )
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ElementType::F32 | ElementType::String)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I16 => "i16",
            ElementType::U16 => "u16",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F32 => "f32",
            ElementType::String => "string",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "bool" => ElementType::Bool,
            "i8" | "sbyte" => ElementType::I8,
            "u8" | "byte" => ElementType::U8,
            "i16" | "short" => ElementType::I16,
            "u16" | "ushort" => ElementType::U16,
            "i32" | "int" => ElementType::I32,
            "u32" | "uint" => ElementType::U32,
            "i64" | "long" => ElementType::I64,
            "u64" | "ulong" => ElementType::U64,
            "f32" | "float" => ElementType::F32,
            "string" | "str" => ElementType::String,
            other => return Err(format!("unknown element type '{}'", other)),
        })
    }
}

/// Scalar or array shape of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Scalar,
    /// An array; `len` is the caller's declared element count, if known.
    Array { len: Option<u32> },
}

impl Arity {
    pub fn is_array(self) -> bool {
        matches!(self, Arity::Array { .. })
    }

    /// The declared element count: 1 for scalars, the hint for arrays.
    pub fn declared_len(self) -> Option<u32> {
        match self {
            Arity::Scalar => Some(1),
            Arity::Array { len } => len,
        }
    }
}

/// One member of the record, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: ElementType,
    pub arity: Arity,
    pub is_key: bool,
}

impl Member {
    pub fn scalar(name: impl Into<String>, ty: ElementType) -> Self {
        Self {
            name: name.into(),
            ty,
            arity: Arity::Scalar,
            is_key: false,
        }
    }

    pub fn array(name: impl Into<String>, ty: ElementType, len: Option<u32>) -> Self {
        Self {
            name: name.into(),
            ty,
            arity: Arity::Array { len },
            is_key: false,
        }
    }

    pub fn key(name: impl Into<String>, ty: ElementType) -> Self {
        Self {
            is_key: true,
            ..Self::scalar(name, ty)
        }
    }
}

/// An ordered list of members describing one record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    members: Vec<Member>,
}

impl Schema {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    /// Index of the single member marked as key.
    ///
    /// # Errors
    /// `MultipleIndexFields` if several members are marked, `MissingIndexField` if none is.
    pub fn key_index(&self) -> Result<usize> {
        let mut found = None;
        for (i, member) in self.members.iter().enumerate() {
            if !member.is_key {
                continue;
            }
            if found.is_some() {
                return Err(DbError::MultipleIndexFields);
            }
            found = Some(i);
        }
        found.ok_or(DbError::MissingIndexField)
    }
}

impl FromStr for Schema {
    type Err = String;

    /// Parses `name:type[:key]` entries separated by commas; `type[N]` or `type[]` for arrays.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut builder = Schema::builder();
        for (i, entry) in s.split(',').map(str::trim).filter(|e| !e.is_empty()).enumerate() {
            let mut parts = entry.split(':').map(str::trim);
            let name = parts.next().unwrap_or_default();
            let ty_text = parts
                .next()
                .ok_or_else(|| format!("member {} ('{}') has no type", i, entry))?;
            let is_key = match parts.next() {
                None => false,
                Some("key") => true,
                Some(other) => return Err(format!("unknown member flag '{}' in '{}'", other, entry)),
            };

            let (ty, arity) = match ty_text.split_once('[') {
                None => (ty_text.parse::<ElementType>()?, Arity::Scalar),
                Some((base, rest)) => {
                    let len_text = rest
                        .strip_suffix(']')
                        .ok_or_else(|| format!("unterminated array in '{}'", entry))?;
                    let len = if len_text.is_empty() {
                        None
                    } else {
                        Some(
                            len_text
                                .parse::<u32>()
                                .map_err(|e| format!("invalid array length in '{}': {}", entry, e))?,
                        )
                    };
                    (base.parse::<ElementType>()?, Arity::Array { len })
                }
            };

            builder = builder.member(Member {
                name: name.to_string(),
                ty,
                arity,
                is_key,
            });
        }
        Ok(builder.build())
    }
}

/// Chained construction of a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    members: Vec<Member>,
}

impl SchemaBuilder {
    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn key(self, name: impl Into<String>, ty: ElementType) -> Self {
        self.member(Member::key(name, ty))
    }

    pub fn scalar(self, name: impl Into<String>, ty: ElementType) -> Self {
        self.member(Member::scalar(name, ty))
    }

    pub fn array(self, name: impl Into<String>, ty: ElementType, len: Option<u32>) -> Self {
        self.member(Member::array(name, ty, len))
    }

    pub fn build(self) -> Schema {
        Schema::new(self.members)
    }
}
