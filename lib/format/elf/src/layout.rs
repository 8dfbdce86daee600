//! Schema driven encoding and decoding of structures made of fixed-width unsigned integers.
//!
//! A [`Schema`] lists the fields of an on-disk structure in the order they appear in the file.
//! [`encode()`] and [`decode()`] convert between the raw bytes and a [`Record`], which maps each
//! field name to its value. Typed structures opt in through the [`Layout`] trait.

use core::{error, fmt};

use alloc::{vec, vec::Vec};

use crate::ident::Encoding;

/// The width of a [`Field`].
///
/// Every field is an unsigned integer of one of these widths.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldWidth {
    /// A single byte.
    U8 = 1,
    /// Two bytes.
    U16 = 2,
    /// Four bytes.
    U32 = 4,
    /// Eight bytes.
    U64 = 8,
}

impl FieldWidth {
    /// `Elf64_Half`.
    pub const HALF: Self = Self::U16;
    /// `Elf64_Word`.
    pub const WORD: Self = Self::U32;
    /// `Elf64_Addr`.
    pub const ADDR: Self = Self::U64;
    /// `Elf64_Off`.
    pub const OFF: Self = Self::U64;
    /// `Elf64_Xword`.
    pub const XWORD: Self = Self::U64;

    /// Returns the number of bytes a value of this [`FieldWidth`] occupies.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Returns the largest value representable in this [`FieldWidth`].
    pub const fn max_value(self) -> u64 {
        match self {
            Self::U8 => u8::MAX as u64,
            Self::U16 => u16::MAX as u64,
            Self::U32 => u32::MAX as u64,
            Self::U64 => u64::MAX,
        }
    }
}

/// A named field of a [`Schema`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Field {
    /// The name of the field, unique within its [`Schema`].
    pub name: &'static str,
    /// The [`FieldWidth`] of the field.
    pub width: FieldWidth,
}

impl Field {
    /// Creates a new [`Field`].
    pub const fn new(name: &'static str, width: FieldWidth) -> Self {
        Self { name, width }
    }
}

/// The ordered list of [`Field`]s making up an on-disk structure.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Schema {
    /// The name of the structure.
    name: &'static str,
    /// The fields, in file order.
    fields: &'static [Field],
}

impl Schema {
    /// Creates a new [`Schema`].
    ///
    /// # Panics
    ///
    /// Panics if two fields share a name.
    pub const fn new(name: &'static str, fields: &'static [Field]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            let mut j = i + 1;
            while j < fields.len() {
                assert!(
                    !const_str_eq(fields[i].name, fields[j].name),
                    "duplicate field name in schema"
                );
                j += 1;
            }
            i += 1;
        }

        Self { name, fields }
    }

    /// Returns the name of the structure described by this [`Schema`].
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`Field`]s of this [`Schema`] in file order.
    pub const fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Returns the encoded size, in bytes, of a structure described by this [`Schema`].
    pub const fn size(&self) -> usize {
        let mut size = 0;
        let mut i = 0;
        while i < self.fields.len() {
            size += self.fields[i].width.size();
            i += 1;
        }
        size
    }

    /// Returns the index and [`Field`] named `name`.
    pub fn field(&self, name: &str) -> Option<(usize, Field)> {
        self.fields
            .iter()
            .copied()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Returns the byte offset of the field named `name` from the start of the structure.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let (index, _) = self.field(name)?;
        Some(
            self.fields[..index]
                .iter()
                .map(|field| field.width.size())
                .sum(),
        )
    }
}

/// Returns the encoded size, in bytes, of a structure described by `schema`.
pub const fn size_of(schema: &Schema) -> usize {
    schema.size()
}

/// `str` equality usable in `const` contexts.
const fn const_str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// The values of a structure described by a [`Schema`], keyed by field name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Record {
    /// The [`Schema`] that describes the values.
    schema: &'static Schema,
    /// The values, in the same order as [`Schema::fields()`].
    values: Vec<u64>,
}

impl Record {
    /// Creates a new [`Record`] of `schema` with every field set to zero.
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: vec![0; schema.fields().len()],
        }
    }

    /// Creates a new [`Record`] of `schema` from `values` given in file order.
    pub(crate) fn from_values<const N: usize>(schema: &'static Schema, values: [u64; N]) -> Self {
        debug_assert_eq!(N, schema.fields().len());

        Self {
            schema,
            values: values.to_vec(),
        }
    }

    /// Returns the [`Schema`] of this [`Record`].
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the value of the field named `name`.
    pub fn get(&self, name: &str) -> Option<u64> {
        let (index, _) = self.schema.field(name)?;
        Some(self.values[index])
    }

    /// Returns a mutable reference to the value of the field named `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut u64> {
        let (index, _) = self.schema.field(name)?;
        Some(&mut self.values[index])
    }

    /// Sets the field named `name` to `value`.
    ///
    /// The value is only checked against the field's width by [`encode()`].
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownField`] if the [`Schema`] has no such field.
    pub fn set(&mut self, name: &'static str, value: u64) -> Result<(), LayoutError> {
        let schema = self.schema.name();
        let slot = self.get_mut(name).ok_or(LayoutError::UnknownField {
            schema,
            field: name,
        })?;
        *slot = value;
        Ok(())
    }

    /// Sets the field named `name` to `value`, returning `self` for chaining.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownField`] if the [`Schema`] has no such field.
    pub fn with(mut self, name: &'static str, value: u64) -> Result<Self, LayoutError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Returns the value of the field named `name` converted to `T`.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::UnknownField`]: The [`Schema`] has no such field.
    /// - [`LayoutError::FieldOverflow`]: The value does not fit in `T`.
    pub fn get_as<T: TryFrom<u64>>(&self, name: &'static str) -> Result<T, LayoutError> {
        let (index, field) = self.schema.field(name).ok_or(LayoutError::UnknownField {
            schema: self.schema.name(),
            field: name,
        })?;
        let value = self.values[index];

        T::try_from(value).map_err(|_| LayoutError::FieldOverflow {
            field: name,
            value,
            width: field.width,
        })
    }

    /// Returns an iterator over the field names and values in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(field, value)| (field.name, *value))
    }
}

/// Encodes `record` as described by `schema`.
///
/// The result is always exactly [`size_of(schema)`][size_of] bytes long.
///
/// # Errors
///
/// - [`LayoutError::SchemaMismatch`]: `record` was not created for `schema`.
/// - [`LayoutError::FieldOverflow`]: A value does not fit in its field's width.
pub fn encode(schema: &Schema, record: &Record) -> Result<Vec<u8>, LayoutError> {
    if record.schema() != schema {
        return Err(LayoutError::SchemaMismatch {
            expected: schema.name(),
            actual: record.schema().name(),
        });
    }

    let mut bytes = Vec::with_capacity(schema.size());
    for (field, value) in schema.fields().iter().zip(record.values.iter().copied()) {
        if value > field.width.max_value() {
            return Err(LayoutError::FieldOverflow {
                field: field.name,
                value,
                width: field.width,
            });
        }

        bytes.extend_from_slice(&value.to_le_bytes()[..field.width.size()]);
    }

    debug_assert_eq!(bytes.len(), schema.size());
    Ok(bytes)
}

/// Decodes `bytes` as described by `schema` using `encoding`.
///
/// # Errors
///
/// - [`LayoutError::UnsupportedEncoding`]: `encoding` is not little-endian.
/// - [`LayoutError::TruncatedInput`]: `bytes` is not exactly [`size_of(schema)`][size_of] bytes
///   long.
pub fn decode(
    schema: &'static Schema,
    bytes: &[u8],
    encoding: Encoding,
) -> Result<Record, LayoutError> {
    if encoding != Encoding::LSB2 {
        return Err(LayoutError::UnsupportedEncoding(encoding));
    }

    if bytes.len() != schema.size() {
        return Err(LayoutError::TruncatedInput {
            expected: crate::usize_to_u64(schema.size()),
            actual: crate::usize_to_u64(bytes.len()),
        });
    }

    let mut values = Vec::with_capacity(schema.fields().len());
    let mut rest = bytes;
    for field in schema.fields() {
        let (raw, tail) = rest.split_at(field.width.size());
        values.push(read_le(raw));
        rest = tail;
    }

    Ok(Record { schema, values })
}

/// Reads an unsigned little-endian integer of at most eight bytes.
fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |value, &byte| (value << 8) | u64::from(byte))
}

/// A typed structure with a fixed [`Schema`].
pub trait Layout: Sized {
    /// The [`Schema`] describing the on-disk form of this structure.
    const SCHEMA: &'static Schema;

    /// Converts this structure into a [`Record`] of [`Layout::SCHEMA`].
    fn to_record(&self) -> Record;

    /// Converts a [`Record`] of [`Layout::SCHEMA`] into this structure.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] if `record` belongs to a different [`Schema`] or holds a value
    /// that does not fit in the corresponding member.
    fn from_record(record: &Record) -> Result<Self, LayoutError>;
}

/// Encodes `value` using its [`Layout::SCHEMA`].
///
/// # Errors
///
/// Returns [`LayoutError::FieldOverflow`] if a value does not fit in its field's width.
pub fn encode_layout<L: Layout>(value: &L) -> Result<Vec<u8>, LayoutError> {
    encode(L::SCHEMA, &value.to_record())
}

/// Decodes `bytes` into `L` using its [`Layout::SCHEMA`].
///
/// # Errors
///
/// See [`decode()`].
pub fn decode_layout<L: Layout>(bytes: &[u8], encoding: Encoding) -> Result<L, LayoutError> {
    let record = decode(L::SCHEMA, bytes, encoding)?;
    L::from_record(&record)
}

/// Checks that `record` belongs to `schema`.
pub(crate) fn expect_schema(record: &Record, schema: &'static Schema) -> Result<(), LayoutError> {
    if record.schema() != schema {
        return Err(LayoutError::SchemaMismatch {
            expected: schema.name(),
            actual: record.schema().name(),
        });
    }

    Ok(())
}

/// Various errors that can occur while encoding or decoding a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// A value does not fit in the width of its field.
    FieldOverflow {
        /// The name of the field.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// The width of the field.
        width: FieldWidth,
    },
    /// Fewer (or more) bytes were available than the [`Schema`] requires.
    TruncatedInput {
        /// The number of bytes required.
        expected: u64,
        /// The number of bytes available.
        actual: u64,
    },
    /// Only little-endian data can be decoded.
    UnsupportedEncoding(Encoding),
    /// The [`Schema`] has no field with the requested name.
    UnknownField {
        /// The name of the [`Schema`].
        schema: &'static str,
        /// The requested field name.
        field: &'static str,
    },
    /// A [`Record`] was used with a [`Schema`] other than the one it was created for.
    SchemaMismatch {
        /// The name of the [`Schema`] that was expected.
        expected: &'static str,
        /// The name of the [`Schema`] of the [`Record`].
        actual: &'static str,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldOverflow {
                field,
                value,
                width,
            } => write!(
                f,
                "value {value:#x} does not fit in the {}-byte field `{field}`",
                width.size()
            ),
            Self::TruncatedInput { expected, actual } => {
                write!(f, "expected {expected} bytes but only {actual} are available")
            }
            Self::UnsupportedEncoding(encoding) => {
                write!(f, "decoding {encoding:?} data is not supported")
            }
            Self::UnknownField { schema, field } => {
                write!(f, "`{schema}` has no field named `{field}`")
            }
            Self::SchemaMismatch { expected, actual } => {
                write!(f, "expected a `{expected}` record but got a `{actual}` record")
            }
        }
    }
}

impl error::Error for LayoutError {}
