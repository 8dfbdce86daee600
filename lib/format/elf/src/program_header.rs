//! ELF program headers, each of which describes a segment.

use core::{fmt, ops};

use crate::{
    file_header::FileHeader,
    ident::Encoding,
    layout::{Field, FieldWidth, Layout, LayoutError, Record, Schema, decode_layout, expect_schema},
    medium::{Medium, MediumError, read_vec},
    reader::ReadError,
};

/// The on-disk layout of a 64-bit ELF program header.
pub const PROGRAM_HEADER_SCHEMA: Schema = Schema::new(
    "Elf64_Phdr",
    &[
        Field::new("type", FieldWidth::WORD),
        Field::new("flags", FieldWidth::WORD),
        Field::new("offset", FieldWidth::OFF),
        Field::new("virtual_address", FieldWidth::ADDR),
        Field::new("physical_address", FieldWidth::ADDR),
        Field::new("file_size", FieldWidth::XWORD),
        Field::new("memory_size", FieldWidth::XWORD),
        Field::new("alignment", FieldWidth::XWORD),
    ],
);

/// Contains basic information about a segment in an ELF file.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ProgramHeader {
    /// The [`SegmentType`] of the segment.
    pub segment_type: SegmentType,
    /// The [`SegmentFlags`] of the segment.
    pub flags: SegmentFlags,
    /// The file offset of the first byte of the segment.
    pub offset: u64,
    /// The virtual address of the first byte of the segment in memory.
    pub virtual_address: u64,
    /// The physical address of the first byte of the segment, where relevant.
    pub physical_address: u64,
    /// The number of bytes of the segment in the file image. May be zero.
    pub file_size: u64,
    /// The number of bytes of the segment in the memory image. May be zero.
    pub memory_size: u64,
    /// The required alignment of the segment.
    ///
    /// [`ProgramHeader::offset`] must equal [`ProgramHeader::virtual_address`] modulo this value.
    pub alignment: u64,
}

impl ProgramHeader {
    /// Returns the range of file offsets covered by the segment, or [`None`] on overflow.
    pub fn file_range(&self) -> Option<ops::Range<u64>> {
        Some(self.offset..self.offset.checked_add(self.file_size)?)
    }

    /// Returns the range of virtual addresses backed by the file image of the segment, or
    /// [`None`] on overflow.
    pub fn virtual_range(&self) -> Option<ops::Range<u64>> {
        Some(self.virtual_address..self.virtual_address.checked_add(self.file_size)?)
    }

    /// Returns `true` if `address` lies inside the file-backed part of the segment.
    pub fn contains_virtual_address(&self, address: u64) -> bool {
        self.virtual_range()
            .is_some_and(|range| range.contains(&address))
    }
}

impl Layout for ProgramHeader {
    const SCHEMA: &'static Schema = &PROGRAM_HEADER_SCHEMA;

    fn to_record(&self) -> Record {
        Record::from_values(
            Self::SCHEMA,
            [
                u64::from(self.segment_type.0),
                u64::from(self.flags.0),
                self.offset,
                self.virtual_address,
                self.physical_address,
                self.file_size,
                self.memory_size,
                self.alignment,
            ],
        )
    }

    fn from_record(record: &Record) -> Result<Self, LayoutError> {
        expect_schema(record, Self::SCHEMA)?;

        Ok(Self {
            segment_type: SegmentType(record.get_as("type")?),
            flags: SegmentFlags(record.get_as("flags")?),
            offset: record.get_as("offset")?,
            virtual_address: record.get_as("virtual_address")?,
            physical_address: record.get_as("physical_address")?,
            file_size: record.get_as("file_size")?,
            memory_size: record.get_as("memory_size")?,
            alignment: record.get_as("alignment")?,
        })
    }
}

/// Reads the program header at `index` in the program header table described by `file_header`.
///
/// The bounds of `index` are not checked against [`FileHeader::program_header_count`].
///
/// # Errors
///
/// - [`ReadError::Layout`]: The header lies past the end of `medium` or uses an unsupported
///   [`Encoding`].
/// - [`ReadError::Medium`]: `medium` failed to provide the bytes.
pub fn read_program_header<M: Medium + ?Sized>(
    medium: &M,
    file_header: &FileHeader,
    encoding: Encoding,
    index: u16,
) -> Result<ProgramHeader, ReadError<M::Error>> {
    let length = crate::usize_to_u64(PROGRAM_HEADER_SCHEMA.size());
    let offset = u64::from(index)
        .checked_mul(u64::from(file_header.program_header_entry_size))
        .and_then(|relative| file_header.program_header_offset.checked_add(relative))
        .ok_or(MediumError::<M::Error>::BoundsError {
            offset: file_header.program_header_offset,
            length,
            size: medium.size(),
        })?;

    log::trace!("reading program header {index} at offset {offset:#x}");
    let bytes = read_vec(medium, offset, length)?;
    Ok(decode_layout(&bytes, encoding)?)
}

/// The type of the segment.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentType(pub u32);

impl SegmentType {
    /// The [`ProgramHeader`] is unused.
    pub const NULL: Self = Self(0);
    /// The segment is loadable.
    pub const LOAD: Self = Self(1);
    /// The segment contains dynamic linking information.
    pub const DYNAMIC: Self = Self(2);
    /// The segment names an interpreter.
    pub const INTERP: Self = Self(3);
    /// The segment holds auxiliary information.
    pub const NOTE: Self = Self(4);
    /// Reserved.
    pub const SHLIB: Self = Self(5);
    /// The segment describes the program header table itself.
    pub const PHDR: Self = Self(6);
    /// The segment holds the thread-local storage template.
    pub const TLS: Self = Self(7);
}

impl fmt::Debug for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NULL => f.pad("Null"),
            Self::LOAD => f.pad("Load"),
            Self::DYNAMIC => f.pad("Dynamic"),
            Self::INTERP => f.pad("Interpreter"),
            Self::NOTE => f.pad("Note"),
            Self::SHLIB => f.pad("ShLib"),
            Self::PHDR => f.pad("Phdr"),
            Self::TLS => f.pad("Tls"),
            segment_type => f.debug_tuple("SegmentType").field(&segment_type.0).finish(),
        }
    }
}

/// The access permissions of the segment.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentFlags(pub u32);

impl SegmentFlags {
    /// The segment must be executable.
    pub const EXECUTE: Self = Self(0x1);
    /// The segment must be writable.
    pub const WRITE: Self = Self(0x2);
    /// The segment must be readable.
    pub const READ: Self = Self(0x4);

    /// Returns `true` if `self` contains the flags that `rhs` has set.
    pub const fn contains(self, rhs: Self) -> bool {
        (self.0 & rhs.0) == rhs.0
    }
}

impl ops::BitOr for SegmentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SegmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let read = if self.contains(Self::READ) { 'R' } else { '-' };
        let write = if self.contains(Self::WRITE) { 'W' } else { '-' };
        let execute = if self.contains(Self::EXECUTE) { 'X' } else { '-' };

        write!(f, "{read}{write}{execute}")
    }
}
