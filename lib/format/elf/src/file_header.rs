//! The ELF file header that follows the identification block.

use core::fmt;

use crate::{
    ident::IDENT_SIZE,
    layout::{Field, FieldWidth, Layout, LayoutError, Record, Schema, expect_schema},
};

/// The on-disk layout of the 64-bit ELF file header, excluding the identification block.
pub const FILE_HEADER_SCHEMA: Schema = Schema::new(
    "Elf64_Ehdr",
    &[
        Field::new("type", FieldWidth::HALF),
        Field::new("machine", FieldWidth::HALF),
        Field::new("version", FieldWidth::WORD),
        Field::new("entry", FieldWidth::ADDR),
        Field::new("program_header_offset", FieldWidth::OFF),
        Field::new("section_header_offset", FieldWidth::OFF),
        Field::new("flags", FieldWidth::WORD),
        Field::new("header_size", FieldWidth::HALF),
        Field::new("program_header_entry_size", FieldWidth::HALF),
        Field::new("program_header_count", FieldWidth::HALF),
        Field::new("section_header_entry_size", FieldWidth::HALF),
        Field::new("section_header_count", FieldWidth::HALF),
        Field::new("section_header_string_index", FieldWidth::HALF),
    ],
);

/// The offset of the file header from the start of the file.
pub const FILE_HEADER_OFFSET: usize = IDENT_SIZE;

/// Contains basic information about how an ELF file is arranged.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct FileHeader {
    /// The [`ElfType`] of the file.
    pub elf_type: ElfType,
    /// The architecture for which the file is targeted.
    pub machine: Machine,
    /// The version of the file.
    pub version: u32,
    /// The virtual address of the first instruction executed.
    pub entry: u64,
    /// The file offset of the program header table.
    pub program_header_offset: u64,
    /// The file offset of the section header table.
    pub section_header_offset: u64,
    /// Processor specific flags.
    pub flags: u32,
    /// The size of the ELF header, identification block included.
    pub header_size: u16,
    /// The size of a single program header table entry.
    pub program_header_entry_size: u16,
    /// The number of program header table entries.
    pub program_header_count: u16,
    /// The size of a single section header table entry.
    pub section_header_entry_size: u16,
    /// The number of section header table entries.
    pub section_header_count: u16,
    /// The index of the section name string table in the section header table.
    pub section_header_string_index: u16,
}

impl FileHeader {
    /// The current version of the ELF file.
    pub const CURRENT_VERSION: u32 = 1;
}

impl Layout for FileHeader {
    const SCHEMA: &'static Schema = &FILE_HEADER_SCHEMA;

    fn to_record(&self) -> Record {
        Record::from_values(
            Self::SCHEMA,
            [
                u64::from(self.elf_type.0),
                u64::from(self.machine.0),
                u64::from(self.version),
                self.entry,
                self.program_header_offset,
                self.section_header_offset,
                u64::from(self.flags),
                u64::from(self.header_size),
                u64::from(self.program_header_entry_size),
                u64::from(self.program_header_count),
                u64::from(self.section_header_entry_size),
                u64::from(self.section_header_count),
                u64::from(self.section_header_string_index),
            ],
        )
    }

    fn from_record(record: &Record) -> Result<Self, LayoutError> {
        expect_schema(record, Self::SCHEMA)?;

        Ok(Self {
            elf_type: ElfType(record.get_as("type")?),
            machine: Machine(record.get_as("machine")?),
            version: record.get_as("version")?,
            entry: record.get_as("entry")?,
            program_header_offset: record.get_as("program_header_offset")?,
            section_header_offset: record.get_as("section_header_offset")?,
            flags: record.get_as("flags")?,
            header_size: record.get_as("header_size")?,
            program_header_entry_size: record.get_as("program_header_entry_size")?,
            program_header_count: record.get_as("program_header_count")?,
            section_header_entry_size: record.get_as("section_header_entry_size")?,
            section_header_count: record.get_as("section_header_count")?,
            section_header_string_index: record.get_as("section_header_string_index")?,
        })
    }
}

/// The type of the ELF file.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ElfType(pub u16);

impl ElfType {
    /// No kind.
    pub const NONE: Self = Self(0);
    /// Relocatable ELF file.
    pub const RELOCATABLE: Self = Self(1);
    /// Executable ELF file.
    pub const EXECUTABLE: Self = Self(2);
    /// Shared object ELF file.
    pub const SHARED: Self = Self(3);
    /// Core ELF file.
    pub const CORE: Self = Self(4);
}

impl fmt::Debug for ElfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.pad("None"),
            Self::RELOCATABLE => f.pad("Relocatable"),
            Self::EXECUTABLE => f.pad("Executable"),
            Self::SHARED => f.pad("SharedObject"),
            Self::CORE => f.pad("Core"),
            elf_type => f.debug_tuple("ElfType").field(&elf_type.0).finish(),
        }
    }
}

/// The architecture of the ELF file.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct Machine(pub u16);

impl Machine {
    /// No required machine.
    pub const NONE: Self = Self(0);
    /// Intel 80386.
    pub const INTEL_386: Self = Self(3);
    /// AArch32.
    pub const ARM: Self = Self(40);
    /// AMD `x86_64`.
    pub const X86_64: Self = Self(62);
    /// AArch64.
    pub const AARCH64: Self = Self(183);
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.pad("None"),
            Self::INTEL_386 => f.pad("Intel386"),
            Self::ARM => f.pad("Aarch32"),
            Self::X86_64 => f.pad("x86_64"),
            Self::AARCH64 => f.pad("Aarch64"),
            machine => f.debug_tuple("Machine").field(&machine.0).finish(),
        }
    }
}
