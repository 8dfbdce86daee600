//! Synthesis of minimal 64-bit Linux executables that print a message and exit.
//!
//! The generated file contains two loadable segments. The first covers the headers and the
//! machine code and is mapped read/execute; the second holds the message and is mapped
//! read/write. There is no section header table.

use core::{convert::Infallible, error, fmt};

use alloc::vec::Vec;

use x86_64::{
    instruction::ImmediateOutOfRangeError,
    program::{HELLO_PROGRAM_SIZE, encode_hello_program},
};

use crate::{
    file_header::{ElfType, FILE_HEADER_OFFSET, FILE_HEADER_SCHEMA, FileHeader, Machine},
    ident::{IDENT_SIZE, Identification},
    layout::{FieldWidth, LayoutError, encode_layout},
    program_header::{PROGRAM_HEADER_SCHEMA, ProgramHeader, SegmentFlags, SegmentType},
    sink::ByteSink,
    usize_to_u64,
};

/// The number of program headers in a generated executable.
pub const PROGRAM_HEADER_COUNT: u16 = 2;

/// The file offset of the program header table.
pub const PROGRAM_HEADER_TABLE_OFFSET: usize = FILE_HEADER_OFFSET + FILE_HEADER_SCHEMA.size();

/// The number of bytes in front of the machine code: identification block, file header and
/// program header table.
pub const HEADER_REGION_SIZE: usize = PROGRAM_HEADER_TABLE_OFFSET
    + PROGRAM_HEADER_COUNT as usize * PROGRAM_HEADER_SCHEMA.size();

/// The default virtual address of the code segment.
pub const DEFAULT_BASE_ADDRESS: u64 = 0x40_0000;

/// The default alignment of both segments.
pub const DEFAULT_ALIGNMENT: u64 = 0x1000;

/// Options that control the layout of a generated executable.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct BuildConfig {
    /// The virtual address at which the code segment, and with it the file, is mapped.
    pub base_address: u64,
    /// The alignment of both segments. Must be a power of two.
    pub alignment: u64,
}

impl BuildConfig {
    /// Checks that [`BuildConfig::alignment`] is a power of two and that
    /// [`BuildConfig::base_address`] is aligned to it.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidAlignment`]: The alignment is not a power of two.
    /// - [`BuildError::MisalignedBaseAddress`]: The base address is not aligned.
    pub fn validate<E>(&self) -> Result<(), BuildError<E>> {
        if !self.alignment.is_power_of_two() {
            return Err(BuildError::InvalidAlignment(self.alignment));
        }

        if self.base_address & (self.alignment - 1) != 0 {
            return Err(BuildError::MisalignedBaseAddress {
                base_address: self.base_address,
                alignment: self.alignment,
            });
        }

        Ok(())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

/// The offsets and addresses of a generated executable.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ExecutableLayout {
    /// The virtual address of the code segment, which starts at file offset 0.
    pub code_address: u64,
    /// The file offset of the machine code.
    pub code_offset: u64,
    /// The size of the machine code.
    pub code_size: u64,
    /// The virtual address of the first instruction.
    pub entry: u64,
    /// The file offset of the message.
    pub data_offset: u64,
    /// The virtual address of the message.
    pub data_address: u64,
    /// The size of the message.
    pub data_size: u64,
    /// The alignment of both segments.
    pub alignment: u64,
}

impl ExecutableLayout {
    /// Computes the layout of an executable that prints a message of `message_size` bytes.
    ///
    /// The data segment is placed one alignment unit above the code segment, offset so that its
    /// virtual address is congruent to its file offset modulo the alignment.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidAlignment`] or [`BuildError::MisalignedBaseAddress`]: `config` is
    ///   invalid.
    /// - [`BuildError::AddressOverflow`]: A segment would extend past the end of the address
    ///   space.
    pub fn compute<E>(message_size: u64, config: &BuildConfig) -> Result<Self, BuildError<E>> {
        config.validate::<E>()?;

        let code_offset = usize_to_u64(HEADER_REGION_SIZE);
        let code_size = usize_to_u64(HELLO_PROGRAM_SIZE);
        let data_offset = code_offset + code_size;

        let overflow = || BuildError::AddressOverflow {
            base_address: config.base_address,
            message_size,
        };
        let entry = config
            .base_address
            .checked_add(code_offset)
            .ok_or_else(overflow)?;
        let data_address = config
            .base_address
            .checked_add(config.alignment)
            .and_then(|address| address.checked_add(data_offset))
            .ok_or_else(overflow)?;
        data_address.checked_add(message_size).ok_or_else(overflow)?;

        Ok(Self {
            code_address: config.base_address,
            code_offset,
            code_size,
            entry,
            data_offset,
            data_address,
            data_size: message_size,
            alignment: config.alignment,
        })
    }

    /// Returns the total size of the generated file.
    pub const fn file_size(&self) -> u64 {
        self.data_offset + self.data_size
    }

    /// Returns the [`FileHeader`] of the generated file.
    pub fn file_header(&self) -> FileHeader {
        FileHeader {
            elf_type: ElfType::EXECUTABLE,
            machine: Machine::X86_64,
            version: FileHeader::CURRENT_VERSION,
            entry: self.entry,
            program_header_offset: usize_to_u64(PROGRAM_HEADER_TABLE_OFFSET),
            section_header_offset: 0,
            flags: 0,
            header_size: ELF_HEADER_SIZE,
            program_header_entry_size: PROGRAM_HEADER_ENTRY_SIZE,
            program_header_count: PROGRAM_HEADER_COUNT,
            section_header_entry_size: SECTION_HEADER_ENTRY_SIZE,
            section_header_count: 0,
            section_header_string_index: 0,
        }
    }

    /// Returns the [`ProgramHeader`] of the read/execute segment holding the headers and code.
    pub fn code_segment(&self) -> ProgramHeader {
        let size = self.code_offset + self.code_size;

        ProgramHeader {
            segment_type: SegmentType::LOAD,
            flags: SegmentFlags::READ | SegmentFlags::EXECUTE,
            offset: 0,
            virtual_address: self.code_address,
            physical_address: self.code_address,
            file_size: size,
            memory_size: size,
            alignment: self.alignment,
        }
    }

    /// Returns the [`ProgramHeader`] of the read/write segment holding the message.
    pub fn data_segment(&self) -> ProgramHeader {
        ProgramHeader {
            segment_type: SegmentType::LOAD,
            flags: SegmentFlags::READ | SegmentFlags::WRITE,
            offset: self.data_offset,
            virtual_address: self.data_address,
            physical_address: self.data_address,
            file_size: self.data_size,
            memory_size: self.data_size,
            alignment: self.alignment,
        }
    }
}

/// The size of the identification block and file header together.
const ELF_HEADER_SIZE: u16 = 64;
/// The size of a program header table entry.
const PROGRAM_HEADER_ENTRY_SIZE: u16 = 56;
/// The size of a section header table entry, recorded even though the table is empty.
const SECTION_HEADER_ENTRY_SIZE: u16 = 64;

const _: () = assert!(ELF_HEADER_SIZE as usize == IDENT_SIZE + FILE_HEADER_SCHEMA.size());
const _: () = assert!(PROGRAM_HEADER_ENTRY_SIZE as usize == PROGRAM_HEADER_SCHEMA.size());

/// Builds an executable that prints `message` and returns its bytes.
///
/// # Errors
///
/// See [`write_executable()`].
pub fn build_executable(
    message: &[u8],
    config: &BuildConfig,
) -> Result<Vec<u8>, BuildError<Infallible>> {
    let mut bytes = Vec::with_capacity(HEADER_REGION_SIZE + HELLO_PROGRAM_SIZE + message.len());
    write_executable(&mut bytes, message, config)?;
    Ok(bytes)
}

/// Writes an executable that prints `message` to `sink`, then finalizes `sink`.
///
/// Every structure is encoded before the first write, so nothing is written if encoding fails.
///
/// # Errors
///
/// - [`BuildError::InvalidAlignment`] or [`BuildError::MisalignedBaseAddress`]: `config` is
///   invalid.
/// - [`BuildError::AddressOverflow`]: A segment would extend past the end of the address space.
/// - [`BuildError::Layout`]: A value does not fit in its field or instruction immediate.
/// - [`BuildError::Sink`]: `sink` failed to accept the bytes.
pub fn write_executable<S: ByteSink + ?Sized>(
    sink: &mut S,
    message: &[u8],
    config: &BuildConfig,
) -> Result<ExecutableLayout, BuildError<S::Error>> {
    let layout = ExecutableLayout::compute::<S::Error>(usize_to_u64(message.len()), config)?;
    log::debug!("computed layout: {layout:x?}");

    let identification = Identification::linux_x86_64().encode();
    let file_header = encode_layout(&layout.file_header())?;
    let code_segment = encode_layout(&layout.code_segment())?;
    let data_segment = encode_layout(&layout.data_segment())?;
    let code = encode_hello_program(layout.data_address, layout.data_size)
        .map_err(immediate_overflow)?;

    let parts: [&[u8]; 6] = [
        &identification,
        &file_header,
        &code_segment,
        &data_segment,
        &code,
        message,
    ];
    for part in parts {
        sink.write_bytes(part).map_err(BuildError::Sink)?;
    }
    sink.finalize().map_err(BuildError::Sink)?;

    log::debug!("wrote {} bytes", layout.file_size());
    Ok(layout)
}

/// Reports an immediate that does not fit in its instruction as a [`LayoutError`].
fn immediate_overflow(error: ImmediateOutOfRangeError) -> LayoutError {
    LayoutError::FieldOverflow {
        field: "imm32",
        value: error.value,
        width: FieldWidth::U32,
    }
}

/// Various errors that can occur while building an executable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildError<E> {
    /// A value could not be encoded.
    Layout(LayoutError),
    /// An error reported by the [`ByteSink`].
    Sink(E),
    /// The segment alignment is not a power of two.
    InvalidAlignment(u64),
    /// The base address is not aligned to the segment alignment.
    MisalignedBaseAddress {
        /// The requested base address.
        base_address: u64,
        /// The requested segment alignment.
        alignment: u64,
    },
    /// A segment would extend past the end of the address space.
    AddressOverflow {
        /// The requested base address.
        base_address: u64,
        /// The size of the message.
        message_size: u64,
    },
}

impl<E> From<LayoutError> for BuildError<E> {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

impl<E: fmt::Display> fmt::Display for BuildError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(error) => write!(f, "error encoding executable: {error}"),
            Self::Sink(error) => write!(f, "error writing executable: {error}"),
            Self::InvalidAlignment(alignment) => {
                write!(f, "segment alignment {alignment:#x} is not a power of two")
            }
            Self::MisalignedBaseAddress {
                base_address,
                alignment,
            } => write!(
                f,
                "base address {base_address:#x} is not aligned to {alignment:#x}"
            ),
            Self::AddressOverflow {
                base_address,
                message_size,
            } => write!(
                f,
                "a {message_size}-byte message does not fit in the address space above \
                {base_address:#x}"
            ),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> error::Error for BuildError<E> {}

#[cfg(test)]
mod test {
    use core::convert::Infallible;

    use super::{
        BuildConfig, BuildError, DEFAULT_BASE_ADDRESS, ExecutableLayout, HEADER_REGION_SIZE,
        build_executable, write_executable,
    };
    use crate::{layout::LayoutError, sink::ByteSink};

    #[test]
    fn header_region_size() {
        assert_eq!(HEADER_REGION_SIZE, 176);
    }

    #[test]
    fn identification_bytes() {
        let bytes = build_executable(b"Hi", &BuildConfig::default()).unwrap();

        assert_eq!(
            bytes[..16],
            [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x03, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn total_length() {
        for message in [&b""[..], &b"Hi"[..], &b"Hello, world!\n"[..]] {
            let bytes = build_executable(message, &BuildConfig::default()).unwrap();
            assert_eq!(bytes.len(), 176 + 46 + message.len());
            assert!(bytes.ends_with(message));
        }
    }

    #[test]
    fn default_layout() {
        let layout = ExecutableLayout::compute::<Infallible>(2, &BuildConfig::default()).unwrap();

        assert_eq!(layout.code_address, DEFAULT_BASE_ADDRESS);
        assert_eq!(layout.entry, 0x4000B0);
        assert_eq!(layout.data_offset, 222);
        assert_eq!(layout.data_address, 0x4010DE);
        assert_eq!(layout.data_address % 0x1000, layout.data_offset % 0x1000);
        assert_eq!(layout.file_size(), 224);

        let code = layout.code_segment();
        let data = layout.data_segment();
        assert!(code.offset + code.file_size <= data.offset);
        assert!(code.virtual_address + code.memory_size <= data.virtual_address);
        assert!(code.contains_virtual_address(layout.entry));
    }

    #[test]
    fn message_address_in_code() {
        let bytes = build_executable(b"Hi", &BuildConfig::default()).unwrap();

        // mov rsi, imm32 is the third instruction.
        assert_eq!(bytes[176 + 14..176 + 17], [0x48, 0xC7, 0xC6]);
        assert_eq!(bytes[176 + 17..176 + 21], 0x4010DEu32.to_le_bytes());
    }

    #[test]
    fn invalid_configs() {
        let misaligned = BuildConfig {
            base_address: 0x400010,
            ..BuildConfig::default()
        };
        assert_eq!(
            build_executable(b"Hi", &misaligned),
            Err(BuildError::MisalignedBaseAddress {
                base_address: 0x400010,
                alignment: 0x1000,
            })
        );

        let odd_alignment = BuildConfig {
            alignment: 0x1800,
            ..BuildConfig::default()
        };
        assert_eq!(
            build_executable(b"Hi", &odd_alignment),
            Err(BuildError::InvalidAlignment(0x1800))
        );
    }

    #[test]
    fn unencodable_address_writes_nothing() {
        let config = BuildConfig {
            base_address: 0x8000_0000,
            ..BuildConfig::default()
        };

        let mut bytes = Vec::new();
        let result = write_executable(&mut bytes, b"Hi", &config);
        assert!(matches!(
            result,
            Err(BuildError::Layout(LayoutError::FieldOverflow { field: "imm32", .. }))
        ));
        assert!(bytes.is_empty());
    }

    #[test]
    fn address_overflow() {
        let config = BuildConfig {
            base_address: u64::MAX & !0xFFF,
            ..BuildConfig::default()
        };

        assert!(matches!(
            build_executable(b"Hi", &config),
            Err(BuildError::AddressOverflow { .. })
        ));
    }

    #[derive(Default)]
    struct RecordingSink {
        writes: usize,
        finalized: bool,
    }

    impl ByteSink for RecordingSink {
        type Error = Infallible;

        fn write_bytes(&mut self, _: &[u8]) -> Result<(), Self::Error> {
            assert!(!self.finalized);
            self.writes += 1;
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), Self::Error> {
            self.finalized = true;
            Ok(())
        }
    }

    #[test]
    fn finalizes_after_writing() {
        let mut sink = RecordingSink::default();
        write_executable(&mut sink, b"Hi", &BuildConfig::default()).unwrap();

        assert_eq!(sink.writes, 6);
        assert!(sink.finalized);
    }
}
