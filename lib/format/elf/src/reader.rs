//! Sequential reading of 64-bit ELF executables.
//!
//! An [`ExecutableReader`] walks a [`Medium`] front to back: identification block, file header,
//! then each program header in table order. Every [`ExecutableReader::step()`] performs exactly
//! one of those reads, so callers can observe partial progress, while
//! [`ExecutableReader::read_all()`] drives the reader to completion.

use core::{error, fmt, ops};

use alloc::vec::Vec;

use crate::{
    file_header::{FILE_HEADER_OFFSET, FILE_HEADER_SCHEMA, FileHeader},
    ident::{Class, IDENT_SIZE, IdentError, Identification, decode_identification},
    layout::{LayoutError, decode_layout},
    medium::{Medium, MediumError, read_vec},
    program_header::{ProgramHeader, read_program_header},
    usize_to_u64,
};

/// Reads `medium` to completion.
///
/// # Errors
///
/// Returns the first [`ReadError`] encountered; see [`ExecutableReader::step()`].
pub fn read_executable<M: Medium + ?Sized>(
    medium: &M,
) -> Result<Executable, ReadError<M::Error>> {
    ExecutableReader::new(medium).read_all()
}

/// The progress of an [`ExecutableReader`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ReaderState {
    /// Nothing has been read.
    Start,
    /// The identification block has been read.
    IdentificationRead,
    /// The file header has been read.
    HeaderRead,
    /// The given number of program headers has been read, with more remaining.
    ProgramHeadersRead(u16),
    /// Every structure has been read.
    Done,
    /// A read failed. No further progress is possible.
    Failed,
}

/// Reads the structures of an ELF executable one at a time.
pub struct ExecutableReader<'medium, M: ?Sized> {
    /// The [`Medium`] being read.
    medium: &'medium M,
    /// The current [`ReaderState`].
    state: ReaderState,
    /// The [`Identification`], once read.
    identification: Option<Identification>,
    /// The [`FileHeader`], once read.
    file_header: Option<FileHeader>,
    /// The [`ProgramHeader`]s read so far.
    program_headers: Vec<ProgramHeader>,
}

impl<'medium, M: Medium + ?Sized> ExecutableReader<'medium, M> {
    /// Creates a new [`ExecutableReader`] positioned at the start of `medium`.
    pub fn new(medium: &'medium M) -> Self {
        Self {
            medium,
            state: ReaderState::Start,
            identification: None,
            file_header: None,
            program_headers: Vec::new(),
        }
    }

    /// Returns the current [`ReaderState`].
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Returns the [`Identification`] if it has been read.
    pub fn identification(&self) -> Option<&Identification> {
        self.identification.as_ref()
    }

    /// Returns the [`FileHeader`] if it has been read.
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }

    /// Returns the [`ProgramHeader`]s read so far, in table order.
    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    /// Performs the next read and returns the resulting [`ReaderState`].
    ///
    /// Calling this once the reader is [`ReaderState::Done`] or [`ReaderState::Failed`] does
    /// nothing.
    ///
    /// # Errors
    ///
    /// - [`ReadError::Ident`]: The identification block is invalid or the file is not 64-bit.
    /// - [`ReadError::Layout`]: A structure is truncated or uses an unsupported encoding.
    /// - [`ReadError::Medium`]: The [`Medium`] failed to provide the bytes.
    pub fn step(&mut self) -> Result<ReaderState, ReadError<M::Error>> {
        let result = match self.state {
            ReaderState::Done | ReaderState::Failed => return Ok(self.state),
            ReaderState::Start => self.read_identification(),
            ReaderState::IdentificationRead => self.read_file_header(),
            ReaderState::HeaderRead | ReaderState::ProgramHeadersRead(_) => {
                self.read_next_program_header()
            }
        };

        match result {
            Ok(state) => {
                log::debug!("reader: {:?} -> {state:?}", self.state);
                self.state = state;
                Ok(state)
            }
            Err(error) => {
                log::debug!("reader: {:?} -> Failed", self.state);
                self.state = ReaderState::Failed;
                Err(error)
            }
        }
    }

    /// Steps until every structure has been read and returns the resulting [`Executable`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ReadError`] encountered; see [`ExecutableReader::step()`].
    pub fn read_all(mut self) -> Result<Executable, ReadError<M::Error>> {
        while self.step()? != ReaderState::Done {}

        let identification = self
            .identification
            .unwrap_or_else(|| unreachable!("identification is read before `Done`"));
        let file_header = self
            .file_header
            .unwrap_or_else(|| unreachable!("file header is read before `Done`"));

        Ok(Executable {
            identification,
            file_header,
            program_headers: self.program_headers,
        })
    }

    /// Reads and validates the identification block.
    fn read_identification(&mut self) -> Result<ReaderState, ReadError<M::Error>> {
        let mut bytes = [0; IDENT_SIZE];
        self.medium.read_slice(0, &mut bytes)?;
        log::trace!("identification bytes: {bytes:02x?}");

        let identification = decode_identification(&bytes)?;
        if identification.class != Class::CLASS64 {
            return Err(IdentError::UnsupportedClass(identification.class).into());
        }

        self.identification = Some(identification);
        Ok(ReaderState::IdentificationRead)
    }

    /// Reads the file header that follows the identification block.
    fn read_file_header(&mut self) -> Result<ReaderState, ReadError<M::Error>> {
        let identification = self
            .identification
            .unwrap_or_else(|| unreachable!("identification is read before the file header"));

        let bytes = read_vec(
            self.medium,
            usize_to_u64(FILE_HEADER_OFFSET),
            usize_to_u64(FILE_HEADER_SCHEMA.size()),
        )?;
        let file_header = decode_layout::<FileHeader>(&bytes, identification.encoding)?;
        log::debug!(
            "entry {:#x}, {} program headers at offset {:#x}",
            file_header.entry,
            file_header.program_header_count,
            file_header.program_header_offset
        );

        self.file_header = Some(file_header);
        self.program_headers = Vec::with_capacity(usize::from(file_header.program_header_count));
        if file_header.program_header_count == 0 {
            Ok(ReaderState::Done)
        } else {
            Ok(ReaderState::HeaderRead)
        }
    }

    /// Reads the first program header that has not yet been read.
    fn read_next_program_header(&mut self) -> Result<ReaderState, ReadError<M::Error>> {
        let (Some(identification), Some(file_header)) = (self.identification, self.file_header)
        else {
            unreachable!("program headers are read after the file header")
        };

        let index = match self.state {
            ReaderState::ProgramHeadersRead(read) => read,
            _ => 0,
        };
        let program_header =
            read_program_header(self.medium, &file_header, identification.encoding, index)?;
        self.program_headers.push(program_header);

        let read = index + 1;
        if read == file_header.program_header_count {
            Ok(ReaderState::Done)
        } else {
            Ok(ReaderState::ProgramHeadersRead(read))
        }
    }
}

/// The structures of a completely read ELF executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Executable {
    /// The [`Identification`] of the file.
    pub identification: Identification,
    /// The [`FileHeader`] of the file.
    pub file_header: FileHeader,
    /// The [`ProgramHeader`]s of the file, in table order.
    pub program_headers: Vec<ProgramHeader>,
}

impl Executable {
    /// Returns the [`ProgramHeader`] assumed to describe the code segment.
    ///
    /// This is always the first program header.
    pub fn code_segment(&self) -> Option<&ProgramHeader> {
        self.program_headers.first()
    }

    /// Returns the range of file offsets from the entry point to the end of the code segment.
    ///
    /// # Errors
    ///
    /// - [`ReadError::MissingProgramHeaders`]: The file has no program headers.
    /// - [`ReadError::EntryOutsideSegment`]: The entry point does not lie inside the file-backed
    ///   part of the code segment.
    pub fn entry_code_range<E>(&self) -> Result<ops::Range<u64>, ReadError<E>> {
        let segment = self.code_segment().ok_or(ReadError::MissingProgramHeaders)?;
        let entry = self.file_header.entry;

        let outside = || {
            ReadError::EntryOutsideSegment(EntryOutsideSegmentError {
                entry,
                segment_start: segment.virtual_address,
                segment_end: segment.virtual_address.saturating_add(segment.file_size),
            })
        };

        if !segment.contains_virtual_address(entry) {
            return Err(outside());
        }

        let relative = entry - segment.virtual_address;
        let start = segment.offset.checked_add(relative).ok_or_else(outside)?;
        let end = segment
            .offset
            .checked_add(segment.file_size)
            .ok_or_else(outside)?;
        Ok(start..end)
    }

    /// Reads the bytes from the entry point to the end of the code segment out of `medium`.
    ///
    /// # Errors
    ///
    /// - [`ReadError::MissingProgramHeaders`]: The file has no program headers.
    /// - [`ReadError::EntryOutsideSegment`]: The entry point does not lie inside the code segment.
    /// - [`ReadError::Layout`]: The code segment extends past the end of `medium`.
    /// - [`ReadError::Medium`]: `medium` failed to provide the bytes.
    pub fn extract_entry_code<M: Medium + ?Sized>(
        &self,
        medium: &M,
    ) -> Result<Vec<u8>, ReadError<M::Error>> {
        let range = self.entry_code_range()?;
        log::debug!("extracting entry code from {:#x}..{:#x}", range.start, range.end);

        Ok(read_vec(medium, range.start, range.end - range.start)?)
    }
}

/// Various errors that can occur while reading an ELF executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadError<E> {
    /// The identification block is invalid or describes an unsupported file.
    Ident(IdentError),
    /// A structure could not be decoded.
    Layout(LayoutError),
    /// An error reported by the underlying [`Medium`].
    Medium(E),
    /// The entry point lies outside of the code segment.
    EntryOutsideSegment(EntryOutsideSegmentError),
    /// The file has no program headers, so no code segment.
    MissingProgramHeaders,
}

impl<E> From<IdentError> for ReadError<E> {
    fn from(value: IdentError) -> Self {
        Self::Ident(value)
    }
}

impl<E> From<LayoutError> for ReadError<E> {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

impl<E> From<MediumError<E>> for ReadError<E> {
    fn from(value: MediumError<E>) -> Self {
        match value {
            MediumError::BoundsError {
                offset,
                length,
                size,
            } => Self::Layout(LayoutError::TruncatedInput {
                expected: length,
                actual: size.saturating_sub(offset).min(length),
            }),
            MediumError::UnderlyingError(error) => Self::Medium(error),
        }
    }
}

impl<E: fmt::Display> fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(error) => write!(f, "invalid identification: {error}"),
            Self::Layout(error) => write!(f, "malformed structure: {error}"),
            Self::Medium(error) => write!(f, "error reading medium: {error}"),
            Self::EntryOutsideSegment(error) => fmt::Display::fmt(error, f),
            Self::MissingProgramHeaders => f.pad("file has no program headers"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> error::Error for ReadError<E> {}

/// The entry point does not lie inside the code segment.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct EntryOutsideSegmentError {
    /// The virtual address of the entry point.
    pub entry: u64,
    /// The virtual address of the start of the code segment.
    pub segment_start: u64,
    /// The virtual address one past the end of the file-backed code segment.
    pub segment_end: u64,
}

impl fmt::Display for EntryOutsideSegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry point {:#x} is outside of the code segment {:#x}..{:#x}",
            self.entry, self.segment_start, self.segment_end
        )
    }
}

impl error::Error for EntryOutsideSegmentError {}
