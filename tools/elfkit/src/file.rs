//! [`Medium`] and [`ByteSink`] implementations backed by files.

use std::{
    fs::{File, Permissions},
    io::{self, BufWriter, Write},
    os::unix::fs::{FileExt, PermissionsExt},
    path::{Path, PathBuf},
};

use elf::{
    medium::{Medium, MediumError, check_bounds},
    sink::ByteSink,
};
use tempfile::NamedTempFile;

/// The permissions of a generated executable: `rwxr-xr-x`.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// A read-only [`Medium`] over an open file.
///
/// The file is closed when the [`FileMedium`] is dropped.
#[derive(Debug)]
pub struct FileMedium {
    /// The underlying file.
    file: File,
    /// The size of the file when it was opened.
    size: u64,
}

impl FileMedium {
    /// Opens the file at `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] if the file cannot be opened or its metadata cannot be read.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        log::trace!("opened \"{}\" ({size} bytes)", path.display());

        Ok(Self { file, size })
    }
}

impl Medium for FileMedium {
    type Error = io::Error;

    fn size(&self) -> u64 {
        self.size
    }

    fn read_slice(&self, offset: u64, slice: &mut [u8]) -> Result<(), MediumError<Self::Error>> {
        let length = u64::try_from(slice.len()).unwrap_or(u64::MAX);
        check_bounds::<Self::Error>(self.size, offset, length)?;
        log::trace!("reading {} bytes at offset {offset:#x}", slice.len());

        self.file.read_exact_at(slice, offset)?;
        Ok(())
    }
}

/// A [`ByteSink`] that replaces a file with the written bytes and marks it executable.
///
/// Bytes are written to a temporary file next to the destination, which is created on the
/// first write. [`ByteSink::finalize()`] moves it over the destination. A [`FileSink`] dropped
/// before finalizing removes the temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct FileSink {
    /// The path the finished file is moved to.
    path: PathBuf,
    /// The buffered temporary file, once the first byte has been written.
    writer: Option<BufWriter<NamedTempFile>>,
}

impl FileSink {
    /// Creates a [`FileSink`] that will replace the file at `path`.
    ///
    /// Nothing is created on disk until bytes are written.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
        }
    }

    /// Creates the temporary file the bytes are written to before being moved to the path.
    fn stage(&self) -> io::Result<BufWriter<NamedTempFile>> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file = NamedTempFile::new_in(directory)?;
        log::trace!(
            "staging \"{}\" in \"{}\"",
            self.path.display(),
            file.path().display()
        );
        Ok(BufWriter::new(file))
    }
}

impl ByteSink for FileSink {
    type Error = io::Error;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.stage()?,
        };

        self.writer.insert(writer).write_all(bytes)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.stage()?,
        };

        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.as_file()
            .set_permissions(Permissions::from_mode(EXECUTABLE_MODE))?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{fs, os::unix::fs::PermissionsExt};

    use elf::{
        medium::{Medium, MediumError, read_vec},
        sink::ByteSink,
    };

    use super::{EXECUTABLE_MODE, FileMedium, FileSink};

    #[test]
    fn medium_reads_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, [0, 1, 2, 3, 4, 5, 6, 7]).unwrap();

        let medium = FileMedium::open(&path).unwrap();
        assert_eq!(medium.size(), 8);
        assert_eq!(read_vec(&medium, 2, 3).unwrap(), [2, 3, 4]);
        assert!(matches!(
            read_vec(&medium, 6, 3),
            Err(MediumError::BoundsError {
                offset: 6,
                length: 3,
                size: 8,
            })
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(FileMedium::open(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn sink_marks_file_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");

        let mut sink = FileSink::create(&path);
        sink.write_bytes(b"abc").unwrap();
        sink.write_bytes(b"def").unwrap();
        sink.finalize().unwrap();
        drop(sink);

        assert_eq!(fs::read(&path).unwrap(), b"abcdef");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, EXECUTABLE_MODE);
    }

    #[test]
    fn sink_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, b"old contents").unwrap();

        let mut sink = FileSink::create(&path);
        sink.write_bytes(b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"old contents");

        sink.finalize().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn unfinalized_sink_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, b"old contents").unwrap();

        let mut sink = FileSink::create(&path);
        sink.write_bytes(b"partial").unwrap();
        drop(sink);

        assert_eq!(fs::read(&path).unwrap(), b"old contents");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
