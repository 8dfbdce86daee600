//! The 16-byte identification block at the start of every ELF file.

use core::{error, fmt};

/// The magic bytes that identify the start of an ELF file.
pub const MAGIC_BYTES: [u8; 4] = [0x7F, b'E', b'L', b'F'];
/// The size, in bytes, of the identification block.
pub const IDENT_SIZE: usize = 16;
/// The current version of the identification block.
pub const CURRENT_VERSION: u8 = 1;

/// Byte offset of the [`Class`].
pub const CLASS_OFFSET: usize = 4;
/// Byte offset of the [`Encoding`].
pub const ENCODING_OFFSET: usize = 5;
/// Byte offset of the identification version.
pub const VERSION_OFFSET: usize = 6;
/// Byte offset of the [`OsAbi`].
pub const OS_ABI_OFFSET: usize = 7;
/// Byte offset of the ABI version.
pub const ABI_VERSION_OFFSET: usize = 8;

/// Returns `true` if `bytes` starts with [`MAGIC_BYTES`].
pub fn verify_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC_BYTES)
}

/// Decodes the identification block `bytes`.
///
/// # Errors
///
/// - [`IdentError::InvalidMagic`]: `bytes` does not start with [`MAGIC_BYTES`].
/// - [`IdentError::UnsupportedClass`]: The [`Class`] is neither 32-bit nor 64-bit.
/// - [`IdentError::UnsupportedEncoding`]: The [`Encoding`] is neither little-endian nor
///   big-endian.
pub fn decode_identification(bytes: &[u8; IDENT_SIZE]) -> Result<Identification, IdentError> {
    if !verify_magic(bytes) {
        return Err(IdentError::InvalidMagic([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]));
    }

    let class = Class(bytes[CLASS_OFFSET]);
    if class != Class::CLASS32 && class != Class::CLASS64 {
        return Err(IdentError::UnsupportedClass(class));
    }

    let encoding = Encoding(bytes[ENCODING_OFFSET]);
    if encoding != Encoding::LSB2 && encoding != Encoding::MSB2 {
        return Err(IdentError::UnsupportedEncoding(encoding));
    }

    Ok(Identification {
        class,
        encoding,
        version: bytes[VERSION_OFFSET],
        os_abi: OsAbi(bytes[OS_ABI_OFFSET]),
        abi_version: bytes[ABI_VERSION_OFFSET],
    })
}

/// Returns the conventional label of the OS/ABI `code`, or `"UNKNOWN"`.
pub fn os_abi_label(code: u8) -> &'static str {
    OsAbi(code).label().unwrap_or("UNKNOWN")
}

/// The decoded identification block.
///
/// The magic bytes are implied; an [`Identification`] only exists for blocks that carried them.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Identification {
    /// The [`Class`] of the file.
    pub class: Class,
    /// The [`Encoding`] of the file.
    pub encoding: Encoding,
    /// The version of the identification block.
    pub version: u8,
    /// The [`OsAbi`] targeted by the file.
    pub os_abi: OsAbi,
    /// The version of the ABI targeted by the file.
    pub abi_version: u8,
}

impl Identification {
    /// The identification of a 64-bit little-endian Linux file.
    pub const fn linux_x86_64() -> Self {
        Self {
            class: Class::CLASS64,
            encoding: Encoding::LSB2,
            version: CURRENT_VERSION,
            os_abi: OsAbi::LINUX,
            abi_version: 0,
        }
    }

    /// Encodes this [`Identification`], zero filling the padding.
    pub const fn encode(&self) -> [u8; IDENT_SIZE] {
        let mut bytes = [0; IDENT_SIZE];
        bytes[0] = MAGIC_BYTES[0];
        bytes[1] = MAGIC_BYTES[1];
        bytes[2] = MAGIC_BYTES[2];
        bytes[3] = MAGIC_BYTES[3];
        bytes[CLASS_OFFSET] = self.class.0;
        bytes[ENCODING_OFFSET] = self.encoding.0;
        bytes[VERSION_OFFSET] = self.version;
        bytes[OS_ABI_OFFSET] = self.os_abi.0;
        bytes[ABI_VERSION_OFFSET] = self.abi_version;
        bytes
    }
}

/// Various errors that can occur when decoding an [`Identification`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentError {
    /// The block does not start with [`MAGIC_BYTES`].
    InvalidMagic([u8; 4]),
    /// The [`Class`] is not supported.
    UnsupportedClass(Class),
    /// The [`Encoding`] is not supported.
    UnsupportedEncoding(Encoding),
}

impl fmt::Display for IdentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic(bytes) => write!(f, "invalid ELF magic bytes: {bytes:02x?}"),
            Self::UnsupportedClass(class) => write!(f, "unsupported ELF class: {class:?}"),
            Self::UnsupportedEncoding(encoding) => {
                write!(f, "unsupported ELF data encoding: {encoding:?}")
            }
        }
    }
}

impl error::Error for IdentError {}

/// Specifier of the ELF file class, which determines the sizing of various items in the ELF
/// file format.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Class(pub u8);

impl Class {
    /// Invalid [`Class`] specifier.
    pub const NONE: Self = Self(0);
    /// ELF file is formatted in its 32-bit format.
    pub const CLASS32: Self = Self(1);
    /// ELF file is formatted in its 64-bit format.
    pub const CLASS64: Self = Self(2);
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.pad("Unknown"),
            Self::CLASS32 => f.pad("ELF32"),
            Self::CLASS64 => f.pad("ELF64"),
            class => f.debug_tuple("Class").field(&class.0).finish(),
        }
    }
}

/// Specifier of the ELF file data encoding.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Encoding(pub u8);

impl Encoding {
    /// Invalid [`Encoding`] specifier.
    pub const NONE: Self = Self(0);
    /// Two's complement little-endian integers.
    pub const LSB2: Self = Self(1);
    /// Two's complement big-endian integers.
    pub const MSB2: Self = Self(2);
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.pad("Unknown"),
            Self::LSB2 => f.pad("2's complement, little endian"),
            Self::MSB2 => f.pad("2's complement, big endian"),
            encoding => f.debug_tuple("Encoding").field(&encoding.0).finish(),
        }
    }
}

/// Specifier of the OS or ABI specific ELF extensions used by this file.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct OsAbi(pub u8);

impl OsAbi {
    /// UNIX System V.
    pub const SYSV: Self = Self(0);
    /// HP-UX.
    pub const HPUX: Self = Self(1);
    /// NetBSD.
    pub const NETBSD: Self = Self(2);
    /// Linux.
    pub const LINUX: Self = Self(3);
    /// Sun Solaris.
    pub const SOLARIS: Self = Self(6);
    /// IBM AIX.
    pub const AIX: Self = Self(7);
    /// SGI Irix.
    pub const IRIX: Self = Self(8);
    /// FreeBSD.
    pub const FREEBSD: Self = Self(9);
    /// Compaq TRU64 UNIX.
    pub const TRU64: Self = Self(10);
    /// Novell Modesto.
    pub const MODESTO: Self = Self(11);
    /// OpenBSD.
    pub const OPENBSD: Self = Self(12);
    /// ARM EABI.
    pub const ARM_AEABI: Self = Self(64);
    /// ARM.
    pub const ARM: Self = Self(97);
    /// Standalone (embedded) application.
    pub const STANDALONE: Self = Self(255);

    /// Every labelled [`OsAbi`] together with its label.
    const LABELS: &[(Self, &'static str)] = &[
        (Self::SYSV, "SYSV"),
        (Self::HPUX, "HPUX"),
        (Self::NETBSD, "NETBSD"),
        (Self::LINUX, "LINUX"),
        (Self::SOLARIS, "SOLARIS"),
        (Self::AIX, "AIX"),
        (Self::IRIX, "IRIX"),
        (Self::FREEBSD, "FREEBSD"),
        (Self::TRU64, "TRU64"),
        (Self::MODESTO, "MODESTO"),
        (Self::OPENBSD, "OPENBSD"),
        (Self::ARM_AEABI, "ARM_AEABI"),
        (Self::ARM, "ARM"),
        (Self::STANDALONE, "STANDALONE"),
    ];

    /// Returns the conventional label of this [`OsAbi`], if it has one.
    pub fn label(self) -> Option<&'static str> {
        Self::LABELS
            .iter()
            .find(|(os_abi, _)| *os_abi == self)
            .map(|(_, label)| *label)
    }
}

impl fmt::Debug for OsAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.pad(label),
            None => f.debug_tuple("OsAbi").field(&self.0).finish(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{
        Class, Encoding, IdentError, Identification, MAGIC_BYTES, OsAbi, decode_identification,
        os_abi_label, verify_magic,
    };

    const LINUX_IDENT: [u8; 16] = [
        0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x03, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    #[test]
    fn encode_linux_x86_64() {
        assert_eq!(Identification::linux_x86_64().encode(), LINUX_IDENT);
    }

    #[test]
    fn decode_linux_x86_64() {
        assert_eq!(
            decode_identification(&LINUX_IDENT),
            Ok(Identification::linux_x86_64())
        );
    }

    #[test]
    fn magic_detects_every_byte() {
        assert!(verify_magic(&MAGIC_BYTES));
        assert!(verify_magic(&LINUX_IDENT));
        assert!(!verify_magic(&MAGIC_BYTES[..3]));

        for index in 0..MAGIC_BYTES.len() {
            let mut bytes = LINUX_IDENT;
            bytes[index] ^= 0xFF;
            assert!(!verify_magic(&bytes), "byte {index} was not checked");
        }
    }

    #[test]
    fn corrupted_magic() {
        let mut bytes = LINUX_IDENT;
        bytes[1] = 0x00;

        assert_eq!(
            decode_identification(&bytes),
            Err(IdentError::InvalidMagic([0x7F, 0x00, 0x4C, 0x46]))
        );
    }

    #[test]
    fn unsupported_class_and_encoding() {
        let mut bytes = LINUX_IDENT;
        bytes[4] = 0;
        assert_eq!(
            decode_identification(&bytes),
            Err(IdentError::UnsupportedClass(Class::NONE))
        );

        let mut bytes = LINUX_IDENT;
        bytes[5] = 7;
        assert_eq!(
            decode_identification(&bytes),
            Err(IdentError::UnsupportedEncoding(Encoding(7)))
        );
    }

    #[test]
    fn big_endian_identification_decodes() {
        let mut bytes = LINUX_IDENT;
        bytes[5] = 2;

        let ident = decode_identification(&bytes).unwrap();
        assert_eq!(ident.encoding, Encoding::MSB2);
    }

    #[test]
    fn os_abi_labels() {
        assert_eq!(os_abi_label(3), "LINUX");
        assert_eq!(os_abi_label(64), "ARM_AEABI");
        assert_eq!(os_abi_label(255), "STANDALONE");
        assert_eq!(os_abi_label(4), "UNKNOWN");
        assert_eq!(OsAbi::SOLARIS.label(), Some("SOLARIS"));
    }
}
