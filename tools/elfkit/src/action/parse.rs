//! Printing of the structures of an ELF executable.

use std::io::Write;

use anyhow::{Context, Result};
use elf::{
    ident::{Identification, os_abi_label},
    layout::{Layout, Record},
    reader::{Executable, read_executable},
};

use crate::{cli::parse::ParseConfig, file::FileMedium};

/// Reads the executable described by `config` and prints its structures to `out`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read, if it is not a 64-bit little-endian
/// ELF file, or if its entry point lies outside of its first segment.
pub fn parse<W: Write>(config: &ParseConfig, out: &mut W) -> Result<()> {
    let path = config.path.display();

    let medium =
        FileMedium::open(&config.path).with_context(|| format!("failed to open \"{path}\""))?;
    let executable =
        read_executable(&medium).with_context(|| format!("failed to parse \"{path}\""))?;

    // Extraction can still fail, so it runs before anything is printed.
    let code = config
        .extract_code
        .then(|| executable.extract_entry_code(&medium))
        .transpose()
        .with_context(|| format!("failed to extract code from \"{path}\""))?;

    write_executable(&executable, out)?;

    if let Some(code) = code {
        writeln!(out)?;
        writeln!(out, "Code ({} bytes):", code.len())?;
        write_hex(&code, out)?;
    }

    log::info!("parsed \"{path}\"");
    Ok(())
}

/// Prints the identification block, file header and program headers of `executable`.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_executable<W: Write>(executable: &Executable, out: &mut W) -> Result<()> {
    write_identification(&executable.identification, out)?;

    writeln!(out)?;
    writeln!(out, "File header:")?;
    write_record(&executable.file_header.to_record(), out)?;

    writeln!(out)?;
    writeln!(out, "Program headers:")?;
    for (index, program_header) in executable.program_headers.iter().enumerate() {
        writeln!(
            out,
            "  [{index}] {:?} {:?}",
            program_header.segment_type, program_header.flags
        )?;
        write_record(&program_header.to_record(), out)?;
    }

    Ok(())
}

/// Prints `identification` in the conventional `readelf` style.
fn write_identification<W: Write>(identification: &Identification, out: &mut W) -> Result<()> {
    writeln!(out, "Class: {:?}", identification.class)?;
    writeln!(out, "Data: {:?}", identification.encoding)?;
    writeln!(out, "Version: {}", identification.version)?;
    writeln!(out, "OS/ABI: {}", os_abi_label(identification.os_abi.0))?;
    writeln!(out, "ABI Version: {}", identification.abi_version)?;
    Ok(())
}

/// Prints every field of `record` on its own line.
fn write_record<W: Write>(record: &Record, out: &mut W) -> Result<()> {
    let width = record
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);

    for (name, value) in record.iter() {
        writeln!(out, "    {name:<width$}  {value:#x}")?;
    }

    Ok(())
}

/// Prints `bytes` as rows of sixteen hexadecimal bytes.
fn write_hex<W: Write>(bytes: &[u8], out: &mut W) -> Result<()> {
    for row in bytes.chunks(16) {
        let row = row
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "    {row}")?;
    }

    Ok(())
}
