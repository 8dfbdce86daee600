//! Generates executables on disk and reads them back.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
};

use elf::{
    ident::{Class, Encoding},
    program_header::{SegmentFlags, SegmentType},
    reader::read_executable,
};
use elfkit::{
    action::{generate::generate, parse::parse},
    cli::{USAGE_EXIT_STATUS, generate::GenerateConfig, parse::ParseConfig},
    file::FileMedium,
};
use x86_64::program::HELLO_PROGRAM_SIZE;

fn generate_in(dir: &Path, message: &str) -> PathBuf {
    let path = dir.join("hello");
    generate(&GenerateConfig {
        path: path.clone(),
        message: message.to_owned(),
        base_address: 0x400000,
    })
    .unwrap();
    path
}

#[test]
fn generated_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_in(dir.path(), "Hi");

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 176 + HELLO_PROGRAM_SIZE + 2);
    assert_eq!(
        bytes[..16],
        [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x03, 0, 0, 0, 0, 0, 0, 0, 0]
    );

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);

    let medium = FileMedium::open(&path).unwrap();
    let executable = read_executable(&medium).unwrap();
    assert_eq!(executable.identification.class, Class::CLASS64);
    assert_eq!(executable.identification.encoding, Encoding::LSB2);
    assert_eq!(executable.program_headers.len(), 2);

    let code = executable.program_headers[0];
    let data = executable.program_headers[1];
    assert_eq!(code.segment_type, SegmentType::LOAD);
    assert_eq!(data.segment_type, SegmentType::LOAD);
    assert_eq!(code.flags, SegmentFlags::READ | SegmentFlags::EXECUTE);
    assert_eq!(data.file_size, 2);
    assert!(code.offset + code.file_size <= data.offset);

    let entry = executable.file_header.entry;
    assert!(entry >= code.virtual_address);
    assert!(entry - code.virtual_address <= code.file_size);

    let extracted = executable.extract_entry_code(&medium).unwrap();
    assert_eq!(extracted.len(), HELLO_PROGRAM_SIZE);
    assert_eq!(extracted[..7], [0x48, 0xC7, 0xC0, 0x01, 0x00, 0x00, 0x00]);
}

#[test]
fn parse_prints_structures() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_in(dir.path(), "Hi");

    let mut out = Vec::new();
    parse(
        &ParseConfig {
            path,
            extract_code: true,
        },
        &mut out,
    )
    .unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("Class: ELF64\n"));
    assert!(out.contains("OS/ABI: LINUX\n"));
    assert!(out.contains("program_header_count"));
    assert!(out.contains("[0] Load R-X"));
    assert!(out.contains("[1] Load RW-"));
    assert!(out.contains("Code (46 bytes):\n    48 c7 c0 01 00 00 00"));
}

#[test]
fn parse_without_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_in(dir.path(), "Hi");

    let mut out = Vec::new();
    parse(
        &ParseConfig {
            path,
            extract_code: false,
        },
        &mut out,
    )
    .unwrap();

    assert!(!String::from_utf8(out).unwrap().contains("Code"));
}

#[test]
fn corrupted_magic_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_in(dir.path(), "Hi");

    let mut bytes = fs::read(&path).unwrap();
    bytes[1] = 0x00;
    fs::write(&path, bytes).unwrap();

    let error = parse(
        &ParseConfig {
            path,
            extract_code: true,
        },
        &mut Vec::new(),
    )
    .unwrap_err();
    assert!(format!("{error:#}").contains("invalid ELF magic bytes"));
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let result = parse(
        &ParseConfig {
            path: dir.path().join("missing"),
            extract_code: true,
        },
        &mut Vec::new(),
    );
    assert!(result.is_err());
}

#[test]
fn entry_outside_code_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_in(dir.path(), "Hi");

    let mut bytes = fs::read(&path).unwrap();
    bytes[24..32].copy_from_slice(&0x500000u64.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let mut out = Vec::new();
    let error = parse(
        &ParseConfig {
            path,
            extract_code: true,
        },
        &mut out,
    )
    .unwrap_err();

    assert!(format!("{error:#}").contains("outside of the code segment"));
    assert!(out.is_empty());
}

#[test]
fn failed_generate_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello");
    fs::write(&path, b"precious").unwrap();

    let result = generate(&GenerateConfig {
        path: path.clone(),
        message: "Hi".to_owned(),
        base_address: 0x8000_0000,
    });

    assert!(result.is_err());
    assert_eq!(fs::read(&path).unwrap(), b"precious");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn failed_generate_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello");

    let result = generate(&GenerateConfig {
        path: path.clone(),
        message: "Hi".to_owned(),
        base_address: 0x400010,
    });

    assert!(result.is_err());
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn generate_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello"), b"stale").unwrap();

    let path = generate_in(dir.path(), "Hi");
    let executable = read_executable(&FileMedium::open(&path).unwrap()).unwrap();
    assert_eq!(executable.program_headers.len(), 2);
}

#[test]
fn binary_exit_statuses() {
    let elfkit = env!("CARGO_BIN_EXE_elfkit");

    let status = Command::new(elfkit).arg("gen").arg("only-a-path").status().unwrap();
    assert_eq!(status.code(), Some(USAGE_EXIT_STATUS));

    let status = Command::new(elfkit).arg("help").status().unwrap();
    assert_eq!(status.code(), Some(0));
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
#[test]
fn generated_executable_prints_message() {
    let dir = tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).unwrap();
    let path = generate_in(dir.path(), "Hello, world!\n");

    let output = Command::new(&path).output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, b"Hello, world!\n");
}
