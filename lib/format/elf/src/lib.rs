//! The `elf` crate provides an interface for reading and synthesizing 64-bit ELF executables.
//!
//! # Capabilities
//!
//! ## Schema Driven Layout
//!
//! Every on-disk structure is described by a [`Schema`][layout::Schema] of fixed-width unsigned
//! fields. A single codec encodes and decodes any schema, and typed structures such as
//! [`FileHeader`][file_header::FileHeader] and [`ProgramHeader`][program_header::ProgramHeader]
//! convert to and from the generic [`Record`][layout::Record].
//!
//! ## Works in `no_std` environments
//!
//! This crate only requires `alloc`, so it can be used in `no_std` contexts. File access is
//! provided by the caller through the [`Medium`][medium::Medium] and
//! [`ByteSink`][sink::ByteSink] traits.
//!
//! ## Little-endian Only
//!
//! Identification blocks of any encoding are recognized, but only little-endian structures are
//! decoded.
//!
//! ## Uses no unsafe code
//!
//! This crate contains zero unsafe blocks of code.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod builder;
pub mod file_header;
pub mod ident;
pub mod layout;
pub mod medium;
pub mod program_header;
pub mod reader;
pub mod sink;

/// Safely converts `value` to a `u64` relying on compile time code checking.
#[allow(clippy::cast_possible_truncation, reason = "implementation of type-safe as cast")]
const fn usize_to_u64(value: usize) -> u64 {
    #[cfg(not(any(
        target_pointer_width = "16",
        target_pointer_width = "32",
        target_pointer_width = "64"
    )))]
    compile_error!("library supports only 16-bit, 32-bit, and 64-bit usize");
    value as u64
}

/// Safely converts `value` to a `usize` relying on compile time code checking.
///
/// Callers must ensure `value` is bounded by the size of something in memory.
#[allow(clippy::cast_possible_truncation, reason = "implementation of type-safe as cast")]
const fn u64_to_usize(value: u64) -> usize {
    #[cfg(not(target_pointer_width = "64"))]
    compile_error!("library supports only 64-bit usize");
    value as usize
}
