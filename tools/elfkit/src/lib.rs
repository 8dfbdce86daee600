//! Inspection and synthesis of 64-bit ELF executables from the command line.

pub mod action;
pub mod cli;
pub mod file;
