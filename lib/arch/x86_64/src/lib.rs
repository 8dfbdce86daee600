//! Minimal `x86_64` machine code generation.
//!
//! This crate is not an assembler. It encodes exactly the instructions required to issue Linux
//! system calls (`mov r64, imm32` and `syscall`) and composes them into a fixed `write` then
//! `exit` program.
#![no_std]

extern crate alloc;

pub mod instruction;
pub mod program;
