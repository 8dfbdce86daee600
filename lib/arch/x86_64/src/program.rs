//! Fixed instruction sequences for the Linux `x86_64` system call ABI.

use alloc::vec::Vec;

use crate::instruction::{ImmediateOutOfRangeError, Instruction, Register};

/// The system call number of `write`.
pub const SYS_WRITE: u64 = 1;
/// The system call number of `exit`.
pub const SYS_EXIT: u64 = 60;
/// The file descriptor of standard output.
pub const STDOUT: u64 = 1;

/// The size, in bytes, of the code produced by [`encode_hello_program()`].
///
/// Immediates have a fixed width, so this does not depend on the pointer or length.
pub const HELLO_PROGRAM_SIZE: usize =
    6 * Instruction::MOVE_IMMEDIATE_SIZE + 2 * Instruction::SYSCALL_SIZE;

/// Returns the instructions of `write(STDOUT, pointer, length)`.
///
/// # Errors
///
/// Returns [`ImmediateOutOfRangeError`] if `pointer` or `length` cannot be loaded through an
/// immediate.
pub fn write(pointer: u64, length: u64) -> Result<[Instruction; 5], ImmediateOutOfRangeError> {
    Ok([
        Instruction::move_immediate(Register::Rax, SYS_WRITE)?,
        Instruction::move_immediate(Register::Rdi, STDOUT)?,
        Instruction::move_immediate(Register::Rsi, pointer)?,
        Instruction::move_immediate(Register::Rdx, length)?,
        Instruction::Syscall,
    ])
}

/// Returns the instructions of `exit(code)`.
///
/// # Errors
///
/// Returns [`ImmediateOutOfRangeError`] if `code` cannot be loaded through an immediate.
pub fn exit(code: u64) -> Result<[Instruction; 3], ImmediateOutOfRangeError> {
    Ok([
        Instruction::move_immediate(Register::Rax, SYS_EXIT)?,
        Instruction::move_immediate(Register::Rdi, code)?,
        Instruction::Syscall,
    ])
}

/// Encodes `instructions` back to back.
pub fn encode(instructions: &[Instruction]) -> Vec<u8> {
    let size = instructions.iter().map(Instruction::encoded_size).sum();

    let mut code = Vec::with_capacity(size);
    for instruction in instructions {
        instruction.encode(&mut code);
    }
    code
}

/// Encodes `write(STDOUT, pointer, length)`.
///
/// # Errors
///
/// Returns [`ImmediateOutOfRangeError`] if `pointer` or `length` cannot be loaded through an
/// immediate.
pub fn encode_write(pointer: u64, length: u64) -> Result<Vec<u8>, ImmediateOutOfRangeError> {
    write(pointer, length).map(|instructions| encode(&instructions))
}

/// Encodes `exit(code)`.
///
/// # Errors
///
/// Returns [`ImmediateOutOfRangeError`] if `code` cannot be loaded through an immediate.
pub fn encode_exit(code: u64) -> Result<Vec<u8>, ImmediateOutOfRangeError> {
    exit(code).map(|instructions| encode(&instructions))
}

/// Encodes a program that writes `length` bytes at `pointer` to standard output and then exits
/// with status zero.
///
/// # Errors
///
/// Returns [`ImmediateOutOfRangeError`] if `pointer` or `length` cannot be loaded through an
/// immediate.
pub fn encode_hello_program(
    pointer: u64,
    length: u64,
) -> Result<Vec<u8>, ImmediateOutOfRangeError> {
    let mut code = encode_write(pointer, length)?;
    code.extend(encode_exit(0)?);
    Ok(code)
}

#[cfg(test)]
mod test {
    use super::{HELLO_PROGRAM_SIZE, encode_exit, encode_hello_program, encode_write};

    #[test]
    fn write_sequence() {
        let code = encode_write(0x4010EE, 2).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x48, 0xC7, 0xC0, 0x01, 0x00, 0x00, 0x00,
            0x48, 0xC7, 0xC7, 0x01, 0x00, 0x00, 0x00,
            0x48, 0xC7, 0xC6, 0xEE, 0x10, 0x40, 0x00,
            0x48, 0xC7, 0xC2, 0x02, 0x00, 0x00, 0x00,
            0x0F, 0x05,
        ];
        assert_eq!(code, expected);
    }

    #[test]
    fn exit_sequence() {
        let code = encode_exit(0).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x48, 0xC7, 0xC0, 0x3C, 0x00, 0x00, 0x00,
            0x48, 0xC7, 0xC7, 0x00, 0x00, 0x00, 0x00,
            0x0F, 0x05,
        ];
        assert_eq!(code, expected);
    }

    #[test]
    fn hello_program_is_write_then_exit() {
        let code = encode_hello_program(0x1000, 5).unwrap();

        assert_eq!(code.len(), HELLO_PROGRAM_SIZE);
        assert_eq!(code[..30], encode_write(0x1000, 5).unwrap()[..]);
        assert_eq!(code[30..], encode_exit(0).unwrap()[..]);
    }

    #[test]
    fn hello_program_size_is_value_independent() {
        assert_eq!(encode_hello_program(0, 0).unwrap().len(), HELLO_PROGRAM_SIZE);
        assert_eq!(
            encode_hello_program(0x7FFF_FFFF, 0x7FFF_FFFF).unwrap().len(),
            HELLO_PROGRAM_SIZE
        );
        assert_eq!(HELLO_PROGRAM_SIZE, 46);
    }

    #[test]
    fn out_of_range_pointer() {
        assert!(encode_hello_program(0x1_0000_0000, 1).is_err());
    }
}
