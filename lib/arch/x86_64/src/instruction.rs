//! Encoding of the closed set of supported instructions.

use core::{error, fmt};

use alloc::vec::Vec;

/// The `REX.W` prefix, which promotes the operand size to 64 bits.
const REX_W: u8 = 0x48;
/// The `MOV r/m64, imm32` opcode.
const MOV_RM64_IMM32: u8 = 0xC7;
/// The `SYSCALL` opcode.
const SYSCALL: [u8; 2] = [0x0F, 0x05];

/// A 64-bit general purpose register that can be loaded with an immediate.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Register {
    /// The accumulator, which holds the system call number.
    Rax,
    /// The first system call argument.
    Rdi,
    /// The second system call argument.
    Rsi,
    /// The third system call argument.
    Rdx,
}

impl Register {
    /// Returns the ModRM byte that selects this [`Register`] as the direct register operand of
    /// `mov r/m64, imm32`.
    pub const fn modrm(self) -> u8 {
        match self {
            Self::Rax => 0xC0,
            Self::Rdi => 0xC7,
            Self::Rsi => 0xC6,
            Self::Rdx => 0xC2,
        }
    }
}

/// An instruction that this crate knows how to encode.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Instruction {
    /// `mov register, imm32`.
    ///
    /// The processor sign-extends the immediate to 64 bits.
    MoveImmediate {
        /// The destination [`Register`].
        register: Register,
        /// The immediate, stored little-endian in the instruction stream.
        value: u32,
    },
    /// `syscall`.
    Syscall,
}

impl Instruction {
    /// The size, in bytes, of an encoded [`Instruction::MoveImmediate`].
    pub const MOVE_IMMEDIATE_SIZE: usize = 7;
    /// The size, in bytes, of an encoded [`Instruction::Syscall`].
    pub const SYSCALL_SIZE: usize = 2;

    /// Creates an [`Instruction::MoveImmediate`] that leaves exactly `value` in `register`.
    ///
    /// # Errors
    ///
    /// Returns [`ImmediateOutOfRangeError`] if `value` would not survive the sign extension of a
    /// 32-bit immediate.
    pub fn move_immediate(
        register: Register,
        value: u64,
    ) -> Result<Self, ImmediateOutOfRangeError> {
        let value = i32::try_from(value)
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or(ImmediateOutOfRangeError { register, value })?;

        Ok(Self::MoveImmediate { register, value })
    }

    /// Returns the number of bytes [`Instruction::encode()`] appends.
    pub const fn encoded_size(&self) -> usize {
        match self {
            Self::MoveImmediate { .. } => Self::MOVE_IMMEDIATE_SIZE,
            Self::Syscall => Self::SYSCALL_SIZE,
        }
    }

    /// Appends the machine code for this [`Instruction`] to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Self::MoveImmediate { register, value } => {
                out.extend_from_slice(&[REX_W, MOV_RM64_IMM32, register.modrm()]);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Self::Syscall => out.extend_from_slice(&SYSCALL),
        }
    }
}

/// A value that cannot be loaded into a register through a sign-extended 32-bit immediate.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ImmediateOutOfRangeError {
    /// The [`Register`] that was the intended destination.
    pub register: Register,
    /// The rejected value.
    pub value: u64,
}

impl fmt::Display for ImmediateOutOfRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value {:#x} for {:?} does not fit in a sign-extended 32-bit immediate",
            self.value, self.register
        )
    }
}

impl error::Error for ImmediateOutOfRangeError {}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use super::{Instruction, Register};

    fn encode(instruction: Instruction) -> Vec<u8> {
        let mut out = Vec::new();
        instruction.encode(&mut out);
        assert_eq!(out.len(), instruction.encoded_size());
        out
    }

    #[test]
    fn mov_rax_imm32() {
        let instruction = Instruction::move_immediate(Register::Rax, 1).unwrap();
        assert_eq!(encode(instruction), [0x48, 0xC7, 0xC0, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn mov_register_codes() {
        for (register, modrm) in [
            (Register::Rax, 0xC0u8),
            (Register::Rdi, 0xC7),
            (Register::Rsi, 0xC6),
            (Register::Rdx, 0xC2),
        ] {
            let bytes = encode(Instruction::MoveImmediate {
                register,
                value: 0x1234_5678,
            });
            assert_eq!(bytes, [0x48, 0xC7, modrm, 0x78, 0x56, 0x34, 0x12]);
        }
    }

    #[test]
    fn syscall() {
        assert_eq!(encode(Instruction::Syscall), [0x0F, 0x05]);
    }

    #[test]
    fn immediate_must_survive_sign_extension() {
        assert!(Instruction::move_immediate(Register::Rsi, 0x7FFF_FFFF).is_ok());

        let error = Instruction::move_immediate(Register::Rsi, 0x8000_0000).unwrap_err();
        assert_eq!(error.register, Register::Rsi);
        assert_eq!(error.value, 0x8000_0000);

        assert!(Instruction::move_immediate(Register::Rdx, u64::MAX).is_err());
    }
}
