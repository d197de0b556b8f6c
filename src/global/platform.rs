use crate::ltac::register::FloatRegister;
use crate::ltac::register::Register;
use strum::Display;

/// Compilation targets supported by the back-end.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Target {
    X86,
    X86_64,
}

impl Target {
    /// Auto-detect the target from the host pointer width.
    pub fn detect() -> Target {
        if cfg!(target_pointer_width = "64") {
            Target::X86_64
        } else {
            Target::X86
        }
    }
}

/// Descriptor of a target platform: primitive sizes, the register file,
/// and the calling convention registers. The middle-end never hardcodes
/// any of these outside this table.
#[derive(Debug, Clone)]
pub struct Platform {
    pub target: Target,
    /// Size of integers, booleans, chars and pointers.
    pub word_size: usize,
    pub float_size: usize,
    /// General-purpose registers available for allocation, allocation order.
    pub registers: Vec<Register>,
    pub float_registers: Vec<FloatRegister>,
    /// Registers used for the first integer parameters, in slot order.
    pub int_param_registers: Vec<Register>,
    pub float_param_registers: Vec<FloatRegister>,
    /// Registers the callee may not preserve.
    pub caller_saved: Vec<Register>,
    pub callee_saved: Vec<Register>,
    /// First and second integer return registers (pointer, length for strings).
    pub int_return_registers: [Register; 2],
    pub float_return_register: FloatRegister,
    pub stack_pointer: Register,
    pub base_pointer: Register,
}

impl Platform {
    pub fn new(target: Target) -> Platform {
        match target {
            Target::X86 => Platform {
                target,
                word_size: 4,
                float_size: 8,
                registers: vec![
                    Register::AX,
                    Register::BX,
                    Register::CX,
                    Register::DX,
                    Register::SI,
                    Register::DI,
                ],
                float_registers: vec![
                    FloatRegister::XMM0,
                    FloatRegister::XMM1,
                    FloatRegister::XMM2,
                    FloatRegister::XMM3,
                ],
                int_param_registers: vec![Register::CX, Register::DX],
                float_param_registers: vec![FloatRegister::XMM0, FloatRegister::XMM1],
                caller_saved: vec![Register::AX, Register::CX, Register::DX],
                callee_saved: vec![Register::BX, Register::SI, Register::DI],
                int_return_registers: [Register::AX, Register::DX],
                float_return_register: FloatRegister::XMM0,
                stack_pointer: Register::SP,
                base_pointer: Register::BP,
            },
            Target::X86_64 => Platform {
                target,
                word_size: 8,
                float_size: 8,
                registers: vec![
                    Register::AX,
                    Register::BX,
                    Register::CX,
                    Register::DX,
                    Register::SI,
                    Register::DI,
                    Register::R8,
                    Register::R9,
                    Register::R10,
                    Register::R11,
                    Register::R12,
                    Register::R13,
                    Register::R14,
                    Register::R15,
                ],
                float_registers: vec![
                    FloatRegister::XMM0,
                    FloatRegister::XMM1,
                    FloatRegister::XMM2,
                    FloatRegister::XMM3,
                    FloatRegister::XMM4,
                    FloatRegister::XMM5,
                    FloatRegister::XMM6,
                    FloatRegister::XMM7,
                ],
                int_param_registers: vec![
                    Register::DI,
                    Register::SI,
                    Register::DX,
                    Register::CX,
                    Register::R8,
                    Register::R9,
                ],
                float_param_registers: vec![
                    FloatRegister::XMM0,
                    FloatRegister::XMM1,
                    FloatRegister::XMM2,
                    FloatRegister::XMM3,
                ],
                caller_saved: vec![
                    Register::AX,
                    Register::CX,
                    Register::DX,
                    Register::SI,
                    Register::DI,
                    Register::R8,
                    Register::R9,
                    Register::R10,
                    Register::R11,
                ],
                callee_saved: vec![
                    Register::BX,
                    Register::R12,
                    Register::R13,
                    Register::R14,
                    Register::R15,
                ],
                int_return_registers: [Register::AX, Register::DX],
                float_return_register: FloatRegister::XMM0,
                stack_pointer: Register::SP,
                base_pointer: Register::BP,
            },
        }
    }

    pub fn is_caller_saved(&self, register: Register) -> bool {
        self.caller_saved.contains(&register)
    }
}
