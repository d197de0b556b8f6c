use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;
use std::fmt;
use strum::Display;

/// Hard integer registers, numbered in the platform's natural encoding
/// order. Which of them exist, which are parameter registers and which
/// are caller-saved is described by the platform descriptor.
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum Register {
    AX = 0,
    BX,
    CX,
    DX,
    SI,
    DI,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    /// Stack pointer sentinel.
    SP,
    /// Base pointer sentinel.
    BP,
}

/// Hard floating-point registers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum FloatRegister {
    XMM0 = 0,
    XMM1,
    XMM2,
    XMM3,
    XMM4,
    XMM5,
    XMM6,
    XMM7,
}

/// A virtual integer register, assigned to a hard register or a spill
/// slot by the register allocator. A bound pseudo-register hints the
/// allocator to prefer a specific hard register (return values,
/// parameter registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PseudoRegister {
    pub id: u32,
    pub bound: Option<Register>,
}

impl PseudoRegister {
    pub fn new(id: u32) -> Self {
        PseudoRegister { id, bound: None }
    }

    pub fn bound(id: u32, register: Register) -> Self {
        PseudoRegister {
            id,
            bound: Some(register),
        }
    }

    pub fn bound_to(self, register: Register) -> Self {
        PseudoRegister {
            bound: Some(register),
            ..self
        }
    }
}

impl fmt::Display for PseudoRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Some(register) => write!(f, "pr{}({})", self.id, register),
            None => write!(f, "pr{}", self.id),
        }
    }
}

/// A virtual floating-point register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PseudoFloatRegister {
    pub id: u32,
    pub bound: Option<FloatRegister>,
}

impl PseudoFloatRegister {
    pub fn new(id: u32) -> Self {
        PseudoFloatRegister { id, bound: None }
    }

    pub fn bound(id: u32, register: FloatRegister) -> Self {
        PseudoFloatRegister {
            id,
            bound: Some(register),
        }
    }
}

impl fmt::Display for PseudoFloatRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Some(register) => write!(f, "pfr{}({})", self.id, register),
            None => write!(f, "pfr{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_round_trip_through_their_encoding() {
        for register in [Register::AX, Register::DI, Register::R15, Register::BP] {
            let encoded: u8 = register.into();
            assert_eq!(Register::try_from(encoded).unwrap(), register);
        }
        assert!(Register::try_from(200u8).is_err());

        let encoded: u8 = FloatRegister::XMM7.into();
        assert_eq!(FloatRegister::try_from(encoded).unwrap(), FloatRegister::XMM7);
    }

    #[test]
    fn bound_pseudo_registers_show_their_hint() {
        assert_eq!(PseudoRegister::new(4).to_string(), "pr4");
        assert_eq!(
            PseudoRegister::bound(4, Register::DI).to_string(),
            "pr4(DI)"
        );
    }
}
