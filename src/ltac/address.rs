use crate::ltac::register::Register;
use std::fmt;

/// Base or index of a memory address: a hard register, or a pseudo
/// integer register that allocation will pin down. No pseudo may
/// survive past register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseRegister {
    Register(Register),
    Pseudo(u32),
}

impl fmt::Display for BaseRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseRegister::Register(register) => write!(f, "{register}"),
            BaseRegister::Pseudo(id) => write!(f, "pr{id}"),
        }
    }
}

/// `base + index·scale + displacement` or `absolute_label +
/// displacement`. Invariant: a label or at least a base register is
/// present; scale is 0, 1, 2, 4 or 8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub base: Option<BaseRegister>,
    pub index: Option<BaseRegister>,
    pub scale: u8,
    pub displacement: i32,
    pub label: Option<String>,
}

impl Address {
    pub fn base_offset(base: BaseRegister, displacement: i32) -> Address {
        Address {
            base: Some(base),
            index: None,
            scale: 0,
            displacement,
            label: None,
        }
    }

    pub fn absolute(label: impl Into<String>) -> Address {
        Address {
            base: None,
            index: None,
            scale: 0,
            displacement: 0,
            label: Some(label.into()),
        }
    }

    pub fn indexed(
        base: Option<BaseRegister>,
        index: BaseRegister,
        scale: u8,
        displacement: i32,
        label: Option<String>,
    ) -> Address {
        Address {
            base,
            index: Some(index),
            scale,
            displacement,
            label,
        }
    }

    pub fn is_valid(&self) -> bool {
        (self.label.is_some() || self.base.is_some())
            && matches!(self.scale, 0 | 1 | 2 | 4 | 8)
    }

    /// Pseudo registers still referenced by this address.
    pub fn pseudos(&self) -> impl Iterator<Item = u32> {
        [self.base, self.index]
            .into_iter()
            .flatten()
            .filter_map(|register| match register {
                BaseRegister::Pseudo(id) => Some(id),
                BaseRegister::Register(_) => None,
            })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let mut first = true;
        if let Some(label) = &self.label {
            write!(f, "{label}")?;
            first = false;
        }
        if let Some(base) = &self.base {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{base}")?;
            first = false;
        }
        if let Some(index) = &self.index {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{index}")?;
            if self.scale > 1 {
                write!(f, "*{}", self.scale)?;
            }
            first = false;
        }
        if self.displacement != 0 || first {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{}", self.displacement)?;
        }
        write!(f, "]")
    }
}
