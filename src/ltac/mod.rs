pub mod address;
pub mod compiler;
pub mod instruction;
pub mod peephole;
pub mod register;
pub mod register_allocator;

pub use address::Address;
pub use address::BaseRegister;
pub use instruction::Instruction;
pub use instruction::LtacArg;
pub use instruction::LtacFunction;
pub use instruction::LtacOp;
pub use register::FloatRegister;
pub use register::PseudoFloatRegister;
pub use register::PseudoRegister;
pub use register::Register;
