pub mod abi;
pub mod analysis;
pub mod back_end;
pub mod error;
pub mod global;
pub mod logger;
pub mod ltac;
pub mod mtac;
pub mod optimizer;
pub mod types;
pub mod variables;
