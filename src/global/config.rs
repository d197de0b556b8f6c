use crate::global::platform::Target;

/// Runtime configuration flag set selecting which passes run and what
/// gets dumped. Each flag is independently toggleable.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Meta-flag enabling the whole optimization pipeline.
    pub optimize_all: bool,
    /// Enables string-specific optimizations.
    pub optimize_strings: bool,
    /// Enables removal of unused and empty functions.
    pub optimize_unused: bool,
    /// Dump MTAC before and after optimization.
    pub mtac_opt: bool,
    /// Dump MTAC after optimization.
    pub mtac: bool,
    /// Dump MTAC and skip code generation entirely.
    pub mtac_only: bool,
    /// Allocate the first eligible parameters to registers.
    pub fparameter_allocation: bool,
    pub target: Target,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimize_all: false,
            optimize_strings: false,
            optimize_unused: false,
            mtac_opt: false,
            mtac: false,
            mtac_only: false,
            fparameter_allocation: true,
            target: Target::detect(),
        }
    }
}

impl CompilerConfig {
    pub fn optimized(target: Target) -> Self {
        CompilerConfig {
            optimize_all: true,
            optimize_strings: true,
            optimize_unused: true,
            target,
            ..CompilerConfig::default()
        }
    }
}
