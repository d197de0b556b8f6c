use crate::error::MiddleEndError;
use crate::global::config::CompilerConfig;
use crate::global::platform::Platform;
use crate::ltac::LtacFunction;
use crate::ltac::compiler::LtacCompiler;
use crate::ltac::peephole;
use crate::ltac::register_allocator;
use crate::mtac::Program;
use crate::mtac::extractor;
use crate::mtac::printer;
use crate::optimizer::Optimizer;
use log::debug;

/// The native back-end: drives a program from the front-end's linear
/// MTAC streams to assembly-ready LTAC. Basic-block extraction,
/// optimization, lowering, register allocation and the peephole run in
/// that order; the dump flags tap the pipeline in between.
pub struct NativeBackEnd {
    pub config: CompilerConfig,
    pub platform: Platform,
}

impl NativeBackEnd {
    pub fn new(config: CompilerConfig) -> NativeBackEnd {
        let platform = Platform::new(config.target);
        NativeBackEnd { config, platform }
    }

    /// Processes a whole compilation unit. Returns one lowered function
    /// per input function, or nothing when `mtac_only` is set.
    pub fn process(&self, mut program: Program) -> Result<Vec<LtacFunction>, MiddleEndError> {
        for function in &mut program.functions {
            extractor::extract_basic_blocks(function)?;
        }

        if self.config.mtac || self.config.mtac_opt || self.config.mtac_only {
            printer::dump(&program, "before optimization");
        }

        let optimizer = Optimizer::new(&self.config);
        optimizer.optimize(&mut program);

        if self.config.mtac_opt || self.config.mtac_only {
            printer::dump(&program, "after optimization");
        }
        if self.config.mtac_only {
            return Ok(Vec::new());
        }

        let compiler = LtacCompiler::new(&self.platform, &self.config, &program.global);
        let mut functions = compiler.compile(&program)?;

        for function in &mut functions {
            register_allocator::allocate(function, &self.platform)?;
            peephole::optimize(function);
            debug!(
                "{}: {} instructions ready for code generation",
                function.name,
                function.instructions.len()
            );
        }

        Ok(functions)
    }
}
