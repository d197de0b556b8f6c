pub mod arithmetic_identities;
pub mod block_cleanup;
pub mod common_subexpression_elimination;
pub mod constant_folding;
pub mod constant_propagation;
pub mod copy_propagation;
pub mod dead_code_elimination;
pub mod empty_loops;
pub mod function_cleanup;
pub mod induction_variables;
pub mod licm;
pub mod loop_peeling;
pub mod math_propagation;
pub mod offset_constant_propagation;
pub mod pointer_propagation;
pub mod remove_assign;
pub mod sign_reduction;

use crate::analysis::escape;
use crate::analysis::liveness;
use crate::analysis::liveness::LiveSet;
use crate::analysis::DataFlowResults;
use crate::global::config::CompilerConfig;
use crate::mtac::Program;
use crate::mtac::cfg;
use crate::mtac::dominators;
use crate::mtac::function::Function;
use crate::mtac::loops;
use bitflags::bitflags;
use log::debug;
use strum::Display;

bitflags! {
    /// Analyses a pass may require and a changed pass may invalidate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Property: u32 {
        const CFG = 1 << 0;
        const DOMINATORS = 1 << 1;
        const LOOPS = 1 << 2;
        const LIVENESS = 1 << 3;
        const ESCAPE = 1 << 4;
        /// Any statement-level data-flow result.
        const DEFINITIONS = 1 << 5;
    }
}

bitflags! {
    /// Maintenance work owed after a pass that reported changes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TodoAfter: u32 {
        const REMOVE_NOP = 1 << 0;
        const MERGE_BASIC_BLOCKS = 1 << 1;
        const RECOMPUTE_CFG = 1 << 2;
        const RECOMPUTE_DOMINATORS = 1 << 3;
        const RECOMPUTE_LOOPS = 1 << 4;
    }
}

/// Granularity a pass works at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Per-statement rewrites.
    Local,
    /// Per-block rewrites with block-local state.
    BasicBlock,
    /// Whole-function rewrites.
    Function,
    /// Whole-program rewrites.
    Ipa,
}

/// The function-level optimization passes, in their stable sequence
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Pass {
    ArithmeticIdentities,
    SignReduction,
    ConstantFolding,
    ConstantPropagation,
    OffsetConstantPropagation,
    CommonSubexpressionElimination,
    MathPropagation,
    PointerPropagation,
    CopyPropagation,
    RemoveAssign,
    DeadCodeElimination,
    RemoveEmptyLoops,
    LoopInvariantCodeMotion,
    InductionVariableOptimization,
    CompleteLoopPeeling,
    MergeBasicBlocks,
    RemoveDeadBasicBlocks,
    CleanVariables,
}

pub const SEQUENCE: [Pass; 18] = [
    Pass::ArithmeticIdentities,
    Pass::SignReduction,
    Pass::ConstantFolding,
    Pass::ConstantPropagation,
    Pass::OffsetConstantPropagation,
    Pass::CommonSubexpressionElimination,
    Pass::MathPropagation,
    Pass::PointerPropagation,
    Pass::CopyPropagation,
    Pass::RemoveAssign,
    Pass::DeadCodeElimination,
    Pass::RemoveEmptyLoops,
    Pass::LoopInvariantCodeMotion,
    Pass::InductionVariableOptimization,
    Pass::CompleteLoopPeeling,
    Pass::MergeBasicBlocks,
    Pass::RemoveDeadBasicBlocks,
    Pass::CleanVariables,
];

impl Pass {
    pub fn kind(&self) -> PassKind {
        match self {
            Pass::ArithmeticIdentities | Pass::SignReduction | Pass::ConstantFolding => {
                PassKind::Local
            }
            Pass::ConstantPropagation
            | Pass::OffsetConstantPropagation
            | Pass::MathPropagation
            | Pass::PointerPropagation
            | Pass::CopyPropagation => PassKind::BasicBlock,
            _ => PassKind::Function,
        }
    }

    pub fn requires(&self) -> Property {
        match self {
            Pass::CommonSubexpressionElimination => Property::ESCAPE | Property::DOMINATORS,
            Pass::PointerPropagation => Property::ESCAPE,
            Pass::RemoveAssign | Pass::DeadCodeElimination => Property::LIVENESS,
            Pass::RemoveEmptyLoops
            | Pass::LoopInvariantCodeMotion
            | Pass::InductionVariableOptimization => Property::LOOPS | Property::DOMINATORS,
            Pass::CompleteLoopPeeling => Property::LOOPS,
            Pass::MergeBasicBlocks | Pass::RemoveDeadBasicBlocks => Property::CFG,
            _ => Property::empty(),
        }
    }

    pub fn invalidates(&self) -> Property {
        match self {
            Pass::ConstantFolding => {
                // resolved branches change edges
                Property::CFG | Property::DOMINATORS | Property::LOOPS | Property::DEFINITIONS
            }
            Pass::ConstantPropagation
            | Pass::OffsetConstantPropagation
            | Pass::CommonSubexpressionElimination
            | Pass::MathPropagation
            | Pass::PointerPropagation
            | Pass::CopyPropagation
            | Pass::InductionVariableOptimization => Property::DEFINITIONS,
            Pass::RemoveAssign => Property::LIVENESS,
            Pass::RemoveEmptyLoops => Property::CFG | Property::DOMINATORS | Property::LOOPS,
            Pass::LoopInvariantCodeMotion => {
                Property::CFG | Property::DOMINATORS | Property::LOOPS
            }
            Pass::CompleteLoopPeeling => Property::CFG | Property::DOMINATORS | Property::LOOPS,
            Pass::MergeBasicBlocks | Pass::RemoveDeadBasicBlocks => {
                Property::CFG | Property::DOMINATORS | Property::LOOPS
            }
            _ => Property::empty(),
        }
    }

    pub fn todo_after(&self) -> TodoAfter {
        match self {
            Pass::ConstantFolding => TodoAfter::REMOVE_NOP | TodoAfter::RECOMPUTE_CFG,
            Pass::RemoveAssign
            | Pass::DeadCodeElimination
            | Pass::InductionVariableOptimization => TodoAfter::REMOVE_NOP,
            Pass::RemoveEmptyLoops | Pass::CompleteLoopPeeling => {
                TodoAfter::RECOMPUTE_CFG | TodoAfter::RECOMPUTE_DOMINATORS | TodoAfter::RECOMPUTE_LOOPS
            }
            Pass::LoopInvariantCodeMotion => {
                TodoAfter::RECOMPUTE_CFG | TodoAfter::RECOMPUTE_DOMINATORS | TodoAfter::RECOMPUTE_LOOPS
            }
            Pass::MergeBasicBlocks | Pass::RemoveDeadBasicBlocks => TodoAfter::RECOMPUTE_CFG,
            _ => TodoAfter::empty(),
        }
    }
}

/// Per-function analysis memoization between passes.
#[derive(Default)]
struct AnalysisCache {
    liveness: Option<DataFlowResults<LiveSet>>,
}

/// The optimization driver: runs the pass sequence to a fixed point,
/// keeping the required analyses fresh and performing the maintenance
/// work owed by changed passes.
pub struct Optimizer<'a> {
    pub config: &'a CompilerConfig,
}

const MAX_ITERATIONS: usize = 100;

impl<'a> Optimizer<'a> {
    pub fn new(config: &'a CompilerConfig) -> Optimizer<'a> {
        Optimizer { config }
    }

    pub fn optimize(&self, program: &mut Program) {
        if !self.config.optimize_all {
            return;
        }
        for function in &mut program.functions {
            self.optimize_function(function);
        }
        if self.config.optimize_unused {
            function_cleanup::remove_unused_functions(program);
        }
    }

    pub fn optimize_function(&self, function: &mut Function) {
        let mut fresh = Property::empty();
        let mut cache = AnalysisCache::default();

        for iteration in 0..MAX_ITERATIONS {
            let mut changed_any = false;

            for pass in SEQUENCE {
                self.ensure_fresh(pass.requires(), &mut fresh, &mut cache, function);

                let changed = self.run_pass(pass, function, &cache);
                if changed {
                    changed_any = true;
                    debug!("{}: {} optimized (iteration {})", function.name, pass, iteration);

                    fresh &= !pass.invalidates();
                    // statement indices may have shifted, statement-keyed
                    // results are stale after any change
                    fresh &= !(Property::LIVENESS | Property::ESCAPE | Property::DEFINITIONS);
                    cache.liveness = None;
                    self.apply_todo(pass.todo_after(), function, &mut fresh);
                }
            }

            if !changed_any {
                break;
            }
        }
    }

    fn ensure_fresh(
        &self,
        required: Property,
        fresh: &mut Property,
        cache: &mut AnalysisCache,
        function: &mut Function,
    ) {
        let wants_cfg = required
            .intersects(Property::CFG | Property::DOMINATORS | Property::LOOPS | Property::LIVENESS);
        if wants_cfg && !fresh.contains(Property::CFG) {
            cfg::compute(function);
            *fresh |= Property::CFG;
        }
        if required.intersects(Property::DOMINATORS | Property::LOOPS)
            && !fresh.contains(Property::DOMINATORS)
        {
            dominators::compute(function);
            *fresh |= Property::DOMINATORS;
        }
        if required.contains(Property::LOOPS) && !fresh.contains(Property::LOOPS) {
            loops::find_loops(function);
            *fresh |= Property::LOOPS;
        }
        if required.contains(Property::ESCAPE) && !fresh.contains(Property::ESCAPE) {
            escape::escape_analysis(function);
            *fresh |= Property::ESCAPE;
        }
        if required.contains(Property::LIVENESS) && !fresh.contains(Property::LIVENESS) {
            cache.liveness = Some(liveness::live_variables(function));
            *fresh |= Property::LIVENESS;
        }
    }

    fn run_pass(&self, pass: Pass, function: &mut Function, cache: &AnalysisCache) -> bool {
        match pass {
            Pass::ArithmeticIdentities => arithmetic_identities::run(function),
            Pass::SignReduction => sign_reduction::run(function),
            Pass::ConstantFolding => constant_folding::run(function),
            Pass::ConstantPropagation => constant_propagation::run(function),
            Pass::OffsetConstantPropagation => offset_constant_propagation::run(function),
            Pass::CommonSubexpressionElimination => {
                common_subexpression_elimination::run(function)
            }
            Pass::MathPropagation => math_propagation::run(function),
            Pass::PointerPropagation => pointer_propagation::run(function),
            Pass::CopyPropagation => copy_propagation::run(function),
            Pass::RemoveAssign => {
                remove_assign::run(function, cache.liveness.as_ref().expect("liveness required"))
            }
            Pass::DeadCodeElimination => dead_code_elimination::run(
                function,
                cache.liveness.as_ref().expect("liveness required"),
            ),
            Pass::RemoveEmptyLoops => empty_loops::run(function),
            Pass::LoopInvariantCodeMotion => licm::run(function),
            Pass::InductionVariableOptimization => induction_variables::run(function),
            Pass::CompleteLoopPeeling => loop_peeling::run(function),
            Pass::MergeBasicBlocks => block_cleanup::merge_basic_blocks(function),
            Pass::RemoveDeadBasicBlocks => block_cleanup::remove_dead_basic_blocks(function),
            Pass::CleanVariables => block_cleanup::clean_variables(function),
        }
    }

    fn apply_todo(&self, todo: TodoAfter, function: &mut Function, fresh: &mut Property) {
        if todo.contains(TodoAfter::REMOVE_NOP) {
            function.sweep_nops();
        }
        if todo.contains(TodoAfter::MERGE_BASIC_BLOCKS) {
            block_cleanup::merge_basic_blocks(function);
            *fresh &= !(Property::CFG | Property::DOMINATORS | Property::LOOPS);
        }
        if todo.contains(TodoAfter::RECOMPUTE_CFG) {
            cfg::compute(function);
            *fresh |= Property::CFG;
            *fresh &= !(Property::DOMINATORS | Property::LOOPS);
        }
        if todo.contains(TodoAfter::RECOMPUTE_DOMINATORS) {
            if !fresh.contains(Property::CFG) {
                cfg::compute(function);
                *fresh |= Property::CFG;
            }
            dominators::compute(function);
            *fresh |= Property::DOMINATORS;
            *fresh &= !Property::LOOPS;
        }
        if todo.contains(TodoAfter::RECOMPUTE_LOOPS) {
            if !fresh.contains(Property::DOMINATORS) {
                if !fresh.contains(Property::CFG) {
                    cfg::compute(function);
                    *fresh |= Property::CFG;
                }
                dominators::compute(function);
                *fresh |= Property::DOMINATORS;
            }
            loops::find_loops(function);
            *fresh |= Property::LOOPS;
        }
    }
}
