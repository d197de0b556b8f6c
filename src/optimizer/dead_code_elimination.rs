use crate::analysis::DataFlowResults;
use crate::analysis::liveness::LiveSet;
use crate::mtac::Statement;
use crate::mtac::function::Function;

/// Dead-code elimination: any side-effect-free quadruple whose result
/// is dead becomes a NOP, then the NOPs are swept. Calls, branches and
/// indirect stores are never dead; variables with a memory home stay
/// observable and keep their writes.
pub fn run(function: &mut Function, liveness: &DataFlowResults<LiveSet>) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let (block, context) = function.block_with_context_mut(id);
        for (index, statement) in block.statements.iter_mut().enumerate() {
            let Statement::Quadruple(quadruple) = statement else {
                continue;
            };
            if quadruple.is_nop() || !quadruple.op.writes_result() {
                continue;
            }
            let Some(result) = quadruple.result else {
                continue;
            };
            if !context.variable(result).is_temporary() {
                continue;
            }
            let live_out = &liveness.statement_out[&(id, index)];
            if !live_out.contains(&result) {
                *statement = Statement::nop();
                changed = true;
            }
        }
    }
    changed |= function.sweep_nops();
    changed
}
