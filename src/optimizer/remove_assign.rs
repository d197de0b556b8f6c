use crate::analysis::DataFlowResults;
use crate::analysis::liveness::LiveSet;
use crate::mtac::Operator;
use crate::mtac::Statement;
use crate::mtac::function::Function;

/// Dead-store removal: a copy whose destination is not live out of the
/// statement is dropped. Writes to variables with a memory home are
/// kept, they stay observable through aliasing; indirect stores are
/// never touched.
pub fn run(function: &mut Function, liveness: &DataFlowResults<LiveSet>) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let (block, context) = function.block_with_context_mut(id);
        for (index, statement) in block.statements.iter_mut().enumerate() {
            let Statement::Quadruple(quadruple) = statement else {
                continue;
            };
            if !matches!(quadruple.op, Operator::ASSIGN | Operator::FASSIGN) {
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
    changed
}
