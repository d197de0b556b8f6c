use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::VariableId;
use std::collections::HashMap;

/// Block-local propagation of pointer copies. Plain copy propagation
/// must drop every fact at calls and indirect stores; with escape
/// information a pointer fact survives them as long as neither side
/// escapes, because non-escaped pointers cannot be rewritten through
/// aliases.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let mut copies: HashMap<VariableId, VariableId> = HashMap::new();
        let (block, context) = function.block_with_context_mut(id);

        for statement in &mut block.statements {
            changed |= statement.map_arguments(|argument| match argument {
                Argument::Variable(id) => copies.get(id).map(|&source| Argument::Variable(source)),
                _ => None,
            });

            let aliasing_write = matches!(statement, Statement::Call(_))
                || matches!(statement, Statement::Quadruple(q) if q.op.is_indirect_store());
            if aliasing_write {
                copies.retain(|target, source| {
                    !context.variable(*target).escaped && !context.variable(*source).escaped
                });
                continue;
            }

            for def in statement.defs() {
                copies.remove(&def);
                copies.retain(|_, source| *source != def);
            }

            if let Statement::Quadruple(quadruple) = statement
                && quadruple.op == Operator::ASSIGN
                && let Some(result) = quadruple.result
                && let Some(Argument::Variable(source)) = quadruple.arg1
                && source != result
                && context.variable(result).var_type.is_pointer()
                && context.variable(source).var_type.is_pointer()
            {
                copies.insert(result, source);
            }
        }
    }
    changed
}
