use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::VariableId;
use std::collections::HashMap;

/// Block-local copy propagation: after `r := x`, uses of `r` read `x`
/// instead. A fact dies when either side is redefined. Calls and
/// indirect stores may write through aliases, so they drop every fact.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let mut copies: HashMap<VariableId, VariableId> = HashMap::new();

        for statement in &mut function.block_mut(id).statements {
            changed |= statement.map_arguments(|argument| match argument {
                Argument::Variable(id) => copies.get(id).map(|&source| Argument::Variable(source)),
                _ => None,
            });

            let aliasing_write = matches!(statement, Statement::Call(_))
                || matches!(statement, Statement::Quadruple(q) if q.op.is_indirect_store());
            if aliasing_write {
                copies.clear();
                continue;
            }

            for def in statement.defs() {
                copies.remove(&def);
                copies.retain(|_, source| *source != def);
            }

            if let Statement::Quadruple(quadruple) = statement
                && matches!(quadruple.op, Operator::ASSIGN | Operator::FASSIGN)
                && let Some(result) = quadruple.result
                && let Some(Argument::Variable(source)) = quadruple.arg1
                && source != result
            {
                copies.insert(result, source);
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Quadruple;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn copies_are_propagated_until_either_side_changes() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let r = context.add_local("r", Type::Int, 8);
        let t1 = context.new_temporary(Type::Int);
        let t2 = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        // r := a; t1 := r + 1; a := 0; t2 := r + 2
        function.add_statement(Statement::Quadruple(Quadruple::assign(
            r,
            Argument::Variable(a),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t1,
            Operator::ADD,
            Argument::Variable(r),
            Argument::Int(1),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(0))));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t2,
            Operator::ADD,
            Argument::Variable(r),
            Argument::Int(2),
        )));
        function.add_statement(Statement::Return(Return { values: vec![] }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(run(&mut function));
        let block = function.real_block_ids()[0];
        // first use rewritten to the source
        match &function.block(block).statements[1] {
            Statement::Quadruple(q) => assert_eq!(q.arg1, Some(Argument::Variable(a))),
            other => panic!("expected quadruple, got {other}"),
        }
        // after a is redefined, r reads stay on r
        match &function.block(block).statements[3] {
            Statement::Quadruple(q) => assert_eq!(q.arg1, Some(Argument::Variable(r))),
            other => panic!("expected quadruple, got {other}"),
        }
    }
}
