use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::VariableId;
use std::collections::HashMap;

/// Block-local propagation of member stores: a `DOT_ASSIGN base, off,
/// c` records the member value, a later `DOT base, off` read becomes a
/// plain copy. Writing the base, taking its address, storing a
/// non-constant, any array store to it or any call invalidates.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let mut members: HashMap<(VariableId, i64), Argument> = HashMap::new();

        for statement in &mut function.block_mut(id).statements {
            // read side: substitute a known member value
            if let Statement::Quadruple(quadruple) = statement
                && matches!(quadruple.op, Operator::DOT | Operator::FDOT)
                && let Some(result) = quadruple.result
                && let Some(Argument::Variable(base)) = quadruple.arg1
                && let Some(Argument::Int(offset)) = quadruple.arg2
                && let Some(value) = members.get(&(base, offset))
            {
                let op = quadruple.op.assign_op();
                *quadruple = Quadruple::new(result, op, value.clone(), None);
                changed = true;
                continue;
            }

            // write side: update or invalidate facts
            match statement {
                Statement::Call(_) => members.clear(),
                Statement::Param(param) if param.address => {
                    if let Argument::Variable(base) = param.value {
                        members.retain(|(b, _), _| *b != base);
                    }
                }
                Statement::Quadruple(quadruple) => match quadruple.op {
                    Operator::DOT_ASSIGN | Operator::DOT_FASSIGN => {
                        let base = quadruple.result.expect("store without base");
                        match (&quadruple.arg1, &quadruple.arg2) {
                            (Some(Argument::Int(offset)), Some(value)) if value.is_constant() => {
                                members.insert((base, *offset), value.clone());
                            }
                            (Some(Argument::Int(offset)), _) => {
                                members.remove(&(base, *offset));
                            }
                            _ => {
                                // unknown offset clobbers the whole base
                                members.retain(|(b, _), _| *b != base);
                            }
                        }
                    }
                    Operator::ARRAY_ASSIGN | Operator::ARRAY_FASSIGN => {
                        let base = quadruple.result.expect("store without base");
                        members.retain(|(b, _), _| *b != base);
                    }
                    Operator::PDOT => {
                        if let Some(Argument::Variable(base)) = quadruple.arg1 {
                            members.retain(|(b, _), _| *b != base);
                        }
                    }
                    _ => {
                        for def in statement.defs() {
                            members.retain(|(b, _), _| *b != def);
                        }
                    }
                },
                _ => {}
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn stored_member_constant_feeds_the_read() {
        let mut context = FunctionContext::new();
        let p = context.add_local("p", Type::Record("Point".to_string()), 16);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        // p.0 := 42; t := p.0
        function.add_statement(Statement::Quadruple(Quadruple::new(
            p,
            Operator::DOT_ASSIGN,
            Argument::Int(0),
            Argument::Int(42),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::DOT,
            Argument::Variable(p),
            Argument::Int(0),
        )));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(t)],
        }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(run(&mut function));
        let block = function.real_block_ids()[0];
        match &function.block(block).statements[1] {
            Statement::Quadruple(q) => {
                assert_eq!(q.op, Operator::ASSIGN);
                assert_eq!(q.arg1, Some(Argument::Int(42)));
            }
            other => panic!("expected quadruple, got {other}"),
        }
    }

    #[test]
    fn different_offsets_do_not_alias() {
        let mut context = FunctionContext::new();
        let p = context.add_local("p", Type::Record("Point".to_string()), 16);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        // p.8 := 1; t := p.0 stays a load
        function.add_statement(Statement::Quadruple(Quadruple::new(
            p,
            Operator::DOT_ASSIGN,
            Argument::Int(8),
            Argument::Int(1),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::DOT,
            Argument::Variable(p),
            Argument::Int(0),
        )));
        extract_basic_blocks(&mut function).unwrap();

        assert!(!run(&mut function));
    }
}
