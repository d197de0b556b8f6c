use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::VariableId;
use std::collections::HashMap;

/// Block-local constant propagation: `r := c` records a fact, any
/// other write to `r` clears it, every recorded constant is substituted
/// into later arguments. A call may write any global through aliasing,
/// so the whole map is dropped across calls.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let mut constants: HashMap<VariableId, Argument> = HashMap::new();

        for statement in &mut function.block_mut(id).statements {
            changed |= substitute(statement, &constants);

            match statement {
                Statement::Call(_) => constants.clear(),
                _ => {
                    for def in statement.defs() {
                        constants.remove(&def);
                    }
                    if let Statement::Quadruple(quadruple) = statement
                        && matches!(quadruple.op, Operator::ASSIGN | Operator::FASSIGN)
                        && let Some(result) = quadruple.result
                        && let Some(value) = &quadruple.arg1
                        && value.is_constant()
                    {
                        constants.insert(result, value.clone());
                    }
                }
            }
        }
    }
    changed
}

/// Substitutes recorded constants into the statement's read positions.
/// The base of a memory access must stay a variable, only the offset,
/// index and value positions of those operators are rewritten.
fn substitute(statement: &mut Statement, constants: &HashMap<VariableId, Argument>) -> bool {
    let lookup = |argument: &Argument| match argument {
        Argument::Variable(id) => constants.get(id).cloned(),
        _ => None,
    };

    if let Statement::Quadruple(quadruple) = statement {
        let keeps_base = matches!(
            quadruple.op,
            Operator::DOT | Operator::FDOT | Operator::PDOT | Operator::ARRAY | Operator::FARRAY
        );
        if keeps_base {
            let mut changed = false;
            if let Some(arg2) = &quadruple.arg2
                && let Some(replacement) = lookup(arg2)
            {
                quadruple.arg2 = Some(replacement);
                changed = true;
            }
            return changed;
        }
    }

    statement.map_arguments(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Call;
    use crate::mtac::Quadruple;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn constants_flow_into_later_statements() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(3))));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Int(4),
        )));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(t)],
        }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(run(&mut function));
        let block = function.real_block_ids()[0];
        match &function.block(block).statements[1] {
            Statement::Quadruple(q) => assert_eq!(q.arg1, Some(Argument::Int(3))),
            other => panic!("expected quadruple, got {other}"),
        }
    }

    #[test]
    fn calls_clear_every_fact() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(3))));
        function.add_statement(Statement::Call(Call {
            function: "g".to_string(),
            arg_bytes: 0,
            return1: None,
            return2: None,
        }));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Int(4),
        )));
        extract_basic_blocks(&mut function).unwrap();

        assert!(!run(&mut function));
    }

    #[test]
    fn redefinition_clears_the_fact() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let b = context.add_local("b", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(3))));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            a,
            Operator::ADD,
            Argument::Variable(b),
            Argument::Int(1),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Int(4),
        )));
        extract_basic_blocks(&mut function).unwrap();

        assert!(!run(&mut function));
    }
}
