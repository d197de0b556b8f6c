use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;

/// Strength reduction of multiplications and divisions by powers of
/// two into shifts. Multiplications by 3, 5 and 9 are left for the
/// peephole optimizer, which lowers them to LEA patterns.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        for statement in &mut function.block_mut(id).statements {
            let Statement::Quadruple(quadruple) = statement else {
                continue;
            };
            if let Some(rewritten) = rewrite(quadruple) {
                *quadruple = rewritten;
                changed = true;
            }
        }
    }
    changed
}

fn shift_amount(value: i64) -> Option<i64> {
    if value > 1 && value.count_ones() == 1 {
        Some(value.trailing_zeros() as i64)
    } else {
        None
    }
}

fn rewrite(quadruple: &Quadruple) -> Option<Quadruple> {
    let result = quadruple.result?;

    match quadruple.op {
        Operator::MUL => match (&quadruple.arg1, &quadruple.arg2) {
            (Some(a), Some(Argument::Int(c))) => {
                let shift = shift_amount(*c)?;
                Some(Quadruple::new(result, Operator::SHL, a.clone(), Argument::Int(shift)))
            }
            (Some(Argument::Int(c)), Some(b)) => {
                let shift = shift_amount(*c)?;
                Some(Quadruple::new(result, Operator::SHL, b.clone(), Argument::Int(shift)))
            }
            _ => None,
        },
        Operator::DIV => match (&quadruple.arg1, &quadruple.arg2) {
            (Some(a), Some(Argument::Int(c))) => {
                let shift = shift_amount(*c)?;
                Some(Quadruple::new(result, Operator::SHR, a.clone(), Argument::Int(shift)))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn multiplication_by_eight_becomes_a_shift() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let r = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);
        function.add_statement(Statement::Quadruple(Quadruple::new(
            r,
            Operator::MUL,
            Argument::Variable(a),
            Argument::Int(8),
        )));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(r)],
        }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(run(&mut function));
        let block = function.real_block_ids()[0];
        match &function.block(block).statements[0] {
            Statement::Quadruple(q) => {
                assert_eq!(q.op, Operator::SHL);
                assert_eq!(q.arg1, Some(Argument::Variable(a)));
                assert_eq!(q.arg2, Some(Argument::Int(3)));
            }
            other => panic!("expected quadruple, got {other}"),
        }
    }

    #[test]
    fn multiplication_by_three_is_left_for_the_peephole() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let r = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);
        function.add_statement(Statement::Quadruple(Quadruple::new(
            r,
            Operator::MUL,
            Argument::Variable(a),
            Argument::Int(3),
        )));
        extract_basic_blocks(&mut function).unwrap();

        assert!(!run(&mut function));
    }
}
