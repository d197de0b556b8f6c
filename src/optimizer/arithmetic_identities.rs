use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;

/// Local algebraic identities on integer quadruples: additive and
/// multiplicative identities, annihilators, self-cancellation and
/// negation shorthands. Float operands are left alone, reassociating
/// them is not value-preserving.
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

fn rewrite(quadruple: &Quadruple) -> Option<Quadruple> {
    let result = quadruple.result?;
    let arg1 = quadruple.arg1.clone()?;
    let arg2 = quadruple.arg2.clone();

    match quadruple.op {
        Operator::ADD => match (&arg1, &arg2) {
            (Argument::Int(0), Some(b)) => Some(Quadruple::assign(result, b.clone())),
            (a, Some(Argument::Int(0))) => Some(Quadruple::assign(result, a.clone())),
            _ => None,
        },
        Operator::SUB => match (&arg1, &arg2) {
            (a, Some(Argument::Int(0))) => Some(Quadruple::assign(result, a.clone())),
            (Argument::Int(0), Some(b)) => {
                Some(Quadruple::new(result, Operator::MINUS, b.clone(), None))
            }
            (a, Some(b)) if a == b => Some(Quadruple::assign(result, Argument::Int(0))),
            _ => None,
        },
        Operator::MUL => match (&arg1, &arg2) {
            (Argument::Int(0), Some(_)) | (_, Some(Argument::Int(0))) => {
                Some(Quadruple::assign(result, Argument::Int(0)))
            }
            (Argument::Int(1), Some(b)) => Some(Quadruple::assign(result, b.clone())),
            (a, Some(Argument::Int(1))) => Some(Quadruple::assign(result, a.clone())),
            (Argument::Int(-1), Some(b)) => {
                Some(Quadruple::new(result, Operator::MINUS, b.clone(), None))
            }
            (a, Some(Argument::Int(-1))) => {
                Some(Quadruple::new(result, Operator::MINUS, a.clone(), None))
            }
            _ => None,
        },
        Operator::DIV => match (&arg1, &arg2) {
            (a, Some(Argument::Int(1))) => Some(Quadruple::assign(result, a.clone())),
            (a, Some(Argument::Int(-1))) => {
                Some(Quadruple::new(result, Operator::MINUS, a.clone(), None))
            }
            (a, Some(b)) if a == b && !matches!(a, Argument::Int(0)) => {
                Some(Quadruple::assign(result, Argument::Int(1)))
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

    fn rewrite_one(op: Operator, make_args: impl Fn(&mut FunctionContext) -> (Argument, Argument)) -> Quadruple {
        let mut context = FunctionContext::new();
        let (arg1, arg2) = make_args(&mut context);
        let r = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);
        function.add_statement(Statement::Quadruple(Quadruple::new(r, op, arg1, arg2)));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(r)],
        }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(run(&mut function));
        let block = function.real_block_ids()[0];
        match &function.block(block).statements[0] {
            Statement::Quadruple(q) => q.clone(),
            other => panic!("expected quadruple, got {other}"),
        }
    }

    #[test]
    fn addition_of_zero_becomes_a_copy() {
        let q = rewrite_one(Operator::ADD, |context| {
            let a = context.add_local("a", Type::Int, 8);
            (Argument::Variable(a), Argument::Int(0))
        });
        assert_eq!(q.op, Operator::ASSIGN);
        assert!(matches!(q.arg1, Some(Argument::Variable(_))));
    }

    #[test]
    fn subtraction_from_zero_becomes_negation() {
        let q = rewrite_one(Operator::SUB, |_| (Argument::Int(0), Argument::Int(7)));
        assert_eq!(q.op, Operator::MINUS);
        assert_eq!(q.arg1, Some(Argument::Int(7)));
    }

    #[test]
    fn subtraction_of_self_is_zero() {
        let q = rewrite_one(Operator::SUB, |context| {
            let a = context.add_local("a", Type::Int, 8);
            (Argument::Variable(a), Argument::Variable(a))
        });
        assert_eq!(q.op, Operator::ASSIGN);
        assert_eq!(q.arg1, Some(Argument::Int(0)));
    }

    #[test]
    fn multiplication_by_zero_annihilates() {
        let q = rewrite_one(Operator::MUL, |context| {
            let a = context.add_local("a", Type::Int, 8);
            (Argument::Variable(a), Argument::Int(0))
        });
        assert_eq!(q.op, Operator::ASSIGN);
        assert_eq!(q.arg1, Some(Argument::Int(0)));
    }

    #[test]
    fn multiplication_by_minus_one_negates() {
        let q = rewrite_one(Operator::MUL, |context| {
            let a = context.add_local("a", Type::Int, 8);
            (Argument::Variable(a), Argument::Int(-1))
        });
        assert_eq!(q.op, Operator::MINUS);
        assert!(matches!(q.arg1, Some(Argument::Variable(_))));
    }

    #[test]
    fn division_by_self_is_one() {
        let q = rewrite_one(Operator::DIV, |context| {
            let a = context.add_local("a", Type::Int, 8);
            (Argument::Variable(a), Argument::Variable(a))
        });
        assert_eq!(q.op, Operator::ASSIGN);
        assert_eq!(q.arg1, Some(Argument::Int(1)));
    }
}
