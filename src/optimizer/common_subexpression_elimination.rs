use crate::analysis::available_expressions;
use crate::mtac::Argument;
use crate::mtac::BlockId;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::types::Type;
use crate::variables::VariableId;
use log::trace;

/// Common-subexpression elimination. When a pure computation is
/// available at a statement, the nearest dominating site computing it
/// is rewritten to park its value in a fresh temporary, and the
/// recomputation becomes a copy of that temporary.
///
/// One rewrite per invocation; the driver reruns the pass until it
/// reports no change. Requires fresh dominators and escape flags.
pub fn run(function: &mut Function) -> bool {
    let results = available_expressions::available_expressions(function);

    for id in function.block_ids() {
        for index in 0..function.block(id).statements.len() {
            let Statement::Quadruple(quadruple) = &function.block(id).statements[index] else {
                continue;
            };
            if !quadruple.op.is_expression() {
                continue;
            }
            let Some(arg1) = quadruple.arg1.clone() else {
                continue;
            };
            let fingerprint = (quadruple.op, arg1, quadruple.arg2.clone());

            let available = results
                .statement_in
                .get(&(id, index))
                .and_then(|set| set.as_ref())
                .is_some_and(|set| set.contains(&fingerprint));
            if !available {
                continue;
            }

            if let Some((source_block, source_index)) =
                find_source(function, id, index, &fingerprint)
                && rewrite(function, (source_block, source_index), (id, index))
            {
                return true;
            }
        }
    }
    false
}

type Fingerprint = (crate::mtac::Operator, Argument, Option<Argument>);

fn operands(fingerprint: &Fingerprint) -> Vec<VariableId> {
    [Some(&fingerprint.1), fingerprint.2.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|argument| argument.variable())
        .collect()
}

/// Walks backwards from the use site through the dominator chain,
/// looking for the nearest statement computing the fingerprint. The
/// search aborts when an operand is redefined first, the older site
/// would no longer hold the same value.
fn find_source(
    function: &Function,
    block: BlockId,
    index: usize,
    fingerprint: &Fingerprint,
) -> Option<(BlockId, usize)> {
    let killed = operands(fingerprint);
    let mut current = block;
    let mut before = index;

    loop {
        let statements = &function.block(current).statements;
        for candidate in (0..before).rev() {
            let statement = &statements[candidate];
            if let Statement::Quadruple(quadruple) = statement
                && quadruple.op == fingerprint.0
                && quadruple.arg1.as_ref() == Some(&fingerprint.1)
                && quadruple.arg2 == fingerprint.2
            {
                return Some((current, candidate));
            }
            if statement.defs().iter().any(|def| killed.contains(def)) {
                return None;
            }
        }
        current = function.block(current).dominator?;
        if function.block(current).is_entry() {
            return None;
        }
        before = function.block(current).statements.len();
    }
}

fn rewrite(
    function: &mut Function,
    source: (BlockId, usize),
    site: (BlockId, usize),
) -> bool {
    let Statement::Quadruple(source_quadruple) =
        function.block(source.0).statements[source.1].clone()
    else {
        return false;
    };
    let Some(original_result) = source_quadruple.result else {
        return false;
    };
    let assign_op = source_quadruple.op.assign_op();
    let temp_type = if source_quadruple.op.is_float_family() {
        Type::Float
    } else {
        Type::Int
    };
    let temp = function.context.new_temporary(temp_type);

    // the dominating site now feeds the temporary, then its old result
    {
        let statements = &mut function.block_mut(source.0).statements;
        if let Statement::Quadruple(quadruple) = &mut statements[source.1] {
            quadruple.result = Some(temp);
        }
        statements.insert(
            source.1 + 1,
            Statement::Quadruple(Quadruple::new(
                original_result,
                assign_op,
                Argument::Variable(temp),
                None,
            )),
        );
    }

    // the recomputation becomes a copy, mind the shifted index when
    // both sites share a block
    let site_index = if site.0 == source.0 && site.1 > source.1 {
        site.1 + 1
    } else {
        site.1
    };
    let statements = &mut function.block_mut(site.0).statements;
    if let Statement::Quadruple(quadruple) = &mut statements[site_index] {
        let result = quadruple.result;
        *quadruple = Quadruple::new(
            result.expect("expression without result"),
            assign_op,
            Argument::Variable(temp),
            None,
        );
    }

    trace!("cse: reusing computation through {temp:?}");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Operator;
    use crate::mtac::Return;
    use crate::mtac::cfg;
    use crate::mtac::dominators;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::variables::FunctionContext;

    #[test]
    fn second_computation_becomes_a_copy() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let b = context.add_local("b", Type::Int, 8);
        let x = context.add_local("x", Type::Int, 8);
        let y = context.add_local("y", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        // x := a + b; y := a + b
        function.add_statement(Statement::Quadruple(Quadruple::new(
            x,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Variable(b),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            y,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Variable(b),
        )));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(y)],
        }));
        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        dominators::compute(&mut function);

        assert!(run(&mut function));

        let block = function.real_block_ids()[0];
        let statements = &function.block(block).statements;
        assert_eq!(statements.len(), 4);

        // exactly one addition of a and b remains, feeding both results
        let additions = statements
            .iter()
            .filter(|s| matches!(s, Statement::Quadruple(q) if q.op == Operator::ADD))
            .count();
        assert_eq!(additions, 1);

        let copies = statements
            .iter()
            .filter(|s| matches!(s, Statement::Quadruple(q) if q.op == Operator::ASSIGN))
            .count();
        assert_eq!(copies, 2);

        // running again finds nothing new
        assert!(!run(&mut function));
    }

    #[test]
    fn intervening_write_blocks_the_reuse() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let b = context.add_local("b", Type::Int, 8);
        let x = context.add_local("x", Type::Int, 8);
        let y = context.add_local("y", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        // x := a + b; a := 0; y := a + b
        function.add_statement(Statement::Quadruple(Quadruple::new(
            x,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Variable(b),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(0))));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            y,
            Operator::ADD,
            Argument::Variable(a),
            Argument::Variable(b),
        )));
        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        dominators::compute(&mut function);

        assert!(!run(&mut function));
    }
}
