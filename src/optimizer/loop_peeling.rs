use crate::mtac::Argument;
use crate::mtac::Loop;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::FunctionContext;
use crate::variables::VariableId;
use log::trace;
use std::collections::HashMap;

/// Full unrolling of short countable loops: when the trip count is a
/// known positive constant of at most 12 and the body holds at most
/// 100 statements, the exit test and back edge disappear and the body
/// is laid out straight, temporaries renamed fresh per copy.
pub fn run(function: &mut Function) -> bool {
    let candidates = function.loops.clone();
    for natural in &candidates {
        if peel(function, natural) {
            return true;
        }
    }
    false
}

const MAX_TRIPS: i64 = 12;
const MAX_BODY: usize = 100;

fn peel(function: &mut Function, natural: &Loop) -> bool {
    let Some(trips) = natural.estimated_iterations else {
        return false;
    };
    if !(1..=MAX_TRIPS).contains(&trips) {
        return false;
    }
    let Some(block) = natural.single_block() else {
        return false;
    };

    // the back branch must be the block's own terminator
    let back_branch = match function.block(block).terminator() {
        Some(Statement::If(branch)) | Some(Statement::IfFalse(branch))
            if branch.target == Some(block) =>
        {
            true
        }
        _ => false,
    };
    if !back_branch {
        return false;
    }

    let statements = &function.block(block).statements;
    let body: Vec<Statement> = statements[..statements.len() - 1].to_vec();
    if body.len() > MAX_BODY {
        return false;
    }

    let mut unrolled = Vec::with_capacity(body.len() * trips as usize);
    unrolled.extend(body.iter().cloned());
    for _ in 1..trips {
        let mut renaming: HashMap<VariableId, VariableId> = HashMap::new();
        for statement in &body {
            unrolled.push(rename_temporaries(
                statement,
                &mut renaming,
                &mut function.context,
            ));
        }
    }

    trace!("peeled loop of {trips} trips, {} statements", unrolled.len());
    function.block_mut(block).statements = unrolled;
    true
}

/// Clones a statement with every temporary renamed through the
/// context: reads go through the copy's mapping, definitions mint a
/// fresh temporary.
fn rename_temporaries(
    statement: &Statement,
    renaming: &mut HashMap<VariableId, VariableId>,
    context: &mut FunctionContext,
) -> Statement {
    let mut clone = statement.clone();

    clone.map_arguments(|argument| match argument {
        Argument::Variable(id) => renaming.get(id).map(|&fresh| Argument::Variable(fresh)),
        _ => None,
    });

    let mut rename_def = |id: VariableId, context: &mut FunctionContext| -> VariableId {
        if context.variable(id).is_temporary() {
            let fresh = context.new_temporary(context.variable(id).var_type.clone());
            renaming.insert(id, fresh);
            fresh
        } else {
            id
        }
    };

    match &mut clone {
        Statement::Quadruple(quadruple) => {
            if quadruple.op.writes_result()
                && let Some(result) = quadruple.result
            {
                quadruple.result = Some(rename_def(result, context));
            }
        }
        Statement::Call(call) => {
            if let Some(r1) = call.return1 {
                call.return1 = Some(rename_def(r1, context));
            }
            if let Some(r2) = call.return2 {
                call.return2 = Some(rename_def(r2, context));
            }
        }
        _ => {}
    }

    clone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Branch;
    use crate::mtac::Operator;
    use crate::mtac::Quadruple;
    use crate::mtac::RelationalOperator;
    use crate::mtac::Return;
    use crate::mtac::cfg;
    use crate::mtac::dominators;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::mtac::loops;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    /// do { t := i·i; a[i] := t; i := i + 1 } while (i < 3)
    #[test]
    fn three_trip_loop_unrolls_into_straight_line() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::array_of(Type::Int, Some(3)), 32);
        let i = context.add_local("i", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Void, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
        function.add_statement(Statement::Label(".loop".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::MUL,
            Argument::Variable(i),
            Argument::Variable(i),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            a,
            Operator::ARRAY_ASSIGN,
            Argument::Variable(i),
            Argument::Variable(t),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            i,
            Operator::ADD,
            Argument::Variable(i),
            Argument::Int(1),
        )));
        function.add_statement(Statement::If(Branch {
            op: Some(RelationalOperator::LESS),
            arg1: Argument::Variable(i),
            arg2: Some(Argument::Int(3)),
            label: ".loop".to_string(),
            target: None,
        }));
        function.add_statement(Statement::Return(Return { values: vec![] }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        dominators::compute(&mut function);
        loops::find_loops(&mut function);

        assert!(run(&mut function));

        // no branches left, three stores, temporaries distinct per copy
        assert!(
            function
                .all_statements()
                .all(|s| !matches!(s, Statement::If(_) | Statement::IfFalse(_)))
        );
        let stores: Vec<_> = function
            .all_statements()
            .filter_map(|s| match s {
                Statement::Quadruple(q) if q.op == Operator::ARRAY_ASSIGN => Some(q.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(stores.len(), 3);

        let multiplication_results: Vec<_> = function
            .all_statements()
            .filter_map(|s| match s {
                Statement::Quadruple(q) if q.op == Operator::MUL => q.result,
                _ => None,
            })
            .collect();
        assert_eq!(multiplication_results.len(), 3);
        assert_ne!(multiplication_results[0], multiplication_results[1]);
        assert_ne!(multiplication_results[1], multiplication_results[2]);
    }

    /// thirteen trips is beyond the peeling limit
    #[test]
    fn long_loops_are_not_peeled() {
        let mut context = FunctionContext::new();
        let i = context.add_local("i", Type::Int, 8);
        let s = context.add_local("s", Type::Int, 8);
        let mut function = Function::new("f", Type::Void, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
        function.add_statement(Statement::Label(".loop".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            s,
            Operator::ADD,
            Argument::Variable(s),
            Argument::Variable(i),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            i,
            Operator::ADD,
            Argument::Variable(i),
            Argument::Int(1),
        )));
        function.add_statement(Statement::If(Branch {
            op: Some(RelationalOperator::LESS),
            arg1: Argument::Variable(i),
            arg2: Some(Argument::Int(13)),
            label: ".loop".to_string(),
            target: None,
        }));
        function.add_statement(Statement::Return(Return { values: vec![] }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        dominators::compute(&mut function);
        loops::find_loops(&mut function);

        assert!(!run(&mut function));
    }
}
