use crate::analysis::usage;
use crate::mtac::Argument;
use crate::mtac::BlockId;
use crate::mtac::Loop;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::mtac::loops;
use crate::types::Type;
use crate::variables::VariableId;
use indexmap::IndexMap;
use log::trace;
use std::collections::HashMap;

/// A dependent induction variable `j = e·i + d`, with its single
/// defining site. The `(i, e, d)` representation is unique per
/// variable.
#[derive(Debug, Clone, Copy)]
struct Dependent {
    basic: VariableId,
    e: i64,
    d: i64,
    site: (BlockId, usize),
}

/// Induction-variable optimization: identifies basic and dependent
/// induction variables, strength-reduces the dependents into running
/// additions, deletes reduced copies that lost their last reader,
/// drops self-feeding updates and retargets countable exit conditions
/// onto the reduced variable. Float variables are never classified.
pub fn run(function: &mut Function) -> bool {
    let candidates = function.loops.clone();
    let mut changed = false;
    for natural in &candidates {
        changed |= optimize(function, natural);
        if changed {
            // the first transformed loop invalidates the loop set
            break;
        }
    }
    changed
}

fn optimize(function: &mut Function, natural: &Loop) -> bool {
    let basics = loops::basic_induction_variables(function, natural);
    if basics.is_empty() {
        return false;
    }

    let dependents = find_dependents(function, natural, &basics);

    let reduced = strength_reduce(function, natural, &basics, &dependents);
    if !reduced.is_empty() {
        replace_exit_condition(function, natural, &basics, &reduced);
        return true;
    }

    remove_dead_induction_variables(function, natural, &basics)
}

/// Transitive closure of single-definition linear derivations from a
/// basic induction variable.
fn find_dependents(
    function: &Function,
    natural: &Loop,
    basics: &IndexMap<VariableId, i64>,
) -> IndexMap<VariableId, Dependent> {
    let mut writes: HashMap<VariableId, usize> = HashMap::new();
    for &id in &natural.blocks {
        for statement in &function.block(id).statements {
            for def in statement.defs() {
                *writes.entry(def).or_insert(0) += 1;
            }
        }
    }

    let mut dependents: IndexMap<VariableId, Dependent> = IndexMap::new();
    loop {
        let mut added = false;
        for &id in &natural.blocks {
            for (index, statement) in function.block(id).statements.iter().enumerate() {
                let Statement::Quadruple(quadruple) = statement else {
                    continue;
                };
                let Some(result) = quadruple.result else {
                    continue;
                };
                if basics.contains_key(&result)
                    || dependents.contains_key(&result)
                    || writes.get(&result) != Some(&1)
                {
                    continue;
                }

                let derive = |argument: &Argument| -> Option<(VariableId, i64, i64)> {
                    let variable = argument.variable()?;
                    if basics.contains_key(&variable) {
                        Some((variable, 1, 0))
                    } else {
                        dependents
                            .get(&variable)
                            .map(|dep| (dep.basic, dep.e, dep.d))
                    }
                };

                let linear = match quadruple.op {
                    Operator::MUL => match (&quadruple.arg1, &quadruple.arg2) {
                        (Some(a), Some(Argument::Int(c))) | (Some(Argument::Int(c)), Some(a)) => {
                            derive(a).map(|(basic, e, d)| (basic, e * c, d * c))
                        }
                        _ => None,
                    },
                    Operator::ADD => match (&quadruple.arg1, &quadruple.arg2) {
                        (Some(a), Some(Argument::Int(c))) | (Some(Argument::Int(c)), Some(a)) => {
                            derive(a).map(|(basic, e, d)| (basic, e, d + c))
                        }
                        _ => None,
                    },
                    Operator::SUB => match (&quadruple.arg1, &quadruple.arg2) {
                        (Some(a), Some(Argument::Int(c))) => {
                            derive(a).map(|(basic, e, d)| (basic, e, d - c))
                        }
                        _ => None,
                    },
                    Operator::MINUS => quadruple
                        .arg1
                        .as_ref()
                        .and_then(|a| derive(a))
                        .map(|(basic, e, d)| (basic, -e, -d)),
                    _ => None,
                };

                if let Some((basic, e, d)) = linear
                    && e != 0
                {
                    dependents.insert(
                        result,
                        Dependent {
                            basic,
                            e,
                            d,
                            site: (id, index),
                        },
                    );
                    added = true;
                }
            }
        }
        if !added {
            break;
        }
    }
    dependents
}

/// Rewrites each dependent `j = e·i + d` into a pre-header
/// initialization plus a running addition after every update of `i`.
/// Returns the fresh temporaries with their linear equations.
fn strength_reduce(
    function: &mut Function,
    natural: &Loop,
    basics: &IndexMap<VariableId, i64>,
    dependents: &IndexMap<VariableId, Dependent>,
) -> Vec<(VariableId, Dependent)> {
    // one reduction per invocation: the insertions shift statement
    // indices, the driver reruns the pass for the rest. Dependents that
    // are already plain copies of a reduction are done.
    let worth_reducing: Vec<(VariableId, Dependent)> = dependents
        .iter()
        .filter(|(_, dep)| {
            let Statement::Quadruple(quadruple) = &function.block(dep.site.0).statements[dep.site.1]
            else {
                return false;
            };
            quadruple.op != Operator::ASSIGN
        })
        .map(|(j, dep)| (*j, *dep))
        .take(1)
        .collect();
    if worth_reducing.is_empty() {
        return Vec::new();
    }

    let preheader = loops::ensure_preheader(function, natural);
    let mut reduced = Vec::new();

    for (j, dep) in worth_reducing {
        let temp = function.context.new_temporary(Type::Int);
        trace!("strength reduction: {j} = {}·{} + {} through {temp}", dep.e, dep.basic, dep.d);

        // tj := e·i + d in the pre-header
        {
            let statements = &mut function.block_mut(preheader).statements;
            if dep.e == 1 {
                if dep.d == 0 {
                    statements.push(Statement::Quadruple(Quadruple::assign(
                        temp,
                        Argument::Variable(dep.basic),
                    )));
                } else {
                    statements.push(Statement::Quadruple(Quadruple::new(
                        temp,
                        Operator::ADD,
                        Argument::Variable(dep.basic),
                        Argument::Int(dep.d),
                    )));
                }
            } else {
                statements.push(Statement::Quadruple(Quadruple::new(
                    temp,
                    Operator::MUL,
                    Argument::Variable(dep.basic),
                    Argument::Int(dep.e),
                )));
                if dep.d != 0 {
                    statements.push(Statement::Quadruple(Quadruple::new(
                        temp,
                        Operator::ADD,
                        Argument::Variable(temp),
                        Argument::Int(dep.d),
                    )));
                }
            }
        }

        // the dependent's definition becomes a copy
        if let Statement::Quadruple(quadruple) =
            &mut function.block_mut(dep.site.0).statements[dep.site.1]
        {
            *quadruple = Quadruple::assign(j, Argument::Variable(temp));
        }

        // tj := tj + e·c right after every `i := i + c`
        let step = basics[&dep.basic];
        for &id in &natural.blocks {
            let mut updates: Vec<usize> = Vec::new();
            for (index, statement) in function.block(id).statements.iter().enumerate() {
                if let Statement::Quadruple(quadruple) = statement
                    && quadruple.op == Operator::ADD
                    && quadruple.result == Some(dep.basic)
                    && statement.uses().contains(&dep.basic)
                {
                    updates.push(index);
                }
            }
            for &index in updates.iter().rev() {
                function.block_mut(id).statements.insert(
                    index + 1,
                    Statement::Quadruple(Quadruple::new(
                        temp,
                        Operator::ADD,
                        Argument::Variable(temp),
                        Argument::Int(dep.e * step),
                    )),
                );
            }
        }

        reduced.push((temp, Dependent { site: dep.site, ..dep }));
    }

    reduced
}

/// NOPs the copy left behind by a reduction once nothing reads the
/// dependent anymore, and the updates of a basic induction variable
/// that only feeds itself.
fn remove_dead_induction_variables(
    function: &mut Function,
    natural: &Loop,
    basics: &IndexMap<VariableId, i64>,
) -> bool {
    let counts = usage::compute(function);
    let mut changed = false;

    for &id in &natural.blocks {
        let (block, context) = function.block_with_context_mut(id);
        for statement in &mut block.statements {
            let Statement::Quadruple(quadruple) = statement else {
                continue;
            };
            let Some(result) = quadruple.result else {
                continue;
            };
            if quadruple.is_nop() {
                continue;
            }

            // a reduced copy whose variable lost its last reader
            if quadruple.op == Operator::ASSIGN
                && counts.read_count(result) == 0
                && context.variable(result).is_temporary()
            {
                *statement = Statement::nop();
                changed = true;
                continue;
            }

            // a basic induction variable only feeding its own update
            if basics.contains_key(&result)
                && quadruple.op == Operator::ADD
                && counts.read_count(result) == 1
                && context.variable(result).is_temporary()
            {
                *statement = Statement::nop();
                changed = true;
            }
        }
    }
    changed
}

/// When the exit comparison runs on a basic induction variable whose
/// only remaining readers are the comparison and its own update, and a
/// single reduced variable `div = e·biv + d` with `e > 0` exists, the
/// comparison is translated onto `div` and the basic update deleted.
fn replace_exit_condition(
    function: &mut Function,
    natural: &Loop,
    basics: &IndexMap<VariableId, i64>,
    reduced: &[(VariableId, Dependent)],
) -> bool {
    let Some((biv, _, _, _)) = loops::exit_condition(function, natural) else {
        return false;
    };
    if !basics.contains_key(&biv) {
        return false;
    }

    let candidates: Vec<&(VariableId, Dependent)> = reduced
        .iter()
        .filter(|(_, dep)| dep.basic == biv && dep.e > 0)
        .collect();
    let [(div, dep)] = &candidates[..] else {
        return false;
    };

    // the basic variable must contribute nothing else: its in-loop
    // readers are the comparison and its own update, and nothing reads
    // it outside the loop except the pre-header initialization
    let counts = usage::compute(function);
    let mut in_loop_reads = 0;
    for &id in &natural.blocks {
        for statement in &function.block(id).statements {
            in_loop_reads += statement.uses().iter().filter(|&&u| u == biv).count();
        }
    }
    let preheader_reads = 1; // the reduction initializer emitted above
    if counts.read_count(biv) != in_loop_reads + preheader_reads || in_loop_reads != 2 {
        return false;
    }
    if !function.context.variable(biv).is_temporary() {
        return false;
    }

    // rewrite the comparison `biv op bound` to `div op e·bound + d`
    let mut rewritten = false;
    for &id in &natural.blocks {
        for statement in &mut function.block_mut(id).statements {
            let (Statement::If(branch) | Statement::IfFalse(branch)) = statement else {
                continue;
            };
            match (&branch.arg1, &branch.arg2) {
                (Argument::Variable(v), Some(Argument::Int(bound))) if *v == biv => {
                    branch.arg2 = Some(Argument::Int(dep.e * bound + dep.d));
                    branch.arg1 = Argument::Variable(*div);
                    rewritten = true;
                }
                (Argument::Int(bound), Some(Argument::Variable(v))) if *v == biv => {
                    branch.arg1 = Argument::Int(dep.e * bound + dep.d);
                    branch.arg2 = Some(Argument::Variable(*div));
                    rewritten = true;
                }
                _ => {}
            }
        }
    }
    if !rewritten {
        return false;
    }

    // the counting now runs on div, the basic update dies
    for &id in &natural.blocks {
        for statement in &mut function.block_mut(id).statements {
            if let Statement::Quadruple(quadruple) = statement
                && quadruple.op == Operator::ADD
                && quadruple.result == Some(biv)
            {
                *statement = Statement::nop();
            }
        }
    }
    trace!("exit condition now counts on {div}");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Branch;
    use crate::mtac::RelationalOperator;
    use crate::mtac::Return;
    use crate::mtac::cfg;
    use crate::mtac::dominators;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::variables::FunctionContext;

    /// do { j := 4·i; a[j] ...; i := i + 1 } while (i < 10)
    fn reducible_loop() -> (Function, VariableId, VariableId) {
        let mut context = FunctionContext::new();
        let i = context.add_local("i", Type::Int, 8);
        let j = context.add_local("j", Type::Int, 8);
        let sum = context.add_local("sum", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
        function.add_statement(Statement::Label(".loop".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            j,
            Operator::MUL,
            Argument::Variable(i),
            Argument::Int(4),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            sum,
            Operator::ADD,
            Argument::Variable(sum),
            Argument::Variable(j),
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
            arg2: Some(Argument::Int(10)),
            label: ".loop".to_string(),
            target: None,
        }));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(sum)],
        }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        dominators::compute(&mut function);
        loops::find_loops(&mut function);
        (function, i, j)
    }

    #[test]
    fn multiplication_becomes_a_running_addition() {
        let (mut function, _, j) = reducible_loop();
        let header = function.loops[0].header;

        assert!(run(&mut function));

        // no multiplication left in the loop body
        let in_loop = function
            .block(header)
            .statements
            .iter()
            .filter(|s| matches!(s, Statement::Quadruple(q) if q.op == Operator::MUL))
            .count();
        assert_eq!(in_loop, 0);

        // j's definition is now a copy of the running temporary
        let copy = function
            .block(header)
            .statements
            .iter()
            .find_map(|s| match s {
                Statement::Quadruple(q) if q.result == Some(j) => Some(q.clone()),
                _ => None,
            })
            .expect("j lost its definition");
        assert_eq!(copy.op, Operator::ASSIGN);

        // the running update `t := t + 4` sits after the i update
        let updates: Vec<_> = function
            .block(header)
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::Quadruple(q)
                    if q.op == Operator::ADD && q.arg2 == Some(Argument::Int(4)) =>
                {
                    Some(q.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 1);
    }
}
