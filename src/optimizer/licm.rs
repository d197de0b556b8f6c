use crate::mtac::Argument;
use crate::mtac::BlockId;
use crate::mtac::Loop;
use crate::mtac::Statement;
use crate::mtac::dominators;
use crate::mtac::function::Function;
use crate::mtac::loops;
use crate::variables::VariableId;
use log::trace;
use std::collections::HashMap;

/// Loop-invariant code motion: pure computations whose operands never
/// change inside the loop move into the pre-header. Memory reads are
/// never hoisted, the memory model is pessimistic.
pub fn run(function: &mut Function) -> bool {
    let candidates = function.loops.clone();
    let mut changed = false;
    for natural in &candidates {
        changed |= hoist(function, natural);
    }
    changed
}

fn hoist(function: &mut Function, natural: &Loop) -> bool {
    let writes = write_counts(function, natural);
    let uses = use_sites(function, natural);
    let exits = natural.exit_blocks(function);

    // decide everything first: moving blocks around invalidates the
    // dominator information the checks rely on
    let mut movable: Vec<(BlockId, usize)> = Vec::new();
    for &id in &natural.blocks {
        for (index, statement) in function.block(id).statements.iter().enumerate() {
            if is_movable(function, natural, statement, (id, index), &writes, &uses, &exits) {
                movable.push((id, index));
            }
        }
    }
    if movable.is_empty() {
        return false;
    }

    let preheader = loops::ensure_preheader(function, natural);
    // removal in descending index order keeps earlier indices stable
    for &(id, index) in movable.iter().rev() {
        let statement = function.block_mut(id).statements.remove(index);
        trace!("licm: hoisting `{statement}`");
        function.block_mut(preheader).statements.push(statement);
    }
    // the pre-header receives the statements in their original order
    let moved = movable.len();
    let statements = &mut function.block_mut(preheader).statements;
    let at = statements.len() - moved;
    statements[at..].reverse();

    true
}

fn write_counts(function: &Function, natural: &Loop) -> HashMap<VariableId, usize> {
    let mut writes = HashMap::new();
    for &id in &natural.blocks {
        for statement in &function.block(id).statements {
            for def in statement.defs() {
                *writes.entry(def).or_insert(0) += 1;
            }
        }
    }
    writes
}

fn use_sites(function: &Function, natural: &Loop) -> HashMap<VariableId, Vec<(BlockId, usize)>> {
    let mut uses: HashMap<VariableId, Vec<(BlockId, usize)>> = HashMap::new();
    for &id in &natural.blocks {
        for (index, statement) in function.block(id).statements.iter().enumerate() {
            for used in statement.uses() {
                uses.entry(used).or_default().push((id, index));
            }
        }
    }
    uses
}

fn is_movable(
    function: &Function,
    natural: &Loop,
    statement: &Statement,
    site: (BlockId, usize),
    writes: &HashMap<VariableId, usize>,
    uses: &HashMap<VariableId, Vec<(BlockId, usize)>>,
    exits: &[BlockId],
) -> bool {
    let Statement::Quadruple(quadruple) = statement else {
        return false;
    };
    // memory reads are excluded by is_expression already
    if !quadruple.op.is_expression() {
        return false;
    }
    let Some(result) = quadruple.result else {
        return false;
    };

    // invariant: every operand is a constant or never written in the loop
    let operands_invariant = [&quadruple.arg1, &quadruple.arg2]
        .into_iter()
        .flatten()
        .all(|argument| match argument {
            Argument::Variable(id) => writes.get(id).copied().unwrap_or(0) == 0,
            _ => true,
        });
    if !operands_invariant {
        return false;
    }

    // single definition, observable through aliasing nowhere
    if writes.get(&result).copied().unwrap_or(0) != 1 {
        return false;
    }
    if function.context.variable(result).escaped
        || function.context.variable(result).position.is_memory()
    {
        return false;
    }

    // movable: the defining block dominates every use in the loop and
    // every exit
    for &(use_block, use_index) in uses.get(&result).map(Vec::as_slice).unwrap_or(&[]) {
        if use_block == site.0 {
            if use_index < site.1 {
                return false;
            }
        } else if !dominators::dominates(function, site.0, use_block) {
            return false;
        }
    }
    for &exit in exits {
        if !dominators::dominates(function, site.0, exit) {
            return false;
        }
    }

    true
}
