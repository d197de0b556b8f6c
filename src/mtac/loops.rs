use crate::mtac::argument::Argument;
use crate::mtac::basic_block::BlockId;
use crate::mtac::dominators;
use crate::mtac::function::Function;
use crate::mtac::operator::Operator;
use crate::mtac::operator::RelationalOperator;
use crate::mtac::statement::Statement;
use crate::variables::VariableId;
use indexmap::IndexMap;
use indexmap::IndexSet;
use log::trace;

/// A natural loop: a single header dominating every block, all back
/// edges targeting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub header: BlockId,
    pub blocks: IndexSet<BlockId>,
    /// Compile-time trip count, `None` when unknown.
    pub estimated_iterations: Option<i64>,
}

impl Loop {
    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains(&id)
    }

    /// The loop's only block, when it has exactly one.
    pub fn single_block(&self) -> Option<BlockId> {
        if self.blocks.len() == 1 {
            self.blocks.first().copied()
        } else {
            None
        }
    }

    /// Blocks with at least one successor outside the loop.
    pub fn exit_blocks(&self, function: &Function) -> Vec<BlockId> {
        self.blocks
            .iter()
            .copied()
            .filter(|&id| {
                function
                    .block(id)
                    .successors
                    .iter()
                    .any(|successor| !self.contains(*successor))
            })
            .collect()
    }
}

/// Finds the natural loops of a function and estimates their trip
/// counts. Requires fresh CFG and dominator information. Back edges
/// sharing a header are merged into a single loop.
pub fn find_loops(function: &mut Function) {
    let mut loops: IndexMap<BlockId, IndexSet<BlockId>> = IndexMap::new();

    for u in function.block_ids() {
        for h in function.block(u).successors.clone() {
            if dominators::dominates(function, h, u) {
                let blocks = natural_loop(function, u, h);
                loops.entry(h).or_default().extend(blocks);
            }
        }
    }

    let naturals: Vec<Loop> = loops
        .into_iter()
        .map(|(header, blocks)| {
            let mut natural = Loop {
                header,
                blocks,
                estimated_iterations: None,
            };
            natural.estimated_iterations = estimate_iterations(function, &natural);
            trace!(
                "{}: loop at {} with {} blocks, {:?} iterations",
                function.name,
                function.block(header).label,
                natural.blocks.len(),
                natural.estimated_iterations
            );
            natural
        })
        .collect();
    function.loops = naturals;
}

/// Returns the loop's pre-header, creating one when needed: a block
/// placed immediately before the header, receiving every edge from
/// outside the loop, so the header has exactly one non-loop
/// predecessor. Invalidates CFG, dominator and loop information.
pub fn ensure_preheader(function: &mut Function, natural: &Loop) -> BlockId {
    let header = natural.header;

    // an existing dedicated pre-header: the unique outside predecessor,
    // empty of terminators, placed straight before the header
    let outside: Vec<BlockId> = function
        .block(header)
        .predecessors
        .iter()
        .copied()
        .filter(|pred| !natural.contains(*pred))
        .collect();
    if let [single] = &outside[..] {
        let single = *single;
        if !function.block(single).is_sentinel()
            && function.previous_in_layout(header) == Some(single)
            && function.block(single).terminator().is_none()
        {
            return single;
        }
    }

    let label = format!("{}_pre", function.block(header).label);
    let preheader = function.new_block(label.clone());
    function.insert_block_before(header, preheader);

    // re-aim every outside branch at the pre-header; fallthrough edges
    // keep flowing because the pre-header sits between them and the header
    for pred in outside {
        match function.block_mut(pred).statements.last_mut() {
            Some(Statement::Goto(goto)) if goto.target == Some(header) => {
                goto.label = label.clone();
                goto.target = Some(preheader);
            }
            Some(Statement::If(branch)) | Some(Statement::IfFalse(branch))
                if branch.target == Some(header) =>
            {
                branch.label = label.clone();
                branch.target = Some(preheader);
            }
            _ => {}
        }
    }

    preheader
}

/// {h} plus every block reaching u without passing through h.
fn natural_loop(function: &Function, u: BlockId, h: BlockId) -> IndexSet<BlockId> {
    let mut blocks = IndexSet::new();
    blocks.insert(h);
    let mut worklist = vec![u];
    while let Some(block) = worklist.pop() {
        if blocks.insert(block) {
            for &pred in &function.block(block).predecessors {
                if !blocks.contains(&pred) {
                    worklist.push(pred);
                }
            }
        }
    }
    blocks
}

/// Basic induction variables of a loop: variables with exactly one
/// write inside the loop, of the shape `i := i + c` with `c` a non-zero
/// integer constant. Float variables are never classified. Returns the
/// step per variable.
pub fn basic_induction_variables(function: &Function, natural: &Loop) -> IndexMap<VariableId, i64> {
    let mut writes: IndexMap<VariableId, usize> = IndexMap::new();
    let mut candidates: IndexMap<VariableId, i64> = IndexMap::new();

    for &id in &natural.blocks {
        for statement in &function.block(id).statements {
            for def in statement.defs() {
                *writes.entry(def).or_default() += 1;
            }
            if let Statement::Quadruple(quadruple) = statement
                && quadruple.op == Operator::ADD
                && let Some(result) = quadruple.result
            {
                let step = match (&quadruple.arg1, &quadruple.arg2) {
                    (Some(Argument::Variable(v)), Some(Argument::Int(c))) if *v == result => {
                        Some(*c)
                    }
                    (Some(Argument::Int(c)), Some(Argument::Variable(v))) if *v == result => {
                        Some(*c)
                    }
                    _ => None,
                };
                if let Some(step) = step
                    && step != 0
                {
                    candidates.insert(result, step);
                }
            }
        }
    }

    candidates.retain(|variable, _| writes.get(variable) == Some(&1));
    candidates
}

/// How a loop tests its terminating condition: in the header before
/// the body runs, or in the latch after it ran at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPosition {
    Top,
    Bottom,
}

/// The loop's terminating comparison in continue form: `(variable,
/// relational op, bound, test position)`. The top-test shape is a
/// header branch leaving the loop; the bottom-test shape is a latch
/// branch jumping back to the header.
pub fn exit_condition(
    function: &Function,
    natural: &Loop,
) -> Option<(VariableId, RelationalOperator, i64, TestPosition)> {
    for &id in &natural.blocks {
        let Some(terminator) = function.block(id).terminator() else {
            continue;
        };
        match terminator {
            // continue on the negation when the branch leaves the loop,
            // on the condition itself when it jumps back to the header
            Statement::IfFalse(branch) => {
                let target = branch.target?;
                if id == natural.header && !natural.contains(target) {
                    let (variable, op, bound) =
                        normalized_condition(branch.op?, &branch.arg1, branch.arg2.as_ref()?)?;
                    return Some((variable, op, bound, TestPosition::Top));
                }
                if target == natural.header {
                    let (variable, op, bound) =
                        normalized_condition(branch.op?, &branch.arg1, branch.arg2.as_ref()?)?;
                    return Some((variable, negate(op), bound, TestPosition::Bottom));
                }
            }
            Statement::If(branch) => {
                let target = branch.target?;
                if id == natural.header && !natural.contains(target) {
                    let (variable, op, bound) =
                        normalized_condition(branch.op?, &branch.arg1, branch.arg2.as_ref()?)?;
                    return Some((variable, negate(op), bound, TestPosition::Top));
                }
                if target == natural.header {
                    let (variable, op, bound) =
                        normalized_condition(branch.op?, &branch.arg1, branch.arg2.as_ref()?)?;
                    return Some((variable, op, bound, TestPosition::Bottom));
                }
            }
            _ => {}
        }
    }
    None
}

fn negate(op: RelationalOperator) -> RelationalOperator {
    match op {
        RelationalOperator::LESS => RelationalOperator::GREATER_EQUALS,
        RelationalOperator::LESS_EQUALS => RelationalOperator::GREATER,
        RelationalOperator::GREATER => RelationalOperator::LESS_EQUALS,
        RelationalOperator::GREATER_EQUALS => RelationalOperator::LESS,
        RelationalOperator::EQUALS => RelationalOperator::NOT_EQUALS,
        RelationalOperator::NOT_EQUALS => RelationalOperator::EQUALS,
    }
}

/// Rewrites a comparison into `variable op bound` form.
fn normalized_condition(
    op: RelationalOperator,
    arg1: &Argument,
    arg2: &Argument,
) -> Option<(VariableId, RelationalOperator, i64)> {
    match (arg1, arg2) {
        (Argument::Variable(variable), Argument::Int(bound)) => Some((*variable, op, *bound)),
        (Argument::Int(bound), Argument::Variable(variable)) => {
            Some((*variable, op.swapped(), *bound))
        }
        _ => None,
    }
}

/// The constant the induction variable starts from, read off the last
/// write in the block preceding the header.
pub fn initial_value(function: &Function, natural: &Loop, variable: VariableId) -> Option<i64> {
    let mut previous = function.previous_in_layout(natural.header)?;
    if function.block(previous).is_entry() {
        return None;
    }
    loop {
        for statement in function.block(previous).statements.iter().rev() {
            if let Statement::Quadruple(quadruple) = statement
                && quadruple.result == Some(variable)
                && quadruple.op == Operator::ASSIGN
            {
                return quadruple.arg1.as_ref()?.int_value();
            }
            if statement.defs().contains(&variable) {
                return None;
            }
        }
        // skip blocks that do not touch the variable at all
        previous = function.previous_in_layout(previous)?;
        if function.block(previous).is_entry() {
            return None;
        }
    }
}

fn estimate_iterations(function: &Function, natural: &Loop) -> Option<i64> {
    let induction_variables = basic_induction_variables(function, natural);
    let (variable, op, bound, position) = exit_condition(function, natural)?;
    let step = *induction_variables.get(&variable)?;
    let initial = initial_value(function, natural, variable)?;
    let trips = compute_iterations(initial, bound, step, op)?;
    match position {
        TestPosition::Top => Some(trips),
        // a bottom test runs the body once before the first comparison
        TestPosition::Bottom => Some(trips.max(1)),
    }
}

/// Number of times a loop `for (i := initial; i op bound; i += step)`
/// executes its body.
pub fn compute_iterations(
    initial: i64,
    bound: i64,
    step: i64,
    op: RelationalOperator,
) -> Option<i64> {
    match op {
        RelationalOperator::LESS if step > 0 => {
            Some(((bound - initial).max(0) + step - 1) / step)
        }
        RelationalOperator::LESS_EQUALS if step > 0 => {
            Some(((bound - initial + 1).max(0) + step - 1) / step)
        }
        RelationalOperator::GREATER if step < 0 => {
            Some(((initial - bound).max(0) + (-step) - 1) / -step)
        }
        RelationalOperator::GREATER_EQUALS if step < 0 => {
            Some(((initial - bound + 1).max(0) + (-step) - 1) / -step)
        }
        _ => None,
    }
}
