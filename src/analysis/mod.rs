pub mod available_expressions;
pub mod escape;
pub mod liveness;
pub mod reaching_definitions;
pub mod usage;

use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::statement::Statement;
use std::collections::HashMap;

/// A data-flow problem: a lattice with a meet, boundary/initial values
/// and a monotone per-statement transfer function. Termination follows
/// from monotonicity and finite lattice height; non-termination is a
/// bug, not a recoverable condition.
pub trait DataFlowProblem {
    type Domain: Clone + PartialEq;

    fn forward(&self) -> bool;

    /// Value at ENTRY for forward problems, at EXIT for backward ones.
    fn boundary(&self, function: &Function) -> Self::Domain;

    /// Initial value of every other block.
    fn init(&self, function: &Function) -> Self::Domain;

    /// Commutative, associative meet.
    fn meet(&self, a: &Self::Domain, b: &Self::Domain) -> Self::Domain;

    /// Forward: maps the value before a statement to the value after it.
    /// Backward: maps the value after a statement to the value before it.
    fn transfer(
        &self,
        function: &Function,
        block: BlockId,
        index: usize,
        statement: &Statement,
        value: &Self::Domain,
    ) -> Self::Domain;
}

/// Solver output at block granularity and statement granularity, so
/// optimizers can query pre/post-statement facts uniformly.
#[derive(Debug, Clone)]
pub struct DataFlowResults<D> {
    pub block_in: HashMap<BlockId, D>,
    pub block_out: HashMap<BlockId, D>,
    pub statement_in: HashMap<(BlockId, usize), D>,
    pub statement_out: HashMap<(BlockId, usize), D>,
}

impl<D> Default for DataFlowResults<D> {
    fn default() -> Self {
        DataFlowResults {
            block_in: HashMap::new(),
            block_out: HashMap::new(),
            statement_in: HashMap::new(),
            statement_out: HashMap::new(),
        }
    }
}

/// Meet-over-paths fixed point of `problem` on `function`.
pub fn solve<P: DataFlowProblem>(problem: &P, function: &Function) -> DataFlowResults<P::Domain> {
    let mut results = DataFlowResults::default();
    let ids = function.block_ids();

    for &id in &ids {
        results.block_in.insert(id, problem.init(function));
        results.block_out.insert(id, problem.init(function));
    }

    let forward = problem.forward();
    let boundary_block = if forward { function.entry } else { function.exit };

    let mut changed = true;
    while changed {
        changed = false;

        let order: Box<dyn Iterator<Item = &BlockId>> = if forward {
            Box::new(ids.iter())
        } else {
            Box::new(ids.iter().rev())
        };

        for &id in order {
            // meet over the control-flow neighbors on the input side
            let input = if id == boundary_block {
                problem.boundary(function)
            } else {
                let neighbors = if forward {
                    &function.block(id).predecessors
                } else {
                    &function.block(id).successors
                };
                let mut value: Option<P::Domain> = None;
                for neighbor in neighbors {
                    let neighbor_value = if forward {
                        &results.block_out[neighbor]
                    } else {
                        &results.block_in[neighbor]
                    };
                    value = Some(match value {
                        None => neighbor_value.clone(),
                        Some(current) => problem.meet(&current, neighbor_value),
                    });
                }
                value.unwrap_or_else(|| problem.init(function))
            };

            let output = transfer_block(problem, function, id, &input);

            let (input_slot, output_slot) = if forward {
                (&mut results.block_in, &mut results.block_out)
            } else {
                (&mut results.block_out, &mut results.block_in)
            };
            if input_slot[&id] != input {
                input_slot.insert(id, input);
                changed = true;
            }
            if output_slot[&id] != output {
                output_slot.insert(id, output);
                changed = true;
            }
        }
    }

    // one stabilized pass filling the statement-level facts
    for &id in &ids {
        let mut value = if forward {
            results.block_in[&id].clone()
        } else {
            results.block_out[&id].clone()
        };
        let statements = &function.block(id).statements;
        let indices: Vec<usize> = if forward {
            (0..statements.len()).collect()
        } else {
            (0..statements.len()).rev().collect()
        };
        for index in indices {
            let statement = &statements[index];
            let after = problem.transfer(function, id, index, statement, &value);
            if forward {
                results.statement_in.insert((id, index), value.clone());
                results.statement_out.insert((id, index), after.clone());
            } else {
                results.statement_out.insert((id, index), value.clone());
                results.statement_in.insert((id, index), after.clone());
            }
            value = after;
        }
    }

    results
}

fn transfer_block<P: DataFlowProblem>(
    problem: &P,
    function: &Function,
    id: BlockId,
    input: &P::Domain,
) -> P::Domain {
    let statements = &function.block(id).statements;
    let mut value = input.clone();
    if problem.forward() {
        for (index, statement) in statements.iter().enumerate() {
            value = problem.transfer(function, id, index, statement, &value);
        }
    } else {
        for (index, statement) in statements.iter().enumerate().rev() {
            value = problem.transfer(function, id, index, statement, &value);
        }
    }
    value
}
