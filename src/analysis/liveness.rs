use crate::analysis::DataFlowProblem;
use crate::analysis::DataFlowResults;
use crate::analysis::solve;
use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::statement::Statement;
use crate::variables::VariableId;
use indexmap::IndexSet;

pub type LiveSet = IndexSet<VariableId>;

/// Live variables: backward set problem, `use ∪ (out − def)` transfer.
/// Consumed by the register allocator and the dead-code passes.
pub struct LiveVariablesProblem;

impl DataFlowProblem for LiveVariablesProblem {
    type Domain = LiveSet;

    fn forward(&self) -> bool {
        false
    }

    fn boundary(&self, function: &Function) -> LiveSet {
        // memory-homed variables stay observable past the exit
        function
            .context
            .iter()
            .filter(|(_, variable)| variable.position.is_memory() || variable.escaped)
            .map(|(id, _)| id)
            .collect()
    }

    fn init(&self, _function: &Function) -> LiveSet {
        LiveSet::new()
    }

    fn meet(&self, a: &LiveSet, b: &LiveSet) -> LiveSet {
        a.union(b).copied().collect()
    }

    fn transfer(
        &self,
        _function: &Function,
        _block: BlockId,
        _index: usize,
        statement: &Statement,
        after: &LiveSet,
    ) -> LiveSet {
        let mut live = after.clone();
        for def in statement.defs() {
            live.shift_remove(&def);
        }
        for used in statement.uses() {
            live.insert(used);
        }
        live
    }
}

pub fn live_variables(function: &Function) -> DataFlowResults<LiveSet> {
    solve(&LiveVariablesProblem, function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Argument;
    use crate::mtac::Operator;
    use crate::mtac::Quadruple;
    use crate::mtac::Return;
    use crate::mtac::cfg;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn temporary_dead_after_last_use() {
        let mut context = FunctionContext::new();
        let t1 = context.new_temporary(Type::Int);
        let t2 = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        // t1 := 3; t2 := t1 + 1; return t2
        function.add_statement(Statement::Quadruple(Quadruple::assign(t1, Argument::Int(3))));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t2,
            Operator::ADD,
            Argument::Variable(t1),
            Argument::Int(1),
        )));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(t2)],
        }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);
        let results = live_variables(&function);

        let block = function.real_block_ids()[0];
        // t1 is live into the addition, dead out of it
        assert!(results.statement_in[&(block, 1)].contains(&t1));
        assert!(!results.statement_out[&(block, 1)].contains(&t1));
        // t2 is live out of its definition, up to the return
        assert!(results.statement_out[&(block, 1)].contains(&t2));
        assert!(results.statement_in[&(block, 2)].contains(&t2));
    }
}
