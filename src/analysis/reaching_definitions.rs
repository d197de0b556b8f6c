use crate::analysis::DataFlowProblem;
use crate::analysis::DataFlowResults;
use crate::analysis::solve;
use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::statement::Statement;
use crate::variables::VariableId;
use indexmap::IndexMap;
use indexmap::IndexSet;

/// A definition site: the statement at `index` in `block`.
pub type Definition = (BlockId, usize);

pub type ReachingSet = IndexMap<VariableId, IndexSet<Definition>>;

/// Reaching definitions: forward, gen/kill per written variable.
pub struct ReachingDefinitionsProblem;

impl DataFlowProblem for ReachingDefinitionsProblem {
    type Domain = ReachingSet;

    fn forward(&self) -> bool {
        true
    }

    fn boundary(&self, _function: &Function) -> ReachingSet {
        ReachingSet::new()
    }

    fn init(&self, _function: &Function) -> ReachingSet {
        ReachingSet::new()
    }

    fn meet(&self, a: &ReachingSet, b: &ReachingSet) -> ReachingSet {
        let mut merged = a.clone();
        for (variable, definitions) in b {
            merged.entry(*variable).or_default().extend(definitions);
        }
        merged
    }

    fn transfer(
        &self,
        _function: &Function,
        block: BlockId,
        index: usize,
        statement: &Statement,
        before: &ReachingSet,
    ) -> ReachingSet {
        let defs = statement.defs();
        if defs.is_empty() {
            return before.clone();
        }
        let mut after = before.clone();
        for def in defs {
            let mut definitions = IndexSet::new();
            definitions.insert((block, index));
            after.insert(def, definitions);
        }
        after
    }
}

pub fn reaching_definitions(function: &Function) -> DataFlowResults<ReachingSet> {
    solve(&ReachingDefinitionsProblem, function)
}
