use crate::mtac::function::Function;
use crate::variables::VariableId;
use indexmap::IndexMap;

/// Read/write counts per variable over a whole function. Shared by
/// clean-variables, induction-variable removal and exit-condition
/// replacement.
#[derive(Debug, Clone, Default)]
pub struct VariableUsage {
    pub reads: IndexMap<VariableId, usize>,
    pub writes: IndexMap<VariableId, usize>,
}

impl VariableUsage {
    pub fn read_count(&self, variable: VariableId) -> usize {
        self.reads.get(&variable).copied().unwrap_or(0)
    }

    pub fn write_count(&self, variable: VariableId) -> usize {
        self.writes.get(&variable).copied().unwrap_or(0)
    }

    pub fn is_unused(&self, variable: VariableId) -> bool {
        self.read_count(variable) == 0 && self.write_count(variable) == 0
    }
}

pub fn compute(function: &Function) -> VariableUsage {
    let mut usage = VariableUsage::default();
    for statement in function.all_statements() {
        for used in statement.uses() {
            *usage.reads.entry(used).or_default() += 1;
        }
        for def in statement.defs() {
            *usage.writes.entry(def).or_default() += 1;
        }
    }
    usage
}
