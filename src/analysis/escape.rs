use crate::analysis::DataFlowProblem;
use crate::analysis::solve;
use crate::mtac::argument::Argument;
use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::operator::Operator;
use crate::mtac::statement::Statement;
use crate::variables::VariableId;
use indexmap::IndexSet;
use log::trace;

pub type EscapedSet = IndexSet<VariableId>;

/// Pointer-taken analysis: a variable escapes once its address is
/// observable outside analyzable control flow. Escaped variables are
/// forbidden from residing only in registers.
pub struct EscapeProblem;

impl DataFlowProblem for EscapeProblem {
    type Domain = EscapedSet;

    fn forward(&self) -> bool {
        true
    }

    fn boundary(&self, _function: &Function) -> EscapedSet {
        EscapedSet::new()
    }

    fn init(&self, _function: &Function) -> EscapedSet {
        EscapedSet::new()
    }

    fn meet(&self, a: &EscapedSet, b: &EscapedSet) -> EscapedSet {
        a.union(b).copied().collect()
    }

    fn transfer(
        &self,
        function: &Function,
        _block: BlockId,
        _index: usize,
        statement: &Statement,
        before: &EscapedSet,
    ) -> EscapedSet {
        let mut escaped = before.clone();
        match statement {
            // the callee receives the address of the value
            Statement::Param(param) if param.address => {
                if let Argument::Variable(id) = param.value {
                    escaped.insert(id);
                }
            }
            Statement::Quadruple(quadruple) => match quadruple.op {
                // taking the address of a member
                Operator::PDOT => {
                    if let Some(Argument::Variable(base)) = quadruple.arg1 {
                        escaped.insert(base);
                    }
                }
                // reading or writing through a pointer-typed base
                Operator::DOT | Operator::FDOT | Operator::DOT_ASSIGN | Operator::DOT_FASSIGN => {
                    let base = match quadruple.op {
                        Operator::DOT | Operator::FDOT => {
                            quadruple.arg1.as_ref().and_then(|a| a.variable())
                        }
                        _ => quadruple.result,
                    };
                    if let Some(base) = base
                        && function.context.variable(base).var_type.is_pointer()
                    {
                        escaped.insert(base);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        escaped
    }
}

/// Runs the escape analysis and writes the escape flags back into the
/// function context. Returns the escaped set.
pub fn escape_analysis(function: &mut Function) -> EscapedSet {
    let results = solve(&EscapeProblem, function);

    // escaping anywhere escapes everywhere: union over all blocks
    let mut escaped = EscapedSet::new();
    for out in results.block_out.values() {
        escaped.extend(out.iter().copied());
    }

    for (id, _) in function
        .context
        .iter()
        .map(|(id, v)| (id, v.escaped))
        .collect::<Vec<_>>()
    {
        let is_escaped = escaped.contains(&id);
        function.context.variable_mut(id).escaped = is_escaped;
    }

    if !escaped.is_empty() {
        trace!("{}: {} escaped variables", function.name, escaped.len());
    }
    escaped
}
