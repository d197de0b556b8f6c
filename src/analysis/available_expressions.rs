use crate::analysis::DataFlowProblem;
use crate::analysis::DataFlowResults;
use crate::analysis::solve;
use crate::mtac::argument::Argument;
use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::operator::Operator;
use crate::mtac::statement::Statement;
use crate::variables::VariableId;
use indexmap::IndexSet;

/// Fingerprint of a pure computation. Two expressions are equivalent
/// iff their operator and both arguments compare equal.
pub type Expression = (Operator, Argument, Option<Argument>);

/// `None` is the top element: every expression available. The meet is
/// intersection, so top is the identity.
pub type AvailableSet = Option<IndexSet<Expression>>;

/// Available expressions for common-subexpression elimination.
/// Expressions over escaped variables are never tracked, stores through
/// aliases could invalidate them unseen.
pub struct AvailableExpressionsProblem;

fn mentions(expression: &Expression, variable: VariableId) -> bool {
    let as_variable = Argument::Variable(variable);
    expression.1 == as_variable || expression.2.as_ref() == Some(&as_variable)
}

fn kill_variable(set: &mut IndexSet<Expression>, variable: VariableId) {
    set.retain(|expression| !mentions(expression, variable));
}

impl DataFlowProblem for AvailableExpressionsProblem {
    type Domain = AvailableSet;

    fn forward(&self) -> bool {
        true
    }

    fn boundary(&self, _function: &Function) -> AvailableSet {
        Some(IndexSet::new())
    }

    fn init(&self, _function: &Function) -> AvailableSet {
        None
    }

    fn meet(&self, a: &AvailableSet, b: &AvailableSet) -> AvailableSet {
        match (a, b) {
            (None, other) | (other, None) => other.clone(),
            (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
        }
    }

    fn transfer(
        &self,
        function: &Function,
        _block: BlockId,
        _index: usize,
        statement: &Statement,
        before: &AvailableSet,
    ) -> AvailableSet {
        let Some(before) = before else {
            return None;
        };
        let mut available = before.clone();

        match statement {
            Statement::Quadruple(quadruple) => {
                if quadruple.op.is_expression()
                    && let Some(arg1) = &quadruple.arg1
                {
                    let operands_escape = [Some(arg1), quadruple.arg2.as_ref()]
                        .into_iter()
                        .flatten()
                        .filter_map(|a| a.variable())
                        .any(|id| function.context.variable(id).escaped);
                    if !operands_escape {
                        available.insert((quadruple.op, arg1.clone(), quadruple.arg2.clone()));
                    }
                }
                for def in statement.defs() {
                    kill_variable(&mut available, def);
                }
            }
            Statement::Call(_) => {
                // a call may write any escaped or memory-homed variable
                available.retain(|expression| {
                    [Some(&expression.1), expression.2.as_ref()]
                        .into_iter()
                        .flatten()
                        .filter_map(|a| a.variable())
                        .all(|id| {
                            let variable = function.context.variable(id);
                            !variable.escaped && !variable.position.is_memory()
                        })
                });
                for def in statement.defs() {
                    kill_variable(&mut available, def);
                }
            }
            _ => {}
        }

        Some(available)
    }
}

pub fn available_expressions(function: &Function) -> DataFlowResults<AvailableSet> {
    solve(&AvailableExpressionsProblem, function)
}
