use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::variables::VariableId;
use std::collections::HashMap;

/// A block-local linear fact about a variable: `var = base + shift` or
/// `var = base * factor`.
#[derive(Debug, Clone, Copy)]
enum Fact {
    Shifted { base: VariableId, shift: i64 },
    Scaled { base: VariableId, factor: i64 },
}

/// Block-local reassociation of chained constant arithmetic:
/// `t := a + c1; r := t + c2` collapses into `r := a + (c1 + c2)`, and
/// the multiplicative analogue. The intermediate stays untouched, dead
/// code elimination sweeps it once it loses its last reader.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        let mut facts: HashMap<VariableId, Fact> = HashMap::new();

        for statement in &mut function.block_mut(id).statements {
            // aliasing writes make the tracked bases unreliable
            let aliasing_write = matches!(statement, Statement::Call(_))
                || matches!(statement, Statement::Quadruple(q) if q.op.is_indirect_store());
            if aliasing_write {
                facts.clear();
                continue;
            }

            if let Statement::Quadruple(quadruple) = statement
                && let Some(rewritten) = combine(quadruple, &facts)
            {
                *quadruple = rewritten;
                changed = true;
            }

            for def in statement.defs() {
                facts.remove(&def);
                facts.retain(|_, fact| match fact {
                    Fact::Shifted { base, .. } | Fact::Scaled { base, .. } => *base != def,
                });
            }

            if let Statement::Quadruple(quadruple) = statement
                && let Some(fact) = fact_of(quadruple)
            {
                facts.insert(quadruple.result.unwrap(), fact);
            }
        }
    }
    changed
}

fn linear_operands(quadruple: &Quadruple) -> Option<(VariableId, i64)> {
    match (&quadruple.arg1, &quadruple.arg2) {
        (Some(Argument::Variable(v)), Some(Argument::Int(c)))
        | (Some(Argument::Int(c)), Some(Argument::Variable(v))) => Some((*v, *c)),
        _ => None,
    }
}

fn fact_of(quadruple: &Quadruple) -> Option<Fact> {
    quadruple.result?;
    let (base, constant) = linear_operands(quadruple)?;
    match quadruple.op {
        Operator::ADD => Some(Fact::Shifted {
            base,
            shift: constant,
        }),
        // SUB is only linear with the constant on the right
        Operator::SUB if matches!(quadruple.arg2, Some(Argument::Int(_))) => Some(Fact::Shifted {
            base,
            shift: -constant,
        }),
        Operator::MUL => Some(Fact::Scaled {
            base,
            factor: constant,
        }),
        _ => None,
    }
}

fn combine(quadruple: &Quadruple, facts: &HashMap<VariableId, Fact>) -> Option<Quadruple> {
    let result = quadruple.result?;
    let (via, constant) = linear_operands(quadruple)?;
    let fact = facts.get(&via)?;

    match (quadruple.op, fact) {
        (Operator::ADD, Fact::Shifted { base, shift }) => {
            Some(shifted(result, *base, shift + constant))
        }
        (Operator::SUB, Fact::Shifted { base, shift })
            if matches!(quadruple.arg2, Some(Argument::Int(_))) =>
        {
            Some(shifted(result, *base, shift - constant))
        }
        (Operator::MUL, Fact::Scaled { base, factor }) => Some(Quadruple::new(
            result,
            Operator::MUL,
            Argument::Variable(*base),
            Argument::Int(factor * constant),
        )),
        _ => None,
    }
}

fn shifted(result: VariableId, base: VariableId, shift: i64) -> Quadruple {
    if shift == 0 {
        Quadruple::assign(result, Argument::Variable(base))
    } else {
        Quadruple::new(result, Operator::ADD, Argument::Variable(base), Argument::Int(shift))
    }
}
