use crate::mtac::Argument;
use crate::mtac::Branch;
use crate::mtac::Goto;
use crate::mtac::Operator;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use ordered_float::OrderedFloat;

/// Evaluates quadruples whose inputs are compile-time constants, and
/// resolves branches on constant conditions into either a NOP or an
/// unconditional goto.
pub fn run(function: &mut Function) -> bool {
    let mut changed = false;
    for id in function.block_ids() {
        for statement in &mut function.block_mut(id).statements {
            match statement {
                Statement::Quadruple(quadruple) => {
                    if let Some(rewritten) = fold_quadruple(quadruple) {
                        *quadruple = rewritten;
                        changed = true;
                    }
                }
                Statement::If(branch) => {
                    if let Some(taken) = fold_branch(branch) {
                        let resolved = resolve(branch.clone(), taken);
                        *statement = resolved;
                        changed = true;
                    }
                }
                Statement::IfFalse(branch) => {
                    if let Some(taken) = fold_branch(branch) {
                        let resolved = resolve(branch.clone(), !taken);
                        *statement = resolved;
                        changed = true;
                    }
                }
                _ => {}
            }
        }
    }
    changed
}

fn resolve(branch: Branch, jumps: bool) -> Statement {
    if jumps {
        Statement::Goto(Goto {
            label: branch.label,
            target: branch.target,
        })
    } else {
        Statement::nop()
    }
}

/// Whether the branch condition evaluates to true.
fn fold_branch(branch: &Branch) -> Option<bool> {
    match (&branch.op, &branch.arg1, &branch.arg2) {
        (None, Argument::Int(value), _) => Some(*value != 0),
        (Some(op), Argument::Int(lhs), Some(Argument::Int(rhs))) => {
            Some(op.evaluate_int(*lhs, *rhs))
        }
        (Some(op), Argument::Float(lhs), Some(Argument::Float(rhs))) => {
            Some(op.evaluate_float(lhs.0, rhs.0))
        }
        _ => None,
    }
}

fn fold_quadruple(quadruple: &Quadruple) -> Option<Quadruple> {
    let result = quadruple.result?;

    // unary operators first
    match quadruple.op {
        Operator::MINUS => {
            if let Some(Argument::Int(value)) = quadruple.arg1 {
                return Some(Quadruple::assign(result, Argument::Int(-value)));
            }
            return None;
        }
        Operator::FMINUS => {
            if let Some(Argument::Float(value)) = quadruple.arg1 {
                return Some(Quadruple::fassign(result, Argument::Float(-value)));
            }
            return None;
        }
        Operator::NOT => {
            if let Some(Argument::Int(value)) = quadruple.arg1 {
                return Some(Quadruple::assign(
                    result,
                    Argument::Int(if value == 0 { 1 } else { 0 }),
                ));
            }
            return None;
        }
        _ => {}
    }

    match (&quadruple.arg1, &quadruple.arg2) {
        (Some(Argument::Int(lhs)), Some(Argument::Int(rhs))) => {
            let (lhs, rhs) = (*lhs, *rhs);
            let value = match quadruple.op {
                Operator::ADD => lhs.wrapping_add(rhs),
                Operator::SUB => lhs.wrapping_sub(rhs),
                Operator::MUL => lhs.wrapping_mul(rhs),
                Operator::DIV if rhs != 0 => lhs.wrapping_div(rhs),
                Operator::MOD if rhs != 0 => lhs.wrapping_rem(rhs),
                Operator::SHL => lhs.wrapping_shl(rhs as u32),
                Operator::SHR => lhs.wrapping_shr(rhs as u32),
                Operator::EQUALS => (lhs == rhs) as i64,
                Operator::NOT_EQUALS => (lhs != rhs) as i64,
                Operator::GREATER => (lhs > rhs) as i64,
                Operator::GREATER_EQUALS => (lhs >= rhs) as i64,
                Operator::LESS => (lhs < rhs) as i64,
                Operator::LESS_EQUALS => (lhs <= rhs) as i64,
                _ => return None,
            };
            Some(Quadruple::assign(result, Argument::Int(value)))
        }
        (Some(Argument::Float(lhs)), Some(Argument::Float(rhs))) => {
            let (lhs, rhs) = (lhs.0, rhs.0);
            match quadruple.op {
                Operator::FADD => Some(Quadruple::fassign(
                    result,
                    Argument::Float(OrderedFloat(lhs + rhs)),
                )),
                Operator::FSUB => Some(Quadruple::fassign(
                    result,
                    Argument::Float(OrderedFloat(lhs - rhs)),
                )),
                Operator::FMUL => Some(Quadruple::fassign(
                    result,
                    Argument::Float(OrderedFloat(lhs * rhs)),
                )),
                Operator::FDIV if rhs != 0.0 => Some(Quadruple::fassign(
                    result,
                    Argument::Float(OrderedFloat(lhs / rhs)),
                )),
                Operator::FE => Some(Quadruple::assign(result, Argument::Int((lhs == rhs) as i64))),
                Operator::FNE => Some(Quadruple::assign(result, Argument::Int((lhs != rhs) as i64))),
                Operator::FG => Some(Quadruple::assign(result, Argument::Int((lhs > rhs) as i64))),
                Operator::FGE => Some(Quadruple::assign(result, Argument::Int((lhs >= rhs) as i64))),
                Operator::FL => Some(Quadruple::assign(result, Argument::Int((lhs < rhs) as i64))),
                Operator::FLE => Some(Quadruple::assign(result, Argument::Int((lhs <= rhs) as i64))),
                _ => None,
            }
        }
        _ => None,
    }
}
