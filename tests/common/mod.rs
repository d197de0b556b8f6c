use eddic_core::mtac::Argument;
use eddic_core::mtac::Operator;
use eddic_core::mtac::Statement;
use eddic_core::mtac::function::Function;
use eddic_core::variables::VariableId;
use std::collections::HashMap;

/// Final integer state of a reference run: scalar variables and array
/// contents.
#[derive(Debug, Default, PartialEq)]
pub struct MachineState {
    pub ints: HashMap<VariableId, i64>,
    pub arrays: HashMap<VariableId, Vec<i64>>,
}

impl MachineState {
    fn read(&self, argument: &Argument) -> i64 {
        match argument {
            Argument::Int(value) => *value,
            Argument::Variable(id) => self.ints.get(id).copied().unwrap_or(0),
            other => panic!("reference interpreter cannot read {other:?}"),
        }
    }
}

const STEP_LIMIT: usize = 1_000_000;

/// A reference interpreter for side-effect-free integer functions:
/// executes the extracted blocks directly, so the same input can run
/// before and after optimization and the observable variables can be
/// compared.
pub fn interpret(function: &Function) -> MachineState {
    let mut state = MachineState::default();
    let mut steps = 0;

    let mut block = match function.next_in_layout(function.entry) {
        Some(block) => block,
        None => return state,
    };

    'blocks: loop {
        if function.block(block).is_exit() {
            break;
        }
        let statements = function.block(block).statements.clone();
        for statement in &statements {
            steps += 1;
            assert!(steps < STEP_LIMIT, "reference run diverged");

            match statement {
                Statement::Quadruple(quadruple) => execute(quadruple, &mut state),
                Statement::Goto(goto) => {
                    block = goto.target.expect("unresolved goto");
                    continue 'blocks;
                }
                Statement::If(branch) => {
                    if evaluate(branch, &state) {
                        block = branch.target.expect("unresolved branch");
                        continue 'blocks;
                    }
                }
                Statement::IfFalse(branch) => {
                    if !evaluate(branch, &state) {
                        block = branch.target.expect("unresolved branch");
                        continue 'blocks;
                    }
                }
                Statement::Return(_) => break 'blocks,
                other => panic!("reference interpreter cannot execute {other}"),
            }
        }
        block = match function.next_in_layout(block) {
            Some(next) => next,
            None => break,
        };
    }

    state
}

fn evaluate(branch: &eddic_core::mtac::Branch, state: &MachineState) -> bool {
    let lhs = state.read(&branch.arg1);
    match (&branch.op, &branch.arg2) {
        (Some(op), Some(rhs)) => op.evaluate_int(lhs, state.read(rhs)),
        _ => lhs != 0,
    }
}

fn execute(quadruple: &eddic_core::mtac::Quadruple, state: &mut MachineState) {
    if quadruple.op == Operator::NOP {
        return;
    }

    if quadruple.op == Operator::ARRAY_ASSIGN {
        let base = quadruple.result.expect("store without base");
        let index = state.read(quadruple.arg1.as_ref().unwrap()) as usize;
        let value = state.read(quadruple.arg2.as_ref().unwrap());
        let array = state.arrays.entry(base).or_default();
        if array.len() <= index {
            array.resize(index + 1, 0);
        }
        array[index] = value;
        return;
    }

    let result = quadruple.result.expect("computation without result");
    if quadruple.op == Operator::ARRAY {
        let base = quadruple
            .arg1
            .as_ref()
            .and_then(|a| a.variable())
            .expect("element read without base");
        let index = state.read(quadruple.arg2.as_ref().unwrap()) as usize;
        let value = state
            .arrays
            .get(&base)
            .and_then(|array| array.get(index))
            .copied()
            .unwrap_or(0);
        state.ints.insert(result, value);
        return;
    }

    let lhs = quadruple.arg1.as_ref().map(|a| state.read(a));
    let rhs = quadruple.arg2.as_ref().map(|a| state.read(a));
    let value = match quadruple.op {
        Operator::ASSIGN => lhs.unwrap(),
        Operator::ADD => lhs.unwrap() + rhs.unwrap(),
        Operator::SUB => lhs.unwrap() - rhs.unwrap(),
        Operator::MUL => lhs.unwrap() * rhs.unwrap(),
        Operator::DIV => lhs.unwrap() / rhs.unwrap(),
        Operator::MOD => lhs.unwrap() % rhs.unwrap(),
        Operator::SHL => lhs.unwrap() << rhs.unwrap(),
        Operator::SHR => lhs.unwrap() >> rhs.unwrap(),
        Operator::MINUS => -lhs.unwrap(),
        Operator::NOT => (lhs.unwrap() == 0) as i64,
        Operator::EQUALS => (lhs.unwrap() == rhs.unwrap()) as i64,
        Operator::NOT_EQUALS => (lhs.unwrap() != rhs.unwrap()) as i64,
        Operator::GREATER => (lhs.unwrap() > rhs.unwrap()) as i64,
        Operator::GREATER_EQUALS => (lhs.unwrap() >= rhs.unwrap()) as i64,
        Operator::LESS => (lhs.unwrap() < rhs.unwrap()) as i64,
        Operator::LESS_EQUALS => (lhs.unwrap() <= rhs.unwrap()) as i64,
        other => panic!("reference interpreter cannot execute operator {other}"),
    };
    state.ints.insert(result, value);
}
