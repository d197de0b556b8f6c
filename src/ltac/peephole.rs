use crate::ltac::address::Address;
use crate::ltac::address::BaseRegister;
use crate::ltac::instruction::Instruction;
use crate::ltac::instruction::LtacArg;
use crate::ltac::instruction::LtacFunction;
use crate::ltac::instruction::LtacOp;
use log::trace;

/// Peephole rewriting over the final instruction stream: algebraic and
/// encoding shortcuts on single instructions, then adjacent-pair
/// cleanups, NOPs swept after each pass. Two passes reach a fixed
/// point on everything the rules can produce.
pub fn optimize(function: &mut LtacFunction) {
    for _ in 0..2 {
        single_pass(function);
        pair_pass(function);
        function.sweep_nops();
    }
    trace!(
        "{}: {} instructions after peephole",
        function.name,
        function.instructions.len()
    );
}

fn single_pass(function: &mut LtacFunction) {
    for instruction in &mut function.instructions {
        if let Some(rewritten) = rewrite_single(instruction) {
            *instruction = rewritten;
        }
    }
}

fn rewrite_single(instruction: &Instruction) -> Option<Instruction> {
    let register = |arg: &Option<LtacArg>| match arg {
        Some(LtacArg::Register(register)) => Some(*register),
        _ => None,
    };

    match instruction.op {
        LtacOp::MOV => {
            let dest = register(&instruction.arg1)?;
            match &instruction.arg2 {
                // a register clears cheaper through xor
                Some(LtacArg::Imm(0)) => Some(Instruction::new(
                    LtacOp::XOR,
                    LtacArg::Register(dest),
                    LtacArg::Register(dest),
                )),
                Some(LtacArg::Register(source)) if *source == dest => Some(Instruction::nop()),
                _ => None,
            }
        }
        LtacOp::ADD => {
            let dest = register(&instruction.arg1)?;
            match &instruction.arg2 {
                Some(LtacArg::Imm(1)) => {
                    Some(Instruction::new(LtacOp::INC, LtacArg::Register(dest), None))
                }
                Some(LtacArg::Imm(-1)) => {
                    Some(Instruction::new(LtacOp::DEC, LtacArg::Register(dest), None))
                }
                _ => None,
            }
        }
        LtacOp::SUB => {
            let dest = register(&instruction.arg1)?;
            match &instruction.arg2 {
                Some(LtacArg::Imm(1)) => {
                    Some(Instruction::new(LtacOp::DEC, LtacArg::Register(dest), None))
                }
                Some(LtacArg::Imm(-1)) => {
                    Some(Instruction::new(LtacOp::INC, LtacArg::Register(dest), None))
                }
                _ => None,
            }
        }
        LtacOp::MUL => {
            let dest = register(&instruction.arg1)?;
            let Some(LtacArg::Imm(value)) = instruction.arg2 else {
                return None;
            };
            match value {
                // powers of two shift
                _ if value > 1 && value.count_ones() == 1 => Some(Instruction::new(
                    LtacOp::SHL,
                    LtacArg::Register(dest),
                    LtacArg::Imm(value.trailing_zeros() as i64),
                )),
                // 3, 5 and 9 fit one LEA
                3 | 5 | 9 => Some(Instruction::new(
                    LtacOp::LEA,
                    LtacArg::Register(dest),
                    LtacArg::Address(Address::indexed(
                        Some(BaseRegister::Register(dest)),
                        BaseRegister::Register(dest),
                        (value - 1) as u8,
                        0,
                        None,
                    )),
                )),
                _ => None,
            }
        }
        LtacOp::CMP => {
            let dest = register(&instruction.arg1)?;
            match &instruction.arg2 {
                Some(LtacArg::Imm(0)) => Some(Instruction::new(
                    LtacOp::OR,
                    LtacArg::Register(dest),
                    LtacArg::Register(dest),
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

fn pair_pass(function: &mut LtacFunction) {
    for index in 0..function.instructions.len().saturating_sub(1) {
        let (first, second) = function.instructions.split_at_mut(index + 1);
        let first = &mut first[index];
        let second = &mut second[0];
        rewrite_pair(first, second);
    }
}

/// Whether the instruction reads the given register through its second
/// argument or an address.
fn reads_register(instruction: &Instruction, register: crate::ltac::Register) -> bool {
    instruction.args().any(|arg| match arg {
        LtacArg::Register(r) => *r == register,
        LtacArg::Address(address) => [address.base, address.index]
            .into_iter()
            .flatten()
            .any(|base| base == BaseRegister::Register(register)),
        _ => false,
    })
}

fn rewrite_pair(first: &mut Instruction, second: &mut Instruction) {
    match (first.op, second.op) {
        // the second of two leaves never runs
        (LtacOp::LEAVE, LtacOp::LEAVE) => {
            *second = Instruction::nop();
        }
        // adjacent stack frees fold into one
        (LtacOp::FREE_STACK, LtacOp::FREE_STACK) => {
            if let (Some(LtacArg::Imm(a)), Some(LtacArg::Imm(b))) = (&first.arg1, &second.arg1) {
                first.arg1 = Some(LtacArg::Imm(a + b));
                *second = Instruction::nop();
            }
        }
        (LtacOp::MOV, LtacOp::MOV) => {
            // a cross move or a load/store echo: the second is a no-op
            if first.arg1 == second.arg2 && first.arg2 == second.arg1 {
                *second = Instruction::nop();
                return;
            }
            // two stores to the same destination: the first never sticks
            if first.arg1 == second.arg1 {
                let clobbered = match (&first.arg1, &second.arg2) {
                    (Some(LtacArg::Register(dest)), _) => !reads_register(second, *dest),
                    _ => false,
                };
                if clobbered {
                    *first = Instruction::nop();
                }
            }
        }
        // MOV r, x; ADD r, c folds into a single address computation
        (LtacOp::MOV, LtacOp::ADD) => {
            if let (
                Some(LtacArg::Register(dest)),
                Some(LtacArg::Register(source)),
                Some(LtacArg::Register(dest2)),
                Some(LtacArg::Imm(constant)),
            ) = (&first.arg1, &first.arg2, &second.arg1, &second.arg2)
                && dest == dest2
            {
                *second = Instruction::new(
                    LtacOp::LEA,
                    LtacArg::Register(*dest),
                    LtacArg::Address(Address::base_offset(
                        BaseRegister::Register(*source),
                        *constant as i32,
                    )),
                );
                *first = Instruction::nop();
            }
        }
        _ => {}
    }
}
