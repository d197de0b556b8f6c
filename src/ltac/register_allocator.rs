use crate::error::MiddleEndError;
use crate::global::platform::Platform;
use crate::ltac::address::BaseRegister;
use crate::ltac::instruction::Instruction;
use crate::ltac::instruction::LtacArg;
use crate::ltac::instruction::LtacFunction;
use crate::ltac::instruction::LtacOp;
use crate::ltac::register::FloatRegister;
use crate::ltac::register::Register;
use crate::ltac::compiler::patch_enter;
use log::debug;
use std::collections::HashMap;
use std::hash::Hash;

/// A register class the linear scan runs over: hard integer or hard
/// floating registers.
pub trait RegisterClass: Copy + Eq + Hash {
    const MOV: LtacOp;
    fn operand(self) -> LtacArg;
}

impl RegisterClass for Register {
    const MOV: LtacOp = LtacOp::MOV;
    fn operand(self) -> LtacArg {
        LtacArg::Register(self)
    }
}

impl RegisterClass for FloatRegister {
    const MOV: LtacOp = LtacOp::FMOV;
    fn operand(self) -> LtacArg {
        LtacArg::FloatRegister(self)
    }
}

/// Live range of a pseudo-register in instruction positions, with its
/// binding hint.
#[derive(Debug, Clone, Copy)]
struct Interval<R> {
    start: usize,
    end: usize,
    bound: Option<R>,
}

struct ClassState<R: RegisterClass> {
    order: Vec<R>,
    intervals: HashMap<u32, Interval<R>>,
    assignment: HashMap<u32, R>,
    occupant: HashMap<R, u32>,
    dirty: HashMap<u32, bool>,
    homes: HashMap<u32, i32>,
}

impl<R: RegisterClass> ClassState<R> {
    fn new(order: Vec<R>) -> ClassState<R> {
        ClassState {
            order,
            intervals: HashMap::new(),
            assignment: HashMap::new(),
            occupant: HashMap::new(),
            dirty: HashMap::new(),
            homes: HashMap::new(),
        }
    }

    fn note(&mut self, id: u32, position: usize, bound: Option<R>) {
        let interval = self.intervals.entry(id).or_insert(Interval {
            start: position,
            end: position,
            bound: None,
        });
        interval.start = interval.start.min(position);
        interval.end = interval.end.max(position);
        if interval.bound.is_none() {
            interval.bound = bound;
        }
    }

    fn unmap(&mut self, id: u32) {
        if let Some(register) = self.assignment.remove(&id) {
            self.occupant.remove(&register);
        }
        self.dirty.remove(&id);
    }

    fn home(&mut self, id: u32, stack_size: &mut usize, word: usize) -> i32 {
        if let Some(&home) = self.homes.get(&id) {
            return home;
        }
        *stack_size += word;
        let home = -(*stack_size as i64) as i32;
        self.homes.insert(id, home);
        home
    }
}

/// Rewrites every pseudo-register of a lowered function to a hard
/// register of its class, inserting spills and reloads. Selection
/// priority: a free register, a register whose occupant's range ended,
/// a register whose occupant is clean, and only then a spill of the
/// occupant. Registers touched by the current instruction are
/// reserved; live caller-saved registers are saved across calls.
pub fn allocate(function: &mut LtacFunction, platform: &Platform) -> Result<(), MiddleEndError> {
    let mut ints = ClassState::new(platform.registers.clone());
    let mut floats = ClassState::new(platform.float_registers.clone());

    collect_intervals(function, &mut ints, &mut floats);

    let word = platform.word_size;
    let base_pointer = platform.base_pointer;
    let mut stack_size = function.stack_size;
    let mut out: Vec<Instruction> = Vec::with_capacity(function.instructions.len());

    for (position, instruction) in function.instructions.iter().enumerate() {
        let mut instruction = instruction.clone();

        // save live caller-saved registers across the call
        if instruction.op == LtacOp::CALL {
            let live_int: Vec<u32> = ints
                .assignment
                .iter()
                .filter(|(id, register)| {
                    ints.intervals[id].end > position && platform.is_caller_saved(**register)
                })
                .map(|(id, _)| *id)
                .collect();
            for id in live_int {
                spill(&mut ints, id, &mut out, &mut stack_size, word, base_pointer);
            }
            // every float register is caller-saved
            let live_float: Vec<u32> = floats
                .assignment
                .iter()
                .filter(|(id, _)| floats.intervals[id].end > position)
                .map(|(id, _)| *id)
                .collect();
            for id in live_float {
                spill(&mut floats, id, &mut out, &mut stack_size, word, base_pointer);
            }
        }

        // hard registers written by this instruction evict their occupants
        if writes_arg1(instruction.op) {
            match &instruction.arg1 {
                Some(LtacArg::Register(register)) => {
                    let register = *register;
                    claim_hard(&mut ints, register, position, &mut out, &mut stack_size, word, base_pointer);
                }
                Some(LtacArg::FloatRegister(register)) => {
                    let register = *register;
                    claim_hard(&mut floats, register, position, &mut out, &mut stack_size, word, base_pointer);
                }
                _ => {}
            }
        }

        let mut reserved_int = reserved_registers(&instruction, &ints);
        let mut reserved_float = reserved_float_registers(&instruction, &floats);

        let dirty_target = match (&instruction.arg1, writes_arg1(instruction.op)) {
            (Some(LtacArg::Pseudo(pseudo)), true) => Some((true, pseudo.id)),
            (Some(LtacArg::FloatPseudo(pseudo)), true) => Some((false, pseudo.id)),
            _ => None,
        };
        let pure_write_arg1 = writes_arg1(instruction.op) && !reads_arg1(instruction.op);

        // reads first: their reloads must land before the instruction,
        // and a binding claim on the destination must not lose them
        let (reads, write_slot): (Vec<&mut Option<LtacArg>>, Option<&mut Option<LtacArg>>) = {
            let arg1_is_plain_write = matches!(
                instruction.arg1,
                Some(LtacArg::Pseudo(_)) | Some(LtacArg::FloatPseudo(_))
            ) && writes_arg1(instruction.op);
            if arg1_is_plain_write {
                (
                    vec![&mut instruction.arg2, &mut instruction.arg3],
                    Some(&mut instruction.arg1),
                )
            } else {
                (
                    vec![
                        &mut instruction.arg1,
                        &mut instruction.arg2,
                        &mut instruction.arg3,
                    ],
                    None,
                )
            }
        };

        for slot in reads {
            let Some(arg) = slot else { continue };
            rewrite_arg(
                arg,
                true,
                position,
                &mut ints,
                &mut floats,
                &mut reserved_int,
                &mut reserved_float,
                &mut out,
                &mut stack_size,
                word,
                base_pointer,
            )?;
        }
        if let Some(slot) = write_slot
            && let Some(arg) = slot
        {
            rewrite_arg(
                arg,
                !pure_write_arg1,
                position,
                &mut ints,
                &mut floats,
                &mut reserved_int,
                &mut reserved_float,
                &mut out,
                &mut stack_size,
                word,
                base_pointer,
            )?;
        }

        if let Some((is_int, id)) = dirty_target {
            if is_int {
                ints.dirty.insert(id, true);
            } else {
                floats.dirty.insert(id, true);
            }
        }

        out.push(instruction);
    }

    function.instructions = out;
    function.stack_size = stack_size;
    patch_enter(function);

    for instruction in &function.instructions {
        if instruction.has_pseudo() {
            return Err(MiddleEndError::PseudoRegisterEscaped {
                function: function.name.clone(),
                register: instruction.to_string(),
            });
        }
    }

    debug!(
        "{}: allocated registers, frame {} bytes",
        function.name, function.stack_size
    );
    Ok(())
}

fn collect_intervals(
    function: &LtacFunction,
    ints: &mut ClassState<Register>,
    floats: &mut ClassState<FloatRegister>,
) {
    let mut labels: HashMap<String, usize> = HashMap::new();
    for (position, instruction) in function.instructions.iter().enumerate() {
        if instruction.op == LtacOp::LABEL
            && let Some(LtacArg::Label(label)) = &instruction.arg1
        {
            labels.insert(label.clone(), position);
        }
        for arg in instruction.args() {
            match arg {
                LtacArg::Pseudo(pseudo) => ints.note(pseudo.id, position, pseudo.bound),
                LtacArg::FloatPseudo(pseudo) => floats.note(pseudo.id, position, pseudo.bound),
                LtacArg::Address(address) => {
                    for id in address.pseudos() {
                        ints.note(id, position, None);
                    }
                }
                _ => {}
            }
        }
    }

    // a value live at a loop entry survives to the backward jump
    let mut changed = true;
    while changed {
        changed = false;
        for (position, instruction) in function.instructions.iter().enumerate() {
            if !instruction.op.is_jump() {
                continue;
            }
            let Some(LtacArg::Label(label)) = &instruction.arg1 else {
                continue;
            };
            let Some(&target) = labels.get(label) else {
                continue;
            };
            if target >= position {
                continue;
            }
            for interval in ints.intervals.values_mut() {
                if interval.start <= target && interval.end >= target && interval.end < position {
                    interval.end = position;
                    changed = true;
                }
            }
            for interval in floats.intervals.values_mut() {
                if interval.start <= target && interval.end >= target && interval.end < position {
                    interval.end = position;
                    changed = true;
                }
            }
        }
    }

    // a bound pseudo stays pinned until the call it feeds
    let calls: Vec<usize> = function
        .instructions
        .iter()
        .enumerate()
        .filter(|(_, i)| i.op == LtacOp::CALL)
        .map(|(p, _)| p)
        .collect();
    for interval in ints.intervals.values_mut() {
        if interval.bound.is_some()
            && let Some(&call) = calls.iter().find(|&&c| c >= interval.end)
        {
            interval.end = call;
        }
    }
    for interval in floats.intervals.values_mut() {
        if interval.bound.is_some()
            && let Some(&call) = calls.iter().find(|&&c| c >= interval.end)
        {
            interval.end = call;
        }
    }
}

/// Rewrites one pseudo argument (or the pseudo parts of an address) to
/// hard registers, reloading spilled reads and reserving the chosen
/// registers against eviction by the rest of the instruction.
#[allow(clippy::too_many_arguments)]
fn rewrite_arg(
    arg: &mut LtacArg,
    is_read: bool,
    position: usize,
    ints: &mut ClassState<Register>,
    floats: &mut ClassState<FloatRegister>,
    reserved_int: &mut Vec<Register>,
    reserved_float: &mut Vec<FloatRegister>,
    out: &mut Vec<Instruction>,
    stack_size: &mut usize,
    word: usize,
    base_pointer: Register,
) -> Result<(), MiddleEndError> {
    match arg {
        LtacArg::Pseudo(pseudo) => {
            let register = ensure(
                ints,
                pseudo.id,
                pseudo.bound,
                position,
                is_read,
                reserved_int,
                out,
                stack_size,
                word,
                base_pointer,
            )?;
            reserved_int.push(register);
            *arg = LtacArg::Register(register);
        }
        LtacArg::FloatPseudo(pseudo) => {
            let register = ensure(
                floats,
                pseudo.id,
                pseudo.bound,
                position,
                is_read,
                reserved_float,
                out,
                stack_size,
                word,
                base_pointer,
            )?;
            reserved_float.push(register);
            *arg = LtacArg::FloatRegister(register);
        }
        LtacArg::Address(address) => {
            for base in [&mut address.base, &mut address.index] {
                if let Some(BaseRegister::Pseudo(id)) = base {
                    let register = ensure(
                        ints,
                        *id,
                        None,
                        position,
                        true,
                        reserved_int,
                        out,
                        stack_size,
                        word,
                        base_pointer,
                    )?;
                    reserved_int.push(register);
                    *base = Some(BaseRegister::Register(register));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Ops whose first argument receives a value.
fn writes_arg1(op: LtacOp) -> bool {
    matches!(
        op,
        LtacOp::MOV
            | LtacOp::FMOV
            | LtacOp::LEA
            | LtacOp::ADD
            | LtacOp::SUB
            | LtacOp::MUL
            | LtacOp::DIV
            | LtacOp::MOD
            | LtacOp::NEG
            | LtacOp::FADD
            | LtacOp::FSUB
            | LtacOp::FMUL
            | LtacOp::FDIV
            | LtacOp::AND
            | LtacOp::OR
            | LtacOp::XOR
            | LtacOp::NOT
            | LtacOp::SHL
            | LtacOp::SAR
            | LtacOp::INC
            | LtacOp::DEC
            | LtacOp::POP
    )
}

/// Ops whose first argument is read before being written.
fn reads_arg1(op: LtacOp) -> bool {
    matches!(
        op,
        LtacOp::ADD
            | LtacOp::SUB
            | LtacOp::MUL
            | LtacOp::DIV
            | LtacOp::MOD
            | LtacOp::NEG
            | LtacOp::FADD
            | LtacOp::FSUB
            | LtacOp::FMUL
            | LtacOp::FDIV
            | LtacOp::AND
            | LtacOp::OR
            | LtacOp::XOR
            | LtacOp::NOT
            | LtacOp::SHL
            | LtacOp::SAR
            | LtacOp::INC
            | LtacOp::DEC
    )
}

fn reserved_registers(instruction: &Instruction, state: &ClassState<Register>) -> Vec<Register> {
    let mut reserved = Vec::new();
    for arg in instruction.args() {
        match arg {
            LtacArg::Register(register) => reserved.push(*register),
            LtacArg::Pseudo(pseudo) => {
                if let Some(&register) = state.assignment.get(&pseudo.id) {
                    reserved.push(register);
                }
            }
            LtacArg::Address(address) => {
                for base in [address.base, address.index].into_iter().flatten() {
                    match base {
                        BaseRegister::Register(register) => reserved.push(register),
                        BaseRegister::Pseudo(id) => {
                            if let Some(&register) = state.assignment.get(&id) {
                                reserved.push(register);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    reserved
}

fn reserved_float_registers(
    instruction: &Instruction,
    state: &ClassState<FloatRegister>,
) -> Vec<FloatRegister> {
    let mut reserved = Vec::new();
    for arg in instruction.args() {
        match arg {
            LtacArg::FloatRegister(register) => reserved.push(*register),
            LtacArg::FloatPseudo(pseudo) => {
                if let Some(&register) = state.assignment.get(&pseudo.id) {
                    reserved.push(register);
                }
            }
            _ => {}
        }
    }
    reserved
}

fn spill<R: RegisterClass>(
    state: &mut ClassState<R>,
    id: u32,
    out: &mut Vec<Instruction>,
    stack_size: &mut usize,
    word: usize,
    base_pointer: Register,
) {
    let register = state.assignment[&id];
    if state.dirty.get(&id).copied().unwrap_or(false) {
        let home = state.home(id, stack_size, word);
        out.push(Instruction::new(
            R::MOV,
            LtacArg::Address(crate::ltac::address::Address::base_offset(
                BaseRegister::Register(base_pointer),
                home,
            )),
            register.operand(),
        ));
    }
    state.unmap(id);
}

fn claim_hard<R: RegisterClass>(
    state: &mut ClassState<R>,
    register: R,
    position: usize,
    out: &mut Vec<Instruction>,
    stack_size: &mut usize,
    word: usize,
    base_pointer: Register,
) {
    let Some(&occupant) = state.occupant.get(&register) else {
        return;
    };
    if state.intervals[&occupant].end > position {
        spill(state, occupant, out, stack_size, word, base_pointer);
    } else {
        state.unmap(occupant);
    }
}

#[allow(clippy::too_many_arguments)]
fn ensure<R: RegisterClass>(
    state: &mut ClassState<R>,
    id: u32,
    bound: Option<R>,
    position: usize,
    is_read: bool,
    reserved: &[R],
    out: &mut Vec<Instruction>,
    stack_size: &mut usize,
    word: usize,
    base_pointer: Register,
) -> Result<R, MiddleEndError> {
    if let Some(&register) = state.assignment.get(&id) {
        return Ok(register);
    }

    let bound = bound.or_else(|| state.intervals.get(&id).and_then(|i| i.bound));
    let register = select(state, bound, position, reserved, out, stack_size, word, base_pointer);

    // reload a spilled value on its next read
    if is_read && let Some(&home) = state.homes.get(&id) {
        out.push(Instruction::new(
            R::MOV,
            register.operand(),
            LtacArg::Address(crate::ltac::address::Address::base_offset(
                BaseRegister::Register(base_pointer),
                home,
            )),
        ));
    }

    state.assignment.insert(id, register);
    state.occupant.insert(register, id);
    state.dirty.insert(id, false);
    Ok(register)
}

#[allow(clippy::too_many_arguments)]
fn select<R: RegisterClass>(
    state: &mut ClassState<R>,
    bound: Option<R>,
    position: usize,
    reserved: &[R],
    out: &mut Vec<Instruction>,
    stack_size: &mut usize,
    word: usize,
    base_pointer: Register,
) -> R {
    // a binding hint wins, evicting whoever holds the register
    if let Some(register) = bound
        && !reserved.contains(&register)
    {
        claim_hard(state, register, position, out, stack_size, word, base_pointer);
        return register;
    }

    // 1. a free register
    for &register in &state.order {
        if !reserved.contains(&register) && !state.occupant.contains_key(&register) {
            return register;
        }
    }
    // 2. an occupant whose range ended: evict without spilling
    for &register in &state.order {
        if reserved.contains(&register) {
            continue;
        }
        let occupant = state.occupant[&register];
        if state.intervals[&occupant].end < position {
            state.unmap(occupant);
            return register;
        }
    }
    // 3. a clean occupant: its home already holds the value
    for &register in &state.order {
        if reserved.contains(&register) {
            continue;
        }
        let occupant = state.occupant[&register];
        if !state.dirty.get(&occupant).copied().unwrap_or(false)
            && state.homes.contains_key(&occupant)
        {
            state.unmap(occupant);
            return register;
        }
    }
    // 4. spill an occupant to its home slot
    let register = *state
        .order
        .iter()
        .find(|register| !reserved.contains(register))
        .expect("register class exhausted by a single instruction");
    let occupant = state.occupant[&register];
    spill(state, occupant, out, stack_size, word, base_pointer);
    register
}
