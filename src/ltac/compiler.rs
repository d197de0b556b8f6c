use crate::error::MiddleEndError;
use crate::global::GlobalContext;
use crate::global::config::CompilerConfig;
use crate::global::platform::Platform;
use crate::ltac::address::Address;
use crate::ltac::address::BaseRegister;
use crate::ltac::instruction::Instruction;
use crate::ltac::instruction::LtacArg;
use crate::ltac::instruction::LtacFunction;
use crate::ltac::instruction::LtacOp;
use crate::ltac::register::PseudoFloatRegister;
use crate::ltac::register::PseudoRegister;
use crate::ltac::register::Register;
use crate::mtac;
use crate::mtac::Argument;
use crate::mtac::Operator;
use crate::mtac::RelationalOperator;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::types::Type;
use crate::variables::Position;
use crate::variables::VariableId;
use log::debug;
use std::collections::HashMap;

/// Lowers optimized MTAC into pseudo-register LTAC: materializes the
/// calling convention, the stack frame, member and array address
/// arithmetic and the two-address instruction discipline.
pub struct LtacCompiler<'a> {
    pub platform: &'a Platform,
    pub config: &'a CompilerConfig,
    pub global: &'a GlobalContext,
}

impl<'a> LtacCompiler<'a> {
    pub fn new(
        platform: &'a Platform,
        config: &'a CompilerConfig,
        global: &'a GlobalContext,
    ) -> LtacCompiler<'a> {
        LtacCompiler {
            platform,
            config,
            global,
        }
    }

    pub fn compile(&self, program: &mtac::Program) -> Result<Vec<LtacFunction>, MiddleEndError> {
        program
            .functions
            .iter()
            .map(|function| self.compile_function(function))
            .collect()
    }

    pub fn compile_function(&self, function: &Function) -> Result<LtacFunction, MiddleEndError> {
        let mut lowering = FunctionLowering {
            compiler: self,
            function,
            out: LtacFunction::new(function.name.clone()),
            int_pseudos: HashMap::new(),
            float_pseudos: HashMap::new(),
            next_pseudo: 0,
            next_float_pseudo: 0,
            next_label: 0,
            pending_params: Vec::new(),
        };
        lowering.lower()?;
        debug!(
            "lowered {} to {} LTAC instructions",
            function.name,
            lowering.out.instructions.len()
        );
        Ok(lowering.out)
    }
}

struct FunctionLowering<'a> {
    compiler: &'a LtacCompiler<'a>,
    function: &'a Function,
    out: LtacFunction,
    int_pseudos: HashMap<VariableId, u32>,
    float_pseudos: HashMap<VariableId, u32>,
    next_pseudo: u32,
    next_float_pseudo: u32,
    next_label: u32,
    pending_params: Vec<mtac::Param>,
}

impl<'a> FunctionLowering<'a> {
    fn platform(&self) -> &Platform {
        self.compiler.platform
    }

    fn word(&self) -> i32 {
        self.platform().word_size as i32
    }

    fn unsupported(&self, message: impl Into<String>) -> MiddleEndError {
        MiddleEndError::UnsupportedConstruct {
            function: self.function.name.clone(),
            message: message.into(),
        }
    }

    fn lower(&mut self) -> Result<(), MiddleEndError> {
        self.emit(Instruction::new(
            LtacOp::LABEL,
            LtacArg::Label(self.function.name.clone()),
            None,
        ));
        self.emit(Instruction::new(LtacOp::ENTER, LtacArg::Imm(0), None));
        self.initialize_arrays();

        for id in self.function.block_ids() {
            let block = self.function.block(id);
            if block.is_sentinel() {
                continue;
            }
            self.emit(Instruction::new(
                LtacOp::LABEL,
                LtacArg::Label(block.label.clone()),
                None,
            ));
            for statement in &block.statements {
                self.lower_statement(statement)?;
            }
        }

        // a function falling off its end still restores the frame
        if !matches!(
            self.out.instructions.last(),
            Some(Instruction { op: LtacOp::RET, .. })
        ) {
            self.emit(Instruction::nullary(LtacOp::LEAVE));
            self.emit(Instruction::nullary(LtacOp::RET));
        }

        self.out.stack_size = self.function.context.stack_size();
        patch_enter(&mut self.out);
        Ok(())
    }

    /// Stack arrays carry their length in the header slot and start
    /// zeroed, filled backward from the last element.
    fn initialize_arrays(&mut self) {
        let word = self.word();
        let base_pointer = self.platform().base_pointer;
        let mut stores = Vec::new();

        for (_, variable) in self.function.context.iter() {
            let Type::Array(element, Some(length)) = &variable.var_type else {
                continue;
            };
            let Position::Stack(offset) = variable.position else {
                continue;
            };
            let element_size =
                element.size(self.platform(), self.compiler.global) as i32;

            stores.push(Instruction::new(
                LtacOp::MOV,
                LtacArg::Address(Address::base_offset(
                    BaseRegister::Register(base_pointer),
                    offset as i32,
                )),
                LtacArg::Imm(*length as i64),
            ));
            for index in (0..*length as i32).rev() {
                stores.push(Instruction::new(
                    LtacOp::MOV,
                    LtacArg::Address(Address::base_offset(
                        BaseRegister::Register(base_pointer),
                        offset as i32 + word + index * element_size,
                    )),
                    LtacArg::Imm(0),
                ));
            }
        }

        for store in stores {
            self.emit(store);
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.out.emit(instruction);
    }

    fn fresh_pseudo(&mut self) -> PseudoRegister {
        let id = self.next_pseudo;
        self.next_pseudo += 1;
        PseudoRegister::new(id)
    }

    fn fresh_bound(&mut self, register: Register) -> PseudoRegister {
        let id = self.next_pseudo;
        self.next_pseudo += 1;
        PseudoRegister::bound(id, register)
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!(".L{}_{}{}", self.function.name, prefix, self.next_label);
        self.next_label += 1;
        label
    }

    fn pseudo_of(&mut self, variable: VariableId) -> PseudoRegister {
        if let Some(&id) = self.int_pseudos.get(&variable) {
            return PseudoRegister::new(id);
        }
        let pseudo = self.fresh_pseudo();
        self.int_pseudos.insert(variable, pseudo.id);
        pseudo
    }

    fn float_pseudo_of(&mut self, variable: VariableId) -> PseudoFloatRegister {
        if let Some(&id) = self.float_pseudos.get(&variable) {
            return PseudoFloatRegister::new(id);
        }
        let id = self.next_float_pseudo;
        self.next_float_pseudo += 1;
        self.float_pseudos.insert(variable, id);
        PseudoFloatRegister::new(id)
    }

    /// Address of a memory-homed variable, displaced by `extra`.
    fn variable_address(&self, variable: VariableId, extra: i32) -> Option<Address> {
        let stored = self.function.context.variable(variable);
        match stored.position {
            Position::Stack(offset) | Position::Parameter(offset) => Some(Address::base_offset(
                BaseRegister::Register(self.platform().base_pointer),
                offset as i32 + extra,
            )),
            Position::Global => {
                let mut address =
                    Address::absolute(format!("{}{}", crate::abi::GLOBAL_PREFIX, stored.name));
                address.displacement = extra;
                Some(address)
            }
            _ => None,
        }
    }

    /// The operand form of a variable: its home address, or its pseudo
    /// register when it has no memory home.
    fn variable_arg(&mut self, variable: VariableId) -> LtacArg {
        if let Some(address) = self.variable_address(variable, 0) {
            return LtacArg::Address(address);
        }
        let stored = self.function.context.variable(variable);
        match stored.position {
            Position::ParamRegister(register) => {
                LtacArg::Pseudo(self.pseudo_of(variable).bound_to(register))
            }
            _ if stored.var_type.is_single_float_register() => {
                LtacArg::FloatPseudo(self.float_pseudo_of(variable))
            }
            _ => LtacArg::Pseudo(self.pseudo_of(variable)),
        }
    }

    fn resolve(&mut self, argument: &Argument) -> LtacArg {
        match argument {
            Argument::Variable(variable) => self.variable_arg(*variable),
            Argument::Int(value) => LtacArg::Imm(*value),
            Argument::Float(value) => LtacArg::FloatImm(*value),
            Argument::Label(label) => LtacArg::Label(label.clone()),
            Argument::Offset(label, offset) => {
                let mut address = Address::absolute(label.clone());
                address.displacement = *offset as i32;
                LtacArg::Address(address)
            }
        }
    }

    /// Forces a value into a (pseudo) register operand, the escape
    /// hatch from memory-to-memory encodings.
    fn into_register(&mut self, value: LtacArg, float: bool) -> LtacArg {
        match value {
            LtacArg::Pseudo(_) | LtacArg::FloatPseudo(_) | LtacArg::Register(_)
            | LtacArg::FloatRegister(_) => value,
            _ if float => {
                let scratch = self.next_float_pseudo;
                self.next_float_pseudo += 1;
                let scratch = LtacArg::FloatPseudo(PseudoFloatRegister::new(scratch));
                self.emit(Instruction::new(LtacOp::FMOV, scratch.clone(), value));
                scratch
            }
            _ => {
                let scratch = LtacArg::Pseudo(self.fresh_pseudo());
                self.emit(Instruction::new(LtacOp::MOV, scratch.clone(), value));
                scratch
            }
        }
    }

    fn mov_op(float: bool) -> LtacOp {
        if float { LtacOp::FMOV } else { LtacOp::MOV }
    }

    /// MOV dest, src avoiding the memory-to-memory form.
    fn store(&mut self, dest: LtacArg, src: LtacArg, float: bool) {
        let mem_dest = matches!(dest, LtacArg::Address(_));
        let mem_src = matches!(src, LtacArg::Address(_) | LtacArg::FloatImm(_));
        let src = if mem_dest && mem_src {
            self.into_register(src, float)
        } else {
            src
        };
        self.emit(Instruction::new(Self::mov_op(float), dest, src));
    }

    fn lower_statement(&mut self, statement: &Statement) -> Result<(), MiddleEndError> {
        match statement {
            Statement::Quadruple(quadruple) => self.lower_quadruple(quadruple),
            Statement::Goto(goto) => {
                self.emit(Instruction::new(
                    LtacOp::JMP,
                    LtacArg::Label(goto.label.clone()),
                    None,
                ));
                Ok(())
            }
            Statement::If(branch) => self.lower_branch(branch, false),
            Statement::IfFalse(branch) => self.lower_branch(branch, true),
            Statement::Param(param) => {
                self.pending_params.push(param.clone());
                Ok(())
            }
            Statement::Call(call) => self.lower_call(call),
            Statement::Return(ret) => self.lower_return(ret),
            Statement::Label(label) => Err(MiddleEndError::invariant(
                &self.function.name,
                format!("{label}:"),
                "labels must be consumed by basic-block extraction",
            )),
        }
    }

    fn lower_quadruple(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let op = quadruple.op;
        match op {
            Operator::NOP => Ok(()),
            Operator::ASSIGN | Operator::FASSIGN => self.lower_assign(quadruple),
            Operator::ADD | Operator::SUB | Operator::MUL | Operator::DIV | Operator::MOD => {
                self.lower_binary(quadruple, Self::int_op(op), false)
            }
            Operator::FADD | Operator::FSUB | Operator::FMUL | Operator::FDIV => {
                self.lower_binary(quadruple, Self::float_op(op), true)
            }
            Operator::SHL => self.lower_binary(quadruple, LtacOp::SHL, false),
            Operator::SHR => self.lower_binary(quadruple, LtacOp::SAR, false),
            Operator::MINUS => self.lower_unary(quadruple, LtacOp::NEG, false),
            Operator::FMINUS => self.lower_float_minus(quadruple),
            Operator::NOT => self.lower_not(quadruple),
            op if op.is_comparison() => self.lower_comparison(quadruple),
            Operator::DOT | Operator::FDOT => self.lower_dot_read(quadruple),
            Operator::PDOT => self.lower_pdot(quadruple),
            Operator::DOT_ASSIGN | Operator::DOT_FASSIGN => self.lower_dot_write(quadruple),
            Operator::ARRAY | Operator::FARRAY => self.lower_array_read(quadruple),
            Operator::ARRAY_ASSIGN | Operator::ARRAY_FASSIGN => self.lower_array_write(quadruple),
            other => Err(self.unsupported(format!("operator {other} has no lowering"))),
        }
    }

    fn int_op(op: Operator) -> LtacOp {
        match op {
            Operator::ADD => LtacOp::ADD,
            Operator::SUB => LtacOp::SUB,
            Operator::MUL => LtacOp::MUL,
            Operator::DIV => LtacOp::DIV,
            Operator::MOD => LtacOp::MOD,
            _ => unreachable!(),
        }
    }

    fn float_op(op: Operator) -> LtacOp {
        match op {
            Operator::FADD => LtacOp::FADD,
            Operator::FSUB => LtacOp::FSUB,
            Operator::FMUL => LtacOp::FMUL,
            Operator::FDIV => LtacOp::FDIV,
            _ => unreachable!(),
        }
    }

    fn result_of(&self, quadruple: &mtac::Quadruple) -> Result<VariableId, MiddleEndError> {
        quadruple.result.ok_or_else(|| {
            MiddleEndError::invariant(
                &self.function.name,
                Statement::Quadruple(quadruple.clone()),
                "quadruple without result",
            )
        })
    }

    fn arg1_of(&self, quadruple: &mtac::Quadruple) -> Result<Argument, MiddleEndError> {
        quadruple.arg1.clone().ok_or_else(|| {
            MiddleEndError::invariant(
                &self.function.name,
                Statement::Quadruple(quadruple.clone()),
                "quadruple without first argument",
            )
        })
    }

    fn arg2_of(&self, quadruple: &mtac::Quadruple) -> Result<Argument, MiddleEndError> {
        quadruple.arg2.clone().ok_or_else(|| {
            MiddleEndError::invariant(
                &self.function.name,
                Statement::Quadruple(quadruple.clone()),
                "quadruple without second argument",
            )
        })
    }

    fn lower_assign(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let value = self.arg1_of(quadruple)?;
        let result_type = self.function.context.variable(result).var_type.clone();

        // strings copy their (pointer, length) pair
        if result_type == Type::String
            && let Argument::Variable(source) = value
            && self.function.context.variable(source).var_type == Type::String
        {
            let word = self.word();
            for part in 0..2 {
                let dest = self
                    .variable_address(result, part * word)
                    .ok_or_else(|| self.unsupported("string temporaries need a memory home"))?;
                let src = self
                    .variable_address(source, part * word)
                    .ok_or_else(|| self.unsupported("string temporaries need a memory home"))?;
                self.store(LtacArg::Address(dest), LtacArg::Address(src), false);
            }
            return Ok(());
        }

        let float = quadruple.op == Operator::FASSIGN;
        let dest = self.variable_arg(result);
        let src = self.resolve(&value);
        self.store(dest, src, float);
        Ok(())
    }

    /// Two-address discipline: the destination register receives the
    /// first operand, the operation folds the second in, a memory
    /// destination gets the result stored back.
    fn lower_binary(
        &mut self,
        quadruple: &mtac::Quadruple,
        op: LtacOp,
        float: bool,
    ) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let lhs = self.arg1_of(quadruple)?;
        let rhs = self.arg2_of(quadruple)?;

        let dest = self.variable_arg(result);
        let lhs = self.resolve(&lhs);
        let rhs = self.resolve(&rhs);

        let accumulator = match &dest {
            LtacArg::Pseudo(_) | LtacArg::FloatPseudo(_) => dest.clone(),
            _ => {
                if float {
                    let id = self.next_float_pseudo;
                    self.next_float_pseudo += 1;
                    LtacArg::FloatPseudo(PseudoFloatRegister::new(id))
                } else {
                    LtacArg::Pseudo(self.fresh_pseudo())
                }
            }
        };

        self.emit(Instruction::new(
            Self::mov_op(float),
            accumulator.clone(),
            lhs,
        ));
        self.emit(Instruction::new(op, accumulator.clone(), rhs));
        if accumulator != dest {
            self.store(dest, accumulator, float);
        }
        Ok(())
    }

    fn lower_unary(
        &mut self,
        quadruple: &mtac::Quadruple,
        op: LtacOp,
        float: bool,
    ) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let value = self.arg1_of(quadruple)?;

        let dest = self.variable_arg(result);
        let value = self.resolve(&value);
        let accumulator = match &dest {
            LtacArg::Pseudo(_) | LtacArg::FloatPseudo(_) => dest.clone(),
            _ => LtacArg::Pseudo(self.fresh_pseudo()),
        };
        self.emit(Instruction::new(
            Self::mov_op(float),
            accumulator.clone(),
            value,
        ));
        self.emit(Instruction::new(op, accumulator.clone(), None));
        if accumulator != dest {
            self.store(dest, accumulator, float);
        }
        Ok(())
    }

    /// No float negate opcode: subtract from a zeroed register.
    fn lower_float_minus(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let value = self.arg1_of(quadruple)?;

        let dest = self.variable_arg(result);
        let value = self.resolve(&value);
        let id = self.next_float_pseudo;
        self.next_float_pseudo += 1;
        let accumulator = LtacArg::FloatPseudo(PseudoFloatRegister::new(id));

        self.emit(Instruction::new(
            LtacOp::FMOV,
            accumulator.clone(),
            LtacArg::FloatImm(0.0.into()),
        ));
        self.emit(Instruction::new(LtacOp::FSUB, accumulator.clone(), value));
        self.store(dest, accumulator, true);
        Ok(())
    }

    fn lower_not(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let value = self.arg1_of(quadruple)?;

        let dest = self.variable_arg(result);
        let value = self.resolve(&value);
        let accumulator = match &dest {
            LtacArg::Pseudo(_) => dest.clone(),
            _ => LtacArg::Pseudo(self.fresh_pseudo()),
        };
        self.emit(Instruction::new(LtacOp::MOV, accumulator.clone(), value));
        self.emit(Instruction::new(
            LtacOp::XOR,
            accumulator.clone(),
            LtacArg::Imm(1),
        ));
        if accumulator != dest {
            self.store(dest, accumulator, false);
        }
        Ok(())
    }

    fn comparison_jump(op: Operator) -> (LtacOp, bool) {
        match op {
            Operator::EQUALS | Operator::FE => (LtacOp::JE, op == Operator::FE),
            Operator::NOT_EQUALS | Operator::FNE => (LtacOp::JNE, op == Operator::FNE),
            Operator::GREATER | Operator::FG => (LtacOp::JG, op == Operator::FG),
            Operator::GREATER_EQUALS | Operator::FGE => (LtacOp::JGE, op == Operator::FGE),
            Operator::LESS | Operator::FL => (LtacOp::JL, op == Operator::FL),
            Operator::LESS_EQUALS | Operator::FLE => (LtacOp::JLE, op == Operator::FLE),
            _ => unreachable!(),
        }
    }

    /// Booleans materialize through a short branch: load 1, jump past
    /// the clear when the comparison holds.
    fn lower_comparison(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let lhs = self.arg1_of(quadruple)?;
        let rhs = self.arg2_of(quadruple)?;
        let (jump, float) = Self::comparison_jump(quadruple.op);

        let dest = self.variable_arg(result);
        let accumulator = match &dest {
            LtacArg::Pseudo(_) => dest.clone(),
            _ => LtacArg::Pseudo(self.fresh_pseudo()),
        };
        let lhs = self.resolve(&lhs);
        let lhs = self.into_register(lhs, float);
        let rhs = self.resolve(&rhs);

        let done = self.fresh_label("cmp");
        self.emit(Instruction::new(
            LtacOp::MOV,
            accumulator.clone(),
            LtacArg::Imm(1),
        ));
        self.emit(Instruction::new(LtacOp::CMP, lhs, rhs));
        self.emit(Instruction::new(jump, LtacArg::Label(done.clone()), None));
        self.emit(Instruction::new(
            LtacOp::MOV,
            accumulator.clone(),
            LtacArg::Imm(0),
        ));
        self.emit(Instruction::new(LtacOp::LABEL, LtacArg::Label(done), None));
        if accumulator != dest {
            self.store(dest, accumulator, false);
        }
        Ok(())
    }

    /// Address of the member or element the quadruple touches.
    fn access_address(
        &mut self,
        base: VariableId,
        offset: i32,
    ) -> Result<Address, MiddleEndError> {
        let base_type = self.function.context.variable(base).var_type.clone();
        if base_type.is_pointer() {
            // dereference: the pointer value becomes the base register
            let pointer = self.variable_arg(base);
            let pointer = self.into_register(pointer, false);
            let LtacArg::Pseudo(pseudo) = pointer else {
                return Err(self.unsupported("pointer base must fit an integer register"));
            };
            Ok(Address::base_offset(BaseRegister::Pseudo(pseudo.id), offset))
        } else {
            self.variable_address(base, offset)
                .ok_or_else(|| self.unsupported("member access on a register-homed variable"))
        }
    }

    fn lower_dot_read(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let Some(Argument::Variable(base)) = quadruple.arg1 else {
            return Err(self.unsupported("member read without variable base"));
        };
        let Some(Argument::Int(offset)) = quadruple.arg2 else {
            return Err(self.unsupported("member read with non-constant offset"));
        };

        let float = quadruple.op == Operator::FDOT;
        let address = self.access_address(base, offset as i32)?;
        let dest = self.variable_arg(result);
        self.store(dest, LtacArg::Address(address), float);
        Ok(())
    }

    fn lower_pdot(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let Some(Argument::Variable(base)) = quadruple.arg1 else {
            return Err(self.unsupported("address-of without variable base"));
        };
        let offset = match quadruple.arg2 {
            Some(Argument::Int(offset)) => offset as i32,
            None => 0,
            _ => return Err(self.unsupported("address-of with non-constant offset")),
        };

        let address = self.access_address(base, offset)?;
        let dest = self.variable_arg(result);
        let accumulator = match &dest {
            LtacArg::Pseudo(_) => dest.clone(),
            _ => LtacArg::Pseudo(self.fresh_pseudo()),
        };
        self.emit(Instruction::new(
            LtacOp::LEA,
            accumulator.clone(),
            LtacArg::Address(address),
        ));
        if accumulator != dest {
            self.store(dest, accumulator, false);
        }
        Ok(())
    }

    fn lower_dot_write(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let base = self.result_of(quadruple)?;
        let Some(Argument::Int(offset)) = quadruple.arg1 else {
            return Err(self.unsupported("member write with non-constant offset"));
        };
        let value = self.arg2_of(quadruple)?;

        let float = quadruple.op == Operator::DOT_FASSIGN;
        let address = self.access_address(base, offset as i32)?;
        let value = self.resolve(&value);
        self.store(LtacArg::Address(address), value, float);
        Ok(())
    }

    /// `[base + index·element_size + header]`, the header slot storing
    /// the length.
    fn element_address(
        &mut self,
        base: VariableId,
        index: &Argument,
    ) -> Result<Address, MiddleEndError> {
        let base_type = self.function.context.variable(base).var_type.clone();
        let element = base_type
            .element_type()
            .cloned()
            .or_else(|| (base_type == Type::String).then_some(Type::Char))
            .ok_or_else(|| self.unsupported("element access on a scalar"))?;
        let element_size = element.size(self.platform(), self.compiler.global);
        let header = self.word();

        match index {
            Argument::Int(index) => self.access_address(
                base,
                header + (*index as i32) * element_size as i32,
            ),
            Argument::Variable(_) => {
                if !matches!(element_size, 1 | 2 | 4 | 8) {
                    return Err(
                        self.unsupported(format!("unencodable element scale {element_size}"))
                    );
                }
                let index = self.resolve(index);
                let index = self.into_register(index, false);
                let LtacArg::Pseudo(index) = index else {
                    return Err(self.unsupported("array index must fit an integer register"));
                };
                let mut address = self.access_address(base, header)?;
                address.index = Some(BaseRegister::Pseudo(index.id));
                address.scale = element_size as u8;
                Ok(address)
            }
            _ => Err(self.unsupported("array index must be an integer")),
        }
    }

    fn lower_array_read(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let result = self.result_of(quadruple)?;
        let Some(Argument::Variable(base)) = quadruple.arg1 else {
            return Err(self.unsupported("element read without variable base"));
        };
        let index = self.arg2_of(quadruple)?;

        let float = quadruple.op == Operator::FARRAY;
        let address = self.element_address(base, &index)?;
        let dest = self.variable_arg(result);
        self.store(dest, LtacArg::Address(address), float);
        Ok(())
    }

    fn lower_array_write(&mut self, quadruple: &mtac::Quadruple) -> Result<(), MiddleEndError> {
        let base = self.result_of(quadruple)?;
        let index = self.arg1_of(quadruple)?;
        let value = self.arg2_of(quadruple)?;

        let float = quadruple.op == Operator::ARRAY_FASSIGN;
        let address = self.element_address(base, &index)?;
        let value = self.resolve(&value);
        self.store(LtacArg::Address(address), value, float);
        Ok(())
    }

    fn lower_branch(
        &mut self,
        branch: &mtac::Branch,
        negate: bool,
    ) -> Result<(), MiddleEndError> {
        let jump = match branch.op {
            None => {
                let value = self.resolve(&branch.arg1);
                let value = self.into_register(value, false);
                self.emit(Instruction::new(LtacOp::CMP, value, LtacArg::Imm(0)));
                if negate { LtacOp::JE } else { LtacOp::JNE }
            }
            Some(op) => {
                let (mut op, mut lhs, mut rhs) =
                    (op, branch.arg1.clone(), branch.arg2.clone().ok_or_else(|| {
                        MiddleEndError::invariant(
                            &self.function.name,
                            Statement::If(branch.clone()),
                            "binary branch without second operand",
                        )
                    })?);
                // CMP cannot take an immediate on the left
                if matches!(lhs, Argument::Int(_) | Argument::Float(_)) {
                    std::mem::swap(&mut lhs, &mut rhs);
                    op = op.swapped();
                }
                let float = matches!(lhs, Argument::Float(_)) || matches!(rhs, Argument::Float(_));
                let lhs = self.resolve(&lhs);
                let lhs = self.into_register(lhs, float);
                let rhs = self.resolve(&rhs);
                self.emit(Instruction::new(LtacOp::CMP, lhs, rhs));
                Self::relational_jump(op, negate)
            }
        };
        self.emit(Instruction::new(
            jump,
            LtacArg::Label(branch.label.clone()),
            None,
        ));
        Ok(())
    }

    fn relational_jump(op: RelationalOperator, negate: bool) -> LtacOp {
        match (op, negate) {
            (RelationalOperator::EQUALS, false) => LtacOp::JE,
            (RelationalOperator::EQUALS, true) => LtacOp::JNE,
            (RelationalOperator::NOT_EQUALS, false) => LtacOp::JNE,
            (RelationalOperator::NOT_EQUALS, true) => LtacOp::JE,
            (RelationalOperator::LESS, false) => LtacOp::JL,
            (RelationalOperator::LESS, true) => LtacOp::JGE,
            (RelationalOperator::LESS_EQUALS, false) => LtacOp::JLE,
            (RelationalOperator::LESS_EQUALS, true) => LtacOp::JG,
            (RelationalOperator::GREATER, false) => LtacOp::JG,
            (RelationalOperator::GREATER, true) => LtacOp::JLE,
            (RelationalOperator::GREATER_EQUALS, false) => LtacOp::JGE,
            (RelationalOperator::GREATER_EQUALS, true) => LtacOp::JL,
        }
    }

    fn param_is_float(&self, param: &mtac::Param) -> bool {
        if param.address {
            return false;
        }
        match &param.value {
            Argument::Float(_) => true,
            Argument::Variable(variable) => self
                .function
                .context
                .variable(*variable)
                .var_type
                .is_single_float_register(),
            _ => false,
        }
    }

    /// Parameter-passing discipline: the first eligible parameters ride
    /// in the platform's parameter registers through bound pseudos, the
    /// overflow is pushed right to left.
    fn lower_call(&mut self, call: &mtac::Call) -> Result<(), MiddleEndError> {
        let params = std::mem::take(&mut self.pending_params);

        let int_registers: Vec<Register> = if self.compiler.config.fparameter_allocation {
            self.platform().int_param_registers.clone()
        } else {
            Vec::new()
        };
        let float_registers = if self.compiler.config.fparameter_allocation {
            self.platform().float_param_registers.clone()
        } else {
            Vec::new()
        };

        let mut in_registers = Vec::new();
        let mut on_stack = Vec::new();
        let (mut ints, mut floats) = (0usize, 0usize);
        for param in params {
            if self.param_is_float(&param) {
                if floats < float_registers.len() {
                    in_registers.push((param, None, Some(float_registers[floats])));
                    floats += 1;
                } else {
                    on_stack.push(param);
                }
            } else if ints < int_registers.len() {
                in_registers.push((param, Some(int_registers[ints]), None));
                ints += 1;
            } else {
                on_stack.push(param);
            }
        }

        for param in on_stack.into_iter().rev() {
            let value = self.param_value(&param)?;
            self.emit(Instruction::new(LtacOp::PUSH, value, None));
        }
        for (param, int_register, float_register) in in_registers {
            if let Some(register) = int_register {
                let value = self.param_value(&param)?;
                let bound = LtacArg::Pseudo(self.fresh_bound(register));
                self.emit(Instruction::new(LtacOp::MOV, bound, value));
            } else if let Some(register) = float_register {
                let value = self.param_value(&param)?;
                let id = self.next_float_pseudo;
                self.next_float_pseudo += 1;
                let bound = LtacArg::FloatPseudo(PseudoFloatRegister::bound(id, register));
                self.emit(Instruction::new(LtacOp::FMOV, bound, value));
            }
        }

        self.emit(Instruction::new(
            LtacOp::CALL,
            LtacArg::Label(call.function.clone()),
            None,
        ));
        if call.arg_bytes > 0 {
            self.emit(Instruction::new(
                LtacOp::FREE_STACK,
                LtacArg::Imm(call.arg_bytes),
                None,
            ));
        }

        let returns = self.platform().int_return_registers;
        if let Some(result) = call.return1 {
            let float = self
                .function
                .context
                .variable(result)
                .var_type
                .is_single_float_register();
            let dest = self.variable_arg(result);
            if float {
                let source = LtacArg::FloatRegister(self.platform().float_return_register);
                self.store(dest, source, true);
            } else {
                self.store(dest, LtacArg::Register(returns[0]), false);
            }
        }
        if let Some(result) = call.return2 {
            let dest = self.variable_arg(result);
            self.store(dest, LtacArg::Register(returns[1]), false);
        }
        Ok(())
    }

    fn param_value(&mut self, param: &mtac::Param) -> Result<LtacArg, MiddleEndError> {
        if !param.address {
            let value = self.resolve(&param.value);
            return Ok(value);
        }
        let Argument::Variable(variable) = param.value else {
            return Err(self.unsupported("address parameter without variable"));
        };
        let address = self
            .variable_address(variable, 0)
            .ok_or_else(|| self.unsupported("address of a register-homed variable"))?;
        let scratch = LtacArg::Pseudo(self.fresh_pseudo());
        self.emit(Instruction::new(
            LtacOp::LEA,
            scratch.clone(),
            LtacArg::Address(address),
        ));
        Ok(scratch)
    }

    /// Returns materialize in the designated return registers: one
    /// integer, one float, or an integer pair for strings.
    fn lower_return(&mut self, ret: &mtac::Return) -> Result<(), MiddleEndError> {
        let returns = self.platform().int_return_registers;

        if let [Argument::Variable(variable)] = &ret.values[..]
            && self.function.context.variable(*variable).var_type == Type::String
        {
            let variable = *variable;
            let word = self.word();
            for (part, register) in returns.iter().enumerate() {
                let source = self
                    .variable_address(variable, part as i32 * word)
                    .ok_or_else(|| self.unsupported("string temporaries need a memory home"))?;
                self.emit(Instruction::new(
                    LtacOp::MOV,
                    LtacArg::Register(*register),
                    LtacArg::Address(source),
                ));
            }
        } else {
            for (position, value) in ret.values.iter().enumerate() {
                let float = matches!(value, Argument::Float(_))
                    || value.variable().is_some_and(|v| {
                        self.function
                            .context
                            .variable(v)
                            .var_type
                            .is_single_float_register()
                    });
                let resolved = self.resolve(value);
                if float {
                    let register = self.platform().float_return_register;
                    self.emit(Instruction::new(
                        LtacOp::FMOV,
                        LtacArg::FloatRegister(register),
                        resolved,
                    ));
                } else {
                    self.emit(Instruction::new(
                        LtacOp::MOV,
                        LtacArg::Register(returns[position]),
                        resolved,
                    ));
                }
            }
        }

        self.emit(Instruction::nullary(LtacOp::LEAVE));
        self.emit(Instruction::nullary(LtacOp::RET));
        Ok(())
    }
}

/// Rewrites the first ENTER with the function's final frame size.
pub fn patch_enter(function: &mut LtacFunction) {
    let size = function.stack_size as i64;
    for instruction in &mut function.instructions {
        if instruction.op == LtacOp::ENTER {
            instruction.arg1 = Some(LtacArg::Imm(size));
            return;
        }
    }
}
