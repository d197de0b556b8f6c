use crate::mtac::argument::Argument;
use crate::mtac::basic_block::BlockId;
use crate::mtac::operator::Operator;
use crate::mtac::operator::RelationalOperator;
use crate::variables::VariableId;
use std::fmt;

/// result := arg1 op arg2. For the DOT_ASSIGN and ARRAY_ASSIGN families
/// the result holds the base written through, see [`Operator::writes_result`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quadruple {
    pub result: Option<VariableId>,
    pub op: Operator,
    pub arg1: Option<Argument>,
    pub arg2: Option<Argument>,
}

impl Quadruple {
    pub fn new(
        result: impl Into<Option<VariableId>>,
        op: Operator,
        arg1: impl Into<Option<Argument>>,
        arg2: impl Into<Option<Argument>>,
    ) -> Quadruple {
        Quadruple {
            result: result.into(),
            op,
            arg1: arg1.into(),
            arg2: arg2.into(),
        }
    }

    pub fn assign(result: VariableId, value: Argument) -> Quadruple {
        Quadruple::new(result, Operator::ASSIGN, value, None)
    }

    pub fn fassign(result: VariableId, value: Argument) -> Quadruple {
        Quadruple::new(result, Operator::FASSIGN, value, None)
    }

    pub fn nop() -> Quadruple {
        Quadruple::new(None, Operator::NOP, None, None)
    }

    pub fn is_nop(&self) -> bool {
        self.op == Operator::NOP
    }
}

/// Conditional branch. `op = None` means a unary truthiness test on arg1.
/// The target block reference is resolved during basic-block extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub op: Option<RelationalOperator>,
    pub arg1: Argument,
    pub arg2: Option<Argument>,
    pub label: String,
    pub target: Option<BlockId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Goto {
    pub label: String,
    pub target: Option<BlockId>,
}

impl Goto {
    pub fn new(label: impl Into<String>) -> Goto {
        Goto {
            label: label.into(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: String,
    /// Bytes of stack-passed arguments, freed by the caller.
    pub arg_bytes: i64,
    pub return1: Option<VariableId>,
    pub return2: Option<VariableId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Argument,
    /// The parameter is the address of the value, not the value itself.
    pub address: bool,
}

/// 0 to 2 returned values (two for paired returns such as strings).
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub values: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Quadruple(Quadruple),
    If(Branch),
    IfFalse(Branch),
    Goto(Goto),
    Call(Call),
    Param(Param),
    Return(Return),
    /// Pure label, consumed during basic-block extraction.
    Label(String),
}

impl Statement {
    pub fn nop() -> Statement {
        Statement::Quadruple(Quadruple::nop())
    }

    pub fn is_nop(&self) -> bool {
        matches!(self, Statement::Quadruple(quadruple) if quadruple.is_nop())
    }

    /// Whether this statement ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Statement::If(_) | Statement::IfFalse(_) | Statement::Goto(_) | Statement::Return(_)
        )
    }

    /// Whether control never falls through past this statement.
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(self, Statement::Goto(_) | Statement::Return(_))
    }

    /// Variables defined by this statement.
    pub fn defs(&self) -> Vec<VariableId> {
        match self {
            Statement::Quadruple(quadruple) if quadruple.op.writes_result() => {
                quadruple.result.into_iter().collect()
            }
            Statement::Call(call) => call.return1.into_iter().chain(call.return2).collect(),
            _ => Vec::new(),
        }
    }

    /// Variables read by this statement.
    pub fn uses(&self) -> Vec<VariableId> {
        fn collect(uses: &mut Vec<VariableId>, argument: &Option<Argument>) {
            if let Some(Argument::Variable(id)) = argument {
                uses.push(*id);
            }
        }

        let mut uses = Vec::new();

        match self {
            Statement::Quadruple(quadruple) => {
                collect(&mut uses, &quadruple.arg1);
                collect(&mut uses, &quadruple.arg2);
                if !quadruple.op.writes_result()
                    && let Some(base) = quadruple.result
                {
                    uses.push(base);
                }
            }
            Statement::If(branch) | Statement::IfFalse(branch) => {
                if let Argument::Variable(id) = branch.arg1 {
                    uses.push(id);
                }
                collect(&mut uses, &branch.arg2);
            }
            Statement::Param(param) => {
                if let Argument::Variable(id) = param.value {
                    uses.push(id);
                }
            }
            Statement::Return(ret) => {
                for value in &ret.values {
                    if let Argument::Variable(id) = value {
                        uses.push(*id);
                    }
                }
            }
            Statement::Goto(_) | Statement::Call(_) | Statement::Label(_) => {}
        }

        uses
    }

    /// Applies `substitute` to every argument read by this statement.
    /// Written results are left alone.
    pub fn map_arguments(&mut self, mut substitute: impl FnMut(&Argument) -> Option<Argument>) -> bool {
        fn apply(
            argument: &mut Option<Argument>,
            substitute: &mut impl FnMut(&Argument) -> Option<Argument>,
            changed: &mut bool,
        ) {
            if let Some(arg) = argument
                && let Some(replacement) = substitute(arg)
            {
                *argument = Some(replacement);
                *changed = true;
            }
        }

        let mut changed = false;
        match self {
            Statement::Quadruple(quadruple) => {
                apply(&mut quadruple.arg1, &mut substitute, &mut changed);
                apply(&mut quadruple.arg2, &mut substitute, &mut changed);
            }
            Statement::If(branch) | Statement::IfFalse(branch) => {
                if let Some(replacement) = substitute(&branch.arg1) {
                    branch.arg1 = replacement;
                    changed = true;
                }
                apply(&mut branch.arg2, &mut substitute, &mut changed);
            }
            Statement::Param(param) => {
                // an address-taken parameter names the variable, it does not read it
                if !param.address
                    && let Some(replacement) = substitute(&param.value)
                {
                    param.value = replacement;
                    changed = true;
                }
            }
            Statement::Return(ret) => {
                for value in &mut ret.values {
                    if let Some(replacement) = substitute(value) {
                        *value = replacement;
                        changed = true;
                    }
                }
            }
            Statement::Goto(_) | Statement::Call(_) | Statement::Label(_) => {}
        }

        changed
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(argument: &Option<Argument>) -> String {
            argument
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default()
        }

        match self {
            Statement::Quadruple(q) => match q.op {
                Operator::NOP => write!(f, "nop"),
                Operator::ASSIGN | Operator::FASSIGN => {
                    write!(f, "{} := {}", q.result.unwrap(), opt(&q.arg1))
                }
                op if op.is_indirect_store() => write!(
                    f,
                    "({})[{}] := {}",
                    q.result.unwrap(),
                    opt(&q.arg1),
                    opt(&q.arg2)
                ),
                op => match (&q.result, &q.arg2) {
                    (Some(result), Some(_)) => {
                        write!(f, "{} := {} {} {}", result, opt(&q.arg1), op, opt(&q.arg2))
                    }
                    (Some(result), None) => write!(f, "{} := {} {}", result, op, opt(&q.arg1)),
                    _ => write!(f, "{} {} {}", opt(&q.arg1), op, opt(&q.arg2)),
                },
            },
            Statement::If(branch) => match (&branch.op, &branch.arg2) {
                (Some(op), Some(arg2)) => {
                    write!(f, "if {} {} {} goto {}", branch.arg1, op, arg2, branch.label)
                }
                _ => write!(f, "if {} goto {}", branch.arg1, branch.label),
            },
            Statement::IfFalse(branch) => match (&branch.op, &branch.arg2) {
                (Some(op), Some(arg2)) => write!(
                    f,
                    "if_false {} {} {} goto {}",
                    branch.arg1, op, arg2, branch.label
                ),
                _ => write!(f, "if_false {} goto {}", branch.arg1, branch.label),
            },
            Statement::Goto(goto) => write!(f, "goto {}", goto.label),
            Statement::Call(call) => {
                let returns = match (call.return1, call.return2) {
                    (Some(r1), Some(r2)) => format!("{r1}, {r2} := "),
                    (Some(r1), None) => format!("{r1} := "),
                    _ => String::new(),
                };
                write!(f, "{}call {} [{}]", returns, call.function, call.arg_bytes)
            }
            Statement::Param(param) => {
                if param.address {
                    write!(f, "param &{}", param.value)
                } else {
                    write!(f, "param {}", param.value)
                }
            }
            Statement::Return(ret) => {
                write!(f, "return")?;
                for (index, value) in ret.values.iter().enumerate() {
                    if index == 0 {
                        write!(f, " {value}")?;
                    } else {
                        write!(f, ", {value}")?;
                    }
                }
                Ok(())
            }
            Statement::Label(label) => write!(f, "{label}:"),
        }
    }
}
