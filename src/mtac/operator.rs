use strum::Display;

/// Quadruple operators of the medium-level three-address code. Integer
/// and float families are kept apart so lowering can pick MOV vs FMOV
/// without consulting types.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Operator {
    ASSIGN,
    FASSIGN,

    ADD,
    FADD,
    SUB,
    FSUB,
    MUL,
    FMUL,
    DIV,
    FDIV,
    MOD,

    MINUS,
    FMINUS,
    NOT,

    SHL,
    SHR,

    EQUALS,
    NOT_EQUALS,
    GREATER,
    GREATER_EQUALS,
    LESS,
    LESS_EQUALS,
    FE,
    FNE,
    FG,
    FGE,
    FL,
    FLE,

    /// result := member of arg1 at offset arg2
    DOT,
    FDOT,
    /// result := address of member of arg1 at offset arg2
    PDOT,
    /// member of result at offset arg1 := arg2
    DOT_ASSIGN,
    DOT_FASSIGN,

    /// result := arg1[arg2]
    ARRAY,
    FARRAY,
    /// result[arg1] := arg2
    ARRAY_ASSIGN,
    ARRAY_FASSIGN,

    NOP,
}

impl Operator {
    pub fn is_float_family(&self) -> bool {
        matches!(
            self,
            Operator::FASSIGN
                | Operator::FADD
                | Operator::FSUB
                | Operator::FMUL
                | Operator::FDIV
                | Operator::FMINUS
                | Operator::FE
                | Operator::FNE
                | Operator::FG
                | Operator::FGE
                | Operator::FL
                | Operator::FLE
                | Operator::FDOT
                | Operator::DOT_FASSIGN
                | Operator::FARRAY
                | Operator::ARRAY_FASSIGN
        )
    }

    /// Pure computations eligible for common-subexpression elimination.
    /// Memory reads are never eligible, the memory model is pessimistic.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Operator::ADD
                | Operator::FADD
                | Operator::SUB
                | Operator::FSUB
                | Operator::MUL
                | Operator::FMUL
                | Operator::DIV
                | Operator::FDIV
                | Operator::MOD
                | Operator::MINUS
                | Operator::FMINUS
                | Operator::SHL
                | Operator::SHR
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            Operator::ADD
                | Operator::FADD
                | Operator::MUL
                | Operator::FMUL
                | Operator::EQUALS
                | Operator::NOT_EQUALS
                | Operator::FE
                | Operator::FNE
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::EQUALS
                | Operator::NOT_EQUALS
                | Operator::GREATER
                | Operator::GREATER_EQUALS
                | Operator::LESS
                | Operator::LESS_EQUALS
                | Operator::FE
                | Operator::FNE
                | Operator::FG
                | Operator::FGE
                | Operator::FL
                | Operator::FLE
        )
    }

    /// Whether the quadruple's result field is a definition. For the
    /// DOT_ASSIGN and ARRAY_ASSIGN families the result holds the base
    /// being stored into, which is a use, not a def.
    pub fn writes_result(&self) -> bool {
        !matches!(
            self,
            Operator::DOT_ASSIGN
                | Operator::DOT_FASSIGN
                | Operator::ARRAY_ASSIGN
                | Operator::ARRAY_FASSIGN
                | Operator::NOP
        )
    }

    /// Indirect stores, always observable: never removed as dead.
    pub fn is_indirect_store(&self) -> bool {
        matches!(
            self,
            Operator::DOT_ASSIGN
                | Operator::DOT_FASSIGN
                | Operator::ARRAY_ASSIGN
                | Operator::ARRAY_FASSIGN
        )
    }

    /// The copy operator matching this operator's family.
    pub fn assign_op(&self) -> Operator {
        if self.is_float_family() {
            Operator::FASSIGN
        } else {
            Operator::ASSIGN
        }
    }
}

/// Relational operators of IF and IF_FALSE branches.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RelationalOperator {
    EQUALS,
    NOT_EQUALS,
    GREATER,
    GREATER_EQUALS,
    LESS,
    LESS_EQUALS,
}

impl RelationalOperator {
    pub fn evaluate_int(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            RelationalOperator::EQUALS => lhs == rhs,
            RelationalOperator::NOT_EQUALS => lhs != rhs,
            RelationalOperator::GREATER => lhs > rhs,
            RelationalOperator::GREATER_EQUALS => lhs >= rhs,
            RelationalOperator::LESS => lhs < rhs,
            RelationalOperator::LESS_EQUALS => lhs <= rhs,
        }
    }

    pub fn evaluate_float(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            RelationalOperator::EQUALS => lhs == rhs,
            RelationalOperator::NOT_EQUALS => lhs != rhs,
            RelationalOperator::GREATER => lhs > rhs,
            RelationalOperator::GREATER_EQUALS => lhs >= rhs,
            RelationalOperator::LESS => lhs < rhs,
            RelationalOperator::LESS_EQUALS => lhs <= rhs,
        }
    }

    /// Mirror of the comparison with swapped operands.
    pub fn swapped(&self) -> RelationalOperator {
        match self {
            RelationalOperator::EQUALS => RelationalOperator::EQUALS,
            RelationalOperator::NOT_EQUALS => RelationalOperator::NOT_EQUALS,
            RelationalOperator::GREATER => RelationalOperator::LESS,
            RelationalOperator::GREATER_EQUALS => RelationalOperator::LESS_EQUALS,
            RelationalOperator::LESS => RelationalOperator::GREATER,
            RelationalOperator::LESS_EQUALS => RelationalOperator::GREATER_EQUALS,
        }
    }
}
