use crate::ltac::register::FloatRegister;
use crate::ltac::register::Register;
use crate::types::Type;
use std::collections::HashMap;
use std::fmt;

/// Storage position of a variable. Assigned by the front-end context,
/// mutated only by register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Offset from the base pointer, negative for locals.
    Stack(i64),
    /// Offset from the base pointer into the caller frame.
    Parameter(i64),
    /// Passed in the n-th integer parameter register.
    ParamRegister(Register),
    /// Lives in a hard register, assigned by allocation.
    Register(Register),
    FloatRegister(FloatRegister),
    /// Addressed through a global label.
    Global,
    /// No fixed home, becomes a pseudo-register.
    Temporary,
}

impl Position {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Position::Temporary)
    }

    /// Whether the variable has an observable memory home. Writes to
    /// such variables may be visible through aliasing.
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Position::Stack(_) | Position::Parameter(_) | Position::Global
        )
    }
}

/// Stable handle of a variable inside its owning function context.
/// Quadruples store ids, never variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub var_type: Type,
    pub position: Position,
    /// Set by escape analysis: a pointer to this variable may be
    /// dereferenced outside analyzable control flow.
    pub escaped: bool,
}

impl Variable {
    pub fn is_temporary(&self) -> bool {
        self.position.is_temporary()
    }
}

/// Per-function variable store. Owns the variables, hands out stable
/// ids, and tracks the stack frame size for lowering.
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    variables: Vec<Option<Variable>>,
    by_name: HashMap<String, VariableId>,
    temporary_counter: u32,
    stack_size: usize,
}

impl FunctionContext {
    pub fn new() -> FunctionContext {
        FunctionContext::default()
    }

    fn insert(&mut self, variable: Variable) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        self.by_name.insert(variable.name.clone(), id);
        self.variables.push(Some(variable));
        id
    }

    /// Declare a stack-homed local. `size` is the byte size of the
    /// variable on the target platform.
    pub fn add_local(&mut self, name: impl Into<String>, var_type: Type, size: usize) -> VariableId {
        self.stack_size += size;
        let offset = -(self.stack_size as i64);
        self.insert(Variable {
            name: name.into(),
            var_type,
            position: Position::Stack(offset),
            escaped: false,
        })
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        var_type: Type,
        offset: i64,
    ) -> VariableId {
        self.insert(Variable {
            name: name.into(),
            var_type,
            position: Position::Parameter(offset),
            escaped: false,
        })
    }

    pub fn add_register_parameter(
        &mut self,
        name: impl Into<String>,
        var_type: Type,
        register: Register,
    ) -> VariableId {
        self.insert(Variable {
            name: name.into(),
            var_type,
            position: Position::ParamRegister(register),
            escaped: false,
        })
    }

    pub fn add_global_reference(&mut self, name: impl Into<String>, var_type: Type) -> VariableId {
        self.insert(Variable {
            name: name.into(),
            var_type,
            position: Position::Global,
            escaped: false,
        })
    }

    pub fn new_temporary(&mut self, var_type: Type) -> VariableId {
        self.temporary_counter += 1;
        let name = format!("t{}", self.temporary_counter);
        self.insert(Variable {
            name,
            var_type,
            position: Position::Temporary,
            escaped: false,
        })
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        self.variables[id.0 as usize]
            .as_ref()
            .expect("use of removed variable")
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        self.variables[id.0 as usize]
            .as_mut()
            .expect("use of removed variable")
    }

    pub fn by_name(&self, name: &str) -> Option<VariableId> {
        self.by_name.get(name).copied()
    }

    pub fn remove_variable(&mut self, id: VariableId) {
        if let Some(variable) = self.variables[id.0 as usize].take() {
            self.by_name.remove(&variable.name);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|variable| (VariableId(index as u32), variable))
            })
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Reserve extra frame bytes, e.g. for spill slots. Returns the new
    /// slot's base-pointer offset.
    pub fn reserve_stack(&mut self, size: usize) -> i64 {
        self.stack_size += size;
        -(self.stack_size as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_get_decreasing_stack_offsets() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let b = context.add_local("b", Type::Int, 8);

        assert_eq!(context.variable(a).position, Position::Stack(-8));
        assert_eq!(context.variable(b).position, Position::Stack(-16));
        assert_eq!(context.stack_size(), 16);
    }

    #[test]
    fn temporaries_have_no_fixed_home() {
        let mut context = FunctionContext::new();
        let t = context.new_temporary(Type::Int);
        assert!(context.variable(t).is_temporary());
    }

    #[test]
    fn removed_variables_disappear_from_iteration() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        context.remove_variable(t);

        let remaining: Vec<_> = context.iter().map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![a]);
        assert_eq!(context.by_name("a"), Some(a));
    }
}
