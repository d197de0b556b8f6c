use crate::analysis::usage;
use crate::mtac::Statement;
use crate::mtac::cfg;
use crate::mtac::function::Function;
use log::trace;

/// Merges fallthrough chains: a block whose unique successor has no
/// other predecessor absorbs it. A goto straight to the absorbed block
/// is dropped on the way.
pub fn merge_basic_blocks(function: &mut Function) -> bool {
    let mut changed = false;

    loop {
        let mut merged = false;
        for id in function.real_block_ids() {
            let Some(next) = function.next_in_layout(id) else {
                continue;
            };
            if function.block(next).is_sentinel() {
                continue;
            }
            if function.block(next).predecessors != vec![id] {
                continue;
            }

            // only a fallthrough or a direct goto can be merged over
            let reaches_next = match function.block(id).terminator() {
                None => true,
                Some(Statement::Goto(goto)) => goto.target == Some(next),
                _ => false,
            };
            if !reaches_next {
                continue;
            }

            if matches!(function.block(id).terminator(), Some(Statement::Goto(_))) {
                function.block_mut(id).statements.pop();
            }
            let absorbed = std::mem::take(&mut function.block_mut(next).statements);
            function.block_mut(id).statements.extend(absorbed);
            function.remove_from_layout(next);
            cfg::compute(function);

            trace!("{}: merged block {}", function.name, next);
            merged = true;
            changed = true;
            break;
        }
        if !merged {
            break;
        }
    }

    changed
}

/// Drops every block unreachable from ENTRY.
pub fn remove_dead_basic_blocks(function: &mut Function) -> bool {
    let reached = cfg::reachable(function);
    let dead: Vec<_> = function
        .real_block_ids()
        .into_iter()
        .filter(|id| !reached.contains(id))
        .collect();
    if dead.is_empty() {
        return false;
    }
    for id in dead {
        trace!("{}: removing dead block {}", function.name, id);
        function.remove_from_layout(id);
    }
    true
}

/// Drops context variables nothing references anymore. Parameters
/// stay, they are part of the calling convention.
pub fn clean_variables(function: &mut Function) -> bool {
    let counts = usage::compute(function);
    let parameters: Vec<_> = function.parameters.iter().map(|p| p.variable).collect();

    let unused: Vec<_> = function
        .context
        .iter()
        .filter(|(id, _)| counts.is_unused(*id) && !parameters.contains(id))
        .map(|(id, _)| id)
        .collect();
    if unused.is_empty() {
        return false;
    }
    for id in unused {
        function.context.remove_variable(id);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Argument;
    use crate::mtac::Goto;
    use crate::mtac::Quadruple;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn fallthrough_chain_collapses_into_one_block() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(1))));
        function.add_statement(Statement::Goto(Goto::new(".next")));
        function.add_statement(Statement::Label(".next".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(2))));
        function.add_statement(Statement::Label(".last".to_string()));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(a)],
        }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);

        assert!(merge_basic_blocks(&mut function));
        assert_eq!(function.real_block_ids().len(), 1);

        let block = function.real_block_ids()[0];
        // the goto disappeared with the merge
        assert!(
            function
                .block(block)
                .statements
                .iter()
                .all(|s| !matches!(s, Statement::Goto(_)))
        );
        assert_eq!(function.block(block).statements.len(), 3);
    }

    #[test]
    fn unreachable_block_is_removed() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Goto(Goto::new(".end")));
        function.add_statement(Statement::Label(".orphan".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(9))));
        function.add_statement(Statement::Label(".end".to_string()));
        function.add_statement(Statement::Return(Return { values: vec![] }));

        extract_basic_blocks(&mut function).unwrap();
        cfg::compute(&mut function);

        assert!(remove_dead_basic_blocks(&mut function));
        assert!(function.block_by_label(".orphan").is_none());
        assert!(function.block_by_label(".end").is_some());
    }

    #[test]
    fn unused_variables_leave_the_context() {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let unused = context.new_temporary(Type::Int);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(a)],
        }));
        extract_basic_blocks(&mut function).unwrap();

        assert!(clean_variables(&mut function));
        let remaining: Vec<_> = function.context.iter().map(|(id, _)| id).collect();
        assert!(remaining.contains(&a));
        assert!(!remaining.contains(&unused));
    }
}
