use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use crate::mtac::statement::Statement;
use indexmap::IndexSet;

/// Recomputes successor/predecessor edges from block terminators.
/// ENTRY points at the first block in the layout, every RETURN points
/// at EXIT, and a block without unconditional terminator falls through
/// to its layout successor.
pub fn compute(function: &mut Function) {
    for id in function.block_ids() {
        let block = function.block_mut(id);
        block.successors.clear();
        block.predecessors.clear();
    }

    for id in function.block_ids() {
        if id == function.exit {
            continue;
        }
        if id == function.entry {
            if let Some(next) = function.next_in_layout(id) {
                add_edge(function, id, next);
            }
            continue;
        }

        match function.block(id).terminator().cloned() {
            Some(Statement::Goto(goto)) => {
                let target = goto.target.expect("unresolved goto target");
                add_edge(function, id, target);
            }
            Some(Statement::If(branch)) | Some(Statement::IfFalse(branch)) => {
                let target = branch.target.expect("unresolved branch target");
                add_edge(function, id, target);
                if let Some(next) = function.next_in_layout(id) {
                    add_edge(function, id, next);
                }
            }
            Some(Statement::Return(_)) => {
                let exit = function.exit;
                add_edge(function, id, exit);
            }
            _ => {
                if let Some(next) = function.next_in_layout(id) {
                    add_edge(function, id, next);
                }
            }
        }
    }
}

pub fn add_edge(function: &mut Function, from: BlockId, to: BlockId) {
    let block = function.block_mut(from);
    if !block.successors.contains(&to) {
        block.successors.push(to);
    }
    let block = function.block_mut(to);
    if !block.predecessors.contains(&from) {
        block.predecessors.push(from);
    }
}

pub fn remove_edge(function: &mut Function, from: BlockId, to: BlockId) {
    function.block_mut(from).successors.retain(|&s| s != to);
    function.block_mut(to).predecessors.retain(|&p| p != from);
}

/// Blocks reachable from ENTRY, in visit order.
pub fn reachable(function: &Function) -> IndexSet<BlockId> {
    let mut reached = IndexSet::new();
    let mut worklist = vec![function.entry];
    while let Some(id) = worklist.pop() {
        if !reached.insert(id) {
            continue;
        }
        for &successor in &function.block(id).successors {
            if !reached.contains(&successor) {
                worklist.push(successor);
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtac::Argument;
    use crate::mtac::Branch;
    use crate::mtac::Goto;
    use crate::mtac::Quadruple;
    use crate::mtac::RelationalOperator;
    use crate::mtac::Return;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    fn branch_function() -> Function {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::Int, 8);
        let mut function = Function::new("f", Type::Int, context);

        function.add_statement(Statement::IfFalse(Branch {
            op: Some(RelationalOperator::LESS),
            arg1: Argument::Variable(a),
            arg2: Some(Argument::Int(10)),
            label: ".else".to_string(),
            target: None,
        }));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(1))));
        function.add_statement(Statement::Goto(Goto::new(".end")));
        function.add_statement(Statement::Label(".else".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::assign(a, Argument::Int(2))));
        function.add_statement(Statement::Label(".end".to_string()));
        function.add_statement(Statement::Return(Return {
            values: vec![Argument::Variable(a)],
        }));

        extract_basic_blocks(&mut function).unwrap();
        compute(&mut function);
        function
    }

    #[test]
    fn diamond_edges() {
        let function = branch_function();
        let blocks = function.real_block_ids();
        let (cond, then_b, else_b, end) = (blocks[0], blocks[1], blocks[2], blocks[3]);

        assert_eq!(function.block(function.entry).successors, vec![cond]);
        // branch target plus fallthrough
        assert_eq!(function.block(cond).successors, vec![else_b, then_b]);
        assert_eq!(function.block(then_b).successors, vec![end]);
        assert_eq!(function.block(else_b).successors, vec![end]);
        assert_eq!(function.block(end).successors, vec![function.exit]);
        assert_eq!(function.block(end).predecessors, vec![then_b, else_b]);
    }

    #[test]
    fn all_blocks_reachable_from_entry() {
        let function = branch_function();
        let reached = reachable(&function);
        for id in function.real_block_ids() {
            assert!(reached.contains(&id));
        }
    }
}
