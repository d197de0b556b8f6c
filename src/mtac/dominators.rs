use crate::mtac::basic_block::BlockId;
use crate::mtac::function::Function;
use std::collections::HashMap;

/// Computes immediate dominators with the iterative fixed-point scheme
/// over reverse post-order. ENTRY dominates every reachable block and
/// has no dominator itself. Requires fresh CFG edges.
pub fn compute(function: &mut Function) {
    let rpo = reverse_post_order(function);
    let position: HashMap<BlockId, usize> =
        rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
    idom.insert(function.entry, function.entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo.iter().skip(1) {
            let mut new_idom: Option<BlockId> = None;
            for &pred in &function.block(block).predecessors {
                if !idom.contains_key(&pred) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &position, pred, current),
                });
            }
            if let Some(new_idom) = new_idom
                && idom.get(&block) != Some(&new_idom)
            {
                idom.insert(block, new_idom);
                changed = true;
            }
        }
    }

    for id in function.block_ids() {
        function.block_mut(id).dominator = if id == function.entry {
            None
        } else {
            idom.get(&id).copied()
        };
    }
}

fn intersect(
    idom: &HashMap<BlockId, BlockId>,
    position: &HashMap<BlockId, usize>,
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while position[&a] > position[&b] {
            a = idom[&a];
        }
        while position[&b] > position[&a] {
            b = idom[&b];
        }
    }
    a
}

fn reverse_post_order(function: &Function) -> Vec<BlockId> {
    let mut visited = vec![false; function.block_count()];
    let mut post_order = Vec::new();

    // iterative DFS, a node is finished once all children are visited
    let mut stack = vec![(function.entry, 0usize)];
    visited[function.entry.0] = true;
    loop {
        let Some(&(block, child)) = stack.last() else {
            break;
        };
        let successors = &function.block(block).successors;
        if child < successors.len() {
            stack.last_mut().unwrap().1 += 1;
            let next = successors[child];
            if !visited[next.0] {
                visited[next.0] = true;
                stack.push((next, 0));
            }
        } else {
            post_order.push(block);
            stack.pop();
        }
    }

    post_order.reverse();
    post_order
}

/// Whether `a` dominates `b` (reflexively). Walks the immediate
/// dominator chain, so dominator information must be fresh.
pub fn dominates(function: &Function, a: BlockId, b: BlockId) -> bool {
    let mut current = b;
    loop {
        if current == a {
            return true;
        }
        match function.block(current).dominator {
            Some(dominator) if dominator != current => current = dominator,
            _ => return false,
        }
    }
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
    use crate::mtac::Statement;
    use crate::mtac::cfg;
    use crate::mtac::extractor::extract_basic_blocks;
    use crate::types::Type;
    use crate::variables::FunctionContext;

    #[test]
    fn diamond_dominators() {
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
        cfg::compute(&mut function);
        compute(&mut function);

        let blocks = function.real_block_ids();
        let (cond, then_b, else_b, end) = (blocks[0], blocks[1], blocks[2], blocks[3]);

        assert_eq!(function.block(cond).dominator, Some(function.entry));
        assert_eq!(function.block(then_b).dominator, Some(cond));
        assert_eq!(function.block(else_b).dominator, Some(cond));
        // the join point is dominated by the condition, not by either arm
        assert_eq!(function.block(end).dominator, Some(cond));

        assert!(dominates(&function, function.entry, end));
        assert!(dominates(&function, cond, end));
        assert!(!dominates(&function, then_b, end));
        assert!(dominates(&function, end, end));
    }
}
