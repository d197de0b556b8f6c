use crate::mtac::Program;
use crate::mtac::Statement;
use indexmap::IndexMap;
use indexmap::IndexSet;
use log::debug;

/// Inter-procedural cleanup: functions unreachable from `main` in the
/// call graph disappear, and calls to functions whose bodies are empty
/// are dropped at the call sites before the callee goes too.
pub fn remove_unused_functions(program: &mut Program) -> bool {
    let mut changed = false;
    changed |= remove_empty_function_calls(program);
    changed |= remove_unreachable_functions(program);
    changed
}

fn call_graph(program: &Program) -> IndexMap<String, IndexSet<String>> {
    let mut graph: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for function in &program.functions {
        let callees = graph.entry(function.name.clone()).or_default();
        for statement in function.all_statements() {
            if let Statement::Call(call) = statement {
                callees.insert(call.function.clone());
            }
        }
    }
    graph
}

fn remove_unreachable_functions(program: &mut Program) -> bool {
    if !program.functions.iter().any(|f| f.name == "main") {
        return false;
    }

    let graph = call_graph(program);
    let mut reachable = IndexSet::new();
    let mut worklist = vec!["main".to_string()];
    while let Some(name) = worklist.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        if let Some(callees) = graph.get(&name) {
            for callee in callees {
                if !reachable.contains(callee) {
                    worklist.push(callee.clone());
                }
            }
        }
    }

    let before = program.functions.len();
    let removed: Vec<String> = program
        .functions
        .iter()
        .filter(|f| !reachable.contains(&f.name))
        .map(|f| f.name.clone())
        .collect();
    program.functions.retain(|f| reachable.contains(&f.name));
    for name in &removed {
        debug!("removing unused function {name}");
        program.global.remove_function(name);
    }
    program.functions.len() != before
}

/// A function whose body holds no real statement cannot observe or
/// produce anything; calls to it without used returns are dropped.
fn remove_empty_function_calls(program: &mut Program) -> bool {
    fn is_empty(function: &crate::mtac::function::Function) -> bool {
        function.all_statements().all(|statement| {
            statement.is_nop()
                || matches!(statement, Statement::Return(ret) if ret.values.is_empty())
        })
    }

    let empty: IndexSet<String> = program
        .functions
        .iter()
        .filter(|f| is_empty(f) && f.name != "main")
        .map(|f| f.name.clone())
        .collect();
    if empty.is_empty() {
        return false;
    }

    let mut changed = false;
    for function in &mut program.functions {
        for id in function.block_ids() {
            let statements = &mut function.block_mut(id).statements;
            let before = statements.len();
            // drop the call and the parameters feeding it
            let mut kept = Vec::with_capacity(before);
            let mut pending_params: Vec<Statement> = Vec::new();
            for statement in statements.drain(..) {
                match &statement {
                    Statement::Param(_) => pending_params.push(statement),
                    Statement::Call(call)
                        if empty.contains(&call.function)
                            && call.return1.is_none()
                            && call.return2.is_none() =>
                    {
                        pending_params.clear();
                        changed = true;
                    }
                    _ => {
                        kept.append(&mut pending_params);
                        kept.push(statement);
                    }
                }
            }
            kept.append(&mut pending_params);
            *statements = kept;
        }
    }
    changed
}
