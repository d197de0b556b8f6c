use crate::mtac::Argument;
use crate::mtac::Goto;
use crate::mtac::Loop;
use crate::mtac::Quadruple;
use crate::mtac::Statement;
use crate::mtac::function::Function;
use crate::mtac::loops;
use crate::variables::VariableId;
use log::trace;

/// Removes countable loops whose body does nothing but count: the loop
/// collapses into the final value assignment `i := initial + trips · c`,
/// or disappears entirely when the trip count is zero. Handles the
/// bottom-test single-block shape and the top-test header/latch shape.
pub fn run(function: &mut Function) -> bool {
    let candidates = function.loops.clone();
    for natural in &candidates {
        if remove(function, natural) {
            return true;
        }
    }
    false
}

fn remove(function: &mut Function, natural: &Loop) -> bool {
    let Some(trips) = natural.estimated_iterations else {
        return false;
    };
    if trips < 0 {
        return false;
    }

    let basics = loops::basic_induction_variables(function, natural);
    let Some((variable, _, _, _)) = loops::exit_condition(function, natural) else {
        return false;
    };
    let Some(&step) = basics.get(&variable) else {
        return false;
    };
    let Some(initial) = loops::initial_value(function, natural, variable) else {
        return false;
    };
    let final_value = initial + trips * step;

    if let Some(block) = natural.single_block() {
        // bottom test: [i := i + c, branch back]
        if !is_counting_body(function, block, variable) {
            return false;
        }
        let statements = &mut function.block_mut(block).statements;
        statements.clear();
        statements.push(final_assignment(variable, final_value));
        trace!("removed empty bottom-test loop, {variable} := {final_value}");
        return true;
    }

    // top test: header [branch out], latch [i := i + c, goto header]
    if natural.blocks.len() != 2 {
        return false;
    }
    let latch = *natural
        .blocks
        .iter()
        .find(|&&id| id != natural.header)
        .expect("two-block loop without latch");

    let header_exit = match &function.block(natural.header).statements[..] {
        [Statement::IfFalse(branch)] => (branch.label.clone(), branch.target),
        _ => return false,
    };
    if !is_counting_body(function, latch, variable) {
        return false;
    }

    let statements = &mut function.block_mut(natural.header).statements;
    statements.clear();
    if trips > 0 {
        statements.push(final_assignment(variable, final_value));
    }
    statements.push(Statement::Goto(Goto {
        label: header_exit.0,
        target: header_exit.1,
    }));
    function.remove_from_layout(latch);
    trace!("removed empty top-test loop, {trips} trips");
    true
}

fn final_assignment(variable: VariableId, value: i64) -> Statement {
    Statement::Quadruple(Quadruple::assign(variable, Argument::Int(value)))
}

/// The block contains only the induction update plus terminators.
fn is_counting_body(function: &Function, block: crate::mtac::BlockId, variable: VariableId) -> bool {
    function
        .block(block)
        .statements
        .iter()
        .all(|statement| match statement {
            Statement::Quadruple(quadruple) => quadruple.result == Some(variable),
            Statement::Goto(_) | Statement::If(_) | Statement::IfFalse(_) => true,
            _ => false,
        })
}
