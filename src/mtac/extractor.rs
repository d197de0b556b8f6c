use crate::error::MiddleEndError;
use crate::mtac::function::Function;
use crate::mtac::statement::Statement;
use log::trace;
use std::mem;

/// Splits a function's linear statement stream into basic blocks and
/// resolves every branch label to its target block. Pure labels are
/// consumed. Must run once per function before anything else in the
/// middle-end touches it.
pub fn extract_basic_blocks(function: &mut Function) -> Result<(), MiddleEndError> {
    let statements = mem::take(&mut function.statements);

    let mut current = None;
    for statement in statements {
        match statement {
            Statement::Label(label) => {
                if function.block_by_label(&label).is_some() {
                    return Err(MiddleEndError::invariant(
                        &function.name,
                        format!("{label}:"),
                        "duplicate label",
                    ));
                }
                let block = function.new_block(label);
                function.append_block(block);
                current = Some(block);
            }
            statement => {
                let block = match current {
                    Some(block) => block,
                    None => {
                        let block = function.new_block_auto_label();
                        function.append_block(block);
                        block
                    }
                };
                let ends_block = statement.is_terminator();
                function.block_mut(block).statements.push(statement);
                current = if ends_block { None } else { Some(block) };
            }
        }
    }

    resolve_branch_targets(function)?;

    trace!(
        "extracted {} basic blocks for {}",
        function.layout().len() - 2,
        function.name
    );
    Ok(())
}

/// Re-resolves branch targets from labels, e.g. after structural edits
/// changed which block carries a label.
pub fn resolve_branch_targets(function: &mut Function) -> Result<(), MiddleEndError> {
    let ids = function.block_ids();
    for id in ids {
        for index in 0..function.block(id).statements.len() {
            let label = match &function.block(id).statements[index] {
                Statement::Goto(goto) => Some(goto.label.clone()),
                Statement::If(branch) | Statement::IfFalse(branch) => Some(branch.label.clone()),
                _ => None,
            };
            let Some(label) = label else { continue };

            let target =
                function
                    .block_by_label(&label)
                    .ok_or_else(|| MiddleEndError::DanglingLabel {
                        function: function.name.clone(),
                        label: label.clone(),
                    })?;

            match &mut function.block_mut(id).statements[index] {
                Statement::Goto(goto) => goto.target = Some(target),
                Statement::If(branch) | Statement::IfFalse(branch) => branch.target = Some(target),
                _ => unreachable!(),
            }
        }
    }
    Ok(())
}
