use crate::mtac::Program;
use crate::mtac::function::Function;
use itertools::Itertools;
use std::fmt::Write;

/// Renders a function's blocks and statements, one statement per line,
/// for the `mtac` family of dump flags and for test diagnostics.
pub fn print_function(function: &Function) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "function {}", function.name);
    for id in function.block_ids() {
        let block = function.block(id);
        if block.is_sentinel() {
            let _ = writeln!(out, "  {}:", block.label);
            continue;
        }
        let _ = writeln!(out, "  {} ({}):", block.label, block.index);
        if !block.statements.is_empty() {
            let body = block
                .statements
                .iter()
                .map(|statement| format!("    {statement}"))
                .join("\n");
            let _ = writeln!(out, "{body}");
        }
    }
    out
}

pub fn print_program(program: &Program) -> String {
    program
        .functions
        .iter()
        .map(print_function)
        .join("\n")
}

/// Dumps the whole program to stdout.
pub fn dump(program: &Program, title: &str) {
    println!("=== MTAC {title} ===");
    print!("{}", print_program(program));
}
