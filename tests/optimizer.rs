mod common;

use eddic_core::global::config::CompilerConfig;
use eddic_core::global::platform::Target;
use eddic_core::mtac::Argument;
use eddic_core::mtac::Branch;
use eddic_core::mtac::Goto;
use eddic_core::mtac::Operator;
use eddic_core::mtac::Program;
use eddic_core::mtac::Quadruple;
use eddic_core::mtac::RelationalOperator;
use eddic_core::mtac::Return;
use eddic_core::mtac::Statement;
use eddic_core::mtac::extractor::extract_basic_blocks;
use eddic_core::mtac::function::Function;
use eddic_core::optimizer::Optimizer;
use eddic_core::types::Type;
use eddic_core::variables::FunctionContext;
use eddic_core::variables::VariableId;

fn optimize(function: &mut Function) {
    extract_basic_blocks(function).unwrap();
    let config = CompilerConfig::optimized(Target::X86_64);
    let optimizer = Optimizer::new(&config);
    optimizer.optimize_function(function);
}

fn quadruples(function: &Function) -> Vec<Quadruple> {
    function
        .all_statements()
        .filter_map(|statement| match statement {
            Statement::Quadruple(quadruple) => Some(quadruple.clone()),
            _ => None,
        })
        .collect()
}

fn assert_no_constant_pair(function: &Function) {
    for quadruple in quadruples(function) {
        let both_constant = matches!(quadruple.arg1, Some(Argument::Int(_)))
            && matches!(quadruple.arg2, Some(Argument::Int(_)));
        assert!(
            !both_constant || !quadruple.op.is_expression(),
            "unfolded constant pair: {quadruple:?}"
        );
    }
}

/// t1 := 3 + 4; t2 := t1 · 2; return t2 collapses to return 14.
#[test]
fn constant_arithmetic_folds_to_a_single_return() {
    let mut context = FunctionContext::new();
    let t1 = context.new_temporary(Type::Int);
    let t2 = context.new_temporary(Type::Int);
    let mut function = Function::new("main", Type::Int, context);

    function.add_statement(Statement::Quadruple(Quadruple::new(
        t1,
        Operator::ADD,
        Argument::Int(3),
        Argument::Int(4),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        t2,
        Operator::MUL,
        Argument::Variable(t1),
        Argument::Int(2),
    )));
    function.add_statement(Statement::Return(Return {
        values: vec![Argument::Variable(t2)],
    }));

    optimize(&mut function);

    let statements: Vec<_> = function.all_statements().cloned().collect();
    assert_eq!(statements.len(), 1, "got {statements:?}");
    match &statements[0] {
        Statement::Return(ret) => assert_eq!(ret.values, vec![Argument::Int(14)]),
        other => panic!("expected return, got {other}"),
    }
    assert_no_constant_pair(&function);
}

/// for i := 0; i < 10; i++ {} leaves just i := 10.
#[test]
fn empty_counting_loop_collapses_to_the_final_value() {
    let mut context = FunctionContext::new();
    let i = context.add_local("i", Type::Int, 8);
    let mut function = Function::new("main", Type::Int, context);

    function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
    function.add_statement(Statement::Label(".loop".to_string()));
    function.add_statement(Statement::IfFalse(Branch {
        op: Some(RelationalOperator::LESS),
        arg1: Argument::Variable(i),
        arg2: Some(Argument::Int(10)),
        label: ".end".to_string(),
        target: None,
    }));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        i,
        Operator::ADD,
        Argument::Variable(i),
        Argument::Int(1),
    )));
    function.add_statement(Statement::Goto(Goto::new(".loop")));
    function.add_statement(Statement::Label(".end".to_string()));
    function.add_statement(Statement::Return(Return {
        values: vec![Argument::Variable(i)],
    }));

    optimize(&mut function);

    // no branches survive
    assert!(
        function
            .all_statements()
            .all(|s| !matches!(s, Statement::If(_) | Statement::IfFalse(_) | Statement::Goto(_))),
        "branches left: {:?}",
        function.all_statements().collect::<Vec<_>>()
    );

    // the loop became i := 10
    let assigns: Vec<_> = quadruples(&function)
        .into_iter()
        .filter(|q| q.result == Some(i) && q.op == Operator::ASSIGN)
        .collect();
    assert!(
        assigns.iter().any(|q| q.arg1 == Some(Argument::Int(10))),
        "final assignment missing: {assigns:?}"
    );
}

/// for i := 0; i < 3; i++ { a[i] := i·i } unrolls into three literal
/// stores.
#[test]
fn short_array_loop_peels_into_literal_stores() {
    let mut context = FunctionContext::new();
    let a = context.add_local("a", Type::array_of(Type::Int, Some(3)), 8 + 3 * 8);
    let i = context.add_local("i", Type::Int, 8);
    let t = context.new_temporary(Type::Int);
    let mut function = Function::new("main", Type::Void, context);

    function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
    function.add_statement(Statement::Label(".loop".to_string()));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        t,
        Operator::MUL,
        Argument::Variable(i),
        Argument::Variable(i),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        a,
        Operator::ARRAY_ASSIGN,
        Argument::Variable(i),
        Argument::Variable(t),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        i,
        Operator::ADD,
        Argument::Variable(i),
        Argument::Int(1),
    )));
    function.add_statement(Statement::If(Branch {
        op: Some(RelationalOperator::LESS),
        arg1: Argument::Variable(i),
        arg2: Some(Argument::Int(3)),
        label: ".loop".to_string(),
        target: None,
    }));
    function.add_statement(Statement::Return(Return { values: vec![] }));

    optimize(&mut function);

    assert!(
        function
            .all_statements()
            .all(|s| !matches!(s, Statement::If(_) | Statement::IfFalse(_))),
        "branches left"
    );

    let stores: Vec<(Argument, Argument)> = quadruples(&function)
        .into_iter()
        .filter(|q| q.op == Operator::ARRAY_ASSIGN)
        .map(|q| (q.arg1.unwrap(), q.arg2.unwrap()))
        .collect();
    assert_eq!(
        stores,
        vec![
            (Argument::Int(0), Argument::Int(0)),
            (Argument::Int(1), Argument::Int(1)),
            (Argument::Int(2), Argument::Int(4)),
        ]
    );
    assert_no_constant_pair(&function);
}

fn add_parameter(
    context: &mut FunctionContext,
    name: &str,
    offset: i64,
) -> VariableId {
    context.add_parameter(name, Type::Int, offset)
}

/// An invariant multiplication leaves the loop and runs exactly once,
/// in the block feeding the loop header.
#[test]
fn invariant_computation_is_hoisted_once() {
    let mut context = FunctionContext::new();
    let x = add_parameter(&mut context, "x", 16);
    let y = add_parameter(&mut context, "y", 24);
    let sum = context.add_local("sum", Type::Int, 8);
    let i = context.add_local("i", Type::Int, 8);
    let t = context.new_temporary(Type::Int);
    let mut function = Function::new("main", Type::Int, context);

    function.add_statement(Statement::Quadruple(Quadruple::assign(i, Argument::Int(0))));
    function.add_statement(Statement::Label(".loop".to_string()));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        t,
        Operator::MUL,
        Argument::Variable(x),
        Argument::Variable(y),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        sum,
        Operator::ADD,
        Argument::Variable(sum),
        Argument::Variable(t),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        i,
        Operator::ADD,
        Argument::Variable(i),
        Argument::Int(1),
    )));
    function.add_statement(Statement::If(Branch {
        op: Some(RelationalOperator::LESS),
        arg1: Argument::Variable(i),
        arg2: Some(Argument::Int(100)),
        label: ".loop".to_string(),
        target: None,
    }));
    function.add_statement(Statement::Return(Return {
        values: vec![Argument::Variable(sum)],
    }));

    optimize(&mut function);

    let multiplications: Vec<_> = function
        .block_ids()
        .into_iter()
        .flat_map(|id| {
            function
                .block(id)
                .statements
                .iter()
                .filter(|s| matches!(s, Statement::Quadruple(q) if q.op == Operator::MUL))
                .map(move |_| id)
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(multiplications.len(), 1, "multiplication not unique");

    // the multiplication's block is outside the loop: it does not
    // contain the backward branch
    let holder = multiplications[0];
    let loops_back = function.block(holder).statements.iter().any(|s| {
        matches!(s, Statement::If(_) | Statement::IfFalse(_) | Statement::Goto(_))
    });
    assert!(!loops_back, "multiplication still inside the loop");
}

/// Two identical additions share one computation through a temporary.
#[test]
fn common_subexpression_is_computed_once() {
    let mut context = FunctionContext::new();
    let a = add_parameter(&mut context, "a", 16);
    let b = add_parameter(&mut context, "b", 24);
    let x = context.add_local("x", Type::Int, 8);
    let y = context.add_local("y", Type::Int, 8);
    let mut function = Function::new("main", Type::Int, context);

    function.add_statement(Statement::Quadruple(Quadruple::new(
        x,
        Operator::ADD,
        Argument::Variable(a),
        Argument::Variable(b),
    )));
    function.add_statement(Statement::Quadruple(Quadruple::new(
        y,
        Operator::ADD,
        Argument::Variable(a),
        Argument::Variable(b),
    )));
    function.add_statement(Statement::Return(Return {
        values: vec![Argument::Variable(x)],
    }));

    optimize(&mut function);

    let additions = quadruples(&function)
        .into_iter()
        .filter(|q| {
            q.op == Operator::ADD
                && q.arg1 == Some(Argument::Variable(a))
                && q.arg2 == Some(Argument::Variable(b))
        })
        .count();
    assert_eq!(additions, 1, "a + b computed more than once");
}

/// A quiet pipeline run is idempotent: optimizing again changes
/// nothing.
#[test]
fn optimization_reaches_a_fixed_point() {
    use eddic_core::mtac::printer::print_function;

    let mut context = FunctionContext::new();
    let a = add_parameter(&mut context, "a", 16);
    let t = context.new_temporary(Type::Int);
    let mut function = Function::new("main", Type::Int, context);

    function.add_statement(Statement::Quadruple(Quadruple::new(
        t,
        Operator::MUL,
        Argument::Variable(a),
        Argument::Int(6),
    )));
    function.add_statement(Statement::Return(Return {
        values: vec![Argument::Variable(t)],
    }));

    optimize(&mut function);
    let first = print_function(&function);

    let config = CompilerConfig::optimized(Target::X86_64);
    let optimizer = Optimizer::new(&config);
    optimizer.optimize_function(&mut function);
    let second = print_function(&function);

    assert_eq!(first, second);
}

/// Whole-program cleanup drops functions no call chain reaches.
#[test]
fn unused_functions_are_removed_from_the_program() {
    let mut main = Function::new("main", Type::Void, FunctionContext::new());
    main.add_statement(Statement::Return(Return { values: vec![] }));

    let mut orphan = Function::new("orphan", Type::Void, FunctionContext::new());
    orphan.add_statement(Statement::Return(Return { values: vec![] }));

    let mut program = Program {
        functions: vec![main, orphan],
        ..Program::default()
    };
    for function in &mut program.functions {
        extract_basic_blocks(function).unwrap();
    }

    let config = CompilerConfig::optimized(Target::X86_64);
    Optimizer::new(&config).optimize(&mut program);

    assert!(program.function("main").is_some());
    assert!(program.function("orphan").is_none());
}

/// Loop optimizations preserve semantics: every observable integer
/// variable ends with the value the unoptimized loop would have
/// produced.
#[test]
fn loop_optimizations_preserve_observable_state() {
    for (initial, bound, step) in [(0i64, 10i64, 1i64), (0, 9, 2), (5, 17, 3), (0, 3, 1)] {
        let mut context = FunctionContext::new();
        let a = context.add_local("a", Type::array_of(Type::Int, Some(32)), 8 + 32 * 8);
        let i = context.add_local("i", Type::Int, 8);
        let sum = context.add_local("sum", Type::Int, 8);
        let t = context.new_temporary(Type::Int);
        let mut function = Function::new("main", Type::Void, context);

        // for i := initial; i < bound; i += step { t := i·3; sum += t; a[i] := sum }
        function.add_statement(Statement::Quadruple(Quadruple::assign(
            i,
            Argument::Int(initial),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::assign(sum, Argument::Int(0))));
        function.add_statement(Statement::Label(".loop".to_string()));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            t,
            Operator::MUL,
            Argument::Variable(i),
            Argument::Int(3),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            sum,
            Operator::ADD,
            Argument::Variable(sum),
            Argument::Variable(t),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            a,
            Operator::ARRAY_ASSIGN,
            Argument::Variable(i),
            Argument::Variable(sum),
        )));
        function.add_statement(Statement::Quadruple(Quadruple::new(
            i,
            Operator::ADD,
            Argument::Variable(i),
            Argument::Int(step),
        )));
        function.add_statement(Statement::If(Branch {
            op: Some(RelationalOperator::LESS),
            arg1: Argument::Variable(i),
            arg2: Some(Argument::Int(bound)),
            label: ".loop".to_string(),
            target: None,
        }));
        function.add_statement(Statement::Return(Return { values: vec![] }));

        extract_basic_blocks(&mut function).unwrap();
        let reference = function.clone();

        let config = CompilerConfig::optimized(Target::X86_64);
        Optimizer::new(&config).optimize_function(&mut function);

        let expected = common::interpret(&reference);
        let actual = common::interpret(&function);

        assert_eq!(
            expected.ints.get(&i),
            actual.ints.get(&i),
            "final i diverged for ({initial}, {bound}, {step})"
        );
        assert_eq!(
            expected.ints.get(&sum),
            actual.ints.get(&sum),
            "final sum diverged for ({initial}, {bound}, {step})"
        );
        assert_eq!(
            expected.arrays.get(&a),
            actual.arrays.get(&a),
            "array contents diverged for ({initial}, {bound}, {step})"
        );
    }
}
