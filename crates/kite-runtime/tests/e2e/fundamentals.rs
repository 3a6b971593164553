//! Arithmetic, equality, objects and control flow

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::Program;

#[test]
fn test_function_call_and_arithmetic() {
    expect_output(
        Program::new(vec![
            function("add", &["a", "b"], vec![ret(binary(var("a"), "+", var("b")))]),
            const_(
                "total",
                binary(call(var("add"), vec![num(2.0), num(3.0)]), "*", num(4.0)),
            ),
            log(binary(str_lit("total="), "+", var("total"))),
        ]),
        "total=20\n",
    );
}

#[test]
fn test_loose_and_strict_equality() {
    let line = |label: &str, left: &str, op: &str, right: &str| {
        log(binary(
            str_lit(&format!("{}=", label)),
            "+",
            binary(var(left), op, var(right)),
        ))
    };
    expect_output(
        Program::new(vec![
            let_("one", num(1.0)),
            let_("text", str_lit("1")),
            let_("u", undefined()),
            let_("n", null()),
            let_("f", boolean(false)),
            let_("zero", num(0.0)),
            line("eq1", "one", "==", "text"),
            line("eq2", "one", "===", "text"),
            line("eq3", "u", "==", "n"),
            line("eq4", "u", "===", "n"),
            line("eq5", "f", "==", "zero"),
            line("eq6", "n", "==", "zero"),
        ]),
        "eq1=true\neq2=false\neq3=true\neq4=false\neq5=true\neq6=false\n",
    );
}

#[test]
fn test_missing_property_reads_undefined() {
    expect_output(
        Program::new(vec![
            const_("o", object(vec![("a", num(1.0))])),
            log(binary(str_lit("missing="), "+", member(var("o"), "b"))),
        ]),
        "missing=undefined\n",
    );
}

#[test]
fn test_object_literal_and_property_updates() {
    expect_output(
        Program::new(vec![
            const_("p", object(vec![("x", num(1.0)), ("y", num(2.0))])),
            assign(member(var("p"), "x"), binary(member(var("p"), "x"), "+", num(10.0))),
            expr_stmt(assign_expr(member(var("p"), "y"), "+=", num(5.0))),
            log(template(&["p=", ",", ""], vec![member(var("p"), "x"), member(var("p"), "y")])),
        ]),
        "p=11,7\n",
    );
}

#[test]
fn test_while_loop_with_break_and_continue() {
    expect_output(
        Program::new(vec![
            let_("i", num(0.0)),
            let_("sum", num(0.0)),
            while_(
                boolean(true),
                vec![
                    assign(var("i"), binary(var("i"), "+", num(1.0))),
                    if_(binary(var("i"), ">", num(5.0)), vec![break_()], vec![]),
                    if_(binary(binary(var("i"), "%", num(2.0)), "===", num(0.0)), vec![continue_()], vec![]),
                    assign(var("sum"), binary(var("sum"), "+", var("i"))),
                ],
            ),
            log(binary(str_lit("odd-sum="), "+", var("sum"))),
        ]),
        "odd-sum=9\n",
    );
}

#[test]
fn test_arrays_spread_and_elements() {
    expect_output(
        Program::new(vec![
            const_("xs", array(vec![num(1.0), num(2.0)])),
            const_("ys", array(vec![spread(var("xs")), num(3.0)])),
            assign(element(var("ys"), num(0.0)), num(9.0)),
            log(binary(str_lit("ys="), "+", var("ys"))),
            log(binary(str_lit("len="), "+", member(var("ys"), "length"))),
            log(binary(str_lit("xs0="), "+", element(var("xs"), num(0.0)))),
        ]),
        "ys=9,2,3\nlen=3\nxs0=1\n",
    );
}

#[test]
fn test_optional_member_and_conditional() {
    expect_output(
        Program::new(vec![
            let_("maybe", null()),
            log(binary(str_lit("opt="), "+", opt_member(var("maybe"), "x"))),
            log(cond(var("maybe"), str_lit("set"), str_lit("unset"))),
        ]),
        "opt=undefined\nunset\n",
    );
}

#[test]
fn test_unoptimized_build_matches_optimized() {
    let program = || {
        Program::new(vec![
            const_("x", binary(num(2.0), "*", binary(num(3.0), "+", num(4.0)))),
            if_(boolean(false), vec![log(str_lit("dead"))], vec![]),
            log(binary(str_lit("x="), "+", var("x"))),
        ])
    };
    expect_output(program(), "x=14\n");
    expect_project_output(
        Project::new()
            .config("[compile]\nconstant_folding = false\ndead_code_elimination = false\n")
            .file("main.ts", program()),
        "x=14\n",
    );
}

#[test]
fn test_calling_computed_elements() {
    expect_output(
        Program::new(vec![
            const_(
                "handlers",
                array(vec![
                    arrow(&[], vec![ret(str_lit("first"))]),
                    arrow(&["n"], vec![ret(binary(var("n"), "+", num(1.0)))]),
                ]),
            ),
            let_("i", num(1.0)),
            log(call(element(var("handlers"), num(0.0)), vec![])),
            log(call(element(var("handlers"), var("i")), vec![num(9.0)])),
            const_(
                "table",
                object(vec![("greet", arrow(&["who"], vec![ret(binary(str_lit("hi "), "+", var("who")))]))]),
            ),
            log(call(element(var("table"), str_lit("greet")), vec![str_lit("bob")])),
        ]),
        "first\n10\nhi bob\n",
    );
}

#[test]
fn test_calling_missing_element_throws_type_error() {
    expect_output(
        Program::new(vec![
            const_("fs", array(vec![])),
            try_catch(
                vec![expr_stmt(call(element(var("fs"), num(3.0)), vec![]))],
                "e",
                vec![log(member(var("e"), "name"))],
            ),
        ]),
        "TypeError\n",
    );
}

#[test]
fn test_large_index_writes_do_not_allocate() {
    expect_output(
        Program::new(vec![
            const_("a", array(vec![])),
            assign(element(var("a"), num(4_000_000_000.0)), num(1.0)),
            log(binary(str_lit("len="), "+", member(var("a"), "length"))),
            log(binary(str_lit("big="), "+", element(var("a"), num(4_000_000_000.0)))),
            assign(element(var("a"), num(3.0)), str_lit("x")),
            log(binary(str_lit("len="), "+", member(var("a"), "length"))),
            log(binary(str_lit("hole="), "+", element(var("a"), num(1.0)))),
            try_catch(
                vec![assign(member(var("a"), "length"), num(4_000_000_000.0))],
                "e",
                vec![log(member(var("e"), "name"))],
            ),
            log(str_lit("survived")),
        ]),
        "len=0\nbig=1\nlen=4\nhole=undefined\nRangeError\nsurvived\n",
    );
}
