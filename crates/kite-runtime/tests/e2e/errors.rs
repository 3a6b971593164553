//! Exceptions at run time and diagnostics at compile time

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::Program;

#[test]
fn test_try_catch_finally_order() {
    expect_output(
        Program::new(vec![
            function(
                "risky",
                &[],
                vec![
                    try_catch_finally(
                        vec![log(str_lit("try")), throw(str_lit("oops")), log(str_lit("unreachable"))],
                        "e",
                        vec![log(binary(str_lit("catch="), "+", var("e")))],
                        vec![log(str_lit("finally"))],
                    ),
                    ret(str_lit("end")),
                ],
            ),
            log(call(var("risky"), vec![])),
        ]),
        "try\ncatch=oops\nfinally\nend\n",
    );
}

#[test]
fn test_finally_runs_on_return() {
    expect_output(
        Program::new(vec![
            function(
                "early",
                &[],
                vec![try_finally(vec![ret(num(1.0))], vec![log(str_lit("cleanup"))])],
            ),
            log(call(var("early"), vec![])),
        ]),
        "cleanup\n1\n",
    );
}

#[test]
fn test_runtime_type_errors_are_catchable() {
    expect_output(
        Program::new(vec![
            let_("u", undefined()),
            try_catch(
                vec![const_("x", member(var("u"), "x"))],
                "e",
                vec![log(member(var("e"), "name"))],
            ),
        ]),
        "TypeError\n",
    );
}

#[test]
fn test_uncaught_exception_fails_the_run() {
    let output = expect_runtime_error(
        Program::new(vec![
            log(str_lit("first")),
            throw(new_(var("Error"), vec![str_lit("fatal")])),
        ]),
        "KITE-RUN-UNCAUGHT",
    );
    assert_eq!(output.stdout, "first\n");
    let message = output.result.unwrap_err().to_string();
    assert!(message.contains("fatal"), "{}", message);
}

#[test]
fn test_unhandled_rejection_fails_the_run() {
    expect_runtime_error(
        Program::new(vec![expr_stmt(method_call(
            var("Promise"),
            "reject",
            vec![str_lit("lost")],
        ))]),
        "KITE-RUN-UNHANDLED-REJECTION",
    );
}

#[test]
fn test_console_error_goes_to_stderr() {
    let output = Project::new()
        .file(
            "main.ts",
            Program::new(vec![
                expr_stmt(method_call(var("console"), "error", vec![str_lit("bad"), num(1.0)])),
                log(str_lit("good")),
            ]),
        )
        .run("main.ts");
    assert!(output.result.is_ok());
    assert_eq!(output.stdout, "good\n");
    assert_eq!(output.stderr, "bad 1\n");
}

#[test]
fn test_for_loops_are_rejected() {
    expect_compile_error(Program::new(vec![for_loop()]), "KITE-UNSUPPORTED-FOR");
    expect_compile_error(Program::new(vec![for_of()]), "KITE-UNSUPPORTED-FOR");
}

#[test]
fn test_await_in_condition_is_rejected() {
    expect_compile_error(
        Program::new(vec![async_function(
            "f",
            &[],
            vec![if_(await_(boolean(true)), vec![], vec![])],
        )]),
        "KITE-AWAIT-CONDITION",
    );
}

#[test]
fn test_await_in_while_condition_is_rejected() {
    expect_compile_error(
        Program::new(vec![async_function(
            "f",
            &[],
            vec![while_(await_(boolean(false)), vec![])],
        )]),
        "KITE-AWAIT-CONDITION",
    );
}

#[test]
fn test_await_outside_async_is_rejected() {
    expect_compile_error(
        Program::new(vec![function("f", &[], vec![expr_stmt(await_(num(1.0)))])]),
        "KITE-AWAIT-OUTSIDE-ASYNC",
    );
}

#[test]
fn test_unknown_identifier_is_rejected() {
    expect_compile_error(Program::new(vec![log(var("nowhere"))]), "KITE-UNRESOLVED");
}

#[test]
fn test_const_reassignment_is_rejected() {
    expect_compile_error(
        Program::new(vec![const_("k", num(1.0)), assign(var("k"), num(2.0))]),
        "KITE-CONST-ASSIGN",
    );
}

#[test]
fn test_eval_is_rejected() {
    expect_compile_error(
        Program::new(vec![expr_stmt(call(var("eval"), vec![str_lit("1")]))]),
        "KITE-EVAL",
    );
}

#[test]
fn test_import_errors() {
    let project = Project::new().file(
        "main.ts",
        Program::new(vec![import("./missing", &["x"])]),
    );
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-MODULE-NOT-FOUND");

    let project = Project::new().file(
        "main.ts",
        Program::new(vec![import("lodash", &["x"])]),
    );
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-IMPORT-NON-RELATIVE");

    let project = Project::new()
        .file("m.ts", Program::new(vec![export(const_("x", num(1.0)))]))
        .file("main.ts", Program::new(vec![import_as("./m", "x", "y")]));
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-IMPORT-ALIAS");

    let project = Project::new()
        .file("m.ts", Program::new(vec![export(const_("x", num(1.0)))]))
        .file("main.ts", Program::new(vec![import_default("./m", "x")]));
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-IMPORT-DEFAULT");

    let project = Project::new()
        .file("a.ts", Program::new(vec![import_side_effect("./b")]))
        .file("b.ts", Program::new(vec![import_side_effect("./a")]))
        .file("main.ts", Program::new(vec![import_side_effect("./a")]));
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-IMPORT-CYCLE");
}

#[test]
fn test_missing_payload_is_an_io_error() {
    let project = Project::new();
    assert_eq!(project.compile("main.ts").unwrap_err().code(), "KITE-IO");
}
