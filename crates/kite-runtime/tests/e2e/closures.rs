//! Closures, captured cells and callbacks

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::{Program, Stmt};

fn make_counter() -> Stmt {
    function(
        "makeCounter",
        &["start"],
        vec![
            let_("n", var("start")),
            ret(arrow(
                &[],
                vec![
                    assign(var("n"), binary(var("n"), "+", num(1.0))),
                    ret(var("n")),
                ],
            )),
        ],
    )
}

#[test]
fn test_counter_keeps_state_between_calls() {
    expect_output(
        Program::new(vec![
            make_counter(),
            const_("c1", call(var("makeCounter"), vec![num(2.0)])),
            log(binary(str_lit("c1="), "+", call(var("c1"), vec![]))),
            log(binary(str_lit("c1="), "+", call(var("c1"), vec![]))),
        ]),
        "c1=3\nc1=4\n",
    );
}

#[test]
fn test_counters_do_not_share_cells() {
    expect_output(
        Program::new(vec![
            make_counter(),
            const_("a", call(var("makeCounter"), vec![num(0.0)])),
            const_("b", call(var("makeCounter"), vec![num(10.0)])),
            log(binary(
                binary(
                    binary(
                        binary(binary(str_lit("iso="), "+", call(var("a"), vec![])), "+", str_lit(",")),
                        "+",
                        call(var("a"), vec![]),
                    ),
                    "+",
                    str_lit(","),
                ),
                "+",
                call(var("b"), vec![]),
            )),
        ]),
        "iso=1,2,11\n",
    );
}

#[test]
fn test_nested_closures_reach_outer_scopes() {
    expect_output(
        Program::new(vec![
            function(
                "outer",
                &["a"],
                vec![ret(arrow(
                    &["b"],
                    vec![ret(arrow(
                        &["c"],
                        vec![ret(binary(binary(var("a"), "+", var("b")), "+", var("c")))],
                    ))],
                ))],
            ),
            log(call(call(call(var("outer"), vec![num(1.0)]), vec![num(2.0)]), vec![num(3.0)])),
        ]),
        "6\n",
    );
}

#[test]
fn test_closure_sees_later_assignment_to_captured_variable() {
    expect_output(
        Program::new(vec![
            let_("label", str_lit("before")),
            const_("show", arrow(&[], vec![log(var("label"))])),
            assign(var("label"), str_lit("after")),
            expr_stmt(call(var("show"), vec![])),
        ]),
        "after\n",
    );
}

#[test]
fn test_function_expression_passed_as_callback() {
    expect_output(
        Program::new(vec![
            function(
                "twice",
                &["f", "x"],
                vec![ret(call(var("f"), vec![call(var("f"), vec![var("x")])]))],
            ),
            log(call(
                var("twice"),
                vec![func(&["v"], vec![ret(binary(var("v"), "*", num(3.0)))]), num(2.0)],
            )),
        ]),
        "18\n",
    );
}

#[test]
fn test_two_closures_share_one_activation() {
    expect_output(
        Program::new(vec![
            function(
                "pair",
                &[],
                vec![
                    let_("count", num(0.0)),
                    ret(object(vec![
                        ("inc", arrow(&[], vec![assign(var("count"), binary(var("count"), "+", num(1.0)))])),
                        ("get", arrow(&[], vec![ret(var("count"))])),
                    ])),
                ],
            ),
            const_("p", call(var("pair"), vec![])),
            expr_stmt(method_call(var("p"), "inc", vec![])),
            expr_stmt(method_call(var("p"), "inc", vec![])),
            log(binary(str_lit("count="), "+", method_call(var("p"), "get", vec![]))),
        ]),
        "count=2\n",
    );
}
