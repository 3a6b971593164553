//! Async functions, promises and microtask ordering

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::{Expr, Program, Stmt};

fn resolved(value: Expr) -> Expr {
    method_call(var("Promise"), "resolve", vec![value])
}

fn labelled(label: &str, value: Expr) -> Stmt {
    log(binary(str_lit(label), "+", value))
}

/// `name().then(v => console.log("done=" + v)); console.log("sync")`
fn then_done(call_expr: Expr) -> Vec<Stmt> {
    vec![
        expr_stmt(method_call(
            call_expr,
            "then",
            vec![arrow(&["v"], vec![labelled("done=", var("v"))])],
        )),
        log(str_lit("sync")),
    ]
}

#[test]
fn test_sync_prefix_runs_before_caller_continues() {
    let mut body = vec![async_function(
        "run",
        &["x"],
        vec![
            labelled("start=", var("x")),
            const_("y", await_(resolved(binary(var("x"), "+", num(1.0))))),
            labelled("after=", var("y")),
            ret(binary(var("y"), "+", num(1.0))),
        ],
    )];
    body.extend(then_done(call(var("run"), vec![num(4.0)])));
    expect_output(Program::new(body), "start=4\nsync\nafter=5\ndone=6\n");
}

#[test]
fn test_await_plain_value() {
    let mut body = vec![async_function(
        "work",
        &[],
        vec![
            const_("v", await_(num(3.0))),
            labelled("await=", var("v")),
            ret(var("v")),
        ],
    )];
    body.extend(then_done(call(var("work"), vec![])));
    expect_output(Program::new(body), "sync\nawait=3\ndone=3\n");
}

#[test]
fn test_await_plain_value_defers_one_turn() {
    expect_output(
        Program::new(vec![
            async_function(
                "f",
                &[],
                vec![expr_stmt(await_(num(1.0))), log(str_lit("a"))],
            ),
            expr_stmt(call(var("f"), vec![])),
            expr_stmt(method_call(
                method_call(var("Promise"), "resolve", vec![]),
                "then",
                vec![arrow(&[], vec![log(str_lit("b"))])],
            )),
            log(str_lit("sync")),
        ]),
        "sync\na\nb\n",
    );
}

#[test]
fn test_throw_after_await_rejects() {
    expect_output(
        Program::new(vec![
            async_function(
                "fail",
                &[],
                vec![
                    expr_stmt(await_(null())),
                    throw(new_(var("Error"), vec![str_lit("boom")])),
                ],
            ),
            expr_stmt(method_call(
                call(var("fail"), vec![]),
                "catch",
                vec![arrow(&["e"], vec![labelled("error=", member(var("e"), "message"))])],
            )),
            log(str_lit("sync")),
        ]),
        "sync\nerror=boom\n",
    );
}

#[test]
fn test_await_inside_if_branch() {
    let mut body = vec![async_function(
        "pick",
        &["flag"],
        vec![
            let_("v", num(0.0)),
            if_(
                var("flag"),
                vec![
                    assign(var("v"), await_(resolved(num(10.0)))),
                    labelled("then=", var("v")),
                ],
                vec![assign(var("v"), unary("-", num(1.0)))],
            ),
            labelled("after=", var("v")),
            ret(var("v")),
        ],
    )];
    body.extend(then_done(call(var("pick"), vec![boolean(true)])));
    expect_output(Program::new(body), "sync\nthen=10\nafter=10\ndone=10\n");
}

#[test]
fn test_await_inside_while_loop() {
    let mut body = vec![async_function(
        "total",
        &[],
        vec![
            let_("i", num(1.0)),
            let_("sum", num(0.0)),
            while_(
                binary(var("i"), "<=", num(3.0)),
                vec![
                    assign(var("sum"), binary(var("sum"), "+", await_(resolved(var("i"))))),
                    assign(var("i"), binary(var("i"), "+", num(1.0))),
                ],
            ),
            labelled("sum=", var("sum")),
            ret(var("sum")),
        ],
    )];
    body.extend(then_done(call(var("total"), vec![])));
    expect_output(Program::new(body), "sync\nsum=6\ndone=6\n");
}

#[test]
fn test_await_in_if_nested_in_while() {
    let mut body = vec![async_function(
        "mixed",
        &[],
        vec![
            let_("i", num(1.0)),
            let_("acc", num(0.0)),
            while_(
                binary(var("i"), "<=", num(3.0)),
                vec![
                    if_(
                        binary(binary(var("i"), "%", num(2.0)), "===", num(0.0)),
                        vec![assign(
                            var("acc"),
                            binary(var("acc"), "+", await_(resolved(binary(var("i"), "*", num(4.0))))),
                        )],
                        vec![assign(var("acc"), binary(var("acc"), "+", var("i")))],
                    ),
                    assign(var("i"), binary(var("i"), "+", num(1.0))),
                ],
            ),
            ret(var("acc")),
        ],
    )];
    body.extend(then_done(call(var("mixed"), vec![])));
    expect_output(Program::new(body), "sync\ndone=12\n");
}

#[test]
fn test_try_catch_around_awaited_rejection() {
    expect_output(
        Program::new(vec![
            async_function(
                "guarded",
                &[],
                vec![
                    try_catch_finally(
                        vec![
                            expr_stmt(await_(method_call(var("Promise"), "reject", vec![str_lit("bad")]))),
                            log(str_lit("unreachable")),
                        ],
                        "e",
                        vec![labelled("caught=", var("e"))],
                        vec![log(str_lit("cleanup"))],
                    ),
                    ret(str_lit("ok")),
                ],
            ),
            expr_stmt(method_call(
                call(var("guarded"), vec![]),
                "then",
                vec![arrow(&["v"], vec![labelled("result=", var("v"))])],
            )),
        ]),
        "caught=bad\ncleanup\nresult=ok\n",
    );
}

#[test]
fn test_microtasks_run_in_fifo_order() {
    expect_output(
        Program::new(vec![
            expr_stmt(method_call(
                resolved(num(1.0)),
                "then",
                vec![arrow(&["v"], vec![labelled("a", var("v"))])],
            )),
            expr_stmt(call(var("queueMicrotask"), vec![arrow(&[], vec![log(str_lit("b"))])])),
            expr_stmt(method_call(
                resolved(num(2.0)),
                "then",
                vec![arrow(&["v"], vec![labelled("c", var("v"))])],
            )),
            log(str_lit("sync")),
        ]),
        "sync\na1\nb\nc2\n",
    );
}

#[test]
fn test_async_arrow_and_async_method() {
    expect_output(
        Program::new(vec![
            class_decl(class("Store").async_method(
                "load",
                &["k"],
                vec![ret(binary(str_lit("value:"), "+", await_(resolved(var("k")))))],
            )),
            const_(
                "fetch",
                async_arrow(
                    &["k"],
                    vec![ret(await_(method_call(new_(var("Store"), vec![]), "load", vec![var("k")])))],
                ),
            ),
            expr_stmt(method_call(
                call(var("fetch"), vec![str_lit("key")]),
                "then",
                vec![arrow(&["v"], vec![log(var("v"))])],
            )),
        ]),
        "value:key\n",
    );
}

#[test]
fn test_awaiting_promise_built_with_executor() {
    expect_output(
        Program::new(vec![
            const_(
                "p",
                new_(
                    var("Promise"),
                    vec![arrow(
                        &["resolve", "reject"],
                        vec![expr_stmt(call(var("resolve"), vec![num(7.0)]))],
                    )],
                ),
            ),
            const_("v", await_(var("p"))),
            labelled("v=", var("v")),
        ]),
        "v=7\n",
    );
}
