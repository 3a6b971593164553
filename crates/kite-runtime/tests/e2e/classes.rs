//! Classes: fields, constructors, inheritance and method dispatch

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::Program;

fn animals() -> Vec<kite_engine::ast::Stmt> {
    vec![
        class_decl(
            class("Animal")
                .field("name")
                .constructor(&["name"], vec![assign(member(this(), "name"), var("name"))])
                .method("speak", &[], vec![ret(binary(member(this(), "name"), "+", str_lit(" makes a sound")))])
                .method("describe", &[], vec![ret(binary(str_lit("I am "), "+", method_call(this(), "speak", vec![])))]),
        ),
        class_decl(
            class("Dog")
                .extends("Animal")
                .field_init("tricks", num(0.0))
                .constructor(
                    &["name"],
                    vec![super_call(vec![var("name")]), assign(member(this(), "tricks"), num(2.0))],
                )
                .method("speak", &[], vec![ret(binary(member(this(), "name"), "+", str_lit(" barks")))]),
        ),
    ]
}

#[test]
fn test_override_dispatches_on_runtime_class() {
    let mut body = animals();
    body.extend([
        const_("a", new_(var("Animal"), vec![str_lit("cat")])),
        const_("d", new_(var("Dog"), vec![str_lit("rex")])),
        log(method_call(var("a"), "describe", vec![])),
        log(method_call(var("d"), "describe", vec![])),
        log(binary(str_lit("tricks="), "+", member(var("d"), "tricks"))),
    ]);
    expect_output(
        Program::new(body),
        "I am cat makes a sound\nI am rex barks\ntricks=2\n",
    );
}

#[test]
fn test_field_initializers_run_before_constructor_body() {
    expect_output(
        Program::new(vec![
            class_decl(
                class("Box")
                    .field_init("size", num(3.0))
                    .constructor(&[], vec![log(binary(str_lit("size="), "+", member(this(), "size")))]),
            ),
            expr_stmt(new_(var("Box"), vec![])),
        ]),
        "size=3\n",
    );
}

#[test]
fn test_derived_class_without_constructor_forwards_arguments() {
    expect_output(
        Program::new(vec![
            class_decl(
                class("Base")
                    .field("v")
                    .constructor(&["v"], vec![assign(member(this(), "v"), var("v"))]),
            ),
            class_decl(class("Child").extends("Base")),
            log(member(new_(var("Child"), vec![num(8.0)]), "v")),
        ]),
        "8\n",
    );
}

#[test]
fn test_method_extracted_as_value_keeps_no_receiver() {
    expect_output(
        Program::new(vec![
            class_decl(class("Greeter").method("hi", &[], vec![ret(str_lit("hi"))])),
            const_("g", new_(var("Greeter"), vec![])),
            const_("f", member(var("g"), "hi")),
            log(call(var("f"), vec![])),
        ]),
        "hi\n",
    );
}

#[test]
fn test_same_site_sees_many_shapes() {
    expect_output(
        Program::new(vec![
            function("getX", &["o"], vec![ret(member(var("o"), "x"))]),
            log(call(var("getX"), vec![object(vec![("x", num(1.0))])])),
            log(call(var("getX"), vec![object(vec![("y", num(0.0)), ("x", num(2.0))])])),
            log(call(var("getX"), vec![object(vec![("x", num(3.0))])])),
            log(call(var("getX"), vec![object(vec![("z", num(0.0))])])),
        ]),
        "1\n2\n3\nundefined\n",
    );
}

#[test]
fn test_calling_class_without_new_throws() {
    let output = expect_runtime_error(
        Program::new(vec![
            class_decl(class("Thing")),
            expr_stmt(call(var("Thing"), vec![])),
        ]),
        "KITE-RUN-UNCAUGHT",
    );
    assert!(output.stdout.is_empty());
}
