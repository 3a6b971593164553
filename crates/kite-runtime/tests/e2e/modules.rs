//! Module initialization order and live bindings

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::Program;

#[test]
fn test_imported_module_initializes_first() {
    expect_project_output(
        Project::new()
            .file(
                "math.ts",
                Program::new(vec![
                    log(str_lit("math-init")),
                    export(function("triple", &["x"], vec![ret(binary(var("x"), "*", num(3.0)))])),
                ]),
            )
            .file(
                "main.ts",
                Program::new(vec![
                    import("./math", &["triple"]),
                    log(binary(str_lit("result="), "+", call(var("triple"), vec![num(2.0)]))),
                ]),
            ),
        "math-init\nresult=6\n",
    );
}

#[test]
fn test_side_effect_import() {
    expect_project_output(
        Project::new()
            .file("setup.ts", Program::new(vec![log(str_lit("setup-init"))]))
            .file(
                "main.ts",
                Program::new(vec![import_side_effect("./setup"), log(str_lit("ready"))]),
            ),
        "setup-init\nready\n",
    );
}

#[test]
fn test_imports_are_live_bindings() {
    expect_project_output(
        Project::new()
            .file(
                "counter.ts",
                Program::new(vec![
                    export(let_("v", num(0.0))),
                    export(function("inc", &[], vec![assign(var("v"), binary(var("v"), "+", num(1.0)))])),
                ]),
            )
            .file(
                "main.ts",
                Program::new(vec![
                    import("./counter", &["v", "inc"]),
                    log(binary(str_lit("v="), "+", var("v"))),
                    expr_stmt(call(var("inc"), vec![])),
                    log(binary(str_lit("v="), "+", var("v"))),
                ]),
            ),
        "v=0\nv=1\n",
    );
}

#[test]
fn test_shared_dependency_runs_once() {
    expect_project_output(
        Project::new()
            .file("shared.ts", Program::new(vec![log(str_lit("shared-init"))]))
            .file("a.ts", Program::new(vec![import_side_effect("./shared"), log(str_lit("a-init"))]))
            .file("b.ts", Program::new(vec![import_side_effect("./shared"), log(str_lit("b-init"))]))
            .file(
                "main.ts",
                Program::new(vec![
                    import_side_effect("./a"),
                    import_side_effect("./b"),
                    log(str_lit("main")),
                ]),
            ),
        "shared-init\na-init\nb-init\nmain\n",
    );
}

#[test]
fn test_export_list_with_alias() {
    expect_project_output(
        Project::new()
            .file(
                "names.ts",
                Program::new(vec![
                    const_("internal", str_lit("hello")),
                    export_named(&[("internal", "greeting")]),
                ]),
            )
            .file(
                "main.ts",
                Program::new(vec![import("./names", &["greeting"]), log(var("greeting"))]),
            ),
        "hello\n",
    );
}

#[test]
fn test_modules_in_subdirectories() {
    expect_project_output(
        Project::new()
            .file(
                "lib/util.ts",
                Program::new(vec![export(const_("name", str_lit("util")))]),
            )
            .file(
                "main.ts",
                Program::new(vec![import("./lib/util", &["name"]), log(var("name"))]),
            ),
        "util\n",
    );
}

#[test]
fn test_top_level_await() {
    expect_output(
        Program::new(vec![
            log(str_lit("before")),
            const_("x", await_(method_call(var("Promise"), "resolve", vec![num(1.0)]))),
            log(binary(str_lit("after="), "+", var("x"))),
        ]),
        "before\nafter=1\n",
    );
}

#[test]
fn test_importer_waits_for_awaiting_dependency() {
    expect_project_output(
        Project::new()
            .file(
                "dep.ts",
                Program::new(vec![
                    export(let_("status", str_lit("pending"))),
                    assign(
                        var("status"),
                        await_(method_call(var("Promise"), "resolve", vec![str_lit("ready")])),
                    ),
                    log(binary(str_lit("dep="), "+", var("status"))),
                ]),
            )
            .file(
                "main.ts",
                Program::new(vec![
                    import("./dep", &["status"]),
                    log(binary(str_lit("main="), "+", var("status"))),
                ]),
            ),
        "dep=ready\nmain=ready\n",
    );
}

#[test]
fn test_top_level_await_chain() {
    expect_project_output(
        Project::new()
            .file(
                "a.ts",
                Program::new(vec![
                    export(const_("a", await_(method_call(var("Promise"), "resolve", vec![num(5.0)])))),
                    log(binary(str_lit("a="), "+", var("a"))),
                ]),
            )
            .file(
                "b.ts",
                Program::new(vec![
                    import("./a", &["a"]),
                    export(const_("b", await_(method_call(var("Promise"), "resolve", vec![var("a")])))),
                    log(binary(str_lit("b="), "+", var("b"))),
                ]),
            )
            .file(
                "main.ts",
                Program::new(vec![
                    import("./b", &["b"]),
                    log(binary(str_lit("main="), "+", var("b"))),
                ]),
            ),
        "a=5\nb=5\nmain=5\n",
    );
}

#[test]
fn test_dependency_of_later_import_already_initialized() {
    expect_project_output(
        Project::new()
            .file("a.ts", Program::new(vec![log(str_lit("a-init"))]))
            .file("b.ts", Program::new(vec![import_side_effect("./a"), log(str_lit("b-init"))]))
            .file(
                "main.ts",
                Program::new(vec![
                    import_side_effect("./a"),
                    import_side_effect("./b"),
                    log(str_lit("main")),
                ]),
            ),
        "a-init\nb-init\nmain\n",
    );
}
