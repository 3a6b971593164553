//! Loading units: classpath lookup, load failures, reflective entry points

use super::harness::*;
use kite_engine::ast::build::*;
use kite_engine::ast::Program;
use kite_engine::vm::{Value, Vm};
use kite_runtime::{load, run_units};

fn program_with_closure() -> Program {
    Program::new(vec![
        const_("greet", arrow(&["who"], vec![ret(binary(str_lit("hi "), "+", var("who")))])),
        log(call(var("greet"), vec![str_lit("there")])),
    ])
}

#[test]
fn test_artifact_layout() {
    let project = Project::new().file("main.ts", program_with_closure());
    let artifact = project.compile("main.ts").unwrap();
    assert_eq!(artifact.entry_unit, "MainProgram");
    assert!(artifact.units.len() >= 2);
    assert!(has_unit(&project.out_dir(), "MainProgram"));
    assert!(artifact.source_map.is_file());
}

#[test]
fn test_units_found_on_classpath() {
    let project = Project::new().file("main.ts", program_with_closure());
    let artifact = project.compile("main.ts").unwrap();
    let extra = tempfile::tempdir().unwrap();
    for unit in artifact.units.iter().skip(1) {
        let target = extra.path().join(unit.file_name().unwrap());
        std::fs::rename(unit, target).unwrap();
    }

    let output = project.run_artifact(&artifact, &[]);
    assert_eq!(output.result.unwrap_err().code(), "KITE-RUN-UNIT-NOT-FOUND");

    let output = project.run_artifact(&artifact, &[extra.path().to_path_buf()]);
    assert!(output.result.is_ok(), "{:?}", output.result);
    assert_eq!(output.stdout, "hi there\n");
}

#[test]
fn test_classpath_entry_must_be_a_directory() {
    let project = Project::new().file("main.ts", program_with_closure());
    let artifact = project.compile("main.ts").unwrap();
    let output = project.run_artifact(&artifact, &[project.path("main.ts.ast.json")]);
    assert_eq!(output.result.unwrap_err().code(), "KITE-RUN-CLASSPATH");
}

#[test]
fn test_corrupted_unit_fails_to_load() {
    let project = Project::new().file("main.ts", program_with_closure());
    let artifact = project.compile("main.ts").unwrap();
    let entry = artifact.entry_path();
    let mut bytes = std::fs::read(&entry).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x5A;
    std::fs::write(&entry, bytes).unwrap();
    let output = project.run_artifact(&artifact, &[]);
    assert_eq!(output.result.unwrap_err().code(), "KITE-RUN-LOAD");
}

#[test]
fn test_run_units_reports_counters() {
    let project = Project::new().file(
        "main.ts",
        Program::new(vec![
            function("getX", &["o"], vec![ret(member(var("o"), "x"))]),
            const_("p", object(vec![("x", num(1.0))])),
            expr_stmt(call(var("getX"), vec![var("p")])),
            expr_stmt(call(var("getX"), vec![var("p")])),
            expr_stmt(method_call(
                method_call(var("Promise"), "resolve", vec![num(1.0)]),
                "then",
                vec![arrow(&["v"], vec![])],
            )),
        ]),
    );
    let artifact = project.compile("main.ts").unwrap();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let report = run_units(&artifact.output_dir, &artifact.entry_unit, &mut stdout, &mut stderr, &[]).unwrap();
    assert!(report.sites.hits >= 1);
    assert!(report.sites.misses >= 1);
    assert_eq!(report.scheduler.executed, report.scheduler.scheduled);
    assert!(report.scheduler.executed >= 1);
}

#[test]
fn test_reflective_invocation_after_load() {
    let project = Project::new().file(
        "main.ts",
        Program::new(vec![
            function("square", &["n"], vec![ret(binary(var("n"), "*", var("n")))]),
            class_decl(
                class("Acc")
                    .field("base")
                    .constructor(&["base"], vec![assign(member(this(), "base"), var("base"))])
                    .method("plus", &["n"], vec![ret(binary(member(this(), "base"), "+", var("n")))]),
            ),
        ]),
    );
    let artifact = project.compile("main.ts").unwrap();
    let program = load(&artifact.output_dir, &artifact.entry_unit, &[]).unwrap();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut vm = Vm::new(program, &mut stdout, &mut stderr);

    let squared = vm.invoke_function("square", vec![Value::from(7.0)]).unwrap();
    assert_eq!(vm.display(&squared), "49");

    let sum = vm
        .invoke_class_method("Acc", "plus", vec![Value::from(10.0)], vec![Value::from(5.0)])
        .unwrap();
    assert_eq!(vm.display(&sum), "15");

    assert!(vm.invoke_function("absent", vec![]).is_err());
}
