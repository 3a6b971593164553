//! `kite inspect`: decode a unit file and print its contents.

use crate::output::StyledOutput;
use anyhow::Context;
use kite_engine::compiler::bytecode::{decode_all, Function, Opcode, Unit};
use serde_json::{json, Value};
use std::path::Path;

pub fn execute(path: &Path, as_json: bool, out: &mut StyledOutput) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let unit = Unit::decode(&bytes).with_context(|| format!("cannot decode {}", path.display()))?;
    if as_json {
        out.line(&serde_json::to_string_pretty(&unit_json(&unit))?);
    } else {
        print_unit(&unit, out)?;
    }
    out.flush();
    Ok(())
}

fn unit_json(unit: &Unit) -> Value {
    let meta = &unit.metadata;
    json!({
        "name": unit.name,
        "kind": format!("{:?}", unit.kind),
        "strings": unit.constants.strings,
        "numbers": unit.constants.numbers,
        "functions": unit.functions.iter().enumerate().map(|(i, f)| json!({
            "id": meta.function_base as usize + i,
            "name": f.name,
            "params": f.param_names,
            "async": f.is_async(),
            "locals": f.local_count,
            "maxStack": f.max_stack,
            "states": f.state_count,
            "codeSize": f.code.len(),
            "handlers": f.handlers.iter().map(|h| json!([h.start, h.end, h.target])).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "classes": unit.classes.iter().map(|c| json!({
            "name": c.name,
            "parent": c.parent,
            "fields": c.fields,
            "constructor": c.constructor,
            "methods": c.methods.iter().map(|m| json!({ "name": m.name, "function": m.function })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "metadata": {
            "sourceFiles": meta.source_files,
            "globals": meta.globals,
            "sites": meta.sites.iter().map(|s| json!({ "name": s.name, "line": s.line })).collect::<Vec<_>>(),
            "nestedUnits": meta.nested_units,
            "totalFunctions": meta.total_functions,
            "declarations": meta.declarations.iter().map(|d| json!({
                "kind": d.kind.as_str(),
                "name": d.name,
                "owner": d.owner,
                "params": d.param_names,
                "async": d.is_async,
                "exported": d.exported,
                "decorators": d.decorators.iter().map(|m| json!({ "name": m.name, "arguments": m.arguments })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        },
    })
}

fn print_unit(unit: &Unit, out: &mut StyledOutput) -> anyhow::Result<()> {
    let meta = &unit.metadata;
    out.heading(&format!("unit {} ({:?})", unit.name, unit.kind));
    out.line(&format!(
        "  {} string(s), {} number(s), {} site(s), {} global(s)",
        unit.constants.strings.len(),
        unit.constants.numbers.len(),
        meta.sites.len(),
        meta.globals.len()
    ));
    if !meta.nested_units.is_empty() {
        out.line(&format!("  nested: {}", meta.nested_units.join(", ")));
    }

    for class in &unit.classes {
        out.heading(&format!("class {}", class.name));
        out.line(&format!("  fields: {}", class.fields.join(", ")));
        for method in &class.methods {
            out.line(&format!("  method {} -> fn#{}", method.name, method.function));
        }
    }

    for decl in &meta.declarations {
        let markers = decl
            .decorators
            .iter()
            .map(|d| format!("@{}", d.name))
            .collect::<Vec<_>>()
            .join(" ");
        out.line(&format!(
            "decl {} {}{}({}) {}",
            decl.kind.as_str(),
            decl.owner.as_ref().map(|o| format!("{}.", o)).unwrap_or_default(),
            decl.name,
            decl.param_names.join(", "),
            markers
        ));
    }

    for (i, function) in unit.functions.iter().enumerate() {
        print_function(meta.function_base as usize + i, function, unit, out)?;
    }
    Ok(())
}

fn print_function(id: usize, function: &Function, unit: &Unit, out: &mut StyledOutput) -> anyhow::Result<()> {
    out.heading(&format!(
        "fn#{} {}({}){}",
        id,
        function.name,
        function.param_names.join(", "),
        if function.is_async() { " async" } else { "" }
    ));
    out.line(&format!(
        "  locals={} max_stack={} env={} states={}",
        function.local_count, function.max_stack, function.env_size, function.state_count
    ));
    for handler in &function.handlers {
        out.line(&format!("  handler [{}, {}) -> {}", handler.start, handler.end, handler.target));
    }
    for instr in decode_all(&function.code)? {
        let mut text = format!("  {:>5}  {}", instr.offset, instr.opcode.name());
        for operand in &instr.operands {
            text.push_str(&format!(" {}", operand));
        }
        if !instr.targets.is_empty() {
            let targets: Vec<String> = instr.targets.iter().map(|t| t.to_string()).collect();
            text.push_str(&format!("  -> {}", targets.join(", ")));
        }
        if let Some(name) = string_operand(instr.opcode, &instr.operands, unit) {
            text.push_str(&format!("  ; {:?}", name));
        }
        out.line(&text);
    }
    Ok(())
}

fn string_operand<'u>(opcode: Opcode, operands: &[i64], unit: &'u Unit) -> Option<&'u str> {
    use Opcode::*;
    match opcode {
        ConstString | GetProp | SetProp | DefineField | DeleteProp | CallMethod | CallMethodSpread => {
            unit.constants.get_string(*operands.first()? as u32)
        }
        _ => None,
    }
}
