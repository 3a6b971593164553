//! Property cache planning
//!
//! Every named property access (`o.p`, `o.p = v`, `o.p += v`, `o.m()`) gets
//! its own site number. The VM keeps one monomorphic cache per site, keyed
//! by the receiver's shape. Numbering is deterministic: functions by id,
//! statements in pre-order, and within a statement the accesses in the order
//! they are performed.

use crate::compiler::bytecode::SiteEntry;
use crate::compiler::ir::{walk_stmts_mut, IrExpr, IrProgram, SiteId};

/// Number every property access of `program`, returning the site count
pub fn plan_property_sites(program: &mut IrProgram) -> usize {
    let mut sites = Vec::new();
    for function in &mut program.functions {
        walk_stmts_mut(&mut function.body, &mut |stmt| {
            let line = stmt.pos.line;
            for expr in stmt.kind.exprs_mut() {
                plan_expr(expr, line, &mut sites);
            }
        });
    }
    log::debug!("planned {} property site(s)", sites.len());
    program.sites = sites;
    program.sites.len()
}

fn plan_expr(expr: &mut IrExpr, line: u32, sites: &mut Vec<SiteEntry>) {
    for child in expr.children_mut() {
        plan_expr(child, line, sites);
    }
    match expr {
        IrExpr::GetProp { name, site, .. }
        | IrExpr::SetProp { name, site, .. }
        | IrExpr::UpdateProp { name, site, .. }
        | IrExpr::CallMethod { name, site, .. } => {
            *site = SiteId(sites.len() as u32);
            sites.push(SiteEntry {
                name: name.clone(),
                line,
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{
        BindingKind, FunctionKind, IrFunction, IrStmt, IrStmtKind, SourcePos, Var,
    };

    fn get(object: IrExpr, name: &str) -> IrExpr {
        IrExpr::GetProp {
            object: object.boxed(),
            name: name.to_string(),
            site: SiteId::UNPLANNED,
            optional: false,
        }
    }

    fn at(line: u32, kind: IrStmtKind) -> IrStmt {
        IrStmt::new(kind, SourcePos { file: 0, line, column: 1 })
    }

    #[test]
    fn test_sites_are_numbered_in_evaluation_order() {
        let mut program = IrProgram::new("Test");
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut f = IrFunction::new(id, "f", FunctionKind::Declaration, this);
        let o = IrExpr::Load(Var::Binding(this));
        f.body = vec![
            // o.a.b: inner access is performed first
            at(1, IrStmtKind::Print(vec![get(get(o.clone(), "a"), "b")])),
            at(
                2,
                IrStmtKind::If {
                    condition: get(o.clone(), "c"),
                    then_branch: vec![at(3, IrStmtKind::Expr(IrExpr::SetProp {
                        object: o.clone().boxed(),
                        name: "d".to_string(),
                        site: SiteId::UNPLANNED,
                        value: get(o.clone(), "e").boxed(),
                    }))],
                    else_branch: Vec::new(),
                },
            ),
        ];
        program.add_function(f);

        assert_eq!(plan_property_sites(&mut program), 5);
        let names: Vec<_> = program.sites.iter().map(|s| (s.name.as_str(), s.line)).collect();
        assert_eq!(names, vec![("a", 1), ("b", 1), ("c", 2), ("e", 3), ("d", 3)]);

        let IrStmtKind::Print(values) = &program.functions[0].body[0].kind else {
            panic!("expected print");
        };
        assert!(matches!(values[0], IrExpr::GetProp { site: SiteId(1), .. }));
    }

    #[test]
    fn test_planning_twice_is_stable() {
        let mut program = IrProgram::new("Test");
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut f = IrFunction::new(id, "f", FunctionKind::Declaration, this);
        f.body = vec![at(1, IrStmtKind::Expr(get(IrExpr::Load(Var::Binding(this)), "x")))];
        program.add_function(f);
        plan_property_sites(&mut program);
        let first = program.functions[0].body.clone();
        plan_property_sites(&mut program);
        assert_eq!(program.functions[0].body, first);
    }
}
