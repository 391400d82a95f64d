//! Structural queries over statement lists.
//!
//! These run once at normalization time so the writer never has to look
//! ahead into a body it is emitting.

use super::{DictEntry, Expr, FStringPart, Stmt};

/// Names bound by assignment in `body`, in first-assignment order.
///
/// Nested function and class bodies are not entered, `global` /
/// `nonlocal` names and `exclude` (the parameters) are left out.
pub fn assigned_names(body: &[Stmt], exclude: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    let mut declared_outer = Vec::new();
    collect_stmts(body, &mut names, &mut declared_outer);
    names.retain(|name| {
        !exclude.contains(&name.as_str()) && !declared_outer.iter().any(|d| d == name)
    });
    names
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn collect_target(target: &Expr, names: &mut Vec<String>) {
    match target {
        Expr::Name { id } => push_unique(names, id),
        Expr::Tuple { elts } | Expr::List { elts } => {
            for elt in elts {
                collect_target(elt, names);
            }
        }
        Expr::Starred { value } => collect_target(value, names),
        _ => {}
    }
}

fn collect_stmts(body: &[Stmt], names: &mut Vec<String>, declared_outer: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Assign { targets, value } => {
                for target in targets {
                    collect_target(target, names);
                }
                collect_walrus(value, names);
            }
            Stmt::AugAssign { target, value, .. } => {
                collect_target(target, names);
                collect_walrus(value, names);
            }
            Stmt::Expr { value } | Stmt::Return { value: Some(value) } => {
                collect_walrus(value, names);
            }
            Stmt::Assert { test, .. } => collect_walrus(test, names),
            Stmt::If { test, body, orelse }
            | Stmt::While {
                test, body, orelse, ..
            } => {
                collect_walrus(test, names);
                collect_stmts(body, names, declared_outer);
                collect_stmts(orelse, names, declared_outer);
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                // The loop variable is local to the generated Lua loop, but
                // Python code may read it after the loop ends.
                collect_target(target, names);
                collect_walrus(iter, names);
                collect_stmts(body, names, declared_outer);
                collect_stmts(orelse, names, declared_outer);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                collect_stmts(body, names, declared_outer);
                for handler in handlers {
                    collect_stmts(&handler.body, names, declared_outer);
                }
                collect_stmts(orelse, names, declared_outer);
                collect_stmts(finalbody, names, declared_outer);
            }
            Stmt::With { items, body, .. } => {
                for item in items {
                    collect_walrus(&item.context, names);
                    if let Some(target) = &item.target {
                        collect_target(target, names);
                    }
                }
                collect_stmts(body, names, declared_outer);
            }
            Stmt::FunctionDef(def) => push_unique(names, &def.name),
            Stmt::ClassDef(def) => push_unique(names, &def.name),
            Stmt::Import { names: aliases } | Stmt::ImportFrom { names: aliases, .. } => {
                for alias in aliases {
                    if alias.name != "*" {
                        push_unique(names, alias.bound_name());
                    }
                }
            }
            Stmt::Global { names: declared } | Stmt::Nonlocal { names: declared } => {
                for name in declared {
                    push_unique(declared_outer, name);
                }
            }
            Stmt::Return { value: None }
            | Stmt::Raise { .. }
            | Stmt::Delete { .. }
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Pass
            | Stmt::Unhandled { .. } => {}
        }
    }
}

/// Walrus targets at the top of an expression. Comprehension scopes are
/// not entered.
fn collect_walrus(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::NamedExpr { target, value } => {
            push_unique(names, target);
            collect_walrus(value, names);
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            collect_walrus(func, names);
            for arg in args {
                collect_walrus(arg, names);
            }
            for keyword in keywords {
                collect_walrus(&keyword.value, names);
            }
        }
        Expr::Attribute { value, .. }
        | Expr::Await { value }
        | Expr::Starred { value }
        | Expr::UnaryOp { operand: value, .. } => collect_walrus(value, names),
        Expr::Subscript { value, index } => {
            collect_walrus(value, names);
            collect_walrus(index, names);
        }
        Expr::IfExp { test, body, orelse } => {
            collect_walrus(test, names);
            collect_walrus(body, names);
            collect_walrus(orelse, names);
        }
        Expr::FormattedString { parts } => {
            for part in parts {
                if let FStringPart::Expr(value) = part {
                    collect_walrus(value, names);
                }
            }
        }
        Expr::BinOp { left, right, .. } | Expr::BoolOp { left, right, .. } => {
            collect_walrus(left, names);
            collect_walrus(right, names);
        }
        Expr::Compare {
            left, comparators, ..
        } => {
            collect_walrus(left, names);
            for comparator in comparators {
                collect_walrus(comparator, names);
            }
        }
        Expr::Dict { entries } => {
            for entry in entries {
                match entry {
                    DictEntry::Pair { key, value } => {
                        collect_walrus(key, names);
                        collect_walrus(value, names);
                    }
                    DictEntry::Splat { value } => collect_walrus(value, names),
                }
            }
        }
        Expr::List { elts } | Expr::Tuple { elts } | Expr::Set { elts } => {
            for elt in elts {
                collect_walrus(elt, names);
            }
        }
        _ => {}
    }
}

/// Whether `body` contains a `continue` that targets the loop owning it.
///
/// Nested loop bodies and nested function/class bodies own their own
/// `continue` statements and are skipped. A nested loop's `else` clause
/// runs after that loop, so its `continue` still targets this one.
pub fn contains_continue(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Continue => true,
        Stmt::For { orelse, .. } | Stmt::While { orelse, .. } => contains_continue(orelse),
        Stmt::If { body, orelse, .. } => contains_continue(body) || contains_continue(orelse),
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            contains_continue(body)
                || handlers.iter().any(|h| contains_continue(&h.body))
                || contains_continue(orelse)
                || contains_continue(finalbody)
        }
        Stmt::With { body, .. } => contains_continue(body),
        _ => false,
    })
}

/// Whether `body` returns from its function.
///
/// Nested function and class bodies are skipped.
pub fn contains_return(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Return { .. } => true,
        Stmt::If { body, orelse, .. }
        | Stmt::While { body, orelse, .. }
        | Stmt::For { body, orelse, .. } => contains_return(body) || contains_return(orelse),
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            contains_return(body)
                || handlers.iter().any(|h| contains_return(&h.body))
                || contains_return(orelse)
                || contains_return(finalbody)
        }
        Stmt::With { body, .. } => contains_return(body),
        _ => false,
    })
}

/// Whether `body` yields, making its function a generator.
///
/// Only yields in statement position or as an assigned value count;
/// nested function and class bodies are skipped.
pub fn contains_yield(body: &[Stmt]) -> bool {
    fn is_yield(expr: &Expr) -> bool {
        matches!(expr, Expr::Yield { .. } | Expr::YieldFrom { .. })
    }

    body.iter().any(|stmt| match stmt {
        Stmt::Expr { value } | Stmt::Assign { value, .. } => is_yield(value),
        Stmt::Return { value: Some(value) } => is_yield(value),
        Stmt::If { body, orelse, .. }
        | Stmt::While { body, orelse, .. }
        | Stmt::For { body, orelse, .. } => contains_yield(body) || contains_yield(orelse),
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            contains_yield(body)
                || handlers.iter().any(|h| contains_yield(&h.body))
                || contains_yield(orelse)
                || contains_yield(finalbody)
        }
        Stmt::With { body, .. } => contains_yield(body),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Alias, CmpOp, Expr, Stmt};

    #[test]
    fn test_assigned_names_skip_params_and_globals() {
        let body = vec![
            Stmt::assign(Expr::name("total"), Expr::int(0)),
            Stmt::assign(Expr::name("a"), Expr::int(1)),
            Stmt::Global {
                names: vec!["counter".into()],
            },
            Stmt::assign(Expr::name("counter"), Expr::int(2)),
            Stmt::assign(Expr::name("total"), Expr::int(3)),
        ];
        assert_eq!(assigned_names(&body, &["a"]), vec!["total"]);
    }

    #[test]
    fn test_assigned_names_tuple_targets_and_imports() {
        let body = vec![
            Stmt::assign(
                Expr::Tuple {
                    elts: vec![Expr::name("x"), Expr::name("y")],
                },
                Expr::name("pair"),
            ),
            Stmt::Import {
                names: vec![Alias {
                    name: "os.path".into(),
                    asname: None,
                }],
            },
        ];
        assert_eq!(assigned_names(&body, &[]), vec!["x", "y", "os"]);
    }

    #[test]
    fn test_continue_in_nested_loop_is_not_ours() {
        let inner = Stmt::for_in(Expr::name("j"), Expr::name("ys"), vec![Stmt::Continue]);
        assert!(!contains_continue(&[inner]));
        let guarded = Stmt::if_stmt(Expr::name("c"), vec![Stmt::Continue], vec![]);
        assert!(contains_continue(&[guarded]));
    }

    #[test]
    fn test_continue_in_nested_loop_else_is_ours() {
        let mut inner = Stmt::for_in(Expr::name("y"), Expr::name("ys"), vec![Stmt::Pass]);
        if let Stmt::For { orelse, .. } = &mut inner {
            orelse.push(Stmt::Continue);
        }
        assert!(contains_continue(&[inner]));
    }

    #[test]
    fn test_walrus_in_loop_test_is_hoisted() {
        let test = Expr::NamedExpr {
            target: "chunk".into(),
            value: Box::new(Expr::call(Expr::name("read"), vec![])),
        };
        let body = vec![Stmt::while_loop(test, vec![Stmt::Pass])];
        assert_eq!(assigned_names(&body, &[]), vec!["chunk"]);

        let guarded = Stmt::if_stmt(
            Expr::compare(
                Expr::NamedExpr {
                    target: "n".into(),
                    value: Box::new(Expr::int(3)),
                },
                CmpOp::Gt,
                Expr::int(1),
            ),
            vec![],
            vec![],
        );
        assert_eq!(assigned_names(&[guarded], &[]), vec!["n"]);
    }

    #[test]
    fn test_return_detection() {
        let nested = Stmt::function(crate::ir::FunctionDef::new(
            "inner",
            vec![],
            vec![Stmt::return_stmt(None)],
        ));
        assert!(!contains_return(&[nested]));

        let guarded = Stmt::if_stmt(
            Expr::name("done"),
            vec![Stmt::return_stmt(Some(Expr::int(1)))],
            vec![],
        );
        assert!(contains_return(&[guarded]));
    }

    #[test]
    fn test_yield_detection_skips_nested_functions() {
        let nested = Stmt::function(crate::ir::FunctionDef::new(
            "inner",
            vec![],
            vec![Stmt::expr(Expr::Yield { value: None })],
        ));
        assert!(!contains_yield(&[nested]));

        let looped = Stmt::for_in(
            Expr::name("x"),
            Expr::name("xs"),
            vec![Stmt::expr(Expr::Yield {
                value: Some(Box::new(Expr::name("x"))),
            })],
        );
        assert!(contains_yield(&[looped]));
    }
}
