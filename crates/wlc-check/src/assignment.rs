//! Definite-assignment analysis.
//!
//! A forward dataflow guaranteeing that no variable is read before it has
//! been assigned on every incoming path. Each statement produces a pair of
//! outgoing variable sets: `next` for fall-through and `brk` for paths
//! that leave the enclosing loop via `break`. `None` stands for "no path
//! reaches here"; the merge of two paths is the intersection of their
//! sets, with `None` as the identity.

use std::collections::HashSet;

use wlc_syntax::ast::*;
use wlc_syntax::error::{err, ErrorKind, Result};

type Defs = HashSet<String>;

struct FlowSet {
    next: Option<Defs>,
    brk: Option<Defs>,
}

impl FlowSet {
    fn next(defs: Defs) -> Self {
        Self {
            next: Some(defs),
            brk: None,
        }
    }
}

fn meet(a: Option<Defs>, b: Option<Defs>) -> Option<Defs> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => Some(a.intersection(&b).cloned().collect()),
    }
}

/// Check every method of the file. Parameters start out assigned.
pub fn check(file: &SourceFile) -> Result<()> {
    for decl in &file.decls {
        if let Decl::Method(m) = decl {
            let defs: Defs = m.params.iter().map(|p| p.name.clone()).collect();
            check_block(&m.body, &defs)?;
        }
    }
    Ok(())
}

fn check_block(stmts: &[Stmt], defs: &Defs) -> Result<FlowSet> {
    let mut next = Some(defs.clone());
    let mut brk = None;
    for s in stmts {
        let cur = match next.take() {
            Some(d) => d,
            // no path reaches this statement; the reachability pass has
            // already rejected the program
            None => break,
        };
        let flow = check_stmt(s, &cur)?;
        brk = meet(brk, flow.brk);
        next = flow.next;
    }
    Ok(FlowSet { next, brk })
}

fn check_stmt(stmt: &Stmt, defs: &Defs) -> Result<FlowSet> {
    match &stmt.kind {
        StmtKind::Assert(e) | StmtKind::Print(e) | StmtKind::Invoke(e) => {
            check_expr(e, defs)?;
            Ok(FlowSet::next(defs.clone()))
        }
        StmtKind::Assign { lhs, rhs } => {
            check_expr(rhs, defs)?;
            match &lhs.kind {
                ExprKind::Variable(name) => {
                    let mut out = defs.clone();
                    out.insert(name.clone());
                    Ok(FlowSet::next(out))
                }
                // an indexed or field target requires its base (and the
                // index) to be assigned already
                ExprKind::IndexOf { source, index } => {
                    check_expr(source, defs)?;
                    check_expr(index, defs)?;
                    Ok(FlowSet::next(defs.clone()))
                }
                ExprKind::RecordAccess { source, .. } => {
                    check_expr(source, defs)?;
                    Ok(FlowSet::next(defs.clone()))
                }
                _ => err(ErrorKind::Internal, "invalid assignment target", lhs.span),
            }
        }
        StmtKind::VariableDeclaration { name, init, .. } => match init {
            Some(e) => {
                check_expr(e, defs)?;
                let mut out = defs.clone();
                out.insert(name.clone());
                Ok(FlowSet::next(out))
            }
            None => Ok(FlowSet::next(defs.clone())),
        },
        StmtKind::Return(e) => {
            if let Some(e) = e {
                check_expr(e, defs)?;
            }
            Ok(FlowSet {
                next: None,
                brk: None,
            })
        }
        StmtKind::Continue => Ok(FlowSet {
            next: None,
            brk: None,
        }),
        StmtKind::Break => Ok(FlowSet {
            next: None,
            brk: Some(defs.clone()),
        }),
        StmtKind::IfElse {
            cond,
            then_branch,
            else_branch,
        } => {
            check_expr(cond, defs)?;
            let t = check_block(then_branch, defs)?;
            let f = check_block(else_branch, defs)?;
            Ok(FlowSet {
                next: meet(t.next, f.next),
                brk: meet(t.brk, f.brk),
            })
        }
        // the loop may not iterate, so nothing assigned inside survives;
        // the body's break outcome only leaves this loop
        StmtKind::While { cond, body } => {
            check_expr(cond, defs)?;
            check_block(body, defs)?;
            Ok(FlowSet::next(defs.clone()))
        }
        StmtKind::For {
            decl,
            cond,
            step,
            body,
        } => {
            let scoped = check_stmt(decl, defs)?;
            let inner = match scoped.next {
                Some(d) => d,
                None => {
                    return err(
                        ErrorKind::Internal,
                        "for declaration does not fall through",
                        decl.span,
                    )
                }
            };
            check_expr(cond, &inner)?;
            check_stmt(step, &inner)?;
            check_block(body, &inner)?;
            Ok(FlowSet::next(defs.clone()))
        }
    }
}

fn check_expr(e: &Expr, defs: &Defs) -> Result<()> {
    match &e.kind {
        ExprKind::Variable(name) => {
            if defs.contains(name) {
                Ok(())
            } else {
                err(
                    ErrorKind::DefiniteAssignment,
                    format!("variable {} is not definitely assigned", name),
                    e.span,
                )
            }
        }
        ExprKind::Constant(_) => Ok(()),
        ExprKind::Binary { lhs, rhs, .. } => {
            check_expr(lhs, defs)?;
            check_expr(rhs, defs)
        }
        ExprKind::Unary { operand, .. } => check_expr(operand, defs),
        ExprKind::IndexOf { source, index } => {
            check_expr(source, defs)?;
            check_expr(index, defs)
        }
        ExprKind::RecordAccess { source, .. } => check_expr(source, defs),
        ExprKind::RecordConstructor(fields) => {
            for (_, value) in fields {
                check_expr(value, defs)?;
            }
            Ok(())
        }
        ExprKind::ArrayInitialiser(elements) => {
            for el in elements {
                check_expr(el, defs)?;
            }
            Ok(())
        }
        ExprKind::ArrayGenerator { value, size } => {
            check_expr(value, defs)?;
            check_expr(size, defs)
        }
        ExprKind::Invoke { args, .. } => {
            for a in args {
                check_expr(a, defs)?;
            }
            Ok(())
        }
    }
}
