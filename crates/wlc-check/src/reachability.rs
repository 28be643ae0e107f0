//! Unreachable-code analysis.
//!
//! Classifies the local control flow of every statement and rejects
//! statements that can never execute. Every method with a non-void return
//! type must terminate with returning control flow on all paths.

use wlc_syntax::ast::*;
use wlc_syntax::error::{err, ErrorKind, Result};

/// How control leaves a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Falls through to the next statement.
    Next,
    /// Definitely terminates by `return` or `continue`; never falls
    /// through here.
    Return,
    /// Definitely transfers to the enclosing loop's exit.
    Break,
    /// May fall through or break.
    BreakNext,
}

/// Join of two alternative outcomes, as at an `if`/`else` merge.
fn join(a: Outcome, b: Outcome) -> Outcome {
    use Outcome::*;
    match (a, b) {
        (BreakNext, _) | (_, BreakNext) => BreakNext,
        (Next, Break) | (Break, Next) => BreakNext,
        (Next, _) | (_, Next) => Next,
        (Break, _) | (_, Break) => Break,
        (Return, Return) => Return,
    }
}

/// Check every method of the file.
pub fn check(file: &SourceFile) -> Result<()> {
    for decl in &file.decls {
        if let Decl::Method(m) = decl {
            let outcome = check_block(&m.body)?;
            if matches!(outcome, Outcome::Next | Outcome::BreakNext)
                && !returns_void(file, &m.ret)
            {
                return err(ErrorKind::MissingReturn, "missing return statement", m.span);
            }
        }
    }
    Ok(())
}

fn returns_void(file: &SourceFile, ret: &Type) -> bool {
    match &ret.kind {
        TypeKind::Void => true,
        TypeKind::Named(name) => match file.type_decl(name) {
            Some(decl) => returns_void(file, &decl.ty),
            None => false,
        },
        _ => false,
    }
}

/// A statement is reachable only if its predecessor may fall through.
/// The block's own outcome accumulates the possibility of an earlier
/// break.
fn check_block(stmts: &[Stmt]) -> Result<Outcome> {
    let mut acc = Outcome::Next;
    for s in stmts {
        if !matches!(acc, Outcome::Next | Outcome::BreakNext) {
            return err(ErrorKind::UnreachableCode, "unreachable code", s.span);
        }
        let o = check_stmt(s)?;
        acc = if acc == Outcome::BreakNext {
            join(o, Outcome::Break)
        } else {
            o
        };
    }
    Ok(acc)
}

fn check_stmt(stmt: &Stmt) -> Result<Outcome> {
    match &stmt.kind {
        StmtKind::Assert(_)
        | StmtKind::Assign { .. }
        | StmtKind::VariableDeclaration { .. }
        | StmtKind::Print(_)
        | StmtKind::Invoke(_) => Ok(Outcome::Next),
        StmtKind::Return(_) | StmtKind::Continue => Ok(Outcome::Return),
        StmtKind::Break => Ok(Outcome::Break),
        StmtKind::IfElse {
            then_branch,
            else_branch,
            ..
        } => {
            let t = check_block(then_branch)?;
            let f = check_block(else_branch)?;
            Ok(join(t, f))
        }
        // a loop body may not run at all, so the loop falls through; the
        // body is still checked for internal errors
        StmtKind::While { body, .. } => {
            check_block(body)?;
            Ok(Outcome::Next)
        }
        StmtKind::For { body, .. } => {
            check_block(body)?;
            Ok(Outcome::Next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlc_syntax::span::Span;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, Span::synthetic())
    }

    fn print_stmt() -> Stmt {
        stmt(StmtKind::Print(Expr::new(
            ExprKind::Constant(Const::Int(0)),
            Span::synthetic(),
        )))
    }

    fn return_stmt() -> Stmt {
        stmt(StmtKind::Return(None))
    }

    #[test]
    fn join_lattice() {
        use Outcome::*;
        assert_eq!(join(Next, Return), Next);
        assert_eq!(join(Break, Return), Break);
        assert_eq!(join(Next, Break), BreakNext);
        assert_eq!(join(BreakNext, Return), BreakNext);
        assert_eq!(join(Return, Return), Return);
    }

    #[test]
    fn statement_after_return_is_unreachable() {
        let d = check_block(&[return_stmt(), print_stmt()]).unwrap_err();
        assert_eq!(d.kind, ErrorKind::UnreachableCode);
    }

    #[test]
    fn statement_after_break_is_unreachable() {
        let d = check_block(&[stmt(StmtKind::Break), print_stmt()]).unwrap_err();
        assert_eq!(d.kind, ErrorKind::UnreachableCode);
    }

    #[test]
    fn conditional_break_still_falls_through() {
        // if (c) { break; } else {} ; print — reachable
        let cond = Expr::new(ExprKind::Constant(Const::Bool(true)), Span::synthetic());
        let iff = stmt(StmtKind::IfElse {
            cond,
            then_branch: vec![stmt(StmtKind::Break)],
            else_branch: vec![],
        });
        let out = check_block(&[iff, print_stmt()]).unwrap();
        assert_eq!(out, Outcome::BreakNext);
    }

    #[test]
    fn both_branches_returning_terminates_block() {
        let cond = Expr::new(ExprKind::Constant(Const::Bool(true)), Span::synthetic());
        let iff = stmt(StmtKind::IfElse {
            cond,
            then_branch: vec![return_stmt()],
            else_branch: vec![return_stmt()],
        });
        assert_eq!(check_block(&[iff]).unwrap(), Outcome::Return);
    }

    #[test]
    fn loops_fall_through() {
        let cond = Expr::new(ExprKind::Constant(Const::Bool(true)), Span::synthetic());
        let w = stmt(StmtKind::While {
            cond,
            body: vec![return_stmt()],
        });
        assert_eq!(check_block(&[w, print_stmt()]).unwrap(), Outcome::Next);
    }
}
