//! The tree-walking interpreter.
//!
//! Executes an elaborated AST directly, one frame per method invocation.
//! Value semantics: evaluation always produces an owned value, and
//! assignments, declarations and argument passing install fresh copies, so
//! aliasing between distinct names or frames is impossible. Element and
//! field assignment resolve the target to a mutable slot inside the live
//! frame value and overwrite it in place.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

use crate::flow::Flow;
use crate::value::Value;
use wlc_syntax::ast::*;
use wlc_syntax::error::{err, ErrorKind, Result};
use wlc_syntax::span::Span;

/// Per-invocation mapping from variable names to their current value. A
/// declared-but-unassigned variable has no entry; the definite-assignment
/// pass guarantees it is never read.
type Frame = HashMap<String, Value>;

pub struct Interpreter<'a, W> {
    methods: HashMap<&'a str, &'a MethodDecl>,
    out: W,
}

impl<'a> Interpreter<'a, io::Stdout> {
    pub fn new(file: &'a SourceFile) -> Self {
        Self::with_output(file, io::stdout())
    }
}

impl<'a, W: Write> Interpreter<'a, W> {
    pub fn with_output(file: &'a SourceFile, out: W) -> Self {
        let mut methods = HashMap::new();
        for decl in &file.decls {
            if let Decl::Method(m) = decl {
                methods.insert(m.name.as_str(), m);
            }
        }
        Self { methods, out }
    }

    /// Recover the output sink, e.g. a buffer captured by tests.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Execute `main()`. A missing `main` is reported on the output and is
    /// not an error.
    pub fn run(&mut self) -> Result<()> {
        match self.methods.get("main").copied() {
            Some(main) => {
                self.exec_method(main, Vec::new(), main.span)?;
                Ok(())
            }
            None => {
                self.write_line("Cannot find a main() function", Span::synthetic())
            }
        }
    }

    fn exec_method(&mut self, m: &'a MethodDecl, args: Vec<Value>, at: Span) -> Result<Value> {
        if m.params.len() != args.len() {
            return err(
                ErrorKind::Runtime,
                format!(
                    "invalid number of arguments supplied to {}()",
                    m.name
                ),
                at,
            );
        }
        let mut frame = Frame::new();
        for (p, v) in m.params.iter().zip(args) {
            frame.insert(p.name.clone(), v);
        }
        match self.exec_block(&m.body, &mut frame)? {
            Flow::Return(v) => Ok(v),
            Flow::Next => Ok(Value::Null),
            Flow::Break | Flow::Continue => err(
                ErrorKind::Internal,
                "loop transfer escaped method body",
                m.span,
            ),
        }
    }

    fn exec_block(&mut self, stmts: &'a [Stmt], frame: &mut Frame) -> Result<Flow> {
        for s in stmts {
            match self.exec_stmt(s, frame)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt, frame: &mut Frame) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Assert(e) => {
                if !self.eval_bool(e, frame)? {
                    return err(ErrorKind::Runtime, "assertion failure", stmt.span);
                }
                Ok(Flow::Next)
            }
            StmtKind::Assign { lhs, rhs } => {
                let value = self.eval_expr(rhs, frame)?;
                self.assign(lhs, value, frame)?;
                Ok(Flow::Next)
            }
            StmtKind::VariableDeclaration { name, init, .. } => {
                if let Some(e) = init {
                    let value = self.eval_expr(e, frame)?;
                    frame.insert(name.clone(), value);
                }
                Ok(Flow::Next)
            }
            StmtKind::Print(e) => {
                let value = self.eval_expr(e, frame)?;
                self.write_line(&value.to_string(), stmt.span)?;
                Ok(Flow::Next)
            }
            StmtKind::Return(opt) => {
                let value = match opt {
                    Some(e) => self.eval_expr(e, frame)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::IfElse {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(cond, frame)? {
                    self.exec_block(then_branch, frame)
                } else {
                    self.exec_block(else_branch, frame)
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_bool(cond, frame)? {
                    match self.exec_block(body, frame)? {
                        Flow::Next | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::For {
                decl,
                cond,
                step,
                body,
            } => {
                self.exec_stmt(decl, frame)?;
                while self.eval_bool(cond, frame)? {
                    match self.exec_block(body, frame)? {
                        // the step also runs after a `continue`
                        Flow::Next | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    self.exec_stmt(step, frame)?;
                }
                Ok(Flow::Next)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Invoke(e) => {
                self.eval_invoke(e, frame)?;
                Ok(Flow::Next)
            }
        }
    }

    /// Install `value` at the assignment target. A simple variable
    /// overwrites its frame entry; an indexed or field target mutates the
    /// compound value in place through a resolved slot.
    fn assign(&mut self, lhs: &'a Expr, value: Value, frame: &mut Frame) -> Result<()> {
        match &lhs.kind {
            ExprKind::Variable(name) => {
                frame.insert(name.clone(), value);
                Ok(())
            }
            ExprKind::IndexOf { source, index } => {
                let ix = self.eval_int(index, frame)?;
                let span = lhs.span;
                let slot = self.lval_slot(source, frame)?;
                match slot {
                    Value::Array(items) => {
                        if ix < 0 || ix as usize >= items.len() {
                            return err(ErrorKind::Runtime, "index out of bounds", span);
                        }
                        items[ix as usize] = value;
                        Ok(())
                    }
                    Value::Null => err(ErrorKind::Runtime, "cannot index a null value", span),
                    _ => err(ErrorKind::Internal, "expected an array value", span),
                }
            }
            ExprKind::RecordAccess { source, field } => {
                let span = lhs.span;
                let slot = self.lval_slot(source, frame)?;
                match slot {
                    Value::Record(fields) => {
                        fields.insert(field.clone(), value);
                        Ok(())
                    }
                    Value::Null => err(
                        ErrorKind::Runtime,
                        "cannot access a field of a null value",
                        span,
                    ),
                    _ => err(ErrorKind::Internal, "expected a record value", span),
                }
            }
            _ => err(ErrorKind::Internal, "invalid assignment target", lhs.span),
        }
    }

    /// Resolve an lval source expression to a mutable reference into the
    /// live frame value.
    fn lval_slot<'f>(&mut self, e: &'a Expr, frame: &'f mut Frame) -> Result<&'f mut Value> {
        match &e.kind {
            ExprKind::Variable(name) => match frame.get_mut(name) {
                Some(slot) => Ok(slot),
                None => err(
                    ErrorKind::Internal,
                    format!("uninitialised variable {}", name),
                    e.span,
                ),
            },
            ExprKind::IndexOf { source, index } => {
                let ix = self.eval_int(index, frame)?;
                let span = e.span;
                let slot = self.lval_slot(source, frame)?;
                match slot {
                    Value::Array(items) => {
                        if ix < 0 || ix as usize >= items.len() {
                            return err(ErrorKind::Runtime, "index out of bounds", span);
                        }
                        Ok(&mut items[ix as usize])
                    }
                    Value::Null => err(ErrorKind::Runtime, "cannot index a null value", span),
                    _ => err(ErrorKind::Internal, "expected an array value", span),
                }
            }
            ExprKind::RecordAccess { source, field } => {
                let span = e.span;
                let slot = self.lval_slot(source, frame)?;
                match slot {
                    Value::Record(fields) => match fields.get_mut(field.as_str()) {
                        Some(v) => Ok(v),
                        None => err(
                            ErrorKind::Internal,
                            format!("record has no field {}", field),
                            span,
                        ),
                    },
                    Value::Null => err(
                        ErrorKind::Runtime,
                        "cannot access a field of a null value",
                        span,
                    ),
                    _ => err(ErrorKind::Internal, "expected a record value", span),
                }
            }
            _ => err(ErrorKind::Internal, "invalid assignment target", e.span),
        }
    }

    // ---- expressions ----

    fn eval_expr(&mut self, e: &'a Expr, frame: &mut Frame) -> Result<Value> {
        match &e.kind {
            ExprKind::Constant(c) => Ok(match c {
                Const::Null => Value::Null,
                Const::Bool(b) => Value::Bool(*b),
                Const::Int(n) => Value::Int(*n),
                Const::Char(c) => Value::Char(*c),
                Const::Str(s) => Value::Str(s.clone()),
            }),
            ExprKind::Variable(name) => match frame.get(name) {
                Some(v) => Ok(v.clone()),
                None => err(
                    ErrorKind::Internal,
                    format!("uninitialised variable {}", name),
                    e.span,
                ),
            },
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, e.span, frame),
            ExprKind::Unary { op, operand } => {
                let span = e.span;
                match op {
                    UnOp::Not => Ok(Value::Bool(!self.eval_bool(operand, frame)?)),
                    UnOp::Neg => Ok(Value::Int(self.eval_int(operand, frame)?.wrapping_neg())),
                    UnOp::LengthOf => match self.eval_expr(operand, frame)? {
                        Value::Array(items) => Ok(Value::Int(items.len() as i32)),
                        Value::Str(s) => Ok(Value::Int(s.chars().count() as i32)),
                        Value::Null => {
                            err(ErrorKind::Runtime, "cannot take the length of null", span)
                        }
                        _ => err(ErrorKind::Internal, "expected an array or string", span),
                    },
                }
            }
            ExprKind::IndexOf { source, index } => {
                let src = self.eval_expr(source, frame)?;
                let ix = self.eval_int(index, frame)?;
                match src {
                    Value::Array(items) => {
                        if ix < 0 || ix as usize >= items.len() {
                            return err(ErrorKind::Runtime, "index out of bounds", e.span);
                        }
                        Ok(items[ix as usize].clone())
                    }
                    Value::Str(s) => match s.chars().nth(ix.max(0) as usize) {
                        Some(c) if ix >= 0 => Ok(Value::Char(c)),
                        _ => err(ErrorKind::Runtime, "index out of bounds", e.span),
                    },
                    Value::Null => err(ErrorKind::Runtime, "cannot index a null value", e.span),
                    _ => err(ErrorKind::Internal, "expected an array or string", e.span),
                }
            }
            ExprKind::RecordAccess { source, field } => {
                match self.eval_expr(source, frame)? {
                    Value::Record(fields) => match fields.get(field.as_str()) {
                        Some(v) => Ok(v.clone()),
                        None => err(
                            ErrorKind::Internal,
                            format!("record has no field {}", field),
                            e.span,
                        ),
                    },
                    Value::Null => err(
                        ErrorKind::Runtime,
                        "cannot access a field of a null value",
                        e.span,
                    ),
                    _ => err(ErrorKind::Internal, "expected a record value", e.span),
                }
            }
            ExprKind::RecordConstructor(field_exprs) => {
                let mut fields = BTreeMap::new();
                for (name, value) in field_exprs {
                    let v = self.eval_expr(value, frame)?;
                    fields.insert(name.clone(), v);
                }
                Ok(Value::Record(fields))
            }
            ExprKind::ArrayInitialiser(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for el in elements {
                    items.push(self.eval_expr(el, frame)?);
                }
                Ok(Value::Array(items))
            }
            ExprKind::ArrayGenerator { value, size } => {
                let v = self.eval_expr(value, frame)?;
                let n = self.eval_int(size, frame)?;
                Ok(Value::Array(vec![v; n.max(0) as usize]))
            }
            ExprKind::Invoke { .. } => self.eval_invoke(e, frame),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &'a Expr,
        rhs: &'a Expr,
        span: Span,
        frame: &mut Frame,
    ) -> Result<Value> {
        // the logical connectives short-circuit: the right operand is only
        // evaluated when it can still affect the result
        match op {
            BinOp::And => {
                return Ok(Value::Bool(
                    self.eval_bool(lhs, frame)? && self.eval_bool(rhs, frame)?,
                ));
            }
            BinOp::Or => {
                return Ok(Value::Bool(
                    self.eval_bool(lhs, frame)? || self.eval_bool(rhs, frame)?,
                ));
            }
            _ => {}
        }
        match op {
            BinOp::Eq => {
                let l = self.eval_expr(lhs, frame)?;
                let r = self.eval_expr(rhs, frame)?;
                Ok(Value::Bool(l == r))
            }
            BinOp::NotEq => {
                let l = self.eval_expr(lhs, frame)?;
                let r = self.eval_expr(rhs, frame)?;
                Ok(Value::Bool(l != r))
            }
            _ => {
                let l = self.eval_int(lhs, frame)?;
                let r = self.eval_int(rhs, frame)?;
                let v = match op {
                    BinOp::Add => Value::Int(l.wrapping_add(r)),
                    BinOp::Sub => Value::Int(l.wrapping_sub(r)),
                    BinOp::Mul => Value::Int(l.wrapping_mul(r)),
                    BinOp::Div => {
                        if r == 0 {
                            return err(ErrorKind::Runtime, "division by zero", span);
                        }
                        Value::Int(l.wrapping_div(r))
                    }
                    BinOp::Rem => {
                        if r == 0 {
                            return err(ErrorKind::Runtime, "modulo by zero", span);
                        }
                        Value::Int(l.wrapping_rem(r))
                    }
                    BinOp::Lt => Value::Bool(l < r),
                    BinOp::LtEq => Value::Bool(l <= r),
                    BinOp::Gt => Value::Bool(l > r),
                    BinOp::GtEq => Value::Bool(l >= r),
                    BinOp::And | BinOp::Or | BinOp::Eq | BinOp::NotEq => {
                        return err(ErrorKind::Internal, "unexpected operator", span)
                    }
                };
                Ok(v)
            }
        }
    }

    /// Evaluate arguments left to right, then run the callee with a fresh
    /// frame holding copies of the argument values.
    fn eval_invoke(&mut self, e: &'a Expr, frame: &mut Frame) -> Result<Value> {
        let ExprKind::Invoke { name, args } = &e.kind else {
            return err(ErrorKind::Internal, "expected an invocation", e.span);
        };
        let m = match self.methods.get(name.as_str()).copied() {
            Some(m) => m,
            None => {
                return err(
                    ErrorKind::Internal,
                    format!("unknown method {}()", name),
                    e.span,
                )
            }
        };
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expr(a, frame)?);
        }
        self.exec_method(m, values, e.span)
    }

    fn eval_bool(&mut self, e: &'a Expr, frame: &mut Frame) -> Result<bool> {
        match self.eval_expr(e, frame)? {
            Value::Bool(b) => Ok(b),
            other => err(
                ErrorKind::Internal,
                format!("expected a bool, found {}", other),
                e.span,
            ),
        }
    }

    fn eval_int(&mut self, e: &'a Expr, frame: &mut Frame) -> Result<i32> {
        match self.eval_expr(e, frame)? {
            Value::Int(n) => Ok(n),
            other => err(
                ErrorKind::Internal,
                format!("expected an int, found {}", other),
                e.span,
            ),
        }
    }

    fn write_line(&mut self, line: &str, span: Span) -> Result<()> {
        writeln!(self.out, "{}", line)
            .map_err(|e| wlc_syntax::Diagnostic::new(ErrorKind::Runtime, format!("failed to write output: {}", e), span))
    }
}
