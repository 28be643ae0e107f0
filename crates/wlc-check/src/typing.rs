//! The type checker.
//!
//! Two phases over a source file: first register every type alias and
//! method signature so forward references resolve, then re-visit each
//! method body. Checking attaches the computed type to every expression
//! node for downstream consumers.
//!
//! Subtyping is structural and computed on demand: `void` is the bottom
//! type, arrays are covariant (sound because the interpreter copies on
//! every assignment), and records subtype by field-order-preserving prefix
//! with depth. Named types unfold through the alias table one step at a
//! time.

use std::collections::HashMap;

use wlc_syntax::ast::*;
use wlc_syntax::error::{err, ErrorKind, Result};
use wlc_syntax::span::Span;

#[derive(Clone)]
struct MethodSig {
    params: Vec<Type>,
    ret: Type,
}

pub struct TypeChecker {
    aliases: HashMap<String, Type>,
    methods: HashMap<String, MethodSig>,
    /// Innermost scope last; one frame per block.
    scopes: Vec<HashMap<String, Type>>,
    /// Return type of the method currently being checked.
    ret: Option<Type>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
            methods: HashMap::new(),
            scopes: Vec::new(),
            ret: None,
        }
    }

    /// Check a whole source file, attaching a type to every expression.
    pub fn check_file(&mut self, file: &mut SourceFile) -> Result<()> {
        // phase 1: register declarations so forward references resolve
        for decl in &file.decls {
            match decl {
                Decl::Type(t) => {
                    self.aliases.insert(t.name.clone(), t.ty.clone());
                }
                Decl::Method(m) => {
                    self.methods.insert(
                        m.name.clone(),
                        MethodSig {
                            params: m.params.iter().map(|p| p.ty.clone()).collect(),
                            ret: m.ret.clone(),
                        },
                    );
                }
            }
        }

        // phase 2: validate declared types and check method bodies
        for decl in &mut file.decls {
            match decl {
                Decl::Type(t) => {
                    let body = t.ty.clone();
                    self.check_alias_body(&body, body.span)?;
                }
                Decl::Method(m) => self.check_method(m)?,
            }
        }
        Ok(())
    }

    fn check_method(&mut self, m: &mut MethodDecl) -> Result<()> {
        self.check_return_type(&m.ret)?;
        self.ret = Some(m.ret.clone());
        self.scopes.clear();
        self.push_scope();
        for p in &m.params {
            self.check_value_type(&p.ty, p.span)?;
            self.declare(&p.name, p.ty.clone());
        }
        for s in &mut m.body {
            self.check_stmt(s)?;
        }
        self.pop_scope();
        Ok(())
    }

    // ---- statements ----

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Assert(e) => {
                let t = self.check_expr(e)?;
                self.ensure_subtype(&t, &Type::synthetic(TypeKind::Bool), e.span)
            }
            StmtKind::Assign { lhs, rhs } => {
                let target = self.check_lval(lhs)?;
                let value = self.check_expr(rhs)?;
                self.ensure_subtype(&value, &target, rhs.span)
            }
            StmtKind::VariableDeclaration { ty, name, init } => {
                let span = stmt.span;
                self.check_value_type(ty, span)?;
                if let Some(e) = init {
                    let t = self.check_expr(e)?;
                    self.ensure_subtype(&t, ty, e.span)?;
                }
                self.declare(name, ty.clone());
                Ok(())
            }
            StmtKind::Print(e) => {
                self.check_expr(e)?;
                Ok(())
            }
            StmtKind::Return(opt) => {
                let ret = match self.ret.clone() {
                    Some(t) => t,
                    None => {
                        return err(ErrorKind::Internal, "return outside method", stmt.span);
                    }
                };
                match opt {
                    Some(e) => {
                        let t = self.check_expr(e)?;
                        self.ensure_subtype(&t, &ret, e.span)
                    }
                    None => {
                        if matches!(self.resolve(&ret)?.kind, TypeKind::Void) {
                            Ok(())
                        } else {
                            err(
                                ErrorKind::Type,
                                format!("expected {}, found no return value", ret),
                                stmt.span,
                            )
                        }
                    }
                }
            }
            StmtKind::IfElse {
                cond,
                then_branch,
                else_branch,
            } => {
                let t = self.check_expr(cond)?;
                self.ensure_subtype(&t, &Type::synthetic(TypeKind::Bool), cond.span)?;
                self.check_scoped_block(then_branch)?;
                self.check_scoped_block(else_branch)
            }
            StmtKind::While { cond, body } => {
                let t = self.check_expr(cond)?;
                self.ensure_subtype(&t, &Type::synthetic(TypeKind::Bool), cond.span)?;
                self.check_scoped_block(body)
            }
            StmtKind::For {
                decl,
                cond,
                step,
                body,
            } => {
                self.push_scope();
                self.check_stmt(decl)?;
                let t = self.check_expr(cond)?;
                self.ensure_subtype(&t, &Type::synthetic(TypeKind::Bool), cond.span)?;
                self.check_stmt(step)?;
                self.check_scoped_block(body)?;
                self.pop_scope();
                Ok(())
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::Invoke(e) => {
                self.check_invoke(e, true)?;
                Ok(())
            }
        }
    }

    fn check_scoped_block(&mut self, stmts: &mut [Stmt]) -> Result<()> {
        self.push_scope();
        for s in stmts.iter_mut() {
            self.check_stmt(s)?;
        }
        self.pop_scope();
        Ok(())
    }

    // ---- expressions ----

    fn check_expr(&mut self, e: &mut Expr) -> Result<Type> {
        let span = e.span;
        let t = match &mut e.kind {
            ExprKind::Variable(name) => match self.lookup(name) {
                Some(t) => t,
                None => {
                    return err(
                        ErrorKind::Internal,
                        format!("unknown variable {}", name),
                        span,
                    )
                }
            },
            ExprKind::Constant(c) => Type::synthetic(match c {
                // `null` is given the bottom type, making it assignable and
                // comparable everywhere
                Const::Null => TypeKind::Void,
                Const::Bool(_) => TypeKind::Bool,
                Const::Int(_) => TypeKind::Int,
                Const::Char(_) => TypeKind::Char,
                Const::Str(_) => TypeKind::Str,
            }),
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let tl = self.check_expr(lhs)?;
                let lspan = lhs.span;
                let tr = self.check_expr(rhs)?;
                let rspan = rhs.span;
                self.check_binary(op, &tl, &tr, lspan, rspan)?
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let t = self.check_expr(operand)?;
                let ospan = operand.span;
                match op {
                    UnOp::Neg => {
                        self.ensure_subtype(&t, &Type::synthetic(TypeKind::Int), ospan)?;
                        Type::synthetic(TypeKind::Int)
                    }
                    UnOp::Not => {
                        self.ensure_subtype(&t, &Type::synthetic(TypeKind::Bool), ospan)?;
                        Type::synthetic(TypeKind::Bool)
                    }
                    UnOp::LengthOf => match self.resolve(&t)?.kind {
                        TypeKind::Array(_) | TypeKind::Str => Type::synthetic(TypeKind::Int),
                        _ => {
                            return err(
                                ErrorKind::Type,
                                format!("expected an array or string, found {}", t),
                                ospan,
                            )
                        }
                    },
                }
            }
            ExprKind::IndexOf { source, index } => {
                let ts = self.check_expr(source)?;
                let sspan = source.span;
                let ti = self.check_expr(index)?;
                let ispan = index.span;
                self.ensure_subtype(&ti, &Type::synthetic(TypeKind::Int), ispan)?;
                match self.resolve(&ts)?.kind {
                    TypeKind::Array(element) => *element,
                    TypeKind::Str => Type::synthetic(TypeKind::Char),
                    _ => {
                        return err(
                            ErrorKind::Type,
                            format!("expected an array or string, found {}", ts),
                            sspan,
                        )
                    }
                }
            }
            ExprKind::RecordAccess { source, field } => {
                let field = field.clone();
                let ts = self.check_expr(source)?;
                let sspan = source.span;
                match self.resolve(&ts)?.kind {
                    TypeKind::Record(fields) => match fields.into_iter().find(|f| f.name == field)
                    {
                        Some(f) => f.ty,
                        None => {
                            return err(
                                ErrorKind::Type,
                                format!("record has no field {}", field),
                                span,
                            )
                        }
                    },
                    _ => {
                        return err(
                            ErrorKind::Type,
                            format!("expected a record, found {}", ts),
                            sspan,
                        )
                    }
                }
            }
            ExprKind::RecordConstructor(fields) => {
                let mut tys = Vec::with_capacity(fields.len());
                for (name, value) in fields.iter_mut() {
                    let t = self.check_expr(value)?;
                    tys.push(Field {
                        ty: t,
                        name: name.clone(),
                    });
                }
                Type::synthetic(TypeKind::Record(tys))
            }
            ExprKind::ArrayInitialiser(elements) => {
                let mut acc = Type::synthetic(TypeKind::Void);
                for el in elements.iter_mut() {
                    let t = self.check_expr(el)?;
                    let espan = el.span;
                    if self.is_subtype(&acc, &t)? {
                        acc = t;
                    } else if !self.is_subtype(&t, &acc)? {
                        return err(
                            ErrorKind::Type,
                            format!("incompatible array element: expected {}, found {}", acc, t),
                            espan,
                        );
                    }
                }
                Type::synthetic(TypeKind::Array(Box::new(acc)))
            }
            ExprKind::ArrayGenerator { value, size } => {
                let tv = self.check_expr(value)?;
                let ts = self.check_expr(size)?;
                let sspan = size.span;
                self.ensure_subtype(&ts, &Type::synthetic(TypeKind::Int), sspan)?;
                Type::synthetic(TypeKind::Array(Box::new(tv)))
            }
            ExprKind::Invoke { .. } => return self.check_invoke(e, false),
        };
        e.ty = Some(t.clone());
        Ok(t)
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        tl: &Type,
        tr: &Type,
        lspan: Span,
        rspan: Span,
    ) -> Result<Type> {
        let int = Type::synthetic(TypeKind::Int);
        let boolean = Type::synthetic(TypeKind::Bool);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                self.ensure_subtype(tl, &int, lspan)?;
                self.ensure_subtype(tr, &int, rspan)?;
                Ok(int)
            }
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
                self.ensure_subtype(tl, &int, lspan)?;
                self.ensure_subtype(tr, &int, rspan)?;
                Ok(boolean)
            }
            BinOp::Eq | BinOp::NotEq => Ok(boolean),
            BinOp::And | BinOp::Or => {
                self.ensure_subtype(tl, &boolean, lspan)?;
                self.ensure_subtype(tr, &boolean, rspan)?;
                Ok(boolean)
            }
        }
    }

    /// Check an assignment target and return its declared type. Unlike
    /// reads, an indexed target must be an array: string elements cannot
    /// be assigned.
    fn check_lval(&mut self, e: &mut Expr) -> Result<Type> {
        let span = e.span;
        let t = match &mut e.kind {
            ExprKind::Variable(name) => match self.lookup(name) {
                Some(t) => t,
                None => {
                    return err(
                        ErrorKind::Internal,
                        format!("unknown variable {}", name),
                        span,
                    )
                }
            },
            ExprKind::IndexOf { source, index } => {
                let ts = self.check_lval(source)?;
                let sspan = source.span;
                let ti = self.check_expr(index)?;
                let ispan = index.span;
                self.ensure_subtype(&ti, &Type::synthetic(TypeKind::Int), ispan)?;
                match self.resolve(&ts)?.kind {
                    TypeKind::Array(element) => *element,
                    _ => {
                        return err(
                            ErrorKind::Type,
                            format!("expected an array, found {}", ts),
                            sspan,
                        )
                    }
                }
            }
            ExprKind::RecordAccess { source, field } => {
                let field = field.clone();
                let ts = self.check_lval(source)?;
                let sspan = source.span;
                match self.resolve(&ts)?.kind {
                    TypeKind::Record(fields) => match fields.into_iter().find(|f| f.name == field)
                    {
                        Some(f) => f.ty,
                        None => {
                            return err(
                                ErrorKind::Type,
                                format!("record has no field {}", field),
                                span,
                            )
                        }
                    },
                    _ => {
                        return err(
                            ErrorKind::Type,
                            format!("expected a record, found {}", ts),
                            sspan,
                        )
                    }
                }
            }
            _ => {
                return err(ErrorKind::Internal, "invalid assignment target", span);
            }
        };
        e.ty = Some(t.clone());
        Ok(t)
    }

    /// Check an invocation used as an expression (`as_stmt == false`) or a
    /// statement. A void-returning method is only legal in statement
    /// position.
    fn check_invoke(&mut self, e: &mut Expr, as_stmt: bool) -> Result<Type> {
        let span = e.span;
        let ExprKind::Invoke { name, args } = &mut e.kind else {
            return err(ErrorKind::Internal, "expected an invocation", span);
        };
        let sig = match self.methods.get(name.as_str()) {
            Some(sig) => sig.clone(),
            None => {
                return err(
                    ErrorKind::Type,
                    format!("unknown method {}()", name),
                    span,
                )
            }
        };
        if sig.params.len() != args.len() {
            return err(
                ErrorKind::Type,
                format!(
                    "incorrect number of arguments: expected {}, found {}",
                    sig.params.len(),
                    args.len()
                ),
                span,
            );
        }
        let name = name.clone();
        for (arg, param) in args.iter_mut().zip(sig.params.iter()) {
            let t = self.check_expr(arg)?;
            let aspan = arg.span;
            self.ensure_subtype(&t, param, aspan)?;
        }
        if !as_stmt && matches!(self.resolve(&sig.ret)?.kind, TypeKind::Void) {
            return err(
                ErrorKind::Type,
                format!("void method {}() used in an expression", name),
                span,
            );
        }
        e.ty = Some(sig.ret.clone());
        Ok(sig.ret)
    }

    // ---- the subtype relation ----

    /// Compute `sub <= sup`. Reflexive and transitive by construction.
    pub fn is_subtype(&self, sub: &Type, sup: &Type) -> Result<bool> {
        match (&sub.kind, &sup.kind) {
            (TypeKind::Named(n), _) => {
                let body = self.unfold(n, sub.span)?.clone();
                self.is_subtype(&body, sup)
            }
            (_, TypeKind::Named(n)) => {
                let body = self.unfold(n, sup.span)?.clone();
                self.is_subtype(sub, &body)
            }
            (TypeKind::Void, _) => Ok(true),
            (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Int, TypeKind::Int)
            | (TypeKind::Char, TypeKind::Char)
            | (TypeKind::Str, TypeKind::Str) => Ok(true),
            (TypeKind::Array(a), TypeKind::Array(b)) => self.is_subtype(a, b),
            (TypeKind::Record(fs), TypeKind::Record(gs)) => {
                if fs.len() < gs.len() {
                    return Ok(false);
                }
                for (f, g) in fs.iter().zip(gs.iter()) {
                    if f.name != g.name || !self.is_subtype(&f.ty, &g.ty)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn ensure_subtype(&self, found: &Type, expected: &Type, span: Span) -> Result<()> {
        if self.is_subtype(found, expected)? {
            Ok(())
        } else {
            err(
                ErrorKind::Type,
                format!("expected {}, found {}", expected, found),
                span,
            )
        }
    }

    fn unfold(&self, name: &str, span: Span) -> Result<&Type> {
        match self.aliases.get(name) {
            Some(t) => Ok(t),
            None => err(ErrorKind::Type, format!("unknown type {}", name), span),
        }
    }

    /// Resolve a type to its non-named form, unfolding aliases.
    fn resolve(&self, ty: &Type) -> Result<Type> {
        let mut t = ty.clone();
        while let TypeKind::Named(name) = &t.kind {
            t = self.unfold(name, t.span)?.clone();
        }
        Ok(t)
    }

    // ---- declared-type validation ----

    /// A type usable for a variable, parameter, record field or array
    /// element: `void` may not occur anywhere within it.
    fn check_value_type(&self, ty: &Type, span: Span) -> Result<()> {
        match &self.resolve(ty)?.kind {
            TypeKind::Void => err(
                ErrorKind::Type,
                "void type not permitted here",
                span,
            ),
            TypeKind::Array(element) => self.check_value_type(element, span),
            TypeKind::Record(fields) => {
                for f in fields {
                    self.check_value_type(&f.ty, span)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A method return type: `void` is fine at the top, but not inside an
    /// array or record.
    fn check_return_type(&self, ty: &Type) -> Result<()> {
        match &self.resolve(ty)?.kind {
            TypeKind::Void => Ok(()),
            _ => self.check_value_type(ty, ty.span),
        }
    }

    /// A type-alias body: like a return type, a bare `void` alias is
    /// permitted, but compound positions must not contain `void`.
    fn check_alias_body(&self, ty: &Type, span: Span) -> Result<()> {
        match &ty.kind {
            TypeKind::Void => Ok(()),
            TypeKind::Array(element) => self.check_value_type(element, span),
            TypeKind::Record(fields) => {
                for f in fields {
                    self.check_value_type(&f.ty, span)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ---- environment ----

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }
}
