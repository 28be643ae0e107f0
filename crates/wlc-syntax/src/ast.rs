//! AST (abstract syntax tree) types for the While language.
//!
//! Nodes are produced by the parser and carry their source [`Span`];
//! expressions additionally carry the type attached by the type checker.
//! The `Display` impls re-print a tree as valid While source (composite
//! expressions fully parenthesised), so parse → print → parse is stable.

use std::fmt;

use crate::span::Span;

/// A type as written in the source program (a.k.a. a syntactic type).
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Only usable as a method return; also the element type of `[]`.
    Void,
    Bool,
    Int,
    Char,
    Str,
    Array(Box<Type>),
    /// Ordered, non-empty field list. Field order is significant for
    /// subtyping.
    Record(Vec<Field>),
    /// Reference to an earlier `type` declaration.
    Named(String),
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: Type,
    pub name: String,
}

impl Type {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A type constructed during analysis, with no source location.
    pub fn synthetic(kind: TypeKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    /// `|e|` on arrays and strings.
    LengthOf,
}

/// Literal constants, including `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Null,
    Bool(bool),
    Int(i32),
    Char(char),
    Str(String),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Attached by the type checker; `None` until then.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Variable(String),
    Constant(Const),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    IndexOf {
        source: Box<Expr>,
        index: Box<Expr>,
    },
    RecordAccess {
        source: Box<Expr>,
        field: String,
    },
    /// Ordered, non-empty `(field, value)` list without duplicates.
    RecordConstructor(Vec<(String, Expr)>),
    ArrayInitialiser(Vec<Expr>),
    /// `[value; size]`
    ArrayGenerator {
        value: Box<Expr>,
        size: Box<Expr>,
    },
    Invoke {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// Whether this expression is permitted as an assignment target.
    pub fn is_lval(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Variable(_) | ExprKind::IndexOf { .. } | ExprKind::RecordAccess { .. }
        )
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assert(Expr),
    Assign {
        lhs: Expr,
        rhs: Expr,
    },
    VariableDeclaration {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },
    Print(Expr),
    Return(Option<Expr>),
    IfElse {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// The declaration and step are themselves statements
    /// (`VariableDeclaration` and a simple statement respectively).
    For {
        decl: Box<Stmt>,
        cond: Expr,
        step: Box<Stmt>,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    /// A method invocation in statement position.
    Invoke(Expr),
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: Type,
    pub name: String,
    pub span: Span,
}

/// A `type Name is Type` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// A method declaration with its body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub ret: Type,
    pub params: Vec<Parameter>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Type(TypeDecl),
    Method(MethodDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Type(t) => &t.name,
            Decl::Method(m) => &m.name,
        }
    }
}

/// A parsed source file: an ordered list of declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub filename: String,
    pub decls: Vec<Decl>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, decls: Vec<Decl>) -> Self {
        Self {
            filename: filename.into(),
            decls,
        }
    }

    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.iter().find_map(|d| match d {
            Decl::Type(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.decls.iter().find_map(|d| match d {
            Decl::Method(m) if m.name == name => Some(m),
            _ => None,
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Void => f.write_str("void"),
            TypeKind::Bool => f.write_str("bool"),
            TypeKind::Int => f.write_str("int"),
            TypeKind::Char => f.write_str("char"),
            TypeKind::Str => f.write_str("string"),
            TypeKind::Array(element) => write!(f, "{}[]", element),
            TypeKind::Record(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{} {}", field.ty, field.name)?;
                }
                f.write_str("}")
            }
            TypeKind::Named(name) => f.write_str(name),
        }
    }
}

fn escape_char(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\u{0008}' => out.push_str("\\b"),
        '\u{000C}' => out.push_str("\\f"),
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        other => out.push(other),
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Null => f.write_str("null"),
            Const::Bool(b) => write!(f, "{}", b),
            Const::Int(n) => write!(f, "{}", n),
            Const::Char(c) => match c {
                '\n' => f.write_str("'\\n'"),
                '\t' => f.write_str("'\\t'"),
                other => write!(f, "'{}'", other),
            },
            Const::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                for c in s.chars() {
                    escape_char(c, &mut out);
                }
                write!(f, "\"{}\"", out)
            }
        }
    }
}

/// Print `e`, parenthesised unless it is already an atom.
fn fmt_operand(e: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match e.kind {
        ExprKind::Variable(_) | ExprKind::Constant(_) => write!(f, "{}", e),
        _ => write!(f, "({})", e),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Constant(c) => write!(f, "{}", c),
            ExprKind::Binary { op, lhs, rhs } => {
                f.write_str("(")?;
                fmt_operand(lhs, f)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(rhs, f)?;
                f.write_str(")")
            }
            ExprKind::Unary { op, operand } => match op {
                UnOp::Neg => {
                    f.write_str("-")?;
                    fmt_operand(operand, f)
                }
                UnOp::Not => {
                    f.write_str("!")?;
                    fmt_operand(operand, f)
                }
                UnOp::LengthOf => {
                    f.write_str("|")?;
                    fmt_operand(operand, f)?;
                    f.write_str("|")
                }
            },
            ExprKind::IndexOf { source, index } => {
                fmt_operand(source, f)?;
                write!(f, "[{}]", index)
            }
            ExprKind::RecordAccess { source, field } => {
                fmt_operand(source, f)?;
                write!(f, ".{}", field)
            }
            ExprKind::RecordConstructor(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
            ExprKind::ArrayInitialiser(elements) => {
                f.write_str("[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
            ExprKind::ArrayGenerator { value, size } => write!(f, "[{}; {}]", value, size),
            ExprKind::Invoke { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Stmt {
    /// Print the statement without indentation or a trailing semicolon.
    /// Only meaningful for the simple kinds that can appear in a `for`
    /// header.
    fn fmt_simple(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Assert(e) => write!(f, "assert {}", e),
            StmtKind::Assign { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            StmtKind::VariableDeclaration { ty, name, init } => {
                write!(f, "{} {}", ty, name)?;
                if let Some(e) = init {
                    write!(f, " = {}", e)?;
                }
                Ok(())
            }
            StmtKind::Print(e) => write!(f, "print {}", e),
            StmtKind::Return(Some(e)) => write!(f, "return {}", e),
            StmtKind::Return(None) => f.write_str("return"),
            StmtKind::Break => f.write_str("break"),
            StmtKind::Continue => f.write_str("continue"),
            StmtKind::Invoke(e) => write!(f, "{}", e),
            _ => Err(fmt::Error),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "    ".repeat(indent);
        match &self.kind {
            StmtKind::IfElse {
                cond,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "{}if ({}) {{", pad, cond)?;
                fmt_block(f, then_branch, indent + 1)?;
                if else_branch.is_empty() {
                    write!(f, "{}}}", pad)
                } else {
                    writeln!(f, "{}}} else {{", pad)?;
                    fmt_block(f, else_branch, indent + 1)?;
                    write!(f, "{}}}", pad)
                }
            }
            StmtKind::While { cond, body } => {
                writeln!(f, "{}while ({}) {{", pad, cond)?;
                fmt_block(f, body, indent + 1)?;
                write!(f, "{}}}", pad)
            }
            StmtKind::For {
                decl,
                cond,
                step,
                body,
            } => {
                write!(f, "{}for (", pad)?;
                decl.fmt_simple(f)?;
                write!(f, "; {}; ", cond)?;
                step.fmt_simple(f)?;
                writeln!(f, ") {{")?;
                fmt_block(f, body, indent + 1)?;
                write!(f, "{}}}", pad)
            }
            _ => {
                f.write_str(&pad)?;
                self.fmt_simple(f)?;
                f.write_str(";")
            }
        }
    }
}

fn fmt_block(f: &mut fmt::Formatter<'_>, stmts: &[Stmt], indent: usize) -> fmt::Result {
    for s in stmts {
        s.fmt_indented(f, indent)?;
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decl::Type(t) => write!(f, "type {} is {}", t.name, t.ty),
            Decl::Method(m) => {
                write!(f, "{} {}(", m.ret, m.name)?;
                for (i, p) in m.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", p.ty, p.name)?;
                }
                writeln!(f, ") {{")?;
                fmt_block(f, &m.body, 1)?;
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.decls.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::synthetic())
    }

    #[test]
    fn types_print_as_source() {
        let int = Type::synthetic(TypeKind::Int);
        let arr = Type::synthetic(TypeKind::Array(Box::new(int.clone())));
        assert_eq!(arr.to_string(), "int[]");

        let rec = Type::synthetic(TypeKind::Record(vec![
            Field {
                ty: int.clone(),
                name: "x".into(),
            },
            Field {
                ty: Type::synthetic(TypeKind::Bool),
                name: "flag".into(),
            },
        ]));
        assert_eq!(rec.to_string(), "{int x,bool flag}");
    }

    #[test]
    fn expressions_parenthesise_composites() {
        let add = e(ExprKind::Binary {
            op: BinOp::Add,
            lhs: Box::new(e(ExprKind::Constant(Const::Int(1)))),
            rhs: Box::new(e(ExprKind::Binary {
                op: BinOp::Mul,
                lhs: Box::new(e(ExprKind::Constant(Const::Int(2)))),
                rhs: Box::new(e(ExprKind::Variable("x".into()))),
            })),
        });
        assert_eq!(add.to_string(), "(1 + (2 * x))");
    }

    #[test]
    fn string_constants_escape() {
        let s = e(ExprKind::Constant(Const::Str("a\"b\n".into())));
        assert_eq!(s.to_string(), "\"a\\\"b\\n\"");
    }

    #[test]
    fn lval_classification() {
        assert!(e(ExprKind::Variable("x".into())).is_lval());
        assert!(e(ExprKind::RecordAccess {
            source: Box::new(e(ExprKind::Variable("r".into()))),
            field: "f".into(),
        })
        .is_lval());
        assert!(!e(ExprKind::Constant(Const::Int(0))).is_lval());
    }

    #[test]
    fn statements_print_with_semicolons() {
        let s = Stmt::new(
            StmtKind::Print(e(ExprKind::Variable("x".into()))),
            Span::synthetic(),
        );
        assert_eq!(s.to_string(), "print x;");
    }
}
