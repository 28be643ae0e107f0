//! Recursive-descent parser producing a [`SourceFile`] from a token stream.
//!
//! The parser is predictive with one token of lookahead, plus a bounded
//! multi-token probe (`is_type_ahead`) to tell variable declarations apart
//! from assignments and invocations. Type names must be declared before
//! use; method references are resolved later by the type checker, so
//! forward calls and recursion parse fine. Errors are reported at the first
//! offending token with no recovery.

use std::collections::HashSet;

use wlc_syntax::ast::*;
use wlc_syntax::error::{err, ErrorKind, Result};
use wlc_syntax::span::Span;
use wlc_syntax::token::{Token, TokenKind};

/// Lexical context threaded through statement parsing: the set of names in
/// scope and whether we are inside a loop. Branch scopes are copies of the
/// enclosing scope, so declarations inside a block do not leak out.
#[derive(Clone)]
struct Context {
    vars: HashSet<String>,
    in_loop: bool,
}

impl Context {
    fn new() -> Self {
        Self {
            vars: HashSet::new(),
            in_loop: false,
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.vars.contains(name)
    }

    fn declare(&mut self, name: &str) {
        self.vars.insert(name.to_string());
    }

    /// A branched copy for an `if`/`else` arm or the inner scope of a `for`
    /// header.
    fn branch(&self) -> Context {
        self.clone()
    }

    /// A branched copy marked as being inside a loop body.
    fn loop_scope(&self) -> Context {
        Context {
            vars: self.vars.clone(),
            in_loop: true,
        }
    }
}

pub struct Parser {
    filename: String,
    tokens: Vec<Token>,
    index: usize,
    declared_types: HashSet<String>,
    declared_methods: HashSet<String>,
}

impl Parser {
    pub fn new(filename: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            filename: filename.into(),
            tokens,
            index: 0,
            declared_types: HashSet::new(),
            declared_methods: HashSet::new(),
        }
    }

    /// Parse the whole token stream into a source file.
    pub fn parse_file(&mut self) -> Result<SourceFile> {
        let mut decls = Vec::new();
        while self.index < self.tokens.len() {
            if self.tokens[self.index].kind == TokenKind::Type {
                decls.push(Decl::Type(self.parse_type_decl()?));
            } else {
                decls.push(Decl::Method(self.parse_method_decl()?));
            }
        }
        Ok(SourceFile::new(self.filename.clone(), decls))
    }

    // ---- declarations ----

    /// `'type' Ident 'is' Type`
    fn parse_type_decl(&mut self) -> Result<TypeDecl> {
        let start = self.index;
        self.expect(TokenKind::Type, "type")?;
        let (name, name_tok) = self.expect_ident()?;
        if self.declared_types.contains(&name) {
            return err(ErrorKind::Syntax, "type already declared", name_tok.span());
        }
        self.expect(TokenKind::Is, "is")?;
        let ty = self.parse_type()?;
        self.declared_types.insert(name.clone());
        Ok(TypeDecl {
            name,
            ty,
            span: self.span_from(start),
        })
    }

    /// `Type Ident '(' Params? ')' Block`
    fn parse_method_decl(&mut self) -> Result<MethodDecl> {
        let start = self.index;
        let ret = self.parse_type()?;
        let (name, name_tok) = self.expect_ident()?;
        if self.declared_methods.contains(&name) {
            return err(ErrorKind::Syntax, "method already declared", name_tok.span());
        }

        let mut ctx = Context::new();
        self.expect(TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        let mut first = true;
        while self.check()?.kind != TokenKind::RParen {
            if !first {
                self.expect(TokenKind::Comma, ",")?;
            }
            first = false;
            let param_start = self.index;
            let ty = self.parse_type()?;
            let (pname, pname_tok) = self.expect_ident()?;
            if ctx.is_declared(&pname) {
                return err(
                    ErrorKind::Syntax,
                    format!("parameter {} already declared", pname),
                    pname_tok.span(),
                );
            }
            ctx.declare(&pname);
            params.push(Parameter {
                ty,
                name: pname,
                span: self.span_from(param_start),
            });
        }
        self.expect(TokenKind::RParen, ")")?;
        let body = self.parse_block(&mut ctx)?;
        self.declared_methods.insert(name.clone());
        Ok(MethodDecl {
            name,
            ret,
            params,
            body,
            span: self.span_from(start),
        })
    }

    // ---- statements ----

    /// `'{' Stmt* '}'`
    fn parse_block(&mut self, ctx: &mut Context) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "{")?;
        let mut stmts = Vec::new();
        while self.check()?.kind != TokenKind::RBrace {
            stmts.push(self.parse_statement(true, ctx)?);
        }
        self.expect(TokenKind::RBrace, "}")?;
        Ok(stmts)
    }

    /// Parse one statement. `with_semicolon` is false only for the step
    /// statement of a `for` header.
    fn parse_statement(&mut self, with_semicolon: bool, ctx: &mut Context) -> Result<Stmt> {
        let token = self.check()?.clone();
        let needs_semi;
        let stmt = match token.kind {
            TokenKind::Assert => {
                needs_semi = true;
                self.parse_assert(ctx)?
            }
            TokenKind::Return => {
                needs_semi = true;
                self.parse_return(ctx)?
            }
            TokenKind::Print => {
                needs_semi = true;
                self.parse_print(ctx)?
            }
            TokenKind::Break => {
                needs_semi = true;
                self.parse_break(ctx)?
            }
            TokenKind::Continue => {
                needs_semi = true;
                self.parse_continue(ctx)?
            }
            TokenKind::If => {
                needs_semi = false;
                self.parse_if(ctx)?
            }
            TokenKind::While => {
                needs_semi = false;
                self.parse_while(ctx)?
            }
            TokenKind::For => {
                needs_semi = false;
                self.parse_for(ctx)?
            }
            _ => {
                needs_semi = true;
                if matches!(token.kind, TokenKind::Ident(_))
                    && self.kind_at(self.index + 1) == Some(&TokenKind::LParen)
                {
                    let start = self.index;
                    let invoke = self.parse_invoke(ctx)?;
                    Stmt::new(StmtKind::Invoke(invoke), self.span_from(start))
                } else if self.is_type_ahead(self.index) {
                    self.parse_var_decl(ctx)?
                } else {
                    self.parse_assign(ctx)?
                }
            }
        };
        if needs_semi && with_semicolon {
            self.expect(TokenKind::SemiColon, ";")?;
        }
        Ok(stmt)
    }

    /// Probe whether a type starts at token position `i`. Used to tell a
    /// variable declaration from an assignment or invocation.
    fn is_type_ahead(&self, i: usize) -> bool {
        match self.kind_at(i) {
            Some(
                TokenKind::Void | TokenKind::Bool | TokenKind::Int | TokenKind::Char | TokenKind::Str,
            ) => true,
            Some(TokenKind::Ident(name)) => self.declared_types.contains(name),
            Some(TokenKind::LBrace) => self.is_type_ahead(i + 1),
            Some(TokenKind::LBracket) => self.is_type_ahead(i + 1),
            _ => false,
        }
    }

    /// `'assert' Expr ';'`
    fn parse_assert(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::Assert, "assert")?;
        let e = self.parse_expr(ctx)?;
        Ok(Stmt::new(StmtKind::Assert(e), self.span_from(start)))
    }

    /// `'return' Expr? ';'`
    fn parse_return(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::Return, "return")?;
        let e = if self.kind_at(self.index).is_some_and(|k| *k != TokenKind::SemiColon) {
            Some(self.parse_expr(ctx)?)
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::Return(e), self.span_from(start)))
    }

    /// `'print' Expr ';'`
    fn parse_print(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::Print, "print")?;
        self.check()?;
        let e = self.parse_expr(ctx)?;
        Ok(Stmt::new(StmtKind::Print(e), self.span_from(start)))
    }

    fn parse_break(&mut self, ctx: &Context) -> Result<Stmt> {
        let start = self.index;
        let tok = self.expect(TokenKind::Break, "break")?;
        if !ctx.in_loop {
            return err(ErrorKind::Syntax, "break outside loop", tok.span());
        }
        Ok(Stmt::new(StmtKind::Break, self.span_from(start)))
    }

    fn parse_continue(&mut self, ctx: &Context) -> Result<Stmt> {
        let start = self.index;
        let tok = self.expect(TokenKind::Continue, "continue")?;
        if !ctx.in_loop {
            return err(ErrorKind::Syntax, "continue outside of loop", tok.span());
        }
        Ok(Stmt::new(StmtKind::Continue, self.span_from(start)))
    }

    /// `'if' '(' Expr ')' Block ('else' (IfStmt | Block))?`
    fn parse_if(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::If, "if")?;
        self.expect(TokenKind::LParen, "(")?;
        let cond = self.parse_expr(ctx)?;
        self.expect(TokenKind::RParen, ")")?;
        let span = self.span_from(start);
        let mut branch_ctx = ctx.branch();
        let then_branch = self.parse_block(&mut branch_ctx)?;

        let mut else_branch = Vec::new();
        if self.kind_at(self.index) == Some(&TokenKind::Else) {
            self.expect(TokenKind::Else, "else")?;
            if self.kind_at(self.index) == Some(&TokenKind::If) {
                else_branch.push(self.parse_if(ctx)?);
            } else {
                let mut else_ctx = ctx.branch();
                else_branch = self.parse_block(&mut else_ctx)?;
            }
        }

        Ok(Stmt::new(
            StmtKind::IfElse {
                cond,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    /// `'while' '(' Expr ')' Block`
    fn parse_while(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::While, "while")?;
        self.expect(TokenKind::LParen, "(")?;
        let cond = self.parse_expr(ctx)?;
        self.expect(TokenKind::RParen, ")")?;
        let span = self.span_from(start);
        let mut body_ctx = ctx.loop_scope();
        let body = self.parse_block(&mut body_ctx)?;
        Ok(Stmt::new(StmtKind::While { cond, body }, span))
    }

    /// `'for' '(' VarDecl ';' Expr ';' Stmt ')' Block`
    ///
    /// The declaration lives in an inner scope covering the header and the
    /// body; it does not leak into the enclosing block.
    fn parse_for(&mut self, ctx: &Context) -> Result<Stmt> {
        let start = self.index;
        self.expect(TokenKind::For, "for")?;
        self.expect(TokenKind::LParen, "(")?;
        let mut inner = ctx.branch();
        let decl = self.parse_var_decl(&mut inner)?;
        self.expect(TokenKind::SemiColon, ";")?;
        let cond = self.parse_expr(&inner)?;
        self.expect(TokenKind::SemiColon, ";")?;
        let step = self.parse_statement(false, &mut inner)?;
        let span = self.span_from(start);
        self.expect(TokenKind::RParen, ")")?;
        let mut body_ctx = inner.loop_scope();
        let body = self.parse_block(&mut body_ctx)?;
        Ok(Stmt::new(
            StmtKind::For {
                decl: Box::new(decl),
                cond,
                step: Box::new(step),
                body,
            },
            span,
        ))
    }

    /// `Type Ident ('=' Expr)?`
    fn parse_var_decl(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        let ty = self.parse_type()?;
        let (name, name_tok) = self.expect_ident()?;
        if ctx.is_declared(&name) {
            return err(
                ErrorKind::Syntax,
                format!("variable {} already declared", name),
                name_tok.span(),
            );
        }
        ctx.declare(&name);
        let init = if self.kind_at(self.index) == Some(&TokenKind::Equal) {
            self.expect(TokenKind::Equal, "=")?;
            Some(self.parse_expr(ctx)?)
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::VariableDeclaration { ty, name, init },
            self.span_from(start),
        ))
    }

    /// `LVal '=' Expr`
    fn parse_assign(&mut self, ctx: &mut Context) -> Result<Stmt> {
        let start = self.index;
        let lhs = self.parse_expr(ctx)?;
        if let ExprKind::Invoke { .. } = lhs.kind {
            // a bare invocation in statement position
            let span = lhs.span;
            return Ok(Stmt::new(StmtKind::Invoke(lhs), span));
        }
        if !lhs.is_lval() {
            return err(
                ErrorKind::Syntax,
                format!("expecting lval, found {}", lhs),
                lhs.span,
            );
        }
        self.expect(TokenKind::Equal, "=")?;
        let rhs = self.parse_expr(ctx)?;
        Ok(Stmt::new(StmtKind::Assign { lhs, rhs }, self.span_from(start)))
    }

    // ---- expressions ----

    /// `Rel (('&&'|'||') Expr)?` — the logical connectives are
    /// right-recursive.
    fn parse_expr(&mut self, ctx: &Context) -> Result<Expr> {
        self.check()?;
        let start = self.index;
        let lhs = self.parse_relational(ctx)?;
        let op = match self.kind_at(self.index) {
            Some(TokenKind::AndAnd) => BinOp::And,
            Some(TokenKind::OrOr) => BinOp::Or,
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.parse_expr(ctx)?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            self.span_from(start),
        ))
    }

    /// `Add (relop Add)?` — relationals do not associate.
    fn parse_relational(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        let lhs = self.parse_additive(ctx)?;
        let op = match self.kind_at(self.index) {
            Some(TokenKind::Less) => BinOp::Lt,
            Some(TokenKind::LessEq) => BinOp::LtEq,
            Some(TokenKind::Greater) => BinOp::Gt,
            Some(TokenKind::GreaterEq) => BinOp::GtEq,
            Some(TokenKind::EqEq) => BinOp::Eq,
            Some(TokenKind::NotEq) => BinOp::NotEq,
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.parse_additive(ctx)?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            self.span_from(start),
        ))
    }

    fn parse_additive(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        let lhs = self.parse_multiplicative(ctx)?;
        let op = match self.kind_at(self.index) {
            Some(TokenKind::Plus) => BinOp::Add,
            Some(TokenKind::Minus) => BinOp::Sub,
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.parse_additive(ctx)?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            self.span_from(start),
        ))
    }

    fn parse_multiplicative(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        let lhs = self.parse_index_term(ctx)?;
        let op = match self.kind_at(self.index) {
            Some(TokenKind::Star) => BinOp::Mul,
            Some(TokenKind::Slash) => BinOp::Div,
            Some(TokenKind::Percent) => BinOp::Rem,
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.parse_multiplicative(ctx)?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            self.span_from(start),
        ))
    }

    /// `Term ('[' Expr ']' | '.' Ident)*`
    fn parse_index_term(&mut self, ctx: &Context) -> Result<Expr> {
        self.check()?;
        let start = self.index;
        let mut lhs = self.parse_term(ctx)?;
        loop {
            match self.kind_at(self.index) {
                Some(TokenKind::LBracket) => {
                    self.expect(TokenKind::LBracket, "[")?;
                    let index = self.parse_expr(ctx)?;
                    self.expect(TokenKind::RBracket, "]")?;
                    lhs = Expr::new(
                        ExprKind::IndexOf {
                            source: Box::new(lhs),
                            index: Box::new(index),
                        },
                        self.span_from(start),
                    );
                }
                Some(TokenKind::Dot) => {
                    self.expect(TokenKind::Dot, ".")?;
                    let (field, _) = self.expect_ident()?;
                    lhs = Expr::new(
                        ExprKind::RecordAccess {
                            source: Box::new(lhs),
                            field,
                        },
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self, ctx: &Context) -> Result<Expr> {
        let token = self.check()?.clone();
        let start = self.index;
        match &token.kind {
            TokenKind::LParen => {
                self.expect(TokenKind::LParen, "(")?;
                let e = self.parse_expr(ctx)?;
                self.check()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(e)
            }
            TokenKind::Ident(_) if self.kind_at(self.index + 1) == Some(&TokenKind::LParen) => {
                self.parse_invoke(ctx)
            }
            TokenKind::Ident(name) if name == "null" => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Null),
                    self.span_from(start),
                ))
            }
            TokenKind::True => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Bool(true)),
                    self.span_from(start),
                ))
            }
            TokenKind::False => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Bool(false)),
                    self.span_from(start),
                ))
            }
            TokenKind::Ident(name) => {
                if !ctx.is_declared(name) {
                    return err(
                        ErrorKind::Syntax,
                        format!("unknown variable {}", name),
                        token.span(),
                    );
                }
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Variable(name.clone()),
                    self.span_from(start),
                ))
            }
            TokenKind::Number(n) => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Int(*n)),
                    self.span_from(start),
                ))
            }
            TokenKind::CharLit(c) => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Char(*c)),
                    self.span_from(start),
                ))
            }
            TokenKind::StrLit(s) => {
                self.index += 1;
                Ok(Expr::new(
                    ExprKind::Constant(Const::Str(s.clone())),
                    self.span_from(start),
                ))
            }
            TokenKind::Minus => self.parse_negation(ctx),
            TokenKind::Bar => self.parse_lengthof(ctx),
            TokenKind::LBracket => self.parse_array_initialiser_or_generator(ctx),
            TokenKind::LBrace => self.parse_record_constructor(ctx),
            TokenKind::Bang => {
                self.expect(TokenKind::Bang, "!")?;
                let operand = self.parse_term(ctx)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnOp::Not,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            _ => err(
                ErrorKind::Syntax,
                format!("unrecognised term (\"{}\")", token.text),
                token.span(),
            ),
        }
    }

    /// `'-' Idx` — negation of an integer constant folds in place.
    fn parse_negation(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        self.expect(TokenKind::Minus, "-")?;
        let e = self.parse_index_term(ctx)?;
        if let ExprKind::Constant(Const::Int(n)) = e.kind {
            return Ok(Expr::new(
                ExprKind::Constant(Const::Int(n.wrapping_neg())),
                self.span_from(start),
            ));
        }
        Ok(Expr::new(
            ExprKind::Unary {
                op: UnOp::Neg,
                operand: Box::new(e),
            },
            self.span_from(start),
        ))
    }

    /// `'|' Idx '|'`
    fn parse_lengthof(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        self.expect(TokenKind::Bar, "|")?;
        let e = self.parse_index_term(ctx)?;
        self.expect(TokenKind::Bar, "|")?;
        Ok(Expr::new(
            ExprKind::Unary {
                op: UnOp::LengthOf,
                operand: Box::new(e),
            },
            self.span_from(start),
        ))
    }

    /// `'[' (Expr (',' Expr)* | Expr ';' Expr)? ']'`
    fn parse_array_initialiser_or_generator(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        self.expect(TokenKind::LBracket, "[")?;
        let mut elements = Vec::new();
        if self.check()?.kind != TokenKind::RBracket {
            let first = self.parse_expr(ctx)?;
            if self.check()?.kind == TokenKind::SemiColon {
                // array generator `[value; size]`
                self.expect(TokenKind::SemiColon, ";")?;
                let size = self.parse_expr(ctx)?;
                self.check()?;
                self.expect(TokenKind::RBracket, "]")?;
                return Ok(Expr::new(
                    ExprKind::ArrayGenerator {
                        value: Box::new(first),
                        size: Box::new(size),
                    },
                    self.span_from(start),
                ));
            }
            elements.push(first);
            while self.check()?.kind != TokenKind::RBracket {
                self.expect(TokenKind::Comma, ",")?;
                elements.push(self.parse_expr(ctx)?);
                self.check()?;
            }
        }
        self.expect(TokenKind::RBracket, "]")?;
        Ok(Expr::new(
            ExprKind::ArrayInitialiser(elements),
            self.span_from(start),
        ))
    }

    /// `'{' Ident ':' Expr (',' Ident ':' Expr)* '}'`
    fn parse_record_constructor(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        let open = self.expect(TokenKind::LBrace, "{")?;
        let mut keys = HashSet::new();
        let mut fields = Vec::new();
        let mut first = true;
        while self.check()?.kind != TokenKind::RBrace {
            if !first {
                self.expect(TokenKind::Comma, ",")?;
            }
            first = false;
            let (name, name_tok) = self.expect_ident()?;
            if !keys.insert(name.clone()) {
                return err(ErrorKind::Syntax, "duplicate record key", name_tok.span());
            }
            self.expect(TokenKind::Colon, ":")?;
            let e = self.parse_expr(ctx)?;
            fields.push((name, e));
            self.check()?;
        }
        self.expect(TokenKind::RBrace, "}")?;
        if fields.is_empty() {
            return err(
                ErrorKind::Syntax,
                "record constructor requires at least one field",
                open.span(),
            );
        }
        Ok(Expr::new(
            ExprKind::RecordConstructor(fields),
            self.span_from(start),
        ))
    }

    /// `Ident '(' Args? ')'`
    fn parse_invoke(&mut self, ctx: &Context) -> Result<Expr> {
        let start = self.index;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        let mut first = true;
        while self.check()?.kind != TokenKind::RParen {
            if !first {
                self.expect(TokenKind::Comma, ",")?;
            }
            first = false;
            args.push(self.parse_expr(ctx)?);
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok(Expr::new(
            ExprKind::Invoke { name, args },
            self.span_from(start),
        ))
    }

    // ---- types ----

    /// `Base ('[' ']')*`
    fn parse_type(&mut self) -> Result<Type> {
        let start = self.index;
        self.check()?;
        let mut ty = self.parse_base_type()?;
        while self.kind_at(self.index) == Some(&TokenKind::LBracket) {
            self.expect(TokenKind::LBracket, "[")?;
            self.expect(TokenKind::RBracket, "]")?;
            ty = Type::new(TypeKind::Array(Box::new(ty)), self.span_from(start));
        }
        Ok(ty)
    }

    fn parse_base_type(&mut self) -> Result<Type> {
        let token = self.check()?.clone();
        let start = self.index;
        let kind = match &token.kind {
            TokenKind::Void => TypeKind::Void,
            TokenKind::Bool => TypeKind::Bool,
            TokenKind::Int => TypeKind::Int,
            TokenKind::Char => TypeKind::Char,
            TokenKind::Str => TypeKind::Str,
            TokenKind::LBrace => return self.parse_record_type(),
            TokenKind::Ident(name) => {
                if !self.declared_types.contains(name) {
                    return err(
                        ErrorKind::Syntax,
                        format!("unknown type {}", name),
                        token.span(),
                    );
                }
                TypeKind::Named(name.clone())
            }
            _ => {
                return err(
                    ErrorKind::Syntax,
                    format!("expecting a type, found '{}'", token.text),
                    token.span(),
                )
            }
        };
        self.index += 1;
        Ok(Type::new(kind, self.span_from(start)))
    }

    /// `'{' Type Ident (',' Type Ident)* '}'`
    fn parse_record_type(&mut self) -> Result<Type> {
        let start = self.index;
        let open = self.expect(TokenKind::LBrace, "{")?;
        let mut names = HashSet::new();
        let mut fields = Vec::new();
        let mut first = true;
        while self.check()?.kind != TokenKind::RBrace {
            if !first {
                self.expect(TokenKind::Comma, ",")?;
            }
            first = false;
            self.check()?;
            let ty = self.parse_type()?;
            let (name, name_tok) = self.expect_ident()?;
            if !names.insert(name.clone()) {
                return err(ErrorKind::Syntax, "duplicate field", name_tok.span());
            }
            fields.push(Field { ty, name });
            self.check()?;
        }
        self.expect(TokenKind::RBrace, "}")?;
        if fields.is_empty() {
            return err(
                ErrorKind::Syntax,
                "record type requires at least one field",
                open.span(),
            );
        }
        Ok(Type::new(TypeKind::Record(fields), self.span_from(start)))
    }

    // ---- token plumbing ----

    fn kind_at(&self, i: usize) -> Option<&TokenKind> {
        self.tokens.get(i).map(|t| &t.kind)
    }

    /// Current token, or an end-of-file error anchored at the last token.
    fn check(&self) -> Result<&Token> {
        match self.tokens.get(self.index) {
            Some(t) => Ok(t),
            None => {
                let at = self.tokens.last().map(|t| t.span()).unwrap_or_default();
                err(ErrorKind::Syntax, "unexpected end-of-file", at)
            }
        }
    }

    /// Consume a token of the given kind or fail.
    fn expect(&mut self, kind: TokenKind, symbol: &str) -> Result<Token> {
        let t = self.check()?.clone();
        if t.kind != kind {
            return err(
                ErrorKind::Syntax,
                format!("expecting '{}', found '{}'", symbol, t.text),
                t.span(),
            );
        }
        self.index += 1;
        Ok(t)
    }

    fn expect_ident(&mut self) -> Result<(String, Token)> {
        let t = self.check()?.clone();
        if let TokenKind::Ident(name) = &t.kind {
            self.index += 1;
            Ok((name.clone(), t))
        } else {
            err(ErrorKind::Syntax, "identifier expected", t.span())
        }
    }

    /// Source span from the token at `start_index` to the last consumed
    /// token.
    fn span_from(&self, start_index: usize) -> Span {
        let start = match self.tokens.get(start_index) {
            Some(t) => t.start,
            None => return Span::default(),
        };
        let end = self
            .tokens
            .get(self.index.saturating_sub(1))
            .map(|t| t.end())
            .unwrap_or(start);
        Span::new(start, end)
    }
}
