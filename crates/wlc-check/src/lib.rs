//! Semantic analysis for the While language: type checking,
//! unreachable-code analysis and definite-assignment analysis.

pub mod assignment;
pub mod reachability;
pub mod typing;

pub use typing::TypeChecker;

use wlc_syntax::ast::SourceFile;
use wlc_syntax::error::Result;

/// Run all semantic passes over a parsed file, in pipeline order. On
/// success every expression node carries its computed type.
pub fn check(file: &mut SourceFile) -> Result<()> {
    TypeChecker::new().check_file(file)?;
    reachability::check(file)?;
    assignment::check(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlc_lexer::Lexer;
    use wlc_parser::Parser;
    use wlc_syntax::ast::*;
    use wlc_syntax::error::{Diagnostic, ErrorKind};
    use wlc_syntax::span::Span;

    fn parse(input: &str) -> SourceFile {
        let tokens = Lexer::new(input).tokenize().expect("lexing should succeed");
        Parser::new("test.while", tokens)
            .parse_file()
            .expect("parsing should succeed")
    }

    fn check_ok(input: &str) -> SourceFile {
        let mut file = parse(input);
        check(&mut file).expect("checking should succeed");
        file
    }

    fn check_err(input: &str) -> Diagnostic {
        let mut file = parse(input);
        check(&mut file).expect_err("expected a check error")
    }

    // ---- type checking ----

    #[test]
    fn arithmetic_operands_must_be_int() {
        check_ok("int f(int x) { return x * 2 + 1; }");
        let d = check_err("int f(bool b) { return b + 1; }");
        assert_eq!(d.kind, ErrorKind::Type);
        assert!(d.message.contains("expected int, found bool"));
    }

    #[test]
    fn relational_operands_must_be_int() {
        check_ok("bool f(int x) { return x < 10; }");
        let d = check_err("bool f(bool b) { return b < true; }");
        assert_eq!(d.kind, ErrorKind::Type);
    }

    #[test]
    fn equality_is_unrestricted() {
        check_ok("bool f(int[] xs, int[] ys) { return xs == ys; }");
        check_ok("bool f(int x, bool b) { return x == 1 && b != false; }");
    }

    #[test]
    fn logical_operands_must_be_bool() {
        let d = check_err("bool f(int x) { return x && true; }");
        assert!(d.message.contains("expected bool, found int"));
    }

    #[test]
    fn conditions_must_be_bool() {
        let d = check_err("void f(int x) { if (x) { print x; } }");
        assert_eq!(d.kind, ErrorKind::Type);
        let d = check_err("void f(int x) { while (x + 1) { print x; } }");
        assert_eq!(d.kind, ErrorKind::Type);
    }

    #[test]
    fn indexing_strings_yields_char() {
        check_ok("char f(string s) { return s[0]; }");
        let d = check_err("int f(string s) { return s[0]; }");
        assert!(d.message.contains("expected int, found char"));
    }

    #[test]
    fn indexing_requires_int_index() {
        let d = check_err("int f(int[] xs, bool b) { return xs[b]; }");
        assert!(d.message.contains("expected int, found bool"));
    }

    #[test]
    fn lengthof_requires_sequence() {
        check_ok("int f(int[] xs, string s) { return |xs| + |s|; }");
        let d = check_err("int f(int x) { return |x|; }");
        assert!(d.message.contains("expected an array or string"));
    }

    #[test]
    fn record_access_unknown_field() {
        let d = check_err("int f({int x} r) { return r.y; }");
        assert_eq!(d.kind, ErrorKind::Type);
        assert!(d.message.contains("no field y"));
    }

    #[test]
    fn record_width_subtyping_is_prefix_ordered() {
        // {int x, int y} <= {int x}
        check_ok(
            "type Pair is {int x,int y}\n\
             int first({int x} r) { return r.x; }\n\
             int main() { Pair p = {x: 1, y: 2}; return first(p); }",
        );
        // field order is significant: {int y, int x} is not a subtype of {int x}
        let d = check_err(
            "int first({int x} r) { return r.x; }\n\
             int main() { return first({y: 2, x: 1}); }",
        );
        assert_eq!(d.kind, ErrorKind::Type);
    }

    #[test]
    fn array_covariance() {
        // {int x,int y}[] <= {int x}[]
        check_ok(
            "int f({int x}[] rs) { return rs[0].x; }\n\
             int main() { return f([{x: 1, y: 2}]); }",
        );
    }

    #[test]
    fn empty_array_is_assignable_to_any_array() {
        check_ok("void main() { int[] xs = []; string[] ss = []; print |xs| + |ss|; }");
    }

    #[test]
    fn array_initialiser_folds_element_types() {
        // widest record type wins; all elements must be comparable
        check_ok("void main() { {int x}[] rs = [{x: 1, y: 2}, {x: 3}]; print rs; }");
        let d = check_err("void main() { print [1, true]; }");
        assert_eq!(d.kind, ErrorKind::Type);
        assert!(d.message.contains("incompatible array element"));
    }

    #[test]
    fn array_generator_types() {
        check_ok("void main() { int[] xs = [0; 5]; print xs; }");
        let d = check_err("void main() { int[] xs = [0; true]; print xs; }");
        assert_eq!(d.kind, ErrorKind::Type);
    }

    #[test]
    fn named_types_unfold_in_subtyping() {
        check_ok(
            "type Row is int[]\n\
             type Grid is Row[]\n\
             int f(Grid g) { return g[0][0]; }\n\
             int main() { return f([[1]]); }",
        );
    }

    #[test]
    fn assignment_requires_subtype() {
        let d = check_err("void main() { int x = 0; x = true; }");
        assert!(d.message.contains("expected int, found bool"));
    }

    #[test]
    fn string_elements_cannot_be_assigned() {
        let d = check_err("void main() { string s = \"hi\"; s[0] = 'a'; }");
        assert_eq!(d.kind, ErrorKind::Type);
        assert!(d.message.contains("expected an array"));
    }

    #[test]
    fn null_is_assignable_everywhere() {
        check_ok("void main() { int[] xs = null; {int x} r = null; print xs == null; print r; }");
    }

    #[test]
    fn return_type_is_enforced() {
        let d = check_err("int f() { return true; }");
        assert!(d.message.contains("expected int, found bool"));
        let d = check_err("int f() { return; }");
        assert_eq!(d.kind, ErrorKind::Type);
        check_ok("void f() { return; }");
    }

    #[test]
    fn void_method_rejected_in_expression() {
        let d = check_err("void g() {}\nvoid main() { int x = g(); print x; }");
        assert!(d.message.contains("void method g()"));
        // fine as a statement
        check_ok("void g() {}\nvoid main() { g(); }");
    }

    #[test]
    fn invoke_arity_and_argument_types() {
        let d = check_err("int f(int x) { return x; }\nint main() { return f(); }");
        assert!(d.message.contains("incorrect number of arguments"));
        let d = check_err("int f(int x) { return x; }\nint main() { return f(true); }");
        assert!(d.message.contains("expected int, found bool"));
    }

    #[test]
    fn unknown_method_is_a_type_error() {
        let d = check_err("int main() { return missing(); }");
        assert_eq!(d.kind, ErrorKind::Type);
        assert!(d.message.contains("unknown method missing()"));
    }

    #[test]
    fn void_not_permitted_in_value_positions() {
        assert_eq!(check_err("void main() { void x; }").kind, ErrorKind::Type);
        assert_eq!(check_err("void f(void x) {}").kind, ErrorKind::Type);
        assert_eq!(check_err("void main() { void[] xs = []; }").kind, ErrorKind::Type);
        assert_eq!(check_err("type Bad is {void f}").kind, ErrorKind::Type);
        assert_eq!(check_err("void[] f() { return []; }").kind, ErrorKind::Type);
    }

    #[test]
    fn attribute_totality() {
        fn walk_expr(e: &Expr, count: &mut usize) {
            assert!(e.ty.is_some(), "untyped expression: {:?}", e);
            *count += 1;
            match &e.kind {
                ExprKind::Binary { lhs, rhs, .. } => {
                    walk_expr(lhs, count);
                    walk_expr(rhs, count);
                }
                ExprKind::Unary { operand, .. } => walk_expr(operand, count),
                ExprKind::IndexOf { source, index } => {
                    walk_expr(source, count);
                    walk_expr(index, count);
                }
                ExprKind::RecordAccess { source, .. } => walk_expr(source, count),
                ExprKind::RecordConstructor(fields) => {
                    fields.iter().for_each(|(_, v)| walk_expr(v, count))
                }
                ExprKind::ArrayInitialiser(es) => es.iter().for_each(|e| walk_expr(e, count)),
                ExprKind::ArrayGenerator { value, size } => {
                    walk_expr(value, count);
                    walk_expr(size, count);
                }
                ExprKind::Invoke { args, .. } => args.iter().for_each(|a| walk_expr(a, count)),
                ExprKind::Variable(_) | ExprKind::Constant(_) => {}
            }
        }
        fn walk_stmt(s: &Stmt, count: &mut usize) {
            match &s.kind {
                StmtKind::Assert(e) | StmtKind::Print(e) | StmtKind::Invoke(e) => {
                    walk_expr(e, count)
                }
                StmtKind::Assign { lhs, rhs } => {
                    walk_expr(lhs, count);
                    walk_expr(rhs, count);
                }
                StmtKind::VariableDeclaration { init, .. } => {
                    if let Some(e) = init {
                        walk_expr(e, count)
                    }
                }
                StmtKind::Return(e) => {
                    if let Some(e) = e {
                        walk_expr(e, count)
                    }
                }
                StmtKind::IfElse {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    walk_expr(cond, count);
                    then_branch.iter().for_each(|s| walk_stmt(s, count));
                    else_branch.iter().for_each(|s| walk_stmt(s, count));
                }
                StmtKind::While { cond, body } => {
                    walk_expr(cond, count);
                    body.iter().for_each(|s| walk_stmt(s, count));
                }
                StmtKind::For {
                    decl,
                    cond,
                    step,
                    body,
                } => {
                    walk_stmt(decl, count);
                    walk_expr(cond, count);
                    walk_stmt(step, count);
                    body.iter().for_each(|s| walk_stmt(s, count));
                }
                StmtKind::Break | StmtKind::Continue => {}
            }
        }

        let file = check_ok(
            "type Point is {int x,int y}\n\
             int dist(Point p) { return p.x + p.y; }\n\
             void main() {\n\
               Point p = {x: 1, y: 2};\n\
               int[] xs = [p.x; 3];\n\
               for (int i = 0; i < |xs|; i = i + 1) { xs[i] = dist(p); }\n\
               if (xs[0] == 2 && true) { print xs; } else { print -xs[0]; }\n\
             }",
        );
        let mut count = 0;
        for d in &file.decls {
            if let Decl::Method(m) = d {
                m.body.iter().for_each(|s| walk_stmt(s, &mut count));
            }
        }
        assert!(count > 20, "walked only {} expressions", count);
    }

    // ---- the subtype relation itself ----

    fn checker_with(src: &str) -> TypeChecker {
        let mut file = parse(src);
        let mut tc = TypeChecker::new();
        tc.check_file(&mut file).expect("checking should succeed");
        tc
    }

    fn types_for_probe() -> Vec<Type> {
        let prim = |k| Type::synthetic(k);
        let arr = |t: Type| Type::synthetic(TypeKind::Array(Box::new(t)));
        let rec = |fields: Vec<(Type, &str)>| {
            Type::synthetic(TypeKind::Record(
                fields
                    .into_iter()
                    .map(|(ty, name)| Field {
                        ty,
                        name: name.into(),
                    })
                    .collect(),
            ))
        };
        vec![
            prim(TypeKind::Void),
            prim(TypeKind::Bool),
            prim(TypeKind::Int),
            prim(TypeKind::Char),
            prim(TypeKind::Str),
            arr(prim(TypeKind::Int)),
            arr(prim(TypeKind::Void)),
            arr(arr(prim(TypeKind::Int))),
            rec(vec![(prim(TypeKind::Int), "x")]),
            rec(vec![(prim(TypeKind::Int), "x"), (prim(TypeKind::Int), "y")]),
            rec(vec![(prim(TypeKind::Void), "x")]),
            Type::synthetic(TypeKind::Named("Row".into())),
        ]
    }

    #[test]
    fn subtyping_is_reflexive() {
        let tc = checker_with("type Row is int[]");
        for t in types_for_probe() {
            assert!(tc.is_subtype(&t, &t).unwrap(), "{} not <= itself", t);
        }
    }

    #[test]
    fn subtyping_is_transitive() {
        let tc = checker_with("type Row is int[]");
        let all = types_for_probe();
        for t in &all {
            for u in &all {
                for v in &all {
                    if tc.is_subtype(t, u).unwrap() && tc.is_subtype(u, v).unwrap() {
                        assert!(
                            tc.is_subtype(t, v).unwrap(),
                            "{} <= {} <= {} but not transitively",
                            t,
                            u,
                            v
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn void_is_bottom() {
        let tc = checker_with("type Row is int[]");
        let void = Type::synthetic(TypeKind::Void);
        for t in types_for_probe() {
            assert!(tc.is_subtype(&void, &t).unwrap());
        }
        assert!(!tc
            .is_subtype(&Type::synthetic(TypeKind::Int), &void)
            .unwrap());
    }

    #[test]
    fn unknown_named_type_is_an_error() {
        let tc = checker_with("type Row is int[]");
        let named = Type::new(TypeKind::Named("Missing".into()), Span::synthetic());
        let int = Type::synthetic(TypeKind::Int);
        assert!(tc.is_subtype(&named, &int).is_err());
    }

    // ---- unreachable code ----

    #[test]
    fn code_after_return_is_rejected() {
        let d = check_err("int f() { return 1; print 2; }");
        assert_eq!(d.kind, ErrorKind::UnreachableCode);
    }

    #[test]
    fn code_after_conditional_return_is_fine() {
        check_ok("int f(int x) { if (x > 0) { return 1; } return 0; }");
    }

    #[test]
    fn missing_return_is_rejected() {
        let d = check_err("int f(int x) { if (x > 0) { return 1; } }");
        assert_eq!(d.kind, ErrorKind::MissingReturn);
        assert_eq!(d.message, "missing return statement");
    }

    #[test]
    fn loops_do_not_satisfy_missing_return() {
        let d = check_err("int f() { while (true) { return 1; } }");
        assert_eq!(d.kind, ErrorKind::MissingReturn);
    }

    #[test]
    fn void_alias_return_needs_no_return_statement() {
        check_ok("type Unit is void\nUnit f() { print 1; }");
    }

    #[test]
    fn code_after_break_in_loop_is_rejected() {
        let d = check_err("void f() { while (true) { break; print 1; } }");
        assert_eq!(d.kind, ErrorKind::UnreachableCode);
    }

    #[test]
    fn continue_terminates_its_path() {
        let d = check_err("void f() { while (true) { continue; print 1; } }");
        assert_eq!(d.kind, ErrorKind::UnreachableCode);
    }

    // ---- definite assignment ----

    #[test]
    fn read_before_assignment_is_rejected() {
        let d = check_err("void main() { int x; print x; }");
        assert_eq!(d.kind, ErrorKind::DefiniteAssignment);
        assert_eq!(d.message, "variable x is not definitely assigned");
    }

    #[test]
    fn one_armed_if_does_not_assign() {
        let d = check_err("void main() { int x; if (true) { x = 1; } print x; }");
        assert_eq!(d.kind, ErrorKind::DefiniteAssignment);
    }

    #[test]
    fn both_arms_assigning_is_fine() {
        check_ok("void main() { int x; if (true) { x = 1; } else { x = 2; } print x; }");
    }

    #[test]
    fn loop_body_assignments_do_not_survive() {
        let d = check_err("void main() { int x; while (true) { x = 1; } print x; }");
        assert_eq!(d.kind, ErrorKind::DefiniteAssignment);
    }

    #[test]
    fn assignment_through_compound_requires_base() {
        let d = check_err("void main() { int[] xs; xs[0] = 1; }");
        assert_eq!(d.kind, ErrorKind::DefiniteAssignment);
        check_ok("void main() { int[] xs = [0]; xs[0] = 1; print xs; }");
    }

    #[test]
    fn for_loop_variable_is_assigned_in_body() {
        check_ok("void main() { for (int i = 0; i < 3; i = i + 1) { print i; } }");
    }

    #[test]
    fn params_start_assigned() {
        check_ok("int f(int x) { return x; }");
    }
}
