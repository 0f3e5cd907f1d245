// Copyright 2025 Cornell University
// released under MIT License

use log::{debug, trace};

use crate::errors::{Port, TypeError, WidthError};
use crate::ir::*;
use crate::syntax::Span;

/// How often the statements of a block are walked. Widths are only ever
/// adopted from the formal ports of the instantiated block, so every
/// unranged use resolves in the first pass; the second pass re-checks
/// slices that were visited before their connection had a width.
pub const RELAXATION_PASSES: usize = 2;

/// Number of bits needed for the magnitude of `value` (0 needs none).
pub fn literal_width(value: i64) -> u32 {
    u64::BITS - value.unsigned_abs().leading_zeros()
}

fn check_range(expected: u32, range: BitRange, span: Span) -> Result<(), WidthError> {
    if range.width() != u64::from(expected) {
        return Err(WidthError::RangeWidthMismatch {
            expected,
            lo: range.lo(),
            hi: range.hi(),
            width: range.width(),
            span,
        });
    }
    Ok(())
}

fn check_literal(expected: u32, value: i64, span: Span) -> Result<(), WidthError> {
    if literal_width(value) > expected {
        return Err(WidthError::LiteralOverflow {
            value,
            expected,
            span,
        });
    }
    Ok(())
}

/// Checks `expr` against the width `expected` by its position, resolving
/// the width of an unranged connection that is still unknown.
pub fn check_expr(vars: &mut Scope, expected: u32, expr: &Expr) -> Result<(), WidthError> {
    if let Some(range) = expr.range {
        check_range(expected, range, expr.span)?;
    }

    match expr.kind {
        ExprKind::Conn(id) => {
            let conn = &mut vars[id];
            match (expr.range, conn.width()) {
                (Some(range), Width::Bits(width)) if range.hi() >= width => {
                    Err(WidthError::RangeOverflow {
                        conn: conn.name().to_string(),
                        width,
                        lo: range.lo(),
                        hi: range.hi(),
                        span: expr.span,
                    })
                }
                (Some(_), _) => Ok(()),
                (None, Width::Bits(width)) if width != expected => Err(WidthError::WidthMismatch {
                    expected,
                    conn: conn.name().to_string(),
                    width,
                    span: expr.span,
                }),
                (None, Width::Bits(_)) => Ok(()),
                (None, Width::Unknown) => {
                    conn.resolve(expected);
                    debug!("resolved width of '{}' to d{}", conn.name(), expected);
                    Ok(())
                }
            }
        }
        ExprKind::Literal(value) => check_literal(expected, value, expr.span),
    }
}

/// Formal widths of `op`'s ports. Ports are always declared with a width,
/// an unknown one can only come from a hand-built `Block`.
fn formal_widths(op: &Block, port: Port) -> Result<Vec<u32>, WidthError> {
    let ids = match port {
        Port::Arg => op.args(),
        Port::Ret => op.rets(),
    };
    ids.iter()
        .map(|id| {
            let conn = &op.vars()[*id];
            conn.width().bits().ok_or_else(|| WidthError::UnresolvedWidth {
                conn: conn.name().to_string(),
                span: conn.span(),
            })
        })
        .collect()
}

fn check_arity(op: &Block, port: Port, expected: usize, found: usize, span: Span) -> Result<(), WidthError> {
    if expected != found {
        return Err(WidthError::ArityMismatch {
            op: op.name().to_string(),
            port,
            expected,
            found,
            span,
        });
    }
    Ok(())
}

/// Both the argument and the return expressions are checked against the
/// instantiated block's formal ports.
fn check_stmt(
    vars: &mut Scope,
    stmt: &Statement,
    formal_args: &[u32],
    formal_rets: &[u32],
) -> Result<(), WidthError> {
    for (expr, expected) in stmt.args.iter().zip(formal_args) {
        check_expr(vars, *expected, expr)?;
    }
    for (expr, expected) in stmt.rets.iter().zip(formal_rets) {
        check_expr(vars, *expected, expr)?;
    }
    Ok(())
}

pub fn check_block(file: &mut File, block_id: BlockId) -> Result<(), WidthError> {
    // formal widths of every instantiated block, in statement order
    let mut formals = Vec::with_capacity(file[block_id].stmts().len());
    for stmt in file[block_id].stmts() {
        let op = &file[stmt.op];
        check_arity(op, Port::Arg, op.args().len(), stmt.args.len(), stmt.span)?;
        check_arity(op, Port::Ret, op.rets().len(), stmt.rets.len(), stmt.span)?;
        formals.push((formal_widths(op, Port::Arg)?, formal_widths(op, Port::Ret)?));
    }

    let (stmts, vars) = file[block_id].stmts_and_vars_mut();
    for pass in 0..RELAXATION_PASSES {
        trace!("pass {} over {} statement(s)", pass, stmts.len());
        for (stmt, (formal_args, formal_rets)) in stmts.iter().zip(&formals) {
            check_stmt(vars, stmt, formal_args, formal_rets)?;
        }
    }

    // connections in first-use order so the reported one is stable
    if let Some((_, conn)) = vars.iter().find(|(_, conn)| !conn.width().is_known()) {
        return Err(WidthError::UnresolvedWidth {
            conn: conn.name().to_string(),
            span: conn.span(),
        });
    }

    Ok(())
}

fn check_literals(literals: &[Literal], formals: &[u32]) -> Result<(), WidthError> {
    for (literal, expected) in literals.iter().zip(formals) {
        check_literal(*expected, literal.value, literal.span)?;
    }
    Ok(())
}

/// Every vector must supply one literal per port, each fitting its port.
pub fn check_test(file: &File, test: &Test) -> Result<(), WidthError> {
    let block = &file[test.block];
    let formal_args = formal_widths(block, Port::Arg)?;
    let formal_rets = formal_widths(block, Port::Ret)?;

    for vector in &test.vectors {
        check_arity(block, Port::Arg, formal_args.len(), vector.inputs.len(), vector.span)?;
        check_arity(block, Port::Ret, formal_rets.len(), vector.outputs.len(), vector.span)?;
        check_literals(&vector.inputs, &formal_args)?;
        check_literals(&vector.outputs, &formal_rets)?;
    }
    Ok(())
}

/// Resolves unknown connection widths in place and validates every block,
/// then every test vector. Stops at the first inconsistency.
pub fn type_check(file: &mut File) -> Result<(), TypeError> {
    for block_id in file.block_ids() {
        check_block(file, block_id).map_err(|source| TypeError::InBlock {
            block: file[block_id].name().to_string(),
            source,
        })?;
    }

    for test_id in file.test_ids() {
        let test = &file[test_id];
        check_test(file, test).map_err(|source| TypeError::InTest {
            test: test.name.clone(),
            source,
        })?;
    }

    debug!(
        "type checked {} block(s) and {} test(s)",
        file.num_blocks(),
        file.num_tests()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::errors::Error;
    use crate::parser::parse_source;
    use insta::assert_snapshot;

    fn build(input: &str) -> File {
        let tree = parse_source(input).expect("test input should parse");
        compile(&tree).expect("test input should compile")
    }

    fn check(input: &str) -> Result<File, Error> {
        let mut file = build(input);
        type_check(&mut file)?;
        Ok(file)
    }

    fn check_err(input: &str) -> TypeError {
        let mut file = build(input);
        type_check(&mut file).expect_err("type checking should fail")
    }

    fn local(scope: &mut Scope, name: &str, width: Width) -> ConnId {
        scope
            .declare(name, width, Span::default())
            .expect("fresh name")
    }

    #[test]
    fn literal_widths() {
        assert_eq!(literal_width(0), 0);
        assert_eq!(literal_width(1), 1);
        assert_eq!(literal_width(5), 3);
        assert_eq!(literal_width(32), 6);
        assert_eq!(literal_width(-1), 1);
        assert_eq!(literal_width(i64::MIN), 64);
    }

    #[test]
    fn literals_must_fit() {
        let mut scope = Scope::default();
        let lit = |v| Expr::literal(v, Span::default());
        assert!(check_expr(&mut scope, 6, &lit(32)).is_ok());
        assert!(check_expr(&mut scope, 1, &lit(0)).is_ok());

        let err = check_expr(&mut scope, 5, &lit(32)).expect_err("32 needs 6 bits");
        assert_snapshot!(err.to_string(), @"literal '32' does not fit in d5");
        assert!(matches!(
            check_expr(&mut scope, 1, &lit(5)),
            Err(WidthError::LiteralOverflow { value: 5, expected: 1, .. })
        ));
    }

    #[test]
    fn range_width_must_match() {
        let mut scope = Scope::default();
        let range = BitRange::new(0, 2).expect("ordered");
        let expr = Expr::literal(0, Span::default()).with_range(range);
        let err = check_expr(&mut scope, 1, &expr).expect_err("3 bits into 1");
        assert_snapshot!(err.to_string(), @"expected d1, got range [0..2] (d3)");
    }

    #[test]
    fn slices_must_stay_inside_the_signal() {
        let mut scope = Scope::default();
        let a = local(&mut scope, "a", Width::Bits(3));
        let range = BitRange::new(0, 4).expect("ordered");
        let expr = Expr::conn(a, Span::default()).with_range(range);
        let err = check_expr(&mut scope, 5, &expr).expect_err("slice too wide");
        assert_snapshot!(err.to_string(), @"attempting to get range [0..4] of 'a' (d3)");
    }

    #[test]
    fn widest_bit_indices() {
        let err = check_err(
            "block f (a d1) -> () {}
             block g (x d4) -> () { (x[0..4294967295]) f -> ; }",
        );
        assert_snapshot!(err.to_string(), @"block 'g': expected d1, got range [0..4294967295] (d4294967296)");
        assert!(matches!(
            err.kind(),
            WidthError::RangeWidthMismatch { width: 4294967296, .. }
        ));

        let err = check_err(
            "block f (a d1) -> () {}
             block g (x d4) -> () { (x[4294967295]) f -> ; }",
        );
        assert!(matches!(
            err.kind(),
            WidthError::RangeOverflow { hi: 4294967295, width: 4, .. }
        ));
    }

    #[test]
    fn known_widths_must_match() {
        let mut scope = Scope::default();
        let a = local(&mut scope, "a", Width::Bits(3));
        let err = check_expr(&mut scope, 5, &Expr::conn(a, Span::default()))
            .expect_err("d3 is not d5");
        assert_snapshot!(err.to_string(), @"expected d5, got 'a' (d3)");
    }

    #[test]
    fn unknown_widths_are_adopted() {
        let mut scope = Scope::default();
        let (t, _) = scope.resolve_or_declare("t", Span::default());
        assert!(check_expr(&mut scope, 5, &Expr::conn(t, Span::default())).is_ok());
        assert_eq!(scope[t].width(), Width::Bits(5));
        // first concrete width wins
        assert!(check_expr(&mut scope, 2, &Expr::conn(t, Span::default())).is_err());
    }

    #[test]
    fn ranged_use_does_not_resolve() {
        let mut scope = Scope::default();
        let (t, _) = scope.resolve_or_declare("t", Span::default());
        let range = BitRange::new(4, 5).expect("ordered");
        let expr = Expr::conn(t, Span::default()).with_range(range);
        assert!(check_expr(&mut scope, 2, &expr).is_ok());
        assert_eq!(scope[t].width(), Width::Unknown);
    }

    #[test]
    fn empty_file_checks() {
        assert!(type_check(&mut File::default()).is_ok());
    }

    #[test]
    fn matching_widths_check() {
        let file = check(
            "block a (a d3) -> (b d3) {}
             block b (a d3) -> (b d3) { (a) a -> b; }",
        )
        .expect("widths agree");
        assert!(file.block("b").is_some());
    }

    #[test]
    fn declared_width_mismatch() {
        let err = check_err(
            "block a (a d3) -> (b d3) {}
             block b (a d4) -> (b d3) { (a) a -> b; }",
        );
        assert_snapshot!(err.to_string(), @"block 'b': expected d3, got 'a' (d4)");
    }

    #[test]
    fn declared_d3_used_as_d4() {
        let err = check_err(
            "block wide (x d4) -> () {}
             block user (a d3) -> () { (a) wide -> ; }",
        );
        assert!(matches!(
            err.kind(),
            WidthError::WidthMismatch { expected: 4, width: 3, .. }
        ));
    }

    #[test]
    fn late_width_reaches_earlier_slice() {
        // `c` is sliced before its width is learned from the second statement
        let err = check_err(
            "block a (a d5) -> (b d3) {}
             block c (a d2) -> (b d3) {}
             block b (a d3) -> (b d3) {
                 (c[0..4]) a -> b;
                 (c) c -> b;
             }",
        );
        assert_snapshot!(err.to_string(), @"block 'b': attempting to get range [0..4] of 'c' (d2)");
    }

    #[test]
    fn return_slices_are_checked() {
        let err = check_err(
            "block a (a d5) -> (b d5) {}
             block c (a d2) -> (b d3) {}
             block b (a d3) -> (b d3) {
                 (1) a -> c[0..4];
                 (1) c -> c;
             }",
        );
        assert!(matches!(err.kind(), WidthError::RangeOverflow { hi: 4, width: 3, .. }));
    }

    #[test]
    fn returns_resolve_widths() {
        let file = check(
            "block f (a d1) -> (b d4, c d2) {}
             block g (x d1) -> (y d2) {
                 (x) f -> wide, narrow;
                 (narrow[1]) f -> t, y;
             }",
        )
        .expect("widths agree");
        let g = file.block("g").expect("g is defined");
        assert_eq!(g.vars()["wide"].width(), Width::Bits(4));
        assert_eq!(g.vars()["narrow"].width(), Width::Bits(2));
        assert_eq!(g.vars()["t"].width(), Width::Bits(4));
    }

    #[test]
    fn return_slice_past_declared_width() {
        let err = check_err(
            "block f (a d1) -> (b d2) {}
             block g (x d1) -> (y d1) { (x) f -> y[0..1]; }",
        );
        assert_snapshot!(err.to_string(), @"block 'g': attempting to get range [0..1] of 'y' (d1)");
    }

    #[test]
    fn resolution_is_shared_by_all_uses() {
        let file = check(
            "block inv (a d8) -> (b d8) {}
             block twice (x d8) -> (y d8) {
                 (x) inv -> mid;
                 (mid) inv -> y;
             }",
        )
        .expect("widths agree");
        let twice = file.block("twice").expect("twice is defined");
        let mid = twice.vars().get("mid").expect("mid is a local");
        assert_eq!(twice.vars()[mid].width(), Width::Bits(8));
        assert_eq!(twice.stmts()[1].args[0].conn_id(), Some(mid));
    }

    #[test]
    fn unresolvable_width_is_reported() {
        let err = check_err(
            "block bit (a d1) -> () {}
             block g () -> () { (t[0]) bit -> ; }",
        );
        assert_snapshot!(err.to_string(), @"block 'g': width of connection 't' cannot be determined");
    }

    #[test]
    fn arity_is_checked() {
        let err = check_err(
            "block f (a d1, b d1) -> (c d1) {}
             block g (x d1) -> (y d1) { (x) f -> y; }",
        );
        assert_snapshot!(err.to_string(), @"block 'g': 'f' expects 2 argument(s), got 1");

        let err = check_err(
            "block f (a d1) -> (c d1) {}
             block g (x d1) -> (y d1) { (x) f -> y, z; }",
        );
        assert!(matches!(
            err.kind(),
            WidthError::ArityMismatch { port: Port::Ret, expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn test_vectors_are_checked() {
        let source = "block add (a d2, b d2) -> (s d2, c d1) {}";
        assert!(check(&format!("{source} test t(add) {{ 0x3, 1 ==> 0, 1; 0b10, 0 ==> 2, 0; }}")).is_ok());

        let err = check_err(&format!("{source} test t(add) {{ 4, 1 ==> 1, 1; }}"));
        assert_snapshot!(err.to_string(), @"test 't': literal '4' does not fit in d2");

        let err = check_err(&format!("{source} test t(add) {{ 1 ==> 1, 1; }}"));
        assert!(matches!(
            err.kind(),
            WidthError::ArityMismatch { port: Port::Arg, expected: 2, found: 1, .. }
        ));

        let err = check_err(&format!("{source} test t(add) {{ 1, 1 ==> 1, 2; }}"));
        assert!(matches!(err.kind(), WidthError::LiteralOverflow { value: 2, expected: 1, .. }));
    }

    #[test]
    fn blocks_are_checked_before_tests() {
        let err = check_err(
            "block f (a d1) -> () {}
             test t(f) { 7 ==> ; }
             block g () -> () { (3) f -> ; }",
        );
        assert!(matches!(err, TypeError::InBlock { ref block, .. } if block == "g"));
    }
}
