// Copyright 2025 Cornell University
// released under MIT License

//! Parse tree -> `File`.
//!
//! Items are compiled in source order against the table of blocks compiled
//! so far, so a block can only instantiate blocks defined above it (this
//! also rules out self and mutual recursion). Identifiers that are not yet
//! known inside a block become new connections of unknown width.

use log::{debug, trace};

use crate::errors::{CompileError, ResolveError};
use crate::ir::{BitRange, Block, Expr, ExprKind, File, Literal, Scope, Statement, Test, TestVector, Width};
use crate::syntax::{self, Atom, BlockDef, Item, SourceFile, Span, TestDef};

/// Compiles a whole parse tree. Widths are not checked here, see
/// [`crate::typecheck::type_check`].
pub fn compile(source: &SourceFile) -> Result<File, CompileError> {
    let mut file = File::default();

    for item in &source.items {
        match item {
            Item::Block(def) => {
                let in_block = |source| CompileError::InBlock {
                    block: def.name.name.clone(),
                    source,
                };
                let block = compile_block(&file, def).map_err(in_block)?;
                debug!(
                    "compiled block '{}': {} statement(s), vars {:?}",
                    block.name(),
                    block.stmts().len(),
                    block.vars().sorted_names()
                );
                file.add_block(block).ok_or_else(|| {
                    in_block(ResolveError::DuplicateBlock {
                        name: def.name.name.clone(),
                        span: def.name.span,
                    })
                })?;
            }
            Item::Test(def) => {
                let in_test = |source| CompileError::InTest {
                    test: def.name.name.clone(),
                    source,
                };
                let test = compile_test(&file, def).map_err(in_test)?;
                debug!(
                    "compiled test '{}': {} vector(s)",
                    test.name,
                    test.vectors.len()
                );
                file.add_test(test).ok_or_else(|| {
                    in_test(ResolveError::DuplicateTest {
                        name: def.name.name.clone(),
                        span: def.name.span,
                    })
                })?;
            }
        }
    }

    Ok(file)
}

/// `file` holds the blocks compiled so far; `def` itself is not in it yet.
pub fn compile_block(file: &File, def: &BlockDef) -> Result<Block, ResolveError> {
    let mut block = Block::new(def.name.name.clone(), def.span);

    for decl in &def.args {
        let width = parse_width(decl)?;
        block
            .add_arg(&decl.name.name, width, decl.span)
            .ok_or_else(|| duplicate_connection(decl))?;
    }

    for decl in &def.rets {
        let width = parse_width(decl)?;
        block
            .add_ret(&decl.name.name, width, decl.span)
            .ok_or_else(|| duplicate_connection(decl))?;
    }

    for instance in &def.stmts {
        let stmt = compile_stmt(file, block.vars_mut(), instance)?;
        block.push_stmt(stmt);
    }

    Ok(block)
}

fn duplicate_connection(decl: &syntax::Decl) -> ResolveError {
    ResolveError::DuplicateConnection {
        name: decl.name.name.clone(),
        span: decl.name.span,
    }
}

/// `d8` -> 8 bits; zero-width signals are rejected
fn parse_width(decl: &syntax::Decl) -> Result<Width, ResolveError> {
    decl.width
        .strip_prefix('d')
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|bits| *bits > 0)
        .map(Width::Bits)
        .ok_or_else(|| ResolveError::InvalidWidth {
            name: decl.name.name.clone(),
            width: decl.width.clone(),
            span: decl.span,
        })
}

fn compile_stmt(
    file: &File,
    vars: &mut Scope,
    instance: &syntax::Instance,
) -> Result<Statement, ResolveError> {
    let op = file
        .block_id(&instance.op.name)
        .ok_or_else(|| ResolveError::UnknownBlock {
            name: instance.op.name.clone(),
            span: instance.op.span,
        })?;

    let args = instance
        .args
        .iter()
        .map(|expr| compile_expr(vars, expr))
        .collect::<Result<Vec<_>, _>>()?;
    let rets = instance
        .rets
        .iter()
        .map(|expr| compile_expr(vars, expr))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Statement {
        op,
        args,
        rets,
        span: instance.span,
    })
}

/// Resolve-or-declare: literals leave `vars` alone, known names reuse their
/// connection, unknown names are declared with an unknown width.
pub fn compile_expr(vars: &mut Scope, expr: &syntax::Expr) -> Result<Expr, ResolveError> {
    let compiled = match &expr.atom {
        Atom::Number(text) => Expr::literal(parse_literal(text, expr.span)?, expr.span),
        Atom::Ident(name) => {
            let (id, fresh) = vars.resolve_or_declare(name, expr.span);
            if fresh {
                trace!("implicitly declared connection '{}'", name);
            }
            Expr::conn(id, expr.span)
        }
    };

    match &expr.index {
        Some(index) => Ok(compiled.with_range(compile_index(index)?)),
        None => Ok(compiled),
    }
}

fn compile_index(index: &syntax::Index) -> Result<BitRange, ResolveError> {
    let lo = parse_bit_index(&index.lo, index.span)?;
    let hi = match &index.hi {
        Some(hi) => parse_bit_index(hi, index.span)?,
        None => lo,
    };
    BitRange::new(lo, hi).ok_or(ResolveError::InvalidRange {
        lo,
        hi,
        span: index.span,
    })
}

fn parse_bit_index(text: &str, span: Span) -> Result<u32, ResolveError> {
    parse_number(text)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| ResolveError::InvalidIndex {
            index: text.to_string(),
            span,
        })
}

fn parse_literal(text: &str, span: Span) -> Result<i64, ResolveError> {
    parse_number(text).ok_or_else(|| ResolveError::LiteralFormat {
        literal: text.to_string(),
        span,
    })
}

/// Signed decimal, or `0x` / `0o` / `0b` prefixed magnitude.
pub fn parse_number(text: &str) -> Option<i64> {
    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = if let Some(rest) = magnitude.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = magnitude.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = magnitude.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, magnitude)
    };
    // from_str_radix would also accept a sign here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from(u64::from_str_radix(digits, radix).ok()?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

pub fn compile_test(file: &File, def: &TestDef) -> Result<Test, ResolveError> {
    let block = file
        .block_id(&def.block.name)
        .ok_or_else(|| ResolveError::UnknownBlock {
            name: def.block.name.clone(),
            span: def.block.span,
        })?;

    let vectors = def
        .vectors
        .iter()
        .map(compile_test_vector)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Test {
        name: def.name.name.clone(),
        block,
        vectors,
        span: def.span,
    })
}

fn compile_test_vector(def: &syntax::TestVectorDef) -> Result<TestVector, ResolveError> {
    // test vectors never see the block's real connections
    let mut scope = Scope::default();
    let inputs = def
        .inputs
        .iter()
        .map(|expr| compile_test_literal(&mut scope, expr))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = def
        .outputs
        .iter()
        .map(|expr| compile_test_literal(&mut scope, expr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TestVector {
        inputs,
        outputs,
        span: def.span,
    })
}

fn compile_test_literal(scope: &mut Scope, expr: &syntax::Expr) -> Result<Literal, ResolveError> {
    let compiled = compile_expr(scope, expr)?;
    match compiled.kind {
        ExprKind::Literal(value) => Ok(Literal {
            value,
            span: compiled.span,
        }),
        ExprKind::Conn(id) => Err(ResolveError::ConnectionInTest {
            name: scope[id].name().to_string(),
            span: compiled.span,
        }),
    }
}
