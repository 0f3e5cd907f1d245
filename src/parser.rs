// Copyright 2025 Cornell University
// released under MIT License

use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::errors::ParseError;
use crate::syntax::*;

#[derive(Parser)]
#[grammar = "phdl.pest"]
struct PhdlParser;

// Helper for pulling the next child out of a pair, the grammar guarantees
// these are present so a miss means the tree walker and grammar disagree
fn expect_rule<'i>(
    option: Option<Pair<'i, Rule>>,
    context_pair: &Pair<'i, Rule>,
    message: &str,
) -> Result<Pair<'i, Rule>, ParseError> {
    option.ok_or_else(|| ParseError {
        message: message.to_string(),
        span: context_pair.as_span().into(),
    })
}

fn unexpected(pair: &Pair<Rule>, context: &str) -> ParseError {
    ParseError {
        message: format!("Unexpected rule while parsing {}: {:?}", context, pair.as_rule()),
        span: pair.as_span().into(),
    }
}

fn parse_ident(pair: Pair<Rule>) -> Ident {
    Ident {
        name: pair.as_str().to_string(),
        span: pair.as_span().into(),
    }
}

fn parse_decl(pair: Pair<Rule>) -> Result<Decl, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    let name = parse_ident(expect_rule(inner.next(), &pair, "Expected connection name")?);
    let width = expect_rule(inner.next(), &pair, "Expected connection width")?;
    Ok(Decl {
        name,
        width: width.as_str().to_string(),
        span,
    })
}

/// `args` and `rets` wrap an optional `decl_list`
fn parse_decls(pair: Pair<Rule>) -> Result<Vec<Decl>, ParseError> {
    let mut decls = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::decl_list => {
                for decl in inner.into_inner() {
                    decls.push(parse_decl(decl)?);
                }
            }
            _ => return Err(unexpected(&inner, "declarations")),
        }
    }
    Ok(decls)
}

fn parse_index(pair: Pair<Rule>) -> Result<Index, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    let lo = expect_rule(inner.next(), &pair, "Expected low bit index")?;
    let hi = inner.next().map(|hi| hi.as_str().to_string());
    Ok(Index {
        lo: lo.as_str().to_string(),
        hi,
        span,
    })
}

fn parse_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    let atom_pair = expect_rule(inner.next(), &pair, "Expected number or identifier")?;
    let atom = match atom_pair.as_rule() {
        Rule::number => Atom::Number(atom_pair.as_str().to_string()),
        Rule::ident => Atom::Ident(atom_pair.as_str().to_string()),
        _ => return Err(unexpected(&atom_pair, "expression")),
    };
    let index = inner.next().map(parse_index).transpose()?;
    Ok(Expr { atom, index, span })
}

/// `inputs` and `outputs` wrap an optional `expr_list`
fn parse_exprs(pair: Pair<Rule>) -> Result<Vec<Expr>, ParseError> {
    let mut exprs = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::expr_list => {
                for expr in inner.into_inner() {
                    exprs.push(parse_expr(expr)?);
                }
            }
            _ => return Err(unexpected(&inner, "expression list")),
        }
    }
    Ok(exprs)
}

fn parse_stmt(pair: Pair<Rule>) -> Result<Instance, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    let args = parse_exprs(expect_rule(inner.next(), &pair, "Expected statement inputs")?)?;
    let op = parse_ident(expect_rule(inner.next(), &pair, "Expected block name")?);
    let rets = parse_exprs(expect_rule(inner.next(), &pair, "Expected statement outputs")?)?;
    Ok(Instance {
        args,
        op,
        rets,
        span,
    })
}

fn parse_block(pair: Pair<Rule>) -> Result<BlockDef, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    // keyword
    expect_rule(inner.next(), &pair, "Expected `block`")?;
    let name = parse_ident(expect_rule(inner.next(), &pair, "Expected block name")?);
    let args = parse_decls(expect_rule(inner.next(), &pair, "Expected argument list")?)?;

    let mut rets = Vec::new();
    let mut stmts = Vec::new();
    for inner_pair in inner {
        match inner_pair.as_rule() {
            Rule::rets => rets = parse_decls(inner_pair)?,
            Rule::stmt => stmts.push(parse_stmt(inner_pair)?),
            _ => return Err(unexpected(&inner_pair, "block")),
        }
    }

    Ok(BlockDef {
        name,
        args,
        rets,
        stmts,
        span,
    })
}

fn parse_test_vector(pair: Pair<Rule>) -> Result<TestVectorDef, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    let inputs = parse_exprs(expect_rule(inner.next(), &pair, "Expected test inputs")?)?;
    let outputs = parse_exprs(expect_rule(inner.next(), &pair, "Expected test outputs")?)?;
    Ok(TestVectorDef {
        inputs,
        outputs,
        span,
    })
}

fn parse_test(pair: Pair<Rule>) -> Result<TestDef, ParseError> {
    let span = pair.as_span().into();
    let mut inner = pair.clone().into_inner();
    expect_rule(inner.next(), &pair, "Expected `test`")?;
    let name = parse_ident(expect_rule(inner.next(), &pair, "Expected test name")?);
    let block = parse_ident(expect_rule(inner.next(), &pair, "Expected block under test")?);
    let vectors = inner
        .map(parse_test_vector)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TestDef {
        name,
        block,
        vectors,
        span,
    })
}

fn parse_items(pairs: Pairs<Rule>) -> Result<SourceFile, ParseError> {
    let mut items = Vec::new();
    for pair in pairs {
        match pair.as_rule() {
            Rule::block => items.push(Item::Block(parse_block(pair)?)),
            Rule::test => items.push(Item::Test(parse_test(pair)?)),
            Rule::EOI => {}
            _ => return Err(unexpected(&pair, "file")),
        }
    }
    Ok(SourceFile { items })
}

/// Parses PHDL source text into a parse tree.
pub fn parse_source(input: &str) -> Result<SourceFile, ParseError> {
    let mut pairs = PhdlParser::parse(Rule::file, input).map_err(|err| {
        let (start, end) = match err.location {
            InputLocation::Pos(start) => (start, start),
            InputLocation::Span(span) => span,
        };
        ParseError {
            message: err.variant.message().to_string(),
            span: Span::new(start, end),
        }
    })?;
    match pairs.next() {
        Some(file) => parse_items(file.into_inner()),
        None => Ok(SourceFile::default()),
    }
}
