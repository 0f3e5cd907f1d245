// Copyright 2025 Cornell University
// released under MIT License

//! Concrete parse tree handed to the compiler.
//!
//! Numbers, widths and bit indices are kept as the raw source text; turning
//! them into values (and rejecting malformed ones) is the compiler's job.

/// Byte range into the source text
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Self::new(span.start(), span.end())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceFile {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Block(BlockDef),
    Test(TestDef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `block NAME (args) -> (rets) { stmts }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    pub name: Ident,
    pub args: Vec<Decl>,
    pub rets: Vec<Decl>,
    pub stmts: Vec<Instance>,
    pub span: Span,
}

/// `NAME dWIDTH`, e.g. `carry d1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub name: Ident,
    /// raw width token including the leading `d`
    pub width: String,
    pub span: Span,
}

/// `(args) OP -> rets;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub args: Vec<Expr>,
    pub op: Ident,
    pub rets: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Number(String),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub atom: Atom,
    pub index: Option<Index>,
    pub span: Span,
}

/// `[lo]` or `[lo..hi]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub lo: String,
    pub hi: Option<String>,
    pub span: Span,
}

/// `test NAME(BLOCK) { vectors }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDef {
    pub name: Ident,
    pub block: Ident,
    pub vectors: Vec<TestVectorDef>,
    pub span: Span,
}

/// `inputs ==> outputs;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestVectorDef {
    pub inputs: Vec<Expr>,
    pub outputs: Vec<Expr>,
    pub span: Span,
}
