// Copyright 2025 Cornell University
// released under MIT License

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;
use std::ops::{Index, IndexMut};

use crate::syntax::Span;

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TestId(u32);
entity_impl!(TestId, "test");

/// Connections are numbered per scope, a `ConnId` is only meaningful
/// together with the `Scope` that issued it.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ConnId(u32);
entity_impl!(ConnId, "conn");

/// A compiled source file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct File {
    blocks: PrimaryMap<BlockId, Block>,
    block_names: FxHashMap<String, BlockId>,
    tests: PrimaryMap<TestId, Test>,
    test_names: FxHashMap<String, TestId>,
}

impl File {
    /// Registers a block. Returns `None` if the name is taken.
    pub fn add_block(&mut self, block: Block) -> Option<BlockId> {
        if self.block_names.contains_key(&block.name) {
            return None;
        }
        let name = block.name.clone();
        let id = self.blocks.push(block);
        self.block_names.insert(name, id);
        Some(id)
    }

    /// Registers a test. Returns `None` if the name is taken.
    pub fn add_test(&mut self, test: Test) -> Option<TestId> {
        if self.test_names.contains_key(&test.name) {
            return None;
        }
        let name = test.name.clone();
        let id = self.tests.push(test);
        self.test_names.insert(name, id);
        Some(id)
    }

    pub fn block_id(&self, name: &str) -> Option<BlockId> {
        self.block_names.get(name).copied()
    }

    pub fn test_id(&self, name: &str) -> Option<TestId> {
        self.test_names.get(name).copied()
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.block_id(name).map(|id| &self.blocks[id])
    }

    pub fn test(&self, name: &str) -> Option<&Test> {
        self.test_id(name).map(|id| &self.tests[id])
    }

    /// block ids in definition order
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().collect()
    }

    /// test ids in definition order
    pub fn test_ids(&self) -> Vec<TestId> {
        self.tests.keys().collect()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter()
    }

    pub fn tests(&self) -> impl Iterator<Item = (TestId, &Test)> {
        self.tests.iter()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_tests(&self) -> usize {
        self.tests.len()
    }
}

impl Index<BlockId> for File {
    type Output = Block;

    fn index(&self, index: BlockId) -> &Self::Output {
        &self.blocks[index]
    }
}

impl IndexMut<BlockId> for File {
    fn index_mut(&mut self, index: BlockId) -> &mut Self::Output {
        &mut self.blocks[index]
    }
}

impl Index<TestId> for File {
    type Output = Test;

    fn index(&self, index: TestId) -> &Self::Output {
        &self.tests[index]
    }
}

/// A named operator definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    span: Span,
    args: Vec<ConnId>,
    rets: Vec<ConnId>,
    vars: Scope,
    stmts: Vec<Statement>,
}

impl Block {
    pub fn new(name: String, span: Span) -> Self {
        Self {
            name,
            span,
            args: Vec::new(),
            rets: Vec::new(),
            vars: Scope::default(),
            stmts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn args(&self) -> &[ConnId] {
        &self.args
    }

    pub fn rets(&self) -> &[ConnId] {
        &self.rets
    }

    /// every connection referenced in the block, including args and rets
    pub fn vars(&self) -> &Scope {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut Scope {
        &mut self.vars
    }

    pub fn stmts(&self) -> &[Statement] {
        &self.stmts
    }

    /// Declares a formal argument. Returns `None` if the name is taken.
    pub fn add_arg(&mut self, name: &str, width: Width, span: Span) -> Option<ConnId> {
        let id = self.vars.declare(name, width, span)?;
        self.args.push(id);
        Some(id)
    }

    /// Declares a formal return. Returns `None` if the name is taken.
    pub fn add_ret(&mut self, name: &str, width: Width, span: Span) -> Option<ConnId> {
        let id = self.vars.declare(name, width, span)?;
        self.rets.push(id);
        Some(id)
    }

    pub fn push_stmt(&mut self, stmt: Statement) {
        self.stmts.push(stmt);
    }

    pub fn arg_widths(&self) -> Vec<Width> {
        self.args.iter().map(|id| self.vars[*id].width()).collect()
    }

    pub fn ret_widths(&self) -> Vec<Width> {
        self.rets.iter().map(|id| self.vars[*id].width()).collect()
    }

    /// Split borrow used by the type checker: statements are read while
    /// connection widths are written.
    pub(crate) fn stmts_and_vars_mut(&mut self) -> (&[Statement], &mut Scope) {
        (&self.stmts, &mut self.vars)
    }
}

/// Owner of a set of named connections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    conns: PrimaryMap<ConnId, Conn>,
    by_name: FxHashMap<String, ConnId>,
}

impl Scope {
    /// Adds a new connection. Returns `None` if the name is already in scope.
    pub fn declare(&mut self, name: &str, width: Width, span: Span) -> Option<ConnId> {
        if self.by_name.contains_key(name) {
            return None;
        }
        let id = self.conns.push(Conn {
            name: name.to_string(),
            width,
            span,
        });
        self.by_name.insert(name.to_string(), id);
        Some(id)
    }

    /// Looks `name` up, implicitly declaring a connection of unknown width
    /// if it has not been seen yet. The flag is `true` for a fresh declaration.
    pub fn resolve_or_declare(&mut self, name: &str, span: Span) -> (ConnId, bool) {
        if let Some(id) = self.get(name) {
            return (id, false);
        }
        let id = self.conns.push(Conn {
            name: name.to_string(),
            width: Width::Unknown,
            span,
        });
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }

    pub fn get(&self, name: &str) -> Option<ConnId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// connections in the order they were first seen
    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &Conn)> {
        self.conns.iter()
    }

    /// names sorted alphabetically, for stable debug output
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Index<ConnId> for Scope {
    type Output = Conn;

    fn index(&self, index: ConnId) -> &Self::Output {
        &self.conns[index]
    }
}

impl IndexMut<ConnId> for Scope {
    fn index_mut(&mut self, index: ConnId) -> &mut Self::Output {
        &mut self.conns[index]
    }
}

impl Index<&str> for Scope {
    type Output = Conn;

    fn index(&self, index: &str) -> &Self::Output {
        &self.conns[self.by_name[index]]
    }
}

/// Bit width of a connection
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Width {
    Bits(u32),
    /// not determined yet, the type checker may resolve it
    Unknown,
}

impl Width {
    pub fn is_known(&self) -> bool {
        matches!(self, Width::Bits(_))
    }

    pub fn bits(&self) -> Option<u32> {
        match self {
            Width::Bits(w) => Some(*w),
            Width::Unknown => None,
        }
    }
}

/// A named signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conn {
    name: String,
    width: Width,
    span: Span,
}

impl Conn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// where the connection was declared or first used
    pub fn span(&self) -> Span {
        self.span
    }

    /// Fixes the width of an unresolved connection. A known width is kept.
    pub fn resolve(&mut self, bits: u32) -> bool {
        match self.width {
            Width::Unknown => {
                self.width = Width::Bits(bits);
                true
            }
            Width::Bits(_) => false,
        }
    }
}

/// One instantiation of a previously defined block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub op: BlockId,
    /// bound positionally to `op`'s args
    pub args: Vec<Expr>,
    /// bound positionally to `op`'s rets
    pub rets: Vec<Expr>,
    pub span: Span,
}

/// Inclusive bit range, `lo <= hi`
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct BitRange {
    lo: u32,
    hi: u32,
}

impl BitRange {
    pub fn new(lo: u32, hi: u32) -> Option<Self> {
        (lo <= hi).then_some(Self { lo, hi })
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    /// `[0..u32::MAX]` spans 2^32 bits, hence `u64`
    pub fn width(&self) -> u64 {
        u64::from(self.hi - self.lo) + 1
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ExprKind {
    Literal(i64),
    Conn(ConnId),
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: Option<BitRange>,
    pub span: Span,
}

impl Expr {
    pub fn literal(value: i64, span: Span) -> Self {
        Self {
            kind: ExprKind::Literal(value),
            range: None,
            span,
        }
    }

    pub fn conn(id: ConnId, span: Span) -> Self {
        Self {
            kind: ExprKind::Conn(id),
            range: None,
            span,
        }
    }

    pub fn with_range(self, range: BitRange) -> Self {
        Self {
            range: Some(range),
            ..self
        }
    }

    pub fn conn_id(&self) -> Option<ConnId> {
        match self.kind {
            ExprKind::Conn(id) => Some(id),
            ExprKind::Literal(_) => None,
        }
    }
}

/// A literal appearing in a test vector; it cannot refer to a connection
/// and, like every number, carries no bit range.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Literal {
    pub value: i64,
    pub span: Span,
}

/// A verification case bound to one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    pub name: String,
    pub block: BlockId,
    pub vectors: Vec<TestVector>,
    pub span: Span,
}

/// `inputs ==> expected outputs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestVector {
    pub inputs: Vec<Literal>,
    pub outputs: Vec<Literal>,
    pub span: Span,
}
