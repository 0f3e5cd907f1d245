// Copyright 2025 Cornell University
// released under MIT License

use thiserror::Error;

use crate::syntax::Span;

/// Which side of an instantiation (or test vector) an expression is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Arg,
    Ret,
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Port::Arg => write!(f, "argument"),
            Port::Ret => write!(f, "return"),
        }
    }
}

/// The source text does not match the grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Errors raised while turning the parse tree into a `File`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Operator or test target not (yet) defined
    #[error("block '{name}' is not defined")]
    UnknownBlock { name: String, span: Span },
    #[error("low index ({lo}) is greater than high index ({hi})")]
    InvalidRange { lo: u32, hi: u32, span: Span },
    #[error("invalid bit index '{index}'")]
    InvalidIndex { index: String, span: Span },
    #[error("invalid literal '{literal}'")]
    LiteralFormat { literal: String, span: Span },
    #[error("invalid width '{width}' for '{name}'")]
    InvalidWidth {
        name: String,
        width: String,
        span: Span,
    },
    #[error("connection '{name}' is declared more than once")]
    DuplicateConnection { name: String, span: Span },
    #[error("block '{name}' is already defined")]
    DuplicateBlock { name: String, span: Span },
    #[error("test '{name}' is already defined")]
    DuplicateTest { name: String, span: Span },
    #[error("connections are not allowed in tests (found '{name}')")]
    ConnectionInTest { name: String, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::UnknownBlock { span, .. }
            | ResolveError::InvalidRange { span, .. }
            | ResolveError::InvalidIndex { span, .. }
            | ResolveError::LiteralFormat { span, .. }
            | ResolveError::InvalidWidth { span, .. }
            | ResolveError::DuplicateConnection { span, .. }
            | ResolveError::DuplicateBlock { span, .. }
            | ResolveError::DuplicateTest { span, .. }
            | ResolveError::ConnectionInTest { span, .. } => *span,
        }
    }
}

/// A `ResolveError` annotated with the block or test it occurred in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("block '{block}': {source}")]
    InBlock { block: String, source: ResolveError },
    #[error("test '{test}': {source}")]
    InTest { test: String, source: ResolveError },
}

impl CompileError {
    pub fn kind(&self) -> &ResolveError {
        match self {
            CompileError::InBlock { source, .. } | CompileError::InTest { source, .. } => source,
        }
    }
}

/// Inconsistent bit widths found by the type checker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidthError {
    #[error("expected d{expected}, got range [{lo}..{hi}] (d{width})")]
    RangeWidthMismatch {
        expected: u32,
        lo: u32,
        hi: u32,
        width: u64,
        span: Span,
    },
    /// Slice reaches past the end of the signal
    #[error("attempting to get range [{lo}..{hi}] of '{conn}' (d{width})")]
    RangeOverflow {
        conn: String,
        width: u32,
        lo: u32,
        hi: u32,
        span: Span,
    },
    #[error("expected d{expected}, got '{conn}' (d{width})")]
    WidthMismatch {
        expected: u32,
        conn: String,
        width: u32,
        span: Span,
    },
    #[error("literal '{value}' does not fit in d{expected}")]
    LiteralOverflow { value: i64, expected: u32, span: Span },
    #[error("width of connection '{conn}' cannot be determined")]
    UnresolvedWidth { conn: String, span: Span },
    #[error("'{op}' expects {expected} {port}(s), got {found}")]
    ArityMismatch {
        op: String,
        port: Port,
        expected: usize,
        found: usize,
        span: Span,
    },
}

impl WidthError {
    pub fn span(&self) -> Span {
        match self {
            WidthError::RangeWidthMismatch { span, .. }
            | WidthError::RangeOverflow { span, .. }
            | WidthError::WidthMismatch { span, .. }
            | WidthError::LiteralOverflow { span, .. }
            | WidthError::UnresolvedWidth { span, .. }
            | WidthError::ArityMismatch { span, .. } => *span,
        }
    }
}

/// A `WidthError` annotated with the block or test it occurred in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("block '{block}': {source}")]
    InBlock { block: String, source: WidthError },
    #[error("test '{test}': {source}")]
    InTest { test: String, source: WidthError },
}

impl TypeError {
    pub fn kind(&self) -> &WidthError {
        match self {
            TypeError::InBlock { source, .. } | TypeError::InTest { source, .. } => source,
        }
    }
}

/// Any failure of the parse -> compile -> type-check pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Error {
    /// Location in the source the error points at (if any)
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Io { .. } => None,
            Error::Parse(e) => Some(e.span),
            Error::Compile(e) => Some(e.kind().span()),
            Error::Type(e) => Some(e.kind().span()),
        }
    }
}
