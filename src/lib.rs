// Copyright 2025 Cornell University
// released under MIT License

pub mod compiler;
pub mod diagnostic;
pub mod errors;
pub mod ir;
pub mod parser;
pub mod pipeline;
pub mod syntax;
pub mod typecheck;

pub use compiler::compile;
pub use parser::parse_source;
pub use pipeline::{compile_file, compile_source};
pub use typecheck::type_check;
