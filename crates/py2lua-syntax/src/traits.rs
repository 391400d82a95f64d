//! Traits for language readers and writers.

use crate::ir::Program;
use crate::options::EmitOptions;

/// Error that can occur when reading source code into IR.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The source violates the grammar. Positions are 1-based.
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// The parser itself could not run.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A reader parses source code into the IR.
pub trait Reader: Send + Sync {
    /// Language identifier (e.g., "python").
    fn language(&self) -> &'static str;

    /// File extensions this reader handles (e.g., &["py"]).
    fn extensions(&self) -> &'static [&'static str];

    /// Parse source code into the IR.
    fn read(&self, source: &str) -> Result<Program, ReadError>;
}

/// A writer emits the IR as source code in a target language.
pub trait Writer: Send + Sync {
    /// Language identifier (e.g., "lua").
    fn language(&self) -> &'static str;

    /// File extension for output (e.g., "lua").
    fn extension(&self) -> &'static str;

    /// Emit the IR as source code.
    fn write(&self, program: &Program, options: &EmitOptions) -> String;
}
