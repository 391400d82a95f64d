//! Python to Lua source translation.
//!
//! `py2lua-syntax` parses Python 3 with tree-sitter, lowers the concrete
//! tree to a closed IR and writes that IR as Lua 5.4 source. It maps
//! syntax, not semantics: Python features with no Lua counterpart are
//! written as `py2lua:` comment markers or inert stubs instead of being
//! dropped.
//!
//! # Architecture
//!
//! ```text
//! Python source ─> SyntaxTree ─> Program ─> Lua source
//!                  (parse.rs)    (ir/)     (output/lua.rs)
//! ```
//!
//! # Example
//!
//! ```
//! use py2lua_syntax::{EmitOptions, transpile};
//!
//! let lua = transpile("x = 1 + 2", &EmitOptions::default()).unwrap();
//! assert_eq!(lua, "x = (1 + 2)\n");
//! ```

pub mod input;
pub mod ir;
pub mod options;
pub mod output;
pub mod registry;
pub mod traits;

// Re-exports: IR types
pub use ir::{BinaryOp, CmpOp, Constant, Expr, FunctionDef, Program, Stmt, UnaryOp};

// Re-exports: Options
pub use options::{EmitOptions, Heuristics};

// Re-exports: Traits
pub use traits::{ReadError, Reader, Writer};

// Re-exports: Registry
pub use registry::{reader_for_extension, reader_for_language, readers, writer_for_language, writers};

// Re-exports: Built-in reader and writer
pub use input::{PythonReader, read_python};
pub use output::{LuaWriter, LuaWriterImpl};

/// Translate Python source to Lua source.
///
/// Fails only when the source does not parse; every construct that parses
/// produces some output.
pub fn transpile(source: &str, options: &EmitOptions) -> Result<String, ReadError> {
    let program = read_python(source)?;
    Ok(LuaWriter::emit(&program, options))
}
