//! Input side of the pipeline: parse Python, then lower it into the IR.

pub mod parse;
pub mod python;

pub use parse::{SyntaxTree, parse_python};
pub use python::{PYTHON_READER, PythonReader, read_python};
