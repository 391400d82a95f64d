//! Output writers - emit IR as Lua source.

pub mod builtins;
pub mod heuristics;
pub mod lua;

pub use lua::{EmitContext, LUA_WRITER, LuaWriter, LuaWriterImpl, Scope};
