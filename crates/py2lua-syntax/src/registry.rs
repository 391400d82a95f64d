//! Registry for readers and writers.
//!
//! The set is fixed at compile time; lookups are by language name or by
//! file extension.

use crate::traits::{Reader, Writer};

static READERS: &[&dyn Reader] = &[&crate::input::python::PYTHON_READER];

static WRITERS: &[&dyn Writer] = &[&crate::output::lua::LUA_WRITER];

/// Get a reader by language name.
pub fn reader_for_language(lang: &str) -> Option<&'static dyn Reader> {
    READERS.iter().find(|r| r.language() == lang).copied()
}

/// Get a reader by file extension (without the leading dot).
pub fn reader_for_extension(ext: &str) -> Option<&'static dyn Reader> {
    READERS
        .iter()
        .find(|r| r.extensions().contains(&ext))
        .copied()
}

/// Get a writer by language name.
pub fn writer_for_language(lang: &str) -> Option<&'static dyn Writer> {
    WRITERS.iter().find(|w| w.language() == lang).copied()
}

/// Get all registered readers.
pub fn readers() -> &'static [&'static dyn Reader] {
    READERS
}

/// Get all registered writers.
pub fn writers() -> &'static [&'static dyn Writer] {
    WRITERS
}
