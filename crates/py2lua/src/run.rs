//! The translate pipeline behind the `py2lua` command.

use crate::config::{Config, ConfigError};
use py2lua_syntax::output::LUA_WRITER;
use py2lua_syntax::{ReadError, Writer, reader_for_extension};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub emit_ir: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("usage: py2lua <input.py> [-o <output>]: {0}")]
    Usage(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Syntax(#[from] ReadError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to serialize IR: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Usage(_) => 2,
            _ => 1,
        }
    }
}

/// `<stem>.lua` in the working directory.
pub fn default_output(input: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".lua");
    PathBuf::from(name)
}

pub fn run(args: &RunArgs) -> Result<(), RunError> {
    let extension = args
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    let Some(reader) = reader_for_extension(extension) else {
        return Err(RunError::Usage(format!(
            "expected a Python source file, got {}",
            args.input.display()
        )));
    };

    let source = std::fs::read_to_string(&args.input).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            RunError::NotFound(args.input.clone())
        } else {
            RunError::Read {
                path: args.input.clone(),
                source,
            }
        }
    })?;

    let cwd = std::env::current_dir().unwrap_or_default();
    let config = Config::load(args.config.as_deref(), &cwd)?;

    let program = reader.read(&source)?;
    tracing::debug!(
        input = %args.input.display(),
        statements = program.body.len(),
        "read {}",
        reader.language()
    );

    if args.emit_ir {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let lua = LUA_WRITER.write(&program, &config.emit);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    std::fs::write(&output, lua).map_err(|source| RunError::Write {
        path: output.clone(),
        source,
    })?;

    println!("Lua script generated: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(input: PathBuf, output: Option<PathBuf>) -> RunArgs {
        RunArgs {
            input,
            output,
            config: None,
            emit_ir: false,
        }
    }

    #[test]
    fn test_default_output_uses_stem() {
        assert_eq!(default_output(Path::new("src/app.py")), PathBuf::from("app.lua"));
        assert_eq!(
            default_output(Path::new("my.module.py")),
            PathBuf::from("my.module.lua")
        );
    }

    #[test]
    fn test_wrong_extension_is_usage_error() {
        let err = run(&args(PathBuf::from("script.rb"), None)).unwrap_err();
        assert!(matches!(err, RunError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("absent.py");
        let err = run(&args(input.clone(), None)).unwrap_err();
        assert_eq!(err.to_string(), format!("file not found: {}", input.display()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_syntax_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.py");
        let output = dir.path().join("bad.lua");
        std::fs::write(&input, "def (:\n").unwrap();

        let err = run(&args(input, Some(output.clone()))).unwrap_err();
        assert!(matches!(err, RunError::Syntax(ReadError::Syntax { .. })));
        assert!(err.to_string().starts_with("syntax error at 1:"));
        assert!(!output.exists());
    }

    #[test]
    fn test_writes_explicit_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("calc.py");
        let output = dir.path().join("out.lua");
        std::fs::write(&input, "x = 1 + 2\n").unwrap();

        run(&args(input, Some(output.clone()))).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "x = (1 + 2)\n");
    }
}
