//! Python builtins and common methods with a direct Lua counterpart.

/// A call to a Python builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCall {
    /// Same arguments, different function.
    Rename(&'static str),
    /// `len(x)` -> `#x`
    Length,
    /// `int(x)` -> `math.floor(tonumber(x))`
    Int,
}

pub fn builtin_call(name: &str) -> Option<BuiltinCall> {
    let call = match name {
        "len" => BuiltinCall::Length,
        "int" => BuiltinCall::Int,
        "str" => BuiltinCall::Rename("tostring"),
        "float" => BuiltinCall::Rename("tonumber"),
        "abs" => BuiltinCall::Rename("math.abs"),
        "min" => BuiltinCall::Rename("math.min"),
        "max" => BuiltinCall::Rename("math.max"),
        _ => return None,
    };
    Some(call)
}

/// A method call rewritten to a library function taking the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCall {
    /// `xs.append(v)` -> `table.insert(xs, v)`
    TableInsert,
    /// `sep.join(xs)` -> `table.concat(xs, sep)`
    TableConcat,
    /// `s.upper()` -> `string.upper(s)`
    StringLib(&'static str),
}

/// Look up a method rewrite by name and positional argument count.
pub fn method_call(attr: &str, argc: usize) -> Option<MethodCall> {
    let call = match (attr, argc) {
        ("append", 1) => MethodCall::TableInsert,
        ("join", 1) => MethodCall::TableConcat,
        ("upper", 0) => MethodCall::StringLib("upper"),
        ("lower", 0) => MethodCall::StringLib("lower"),
        _ => return None,
    };
    Some(call)
}

const EXCEPTION_TYPES: &[&str] = &[
    "Exception",
    "BaseException",
    "ArithmeticError",
    "AssertionError",
    "AttributeError",
    "IOError",
    "IndexError",
    "KeyError",
    "LookupError",
    "NotImplementedError",
    "OSError",
    "RuntimeError",
    "StopIteration",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
];

/// Builtin exception classes; raising one becomes a plain `error` message.
pub fn is_exception_type(name: &str) -> bool {
    EXCEPTION_TYPES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_call("len"), Some(BuiltinCall::Length));
        assert_eq!(builtin_call("str"), Some(BuiltinCall::Rename("tostring")));
        assert_eq!(builtin_call("max"), Some(BuiltinCall::Rename("math.max")));
        assert_eq!(builtin_call("print"), None);
    }

    #[test]
    fn test_method_lookup_checks_arity() {
        assert_eq!(method_call("append", 1), Some(MethodCall::TableInsert));
        assert_eq!(method_call("append", 2), None);
        assert_eq!(method_call("upper", 0), Some(MethodCall::StringLib("upper")));
        assert!(is_exception_type("ValueError"));
        assert!(!is_exception_type("MyError"));
    }
}
