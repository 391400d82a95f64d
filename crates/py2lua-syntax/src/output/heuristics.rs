//! Best-effort rewrites for well-known library call shapes.
//!
//! These match on names only; nothing here knows what a receiver really
//! is. Each rule has its own switch in [`crate::options::Heuristics`].

use crate::ir::Expr;

/// Receivers treated as HTTP clients.
const HTTP_CLIENTS: &[&str] = &["requests", "httpx", "session", "client", "http"];

const HTTP_VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

/// Receivers treated as web routers in decorator position.
const ROUTERS: &[&str] = &["app", "router", "bp", "blueprint", "api"];

const ROUTE_METHODS: &[&str] = &["route", "get", "post", "put", "patch", "delete"];

/// Lua standard library tables; calls on them always use dot syntax.
const LUA_LIBRARIES: &[&str] = &[
    "string",
    "table",
    "math",
    "os",
    "io",
    "coroutine",
    "utf8",
    "debug",
    "package",
];

/// A call recognized as an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpCall {
    /// `requests.get(...)`: the uppercased verb becomes the first argument.
    Verb(String),
    /// `requests.request(method, ...)`: arguments pass through unchanged.
    Generic,
}

/// Recognize `client.verb(...)` on a conventionally named HTTP client.
pub fn http_call(func: &Expr) -> Option<HttpCall> {
    let Expr::Attribute { value, attr } = func else {
        return None;
    };
    let client = value.as_name()?;
    if !HTTP_CLIENTS.contains(&client) {
        return None;
    }
    if attr == "request" {
        return Some(HttpCall::Generic);
    }
    HTTP_VERBS
        .contains(&attr.as_str())
        .then(|| HttpCall::Verb(attr.to_ascii_uppercase()))
}

/// Recognize `@app.route("/path")`, `@router.get(...)` and friends.
pub fn is_route_decorator(decorator: &Expr) -> bool {
    let func = match decorator {
        Expr::Call { func, .. } => func.as_ref(),
        other => other,
    };
    let Expr::Attribute { value, attr } = func else {
        return false;
    };
    value
        .as_name()
        .is_some_and(|router| ROUTERS.contains(&router))
        && ROUTE_METHODS.contains(&attr.as_str())
}

/// Whether `receiver.method(...)` should be emitted as `receiver:method(...)`.
///
/// `self` always qualifies. Other plain names qualify when they start
/// lowercase and are neither imported modules nor Lua libraries; attribute
/// chains follow their root name. Call results, subscripts and string
/// literals are assumed to be instances.
pub fn prefers_method_call(receiver: &Expr, imported: &[String]) -> bool {
    match receiver {
        Expr::Name { id } => {
            if id == "self" {
                return true;
            }
            let lowercase = id
                .chars()
                .next()
                .is_some_and(|c| c.is_lowercase() || c == '_');
            lowercase
                && !imported.iter().any(|name| name == id)
                && !LUA_LIBRARIES.contains(&id.as_str())
        }
        Expr::Attribute { value, .. } => prefers_method_call(value, imported),
        Expr::Call { .. } | Expr::Subscript { .. } => true,
        other => other.is_stringish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(receiver: &str, name: &str) -> Expr {
        Expr::attribute(Expr::name(receiver), name)
    }

    #[test]
    fn test_http_verbs() {
        assert_eq!(
            http_call(&attr("requests", "get")),
            Some(HttpCall::Verb("GET".into()))
        );
        assert_eq!(
            http_call(&attr("session", "delete")),
            Some(HttpCall::Verb("DELETE".into()))
        );
        assert_eq!(http_call(&attr("httpx", "request")), Some(HttpCall::Generic));
        assert_eq!(http_call(&attr("requests", "json")), None);
        assert_eq!(http_call(&attr("cache", "get")), None);
    }

    #[test]
    fn test_route_decorators() {
        let route = Expr::call(attr("app", "route"), vec![Expr::string("/")]);
        assert!(is_route_decorator(&route));
        assert!(is_route_decorator(&attr("router", "post")));
        assert!(!is_route_decorator(&attr("app", "teardown")));
        assert!(!is_route_decorator(&Expr::name("cached")));
    }

    #[test]
    fn test_method_call_receivers() {
        let imported = vec!["os".to_string()];
        assert!(prefers_method_call(&Expr::name("self"), &imported));
        assert!(prefers_method_call(&Expr::name("conn"), &imported));
        assert!(prefers_method_call(&attr("self", "items"), &imported));
        assert!(!prefers_method_call(&Expr::name("os"), &imported));
        assert!(!prefers_method_call(&attr("os", "path"), &imported));
        assert!(!prefers_method_call(&Expr::name("Point"), &imported));
        assert!(!prefers_method_call(&Expr::name("math"), &imported));
        assert!(prefers_method_call(&Expr::string(","), &imported));
    }
}
