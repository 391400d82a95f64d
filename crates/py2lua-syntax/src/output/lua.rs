//! Lua writer for the IR.
//!
//! Emission is one recursive walk. Statements are written as whole lines
//! at the depth carried by [`EmitContext`]; expressions are written inline
//! and span several lines only when they lower to an immediately invoked
//! function. Python constructs without a Lua analogue come out as comments
//! or dead stubs tagged `py2lua:` so they can be found with grep.

use super::builtins::{self, BuiltinCall, MethodCall};
use super::heuristics::{self, HttpCall};
use crate::ir::*;
use crate::options::{EmitOptions, Heuristics};
use crate::traits::Writer;
use std::borrow::Cow;

/// Static instance of the Lua writer for registry.
pub static LUA_WRITER: LuaWriterImpl = LuaWriterImpl;

/// Lua writer implementing the Writer trait.
pub struct LuaWriterImpl;

impl Writer for LuaWriterImpl {
    fn language(&self) -> &'static str {
        "lua"
    }

    fn extension(&self) -> &'static str {
        "lua"
    }

    fn write(&self, program: &Program, options: &EmitOptions) -> String {
        LuaWriter::emit(program, options)
    }
}

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

fn is_lua_keyword(name: &str) -> bool {
    LUA_KEYWORDS.contains(&name)
}

/// A Python identifier as a Lua identifier; Lua keywords get a `_` suffix.
pub fn lua_name(name: &str) -> Cow<'_, str> {
    if is_lua_keyword(name) {
        Cow::Owned(format!("{name}_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Whether `text` can be used bare as a table key.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_lua_keyword(text)
}

/// Quote `text` as a double-quoted Lua string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Three digits so a following digit is not absorbed.
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn lua_binary_op(op: BinaryOp) -> Option<&'static str> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "^",
        BinaryOp::LShift => "<<",
        BinaryOp::RShift => ">>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "~",
        BinaryOp::MatMul => return None,
    };
    Some(symbol)
}

fn lua_compare_op(op: CmpOp) -> Option<&'static str> {
    let symbol = match op {
        CmpOp::Eq | CmpOp::Is => "==",
        CmpOp::NotEq | CmpOp::IsNot => "~=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        CmpOp::In | CmpOp::NotIn => return None,
    };
    Some(symbol)
}

/// Integer literal value, including a negated one.
fn int_literal(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Constant {
            value: Constant::Int(text),
        } => text.parse().ok(),
        Expr::UnaryOp {
            op: UnaryOp::Neg,
            operand,
        } => int_literal(operand).map(|n| -n),
        _ => None,
    }
}

fn continue_label(loops: usize) -> String {
    if loops <= 1 {
        "continue".to_string()
    } else {
        format!("continue_{loops}")
    }
}

/// The construct whose body is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Module,
    Function,
    Method,
    Class,
    Lambda,
    Comprehension,
}

/// Per-node emission state, passed by value down the recursion.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    /// Indentation level of the statements being written.
    pub depth: usize,
    pub scope: Scope,
    /// Qualified Lua name of the enclosing class.
    pub class: Option<&'a str>,
    /// First base of the enclosing class, as Lua text.
    pub base: Option<&'a str>,
    /// Loops enclosing this point within the current function.
    pub loops: usize,
    /// Inside the `pcall` closure of a `with` body.
    pub in_with: bool,
}

impl<'a> EmitContext<'a> {
    pub fn module() -> Self {
        Self {
            depth: 0,
            scope: Scope::Module,
            class: None,
            base: None,
            loops: 0,
            in_with: false,
        }
    }

    fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    fn enter_loop(self) -> Self {
        Self {
            depth: self.depth + 1,
            loops: self.loops + 1,
            ..self
        }
    }

    fn enter_function(self, scope: Scope) -> Self {
        Self {
            depth: self.depth + 1,
            scope,
            loops: 0,
            in_with: false,
            ..self
        }
    }

    /// The class whose body is being written directly.
    fn class_body(&self) -> Option<&'a str> {
        self.class.filter(|_| self.scope == Scope::Class)
    }
}

/// What a comprehension adds to its result table.
enum Accumulate<'e> {
    List(&'e Expr),
    Set(&'e Expr),
    Dict(&'e Expr, &'e Expr),
}

/// Emits IR as Lua source code.
pub struct LuaWriter<'p> {
    output: String,
    indent_width: usize,
    heuristics: Heuristics,
    imported: &'p [String],
}

impl<'p> LuaWriter<'p> {
    pub fn new(options: &EmitOptions, imported: &'p [String]) -> Self {
        Self {
            output: String::new(),
            indent_width: options.indent_width,
            heuristics: options.heuristics,
            imported,
        }
    }

    /// Emit a program to Lua source.
    pub fn emit(program: &Program, options: &EmitOptions) -> String {
        let mut writer = LuaWriter::new(options, &program.imported);
        writer.write_block(&program.body, EmitContext::module(), false);
        tracing::debug!(bytes = writer.output.len(), "emitted lua");
        writer.output
    }

    fn write_indent(&mut self, depth: usize) {
        for _ in 0..depth * self.indent_width {
            self.output.push(' ');
        }
    }

    fn line(&mut self, depth: usize, text: &str) {
        self.write_indent(depth);
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn marker(&mut self, depth: usize, text: &str) {
        self.line(depth, &format!("-- py2lua: {text}"));
    }

    fn write_marker_expr(&mut self, text: &str) {
        self.output.push_str("nil --[[ py2lua: ");
        self.output.push_str(text);
        self.output.push_str(" ]]");
    }

    /// Render an expression into its own string.
    fn render(&mut self, expr: &Expr, ctx: EmitContext<'_>) -> String {
        let saved = std::mem::take(&mut self.output);
        self.write_expr(expr, ctx);
        std::mem::replace(&mut self.output, saved)
    }

    fn render_prefix(&mut self, expr: &Expr, ctx: EmitContext<'_>) -> String {
        let saved = std::mem::take(&mut self.output);
        self.write_prefix(expr, ctx);
        std::mem::replace(&mut self.output, saved)
    }

    /// A tuple as a Lua expression list, anything else as one expression.
    fn render_values(&mut self, expr: &Expr, ctx: EmitContext<'_>) -> String {
        match expr {
            Expr::Tuple { elts } => elts
                .iter()
                .map(|e| self.render(e, ctx))
                .collect::<Vec<_>>()
                .join(", "),
            other => self.render(other, ctx),
        }
    }

    fn write_block(&mut self, body: &[Stmt], ctx: EmitContext<'_>, has_tail: bool) {
        for (i, stmt) in body.iter().enumerate() {
            let last = !has_tail && i + 1 == body.len();
            self.write_stmt(stmt, ctx, last);
        }
    }

    fn write_stmt(&mut self, stmt: &Stmt, ctx: EmitContext<'_>, last: bool) {
        match stmt {
            Stmt::Expr { value } => self.write_expr_stmt(value, ctx),

            Stmt::Assign { targets, value } => self.write_assign(targets, value, ctx),

            Stmt::AugAssign { target, op, value } => {
                let combined = Expr::binary(target.clone(), *op, value.clone());
                self.write_single_assign(target, &combined, ctx);
            }

            Stmt::If { test, body, orelse } => self.write_if(test, body, orelse, ctx),

            Stmt::While {
                test,
                body,
                orelse,
                has_continue,
            } => {
                let cond = self.render(test, ctx);
                self.line(ctx.depth, &format!("while {cond} do"));
                self.write_loop_body(body, *has_continue, ctx.enter_loop());
                self.line(ctx.depth, "end");
                self.write_loop_else(orelse, "while", ctx);
            }

            Stmt::For {
                target,
                iter,
                body,
                orelse,
                has_continue,
                is_async,
            } => {
                if *is_async {
                    self.marker(ctx.depth, "async for not supported, iterating synchronously");
                }
                self.write_for_header(target, iter, ctx);
                self.write_loop_body(body, *has_continue, ctx.enter_loop());
                self.line(ctx.depth, "end");
                self.write_loop_else(orelse, "for", ctx);
            }

            Stmt::FunctionDef(def) => self.write_function_def(def, ctx),

            Stmt::ClassDef(def) => self.write_class_def(def, ctx),

            Stmt::Return { value } => {
                let value = value.as_ref().map(|v| self.render(v, ctx));
                // Inside a `with` closure the value is boxed so the caller
                // can tell a return from falling off the end.
                let text = match (value, ctx.in_with) {
                    (Some(value), false) => format!("return {value}"),
                    (None, false) => "return".to_string(),
                    (Some(value), true) => format!("return {{{value}}}"),
                    (None, true) => "return {}".to_string(),
                };
                // `return` must close its block.
                if last {
                    self.line(ctx.depth, &text);
                } else {
                    self.line(ctx.depth, &format!("do {text} end"));
                }
            }

            Stmt::Raise { exc, cause } => self.write_raise(exc.as_ref(), cause.is_some(), ctx),

            Stmt::Assert { test, msg } => {
                let test = self.render(test, ctx);
                match msg {
                    Some(msg) => {
                        let msg = self.render(msg, ctx);
                        self.line(ctx.depth, &format!("assert({test}, {msg})"));
                    }
                    None => self.line(ctx.depth, &format!("assert({test})")),
                }
            }

            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => self.write_try(body, handlers, orelse, finalbody, ctx),

            Stmt::With {
                items,
                body,
                is_async,
            } => self.write_with(items, body, *is_async, ctx),

            Stmt::Import { names } => {
                let names = render_aliases(names);
                self.marker(ctx.depth, &format!("import not supported: import {names}"));
            }

            Stmt::ImportFrom {
                module,
                names,
                level,
            } => {
                let module = format!("{}{}", ".".repeat(*level), module.as_deref().unwrap_or(""));
                let names = render_aliases(names);
                self.marker(
                    ctx.depth,
                    &format!("import not supported: from {module} import {names}"),
                );
            }

            Stmt::Global { names } => {
                self.marker(ctx.depth, &format!("global {}", names.join(", ")));
            }

            Stmt::Nonlocal { names } => {
                self.marker(ctx.depth, &format!("nonlocal {}", names.join(", ")));
            }

            Stmt::Delete { targets } => {
                for target in targets {
                    let elts = match target {
                        Expr::Tuple { elts } | Expr::List { elts } => elts.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    for elt in elts {
                        let lhs = self.render_target(elt, ctx);
                        self.line(ctx.depth, &format!("{lhs} = nil"));
                    }
                }
            }

            Stmt::Break => {
                if ctx.loops == 0 {
                    self.marker(ctx.depth, "break outside a Lua loop not supported");
                } else if last {
                    self.line(ctx.depth, "break");
                } else {
                    self.line(ctx.depth, "do break end");
                }
            }

            Stmt::Continue => {
                if ctx.loops == 0 {
                    self.marker(ctx.depth, "continue outside a Lua loop not supported");
                } else {
                    let label = continue_label(ctx.loops);
                    self.line(ctx.depth, &format!("goto {label}"));
                }
            }

            Stmt::Pass => {}

            Stmt::Unhandled { kind, text } => {
                self.marker(ctx.depth, &format!("unhandled {kind}: {text}"));
            }
        }
    }

    fn write_expr_stmt(&mut self, value: &Expr, ctx: EmitContext<'_>) {
        match value {
            // Docstrings and other bare strings
            Expr::Constant {
                value: Constant::Str(text),
            } => {
                for line in text.trim().lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        self.line(ctx.depth, "--");
                    } else {
                        self.line(ctx.depth, &format!("-- {line}"));
                    }
                }
            }

            // `...` as a placeholder body
            Expr::Constant {
                value: Constant::Ellipsis,
            } => {}

            Expr::YieldFrom { value } => {
                self.marker(
                    ctx.depth,
                    "yield from re-yields each element, the delegate's return value is lost",
                );
                let source = self.render(value, ctx);
                self.line(ctx.depth, &format!("for _, _v in ipairs({source}) do"));
                self.line(ctx.depth + 1, "coroutine.yield(_v)");
                self.line(ctx.depth, "end");
            }

            Expr::Await { value } => {
                self.marker(ctx.depth, "await not supported, called synchronously");
                self.write_expr_stmt(value, ctx);
            }

            _ => {
                let text = self.render(value, ctx);
                let is_call = matches!(value, Expr::Call { .. } | Expr::Yield { .. })
                    && text.ends_with(')')
                    && !text.starts_with('#');
                if !is_call {
                    self.line(ctx.depth, &format!("local _ = {text}"));
                } else if text.starts_with('(') {
                    // Keeps Lua from reading it as a call on the previous line.
                    self.line(ctx.depth, &format!(";{text}"));
                } else {
                    self.line(ctx.depth, &text);
                }
            }
        }
    }

    fn render_target(&mut self, target: &Expr, ctx: EmitContext<'_>) -> String {
        match target {
            Expr::Name { id } => match ctx.class_body() {
                Some(class) => format!("{class}.{}", lua_name(id)),
                None => lua_name(id).into_owned(),
            },
            Expr::Starred { value } => self.render_target(value, ctx),
            other => self.render(other, ctx),
        }
    }

    fn write_assign(&mut self, targets: &[Expr], value: &Expr, ctx: EmitContext<'_>) {
        match targets {
            [] => {}
            [target] => self.write_single_assign(target, value, ctx),
            // `a = b = value` evaluates `value` once.
            _ => {
                self.line(ctx.depth, "do");
                let inner = ctx.nested();
                let value = self.render(value, inner);
                self.line(inner.depth, &format!("local _v = {value}"));
                let temp = Expr::name("_v");
                for target in targets {
                    self.write_single_assign(target, &temp, inner);
                }
                self.line(ctx.depth, "end");
            }
        }
    }

    fn write_single_assign(&mut self, target: &Expr, value: &Expr, ctx: EmitContext<'_>) {
        match target {
            Expr::Tuple { elts } | Expr::List { elts } => {
                if elts.iter().any(|e| matches!(e, Expr::Starred { .. })) {
                    self.marker(
                        ctx.depth,
                        "starred assignment not supported, the starred name receives one value",
                    );
                }
                let lhs = elts
                    .iter()
                    .map(|e| self.render_target(e, ctx))
                    .collect::<Vec<_>>()
                    .join(", ");
                let rhs = match value {
                    Expr::Tuple { elts: values } | Expr::List { elts: values }
                        if values.len() == elts.len() =>
                    {
                        values
                            .iter()
                            .map(|v| self.render(v, ctx))
                            .collect::<Vec<_>>()
                            .join(", ")
                    }
                    other => format!("table.unpack({})", self.render(other, ctx)),
                };
                self.line(ctx.depth, &format!("{lhs} = {rhs}"));
            }
            Expr::Subscript { index, .. } if matches!(index.as_ref(), Expr::Slice { .. }) => {
                let lhs = self.render(target, ctx);
                self.marker(ctx.depth, &format!("slice assignment not supported: {lhs}"));
            }
            _ => {
                let lhs = self.render_target(target, ctx);
                let rhs = self.render(value, ctx);
                self.line(ctx.depth, &format!("{lhs} = {rhs}"));
            }
        }
    }

    fn write_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt], ctx: EmitContext<'_>) {
        let cond = self.render(test, ctx);
        self.line(ctx.depth, &format!("if {cond} then"));
        self.write_block(body, ctx.nested(), false);

        let mut orelse = orelse;
        loop {
            match orelse {
                [] => break,
                [Stmt::If { test, body, orelse: next }] => {
                    let cond = self.render(test, ctx);
                    self.line(ctx.depth, &format!("elseif {cond} then"));
                    self.write_block(body, ctx.nested(), false);
                    orelse = next.as_slice();
                }
                rest => {
                    self.line(ctx.depth, "else");
                    self.write_block(rest, ctx.nested(), false);
                    break;
                }
            }
        }

        self.line(ctx.depth, "end");
    }

    /// Loop body at `inner.depth`. A `continue` target wraps the body in
    /// `do ... end` so the label never sits inside the scope of a body local.
    fn write_loop_body(&mut self, body: &[Stmt], has_continue: bool, inner: EmitContext<'_>) {
        if has_continue {
            self.line(inner.depth, "do");
            self.write_block(body, inner.nested(), false);
            self.line(inner.depth, "end");
            self.line(inner.depth, &format!("::{}::", continue_label(inner.loops)));
        } else {
            self.write_block(body, inner, false);
        }
    }

    fn write_loop_else(&mut self, orelse: &[Stmt], keyword: &str, ctx: EmitContext<'_>) {
        if orelse.is_empty() {
            return;
        }
        self.marker(
            ctx.depth,
            &format!("{keyword}/else not supported, the else clause never runs"),
        );
        self.line(ctx.depth, "if false then");
        self.write_block(orelse, ctx.nested(), false);
        self.line(ctx.depth, "end");
    }

    /// Write the `for ... do` line for `target in iter`, plus any lines
    /// binding the Python target at the top of the body.
    fn write_for_header(&mut self, target: &Expr, iter: &Expr, ctx: EmitContext<'_>) {
        let body_depth = ctx.depth + 1;

        if let Some(range) = self.numeric_range(target, iter, ctx) {
            self.line(ctx.depth, &format!("for {range} do"));
            return;
        }

        if let Expr::Call {
            func,
            args,
            keywords,
        } = iter
        {
            if args.is_empty() && keywords.is_empty() {
                if let Expr::Attribute { value, attr } = func.as_ref() {
                    if matches!(attr.as_str(), "items" | "keys" | "values") {
                        let mapping = self.render(value, ctx);
                        self.write_mapping_loop(attr, &mapping, target, ctx);
                        return;
                    }
                }
            }

            if keywords.is_empty() && func.as_name() == Some("enumerate") {
                if let ([sequence], Expr::Tuple { elts }) = (args.as_slice(), target) {
                    if let [Expr::Name { id: index }, item] = elts.as_slice() {
                        let sequence = self.render(sequence, ctx);
                        let (var, binding) = self.loop_target(item, ctx.nested());
                        self.line(ctx.depth, &format!("for _i, {var} in ipairs({sequence}) do"));
                        self.line(body_depth, &format!("local {} = _i - 1", lua_name(index)));
                        if let Some(binding) = binding {
                            self.line(body_depth, &binding);
                        }
                        return;
                    }
                }
            }
        }

        let sequence = self.render(iter, ctx);
        let (var, binding) = self.loop_target(target, ctx.nested());
        self.line(ctx.depth, &format!("for _, {var} in ipairs({sequence}) do"));
        if let Some(binding) = binding {
            self.line(body_depth, &binding);
        }
    }

    /// `for i in range(...)` as a numeric for header (without `for`/`do`).
    fn numeric_range(
        &mut self,
        target: &Expr,
        iter: &Expr,
        ctx: EmitContext<'_>,
    ) -> Option<String> {
        let Expr::Name { id } = target else {
            return None;
        };
        let Expr::Call {
            func,
            args,
            keywords,
        } = iter
        else {
            return None;
        };
        if func.as_name() != Some("range")
            || !keywords.is_empty()
            || args.iter().any(|a| matches!(a, Expr::Starred { .. }))
        {
            return None;
        }

        let var = lua_name(id).into_owned();
        let header = match args.as_slice() {
            [stop] => {
                let stop = self.offset(stop, -1, ctx);
                format!("{var} = 0, {stop}")
            }
            [start, stop] => {
                let start = self.render(start, ctx);
                let stop = self.offset(stop, -1, ctx);
                format!("{var} = {start}, {stop}")
            }
            [start, stop, step] => {
                // Python's stop is exclusive; Lua's limit is inclusive.
                let descending = int_literal(step).is_some_and(|s| s < 0);
                let start = self.render(start, ctx);
                let stop = self.offset(stop, if descending { 1 } else { -1 }, ctx);
                let step = self.render(step, ctx);
                format!("{var} = {start}, {stop}, {step}")
            }
            _ => return None,
        };
        Some(header)
    }

    /// `expr + delta`, folded when `expr` is an integer literal that
    /// stays in range.
    fn offset(&mut self, expr: &Expr, delta: i64, ctx: EmitContext<'_>) -> String {
        if let Some(n) = int_literal(expr).and_then(|n| n.checked_add(delta)) {
            return n.to_string();
        }
        let text = self.render(expr, ctx);
        if delta < 0 {
            format!("{text} - {}", -delta)
        } else {
            format!("{text} + {delta}")
        }
    }

    fn write_mapping_loop(
        &mut self,
        method: &str,
        mapping: &str,
        target: &Expr,
        ctx: EmitContext<'_>,
    ) {
        let body_depth = ctx.depth + 1;

        if method == "items" {
            if let Expr::Tuple { elts } | Expr::List { elts } = target {
                if let [Expr::Name { id: key }, Expr::Name { id: value }] = elts.as_slice() {
                    let (key, value) = (lua_name(key), lua_name(value));
                    self.line(
                        ctx.depth,
                        &format!("for {key}, {value} in pairs({mapping}) do"),
                    );
                    return;
                }
            }
            self.line(ctx.depth, &format!("for _k, _v in pairs({mapping}) do"));
            self.line(body_depth, "local _item = { _k, _v }");
            let (var, binding) = self.loop_target(target, ctx.nested());
            match binding {
                Some(binding) => self.line(body_depth, &binding),
                None => self.line(body_depth, &format!("local {var} = _item")),
            }
            return;
        }

        let (var, binding) = self.loop_target(target, ctx.nested());
        let header = if method == "keys" {
            format!("for {var} in pairs({mapping}) do")
        } else {
            format!("for _, {var} in pairs({mapping}) do")
        };
        self.line(ctx.depth, &header);
        if let Some(binding) = binding {
            self.line(body_depth, &binding);
        }
    }

    /// Lua loop variable for a Python target, plus a line binding the
    /// target from it when the target is not a plain name.
    fn loop_target(&mut self, target: &Expr, ctx: EmitContext<'_>) -> (String, Option<String>) {
        match target {
            Expr::Name { id } => (lua_name(id).into_owned(), None),
            Expr::Tuple { elts } | Expr::List { elts } => {
                let names: Option<Vec<_>> = elts.iter().map(|e| e.as_name().map(lua_name)).collect();
                let binding = match names {
                    Some(names) => format!("local {} = table.unpack(_item)", names.join(", ")),
                    None => {
                        let targets = elts
                            .iter()
                            .map(|e| self.render_target(e, ctx))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("{targets} = table.unpack(_item)")
                    }
                };
                ("_item".to_string(), Some(binding))
            }
            other => {
                let lhs = self.render_target(other, ctx);
                ("_item".to_string(), Some(format!("{lhs} = _item")))
            }
        }
    }

    fn write_function_def(&mut self, def: &FunctionDef, ctx: EmitContext<'_>) {
        let class = ctx.class_body();

        // Methods taking `self` (or `cls`) use colon syntax.
        let receiver = match (class, def.params.first()) {
            (Some(_), Some(first))
                if first.kind == ParamKind::Positional
                    && first.default.is_none()
                    && (first.name == "self" || first.name == "cls") =>
            {
                Some(first.name.as_str())
            }
            _ => None,
        };
        let params = if receiver.is_some() {
            &def.params[1..]
        } else {
            &def.params[..]
        };

        let member = lua_name(&def.name);
        let (qualified, header) = match class {
            Some(class) => {
                let qualified = format!("{class}.{member}");
                let header = if receiver.is_some() {
                    format!("{class}:{member}")
                } else {
                    qualified.clone()
                };
                (qualified, header)
            }
            None => (member.to_string(), member.to_string()),
        };

        if def.is_async {
            self.marker(ctx.depth, "async def not supported, runs synchronously");
        }
        if contains_yield(&def.body) {
            self.marker(
                ctx.depth,
                &format!("generator, iterate it with coroutine.wrap({qualified})"),
            );
        }

        let scope = if class.is_some() {
            Scope::Method
        } else {
            Scope::Function
        };
        let inner = ctx.enter_function(scope);
        let signature = render_params(params);
        self.line(ctx.depth, &format!("function {header}({signature})"));
        if receiver == Some("cls") {
            self.line(inner.depth, "local cls = self");
        }
        self.write_prologue(params, &def.locals, inner);
        self.write_block(&def.body, inner, false);
        self.line(ctx.depth, "end");

        self.write_decorators(&def.decorators, &qualified, ctx);
    }

    /// Parameter defaults, the `*args` table, the `**kwargs` table and the
    /// hoisted locals, at the top of a function body.
    fn write_prologue(&mut self, params: &[Param], locals: &[String], ctx: EmitContext<'_>) {
        let varargs = params.iter().find(|p| p.kind == ParamKind::VarArgs);
        if let Some(varargs) = varargs {
            self.line(
                ctx.depth,
                &format!("local {} = {{ ... }}", lua_name(&varargs.name)),
            );
        }

        for param in params {
            if let Some(default) = &param.default {
                let name = lua_name(&param.name);
                let default = self.render(default, ctx);
                self.line(
                    ctx.depth,
                    &format!("if {name} == nil then {name} = {default} end"),
                );
            }
        }

        if let Some(kwargs) = params.iter().find(|p| p.kind == ParamKind::KwArgs) {
            let name = lua_name(&kwargs.name);
            if varargs.is_some() {
                self.marker(
                    ctx.depth,
                    &format!("**{} alongside *args not supported, keywords are not collected", kwargs.name),
                );
                self.line(ctx.depth, &format!("local {name} = {{}}"));
            } else {
                self.line(ctx.depth, &format!("{name} = {name} or {{}}"));
            }
        }

        if !locals.is_empty() {
            let names: Vec<_> = locals.iter().map(|n| lua_name(n)).collect();
            self.line(ctx.depth, &format!("local {}", names.join(", ")));
        }
    }

    /// Reassign `target` through each decorator, innermost first.
    fn write_decorators(&mut self, decorators: &[Expr], target: &str, ctx: EmitContext<'_>) {
        for decorator in decorators.iter().rev() {
            match decorator.as_name() {
                Some("staticmethod" | "classmethod") => continue,
                Some("property") => {
                    self.marker(
                        ctx.depth,
                        &format!("@property not supported, {target} stays a method"),
                    );
                    continue;
                }
                _ => {}
            }

            if self.heuristics.route_decorators && heuristics::is_route_decorator(decorator) {
                let route = self.render(decorator, ctx);
                self.marker(
                    ctx.depth,
                    &format!("route decorator {route} not supported, register {target} manually"),
                );
                continue;
            }

            let decorator = self.render_prefix(decorator, ctx);
            self.line(ctx.depth, &format!("{target} = {decorator}({target})"));
        }
    }

    fn write_class_def(&mut self, def: &ClassDef, ctx: EmitContext<'_>) {
        let name = match ctx.class_body() {
            Some(outer) => format!("{outer}.{}", lua_name(&def.name)),
            None => lua_name(&def.name).into_owned(),
        };
        let bases: Vec<String> = def.bases.iter().map(|b| self.render(b, ctx)).collect();

        if let [first, _, ..] = bases.as_slice() {
            self.marker(
                ctx.depth,
                &format!(
                    "multiple inheritance not supported (bases: {}), only {first} is inherited",
                    bases.join(", ")
                ),
            );
        }

        self.line(ctx.depth, &format!("{name} = {name} or {{}}"));
        self.line(ctx.depth, &format!("{name}.__index = {name}"));
        let call = "__call = function(cls, ...) return cls:new(...) end";
        match bases.first() {
            Some(base) => self.line(
                ctx.depth,
                &format!("setmetatable({name}, {{ __index = {base}, {call} }})"),
            ),
            None => self.line(ctx.depth, &format!("setmetatable({name}, {{ {call} }})")),
        }

        let has_init = def
            .body
            .iter()
            .any(|s| matches!(s, Stmt::FunctionDef(f) if f.name == "__init__"));
        let body_depth = ctx.depth + 1;
        if has_init || !bases.is_empty() {
            self.line(ctx.depth, &format!("function {name}:new(...)"));
            self.line(body_depth, "local o = setmetatable({}, self)");
            if has_init {
                self.line(body_depth, "o:__init__(...)");
            } else {
                self.line(body_depth, "if o.__init__ then o:__init__(...) end");
            }
            self.line(body_depth, "return o");
        } else {
            self.line(ctx.depth, &format!("function {name}:new(o)"));
            self.line(body_depth, "o = o or {}");
            self.line(body_depth, "setmetatable(o, self)");
            self.line(body_depth, "return o");
        }
        self.line(ctx.depth, "end");

        let inner = EmitContext {
            scope: Scope::Class,
            class: Some(name.as_str()),
            base: bases.first().map(String::as_str),
            ..ctx
        };
        self.write_block(&def.body, inner, false);

        self.write_decorators(&def.decorators, &name, ctx);
    }

    fn write_raise(&mut self, exc: Option<&Expr>, has_cause: bool, ctx: EmitContext<'_>) {
        if has_cause {
            self.marker(ctx.depth, "raise ... from not supported, the cause is dropped");
        }

        let Some(exc) = exc else {
            self.marker(ctx.depth, "bare raise not supported, raising a generic error");
            self.line(ctx.depth, "error(\"re-raised exception\")");
            return;
        };

        let message = match exc {
            Expr::Name { id } if builtins::is_exception_type(id) => quote(id),
            Expr::Call { func, args, .. } => match (func.as_name(), args.as_slice()) {
                (Some(id), []) if builtins::is_exception_type(id) => quote(id),
                (
                    Some(id),
                    [Expr::Constant {
                        value: Constant::Str(text),
                    }],
                ) if builtins::is_exception_type(id) => quote(&format!("{id}: {text}")),
                (Some(id), [arg]) if builtins::is_exception_type(id) => {
                    let arg = self.render(arg, ctx);
                    format!("{} .. tostring({arg})", quote(&format!("{id}: ")))
                }
                _ => self.render(exc, ctx),
            },
            other => self.render(other, ctx),
        };
        self.line(ctx.depth, &format!("error({message})"));
    }

    fn write_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        ctx: EmitContext<'_>,
    ) {
        self.marker(ctx.depth, "try/except not supported, wrap the body in pcall to catch errors");
        self.line(ctx.depth, "do");
        self.write_block(body, ctx.nested(), false);
        self.line(ctx.depth, "end");

        for handler in handlers {
            let mut clause = String::from("except");
            if let Some(type_) = &handler.type_ {
                clause.push(' ');
                clause.push_str(&self.render(type_, ctx));
            }
            if let Some(name) = &handler.name {
                clause.push_str(" as ");
                clause.push_str(name);
            }
            self.line(ctx.depth, &format!("if false then -- {clause}"));
            self.write_block(&handler.body, ctx.nested(), false);
            self.line(ctx.depth, "end");
        }

        if !orelse.is_empty() {
            self.line(ctx.depth, "do -- else");
            self.write_block(orelse, ctx.nested(), false);
            self.line(ctx.depth, "end");
        }

        if !finalbody.is_empty() {
            self.line(ctx.depth, "do -- finally");
            self.write_block(finalbody, ctx.nested(), false);
            self.line(ctx.depth, "end");
        }
    }

    fn write_with(
        &mut self,
        items: &[WithItem],
        body: &[Stmt],
        is_async: bool,
        ctx: EmitContext<'_>,
    ) {
        if is_async {
            self.marker(ctx.depth, "async with not supported, entered synchronously");
        }
        self.marker(
            ctx.depth,
            "with not supported, __enter__ and __exit__ are not called",
        );
        self.line(ctx.depth, "do");

        let inner = ctx.nested();
        for item in items {
            match &item.target {
                Some(target) => self.write_single_assign(target, &item.context, inner),
                None => {
                    let context = self.render(&item.context, inner);
                    self.line(inner.depth, &format!("local _ = {context}"));
                }
            }
        }

        // The body runs in a closure: no enclosing Lua loop is visible.
        let body_ctx = EmitContext {
            depth: inner.depth + 1,
            loops: 0,
            in_with: true,
            ..inner
        };
        if contains_return(body) {
            self.line(inner.depth, "local _ok, _r = pcall(function()");
            self.write_block(body, body_ctx, false);
            self.line(inner.depth, "end)");
            self.line(inner.depth, "if not _ok then error(_r, 0) end");
            if ctx.in_with {
                self.line(inner.depth, "if _r ~= nil then return _r end");
            } else {
                self.line(inner.depth, "if _r ~= nil then return _r[1] end");
            }
        } else {
            self.line(inner.depth, "local _ok, _err = pcall(function()");
            self.write_block(body, body_ctx, false);
            self.line(inner.depth, "end)");
            self.line(inner.depth, "if not _ok then error(_err, 0) end");
        }
        self.line(ctx.depth, "end");
    }

    /// Expressions that can be called or indexed are written as is,
    /// anything else is parenthesized.
    fn write_prefix(&mut self, expr: &Expr, ctx: EmitContext<'_>) {
        match expr {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Call { .. } => {
                self.write_expr(expr, ctx)
            }
            Expr::Subscript { index, .. } if !matches!(index.as_ref(), Expr::Slice { .. }) => {
                self.write_expr(expr, ctx)
            }
            _ => {
                self.output.push('(');
                self.write_expr(expr, ctx);
                self.output.push(')');
            }
        }
    }

    /// `.attr`, renamed like any other identifier so `obj.end` and a
    /// method defined as `end` agree.
    fn write_member(&mut self, attr: &str) {
        self.output.push('.');
        self.output.push_str(&lua_name(attr));
    }

    fn write_expr(&mut self, expr: &Expr, ctx: EmitContext<'_>) {
        match expr {
            Expr::Name { id } => self.output.push_str(&lua_name(id)),

            Expr::Constant { value } => self.write_constant(value),

            Expr::FormattedString { parts } => self.write_formatted_string(parts, ctx),

            Expr::Attribute { value, attr } => {
                self.write_prefix(value, ctx);
                self.write_member(attr);
            }

            Expr::Subscript { value, index } => match index.as_ref() {
                Expr::Slice { lower, upper, step } => {
                    self.write_slice(value, lower.as_deref(), upper.as_deref(), step.is_some(), ctx)
                }
                _ => {
                    self.write_prefix(value, ctx);
                    self.output.push('[');
                    self.write_expr(index, ctx);
                    self.output.push(']');
                }
            },

            Expr::Slice { .. } => self.write_marker_expr("slice outside a subscript"),

            Expr::Call {
                func,
                args,
                keywords,
            } => self.write_call(func, args, keywords, ctx),

            Expr::BinOp { left, op, right } => self.write_binary(left, *op, right, ctx),

            Expr::BoolOp { op, left, right } => {
                let op = match op {
                    BoolOp::And => "and",
                    BoolOp::Or => "or",
                };
                self.write_infix(left, op, right, ctx);
            }

            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Not => {
                    self.output.push_str("not ");
                    self.write_expr(operand, ctx);
                }
                UnaryOp::Neg => {
                    // `- -x` would read as a comment.
                    self.output.push('-');
                    if matches!(
                        operand.as_ref(),
                        Expr::UnaryOp {
                            op: UnaryOp::Neg,
                            ..
                        }
                    ) {
                        self.output.push('(');
                        self.write_expr(operand, ctx);
                        self.output.push(')');
                    } else {
                        self.write_expr(operand, ctx);
                    }
                }
                UnaryOp::Pos => self.write_expr(operand, ctx),
                UnaryOp::Invert => {
                    self.output.push('~');
                    self.write_expr(operand, ctx);
                }
            },

            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.write_compare(left, ops, comparators, ctx),

            Expr::IfExp { test, body, orelse } => {
                let test = self.render(test, ctx);
                let body = self.render(body, ctx);
                let orelse = self.render(orelse, ctx);
                self.output.push_str(&format!(
                    "(function() if {test} then return {body} else return {orelse} end end)()"
                ));
            }

            Expr::List { elts } | Expr::Tuple { elts } => {
                self.output.push('{');
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.write_expr(elt, ctx);
                }
                self.output.push('}');
            }

            Expr::Set { elts } => {
                if elts.is_empty() {
                    self.output.push_str("{}");
                    return;
                }
                self.output.push_str("{ ");
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push('[');
                    self.write_expr(elt, ctx);
                    self.output.push_str("] = true");
                }
                self.output.push_str(" }");
            }

            Expr::Dict { entries } => self.write_dict(entries, ctx),

            Expr::ListComp { elt, generators } => {
                self.write_comprehension(Accumulate::List(elt), generators, false, ctx)
            }
            Expr::SetComp { elt, generators } => {
                self.write_comprehension(Accumulate::Set(elt), generators, false, ctx)
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => self.write_comprehension(Accumulate::Dict(key, value), generators, false, ctx),
            Expr::GeneratorExp { elt, generators } => {
                self.write_comprehension(Accumulate::List(elt), generators, true, ctx)
            }

            Expr::Lambda { params, body } => {
                let inner = EmitContext {
                    scope: Scope::Lambda,
                    loops: 0,
                    ..ctx
                };
                let signature = render_params(params);
                let prologue = self.inline_prologue(params, inner);
                let body = self.render(body, inner);
                self.output
                    .push_str(&format!("function({signature}) {prologue}return {body} end"));
            }

            Expr::NamedExpr { target, value } => {
                let target = lua_name(target).into_owned();
                let value = self.render(value, ctx);
                self.output.push_str(&format!(
                    "(function() {target} = {value} return {target} end)()"
                ));
            }

            Expr::Yield { value } => {
                self.output.push_str("coroutine.yield(");
                if let Some(value) = value {
                    self.write_expr(value, ctx);
                }
                self.output.push(')');
            }

            Expr::YieldFrom { .. } => {
                self.write_marker_expr("yield from inside an expression not supported")
            }

            Expr::Await { value } => {
                self.write_expr(value, ctx);
                self.output.push_str(" --[[ py2lua: await not supported ]]");
            }

            Expr::Starred { value } => {
                self.output.push_str("table.unpack(");
                self.write_expr(value, ctx);
                self.output.push(')');
            }

            Expr::Unhandled { kind, .. } => self.write_marker_expr(&format!("unhandled {kind}")),
        }
    }

    fn write_constant(&mut self, value: &Constant) {
        match value {
            Constant::None => self.output.push_str("nil"),
            Constant::Bool(true) => self.output.push_str("true"),
            Constant::Bool(false) => self.output.push_str("false"),
            Constant::Int(text) | Constant::Float(text) => self.output.push_str(text),
            Constant::Str(text) => self.output.push_str(&quote(text)),
            Constant::Ellipsis => self.write_marker_expr("ellipsis"),
        }
    }

    fn write_formatted_string(&mut self, parts: &[FStringPart], ctx: EmitContext<'_>) {
        let pieces: Vec<String> = parts
            .iter()
            .map(|part| match part {
                FStringPart::Literal(text) => quote(text),
                FStringPart::Expr(expr) if expr.is_stringish() || is_string_format(expr) => {
                    self.render(expr, ctx)
                }
                FStringPart::Expr(expr) => format!("tostring({})", self.render(expr, ctx)),
            })
            .collect();

        match pieces.as_slice() {
            [] => self.output.push_str("\"\""),
            [single] => self.output.push_str(single),
            many => {
                self.output.push('(');
                self.output.push_str(&many.join(" .. "));
                self.output.push(')');
            }
        }
    }

    fn write_infix(&mut self, left: &Expr, op: &str, right: &Expr, ctx: EmitContext<'_>) {
        self.output.push('(');
        self.write_expr(left, ctx);
        self.output.push(' ');
        self.output.push_str(op);
        self.output.push(' ');
        self.write_expr(right, ctx);
        self.output.push(')');
    }

    fn write_binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr, ctx: EmitContext<'_>) {
        match op {
            BinaryOp::Add if left.is_stringish() || right.is_stringish() => {
                self.write_infix(left, "..", right, ctx)
            }

            // "fmt" % args
            BinaryOp::Mod if left.is_stringish() => {
                let format = self.render(left, ctx);
                let args = self.render_values(right, ctx);
                self.output
                    .push_str(&format!("string.format({format}, {args})"));
            }

            // "-" * 10
            BinaryOp::Mul if left.is_stringish() || right.is_stringish() => {
                let (text, count) = if left.is_stringish() {
                    (left, right)
                } else {
                    (right, left)
                };
                let text = self.render(text, ctx);
                let count = self.render(count, ctx);
                self.output
                    .push_str(&format!("string.rep({text}, {count})"));
            }

            _ => match lua_binary_op(op) {
                Some(symbol) => self.write_infix(left, symbol, right, ctx),
                None => self.write_marker_expr(&format!(
                    "operator {} not supported",
                    op.python_symbol()
                )),
            },
        }
    }

    /// `a < b < c` becomes `(a < b and b < c)`; the middle operand is
    /// evaluated twice.
    fn write_compare(
        &mut self,
        left: &Expr,
        ops: &[CmpOp],
        comparators: &[Expr],
        ctx: EmitContext<'_>,
    ) {
        let mut pairs = Vec::with_capacity(ops.len());
        let mut lhs = left;
        for (op, rhs) in ops.iter().zip(comparators) {
            let pair = match lua_compare_op(*op) {
                Some(symbol) => {
                    let l = self.render(lhs, ctx);
                    let r = self.render(rhs, ctx);
                    format!("{l} {symbol} {r}")
                }
                None => format!(
                    "nil --[[ py2lua: operator {} not supported ]]",
                    op.python_symbol()
                ),
            };
            pairs.push(pair);
            lhs = rhs;
        }
        self.output.push('(');
        self.output.push_str(&pairs.join(" and "));
        self.output.push(')');
    }

    fn write_dict(&mut self, entries: &[DictEntry], ctx: EmitContext<'_>) {
        if entries.is_empty() {
            self.output.push_str("{}");
            return;
        }

        let fields: Vec<String> = entries
            .iter()
            .map(|entry| match entry {
                DictEntry::Pair {
                    key: Expr::Constant {
                        value: Constant::Str(key),
                    },
                    value,
                } if is_identifier(key) => format!("{key} = {}", self.render(value, ctx)),
                DictEntry::Pair { key, value } => {
                    let key = self.render(key, ctx);
                    format!("[{key}] = {}", self.render(value, ctx))
                }
                DictEntry::Splat { .. } => {
                    "nil --[[ py2lua: ** unpacking in a dict literal not supported ]]".to_string()
                }
            })
            .collect();

        self.output.push_str("{ ");
        self.output.push_str(&fields.join(", "));
        self.output.push_str(" }");
    }

    /// `xs[a:b]` copies the range into a new table.
    fn write_slice(
        &mut self,
        value: &Expr,
        lower: Option<&Expr>,
        upper: Option<&Expr>,
        has_step: bool,
        ctx: EmitContext<'_>,
    ) {
        if has_step {
            self.write_marker_expr("slice step not supported");
            return;
        }

        let sequence = self.render_prefix(value, ctx);
        // Python bounds are 0-based and exclusive at the top; negative
        // literals count from the end.
        let start = match lower {
            None => "1".to_string(),
            Some(lower) => match int_literal(lower) {
                Some(n) if n < 0 => format!("#{sequence} - {}", -n - 1),
                _ => self.offset(lower, 1, ctx),
            },
        };
        let stop = match upper {
            None => format!("#{sequence}"),
            Some(upper) => match int_literal(upper) {
                Some(n) if n < 0 => format!("#{sequence} - {}", -n),
                _ => self.render(upper, ctx),
            },
        };
        self.output.push_str(&format!(
            "{{ table.unpack({sequence}, {start}, {stop}) }}"
        ));
    }

    fn write_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
        ctx: EmitContext<'_>,
    ) {
        // super().method(args) -> Base.method(self, args)
        if let Expr::Attribute { value, attr } = func {
            if let Expr::Call { func: inner, .. } = value.as_ref() {
                if inner.as_name() == Some("super") {
                    match ctx.base {
                        Some(base) => {
                            let mut list = vec!["self".to_string()];
                            list.extend(self.render_args(args, keywords, ctx));
                            let member = lua_name(attr);
                            self.output
                                .push_str(&format!("{base}.{member}({})", list.join(", ")));
                        }
                        None => self.write_marker_expr("super() without a base class"),
                    }
                    return;
                }
            }
        }

        if self.heuristics.http_calls {
            if let Some(call) = heuristics::http_call(func) {
                let mut list = Vec::new();
                if let HttpCall::Verb(verb) = call {
                    list.push(quote(&verb));
                }
                list.extend(self.render_args(args, keywords, ctx));
                self.output
                    .push_str(&format!("http.request({})", list.join(", ")));
                return;
            }
        }

        if let Some(id) = func.as_name() {
            if keywords.is_empty() {
                if let Some(builtin) = builtins::builtin_call(id) {
                    if self.write_builtin(builtin, args, ctx) {
                        return;
                    }
                }
            }
            if id == "print" && !keywords.is_empty() {
                let list = self.render_args(args, &[], ctx);
                self.output.push_str(&format!(
                    "print({} --[[ py2lua: print keyword arguments ignored ]])",
                    list.join(", ")
                ));
                return;
            }
        }

        if let Expr::Attribute { value, attr } = func {
            if keywords.is_empty() && !args.iter().any(|a| matches!(a, Expr::Starred { .. })) {
                if let Some(method) = builtins::method_call(attr, args.len()) {
                    self.write_method_rewrite(method, value, args, ctx);
                    return;
                }
            }

            let list = self.render_args(args, keywords, ctx);
            let colon = self.heuristics.method_calls
                && heuristics::prefers_method_call(value, self.imported);
            self.write_prefix(value, ctx);
            if colon {
                self.output.push(':');
                self.output.push_str(&lua_name(attr));
            } else {
                self.write_member(attr);
            }
            self.output.push_str(&format!("({})", list.join(", ")));
            return;
        }

        let list = self.render_args(args, keywords, ctx);
        self.write_prefix(func, ctx);
        self.output.push_str(&format!("({})", list.join(", ")));
    }

    /// Returns false when the call shape does not fit the builtin.
    fn write_builtin(&mut self, builtin: BuiltinCall, args: &[Expr], ctx: EmitContext<'_>) -> bool {
        if args.iter().any(|a| matches!(a, Expr::Starred { .. })) {
            return false;
        }
        match (builtin, args) {
            (BuiltinCall::Length, [arg]) => {
                let arg = self.render_prefix(arg, ctx);
                self.output.push_str(&format!("#{arg}"));
            }
            (BuiltinCall::Int, [arg]) => {
                let arg = self.render(arg, ctx);
                self.output
                    .push_str(&format!("math.floor(tonumber({arg}))"));
            }
            (BuiltinCall::Int, [arg, base]) => {
                let arg = self.render(arg, ctx);
                let base = self.render(base, ctx);
                self.output
                    .push_str(&format!("math.floor(tonumber({arg}, {base}))"));
            }
            (BuiltinCall::Rename(name), args) if !args.is_empty() => {
                let list = self.render_args(args, &[], ctx);
                self.output
                    .push_str(&format!("{name}({})", list.join(", ")));
            }
            _ => return false,
        }
        true
    }

    fn write_method_rewrite(
        &mut self,
        method: MethodCall,
        receiver: &Expr,
        args: &[Expr],
        ctx: EmitContext<'_>,
    ) {
        let receiver = self.render(receiver, ctx);
        let list = self.render_args(args, &[], ctx);
        let text = match method {
            MethodCall::TableInsert => format!("table.insert({receiver}, {})", list.join(", ")),
            MethodCall::TableConcat => format!("table.concat({}, {receiver})", list.join(", ")),
            MethodCall::StringLib(name) => format!("string.{name}({receiver})"),
        };
        self.output.push_str(&text);
    }

    /// Positional arguments, then keyword arguments as one trailing table.
    fn render_args(
        &mut self,
        args: &[Expr],
        keywords: &[Keyword],
        ctx: EmitContext<'_>,
    ) -> Vec<String> {
        let mut list: Vec<String> = args.iter().map(|a| self.render(a, ctx)).collect();

        match keywords {
            [] => {}
            // f(**opts) passes the mapping itself.
            [Keyword { name: None, value }] => list.push(self.render(value, ctx)),
            _ => {
                let fields: Vec<String> = keywords
                    .iter()
                    .map(|keyword| {
                        let value = self.render(&keyword.value, ctx);
                        match &keyword.name {
                            Some(name) if is_identifier(name) => format!("{name} = {value}"),
                            Some(name) => format!("[{}] = {value}", quote(name)),
                            None => format!(
                                "nil --[[ py2lua: **{value} not merged into keyword table ]]"
                            ),
                        }
                    })
                    .collect();
                list.push(format!("{{ {} }}", fields.join(", ")));
            }
        }

        list
    }

    fn inline_prologue(&mut self, params: &[Param], ctx: EmitContext<'_>) -> String {
        let mut prologue = String::new();
        if let Some(varargs) = params.iter().find(|p| p.kind == ParamKind::VarArgs) {
            prologue.push_str(&format!("local {} = {{ ... }} ", lua_name(&varargs.name)));
        }
        for param in params {
            if let Some(default) = &param.default {
                let name = lua_name(&param.name);
                let default = self.render(default, ctx);
                prologue.push_str(&format!("if {name} == nil then {name} = {default} end "));
            }
        }
        prologue
    }

    /// Comprehensions become an immediately invoked function that fills
    /// and returns a table.
    fn write_comprehension(
        &mut self,
        accumulate: Accumulate<'_>,
        generators: &[Comprehension],
        eager: bool,
        ctx: EmitContext<'_>,
    ) {
        let inner = EmitContext {
            depth: ctx.depth + 1,
            scope: Scope::Comprehension,
            loops: 0,
            ..ctx
        };

        self.output.push_str("(function()\n");
        if eager {
            self.marker(inner.depth, "generator expression materialized eagerly");
        }
        if generators.iter().any(|g| g.is_async) {
            self.marker(
                inner.depth,
                "async comprehension not supported, iterating synchronously",
            );
        }
        self.line(inner.depth, "local result = {}");

        let mut level = inner;
        for generator in generators {
            self.write_for_header(&generator.target, &generator.iter, level);
            level = level.nested();
            for condition in &generator.ifs {
                let condition = self.render(condition, level);
                self.line(level.depth, &format!("if {condition} then"));
                level = level.nested();
            }
        }

        let insert = match accumulate {
            Accumulate::List(elt) => {
                let elt = self.render(elt, level);
                format!("table.insert(result, {elt})")
            }
            Accumulate::Set(elt) => {
                let elt = self.render(elt, level);
                format!("result[{elt}] = true")
            }
            Accumulate::Dict(key, value) => {
                let key = self.render(key, level);
                let value = self.render(value, level);
                format!("result[{key}] = {value}")
            }
        };
        self.line(level.depth, &insert);

        // One `end` per `for` and per `if`.
        while level.depth > inner.depth {
            level.depth -= 1;
            self.line(level.depth, "end");
        }

        self.line(inner.depth, "return result");
        self.write_indent(ctx.depth);
        self.output.push_str("end)()");
    }
}

fn render_params(params: &[Param]) -> String {
    let mut names: Vec<String> = params
        .iter()
        .filter(|p| p.kind == ParamKind::Positional)
        .map(|p| lua_name(&p.name).into_owned())
        .collect();
    let has_varargs = params.iter().any(|p| p.kind == ParamKind::VarArgs);
    if !has_varargs {
        if let Some(kwargs) = params.iter().find(|p| p.kind == ParamKind::KwArgs) {
            names.push(lua_name(&kwargs.name).into_owned());
        }
    } else {
        names.push("...".to_string());
    }
    names.join(", ")
}

fn render_aliases(names: &[Alias]) -> String {
    names
        .iter()
        .map(|alias| match &alias.asname {
            Some(asname) => format!("{} as {asname}", alias.name),
            None => alias.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Calls already known to produce a string.
fn is_string_format(expr: &Expr) -> bool {
    let Expr::Call { func, .. } = expr else {
        return false;
    };
    match func.as_ref() {
        Expr::Name { id } => id == "str",
        Expr::Attribute { value, attr } => value.as_name() == Some("string") && attr == "format",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::read_python;

    fn lua(source: &str) -> String {
        let program = read_python(source).expect("parse failed");
        LuaWriter::emit(&program, &EmitOptions::default())
    }

    fn lua_with(source: &str, options: &EmitOptions) -> String {
        let program = read_python(source).expect("parse failed");
        LuaWriter::emit(&program, options)
    }

    #[test]
    fn test_operator_table() {
        assert_eq!(lua("x = 2 ** 3"), "x = (2 ^ 3)\n");
        assert_eq!(lua("x = a // b"), "x = (a // b)\n");
        assert_eq!(lua("x = a ^ b"), "x = (a ~ b)\n");
        assert_eq!(lua("x = a != b"), "x = (a ~= b)\n");
        assert_eq!(lua("x = a is None"), "x = (a == nil)\n");
        assert_eq!(lua("x = a is not None"), "x = (a ~= nil)\n");
        assert_eq!(lua("x = not a or b"), "x = (not a or b)\n");
        assert_eq!(lua("x = -y"), "x = -y\n");
    }

    #[test]
    fn test_unsupported_operators_are_marked() {
        assert_eq!(
            lua("x = a @ b"),
            "x = nil --[[ py2lua: operator @ not supported ]]\n"
        );
        assert_eq!(
            lua("x = a in b"),
            "x = (nil --[[ py2lua: operator in not supported ]])\n"
        );
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(lua("ok = 0 < x < 10"), "ok = (0 < x and x < 10)\n");
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(lua("s = \"a\" + name"), "s = (\"a\" .. name)\n");
        assert_eq!(
            lua("s = \"%d items\" % n"),
            "s = string.format(\"%d items\", n)\n"
        );
        assert_eq!(
            lua("s = \"%s=%s\" % (k, v)"),
            "s = string.format(\"%s=%s\", k, v)\n"
        );
        assert_eq!(lua("s = \"-\" * 10"), "s = string.rep(\"-\", 10)\n");
    }

    #[test]
    fn test_fstring() {
        assert_eq!(
            lua("s = f\"hi {name}!\""),
            "s = (\"hi \" .. tostring(name) .. \"!\")\n"
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(lua("s = 'a\"b\\n'"), "s = \"a\\\"b\\n\"\n");
    }

    #[test]
    fn test_function_prologue() {
        let source = "def f(a, b=2):\n    total = a + b\n    return total\n";
        let expected = "\
function f(a, b)
    if b == nil then b = 2 end
    local total
    total = (a + b)
    return total
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_varargs_and_kwargs() {
        let source = "def f(*args, **opts):\n    pass\n\ndef g(a, **opts):\n    pass\n";
        let expected = "\
function f(...)
    local args = { ... }
    -- py2lua: **opts alongside *args not supported, keywords are not collected
    local opts = {}
end
function g(a, opts)
    opts = opts or {}
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_early_return() {
        let source = "def f():\n    return 1\n    x = 2\n";
        let expected = "\
function f()
    local x
    do return 1 end
    x = 2
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_call_arguments() {
        assert_eq!(
            lua("connect(host, port=80, *rest)"),
            "connect(host, table.unpack(rest), { port = 80 })\n"
        );
        assert_eq!(lua("build(**opts)"), "build(opts)\n");
    }

    #[test]
    fn test_builtins() {
        assert_eq!(lua("n = len(xs)"), "n = #xs\n");
        assert_eq!(lua("s = str(n)"), "s = tostring(n)\n");
        assert_eq!(lua("n = int(s)"), "n = math.floor(tonumber(s))\n");
        assert_eq!(lua("m = max(a, b)"), "m = math.max(a, b)\n");
        assert_eq!(lua("xs.append(1)"), "table.insert(xs, 1)\n");
        assert_eq!(lua("s = \", \".join(xs)"), "s = table.concat(xs, \", \")\n");
        assert_eq!(lua("len(xs)"), "local _ = #xs\n");
    }

    #[test]
    fn test_method_call_heuristic() {
        assert_eq!(lua("conn.send(data)"), "conn:send(data)\n");
        assert_eq!(lua("Point.origin()"), "Point.origin()\n");
        assert_eq!(lua("import os\nos.getcwd()"), "-- py2lua: import not supported: import os\nos.getcwd()\n");
        let options = EmitOptions {
            heuristics: Heuristics::disabled(),
            ..EmitOptions::default()
        };
        assert_eq!(lua_with("conn.send(data)", &options), "conn.send(data)\n");
    }

    #[test]
    fn test_http_heuristic() {
        assert_eq!(
            lua("r = requests.get(url, timeout=5)"),
            "r = http.request(\"GET\", url, { timeout = 5 })\n"
        );
        let options = EmitOptions {
            heuristics: Heuristics::disabled(),
            ..EmitOptions::default()
        };
        assert_eq!(
            lua_with("r = requests.get(url)", &options),
            "r = requests.get(url)\n"
        );
    }

    #[test]
    fn test_range_loops() {
        assert_eq!(
            lua("for i in range(10):\n    print(i)"),
            "for i = 0, 9 do\n    print(i)\nend\n"
        );
        assert_eq!(
            lua("for i in range(1, n):\n    print(i)"),
            "for i = 1, n - 1 do\n    print(i)\nend\n"
        );
        assert_eq!(
            lua("for i in range(10, 0, -2):\n    print(i)"),
            "for i = 10, 1, -2 do\n    print(i)\nend\n"
        );
    }

    #[test]
    fn test_collection_loops() {
        assert_eq!(
            lua("for k, v in d.items():\n    print(k, v)"),
            "for k, v in pairs(d) do\n    print(k, v)\nend\n"
        );
        assert_eq!(
            lua("for x in xs:\n    print(x)"),
            "for _, x in ipairs(xs) do\n    print(x)\nend\n"
        );
        assert_eq!(
            lua("for a, b in pairs_list:\n    print(a)"),
            "for _, _item in ipairs(pairs_list) do\n    local a, b = table.unpack(_item)\n    print(a)\nend\n"
        );
        assert_eq!(
            lua("for i, x in enumerate(xs):\n    print(i)"),
            "for _i, x in ipairs(xs) do\n    local i = _i - 1\n    print(i)\nend\n"
        );
    }

    #[test]
    fn test_continue_uses_goto() {
        let source = "while running:\n    if skip:\n        continue\n    step()\n";
        let expected = "\
while running do
    do
        if skip then
            goto continue
        end
        step()
    end
    ::continue::
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_nested_continue_labels_differ() {
        let source = "for x in xs:\n    for y in ys:\n        continue\n    continue\n";
        let out = lua(source);
        assert!(out.contains("goto continue_2"));
        assert!(out.contains("::continue_2::"));
        assert!(out.contains("::continue::"));
    }

    #[test]
    fn test_loop_else_is_stubbed() {
        let out = lua("for x in xs:\n    pass\nelse:\n    done()\n");
        assert!(out.contains("-- py2lua: for/else not supported"));
        assert!(out.contains("if false then\n    done()\nend\n"));
    }

    #[test]
    fn test_if_elif_else() {
        let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let expected = "\
if a then
    x = 1
elseif b then
    x = 2
else
    x = 3
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_decorators_apply_innermost_first() {
        let source = "@outer\n@inner\ndef f():\n    pass\n";
        let expected = "\
function f()
end
f = inner(f)
f = outer(f)
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_route_decorator_is_marked() {
        let out = lua("@app.route(\"/\")\ndef index():\n    return \"hi\"\n");
        assert!(out.contains("-- py2lua: route decorator"));
        assert!(!out.contains("index = "));
    }

    #[test]
    fn test_empty_class() {
        let expected = "\
Foo = Foo or {}
Foo.__index = Foo
setmetatable(Foo, { __call = function(cls, ...) return cls:new(...) end })
function Foo:new(o)
    o = o or {}
    setmetatable(o, self)
    return o
end
";
        assert_eq!(lua("class Foo:\n    pass\n"), expected);
    }

    #[test]
    fn test_subclass_with_methods() {
        let source = "\
class Bar(Foo):
    kind = \"bar\"

    def __init__(self, x):
        super().__init__(x)
        self.x = x

    def get(self):
        return self.x

    @staticmethod
    def make():
        return Bar(1)
";
        let expected = "\
Bar = Bar or {}
Bar.__index = Bar
setmetatable(Bar, { __index = Foo, __call = function(cls, ...) return cls:new(...) end })
function Bar:new(...)
    local o = setmetatable({}, self)
    o:__init__(...)
    return o
end
Bar.kind = \"bar\"
function Bar:__init__(x)
    Foo.__init__(self, x)
    self.x = x
end
function Bar:get()
    return self.x
end
function Bar.make()
    return Bar(1)
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_multiple_inheritance_is_marked() {
        let out = lua("class C(A, B):\n    pass\n");
        assert!(out.starts_with(
            "-- py2lua: multiple inheritance not supported (bases: A, B), only A is inherited\n"
        ));
        assert!(out.contains("__index = A,"));
    }

    #[test]
    fn test_list_comprehension() {
        let expected = "\
ys = (function()
    local result = {}
    for i = 0, 2 do
        table.insert(result, (i * 2))
    end
    return result
end)()
";
        assert_eq!(lua("ys = [i*2 for i in range(3)]"), expected);
    }

    #[test]
    fn test_comprehension_with_filter_and_dict() {
        let expected = "\
d = (function()
    local result = {}
    for k, v in pairs(src) do
        if v then
            result[k] = v
        end
    end
    return result
end)()
";
        assert_eq!(lua("d = {k: v for k, v in src.items() if v}"), expected);
    }

    #[test]
    fn test_generator_expression_is_marked() {
        let out = lua("total = sum(x for x in xs)");
        assert!(out.contains("-- py2lua: generator expression materialized eagerly"));
        assert!(out.starts_with("total = sum((function()\n"));
    }

    #[test]
    fn test_with_statement() {
        let source = "with open(path) as f:\n    data = f.read()\n";
        let expected = "\
-- py2lua: with not supported, __enter__ and __exit__ are not called
do
    f = open(path)
    local _ok, _err = pcall(function()
        data = f:read()
    end)
    if not _ok then error(_err, 0) end
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_try_clauses() {
        let source = "\
try:
    risky()
except ValueError as e:
    log(e)
finally:
    cleanup()
";
        let expected = "\
-- py2lua: try/except not supported, wrap the body in pcall to catch errors
do
    risky()
end
if false then -- except ValueError as e
    log(e)
end
do -- finally
    cleanup()
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_raise_builtin_exception() {
        assert_eq!(
            lua("raise ValueError(\"bad\")"),
            "error(\"ValueError: bad\")\n"
        );
        assert_eq!(lua("raise MyError(x)"), "error(MyError(x))\n");
    }

    #[test]
    fn test_async_gaps_are_marked() {
        let out = lua("async def f():\n    await g()\n");
        let expected = "\
-- py2lua: async def not supported, runs synchronously
function f()
    -- py2lua: await not supported, called synchronously
    g()
end
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_generators() {
        let expected = "\
-- py2lua: generator, iterate it with coroutine.wrap(count)
function count(n)
    local i
    i = 0
    while (i < n) do
        coroutine.yield(i)
        i = (i + 1)
    end
end
";
        assert_eq!(
            lua("def count(n):\n    i = 0\n    while i < n:\n        yield i\n        i += 1\n"),
            expected
        );
    }

    #[test]
    fn test_ternary_and_walrus() {
        assert_eq!(
            lua("x = a if c else b"),
            "x = (function() if c then return a else return b end end)()\n"
        );
        assert_eq!(
            lua("y = (n := 10)"),
            "y = (function() n = 10 return n end)()\n"
        );
    }

    #[test]
    fn test_lambda() {
        assert_eq!(
            lua("f = lambda x, y=1: x + y"),
            "f = function(x, y) if y == nil then y = 1 end return (x + y) end\n"
        );
    }

    #[test]
    fn test_collections() {
        assert_eq!(lua("xs = [1, 2]"), "xs = {1, 2}\n");
        assert_eq!(lua("t = ()"), "t = {}\n");
        assert_eq!(
            lua("d = {\"a\": 1, \"b c\": 2, 3: x}"),
            "d = { a = 1, [\"b c\"] = 2, [3] = x }\n"
        );
        assert_eq!(lua("s = {1, 2}"), "s = { [1] = true, [2] = true }\n");
    }

    #[test]
    fn test_slices() {
        assert_eq!(lua("ys = xs[1:3]"), "ys = { table.unpack(xs, 2, 3) }\n");
        assert_eq!(lua("ys = xs[:-1]"), "ys = { table.unpack(xs, 1, #xs - 1) }\n");
        assert_eq!(lua("ys = xs[2:]"), "ys = { table.unpack(xs, 3, #xs) }\n");
    }

    #[test]
    fn test_assignment_forms() {
        assert_eq!(lua("a, b = b, a"), "a, b = b, a\n");
        assert_eq!(lua("a, b = pair"), "a, b = table.unpack(pair)\n");
        assert_eq!(
            lua("a = b = 0"),
            "do\n    local _v = 0\n    a = _v\n    b = _v\nend\n"
        );
        assert_eq!(lua("x += 1"), "x = (x + 1)\n");
        assert_eq!(lua("del d[k]"), "d[k] = nil\n");
    }

    #[test]
    fn test_statements_without_lua_form() {
        assert_eq!(
            lua("from . import util"),
            "-- py2lua: import not supported: from . import util\n"
        );
        assert_eq!(lua("\"\"\"Module docs.\"\"\""), "-- Module docs.\n");
        assert_eq!(lua("x"), "local _ = x\n");
        assert_eq!(lua("assert x, \"msg\""), "assert(x, \"msg\")\n");
    }

    #[test]
    fn test_lua_keywords_are_renamed() {
        assert_eq!(lua("end = 1"), "end_ = 1\n");
        assert_eq!(lua("x = t.end"), "x = t.end_\n");
    }

    #[test]
    fn test_keyword_method_definition_matches_calls() {
        let out = lua("class C:\n    def end(self):\n        pass\n\nobj.end()\n");
        assert!(out.contains("function C:end_()\n"));
        assert!(out.ends_with("obj:end_()\n"));
    }

    #[test]
    fn test_return_inside_with_reaches_caller() {
        let source = "\
def f(p):
    with open(p) as fh:
        return fh.read()
    return None
";
        let expected = "\
function f(p)
    local fh
    -- py2lua: with not supported, __enter__ and __exit__ are not called
    do
        fh = open(p)
        local _ok, _r = pcall(function()
            return {fh:read()}
        end)
        if not _ok then error(_r, 0) end
        if _r ~= nil then return _r[1] end
    end
    return nil
end
";
        assert_eq!(lua(source), expected);
    }

    #[test]
    fn test_return_inside_nested_with_stays_boxed() {
        let out = lua("def f():\n    with a():\n        with b():\n            return 1\n");
        assert!(out.contains("return {1}\n"));
        assert!(out.contains("if _r ~= nil then return _r end\n"));
        assert!(out.contains("if _r ~= nil then return _r[1] end\n"));
    }

    #[test]
    fn test_tuples_are_tables_both_ways() {
        assert_eq!(
            lua("def f():\n    return a, b\n"),
            "function f()\n    return {a, b}\nend\n"
        );
        assert_eq!(lua("a, b = f()"), "a, b = table.unpack(f())\n");
    }

    #[test]
    fn test_range_bound_at_integer_limit() {
        let out = lua("for i in range(0, 9223372036854775807, -1):\n    print(i)\n");
        assert_eq!(
            out,
            "for i = 0, 9223372036854775807 + 1, -1 do\n    print(i)\nend\n"
        );
    }

    #[test]
    fn test_walrus_in_while_test_is_local() {
        let out = lua("def drain(src):\n    while (chunk := src.read()):\n        use(chunk)\n");
        assert!(out.starts_with("function drain(src)\n    local chunk\n"));
        assert!(out.contains("chunk = src:read() return chunk"));
    }

    #[test]
    fn test_program_built_from_ir() {
        let class = ClassDef::new(
            "Point",
            vec![],
            vec![Stmt::assign(Expr::name("origin"), Expr::int(0))],
        );
        let program = Program::new(vec![Stmt::class(class)]);
        let out = LuaWriter::emit(&program, &EmitOptions::default());
        assert!(out.starts_with("Point = Point or {}\n"));
        assert!(out.ends_with("Point.origin = 0\n"));
    }

    #[test]
    fn test_unhandled_statement_marker() {
        let out = lua("match x:\n    case 1:\n        pass\n");
        assert_eq!(out, "-- py2lua: unhandled match_statement: match x:\n");
    }

    #[test]
    fn test_indent_width_option() {
        let options = EmitOptions {
            indent_width: 2,
            ..EmitOptions::default()
        };
        assert_eq!(
            lua_with("if a:\n    b()\n", &options),
            "if a then\n  b()\nend\n"
        );
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(lua(""), "");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\tb\u{1}"), "\"a\\tb\\001\"");
        assert_eq!(lua_name("repeat"), "repeat_");
        assert_eq!(lua_name("value"), "value");
    }
}
