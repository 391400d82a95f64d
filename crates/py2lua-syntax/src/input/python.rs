//! Tree-sitter based Python reader.
//!
//! Parsing lives in [`super::parse`]; this module lowers the concrete
//! syntax tree into the closed IR. Lowering never fails: a node kind with
//! no case below becomes an `Unhandled` node carrying the grammar's kind
//! name and the offending source line.

use super::parse::parse_python;
use crate::ir::*;
use crate::traits::{ReadError, Reader};
use tree_sitter::Node;

/// Static instance of the Python reader for registry.
pub static PYTHON_READER: PythonReader = PythonReader;

/// Python reader using tree-sitter.
pub struct PythonReader;

impl Reader for PythonReader {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn read(&self, source: &str) -> Result<Program, ReadError> {
        read_python(source)
    }
}

/// Parse Python source into IR.
pub fn read_python(source: &str) -> Result<Program, ReadError> {
    let tree = parse_python(source)?;
    let ctx = ReadContext::new(tree.source());
    let program = ctx.read_program(tree.root());
    tracing::debug!(statements = program.body.len(), "normalized python module");
    Ok(program)
}

struct ReadContext<'a> {
    source: &'a str,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self { source }
    }

    fn node_text(&self, node: Node) -> &'a str {
        self.source.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    fn first_line(&self, node: Node) -> String {
        self.node_text(node)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    }

    fn unhandled_stmt(&self, node: Node) -> Stmt {
        tracing::warn!(
            kind = node.kind(),
            line = node.start_position().row + 1,
            "unhandled python statement"
        );
        Stmt::unhandled(node.kind(), self.first_line(node))
    }

    fn unhandled_expr(&self, node: Node) -> Expr {
        tracing::warn!(
            kind = node.kind(),
            line = node.start_position().row + 1,
            "unhandled python expression"
        );
        Expr::unhandled(node.kind(), self.first_line(node))
    }

    fn read_program(&self, root: Node) -> Program {
        let body = self.read_block_stmts(root);
        let mut imported = Vec::new();
        for stmt in &body {
            if let Stmt::Import { names } | Stmt::ImportFrom { names, .. } = stmt {
                for alias in names {
                    let bound = alias.bound_name();
                    if bound != "*" && !imported.iter().any(|n| n == bound) {
                        imported.push(bound.to_string());
                    }
                }
            }
        }
        Program { body, imported }
    }

    fn read_block_stmts(&self, node: Node) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            if let Some(stmt) = self.read_stmt(child) {
                stmts.push(stmt);
            }
        }

        stmts
    }

    /// Body of a clause that owns a `body` field, or an empty list.
    fn read_field_block(&self, node: Node, field: &str) -> Vec<Stmt> {
        node.child_by_field_name(field)
            .map(|body| self.read_block_stmts(body))
            .unwrap_or_default()
    }

    fn read_stmt(&self, node: Node) -> Option<Stmt> {
        let stmt = match node.kind() {
            "comment" => return None,

            // Statement-level expressions arrive without a wrapper node in
            // this grammar; older grammars wrap them in expression_statement.
            "expression_statement" => self.read_expression_statement(node),
            "assignment" => self.read_assignment(node),
            "augmented_assignment" => self.read_augmented_assignment(node),
            kind if is_expression_kind(kind) => Stmt::expr(self.read_expr(node)),

            // Control flow
            "if_statement" => self.read_if_statement(node),
            "while_statement" => self.read_while_statement(node),
            "for_statement" => self.read_for_statement(node),
            "try_statement" => self.read_try_statement(node),
            "with_statement" => self.read_with_statement(node),

            // Definitions
            "function_definition" => self.read_function_definition(node, Vec::new()),
            "class_definition" => self.read_class_definition(node, Vec::new()),
            "decorated_definition" => self.read_decorated_definition(node),

            // Simple statements
            "return_statement" => Stmt::Return {
                value: self.first_named(node).map(|n| self.read_expr(n)),
            },
            "raise_statement" => self.read_raise_statement(node),
            "assert_statement" => self.read_assert_statement(node),
            "import_statement" => Stmt::Import {
                names: self.read_import_names(node),
            },
            "import_from_statement" | "future_import_statement" => {
                self.read_import_from_statement(node)
            }
            "global_statement" => Stmt::Global {
                names: self.read_identifiers(node),
            },
            "nonlocal_statement" => Stmt::Nonlocal {
                names: self.read_identifiers(node),
            },
            "delete_statement" => Stmt::Delete {
                targets: self
                    .first_named(node)
                    .map(|n| self.read_expr_list(n))
                    .unwrap_or_default(),
            },
            "pass_statement" => Stmt::Pass,
            "break_statement" => Stmt::Break,
            "continue_statement" => Stmt::Continue,

            _ => self.unhandled_stmt(node),
        };
        Some(stmt)
    }

    /// First named child that is not a comment.
    fn first_named<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|c| c.kind() != "comment");
        found
    }

    fn named_children_of<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect()
    }

    fn has_token(&self, node: Node, token: &str) -> bool {
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .any(|c| !c.is_named() && c.kind() == token);
        found
    }

    fn read_expression_statement(&self, node: Node) -> Stmt {
        let children = self.named_children_of(node);
        match children.as_slice() {
            [] => self.unhandled_stmt(node),
            [only] => match only.kind() {
                "assignment" => self.read_assignment(*only),
                "augmented_assignment" => self.read_augmented_assignment(*only),
                _ => Stmt::expr(self.read_expr(*only)),
            },
            many => Stmt::expr(Expr::Tuple {
                elts: many.iter().map(|n| self.read_expr(*n)).collect(),
            }),
        }
    }

    fn read_assignment(&self, node: Node) -> Stmt {
        let Some(left) = node.child_by_field_name("left") else {
            return self.unhandled_stmt(node);
        };

        // `a = b = 1` nests: assignment(left=a, right=assignment(left=b, right=1))
        let mut targets = vec![self.read_expr(left)];
        let mut right = node.child_by_field_name("right");
        while let Some(inner) = right.filter(|r| r.kind() == "assignment") {
            if let Some(target) = inner.child_by_field_name("left") {
                targets.push(self.read_expr(target));
            }
            right = inner.child_by_field_name("right");
        }

        // Annotation without a value (`x: int`) declares the name only.
        let value = match right {
            Some(value) => self.read_expr(value),
            None => Expr::none(),
        };

        Stmt::Assign { targets, value }
    }

    fn read_augmented_assignment(&self, node: Node) -> Stmt {
        let (Some(left), Some(right), Some(op_node)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
            node.child_by_field_name("operator"),
        ) else {
            return self.unhandled_stmt(node);
        };

        let op_text = self.node_text(op_node);
        let Some(op) = BinaryOp::from_python(op_text.trim_end_matches('=')) else {
            return self.unhandled_stmt(node);
        };

        Stmt::AugAssign {
            target: self.read_expr(left),
            op,
            value: self.read_expr(right),
        }
    }

    fn read_if_statement(&self, node: Node) -> Stmt {
        let Some(condition) = node.child_by_field_name("condition") else {
            return self.unhandled_stmt(node);
        };

        let test = self.read_expr(condition);
        let body = self.read_field_block(node, "consequence");

        let mut cursor = node.walk();
        let alternatives: Vec<_> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();

        Stmt::If {
            test,
            body,
            orelse: self.read_alternatives(&alternatives),
        }
    }

    /// `elif` clauses fold into nested `If` statements in `orelse`.
    fn read_alternatives(&self, alternatives: &[Node]) -> Vec<Stmt> {
        let Some((first, rest)) = alternatives.split_first() else {
            return Vec::new();
        };
        match first.kind() {
            "elif_clause" => {
                let Some(condition) = first.child_by_field_name("condition") else {
                    return vec![self.unhandled_stmt(*first)];
                };
                vec![Stmt::If {
                    test: self.read_expr(condition),
                    body: self.read_field_block(*first, "consequence"),
                    orelse: self.read_alternatives(rest),
                }]
            }
            "else_clause" => self.read_field_block(*first, "body"),
            _ => vec![self.unhandled_stmt(*first)],
        }
    }

    fn read_else_clause(&self, node: Node) -> Vec<Stmt> {
        node.child_by_field_name("alternative")
            .map(|alt| self.read_field_block(alt, "body"))
            .unwrap_or_default()
    }

    fn read_while_statement(&self, node: Node) -> Stmt {
        let Some(condition) = node.child_by_field_name("condition") else {
            return self.unhandled_stmt(node);
        };

        let body = self.read_field_block(node, "body");
        Stmt::While {
            test: self.read_expr(condition),
            has_continue: contains_continue(&body),
            body,
            orelse: self.read_else_clause(node),
        }
    }

    fn read_for_statement(&self, node: Node) -> Stmt {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return self.unhandled_stmt(node);
        };

        let body = self.read_field_block(node, "body");
        Stmt::For {
            target: self.read_expr(left),
            iter: self.read_expr(right),
            has_continue: contains_continue(&body),
            body,
            orelse: self.read_else_clause(node),
            is_async: self.has_token(node, "async"),
        }
    }

    fn read_try_statement(&self, node: Node) -> Stmt {
        let body = self.read_field_block(node, "body");
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for child in self.named_children_of(node) {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    handlers.push(self.read_except_clause(child));
                }
                "else_clause" => orelse = self.read_field_block(child, "body"),
                "finally_clause" => {
                    finalbody = self
                        .named_children_of(child)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                        .map(|block| self.read_block_stmts(block))
                        .unwrap_or_default();
                }
                _ => {}
            }
        }

        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        }
    }

    fn read_except_clause(&self, node: Node) -> ExceptHandler {
        let mut body = Vec::new();
        let mut exprs = Vec::new();
        for child in self.named_children_of(node) {
            if child.kind() == "block" {
                body = self.read_block_stmts(child);
            } else {
                exprs.push(child);
            }
        }

        // Grammar versions differ: `except E as e` is either two expressions
        // or a single as_pattern.
        let (type_, name) = match exprs.as_slice() {
            [] => (None, None),
            [single] if single.kind() == "as_pattern" => {
                let (context, target) = self.read_as_pattern(*single);
                (Some(context), target.and_then(|t| t.as_name().map(String::from)))
            }
            [single] => (Some(self.read_expr(*single)), None),
            [type_node, alias, ..] => (
                Some(self.read_expr(*type_node)),
                Some(self.node_text(*alias).to_string()),
            ),
        };

        ExceptHandler { type_, name, body }
    }

    /// `expr as target` -> (expr, target)
    fn read_as_pattern(&self, node: Node) -> (Expr, Option<Expr>) {
        let context = self
            .first_named(node)
            .map(|n| self.read_expr(n))
            .unwrap_or_else(|| self.unhandled_expr(node));
        let target = node.child_by_field_name("alias").map(|alias| {
            if alias.kind() == "as_pattern_target" {
                self.first_named(alias)
                    .map(|n| self.read_expr(n))
                    .unwrap_or_else(|| Expr::name(self.node_text(alias)))
            } else {
                self.read_expr(alias)
            }
        });
        (context, target)
    }

    fn read_with_statement(&self, node: Node) -> Stmt {
        let mut items = Vec::new();
        for child in self.named_children_of(node) {
            if child.kind() != "with_clause" {
                continue;
            }
            for item in self.named_children_of(child) {
                if item.kind() != "with_item" {
                    continue;
                }
                items.push(self.read_with_item(item));
            }
        }

        Stmt::With {
            items,
            body: self.read_field_block(node, "body"),
            is_async: self.has_token(node, "async"),
        }
    }

    fn read_with_item(&self, node: Node) -> WithItem {
        let Some(value) = node.child_by_field_name("value") else {
            return WithItem {
                context: self.unhandled_expr(node),
                target: None,
            };
        };

        if value.kind() == "as_pattern" {
            let (context, target) = self.read_as_pattern(value);
            return WithItem { context, target };
        }

        WithItem {
            context: self.read_expr(value),
            target: node
                .child_by_field_name("alias")
                .map(|alias| self.read_expr(alias)),
        }
    }

    fn read_decorated_definition(&self, node: Node) -> Stmt {
        let decorators: Vec<Expr> = self
            .named_children_of(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .map(|deco| {
                self.first_named(deco)
                    .map(|expr| self.read_expr(expr))
                    .unwrap_or_else(|| self.unhandled_expr(deco))
            })
            .collect();

        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "function_definition" => {
                self.read_function_definition(def, decorators)
            }
            Some(def) if def.kind() == "class_definition" => {
                self.read_class_definition(def, decorators)
            }
            _ => self.unhandled_stmt(node),
        }
    }

    fn read_function_definition(&self, node: Node, decorators: Vec<Expr>) -> Stmt {
        let Some(name) = node.child_by_field_name("name") else {
            return self.unhandled_stmt(node);
        };

        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.read_parameters(p))
            .unwrap_or_default();
        let body = self.read_field_block(node, "body");

        let param_names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        let locals = assigned_names(&body, &param_names);

        Stmt::function(FunctionDef {
            name: self.node_text(name).to_string(),
            params,
            body,
            decorators,
            locals,
            is_async: self.has_token(node, "async"),
        })
    }

    fn read_parameters(&self, node: Node) -> Vec<Param> {
        let mut params = Vec::new();

        for child in self.named_children_of(node) {
            match child.kind() {
                "identifier" => params.push(Param::positional(self.node_text(child))),
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        params.push(Param {
                            name: self.node_text(name).to_string(),
                            default: child
                                .child_by_field_name("value")
                                .map(|v| self.read_expr(v)),
                            kind: ParamKind::Positional,
                        });
                    }
                }
                // Type annotations are dropped; only the pattern matters.
                "typed_parameter" => {
                    if let Some(param) = self.first_named(child).and_then(|p| self.read_param(p))
                    {
                        params.push(param);
                    }
                }
                _ => {
                    if let Some(param) = self.read_param(child) {
                        params.push(param);
                    }
                }
            }
        }

        params
    }

    fn read_param(&self, node: Node) -> Option<Param> {
        let (kind, prefix) = match node.kind() {
            "identifier" => return Some(Param::positional(self.node_text(node))),
            "list_splat_pattern" => (ParamKind::VarArgs, '*'),
            "dictionary_splat_pattern" => (ParamKind::KwArgs, '*'),
            // `*` and `/` separators carry no name.
            _ => return None,
        };
        let name = match self.first_named(node) {
            Some(ident) => self.node_text(ident).to_string(),
            None => self.node_text(node).trim_start_matches(prefix).to_string(),
        };
        Some(Param {
            name,
            default: None,
            kind,
        })
    }

    fn read_class_definition(&self, node: Node, decorators: Vec<Expr>) -> Stmt {
        let Some(name) = node.child_by_field_name("name") else {
            return self.unhandled_stmt(node);
        };

        let mut bases = Vec::new();
        let mut body = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            for arg in self.named_children_of(superclasses) {
                match arg.kind() {
                    // metaclass=... and friends have no table equivalent.
                    "keyword_argument" => body.push(self.unhandled_stmt(arg)),
                    _ => bases.push(self.read_expr(arg)),
                }
            }
        }
        body.extend(self.read_field_block(node, "body"));

        Stmt::class(ClassDef {
            name: self.node_text(name).to_string(),
            bases,
            body,
            decorators,
        })
    }

    fn read_raise_statement(&self, node: Node) -> Stmt {
        let cause = node.child_by_field_name("cause");
        let exc = self
            .named_children_of(node)
            .into_iter()
            .find(|c| Some(c.id()) != cause.map(|n| n.id()));
        Stmt::Raise {
            exc: exc.map(|n| self.read_expr(n)),
            cause: cause.map(|n| self.read_expr(n)),
        }
    }

    fn read_assert_statement(&self, node: Node) -> Stmt {
        let children = self.named_children_of(node);
        match children.as_slice() {
            [test] => Stmt::Assert {
                test: self.read_expr(*test),
                msg: None,
            },
            [test, msg, ..] => Stmt::Assert {
                test: self.read_expr(*test),
                msg: Some(self.read_expr(*msg)),
            },
            [] => self.unhandled_stmt(node),
        }
    }

    fn read_import_names(&self, node: Node) -> Vec<Alias> {
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        names.into_iter().map(|n| self.read_alias(n)).collect()
    }

    fn read_alias(&self, node: Node) -> Alias {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.node_text(n))
                .unwrap_or("");
            let asname = node
                .child_by_field_name("alias")
                .map(|n| self.node_text(n).to_string());
            Alias {
                name: name.to_string(),
                asname,
            }
        } else {
            Alias {
                name: self.node_text(node).to_string(),
                asname: None,
            }
        }
    }

    fn read_import_from_statement(&self, node: Node) -> Stmt {
        let (module, level) = match node.child_by_field_name("module_name") {
            Some(module) if module.kind() == "relative_import" => {
                let text = self.node_text(module);
                let level = text.chars().take_while(|c| *c == '.').count();
                let rest = text.trim_start_matches('.');
                (
                    (!rest.is_empty()).then(|| rest.to_string()),
                    level,
                )
            }
            Some(module) => (Some(self.node_text(module).to_string()), 0),
            // `from __future__ import x`
            None => (Some("__future__".to_string()), 0),
        };

        let mut names = self.read_import_names(node);
        if self
            .named_children_of(node)
            .iter()
            .any(|c| c.kind() == "wildcard_import")
        {
            names.push(Alias {
                name: "*".into(),
                asname: None,
            });
        }

        Stmt::ImportFrom {
            module,
            names,
            level,
        }
    }

    fn read_identifiers(&self, node: Node) -> Vec<String> {
        self.named_children_of(node)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .map(|c| self.node_text(c).to_string())
            .collect()
    }

    /// An expression list (`a, b`) as its elements, anything else as one.
    fn read_expr_list(&self, node: Node) -> Vec<Expr> {
        match node.kind() {
            "expression_list" | "pattern_list" => self
                .named_children_of(node)
                .into_iter()
                .map(|n| self.read_expr(n))
                .collect(),
            _ => vec![self.read_expr(node)],
        }
    }

    fn read_expr(&self, node: Node) -> Expr {
        match node.kind() {
            // Literals
            "integer" => self.read_integer(node),
            "float" => {
                let text = self.node_text(node).replace('_', "");
                if text.ends_with(['j', 'J']) {
                    self.unhandled_expr(node)
                } else {
                    Expr::constant(Constant::Float(text))
                }
            }
            "string" | "concatenated_string" => self.read_string(node),
            "true" => Expr::constant(Constant::Bool(true)),
            "false" => Expr::constant(Constant::Bool(false)),
            "none" => Expr::none(),
            "ellipsis" => Expr::constant(Constant::Ellipsis),

            // Names
            "identifier" => Expr::name(self.node_text(node)),
            "attribute" => self.read_attribute(node),
            "subscript" => self.read_subscript(node),
            "slice" => self.read_slice(node),

            // Operators
            "binary_operator" => self.read_binary_operator(node),
            "boolean_operator" => self.read_boolean_operator(node),
            "unary_operator" => self.read_unary_operator(node),
            "not_operator" => match node.child_by_field_name("argument") {
                Some(arg) => Expr::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(self.read_expr(arg)),
                },
                None => self.unhandled_expr(node),
            },
            "comparison_operator" => self.read_comparison_operator(node),

            // Calls
            "call" => self.read_call(node),

            // Collections
            "list" | "list_pattern" => Expr::List {
                elts: self.read_elements(node),
            },
            "tuple" | "tuple_pattern" | "tuple_expression" | "expression_list"
            | "pattern_list" => Expr::Tuple {
                elts: self.read_elements(node),
            },
            "set" => Expr::Set {
                elts: self.read_elements(node),
            },
            "dictionary" => self.read_dictionary(node),

            // Comprehensions
            "list_comprehension" | "set_comprehension" | "generator_expression"
            | "dictionary_comprehension" => self.read_comprehension(node),

            "parenthesized_expression" => match self.first_named(node) {
                Some(inner) => self.read_expr(inner),
                None => self.unhandled_expr(node),
            },

            "conditional_expression" => {
                let children = self.named_children_of(node);
                match children.as_slice() {
                    [body, test, orelse, ..] => Expr::IfExp {
                        test: Box::new(self.read_expr(*test)),
                        body: Box::new(self.read_expr(*body)),
                        orelse: Box::new(self.read_expr(*orelse)),
                    },
                    _ => self.unhandled_expr(node),
                }
            }

            "lambda" => self.read_lambda(node),

            // Assignment expression (walrus operator :=)
            "named_expression" => match (
                node.child_by_field_name("name"),
                node.child_by_field_name("value"),
            ) {
                (Some(name), Some(value)) => Expr::NamedExpr {
                    target: self.node_text(name).to_string(),
                    value: Box::new(self.read_expr(value)),
                },
                _ => self.unhandled_expr(node),
            },

            // Coroutines
            "await" => match self.first_named(node) {
                Some(value) => Expr::Await {
                    value: Box::new(self.read_expr(value)),
                },
                None => self.unhandled_expr(node),
            },
            "yield" => {
                let value = self.first_named(node).map(|v| self.read_expr(v));
                match value {
                    Some(value) if self.has_token(node, "from") => Expr::YieldFrom {
                        value: Box::new(value),
                    },
                    value => Expr::Yield {
                        value: value.map(Box::new),
                    },
                }
            }

            "list_splat" | "list_splat_pattern" => match self.first_named(node) {
                Some(value) => Expr::Starred {
                    value: Box::new(self.read_expr(value)),
                },
                None => self.unhandled_expr(node),
            },

            // Annotations and pattern targets wrap a single expression.
            "type" | "as_pattern_target" => match self.first_named(node) {
                Some(inner) => self.read_expr(inner),
                None => self.unhandled_expr(node),
            },

            _ => self.unhandled_expr(node),
        }
    }

    fn read_elements(&self, node: Node) -> Vec<Expr> {
        self.named_children_of(node)
            .into_iter()
            .map(|n| self.read_expr(n))
            .collect()
    }

    fn read_integer(&self, node: Node) -> Expr {
        let text = self.node_text(node).replace('_', "");
        let lower = text.to_ascii_lowercase();
        let lower = lower.trim_end_matches('l');

        if lower.ends_with('j') {
            return self.unhandled_expr(node);
        }

        let radix = match lower.get(..2) {
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        match radix {
            Some(radix) => match i64::from_str_radix(&lower[2..], radix) {
                Ok(value) => Expr::int(value),
                Err(_) => self.unhandled_expr(node),
            },
            // Lua reads decimal and 0x literals natively.
            None => Expr::constant(Constant::Int(lower.to_string())),
        }
    }

    fn read_string(&self, node: Node) -> Expr {
        let mut parts = Vec::new();
        if node.kind() == "concatenated_string" {
            for child in self.named_children_of(node) {
                self.read_string_parts(child, &mut parts);
            }
        } else {
            self.read_string_parts(node, &mut parts);
        }

        if parts.iter().all(|p| matches!(p, FStringPart::Literal(_))) {
            let text: String = parts
                .into_iter()
                .filter_map(|p| match p {
                    FStringPart::Literal(s) => Some(s),
                    FStringPart::Expr(_) => None,
                })
                .collect();
            Expr::string(text)
        } else {
            Expr::FormattedString { parts }
        }
    }

    /// Append the parts of one string literal, merging adjacent literals.
    fn read_string_parts(&self, node: Node, parts: &mut Vec<FStringPart>) {
        let text = self.node_text(node);
        let prefix_len = text
            .find(|c: char| c == '"' || c == '\'')
            .unwrap_or(0);
        let prefix = text[..prefix_len].to_ascii_lowercase();
        let quoted = &text[prefix_len..];
        let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
            3
        } else {
            1
        };
        let raw = prefix.contains('r');
        let formatted = prefix.contains('f');

        let content_start = node.start_byte() + prefix_len + quote_len;
        let content_end = node.end_byte().saturating_sub(quote_len).max(content_start);

        let push_literal = |parts: &mut Vec<FStringPart>, literal: String| {
            if literal.is_empty() {
                return;
            }
            if let Some(FStringPart::Literal(prev)) = parts.last_mut() {
                prev.push_str(&literal);
            } else {
                parts.push(FStringPart::Literal(literal));
            }
        };

        if !formatted {
            let body = self.source.get(content_start..content_end).unwrap_or("");
            push_literal(parts, decode_string(body, raw));
            return;
        }

        let mut interpolations = Vec::new();
        collect_interpolations(node, &mut interpolations);

        let mut cursor = content_start;
        for interp in interpolations {
            let literal = self.source.get(cursor..interp.start_byte()).unwrap_or("");
            push_literal(parts, decode_string(&unescape_braces(literal), raw));
            parts.push(FStringPart::Expr(self.read_interpolation(interp)));
            cursor = interp.end_byte();
        }
        let tail = self.source.get(cursor..content_end).unwrap_or("");
        push_literal(parts, decode_string(&unescape_braces(tail), raw));
    }

    fn read_interpolation(&self, node: Node) -> Expr {
        let expr_node = node
            .child_by_field_name("expression")
            .or_else(|| self.first_named(node));
        let Some(expr_node) = expr_node else {
            return self.unhandled_expr(node);
        };
        let value = self.read_expr(expr_node);

        // `{x:.2f}` keeps printf-compatible specs via string.format.
        let spec = self
            .named_children_of(node)
            .into_iter()
            .find(|c| c.kind() == "format_specifier")
            .map(|c| self.node_text(c).trim_start_matches(':').to_string());
        match spec {
            Some(spec) if is_printf_spec(&spec) => Expr::call(
                Expr::attribute(Expr::name("string"), "format"),
                vec![Expr::string(format!("%{}", spec)), value],
            ),
            _ => value,
        }
    }

    fn read_attribute(&self, node: Node) -> Expr {
        let (Some(object), Some(attribute)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) else {
            return self.unhandled_expr(node);
        };

        Expr::attribute(self.read_expr(object), self.node_text(attribute))
    }

    fn read_subscript(&self, node: Node) -> Expr {
        let Some(value) = node.child_by_field_name("value") else {
            return self.unhandled_expr(node);
        };

        let mut cursor = node.walk();
        let subscripts: Vec<_> = node
            .children_by_field_name("subscript", &mut cursor)
            .collect();
        let index = match subscripts.as_slice() {
            [] => self.unhandled_expr(node),
            [single] => self.read_expr(*single),
            many => Expr::Tuple {
                elts: many.iter().map(|n| self.read_expr(*n)).collect(),
            },
        };

        Expr::Subscript {
            value: Box::new(self.read_expr(value)),
            index: Box::new(index),
        }
    }

    fn read_slice(&self, node: Node) -> Expr {
        let mut bounds: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut segment = 0;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !child.is_named() {
                if child.kind() == ":" {
                    segment += 1;
                }
                continue;
            }
            if child.kind() == "comment" {
                continue;
            }
            if let Some(slot) = bounds.get_mut(segment) {
                *slot = Some(Box::new(self.read_expr(child)));
            }
        }
        let [lower, upper, step] = bounds;
        Expr::Slice { lower, upper, step }
    }

    fn read_binary_operator(&self, node: Node) -> Expr {
        let (Some(left), Some(right), Some(op_node)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
            node.child_by_field_name("operator"),
        ) else {
            return self.unhandled_expr(node);
        };

        match BinaryOp::from_python(self.node_text(op_node)) {
            Some(op) => Expr::binary(self.read_expr(left), op, self.read_expr(right)),
            None => self.unhandled_expr(node),
        }
    }

    fn read_boolean_operator(&self, node: Node) -> Expr {
        let (Some(left), Some(right), Some(op_node)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
            node.child_by_field_name("operator"),
        ) else {
            return self.unhandled_expr(node);
        };

        let op = match self.node_text(op_node) {
            "and" => BoolOp::And,
            "or" => BoolOp::Or,
            _ => return self.unhandled_expr(node),
        };

        Expr::BoolOp {
            op,
            left: Box::new(self.read_expr(left)),
            right: Box::new(self.read_expr(right)),
        }
    }

    fn read_unary_operator(&self, node: Node) -> Expr {
        let (Some(op_node), Some(arg)) = (
            node.child_by_field_name("operator"),
            node.child_by_field_name("argument"),
        ) else {
            return self.unhandled_expr(node);
        };

        let op = match self.node_text(op_node) {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Pos,
            "~" => UnaryOp::Invert,
            _ => return self.unhandled_expr(node),
        };

        Expr::UnaryOp {
            op,
            operand: Box::new(self.read_expr(arg)),
        }
    }

    fn read_comparison_operator(&self, node: Node) -> Expr {
        // Operands are named children; operators are anonymous tokens.
        // `not in` / `is not` are single aliased tokens.
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_named() {
                if child.kind() != "comment" {
                    operands.push(child);
                }
            } else {
                match CmpOp::from_python(child.kind()) {
                    Some(op) => ops.push(op),
                    None => return self.unhandled_expr(node),
                }
            }
        }

        let Some((first, rest)) = operands.split_first() else {
            return self.unhandled_expr(node);
        };
        if rest.len() != ops.len() || ops.is_empty() {
            return self.unhandled_expr(node);
        }

        Expr::Compare {
            left: Box::new(self.read_expr(*first)),
            ops,
            comparators: rest.iter().map(|n| self.read_expr(*n)).collect(),
        }
    }

    fn read_call(&self, node: Node) -> Expr {
        let Some(function) = node.child_by_field_name("function") else {
            return self.unhandled_expr(node);
        };

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "generator_expression" {
                // f(x for x in xs)
                args.push(self.read_expr(arguments));
            } else {
                for child in self.named_children_of(arguments) {
                    match child.kind() {
                        "keyword_argument" => {
                            let (Some(name), Some(value)) = (
                                child.child_by_field_name("name"),
                                child.child_by_field_name("value"),
                            ) else {
                                args.push(self.unhandled_expr(child));
                                continue;
                            };
                            keywords.push(Keyword {
                                name: Some(self.node_text(name).to_string()),
                                value: self.read_expr(value),
                            });
                        }
                        "dictionary_splat" => {
                            let value = self
                                .first_named(child)
                                .map(|v| self.read_expr(v))
                                .unwrap_or_else(|| self.unhandled_expr(child));
                            keywords.push(Keyword { name: None, value });
                        }
                        _ => args.push(self.read_expr(child)),
                    }
                }
            }
        }

        Expr::Call {
            func: Box::new(self.read_expr(function)),
            args,
            keywords,
        }
    }

    fn read_dictionary(&self, node: Node) -> Expr {
        let mut entries = Vec::new();

        for child in self.named_children_of(node) {
            match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        child.child_by_field_name("key"),
                        child.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    entries.push(DictEntry::Pair {
                        key: self.read_expr(key),
                        value: self.read_expr(value),
                    });
                }
                "dictionary_splat" => {
                    if let Some(value) = self.first_named(child) {
                        entries.push(DictEntry::Splat {
                            value: self.read_expr(value),
                        });
                    }
                }
                _ => entries.push(DictEntry::Pair {
                    key: self.unhandled_expr(child),
                    value: Expr::none(),
                }),
            }
        }

        Expr::Dict { entries }
    }

    fn read_comprehension(&self, node: Node) -> Expr {
        let Some(body) = node.child_by_field_name("body") else {
            return self.unhandled_expr(node);
        };

        let mut generators: Vec<Comprehension> = Vec::new();
        for child in self.named_children_of(node) {
            match child.kind() {
                "for_in_clause" => {
                    let (Some(left), Some(right)) = (
                        child.child_by_field_name("left"),
                        child.child_by_field_name("right"),
                    ) else {
                        return self.unhandled_expr(node);
                    };
                    generators.push(Comprehension {
                        target: self.read_expr(left),
                        iter: self.read_expr(right),
                        ifs: Vec::new(),
                        is_async: self.has_token(child, "async"),
                    });
                }
                "if_clause" => {
                    let (Some(last), Some(cond)) = (generators.last_mut(), self.first_named(child))
                    else {
                        return self.unhandled_expr(node);
                    };
                    last.ifs.push(self.read_expr(cond));
                }
                _ => {}
            }
        }

        if generators.is_empty() {
            return self.unhandled_expr(node);
        }

        match node.kind() {
            "dictionary_comprehension" => {
                let (Some(key), Some(value)) = (
                    body.child_by_field_name("key"),
                    body.child_by_field_name("value"),
                ) else {
                    return self.unhandled_expr(node);
                };
                Expr::DictComp {
                    key: Box::new(self.read_expr(key)),
                    value: Box::new(self.read_expr(value)),
                    generators,
                }
            }
            "set_comprehension" => Expr::SetComp {
                elt: Box::new(self.read_expr(body)),
                generators,
            },
            "generator_expression" => Expr::GeneratorExp {
                elt: Box::new(self.read_expr(body)),
                generators,
            },
            _ => Expr::ListComp {
                elt: Box::new(self.read_expr(body)),
                generators,
            },
        }
    }

    fn read_lambda(&self, node: Node) -> Expr {
        let Some(body) = node.child_by_field_name("body") else {
            return self.unhandled_expr(node);
        };

        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.read_parameters(p))
            .unwrap_or_default();

        Expr::Lambda {
            params,
            body: Box::new(self.read_expr(body)),
        }
    }
}

/// Interpolation nodes belonging to this string, in source order.
fn collect_interpolations<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "interpolation" {
            out.push(child);
        } else if child.child_count() > 0 {
            collect_interpolations(child, out);
        }
    }
}

fn unescape_braces(text: &str) -> String {
    text.replace("{{", "{").replace("}}", "}")
}

/// Node kinds that can stand alone as an expression statement.
fn is_expression_kind(kind: &str) -> bool {
    matches!(
        kind,
        "integer"
            | "float"
            | "string"
            | "concatenated_string"
            | "true"
            | "false"
            | "none"
            | "ellipsis"
            | "identifier"
            | "attribute"
            | "subscript"
            | "binary_operator"
            | "boolean_operator"
            | "unary_operator"
            | "not_operator"
            | "comparison_operator"
            | "call"
            | "list"
            | "tuple"
            | "tuple_expression"
            | "set"
            | "dictionary"
            | "list_comprehension"
            | "set_comprehension"
            | "generator_expression"
            | "dictionary_comprehension"
            | "parenthesized_expression"
            | "conditional_expression"
            | "lambda"
            | "named_expression"
            | "await"
            | "yield"
            | "list_splat"
    )
}

fn is_printf_spec(spec: &str) -> bool {
    let mut chars = spec.chars();
    let Some(conversion) = chars.next_back() else {
        return false;
    };
    "dfsxXeEgGo".contains(conversion)
        && chars.all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | ' ' | '0'))
}

/// Resolve Python escape sequences in a string body.
fn decode_string(body: &str, raw: bool) -> String {
    if raw || !body.contains('\\') {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                push_code_point(&mut out, u32::from_str_radix(&digits, 8).ok());
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..width).filter_map(|_| chars.next()).collect();
                push_code_point(&mut out, u32::from_str_radix(&hex, 16).ok());
            }
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\\' | '\'' | '"' => out.push(next),
            // Backslash-newline continues the line.
            '\n' => {}
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn push_code_point(out: &mut String, code: Option<u32>) {
    match code.and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push('\u{FFFD}'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Program {
        read_python(source).expect("parse failed")
    }

    #[test]
    fn test_simple_assignment() {
        let ir = read("x = 42");
        assert_eq!(ir.body.len(), 1);
        match &ir.body[0] {
            Stmt::Assign { targets, value } => {
                assert_eq!(targets, &vec![Expr::name("x")]);
                assert_eq!(value, &Expr::int(42));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn test_chained_assignment() {
        let ir = read("a = b = 1");
        match &ir.body[0] {
            Stmt::Assign { targets, .. } => {
                assert_eq!(targets, &vec![Expr::name("a"), Expr::name("b")]);
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn test_augmented_assignment() {
        let ir = read("x += 2");
        assert!(matches!(
            &ir.body[0],
            Stmt::AugAssign {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_bare_expression_statements() {
        let ir = read("x\nf()\n[i for i in xs]\nobj.n += 1\n");
        assert!(matches!(&ir.body[0], Stmt::Expr { value: Expr::Name { .. } }));
        assert!(matches!(&ir.body[1], Stmt::Expr { value: Expr::Call { .. } }));
        assert!(matches!(&ir.body[2], Stmt::Expr { value: Expr::ListComp { .. } }));
        match &ir.body[3] {
            Stmt::AugAssign { target, .. } => {
                assert_eq!(target, &Expr::attribute(Expr::name("obj"), "n"));
            }
            other => panic!("expected AugAssign, got {other:?}"),
        }
    }

    #[test]
    fn test_function_call_with_keywords() {
        let ir = read("print(\"hello\", 42, sep=\", \")");
        match &ir.body[0] {
            Stmt::Expr {
                value: Expr::Call {
                    func,
                    args,
                    keywords,
                },
            } => {
                assert_eq!(func.as_name(), Some("print"));
                assert_eq!(args.len(), 2);
                assert_eq!(keywords.len(), 1);
                assert_eq!(keywords[0].name.as_deref(), Some("sep"));
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn test_function_definition() {
        let ir = read("def add(a, b=2, *rest, **opts):\n    total = a + b\n    return total");
        match &ir.body[0] {
            Stmt::FunctionDef(f) => {
                assert_eq!(f.name, "add");
                let names: Vec<_> = f.params.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b", "rest", "opts"]);
                assert!(f.params[1].default.is_some());
                assert_eq!(f.params[2].kind, ParamKind::VarArgs);
                assert_eq!(f.params[3].kind, ParamKind::KwArgs);
                assert_eq!(f.locals, vec!["total"]);
                assert!(!f.is_async);
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn test_decorators_keep_source_order() {
        let ir = read("@outer\n@inner(1)\ndef f():\n    pass");
        match &ir.body[0] {
            Stmt::FunctionDef(f) => {
                assert_eq!(f.decorators.len(), 2);
                assert_eq!(f.decorators[0].as_name(), Some("outer"));
                assert!(matches!(f.decorators[1], Expr::Call { .. }));
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn test_if_elif_else_chain() {
        let ir = read("if a:\n    x = 1\nelif b:\n    x = 2\nelif c:\n    x = 3\nelse:\n    x = 4");
        let Stmt::If { orelse, .. } = &ir.body[0] else {
            panic!("expected If");
        };
        let Stmt::If { orelse, .. } = &orelse[0] else {
            panic!("expected elif");
        };
        let Stmt::If { orelse, .. } = &orelse[0] else {
            panic!("expected second elif");
        };
        assert!(matches!(&orelse[0], Stmt::Assign { .. }));
    }

    #[test]
    fn test_for_loop_with_continue() {
        let ir = read("for i in items:\n    if i:\n        continue\n    print(i)");
        match &ir.body[0] {
            Stmt::For {
                target,
                has_continue,
                is_async,
                ..
            } => {
                assert_eq!(target.as_name(), Some("i"));
                assert!(*has_continue);
                assert!(!*is_async);
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn test_class_with_base() {
        let ir = read("class Bar(Foo):\n    x = 1\n    def m(self):\n        return self.x");
        match &ir.body[0] {
            Stmt::ClassDef(c) => {
                assert_eq!(c.name, "Bar");
                assert_eq!(c.bases, vec![Expr::name("Foo")]);
                assert_eq!(c.body.len(), 2);
            }
            other => panic!("expected ClassDef, got {other:?}"),
        }
    }

    #[test]
    fn test_try_except_finally() {
        let ir = read(
            "try:\n    risky()\nexcept ValueError as e:\n    log(e)\nexcept:\n    pass\nelse:\n    ok()\nfinally:\n    done()",
        );
        match &ir.body[0] {
            Stmt::Try {
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                assert_eq!(handlers.len(), 2);
                assert_eq!(handlers[0].type_, Some(Expr::name("ValueError")));
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert_eq!(handlers[1].type_, None);
                assert_eq!(orelse.len(), 1);
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("expected Try, got {other:?}"),
        }
    }

    #[test]
    fn test_with_as() {
        let ir = read("with open(path) as f:\n    data = f.read()");
        match &ir.body[0] {
            Stmt::With { items, is_async, .. } => {
                assert_eq!(items.len(), 1);
                assert!(matches!(items[0].context, Expr::Call { .. }));
                assert_eq!(items[0].target, Some(Expr::name("f")));
                assert!(!*is_async);
            }
            other => panic!("expected With, got {other:?}"),
        }
    }

    #[test]
    fn test_async_constructs() {
        let ir = read("async def f():\n    await g()\n    async for x in xs:\n        pass");
        match &ir.body[0] {
            Stmt::FunctionDef(f) => {
                assert!(f.is_async);
                assert!(matches!(
                    &f.body[0],
                    Stmt::Expr {
                        value: Expr::Await { .. }
                    }
                ));
                assert!(matches!(&f.body[1], Stmt::For { is_async: true, .. }));
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn test_yield_and_yield_from() {
        let ir = read("def g():\n    yield 1\n    yield from other()");
        let Stmt::FunctionDef(f) = &ir.body[0] else {
            panic!("expected FunctionDef");
        };
        assert!(matches!(
            &f.body[0],
            Stmt::Expr {
                value: Expr::Yield { value: Some(_) }
            }
        ));
        assert!(matches!(
            &f.body[1],
            Stmt::Expr {
                value: Expr::YieldFrom { .. }
            }
        ));
    }

    #[test]
    fn test_list_comprehension_with_filter() {
        let ir = read("ys = [i * 2 for i in range(3) if i]");
        let Stmt::Assign { value, .. } = &ir.body[0] else {
            panic!("expected Assign");
        };
        match value {
            Expr::ListComp { generators, .. } => {
                assert_eq!(generators.len(), 1);
                assert_eq!(generators[0].ifs.len(), 1);
            }
            other => panic!("expected ListComp, got {other:?}"),
        }
    }

    #[test]
    fn test_dict_comprehension() {
        let ir = read("d = {k: v for k, v in pairs}");
        let Stmt::Assign { value, .. } = &ir.body[0] else {
            panic!("expected Assign");
        };
        assert!(matches!(value, Expr::DictComp { .. }));
    }

    #[test]
    fn test_chained_comparison() {
        let ir = read("ok = 0 <= x < 10 and y is not None");
        let Stmt::Assign { value, .. } = &ir.body[0] else {
            panic!("expected Assign");
        };
        let Expr::BoolOp { left, right, .. } = value else {
            panic!("expected BoolOp");
        };
        match left.as_ref() {
            Expr::Compare { ops, .. } => assert_eq!(ops, &vec![CmpOp::LtE, CmpOp::Lt]),
            other => panic!("expected Compare, got {other:?}"),
        }
        match right.as_ref() {
            Expr::Compare { ops, .. } => assert_eq!(ops, &vec![CmpOp::IsNot]),
            other => panic!("expected Compare, got {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes_and_prefixes() {
        let ir = read("a = 'it\\'s\\n'\nb = r'\\d+'\nc = 'x' 'y'");
        let values: Vec<_> = ir
            .body
            .iter()
            .map(|s| match s {
                Stmt::Assign { value, .. } => value.clone(),
                other => panic!("expected Assign, got {other:?}"),
            })
            .collect();
        assert_eq!(values[0], Expr::string("it's\n"));
        assert_eq!(values[1], Expr::string("\\d+"));
        assert_eq!(values[2], Expr::string("xy"));
    }

    #[test]
    fn test_fstring_parts() {
        let ir = read("msg = f\"hi {name}, {{ok}} {n:.2f}\"");
        let Stmt::Assign { value, .. } = &ir.body[0] else {
            panic!("expected Assign");
        };
        let Expr::FormattedString { parts } = value else {
            panic!("expected FormattedString, got {value:?}");
        };
        assert_eq!(parts[0], FStringPart::Literal("hi ".into()));
        assert_eq!(parts[1], FStringPart::Expr(Expr::name("name")));
        assert_eq!(parts[2], FStringPart::Literal(", {ok} ".into()));
        assert!(matches!(&parts[3], FStringPart::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_integer_normalization() {
        let ir = read("a = 1_000\nb = 0o17\nc = 0xFF");
        let values: Vec<_> = ir
            .body
            .iter()
            .map(|s| match s {
                Stmt::Assign { value, .. } => value.clone(),
                other => panic!("expected Assign, got {other:?}"),
            })
            .collect();
        assert_eq!(values[0], Expr::int(1000));
        assert_eq!(values[1], Expr::int(15));
        assert_eq!(values[2], Expr::constant(Constant::Int("0xff".into())));
    }

    #[test]
    fn test_imports_are_recorded() {
        let ir = read("import os.path\nimport numpy as np\nfrom ..pkg import a as b, c");
        assert_eq!(ir.imported, vec!["os", "np", "b", "c"]);
        match &ir.body[2] {
            Stmt::ImportFrom { module, level, .. } => {
                assert_eq!(module.as_deref(), Some("pkg"));
                assert_eq!(*level, 2);
            }
            other => panic!("expected ImportFrom, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_statement_falls_back() {
        let ir = read("match x:\n    case 1:\n        pass");
        match &ir.body[0] {
            Stmt::Unhandled { kind, text } => {
                assert_eq!(kind, "match_statement");
                assert_eq!(text, "match x:");
            }
            other => panic!("expected Unhandled, got {other:?}"),
        }
    }

    #[test]
    fn test_complex_literal_falls_back() {
        let ir = read("z = 2j");
        let Stmt::Assign { value, .. } = &ir.body[0] else {
            panic!("expected Assign");
        };
        assert!(matches!(value, Expr::Unhandled { .. }));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            read_python("def broken(:\n"),
            Err(ReadError::Syntax { .. })
        ));
    }

    #[test]
    fn test_empty_source() {
        assert!(read("").is_empty());
    }
}
