//! Normalized intermediate representation.
//!
//! The IR is a closed set of statement and expression kinds. Every node
//! owns its children outright, so a tree is always walked top-down in a
//! single pass. Everything the writer needs is resolved here: string
//! literals are decoded, numerals are normalized, decorator lists keep
//! source order (outermost first) and function locals are precomputed.
//!
//! Constructs the reader does not recognize are kept as
//! [`Stmt::Unhandled`] / [`Expr::Unhandled`] so they survive into the
//! output as a visible marker instead of disappearing.

mod scan;

pub use scan::{assigned_names, contains_continue, contains_return, contains_yield};

use serde::{Deserialize, Serialize};

/// A whole source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    /// Names bound by `import` / `from ... import` at module level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imported: Vec<String>,
}

impl Program {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            imported: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Expr {
        value: Expr,
    },
    /// `a = b = value`; targets in source order.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        /// `elif` chains are nested `If` statements here.
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        has_continue: bool,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        has_continue: bool,
        is_async: bool,
    },
    FunctionDef(Box<FunctionDef>),
    ClassDef(Box<ClassDef>),
    Return {
        value: Option<Expr>,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: usize,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Delete {
        targets: Vec<Expr>,
    },
    Break,
    Continue,
    Pass,
    /// A statement kind outside the closed set.
    Unhandled {
        /// Grammar node kind, serialized as `node_kind` (`kind` is the tag).
        #[serde(rename = "node_kind")]
        kind: String,
        text: String,
    },
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Name {
        id: String,
    },
    Constant {
        value: Constant,
    },
    /// f-string: literal and interpolated parts in order.
    FormattedString {
        parts: Vec<FStringPart>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `a < b <= c`; `comparators` has one entry per operator.
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    List {
        elts: Vec<Expr>,
    },
    Tuple {
        elts: Vec<Expr>,
    },
    Set {
        elts: Vec<Expr>,
    },
    Dict {
        entries: Vec<DictEntry>,
    },
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    NamedExpr {
        target: String,
        value: Box<Expr>,
    },
    Yield {
        value: Option<Box<Expr>>,
    },
    YieldFrom {
        value: Box<Expr>,
    },
    Await {
        value: Box<Expr>,
    },
    /// `*value` in a call, list or assignment target.
    Starred {
        value: Box<Expr>,
    },
    /// An expression kind outside the closed set.
    Unhandled {
        /// Grammar node kind, serialized as `node_kind` (`kind` is the tag).
        #[serde(rename = "node_kind")]
        kind: String,
        text: String,
    },
}

/// Literal values, already normalized for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Constant {
    None,
    Bool(bool),
    /// Decimal or hexadecimal integer text, underscores removed.
    Int(String),
    /// Float text, underscores removed.
    Float(String),
    /// Decoded string contents.
    Str(String),
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FStringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DictEntry {
    Pair { key: Expr, value: Expr },
    /// `**other`
    Splat { value: Expr },
}

/// `name=value` at a call site; `name` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: Option<String>,
    pub value: Expr,
}

/// One `for ... in ... if ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Positional,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub kind: ParamKind,
}

impl Param {
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            kind: ParamKind::Positional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Source order: the first entry is the outermost decorator.
    pub decorators: Vec<Expr>,
    /// Names assigned in the body that are local to this function.
    pub locals: Vec<String>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// Exception type expression; `None` for a bare `except:`.
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name this import binds in the importing scope.
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    /// Python spelling, used in markers and for augmented assignment lookup.
    pub fn python_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::MatMul => "@",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }

    pub fn from_python(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "@" => BinaryOp::MatMul,
            "<<" => BinaryOp::LShift,
            ">>" => BinaryOp::RShift,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn python_symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }

    pub fn from_python(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "is" => CmpOp::Is,
            "is not" => CmpOp::IsNot,
            "in" => CmpOp::In,
            "not in" => CmpOp::NotIn,
            _ => return None,
        };
        Some(op)
    }
}

// Builder helpers, mostly used by tests and the reader.

impl Stmt {
    pub fn expr(value: Expr) -> Self {
        Stmt::Expr { value }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            value,
        }
    }

    pub fn if_stmt(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        Stmt::If { test, body, orelse }
    }

    pub fn while_loop(test: Expr, body: Vec<Stmt>) -> Self {
        let has_continue = contains_continue(&body);
        Stmt::While {
            test,
            body,
            orelse: Vec::new(),
            has_continue,
        }
    }

    pub fn for_in(target: Expr, iter: Expr, body: Vec<Stmt>) -> Self {
        let has_continue = contains_continue(&body);
        Stmt::For {
            target,
            iter,
            body,
            orelse: Vec::new(),
            has_continue,
            is_async: false,
        }
    }

    pub fn function(def: FunctionDef) -> Self {
        Stmt::FunctionDef(Box::new(def))
    }

    pub fn class(def: ClassDef) -> Self {
        Stmt::ClassDef(Box::new(def))
    }

    pub fn return_stmt(value: Option<Expr>) -> Self {
        Stmt::Return { value }
    }

    pub fn unhandled(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Stmt::Unhandled {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name { id: id.into() }
    }

    pub fn constant(value: Constant) -> Self {
        Expr::Constant { value }
    }

    pub fn int(value: i64) -> Self {
        Expr::constant(Constant::Int(value.to_string()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::constant(Constant::Str(value.into()))
    }

    pub fn none() -> Self {
        Expr::constant(Constant::None)
    }

    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            keywords: Vec::new(),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn compare(left: Expr, op: CmpOp, right: Expr) -> Self {
        Expr::Compare {
            left: Box::new(left),
            ops: vec![op],
            comparators: vec![right],
        }
    }

    pub fn unhandled(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Expr::Unhandled {
            kind: kind.into(),
            text: text.into(),
        }
    }

    /// The identifier if this is a plain name reference.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id } => Some(id),
            _ => None,
        }
    }

    /// Whether this expression is statically known to produce a string.
    pub fn is_stringish(&self) -> bool {
        matches!(
            self,
            Expr::Constant {
                value: Constant::Str(_)
            } | Expr::FormattedString { .. }
        )
    }
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        let params_named: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        let locals = assigned_names(&body, &params_named);
        Self {
            name: name.into(),
            params,
            body,
            decorators: Vec::new(),
            locals,
            is_async: false,
        }
    }
}

impl ClassDef {
    pub fn new(name: impl Into<String>, bases: Vec<Expr>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            bases,
            body,
            decorators: Vec::new(),
        }
    }
}
