//! AST for the embedded scripting dialect.
//!
//! Generated replacement text, macro-argument literals, and the final
//! expanded program all parse into these nodes. The dialect is a small
//! expression/statement language with reference-semantics arrays and
//! insertion-ordered objects; see `script::eval` for the semantics.

use std::rc::Rc;

use crate::errors::Span;

/// A node paired with the byte span it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type SpExpr = Spanned<Expr>;
pub type SpStmt = Spanned<Stmt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Incr,
    Decr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

/// A function literal. The verbatim source slice is retained so function
/// values can be stringified back to re-evaluable text.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLit {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<SpStmt>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    Array(Vec<SpExpr>),
    /// Object literal entries in written order.
    Object(Vec<(String, SpExpr)>),
    Function(Rc<FunctionLit>),
    Unary(UnaryOp, Box<SpExpr>),
    /// `++`/`--`; the bool is true for the prefix form.
    Update(UpdateOp, bool, Box<SpExpr>),
    Binary(BinOp, Box<SpExpr>, Box<SpExpr>),
    Logical(LogicalOp, Box<SpExpr>, Box<SpExpr>),
    Assign(AssignOp, Box<SpExpr>, Box<SpExpr>),
    Conditional(Box<SpExpr>, Box<SpExpr>, Box<SpExpr>),
    Call(Box<SpExpr>, Vec<SpExpr>),
    Member(Box<SpExpr>, String),
    Index(Box<SpExpr>, Box<SpExpr>),
    /// Comma sequence; evaluates left to right, yields the last value.
    Sequence(Vec<SpExpr>),
}

/// One `var` declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<SpExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(Vec<Declarator>),
    Expr(SpExpr),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Expr(SpExpr),
    Var(Vec<Declarator>),
    Return(Option<SpExpr>),
    Block(Vec<SpStmt>),
    If {
        cond: SpExpr,
        then_branch: Box<SpStmt>,
        else_branch: Option<Box<SpStmt>>,
    },
    For {
        init: ForInit,
        cond: Option<SpExpr>,
        update: Option<SpExpr>,
        body: Box<SpStmt>,
    },
    ForIn {
        decl: bool,
        var: String,
        object: SpExpr,
        body: Box<SpStmt>,
    },
    FunctionDecl(Rc<FunctionLit>),
}
