//! Owned script tree the interpreter walks.
//!
//! Lowered once from the OXC AST so compiled evaluators outlive the parser's
//! arena and can be shared between Values through `Rc`.

use std::rc::Rc;

pub use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator, UpdateOperator};

pub type Name = Rc<str>;

#[derive(Debug, Clone)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Name),
    Template {
        quasis: Vec<Name>,
        exprs: Vec<Expr>,
    },
    Ident(Name),
    This,
    Array(Vec<ArrayItem>),
    Object(Vec<Prop>),
    Function(Rc<FunctionDef>),
    Unary(UnaryOperator, Box<Expr>),
    Update {
        op: UpdateOperator,
        prefix: bool,
        target: Box<Target>,
    },
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
    Logical(LogicalOperator, Box<Expr>, Box<Expr>),
    Assign {
        op: AssignOp,
        target: Box<Target>,
        value: Box<Expr>,
    },
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Member {
        object: Box<Expr>,
        property: Box<PropName>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ArrayItem>,
        optional: bool,
    },
    /// `a?.b.c()`: a short circuit anywhere inside yields `undefined`
    Chain(Box<Expr>),
    Sequence(Vec<Expr>),
}

/// Assignment operator: plain, arithmetic compound, or logical compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

#[derive(Debug, Clone)]
pub enum ArrayItem {
    Item(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone)]
pub enum Prop {
    KeyValue(PropName, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum PropName {
    Static(Name),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub enum Target {
    Ident(Name),
    Member(Expr, PropName),
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(Name),
    Object {
        props: Vec<(PropName, Pattern)>,
        rest: Option<Box<Pattern>>,
    },
    Array {
        items: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    Default(Box<Pattern>, Expr),
    /// Assignment into an existing binding or member, as in `for (x of …)`
    Target(Target),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Decl(DeclKind, Vec<(Pattern, Option<Expr>)>),
    Function(Name, Rc<FunctionDef>),
    Return(Option<Expr>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Block(Vec<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        decl: Option<DeclKind>,
        pattern: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        decl: Option<DeclKind>,
        pattern: Pattern,
        object: Expr,
        body: Box<Stmt>,
    },
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch(Expr, Vec<(Option<Expr>, Vec<Stmt>)>),
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: Option<Name>,
    pub params: Vec<Pattern>,
    pub rest: Option<Pattern>,
    pub body: Vec<Stmt>,
    /// `var` names declared anywhere in the body, hoisted on entry
    pub hoisted: Vec<Name>,
    pub is_arrow: bool,
}
