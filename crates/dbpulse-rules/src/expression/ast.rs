//! Expression syntax tree.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Name(String),
    Subscript {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `target.name(args)`
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `name(args)`, restricted to the built-in function whitelist.
    Call {
        func: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c`, evaluated pairwise with short-circuit.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Bool {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `[element for targets in iter if cond ...]`; generator arguments
    /// evaluate the same way.
    Comprehension {
        element: Box<Expr>,
        targets: Vec<String>,
        iter: Box<Expr>,
        conditions: Vec<Expr>,
    },
}

impl Expr {
    /// Whether a free reference to `name` appears anywhere in the tree.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Expr::Literal(_) => false,
            Expr::Name(n) => n == name,
            Expr::List(items) => items.iter().any(|e| e.references(name)),
            Expr::Subscript { target, index } => target.references(name) || index.references(name),
            Expr::Method { target, args, .. } => {
                target.references(name) || args.iter().any(|e| e.references(name))
            }
            Expr::Call { args, .. } => args.iter().any(|e| e.references(name)),
            Expr::Unary { operand, .. } => operand.references(name),
            Expr::Binary { left, right, .. } => left.references(name) || right.references(name),
            Expr::Compare { first, rest } => {
                first.references(name) || rest.iter().any(|(_, e)| e.references(name))
            }
            Expr::Bool { values, .. } => values.iter().any(|e| e.references(name)),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => condition.references(name) || then.references(name) || otherwise.references(name),
            Expr::Comprehension {
                element,
                targets,
                iter,
                conditions,
            } => {
                iter.references(name)
                    || (!targets.iter().any(|t| t == name)
                        && (element.references(name)
                            || conditions.iter().any(|e| e.references(name))))
            }
        }
    }
}
