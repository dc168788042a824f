use std::ops::Range;
use std::sync::Arc;

use crate::eval::CustomNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    StringLit(String),
    BoolLit(bool),
    Var(String),
    Attribute(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>),  // foo['bar']
    Not(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Var(Expr),
    For {
        target: String,
        iterable: Expr,
        body: Program,
    },
    If {
        cases: Vec<(Expr, Program)>, // (condition, body). Includes if and elifs.
        else_body: Option<Program>,
    },
    /// A node produced by a registered tag.
    Custom(Arc<dyn CustomNode>),
}

/// A sequence of nodes together with the source span they were parsed from.
#[derive(Debug, Clone)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub span: Range<usize>,
}

impl Program {
    /// An empty program positioned at `at`. Renders as an empty string.
    pub fn empty(at: usize) -> Self {
        Self {
            nodes: Vec::new(),
            span: at..at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
