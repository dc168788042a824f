use std::collections::HashMap;
use std::fmt;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::expr::parse_expr;
use crate::identity::User;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    Null,
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Null => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Everything a template can see while rendering: the current user and
/// named variables.
#[derive(Clone, Debug, Default)]
pub struct RenderContext {
    user: Option<User>,
    vars: HashMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// A node contributed by a registered tag.
pub trait CustomNode: fmt::Debug + Send + Sync {
    fn render(&self, evaluator: &mut Evaluator<'_>) -> Result<String>;
}

/// Renders programs against a borrowed [`RenderContext`].
///
/// Loop variables live in local scopes stacked on top of the context; the
/// context itself is never written to.
pub struct Evaluator<'ctx> {
    context: &'ctx RenderContext,
    scopes: Vec<HashMap<String, Value>>,
}

impl<'ctx> Evaluator<'ctx> {
    pub fn new(context: &'ctx RenderContext) -> Self {
        Self {
            context,
            scopes: Vec::new(),
        }
    }

    pub fn context(&self) -> &'ctx RenderContext {
        self.context
    }

    pub fn current_user(&self) -> Option<&'ctx User> {
        self.context.current_user()
    }

    fn get_var(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.context.get_var(name))
    }

    /// Resolve a raw tag argument the way a template variable would be: a
    /// quoted token is its literal text, anything else is a lookup path such
    /// as `team.name`. Missing or null values resolve to `None`.
    pub fn resolve_variable(&self, token: &str) -> Option<Value> {
        let expr = parse_expr(token, 0).ok()?;
        match self.eval_expr(&expr).ok()? {
            Value::Null => None,
            value => Some(value),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn set_local(&mut self, name: String, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    pub fn render(&mut self, program: &Program) -> Result<String> {
        let mut output = String::new();
        for node in &program.nodes {
            match node {
                Node::Text(s) => output.push_str(s),
                Node::Var(expr) => match self.eval_expr(expr)? {
                    Value::String(s) => output.push_str(&s),
                    Value::Bool(b) => output.push_str(&b.to_string()),
                    Value::Null => {}
                    val => return Err(Error::render(format!("cannot render complex value {:?}", val))),
                },
                Node::For {
                    target,
                    iterable,
                    body,
                } => match self.eval_expr(iterable)? {
                    Value::Array(items) => {
                        let len = items.len();
                        for (i, item) in items.into_iter().enumerate() {
                            self.push_scope();
                            self.set_local(target.clone(), item);

                            let mut loop_map = HashMap::new();
                            loop_map.insert("index0".to_string(), Value::String(i.to_string()));
                            loop_map.insert("first".to_string(), Value::Bool(i == 0));
                            loop_map.insert("last".to_string(), Value::Bool(i + 1 == len));
                            self.set_local("loop".to_string(), Value::Map(loop_map));

                            let rendered = self.render(body);
                            self.pop_scope();
                            output.push_str(&rendered?);
                        }
                    }
                    Value::Null => {}
                    val => return Err(Error::render(format!("expected array for loop, got {:?}", val))),
                },
                Node::If { cases, else_body } => {
                    let mut matched = false;
                    for (cond, body) in cases {
                        if self.eval_expr(cond)?.is_truthy() {
                            output.push_str(&self.render(body)?);
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        if let Some(body) = else_body {
                            output.push_str(&self.render(body)?);
                        }
                    }
                }
                Node::Custom(custom) => output.push_str(&custom.render(self)?),
            }
        }
        Ok(output)
    }

    fn eval_expr(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => Ok(self.get_var(name).cloned().unwrap_or(Value::Null)),
            Expr::Attribute(obj, attr) => match self.eval_expr(obj)? {
                Value::Map(m) => Ok(m.get(attr).cloned().unwrap_or(Value::Null)),
                _ => Ok(Value::Null),
            },
            Expr::Index(obj, idx) => {
                let val = self.eval_expr(obj)?;
                let idx_val = self.eval_expr(idx)?;
                match (val, idx_val) {
                    (Value::Map(m), Value::String(s)) => Ok(m.get(&s).cloned().unwrap_or(Value::Null)),
                    (Value::Array(a), Value::String(s)) => match s.parse::<usize>() {
                        Ok(i) => Ok(a.get(i).cloned().unwrap_or(Value::Null)),
                        Err(_) => Err(Error::render(format!("index must be an integer, got {}", s))),
                    },
                    _ => Ok(Value::Null),
                }
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_expr(inner)?.is_truthy())),
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.eval_expr(lhs)?;
                match op {
                    // Short-circuit like Jinja; the right side is never
                    // evaluated when the left decides.
                    BinOp::And if !l.is_truthy() => Ok(Value::Bool(false)),
                    BinOp::Or if l.is_truthy() => Ok(Value::Bool(true)),
                    BinOp::And | BinOp::Or => Ok(Value::Bool(self.eval_expr(rhs)?.is_truthy())),
                    BinOp::Eq => Ok(Value::Bool(l == self.eval_expr(rhs)?)),
                    BinOp::NotEq => Ok(Value::Bool(l != self.eval_expr(rhs)?)),
                }
            }
        }
    }
}
