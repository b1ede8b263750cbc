// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use crate::SourceLocation;

/// A closure literal as written in a MAL rule or a LAL conditional.
///
/// The body is a statically typed statement list; there is no dynamic
/// dispatch left in it. Property access on the tag map (`tags.key`) is kept
/// in the tree as written and desugared to index access when the closure is
/// lifted into a compiled callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    params: Vec<Box<str>>,
    body: Vec<ClosureStatement>,
    location: SourceLocation,
}

impl Closure {
    pub fn new(
        params: Vec<Box<str>>,
        body: Vec<ClosureStatement>,
        location: SourceLocation,
    ) -> Closure {
        Self {
            params,
            body,
            location,
        }
    }

    pub fn get_params(&self) -> &[Box<str>] {
        &self.params
    }

    pub fn get_body(&self) -> &[ClosureStatement] {
        &self.body
    }

    pub fn get_location(&self) -> &SourceLocation {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClosureStatement {
    /// `def name = expression`
    Declare {
        name: Box<str>,
        value: ClosureExpression,
        location: SourceLocation,
    },

    Assign {
        target: AssignmentTarget,
        value: ClosureExpression,
        location: SourceLocation,
    },

    /// Early exit from the callable. A bare `return` yields the callable's
    /// default result (the current tag map for tag-rewrite closures).
    Return {
        value: Option<ClosureExpression>,
        location: SourceLocation,
    },

    If {
        branches: Vec<ConditionalBranch>,
        else_body: Vec<ClosureStatement>,
        location: SourceLocation,
    },

    Expression {
        value: ClosureExpression,
        location: SourceLocation,
    },
}

impl ClosureStatement {
    pub fn get_location(&self) -> &SourceLocation {
        match self {
            ClosureStatement::Declare { location, .. } => location,
            ClosureStatement::Assign { location, .. } => location,
            ClosureStatement::Return { location, .. } => location,
            ClosureStatement::If { location, .. } => location,
            ClosureStatement::Expression { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    condition: ClosureExpression,
    body: Vec<ClosureStatement>,
}

impl ConditionalBranch {
    pub fn new(condition: ClosureExpression, body: Vec<ClosureStatement>) -> ConditionalBranch {
        Self { condition, body }
    }

    pub fn get_condition(&self) -> &ClosureExpression {
        &self.condition
    }

    pub fn get_body(&self) -> &[ClosureStatement] {
        &self.body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentTarget {
    Variable { name: Box<str> },

    /// `receiver[key] = …`; `receiver.key = …` is parsed as this with a
    /// string key when the receiver is the tag map.
    Index {
        receiver: ClosureExpression,
        key: ClosureExpression,
    },

    Property {
        receiver: ClosureExpression,
        name: Box<str>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn get_symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClosureExpression {
    Null,

    Boolean(bool),

    Integer(i64),

    Double(f64),

    Str(Box<str>),

    Identifier(Box<str>),

    /// `receiver.name` or `receiver?.name`.
    Property {
        receiver: Box<ClosureExpression>,
        name: Box<str>,
        null_safe: bool,
    },

    /// `receiver[key]`.
    Index {
        receiver: Box<ClosureExpression>,
        key: Box<ClosureExpression>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<ClosureExpression>,
    },

    Binary {
        op: BinaryOp,
        left: Box<ClosureExpression>,
        right: Box<ClosureExpression>,
    },

    Ternary {
        condition: Box<ClosureExpression>,
        if_true: Box<ClosureExpression>,
        if_false: Box<ClosureExpression>,
    },

    /// `receiver.method(args)` or `receiver?.method(args)`; the method set is
    /// a whitelist enforced when the closure is lifted.
    MethodCall {
        receiver: Box<ClosureExpression>,
        method: Box<str>,
        args: Vec<ClosureExpression>,
        null_safe: bool,
    },

    /// Whitelisted static registry call, e.g.
    /// `ProcessRegistry.generateVirtualLocalProcess(a, b)`.
    StaticCall {
        type_name: Box<str>,
        method: Box<str>,
        args: Vec<ClosureExpression>,
    },
}
