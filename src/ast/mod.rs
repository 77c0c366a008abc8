// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Input statement tree
//!
//! This is the shape a host hands over: one procedure body written in
//! sequential style, plus the declared element type. Every node is
//! serde-(de)serializable so the tree can cross a process boundary as JSON.

use crate::config::Markers;
use crate::error::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;


/// Synthetic identity of a declared variable, assigned by name remapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// An identifier occurrence. `symbol` is filled in by name remapping; free
/// identifiers (host globals) keep `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<SymbolId>,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: None,
        }
    }

    pub fn resolved(name: impl Into<String>, symbol: SymbolId) -> Self {
        Self {
            name: name.into(),
            symbol: Some(symbol),
        }
    }
}

/// A (possibly generic) type name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeRef>,
}

const PRIMITIVE_TYPES: &[&str] = &[
    "int", "long", "short", "byte", "char", "boolean", "float", "double",
];

impl TypeRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }

    pub fn int() -> Self {
        Self::named("int")
    }

    pub fn boolean() -> Self {
        Self::named("boolean")
    }

    pub fn throwable() -> Self {
        Self::named("Throwable")
    }

    pub fn iterator_of(element: TypeRef) -> Self {
        Self::generic("Iterator", vec![element])
    }

    /// Value types are never cleared; everything else holds a reference
    pub fn is_primitive(&self) -> bool {
        self.args.is_empty() && PRIMITIVE_TYPES.contains(&self.name.as_str())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Ident(Ident),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set
    Assign {
        target: Ident,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// `++x`, `x++`, `--x`, `x--`
    Increment {
        target: Ident,
        delta: i64,
        postfix: bool,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

/// Which of the two marker operations a call is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Emit,
    EmitAll,
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn var(ident: Ident) -> Self {
        Expr::Ident(ident)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn assign(target: Ident, value: Expr) -> Self {
        Expr::Assign {
            target,
            op: None,
            value: Box::new(value),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.to_string(),
            args,
        }
    }

    pub fn method(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            receiver: Box::new(receiver),
            method: method.to_string(),
            args,
        }
    }

    /// Recognise a marker application: a call to a marker name with exactly
    /// one argument.
    pub fn as_marker(&self, markers: Markers<'_>) -> Option<(MarkerKind, &Expr)> {
        match self {
            Expr::Call { callee, args } if args.len() == 1 => {
                if callee == markers.emit {
                    Some((MarkerKind::Emit, &args[0]))
                } else if callee == markers.emit_all {
                    Some((MarkerKind::EmitAll, &args[0]))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Name of the first marker applied anywhere inside this expression
    pub fn find_marker<'m>(&self, markers: Markers<'m>) -> Option<&'m str> {
        if let Some((kind, _)) = self.as_marker(markers) {
            return Some(match kind {
                MarkerKind::Emit => markers.emit,
                MarkerKind::EmitAll => markers.emit_all,
            });
        }
        match self {
            Expr::Literal(_) | Expr::Ident(_) | Expr::Increment { .. } => None,
            Expr::Unary { operand, .. } => operand.find_marker(markers),
            Expr::Binary { lhs, rhs, .. } => lhs
                .find_marker(markers)
                .or_else(|| rhs.find_marker(markers)),
            Expr::Assign { value, .. } => value.find_marker(markers),
            Expr::Call { args, .. } => args.iter().find_map(|a| a.find_marker(markers)),
            Expr::MethodCall { receiver, args, .. } => receiver
                .find_marker(markers)
                .or_else(|| args.iter().find_map(|a| a.find_marker(markers))),
        }
    }
}

/// A local declaration: `ty name = init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: Ident,
    pub ty: TypeRef,
    #[serde(default)]
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Constant labels; empty for a bare `default:`
    #[serde(default)]
    pub labels: Vec<Expr>,
    #[serde(default)]
    pub is_default: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: Ident,
    /// One entry per alternative of a multi-catch
    pub types: Vec<TypeRef>,
    pub body: Vec<Stmt>,
}

impl CatchClause {
    /// Declared type of the catch parameter
    pub fn param_type(&self) -> TypeRef {
        match self.types.as_slice() {
            [single] => single.clone(),
            _ => TypeRef::throwable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStmt {
    #[serde(default)]
    pub resources: Vec<LocalDecl>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub catches: Vec<CatchClause>,
    #[serde(default)]
    pub finally: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    Local(LocalDecl),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        var: LocalDecl,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Try(Box<TryStmt>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Synchronized {
        lock: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub location: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// Statement without a source position
    pub fn synthetic(kind: StmtKind) -> Self {
        Self::new(kind, SourceLocation::unknown())
    }

    pub fn expr(expr: Expr) -> Self {
        Self::synthetic(StmtKind::Expr(expr))
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Self::synthetic(StmtKind::Block(stmts))
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. }
                | StmtKind::ForEach { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeRef,
}

/// A procedure annotated as a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl Procedure {
    /// Type of emitted values: the first type argument of the declared
    /// return type (`Iterator<T>` gives `T`)
    pub fn element_type(&self) -> Option<TypeRef> {
        self.return_type
            .as_ref()
            .and_then(|ty| ty.args.first())
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub procedures: Vec<Procedure>,
}

impl CompilationUnit {
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}
