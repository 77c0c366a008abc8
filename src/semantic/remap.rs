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

//! Name remapping
//!
//! Every parameter and local declaration gets a fresh `SymbolId`, and every
//! use is resolved against the lexical scope stack. Once all locals are
//! promoted to fields of one object, two declarations of `i` in sibling
//! blocks are distinct fields because their ids differ.

use crate::ast::{Expr, Ident, LocalDecl, Procedure, Stmt, StmtKind, SymbolId, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Parameter,
    Local,
    /// Introduced by the lowering engine (iteration handles, nested selectors)
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub ty: TypeRef,
    pub kind: SymbolKind,
}

/// All symbols of one procedure, indexed by `SymbolId`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<SymbolInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, ty: TypeRef, kind: SymbolKind) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolInfo {
            name: name.to_string(),
            ty,
            kind,
        });
        id
    }

    pub fn synthetic(&mut self, prefix: &str, ty: TypeRef) -> SymbolId {
        self.declare(prefix, ty, SymbolKind::Synthetic)
    }

    pub fn get(&self, id: SymbolId) -> Option<&SymbolInfo> {
        self.symbols.get(id.0 as usize)
    }

    /// Unique display name, `name$id`
    pub fn display(&self, id: SymbolId) -> String {
        match self.get(id) {
            Some(info) => format!("{}${}", info.name, id.0),
            None => format!("$unknown{}", id.0),
        }
    }

    /// Identifier node referring to `id`
    pub fn ident(&self, id: SymbolId) -> Ident {
        let name = self.get(id).map(|info| info.name.clone()).unwrap_or_default();
        Ident::resolved(name, id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolInfo)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, info)| (SymbolId(i as u32), info))
    }
}

/// Resolve every identifier of `procedure`. Numbering restarts at zero for
/// each procedure, so remapping the same tree twice gives equal results.
pub fn remap_procedure(procedure: &Procedure) -> (Procedure, SymbolTable) {
    let mut remapped = procedure.clone();
    let mut remapper = Remapper {
        symbols: SymbolTable::new(),
        scopes: vec![HashMap::new()],
    };

    for param in &mut remapped.params {
        let id = remapper.define(&param.name.name, param.ty.clone(), SymbolKind::Parameter);
        param.name.symbol = Some(id);
    }
    remapper.scoped(|r| r.stmts(&mut remapped.body));

    (remapped, remapper.symbols)
}

struct Remapper {
    symbols: SymbolTable,
    /// Stack of scopes, innermost last
    scopes: Vec<HashMap<String, SymbolId>>,
}

impl Remapper {
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn define(&mut self, name: &str, ty: TypeRef, kind: SymbolKind) -> SymbolId {
        let id = self.symbols.declare(name, ty, kind);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
        id
    }

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn use_ident(&self, ident: &mut Ident) {
        // Names without a declaration are host globals and stay unresolved
        ident.symbol = self.lookup(&ident.name);
    }

    fn declare_local(&mut self, decl: &mut LocalDecl) {
        if let Some(init) = &mut decl.init {
            self.expr(init);
        }
        let id = self.define(&decl.name.name, decl.ty.clone(), SymbolKind::Local);
        decl.name.symbol = Some(id);
    }

    fn stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// A nested statement position (loop body, branch) opens its own scope
    fn nested(&mut self, stmt: &mut Stmt) {
        self.scoped(|r| r.stmt(stmt));
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Empty | StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Return(None) => {}
            StmtKind::Expr(e) | StmtKind::Throw(e) | StmtKind::Return(Some(e)) => self.expr(e),
            StmtKind::Local(decl) => self.declare_local(decl),
            StmtKind::Block(stmts) => self.scoped(|r| r.stmts(stmts)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.nested(then_branch);
                if let Some(else_branch) = else_branch {
                    self.nested(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.nested(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.nested(body);
                self.expr(cond);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.scoped(|r| {
                r.stmts(init);
                if let Some(cond) = cond {
                    r.expr(cond);
                }
                for u in update.iter_mut() {
                    r.expr(u);
                }
                r.nested(body);
            }),
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.scoped(|r| {
                    r.declare_local(var);
                    r.nested(body);
                });
            }
            StmtKind::Switch { selector, cases } => {
                self.expr(selector);
                // Declarations in one case are visible in the cases below it
                self.scoped(|r| {
                    for case in cases.iter_mut() {
                        for label in case.labels.iter_mut() {
                            r.expr(label);
                        }
                        r.stmts(&mut case.body);
                    }
                });
            }
            StmtKind::Try(t) => {
                self.scoped(|r| {
                    for resource in t.resources.iter_mut() {
                        r.declare_local(resource);
                    }
                    r.scoped(|r| r.stmts(&mut t.body));
                });
                for catch in t.catches.iter_mut() {
                    let ty = catch.param_type();
                    self.scoped(|r| {
                        let id = r.define(&catch.param.name, ty, SymbolKind::Local);
                        catch.param.symbol = Some(id);
                        r.stmts(&mut catch.body);
                    });
                }
                if let Some(finally) = &mut t.finally {
                    self.scoped(|r| r.stmts(finally));
                }
            }
            StmtKind::Labeled { body, .. } => self.stmt(body),
            StmtKind::Synchronized { lock, body } => {
                self.expr(lock);
                self.scoped(|r| r.stmts(body));
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(ident) => self.use_ident(ident),
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Assign { target, value, .. } => {
                self.expr(value);
                self.use_ident(target);
            }
            Expr::Increment { target, .. } => self.use_ident(target),
            Expr::Call { args, .. } => {
                for arg in args.iter_mut() {
                    self.expr(arg);
                }
            }
            Expr::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                for arg in args.iter_mut() {
                    self.expr(arg);
                }
            }
        }
    }
}
