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

//! Suspension pre-pass
//!
//! A statement is *plain* when nothing inside it can leave the current
//! state: no marker, no `return`, and no `break`/`continue` whose target lies
//! outside the statement. Plain statements are appended to a state as they
//! are; everything else goes through the lowering engine.

use crate::ast::{Expr, LocalDecl, Stmt, StmtKind};
use crate::config::Markers;
use crate::error::SourceLocation;

/// True if `stmt` must be split or rewritten by the lowering engine
pub fn needs_lowering(stmt: &Stmt, markers: Markers<'_>) -> bool {
    let mut scanner = Scanner {
        markers,
        loop_depth: 0,
        switch_depth: 0,
        labels: Vec::new(),
    };
    scanner.stmt(stmt)
}

/// First marker applied anywhere inside `stmt`, with the location of the
/// statement that contains it
pub fn first_marker<'m>(stmt: &Stmt, markers: Markers<'m>) -> Option<(&'m str, SourceLocation)> {
    let in_exprs = |exprs: &[&Expr]| exprs.iter().find_map(|e| e.find_marker(markers));
    let in_stmts = |stmts: &[Stmt]| stmts.iter().find_map(|s| first_marker(s, markers));
    let in_decl = |decl: &LocalDecl| decl.init.as_ref().and_then(|e| e.find_marker(markers));

    let own = match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Throw(e) | StmtKind::Return(Some(e)) => in_exprs(&[e]),
        StmtKind::Local(decl) => in_decl(decl),
        StmtKind::If { cond, .. } | StmtKind::While { cond, .. } | StmtKind::DoWhile { cond, .. } => {
            in_exprs(&[cond])
        }
        StmtKind::For { cond, update, .. } => {
            let mut exprs: Vec<&Expr> = cond.iter().collect();
            exprs.extend(update.iter());
            in_exprs(&exprs)
        }
        StmtKind::ForEach { iterable, .. } => in_exprs(&[iterable]),
        StmtKind::Switch { selector, .. } => in_exprs(&[selector]),
        StmtKind::Synchronized { lock, .. } => in_exprs(&[lock]),
        StmtKind::Try(t) => t.resources.iter().find_map(in_decl),
        _ => None,
    };
    if let Some(marker) = own {
        return Some((marker, stmt.location.clone()));
    }

    match &stmt.kind {
        StmtKind::Block(stmts) => in_stmts(stmts),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => first_marker(then_branch, markers)
            .or_else(|| else_branch.as_ref().and_then(|e| first_marker(e, markers))),
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::ForEach { body, .. }
        | StmtKind::Labeled { body, .. } => first_marker(body, markers),
        StmtKind::For { init, body, .. } => in_stmts(init).or_else(|| first_marker(body, markers)),
        StmtKind::Switch { cases, .. } => cases.iter().find_map(|c| in_stmts(&c.body)),
        StmtKind::Try(t) => in_stmts(&t.body)
            .or_else(|| t.catches.iter().find_map(|c| in_stmts(&c.body)))
            .or_else(|| t.finally.as_deref().and_then(in_stmts)),
        StmtKind::Synchronized { body, .. } => in_stmts(body),
        _ => None,
    }
}

struct Scanner<'m> {
    markers: Markers<'m>,
    loop_depth: usize,
    switch_depth: usize,
    /// Labels declared inside the statement being scanned
    labels: Vec<String>,
}

impl Scanner<'_> {
    fn expr(&self, expr: &Expr) -> bool {
        expr.find_marker(self.markers).is_some()
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> bool {
        stmts.iter().any(|s| self.stmt(s))
    }

    fn in_loop(&mut self, f: impl FnOnce(&mut Self) -> bool) -> bool {
        self.loop_depth += 1;
        let found = f(self);
        self.loop_depth -= 1;
        found
    }

    fn stmt(&mut self, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Empty => false,
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.expr(e),
            StmtKind::Local(decl) => decl.init.as_ref().is_some_and(|e| self.expr(e)),
            StmtKind::Block(stmts) => self.stmts(stmts),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond)
                    || self.stmt(then_branch)
                    || else_branch.as_ref().is_some_and(|e| self.stmt(e))
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.expr(cond) || self.in_loop(|s| s.stmt(body))
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.stmts(init)
                    || cond.as_ref().is_some_and(|c| self.expr(c))
                    || update.iter().any(|u| self.expr(u))
                    || self.in_loop(|s| s.stmt(body))
            }
            StmtKind::ForEach { iterable, body, .. } => {
                self.expr(iterable) || self.in_loop(|s| s.stmt(body))
            }
            StmtKind::Switch { selector, cases } => {
                if self.expr(selector) {
                    return true;
                }
                self.switch_depth += 1;
                let found = cases.iter().any(|c| self.stmts(&c.body));
                self.switch_depth -= 1;
                found
            }
            StmtKind::Try(t) => {
                t.resources
                    .iter()
                    .any(|r| r.init.as_ref().is_some_and(|e| self.expr(e)))
                    || self.stmts(&t.body)
                    || t.catches.iter().any(|c| self.stmts(&c.body))
                    || t.finally.as_ref().is_some_and(|f| self.stmts(f))
            }
            StmtKind::Labeled { label, body } => {
                self.labels.push(label.clone());
                let found = self.stmt(body);
                self.labels.pop();
                found
            }
            StmtKind::Synchronized { lock, body } => self.expr(lock) || self.stmts(body),
            StmtKind::Return(_) => true,
            StmtKind::Break(None) => self.loop_depth == 0 && self.switch_depth == 0,
            StmtKind::Continue(None) => self.loop_depth == 0,
            StmtKind::Break(Some(label)) | StmtKind::Continue(Some(label)) => {
                !self.labels.contains(label)
            }
        }
    }
}
