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

//! Statement lowering
//!
//! Walks a remapped procedure body and distributes it over the states of a
//! dispatch machine. Every call to `lower_stmt` takes the cursor it should
//! append to and returns the cursor where lowering continues; a returned
//! cursor that differs from the one passed in means the statement crossed a
//! suspension point.
//!
//! Branches of structural constructs are lowered into scratch buffers first,
//! so a conditional that never suspends is emitted as one structural `If`
//! without splitting its state.
//!
//! A try statement whose body needs lowering becomes a nested machine (try
//! body plus catch bodies) that a `Guard` op re-enters on every resume. The
//! finally code runs in the enclosing machine. Jumps that leave a nested
//! machine park their tag in the guard's pending-jump field and finish the
//! nested machine; the finally state dispatches parked tags afterwards.

use crate::ast::{
    BinaryOp, Expr, LocalDecl, Procedure, Stmt, StmtKind, SwitchCase, SymbolId, TryStmt, TypeRef,
};
use crate::config::LoweringConfig;
use crate::error::{LoweringError, SourceLocation};
use crate::machine::{
    call_on, ends_terminal, Block, Capture, CaptureOrigin, CaptureSet, Guard, Handler, Liveness,
    Machine, MachineId, Op, StateId, SwitchArm, Tag, TagTable,
};
use crate::semantic::suspension::{first_marker, needs_lowering};
use crate::semantic::SymbolTable;
use std::mem;

#[cfg(test)]
mod tests;

pub type Result<T> = std::result::Result<T, LoweringError>;

/// Where lowered ops are appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    State(StateId),
    Scratch(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlKind {
    Loop,
    Switch,
    Labeled,
}

/// Break/continue context for lowering
#[derive(Debug, Clone)]
struct ControlContext {
    kind: ControlKind,
    label: Option<String>,
    break_tag: Tag,
    /// Only loops can be continued
    continue_tag: Option<Tag>,
    /// Open scopes when the construct was entered
    scope_depth: usize,
}

/// The machine currently being built
struct MachineFrame {
    block: Block,
    scratch: Vec<Vec<Op>>,
    /// Foreign tags reached through the pending-jump field, in first-use order
    exits: Vec<Tag>,
    /// Pending-jump field of the guard running this machine; `None` for the root
    pending_jump: Option<SymbolId>,
    /// Open scopes when the machine was entered. Scopes below this belong to
    /// enclosing machines and are cleared there, after the finally code.
    scope_base: usize,
}

impl MachineFrame {
    fn new(
        id: MachineId,
        selector: SymbolId,
        pending_jump: Option<SymbolId>,
        scope_base: usize,
    ) -> Self {
        Self {
            block: Block::new(id, selector),
            scratch: Vec::new(),
            exits: Vec::new(),
            pending_jump,
            scope_base,
        }
    }
}

/// Shape of a loop after desugaring
struct LoopPlan<'s> {
    label: Option<String>,
    /// Test the condition before the first iteration
    check_first: bool,
    cond: Option<Expr>,
    /// Ops run at the start of every iteration
    prefix: Vec<Op>,
    body: &'s Stmt,
    update: &'s [Expr],
}

/// Result of lowering one procedure body
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredBody {
    pub machine: Machine,
    pub tags: TagTable,
    pub captures: CaptureSet,
    pub symbols: SymbolTable,
}

/// Lower a remapped procedure. `symbols` is the table produced by name
/// remapping; synthetic fields are added to it.
#[tracing::instrument(skip_all, fields(procedure = %procedure.name))]
pub fn lower_body(
    procedure: &Procedure,
    symbols: SymbolTable,
    element_type: &TypeRef,
    config: &LoweringConfig,
) -> Result<LoweredBody> {
    let mut lowerer = Lowerer::new(config, element_type.clone(), symbols);

    for param in &procedure.params {
        let symbol = resolved(param.name.symbol, &param.name.name)?;
        lowerer.capture(symbol, &param.ty, CaptureOrigin::Parameter, Liveness::Retained);
    }

    let end = lowerer.lower_block(&procedure.body, Cursor::State(StateId::START))?;
    lowerer.seal(end, Op::Finish)?;

    let machine = lowerer.frame.block.finish();
    lowerer.tags.verify()?;

    tracing::debug!(
        states = machine.states.len(),
        machines = machine.machines().len(),
        captures = lowerer.captures.len(),
        "lowered procedure"
    );

    Ok(LoweredBody {
        machine,
        tags: lowerer.tags,
        captures: lowerer.captures,
        symbols: lowerer.symbols,
    })
}

fn resolved(symbol: Option<SymbolId>, name: &str) -> Result<SymbolId> {
    symbol.ok_or_else(|| LoweringError::Internal {
        message: format!("declaration of `{}` was not remapped", name),
    })
}

struct Lowerer<'a> {
    config: &'a LoweringConfig,
    element_type: TypeRef,
    symbols: SymbolTable,
    tags: TagTable,
    captures: CaptureSet,
    frame: MachineFrame,
    outer_frames: Vec<MachineFrame>,
    controls: Vec<ControlContext>,
    /// Reference captures to clear at the end of each open scope
    scopes: Vec<Vec<SymbolId>>,
    next_machine: u32,
}

impl<'a> Lowerer<'a> {
    fn new(config: &'a LoweringConfig, element_type: TypeRef, mut symbols: SymbolTable) -> Self {
        let selector = symbols.synthetic("selector", TypeRef::int());
        let mut captures = CaptureSet::new();
        captures.insert(Capture {
            symbol: selector,
            name: symbols.display(selector),
            ty: TypeRef::int(),
            liveness: Liveness::Retained,
            origin: CaptureOrigin::Selector,
        });

        Self {
            config,
            element_type,
            symbols,
            tags: TagTable::new(),
            captures,
            frame: MachineFrame::new(MachineId::ROOT, selector, None, 0),
            outer_frames: Vec::new(),
            controls: Vec::new(),
            scopes: Vec::new(),
            next_machine: 1,
        }
    }

    // ==================== BUFFERS AND STATES ====================

    fn ops_mut(&mut self, cursor: Cursor) -> Result<&mut Vec<Op>> {
        match cursor {
            Cursor::State(id) => self.frame.block.ops_mut(id),
            Cursor::Scratch(index) => {
                self.frame
                    .scratch
                    .get_mut(index)
                    .ok_or_else(|| LoweringError::Internal {
                        message: format!("scratch buffer {} does not exist", index),
                    })
            }
        }
    }

    fn is_terminal(&self, cursor: Cursor) -> bool {
        match cursor {
            Cursor::State(id) => ends_terminal(self.frame.block.ops(id)),
            Cursor::Scratch(index) => self
                .frame
                .scratch
                .get(index)
                .is_some_and(|ops| ends_terminal(ops)),
        }
    }

    fn emit(&mut self, cursor: Cursor, op: Op) -> Result<()> {
        tracing::trace!(?cursor, machine = self.frame.block.id().0, "emit {}", op_name(&op));
        self.ops_mut(cursor)?.push(op);
        Ok(())
    }

    /// Append `op` unless control can no longer reach the end of `cursor`
    fn seal(&mut self, cursor: Cursor, op: Op) -> Result<()> {
        if self.is_terminal(cursor) {
            Ok(())
        } else {
            self.emit(cursor, op)
        }
    }

    fn new_scratch(&mut self) -> usize {
        self.frame.scratch.push(Vec::new());
        self.frame.scratch.len() - 1
    }

    fn take_scratch(&mut self, index: usize) -> Vec<Op> {
        if index + 1 == self.frame.scratch.len() {
            self.frame.scratch.pop().unwrap_or_default()
        } else {
            self.frame
                .scratch
                .get_mut(index)
                .map(mem::take)
                .unwrap_or_default()
        }
    }

    fn fresh_tag(&mut self) -> Tag {
        self.tags.fresh(self.frame.block.id())
    }

    /// Open a new state as the target of `tag`
    fn enter_state(&mut self, tag: Tag) -> Result<Cursor> {
        let state = self.frame.block.open_state();
        self.tags.resolve(tag, state)?;
        Ok(Cursor::State(state))
    }

    /// End `cursor` with a jump to `tag` and continue in the state it denotes
    fn continue_at(&mut self, cursor: Cursor, tag: Tag) -> Result<Cursor> {
        self.seal(cursor, Op::Jump(tag))?;
        self.enter_state(tag)
    }

    // ==================== CAPTURES AND SCOPES ====================

    fn liveness_for(&self, ty: &TypeRef) -> Liveness {
        if ty.is_primitive() || !self.config.clear_references {
            Liveness::Retained
        } else {
            Liveness::ClearedAtScopeEnd
        }
    }

    fn capture(&mut self, symbol: SymbolId, ty: &TypeRef, origin: CaptureOrigin, liveness: Liveness) {
        self.captures.insert(Capture {
            symbol,
            name: self.symbols.display(symbol),
            ty: ty.clone(),
            liveness,
            origin,
        });
    }

    /// Promote a local; reference types are cleared where the current scope ends
    fn capture_local(&mut self, symbol: SymbolId, ty: &TypeRef) {
        let liveness = self.liveness_for(ty);
        self.capture(symbol, ty, CaptureOrigin::Local, liveness);
        if liveness == Liveness::ClearedAtScopeEnd {
            if let Some(scope) = self.scopes.last_mut() {
                scope.push(symbol);
            }
        }
    }

    fn synthetic(&mut self, prefix: &str, ty: TypeRef, origin: CaptureOrigin) -> SymbolId {
        let symbol = self.symbols.synthetic(prefix, ty.clone());
        let liveness = self.liveness_for(&ty);
        self.capture(symbol, &ty, origin, liveness);
        symbol
    }

    fn with_scope(
        &mut self,
        cursor: Cursor,
        f: impl FnOnce(&mut Self, Cursor) -> Result<Cursor>,
    ) -> Result<Cursor> {
        self.scopes.push(Vec::new());
        let result = f(self, cursor);
        let declared = self.scopes.pop().unwrap_or_default();
        let end = result?;
        if !self.is_terminal(end) {
            for symbol in declared.into_iter().rev() {
                self.emit(end, Op::Clear(symbol))?;
            }
        }
        Ok(end)
    }

    // ==================== CONTROL TRANSFER ====================

    fn check_no_marker(&self, expr: &Expr, location: &SourceLocation) -> Result<()> {
        match expr.find_marker(self.config.markers()) {
            Some(marker) => Err(LoweringError::MisplacedMarker {
                marker: marker.to_string(),
                location: location.clone(),
            }),
            None => Ok(()),
        }
    }

    fn break_target(&self, label: &Option<String>, location: &SourceLocation) -> Result<Tag> {
        let found = match label {
            None => self
                .controls
                .iter()
                .rev()
                .find(|c| matches!(c.kind, ControlKind::Loop | ControlKind::Switch)),
            Some(name) => self
                .controls
                .iter()
                .rev()
                .find(|c| c.label.as_deref() == Some(name.as_str())),
        };
        found
            .map(|c| c.break_tag)
            .ok_or_else(|| LoweringError::UnmatchedBreak {
                label: label.clone(),
                location: location.clone(),
            })
    }

    fn continue_target(&self, label: &Option<String>, location: &SourceLocation) -> Result<Tag> {
        let found = match label {
            None => self
                .controls
                .iter()
                .rev()
                .find(|c| c.kind == ControlKind::Loop),
            Some(name) => self
                .controls
                .iter()
                .rev()
                .find(|c| c.label.as_deref() == Some(name.as_str())),
        };
        found
            .and_then(|c| c.continue_tag)
            .ok_or_else(|| LoweringError::UnmatchedContinue {
                label: label.clone(),
                location: location.clone(),
            })
    }

    /// Scope depth at the construct `tag` leaves to; returning leaves every scope
    fn target_depth(&self, tag: Tag) -> usize {
        self.controls
            .iter()
            .rev()
            .find(|c| c.break_tag == tag || c.continue_tag == Some(tag))
            .map(|c| c.scope_depth)
            .unwrap_or(0)
    }

    /// Clears for the reference captures of every scope the transfer leaves
    /// within the current machine, innermost first
    fn exit_clears(&self, tag: Tag) -> Vec<Op> {
        let from = self.target_depth(tag).max(self.frame.scope_base);
        self.scopes
            .get(from..)
            .unwrap_or_default()
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .map(|symbol| Op::Clear(*symbol))
            .collect()
    }

    /// Ops that transfer control to `tag` from the current machine
    fn transfer_ops(&mut self, tag: Tag) -> Result<Vec<Op>> {
        let mut ops = self.exit_clears(tag);
        if self.tags.owner(tag) == self.frame.block.id() {
            ops.push(if tag == Tag::FINISHED {
                Op::Finish
            } else {
                Op::Jump(tag)
            });
            return Ok(ops);
        }

        let pending_jump = self.frame.pending_jump.ok_or_else(|| LoweringError::Internal {
            message: format!("tag #{} belongs to no enclosing machine", tag.0),
        })?;
        if !self.frame.exits.contains(&tag) {
            self.frame.exits.push(tag);
        }
        ops.push(Op::Assign {
            target: pending_jump,
            value: Expr::int(tag.0 as i64),
        });
        ops.push(Op::Finish);
        Ok(ops)
    }

    fn transfer(&mut self, tag: Tag, cursor: Cursor) -> Result<Cursor> {
        for op in self.transfer_ops(tag)? {
            self.emit(cursor, op)?;
        }
        Ok(cursor)
    }

    // ==================== STATEMENTS ====================

    fn lower_stmts(&mut self, stmts: &[Stmt], cursor: Cursor) -> Result<Cursor> {
        stmts
            .iter()
            .try_fold(cursor, |cursor, stmt| self.lower_stmt(stmt, cursor))
    }

    fn lower_block(&mut self, stmts: &[Stmt], cursor: Cursor) -> Result<Cursor> {
        self.with_scope(cursor, |this, cursor| this.lower_stmts(stmts, cursor))
    }

    /// A statement in a nested position (branch, loop body) is its own scope
    fn lower_nested(&mut self, stmt: &Stmt, cursor: Cursor) -> Result<Cursor> {
        self.with_scope(cursor, |this, cursor| this.lower_stmt(stmt, cursor))
    }

    fn lower_stmt(&mut self, stmt: &Stmt, cursor: Cursor) -> Result<Cursor> {
        let markers = self.config.markers();
        let location = &stmt.location;

        match &stmt.kind {
            StmtKind::Local(decl) => return self.lower_local(decl, location, cursor),
            StmtKind::Expr(expr) => {
                if let Some((kind, arg)) = expr.as_marker(markers) {
                    self.check_no_marker(arg, location)?;
                    return match kind {
                        crate::ast::MarkerKind::Emit => self.lower_emit(arg, cursor),
                        crate::ast::MarkerKind::EmitAll => self.lower_emit_all(arg, cursor),
                    };
                }
            }
            _ => {}
        }

        if !needs_lowering(stmt, markers) {
            self.emit(cursor, Op::Plain(stmt.clone()))?;
            return Ok(cursor);
        }

        match &stmt.kind {
            StmtKind::Empty => Ok(cursor),
            StmtKind::Local(decl) => self.lower_local(decl, location, cursor),
            StmtKind::Expr(expr) | StmtKind::Throw(expr) => {
                self.check_no_marker(expr, location)?;
                Err(LoweringError::Internal {
                    message: format!("{}: statement needs lowering but has no marker", location),
                })
            }
            StmtKind::Block(stmts) => self.lower_block(stmts, cursor),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref(), location, cursor),
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForEach { .. } => self.lower_loop_stmt(stmt, None, cursor),
            StmtKind::Switch { selector, cases } => {
                self.lower_switch(selector, cases, location, cursor)
            }
            StmtKind::Try(try_stmt) => self.lower_try(try_stmt, location, cursor),
            StmtKind::Labeled { label, body } => self.lower_labeled(label, body, location, cursor),
            StmtKind::Synchronized { lock, body } => {
                self.lower_synchronized(lock, body, location, cursor)
            }
            StmtKind::Return(Some(_)) => Err(LoweringError::ReturnWithValue {
                location: location.clone(),
            }),
            StmtKind::Return(None) => self.transfer(Tag::FINISHED, cursor),
            StmtKind::Break(label) => {
                let tag = self.break_target(label, location)?;
                self.transfer(tag, cursor)
            }
            StmtKind::Continue(label) => {
                let tag = self.continue_target(label, location)?;
                self.transfer(tag, cursor)
            }
        }
    }

    fn lower_local(
        &mut self,
        decl: &LocalDecl,
        location: &SourceLocation,
        cursor: Cursor,
    ) -> Result<Cursor> {
        let symbol = resolved(decl.name.symbol, &decl.name.name)?;
        if let Some(init) = &decl.init {
            self.check_no_marker(init, location)?;
        }
        self.capture_local(symbol, &decl.ty);
        if let Some(init) = &decl.init {
            self.emit(
                cursor,
                Op::Assign {
                    target: symbol,
                    value: init.clone(),
                },
            )?;
        }
        Ok(cursor)
    }

    /// `selector = next; return value;` then resume in a fresh state
    fn lower_emit(&mut self, value: &Expr, cursor: Cursor) -> Result<Cursor> {
        let resume = self.fresh_tag();
        self.emit(cursor, Op::SetState(resume))?;
        self.emit(cursor, Op::Yield(value.clone()))?;
        self.enter_state(resume)
    }

    /// Capture a handle over the delegated iterator and re-test it on every
    /// resume; the state falls through once the handle is exhausted
    fn lower_emit_all(&mut self, sequence: &Expr, cursor: Cursor) -> Result<Cursor> {
        let handle_ty = TypeRef::iterator_of(self.element_type.clone());
        let handle = self.synthetic("delegate", handle_ty, CaptureOrigin::Synthetic);
        self.emit(
            cursor,
            Op::Assign {
                target: handle,
                value: sequence.clone(),
            },
        )?;

        let poll = self.fresh_tag();
        let state = self.continue_at(cursor, poll)?;
        let ident = self.symbols.ident(handle);
        self.emit(
            state,
            Op::If {
                cond: call_on(ident.clone(), "hasNext"),
                then_ops: vec![Op::Yield(call_on(ident, "next"))],
                else_ops: Vec::new(),
            },
        )?;
        if self.captures.get(handle).is_some_and(Capture::is_cleared) {
            self.emit(state, Op::Clear(handle))?;
        }
        Ok(state)
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        location: &SourceLocation,
        cursor: Cursor,
    ) -> Result<Cursor> {
        self.check_no_marker(cond, location)?;

        let then_buf = self.new_scratch();
        let then_end = self.lower_nested(then_branch, Cursor::Scratch(then_buf))?;
        let else_buf = self.new_scratch();
        let else_end = match else_branch {
            Some(branch) => self.lower_nested(branch, Cursor::Scratch(else_buf))?,
            None => Cursor::Scratch(else_buf),
        };

        let split = then_end != Cursor::Scratch(then_buf) || else_end != Cursor::Scratch(else_buf);
        let join = if split {
            let join = self.fresh_tag();
            self.seal(then_end, Op::Jump(join))?;
            self.seal(else_end, Op::Jump(join))?;
            Some(join)
        } else {
            None
        };

        let else_ops = self.take_scratch(else_buf);
        let then_ops = self.take_scratch(then_buf);
        self.emit(
            cursor,
            Op::If {
                cond: cond.clone(),
                then_ops,
                else_ops,
            },
        )?;

        match join {
            Some(join) => self.continue_at(cursor, join),
            None => Ok(cursor),
        }
    }

    fn lower_loop_stmt(&mut self, stmt: &Stmt, label: Option<String>, cursor: Cursor) -> Result<Cursor> {
        let location = &stmt.location;
        match &stmt.kind {
            StmtKind::While { cond, body } => {
                self.check_no_marker(cond, location)?;
                let plan = LoopPlan {
                    label,
                    check_first: true,
                    cond: Some(cond.clone()),
                    prefix: Vec::new(),
                    body,
                    update: &[],
                };
                self.lower_loop(plan, location, cursor)
            }
            StmtKind::DoWhile { body, cond } => {
                self.check_no_marker(cond, location)?;
                let plan = LoopPlan {
                    label,
                    check_first: false,
                    cond: Some(cond.clone()),
                    prefix: Vec::new(),
                    body,
                    update: &[],
                };
                self.lower_loop(plan, location, cursor)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(cond) = cond {
                    self.check_no_marker(cond, location)?;
                }
                for expr in update {
                    self.check_no_marker(expr, location)?;
                }
                self.with_scope(cursor, |this, cursor| {
                    let cursor = this.lower_stmts(init, cursor)?;
                    let plan = LoopPlan {
                        label,
                        check_first: true,
                        cond: cond.clone(),
                        prefix: Vec::new(),
                        body,
                        update,
                    };
                    this.lower_loop(plan, location, cursor)
                })
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.check_no_marker(iterable, location)?;
                let var_symbol = resolved(var.name.symbol, &var.name.name)?;
                self.with_scope(cursor, |this, cursor| {
                    let handle_ty = TypeRef::iterator_of(var.ty.clone());
                    let handle = this.synthetic("iter", handle_ty, CaptureOrigin::Synthetic);
                    if this.captures.get(handle).is_some_and(Capture::is_cleared) {
                        if let Some(scope) = this.scopes.last_mut() {
                            scope.push(handle);
                        }
                    }
                    this.emit(
                        cursor,
                        Op::Assign {
                            target: handle,
                            value: Expr::method(iterable.clone(), "iterator", Vec::new()),
                        },
                    )?;
                    this.capture_local(var_symbol, &var.ty);

                    let ident = this.symbols.ident(handle);
                    let plan = LoopPlan {
                        label,
                        check_first: true,
                        cond: Some(call_on(ident.clone(), "hasNext")),
                        prefix: vec![Op::Assign {
                            target: var_symbol,
                            value: call_on(ident, "next"),
                        }],
                        body,
                        update: &[],
                    };
                    this.lower_loop(plan, location, cursor)
                })
            }
            _ => Err(LoweringError::Internal {
                message: format!("{}: not a loop", location),
            }),
        }
    }

    /// `[jump check|body] → body → (update) → check: if cond jump body → end`
    fn lower_loop(&mut self, plan: LoopPlan<'_>, location: &SourceLocation, cursor: Cursor) -> Result<Cursor> {
        let body_tag = self.fresh_tag();
        let check_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        let update_tag = if plan.update.is_empty() {
            None
        } else {
            Some(self.fresh_tag())
        };
        let continue_tag = update_tag.unwrap_or(check_tag);

        let entry = if plan.check_first { check_tag } else { body_tag };
        self.seal(cursor, Op::Jump(entry))?;

        let body_state = self.enter_state(body_tag)?;
        for op in plan.prefix {
            self.emit(body_state, op)?;
        }
        self.controls.push(ControlContext {
            kind: ControlKind::Loop,
            label: plan.label,
            break_tag: end_tag,
            continue_tag: Some(continue_tag),
            scope_depth: self.scopes.len(),
        });
        let body_end = self.lower_nested(plan.body, body_state);
        self.controls.pop();
        self.seal(body_end?, Op::Jump(continue_tag))?;

        if let Some(update_tag) = update_tag {
            let update_state = self.enter_state(update_tag)?;
            for expr in plan.update {
                self.emit(
                    update_state,
                    Op::Plain(Stmt::new(StmtKind::Expr(expr.clone()), location.clone())),
                )?;
            }
            self.emit(update_state, Op::Jump(check_tag))?;
        }

        let check_state = self.enter_state(check_tag)?;
        match plan.cond {
            Some(cond) => {
                self.emit(
                    check_state,
                    Op::If {
                        cond,
                        then_ops: vec![Op::Jump(body_tag)],
                        else_ops: Vec::new(),
                    },
                )?;
                self.emit(check_state, Op::Jump(end_tag))?;
            }
            None => self.emit(check_state, Op::Jump(body_tag))?,
        }

        self.enter_state(end_tag)
    }

    /// One state per case; each case ends with a jump to the case below it,
    /// so fallthrough is kept
    fn lower_switch(
        &mut self,
        selector: &Expr,
        cases: &[SwitchCase],
        location: &SourceLocation,
        cursor: Cursor,
    ) -> Result<Cursor> {
        self.check_no_marker(selector, location)?;
        for label in cases.iter().flat_map(|c| c.labels.iter()) {
            self.check_no_marker(label, location)?;
        }

        self.with_scope(cursor, |this, cursor| {
            let end_tag = this.fresh_tag();
            let case_tags: Vec<Tag> = cases.iter().map(|_| this.fresh_tag()).collect();
            let arms = cases
                .iter()
                .zip(&case_tags)
                .map(|(case, tag)| SwitchArm {
                    labels: case.labels.clone(),
                    is_default: case.is_default,
                    target: *tag,
                })
                .collect::<Vec<_>>();
            let has_default = arms.iter().any(|arm| arm.is_default);

            this.emit(
                cursor,
                Op::Switch {
                    selector: selector.clone(),
                    arms,
                },
            )?;
            if !has_default {
                this.emit(cursor, Op::Jump(end_tag))?;
            }

            this.controls.push(ControlContext {
                kind: ControlKind::Switch,
                label: None,
                break_tag: end_tag,
                continue_tag: None,
                scope_depth: this.scopes.len(),
            });
            let lowered = (|| -> Result<()> {
                for (index, case) in cases.iter().enumerate() {
                    let state = this.enter_state(case_tags[index])?;
                    let end = this.lower_stmts(&case.body, state)?;
                    let next = case_tags.get(index + 1).copied().unwrap_or(end_tag);
                    this.seal(end, Op::Jump(next))?;
                }
                Ok(())
            })();
            this.controls.pop();
            lowered?;

            this.enter_state(end_tag)
        })
    }

    fn lower_labeled(
        &mut self,
        label: &str,
        body: &Stmt,
        location: &SourceLocation,
        cursor: Cursor,
    ) -> Result<Cursor> {
        if self
            .controls
            .iter()
            .any(|c| c.label.as_deref() == Some(label))
        {
            return Err(LoweringError::DuplicateLabel {
                label: label.to_string(),
                location: location.clone(),
            });
        }

        if body.is_loop() {
            return self.lower_loop_stmt(body, Some(label.to_string()), cursor);
        }

        let end_tag = self.fresh_tag();
        self.controls.push(ControlContext {
            kind: ControlKind::Labeled,
            label: Some(label.to_string()),
            break_tag: end_tag,
            continue_tag: None,
            scope_depth: self.scopes.len(),
        });
        let end = self.lower_nested(body, cursor);
        self.controls.pop();
        self.continue_at(end?, end_tag)
    }

    fn lower_synchronized(
        &mut self,
        lock: &Expr,
        body: &[Stmt],
        location: &SourceLocation,
        cursor: Cursor,
    ) -> Result<Cursor> {
        self.check_no_marker(lock, location)?;
        let markers = self.config.markers();
        if let Some((marker, marker_location)) = body.iter().find_map(|s| first_marker(s, markers)) {
            return Err(LoweringError::IllegalSuspension {
                construct: "a synchronized block".to_string(),
                marker: marker.to_string(),
                location: marker_location,
            });
        }

        let buf = self.new_scratch();
        let end = self.lower_block(body, Cursor::Scratch(buf))?;
        if end != Cursor::Scratch(buf) {
            return Err(LoweringError::UnsplittableConstruct {
                construct: "synchronized block".to_string(),
                location: location.clone(),
            });
        }
        let ops = self.take_scratch(buf);
        self.emit(
            cursor,
            Op::Synchronized {
                lock: lock.clone(),
                body: ops,
            },
        )?;
        Ok(cursor)
    }

    fn lower_try(&mut self, try_stmt: &TryStmt, location: &SourceLocation, cursor: Cursor) -> Result<Cursor> {
        for resource in &try_stmt.resources {
            if let Some(init) = &resource.init {
                self.check_no_marker(init, location)?;
            }
        }

        let machine_id = MachineId(self.next_machine);
        self.next_machine += 1;

        let selector = self.synthetic("selector", TypeRef::int(), CaptureOrigin::Selector);
        let in_handler = self.synthetic("handling", TypeRef::boolean(), CaptureOrigin::Synthetic);
        let pending = self.symbols.synthetic("pending", TypeRef::throwable());
        self.capture(pending, &TypeRef::throwable(), CaptureOrigin::Synthetic, Liveness::Retained);
        let pending_jump = self.synthetic("pendingJump", TypeRef::int(), CaptureOrigin::Synthetic);

        let mut resources = Vec::with_capacity(try_stmt.resources.len());
        for resource in &try_stmt.resources {
            let symbol = resolved(resource.name.symbol, &resource.name.name)?;
            // The guard closes and nulls resources itself
            self.capture(symbol, &resource.ty, CaptureOrigin::Local, Liveness::Retained);
            resources.push(symbol);
        }

        // Reset the nested machine and its bookkeeping on every entry
        self.emit(
            cursor,
            Op::Assign {
                target: selector,
                value: Expr::int(StateId::START.0 as i64),
            },
        )?;
        self.emit(
            cursor,
            Op::Assign {
                target: in_handler,
                value: Expr::boolean(false),
            },
        )?;
        self.emit(
            cursor,
            Op::Assign {
                target: pending,
                value: Expr::null(),
            },
        )?;
        self.emit(
            cursor,
            Op::Assign {
                target: pending_jump,
                value: Expr::int(-1),
            },
        )?;
        for symbol in &resources {
            self.emit(
                cursor,
                Op::Assign {
                    target: *symbol,
                    value: Expr::null(),
                },
            )?;
        }

        let try_tag = self.fresh_tag();
        let finally_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        let guard_state = self.continue_at(cursor, try_tag)?;

        // Nested machine: resource initialisers, try body, then one state per catch
        let outer = mem::replace(
            &mut self.frame,
            MachineFrame::new(machine_id, selector, Some(pending_jump), self.scopes.len()),
        );
        self.outer_frames.push(outer);
        let nested = self.lower_guarded(try_stmt, &resources);
        let outer = self.outer_frames.pop().ok_or_else(|| LoweringError::Internal {
            message: "machine frame stack underflow".to_string(),
        })?;
        let frame = mem::replace(&mut self.frame, outer);
        let handlers = nested?;

        let exits = frame.exits;
        let guard = Guard {
            machine: frame.block.finish(),
            resources,
            handlers,
            in_handler,
            pending,
            pending_jump,
        };
        tracing::debug!(machine = machine_id.0, exits = exits.len(), "lowered guarded region");

        self.emit(guard_state, Op::Guard(Box::new(guard)))?;
        self.emit(guard_state, Op::Jump(finally_tag))?;

        let finally_state = self.enter_state(finally_tag)?;
        let finally_end = match &try_stmt.finally {
            Some(stmts) => self.lower_block(stmts, finally_state)?,
            None => finally_state,
        };
        if !self.is_terminal(finally_end) {
            self.emit(finally_end, Op::RethrowPending(pending))?;
            for exit in exits {
                let then_ops = self.transfer_ops(exit)?;
                self.emit(
                    finally_end,
                    Op::If {
                        cond: Expr::binary(
                            BinaryOp::Eq,
                            Expr::Ident(self.symbols.ident(pending_jump)),
                            Expr::int(exit.0 as i64),
                        ),
                        then_ops,
                        else_ops: Vec::new(),
                    },
                )?;
            }
        }
        self.continue_at(finally_end, end_tag)
    }

    /// Lower try body and catch clauses into the current (nested) frame
    fn lower_guarded(&mut self, try_stmt: &TryStmt, resources: &[SymbolId]) -> Result<Vec<Handler>> {
        let start = Cursor::State(StateId::START);
        let body_end = self.with_scope(start, |this, cursor| {
            for (symbol, resource) in resources.iter().zip(&try_stmt.resources) {
                if let Some(init) = &resource.init {
                    this.emit(
                        cursor,
                        Op::Assign {
                            target: *symbol,
                            value: init.clone(),
                        },
                    )?;
                }
            }
            this.lower_block(&try_stmt.body, cursor)
        })?;
        self.seal(body_end, Op::Finish)?;

        let mut handlers = Vec::with_capacity(try_stmt.catches.len());
        for catch in &try_stmt.catches {
            let param = resolved(catch.param.symbol, &catch.param.name)?;
            let entry = self.fresh_tag();
            let state = self.enter_state(entry)?;
            let param_ty = catch.param_type();
            let end = self.with_scope(state, |this, cursor| {
                this.capture_local(param, &param_ty);
                this.lower_stmts(&catch.body, cursor)
            })?;
            self.seal(end, Op::Finish)?;
            handlers.push(Handler {
                param,
                types: catch.types.clone(),
                entry,
            });
        }
        Ok(handlers)
    }
}

fn op_name(op: &Op) -> &'static str {
    match op {
        Op::Plain(_) => "plain",
        Op::Assign { .. } => "assign",
        Op::Clear(_) => "clear",
        Op::SetState(_) => "set-state",
        Op::Jump(_) => "jump",
        Op::Yield(_) => "yield",
        Op::Finish => "finish",
        Op::If { .. } => "if",
        Op::Switch { .. } => "switch",
        Op::Synchronized { .. } => "synchronized",
        Op::Guard(_) => "guard",
        Op::RethrowPending(_) => "rethrow-pending",
    }
}
