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

//! Reference interpreter for generator classes
//!
//! A `GeneratorInstance` owns one field per capture and drives the class's
//! dispatch machines through the pull protocol: `has_next` advances until a
//! value is buffered or the root machine finishes, `next_value` hands the
//! buffered value out. Plain statements copied from the input are executed
//! structurally.
//!
//! Any fault escaping an advance forces the root selector to FINISHED, so a
//! failed generator stays exhausted.

pub mod host;
pub mod value;

pub use crate::error::Fault;
pub use host::{Host, Journal, NativeFn};
pub use value::{Exception, Resource, Sequence, Value};

use crate::ast::{
    BinaryOp, Expr, Ident, Literal, Stmt, StmtKind, SwitchCase, SymbolId, TryStmt, TypeRef,
    UnaryOp,
};
use crate::builder::GeneratorClass;
use crate::machine::{Guard, Machine, Op, StateId, SwitchArm, Tag};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;


/// How a run of ops ended
enum Flow {
    /// Fell off the end; continue with what follows
    Next,
    /// The selector was updated; dispatch again
    Dispatch,
    Suspend(Value),
    Done,
}

/// How a structurally executed statement ended
#[derive(Debug, PartialEq)]
enum Completion {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
}

/// What a loop does after one run of its body
enum LoopStep {
    Next,
    Break,
    Exit(Completion),
}

/// A running generator
pub struct GeneratorInstance {
    class: Rc<GeneratorClass>,
    host: Host,
    vars: HashMap<SymbolId, Value>,
    buffered: Option<Value>,
}

impl fmt::Debug for GeneratorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorInstance")
            .field("class", &self.class.name)
            .field("selector", &self.vars.get(&self.class.advance.selector))
            .field("buffered", &self.buffered)
            .finish()
    }
}

impl GeneratorInstance {
    /// Construct an instance: parameters are bound to `args`, the root
    /// selector starts at START, every other field at its type's default
    pub fn new(class: Rc<GeneratorClass>, args: Vec<Value>, host: Host) -> Result<Self, Fault> {
        if args.len() != class.params.len() {
            return Err(Fault::Arity {
                name: class.procedure.clone(),
                expected: class.params.len(),
                found: args.len(),
            });
        }

        let mut vars: HashMap<SymbolId, Value> = class
            .captures
            .iter()
            .map(|capture| (capture.symbol, default_for(&capture.ty)))
            .collect();
        for (param, arg) in class.params.iter().zip(args) {
            let symbol = param
                .name
                .symbol
                .ok_or_else(|| Fault::Internal(format!("parameter `{}` is unresolved", param.name.name)))?;
            vars.insert(symbol, arg);
        }
        vars.insert(class.advance.selector, state_value(StateId::START));

        Ok(Self {
            class,
            host,
            vars,
            buffered: None,
        })
    }

    pub fn class(&self) -> &GeneratorClass {
        &self.class
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// True once the root machine has finished and nothing is buffered
    pub fn is_finished(&self) -> bool {
        self.buffered.is_none()
            && self.vars.get(&self.class.advance.selector) == Some(&state_value(StateId::FINISHED))
    }

    /// Current value of a field, looked up by its unique field name (`i$1`)
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.class
            .captures
            .iter()
            .find(|capture| capture.name == name)
            .and_then(|capture| self.vars.get(&capture.symbol))
    }

    pub fn has_next(&mut self) -> Result<bool, Fault> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        match self.advance()? {
            Some(value) => {
                self.buffered = Some(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn next_value(&mut self) -> Result<Value, Fault> {
        if !self.has_next()? {
            return Err(Fault::NoSuchElement);
        }
        self.buffered
            .take()
            .ok_or_else(|| Fault::Internal("buffer emptied during advance".to_string()))
    }

    fn advance(&mut self) -> Result<Option<Value>, Fault> {
        let class = Rc::clone(&self.class);
        match self.run_machine(&class.advance) {
            Ok(produced) => {
                tracing::trace!(class = %class.name, produced = produced.is_some(), "advanced");
                Ok(produced)
            }
            Err(fault) => {
                tracing::debug!(class = %class.name, %fault, "generator failed");
                self.vars
                    .insert(class.advance.selector, state_value(StateId::FINISHED));
                Err(fault)
            }
        }
    }

    // ==================== MACHINES ====================

    /// Dispatch loop of one machine. `None` means the machine finished.
    fn run_machine(&mut self, machine: &Machine) -> Result<Option<Value>, Fault> {
        loop {
            let mut selector = self.load_symbol(machine.selector)?.as_int()?;
            if selector == i64::from(StateId::FINISHED.0) {
                return Ok(None);
            }

            // Falling off the end of a state continues with the next state id
            let flow = loop {
                let state = u32::try_from(selector)
                    .ok()
                    .and_then(|id| machine.state(StateId(id)))
                    .ok_or(Fault::Unreachable { selector })?;
                match self.exec_ops(&state.ops, machine.selector)? {
                    Flow::Next => selector += 1,
                    other => break other,
                }
            };

            match flow {
                Flow::Next | Flow::Dispatch => continue,
                Flow::Suspend(value) => return Ok(Some(value)),
                Flow::Done => return Ok(None),
            }
        }
    }

    fn exec_ops(&mut self, ops: &[Op], selector: SymbolId) -> Result<Flow, Fault> {
        for op in ops {
            let flow = match op {
                Op::Plain(stmt) => match self.exec_stmt(stmt)? {
                    Completion::Normal => Flow::Next,
                    escaped => {
                        return Err(Fault::Internal(format!(
                            "{}: {:?} escaped a plain statement",
                            stmt.location, escaped
                        )))
                    }
                },
                Op::Assign { target, value } => {
                    let value = self.eval(value)?;
                    self.vars.insert(*target, value);
                    Flow::Next
                }
                Op::Clear(symbol) => {
                    self.vars.insert(*symbol, Value::Null);
                    Flow::Next
                }
                Op::SetState(tag) => {
                    self.set_state(selector, *tag)?;
                    Flow::Next
                }
                Op::Jump(tag) => {
                    self.set_state(selector, *tag)?;
                    Flow::Dispatch
                }
                Op::Yield(value) => Flow::Suspend(self.eval(value)?),
                Op::Finish => {
                    self.vars.insert(selector, state_value(StateId::FINISHED));
                    Flow::Done
                }
                Op::If {
                    cond,
                    then_ops,
                    else_ops,
                } => {
                    if self.eval(cond)?.as_bool()? {
                        self.exec_ops(then_ops, selector)?
                    } else {
                        self.exec_ops(else_ops, selector)?
                    }
                }
                Op::Switch {
                    selector: scrutinee,
                    arms,
                } => {
                    let value = self.eval(scrutinee)?;
                    match self.select_arm(&value, arms)? {
                        Some(tag) => {
                            self.set_state(selector, tag)?;
                            Flow::Dispatch
                        }
                        None => Flow::Next,
                    }
                }
                Op::Synchronized { lock, body } => {
                    self.lock(lock)?;
                    self.exec_ops(body, selector)?
                }
                Op::Guard(guard) => self.run_guard(guard)?,
                Op::RethrowPending(pending) => {
                    match self.vars.insert(*pending, Value::Null) {
                        Some(Value::Null) | None => Flow::Next,
                        Some(failure) => return Err(Fault::Thrown(failure)),
                    }
                }
            };
            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    fn select_arm(&mut self, value: &Value, arms: &[SwitchArm]) -> Result<Option<Tag>, Fault> {
        for arm in arms {
            for label in &arm.labels {
                if &self.eval(label)? == value {
                    return Ok(Some(arm.target));
                }
            }
        }
        Ok(arms.iter().find(|arm| arm.is_default).map(|arm| arm.target))
    }

    fn set_state(&mut self, selector: SymbolId, tag: Tag) -> Result<(), Fault> {
        let state = self
            .class
            .tags
            .target(tag)
            .ok_or_else(|| Fault::Internal(format!("tag #{} is unresolved", tag.0)))?;
        self.vars.insert(selector, state_value(state));
        Ok(())
    }

    /// Run a nested machine inside its guarded region until it suspends or
    /// leaves the region. Leaving with a failure parks it in the pending
    /// field for the finally state to rethrow.
    fn run_guard(&mut self, guard: &Guard) -> Result<Flow, Fault> {
        loop {
            let handling = self.load_symbol(guard.in_handler)?.as_bool()?;
            let failure = match self.run_machine(&guard.machine) {
                Ok(Some(value)) => return Ok(Flow::Suspend(value)),
                Ok(None) if handling => return Ok(Flow::Next),
                Ok(None) => match self.close_resources(&guard.resources, None)? {
                    None => return Ok(Flow::Next),
                    Some(failure) => failure,
                },
                Err(fault) => {
                    let failure = catchable(fault)?;
                    if handling {
                        self.vars.insert(guard.pending, failure);
                        return Ok(Flow::Next);
                    }
                    self.close_resources(&guard.resources, Some(failure.clone()))?;
                    failure
                }
            };

            // The body failed: the first matching handler takes over
            self.vars.insert(guard.pending_jump, Value::Int(-1));
            let handler = guard
                .handlers
                .iter()
                .find(|handler| handler_matches(&failure, &handler.types));
            match handler {
                Some(handler) => {
                    tracing::trace!(machine = guard.machine.id.0, entry = handler.entry.0, "entering handler");
                    self.vars.insert(guard.in_handler, Value::Bool(true));
                    self.vars.insert(handler.param, failure);
                    self.set_state(guard.machine.selector, handler.entry)?;
                }
                None => {
                    self.vars.insert(guard.pending, failure);
                    return Ok(Flow::Next);
                }
            }
        }
    }

    /// Close resource fields in reverse order, nulling each first. The first
    /// close failure becomes the primary failure unless one is given; later
    /// failures are suppressed into the primary.
    fn close_resources(
        &mut self,
        resources: &[SymbolId],
        mut primary: Option<Value>,
    ) -> Result<Option<Value>, Fault> {
        for symbol in resources.iter().rev() {
            let resource = self.vars.insert(*symbol, Value::Null).unwrap_or(Value::Null);
            if resource.is_null() {
                continue;
            }
            if let Err(fault) = resource.call_method("close", &[]) {
                let failure = catchable(fault)?;
                match &primary {
                    Some(primary) => add_suppressed(primary, failure),
                    None => primary = Some(failure),
                }
            }
        }
        Ok(primary)
    }

    fn lock(&mut self, lock: &Expr) -> Result<(), Fault> {
        if self.eval(lock)?.is_null() {
            return Err(Fault::Thrown(Value::exception(
                "NullPointerException",
                "synchronized on null",
            )));
        }
        Ok(())
    }

    // ==================== STATEMENTS ====================

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Completion, Fault> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Completion, Fault> {
        match &stmt.kind {
            StmtKind::Empty => Ok(Completion::Normal),
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Completion::Normal)
            }
            StmtKind::Local(decl) => {
                let value = match &decl.init {
                    Some(init) => self.eval(init)?,
                    None => default_for(&decl.ty),
                };
                self.store(&decl.name, value)?;
                Ok(Completion::Normal)
            }
            StmtKind::Block(stmts) => self.exec_block(stmts),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForEach { .. } => self.exec_loop(stmt, None),
            StmtKind::Switch { selector, cases } => self.exec_switch(selector, cases),
            StmtKind::Try(try_stmt) => self.exec_try(try_stmt),
            StmtKind::Labeled { label, body } => {
                if body.is_loop() {
                    return self.exec_loop(body, Some(label.as_str()));
                }
                match self.exec_stmt(body)? {
                    Completion::Break(Some(target)) if &target == label => Ok(Completion::Normal),
                    other => Ok(other),
                }
            }
            StmtKind::Synchronized { lock, body } => {
                self.lock(lock)?;
                self.exec_block(body)
            }
            StmtKind::Break(label) => Ok(Completion::Break(label.clone())),
            StmtKind::Continue(label) => Ok(Completion::Continue(label.clone())),
            StmtKind::Throw(expr) => match self.eval(expr)? {
                failure @ Value::Exception(_) => Err(Fault::Thrown(failure)),
                Value::Null => Err(Fault::Thrown(Value::exception(
                    "NullPointerException",
                    "cannot throw null",
                ))),
                other => Err(Fault::Type(format!(
                    "cannot throw a value of type {}",
                    other.kind_name()
                ))),
            },
            StmtKind::Return(_) => Err(Fault::Internal(format!(
                "{}: return was not lowered",
                stmt.location
            ))),
        }
    }

    fn loop_step(&mut self, body: &Stmt, label: Option<&str>) -> Result<LoopStep, Fault> {
        let own = |target: &Option<String>| target.is_none() || target.as_deref() == label;
        Ok(match self.exec_stmt(body)? {
            Completion::Normal => LoopStep::Next,
            Completion::Continue(target) if own(&target) => LoopStep::Next,
            Completion::Break(target) if own(&target) => LoopStep::Break,
            other => LoopStep::Exit(other),
        })
    }

    fn exec_loop(&mut self, stmt: &Stmt, label: Option<&str>) -> Result<Completion, Fault> {
        match &stmt.kind {
            StmtKind::While { cond, body } => {
                while self.eval(cond)?.as_bool()? {
                    match self.loop_step(body, label)? {
                        LoopStep::Next => {}
                        LoopStep::Break => break,
                        LoopStep::Exit(completion) => return Ok(completion),
                    }
                }
            }
            StmtKind::DoWhile { body, cond } => loop {
                match self.loop_step(body, label)? {
                    LoopStep::Next => {}
                    LoopStep::Break => break,
                    LoopStep::Exit(completion) => return Ok(completion),
                }
                if !self.eval(cond)?.as_bool()? {
                    break;
                }
            },
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                for stmt in init {
                    self.exec_stmt(stmt)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond)?.as_bool()? {
                            break;
                        }
                    }
                    match self.loop_step(body, label)? {
                        LoopStep::Next => {}
                        LoopStep::Break => break,
                        LoopStep::Exit(completion) => return Ok(completion),
                    }
                    for expr in update {
                        self.eval(expr)?;
                    }
                }
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                let iterator = self.eval(iterable)?.call_method("iterator", &[])?;
                while iterator.call_method("hasNext", &[])?.as_bool()? {
                    let item = iterator.call_method("next", &[])?;
                    self.store(&var.name, item)?;
                    match self.loop_step(body, label)? {
                        LoopStep::Next => {}
                        LoopStep::Break => break,
                        LoopStep::Exit(completion) => return Ok(completion),
                    }
                }
            }
            _ => {
                return Err(Fault::Internal(format!(
                    "{}: not a loop",
                    stmt.location
                )))
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_switch(&mut self, selector: &Expr, cases: &[SwitchCase]) -> Result<Completion, Fault> {
        let value = self.eval(selector)?;
        let mut start = None;
        'cases: for (index, case) in cases.iter().enumerate() {
            for label in &case.labels {
                if self.eval(label)? == value {
                    start = Some(index);
                    break 'cases;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|case| case.is_default)) else {
            return Ok(Completion::Normal);
        };

        // Cases fall through until a break
        for case in &cases[start..] {
            match self.exec_block(&case.body)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(&mut self, try_stmt: &TryStmt) -> Result<Completion, Fault> {
        let mut result = self.exec_try_body(try_stmt);

        if let Err(fault) = &result {
            if fault.is_catchable() {
                let failure = catchable(fault.clone())?;
                let handler = try_stmt
                    .catches
                    .iter()
                    .find(|catch| handler_matches(&failure, &catch.types));
                if let Some(catch) = handler {
                    self.store(&catch.param, failure)?;
                    result = self.exec_block(&catch.body);
                }
            }
        }

        if let Some(finally) = &try_stmt.finally {
            match self.exec_block(finally)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    /// Resource initialisers and body, then closing in reverse order
    fn exec_try_body(&mut self, try_stmt: &TryStmt) -> Result<Completion, Fault> {
        let mut opened = Vec::with_capacity(try_stmt.resources.len());
        let mut result = Ok(Completion::Normal);
        for resource in &try_stmt.resources {
            let value = match &resource.init {
                Some(init) => self.eval(init),
                None => Ok(Value::Null),
            };
            match value {
                Ok(value) => {
                    self.store(&resource.name, value.clone())?;
                    opened.push(value);
                }
                Err(fault) => {
                    result = Err(fault);
                    break;
                }
            }
        }
        if result.is_ok() {
            result = self.exec_block(&try_stmt.body);
        }

        for resource in opened.into_iter().rev() {
            if resource.is_null() {
                continue;
            }
            if let Err(fault) = resource.call_method("close", &[]) {
                let failure = catchable(fault)?;
                match &result {
                    Err(Fault::Thrown(primary)) => add_suppressed(primary, failure),
                    Err(_) => {}
                    Ok(_) => result = Err(Fault::Thrown(failure)),
                }
            }
        }
        result
    }

    // ==================== EXPRESSIONS ====================

    fn eval(&mut self, expr: &Expr) -> Result<Value, Fault> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Int(value) => Value::Int(*value),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Str(text) => Value::str(text),
                Literal::Null => Value::Null,
            }),
            Expr::Ident(ident) => self.load(ident),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Int(value.as_int()?.wrapping_neg()),
                    UnaryOp::Not => Value::Bool(!value.as_bool()?),
                })
            }
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval(lhs)?.as_bool()? && self.eval(rhs)?.as_bool()?,
            )),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval(lhs)?.as_bool()? || self.eval(rhs)?.as_bool()?,
            )),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs)
            }
            Expr::Assign { target, op, value } => {
                let value = self.eval(value)?;
                let value = match op {
                    Some(op) => binary(*op, self.load(target)?, value)?,
                    None => value,
                };
                self.store(target, value.clone())?;
                Ok(value)
            }
            Expr::Increment {
                target,
                delta,
                postfix,
            } => {
                let old = self.load(target)?.as_int()?;
                let new = old.wrapping_add(*delta);
                self.store(target, Value::Int(new))?;
                Ok(Value::Int(if *postfix { old } else { new }))
            }
            Expr::Call { callee, args } => {
                let args = self.eval_args(args)?;
                self.host.call(callee, &args)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                receiver.call_method(method, &args)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Fault> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn load(&self, ident: &Ident) -> Result<Value, Fault> {
        ident
            .symbol
            .and_then(|symbol| self.vars.get(&symbol))
            .cloned()
            .ok_or_else(|| Fault::UnboundVariable(ident.name.clone()))
    }

    fn load_symbol(&self, symbol: SymbolId) -> Result<Value, Fault> {
        self.vars
            .get(&symbol)
            .cloned()
            .ok_or_else(|| Fault::Internal(format!("field #{} is missing", symbol.0)))
    }

    fn store(&mut self, ident: &Ident, value: Value) -> Result<(), Fault> {
        let symbol = ident
            .symbol
            .ok_or_else(|| Fault::UnboundVariable(ident.name.clone()))?;
        self.vars.insert(symbol, value);
        Ok(())
    }
}

impl Iterator for GeneratorInstance {
    type Item = Result<Value, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_value()),
            Ok(false) => None,
            Err(fault) => Some(Err(fault)),
        }
    }
}

fn state_value(state: StateId) -> Value {
    Value::Int(i64::from(state.0))
}

/// Zero value of a field of type `ty`
fn default_for(ty: &TypeRef) -> Value {
    match ty.name.as_str() {
        "boolean" => Value::Bool(false),
        _ if ty.is_primitive() => Value::Int(0),
        _ => Value::Null,
    }
}

/// The exception value of a catchable fault; other faults pass through
fn catchable(fault: Fault) -> Result<Value, Fault> {
    match fault {
        Fault::Thrown(failure) => Ok(failure),
        Fault::NoSuchElement => Ok(Value::exception(
            "NoSuchElementException",
            Fault::NoSuchElement.to_string(),
        )),
        fatal => Err(fatal),
    }
}

fn handler_matches(failure: &Value, types: &[TypeRef]) -> bool {
    match failure {
        Value::Exception(exception) => types.iter().any(|ty| exception.is_instance_of(&ty.name)),
        _ => false,
    }
}

fn add_suppressed(primary: &Value, failure: Value) {
    if let Value::Exception(exception) = primary {
        exception.add_suppressed(failure);
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, Fault> {
    use BinaryOp::*;
    Ok(match op {
        Add => match (&lhs, &rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::str(&format!("{}{}", lhs, rhs)),
            _ => Value::Int(lhs.as_int()?.wrapping_add(rhs.as_int()?)),
        },
        Sub => Value::Int(lhs.as_int()?.wrapping_sub(rhs.as_int()?)),
        Mul => Value::Int(lhs.as_int()?.wrapping_mul(rhs.as_int()?)),
        Div | Rem => {
            let (lhs, rhs) = (lhs.as_int()?, rhs.as_int()?);
            if rhs == 0 {
                return Err(Fault::Thrown(Value::exception("ArithmeticException", "/ by zero")));
            }
            Value::Int(if op == Div {
                lhs.wrapping_div(rhs)
            } else {
                lhs.wrapping_rem(rhs)
            })
        }
        Eq => Value::Bool(lhs == rhs),
        Ne => Value::Bool(lhs != rhs),
        Lt => Value::Bool(lhs.as_int()? < rhs.as_int()?),
        Le => Value::Bool(lhs.as_int()? <= rhs.as_int()?),
        Gt => Value::Bool(lhs.as_int()? > rhs.as_int()?),
        Ge => Value::Bool(lhs.as_int()? >= rhs.as_int()?),
        And => Value::Bool(lhs.as_bool()? && rhs.as_bool()?),
        Or => Value::Bool(lhs.as_bool()? || rhs.as_bool()?),
    })
}
