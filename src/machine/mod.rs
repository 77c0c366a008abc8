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

//! Resumable state machine representation
//!
//! A `Machine` is a dispatch table: one selector field plus an ordered list
//! of states. Jumps between states go through `Tag`s, which are indices into
//! a `TagTable` arena and may be created before the state they denote
//! exists. Every tag is resolved exactly once; `TagTable::verify` rejects a
//! table with an unresolved slot.

pub mod capture;

pub use capture::{Capture, CaptureOrigin, CaptureSet, Liveness};

use crate::ast::{Expr, Ident, Stmt, SymbolId, TypeRef};
use crate::error::LoweringError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
mod tests;

/// Identifier of a state within its machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub u32);

impl StateId {
    /// Sentinel selector value: the machine has nothing more to run
    pub const FINISHED: StateId = StateId(0);
    /// Entry state of every machine
    pub const START: StateId = StateId(1);
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a machine; nested machines are numbered after the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub u32);

impl MachineId {
    pub const ROOT: MachineId = MachineId(0);
}

/// Forward-resolvable reference to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(pub usize);

impl Tag {
    /// Pre-resolved tag for the root machine's FINISHED sentinel
    pub const FINISHED: Tag = Tag(0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TagSlot {
    owner: MachineId,
    target: Option<StateId>,
}

/// Arena of tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTable {
    slots: Vec<TagSlot>,
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTable {
    pub fn new() -> Self {
        Self {
            slots: vec![TagSlot {
                owner: MachineId::ROOT,
                target: Some(StateId::FINISHED),
            }],
        }
    }

    /// New unresolved tag for a state of `owner`
    pub fn fresh(&mut self, owner: MachineId) -> Tag {
        self.slots.push(TagSlot {
            owner,
            target: None,
        });
        Tag(self.slots.len() - 1)
    }

    pub fn resolve(&mut self, tag: Tag, state: StateId) -> Result<(), LoweringError> {
        let slot = self.slots.get_mut(tag.0).ok_or_else(|| LoweringError::Internal {
            message: format!("tag #{} does not exist", tag.0),
        })?;
        if let Some(previous) = slot.target {
            return Err(LoweringError::Internal {
                message: format!(
                    "tag #{} resolved twice (to {} and {})",
                    tag.0, previous, state
                ),
            });
        }
        slot.target = Some(state);
        Ok(())
    }

    pub fn target(&self, tag: Tag) -> Option<StateId> {
        self.slots.get(tag.0).and_then(|slot| slot.target)
    }

    pub fn owner(&self, tag: Tag) -> MachineId {
        self.slots
            .get(tag.0)
            .map(|slot| slot.owner)
            .unwrap_or(MachineId::ROOT)
    }

    /// Check that every tag denotes a state
    pub fn verify(&self) -> Result<(), LoweringError> {
        match self.slots.iter().position(|slot| slot.target.is_none()) {
            Some(index) => Err(LoweringError::UnresolvedTag { tag: index }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One lowered operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Statement copied from the input because it never leaves the state
    Plain(Stmt),
    Assign {
        target: SymbolId,
        value: Expr,
    },
    /// Reset a reference capture to null
    Clear(SymbolId),
    /// Store the tag's state in the machine selector without leaving
    SetState(Tag),
    /// Store the tag's state in the selector and re-dispatch
    Jump(Tag),
    /// Suspend, producing a value; the selector is left as it is
    Yield(Expr),
    /// Set the selector to FINISHED and leave the machine
    Finish,
    If {
        cond: Expr,
        then_ops: Vec<Op>,
        else_ops: Vec<Op>,
    },
    /// Structural switch: jumps to the first matching arm, falls through
    /// to the next op when nothing matches
    Switch {
        selector: Expr,
        arms: Vec<SwitchArm>,
    },
    Synchronized {
        lock: Expr,
        body: Vec<Op>,
    },
    /// Run a nested machine inside a structural try
    Guard(Box<Guard>),
    /// Throw the failure parked in the given field, if any
    RethrowPending(SymbolId),
}

impl Op {
    /// Control never reaches the op after this one
    pub fn is_terminal(&self) -> bool {
        match self {
            Op::Jump(_) | Op::Yield(_) | Op::Finish => true,
            Op::Plain(stmt) => matches!(stmt.kind, crate::ast::StmtKind::Throw(_)),
            Op::If {
                then_ops, else_ops, ..
            } => ends_terminal(then_ops) && ends_terminal(else_ops),
            Op::Switch { arms, .. } => arms.iter().any(|arm| arm.is_default),
            Op::Synchronized { body, .. } => ends_terminal(body),
            _ => false,
        }
    }
}

/// True if the last op of `ops` is terminal
pub fn ends_terminal(ops: &[Op]) -> bool {
    ops.last().is_some_and(Op::is_terminal)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchArm {
    pub labels: Vec<Expr>,
    pub is_default: bool,
    pub target: Tag,
}

/// Catch clause of a guarded region, entered at `entry` in the nested machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    pub param: SymbolId,
    pub types: Vec<TypeRef>,
    pub entry: Tag,
}

/// A try statement whose body suspends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    /// Try body and catch bodies
    pub machine: Machine,
    /// Resource fields, in declaration order
    pub resources: Vec<SymbolId>,
    pub handlers: Vec<Handler>,
    /// Set once a handler has been entered
    pub in_handler: SymbolId,
    /// Failure waiting for the finally code to rethrow it
    pub pending: SymbolId,
    /// Index of a tag to transfer to after the finally code, or -1
    pub pending_jump: SymbolId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub ops: Vec<Op>,
}

/// Finished dispatch table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub selector: SymbolId,
    pub states: Vec<State>,
}

impl Machine {
    pub fn state(&self, id: StateId) -> Option<&State> {
        // States are numbered densely from START
        let index = id.0.checked_sub(StateId::START.0)? as usize;
        self.states.get(index)
    }

    /// This machine and every machine nested in it, outermost first
    pub fn machines(&self) -> Vec<&Machine> {
        let mut all = vec![self];
        for state in &self.states {
            collect_nested(&state.ops, &mut all);
        }
        all
    }
}

fn collect_nested<'a>(ops: &'a [Op], out: &mut Vec<&'a Machine>) {
    for op in ops {
        match op {
            Op::Guard(guard) => out.extend(guard.machine.machines()),
            Op::If {
                then_ops, else_ops, ..
            } => {
                collect_nested(then_ops, out);
                collect_nested(else_ops, out);
            }
            Op::Synchronized { body, .. } => collect_nested(body, out),
            _ => {}
        }
    }
}

/// State-machine accumulator for one machine under construction.
/// New states are always opened at the end; the last one is the open state.
#[derive(Debug)]
pub struct Block {
    id: MachineId,
    selector: SymbolId,
    states: Vec<State>,
}

impl Block {
    /// New block with its START state open
    pub fn new(id: MachineId, selector: SymbolId) -> Self {
        Self {
            id,
            selector,
            states: vec![State {
                id: StateId::START,
                ops: Vec::new(),
            }],
        }
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Close the open state and open the next one
    pub fn open_state(&mut self) -> StateId {
        let id = StateId(self.states.len() as u32 + StateId::START.0);
        self.states.push(State {
            id,
            ops: Vec::new(),
        });
        tracing::debug!(machine = self.id.0, state = id.0, "opened state");
        id
    }

    /// The currently open state
    pub fn current(&self) -> StateId {
        StateId(self.states.len() as u32 - 1 + StateId::START.0)
    }

    /// Ops of a state. Structural ops (`If`) are appended to their state only
    /// after their branches are lowered, so this is not limited to the open state.
    pub fn ops_mut(&mut self, id: StateId) -> Result<&mut Vec<Op>, LoweringError> {
        id.0.checked_sub(StateId::START.0)
            .and_then(|index| self.states.get_mut(index as usize))
            .map(|state| &mut state.ops)
            .ok_or_else(|| LoweringError::Internal {
                message: format!("state {} does not exist", id),
            })
    }

    pub fn ops(&self, id: StateId) -> &[Op] {
        id.0.checked_sub(StateId::START.0)
            .and_then(|index| self.states.get(index as usize))
            .map(|state| state.ops.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn finish(self) -> Machine {
        Machine {
            id: self.id,
            selector: self.selector,
            states: self.states,
        }
    }
}

/// `receiver.method()` on a synthetic field
pub fn call_on(ident: Ident, method: &str) -> Expr {
    Expr::method(Expr::Ident(ident), method, Vec::new())
}
