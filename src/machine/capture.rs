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

//! Captured variables: locals promoted to fields of the generator object

use crate::ast::{SymbolId, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    /// Never cleared (value types, parameters, selectors)
    Retained,
    /// Reset to null where the declaring scope ends
    ClearedAtScopeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureOrigin {
    Parameter,
    Local,
    /// Selector field of a machine
    Selector,
    /// Iteration handles and try bookkeeping introduced by lowering
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub symbol: SymbolId,
    /// Unique field name
    pub name: String,
    pub ty: TypeRef,
    pub liveness: Liveness,
    pub origin: CaptureOrigin,
}

impl Capture {
    pub fn is_cleared(&self) -> bool {
        self.liveness == Liveness::ClearedAtScopeEnd
    }
}

/// Captured fields ordered by symbol id, which is declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSet {
    fields: BTreeMap<SymbolId, Capture>,
}

impl CaptureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capture: Capture) {
        self.fields.insert(capture.symbol, capture);
    }

    pub fn get(&self, symbol: SymbolId) -> Option<&Capture> {
        self.fields.get(&symbol)
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.fields.contains_key(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capture> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.values().map(|c| c.name.as_str()).collect()
    }
}
