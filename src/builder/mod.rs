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

//! Generator class assembly
//!
//! Packages a lowered body together with everything a host needs to splice
//! the result back in: the class name, the element type, the constructor
//! parameters and the captured fields.

use crate::ast::{Param, Procedure, TypeRef};
use crate::config::LoweringConfig;
use crate::error::LoweringError;
use crate::lowering::LoweredBody;
use crate::machine::{CaptureSet, Machine, TagTable};
use crate::semantic::SymbolTable;
use serde::{Deserialize, Serialize};


/// The output artifact: an iterator class backed by a dispatch machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorClass {
    pub name: String,
    /// Name of the procedure this class replaces
    pub procedure: String,
    pub element_type: TypeRef,
    /// Constructor parameters, remapped
    pub params: Vec<Param>,
    pub captures: CaptureSet,
    pub advance: Machine,
    pub tags: TagTable,
    pub symbols: SymbolTable,
}

impl GeneratorClass {
    /// Total number of states over all machines
    pub fn state_count(&self) -> usize {
        self.advance
            .machines()
            .iter()
            .map(|machine| machine.states.len())
            .sum()
    }

    pub fn machine_count(&self) -> usize {
        self.advance.machines().len()
    }
}

/// Assemble the class for `procedure` (already remapped) from its lowered body
pub fn assemble(
    procedure: &Procedure,
    element_type: TypeRef,
    lowered: LoweredBody,
    config: &LoweringConfig,
) -> Result<GeneratorClass, LoweringError> {
    lowered.tags.verify()?;

    for param in &procedure.params {
        let captured = param
            .name
            .symbol
            .is_some_and(|symbol| lowered.captures.contains(symbol));
        if !captured {
            return Err(LoweringError::Internal {
                message: format!("parameter `{}` has no field", param.name.name),
            });
        }
    }

    let class = GeneratorClass {
        name: format!("{}{}", procedure.name, config.class_suffix),
        procedure: procedure.name.clone(),
        element_type,
        params: procedure.params.clone(),
        captures: lowered.captures,
        advance: lowered.machine,
        tags: lowered.tags,
        symbols: lowered.symbols,
    };

    tracing::debug!(
        class = %class.name,
        states = class.state_count(),
        fields = class.captures.len(),
        "assembled generator class"
    );
    Ok(class)
}
