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

//! Lowering driver
//!
//! `lower_procedure` runs the phases for one procedure: element type, name
//! remapping, lowering, class assembly. `lower_unit` fans a compilation unit
//! out over the rayon pool. Procedures are independent, so one failure is
//! reported as a diagnostic and never stops the others.

use crate::ast::{CompilationUnit, Procedure};
use crate::builder::{assemble, GeneratorClass};
use crate::config::LoweringConfig;
use crate::error::{LoweringError, ParserError};
use crate::lowering::lower_body;
use crate::parser::parse_source;
use crate::semantic::remap_procedure;
use rayon::prelude::*;
use std::fmt;


/// Lower one generator procedure into its class
#[tracing::instrument(skip_all, fields(procedure = %procedure.name))]
pub fn lower_procedure(
    procedure: &Procedure,
    config: &LoweringConfig,
) -> Result<GeneratorClass, LoweringError> {
    let element_type = procedure
        .element_type()
        .unwrap_or_else(|| config.fallback_element_type());
    let (remapped, symbols) = remap_procedure(procedure);
    tracing::debug!(symbols = symbols.len(), element = %element_type, "remapped names");

    let lowered = lower_body(&remapped, symbols, &element_type, config)?;
    assemble(&remapped, element_type, lowered, config)
}

/// Outcome for one procedure of a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub procedure: String,
    pub result: Result<GeneratorClass, LoweringError>,
}

/// Lower every procedure of `unit` in parallel. Results keep input order.
pub fn lower_unit(unit: &CompilationUnit, config: &LoweringConfig) -> Vec<Lowered> {
    let lowered: Vec<Lowered> = unit
        .procedures
        .par_iter()
        .map(|procedure| Lowered {
            procedure: procedure.name.clone(),
            result: lower_procedure(procedure, config),
        })
        .collect();

    let failed = lowered.iter().filter(|l| l.result.is_err()).count();
    tracing::debug!(procedures = lowered.len(), failed, "lowered compilation unit");
    lowered
}

/// Parse surface syntax into a compilation unit
pub fn parse_unit(source: &str, file: &str) -> Result<CompilationUnit, ParserError> {
    let unit = parse_source(source, file)?;
    tracing::debug!(file, procedures = unit.procedures.len(), "parsed compilation unit");
    Ok(unit)
}

/// Read a compilation unit serialized by a host
pub fn unit_from_json(text: &str) -> Result<CompilationUnit, serde_json::Error> {
    serde_json::from_str(text)
}

/// A lowering failure attributed to its procedure
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub procedure: String,
    pub error: LoweringError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.procedure, self.error)
    }
}

/// Receiver of lowering diagnostics
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Keeps every diagnostic, in report order
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Logs each diagnostic as a warning
#[derive(Debug, Default)]
pub struct TracingSink {
    pub reported: usize,
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.reported += 1;
        if diagnostic.error.is_internal() {
            tracing::error!(procedure = %diagnostic.procedure, error = %diagnostic.error, "lowering defect");
        } else {
            tracing::warn!(procedure = %diagnostic.procedure, error = %diagnostic.error, "procedure not lowered");
        }
    }
}

/// Split unit results into classes, sending failures to `sink`
pub fn collect_classes(lowered: Vec<Lowered>, sink: &mut dyn DiagnosticSink) -> Vec<GeneratorClass> {
    let mut classes = Vec::with_capacity(lowered.len());
    for Lowered { procedure, result } in lowered {
        match result {
            Ok(class) => classes.push(class),
            Err(error) => sink.report(Diagnostic { procedure, error }),
        }
    }
    classes
}
