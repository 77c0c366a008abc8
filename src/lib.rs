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

//! Generator lowering
//!
//! Rewrites procedures that emit values with the `step` / `stepAll` markers
//! into iterator classes driven by a resumable dispatch machine.
//!
//! Phases, per procedure:
//! 1. `semantic` - name remapping and the suspension pre-pass
//! 2. `lowering` - statements to states, jump tags and captured fields
//! 3. `builder` - the `GeneratorClass` artifact
//! 4. `render` / `runtime` - print the class, or execute it directly

pub mod ast;
pub mod builder;
pub mod config;
pub mod error;
pub mod lexer;
pub mod lowering;
pub mod machine;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod runtime;
pub mod semantic;

pub use builder::GeneratorClass;
pub use config::LoweringConfig;
pub use error::{Fault, LoweringError, ParserError};
pub use pipeline::{lower_procedure, lower_unit};
