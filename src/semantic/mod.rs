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

//! Analyses that run before lowering
//!
//! Name remapping gives every declaration a unique synthetic identity, and the
//! suspension scan decides which statements can be copied into a state
//! verbatim and which have to be split.

pub mod remap;
pub mod suspension;

pub use remap::{remap_procedure, SymbolInfo, SymbolKind, SymbolTable};
pub use suspension::{first_marker, needs_lowering};
