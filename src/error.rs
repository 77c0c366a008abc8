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

//! Error types shared by the frontend, the lowering engine and the config layer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Position of a node in its source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(file: String, line: usize, column: usize, offset: usize) -> Self {
        Self {
            file,
            line,
            column,
            offset,
        }
    }

    /// Location used for synthesized nodes and trees handed over without positions
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "<unknown>");
        }
        if self.file.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// Lexical analysis errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexerError {
    #[error("{location}: unexpected character '{character}'")]
    UnexpectedCharacter {
        character: char,
        location: SourceLocation,
    },

    #[error("{location}: unterminated string literal")]
    UnterminatedString { location: SourceLocation },

    #[error("{location}: invalid number '{value}'")]
    InvalidNumber {
        value: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid escape sequence '\\{sequence}'")]
    InvalidEscapeSequence {
        sequence: String,
        location: SourceLocation,
    },

    #[error("{location}: unterminated block comment")]
    UnterminatedBlockComment { location: SourceLocation },
}

/// Parsing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserError {
    #[error("{location}: {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },

    #[error("{location}: {message}")]
    InvalidSyntax {
        message: String,
        location: SourceLocation,
    },

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

/// Diagnostics raised while lowering one procedure. Lowering of that
/// procedure stops at the first one; other procedures are unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    #[error("{location}: `{marker}` cannot suspend inside {construct}")]
    IllegalSuspension {
        construct: String,
        marker: String,
        location: SourceLocation,
    },

    #[error("{location}: {construct} would have to be split across resumable states")]
    UnsplittableConstruct {
        construct: String,
        location: SourceLocation,
    },

    #[error("{location}: `break{}` has no enclosing loop, switch or label", label_suffix(.label))]
    UnmatchedBreak {
        label: Option<String>,
        location: SourceLocation,
    },

    #[error("{location}: `continue{}` has no enclosing loop", label_suffix(.label))]
    UnmatchedContinue {
        label: Option<String>,
        location: SourceLocation,
    },

    #[error("{location}: a generator cannot return a value; use the emit marker instead")]
    ReturnWithValue { location: SourceLocation },

    #[error("{location}: `{marker}` must be used as a statement on its own")]
    MisplacedMarker {
        marker: String,
        location: SourceLocation,
    },

    #[error("{location}: label `{label}` is already in scope")]
    DuplicateLabel {
        label: String,
        location: SourceLocation,
    },

    #[error("internal error: jump tag #{tag} was never resolved to a state")]
    UnresolvedTag { tag: usize },

    #[error("internal error: {message}")]
    Internal { message: String },
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(label) => format!(" {}", label),
        None => String::new(),
    }
}

impl LoweringError {
    /// Source position of a user-facing diagnostic
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            LoweringError::IllegalSuspension { location, .. }
            | LoweringError::UnsplittableConstruct { location, .. }
            | LoweringError::UnmatchedBreak { location, .. }
            | LoweringError::UnmatchedContinue { location, .. }
            | LoweringError::ReturnWithValue { location }
            | LoweringError::MisplacedMarker { location, .. }
            | LoweringError::DuplicateLabel { location, .. } => Some(location),
            LoweringError::UnresolvedTag { .. } | LoweringError::Internal { .. } => None,
        }
    }

    /// True for defects of the lowering engine itself rather than the input
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            LoweringError::UnresolvedTag { .. } | LoweringError::Internal { .. }
        )
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures raised while a generator instance advances
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// A user exception; catch clauses can handle it
    #[error("uncaught {0}")]
    Thrown(crate::runtime::Value),

    #[error("Called next on finished generator")]
    NoSuchElement,

    /// The selector held a value with no state. Never caught.
    #[error("Unreachable generator step (selector {selector})")]
    Unreachable { selector: i64 },

    #[error("type error: {0}")]
    Type(String),

    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("no method `{method}` on {receiver}")]
    UnknownMethod { receiver: String, method: String },

    #[error("`{name}` expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("internal runtime error: {0}")]
    Internal(String),
}

impl Fault {
    pub fn is_catchable(&self) -> bool {
        matches!(self, Fault::Thrown(_) | Fault::NoSuchElement)
    }
}
