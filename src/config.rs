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

//! Lowering configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below.

use crate::ast::TypeRef;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringConfig {
    /// Name of the "emit one value and suspend" marker
    pub emit_marker: String,
    /// Name of the "delegate to a sub-sequence" marker
    pub emit_all_marker: String,
    /// Appended to the procedure name to form the generated class name
    pub class_suffix: String,
    /// Clear reference-typed captures when their source scope ends
    pub clear_references: bool,
    /// Element type used when the procedure does not declare one
    pub default_element_type: String,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            emit_marker: "step".to_string(),
            emit_all_marker: "stepAll".to_string(),
            class_suffix: "$Generator".to_string(),
            clear_references: true,
            default_element_type: "Object".to_string(),
        }
    }
}

impl LoweringConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: LoweringConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.emit_marker.is_empty() || self.emit_all_marker.is_empty() {
            return Err(ConfigError::Invalid("marker names must not be empty".to_string()));
        }
        if self.emit_marker == self.emit_all_marker {
            return Err(ConfigError::Invalid(format!(
                "emit and emit-all markers are both `{}`",
                self.emit_marker
            )));
        }
        Ok(())
    }

    pub fn markers(&self) -> Markers<'_> {
        Markers {
            emit: &self.emit_marker,
            emit_all: &self.emit_all_marker,
        }
    }

    pub fn fallback_element_type(&self) -> TypeRef {
        TypeRef::named(&self.default_element_type)
    }
}

/// The two well-known callee names recognised as suspension markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers<'a> {
    pub emit: &'a str,
    pub emit_all: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_marker_names() {
        let config = LoweringConfig::default();
        assert_eq!(config.markers().emit, "step");
        assert_eq!(config.markers().emit_all, "stepAll");
        assert!(config.clear_references);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LoweringConfig::from_json_str(r#"{"emit_marker": "yield_"}"#)
            .expect("config should parse");
        assert_eq!(config.emit_marker, "yield_");
        assert_eq!(config.emit_all_marker, "stepAll");
        assert_eq!(config.class_suffix, "$Generator");
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = LoweringConfig::from_json_str(r#"{"emit": "x"}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_identical_markers() {
        let result =
            LoweringConfig::from_json_str(r#"{"emit_marker": "go", "emit_all_marker": "go"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"clear_references": false}}"#).expect("write config");

        let config = LoweringConfig::from_path(file.path()).expect("config should load");
        assert!(!config.clear_references);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = LoweringConfig::from_path(Path::new("/nonexistent/genlower.json"))
            .expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/genlower.json"));
    }
}
