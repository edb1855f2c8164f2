//! Marker configuration, loadable from YAML or JSON.
//!
//! A [`MarkerOptions`] value names every marker set the engine recognizes,
//! each a list of literal strings. `build` compiles them into the parser
//! and transformer pair. Markers destined for the transformer are folded
//! into the parser's decorated-line set automatically, since the
//! transformer can only classify lines the parser has decorated; block
//! start and end markers are kept out of that fold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::AstBuilder;
use crate::markers::MarkerSet;
use crate::transform::AstTransformer;

#[derive(Debug)]
pub enum ConfigError {
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Yaml(e) => write!(f, "invalid YAML configuration: {}", e),
            ConfigError::Json(e) => write!(f, "invalid JSON configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

/// Recognized configuration surface. Unsuitable markers (empty, leading
/// whitespace, embedded CR/LF) are silently dropped at compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkerOptions {
    pub decorated_line_markers: Vec<String>,
    pub escaped_block_start_markers: Vec<String>,
    pub escaped_block_end_markers: Vec<String>,
    pub nested_block_start_markers: Vec<String>,
    pub nested_block_end_markers: Vec<String>,
    pub aug_code_markers: Vec<String>,
    pub aug_code_arg_markers: Vec<String>,
    pub aug_code_json_arg_markers: Vec<String>,
    pub aug_code_arg_sep_markers: Vec<String>,
    pub gen_code_markers: Vec<String>,
    pub default_gen_code_inline_marker: Option<String>,
    pub default_gen_code_start_marker: Option<String>,
    pub default_gen_code_end_marker: Option<String>,
}

impl MarkerOptions {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(ConfigError::Yaml)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Json)
    }

    /// Compiles the options into a parser and transformer pair.
    pub fn build(&self) -> (AstBuilder, AstTransformer) {
        let builder = AstBuilder {
            decorated_line_markers: MarkerSet::compile(&self.all_decorated_line_markers()),
            escaped_block_start_markers: MarkerSet::compile(&self.escaped_block_start_markers),
            escaped_block_end_markers: MarkerSet::compile(&self.escaped_block_end_markers),
            nested_block_start_markers: MarkerSet::compile(&self.nested_block_start_markers),
            nested_block_end_markers: MarkerSet::compile(&self.nested_block_end_markers),
        };
        let transformer = AstTransformer {
            aug_code_markers: MarkerSet::compile(&self.aug_code_markers),
            aug_code_arg_markers: MarkerSet::compile(&self.aug_code_arg_markers),
            aug_code_json_arg_markers: MarkerSet::compile(&self.aug_code_json_arg_markers),
            aug_code_arg_sep_markers: MarkerSet::compile(&self.aug_code_arg_sep_markers),
            gen_code_markers: MarkerSet::compile(&self.gen_code_markers),
            default_gen_code_inline_marker: self.default_gen_code_inline_marker.clone(),
            default_gen_code_start_marker: self.default_gen_code_start_marker.clone(),
            default_gen_code_end_marker: self.default_gen_code_end_marker.clone(),
        };
        (builder, transformer)
    }

    /// The parser's decorated-line set: the explicitly listed markers plus
    /// every transformer marker that is not a block start or end marker.
    fn all_decorated_line_markers(&self) -> Vec<String> {
        let mut result = self.decorated_line_markers.clone();
        let candidates = self
            .aug_code_markers
            .iter()
            .chain(&self.aug_code_arg_markers)
            .chain(&self.aug_code_json_arg_markers)
            .chain(&self.aug_code_arg_sep_markers)
            .chain(&self.gen_code_markers)
            .chain(&self.default_gen_code_inline_marker);
        for marker in candidates {
            if self.is_block_marker(marker) {
                continue;
            }
            if !result.contains(marker) {
                result.push(marker.clone());
            }
        }
        result
    }

    fn is_block_marker(&self, marker: &str) -> bool {
        self.escaped_block_start_markers.iter().any(|m| m == marker)
            || self.escaped_block_end_markers.iter().any(|m| m == marker)
            || self.nested_block_start_markers.iter().any(|m| m == marker)
            || self.nested_block_end_markers.iter().any(|m| m == marker)
    }
}
