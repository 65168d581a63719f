//! Request envelopes sent to a skill module on stdin.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source syntax the injection module should emit steps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    Json,
    Yaml,
    Xml,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InjectOptions {
    pub apply: bool,
    pub syntax: Syntax,
}

/// One request per module run, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RequestEnvelope {
    Validate {
        spec: Value,
    },
    #[serde(rename_all = "camelCase")]
    Inject {
        spec: Value,
        source_content: String,
        source_path: String,
        options: InjectOptions,
    },
}

impl RequestEnvelope {
    /// Serialize for the module's stdin.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Structured-data format of a spec document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// Pick a parser from the file extension; anything unrecognised is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    /// Parse `text` into a JSON value.
    pub fn parse(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}
