//! Engine configuration.
//!
//! Every field has a default, so a configuration file only needs the
//! settings it changes:
//!
//! ```yaml
//! delimiter: " / "
//! max_depth: 8
//! permission_policy: record
//! loop_permission_policy: raise
//! fixed_now: 2025-02-18T09:00:00
//! ```

use std::path::Path;

use chrono::NaiveDateTime;
use deckfill_expr::{ResolveOptions, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::loops::ExpandOptions;
use crate::permissions::DenyPolicy;
use crate::text::{Mode, TextOptions};

/// Settings shared by every render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Separator for lists rendered into a single string.
    pub delimiter: String,
    /// Deepest list nesting broadcasting will descend into.
    pub max_depth: usize,
    /// Policy for values rejected inside text spans.
    pub permission_policy: DenyPolicy,
    /// Policy for loop collections with rejected elements.
    pub loop_permission_policy: DenyPolicy,
    /// Value of `now`, for reproducible output. The local clock when unset.
    pub fixed_now: Option<NaiveDateTime>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delimiter: ", ".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            permission_policy: DenyPolicy::Raise,
            loop_permission_policy: DenyPolicy::Raise,
            fixed_now: None,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, RenderError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RenderError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.max_depth == 0 {
            return Err(RenderError::Config(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_fixed_now(mut self, now: NaiveDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_depth: self.max_depth,
            now: self.fixed_now,
        }
    }

    pub fn text_options(&self, mode: Mode) -> TextOptions {
        TextOptions {
            mode,
            delimiter: self.delimiter.clone(),
            keep_lists: false,
            policy: self.permission_policy,
            resolve: self.resolve_options(),
        }
    }

    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            resolve: self.resolve_options(),
            policy: self.loop_permission_policy,
        }
    }
}
