//! Experiment configuration.
//!
//! An experiment is one treatment condition: which model to drive, how the
//! system prompt is assembled, which tools the agent may use, and how many
//! repeated runs to score. Experiments live in `experiments/<name>.yaml` and
//! are immutable after load.

use crate::error::{Result, SkillbenchError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ---------------------------------------------------------------------------
// SystemPromptPolicy
// ---------------------------------------------------------------------------

/// How the agent's system prompt is assembled from the built-in preset.
///
/// Adjacently tagged: serde skips stray keys under `system_prompt:`, but a
/// typoed `text` key still fails the load for `append`/`replace` because the
/// required content ends up missing. (Internally tagged enums silently
/// ignore `deny_unknown_fields`, so it buys nothing here.)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", content = "text", rename_all = "snake_case")]
pub enum SystemPromptPolicy {
    /// Use the preset unchanged. The baseline condition.
    #[default]
    Preset,
    /// Preset plus a separator plus the extra text. The usual treatment
    /// condition.
    Append(String),
    /// Ignore the preset entirely and send the given text.
    Replace(String),
}

impl SystemPromptPolicy {
    /// Pure materialization of the literal prompt text sent to the backend.
    pub fn materialize(&self, preset: &str) -> String {
        match self {
            SystemPromptPolicy::Preset => preset.to_string(),
            SystemPromptPolicy::Append(text) => format!("{preset}\n\n{text}"),
            SystemPromptPolicy::Replace(text) => text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Experiment {
    #[serde(default = "default_model")]
    pub model: String,
    /// Repeated trials per fixture.
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Hard per-run ceiling on the agent invocation.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Substring filter over fixture names; absent means all fixtures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_filter: Option<String>,
    #[serde(default)]
    pub system_prompt: SystemPromptPolicy,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Shell command run once in each fresh sandbox before the agent starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(default = "default_setup_timeout_seconds")]
    pub setup_timeout_seconds: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_runs() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_setup_timeout_seconds() -> u64 {
    120
}

fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Bash", "Glob", "Grep"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

const PERMISSION_MODES: &[&str] = &[
    "default",
    "acceptEdits",
    "bypassPermissions",
    "plan",
    "dontAsk",
];

impl Default for Experiment {
    fn default() -> Self {
        Self {
            model: default_model(),
            runs: default_runs(),
            timeout_seconds: default_timeout_seconds(),
            fixture_filter: None,
            system_prompt: SystemPromptPolicy::default(),
            allowed_tools: default_allowed_tools(),
            disallowed_tools: Vec::new(),
            permission_mode: None,
            max_turns: None,
            setup: None,
            setup_timeout_seconds: default_setup_timeout_seconds(),
        }
    }
}

impl Experiment {
    /// Load and validate `experiments/<name>.yaml` under `root`.
    pub fn load(root: &Path, name: &str) -> Result<Self> {
        paths::validate_experiment_name(name)?;
        let path = paths::experiment_path(root, name);
        if !path.exists() {
            return Err(SkillbenchError::ExperimentNotFound(name.to_string()));
        }
        let data = fs::read_to_string(&path)?;
        let experiment: Experiment =
            serde_yaml::from_str(&data).map_err(|e| SkillbenchError::InvalidExperiment {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        experiment.validate(name)?;
        Ok(experiment)
    }

    /// Check structural invariants, reporting the first violation.
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: &str| SkillbenchError::InvalidExperiment {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if self.model.trim().is_empty() {
            return Err(invalid("model must not be empty"));
        }
        if self.runs < 1 {
            return Err(invalid("runs must be at least 1"));
        }
        if self.timeout_seconds == 0 {
            return Err(invalid("timeout_seconds must be positive"));
        }
        match &self.system_prompt {
            SystemPromptPolicy::Preset => {}
            SystemPromptPolicy::Append(text) => {
                if text.trim().is_empty() {
                    return Err(invalid("system_prompt text must be non-empty for the append policy"));
                }
            }
            SystemPromptPolicy::Replace(text) => {
                if text.trim().is_empty() {
                    return Err(invalid("system_prompt text must be non-empty for the replace policy"));
                }
            }
        }
        if let Some(mode) = &self.permission_mode {
            if !PERMISSION_MODES.contains(&mode.as_str()) {
                return Err(invalid(&format!("unknown permission_mode '{mode}'")));
            }
        }
        if self.max_turns == Some(0) {
            return Err(invalid("max_turns must be at least 1"));
        }
        if let Some(setup) = &self.setup {
            if setup.trim().is_empty() {
                return Err(invalid("setup must not be an empty command"));
            }
        }
        if self.setup_timeout_seconds == 0 {
            return Err(invalid("setup_timeout_seconds must be positive"));
        }
        Ok(())
    }

    pub fn matches_fixture(&self, fixture_name: &str) -> bool {
        match &self.fixture_filter {
            Some(filter) => fixture_name.contains(filter.as_str()),
            None => true,
        }
    }
}

/// Sorted names of every experiment file under `root`.
pub fn list(root: &Path) -> Result<Vec<String>> {
    let dir = paths::experiments_dir(root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(paths::EXPERIMENT_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
